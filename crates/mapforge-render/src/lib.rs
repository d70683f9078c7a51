//! MapForge Render Library
//!
//! Renderer abstraction, scene building, and texture management for
//! MapForge boards. Backends consume the backend-neutral draw command
//! list produced by [`scene::build_scene`].

mod renderer;
pub mod scene;
pub mod textures;

pub use renderer::{GridStyle, RenderContext, RenderResult, Renderer, RendererError};
pub use scene::{build_scene, DrawCommand, Scene};
pub use textures::{LoadTicket, TextureCache, TextureError, TextureImage, TextureState};
