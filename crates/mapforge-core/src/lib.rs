//! MapForge Core Library
//!
//! Platform-agnostic engine for grid-based tabletop map authoring: grid
//! coordinate mapping, brush shape resolution, tile/overlay compositing,
//! token management, and the pointer gesture state machine.

pub mod brush;
pub mod camera;
pub mod compositor;
pub mod events;
pub mod grid;
pub mod interaction;
pub mod material;
pub mod tokens;

pub use brush::{BrushAction, BrushConfig, BrushMode, EraseTarget, StrokeSampler};
pub use camera::Camera;
pub use compositor::{
    CornerDir, Direction, OverlayKind, OverlaySprite, OverlayTexture, TileCompositor, TileRecord,
};
pub use events::{EngineEvent, EventQueue};
pub use grid::{GridCell, GridMapper, DEFAULT_CELL_SIZE};
pub use interaction::{
    ArmedBrush, BoardEngine, InteractionState, PlacedProp, PointerButton, PointerId,
    CLICK_DRAG_THRESHOLD,
};
pub use material::{
    AssetLibrary, AssetLibraryItem, MaterialDefinition, MaterialSet, MaterialTextures, RotationMode,
};
pub use tokens::{PlayerCharacter, TokenColor, TokenEngine, TokenRecord, TokenSummary, TOKEN_SPEED};
