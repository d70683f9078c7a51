//! Scene building: translating board state into draw commands.
//!
//! Commands are emitted in world coordinates, back to front; the backend
//! applies the camera transform and rasterizes. Building a scene also
//! discovers which textures are missing and hands back load tickets so
//! the host can fetch them.

use kurbo::{Point, Rect};
use mapforge_core::{GridCell, GridMapper, OverlayTexture, TokenRecord};
use peniko::Color;

use crate::renderer::{GridStyle, RenderContext};
use crate::textures::{LoadTicket, TextureCache};

/// Radius of grid intersection dots in world units.
const GRID_DOT_RADIUS: f64 = 1.5;

/// Placeholder fill for tiles whose base texture is not ready.
const TILE_PLACEHOLDER: Color = Color::from_rgba8(180, 180, 180, 255);

/// Placeholder fill for props whose texture is not ready.
const PROP_PLACEHOLDER: Color = Color::from_rgba8(120, 120, 120, 200);

/// A single backend-neutral draw operation in world coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    FillRect {
        rect: Rect,
        color: Color,
    },
    StrokeRect {
        rect: Rect,
        color: Color,
        width: f64,
    },
    FillCircle {
        center: Point,
        radius: f64,
        color: Color,
    },
    StrokeCircle {
        center: Point,
        radius: f64,
        color: Color,
        width: f64,
    },
    Line {
        p0: Point,
        p1: Point,
        color: Color,
        width: f64,
    },
    /// An axis-aligned quad textured with a (possibly transformed) asset.
    TexturedRect {
        rect: Rect,
        asset_id: String,
        rotation_deg: f64,
        flip_x: bool,
        flip_y: bool,
    },
}

/// The built frame: ordered commands plus textures still to fetch.
#[derive(Debug, Default)]
pub struct Scene {
    pub commands: Vec<DrawCommand>,
    pub pending_loads: Vec<LoadTicket>,
}

/// Build the full frame for the given board state.
///
/// Draw order, back to front: base tiles, overlay sprites, grid, props,
/// brush preview, marquee, tokens, drag ghost.
pub fn build_scene(ctx: &RenderContext, textures: &mut TextureCache) -> Scene {
    let mut scene = Scene::default();
    let engine = ctx.engine;
    let mapper = &engine.mapper;

    push_tiles(&mut scene, ctx, textures);
    push_overlays(&mut scene, ctx, textures);
    if engine.grid_overlay_visible {
        push_grid(&mut scene, ctx);
    }
    push_props(&mut scene, ctx, textures);

    for cell in engine.brush_preview() {
        scene.commands.push(DrawCommand::FillRect {
            rect: cell_rect(mapper, cell),
            color: ctx.preview_color,
        });
    }

    if let Some(rect) = engine.selection_rect() {
        scene.commands.push(DrawCommand::FillRect {
            rect,
            color: ctx.preview_color,
        });
        scene.commands.push(DrawCommand::StrokeRect {
            rect,
            color: ctx.selection_color,
            width: 1.0,
        });
    }

    push_tokens(&mut scene, ctx, textures);

    if let Some((token_id, pos)) = engine.drag_preview() {
        if let Some(token) = engine.tokens.get(token_id) {
            scene.commands.push(DrawCommand::FillCircle {
                center: pos,
                radius: token.hit_radius(),
                color: with_alpha(token.color.into(), 100),
            });
        }
    }

    scene
}

fn push_tiles(scene: &mut Scene, ctx: &RenderContext, textures: &mut TextureCache) {
    let engine = ctx.engine;
    // Sorted for a stable draw order; tiles never overlap but the
    // command list should not churn between identical frames.
    let mut tiles: Vec<_> = engine.compositor.tiles().collect();
    tiles.sort_by_key(|t| t.cell);

    for tile in tiles {
        let rect = cell_rect(&engine.mapper, tile.cell);
        let base = engine
            .materials()
            .get(&tile.material_id)
            .and_then(|m| m.textures.base.as_deref())
            .filter(|s| !s.is_empty());

        match base {
            Some(asset_id) if resolve(scene, textures, asset_id) => {
                scene.commands.push(DrawCommand::TexturedRect {
                    rect,
                    asset_id: asset_id.to_string(),
                    rotation_deg: tile.base_rotation as f64,
                    flip_x: false,
                    flip_y: false,
                });
            }
            _ => scene.commands.push(DrawCommand::FillRect {
                rect,
                color: TILE_PLACEHOLDER,
            }),
        }
    }
}

fn push_overlays(scene: &mut Scene, ctx: &RenderContext, textures: &mut TextureCache) {
    let engine = ctx.engine;
    for sprite in engine.compositor.overlays() {
        // Untextured sprites are legal; they simply draw nothing.
        let Some(OverlayTexture {
            asset_id,
            rotation_deg,
            flip_x,
            flip_y,
        }) = &sprite.texture
        else {
            continue;
        };
        if !resolve(scene, textures, asset_id) {
            continue;
        }
        scene.commands.push(DrawCommand::TexturedRect {
            rect: cell_rect(&engine.mapper, sprite.cell),
            asset_id: asset_id.clone(),
            rotation_deg: *rotation_deg as f64,
            flip_x: *flip_x,
            flip_y: *flip_y,
        });
    }
}

fn push_grid(scene: &mut Scene, ctx: &RenderContext) {
    if ctx.grid_style == GridStyle::None {
        return;
    }
    let camera = &ctx.engine.camera;
    let cell = ctx.engine.mapper.cell_size;

    let top_left = camera.screen_to_world(Point::ZERO);
    let bottom_right = camera.screen_to_world(Point::new(
        ctx.viewport_size.width,
        ctx.viewport_size.height,
    ));
    let x0 = (top_left.x / cell).floor() * cell;
    let y0 = (top_left.y / cell).floor() * cell;

    match ctx.grid_style {
        GridStyle::Lines => {
            let mut x = x0;
            while x <= bottom_right.x {
                scene.commands.push(DrawCommand::Line {
                    p0: Point::new(x, top_left.y),
                    p1: Point::new(x, bottom_right.y),
                    color: ctx.grid_color,
                    width: 1.0 / camera.zoom,
                });
                x += cell;
            }
            let mut y = y0;
            while y <= bottom_right.y {
                scene.commands.push(DrawCommand::Line {
                    p0: Point::new(top_left.x, y),
                    p1: Point::new(bottom_right.x, y),
                    color: ctx.grid_color,
                    width: 1.0 / camera.zoom,
                });
                y += cell;
            }
        }
        GridStyle::Dots => {
            let mut y = y0;
            while y <= bottom_right.y {
                let mut x = x0;
                while x <= bottom_right.x {
                    scene.commands.push(DrawCommand::FillCircle {
                        center: Point::new(x, y),
                        radius: GRID_DOT_RADIUS / camera.zoom,
                        color: ctx.grid_color,
                    });
                    x += cell;
                }
                y += cell;
            }
        }
        GridStyle::None => {}
    }
}

fn push_props(scene: &mut Scene, ctx: &RenderContext, textures: &mut TextureCache) {
    let engine = ctx.engine;
    for prop in engine.props() {
        let rect = cell_rect(&engine.mapper, prop.cell);
        if resolve(scene, textures, &prop.asset_id) {
            scene.commands.push(DrawCommand::TexturedRect {
                rect,
                asset_id: prop.asset_id.clone(),
                rotation_deg: 0.0,
                flip_x: false,
                flip_y: false,
            });
        } else {
            scene.commands.push(DrawCommand::FillRect {
                rect,
                color: PROP_PLACEHOLDER,
            });
        }
    }
}

fn push_tokens(scene: &mut Scene, ctx: &RenderContext, textures: &mut TextureCache) {
    let engine = ctx.engine;
    for token in engine.tokens.tokens() {
        push_token(scene, ctx, textures, token, engine.tokens.is_selected(&token.id));
    }
}

fn push_token(
    scene: &mut Scene,
    ctx: &RenderContext,
    textures: &mut TextureCache,
    token: &TokenRecord,
    selected: bool,
) {
    let radius = token.hit_radius();
    let image = token
        .image_asset
        .as_deref()
        .filter(|id| resolve(scene, textures, id));

    match image {
        Some(asset_id) => scene.commands.push(DrawCommand::TexturedRect {
            rect: Rect::new(
                token.position.x - radius,
                token.position.y - radius,
                token.position.x + radius,
                token.position.y + radius,
            ),
            asset_id: asset_id.to_string(),
            rotation_deg: token.rotation_deg,
            flip_x: false,
            flip_y: false,
        }),
        // Color disc stands in until the art arrives (or forever, when
        // the token has none or its load failed).
        None => scene.commands.push(DrawCommand::FillCircle {
            center: token.position,
            radius,
            color: token.color.into(),
        }),
    }

    if selected {
        scene.commands.push(DrawCommand::StrokeCircle {
            center: token.position,
            radius: radius + 3.0,
            color: ctx.selection_color,
            width: 2.0,
        });
    }

    if token.hp_current < token.hp_max {
        push_hp_bar(scene, token, radius);
    }
}

fn push_hp_bar(scene: &mut Scene, token: &TokenRecord, radius: f64) {
    let width = radius * 2.0;
    let bar = Rect::new(
        token.position.x - radius,
        token.position.y - radius - 8.0,
        token.position.x + radius,
        token.position.y - radius - 4.0,
    );
    scene.commands.push(DrawCommand::FillRect {
        rect: bar,
        color: Color::from_rgba8(60, 60, 60, 220),
    });
    let fraction = (token.hp_current.max(0) as f64 / token.hp_max as f64).min(1.0);
    scene.commands.push(DrawCommand::FillRect {
        rect: Rect::new(bar.x0, bar.y0, bar.x0 + width * fraction, bar.y1),
        color: Color::from_rgba8(96, 190, 80, 255),
    });
}

/// True when the asset is ready to draw. Otherwise, kick off (and
/// record) a load the first time the asset is seen.
fn resolve(scene: &mut Scene, textures: &mut TextureCache, asset_id: &str) -> bool {
    if textures.ready(asset_id).is_some() {
        return true;
    }
    if let Some(ticket) = textures.request(asset_id) {
        scene.pending_loads.push(ticket);
    }
    false
}

fn cell_rect(mapper: &GridMapper, cell: GridCell) -> Rect {
    let origin = mapper.cell_origin(cell);
    Rect::new(
        origin.x,
        origin.y,
        origin.x + mapper.cell_size,
        origin.y + mapper.cell_size,
    )
}

fn with_alpha(color: Color, alpha: u8) -> Color {
    let [r, g, b, _] = color.to_rgba8().to_u8_array();
    Color::from_rgba8(r, g, b, alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;
    use kurbo::Size;
    use mapforge_core::{
        BoardEngine, MaterialDefinition, MaterialTextures, PlayerCharacter, RotationMode,
    };

    fn png_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 128, 0, 255]));
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn grass_material() -> MaterialDefinition {
        MaterialDefinition {
            id: "grass".to_string(),
            priority: 2,
            definition_index: 0,
            rotation_mode: RotationMode::Random90,
            no_overlay: false,
            textures: MaterialTextures {
                base: Some("grass".to_string()),
                edge: Some("grass_overlay".to_string()),
                ..MaterialTextures::default()
            },
        }
    }

    fn engine_with_tile() -> BoardEngine {
        let mut engine = BoardEngine::default();
        engine.set_viewport(Size::new(640.0, 480.0));
        engine.set_materials(vec![grass_material()]);
        engine.stamp_material(&[GridCell::new(0, 0)], "grass");
        engine
    }

    fn count_textured(scene: &Scene, asset: &str) -> usize {
        scene
            .commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::TexturedRect { asset_id, .. } if asset_id == asset))
            .count()
    }

    #[test]
    fn test_missing_textures_requested_once() {
        let engine = engine_with_tile();
        let ctx = RenderContext::new(&engine, Size::new(640.0, 480.0));
        let mut textures = TextureCache::new();

        let scene = build_scene(&ctx, &mut textures);
        let requested: Vec<&str> = scene
            .pending_loads
            .iter()
            .map(|t| t.asset_id.as_str())
            .collect();
        assert!(requested.contains(&"grass"));
        assert!(requested.contains(&"grass_overlay"));
        // The edge overlay appears on 4 neighbors but one ticket suffices
        assert_eq!(
            requested.iter().filter(|id| **id == "grass_overlay").count(),
            1
        );

        // Unready tile falls back to a placeholder fill
        assert_eq!(count_textured(&scene, "grass"), 0);
        assert!(scene
            .commands
            .iter()
            .any(|c| matches!(c, DrawCommand::FillRect { color, .. } if *color == TILE_PLACEHOLDER)));

        // Second frame: loads already pending, nothing new to fetch
        let scene = build_scene(&ctx, &mut textures);
        assert!(scene.pending_loads.is_empty());
    }

    #[test]
    fn test_ready_textures_drawn_with_transforms() {
        let engine = engine_with_tile();
        let ctx = RenderContext::new(&engine, Size::new(640.0, 480.0));
        let mut textures = TextureCache::new();

        let scene = build_scene(&ctx, &mut textures);
        for ticket in &scene.pending_loads {
            textures.complete(ticket, &png_bytes()).unwrap();
        }

        let scene = build_scene(&ctx, &mut textures);
        assert_eq!(count_textured(&scene, "grass"), 1);
        // One legacy edge per empty neighbor, rotated into place
        assert_eq!(count_textured(&scene, "grass_overlay"), 4);
        let rotations: Vec<f64> = scene
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::TexturedRect {
                    asset_id,
                    rotation_deg,
                    ..
                } if asset_id == "grass_overlay" => Some(*rotation_deg),
                _ => None,
            })
            .collect();
        for expected in [0.0, 90.0, 180.0, 270.0] {
            assert!(rotations.contains(&expected));
        }
    }

    #[test]
    fn test_tiles_drawn_before_grid_and_tokens() {
        let mut engine = engine_with_tile();
        engine.sync_roster(&[PlayerCharacter {
            id: "a".to_string(),
            name: "Alice".to_string(),
            color: None,
            token_asset_id: None,
        }]);
        let ctx = RenderContext::new(&engine, Size::new(640.0, 480.0));
        let mut textures = TextureCache::new();
        let scene = build_scene(&ctx, &mut textures);

        let tile_pos = scene
            .commands
            .iter()
            .position(|c| matches!(c, DrawCommand::FillRect { color, .. } if *color == TILE_PLACEHOLDER))
            .unwrap();
        let grid_pos = scene
            .commands
            .iter()
            .position(|c| matches!(c, DrawCommand::Line { .. }))
            .unwrap();
        let token_pos = scene
            .commands
            .iter()
            .position(|c| matches!(c, DrawCommand::FillCircle { radius, .. } if *radius > GRID_DOT_RADIUS))
            .unwrap();
        assert!(tile_pos < grid_pos);
        assert!(grid_pos < token_pos);
    }

    #[test]
    fn test_grid_hidden_when_toggled_off() {
        let mut engine = engine_with_tile();
        engine.grid_overlay_visible = false;
        let ctx = RenderContext::new(&engine, Size::new(640.0, 480.0));
        let scene = build_scene(&ctx, &mut TextureCache::new());
        assert!(!scene
            .commands
            .iter()
            .any(|c| matches!(c, DrawCommand::Line { .. })));
    }

    #[test]
    fn test_token_fallback_disc_until_art_ready() {
        let mut engine = BoardEngine::default();
        engine.set_viewport(Size::new(640.0, 480.0));
        engine.set_asset_library(vec![mapforge_core::AssetLibraryItem {
            id: "hero".to_string(),
            url: "https://assets.example/hero.png".to_string(),
        }]);
        engine.sync_roster(&[PlayerCharacter {
            id: "a".to_string(),
            name: "Alice".to_string(),
            color: None,
            token_asset_id: Some("hero".to_string()),
        }]);
        engine.grid_overlay_visible = false;

        let ctx = RenderContext::new(&engine, Size::new(640.0, 480.0));
        let mut textures = TextureCache::new();

        let scene = build_scene(&ctx, &mut textures);
        assert!(scene
            .commands
            .iter()
            .any(|c| matches!(c, DrawCommand::FillCircle { .. })));
        assert_eq!(count_textured(&scene, "hero"), 0);

        for ticket in &scene.pending_loads {
            textures.complete(ticket, &png_bytes()).unwrap();
        }
        let scene = build_scene(&ctx, &mut textures);
        assert_eq!(count_textured(&scene, "hero"), 1);
    }

    #[test]
    fn test_selected_token_gets_ring() {
        let mut engine = BoardEngine::default();
        engine.set_viewport(Size::new(640.0, 480.0));
        engine.sync_roster(&[PlayerCharacter {
            id: "a".to_string(),
            name: "Alice".to_string(),
            color: None,
            token_asset_id: None,
        }]);
        engine.select_token("a");

        let ctx = RenderContext::new(&engine, Size::new(640.0, 480.0));
        let scene = build_scene(&ctx, &mut TextureCache::new());
        assert!(scene
            .commands
            .iter()
            .any(|c| matches!(c, DrawCommand::StrokeCircle { .. })));
    }

    #[test]
    fn test_hp_bar_only_when_wounded() {
        let mut engine = BoardEngine::default();
        engine.set_viewport(Size::new(640.0, 480.0));
        engine.grid_overlay_visible = false;
        engine.sync_roster(&[PlayerCharacter {
            id: "a".to_string(),
            name: "Alice".to_string(),
            color: None,
            token_asset_id: None,
        }]);

        let ctx = RenderContext::new(&engine, Size::new(640.0, 480.0));
        let healthy = build_scene(&ctx, &mut TextureCache::new());
        let fills_healthy = healthy
            .commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::FillRect { .. }))
            .count();
        assert_eq!(fills_healthy, 0);

        engine.set_token_hp("a", 3, 10);
        let ctx = RenderContext::new(&engine, Size::new(640.0, 480.0));
        let wounded = build_scene(&ctx, &mut TextureCache::new());
        let fills_wounded = wounded
            .commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::FillRect { .. }))
            .count();
        assert_eq!(fills_wounded, 2);
    }
}
