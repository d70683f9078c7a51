//! The board engine and its pointer/keyboard gesture arbiter.
//!
//! One [`InteractionState`] variant is active per board at a time, keyed
//! to the pointer id that started it; events from other pointers are
//! ignored until the gesture resolves. All handlers become no-ops while
//! no viewport is attached, which tolerates dispose races during
//! teardown.

use crate::brush::{
    circle_cells, freehand_cells, rect_cells, BrushAction, BrushConfig, BrushMode, EraseTarget,
    StrokeSampler,
};
use crate::camera::Camera;
use crate::compositor::TileCompositor;
use crate::events::{EngineEvent, EventQueue};
use crate::grid::{GridCell, GridMapper};
use crate::material::{AssetLibrary, AssetLibraryItem, MaterialDefinition, MaterialSet};
use crate::tokens::{PlayerCharacter, TokenEngine};
use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};

/// Screen-space distance below which a press-and-release counts as a
/// click rather than a drag.
pub const CLICK_DRAG_THRESHOLD: f64 = 4.0;

/// Pointer identifier from the host windowing layer.
pub type PointerId = u64;

/// Pointer buttons the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// The single active gesture, if any.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionState {
    Idle,
    /// Middle-button camera pan.
    Panning {
        pointer: PointerId,
        last_screen: Point,
    },
    /// Painting or erasing tiles with the armed brush.
    Brushing {
        pointer: PointerId,
        /// Shape mode captured at gesture start; re-arming the brush
        /// mid-drag does not change how the stroke resolves.
        mode: BrushMode,
        start_cell: GridCell,
        current_cell: GridCell,
        /// Last cell a manual brush applied, for same-cell de-dup.
        last_applied: Option<GridCell>,
    },
    /// Rubber-band marquee selection.
    Selecting {
        pointer: PointerId,
        rect_start: Point,
        rect_current: Point,
        start_screen: Point,
        moved: bool,
    },
    /// Live-dragging a token body.
    DraggingToken {
        pointer: PointerId,
        token_id: String,
        preview_pos: Point,
        start_screen: Point,
        moved: bool,
    },
}

impl InteractionState {
    /// The pointer id owning the current gesture, if one is active.
    fn owner(&self) -> Option<PointerId> {
        match self {
            InteractionState::Idle => None,
            InteractionState::Panning { pointer, .. }
            | InteractionState::Brushing { pointer, .. }
            | InteractionState::Selecting { pointer, .. }
            | InteractionState::DraggingToken { pointer, .. } => Some(*pointer),
        }
    }

    /// The button that started the current gesture; only its release
    /// resolves the gesture. On a mouse every button shares one pointer
    /// id, so the pointer check alone cannot tell releases apart.
    fn initiating_button(&self) -> Option<PointerButton> {
        match self {
            InteractionState::Idle => None,
            InteractionState::Panning { .. } => Some(PointerButton::Middle),
            InteractionState::Brushing { .. }
            | InteractionState::Selecting { .. }
            | InteractionState::DraggingToken { .. } => Some(PointerButton::Primary),
        }
    }
}

/// A decorative asset stamped onto a single cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedProp {
    pub cell: GridCell,
    pub asset_id: String,
}

/// The armed brush tool: its configuration plus the material it paints
/// (irrelevant when erasing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmedBrush {
    pub config: BrushConfig,
    pub material_id: Option<String>,
}

/// The interactive board: owns all engine state and arbitrates gestures.
#[derive(Debug)]
pub struct BoardEngine {
    pub mapper: GridMapper,
    pub camera: Camera,
    pub compositor: TileCompositor,
    materials: MaterialSet,
    library: AssetLibrary,
    pub tokens: TokenEngine,
    props: Vec<PlacedProp>,

    armed_brush: Option<ArmedBrush>,
    pub grid_overlay_visible: bool,
    pub snap_to_grid: bool,

    state: InteractionState,
    sampler: StrokeSampler,
    events: EventQueue,
    /// `None` while the render surface is torn down; every handler
    /// no-ops in that window.
    viewport: Option<Size>,
}

impl Default for BoardEngine {
    fn default() -> Self {
        Self::new(GridMapper::default(), 0)
    }
}

impl BoardEngine {
    /// Create an engine with the given grid mapping and rotation seed.
    pub fn new(mapper: GridMapper, rotation_seed: u64) -> Self {
        Self {
            mapper,
            camera: Camera::new(),
            compositor: TileCompositor::with_seed(rotation_seed),
            materials: MaterialSet::default(),
            library: AssetLibrary::default(),
            tokens: TokenEngine::new(),
            props: Vec::new(),
            armed_brush: None,
            grid_overlay_visible: true,
            snap_to_grid: true,
            state: InteractionState::Idle,
            sampler: StrokeSampler::default(),
            events: EventQueue::default(),
            viewport: None,
        }
    }

    // --- host wiring ----------------------------------------------------

    /// Attach (or resize) the render surface.
    pub fn set_viewport(&mut self, size: Size) {
        self.viewport = Some(size);
    }

    /// Detach the render surface; handlers no-op until reattached.
    pub fn clear_viewport(&mut self) {
        self.viewport = None;
        self.reset_gesture();
    }

    /// Replace the asset library wholesale.
    pub fn set_asset_library(&mut self, items: Vec<AssetLibraryItem>) {
        self.library = AssetLibrary::new(items);
    }

    /// Replace the material set wholesale and rebuild all overlays.
    pub fn set_materials(&mut self, definitions: Vec<MaterialDefinition>) {
        self.materials = MaterialSet::new(definitions, &self.library);
        self.compositor.rebuild_overlays(&self.materials);
    }

    /// The current material set.
    pub fn materials(&self) -> &MaterialSet {
        &self.materials
    }

    /// The current asset library.
    pub fn library(&self) -> &AssetLibrary {
        &self.library
    }

    /// Reload the board from persisted (cell, material id) pairs.
    pub fn load_board(&mut self, pairs: &[(GridCell, String)]) {
        self.compositor.load_assignments(pairs, &self.materials);
        self.compositor.rebuild_overlays(&self.materials);
    }

    /// Reconcile tokens against the host roster.
    pub fn sync_roster(&mut self, roster: &[PlayerCharacter]) {
        if self.tokens.sync(roster, &self.library, &self.mapper) {
            self.notify_tokens_changed();
        }
    }

    /// Arm the brush tool. Placement without a material id paints
    /// nothing; erase ignores the material.
    pub fn arm_brush(&mut self, config: BrushConfig, material_id: Option<String>) {
        self.armed_brush = Some(ArmedBrush { config, material_id });
    }

    /// Disarm the brush, returning pointer presses to selection.
    pub fn disarm_brush(&mut self) {
        self.armed_brush = None;
    }

    /// Drain pending engine events.
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        self.events.take()
    }

    /// Advance token motion tweens. Returns true while anything moves.
    pub fn tick(&mut self, dt: f64) -> bool {
        self.tokens.tick(dt)
    }

    /// The current gesture state.
    pub fn interaction_state(&self) -> &InteractionState {
        &self.state
    }

    /// Placed decorative props.
    pub fn props(&self) -> &[PlacedProp] {
        &self.props
    }

    // --- pointer handlers -----------------------------------------------

    /// Handle a pointer press in screen coordinates.
    pub fn on_pointer_down(&mut self, pointer: PointerId, screen: Point, button: PointerButton) {
        if self.viewport.is_none() {
            return;
        }
        let world = self.camera.screen_to_world(screen);

        if button == PointerButton::Secondary {
            // Context menus are host chrome; gestures are unaffected.
            match self.tokens.token_at(world) {
                Some(token) => self.events.push(EngineEvent::TokenRightClicked {
                    token_id: token.id.clone(),
                    screen_pos: screen,
                }),
                None => self.events.push(EngineEvent::CloseContextMenu),
            }
            return;
        }

        // One gesture at a time: presses while a gesture is active are
        // ignored until it resolves.
        if self.state.owner().is_some() {
            return;
        }

        if button == PointerButton::Middle {
            self.state = InteractionState::Panning {
                pointer,
                last_screen: screen,
            };
            return;
        }

        if let Some(token) = self.tokens.token_at(world) {
            let token_id = token.id.clone();
            self.tokens.stop_motion(&token_id);
            self.state = InteractionState::DraggingToken {
                pointer,
                token_id,
                preview_pos: world,
                start_screen: screen,
                moved: false,
            };
        } else if let Some(mode) = self.armed_brush.as_ref().map(|b| b.config.mode) {
            let cell = self.mapper.to_cell(world);
            let mut last_applied = None;
            match mode {
                BrushMode::Manual => {
                    self.apply_brush(&[cell]);
                    last_applied = Some(cell);
                }
                BrushMode::Freehand => self.sampler.begin(world),
                _ => {}
            }
            self.state = InteractionState::Brushing {
                pointer,
                mode,
                start_cell: cell,
                current_cell: cell,
                last_applied,
            };
        } else {
            self.state = InteractionState::Selecting {
                pointer,
                rect_start: world,
                rect_current: world,
                start_screen: screen,
                moved: false,
            };
        }
    }

    /// Handle pointer movement in screen coordinates.
    pub fn on_pointer_move(&mut self, pointer: PointerId, screen: Point) {
        if self.viewport.is_none() || self.state.owner() != Some(pointer) {
            return;
        }
        let world = self.camera.screen_to_world(screen);
        // Deferred past the match so the state borrow has ended.
        let mut manual_cell = None;

        match &mut self.state {
            InteractionState::Idle => {}
            InteractionState::Panning { last_screen, .. } => {
                let delta = kurbo::Vec2::new(screen.x - last_screen.x, screen.y - last_screen.y);
                *last_screen = screen;
                self.camera.pan(delta);
            }
            InteractionState::Brushing {
                mode,
                current_cell,
                last_applied,
                ..
            } => {
                let cell = self.mapper.to_cell(world);
                *current_cell = cell;
                match mode {
                    BrushMode::Manual => {
                        if *last_applied != Some(cell) {
                            *last_applied = Some(cell);
                            manual_cell = Some(cell);
                        }
                    }
                    BrushMode::Freehand => {
                        self.sampler.sample(world);
                    }
                    _ => {}
                }
            }
            InteractionState::Selecting {
                rect_current,
                start_screen,
                moved,
                ..
            } => {
                *rect_current = world;
                if screen.distance(*start_screen) > CLICK_DRAG_THRESHOLD {
                    *moved = true;
                }
            }
            InteractionState::DraggingToken {
                preview_pos,
                start_screen,
                moved,
                ..
            } => {
                *preview_pos = world;
                if screen.distance(*start_screen) > CLICK_DRAG_THRESHOLD {
                    *moved = true;
                }
            }
        }

        if let Some(cell) = manual_cell {
            self.apply_brush(&[cell]);
        }
    }

    /// Handle a pointer release. Only the button that started the
    /// gesture resolves it; the release position is irrelevant, as all
    /// gestures resolve from the state accumulated during moves.
    pub fn on_pointer_up(&mut self, pointer: PointerId, _screen: Point, button: PointerButton) {
        if self.viewport.is_none() || self.state.owner() != Some(pointer) {
            return;
        }
        if self.state.initiating_button() != Some(button) {
            return;
        }
        let state = std::mem::replace(&mut self.state, InteractionState::Idle);

        match state {
            InteractionState::Idle | InteractionState::Panning { .. } => {}
            InteractionState::Brushing {
                mode,
                start_cell,
                current_cell,
                ..
            } => {
                let cells = match mode {
                    BrushMode::Rect => rect_cells(start_cell, current_cell),
                    BrushMode::Circle => circle_cells(start_cell, current_cell),
                    BrushMode::Freehand => {
                        freehand_cells(self.sampler.points(), &self.mapper, current_cell)
                    }
                    // Manual applied during the drag
                    BrushMode::Manual => Vec::new(),
                };
                self.sampler.clear();
                if !cells.is_empty() {
                    self.apply_brush(&cells);
                }
            }
            InteractionState::Selecting {
                rect_start,
                rect_current,
                moved,
                ..
            } => {
                if moved {
                    let rect = Rect::from_points(rect_start, rect_current);
                    let ids: Vec<String> = self
                        .tokens
                        .tokens()
                        .iter()
                        .filter(|t| rect.contains(t.position))
                        .map(|t| t.id.clone())
                        .collect();
                    self.tokens.select_many(&ids);
                } else {
                    self.tokens.clear_selection();
                }
            }
            InteractionState::DraggingToken {
                token_id,
                preview_pos,
                moved,
                ..
            } => {
                if moved {
                    let destination = if self.snap_to_grid {
                        self.mapper.snap(preview_pos)
                    } else {
                        preview_pos
                    };
                    self.tokens.command_move(&token_id, destination);
                } else {
                    // A click on the body selects the token.
                    self.tokens.select_one(&token_id);
                }
            }
        }
    }

    /// Handle pointer capture loss or cancellation.
    pub fn on_pointer_cancel(&mut self, pointer: PointerId) {
        if self.state.owner() == Some(pointer) {
            self.reset_gesture();
        }
    }

    /// Handle a wheel event; independent of any active gesture.
    pub fn on_wheel(&mut self, screen: Point, wheel_delta: f64) {
        if self.viewport.is_none() {
            return;
        }
        self.camera.zoom_wheel(screen, wheel_delta);
    }

    /// Escape pressed: abandon any pending gesture.
    pub fn on_escape(&mut self) {
        self.reset_gesture();
    }

    /// Window lost focus: abandon any pending gesture.
    pub fn on_blur(&mut self) {
        self.reset_gesture();
    }

    fn reset_gesture(&mut self) {
        self.state = InteractionState::Idle;
        self.sampler.clear();
    }

    // --- previews for the renderer --------------------------------------

    /// Cells the buffered (non-manual) brush would affect on release.
    pub fn brush_preview(&self) -> Vec<GridCell> {
        let InteractionState::Brushing {
            mode,
            start_cell,
            current_cell,
            ..
        } = self.state
        else {
            return Vec::new();
        };
        match mode {
            BrushMode::Rect => rect_cells(start_cell, current_cell),
            BrushMode::Circle => circle_cells(start_cell, current_cell),
            BrushMode::Freehand => {
                freehand_cells(self.sampler.points(), &self.mapper, current_cell)
            }
            BrushMode::Manual => Vec::new(),
        }
    }

    /// The live marquee rectangle in world coordinates, when selecting.
    pub fn selection_rect(&self) -> Option<Rect> {
        match self.state {
            InteractionState::Selecting {
                rect_start,
                rect_current,
                moved: true,
                ..
            } => Some(Rect::from_points(rect_start, rect_current)),
            _ => None,
        }
    }

    /// The dragged token and its ghost position, when dragging.
    pub fn drag_preview(&self) -> Option<(&str, Point)> {
        match &self.state {
            InteractionState::DraggingToken {
                token_id,
                preview_pos,
                moved: true,
                ..
            } => Some((token_id.as_str(), *preview_pos)),
            _ => None,
        }
    }

    // --- discrete commands ----------------------------------------------

    /// Stamp a material onto cells directly (host command path).
    pub fn stamp_material(&mut self, cells: &[GridCell], material_id: &str) {
        if self
            .compositor
            .apply_material(cells, material_id, &self.materials)
        {
            self.compositor.rebuild_overlays(&self.materials);
        }
    }

    /// Erase cells directly (host command path).
    pub fn erase_cells(&mut self, cells: &[GridCell], target: EraseTarget) {
        match target {
            EraseTarget::Base => {
                if self.compositor.erase_base(cells) {
                    self.compositor.rebuild_overlays(&self.materials);
                }
            }
            EraseTarget::Overlay => self.compositor.erase_overlays(cells),
        }
    }

    /// Place a single decorative asset at the cell under a screen point.
    /// Unknown asset ids are rejected; success is announced to the host.
    pub fn place_asset(&mut self, screen: Point, asset_id: &str) -> bool {
        if self.viewport.is_none() || !self.library.contains(asset_id) {
            return false;
        }
        let cell = self.mapper.to_cell(self.camera.screen_to_world(screen));
        self.props.push(PlacedProp {
            cell,
            asset_id: asset_id.to_string(),
        });
        self.events.push(EngineEvent::AssetPlaced {
            cell,
            asset_id: asset_id.to_string(),
        });
        true
    }

    /// Select a single token by id.
    pub fn select_token(&mut self, id: &str) {
        self.tokens.select_one(id);
    }

    /// Replace the selection with the given ids.
    pub fn select_tokens(&mut self, ids: &[String]) {
        self.tokens.select_many(ids);
    }

    /// Delete a token.
    pub fn delete_token(&mut self, id: &str) {
        if self.tokens.delete(id) {
            self.notify_tokens_changed();
        }
    }

    /// Duplicate a token one cell east; returns the new id.
    pub fn duplicate_token(&mut self, id: &str) -> Option<String> {
        let new_id = self.tokens.duplicate(id, &self.mapper)?;
        self.notify_tokens_changed();
        Some(new_id)
    }

    /// Rename a token.
    pub fn rename_token(&mut self, id: &str, name: &str) {
        if self.tokens.rename(id, name) {
            self.notify_tokens_changed();
        }
    }

    /// Set a token's hit points.
    pub fn set_token_hp(&mut self, id: &str, current: i32, max: i32) {
        self.tokens.set_hp(id, current, max);
    }

    // --- internals ------------------------------------------------------

    fn apply_brush(&mut self, cells: &[GridCell]) {
        let Some(brush) = self.armed_brush.clone() else {
            return;
        };
        match brush.config.action {
            BrushAction::Place => {
                let Some(material_id) = brush.material_id.as_deref() else {
                    return;
                };
                if self
                    .compositor
                    .apply_material(cells, material_id, &self.materials)
                {
                    self.compositor.rebuild_overlays(&self.materials);
                }
            }
            BrushAction::Erase => match brush.config.target {
                EraseTarget::Base => {
                    if self.compositor.erase_base(cells) {
                        self.compositor.rebuild_overlays(&self.materials);
                    }
                }
                EraseTarget::Overlay => self.compositor.erase_overlays(cells),
            },
        }
    }

    fn notify_tokens_changed(&mut self) {
        self.events.push(EngineEvent::TokensChanged(self.tokens.summaries()));
    }
}
