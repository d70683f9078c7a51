//! Token lifecycle, selection, and motion.

use crate::grid::{GridCell, GridMapper};
use crate::material::AssetLibrary;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Movement speed for commanded token motion, in world units per second.
pub const TOKEN_SPEED: f64 = 320.0;

/// Default token radius in world units (half a default cell).
pub const DEFAULT_TOKEN_RADIUS: f64 = 28.0;

/// Token scale bounds.
pub const MIN_TOKEN_SCALE: f64 = 0.25;
pub const MAX_TOKEN_SCALE: f64 = 4.0;

/// RGBA8 display color for a token ring/disc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Default for TokenColor {
    fn default() -> Self {
        Self {
            r: 200,
            g: 200,
            b: 200,
            a: 255,
        }
    }
}

impl From<TokenColor> for peniko::Color {
    fn from(c: TokenColor) -> Self {
        peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
    }
}

/// A roster entry supplied by the host (the campaign's character list).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerCharacter {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<TokenColor>,
    #[serde(default)]
    pub token_asset_id: Option<String>,
}

/// A movable game piece on the board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: String,
    pub name: String,
    pub position: Point,
    pub radius: f64,
    pub color: TokenColor,
    pub image_asset: Option<String>,
    pub hp_current: i32,
    pub hp_max: i32,
    pub rotation_deg: f64,
    pub scale: f64,
    /// Destination of an in-flight move tween, if any.
    pub move_target: Option<Point>,
}

impl TokenRecord {
    /// Effective hit radius in world units.
    pub fn hit_radius(&self) -> f64 {
        self.radius * self.scale
    }

    /// Whether a world point falls on the token body.
    pub fn contains(&self, p: Point) -> bool {
        let dx = p.x - self.position.x;
        let dy = p.y - self.position.y;
        let r = self.hit_radius();
        dx * dx + dy * dy <= r * r
    }
}

/// Lightweight token listing pushed to the host on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSummary {
    pub id: String,
    pub name: String,
}

/// Owns the token list and the selection set.
#[derive(Debug, Default)]
pub struct TokenEngine {
    tokens: Vec<TokenRecord>,
    /// Selected token ids in selection order; the first is primary.
    selection: Vec<String>,
}

impl TokenEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// All managed tokens in creation order.
    pub fn tokens(&self) -> &[TokenRecord] {
        &self.tokens
    }

    /// Look up a token by id.
    pub fn get(&self, id: &str) -> Option<&TokenRecord> {
        self.tokens.iter().find(|t| t.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut TokenRecord> {
        self.tokens.iter_mut().find(|t| t.id == id)
    }

    /// Current selection, primary first.
    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    /// Whether the given token is selected.
    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.iter().any(|s| s == id)
    }

    /// Topmost token whose body contains the world point. Later tokens
    /// render on top and win ties.
    pub fn token_at(&self, p: Point) -> Option<&TokenRecord> {
        self.tokens.iter().rev().find(|t| t.contains(p))
    }

    /// Summaries for the host's token list.
    pub fn summaries(&self) -> Vec<TokenSummary> {
        self.tokens
            .iter()
            .map(|t| TokenSummary {
                id: t.id.clone(),
                name: t.name.clone(),
            })
            .collect()
    }

    /// Reconcile managed tokens against the host roster by id.
    ///
    /// Missing ids are created at deterministic default slots (successive
    /// cells of row 0 in roster order), survivors keep their transform but
    /// take the roster's current name/color/image, and tokens whose id
    /// left the roster are destroyed. The selection is filtered to
    /// surviving ids. Returns true when the token set or any display
    /// field changed.
    pub fn sync(
        &mut self,
        roster: &[PlayerCharacter],
        library: &AssetLibrary,
        mapper: &GridMapper,
    ) -> bool {
        let mut changed = false;

        let before = self.tokens.len();
        self.tokens
            .retain(|t| roster.iter().any(|pc| pc.id == t.id));
        changed |= self.tokens.len() != before;

        for (index, pc) in roster.iter().enumerate() {
            let name = resolve_name(pc, index);
            let image_asset = pc
                .token_asset_id
                .as_deref()
                .filter(|id| library.contains(id))
                .map(str::to_string);
            let color = pc.color.unwrap_or_default();

            if let Some(token) = self.get_mut(&pc.id) {
                if token.name != name || token.color != color || token.image_asset != image_asset {
                    token.name = name;
                    token.color = color;
                    token.image_asset = image_asset;
                    changed = true;
                }
            } else {
                let slot = GridCell::new(index as i32, 0);
                self.tokens.push(TokenRecord {
                    id: pc.id.clone(),
                    name,
                    position: mapper.cell_center(slot),
                    radius: DEFAULT_TOKEN_RADIUS,
                    color,
                    image_asset,
                    hp_current: 10,
                    hp_max: 10,
                    rotation_deg: 0.0,
                    scale: 1.0,
                    move_target: None,
                });
                changed = true;
            }
        }

        let selected_before = self.selection.len();
        let live: Vec<&str> = self.tokens.iter().map(|t| t.id.as_str()).collect();
        self.selection.retain(|id| live.contains(&id.as_str()));
        changed |= self.selection.len() != selected_before;

        if changed {
            log::debug!("token sync: {} token(s) after reconcile", self.tokens.len());
        }
        changed
    }

    /// Command a token to glide toward a target, cancelling any in-flight
    /// tween first.
    pub fn command_move(&mut self, id: &str, target: Point) {
        if let Some(token) = self.get_mut(id) {
            token.move_target = Some(target);
        }
    }

    /// Halt a token's motion tween where it stands.
    pub fn stop_motion(&mut self, id: &str) {
        if let Some(token) = self.get_mut(id) {
            token.move_target = None;
        }
    }

    /// Place a token directly, bypassing the tween.
    pub fn set_position(&mut self, id: &str, position: Point) {
        if let Some(token) = self.get_mut(id) {
            token.position = position;
            token.move_target = None;
        }
    }

    /// Advance every moving token by `dt` seconds at [`TOKEN_SPEED`],
    /// clamping the final step so a token lands exactly on its target and
    /// never overshoots. Returns true while anything is still moving.
    pub fn tick(&mut self, dt: f64) -> bool {
        let mut moving = false;
        for token in &mut self.tokens {
            let Some(target) = token.move_target else {
                continue;
            };
            let dx = target.x - token.position.x;
            let dy = target.y - token.position.y;
            let distance = (dx * dx + dy * dy).sqrt();
            let step = TOKEN_SPEED * dt;
            if step >= distance || distance <= f64::EPSILON {
                token.position = target;
                token.move_target = None;
            } else {
                token.position.x += dx / distance * step;
                token.position.y += dy / distance * step;
                moving = true;
            }
        }
        moving
    }

    /// Rotate the primary (first) selected token.
    pub fn rotate_primary(&mut self, delta_deg: f64) {
        let Some(id) = self.selection.first().cloned() else {
            return;
        };
        if let Some(token) = self.get_mut(&id) {
            token.rotation_deg = (token.rotation_deg + delta_deg).rem_euclid(360.0);
        }
    }

    /// Scale the primary (first) selected token, clamped to
    /// [[`MIN_TOKEN_SCALE`], [`MAX_TOKEN_SCALE`]].
    pub fn scale_primary(&mut self, factor: f64) {
        let Some(id) = self.selection.first().cloned() else {
            return;
        };
        if let Some(token) = self.get_mut(&id) {
            token.scale = (token.scale * factor).clamp(MIN_TOKEN_SCALE, MAX_TOKEN_SCALE);
        }
    }

    /// Set a token's hit points. Max is clamped to at least 1 and current
    /// to [0, max].
    pub fn set_hp(&mut self, id: &str, current: i32, max: i32) {
        if let Some(token) = self.get_mut(id) {
            token.hp_max = max.max(1);
            token.hp_current = current.clamp(0, token.hp_max);
        }
    }

    /// Rename a token. Returns true when the token exists.
    pub fn rename(&mut self, id: &str, name: &str) -> bool {
        match self.get_mut(id) {
            Some(token) => {
                token.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Duplicate a token one cell to the east with a fresh id and a
    /// "<name> Copy" label. Returns the new id.
    pub fn duplicate(&mut self, id: &str, mapper: &GridMapper) -> Option<String> {
        let source = self.get(id)?.clone();
        let mut new_id = Uuid::new_v4().to_string();
        // v4 collisions are vanishingly rare, but ids are host-visible
        // and must be unique, so regenerate until clear.
        while self.get(&new_id).is_some() {
            new_id = Uuid::new_v4().to_string();
        }
        let copy = TokenRecord {
            id: new_id.clone(),
            name: format!("{} Copy", source.name),
            position: Point::new(source.position.x + mapper.cell_size, source.position.y),
            move_target: None,
            ..source
        };
        self.tokens.push(copy);
        Some(new_id)
    }

    /// Destroy a token and drop it from the selection. Returns true when
    /// the token existed.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.tokens.len();
        self.tokens.retain(|t| t.id != id);
        self.selection.retain(|s| s != id);
        self.tokens.len() != before
    }

    /// Select exactly one token.
    pub fn select_one(&mut self, id: &str) {
        if self.get(id).is_some() {
            self.selection = vec![id.to_string()];
        }
    }

    /// Replace the selection with the given ids, dropping unknowns.
    pub fn select_many(&mut self, ids: &[String]) {
        self.selection = ids
            .iter()
            .filter(|id| self.get(id).is_some())
            .cloned()
            .collect();
    }

    /// Clear the selection.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }
}

/// Roster names may resolve blank; substitute a generated placeholder.
fn resolve_name(pc: &PlayerCharacter, index: usize) -> String {
    let trimmed = pc.name.trim();
    if trimmed.is_empty() {
        format!("Player {}", index + 1)
    } else {
        trimmed.to_string()
    }
}
