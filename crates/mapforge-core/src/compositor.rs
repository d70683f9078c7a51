//! Tile compositing: material assignments and derived edge/corner
//! overlay sprites.
//!
//! Overlays are a pure function of the assignment map, the material set,
//! and the priority order; [`TileCompositor::rebuild_overlays`] recomputes
//! them from scratch after every edit so two engines given the same inputs
//! always agree. Per-cell base rotation is the one deliberately random
//! input and is tracked separately from the overlay list.

use crate::grid::GridCell;
use crate::material::{MaterialSet, RotationMode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Cardinal direction an edge overlay faces: the direction from its
/// anchor cell back toward the source cell that painted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All four cardinals in the fixed order used by the compositor.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Cell offset one step in this direction (y grows south).
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }
}

/// Diagonal corner direction, named from the source cell's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CornerDir {
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl CornerDir {
    pub const ALL: [CornerDir; 4] = [
        CornerDir::NorthEast,
        CornerDir::NorthWest,
        CornerDir::SouthEast,
        CornerDir::SouthWest,
    ];

    /// Cell offset to the diagonal neighbor.
    pub const fn delta(self) -> (i32, i32) {
        match self {
            CornerDir::NorthEast => (1, -1),
            CornerDir::NorthWest => (-1, -1),
            CornerDir::SouthEast => (1, 1),
            CornerDir::SouthWest => (-1, 1),
        }
    }

    /// The two cardinal edges adjacent to this corner.
    pub const fn edges(self) -> (Direction, Direction) {
        match self {
            CornerDir::NorthEast => (Direction::North, Direction::East),
            CornerDir::NorthWest => (Direction::North, Direction::West),
            CornerDir::SouthEast => (Direction::South, Direction::East),
            CornerDir::SouthWest => (Direction::South, Direction::West),
        }
    }
}

/// What kind of blending art an overlay sprite carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverlayKind {
    /// Edge art; the direction points from the anchor toward the source.
    Edge(Direction),
    /// Corner art at a diagonal neighbor.
    Corner(CornerDir),
}

/// Resolved texture for an overlay: an asset id plus the transform the
/// renderer applies to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayTexture {
    pub asset_id: String,
    /// Clockwise rotation in degrees, one of 0/90/180/270.
    pub rotation_deg: u16,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl OverlayTexture {
    fn plain(asset_id: &str) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            rotation_deg: 0,
            flip_x: false,
            flip_y: false,
        }
    }

    fn rotated(asset_id: &str, rotation_deg: u16) -> Self {
        Self {
            rotation_deg,
            ..Self::plain(asset_id)
        }
    }

    fn flipped(asset_id: &str, flip_x: bool, flip_y: bool) -> Self {
        Self {
            flip_x,
            flip_y,
            ..Self::plain(asset_id)
        }
    }
}

/// A derived blending sprite. Never hand-edited; fully regenerable from
/// the assignment map and material set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySprite {
    /// Cell the sprite is anchored at (a neighbor of the source cell).
    pub cell: GridCell,
    /// Material whose fringe art this sprite draws.
    pub source_material: String,
    pub kind: OverlayKind,
    /// `None` when the material has no usable texture for this slot; the
    /// renderer then simply omits the sprite.
    pub texture: Option<OverlayTexture>,
}

/// One occupied cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    pub cell: GridCell,
    pub material_id: String,
    /// Quarter-turn rotation of the base texture in degrees, rolled once
    /// at placement.
    pub base_rotation: u16,
}

/// Owns the assignment map and the derived overlay list.
#[derive(Debug)]
pub struct TileCompositor {
    tiles: HashMap<u64, TileRecord>,
    overlays: Vec<OverlaySprite>,
    /// Cells whose visuals changed since the host last drained them.
    dirty: HashSet<GridCell>,
    rng: StdRng,
}

impl Default for TileCompositor {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl TileCompositor {
    /// Create a compositor with a seeded rotation RNG, so tests (or hosts
    /// that want reproducible boards) get deterministic base rotations.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            tiles: HashMap::new(),
            overlays: Vec::new(),
            dirty: HashSet::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The material assigned to a cell, if any.
    pub fn material_at(&self, cell: GridCell) -> Option<&str> {
        self.tiles
            .get(&cell.packed())
            .map(|t| t.material_id.as_str())
    }

    /// The tile record for a cell, if occupied.
    pub fn tile_at(&self, cell: GridCell) -> Option<&TileRecord> {
        self.tiles.get(&cell.packed())
    }

    /// All occupied tiles in unspecified order.
    pub fn tiles(&self) -> impl Iterator<Item = &TileRecord> {
        self.tiles.values()
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Whether the board has no assignments.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// The current derived overlay list.
    pub fn overlays(&self) -> &[OverlaySprite] {
        &self.overlays
    }

    /// Drain the set of cells needing re-render.
    pub fn take_dirty(&mut self) -> Vec<GridCell> {
        self.dirty.drain().collect()
    }

    /// Assign a material to each cell, replacing any previous assignment.
    ///
    /// Reapplying the identical material to a cell is a no-op: no dirty
    /// marks and no rotation re-roll, so a held manual brush does no
    /// rebuild work. Returns true when any assignment actually changed.
    pub fn apply_material(
        &mut self,
        cells: &[GridCell],
        material_id: &str,
        materials: &MaterialSet,
    ) -> bool {
        let mut changed = false;
        for &cell in cells {
            if self.material_at(cell) == Some(material_id) {
                continue;
            }
            let base_rotation = self.roll_rotation(material_id, materials);
            self.tiles.insert(
                cell.packed(),
                TileRecord {
                    cell,
                    material_id: material_id.to_string(),
                    base_rotation,
                },
            );
            self.mark_dirty_neighborhood(cell);
            changed = true;
        }
        if changed {
            log::debug!("applied material {material_id} to {} cell(s)", cells.len());
        }
        changed
    }

    /// Remove base assignments from the given cells. Returns true when
    /// anything was removed.
    pub fn erase_base(&mut self, cells: &[GridCell]) -> bool {
        let mut changed = false;
        for &cell in cells {
            if self.tiles.remove(&cell.packed()).is_some() {
                self.mark_dirty_neighborhood(cell);
                changed = true;
            }
        }
        changed
    }

    /// Remove only overlay sprites anchored at the given cells, leaving
    /// assignments untouched.
    pub fn erase_overlays(&mut self, cells: &[GridCell]) {
        let victims: HashSet<u64> = cells.iter().map(|c| c.packed()).collect();
        let before = self.overlays.len();
        self.overlays.retain(|o| !victims.contains(&o.cell.packed()));
        if self.overlays.len() != before {
            for &cell in cells {
                self.dirty.insert(cell);
            }
        }
    }

    /// Replace the whole board from a persisted (cell, material id) list.
    /// Rotations are re-rolled; the caller rebuilds overlays afterwards.
    pub fn load_assignments(&mut self, pairs: &[(GridCell, String)], materials: &MaterialSet) {
        self.tiles.clear();
        self.overlays.clear();
        for (cell, material_id) in pairs {
            let base_rotation = self.roll_rotation(material_id, materials);
            self.tiles.insert(
                cell.packed(),
                TileRecord {
                    cell: *cell,
                    material_id: material_id.clone(),
                    base_rotation,
                },
            );
            self.mark_dirty_neighborhood(*cell);
        }
    }

    /// Recompute the full overlay list from scratch.
    ///
    /// Deterministic: tiles are visited in sorted key order and neighbor
    /// directions in a fixed order, so equal inputs yield equal output.
    pub fn rebuild_overlays(&mut self, materials: &MaterialSet) {
        self.overlays.clear();
        let mut corner_seen: HashSet<(String, u64, CornerDir)> = HashSet::new();

        let mut keys: Vec<u64> = self.tiles.keys().copied().collect();
        keys.sort_unstable();

        for key in keys {
            let (cell, material_id) = {
                let tile = &self.tiles[&key];
                (tile.cell, tile.material_id.clone())
            };

            // Cardinal edges first; corners depend on which edges landed.
            let mut covered = [false; 4];
            for (i, dir) in Direction::ALL.into_iter().enumerate() {
                let (dx, dy) = dir.delta();
                let neighbor = cell.offset(dx, dy);
                if materials.should_overlay(&material_id, self.material_at(neighbor)) {
                    covered[i] = true;
                    let facing = dir.opposite();
                    let texture = edge_texture(materials, &material_id, facing);
                    self.overlays.push(OverlaySprite {
                        cell: neighbor,
                        source_material: material_id.clone(),
                        kind: OverlayKind::Edge(facing),
                        texture,
                    });
                }
            }

            for corner in CornerDir::ALL {
                let (first, second) = corner.edges();
                let both_covered = covered[dir_index(first)] && covered[dir_index(second)];
                if !both_covered {
                    continue;
                }
                let (dx, dy) = corner.delta();
                let diagonal = cell.offset(dx, dy);
                if !materials.should_overlay(&material_id, self.material_at(diagonal)) {
                    continue;
                }
                // Two source cells may meet at the same diagonal; place
                // each (material, cell, corner) sprite once.
                if !corner_seen.insert((material_id.clone(), diagonal.packed(), corner)) {
                    continue;
                }
                let texture = corner_texture(materials, &material_id, corner);
                self.overlays.push(OverlaySprite {
                    cell: diagonal,
                    source_material: material_id.clone(),
                    kind: OverlayKind::Corner(corner),
                    texture,
                });
            }
        }

        log::trace!(
            "rebuilt overlays: {} tiles -> {} sprites",
            self.tiles.len(),
            self.overlays.len()
        );
    }

    fn roll_rotation(&mut self, material_id: &str, materials: &MaterialSet) -> u16 {
        match materials.get(material_id).map(|m| m.rotation_mode) {
            Some(RotationMode::Random90) | None => self.rng.random_range(0..4u16) * 90,
            Some(RotationMode::None) => 0,
        }
    }

    fn mark_dirty_neighborhood(&mut self, cell: GridCell) {
        self.dirty.insert(cell);
        for dir in Direction::ALL {
            let (dx, dy) = dir.delta();
            self.dirty.insert(cell.offset(dx, dy));
        }
    }
}

const fn dir_index(dir: Direction) -> usize {
    match dir {
        Direction::North => 0,
        Direction::East => 1,
        Direction::South => 2,
        Direction::West => 3,
    }
}

/// Non-empty texture slot accessor.
fn slot(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Pick the edge texture for a material and facing.
///
/// Preference order: the dedicated horizontal/vertical pair (applied via
/// flips), then the legacy single edge texture rotated into place.
fn edge_texture(materials: &MaterialSet, material_id: &str, facing: Direction) -> Option<OverlayTexture> {
    let textures = &materials.get(material_id)?.textures;
    if let (Some(h), Some(v)) = (slot(&textures.edge_horizontal), slot(&textures.edge_vertical)) {
        return Some(match facing {
            Direction::South => OverlayTexture::plain(h),
            Direction::North => OverlayTexture::flipped(h, false, true),
            Direction::East => OverlayTexture::plain(v),
            Direction::West => OverlayTexture::flipped(v, true, false),
        });
    }
    let edge = slot(&textures.edge)?;
    let rotation = match facing {
        Direction::South => 0,
        Direction::West => 90,
        Direction::North => 180,
        Direction::East => 270,
    };
    Some(OverlayTexture::rotated(edge, rotation))
}

/// Pick the corner texture for a material and corner direction.
///
/// Preference order: the four named corners when all are defined, then
/// the single rotatable corner, then the legacy horizontal/vertical pair
/// applied via mirroring.
fn corner_texture(
    materials: &MaterialSet,
    material_id: &str,
    corner: CornerDir,
) -> Option<OverlayTexture> {
    let textures = &materials.get(material_id)?.textures;
    if let (Some(ne), Some(nw), Some(se), Some(sw)) = (
        slot(&textures.corner_ne),
        slot(&textures.corner_nw),
        slot(&textures.corner_se),
        slot(&textures.corner_sw),
    ) {
        let asset = match corner {
            CornerDir::NorthEast => ne,
            CornerDir::NorthWest => nw,
            CornerDir::SouthEast => se,
            CornerDir::SouthWest => sw,
        };
        return Some(OverlayTexture::plain(asset));
    }
    if let Some(single) = slot(&textures.corner) {
        let rotation = match corner {
            CornerDir::NorthEast => 0,
            CornerDir::SouthEast => 90,
            CornerDir::SouthWest => 180,
            CornerDir::NorthWest => 270,
        };
        return Some(OverlayTexture::rotated(single, rotation));
    }
    // Legacy pair: horizontal art covers the north corners, vertical the
    // south corners; the west side of each is mirrored.
    match corner {
        CornerDir::NorthEast => slot(&textures.corner_horizontal)
            .map(|a| OverlayTexture::plain(a)),
        CornerDir::NorthWest => slot(&textures.corner_horizontal)
            .map(|a| OverlayTexture::flipped(a, true, false)),
        CornerDir::SouthEast => slot(&textures.corner_vertical)
            .map(|a| OverlayTexture::plain(a)),
        CornerDir::SouthWest => slot(&textures.corner_vertical)
            .map(|a| OverlayTexture::flipped(a, true, false)),
    }
}
