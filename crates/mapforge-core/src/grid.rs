//! Grid coordinate mapping between continuous world space and discrete cells.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Default edge length of one grid cell in world units.
pub const DEFAULT_CELL_SIZE: f64 = 64.0;

/// A discrete cell address on the board.
///
/// Cell (0,0) is centered at world (cell_size/2, cell_size/2); x grows
/// east, y grows south.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
}

impl GridCell {
    /// Create a cell address.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Pack both coordinates into a single integer key for O(1) map
    /// lookup without string allocation.
    pub const fn packed(self) -> u64 {
        ((self.x as u32 as u64) << 32) | (self.y as u32 as u64)
    }

    /// Inverse of [`GridCell::packed`].
    pub const fn from_packed(key: u64) -> Self {
        Self {
            x: (key >> 32) as u32 as i32,
            y: key as u32 as i32,
        }
    }

    /// Offset this cell by whole-cell deltas.
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Converts between world coordinates and cell addresses.
///
/// Pure value type; every method is side-effect free.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GridMapper {
    /// Edge length of one cell in world units.
    pub cell_size: f64,
}

impl Default for GridMapper {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
        }
    }
}

impl GridMapper {
    /// Create a mapper for the given cell size.
    pub const fn new(cell_size: f64) -> Self {
        Self { cell_size }
    }

    /// Map one world-space coordinate to a cell index.
    pub fn to_index(&self, v: f64) -> i32 {
        ((v - self.cell_size / 2.0) / self.cell_size).round() as i32
    }

    /// Map a world point to the cell containing it.
    pub fn to_cell(&self, p: Point) -> GridCell {
        GridCell::new(self.to_index(p.x), self.to_index(p.y))
    }

    /// World-space center of a cell.
    pub fn cell_center(&self, cell: GridCell) -> Point {
        Point::new(
            cell.x as f64 * self.cell_size + self.cell_size / 2.0,
            cell.y as f64 * self.cell_size + self.cell_size / 2.0,
        )
    }

    /// World-space top-left corner of a cell.
    pub fn cell_origin(&self, cell: GridCell) -> Point {
        Point::new(
            cell.x as f64 * self.cell_size,
            cell.y as f64 * self.cell_size,
        )
    }

    /// Snap a world point to the center of its cell.
    pub fn snap(&self, p: Point) -> Point {
        self.cell_center(self.to_cell(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_zero_center() {
        let mapper = GridMapper::new(64.0);
        let center = mapper.cell_center(GridCell::new(0, 0));
        assert_eq!(center, Point::new(32.0, 32.0));
        assert_eq!(mapper.to_cell(center), GridCell::new(0, 0));
    }

    #[test]
    fn test_to_cell_rounds_to_nearest_center() {
        let mapper = GridMapper::new(64.0);
        // Just inside cell (1,0): world x in [64, 128)
        assert_eq!(mapper.to_cell(Point::new(65.0, 10.0)), GridCell::new(1, 0));
        assert_eq!(mapper.to_cell(Point::new(127.0, 10.0)), GridCell::new(1, 0));
        // Negative space
        assert_eq!(mapper.to_cell(Point::new(-40.0, -40.0)), GridCell::new(-1, -1));
    }

    #[test]
    fn test_snap_roundtrip() {
        let mapper = GridMapper::new(64.0);
        let snapped = mapper.snap(Point::new(100.0, 200.0));
        assert_eq!(snapped, Point::new(96.0, 224.0));
        // Snapping an already-snapped point is stable
        assert_eq!(mapper.snap(snapped), snapped);
    }

    #[test]
    fn test_packed_roundtrip() {
        for cell in [
            GridCell::new(0, 0),
            GridCell::new(5, -7),
            GridCell::new(-1000, 1000),
            GridCell::new(i32::MAX, i32::MIN),
        ] {
            assert_eq!(GridCell::from_packed(cell.packed()), cell);
        }
    }

    #[test]
    fn test_packed_distinct() {
        // (x, y) and (y, x) must not collide
        assert_ne!(
            GridCell::new(1, 2).packed(),
            GridCell::new(2, 1).packed()
        );
    }
}
