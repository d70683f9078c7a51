//! Brush shape resolution: turning a gesture into a set of affected cells.

use crate::grid::{GridCell, GridMapper};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Squared world-space distance a freehand stroke must travel before a new
/// sample point is recorded. Bounds the point count of long strokes.
pub const STROKE_SAMPLE_DIST_SQ: f64 = 64.0;

/// Boundary tolerance for circle membership, so cells exactly on the
/// radius are included rather than flickering in and out.
const CIRCLE_EPSILON: f64 = 1e-9;

/// Shape of the active brush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrushMode {
    /// Paint the single cell under the pointer, cell by cell.
    #[default]
    Manual,
    /// Axis-aligned rectangle spanned by the start and current cell.
    Rect,
    /// Circle centered on the start cell through the current cell.
    Circle,
    /// Arbitrary lasso region traced by the pointer.
    Freehand,
}

/// Whether the brush places or erases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrushAction {
    #[default]
    Place,
    Erase,
}

/// What an erase pass removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EraseTarget {
    /// Remove the base material assignment (and its overlays).
    #[default]
    Base,
    /// Remove only overlay sprites anchored at the cells.
    Overlay,
}

/// Externally-supplied brush configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BrushConfig {
    pub mode: BrushMode,
    pub action: BrushAction,
    pub target: EraseTarget,
}

/// All cells in the inclusive axis-aligned box spanned by two cells,
/// row-major.
pub fn rect_cells(start: GridCell, current: GridCell) -> Vec<GridCell> {
    let (x0, x1) = (start.x.min(current.x), start.x.max(current.x));
    let (y0, y1) = (start.y.min(current.y), start.y.max(current.y));
    let mut cells = Vec::with_capacity(((x1 - x0 + 1) * (y1 - y0 + 1)) as usize);
    for y in y0..=y1 {
        for x in x0..=x1 {
            cells.push(GridCell::new(x, y));
        }
    }
    cells
}

/// All cells within the circle centered on `center` whose radius reaches
/// `edge`, measured in cell units. Boundary-inclusive.
pub fn circle_cells(center: GridCell, edge: GridCell) -> Vec<GridCell> {
    let dx = (edge.x - center.x) as f64;
    let dy = (edge.y - center.y) as f64;
    let r_sq = dx * dx + dy * dy;
    let reach = r_sq.sqrt().ceil() as i32;

    let mut cells = Vec::new();
    for y in (center.y - reach)..=(center.y + reach) {
        for x in (center.x - reach)..=(center.x + reach) {
            let cx = (x - center.x) as f64;
            let cy = (y - center.y) as f64;
            if cx * cx + cy * cy <= r_sq + CIRCLE_EPSILON {
                cells.push(GridCell::new(x, y));
            }
        }
    }
    cells
}

/// All cells whose center lies inside the closed polygon traced by a
/// freehand stroke. With fewer than three sample points the stroke is
/// degenerate and only `fallback` is returned.
pub fn freehand_cells(points: &[Point], mapper: &GridMapper, fallback: GridCell) -> Vec<GridCell> {
    if points.len() < 3 {
        return vec![fallback];
    }

    let (mut min_x, mut min_y) = (f64::MAX, f64::MAX);
    let (mut max_x, mut max_y) = (f64::MIN, f64::MIN);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    let lo = mapper.to_cell(Point::new(min_x, min_y));
    let hi = mapper.to_cell(Point::new(max_x, max_y));

    let mut cells = Vec::new();
    for y in lo.y..=hi.y {
        for x in lo.x..=hi.x {
            let cell = GridCell::new(x, y);
            if point_in_polygon(mapper.cell_center(cell), points) {
                cells.push(cell);
            }
        }
    }
    cells
}

/// Even-odd point-in-polygon test with a horizontal ray.
///
/// A perfectly horizontal edge would make the crossing denominator zero;
/// it is substituted with machine epsilon so the edge neither divides by
/// zero nor double-counts.
fn point_in_polygon(p: Point, polygon: &[Point]) -> bool {
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let mut denom = b.y - a.y;
            if denom == 0.0 {
                denom = f64::EPSILON;
            }
            let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / denom;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Accumulates world-space sample points during a freehand drag.
///
/// A new point is appended only once the pointer has moved
/// [`STROKE_SAMPLE_DIST_SQ`] away from the previous sample, keeping the
/// polygon size bounded on long strokes.
#[derive(Debug, Clone, Default)]
pub struct StrokeSampler {
    points: Vec<Point>,
}

impl StrokeSampler {
    /// Start a fresh stroke at the given point.
    pub fn begin(&mut self, p: Point) {
        self.points.clear();
        self.points.push(p);
    }

    /// Offer a new pointer position; records it if far enough from the
    /// last sample. Returns true when the point was kept.
    pub fn sample(&mut self, p: Point) -> bool {
        match self.points.last() {
            Some(last) => {
                let dx = p.x - last.x;
                let dy = p.y - last.y;
                if dx * dx + dy * dy >= STROKE_SAMPLE_DIST_SQ {
                    self.points.push(p);
                    true
                } else {
                    false
                }
            }
            None => {
                self.points.push(p);
                true
            }
        }
    }

    /// The sampled polyline so far.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Drop all samples.
    pub fn clear(&mut self) {
        self.points.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_inclusive() {
        let cells = rect_cells(GridCell::new(0, 0), GridCell::new(2, 1));
        assert_eq!(
            cells,
            vec![
                GridCell::new(0, 0),
                GridCell::new(1, 0),
                GridCell::new(2, 0),
                GridCell::new(0, 1),
                GridCell::new(1, 1),
                GridCell::new(2, 1),
            ]
        );
    }

    #[test]
    fn test_rect_reversed_corners() {
        let forward = rect_cells(GridCell::new(0, 0), GridCell::new(2, 1));
        let backward = rect_cells(GridCell::new(2, 1), GridCell::new(0, 0));
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_rect_single_cell() {
        let cells = rect_cells(GridCell::new(3, 3), GridCell::new(3, 3));
        assert_eq!(cells, vec![GridCell::new(3, 3)]);
    }

    #[test]
    fn test_circle_boundary_inclusion() {
        // Center (0,0), edge (3,0): radius 3
        let cells = circle_cells(GridCell::new(0, 0), GridCell::new(3, 0));
        assert!(cells.contains(&GridCell::new(3, 0)));
        assert!(cells.contains(&GridCell::new(0, 3)));
        // distance² = 8 < 9
        assert!(cells.contains(&GridCell::new(2, 2)));
        // distance² = 18 > 9
        assert!(!cells.contains(&GridCell::new(3, 3)));
    }

    #[test]
    fn test_circle_zero_radius() {
        let cells = circle_cells(GridCell::new(5, 5), GridCell::new(5, 5));
        assert_eq!(cells, vec![GridCell::new(5, 5)]);
    }

    #[test]
    fn test_circle_no_duplicates() {
        let cells = circle_cells(GridCell::new(0, 0), GridCell::new(4, 2));
        let mut sorted = cells.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), cells.len());
    }

    #[test]
    fn test_freehand_degenerate_stroke() {
        let mapper = GridMapper::new(64.0);
        let points = vec![Point::new(0.0, 0.0), Point::new(50.0, 0.0)];
        let cells = freehand_cells(&points, &mapper, GridCell::new(7, 7));
        assert_eq!(cells, vec![GridCell::new(7, 7)]);
    }

    #[test]
    fn test_freehand_square_lasso() {
        let mapper = GridMapper::new(64.0);
        // A square spanning cells (0,0)..(2,2) in world space
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(192.0, 0.0),
            Point::new(192.0, 192.0),
            Point::new(0.0, 192.0),
        ];
        let cells = freehand_cells(&points, &mapper, GridCell::new(0, 0));
        assert_eq!(cells.len(), 9);
        assert!(cells.contains(&GridCell::new(0, 0)));
        assert!(cells.contains(&GridCell::new(2, 2)));
        assert!(!cells.contains(&GridCell::new(3, 0)));
    }

    #[test]
    fn test_freehand_horizontal_edge_guard() {
        let mapper = GridMapper::new(64.0);
        // Polygon whose top edge passes exactly through a row of cell
        // centers; the degenerate-edge guard must not panic or miscount.
        let points = vec![
            Point::new(0.0, 32.0),
            Point::new(192.0, 32.0),
            Point::new(192.0, 160.0),
            Point::new(0.0, 160.0),
        ];
        let cells = freehand_cells(&points, &mapper, GridCell::new(0, 0));
        // Row y=1 centers (96.0) are strictly inside
        assert!(cells.contains(&GridCell::new(0, 1)));
        assert!(cells.contains(&GridCell::new(2, 1)));
    }

    #[test]
    fn test_point_in_polygon_triangle() {
        let tri = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(5.0, 10.0),
        ];
        assert!(point_in_polygon(Point::new(5.0, 3.0), &tri));
        assert!(!point_in_polygon(Point::new(0.5, 9.0), &tri));
    }

    #[test]
    fn test_sampler_threshold() {
        let mut sampler = StrokeSampler::default();
        sampler.begin(Point::new(0.0, 0.0));
        // Below threshold: 64.0 squared distance needed
        assert!(!sampler.sample(Point::new(4.0, 4.0)));
        assert_eq!(sampler.points().len(), 1);
        // At threshold
        assert!(sampler.sample(Point::new(8.0, 0.0)));
        assert_eq!(sampler.points().len(), 2);
    }

    #[test]
    fn test_sampler_begin_resets() {
        let mut sampler = StrokeSampler::default();
        sampler.begin(Point::new(0.0, 0.0));
        sampler.sample(Point::new(20.0, 0.0));
        sampler.begin(Point::new(1.0, 1.0));
        assert_eq!(sampler.points(), &[Point::new(1.0, 1.0)]);
    }
}
