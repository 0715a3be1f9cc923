// THEORY:
// The `canvas` module is the figure registry for the camera view: every
// rectangle and circle the operator draws lives here as a `Figure` with a
// stable id. The display collaborator renders whatever this model holds; the
// gesture engine mutates it. Keeping the geometry in-process (instead of only
// inside a toolkit widget) is what lets erase gestures find the record that
// owns a shape.
//
// Key architectural principles:
// 1.  **Id-Stamped Figures**: Every drawn shape gets a monotonically
//     increasing id, the currency the ROI layer uses to link records to
//     shapes.
// 2.  **Point Hit-Testing**: `figures_at` answers "which shapes sit under the
//     pointer", the primitive behind Move and Erase targeting.
// 3.  **No Semantics**: The canvas knows rectangles and circles, not ROIs.
//     Which shapes are statistics sources is the ROI layer's business.

/// A 2-D canvas coordinate. Signed so drag deltas can move shapes through
/// and past the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

pub type FigureId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FigureShape {
    Rectangle { p1: Point, p2: Point },
    /// `radius` keeps the sign of the drag that produced it; hit-testing and
    /// rendering use its magnitude.
    Circle { center: Point, radius: i32 },
}

impl FigureShape {
    fn contains(&self, point: Point) -> bool {
        match self {
            FigureShape::Rectangle { p1, p2 } => {
                let (x1, x2) = (p1.x.min(p2.x), p1.x.max(p2.x));
                let (y1, y2) = (p1.y.min(p2.y), p1.y.max(p2.y));
                (x1..=x2).contains(&point.x) && (y1..=y2).contains(&point.y)
            }
            FigureShape::Circle { center, radius } => {
                let dx = (point.x - center.x) as i64;
                let dy = (point.y - center.y) as i64;
                let r = radius.unsigned_abs() as i64;
                dx * dx + dy * dy <= r * r
            }
        }
    }

    fn translate(&mut self, dx: i32, dy: i32) {
        match self {
            FigureShape::Rectangle { p1, p2 } => {
                p1.x += dx;
                p1.y += dy;
                p2.x += dx;
                p2.y += dy;
            }
            FigureShape::Circle { center, .. } => {
                center.x += dx;
                center.y += dy;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Figure {
    pub id: FigureId,
    pub shape: FigureShape,
}

/// Registry of every shape currently drawn over the camera view.
pub struct CanvasModel {
    figures: Vec<Figure>,
    /// A counter to ensure each new figure gets a unique id.
    next_id: FigureId,
}

impl CanvasModel {
    pub fn new() -> Self {
        Self {
            figures: Vec::new(),
            next_id: 0,
        }
    }

    pub fn figures(&self) -> &[Figure] {
        &self.figures
    }

    pub fn draw_rectangle(&mut self, p1: Point, p2: Point) -> FigureId {
        self.push(FigureShape::Rectangle { p1, p2 })
    }

    pub fn draw_circle(&mut self, center: Point, radius: i32) -> FigureId {
        self.push(FigureShape::Circle { center, radius })
    }

    fn push(&mut self, shape: FigureShape) -> FigureId {
        let id = self.next_id;
        self.next_id += 1;
        self.figures.push(Figure { id, shape });
        id
    }

    pub fn delete_figure(&mut self, id: FigureId) {
        self.figures.retain(|figure| figure.id != id);
    }

    pub fn move_figure(&mut self, id: FigureId, dx: i32, dy: i32) {
        if let Some(figure) = self.figures.iter_mut().find(|figure| figure.id == id) {
            figure.shape.translate(dx, dy);
        }
    }

    /// Translates every figure on the canvas, the MoveAll tool.
    pub fn move_all(&mut self, dx: i32, dy: i32) {
        for figure in &mut self.figures {
            figure.shape.translate(dx, dy);
        }
    }

    /// Ids of every figure whose shape contains `point`, in draw order.
    pub fn figures_at(&self, point: Point) -> Vec<FigureId> {
        self.figures
            .iter()
            .filter(|figure| figure.shape.contains(point))
            .map(|figure| figure.id)
            .collect()
    }

    /// Removes every figure.
    pub fn erase(&mut self) {
        self.figures.clear();
    }
}

impl Default for CanvasModel {
    fn default() -> Self {
        Self::new()
    }
}
