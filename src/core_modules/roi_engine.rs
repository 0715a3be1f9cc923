// THEORY:
// The `roi_engine` module turns a noisy pointer-event stream into region
// mutations. The stream delivers positions only; there is no reliable
// "button released" signal. The engine therefore delimits gestures by time: a
// pause longer than the debounce window means the previous gesture ended and
// a fresh one is starting.
//
// Key architectural principles:
// 1.  **Time-Delimited Gestures**: Every canvas event carries a timestamp
//     (injected, never read from a global clock, so tests are deterministic).
//     An inter-event gap above `GESTURE_DEBOUNCE_SECS` resets the drag state.
// 2.  **Capture At Drag Start**: The set of figures under the pointer is
//     sampled once, on the first event of a gesture. Move and Erase operate
//     on that captured set for the whole drag.
// 3.  **Preview By Delete-Then-Redraw**: While drawing, each event replaces
//     the previous provisional shape instead of accumulating; the last
//     preview of a gesture is the committed figure.
// 4.  **Provisional Records, Collapsed**: Each draw event also appends a
//     provisional ROI record; the record list collapses same-start
//     neighbours so a finished gesture leaves exactly one record, stamped
//     with the id of its committed figure.

use crate::core_modules::canvas::{CanvasModel, FigureId, Point};
use crate::core_modules::roi::{RoiSet, RoiShape};
use tracing::debug;

/// Maximum inter-event gap, in seconds, still counted as the same gesture.
pub const GESTURE_DEBOUNCE_SECS: f64 = 0.2;

/// The left-click tool selected in the ROI panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoiTool {
    Rectangle,
    Circle,
    Move,
    MoveAll,
    Erase,
}

/// Transient drag state; reset whenever the debounce window elapses.
#[derive(Debug, Default)]
struct GestureState {
    dragging: bool,
    start_point: Option<Point>,
    end_point: Option<Point>,
    last_point: Option<Point>,
    /// Figures under the pointer when the gesture began.
    target_figures: Vec<FigureId>,
    /// The provisional shape of an in-flight draw gesture.
    preview_figure: Option<FigureId>,
    last_event_time: f64,
}

/// Gesture state machine mutating the canvas and the ROI list.
pub struct RoiEngine {
    gesture: GestureState,
    debounce_secs: f64,
}

impl RoiEngine {
    pub fn new() -> Self {
        Self::with_debounce(GESTURE_DEBOUNCE_SECS)
    }

    pub fn with_debounce(debounce_secs: f64) -> Self {
        Self {
            gesture: GestureState::default(),
            debounce_secs,
        }
    }

    /// Feeds one pointer event at canvas position `position`, stamped
    /// `now_secs`, with the currently selected tool.
    pub fn handle_canvas_event(
        &mut self,
        position: Point,
        now_secs: f64,
        tool: Option<RoiTool>,
        canvas: &mut CanvasModel,
        rois: &mut RoiSet,
    ) {
        let elapsed = now_secs - self.gesture.last_event_time;
        self.gesture.last_event_time = now_secs;
        if elapsed > self.debounce_secs {
            // The stream never says "mouse up"; a long-enough pause is one.
            self.gesture.dragging = false;
            self.gesture.start_point = None;
            self.gesture.end_point = None;
            self.gesture.preview_figure = None;
        }

        if !self.gesture.dragging {
            self.gesture.dragging = true;
            self.gesture.start_point = Some(position);
            self.gesture.target_figures = canvas.figures_at(position);
            self.gesture.last_point = Some(position);
            debug!(?position, targets = self.gesture.target_figures.len(), "gesture start");
        } else {
            self.gesture.end_point = Some(position);
        }

        if let Some(preview) = self.gesture.preview_figure.take() {
            canvas.delete_figure(preview);
        }

        let last = self.gesture.last_point.unwrap_or(position);
        let (dx, dy) = (position.x - last.x, position.y - last.y);
        self.gesture.last_point = Some(position);

        if let (Some(start), Some(end)) = (self.gesture.start_point, self.gesture.end_point) {
            match tool {
                Some(RoiTool::Move) => {
                    for figure in self.gesture.target_figures.clone() {
                        canvas.move_figure(figure, dx, dy);
                    }
                }
                Some(RoiTool::MoveAll) => canvas.move_all(dx, dy),
                Some(RoiTool::Rectangle) => {
                    let figure = canvas.draw_rectangle(start, end);
                    self.gesture.preview_figure = Some(figure);
                    rois.push(RoiShape::Rectangle { p1: start, p2: end }, Some(figure));
                }
                Some(RoiTool::Circle) => {
                    let figure = canvas.draw_circle(start, end.x - start.x);
                    self.gesture.preview_figure = Some(figure);
                    rois.push(RoiShape::Circle { center: start, edge: end }, Some(figure));
                }
                Some(RoiTool::Erase) => {
                    for figure in &self.gesture.target_figures {
                        canvas.delete_figure(*figure);
                    }
                    rois.remove_by_figures(&self.gesture.target_figures);
                }
                None => {}
            }
        }

        rois.collapse_same_gesture();
    }

    /// The "Erase Everything" action: every figure and every record except
    /// the FullFrame entry goes away.
    pub fn clear(&mut self, canvas: &mut CanvasModel, rois: &mut RoiSet) {
        canvas.erase();
        rois.reset();
        self.gesture = GestureState::default();
    }
}

impl Default for RoiEngine {
    fn default() -> Self {
        Self::new()
    }
}
