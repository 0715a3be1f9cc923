// THEORY:
// The `roi` module holds the semantic side of region annotation: the list of
// regions statistics are extracted from. A record here is a "dumb" tagged
// value; the gesture engine creates and removes records, the frame processor
// reads them.
//
// Key architectural principles:
// 1.  **Tagged Union**: A region is FullFrame, Rectangle or Circle. Statistic
//     extraction matches exhaustively on the variant instead of sniffing name
//     prefixes.
// 2.  **Permanent Slot Zero**: The list always starts with the FullFrame
//     record and nothing can remove it; the whole camera frame is always a
//     statistics source.
// 3.  **Figure Back-Reference**: Every drawn record remembers the canvas
//     figure it committed, so an erase gesture can take the record and the
//     shape down together. The FullFrame record owns no figure.
// 4.  **Index Naming**: Records are named by their current list position
//     ("Rect 2", "Circ 3"); the names feed the ROI-choice selector and the
//     statistics log.

use crate::core_modules::canvas::{FigureId, Point};

/// Name of the always-present whole-frame record.
pub const FULL_FRAME_NAME: &str = "Full";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoiShape {
    FullFrame,
    Rectangle { p1: Point, p2: Point },
    /// `center` is the drag start; `edge` the drag end. The radius is the
    /// distance between them.
    Circle { center: Point, edge: Point },
}

impl RoiShape {
    /// The gesture start point, used to collapse intermediate drag samples.
    fn start_point(&self) -> Option<Point> {
        match self {
            RoiShape::FullFrame => None,
            RoiShape::Rectangle { p1, .. } => Some(*p1),
            RoiShape::Circle { center, .. } => Some(*center),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoiRecord {
    pub shape: RoiShape,
    pub figure: Option<FigureId>,
}

/// The ordered region list; index is identity for naming.
pub struct RoiSet {
    records: Vec<RoiRecord>,
}

impl RoiSet {
    pub fn new() -> Self {
        Self {
            records: vec![RoiRecord {
                shape: RoiShape::FullFrame,
                figure: None,
            }],
        }
    }

    pub fn records(&self) -> &[RoiRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, shape: RoiShape, figure: Option<FigureId>) {
        self.records.push(RoiRecord { shape, figure });
    }

    /// Drops everything back to the lone FullFrame record.
    pub fn reset(&mut self) {
        self.records.truncate(1);
    }

    /// Removes every record whose committed figure is in `figures`. The
    /// FullFrame record has no figure and is never touched.
    pub fn remove_by_figures(&mut self, figures: &[FigureId]) {
        self.records
            .retain(|record| !record.figure.is_some_and(|id| figures.contains(&id)));
    }

    /// Intermediate drag samples each append a provisional record; once the
    /// last two share a start point only the newest survives.
    pub fn collapse_same_gesture(&mut self) {
        let n = self.records.len();
        if n > 2 {
            let last = self.records[n - 1].shape.start_point();
            let prior = self.records[n - 2].shape.start_point();
            if last.is_some() && last == prior {
                self.records.remove(n - 2);
            }
        }
    }

    /// Position-derived display name of the record at `index`.
    pub fn name_of(&self, index: usize) -> String {
        match self.records.get(index).map(|record| &record.shape) {
            Some(RoiShape::FullFrame) => FULL_FRAME_NAME.to_string(),
            Some(RoiShape::Rectangle { .. }) => format!("Rect {index}"),
            Some(RoiShape::Circle { .. }) => format!("Circ {index}"),
            None => String::new(),
        }
    }

    /// Current names in order, for the ROI-choice selector.
    pub fn names(&self) -> Vec<String> {
        (0..self.records.len()).map(|i| self.name_of(i)).collect()
    }
}

impl Default for RoiSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_full_frame_only() {
        let rois = RoiSet::new();
        assert_eq!(rois.len(), 1);
        assert_eq!(rois.names(), vec![FULL_FRAME_NAME]);
    }

    #[test]
    fn collapse_keeps_one_record_per_gesture() {
        let mut rois = RoiSet::new();
        let start = Point::new(5, 5);
        for end_x in [10, 20, 30] {
            rois.push(
                RoiShape::Rectangle {
                    p1: start,
                    p2: Point::new(end_x, 15),
                },
                Some(end_x as u64),
            );
            rois.collapse_same_gesture();
        }
        assert_eq!(rois.len(), 2);
        assert_eq!(
            rois.records()[1].shape,
            RoiShape::Rectangle {
                p1: start,
                p2: Point::new(30, 15),
            }
        );
    }

    #[test]
    fn distinct_starts_are_independent_records() {
        let mut rois = RoiSet::new();
        rois.push(
            RoiShape::Rectangle {
                p1: Point::new(0, 0),
                p2: Point::new(5, 5),
            },
            Some(1),
        );
        rois.collapse_same_gesture();
        rois.push(
            RoiShape::Circle {
                center: Point::new(50, 50),
                edge: Point::new(60, 50),
            },
            Some(2),
        );
        rois.collapse_same_gesture();
        assert_eq!(rois.len(), 3);
        assert_eq!(rois.names(), vec!["Full", "Rect 1", "Circ 2"]);
    }

    #[test]
    fn remove_by_figures_spares_full_frame() {
        let mut rois = RoiSet::new();
        rois.push(
            RoiShape::Rectangle {
                p1: Point::new(0, 0),
                p2: Point::new(5, 5),
            },
            Some(7),
        );
        rois.remove_by_figures(&[7, 99]);
        assert_eq!(rois.len(), 1);
        assert_eq!(rois.names(), vec![FULL_FRAME_NAME]);
    }

    #[test]
    fn reset_truncates_to_full_frame() {
        let mut rois = RoiSet::new();
        rois.push(
            RoiShape::Circle {
                center: Point::new(1, 1),
                edge: Point::new(4, 5),
            },
            Some(3),
        );
        rois.reset();
        assert_eq!(rois.len(), 1);
    }
}
