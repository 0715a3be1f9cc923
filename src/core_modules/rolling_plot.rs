// THEORY:
// The `rolling_plot` module is the model behind the live trace chart: a
// fixed-width window of rendered line segments, not a ring buffer of raw
// values. While the window is filling, segments are appended left to right;
// once it is full, each new segment evicts the oldest one and every survivor
// is shifted one step left, so the chart scrolls with a constant on-screen
// duration.
//
// Key architectural principles:
// 1.  **Primitives, Not Samples**: What is stored is exactly what the display
//     draws. Eviction and reflow therefore reposition existing segments
//     instead of recomputing them from raw data.
// 2.  **Two-Point Feed**: Each advance consumes the previous and the newest
//     statistic value; the plot itself never reads the statistics log.
// 3.  **Axes Drawn Once**: The axis lines are produced on the first advance
//     and are never part of the scrolling window.

use std::collections::VecDeque;

/// One drawn line segment in plot coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotSegment {
    pub from: (f64, f64),
    pub to: (f64, f64),
}

impl PlotSegment {
    fn shift_x(&mut self, dx: f64) {
        self.from.0 += dx;
        self.to.0 += dx;
    }
}

/// Fixed-width scrolling line-chart model.
pub struct RollingPlot {
    x_plot_lim: f64,
    y_plot_lim: f64,
    step_size: f64,
    segments: VecDeque<PlotSegment>,
    axes: Vec<PlotSegment>,
    first_plot: bool,
    prev_x: f64,
    i_plot: f64,
}

impl RollingPlot {
    /// `x_plot_lim` is the window width in samples; `y_plot_lim` the value
    /// ceiling used for the vertical axis.
    pub fn new(x_plot_lim: usize, y_plot_lim: f64) -> Self {
        Self {
            x_plot_lim: x_plot_lim as f64,
            y_plot_lim,
            step_size: 1.0,
            segments: VecDeque::with_capacity(x_plot_lim),
            axes: Vec::new(),
            first_plot: true,
            prev_x: 0.0,
            i_plot: 0.0,
        }
    }

    /// The scrolling data segments, oldest first.
    pub fn segments(&self) -> impl Iterator<Item = &PlotSegment> {
        self.segments.iter()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// The static axis lines (empty until the first advance).
    pub fn axes(&self) -> &[PlotSegment] {
        &self.axes
    }

    /// Extends the trace from `prev_y` to `new_y`, evicting and reflowing
    /// once the window is full.
    pub fn advance(&mut self, prev_y: f64, new_y: f64) {
        if self.first_plot {
            self.axes.push(PlotSegment {
                from: (10.0, 0.0),
                to: (10.0, self.y_plot_lim),
            });
            self.axes.push(PlotSegment {
                from: (0.0, 10.0),
                to: (self.x_plot_lim, 10.0),
            });
            self.first_plot = false;
        }

        let new_x = self.i_plot;
        if self.i_plot >= self.x_plot_lim {
            self.segments.pop_front();
            for segment in &mut self.segments {
                segment.shift_x(-self.step_size);
            }
            self.prev_x -= self.step_size;
        }

        self.segments.push_back(PlotSegment {
            from: (self.prev_x, prev_y),
            to: (new_x, new_y),
        });
        self.prev_x = new_x;
        if self.i_plot < self.x_plot_lim {
            self.i_plot += self.step_size;
        }
    }
}
