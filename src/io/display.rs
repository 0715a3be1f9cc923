// THEORY:
// The `display` module is the output side of the GUI collaborator. The engine
// owns no display surface; it produces keyed updates — encoded images, text
// readouts, affordance visibility/enablement, plot primitives — and a real
// implementation maps each key onto a widget. `MemoryDisplay` records the
// stream instead, which is what the tests assert against.

use crate::core_modules::canvas::Figure;
use crate::core_modules::frame_processor::OverlayText;
use crate::core_modules::rolling_plot::PlotSegment;
use std::collections::HashMap;

/// The three image surfaces the engine renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKey {
    /// The stimulus movie panel.
    Movie,
    /// The live camera panel (the ROI canvas background).
    Camera,
    /// The stage light-path mirror.
    SmallScreen,
}

/// Text readout keys.
pub const TEXT_TIME_ELAPSED: &str = "time_elapsed";
pub const TEXT_TIME_TOTAL: &str = "time_total";
pub const TEXT_POSITION: &str = "position";
pub const TEXT_ZOOM: &str = "zoom_total";

/// Affordance keys for the fixed controls (navigation affordances use their
/// own taxonomy keys).
pub const BTN_PLAY: &str = "play";
pub const BTN_PAUSE: &str = "pause";
pub const BTN_STOP: &str = "stop";
pub const BTN_START_EXPERIMENT: &str = "start_experiment";
pub const BTN_CANCEL: &str = "cancel";
pub const BTN_RECORD: &str = "record";
pub const BTN_SAVE_SNAPSHOT: &str = "save_snapshot";
pub const BTN_SAVE_TRACE: &str = "save_trace";
pub const BTN_TOOL_RECT: &str = "tool_rect";
pub const BTN_TOOL_CIRCLE: &str = "tool_circle";
pub const BTN_TOOL_MOVE: &str = "tool_move";
pub const BTN_TOOL_MOVEALL: &str = "tool_moveall";
pub const BTN_TOOL_ERASE: &str = "tool_erase";
pub const BTN_CLEAR: &str = "clear";

/// Partial affordance change; `None` leaves that aspect alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AffordanceUpdate {
    pub visible: Option<bool>,
    pub enabled: Option<bool>,
}

impl AffordanceUpdate {
    pub fn visible(on: bool) -> Self {
        Self {
            visible: Some(on),
            enabled: None,
        }
    }

    pub fn enabled(on: bool) -> Self {
        Self {
            visible: None,
            enabled: Some(on),
        }
    }
}

/// Display collaborator: every update the engine emits per iteration.
pub trait DisplaySink {
    fn update_image(&mut self, key: ImageKey, png: Vec<u8>);
    fn update_overlays(&mut self, overlays: &[OverlayText]);
    fn update_text(&mut self, key: &str, text: &str);
    fn update_affordance(&mut self, key: &str, update: AffordanceUpdate);
    /// The shapes currently drawn over the camera panel.
    fn update_figures(&mut self, figures: &[Figure]);
    fn update_plot(&mut self, axes: &[PlotSegment], segments: &[PlotSegment]);
    fn update_roi_choices(&mut self, names: &[String], selected: &str);
}

/// Running state of one affordance as accumulated from partial updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct AffordanceState {
    pub visible: Option<bool>,
    pub enabled: Option<bool>,
}

/// Records every update for assertions; the reference sink for tests and the
/// headless runner.
#[derive(Default)]
pub struct MemoryDisplay {
    pub images: Vec<(ImageKey, usize)>,
    pub overlays: Vec<OverlayText>,
    pub texts: HashMap<String, String>,
    pub affordances: HashMap<String, AffordanceState>,
    pub figures: Vec<Figure>,
    pub plot_segment_count: usize,
    pub roi_choices: Vec<String>,
    pub selected_roi: String,
}

impl MemoryDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image_count(&self, key: ImageKey) -> usize {
        self.images.iter().filter(|(k, _)| *k == key).count()
    }

    pub fn is_visible(&self, key: &str) -> Option<bool> {
        self.affordances.get(key).and_then(|state| state.visible)
    }

    pub fn is_enabled(&self, key: &str) -> Option<bool> {
        self.affordances.get(key).and_then(|state| state.enabled)
    }
}

impl DisplaySink for MemoryDisplay {
    fn update_image(&mut self, key: ImageKey, png: Vec<u8>) {
        self.images.push((key, png.len()));
    }

    fn update_overlays(&mut self, overlays: &[OverlayText]) {
        self.overlays = overlays.to_vec();
    }

    fn update_text(&mut self, key: &str, text: &str) {
        self.texts.insert(key.to_string(), text.to_string());
    }

    fn update_affordance(&mut self, key: &str, update: AffordanceUpdate) {
        let state = self.affordances.entry(key.to_string()).or_default();
        if update.visible.is_some() {
            state.visible = update.visible;
        }
        if update.enabled.is_some() {
            state.enabled = update.enabled;
        }
    }

    fn update_figures(&mut self, figures: &[Figure]) {
        self.figures = figures.to_vec();
    }

    fn update_plot(&mut self, _axes: &[PlotSegment], segments: &[PlotSegment]) {
        self.plot_segment_count = segments.len();
    }

    fn update_roi_choices(&mut self, names: &[String], selected: &str) {
        self.roi_choices = names.to_vec();
        self.selected_roi = selected.to_string();
    }
}
