// THEORY:
// The `events` module is the operator-input side of the GUI collaborator.
// Each loop iteration performs exactly one bounded-timeout poll that yields
// the event that fired (or a timeout) together with a snapshot of the whole
// control surface — checkbox, slider and selector states. The engine never
// reaches into widgets; it only ever sees these two values.

use crate::core_modules::roi_engine::RoiTool;
use crate::core_modules::stats::RoiStatistic;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

/// The discrete event that fired this iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// The poll timed out with nothing to report; the loop still runs.
    Timeout,
    /// A navigation affordance was clicked, identified by its key.
    Affordance(String),
    Play,
    Pause,
    Stop,
    /// Pointer event on the camera canvas at the given canvas position.
    CanvasDrag { x: i32, y: i32 },
    /// The "Erase Everything" button.
    ClearRois,
    SelectCamera(usize),
    SaveSnapshot,
    SaveTrace,
    StartExperiment,
    CancelExperiment,
    CloseRequested,
}

/// Snapshot of the control surface, sampled once per poll.
#[derive(Debug, Clone)]
pub struct ControlValues {
    pub zoom: u32,
    pub fps_overlay: bool,
    pub timestamp_overlay: bool,
    /// Whether the experiment loop writes frames and log lines to disk.
    pub record_enabled: bool,
    /// Whether the stimulus plays on the operator display during recording.
    pub play_with_experiment: bool,
    /// Include the stimulus identifier in save-file names.
    pub stim_stamp: bool,
    /// Include the date stamp in save-file names.
    pub date_stamp: bool,
    pub save_dir: Option<PathBuf>,
    pub note: String,
    pub active_tool: Option<RoiTool>,
    pub roi_choice: String,
    pub roi_stat: RoiStatistic,
}

impl Default for ControlValues {
    fn default() -> Self {
        Self {
            zoom: 1,
            fps_overlay: true,
            timestamp_overlay: true,
            record_enabled: true,
            play_with_experiment: true,
            stim_stamp: true,
            date_stamp: true,
            save_dir: None,
            note: String::new(),
            active_tool: None,
            roi_choice: crate::core_modules::roi::FULL_FRAME_NAME.to_string(),
            roi_stat: RoiStatistic::Mean,
        }
    }
}

/// One poll result: the event plus the control snapshot.
#[derive(Debug, Clone)]
pub struct PolledInput {
    pub event: InputEvent,
    pub values: ControlValues,
}

/// Operator-input collaborator. A real implementation wraps a GUI toolkit's
/// bounded-timeout read.
pub trait EventSource {
    fn poll(&mut self, timeout: Duration) -> PolledInput;
}

/// Replays a fixed script of inputs, then reports timeouts; the reference
/// implementation for tests and the headless demo runner.
pub struct ScriptedEvents {
    queue: VecDeque<PolledInput>,
    idle_values: ControlValues,
}

impl ScriptedEvents {
    pub fn new(inputs: Vec<PolledInput>) -> Self {
        Self {
            queue: inputs.into(),
            idle_values: ControlValues::default(),
        }
    }

    /// Builds a script from bare events, all sharing default control values.
    pub fn from_events(events: Vec<InputEvent>) -> Self {
        Self::new(
            events
                .into_iter()
                .map(|event| PolledInput {
                    event,
                    values: ControlValues::default(),
                })
                .collect(),
        )
    }

    /// The control snapshot reported once the script is exhausted.
    pub fn set_idle_values(&mut self, values: ControlValues) {
        self.idle_values = values;
    }

    pub fn is_exhausted(&self) -> bool {
        self.queue.is_empty()
    }
}

impl EventSource for ScriptedEvents {
    fn poll(&mut self, _timeout: Duration) -> PolledInput {
        self.queue.pop_front().unwrap_or_else(|| PolledInput {
            event: InputEvent::Timeout,
            values: self.idle_values.clone(),
        })
    }
}
