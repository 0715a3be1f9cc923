// THEORY:
// The `session` module is the top-level API of the engine, the analog of a
// single loop iteration in the host application. Each call to `advance` is
// one complete transaction across every layer, always in the same order:
// navigation -> playback -> frame processing (movie, then camera) -> ROI
// gestures -> statistics -> plot. A region drawn in an iteration is
// statistic-logged in that same iteration.
//
// Key architectural principles:
// 1.  **One Iteration, One Call**: The host loop polls one event and reads
//     one camera frame, then hands both here. Nothing inside suspends or
//     waits; there is no second thread to coordinate with.
// 2.  **Injected Time**: The iteration timestamp comes in as an argument.
//     The debounce window, the FPS readout and the wall-clock overlay are
//     all deterministic under a scripted clock.
// 3.  **Errors Stay Inside**: A failed camera read or a failed encode is
//     logged and costs at most one iteration's camera path. Only an explicit
//     close event ends the loop.

use crate::core_modules::canvas::{CanvasModel, Point};
use crate::core_modules::frame_processor::{ChannelSelect, FrameProcessor};
use crate::core_modules::navigation::NavigationController;
use crate::core_modules::playback::{PlaybackEngine, PlaybackEvent, PlaybackMode};
use crate::core_modules::roi::{RoiSet, FULL_FRAME_NAME};
use crate::core_modules::roi_engine::{RoiEngine, GESTURE_DEBOUNCE_SECS};
use crate::core_modules::rolling_plot::{PlotSegment, RollingPlot};
use crate::core_modules::stats::StatsLogger;
use crate::core_modules::taxonomy::{SelectionPath, StimulusTaxonomy};
use crate::io::capture::{CapturedFrame, FrameSource, TtlSignal};
use crate::io::display::{
    AffordanceUpdate, DisplaySink, ImageKey, BTN_PAUSE, BTN_PLAY, BTN_SAVE_SNAPSHOT,
    BTN_SAVE_TRACE, BTN_START_EXPERIMENT, BTN_STOP, TEXT_POSITION, TEXT_TIME_ELAPSED,
    TEXT_TIME_TOTAL, TEXT_ZOOM,
};
use crate::io::events::{ControlValues, EventSource, InputEvent};
use crate::io::persistence::{PersistenceSink, SaveKind, SaveRequest};
use crate::recording;
use std::io::Write;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{error, info, warn};

/// Event key fed to the navigation layer when nothing navigable fired.
const NO_AFFORDANCE: &str = "";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("camera produced no frame during recording")]
    CaptureDropout,
    #[error("recording i/o failed: {0}")]
    RecordingIo(#[from] std::io::Error),
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Tunable session parameters, fixed for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Display size of the movie and camera panels.
    pub frame_size: (u32, u32),
    /// Display size of the stage light-path mirror.
    pub mirror_size: (u32, u32),
    /// Bounded event-poll timeout; effectively the idle loop rate.
    pub poll_timeout: Duration,
    /// Inter-event gap above which pointer events start a new gesture.
    pub gesture_debounce_secs: f64,
    /// Plot window width in samples.
    pub x_plot_lim: usize,
    /// Plot value ceiling.
    pub y_plot_lim: f64,
    /// Channel region statistics are sampled from.
    pub stat_channel: ChannelSelect,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_size: (650, 500),
            mirror_size: (200, 200),
            poll_timeout: Duration::from_millis(11),
            gesture_debounce_secs: GESTURE_DEBOUNCE_SECS,
            x_plot_lim: 500,
            y_plot_lim: 255.0,
            stat_channel: ChannelSelect::Green,
        }
    }
}

/// Injected time source for the loop.
pub trait Clock {
    fn now_secs(&mut self) -> f64;
}

/// Wall-clock implementation.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&mut self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// What one iteration asks the host loop to do next.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IterationOutcome {
    pub close_requested: bool,
    pub start_experiment: bool,
    pub save_snapshot: bool,
    pub save_trace: bool,
}

/// The assembled engine: every layer plus the state shared between them.
pub struct SessionPipeline {
    pub(crate) config: SessionConfig,
    pub(crate) taxonomy: StimulusTaxonomy,
    pub(crate) navigation: NavigationController,
    pub(crate) playback: PlaybackEngine,
    pub(crate) canvas: CanvasModel,
    pub(crate) rois: RoiSet,
    pub(crate) roi_engine: RoiEngine,
    pub(crate) processor: FrameProcessor,
    pub(crate) stats: StatsLogger,
    pub(crate) plot: RollingPlot,
    pub(crate) current_path: SelectionPath,
    pub(crate) last_camera_png: Option<Vec<u8>>,
    capture_failure_reported: bool,
}

impl SessionPipeline {
    pub fn new(config: SessionConfig, taxonomy: StimulusTaxonomy) -> Self {
        let navigation = NavigationController::new(taxonomy.affordances());
        Self {
            navigation,
            playback: PlaybackEngine::new(),
            canvas: CanvasModel::new(),
            rois: RoiSet::new(),
            roi_engine: RoiEngine::with_debounce(config.gesture_debounce_secs),
            processor: FrameProcessor::new(config.frame_size),
            stats: StatsLogger::new(),
            plot: RollingPlot::new(config.x_plot_lim, config.y_plot_lim),
            current_path: SelectionPath::new(),
            last_camera_png: None,
            capture_failure_reported: false,
            taxonomy,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stats(&self) -> &StatsLogger {
        &self.stats
    }

    pub fn rois(&self) -> &RoiSet {
        &self.rois
    }

    /// The padded three-key path from the most recent iteration.
    pub fn current_path(&self) -> &SelectionPath {
        &self.current_path
    }

    /// Runs one complete iteration transaction.
    pub fn advance(
        &mut self,
        event: &InputEvent,
        values: &ControlValues,
        camera_frame: Option<CapturedFrame>,
        now_secs: f64,
        display: &mut dyn DisplaySink,
    ) -> IterationOutcome {
        // Navigation: breadcrumb and affordance visibility.
        let event_key = match event {
            InputEvent::Affordance(key) => key.as_str(),
            _ => NO_AFFORDANCE,
        };
        let nav = self.navigation.handle(event_key, self.taxonomy.affordances());
        for affordance in self.taxonomy.affordances() {
            display.update_affordance(
                &affordance.key,
                AffordanceUpdate::visible(self.navigation.is_visible(&affordance.key)),
            );
        }
        self.current_path = nav.path;

        // Playback against the resolved selection.
        let playback_event = match event {
            InputEvent::Play => PlaybackEvent::Play,
            InputEvent::Pause => PlaybackEvent::Pause,
            InputEvent::Stop => PlaybackEvent::Stop,
            _ => PlaybackEvent::None,
        };
        let sequence = self.taxonomy.resolve(&self.current_path);
        let has_movie = sequence.is_some();
        let view = self
            .playback
            .tick(playback_event, &self.current_path, sequence, false);

        if view.renderable {
            if let Some(sequence) = sequence {
                match self.processor.render_movie_frame(sequence, view.frame_index) {
                    Ok(Some(png)) => display.update_image(ImageKey::Movie, png),
                    Ok(None) => {}
                    Err(error) => error!(%error, "movie frame encoding failed"),
                }
            }
        }
        display.update_text(TEXT_TIME_ELAPSED, &format!("{:04}", view.frame_index));
        display.update_text(TEXT_TIME_TOTAL, &format!("{:04}", view.total_frames));
        display.update_affordance(BTN_PLAY, AffordanceUpdate::enabled(view.play_enabled));
        let playing = view.mode == PlaybackMode::Playing;
        display.update_affordance(BTN_PLAY, AffordanceUpdate::visible(!playing));
        display.update_affordance(BTN_PAUSE, AffordanceUpdate::visible(playing));
        display.update_affordance(BTN_STOP, AffordanceUpdate::visible(playing));
        if playing {
            display.update_text(TEXT_POSITION, &format!("{:.4}", view.position));
        }

        // Camera path: zoom, overlays, gestures, statistics.
        match camera_frame.and_then(|frame| frame.to_image()) {
            Some(image) => {
                match self.processor.process_camera_frame(
                    image,
                    now_secs,
                    values.zoom,
                    true,
                    values.fps_overlay,
                    values.timestamp_overlay,
                ) {
                    Ok(processed) => {
                        display.update_image(ImageKey::Camera, processed.png.clone());
                        display.update_overlays(&processed.overlays);
                        display.update_text(TEXT_ZOOM, &processed.zoom_label);

                        match event {
                            InputEvent::CanvasDrag { x, y } => {
                                let frame_time = self.processor.last_frame_time();
                                self.roi_engine.handle_canvas_event(
                                    Point::new(*x, *y),
                                    frame_time,
                                    values.active_tool,
                                    &mut self.canvas,
                                    &mut self.rois,
                                );
                            }
                            InputEvent::ClearRois => {
                                self.roi_engine.clear(&mut self.canvas, &mut self.rois);
                            }
                            _ => {}
                        }

                        display.update_figures(self.canvas.figures());
                        self.processor.log_roi_statistics(
                            &processed.image,
                            &self.rois,
                            self.config.stat_channel,
                            &mut self.stats,
                        );
                        self.last_camera_png = Some(processed.png);
                        self.capture_failure_reported = false;
                    }
                    Err(error) => error!(%error, "camera frame processing failed"),
                }
            }
            None => {
                if !self.capture_failure_reported {
                    warn!("camera disconnected");
                    self.capture_failure_reported = true;
                }
            }
        }

        // ROI choice upkeep: a stale selection falls back to the full frame.
        let names = self.rois.names();
        let effective_choice = if names.iter().any(|name| name == &values.roi_choice) {
            values.roi_choice.clone()
        } else {
            FULL_FRAME_NAME.to_string()
        };
        display.update_roi_choices(&names, &effective_choice);

        // Plot: extend the trace from the two newest matching entries.
        if let Some((prev, new)) = self.stats.latest_pair(&effective_choice) {
            self.plot.advance(
                prev.statistic(values.roi_stat),
                new.statistic(values.roi_stat),
            );
            let segments: Vec<PlotSegment> = self.plot.segments().copied().collect();
            display.update_plot(self.plot.axes(), &segments);
        }

        // Quick-save and experiment affordances.
        let on_now = self.playback.active_selection().is_some();
        display.update_affordance(BTN_SAVE_SNAPSHOT, AffordanceUpdate::enabled(on_now));
        display.update_affordance(BTN_SAVE_TRACE, AffordanceUpdate::enabled(on_now));
        let save_dir_usable = values.save_dir.as_deref().is_some_and(|dir| dir.is_dir());
        let start_allowed = has_movie && (save_dir_usable || !values.record_enabled);
        display.update_affordance(BTN_START_EXPERIMENT, AffordanceUpdate::enabled(start_allowed));

        IterationOutcome {
            close_requested: matches!(event, InputEvent::CloseRequested),
            start_experiment: start_allowed && matches!(event, InputEvent::StartExperiment),
            save_snapshot: on_now && matches!(event, InputEvent::SaveSnapshot),
            save_trace: on_now && matches!(event, InputEvent::SaveTrace),
        }
    }
}

/// The host polling loop: one event poll and one camera read per iteration,
/// until the operator closes the session. Every per-iteration failure is
/// absorbed here; nothing short of the close event breaks the loop.
pub fn run_session(
    pipeline: &mut SessionPipeline,
    events: &mut dyn EventSource,
    capture: &mut dyn FrameSource,
    display: &mut dyn DisplaySink,
    persistence: &mut dyn PersistenceSink,
    ttl: &mut dyn TtlSignal,
    clock: &mut dyn Clock,
) {
    loop {
        let polled = events.poll(pipeline.config.poll_timeout);

        if let InputEvent::SelectCamera(port) = &polled.event {
            if let Err(error) = capture.open(*port) {
                warn!(%error, "camera switch refused");
            }
        }

        let frame = capture.read_frame();
        let now = clock.now_secs();
        let outcome = pipeline.advance(&polled.event, &polled.values, frame, now, display);

        if outcome.save_snapshot {
            if let Err(error) = quick_save(pipeline, persistence, &polled.values, SaveKind::Snapshot)
            {
                warn!(%error, "snapshot save failed");
            }
        }
        if outcome.save_trace {
            if let Err(error) = quick_save(pipeline, persistence, &polled.values, SaveKind::Trace) {
                warn!(%error, "trace save failed");
            }
        }
        if outcome.start_experiment {
            match recording::run_experiment(
                pipeline,
                events,
                capture,
                display,
                persistence,
                ttl,
                clock,
                &polled.values,
            ) {
                Ok(result) => info!(
                    frames = result.frames_captured,
                    cancelled = result.cancelled,
                    "experiment finished"
                ),
                Err(error) => error!(%error, "experiment aborted"),
            }
        }

        if outcome.close_requested {
            info!("session closed");
            break;
        }
    }
}

/// Writes a snapshot or trace through the persistence collaborator.
fn quick_save(
    pipeline: &SessionPipeline,
    persistence: &mut dyn PersistenceSink,
    values: &ControlValues,
    kind: SaveKind,
) -> Result<(), SessionError> {
    let stimulus = pipeline
        .playback
        .active_selection()
        .map(|path| path.identifier())
        .unwrap_or_default();
    let request = SaveRequest {
        root: values.save_dir.as_deref(),
        note: &values.note,
        stimulus: &stimulus,
        stim_stamp: values.stim_stamp,
        date_stamp: values.date_stamp,
        timestamp: pipeline.processor.timestamp(),
        kind,
    };
    let save = persistence.prepare(&request)?;
    match kind {
        SaveKind::Snapshot => {
            if let Some(png) = &pipeline.last_camera_png {
                persistence.write_bytes(&save.stem.with_extension("png"), png)?;
            }
        }
        SaveKind::Trace => {
            let mut log = persistence.open_log(&save.stem.with_extension("txt"))?;
            log.write_all(pipeline.stats.export_lines().as_bytes())?;
        }
        SaveKind::Experiment => {}
    }
    info!(stem = %save.stem.display(), "quick save written");
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core_modules::roi_engine::RoiTool;
    use crate::core_modules::taxonomy::tests::fixture_assets;
    use crate::io::capture::{LogTtl, SyntheticCapture};
    use crate::io::display::MemoryDisplay;
    use crate::io::events::{PolledInput, ScriptedEvents};
    use crate::io::persistence::FsPersistence;

    /// Deterministic clock stepping a fixed amount per read.
    pub(crate) struct StepClock {
        now: f64,
        step: f64,
    }

    impl StepClock {
        pub(crate) fn new(start: f64, step: f64) -> Self {
            Self { now: start, step }
        }
    }

    impl Clock for StepClock {
        fn now_secs(&mut self) -> f64 {
            self.now += self.step;
            self.now
        }
    }

    pub(crate) fn test_config() -> SessionConfig {
        SessionConfig {
            frame_size: (32, 24),
            mirror_size: (8, 8),
            x_plot_lim: 10,
            ..SessionConfig::default()
        }
    }

    pub(crate) fn test_pipeline() -> SessionPipeline {
        let taxonomy = StimulusTaxonomy::assemble(fixture_assets()).expect("assembles");
        SessionPipeline::new(test_config(), taxonomy)
    }

    fn camera_frame(capture: &mut SyntheticCapture) -> Option<CapturedFrame> {
        capture.read_frame()
    }

    #[test]
    fn a_drawn_roi_is_logged_in_the_same_iteration() {
        let mut pipeline = test_pipeline();
        let mut display = MemoryDisplay::new();
        let mut capture = SyntheticCapture::single(32, 24);
        let values = ControlValues {
            active_tool: Some(RoiTool::Rectangle),
            ..ControlValues::default()
        };

        let mut now = 1.0;
        for event in [
            InputEvent::Timeout,
            InputEvent::CanvasDrag { x: 2, y: 2 },
            InputEvent::CanvasDrag { x: 10, y: 8 },
        ] {
            now += 0.03;
            pipeline.advance(&event, &values, camera_frame(&mut capture), now, &mut display);
        }

        // The record exists and its statistics were appended this iteration.
        assert_eq!(pipeline.rois().names(), vec!["Full", "Rect 1"]);
        let last = pipeline.stats().entries().last().expect("entries");
        assert_eq!(last.roi_name, "Rect 1");
        assert_eq!(last.timestamp, pipeline.processor.last_frame_time());
    }

    #[test]
    fn navigation_play_renders_movie_frames() {
        let mut pipeline = test_pipeline();
        let mut display = MemoryDisplay::new();
        let mut capture = SyntheticCapture::single(32, 24);
        let values = ControlValues::default();

        let script = [
            InputEvent::Affordance("Naturalistic".into()),
            InputEvent::Affordance("Catcam".into()),
            InputEvent::Affordance("V1".into()),
            InputEvent::Play,
            InputEvent::Timeout,
        ];
        let mut now = 1.0;
        for event in script {
            now += 0.03;
            pipeline.advance(&event, &values, camera_frame(&mut capture), now, &mut display);
        }

        assert!(display.image_count(ImageKey::Movie) >= 3);
        assert_eq!(display.texts[TEXT_TIME_TOTAL], "0010");
        assert_eq!(display.is_visible(BTN_PAUSE), Some(true));
        assert_eq!(display.is_visible(BTN_PLAY), Some(false));
    }

    #[test]
    fn capture_failure_skips_camera_path_and_recovers() {
        let mut pipeline = test_pipeline();
        let mut display = MemoryDisplay::new();
        let values = ControlValues::default();

        pipeline.advance(&InputEvent::Timeout, &values, None, 1.0, &mut display);
        pipeline.advance(&InputEvent::Timeout, &values, None, 1.1, &mut display);
        assert_eq!(display.image_count(ImageKey::Camera), 0);
        assert!(pipeline.stats().is_empty());

        let mut capture = SyntheticCapture::single(32, 24);
        pipeline.advance(
            &InputEvent::Timeout,
            &values,
            capture.read_frame(),
            1.2,
            &mut display,
        );
        assert_eq!(display.image_count(ImageKey::Camera), 1);
        assert_eq!(pipeline.stats().len(), 1);
    }

    #[test]
    fn stale_roi_choice_falls_back_to_full() {
        let mut pipeline = test_pipeline();
        let mut display = MemoryDisplay::new();
        let mut capture = SyntheticCapture::single(32, 24);
        let values = ControlValues {
            roi_choice: "Rect 7".into(),
            ..ControlValues::default()
        };
        pipeline.advance(
            &InputEvent::Timeout,
            &values,
            capture.read_frame(),
            1.0,
            &mut display,
        );
        assert_eq!(display.selected_roi, FULL_FRAME_NAME);
    }

    #[test]
    fn plot_extends_once_history_is_deep_enough() {
        let mut pipeline = test_pipeline();
        let mut display = MemoryDisplay::new();
        let mut capture = SyntheticCapture::single(32, 24);
        let values = ControlValues::default();

        let mut now = 1.0;
        for _ in 0..5 {
            now += 0.03;
            pipeline.advance(
                &InputEvent::Timeout,
                &values,
                capture.read_frame(),
                now,
                &mut display,
            );
        }
        // Three entries are required before the first segment appears.
        assert!(display.plot_segment_count >= 1);
        assert_eq!(pipeline.plot.axes().len(), 2);
    }

    #[test]
    fn save_trace_exports_the_stats_log() {
        let root = tempfile::tempdir().expect("tempdir");
        let mut pipeline = test_pipeline();
        let mut display = MemoryDisplay::new();
        let mut capture = SyntheticCapture::single(32, 24);
        let mut persistence = FsPersistence;
        let mut ttl = LogTtl;
        let mut clock = StepClock::new(100.0, 0.03);
        let values = ControlValues {
            save_dir: Some(root.path().to_path_buf()),
            note: "trace-check".into(),
            record_enabled: false,
            ..ControlValues::default()
        };
        let script = [
            InputEvent::Affordance("Naturalistic".into()),
            InputEvent::Affordance("Catcam".into()),
            InputEvent::Affordance("V1".into()),
            InputEvent::Play,
            InputEvent::Timeout,
            InputEvent::SaveTrace,
            InputEvent::CloseRequested,
        ];
        let mut events = ScriptedEvents::new(
            script
                .into_iter()
                .map(|event| PolledInput {
                    event,
                    values: values.clone(),
                })
                .collect(),
        );

        run_session(
            &mut pipeline,
            &mut events,
            &mut capture,
            &mut display,
            &mut persistence,
            &mut ttl,
            &mut clock,
        );

        let experiment_dir = std::fs::read_dir(root.path())
            .expect("reads root")
            .next()
            .expect("experiment dir")
            .expect("dir entry")
            .path();
        let trace = std::fs::read_dir(&experiment_dir)
            .expect("reads dir")
            .filter_map(|entry| entry.ok())
            .find(|entry| entry.file_name().to_string_lossy().ends_with("_trace.txt"))
            .expect("trace file");
        let text = std::fs::read_to_string(trace.path()).expect("reads trace");
        // One "Full" entry per camera frame processed before the save fired.
        assert_eq!(text.lines().count(), 6);
        assert!(text.contains("Full"));
    }

    #[test]
    fn run_session_ends_only_on_close() {
        let mut pipeline = test_pipeline();
        let mut display = MemoryDisplay::new();
        let mut capture = SyntheticCapture::single(32, 24);
        let mut persistence = FsPersistence;
        let mut ttl = LogTtl;
        let mut clock = StepClock::new(0.0, 0.03);
        let mut events = ScriptedEvents::new(
            [
                InputEvent::Timeout,
                InputEvent::SelectCamera(0),
                InputEvent::Timeout,
                InputEvent::CloseRequested,
            ]
            .into_iter()
            .map(|event| PolledInput {
                event,
                values: ControlValues::default(),
            })
            .collect(),
        );

        run_session(
            &mut pipeline,
            &mut events,
            &mut capture,
            &mut display,
            &mut persistence,
            &mut ttl,
            &mut clock,
        );
        assert!(events.is_exhausted());
        assert_eq!(display.image_count(ImageKey::Camera), 4);
    }
}
