// THEORY:
// The `recording` module runs an experiment: a bounded sub-loop of one
// iteration per stimulus frame that grabs a camera frame, logs region
// statistics, and (when recording is enabled) writes one image plus one
// acquisition-log line per frame. While it runs, the ROI tools and save
// buttons are disabled so the region set cannot change under the recording.
//
// The disable/restore pair is a transaction: whatever happens inside —
// completion, operator cancel, a persistence failure, a camera dropout —
// the affordances come back and the hardware trigger drops before control
// returns to the session loop.

use crate::core_modules::frame_processor::FrameProcessor;
use crate::core_modules::playback::PlaybackEvent;
use crate::io::capture::{FrameSource, TtlSignal};
use crate::io::display::{
    AffordanceUpdate, DisplaySink, ImageKey, BTN_CANCEL, BTN_CLEAR, BTN_PLAY, BTN_RECORD,
    BTN_SAVE_SNAPSHOT, BTN_SAVE_TRACE, BTN_START_EXPERIMENT, BTN_TOOL_CIRCLE, BTN_TOOL_ERASE,
    BTN_TOOL_MOVE, BTN_TOOL_MOVEALL, BTN_TOOL_RECT,
};
use crate::io::events::{ControlValues, EventSource, InputEvent};
use crate::io::persistence::{PersistenceSink, SaveKind, SaveRequest};
use crate::session::{Clock, SessionError, SessionPipeline};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// How a finished (or abandoned) experiment went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExperimentOutcome {
    pub frames_captured: u32,
    pub cancelled: bool,
}

/// Runs one experiment as a transaction around the recording loop proper.
#[allow(clippy::too_many_arguments)]
pub fn run_experiment(
    pipeline: &mut SessionPipeline,
    events: &mut dyn EventSource,
    capture: &mut dyn FrameSource,
    display: &mut dyn DisplaySink,
    persistence: &mut dyn PersistenceSink,
    ttl: &mut dyn TtlSignal,
    clock: &mut dyn Clock,
    values: &ControlValues,
) -> Result<ExperimentOutcome, SessionError> {
    set_recording_affordances(display, true);

    let result = record(
        pipeline,
        events,
        capture,
        display,
        persistence,
        ttl,
        clock,
        values,
    );

    // The restore leg runs on every exit path.
    ttl.set(false);
    pipeline.playback.halt();
    set_recording_affordances(display, false);
    display.update_affordance(BTN_PLAY, AffordanceUpdate::visible(true));
    result
}

#[allow(clippy::too_many_arguments)]
fn record(
    pipeline: &mut SessionPipeline,
    events: &mut dyn EventSource,
    capture: &mut dyn FrameSource,
    display: &mut dyn DisplaySink,
    persistence: &mut dyn PersistenceSink,
    ttl: &mut dyn TtlSignal,
    clock: &mut dyn Clock,
    values: &ControlValues,
) -> Result<ExperimentOutcome, SessionError> {
    let path = pipeline.current_path.clone();
    let Some(sequence) = pipeline.taxonomy.resolve(&path) else {
        warn!("no stimulus selected; nothing to record");
        return Ok(ExperimentOutcome {
            frames_captured: 0,
            cancelled: false,
        });
    };
    let n_frames = sequence.total_frames();
    let stim_param = path.identifier();

    let mut stem: Option<PathBuf> = None;
    let mut log: Option<Box<dyn Write>> = None;
    if values.record_enabled {
        let request = SaveRequest {
            root: values.save_dir.as_deref(),
            note: &values.note,
            stimulus: &stim_param,
            stim_stamp: values.stim_stamp,
            date_stamp: values.date_stamp,
            timestamp: pipeline.processor.timestamp(),
            kind: SaveKind::Experiment,
        };
        let save = persistence.prepare(&request)?;
        log = Some(persistence.open_log(&save.stem.with_extension("txt"))?);
        stem = Some(save.stem);
    }

    ttl.set(true);
    info!(
        stimulus = %stim_param,
        frames = n_frames,
        record = values.record_enabled,
        "experiment started"
    );

    let mut cancelled = false;
    let mut frames_captured = 0u32;
    for i in 0..n_frames {
        let polled = events.poll(pipeline.config.poll_timeout);

        if values.play_with_experiment {
            pipeline
                .playback
                .tick(PlaybackEvent::Play, &path, Some(sequence), true);
            match pipeline.processor.render_movie_frame(sequence, i) {
                Ok(Some(png)) => display.update_image(ImageKey::Movie, png),
                Ok(None) => {}
                Err(err) => error!(%err, "movie frame encoding failed"),
            }
        }

        // The stage mirror follows the recording cursor whether or not the
        // operator display plays along.
        if let Some(png) =
            pipeline
                .processor
                .render_small_screen(sequence, i, pipeline.config.mirror_size)?
        {
            display.update_image(ImageKey::SmallScreen, png);
        }

        let frame = capture.read_frame().ok_or(SessionError::CaptureDropout)?;
        let image = frame.to_image().ok_or(SessionError::CaptureDropout)?;
        let now = clock.now_secs();
        let processed = pipeline.processor.process_camera_frame(
            image,
            now,
            values.zoom,
            false,
            values.fps_overlay,
            values.timestamp_overlay,
        )?;
        display.update_image(ImageKey::Camera, processed.png.clone());
        display.update_overlays(&processed.overlays);
        pipeline.processor.log_roi_statistics(
            &processed.image,
            &pipeline.rois,
            pipeline.config.stat_channel,
            &mut pipeline.stats,
        );

        if let (Some(log), Some(stem)) = (log.as_mut(), stem.as_ref()) {
            let frame_path = frame_file(stem, i);
            persistence.write_bytes(&frame_path, &processed.png)?;
            writeln!(
                log,
                "{} : {} : {}",
                frame_path.display(),
                stim_param,
                pipeline.processor.last_frame_time()
            )?;
        }
        frames_captured += 1;

        if matches!(polled.event, InputEvent::CancelExperiment) {
            info!("experiment cancelled");
            cancelled = true;
            break;
        }
    }

    display.update_image(
        ImageKey::SmallScreen,
        FrameProcessor::screen_off(pipeline.config.mirror_size)?,
    );
    Ok(ExperimentOutcome {
        frames_captured,
        cancelled,
    })
}

/// `stem` + `_0007.png` for frame 7.
fn frame_file(stem: &Path, index: u32) -> PathBuf {
    let mut name = stem
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(&format!("_{index:04}.png"));
    stem.with_file_name(name)
}

fn set_recording_affordances(display: &mut dyn DisplaySink, recording: bool) {
    const LOCKED_WHILE_RECORDING: [&str; 10] = [
        BTN_START_EXPERIMENT,
        BTN_RECORD,
        BTN_TOOL_RECT,
        BTN_TOOL_CIRCLE,
        BTN_TOOL_MOVE,
        BTN_TOOL_MOVEALL,
        BTN_TOOL_ERASE,
        BTN_CLEAR,
        BTN_SAVE_SNAPSHOT,
        BTN_SAVE_TRACE,
    ];
    for key in LOCKED_WHILE_RECORDING {
        display.update_affordance(key, AffordanceUpdate::enabled(!recording));
    }
    display.update_affordance(BTN_CANCEL, AffordanceUpdate::enabled(recording));
}
