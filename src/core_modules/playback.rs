// THEORY:
// The `playback` module is the frame-index state machine for the stimulus
// movie. It owns the cursor into the current `FrameSequence` and the
// Stopped/Playing/Paused mode, and it is the only place either is allowed to
// change.
//
// Key architectural principles:
// 1.  **One Tick, One Transition**: The host loop calls `tick` exactly once
//     per iteration with whatever control event fired. Everything the rest of
//     the iteration needs (index, totals, mode, render guard) comes back in a
//     single `PlaybackView`.
// 2.  **Selection Resets Everything**: Switching stimuli always restarts at
//     frame zero. The engine detects the switch by comparing the selection it
//     armed on play against the one handed in this tick.
// 3.  **Implicit Infinite Loop**: Walking past the last frame wraps the cursor
//     to zero instead of stopping; a movie plays until told otherwise.
// 4.  **Render Guard**: A frame is rendered only while the cursor is inside
//     the sequence. Outside it the counters zero out and the play affordance
//     is disabled, signalling "nothing to play" without an error.

use crate::core_modules::frame_store::FrameSequence;
use crate::core_modules::taxonomy::SelectionPath;
use tracing::debug;

/// Keeps the playback-position ratio finite when a sequence has one frame.
const POSITION_EPSILON: f64 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMode {
    Stopped,
    Playing,
    Paused,
}

/// The control event that fired this iteration, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Play,
    Pause,
    Stop,
    /// Plain tick with no transport control.
    None,
}

/// Snapshot of the engine handed to the frame processor and the indicators.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackView {
    pub frame_index: u32,
    pub total_frames: u32,
    pub mode: PlaybackMode,
    /// True while `frame_index` addresses a real frame of a real selection.
    pub renderable: bool,
    /// Mirrors `renderable`; the play affordance is usable only with a movie.
    pub play_enabled: bool,
    /// Position ratio for the playback slider, in `[0, 1]`.
    pub position: f64,
}

/// Frame-index state machine over Stopped/Playing/Paused.
pub struct PlaybackEngine {
    frame_index: u32,
    total_frames: u32,
    mode: PlaybackMode,
    active_selection: Option<SelectionPath>,
}

impl PlaybackEngine {
    pub fn new() -> Self {
        Self {
            frame_index: 0,
            total_frames: 0,
            mode: PlaybackMode::Stopped,
            active_selection: None,
        }
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    /// The selection playback was last armed on, used for save-file naming.
    pub fn active_selection(&self) -> Option<&SelectionPath> {
        self.active_selection.as_ref()
    }

    /// Stops playback without touching the cursor; the next tick's guard
    /// logic owns any reset.
    pub fn halt(&mut self) {
        self.mode = PlaybackMode::Stopped;
    }

    /// Runs one transition against the currently selected sequence.
    /// `external_control` suppresses the internal advance so an experiment
    /// loop can step the cursor itself.
    pub fn tick(
        &mut self,
        event: PlaybackEvent,
        selection: &SelectionPath,
        sequence: Option<&FrameSequence>,
        external_control: bool,
    ) -> PlaybackView {
        let renderable;
        match sequence {
            Some(sequence) if self.frame_index <= sequence.total_frames() => {
                self.total_frames = sequence.total_frames();
                renderable = true;
            }
            _ => {
                self.frame_index = 0;
                self.total_frames = 0;
                renderable = false;
            }
        }

        let selection_changed = self
            .active_selection
            .as_ref()
            .is_some_and(|armed| armed != selection);
        match event {
            PlaybackEvent::Pause => self.mode = PlaybackMode::Paused,
            PlaybackEvent::Stop => self.mode = PlaybackMode::Stopped,
            _ => {}
        }
        if selection_changed {
            debug!("selection changed under playback");
            self.mode = PlaybackMode::Stopped;
        }

        // The frame rendered this tick is the pre-advance cursor; the advance
        // lands on the next tick's render.
        let frame_index = self.frame_index;
        let mut position = 0.0;
        if event == PlaybackEvent::Play || self.mode == PlaybackMode::Playing {
            self.active_selection = Some(selection.clone());
            self.mode = PlaybackMode::Playing;
            position = frame_index as f64 / (self.total_frames as f64 + POSITION_EPSILON);
            if !external_control {
                self.frame_index += 1;
            }
        }

        if event == PlaybackEvent::Stop || self.frame_index > self.total_frames || selection_changed
        {
            self.frame_index = 0;
        }

        PlaybackView {
            frame_index,
            total_frames: self.total_frames,
            mode: self.mode,
            renderable,
            play_enabled: renderable,
            position,
        }
    }
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::frame_store::{FrameSequence, FrameShape};

    fn sequence(frame_count: usize) -> FrameSequence {
        let shape = FrameShape {
            width: 2,
            height: 2,
        };
        FrameSequence::new(shape, vec![vec![0u8; shape.byte_len()]; frame_count])
            .expect("valid frames")
    }

    fn path() -> SelectionPath {
        SelectionPath::from_keys(["Naturalistic", "Catcam", "V1"])
    }

    #[test]
    fn play_advances_and_wraps_past_the_end() {
        // Eleven frames: total_frames == 10.
        let seq = sequence(11);
        let mut engine = PlaybackEngine::new();

        let mut indices = Vec::new();
        for _ in 0..11 {
            let view = engine.tick(PlaybackEvent::Play, &path(), Some(&seq), false);
            assert_eq!(view.total_frames, 10);
            indices.push(view.frame_index);
        }
        assert_eq!(indices, (0..=10).collect::<Vec<u32>>());

        // Twelfth tick: the cursor walked past the last frame and wraps.
        let view = engine.tick(PlaybackEvent::None, &path(), Some(&seq), false);
        assert_eq!(view.frame_index, 0);
        assert_eq!(view.mode, PlaybackMode::Playing);
    }

    #[test]
    fn index_invariant_holds_after_any_transition() {
        let seq = sequence(4);
        let mut engine = PlaybackEngine::new();
        let script = [
            PlaybackEvent::Play,
            PlaybackEvent::Play,
            PlaybackEvent::Pause,
            PlaybackEvent::Play,
            PlaybackEvent::None,
            PlaybackEvent::Stop,
            PlaybackEvent::Play,
            PlaybackEvent::None,
            PlaybackEvent::None,
            PlaybackEvent::None,
            PlaybackEvent::None,
        ];
        for event in script {
            let view = engine.tick(event, &path(), Some(&seq), false);
            assert!(view.frame_index <= view.total_frames);
        }
    }

    #[test]
    fn pause_holds_the_cursor() {
        let seq = sequence(8);
        let mut engine = PlaybackEngine::new();
        engine.tick(PlaybackEvent::Play, &path(), Some(&seq), false);
        engine.tick(PlaybackEvent::Play, &path(), Some(&seq), false);
        let paused = engine.tick(PlaybackEvent::Pause, &path(), Some(&seq), false);
        assert_eq!(paused.mode, PlaybackMode::Paused);
        let held = engine.tick(PlaybackEvent::None, &path(), Some(&seq), false);
        assert_eq!(held.frame_index, paused.frame_index);
    }

    #[test]
    fn stop_resets_the_cursor() {
        let seq = sequence(8);
        let mut engine = PlaybackEngine::new();
        for _ in 0..3 {
            engine.tick(PlaybackEvent::Play, &path(), Some(&seq), false);
        }
        // The stop tick still shows the held frame; the reset lands next tick.
        let view = engine.tick(PlaybackEvent::Stop, &path(), Some(&seq), false);
        assert_eq!(view.frame_index, 3);
        assert_eq!(view.mode, PlaybackMode::Stopped);
        let view = engine.tick(PlaybackEvent::None, &path(), Some(&seq), false);
        assert_eq!(view.frame_index, 0);
        assert_eq!(view.mode, PlaybackMode::Stopped);
    }

    #[test]
    fn selection_change_resets_and_stops() {
        let seq_a = sequence(8);
        let seq_b = sequence(3);
        let mut engine = PlaybackEngine::new();
        for _ in 0..4 {
            engine.tick(PlaybackEvent::Play, &path(), Some(&seq_a), false);
        }
        let other = SelectionPath::from_keys(["Naturalistic", "Catcam", "V2"]);
        let view = engine.tick(PlaybackEvent::None, &other, Some(&seq_b), false);
        assert_eq!(view.frame_index, 0);
        assert_eq!(view.mode, PlaybackMode::Stopped);
    }

    #[test]
    fn no_selection_disables_play() {
        let mut engine = PlaybackEngine::new();
        let view = engine.tick(PlaybackEvent::None, &SelectionPath::new(), None, false);
        assert!(!view.play_enabled);
        assert_eq!(view.frame_index, 0);
        assert_eq!(view.total_frames, 0);
    }

    #[test]
    fn external_control_suppresses_the_advance() {
        let seq = sequence(8);
        let mut engine = PlaybackEngine::new();
        let view = engine.tick(PlaybackEvent::Play, &path(), Some(&seq), true);
        assert_eq!(view.frame_index, 0);
        assert_eq!(view.mode, PlaybackMode::Playing);
    }
}
