// THEORY:
// The `FrameStore` module holds the raw material of a stimulus: one ordered
// sequence of pre-decoded movie frames. It is the most fundamental unit of the
// playback side of the system.
//
// Key architectural principles:
// 1.  **Dumb Data Container**: A `FrameSequence` knows nothing about playback,
//     navigation, or display. It stores frames and answers indexed lookups.
//     All behavior lives in higher layers (`PlaybackEngine`, `FrameProcessor`).
// 2.  **Build Once, Read Forever**: Sequences are assembled at taxonomy load
//     time and never mutated afterwards. Every later layer can hold shared
//     references without coordination.
// 3.  **Closed Index Bookkeeping**: `total_frames` is the index of the last
//     stored frame (`frame_count - 1`), so a playback cursor is renderable
//     exactly while `index <= total_frames` and wraps once it walks past it.

use thiserror::Error;

/// A single decoded frame: tightly packed RGBA bytes, row-major.
pub type FrameBuffer = Vec<u8>;

const RGBA_CHANNELS: u32 = 4;

/// The fixed pixel geometry shared by every frame in a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameShape {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}

impl FrameShape {
    /// The number of bytes a single RGBA frame of this shape occupies.
    pub fn byte_len(&self) -> usize {
        (self.width * self.height * RGBA_CHANNELS) as usize
    }
}

#[derive(Debug, Error)]
pub enum FrameStoreError {
    #[error("frame sequence is empty")]
    Empty,
    #[error("frame {index} has {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    ShapeMismatch {
        index: usize,
        actual: usize,
        expected: usize,
        width: u32,
        height: u32,
    },
}

/// An immutable, ordered sequence of same-shape movie frames.
#[derive(Debug)]
pub struct FrameSequence {
    shape: FrameShape,
    frames: Vec<FrameBuffer>,
}

impl FrameSequence {
    /// Validates that every frame matches `shape` and builds the sequence.
    pub fn new(shape: FrameShape, frames: Vec<FrameBuffer>) -> Result<Self, FrameStoreError> {
        if frames.is_empty() {
            return Err(FrameStoreError::Empty);
        }
        let expected = shape.byte_len();
        for (index, frame) in frames.iter().enumerate() {
            if frame.len() != expected {
                return Err(FrameStoreError::ShapeMismatch {
                    index,
                    actual: frame.len(),
                    expected,
                    width: shape.width,
                    height: shape.height,
                });
            }
        }
        Ok(Self { shape, frames })
    }

    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Index of the last stored frame. A playback cursor at `total_frames`
    /// still renders; one step beyond triggers a loop reset.
    pub fn total_frames(&self) -> u32 {
        (self.frames.len() - 1) as u32
    }

    /// Indexed lookup. Out-of-range indices return `None` rather than panic,
    /// so the render guard upstream can fail soft.
    pub fn frame(&self, index: u32) -> Option<&FrameBuffer> {
        self.frames.get(index as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> FrameShape {
        FrameShape {
            width: 4,
            height: 2,
        }
    }

    #[test]
    fn total_frames_is_last_index() {
        let frames = vec![vec![0u8; shape().byte_len()]; 11];
        let seq = FrameSequence::new(shape(), frames).expect("valid frames");
        assert_eq!(seq.frame_count(), 11);
        assert_eq!(seq.total_frames(), 10);
        assert!(seq.frame(10).is_some());
        assert!(seq.frame(11).is_none());
    }

    #[test]
    fn rejects_shape_mismatch() {
        let frames = vec![vec![0u8; shape().byte_len()], vec![0u8; 3]];
        let err = FrameSequence::new(shape(), frames).unwrap_err();
        assert!(matches!(err, FrameStoreError::ShapeMismatch { index: 1, .. }));
    }

    #[test]
    fn rejects_empty_sequence() {
        let err = FrameSequence::new(shape(), Vec::new()).unwrap_err();
        assert!(matches!(err, FrameStoreError::Empty));
    }
}
