// THEORY:
// The `capture` module is the camera collaborator: a blocking per-iteration
// frame read plus port enumeration and on-the-fly port switching. A read
// failure is an `Option`, not an error — a disconnected camera skips one
// iteration's camera path and nothing else.
//
// The hardware-trigger (TTL) hook lives here too; the engine only ever flips
// it on around a recording and off again.

use image::RgbaImage;
use thiserror::Error;
use tracing::info;

/// One raw frame as delivered by the device: tightly packed RGBA bytes.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl CapturedFrame {
    /// Reinterprets the buffer as an image; `None` when the byte count does
    /// not match the reported shape.
    pub fn to_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
    }
}

/// A discovered camera port and its reported resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraPort {
    pub id: usize,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera port {0} is not available")]
    UnknownPort(usize),
}

/// Camera collaborator: enumeration, switching, and the per-iteration read.
pub trait FrameSource {
    fn ports(&self) -> Vec<CameraPort>;
    /// Releases the current device and opens `port`.
    fn open(&mut self, port: usize) -> Result<(), CaptureError>;
    fn active_port(&self) -> Option<usize>;
    /// Blocking read bounded by the device's own frame interval. `None`
    /// means the device produced nothing this iteration.
    fn read_frame(&mut self) -> Option<CapturedFrame>;
}

/// Hardware trigger raised for the duration of a recording.
pub trait TtlSignal {
    fn set(&mut self, on: bool);
}

/// Reference TTL hook that only logs the edge.
pub struct LogTtl;

impl TtlSignal for LogTtl {
    fn set(&mut self, on: bool) {
        info!(on, "ttl");
    }
}

/// Deterministic frame generator standing in for a real camera: a horizontal
/// luminance gradient with a bright band that walks down one row per read.
pub struct SyntheticCapture {
    ports: Vec<CameraPort>,
    active: Option<usize>,
    reads: u64,
    /// When set, `read_frame` reports a dropout instead of a frame.
    pub dropped_out: bool,
}

impl SyntheticCapture {
    pub fn new(ports: Vec<CameraPort>) -> Self {
        let active = ports.first().map(|port| port.id);
        Self {
            ports,
            active,
            reads: 0,
            dropped_out: false,
        }
    }

    /// A single default port at the given resolution.
    pub fn single(width: u32, height: u32) -> Self {
        Self::new(vec![CameraPort {
            id: 0,
            width,
            height,
        }])
    }
}

impl FrameSource for SyntheticCapture {
    fn ports(&self) -> Vec<CameraPort> {
        self.ports.clone()
    }

    fn open(&mut self, port: usize) -> Result<(), CaptureError> {
        if !self.ports.iter().any(|p| p.id == port) {
            return Err(CaptureError::UnknownPort(port));
        }
        info!(port, "camera port opened");
        self.active = Some(port);
        Ok(())
    }

    fn active_port(&self) -> Option<usize> {
        self.active
    }

    fn read_frame(&mut self) -> Option<CapturedFrame> {
        if self.dropped_out {
            return None;
        }
        let port = self.ports.iter().find(|p| Some(p.id) == self.active)?;
        let (width, height) = (port.width, port.height);
        let band = (self.reads % height as u64) as u32;
        self.reads += 1;

        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let shade = (x * 255 / width.max(1)) as u8;
                let value = if y == band { 255 } else { shade };
                pixels.extend_from_slice(&[value, value, value, 255]);
            }
        }
        Some(CapturedFrame {
            width,
            height,
            pixels,
        })
    }
}
