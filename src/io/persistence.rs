// THEORY:
// The `persistence` module is the save-path collaborator: it turns a chosen
// output root, the operator's note and the stamp toggles into an experiment
// directory and a file stem, and hands out append handles and byte writers.
// The engine composes names; only this module touches the filesystem.

use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Experiment directories are named `VSL_Experiment_<date>` under the root.
const EXPERIMENT_DIR_PREFIX: &str = "VSL_Experiment_";

/// What the save is for; decides the file-stem suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveKind {
    /// A full recording: frames plus the acquisition log.
    Experiment,
    /// A one-off camera snapshot.
    Snapshot,
    /// A statistics-log export.
    Trace,
}

/// Everything needed to build a save path.
pub struct SaveRequest<'a> {
    /// Operator-chosen output root; an unusable root falls back to the
    /// desktop (or the temp directory when no home is known).
    pub root: Option<&'a Path>,
    pub note: &'a str,
    /// `category_subcategory_variant` of the stimulus on now.
    pub stimulus: &'a str,
    pub stim_stamp: bool,
    pub date_stamp: bool,
    /// Wall-clock stamp, "%Y-%m-%d %H:%M:%S".
    pub timestamp: &'a str,
    pub kind: SaveKind,
}

/// A prepared destination: the experiment directory and the extension-less
/// file stem inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePath {
    pub directory: PathBuf,
    pub stem: PathBuf,
}

/// Persistence collaborator.
pub trait PersistenceSink {
    /// Ensures the experiment directory exists and returns the file stem.
    fn prepare(&mut self, request: &SaveRequest) -> std::io::Result<SavePath>;
    /// Opens `path` for appending text lines.
    fn open_log(&mut self, path: &Path) -> std::io::Result<Box<dyn Write>>;
    /// Writes one file's bytes.
    fn write_bytes(&mut self, path: &Path, bytes: &[u8]) -> std::io::Result<()>;
}

/// Assembles the extension-less file name from the request.
pub fn file_stem(request: &SaveRequest) -> String {
    let mut name = request.note.to_string();
    if request.stim_stamp {
        name.push_str(request.stimulus);
    }
    if request.date_stamp && request.timestamp.len() >= 11 {
        name.push('_');
        name.push_str(&request.timestamp[..10]);
        name.push('_');
        name.push_str(&request.timestamp[11..]);
    }
    match request.kind {
        SaveKind::Experiment => {}
        SaveKind::Snapshot => name.push_str("_snapshot"),
        SaveKind::Trace => name.push_str("_trace"),
    }
    name
}

/// Filesystem implementation.
pub struct FsPersistence;

impl FsPersistence {
    fn fallback_root() -> PathBuf {
        match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join("Desktop"),
            None => std::env::temp_dir(),
        }
    }
}

impl PersistenceSink for FsPersistence {
    fn prepare(&mut self, request: &SaveRequest) -> std::io::Result<SavePath> {
        let root = match request.root {
            Some(root) if root.is_dir() => root.to_path_buf(),
            _ => Self::fallback_root(),
        };
        let date = request.timestamp.get(..10).unwrap_or_default();
        let directory = root.join(format!("{EXPERIMENT_DIR_PREFIX}{date}"));
        if !directory.is_dir() {
            std::fs::create_dir_all(&directory)?;
            info!(directory = %directory.display(), "experiment directory created");
        }
        let stem = directory.join(file_stem(request));
        Ok(SavePath { directory, stem })
    }

    fn open_log(&mut self, path: &Path) -> std::io::Result<Box<dyn Write>> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Box::new(file))
    }

    fn write_bytes(&mut self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        std::fs::write(path, bytes)
    }
}
