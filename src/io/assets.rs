// THEORY:
// The `assets` module is the on-disk side of the stimulus library: walk a
// root directory of category/subcategory[/variant] folders, decode every
// frame image, and hand the taxonomy builder a deterministic, sorted
// enumeration. There is no algorithmic content here — it exists so the
// taxonomy can be assembled from plain data in tests and from a directory
// tree in production through the same seam.

use crate::core_modules::frame_store::{FrameBuffer, FrameShape};
use crate::core_modules::taxonomy::{CategoryAssets, SubcategoryAssets, VariantAssets};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Frame file extensions recognized inside a variant directory.
const FRAME_EXTENSIONS: [&str; 3] = ["tif", "tiff", "png"];

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset walk failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Asset collaborator: yields the sorted category enumeration with frames
/// already decoded to RGBA.
pub trait AssetSource {
    fn enumerate(&mut self) -> Result<Vec<CategoryAssets>, AssetError>;
}

/// Filesystem implementation over a stimulus root directory.
pub struct DirectoryAssets {
    root: PathBuf,
}

impl DirectoryAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn sorted_dirs(path: &Path) -> Result<Vec<(String, PathBuf)>, AssetError> {
        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
            }
        }
        dirs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(dirs)
    }

    fn sorted_frame_files(path: &Path) -> Result<Vec<PathBuf>, AssetError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file = entry.path();
            let matches = file
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    FRAME_EXTENSIONS
                        .iter()
                        .any(|known| known.eq_ignore_ascii_case(ext))
                });
            if matches {
                files.push(file);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Decodes a directory's frame files; `None` when it holds none.
    fn decode_frames(path: &Path) -> Result<Option<(FrameShape, Vec<FrameBuffer>)>, AssetError> {
        let files = Self::sorted_frame_files(path)?;
        if files.is_empty() {
            return Ok(None);
        }
        let mut shape = None;
        let mut frames = Vec::with_capacity(files.len());
        for file in files {
            let decoded = image::open(&file)?.to_rgba8();
            shape.get_or_insert(FrameShape {
                width: decoded.width(),
                height: decoded.height(),
            });
            frames.push(decoded.into_raw());
        }
        Ok(shape.map(|shape| (shape, frames)))
    }
}

impl AssetSource for DirectoryAssets {
    fn enumerate(&mut self) -> Result<Vec<CategoryAssets>, AssetError> {
        let mut categories = Vec::new();
        for (category_key, category_path) in Self::sorted_dirs(&self.root)? {
            let mut subcategories = Vec::new();
            for (subcategory_key, subcategory_path) in Self::sorted_dirs(&category_path)? {
                let mut variants = Vec::new();
                let variant_dirs = Self::sorted_dirs(&subcategory_path)?;
                if variant_dirs.is_empty() {
                    // Frames live directly in the subcategory: implicit leaf.
                    if let Some((shape, frames)) = Self::decode_frames(&subcategory_path)? {
                        variants.push(VariantAssets {
                            key: None,
                            shape,
                            frames,
                        });
                    }
                } else {
                    for (variant_key, variant_path) in variant_dirs {
                        match Self::decode_frames(&variant_path)? {
                            Some((shape, frames)) => variants.push(VariantAssets {
                                key: Some(variant_key),
                                shape,
                                frames,
                            }),
                            None => warn!(
                                variant = %variant_path.display(),
                                "variant directory holds no frame files"
                            ),
                        }
                    }
                }
                info!(
                    category = %category_key,
                    subcategory = %subcategory_key,
                    variants = variants.len(),
                    "stimulus frames loaded"
                );
                subcategories.push(SubcategoryAssets {
                    key: subcategory_key,
                    variants,
                });
            }
            categories.push(CategoryAssets {
                key: category_key,
                subcategories,
            });
        }
        Ok(categories)
    }
}
