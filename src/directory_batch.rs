use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::watermark::{
    BatchItem, BatchProcessor, BatchReport, Compositor, ImagePayload, ItemStatus, OutputFormat,
    OverlaySpec,
};

const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff"];

#[derive(Debug, Error)]
pub enum DirectoryBatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{first:?} and {second:?} would both be written to {target:?}")]
    OutputCollision {
        first: PathBuf,
        second: PathBuf,
        target: PathBuf,
    },

    #[error("Composited output for {0:?} is not raw bytes")]
    UnexpectedDataUrl(PathBuf),
}

/// Where one input file is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub source: PathBuf,
    /// Re-encoded output with the overlay applied
    pub watermarked: PathBuf,
    /// Original bytes copied through unchanged
    pub original: PathBuf,
}

impl OutputTarget {
    pub fn destination(&self, item: &BatchItem, spec_enabled: bool) -> &Path {
        if spec_enabled && item.status == ItemStatus::Applied {
            &self.watermarked
        } else {
            &self.original
        }
    }
}

/// Image files under `input_dir`, recursively, in sorted order
pub fn collect_images(input_dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(input_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    IMAGE_EXTENSIONS
                        .iter()
                        .any(|known| ext.eq_ignore_ascii_case(known))
                })
        })
        .collect();
    paths.sort();
    paths
}

/// Map every source to its output paths, mirroring the directory layout.
///
/// A file already named for the output format keeps its name; any other file
/// gets the format's extension appended (`a.png` becomes `a.png.jpg`). Two
/// sources that could land on the same output path are rejected up front.
pub fn plan_outputs(
    input_dir: &Path,
    output_dir: &Path,
    sources: &[PathBuf],
    format: OutputFormat,
) -> Result<Vec<OutputTarget>, DirectoryBatchError> {
    let mut claimed: HashMap<PathBuf, &Path> = HashMap::new();
    let mut targets = Vec::with_capacity(sources.len());

    for source in sources {
        let relative = match source.strip_prefix(input_dir) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => PathBuf::from(source.file_name().unwrap_or_default()),
        };
        let original = output_dir.join(relative);
        let watermarked = watermarked_path(&original, format);

        for target in [&original, &watermarked] {
            if let Some(first) = claimed.get(target.as_path())
                && *first != source.as_path()
            {
                return Err(DirectoryBatchError::OutputCollision {
                    first: first.to_path_buf(),
                    second: source.clone(),
                    target: target.clone(),
                });
            }
            claimed.insert(target.clone(), source.as_path());
        }

        targets.push(OutputTarget {
            source: source.clone(),
            watermarked,
            original,
        });
    }
    Ok(targets)
}

fn watermarked_path(original: &Path, format: OutputFormat) -> PathBuf {
    let keeps_name = original
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| format.matches_extension(ext));
    if keeps_name {
        return original.to_path_buf();
    }
    let mut name = original.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(format.extension());
    original.with_file_name(name)
}

/// Watermark every image under `input_dir` into `output_dir`.
///
/// Files are read and written one at a time. Items that fail or are skipped
/// after cancellation are copied through unchanged.
pub async fn watermark_directory(
    compositor: &Compositor,
    spec: &OverlaySpec,
    input_dir: &Path,
    output_dir: &Path,
    cancellation: CancellationToken,
) -> Result<BatchReport, DirectoryBatchError> {
    let sources = collect_images(input_dir);
    info!("Found {} images under {:?}", sources.len(), input_dir);
    let targets = plan_outputs(input_dir, output_dir, &sources, compositor.output_format())?;

    BatchProcessor::new(compositor)
        .with_cancellation(cancellation)
        .with_progress(|completed, total| info!("Processed {}/{}", completed, total))
        .run_each(
            targets.len(),
            spec,
            async |index| {
                let bytes = tokio::fs::read(&targets[index].source).await?;
                Ok::<_, DirectoryBatchError>(ImagePayload::from(bytes))
            },
            async |index, item| {
                let target = &targets[index];
                if let ItemStatus::Failed(reason) = &item.status {
                    warn!("Kept original for {:?}: {}", target.source, reason);
                }
                let destination = target.destination(&item, spec.enabled).to_path_buf();
                let ImagePayload::Bytes(bytes) = item.image else {
                    return Err(DirectoryBatchError::UnexpectedDataUrl(target.source.clone()));
                };
                if let Some(parent) = destination.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&destination, bytes).await?;
                Ok(())
            },
        )
        .await
}
