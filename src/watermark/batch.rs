use std::convert::Infallible;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::pipeline::Compositor;
use super::types::{ImagePayload, OverlaySpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Applied,
    /// Compositing failed; the original image was kept
    Failed(String),
    /// The batch was cancelled before this item started; the original image was kept
    Skipped,
}

#[derive(Debug, Clone)]
pub struct BatchItem {
    pub image: ImagePayload,
    pub status: ItemStatus,
}

impl BatchItem {
    pub fn succeeded(&self) -> bool {
        self.status == ItemStatus::Applied
    }
}

/// Per-item results of a batch, in input order
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub items: Vec<BatchItem>,
    pub cancelled: bool,
}

impl BatchOutcome {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|item| item.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item.status, ItemStatus::Failed(_)))
            .count()
    }

    pub fn success_flags(&self) -> Vec<bool> {
        self.items.iter().map(BatchItem::succeeded).collect()
    }

    pub fn images(&self) -> impl Iterator<Item = &ImagePayload> {
        self.items.iter().map(|item| &item.image)
    }

    pub fn into_images(self) -> Vec<ImagePayload> {
        self.items.into_iter().map(|item| item.image).collect()
    }

    pub fn summary(&self) -> String {
        summary_line(self.succeeded(), self.len(), self.cancelled)
    }
}

/// Per-item statuses of a batch whose images were handed off as they finished
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub statuses: Vec<ItemStatus>,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.statuses
            .iter()
            .filter(|status| **status == ItemStatus::Applied)
            .count()
    }

    pub fn summary(&self) -> String {
        summary_line(self.succeeded(), self.len(), self.cancelled)
    }
}

fn summary_line(succeeded: usize, total: usize, cancelled: bool) -> String {
    let mut summary = format!("{} of {} images watermarked successfully", succeeded, total);
    if cancelled {
        summary.push_str(" (cancelled)");
    }
    summary
}

type ProgressFn<'a> = Box<dyn FnMut(usize, usize) + Send + 'a>;

/// Runs one overlay spec across a list of images, one at a time
pub struct BatchProcessor<'a> {
    compositor: &'a Compositor,
    on_progress: Option<ProgressFn<'a>>,
    cancellation: Option<CancellationToken>,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(compositor: &'a Compositor) -> Self {
        Self {
            compositor,
            on_progress: None,
            cancellation: None,
        }
    }

    /// Called with `(completed, total)` after every processed item
    pub fn with_progress(mut self, on_progress: impl FnMut(usize, usize) + Send + 'a) -> Self {
        self.on_progress = Some(Box::new(on_progress));
        self
    }

    /// Checked between items; an item already in progress always finishes
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub async fn run(self, sources: &[ImagePayload], spec: &OverlaySpec) -> BatchOutcome {
        let mut items = Vec::with_capacity(sources.len());
        let report = self
            .run_each(
                sources.len(),
                spec,
                async |index| Ok::<_, Infallible>(sources[index].clone()),
                async |_, item| {
                    items.push(item);
                    Ok(())
                },
            )
            .await;
        let Ok(report) = report;
        BatchOutcome {
            items,
            cancelled: report.cancelled,
        }
    }

    /// Process `total` items, fetching each one from `load` right before it is
    /// composited and handing the result to `finish` straight after, so only one
    /// image is held at a time. An error from either callback stops the batch.
    pub async fn run_each<E>(
        mut self,
        total: usize,
        spec: &OverlaySpec,
        mut load: impl AsyncFnMut(usize) -> Result<ImagePayload, E>,
        mut finish: impl AsyncFnMut(usize, BatchItem) -> Result<(), E>,
    ) -> Result<BatchReport, E> {
        let mut report = BatchReport {
            statuses: Vec::with_capacity(total),
            cancelled: false,
        };

        for index in 0..total {
            let source = load(index).await?;

            if let Some(token) = &self.cancellation
                && token.is_cancelled()
            {
                report.cancelled = true;
                report.statuses.push(ItemStatus::Skipped);
                finish(
                    index,
                    BatchItem {
                        image: source,
                        status: ItemStatus::Skipped,
                    },
                )
                .await?;
                continue;
            }

            let item = match self.compositor.composite(&source, spec).await {
                Ok(image) => BatchItem {
                    image,
                    status: ItemStatus::Applied,
                },
                Err(e) => {
                    warn!("Watermark failed for batch item {}: {}", index, e);
                    BatchItem {
                        image: source,
                        status: ItemStatus::Failed(e.to_string()),
                    }
                }
            };
            report.statuses.push(item.status.clone());
            finish(index, item).await?;

            if let Some(on_progress) = self.on_progress.as_mut() {
                on_progress(index + 1, total);
            }
        }

        info!("{}", report.summary());
        Ok(report)
    }
}

/// Apply `spec` to every image, keeping the original wherever compositing fails
pub async fn apply_batch(
    compositor: &Compositor,
    sources: &[ImagePayload],
    spec: &OverlaySpec,
) -> BatchOutcome {
    BatchProcessor::new(compositor).run(sources, spec).await
}
