// Watermark module - overlay geometry, painting, compositing and batch runs
pub mod batch;
pub mod codec;
mod error;
pub mod fonts;
pub mod geometry;
pub mod pipeline;
pub mod render;
pub mod surface;
mod types;

pub use batch::{BatchItem, BatchOutcome, BatchProcessor, BatchReport, ItemStatus, apply_batch};
pub use error::WatermarkError;
pub use fonts::FontLibrary;
pub use geometry::resolve_position;
pub use pipeline::{Compositor, DEFAULT_JPEG_QUALITY};
pub use render::render_overlay;
pub use surface::{PaintState, Surface};
pub use types::{
    Anchor, FontWeight, ImagePayload, OutputFormat, OverlayColor, OverlayKind, OverlaySpec,
};
