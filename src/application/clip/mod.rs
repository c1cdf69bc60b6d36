//! Request-to-render pipeline and the collaborators it drives.

mod service;
mod types;

pub use service::{AUTO_PRESET, ClipService, METRIC_CLIP_REQUESTS_TOTAL, METRIC_RENDER_MS};
pub use types::{
    ClipOutput, DocumentRenderer, FetchError, PageFetcher, RenderJob, RenderSource,
    RenderedArtifact, RendererError,
};
