use std::io;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::{application::error::ClipError, domain::render_options::RenderOptions};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("source page answered with status {status}")]
    Status { status: u16 },
    #[error("failed to fetch source page: {0}")]
    Transport(String),
}

impl FetchError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Retrieves the markup of a remote page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// What the renderer reads: the target page by URL, or rewritten markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderSource {
    Url(String),
    Markup(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    pub source: RenderSource,
    pub options: RenderOptions,
}

/// Renderer output. `failure` carries the renderer's own failure report, which may be
/// present even when bytes were produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedArtifact {
    pub bytes: Vec<u8>,
    pub failure: Option<String>,
}

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("renderer executable unavailable: {0}")]
    Unavailable(io::Error),
    #[error("renderer i/o failed: {0}")]
    Io(#[from] io::Error),
}

/// Blocking adapter around the external document renderer.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, job: &RenderJob) -> Result<RenderedArtifact, RendererError>;

    /// Argument list the renderer would be invoked with, for diagnostics.
    fn arguments(&self, job: &RenderJob) -> Vec<String>;
}

/// Successful pipeline result. `ignored` holds a renderer failure that did not prevent
/// the artifact from being produced.
#[derive(Debug)]
pub struct ClipOutput {
    pub bytes: Vec<u8>,
    pub ignored: Option<ClipError>,
}
