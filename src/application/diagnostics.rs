//! Opt-in diagnostics for the clip pipeline.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticsConfig {
    /// Log the full renderer argument list for every render.
    pub print_renderer_args: bool,
    /// Directory receiving the rewritten markup of each fetched page.
    pub dump_dir: Option<PathBuf>,
}

/// `<dir>/<host[:port]>/<last path segment>`, with `index.html` for an empty segment and
/// `.html` appended unless the segment already ends with it.
pub fn dump_path(dir: &Path, url: &Url) -> PathBuf {
    let mut authority = url.host_str().unwrap_or_default().to_string();
    if let Some(port) = url.port() {
        authority.push_str(&format!(":{port}"));
    }

    let segment = url.path().rsplit('/').next().unwrap_or_default();
    let file_name = if segment.is_empty() {
        "index.html".to_string()
    } else if segment.to_ascii_lowercase().ends_with(".html") {
        segment.to_string()
    } else {
        format!("{segment}.html")
    };

    dir.join(authority).join(file_name)
}

/// Write `markup` in the background. Failures are logged and never reach the caller.
pub fn spawn_dump(config: &DiagnosticsConfig, url: &Url, markup: &str) {
    let Some(dir) = config.dump_dir.as_deref() else {
        return;
    };
    let path = dump_path(dir, url);
    let markup = markup.to_string();

    tokio::spawn(async move {
        if let Some(parent) = path.parent()
            && let Err(err) = tokio::fs::create_dir_all(parent).await
        {
            warn!(
                target = "webclip::application::diagnostics",
                path = %parent.display(),
                error = %err,
                "Failed to create dump directory"
            );
            return;
        }

        match tokio::fs::write(&path, markup.as_bytes()).await {
            Ok(()) => debug!(
                target = "webclip::application::diagnostics",
                path = %path.display(),
                bytes = markup.len(),
                "Rewritten markup dumped"
            ),
            Err(err) => warn!(
                target = "webclip::application::diagnostics",
                path = %path.display(),
                error = %err,
                "Failed to dump rewritten markup"
            ),
        }
    });
}
