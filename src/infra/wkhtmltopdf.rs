//! Renderer adapter driving the `wkhtmltopdf` executable.

use std::{
    io::{ErrorKind, Write},
    path::PathBuf,
    process::{Command, Stdio},
    thread,
    time::Instant,
};

use tracing::{debug, info, warn};

use crate::application::clip::{
    DocumentRenderer, RenderJob, RenderSource, RenderedArtifact, RendererError,
};

/// Input and output placeholder meaning stdin or stdout.
const STREAM: &str = "-";

#[derive(Debug, Clone)]
pub struct WkhtmltopdfRenderer {
    binary: PathBuf,
}

impl WkhtmltopdfRenderer {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }
}

/// Global options, the input, page options, then the output.
fn build_arguments(job: &RenderJob) -> Vec<String> {
    let mut args = Vec::new();
    for option in &job.options.global {
        option.push_args(&mut args);
    }
    match &job.source {
        RenderSource::Url(url) => args.push(url.clone()),
        RenderSource::Markup(_) => args.push(STREAM.to_string()),
    }
    for option in &job.options.page {
        option.push_args(&mut args);
    }
    args.push(STREAM.to_string());
    args
}

impl DocumentRenderer for WkhtmltopdfRenderer {
    fn arguments(&self, job: &RenderJob) -> Vec<String> {
        build_arguments(job)
    }

    fn render(&self, job: &RenderJob) -> Result<RenderedArtifact, RendererError> {
        let started_at = Instant::now();
        let markup = match &job.source {
            RenderSource::Markup(markup) => Some(markup.as_str()),
            RenderSource::Url(_) => None,
        };

        let mut child = Command::new(&self.binary)
            .args(build_arguments(job))
            .stdin(if markup.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                warn!(
                    target = "webclip::infra::wkhtmltopdf",
                    op = "wkhtmltopdf::render",
                    result = "error",
                    binary = %self.binary.display(),
                    error_code = "spawn",
                    error = %err,
                    "Failed to spawn renderer"
                );
                if err.kind() == ErrorKind::NotFound {
                    RendererError::Unavailable(err)
                } else {
                    RendererError::Io(err)
                }
            })?;

        let stdin = child.stdin.take();
        let output = thread::scope(|scope| {
            let writer = markup.zip(stdin).map(|(markup, mut stdin)| {
                scope.spawn(move || stdin.write_all(markup.as_bytes()))
            });
            let output = child.wait_with_output();
            if let Some(writer) = writer {
                match writer.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => debug!(
                        target = "webclip::infra::wkhtmltopdf",
                        op = "wkhtmltopdf::render",
                        error = %err,
                        "Renderer closed stdin before reading all markup"
                    ),
                    Err(_) => warn!(
                        target = "webclip::infra::wkhtmltopdf",
                        op = "wkhtmltopdf::render",
                        "Renderer stdin writer panicked"
                    ),
                }
            }
            output
        })?;

        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        let failure = if output.status.success() {
            None
        } else {
            let exit_code = output.status.code().map(i64::from).unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                target = "webclip::infra::wkhtmltopdf",
                op = "wkhtmltopdf::render",
                result = "error",
                elapsed_ms,
                exit_code,
                output_bytes = output.stdout.len(),
                stderr = %stderr.trim(),
                "Renderer exited with failure status"
            );
            Some(format!("exit status {exit_code}: {}", stderr.trim()))
        };

        if failure.is_none() {
            info!(
                target = "webclip::infra::wkhtmltopdf",
                op = "wkhtmltopdf::render",
                result = "ok",
                elapsed_ms,
                output_bytes = output.stdout.len(),
                "Document rendered"
            );
        }

        Ok(RenderedArtifact {
            bytes: output.stdout,
            failure,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::domain::{params::RenderParams, render_options::RenderOptions};
    use std::{fs, os::unix::fs::PermissionsExt, path::Path};
    use tempfile::TempDir;

    fn make_executable(path: &Path) {
        let mut perms = fs::metadata(path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).expect("set perms");
    }

    fn write_script(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fake-wkhtmltopdf");
        fs::write(&path, body).expect("write script");
        make_executable(&path);
        path
    }

    fn job(source: RenderSource) -> RenderJob {
        let params = RenderParams {
            margin_top: Some(10),
            grayscale: Some(true),
            zoom: Some(1.5),
            ..Default::default()
        };
        RenderJob {
            source,
            options: RenderOptions::from(&params),
        }
    }

    #[test]
    fn argument_layout_places_input_between_blocks() {
        let args = build_arguments(&job(RenderSource::Url("https://example.com/".to_string())));
        assert_eq!(
            args,
            vec![
                "--grayscale",
                "--margin-top",
                "10",
                "https://example.com/",
                "--disable-javascript",
                "--zoom",
                "1.5",
                "-"
            ]
        );

        let args = build_arguments(&job(RenderSource::Markup("<p>x</p>".to_string())));
        assert_eq!(args[3], "-");
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[test]
    fn markup_is_streamed_through_stdin() {
        let dir = TempDir::new().expect("temp dir");
        let args_path = dir.path().join("args.log");
        let script = write_script(
            &dir,
            &format!(
                "#!/bin/sh\nset -eu\necho \"$@\" > \"{}\"\ncat\n",
                args_path.display()
            ),
        );
        let renderer = WkhtmltopdfRenderer::new(script);

        let artifact = renderer
            .render(&job(RenderSource::Markup("<p>hello</p>".to_string())))
            .expect("rendered");

        assert_eq!(artifact.bytes, b"<p>hello</p>");
        assert!(artifact.failure.is_none());
        let args = fs::read_to_string(&args_path).expect("read args");
        assert_eq!(
            args.trim(),
            "--grayscale --margin-top 10 - --disable-javascript --zoom 1.5 -"
        );
    }

    #[test]
    fn url_source_gets_no_stdin() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(&dir, "#!/bin/sh\nprintf 'pdf:%s' \"$4\"\n");
        let renderer = WkhtmltopdfRenderer::new(script);

        let artifact = renderer
            .render(&job(RenderSource::Url("https://example.com/".to_string())))
            .expect("rendered");

        assert_eq!(artifact.bytes, b"pdf:https://example.com/");
    }

    #[test]
    fn failure_status_is_reported_alongside_output() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(
            &dir,
            "#!/bin/sh\ncat > /dev/null\nprintf '%%PDF-1.4'\necho 'Warning: blocked access' >&2\nexit 1\n",
        );
        let renderer = WkhtmltopdfRenderer::new(script);

        let artifact = renderer
            .render(&job(RenderSource::Markup("<p>x</p>".to_string())))
            .expect("process ran");

        assert_eq!(artifact.bytes, b"%PDF-1.4");
        let failure = artifact.failure.expect("failure reported");
        assert!(failure.starts_with("exit status 1"), "{failure}");
        assert!(failure.contains("blocked access"), "{failure}");
    }

    #[test]
    fn failure_without_output_has_empty_bytes() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(&dir, "#!/bin/sh\necho 'boom' >&2\nexit 2\n");
        let renderer = WkhtmltopdfRenderer::new(script);

        let artifact = renderer
            .render(&job(RenderSource::Markup("<p>x</p>".to_string())))
            .expect("process ran");

        assert!(artifact.bytes.is_empty());
        assert!(artifact.failure.expect("failure").contains("boom"));
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let dir = TempDir::new().expect("temp dir");
        let renderer = WkhtmltopdfRenderer::new(dir.path().join("does-not-exist"));

        let err = renderer
            .render(&job(RenderSource::Url("https://example.com/".to_string())))
            .expect_err("spawn fails");
        assert!(matches!(err, RendererError::Unavailable(_)));
    }
}
