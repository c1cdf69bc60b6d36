use std::{sync::Arc, time::Instant};

use metrics::{counter, histogram};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::{
    application::{
        admission::AdmissionGateway,
        decode::ClipRequest,
        diagnostics::{self, DiagnosticsConfig},
        error::ClipError,
        rewrite::rewrite_document,
    },
    domain::{params::RenderParams, presets::PresetStore, render_options::RenderOptions},
};

use super::types::{
    ClipOutput, DocumentRenderer, PageFetcher, RenderJob, RenderSource, RenderedArtifact,
};

pub const METRIC_CLIP_REQUESTS_TOTAL: &str = "webclip_clip_requests_total";
pub const METRIC_RENDER_MS: &str = "webclip_render_ms";

/// Reference that selects a preset by matching the target URL.
pub const AUTO_PRESET: &str = "auto";

const SOURCE: &str = "webclip::application::clip";

/// The request-to-render pipeline.
#[derive(Clone)]
pub struct ClipService {
    fetcher: Arc<dyn PageFetcher>,
    renderer: Arc<dyn DocumentRenderer>,
    presets: Arc<dyn PresetStore>,
    gateway: AdmissionGateway,
    diagnostics: DiagnosticsConfig,
}

impl ClipService {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        renderer: Arc<dyn DocumentRenderer>,
        presets: Arc<dyn PresetStore>,
        gateway: AdmissionGateway,
        diagnostics: DiagnosticsConfig,
    ) -> Self {
        Self {
            fetcher,
            renderer,
            presets,
            gateway,
            diagnostics,
        }
    }

    pub fn gateway(&self) -> &AdmissionGateway {
        &self.gateway
    }

    /// Fill unset fields of `request.params` from each referenced preset, in request
    /// order. Explicit request fields always win.
    pub fn resolve_presets(&self, request: &mut ClipRequest) -> Result<(), ClipError> {
        for reference in &request.presets {
            let preset = if reference == AUTO_PRESET {
                self.presets.for_site(&request.url)
            } else if reference.is_empty() {
                None
            } else {
                Some(
                    self.presets
                        .by_name(reference)
                        .ok_or_else(|| ClipError::PresetNotFound(reference.clone()))?,
                )
            };

            if let Some(preset) = preset {
                request.params.add_from(preset);
            }
        }
        Ok(())
    }

    /// Run one request through the pipeline. Cancellation is honoured only while waiting
    /// for a renderer slot.
    pub async fn clip(
        &self,
        request: ClipRequest,
        cancel: &CancellationToken,
    ) -> Result<ClipOutput, ClipError> {
        let result = self.run(request, cancel).await;
        let outcome = match &result {
            Ok(output) if output.ignored.is_some() => "ignored",
            Ok(_) => "ok",
            Err(err) => err.kind(),
        };
        counter!(METRIC_CLIP_REQUESTS_TOTAL, "outcome" => outcome).increment(1);
        result
    }

    async fn run(
        &self,
        mut request: ClipRequest,
        cancel: &CancellationToken,
    ) -> Result<ClipOutput, ClipError> {
        self.resolve_presets(&mut request)?;

        info!(
            target = SOURCE,
            url = %request.url,
            presets = ?request.presets,
            params = %request.params,
            "Clip request"
        );

        request.params.validate()?;
        if request.url.is_empty() {
            return Err(ClipError::MissingUrl);
        }
        let url = parse_target(&request.url)?;

        let source = if request.params.skips_extraction() {
            RenderSource::Url(request.url.clone())
        } else {
            RenderSource::Markup(self.extract(&url, &request.params).await?)
        };

        let job = RenderJob {
            source,
            options: RenderOptions::from(&request.params),
        };
        if self.diagnostics.print_renderer_args {
            info!(
                target = SOURCE,
                args = ?self.renderer.arguments(&job),
                "Renderer arguments"
            );
        }

        let permit = self.gateway.acquire(cancel).await?;
        let renderer = Arc::clone(&self.renderer);
        let started_at = Instant::now();
        let artifact = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            renderer.render(&job)
        })
        .await
        .map_err(|err| ClipError::internal(format!("renderer task failed: {err}")))??;
        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_RENDER_MS).record(elapsed_ms);

        interpret(artifact, elapsed_ms)
    }

    async fn extract(&self, url: &Url, params: &RenderParams) -> Result<String, ClipError> {
        let html = self.fetcher.fetch(url).await?;
        let markup = rewrite_document(&html, url.as_str(), params)?;
        diagnostics::spawn_dump(&self.diagnostics, url, &markup);
        Ok(markup)
    }
}

fn parse_target(raw: &str) -> Result<Url, ClipError> {
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            return Err(ClipError::DisallowedScheme {
                scheme: String::new(),
            });
        }
        Err(err) => return Err(ClipError::MalformedUrl(err)),
    };

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClipError::DisallowedScheme {
            scheme: other.to_string(),
        }),
    }
}

fn interpret(artifact: RenderedArtifact, elapsed_ms: f64) -> Result<ClipOutput, ClipError> {
    let RenderedArtifact { bytes, failure } = artifact;
    if bytes.is_empty() {
        return Err(ClipError::RendererFatal {
            detail: failure.unwrap_or_else(|| "renderer produced no output".to_string()),
        });
    }

    let ignored = failure.map(|detail| {
        warn!(
            target = SOURCE,
            elapsed_ms,
            bytes = bytes.len(),
            detail = %detail,
            "Renderer reported a failure but produced output"
        );
        ClipError::RendererIgnorable { detail }
    });

    Ok(ClipOutput { bytes, ignored })
}

#[cfg(test)]
mod tests {
    use std::{
        num::NonZeroUsize,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        application::clip::{FetchError, RendererError},
        domain::presets::DeclaredPresets,
    };

    struct StaticFetcher {
        html: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, _url: &Url) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.html.clone())
        }
    }

    struct RecordingRenderer {
        artifact: RenderedArtifact,
        jobs: Mutex<Vec<RenderJob>>,
    }

    impl DocumentRenderer for RecordingRenderer {
        fn render(&self, job: &RenderJob) -> Result<RenderedArtifact, RendererError> {
            self.jobs.lock().expect("jobs lock").push(job.clone());
            Ok(self.artifact.clone())
        }

        fn arguments(&self, _job: &RenderJob) -> Vec<String> {
            vec!["fake".to_string()]
        }
    }

    const PRESETS: &str = r#"{
        "narrow": {"margin_left": 5, "margin_right": 5, "page_size": "A5"},
        "wide": {"margin_left": 30, "orientation": "Landscape"},
        "site": {"url_regexp": "example\\.com", "query": "article"}
    }"#;

    struct Harness {
        service: ClipService,
        fetcher: Arc<StaticFetcher>,
        renderer: Arc<RecordingRenderer>,
    }

    fn harness(artifact: RenderedArtifact) -> Harness {
        let fetcher = Arc::new(StaticFetcher {
            html: "<html><body><article><p>text</p></article><footer>f</footer></body></html>"
                .to_string(),
            calls: AtomicUsize::new(0),
        });
        let renderer = Arc::new(RecordingRenderer {
            artifact,
            jobs: Mutex::new(Vec::new()),
        });
        let presets = DeclaredPresets::from_json_str(PRESETS).expect("presets");
        let service = ClipService::new(
            fetcher.clone(),
            renderer.clone(),
            Arc::new(presets),
            AdmissionGateway::new(NonZeroUsize::MIN),
            DiagnosticsConfig::default(),
        );
        Harness {
            service,
            fetcher,
            renderer,
        }
    }

    fn pdf() -> RenderedArtifact {
        RenderedArtifact {
            bytes: b"%PDF-1.4".to_vec(),
            failure: None,
        }
    }

    fn request(url: &str, presets: &[&str], params: RenderParams) -> ClipRequest {
        ClipRequest {
            url: url.to_string(),
            presets: presets.iter().map(|name| name.to_string()).collect(),
            params,
        }
    }

    #[test]
    fn presets_fill_gaps_in_request_order() {
        let harness = harness(pdf());
        let mut request = request(
            "https://example.com/",
            &["narrow", "wide"],
            RenderParams {
                margin_right: Some(0),
                ..Default::default()
            },
        );

        harness
            .service
            .resolve_presets(&mut request)
            .expect("presets exist");

        assert_eq!(request.params.margin_right, Some(0), "request wins");
        assert_eq!(request.params.margin_left, Some(5), "first preset wins");
        assert_eq!(request.params.page_size.as_deref(), Some("A5"));
        assert_eq!(request.params.orientation.as_deref(), Some("Landscape"));
    }

    #[test]
    fn auto_preset_matches_by_url_and_tolerates_no_match() {
        let harness = harness(pdf());

        let mut matching = request("https://example.com/post", &["auto"], RenderParams::default());
        harness
            .service
            .resolve_presets(&mut matching)
            .expect("auto never fails");
        assert_eq!(matching.params.query.as_deref(), Some("article"));

        let mut other = request("https://other.org/", &["auto", ""], RenderParams::default());
        harness
            .service
            .resolve_presets(&mut other)
            .expect("auto never fails");
        assert_eq!(other.params, RenderParams::default());
    }

    #[test]
    fn unknown_preset_is_an_error() {
        let harness = harness(pdf());
        let mut request = request("https://example.com/", &["narrow", "ghost"], RenderParams::default());

        let err = harness
            .service
            .resolve_presets(&mut request)
            .expect_err("ghost is not declared");
        assert!(matches!(err, ClipError::PresetNotFound(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn url_only_requests_skip_the_fetch() {
        let harness = harness(pdf());
        let output = harness
            .service
            .clip(
                request("https://example.com/x", &[], RenderParams::default()),
                &CancellationToken::new(),
            )
            .await
            .expect("rendered");

        assert_eq!(output.bytes, b"%PDF-1.4");
        assert!(output.ignored.is_none());
        assert_eq!(harness.fetcher.calls.load(Ordering::SeqCst), 0);
        let jobs = harness.renderer.jobs.lock().expect("jobs lock");
        assert_eq!(
            jobs[0].source,
            RenderSource::Url("https://example.com/x".to_string())
        );
    }

    #[tokio::test]
    async fn content_fields_fetch_and_rewrite() {
        let harness = harness(pdf());
        harness
            .service
            .clip(
                request(
                    "https://example.com/x",
                    &[],
                    RenderParams {
                        query: Some("article".to_string()),
                        ..Default::default()
                    },
                ),
                &CancellationToken::new(),
            )
            .await
            .expect("rendered");

        assert_eq!(harness.fetcher.calls.load(Ordering::SeqCst), 1);
        let jobs = harness.renderer.jobs.lock().expect("jobs lock");
        match &jobs[0].source {
            RenderSource::Markup(markup) => {
                assert!(markup.contains("<article>"));
                assert!(!markup.contains("<footer>"));
            }
            other => panic!("expected markup, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn validation_runs_before_url_checks() {
        let harness = harness(pdf());
        let err = harness
            .service
            .clip(
                request(
                    "",
                    &[],
                    RenderParams {
                        page_size: Some("Z1".to_string()),
                        ..Default::default()
                    },
                ),
                &CancellationToken::new(),
            )
            .await
            .expect_err("invalid page size");
        assert!(matches!(err, ClipError::Validation(_)));

        let err = harness
            .service
            .clip(request("", &[], RenderParams::default()), &CancellationToken::new())
            .await
            .expect_err("missing url");
        assert!(matches!(err, ClipError::MissingUrl));
    }

    #[tokio::test]
    async fn only_http_schemes_are_accepted() {
        let harness = harness(pdf());
        for (raw, expected) in [
            ("file:///etc/passwd", "file"),
            ("ftp://example.com/", "ftp"),
            ("example.com/page", ""),
        ] {
            let err = harness
                .service
                .clip(request(raw, &[], RenderParams::default()), &CancellationToken::new())
                .await
                .expect_err("scheme rejected");
            match err {
                ClipError::DisallowedScheme { scheme } => assert_eq!(scheme, expected),
                other => panic!("unexpected error for {raw}: {other:?}"),
            }
        }

        let err = harness
            .service
            .clip(
                request("https://exa mple.com/", &[], RenderParams::default()),
                &CancellationToken::new(),
            )
            .await
            .expect_err("malformed");
        assert!(matches!(err, ClipError::MalformedUrl(_)));
        assert!(harness.renderer.jobs.lock().expect("jobs lock").is_empty());
    }

    #[tokio::test]
    async fn renderer_failure_with_output_is_ignorable() {
        let harness = harness(RenderedArtifact {
            bytes: b"%PDF".to_vec(),
            failure: Some("exit status 1: Warning".to_string()),
        });
        let output = harness
            .service
            .clip(
                request("https://example.com/", &[], RenderParams::default()),
                &CancellationToken::new(),
            )
            .await
            .expect("bytes were produced");
        assert_eq!(output.bytes, b"%PDF");
        assert!(matches!(
            output.ignored,
            Some(ClipError::RendererIgnorable { .. })
        ));
    }

    #[tokio::test]
    async fn renderer_without_output_is_fatal() {
        let harness = harness(RenderedArtifact {
            bytes: Vec::new(),
            failure: Some("exit status 1: boom".to_string()),
        });
        let err = harness
            .service
            .clip(
                request("https://example.com/", &[], RenderParams::default()),
                &CancellationToken::new(),
            )
            .await
            .expect_err("nothing produced");
        match err {
            ClipError::RendererFatal { detail } => assert!(detail.contains("boom")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(harness.service.gateway().available(), 1, "slot released");
    }

    #[tokio::test]
    async fn cancelled_request_never_reaches_renderer() {
        let harness = harness(pdf());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = harness
            .service
            .clip(
                request("https://example.com/", &[], RenderParams::default()),
                &cancel,
            )
            .await
            .expect_err("cancelled");
        assert!(matches!(err, ClipError::Cancelled));
        assert!(harness.renderer.jobs.lock().expect("jobs lock").is_empty());
    }
}
