use std::{
    io::{self, Write},
    num::NonZeroUsize,
    path::Path,
    process,
    sync::Arc,
};

use tokio_util::sync::CancellationToken;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use webclip::{
    application::{
        admission::AdmissionGateway,
        clip::ClipService,
        decode::decode_form,
        diagnostics::DiagnosticsConfig,
        error::{AppError, ClipError},
    },
    config,
    infra::{
        error::InfraError,
        fetch::ReqwestFetcher,
        http::{self, ClipState},
        presets::load_presets,
        telemetry,
        wkhtmltopdf::WkhtmltopdfRenderer,
    },
};

const STDOUT_PATH: &str = "-";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, *args).await,
    }
}

fn build_clip_service(
    settings: &config::Settings,
    workers: NonZeroUsize,
) -> Result<ClipService, AppError> {
    let fetcher = ReqwestFetcher::new(&settings.fetch.user_agent, settings.fetch.timeout)?;
    let renderer = WkhtmltopdfRenderer::new(settings.renderer.binary_path.clone());
    let presets = load_presets(settings.presets.file.as_deref())?;
    let diagnostics = DiagnosticsConfig {
        print_renderer_args: settings.renderer.print_args,
        dump_dir: settings.diagnostics.dump_dir.clone(),
    };

    Ok(ClipService::new(
        Arc::new(fetcher),
        Arc::new(renderer),
        presets,
        AdmissionGateway::new(workers),
        diagnostics,
    ))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let service = build_clip_service(&settings, settings.renderer.workers)?;
    let router = http::build_router(ClipState {
        service: Arc::new(service),
        max_body_bytes: settings.server.max_body_bytes,
    });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "webclip::serve",
        addr = %settings.server.addr,
        workers = settings.renderer.workers.get(),
        renderer = %settings.renderer.binary_path.display(),
        "Listening"
    );

    let shutdown = CancellationToken::new();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server => return server_result(joined),
        () = shutdown_signal() => {}
    }

    info!(
        target = "webclip::serve",
        timeout_secs = settings.server.graceful_shutdown.as_secs(),
        "Shutdown requested; draining in-flight requests"
    );
    shutdown.cancel();

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => server_result(joined),
        Err(_) => {
            warn!(
                target = "webclip::serve",
                "Graceful shutdown timed out; dropping remaining connections"
            );
            server.abort();
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(
            target = "webclip::serve",
            error = %err,
            "Failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}

fn server_result(
    joined: Result<io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    joined
        .map_err(|err| AppError::unexpected(format!("server task failed: {err}")))?
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn run_render(settings: config::Settings, args: config::RenderArgs) -> Result<(), AppError> {
    let service = build_clip_service(&settings, NonZeroUsize::MIN)?;

    let mut pairs = vec![
        ("url".to_string(), args.url.clone()),
        ("presets".to_string(), args.presets.join(",")),
    ];
    pairs.extend(args.params.iter().cloned());
    let request = decode_form(pairs).map_err(ClipError::from)?;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = service.clip(request, &cancel).await;
    interrupt.abort();
    let output = result?;

    if let Some(ignored) = output.ignored {
        warn!(
            target = "webclip::render",
            kind = ignored.kind(),
            error = %ignored,
            "Renderer reported a failure but produced output"
        );
    }

    write_output(&args.output, &output.bytes).await?;
    info!(
        target = "webclip::render",
        url = %args.url,
        output = %args.output.display(),
        bytes = output.bytes.len(),
        "Document written"
    );
    Ok(())
}

async fn write_output(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    if path.as_os_str() == STDOUT_PATH {
        let mut stdout = io::stdout().lock();
        stdout
            .write_all(bytes)
            .and_then(|()| stdout.flush())
            .map_err(|err| AppError::from(InfraError::from(err)))?;
        return Ok(());
    }

    tokio::fs::write(path, bytes)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))
}
