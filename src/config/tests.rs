use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        pipeline: PipelineOverrides {
            log_level: Some("debug".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_describe_a_local_service() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.to_string(), "127.0.0.1:8080");
    assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(30));
    assert_eq!(settings.server.max_body_bytes, 1024 * 1024);
    assert_eq!(settings.renderer.binary_path, PathBuf::from("wkhtmltopdf"));
    assert_eq!(settings.renderer.workers.get(), 10);
    assert!(!settings.renderer.print_args);
    assert!(settings.fetch.user_agent.starts_with("webclip/"));
    assert_eq!(settings.fetch.timeout, Duration::from_secs(30));
    assert!(settings.presets.file.is_none());
    assert!(settings.diagnostics.dump_dir.is_none());
    assert!(matches!(settings.logging.format, LogFormat::Compact));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        pipeline: PipelineOverrides {
            log_json: Some(true),
            ..Default::default()
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_workers_are_rejected() {
    let mut raw = RawSettings::default();
    raw.renderer.workers = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero workers");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "renderer.workers",
            ..
        }
    ));
}

#[test]
fn zero_durations_and_limits_are_rejected() {
    let mut raw = RawSettings::default();
    raw.server.graceful_shutdown_seconds = Some(0);
    assert!(matches!(
        Settings::from_raw(raw).expect_err("zero grace"),
        LoadError::Invalid {
            key: "server.graceful_shutdown_seconds",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.server.max_body_bytes = Some(0);
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.fetch.timeout_seconds = Some(0);
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.server.port = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn empty_renderer_path_is_rejected() {
    let mut raw = RawSettings::default();
    raw.renderer.binary_path = Some(PathBuf::new());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn empty_optional_paths_count_as_unset() {
    let mut raw = RawSettings::default();
    raw.presets.file = Some(PathBuf::new());
    raw.diagnostics.dump_dir = Some(PathBuf::from("/tmp/dumps"));

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.presets.file.is_none());
    assert_eq!(
        settings.diagnostics.dump_dir.as_deref(),
        Some(std::path::Path::new("/tmp/dumps"))
    );
}

#[test]
fn invalid_log_level_is_reported() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("loud".to_string());
    assert!(matches!(
        Settings::from_raw(raw).expect_err("bad level"),
        LoadError::Invalid {
            key: "logging.level",
            ..
        }
    ));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["webclip"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_arguments() {
    let args = CliArgs::parse_from([
        "webclip",
        "serve",
        "--server-port",
        "9000",
        "--renderer-workers",
        "4",
        "--renderer-print-args",
        "yes",
        "--presets-file",
        "presets.json",
    ]);

    let Some(Command::Serve(serve)) = args.command else {
        panic!("expected serve command");
    };
    assert_eq!(serve.overrides.server_port, Some(9000));
    assert_eq!(serve.overrides.renderer_workers, Some(4));
    assert_eq!(serve.overrides.pipeline.renderer_print_args, Some(true));

    let mut raw = RawSettings::default();
    raw.apply_serve_overrides(&serve.overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.renderer.workers.get(), 4);
    assert!(settings.renderer.print_args);
    assert_eq!(
        settings.presets.file.as_deref(),
        Some(std::path::Path::new("presets.json"))
    );
}

#[test]
fn parse_render_arguments() {
    let args = CliArgs::parse_from([
        "webclip",
        "render",
        "--url",
        "https://example.com/post",
        "--preset",
        "auto",
        "--preset",
        "narrow",
        "--param",
        "query=#main",
        "--param",
        "margin_top=10",
        "--output",
        "post.pdf",
    ]);

    let Some(Command::Render(render)) = args.command else {
        panic!("expected render command");
    };
    assert_eq!(render.url, "https://example.com/post");
    assert_eq!(render.presets, vec!["auto", "narrow"]);
    assert_eq!(
        render.params,
        vec![
            ("query".to_string(), "#main".to_string()),
            ("margin_top".to_string(), "10".to_string()),
        ]
    );
    assert_eq!(render.output, PathBuf::from("post.pdf"));
}

#[test]
fn render_output_defaults_to_stdout() {
    let args = CliArgs::parse_from(["webclip", "render", "--url", "https://example.com/"]);
    let Some(Command::Render(render)) = args.command else {
        panic!("expected render command");
    };
    assert_eq!(render.output, PathBuf::from("-"));
    assert!(render.params.is_empty());
}

#[test]
fn malformed_param_is_rejected() {
    let result = CliArgs::try_parse_from([
        "webclip",
        "render",
        "--url",
        "https://example.com/",
        "--param",
        "no-equals-sign",
    ]);
    assert!(result.is_err());
}
