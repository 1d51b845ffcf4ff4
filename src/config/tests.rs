use std::path::Path;

use super::*;

#[test]
fn defaults_resolve_without_any_source() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(
        settings.server.graceful_shutdown,
        Duration::from_secs(DEFAULT_GRACEFUL_SHUTDOWN_SECS)
    );
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.content.directory, Path::new(DEFAULT_CONTENT_DIR));
    assert_eq!(
        settings.content.reload_interval,
        Some(Duration::from_secs(DEFAULT_CONTENT_RELOAD_INTERVAL_SECS))
    );
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_reload_interval_disables_reloads() {
    let mut raw = RawSettings::default();
    raw.content.reload_interval_seconds = Some(0);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.content.reload_interval.is_none());
}

#[test]
fn rejects_zero_port() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(0);
    let err = Settings::from_raw(raw).expect_err("port zero is invalid");
    assert!(matches!(err, LoadError::Invalid { key: "server.port", .. }));
}

#[test]
fn rejects_unknown_log_level() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("chatty".to_string());
    let err = Settings::from_raw(raw).expect_err("unknown level is invalid");
    assert!(matches!(err, LoadError::Invalid { key: "logging.level", .. }));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["quire"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "quire",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--content-dir",
        "/srv/content",
        "--content-reload-interval-seconds",
        "5",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.content.content_directory.as_deref(),
                Some(Path::new("/srv/content"))
            );
            assert_eq!(serve.overrides.content_reload_interval_seconds, Some(5));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_payload_arguments() {
    let args = CliArgs::parse_from(["quire", "payload", "--content-dir", "/tmp/c", "--url-only"]);

    match args.command.expect("payload command") {
        Command::Payload(payload) => {
            assert!(payload.url_only);
            assert_eq!(
                payload.content.content_directory.as_deref(),
                Some(Path::new("/tmp/c"))
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn payload_command_applies_content_override() {
    let mut raw = RawSettings::default();
    raw.apply_content_override(&ContentOverride {
        content_directory: Some(PathBuf::from("/data")),
    });
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.content.directory, Path::new("/data"));
}
