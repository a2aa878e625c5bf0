use config::{FileFormat, Map};

use super::*;

fn layered(file: &str, env: &[(&str, &str)]) -> RawSettings {
    let env: Map<String, String> = env
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

    Config::builder()
        .add_source(File::from_str(file, FileFormat::Toml))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .source(Some(env)),
        )
        .build()
        .expect("config builds")
        .try_deserialize()
        .expect("raw settings deserialize")
}

#[test]
fn defaults_describe_a_local_development_server() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.site.title, DEFAULT_SITE_TITLE);
    assert!(settings.database.url.is_none());
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.ttl_seconds.get(), 20);
    assert!(!settings.session.cookie_secure);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
}

#[test]
fn cli_beats_environment_which_beats_file() {
    let mut raw = layered(
        "[server]\nport = 4000\nhost = \"0.0.0.0\"\n[cache]\nttl_seconds = 60\ncapacity = 8\n",
        &[
            ("BLOGROLL__SERVER__PORT", "5000"),
            ("BLOGROLL__CACHE__TTL_SECONDS", "45"),
        ],
    );

    let overrides = ServeOverrides {
        server_port: Some(6000),
        ..Default::default()
    };
    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 6000);
    assert_eq!(settings.server.addr.ip().to_string(), "0.0.0.0");
    assert_eq!(settings.cache.ttl_seconds.get(), 45);
    assert_eq!(settings.cache.capacity.get(), 8);
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
fn blank_database_url_selects_memory_mode() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
}

#[test]
fn zero_cache_ttl_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.ttl_seconds = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero ttl");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.ttl_seconds",
            ..
        }
    ));
}

#[test]
fn invalid_log_level_is_rejected() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("loud".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn uploads_limit_defaults_to_10_mib() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
    assert_eq!(
        settings.uploads.max_request_bytes.get(),
        DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES
    );
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
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["blogroll"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "blogroll",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--cache-enabled=false",
        "--cache-ttl-seconds",
        "5",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(serve.overrides.cache_enabled, Some(false));
            assert_eq!(serve.overrides.cache_ttl_seconds, Some(5));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_create_group_arguments() {
    let args = CliArgs::parse_from([
        "blogroll",
        "create-group",
        "--title",
        "Cats",
        "--database-url",
        "postgres://example",
    ]);

    match args.command.expect("create-group command") {
        Command::CreateGroup(group) => {
            assert_eq!(group.title, "Cats");
            assert!(group.slug.is_none());
            assert_eq!(group.description, "");
            assert_eq!(
                group.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn migrate_applies_database_override() {
    let args = CliArgs::parse_from(["blogroll", "migrate", "--database-url", "postgres://m"]);
    let mut raw = RawSettings::default();
    raw.apply_command(args.command.as_ref());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.database.url.as_deref(), Some("postgres://m"));
}
