//! Configuration loading, validation, CLI overrides and logging setup.

mod cli;
mod defaults;
mod loader;
mod logging;
mod types;
mod validate;

pub use cli::{CliOverrides, apply_overrides};
pub use loader::{ConfigError, ConfigFormat, load_config};
pub use logging::{filter_directives, init_tracing};
pub use types::*;
pub use validate::{Role, validate_config};

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;

    fn write_temp(ext: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(&format!(".{ext}"))
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn minimal() -> Config {
        ConfigFormat::Yaml
            .parse("server: \"127.0.0.1:8443\"\npassword: secret\n")
            .unwrap()
    }

    #[test]
    fn load_yaml_with_defaults() {
        let file = write_temp(
            "yaml",
            r#"
server: "0.0.0.0:8443"
local: "127.0.0.1:8080"
password: "secret"
tunnel:
  relay_idle_timeout_secs: 30
logging:
  level: debug
  filters:
    garrow_server: trace
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server, "0.0.0.0:8443");
        assert_eq!(config.local.as_deref(), Some("127.0.0.1:8080"));
        assert_eq!(config.tunnel.relay_idle_timeout_secs, 30);
        assert_eq!(
            config.tunnel.conn_idle_timeout_secs,
            garrow_core::DEFAULT_CONN_IDLE_TIMEOUT_SECS
        );
        assert_eq!(
            config.tunnel.max_destination_len,
            garrow_core::DEFAULT_MAX_DESTINATION_LEN
        );
        assert!(config.tcp.no_delay);
        assert_eq!(config.logging.filters["garrow_server"], "trace");
        validate_config(&config, Role::Client).unwrap();
    }

    #[test]
    fn load_jsonc_strips_comments() {
        let file = write_temp(
            "jsonc",
            r#"{
  // tunnel endpoint
  "server": "example.com:8443",
  "password": "secret", /* shared */
  "tcp": { "no_delay": false }
}"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server, "example.com:8443");
        assert!(!config.tcp.no_delay);
        assert_eq!(
            config.tcp.keepalive_secs,
            garrow_core::DEFAULT_TCP_KEEPALIVE_SECS
        );
    }

    #[test]
    fn load_toml() {
        let file = write_temp(
            "toml",
            r#"
server = "127.0.0.1:8443"
password = "secret"

[tunnel]
pool_keep_alive_secs = 5
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.tunnel.pool_keep_alive_secs, 5);
        validate_config(&config, Role::Server).unwrap();
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = ConfigFormat::from_path(Path::new("garrow.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "ini"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config("/nonexistent/garrow.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn missing_password_fails_to_parse() {
        let err = ConfigFormat::Yaml
            .parse("server: \"127.0.0.1:8443\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = minimal();
        config.password.clear();
        assert!(validate_config(&config, Role::Server).is_err());

        let mut config = minimal();
        config.server = "no-port".into();
        assert!(validate_config(&config, Role::Server).is_err());

        let mut config = minimal();
        config.server = "host:99999".into();
        assert!(validate_config(&config, Role::Server).is_err());

        let mut config = minimal();
        config.tunnel.relay_idle_timeout_secs = 0;
        assert!(validate_config(&config, Role::Server).is_err());

        let mut config = minimal();
        config.tunnel.relay_chunk_size = 0;
        assert!(validate_config(&config, Role::Server).is_err());

        let mut config = minimal();
        config.logging.format = Some("xml".into());
        assert!(validate_config(&config, Role::Server).is_err());
    }

    #[test]
    fn client_requires_local() {
        let config = minimal();
        validate_config(&config, Role::Server).unwrap();
        let err = validate_config(&config, Role::Client).unwrap_err();
        assert!(err.to_string().contains("local"));
    }

    #[test]
    fn zero_conn_idle_timeout_is_allowed() {
        let mut config = minimal();
        config.tunnel.conn_idle_timeout_secs = 0;
        validate_config(&config, Role::Server).unwrap();
    }

    #[test]
    fn overrides_replace_values() {
        let mut config = minimal();
        let overrides = CliOverrides {
            server: Some("0.0.0.0:9000".into()),
            local: Some("127.0.0.1:1080".into()),
            relay_idle_timeout_secs: Some(5),
            log_level: Some("debug".into()),
            tcp_no_delay: Some(false),
            ..Default::default()
        };
        apply_overrides(&mut config, &overrides);
        assert_eq!(config.server, "0.0.0.0:9000");
        assert_eq!(config.local.as_deref(), Some("127.0.0.1:1080"));
        assert_eq!(config.tunnel.relay_idle_timeout_secs, 5);
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert!(!config.tcp.no_delay);
        // Untouched fields keep their values.
        assert_eq!(config.password, "secret");
    }

    #[test]
    fn debug_redacts_password() {
        let config = minimal();
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn filter_directives_are_sorted() {
        let mut logging = LoggingConfig {
            level: Some("warn".into()),
            ..Default::default()
        };
        logging.filters.insert("garrow_server".into(), "debug".into());
        logging.filters.insert("garrow_client".into(), "trace".into());
        assert_eq!(
            filter_directives(&logging),
            "warn,garrow_client=trace,garrow_server=debug"
        );
        assert_eq!(filter_directives(&LoggingConfig::default()), "info");
    }
}
