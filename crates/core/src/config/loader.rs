use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "TAILORPASS_";

/// Load configuration from file with environment variable overrides.
///
/// Nested keys are separated by a double underscore, e.g.
/// `TAILORPASS_TICKET_SOURCE__API_KEY` overrides `ticket_source.api_key`.
/// Secrets are usually supplied this way rather than written to the file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from a TOML string, without environment overrides.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Channel;
    use figment::Jail;

    const SOURCE_ONLY: &str = r#"
[ticket_source]
base_url = "https://api.tickettailor.com/v1"
api_key = "sk_test_from_file"
event_id = "ev_1"
"#;

    fn load(jail: &Jail) -> figment::error::Result<Config> {
        load_config(&jail.directory().join("tailorpass.toml")).map_err(|e| e.to_string().into())
    }

    #[test]
    fn test_load_config_from_str_ignores_environment() {
        Jail::expect_with(|jail| {
            jail.set_env("TAILORPASS_TICKET_SOURCE__EVENT_ID", "ev_env");

            let config = load_config_from_str(SOURCE_ONLY).map_err(|e| e.to_string())?;
            assert_eq!(config.ticket_source.event_id, "ev_1");
            assert_eq!(config.sync.channels, vec![Channel::AppleWallet]);
            Ok(())
        });
    }

    #[test]
    fn test_load_config_from_str_missing_source() {
        let err = load_config_from_str("[server]\nport = 8080\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config(Path::new("/nonexistent/tailorpass.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_env_overrides_api_key() {
        Jail::expect_with(|jail| {
            jail.create_file("tailorpass.toml", SOURCE_ONLY)?;
            jail.set_env("TAILORPASS_TICKET_SOURCE__API_KEY", "sk_live_from_env");

            let config = load(jail)?;
            assert_eq!(config.ticket_source.api_key, "sk_live_from_env");
            assert_eq!(config.ticket_source.event_id, "ev_1");
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_nested_sections() {
        Jail::expect_with(|jail| {
            let file = format!(
                r#"{}
[sync]
interval_secs = 600

[google]
issuer_email = "issuer@example.com"
class_id = "festival_class"
"#,
                SOURCE_ONLY
            );
            jail.create_file("tailorpass.toml", &file)?;
            jail.set_env("TAILORPASS_SERVER__PORT", "9100");
            jail.set_env("TAILORPASS_SYNC__INTERVAL_SECS", "30");
            jail.set_env("TAILORPASS_GOOGLE__BIN_RANGE", "0-99");

            let config = load(jail)?;
            assert_eq!(config.server.port, 9100);
            assert_eq!(config.sync.interval_secs, 30);
            let google = config.google.expect("google section");
            assert_eq!(google.issuer_email, "issuer@example.com");
            assert_eq!(google.bin_range, "0-99");
            Ok(())
        });
    }

    #[test]
    fn test_env_cannot_supply_unparseable_values() {
        Jail::expect_with(|jail| {
            jail.create_file("tailorpass.toml", SOURCE_ONLY)?;
            jail.set_env("TAILORPASS_SERVER__PORT", "not-a-port");

            let err = load_config(&jail.directory().join("tailorpass.toml")).unwrap_err();
            assert!(matches!(err, ConfigError::ParseError(_)));
            Ok(())
        });
    }
}
