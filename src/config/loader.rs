//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {var}: {reason}")]
    Env { var: &'static str, reason: String },
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn first<F>(lookup: &F, keys: &[&'static str]) -> Option<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .find_map(|key| lookup(key).map(|value| (*key, value)))
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, apply environment overrides and validate.
///
/// Without a path the built-in defaults are the starting point.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` abstracts the environment so tests don't mutate process state.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some((var, value)) = first(&lookup, &["APP_ENV", "NODE_ENV"]) {
        config.environment = value
            .parse()
            .map_err(|reason| ConfigError::Env { var, reason })?;
    }

    if let Some((var, value)) = first(&lookup, &["PORT"]) {
        let port = value.trim().parse::<u16>().map_err(|e| ConfigError::Env {
            var,
            reason: e.to_string(),
        })?;
        config.server.set_port(port);
    }

    if let Some((_, url)) = first(&lookup, &["DATABASE_URL", "MONGO_URI"]) {
        config.database.url = url;
    }

    if let Some((_, secret)) = first(&lookup, &["SESSION_SECRET"]) {
        config.session.secret = secret;
    }

    if let Some((_, secret)) = first(&lookup, &["COOKIE_SECRET"]) {
        config.csrf.secret = secret;
    }

    if let Some((_, origins)) = first(&lookup, &["ALLOWED_ORIGINS"]) {
        config.cors.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
    }

    if let Some((var, value)) = first(&lookup, &["TRUST_PROXY"]) {
        config.security.trust_proxy = match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            other => {
                return Err(ConfigError::Env {
                    var,
                    reason: format!("expected a boolean, got '{}'", other),
                })
            }
        };
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::Environment;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("NODE_ENV", "production"),
                ("PORT", "4000"),
                ("MONGO_URI", "file://data/questions.json"),
                ("SESSION_SECRET", "s3cret"),
                ("ALLOWED_ORIGINS", "https://a.example, https://b.example"),
                ("TRUST_PROXY", "true"),
            ]),
        )
        .unwrap();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.server.bind_address, "0.0.0.0:4000");
        assert_eq!(config.database.url, "file://data/questions.json");
        assert_eq!(config.session.secret, "s3cret");
        assert_eq!(config.cors.allowed_origins.len(), 2);
        assert!(config.security.trust_proxy);
    }

    #[test]
    fn test_app_env_takes_precedence() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[("APP_ENV", "test"), ("NODE_ENV", "production")]),
        )
        .unwrap();
        assert_eq!(config.environment, Environment::Test);
    }

    #[test]
    fn test_bad_port_is_rejected() {
        let mut config = GatewayConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "PORT", .. }));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("quiz-gateway-{}.toml", uuid::Uuid::new_v4()));
        fs::write(
            &path,
            r#"
            [server]
            bind_address = "127.0.0.1:3100"

            [shutdown]
            deadline_secs = 3
            "#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.shutdown.deadline_secs, 3);

        fs::remove_file(&path).unwrap_or_default();
    }
}
