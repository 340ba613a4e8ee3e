//! Configuration loading from disk and the environment.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use crate::config::schema::FaucetConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variables that override file values.
pub mod env {
    pub const CLEARNODE_URL: &str = "CLEARNODE_URL";
    pub const TOKEN_SYMBOL: &str = "TOKEN_SYMBOL";
    pub const STANDARD_TIP_AMOUNT: &str = "STANDARD_TIP_AMOUNT";
    pub const SERVER_PORT: &str = "SERVER_PORT";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
}

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: &'static str, message: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, message } => write!(f, "Invalid {}: {}", var, message),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration: optional TOML file, then environment overrides, then validation.
pub fn load_config(path: Option<&Path>) -> Result<FaucetConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_file(path)?,
        None => FaucetConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse a TOML file without validating it.
pub fn parse_file(path: &Path) -> Result<FaucetConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Apply overrides from `lookup` (normally the process environment).
pub fn apply_env_overrides<F>(config: &mut FaucetConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());

    if let Some(url) = get(env::CLEARNODE_URL) {
        config.clearnode.url = url;
    }
    if let Some(symbol) = get(env::TOKEN_SYMBOL) {
        config.faucet.token_symbol = symbol;
    }
    if let Some(amount) = get(env::STANDARD_TIP_AMOUNT) {
        config.faucet.standard_tip_amount = amount;
    }
    if let Some(level) = get(env::LOG_LEVEL) {
        config.observability.log_level = level;
    }
    if let Some(port) = get(env::SERVER_PORT) {
        let port: u16 = port.trim().parse().map_err(|_| ConfigError::Env {
            var: env::SERVER_PORT,
            message: format!("'{}' is not a port number", port),
        })?;
        config.server.bind_address = with_port(&config.server.bind_address, port);
    }

    Ok(())
}

fn with_port(bind_address: &str, port: u16) -> String {
    match bind_address.parse::<SocketAddr>() {
        Ok(mut addr) => {
            addr.set_port(port);
            addr.to_string()
        }
        Err(_) => format!("0.0.0.0:{}", port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = FaucetConfig::default();
        apply_env_overrides(
            &mut config,
            lookup(&[
                ("CLEARNODE_URL", "ws://localhost:8000/ws"),
                ("TOKEN_SYMBOL", "weth"),
                ("STANDARD_TIP_AMOUNT", "0.01"),
                ("SERVER_PORT", "3000"),
                ("LOG_LEVEL", "debug"),
            ]),
        )
        .unwrap();

        assert_eq!(config.clearnode.url, "ws://localhost:8000/ws");
        assert_eq!(config.faucet.token_symbol, "weth");
        assert_eq!(config.faucet.standard_tip_amount, "0.01");
        assert_eq!(config.server.bind_address, "0.0.0.0:3000");
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn test_empty_env_values_ignored() {
        let mut config = FaucetConfig::default();
        apply_env_overrides(&mut config, lookup(&[("TOKEN_SYMBOL", "  ")])).unwrap();
        assert_eq!(config.faucet.token_symbol, "usdc");
    }

    #[test]
    fn test_invalid_port() {
        let mut config = FaucetConfig::default();
        let err = apply_env_overrides(&mut config, lookup(&[("SERVER_PORT", "http")])).unwrap_err();
        assert!(err.to_string().contains("SERVER_PORT"));
    }

    #[test]
    fn test_parse_file() {
        let dir = std::env::temp_dir().join(format!("clearnode-faucet-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("faucet.toml");
        fs::write(
            &path,
            "[server]\nbind_address = \"127.0.0.1:8081\"\n\n[faucet]\nmin_transfer_multiple = 5\n",
        )
        .unwrap();

        let config = parse_file(&path).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:8081");
        assert_eq!(config.faucet.min_transfer_multiple, 5);

        fs::write(&path, "[server\n").unwrap();
        assert!(matches!(parse_file(&path), Err(ConfigError::Parse(_))));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file() {
        let result = parse_file(Path::new("/nonexistent/faucet.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_validation_error_display() {
        let err = ConfigError::Validation(vec![
            ValidationError {
                field: "clearnode.url",
                message: "bad".into(),
            },
            ValidationError {
                field: "faucet.token_symbol",
                message: "must not be empty".into(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: clearnode.url: bad, faucet.token_symbol: must not be empty"
        );
    }
}
