//! Server configuration.

use crate::error::{check_board_size, ConfigError};
use shared::MAX_TEXT_LEN;
use std::path::PathBuf;
use std::time::Duration;

/// Largest roster a `Welcome` can carry within one datagram.
pub const MAX_PLAYERS_LIMIT: usize = 64;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Name reported in `Pong` replies.
    pub name: String,
    pub host: String,
    /// 0 lets the OS pick a port.
    pub port: u16,
    pub max_players: usize,
    /// Roster size that starts a match automatically from the lobby.
    pub min_players: Option<usize>,
    /// Initial board dimensions; `None` until an operator sets them.
    pub board_size: Option<(u32, u32)>,
    pub debug: bool,
    /// Player names allowed to issue in-band commands.
    pub operators: Vec<String>,
    /// Where `FileStats` keeps its table; `None` keeps stats in memory.
    pub stats_path: Option<PathBuf>,
    /// Silence after which a session is dropped.
    pub timeout: Duration,
    pub sweep_interval: Duration,
    pub sender_workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "TrapGame Server".to_string(),
            host: "0.0.0.0".to_string(),
            port: 0,
            max_players: 16,
            min_players: None,
            board_size: Some((10, 10)),
            debug: false,
            operators: Vec::new(),
            stats_path: None,
            timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(5),
            sender_workers: 4,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() || self.name.len() > MAX_TEXT_LEN {
            return Err(ConfigError::Invalid(format!(
                "server name must be between 1 and {} bytes",
                MAX_TEXT_LEN
            )));
        }
        if self.max_players == 0 || self.max_players > MAX_PLAYERS_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max players must be between 1 and {}",
                MAX_PLAYERS_LIMIT
            )));
        }
        if let Some(min) = self.min_players {
            if min == 0 || min > self.max_players {
                return Err(ConfigError::Invalid(format!(
                    "min players must be between 1 and max players ({})",
                    self.max_players
                )));
            }
        }
        if let Some((width, height)) = self.board_size {
            check_board_size(width, height)?;
        }
        if self.timeout.is_zero() || self.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "timeout and sweep interval must be non-zero".to_string(),
            ));
        }
        if self.sender_workers == 0 {
            return Err(ConfigError::Invalid(
                "at least one sender worker is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_operator(&self, name: &str) -> bool {
        self.operators
            .iter()
            .any(|op| op.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_addr(), "0.0.0.0:0");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_player_limits() {
        let config = ServerConfig {
            max_players: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = ServerConfig {
            max_players: 4,
            min_players: Some(5),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            max_players: MAX_PLAYERS_LIMIT + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_board_and_durations() {
        let config = ServerConfig {
            board_size: Some((0, 10)),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBoardSize { .. })
        ));

        let config = ServerConfig {
            board_size: None,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let config = ServerConfig {
            timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            sender_workers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_operator_lookup_ignores_case() {
        let config = ServerConfig {
            operators: vec!["Alice".to_string()],
            ..Default::default()
        };
        assert!(config.is_operator("alice"));
        assert!(config.is_operator("ALICE"));
        assert!(!config.is_operator("Alice_"));
    }
}
