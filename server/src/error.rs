use crate::commands::RegistryError;
use crate::stats::StatsError;
use shared::MAX_BOARD_DIMENSION;
use std::io;
use thiserror::Error;

/// A rejected configuration change. State is left as it was.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No board size has been set, use /boardsize width height first.")]
    BoardNotConfigured,
    #[error("A board of {width}x{height} is not allowed, each side must be between 1 and {max}.")]
    InvalidBoardSize { width: u32, height: u32, max: u32 },
    #[error("invalid server configuration: {0}")]
    Invalid(String),
}

/// Errors that stop the server from starting or running.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Stats(#[from] StatsError),
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

pub fn check_board_size(width: u32, height: u32) -> Result<(), ConfigError> {
    let valid = 1..=MAX_BOARD_DIMENSION;
    if !valid.contains(&width) || !valid.contains(&height) {
        return Err(ConfigError::InvalidBoardSize {
            width,
            height,
            max: MAX_BOARD_DIMENSION,
        });
    }
    Ok(())
}
