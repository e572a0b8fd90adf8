use thiserror::Error;

use applist_steam::SteamError;

/// Errors that can occur during CLI command execution.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// Network client could not be built or a request failed outright
    #[error("Steam error: {0}")]
    Steam(#[from] SteamError),

    /// Runtime creation or async error
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Bad command-line input
    #[error("Invalid input: {0}")]
    Input(String),
}

impl CliError {
    pub(crate) fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    pub(crate) fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }
}
