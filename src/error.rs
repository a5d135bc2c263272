use std::path::PathBuf;

/// Errors surfaced across the supervisor's component boundaries.
#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    /// Validation failures at construction time: bad network tag, missing or
    /// non-directory path, a pool built without a hook set.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Inability to reach the wallet RPC within the retry budget, or an
    /// address mismatch on handshake.
    #[error("communication error: {0}")]
    Communication(String),

    /// The wallet-creation CLI could not produce the expected files.
    #[error("wallet creation failed: {0}")]
    WalletCreation(String),

    /// The wallet-RPC child exited before becoming ready.
    #[error("wallet-rpc child exited before becoming ready (code {exit_code:?}): stderr={stderr:?}")]
    ChildExit {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, PoolError>;
