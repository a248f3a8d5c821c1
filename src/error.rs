use thiserror::Error;

use crate::checkpoint::SetupMode;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    #[error("Failed to read {target}: {detail}")]
    Read { target: String, detail: String },

    #[error("Failed to write {target}: {detail}")]
    Write { target: String, detail: String },

    #[error("{command} failed: {detail}")]
    Command { command: String, detail: String },

    #[error(
        "Existing setup state was created in {saved} mode but this run is in {requested} mode; \
         re-run in {saved} mode to resume it, or delete {path} and start fresh"
    )]
    ModeMismatch {
        saved: SetupMode,
        requested: SetupMode,
        path: String,
    },

    #[error("Passphrase required via stdin")]
    PassphraseRequired,

    #[error("Failed to save setup state to {path}: {detail}")]
    Checkpoint { path: String, detail: String },
}
