//! Resumable setup state persisted across the reboot that follows package
//! installation.
//!
//! The checkpoint is the only durable record of "step 1 already done". It is
//! written once the package stage completes, read on the next `setup`, and
//! deleted once the remaining stages succeed.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::BridgeError;

pub const CHECKPOINT_VERSION: u32 = 1;

/// Whether setup asks questions or takes every default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupMode {
    Interactive,
    Defaults,
}

impl SetupMode {
    pub fn from_use_defaults(use_defaults: bool) -> Self {
        if use_defaults { SetupMode::Defaults } else { SetupMode::Interactive }
    }
}

impl fmt::Display for SetupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupMode::Interactive => f.write_str("interactive"),
            SetupMode::Defaults => f.write_str("--use-defaults"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckpointStage {
    PackagesInstalled,
}

/// Operator answers captured before the reboot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupAnswers {
    pub chipset: String,
    pub interface: String,
    pub ssid: String,
    pub country: String,
    pub gateway: String,
    pub wan_interface: String,
    pub enable_mdns: bool,
    pub use_defaults: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupCheckpoint {
    pub version: u32,
    pub stage: CheckpointStage,
    pub config: SetupAnswers,
}

impl SetupCheckpoint {
    pub fn packages_installed(config: SetupAnswers) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            stage: CheckpointStage::PackagesInstalled,
            config,
        }
    }

    pub fn mode(&self) -> SetupMode {
        SetupMode::from_use_defaults(self.config.use_defaults)
    }
}

pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved checkpoint. Unreadable, malformed or unknown-version
    /// files are treated as absent.
    pub fn load(&self) -> Option<SetupCheckpoint> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) => {
                debug!("No setup state at {}: {}", self.path.display(), err);
                return None;
            }
        };

        let checkpoint: SetupCheckpoint = match serde_json::from_str(&content) {
            Ok(checkpoint) => checkpoint,
            Err(err) => {
                warn!("Ignoring unreadable setup state {}: {}", self.path.display(), err);
                return None;
            }
        };

        if checkpoint.version != CHECKPOINT_VERSION {
            warn!(
                "Ignoring setup state {} with unsupported version {}",
                self.path.display(),
                checkpoint.version
            );
            return None;
        }

        Some(checkpoint)
    }

    /// Write the checkpoint, readable and writable by the owner only.
    pub fn save(&self, checkpoint: &SetupCheckpoint) -> Result<()> {
        let fail = |detail: String| BridgeError::Checkpoint {
            path: self.path.display().to_string(),
            detail,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(checkpoint).map_err(|e| fail(e.to_string()))?;
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(|e| fail(e.to_string()))?;

        // mode() only applies on creation; tighten a file left by an older run
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|e| fail(e.to_string()))?;
        }

        file.write_all(content.as_bytes()).map_err(|e| fail(e.to_string()))?;

        debug!("Saved setup state to {}", self.path.display());
        Ok(())
    }

    /// Delete the checkpoint. A missing file is not an error.
    pub fn clear(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed setup state {}", self.path.display()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("Failed to remove setup state {}: {}", self.path.display(), err),
        }
    }
}
