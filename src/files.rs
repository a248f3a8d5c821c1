use anyhow::Result;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

use crate::error::BridgeError;
use crate::exec::{self, Privilege};

/// Whole-file access to root-owned configuration files.
pub trait ConfigFiles {
    fn read(&self, path: &Path) -> Result<String>;

    /// Replace the file's content in a single write.
    fn write(&self, path: &Path, content: &str) -> Result<()>;
}

/// Reads directly when permitted, falling back to `sudo cat`; writes through `sudo tee`.
pub struct PrivilegedFiles {
    privilege: Privilege,
}

impl PrivilegedFiles {
    pub fn new(privilege: Privilege) -> Self {
        Self { privilege }
    }
}

impl ConfigFiles for PrivilegedFiles {
    fn read(&self, path: &Path) -> Result<String> {
        let err = match fs::read_to_string(path) {
            Ok(content) => return Ok(content),
            Err(err) => err,
        };

        let escalate = self.privilege == Privilege::Sudo
            && matches!(err.kind(), ErrorKind::PermissionDenied | ErrorKind::NotFound);
        if !escalate {
            return Err(BridgeError::Read {
                target: path.display().to_string(),
                detail: err.to_string(),
            }
            .into());
        }

        debug!("Direct read of {} failed ({}), retrying with sudo", path.display(), err);
        let mut cmd = self.privilege.command("cat");
        cmd.arg(path);
        let output = exec::run(&mut cmd)?;
        if !output.success {
            return Err(BridgeError::Read {
                target: path.display().to_string(),
                detail: output.diagnostic(),
            }
            .into());
        }
        Ok(output.stdout)
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        if self.privilege == Privilege::Direct {
            return fs::write(path, content).map_err(|err| {
                BridgeError::Write {
                    target: path.display().to_string(),
                    detail: err.to_string(),
                }
                .into()
            });
        }

        let mut cmd = self.privilege.command("tee");
        cmd.arg(path);
        let output = exec::run_with_input(&mut cmd, content)?;
        if !output.success {
            return Err(BridgeError::Write {
                target: path.display().to_string(),
                detail: output.diagnostic(),
            }
            .into());
        }
        Ok(())
    }
}
