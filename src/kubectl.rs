// Copyright (c) 2025 Sean McNamara <smcnam@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_trait::async_trait;
use std::ffi::OsString;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::ClusterFlags;
use crate::constants::KUBECTL;
use crate::error::{ApplyError, ContextLookupError};
use crate::session::{ContextLookup, ManifestApplier};

/// Applies manifests and reads the active context through the kubectl CLI.
pub struct Kubectl {
    program: OsString,
    flags: ClusterFlags,
}

impl Kubectl {
    pub fn new(flags: ClusterFlags) -> Self {
        Self::with_program(KUBECTL, flags)
    }

    pub fn with_program(program: impl Into<OsString>, flags: ClusterFlags) -> Self {
        Self {
            program: program.into(),
            flags,
        }
    }

    /// The child is killed if the caller stops waiting on it (e.g. Ctrl-C).
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.flags.kubectl_args()).kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ManifestApplier for Kubectl {
    async fn apply(&self, manifest: &str) -> Result<(), ApplyError> {
        let mut child = self
            .command()
            .args(["apply", "-f", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ApplyError::Spawn)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(manifest.as_bytes())
                .await
                .map_err(ApplyError::Stdin)?;
            // Dropping stdin closes the pipe so kubectl sees EOF.
        }

        let output = child.wait_with_output().await.map_err(ApplyError::Spawn)?;
        if !output.status.success() {
            return Err(ApplyError::Kubectl {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!("manifest applied");
        Ok(())
    }
}

#[async_trait]
impl ContextLookup for Kubectl {
    async fn current_context(&self) -> Result<String, ContextLookupError> {
        if let Some(ref context) = self.flags.context {
            return Ok(context.clone());
        }

        let output = self
            .command()
            .args(["config", "current-context"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(ContextLookupError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ContextLookupError::Kubectl(stderr));
        }

        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if name.is_empty() {
            return Err(ContextLookupError::Unset);
        }
        Ok(name)
    }
}
