// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Secret backend support for encrypted credentials.
//!
//! Credentials may be given as `ENC[<handle>]`. Such values are resolved by an
//! external command speaking a small JSON protocol:
//!
//! - **stdin**: `{"version": "1.0", "secrets": ["handle1", "handle2"]}`
//! - **stdout**: `{"handle1": {"value": "...", "error": null}, ...}`
//!
//! Every requested handle must be present in the response with a non-empty value
//! and no error, otherwise the whole call fails.
//!
//! # Example
//!
//! ```rust,no_run
//! use datadog_operator::secrets::{CommandDecryptor, Decryptor, SecretBackendConfig};
//!
//! # async fn example() -> Result<(), datadog_operator::errors::DecryptError> {
//! let decryptor = CommandDecryptor::new(SecretBackendConfig {
//!     command: Some("/readsecret.sh".into()),
//!     ..Default::default()
//! });
//! let plain = decryptor.decrypt(&["ENC[api_key]".to_string()]).await?;
//! # Ok(())
//! # }
//! ```

use crate::constants::{
    DEFAULT_SECRET_BACKEND_OUTPUT_MAX_BYTES, DEFAULT_SECRET_BACKEND_TIMEOUT_SECS, ENC_PREFIX,
    ENC_SUFFIX, SECRET_BACKEND_PAYLOAD_VERSION,
};
use crate::errors::DecryptError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::ChildStdin;
use tracing::{debug, warn};

/// Returns `true` when `value` is an encrypted `ENC[...]` credential.
#[must_use]
pub fn is_enc(value: &str) -> bool {
    value.len() >= ENC_PREFIX.len() + ENC_SUFFIX.len()
        && value.starts_with(ENC_PREFIX)
        && value.ends_with(ENC_SUFFIX)
}

/// Extract the handle from an `ENC[handle]` value.
///
/// Returns `None` when the value is not encrypted.
#[must_use]
pub fn handle_of(value: &str) -> Option<&str> {
    if !is_enc(value) {
        return None;
    }
    Some(value[ENC_PREFIX.len()..value.len() - ENC_SUFFIX.len()].trim())
}

/// Resolves encrypted credential values into plaintext.
#[async_trait]
pub trait Decryptor: Send + Sync {
    /// Decrypt a batch of `ENC[...]` values.
    ///
    /// # Returns
    ///
    /// A map from each encrypted value, as given, to its plaintext.
    ///
    /// # Errors
    ///
    /// Returns an error when any value cannot be resolved.
    async fn decrypt(&self, encrypted: &[String]) -> Result<HashMap<String, String>, DecryptError>;
}

/// Configuration of the secret backend command.
#[derive(Clone, Debug)]
pub struct SecretBackendConfig {
    /// Executable to run. `None` disables decryption.
    pub command: Option<PathBuf>,
    /// Extra arguments passed to the command.
    pub args: Vec<String>,
    /// Maximum run time of one invocation.
    pub timeout: Duration,
    /// Maximum accepted size of the command output.
    pub output_max_bytes: usize,
}

impl Default for SecretBackendConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_SECRET_BACKEND_TIMEOUT_SECS),
            output_max_bytes: DEFAULT_SECRET_BACKEND_OUTPUT_MAX_BYTES,
        }
    }
}

#[derive(Serialize)]
struct SecretPayload<'a> {
    version: &'a str,
    secrets: Vec<&'a str>,
}

#[derive(Deserialize)]
struct SecretResponse {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// [`Decryptor`] running the configured secret backend command.
#[derive(Clone, Debug)]
pub struct CommandDecryptor {
    config: SecretBackendConfig,
}

impl CommandDecryptor {
    #[must_use]
    pub fn new(config: SecretBackendConfig) -> Self {
        Self { config }
    }

    /// Run the command once with `payload` on stdin and return its stdout.
    async fn run(&self, command: &PathBuf, payload: &[u8]) -> Result<Vec<u8>, DecryptError> {
        let command_name = command.display().to_string();

        let mut cmd = tokio::process::Command::new(command);
        cmd.args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| DecryptError::Spawn {
            command: command_name.clone(),
            reason: e.to_string(),
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = self.config.output_max_bytes;

        // Reads are capped so a runaway command cannot grow the buffers past the limit.
        let exchange = async {
            let ((), stdout, stderr) = tokio::try_join!(
                write_payload(stdin, payload, &command_name),
                read_capped(stdout, limit, &command_name),
                read_capped(stderr, limit, &command_name),
            )?;
            let status = child.wait().await.map_err(|e| DecryptError::Spawn {
                command: command_name.clone(),
                reason: e.to_string(),
            })?;
            Ok::<_, DecryptError>(Output {
                status,
                stdout,
                stderr,
            })
        };

        // Dropping the child on any early return kills it.
        let output = tokio::time::timeout(self.config.timeout, exchange)
            .await
            .map_err(|_| DecryptError::Timeout {
                command: command_name.clone(),
                timeout_secs: self.config.timeout.as_secs(),
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                command = %command_name,
                exit_code = ?output.status.code(),
                "Secret backend command failed"
            );
            return Err(DecryptError::CommandFailed {
                command: command_name,
                code: output.status.code(),
                stderr,
            });
        }

        Ok(output.stdout)
    }
}

async fn write_payload(
    stdin: Option<ChildStdin>,
    payload: &[u8],
    command: &str,
) -> Result<(), DecryptError> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };
    let written = match stdin.write_all(payload).await {
        Ok(()) => stdin.shutdown().await,
        Err(e) => Err(e),
    };
    match written {
        Ok(()) => Ok(()),
        // The command may exit without reading its input.
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            debug!(command = %command, "Secret backend closed stdin early");
            Ok(())
        }
        Err(e) => Err(DecryptError::Spawn {
            command: command.to_string(),
            reason: format!("failed to write payload: {e}"),
        }),
    }
}

/// Read `pipe` to its end, failing as soon as it yields more than `limit` bytes.
async fn read_capped<R>(pipe: Option<R>, limit: usize, command: &str) -> Result<Vec<u8>, DecryptError>
where
    R: AsyncRead + Unpin,
{
    let Some(pipe) = pipe else {
        return Ok(Vec::new());
    };
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let mut buf = Vec::new();
    pipe.take(cap)
        .read_to_end(&mut buf)
        .await
        .map_err(|e| DecryptError::Spawn {
            command: command.to_string(),
            reason: format!("failed to read output: {e}"),
        })?;
    if buf.len() > limit {
        return Err(DecryptError::OutputTooLarge { limit });
    }
    Ok(buf)
}

#[async_trait]
impl Decryptor for CommandDecryptor {
    async fn decrypt(&self, encrypted: &[String]) -> Result<HashMap<String, String>, DecryptError> {
        let Some(command) = self.config.command.as_ref() else {
            return Err(DecryptError::NotConfigured);
        };

        // Handle -> encrypted values carrying it
        let mut wanted: HashMap<&str, Vec<&String>> = HashMap::new();
        for value in encrypted {
            if let Some(handle) = handle_of(value) {
                wanted.entry(handle).or_default().push(value);
            }
        }
        if wanted.is_empty() {
            return Ok(HashMap::new());
        }

        let mut handles: Vec<&str> = wanted.keys().copied().collect();
        handles.sort_unstable();

        let payload = serde_json::to_vec(&SecretPayload {
            version: SECRET_BACKEND_PAYLOAD_VERSION,
            secrets: handles.clone(),
        })
        .map_err(|e| DecryptError::InvalidResponse {
            reason: format!("failed to encode payload: {e}"),
        })?;

        debug!(count = handles.len(), "Calling secret backend");
        let stdout = self.run(command, &payload).await?;

        let mut responses: HashMap<String, SecretResponse> = serde_json::from_slice(&stdout)
            .map_err(|e| DecryptError::InvalidResponse {
                reason: e.to_string(),
            })?;

        let mut decrypted = HashMap::new();
        for handle in handles {
            let response = responses
                .remove(handle)
                .ok_or_else(|| DecryptError::MissingHandle {
                    handle: handle.to_string(),
                })?;

            if let Some(error) = response.error.filter(|e| !e.is_empty()) {
                return Err(DecryptError::HandleError {
                    handle: handle.to_string(),
                    error,
                });
            }

            let value = response
                .value
                .filter(|v| !v.is_empty())
                .ok_or_else(|| DecryptError::EmptyValue {
                    handle: handle.to_string(),
                })?;

            for original in &wanted[handle] {
                decrypted.insert((*original).clone(), value.clone());
            }
        }

        Ok(decrypted)
    }
}
