// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Datadog credential resolution for forwarders.
//!
//! Each key is resolved independently, in order of priority:
//!
//! 1. A non-empty literal in the object's spec
//! 2. A Secret reference in the object's spec (namespace of the object)
//! 3. The operator-level default
//!
//! Values of the form `ENC[handle]` are then decrypted through the [`Decryptor`],
//! with a per-forwarder cache keyed by encrypted value.

use super::reader::ClusterReader;
use crate::constants::{DEFAULT_API_KEY_KEY, DEFAULT_APP_KEY_KEY};
use crate::crd::{AgentCredentials, SecretKeyRef};
use crate::errors::{CredentialError, DecryptError};
use crate::metrics::record_secret_resolution;
use crate::secrets::{is_enc, Decryptor};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hash of an API/APP key pair, used to detect credential rotation.
///
/// FNV-1 64-bit over the API key bytes followed by the APP key bytes. This is a
/// change detector, not a security boundary.
#[must_use]
pub fn hash_keys(api_key: &str, app_key: &str) -> u64 {
    api_key
        .bytes()
        .chain(app_key.bytes())
        .fold(FNV_OFFSET_BASIS, |hash, byte| {
            hash.wrapping_mul(FNV_PRIME) ^ u64::from(byte)
        })
}

/// Operator-level credentials used when an object does not provide its own.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct OperatorCredentials {
    pub api_key: Option<String>,
    pub app_key: Option<String>,
}

impl fmt::Debug for OperatorCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorCredentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("app_key", &self.app_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Plaintext API/APP key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub app_key: String,
}

impl Credentials {
    /// See [`hash_keys`].
    #[must_use]
    pub fn hash(&self) -> u64 {
        hash_keys(&self.api_key, &self.app_key)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("app_key", &"<redacted>")
            .finish()
    }
}

/// Resolves credentials for one forwarder and owns its decryption cache.
pub struct CredentialResolver {
    decryptor: Arc<dyn Decryptor>,
    defaults: OperatorCredentials,
    cache: HashMap<String, String>,
}

impl CredentialResolver {
    #[must_use]
    pub fn new(decryptor: Arc<dyn Decryptor>, defaults: OperatorCredentials) -> Self {
        Self {
            decryptor,
            defaults,
            cache: HashMap::new(),
        }
    }

    /// Resolve plaintext credentials for an object.
    ///
    /// # Arguments
    ///
    /// * `reader` - Used to read referenced Secrets
    /// * `namespace` - Namespace of the object, where referenced Secrets live
    /// * `spec` - Credentials declared by the object, `None` to use operator defaults only
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced Secret cannot be read, if the API key and
    /// then the APP key resolve to empty, or if decryption fails.
    pub async fn resolve(
        &mut self,
        reader: &dyn ClusterReader,
        namespace: &str,
        spec: Option<&AgentCredentials>,
    ) -> Result<Credentials, CredentialError> {
        let api_key = pick_key(
            reader,
            namespace,
            spec.and_then(|c| c.api_key.as_deref()),
            spec.and_then(|c| c.api_secret.as_ref()),
            DEFAULT_API_KEY_KEY,
            self.defaults.api_key.as_deref(),
        )
        .await?;
        let app_key = pick_key(
            reader,
            namespace,
            spec.and_then(|c| c.app_key.as_deref()),
            spec.and_then(|c| c.app_secret.as_ref()),
            DEFAULT_APP_KEY_KEY,
            self.defaults.app_key.as_deref(),
        )
        .await?;

        if api_key.is_empty() {
            return Err(CredentialError::EmptyApiKey);
        }
        if app_key.is_empty() {
            return Err(CredentialError::EmptyAppKey);
        }

        self.decrypt_if_needed(api_key, app_key).await
    }

    /// Replace `ENC[...]` values with their plaintext, using the cache when possible.
    ///
    /// # Errors
    ///
    /// Returns an error if the decryptor fails or omits a value.
    pub async fn decrypt_if_needed(
        &mut self,
        api_key: String,
        app_key: String,
    ) -> Result<Credentials, CredentialError> {
        let encrypted: Vec<String> = [&api_key, &app_key]
            .into_iter()
            .filter(|value| is_enc(value))
            .cloned()
            .collect();

        if encrypted.is_empty() {
            return Ok(Credentials { api_key, app_key });
        }

        if encrypted.iter().all(|value| self.cache.contains_key(value)) {
            record_secret_resolution("cache_hit");
            return self.lookup(api_key, app_key);
        }

        debug!(count = encrypted.len(), "Decrypting credentials through the secret backend");
        let decrypted = match self.decryptor.decrypt(&encrypted).await {
            Ok(decrypted) => decrypted,
            Err(e) => {
                record_secret_resolution("error");
                error!(error = %e, "Cannot decrypt secrets");
                return Err(e.into());
            }
        };
        record_secret_resolution("decrypted");

        self.cache = decrypted;
        self.lookup(api_key, app_key)
    }

    /// Map possibly-encrypted values through the cache.
    fn lookup(&self, api_key: String, app_key: String) -> Result<Credentials, CredentialError> {
        let plain = |value: String| -> Result<String, CredentialError> {
            if !is_enc(&value) {
                return Ok(value);
            }
            self.cache
                .get(&value)
                .cloned()
                .ok_or_else(|| DecryptError::MissingHandle { handle: value }.into())
        };
        Ok(Credentials {
            api_key: plain(api_key)?,
            app_key: plain(app_key)?,
        })
    }

    /// Number of cached plaintext values.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

/// Resolve one key from literal, Secret reference, then default.
async fn pick_key(
    reader: &dyn ClusterReader,
    namespace: &str,
    literal: Option<&str>,
    secret_ref: Option<&SecretKeyRef>,
    default_key_name: &str,
    default: Option<&str>,
) -> Result<String, CredentialError> {
    if let Some(value) = literal.filter(|v| !v.is_empty()) {
        return Ok(value.to_string());
    }

    if let Some(secret_ref) = secret_ref {
        let key_name = secret_ref
            .key_name
            .as_deref()
            .filter(|k| !k.is_empty())
            .unwrap_or(default_key_name);
        return read_secret_key(reader, namespace, &secret_ref.secret_name, key_name).await;
    }

    Ok(default.unwrap_or_default().to_string())
}

/// Read `key` from a Secret; a missing key yields an empty value.
async fn read_secret_key(
    reader: &dyn ClusterReader,
    namespace: &str,
    name: &str,
    key: &str,
) -> Result<String, CredentialError> {
    let secret = reader
        .secret(namespace, name)
        .await
        .map_err(|e| CredentialError::SecretRead {
            namespace: namespace.to_string(),
            name: name.to_string(),
            reason: e.to_string(),
        })?;

    Ok(secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|bytes| String::from_utf8_lossy(&bytes.0).into_owned())
        .unwrap_or_default())
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod credentials_tests;
