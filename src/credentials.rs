#![forbid(unsafe_code)]

//! Service-account credential bundle and its on-disk JSON form.
//!
//! The spreadsheet client authenticates from a key file, so the bundle that
//! arrives through the environment is written out once at job start.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Google service-account key, field-for-field as the key file stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceAccount {
    #[serde(rename = "type")]
    pub key_type: Option<String>,
    pub project_id: Option<String>,
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    pub client_id: Option<String>,
    pub auth_uri: Option<String>,
    pub token_uri: String,
    pub auth_provider_x509_cert_url: Option<String>,
    pub client_x509_cert_url: Option<String>,
}

impl ServiceAccount {
    /// Environment values carry the PEM body with literal `\n` escapes.
    fn with_unescaped_key(&self) -> Self {
        Self {
            private_key: self.private_key.replace("\\n", "\n"),
            ..self.clone()
        }
    }
}

/// Writes the credential bundle to `path`, creating parent directories.
/// Any previous file at that location is replaced.
pub fn write_service_account(path: &Path, account: &ServiceAccount) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("Creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&account.with_unescaped_key())
        .context("serializing service account")?;
    fs::write(path, json).with_context(|| format!("Writing {}", path.display()))?;
    tracing::debug!(path = %path.display(), "wrote service account credentials");
    Ok(())
}
