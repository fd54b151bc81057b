//! Configuration module
//!
//! Engine-wide defaults for attachment policy, the backend endpoint used by
//! the HTTP transport, and the optional local draft directory.

use std::env;
use std::path::PathBuf;

use crate::validation::AttachmentPolicy;

const MAX_ATTACHMENT_MB: u64 = 5;
const REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_ALLOWED_CONTENT_TYPES: &str = "image/jpeg,image/png,image/webp,application/pdf";

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub max_attachment_size_bytes: u64,
    pub allowed_content_types: Vec<String>,
    pub api_url: String,
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,
    /// Directory for local drafts; drafts are disabled when unset.
    pub draft_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attachment_size_bytes: MAX_ATTACHMENT_MB * 1024 * 1024,
            allowed_content_types: split_list(DEFAULT_ALLOWED_CONTENT_TYPES),
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            draft_dir: None,
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_attachment_mb = match lookup("FLEETFORM_MAX_ATTACHMENT_MB") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                anyhow::anyhow!("FLEETFORM_MAX_ATTACHMENT_MB must be a valid number")
            })?,
            None => MAX_ATTACHMENT_MB,
        };
        let max_attachment_size_bytes = max_attachment_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| anyhow::anyhow!("FLEETFORM_MAX_ATTACHMENT_MB must be a valid number"))?;

        let allowed_content_types = split_list(
            &lookup("FLEETFORM_ALLOWED_CONTENT_TYPES")
                .unwrap_or_else(|| DEFAULT_ALLOWED_CONTENT_TYPES.to_string()),
        );

        let api_url = lookup("FLEETFORM_API_URL")
            .or_else(|| lookup("API_URL"))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let request_timeout_secs = lookup("FLEETFORM_REQUEST_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(REQUEST_TIMEOUT_SECS);

        let config = EngineConfig {
            max_attachment_size_bytes,
            allowed_content_types,
            api_url,
            api_token: lookup("FLEETFORM_API_TOKEN").filter(|t| !t.trim().is_empty()),
            request_timeout_secs,
            draft_dir: lookup("FLEETFORM_DRAFT_DIR")
                .filter(|d| !d.trim().is_empty())
                .map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_attachment_size_bytes == 0 {
            return Err(anyhow::anyhow!(
                "FLEETFORM_MAX_ATTACHMENT_MB must be greater than 0"
            ));
        }
        if self.allowed_content_types.is_empty() {
            return Err(anyhow::anyhow!(
                "FLEETFORM_ALLOWED_CONTENT_TYPES must list at least one content type"
            ));
        }
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "FLEETFORM_API_URL must be an http(s) URL, got '{}'",
                self.api_url
            ));
        }
        Ok(())
    }

    pub fn attachment_policy(&self) -> AttachmentPolicy {
        AttachmentPolicy::new(
            self.max_attachment_size_bytes,
            self.allowed_content_types.clone(),
        )
    }
}
