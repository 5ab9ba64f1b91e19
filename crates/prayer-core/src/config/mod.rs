//! Remote connection settings.
//!
//! The engine works without a remote: when neither the project URL nor the
//! anon key is set, every mutation is queued locally. Supplying only one of
//! the two is a configuration error.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const SUPABASE_ANON_KEY_ENV: &str = "SUPABASE_ANON_KEY";
pub const SUPABASE_ACCESS_TOKEN_ENV: &str = "SUPABASE_ACCESS_TOKEN";

/// Raw, unvalidated remote settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    /// Signed-in user's token; the anon key is used as bearer when absent
    #[serde(default)]
    pub access_token: Option<String>,
}

impl RemoteConfig {
    /// Read settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            supabase_url: lookup(SUPABASE_URL_ENV),
            supabase_anon_key: lookup(SUPABASE_ANON_KEY_ENV),
            access_token: lookup(SUPABASE_ACCESS_TOKEN_ENV),
        }
    }

    pub fn is_configured(&self) -> bool {
        normalize_text_option(self.supabase_url.clone()).is_some()
            && normalize_text_option(self.supabase_anon_key.clone()).is_some()
    }

    /// Validate and normalize into a usable endpoint.
    ///
    /// Returns `Ok(None)` when no remote is configured at all.
    pub fn resolve(&self) -> Result<Option<RemoteEndpoint>> {
        let url = normalize_text_option(self.supabase_url.clone());
        let anon_key = normalize_text_option(self.supabase_anon_key.clone());

        let (url, anon_key) = match (url, anon_key) {
            (None, None) => return Ok(None),
            (Some(url), Some(anon_key)) => (url, anon_key),
            (Some(_), None) => {
                return Err(Error::Configuration(format!(
                    "{SUPABASE_ANON_KEY_ENV} is required when {SUPABASE_URL_ENV} is set"
                )))
            }
            (None, Some(_)) => {
                return Err(Error::Configuration(format!(
                    "{SUPABASE_URL_ENV} is required when {SUPABASE_ANON_KEY_ENV} is set"
                )))
            }
        };

        if !is_http_url(&url) {
            return Err(Error::Configuration(format!(
                "{SUPABASE_URL_ENV} must include http:// or https://"
            )));
        }

        let base = url.trim_end_matches('/');
        let rest_url = if base.ends_with("/rest/v1") {
            base.to_string()
        } else {
            format!("{base}/rest/v1")
        };

        Ok(Some(RemoteEndpoint {
            rest_url,
            anon_key,
            access_token: normalize_text_option(self.access_token.clone()),
        }))
    }
}

/// Validated PostgREST endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    /// Base URL ending in `/rest/v1`, without a trailing slash
    pub rest_url: String,
    pub anon_key: String,
    pub access_token: Option<String>,
}

impl RemoteEndpoint {
    /// Token sent as `Authorization: Bearer`
    pub fn bearer(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.anon_key)
    }
}

impl fmt::Debug for RemoteEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RemoteEndpoint")
            .field("rest_url", &self.rest_url)
            .field("anon_key", &"[REDACTED]")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(url: Option<&str>, key: Option<&str>) -> RemoteConfig {
        RemoteConfig {
            supabase_url: url.map(str::to_string),
            supabase_anon_key: key.map(str::to_string),
            access_token: None,
        }
    }

    #[test]
    fn unconfigured_remote_resolves_to_none() {
        assert_eq!(config(None, Some("   ")).resolve().unwrap(), None);
        assert!(!config(None, None).is_configured());
    }

    #[test]
    fn half_configured_remote_is_an_error() {
        let error = config(Some("https://project.supabase.co"), None)
            .resolve()
            .unwrap_err();
        assert!(error.to_string().contains(SUPABASE_ANON_KEY_ENV));
    }

    #[test]
    fn rejects_urls_without_scheme() {
        assert!(config(Some("project.supabase.co"), Some("anon"))
            .resolve()
            .is_err());
    }

    #[test]
    fn appends_rest_path_once() {
        let endpoint = config(Some(" https://project.supabase.co/ "), Some("anon"))
            .resolve()
            .unwrap()
            .unwrap();
        assert_eq!(endpoint.rest_url, "https://project.supabase.co/rest/v1");

        let endpoint = config(Some("https://project.supabase.co/rest/v1/"), Some("anon"))
            .resolve()
            .unwrap()
            .unwrap();
        assert_eq!(endpoint.rest_url, "https://project.supabase.co/rest/v1");
    }

    #[test]
    fn bearer_prefers_access_token() {
        let mut raw = config(Some("https://project.supabase.co"), Some("anon"));
        assert_eq!(raw.resolve().unwrap().unwrap().bearer(), "anon");

        raw.access_token = Some("user-token".to_string());
        assert_eq!(raw.resolve().unwrap().unwrap().bearer(), "user-token");
    }

    #[test]
    fn debug_output_redacts_keys() {
        let endpoint = config(Some("https://project.supabase.co"), Some("secret-anon"))
            .resolve()
            .unwrap()
            .unwrap();
        let rendered = format!("{endpoint:?}");
        assert!(!rendered.contains("secret-anon"));
    }

    #[test]
    fn lookup_reads_all_three_keys() {
        let raw = RemoteConfig::from_lookup(|key| Some(format!("value-of-{key}")));
        assert_eq!(
            raw.access_token.as_deref(),
            Some("value-of-SUPABASE_ACCESS_TOKEN")
        );
        assert!(raw.is_configured());
    }
}
