use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub identity: IdentitySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Identity provider settings. Both values are optional at load time:
/// a missing secret is reported per request as HTTP 500, never as a
/// startup panic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentitySettings {
    pub base_url: Option<String>,
    pub service_role_key: Option<String>,
}

impl IdentitySettings {
    fn from_env() -> Self {
        Self {
            base_url: read_non_empty("SUPABASE_URL"),
            service_role_key: read_non_empty("DELETE_ACCOUNT_SERVICE_ROLE_KEY"),
        }
    }

    /// Returns both secrets, or `None` when either is absent.
    pub fn resolved(&self) -> Option<(&str, &str)> {
        match (self.base_url.as_deref(), self.service_role_key.as_deref()) {
            (Some(url), Some(key)) => Some((url, key)),
            _ => None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        Self {
            environment,
            identity: IdentitySettings::from_env(),
        }
    }
}

// An empty value counts as unset, matching the upstream falsy check.
fn read_non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
