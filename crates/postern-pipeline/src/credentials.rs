//! Credential store boundary.
//!
//! Credentials are read when a request is signed and never written,
//! generated or cached.

use std::fmt;

pub use postern_sigv4::Credentials;

use crate::error::PipelineError;

pub const ACCESS_KEY_ID_VAR: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_ACCESS_KEY_VAR: &str = "AWS_SECRET_ACCESS_KEY";
pub const SESSION_TOKEN_VAR: &str = "AWS_SESSION_TOKEN";
pub const REGION_VARS: &[&str] = &["AWS_REGION", "AWS_DEFAULT_REGION"];

/// Supplies auth material for gateway calls.
pub trait CredentialStore {
    fn credentials(&self) -> Result<Credentials, PipelineError>;

    /// Region advertised by the store, if any.
    fn region(&self) -> Option<String>;
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads the standard `AWS_*` environment variables, as exported by CI
/// secret stores.
pub struct EnvCredentialStore {
    lookup: Lookup,
}

impl EnvCredentialStore {
    pub fn new() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    /// Use a custom variable source instead of the process environment.
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &str) -> Result<String, PipelineError> {
        self.var(name)
            .ok_or_else(|| PipelineError::Credentials(format!("{} is not set", name)))
    }
}

impl Default for EnvCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EnvCredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvCredentialStore").finish_non_exhaustive()
    }
}

impl CredentialStore for EnvCredentialStore {
    fn credentials(&self) -> Result<Credentials, PipelineError> {
        Ok(Credentials {
            access_key_id: self.required(ACCESS_KEY_ID_VAR)?,
            secret_access_key: self.required(SECRET_ACCESS_KEY_VAR)?,
            session_token: self.var(SESSION_TOKEN_VAR),
        })
    }

    fn region(&self) -> Option<String> {
        REGION_VARS.iter().find_map(|name| self.var(name))
    }
}

/// Fixed credentials, for local gateways and tests.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    pub credentials: Credentials,
    pub region: Option<String>,
}

impl CredentialStore for StaticCredentials {
    fn credentials(&self) -> Result<Credentials, PipelineError> {
        Ok(self.credentials.clone())
    }

    fn region(&self) -> Option<String> {
        self.region.clone()
    }
}
