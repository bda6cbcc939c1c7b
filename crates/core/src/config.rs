//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into
//! core services by `Arc`. Reading process-wide environment variables during
//! request handling leads to inconsistent behaviour in multi-threaded
//! runtimes and test harnesses, so none of the request paths touch the
//! environment.

use crate::error::{ObsError, ObsResult};
use obs_types::NonEmptyText;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    base_url: String,
    recorded_by: NonEmptyText,
    include_voided: bool,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// `base_url` is the absolute prefix used when rendering `self` links
    /// (trailing slash tolerated). `recorded_by` is the identity written
    /// into audit metadata for records created through this process.
    /// `include_voided` controls whether voided records stay retrievable by
    /// identifier.
    pub fn new(
        base_url: impl Into<String>,
        recorded_by: NonEmptyText,
        include_voided: bool,
    ) -> ObsResult<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ObsError::InvalidField {
                field: "base_url",
                message: "cannot be empty".into(),
            });
        }

        Ok(Self {
            base_url,
            recorded_by,
            include_voided,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn recorded_by(&self) -> &str {
        self.recorded_by.as_str()
    }

    /// Whether voided records remain retrievable by identifier. Search
    /// never returns voided records regardless of this policy.
    pub fn include_voided(&self) -> bool {
        self.include_voided
    }

    /// Absolute link to a resource, e.g. `resource_link("obs", uuid)`.
    pub fn resource_link(&self, resource: &str, uuid: &str) -> String {
        format!("{}/{}/{}", self.base_url, resource, uuid)
    }
}

/// Parse a boolean policy flag from an optional environment value.
///
/// Accepts `1/0`, `true/false`, `yes/no` (case-insensitive). `None` or an
/// empty value yields the supplied default.
pub fn include_voided_from_env_value(value: Option<String>, default: bool) -> ObsResult<bool> {
    let value = value
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty());

    match value.as_deref() {
        None => Ok(default),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some("0") | Some("false") | Some("no") => Ok(false),
        Some(other) => Err(ObsError::InvalidField {
            field: "OBS_INCLUDE_VOIDED",
            message: format!("unrecognized value {other:?}"),
        }),
    }
}
