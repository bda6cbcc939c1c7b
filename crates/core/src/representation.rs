//! Representation selection.
//!
//! Clients pick the projection depth of rendered views with the optional
//! `v` request parameter. Absent means [`Representation::Default`]; anything
//! other than the two accepted spellings is a validation error.

use crate::error::{ObsError, ObsResult};
use std::str::FromStr;

/// Requested projection depth for rendered views.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Representation {
    #[default]
    Default,
    Full,
}

impl Representation {
    pub fn as_str(self) -> &'static str {
        match self {
            Representation::Default => "default",
            Representation::Full => "full",
        }
    }

    /// Resolves the optional `v` request parameter.
    pub fn from_query(value: Option<&str>) -> ObsResult<Self> {
        match value {
            None => Ok(Representation::Default),
            Some(v) => v.parse(),
        }
    }
}

impl FromStr for Representation {
    type Err = ObsError;

    fn from_str(s: &str) -> ObsResult<Self> {
        match s {
            "default" => Ok(Representation::Default),
            "full" => Ok(Representation::Full),
            other => Err(ObsError::UnknownRepresentation(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn absent_parameter_means_default() {
        assert_eq!(
            Representation::from_query(None).unwrap(),
            Representation::Default
        );
    }

    #[test]
    fn accepted_spellings_parse() {
        assert_eq!(
            Representation::from_query(Some("default")).unwrap(),
            Representation::Default
        );
        assert_eq!(
            Representation::from_query(Some("full")).unwrap(),
            Representation::Full
        );
    }

    #[test]
    fn unknown_spelling_is_a_validation_error() {
        let err = Representation::from_query(Some("FULL")).expect_err("case-sensitive");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
