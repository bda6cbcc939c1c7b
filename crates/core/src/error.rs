/// Transport-facing classification of an [`ObsError`].
///
/// The REST layer maps these onto HTTP status codes; the core only cares
/// that not-found and validation failures are client errors and that
/// conflicts are surfaced verbatim, never downgraded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
}

impl ErrorKind {
    /// Stable wire identifier used in error response bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ObsError {
    #[error("no observation found with identifier {0}")]
    NotFound(String),
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("invalid {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
    #[error("unknown {kind} reference: {uuid}")]
    UnknownReference { kind: &'static str, uuid: String },
    #[error("a {datatype} concept cannot hold {supplied}")]
    ValueTypeMismatch {
        datatype: &'static str,
        supplied: &'static str,
    },
    #[error("unknown representation {0:?} (expected \"default\" or \"full\")")]
    UnknownRepresentation(String),
    #[error("a non-empty void reason is required")]
    MissingVoidReason,
    #[error("cannot purge {uuid}: {message}")]
    PurgeConflict { uuid: String, message: String },
    #[error("conflicting write on {uuid}: {message}")]
    StoreConflict { uuid: String, message: String },
}

impl ObsError {
    /// Classifies the error for transport mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ObsError::NotFound(_) => ErrorKind::NotFound,
            ObsError::MissingField(_)
            | ObsError::InvalidField { .. }
            | ObsError::UnknownReference { .. }
            | ObsError::ValueTypeMismatch { .. }
            | ObsError::UnknownRepresentation(_)
            | ObsError::MissingVoidReason => ErrorKind::Validation,
            ObsError::PurgeConflict { .. } | ObsError::StoreConflict { .. } => ErrorKind::Conflict,
        }
    }
}

pub type ObsResult<T> = std::result::Result<T, ObsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_classify_variants() {
        assert_eq!(ObsError::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            ObsError::MissingField("person").kind(),
            ErrorKind::Validation
        );
        assert_eq!(ObsError::MissingVoidReason.kind(), ErrorKind::Validation);
        assert_eq!(
            ObsError::PurgeConflict {
                uuid: "x".into(),
                message: "dependent data exists".into(),
            }
            .kind(),
            ErrorKind::Conflict
        );
    }

    #[test]
    fn messages_name_the_failing_field() {
        let err = ObsError::MissingField("obsDatetime");
        assert_eq!(err.to_string(), "obsDatetime is required");

        let err = ObsError::ValueTypeMismatch {
            datatype: "numeric",
            supplied: "text",
        };
        assert_eq!(err.to_string(), "a numeric concept cannot hold text");
    }
}
