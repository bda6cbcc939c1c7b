//! Inbound create/update payloads.
//!
//! Payloads are flat JSON objects with camelCase keys. Unrecognized fields
//! are ignored so clients can post richer documents than this service
//! understands. Reference-valued fields carry the referenced entity's
//! identifier string; resolution against the store happens in the service.

use crate::error::{ObsError, ObsResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use utoipa::ToSchema;

/// Create/update request body.
///
/// Every field is optional at the parsing layer; which ones are required is
/// an operation-level decision (create demands person, concept and
/// obsDatetime, update treats absent fields as "keep the prior value").
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ObsPayload {
    /// Identifier of the subject.
    pub person: Option<String>,
    /// Identifier of the concept being observed.
    pub concept: Option<String>,
    /// Generic value; interpreted according to the concept's datatype.
    #[schema(value_type = Object)]
    pub value: Option<serde_json::Value>,
    pub value_numeric: Option<f64>,
    pub value_text: Option<String>,
    /// Identifier of an answer concept.
    pub value_coded: Option<String>,
    /// Handle of binary data held outside the record store.
    pub value_complex: Option<String>,
    /// RFC 3339 timestamp or bare `YYYY-MM-DD` date.
    pub obs_datetime: Option<String>,
    /// Identifier of the location the observation was taken at.
    pub location: Option<String>,
    /// Identifier of the group parent record.
    pub obs_group: Option<String>,
    pub comment: Option<String>,
}

/// A supplied value before it is checked against the concept datatype.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueInput {
    Number(f64),
    Text(String),
}

impl ObsPayload {
    /// Extracts the supplied value, if any.
    ///
    /// Typed fields win over the generic `value` field; among the typed
    /// fields the first populated one is used. The generic field accepts a
    /// JSON number or string, anything else is rejected.
    pub fn value_input(&self) -> ObsResult<Option<ValueInput>> {
        if let Some(n) = self.value_numeric {
            return Ok(Some(ValueInput::Number(n)));
        }
        if let Some(t) = &self.value_text {
            return Ok(Some(ValueInput::Text(t.clone())));
        }
        if let Some(c) = &self.value_coded {
            return Ok(Some(ValueInput::Text(c.clone())));
        }
        if let Some(c) = &self.value_complex {
            return Ok(Some(ValueInput::Text(c.clone())));
        }

        match &self.value {
            None => Ok(None),
            Some(serde_json::Value::Number(n)) => {
                let n = n.as_f64().ok_or_else(|| ObsError::InvalidField {
                    field: "value",
                    message: "number out of range".into(),
                })?;
                Ok(Some(ValueInput::Number(n)))
            }
            Some(serde_json::Value::String(s)) => Ok(Some(ValueInput::Text(s.clone()))),
            Some(other) => Err(ObsError::InvalidField {
                field: "value",
                message: format!("expected a number or string, got {other}"),
            }),
        }
    }

    /// Parses `obsDatetime`, when present.
    pub fn obs_datetime(&self) -> ObsResult<Option<DateTime<Utc>>> {
        self.obs_datetime
            .as_deref()
            .map(parse_obs_datetime)
            .transpose()
    }
}

/// Parses an observation timestamp.
///
/// Accepts a full RFC 3339 timestamp or a bare date, which is taken as
/// midnight UTC.
pub fn parse_obs_datetime(raw: &str) -> ObsResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| {
            ObsError::InvalidField {
                field: "obsDatetime",
                message: format!("invalid date {raw:?}"),
            }
        })?;
        return Ok(midnight.and_utc());
    }
    Err(ObsError::InvalidField {
        field: "obsDatetime",
        message: format!("expected RFC 3339 or YYYY-MM-DD, got {raw:?}"),
    })
}
