//! Domain model for observation records.
//!
//! An [`Obs`] is one clinical measurement or finding tied to a person and a
//! concept. Records are never edited in place: a superseding update voids
//! the current record and inserts a successor with a fresh identifier, so
//! the lifecycle is the two-state machine captured by [`ObsState`].

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Datatype of a concept, determining which value an observation of that
/// concept may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConceptDatatype {
    Numeric,
    Text,
    Coded,
    Complex,
    /// Grouping concepts carry no value of their own.
    NotApplicable,
}

impl ConceptDatatype {
    pub fn as_str(self) -> &'static str {
        match self {
            ConceptDatatype::Numeric => "numeric",
            ConceptDatatype::Text => "text",
            ConceptDatatype::Coded => "coded",
            ConceptDatatype::Complex => "complex",
            ConceptDatatype::NotApplicable => "n/a",
        }
    }
}

/// A coded definition from the concept dictionary.
///
/// The dictionary itself is owned by the record store; the core only reads
/// entries to resolve references and validate values.
#[derive(Clone, Debug, PartialEq)]
pub struct Concept {
    pub uuid: String,
    pub display: String,
    pub datatype: ConceptDatatype,
}

/// The subject of an observation.
#[derive(Clone, Debug, PartialEq)]
pub struct Person {
    pub uuid: String,
    pub display: String,
}

/// Where an observation was taken.
#[derive(Clone, Debug, PartialEq)]
pub struct Location {
    pub uuid: String,
    pub display: String,
}

/// The value an observation carries, selected by its concept's datatype.
#[derive(Clone, Debug, PartialEq)]
pub enum ObsValue {
    /// Grouping records have no value of their own.
    None,
    Numeric(f64),
    Text(String),
    /// Answer drawn from the concept dictionary.
    Coded(Concept),
    /// Handle of binary data held outside the record store.
    Complex(String),
}

impl ObsValue {
    /// Human-readable rendering used in record display strings.
    pub fn display(&self) -> String {
        match self {
            ObsValue::None => String::new(),
            ObsValue::Numeric(n) => format_numeric(*n),
            ObsValue::Text(t) => t.clone(),
            ObsValue::Coded(c) => c.display.clone(),
            ObsValue::Complex(handle) => format!("(complex data: {handle})"),
        }
    }
}

/// Renders a numeric value the way it is charted: whole numbers keep one
/// decimal place so "150.0" stays "150.0".
pub(crate) fn format_numeric(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Who recorded the observation and when it was created/changed.
#[derive(Clone, Debug, PartialEq)]
pub struct AuditInfo {
    pub creator: String,
    pub date_created: DateTime<Utc>,
    pub date_changed: Option<DateTime<Utc>>,
}

impl AuditInfo {
    pub fn new(creator: impl Into<String>, date_created: DateTime<Utc>) -> Self {
        Self {
            creator: creator.into(),
            date_created,
            date_changed: None,
        }
    }
}

/// Lifecycle state of a record.
///
/// `Active → Voided` is the only transition, triggered by an explicit void
/// or by a superseding update. `Voided` is terminal for the identifier; a
/// successor record always gets a fresh identifier.
#[derive(Clone, Debug, PartialEq)]
pub enum ObsState {
    Active,
    Voided {
        reason: String,
        date_voided: DateTime<Utc>,
    },
}

/// A single observation record.
#[derive(Clone, Debug, PartialEq)]
pub struct Obs {
    /// Stable identifier, never changed across the record's lifecycle.
    pub uuid: String,
    pub person: Person,
    pub concept: Concept,
    pub value: ObsValue,
    pub obs_datetime: DateTime<Utc>,
    pub location: Option<Location>,
    /// Identifier of the group parent, when this record is a group member.
    pub obs_group: Option<String>,
    /// Identifier of the record this one superseded, if any.
    pub previous_version: Option<String>,
    pub comment: Option<String>,
    pub state: ObsState,
    pub audit: AuditInfo,
}

impl Obs {
    /// Builds a new active record with a freshly generated identifier.
    pub fn new(
        person: Person,
        concept: Concept,
        value: ObsValue,
        obs_datetime: DateTime<Utc>,
        creator: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            person,
            concept,
            value,
            obs_datetime,
            location: None,
            obs_group: None,
            previous_version: None,
            comment: None,
            state: ObsState::Active,
            audit: AuditInfo::new(creator, now),
        }
    }

    pub fn is_voided(&self) -> bool {
        matches!(self.state, ObsState::Voided { .. })
    }

    pub fn void_reason(&self) -> Option<&str> {
        match &self.state {
            ObsState::Active => None,
            ObsState::Voided { reason, .. } => Some(reason),
        }
    }

    /// Transitions `Active → Voided`. Voided is terminal: a second void is
    /// a no-op and the original reason is kept.
    pub fn mark_voided(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        if self.is_voided() {
            return;
        }
        self.state = ObsState::Voided {
            reason: reason.into(),
            date_voided: now,
        };
        self.audit.date_changed = Some(now);
    }

    /// Summary string shown on every rendered view, e.g. `WEIGHT (KG): 150.0`.
    pub fn display(&self) -> String {
        match &self.value {
            ObsValue::None => self.concept.display.clone(),
            value => format!("{}: {}", self.concept.display, value.display()),
        }
    }
}
