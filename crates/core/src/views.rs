//! Representation rendering.
//!
//! [`render`] is a pure projection from a record to a view: no store access,
//! no clock, no environment. Which fields appear is decided entirely by the
//! requested [`Representation`], and the two shapes are separate types so a
//! caller can only read what the depth actually carries.
//!
//! Reference fields are rendered shallow at `default` depth and expanded to
//! their own default projection at `full` depth. Expansion is bounded at one
//! level, so back-references can never recurse.

use crate::config::CoreConfig;
use crate::model::{Concept, Location, Obs, ObsValue, Person};
use crate::representation::Representation;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Shallow rendering of a referenced entity.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct RefStub {
    pub uuid: String,
    pub display: String,
}

/// Default projection of a referenced entity: the stub plus a self link.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct RefView {
    pub uuid: String,
    pub display: String,
    pub link: String,
}

/// Full-depth rendering of a concept reference.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ConceptView {
    pub uuid: String,
    pub display: String,
    pub link: String,
    pub datatype: String,
}

/// Rendered observation value.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum ValueView {
    Null,
    Number(f64),
    Text(String),
    Coded(RefStub),
}

/// Audit metadata, rendered only at `full` depth.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditView {
    pub creator: String,
    pub date_created: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_changed: Option<DateTime<Utc>>,
}

/// `default` projection: identifier, display, link, subject, concept, value.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DefaultObsView {
    pub uuid: String,
    pub display: String,
    pub link: String,
    pub person: RefStub,
    pub concept: RefStub,
    pub value: ValueView,
    pub obs_datetime: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<RefStub>,
}

/// `full` projection: everything in `default`, expanded references, audit
/// metadata and lifecycle fields.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FullObsView {
    pub uuid: String,
    pub display: String,
    pub link: String,
    pub person: RefView,
    pub concept: ConceptView,
    pub value: ValueView,
    pub obs_datetime: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<RefView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obs_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub voided: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub void_reason: Option<String>,
    pub audit_info: AuditView,
}

/// A rendered view at one of the two projection depths.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum ObsView {
    Default(DefaultObsView),
    Full(FullObsView),
}

impl ObsView {
    pub fn uuid(&self) -> &str {
        match self {
            ObsView::Default(v) => &v.uuid,
            ObsView::Full(v) => &v.uuid,
        }
    }

    pub fn display(&self) -> &str {
        match self {
            ObsView::Default(v) => &v.display,
            ObsView::Full(v) => &v.display,
        }
    }

    /// Audit metadata, present only on full views.
    pub fn audit_info(&self) -> Option<&AuditView> {
        match self {
            ObsView::Default(_) => None,
            ObsView::Full(v) => Some(&v.audit_info),
        }
    }
}

fn person_stub(person: &Person) -> RefStub {
    RefStub {
        uuid: person.uuid.clone(),
        display: person.display.clone(),
    }
}

fn person_view(person: &Person, cfg: &CoreConfig) -> RefView {
    RefView {
        uuid: person.uuid.clone(),
        display: person.display.clone(),
        link: cfg.resource_link("person", &person.uuid),
    }
}

fn concept_stub(concept: &Concept) -> RefStub {
    RefStub {
        uuid: concept.uuid.clone(),
        display: concept.display.clone(),
    }
}

fn concept_view(concept: &Concept, cfg: &CoreConfig) -> ConceptView {
    ConceptView {
        uuid: concept.uuid.clone(),
        display: concept.display.clone(),
        link: cfg.resource_link("concept", &concept.uuid),
        datatype: concept.datatype.as_str().to_string(),
    }
}

fn location_stub(location: &Location) -> RefStub {
    RefStub {
        uuid: location.uuid.clone(),
        display: location.display.clone(),
    }
}

fn location_view(location: &Location, cfg: &CoreConfig) -> RefView {
    RefView {
        uuid: location.uuid.clone(),
        display: location.display.clone(),
        link: cfg.resource_link("location", &location.uuid),
    }
}

fn value_view(value: &ObsValue) -> ValueView {
    match value {
        ObsValue::None => ValueView::Null,
        ObsValue::Numeric(n) => ValueView::Number(*n),
        ObsValue::Text(t) => ValueView::Text(t.clone()),
        ObsValue::Coded(c) => ValueView::Coded(concept_stub(c)),
        ObsValue::Complex(handle) => ValueView::Text(handle.clone()),
    }
}

/// Projects a record at the requested depth.
pub fn render(obs: &Obs, rep: Representation, cfg: &CoreConfig) -> ObsView {
    let link = cfg.resource_link("obs", &obs.uuid);
    match rep {
        Representation::Default => ObsView::Default(DefaultObsView {
            uuid: obs.uuid.clone(),
            display: obs.display(),
            link,
            person: person_stub(&obs.person),
            concept: concept_stub(&obs.concept),
            value: value_view(&obs.value),
            obs_datetime: obs.obs_datetime,
            location: obs.location.as_ref().map(location_stub),
        }),
        Representation::Full => ObsView::Full(FullObsView {
            uuid: obs.uuid.clone(),
            display: obs.display(),
            link,
            person: person_view(&obs.person, cfg),
            concept: concept_view(&obs.concept, cfg),
            value: value_view(&obs.value),
            obs_datetime: obs.obs_datetime,
            location: obs.location.as_ref().map(|l| location_view(l, cfg)),
            obs_group: obs.obs_group.clone(),
            previous_version: obs.previous_version.clone(),
            comment: obs.comment.clone(),
            voided: obs.is_voided(),
            void_reason: obs.void_reason().map(str::to_owned),
            audit_info: AuditView {
                creator: obs.audit.creator.clone(),
                date_created: obs.audit.date_created,
                date_changed: obs.audit.date_changed,
            },
        }),
    }
}
