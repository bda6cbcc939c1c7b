//! Observation record controller.
//!
//! [`ObsService`] maps operation calls onto the record store and renders the
//! results at the requested representation depth. It owns no state beyond
//! the configuration and the store reference, both injected at construction;
//! each call completes or fails independently.
//!
//! Versioned fields are never edited in place. An update voids the current
//! record and inserts a successor carrying the prior record's fields merged
//! with the payload, linked back through `previous_version` only.

use crate::config::CoreConfig;
use crate::error::{ObsError, ObsResult};
use crate::model::{Concept, ConceptDatatype, Location, Obs, ObsValue, Person};
use crate::payload::{ObsPayload, ValueInput};
use crate::representation::Representation;
use crate::store::ObsStore;
use crate::views::{render, ObsView};
use chrono::Utc;
use obs_types::NonEmptyText;
use std::sync::Arc;

/// Void reason written when an update supersedes a record.
const SUPERSEDED_REASON: &str = "superseded by a newer version";

/// Resource controller for observation records.
#[derive(Clone)]
pub struct ObsService {
    cfg: Arc<CoreConfig>,
    store: Arc<dyn ObsStore>,
}

impl ObsService {
    /// Creates a controller bound to an explicit store.
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<dyn ObsStore>) -> Self {
        Self { cfg, store }
    }

    /// Fetches one record and renders it at the requested depth.
    ///
    /// Voided records are only retrievable when the configured policy
    /// allows it.
    pub fn retrieve(&self, uuid: &str, rep: Representation) -> ObsResult<ObsView> {
        let obs = self
            .store
            .get(uuid)
            .ok_or_else(|| ObsError::NotFound(uuid.to_string()))?;

        if obs.is_voided() && !self.cfg.include_voided() {
            return Err(ObsError::NotFound(uuid.to_string()));
        }

        Ok(render(&obs, rep, &self.cfg))
    }

    /// Renders every active record for a subject, in creation order.
    pub fn search_by_person(
        &self,
        person_uuid: &str,
        rep: Representation,
    ) -> ObsResult<Vec<ObsView>> {
        let records = self.store.list_by_person(person_uuid);
        tracing::debug!(person = %person_uuid, count = records.len(), "observation search");
        Ok(records
            .iter()
            .map(|obs| render(obs, rep, &self.cfg))
            .collect())
    }

    /// Creates a new record from the payload.
    ///
    /// Person, concept and obsDatetime are required; the concept's datatype
    /// selects and validates the value field.
    pub fn create(&self, payload: &ObsPayload, rep: Representation) -> ObsResult<ObsView> {
        let person = self.resolve_person(
            payload
                .person
                .as_deref()
                .ok_or(ObsError::MissingField("person"))?,
        )?;
        let concept = self.resolve_concept(
            payload
                .concept
                .as_deref()
                .ok_or(ObsError::MissingField("concept"))?,
        )?;
        let obs_datetime = payload
            .obs_datetime()?
            .ok_or(ObsError::MissingField("obsDatetime"))?;

        let value = match payload.value_input()? {
            Some(input) => self.value_for_concept(input, &concept)?,
            None if concept.datatype == ConceptDatatype::NotApplicable => ObsValue::None,
            None => return Err(ObsError::MissingField("value")),
        };

        let now = Utc::now();
        let mut obs = Obs::new(
            person,
            concept,
            value,
            obs_datetime,
            self.cfg.recorded_by(),
            now,
        );
        if let Some(location) = payload.location.as_deref() {
            obs.location = Some(self.resolve_location(location)?);
        }
        if let Some(group) = payload.obs_group.as_deref() {
            obs.obs_group = Some(self.resolve_group(group)?);
        }
        obs.comment = payload.comment.clone();

        let saved = self.store.save(obs)?;
        tracing::info!(uuid = %saved.uuid, concept = %saved.concept.display, "observation created");
        Ok(render(&saved, rep, &self.cfg))
    }

    /// Supersedes the active record with a successor carrying the payload
    /// fields merged over the prior record's fields.
    ///
    /// The prior record is voided and retained; the successor gets a fresh
    /// identifier and links back through `previous_version`.
    pub fn update(
        &self,
        uuid: &str,
        payload: &ObsPayload,
        rep: Representation,
    ) -> ObsResult<ObsView> {
        let current = self
            .store
            .get(uuid)
            .filter(|obs| !obs.is_voided())
            .ok_or_else(|| ObsError::NotFound(uuid.to_string()))?;

        let person = match payload.person.as_deref() {
            Some(id) => self.resolve_person(id)?,
            None => current.person.clone(),
        };
        let concept = match payload.concept.as_deref() {
            Some(id) => self.resolve_concept(id)?,
            None => current.concept.clone(),
        };
        let obs_datetime = payload.obs_datetime()?.unwrap_or(current.obs_datetime);
        let value = match payload.value_input()? {
            Some(input) => self.value_for_concept(input, &concept)?,
            None => current.value.clone(),
        };
        let location = match payload.location.as_deref() {
            Some(id) => Some(self.resolve_location(id)?),
            None => current.location.clone(),
        };
        let obs_group = match payload.obs_group.as_deref() {
            Some(id) => Some(self.resolve_group(id)?),
            None => current.obs_group.clone(),
        };
        let comment = payload.comment.clone().or_else(|| current.comment.clone());

        let now = Utc::now();
        self.store.void(uuid, SUPERSEDED_REASON)?;

        let mut successor = Obs::new(
            person,
            concept,
            value,
            obs_datetime,
            self.cfg.recorded_by(),
            now,
        );
        successor.location = location;
        successor.obs_group = obs_group;
        successor.comment = comment;
        successor.previous_version = Some(uuid.to_string());

        let saved = self.store.save(successor)?;
        tracing::info!(
            prior = %uuid,
            successor = %saved.uuid,
            "observation superseded"
        );
        Ok(render(&saved, rep, &self.cfg))
    }

    /// Voids a record with the given reason.
    ///
    /// The reason must be non-empty. Voiding an already-voided record
    /// returns it unchanged; the terminal state is never overwritten.
    pub fn void(&self, uuid: &str, reason: &str, rep: Representation) -> ObsResult<ObsView> {
        let reason = NonEmptyText::new(reason).map_err(|_| ObsError::MissingVoidReason)?;

        let current = self
            .store
            .get(uuid)
            .ok_or_else(|| ObsError::NotFound(uuid.to_string()))?;
        if current.is_voided() {
            return Ok(render(&current, rep, &self.cfg));
        }

        let voided = self.store.void(uuid, reason.as_str())?;
        tracing::info!(uuid = %uuid, reason = %reason, "observation voided");
        Ok(render(&voided, rep, &self.cfg))
    }

    /// Hard-deletes a record.
    ///
    /// Conflicts raised by the store (dependent data) are surfaced verbatim.
    pub fn purge(&self, uuid: &str) -> ObsResult<()> {
        self.store.purge(uuid)?;
        tracing::info!(uuid = %uuid, "observation purged");
        Ok(())
    }

    fn resolve_person(&self, uuid: &str) -> ObsResult<Person> {
        self.store
            .person(uuid)
            .ok_or_else(|| ObsError::UnknownReference {
                kind: "person",
                uuid: uuid.to_string(),
            })
    }

    fn resolve_concept(&self, uuid: &str) -> ObsResult<Concept> {
        self.store
            .concept(uuid)
            .ok_or_else(|| ObsError::UnknownReference {
                kind: "concept",
                uuid: uuid.to_string(),
            })
    }

    fn resolve_location(&self, uuid: &str) -> ObsResult<Location> {
        self.store
            .location(uuid)
            .ok_or_else(|| ObsError::UnknownReference {
                kind: "location",
                uuid: uuid.to_string(),
            })
    }

    /// A group parent must be an existing record.
    fn resolve_group(&self, uuid: &str) -> ObsResult<String> {
        self.store
            .get(uuid)
            .map(|parent| parent.uuid)
            .ok_or_else(|| ObsError::UnknownReference {
                kind: "obs group",
                uuid: uuid.to_string(),
            })
    }

    /// Checks a supplied value against the concept's datatype.
    fn value_for_concept(&self, input: ValueInput, concept: &Concept) -> ObsResult<ObsValue> {
        match (concept.datatype, input) {
            (ConceptDatatype::Numeric, ValueInput::Number(n)) => Ok(ObsValue::Numeric(n)),
            (ConceptDatatype::Numeric, ValueInput::Text(s)) => s
                .trim()
                .parse::<f64>()
                .map(ObsValue::Numeric)
                .map_err(|_| ObsError::ValueTypeMismatch {
                    datatype: "numeric",
                    supplied: "text",
                }),
            (ConceptDatatype::Text, ValueInput::Text(s)) => Ok(ObsValue::Text(s)),
            (ConceptDatatype::Text, ValueInput::Number(_)) => Err(ObsError::ValueTypeMismatch {
                datatype: "text",
                supplied: "a number",
            }),
            (ConceptDatatype::Coded, ValueInput::Text(answer)) => self
                .resolve_concept(&answer)
                .map(ObsValue::Coded)
                .map_err(|_| ObsError::UnknownReference {
                    kind: "answer concept",
                    uuid: answer,
                }),
            (ConceptDatatype::Coded, ValueInput::Number(_)) => Err(ObsError::ValueTypeMismatch {
                datatype: "coded",
                supplied: "a number",
            }),
            (ConceptDatatype::Complex, ValueInput::Text(handle)) => Ok(ObsValue::Complex(handle)),
            (ConceptDatatype::Complex, ValueInput::Number(_)) => Err(ObsError::ValueTypeMismatch {
                datatype: "complex",
                supplied: "a number",
            }),
            (ConceptDatatype::NotApplicable, _) => Err(ObsError::ValueTypeMismatch {
                datatype: "n/a",
                supplied: "a value",
            }),
        }
    }
}
