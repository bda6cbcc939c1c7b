//! Record store contract and the in-memory implementation.
//!
//! The store is an external collaborator: the service only relies on
//! read-your-writes visibility (a `save` followed by a `get` of the same
//! identifier is visible to the same caller) and surfaces whatever conflict
//! the store raises without downgrading it.
//!
//! [`InMemoryObsStore`] is the stub used by the tests and by the server
//! binary until an EMR-backed store is wired in. It keeps records in an
//! append-only vector, which pins list ordering to creation order.

use crate::error::{ObsError, ObsResult};
use crate::model::{Concept, Location, Obs, Person};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

/// Contract the controller requires from a record store.
///
/// Dictionary lookups (`concept`, `person`, `location`) are read-only and
/// exist solely to resolve payload references; dictionary management is out
/// of scope.
pub trait ObsStore: Send + Sync {
    /// Fetches a record by identifier, voided or not.
    fn get(&self, uuid: &str) -> Option<Obs>;

    /// All active records for a subject, in creation order.
    fn list_by_person(&self, person_uuid: &str) -> Vec<Obs>;

    /// Inserts a new record or replaces the stored copy of an existing one.
    fn save(&self, obs: Obs) -> ObsResult<Obs>;

    /// Transitions a record to voided. Voiding an already-voided record
    /// leaves it unchanged.
    fn void(&self, uuid: &str, reason: &str) -> ObsResult<Obs>;

    /// Hard-deletes a record. Fails with a conflict when dependent data
    /// still references it.
    fn purge(&self, uuid: &str) -> ObsResult<()>;

    fn concept(&self, uuid: &str) -> Option<Concept>;
    fn person(&self, uuid: &str) -> Option<Person>;
    fn location(&self, uuid: &str) -> Option<Location>;
}

/// In-memory record store with a registered reference dictionary.
#[derive(Default)]
pub struct InMemoryObsStore {
    records: RwLock<Vec<Obs>>,
    concepts: RwLock<HashMap<String, Concept>>,
    persons: RwLock<HashMap<String, Person>>,
    locations: RwLock<HashMap<String, Location>>,
}

impl InMemoryObsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_concept(&self, concept: Concept) {
        self.concepts
            .write()
            .expect("concepts lock poisoned")
            .insert(concept.uuid.clone(), concept);
    }

    pub fn register_person(&self, person: Person) {
        self.persons
            .write()
            .expect("persons lock poisoned")
            .insert(person.uuid.clone(), person);
    }

    pub fn register_location(&self, location: Location) {
        self.locations
            .write()
            .expect("locations lock poisoned")
            .insert(location.uuid.clone(), location);
    }

    /// Records that reference `uuid` as group parent or predecessor.
    fn dependents_of(records: &[Obs], uuid: &str) -> usize {
        records
            .iter()
            .filter(|o| {
                o.obs_group.as_deref() == Some(uuid)
                    || o.previous_version.as_deref() == Some(uuid)
            })
            .count()
    }
}

impl ObsStore for InMemoryObsStore {
    fn get(&self, uuid: &str) -> Option<Obs> {
        self.records
            .read()
            .expect("records lock poisoned")
            .iter()
            .find(|o| o.uuid == uuid)
            .cloned()
    }

    fn list_by_person(&self, person_uuid: &str) -> Vec<Obs> {
        self.records
            .read()
            .expect("records lock poisoned")
            .iter()
            .filter(|o| o.person.uuid == person_uuid && !o.is_voided())
            .cloned()
            .collect()
    }

    fn save(&self, obs: Obs) -> ObsResult<Obs> {
        let mut records = self.records.write().expect("records lock poisoned");
        match records.iter_mut().find(|o| o.uuid == obs.uuid) {
            // Replacing in place keeps the record's creation-order slot.
            Some(existing) => *existing = obs.clone(),
            None => records.push(obs.clone()),
        }
        Ok(obs)
    }

    fn void(&self, uuid: &str, reason: &str) -> ObsResult<Obs> {
        let mut records = self.records.write().expect("records lock poisoned");
        let record = records
            .iter_mut()
            .find(|o| o.uuid == uuid)
            .ok_or_else(|| ObsError::NotFound(uuid.to_string()))?;
        record.mark_voided(reason, Utc::now());
        Ok(record.clone())
    }

    fn purge(&self, uuid: &str) -> ObsResult<()> {
        let mut records = self.records.write().expect("records lock poisoned");
        let index = records
            .iter()
            .position(|o| o.uuid == uuid)
            .ok_or_else(|| ObsError::NotFound(uuid.to_string()))?;

        let dependents = Self::dependents_of(&records, uuid);
        if dependents > 0 {
            return Err(ObsError::PurgeConflict {
                uuid: uuid.to_string(),
                message: format!("dependent data exists ({dependents} referencing records)"),
            });
        }

        records.remove(index);
        Ok(())
    }

    fn concept(&self, uuid: &str) -> Option<Concept> {
        self.concepts
            .read()
            .expect("concepts lock poisoned")
            .get(uuid)
            .cloned()
    }

    fn person(&self, uuid: &str) -> Option<Person> {
        self.persons
            .read()
            .expect("persons lock poisoned")
            .get(uuid)
            .cloned()
    }

    fn location(&self, uuid: &str) -> Option<Location> {
        self.locations
            .read()
            .expect("locations lock poisoned")
            .get(uuid)
            .cloned()
    }
}
