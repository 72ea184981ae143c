// Entity Models - plain CRUD records backed by the store
//
// Each entity knows its table and how to validate itself. `Repository` does
// the rest generically: encode to a row, write, re-fetch, decode.

pub mod group;
pub mod medicare;
pub mod participant;
pub mod plan;
pub mod program;
pub mod provider;
pub mod rate;
pub mod user;

pub use group::{Group, GroupStatus};
pub use medicare::MedicarePlan;
pub use participant::{Dependent, Participant, Relationship};
pub use plan::{BenefitPlan, PlanOption, PlanType};
pub use program::Program;
pub use provider::Provider;
pub use rate::{RateOwner, RateRecord};
pub use user::{Role, User};

use crate::db::{Event, Filter, Row, Store};
use crate::error::{ConsoleResult, StoreError, ValidationErrors};
use crate::validation::RuleTable;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A record stored in one table.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Table name in the store
    const TABLE: &'static str;

    /// Name used in the audit trail and API paths
    const ENTITY_TYPE: &'static str;

    fn id(&self) -> Option<i64>;

    /// Business rules checked before any write.
    fn validate(&self, _rules: &RuleTable) -> Result<(), ValidationErrors> {
        Ok(())
    }
}

pub fn encode<E: Entity>(entity: &E) -> Result<Row, StoreError> {
    let decode_err = |detail: String| StoreError::Decode {
        table: E::TABLE.to_string(),
        detail,
    };
    match serde_json::to_value(entity).map_err(|e| decode_err(e.to_string()))? {
        Value::Object(mut row) => {
            row.remove("id");
            Ok(row)
        }
        other => Err(decode_err(format!("expected an object, got {}", other))),
    }
}

pub fn decode<E: Entity>(row: Row) -> Result<E, StoreError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| StoreError::Decode {
        table: E::TABLE.to_string(),
        detail: e.to_string(),
    })
}

// ============================================================================
// REPOSITORY
// ============================================================================

/// Typed CRUD over any `Store`. Every write validates first, so a rejected
/// submission never reaches the store.
pub struct Repository<'a> {
    store: &'a dyn Store,
    rules: &'a RuleTable,
    actor: &'a str,
}

impl<'a> Repository<'a> {
    pub fn new(store: &'a dyn Store, rules: &'a RuleTable) -> Self {
        Repository {
            store,
            rules,
            actor: "console",
        }
    }

    pub fn with_actor(mut self, actor: &'a str) -> Self {
        self.actor = actor;
        self
    }

    pub fn store(&self) -> &'a dyn Store {
        self.store
    }

    pub fn rules(&self) -> &'a RuleTable {
        self.rules
    }

    pub fn list<E: Entity>(&self) -> Result<Vec<E>, StoreError> {
        self.list_where(&Filter::all())
    }

    pub fn list_where<E: Entity>(&self, filter: &Filter) -> Result<Vec<E>, StoreError> {
        self.store
            .select(E::TABLE, filter)?
            .into_iter()
            .map(decode::<E>)
            .collect()
    }

    pub fn get<E: Entity>(&self, id: i64) -> Result<E, StoreError> {
        self.store
            .select(E::TABLE, &Filter::all().eq("id", id))?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound {
                table: E::TABLE.to_string(),
                id,
            })
            .and_then(decode::<E>)
    }

    /// Validate, insert, and return the stored record.
    pub fn create<E: Entity>(&self, entity: &E) -> ConsoleResult<E> {
        entity.validate(self.rules)?;

        let row = encode(entity)?;
        let ids = self.store.insert(E::TABLE, &[row])?;
        let id = ids.first().copied().ok_or_else(|| StoreError::Backend("insert returned no id".to_string()))?;

        self.audit("created", E::ENTITY_TYPE, id, serde_json::to_value(entity).unwrap_or(Value::Null));
        Ok(self.get(id)?)
    }

    /// Validate, overwrite row `id`, and return the stored record.
    pub fn update<E: Entity>(&self, id: i64, entity: &E) -> ConsoleResult<E> {
        entity.validate(self.rules)?;

        let row = encode(entity)?;
        self.store.update(E::TABLE, id, &row)?;

        self.audit("updated", E::ENTITY_TYPE, id, Value::Object(row));
        Ok(self.get(id)?)
    }

    pub fn delete<E: Entity>(&self, id: i64) -> Result<(), StoreError> {
        self.store.delete(E::TABLE, id)?;
        self.audit("deleted", E::ENTITY_TYPE, id, Value::Null);
        Ok(())
    }

    /// Record an audit event. A failed audit write is logged, not fatal.
    pub fn audit(&self, action: &str, entity_type: &str, id: i64, data: Value) {
        let event = Event::new(
            &format!("{}_{}", entity_type, action),
            entity_type,
            &id.to_string(),
            data,
            self.actor,
        );
        if let Err(err) = self.store.record_event(&event) {
            tracing::warn!(error = %err, entity_type, id, "failed to record audit event");
        }
    }
}
