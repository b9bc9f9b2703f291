use serde::Serialize;

use crate::error::LedgerResult;
use crate::model::container::ContainerType;
use crate::model::event::{ActorRef, AggregateType, EventInput};
use crate::model::payload::Payload;
use crate::store::EventStore;

/// Fixed ids so bootstrap is idempotent: re-running always resolves to the
/// same primordial aggregates.
pub const GENESIS_AGREEMENT_ID: &str = "genesis-agreement";
pub const SYSTEM_ENTITY_ID: &str = "system";
pub const PRIMORDIAL_REALM_ID: &str = "primordial-realm";

#[derive(Debug, Clone, Serialize)]
pub struct PrimordialState {
    pub agreement_id: String,
    pub system_entity_id: String,
    pub realm_id: String,
    /// False when the store already held the genesis events.
    pub created: bool,
}

impl PrimordialState {
    fn existing() -> Self {
        PrimordialState {
            agreement_id: GENESIS_AGREEMENT_ID.to_string(),
            system_entity_id: SYSTEM_ENTITY_ID.to_string(),
            realm_id: PRIMORDIAL_REALM_ID.to_string(),
            created: false,
        }
    }
}

/// Seed the three bootstrap aggregates, in order: the genesis agreement,
/// the system entity, and the primordial realm (self-referential by id,
/// not by owning pointer). Idempotent: a store that already holds the
/// primordial realm is returned as-is, with no new events.
pub async fn bootstrap(store: &EventStore) -> LedgerResult<PrimordialState> {
    if store
        .get_latest(AggregateType::Container, PRIMORDIAL_REALM_ID)
        .await?
        .is_some()
    {
        return Ok(PrimordialState::existing());
    }

    let actor = ActorRef::system(SYSTEM_ENTITY_ID);

    store
        .append(EventInput::new(
            AggregateType::Agreement,
            GENESIS_AGREEMENT_ID,
            Payload::AgreementProposed {
                title: "Genesis agreement".to_string(),
                terms: serde_json::json!({
                    "scope": "constitutional",
                    "realm": PRIMORDIAL_REALM_ID,
                }),
                proposer_id: SYSTEM_ENTITY_ID.to_string(),
            },
            actor.clone(),
        ))
        .await?;

    store
        .append(EventInput::new(
            AggregateType::Agreement,
            GENESIS_AGREEMENT_ID,
            Payload::AgreementStatusChanged {
                status: "active".to_string(),
                reason: Some("genesis".to_string()),
            },
            actor.clone(),
        ))
        .await?;

    store
        .append(EventInput::new(
            AggregateType::Party,
            SYSTEM_ENTITY_ID,
            Payload::EntityCreated {
                name: "System".to_string(),
                role: "system".to_string(),
            },
            actor.clone(),
        ))
        .await?;

    store
        .append(EventInput::new(
            AggregateType::Container,
            PRIMORDIAL_REALM_ID,
            Payload::ContainerCreated {
                name: "Primordial realm".to_string(),
                container_type: ContainerType::Realm,
                physics: ContainerType::Realm
                    .default_physics()
                    .with_governance(GENESIS_AGREEMENT_ID),
                owner_id: SYSTEM_ENTITY_ID.to_string(),
                // The primordial realm is its own realm, by id.
                realm_id: PRIMORDIAL_REALM_ID.to_string(),
                parent_container_id: None,
                governance_agreement_id: GENESIS_AGREEMENT_ID.to_string(),
            },
            actor,
        ))
        .await?;

    eprintln!("[bootstrap] primordial realm seeded");
    Ok(PrimordialState {
        agreement_id: GENESIS_AGREEMENT_ID.to_string(),
        system_entity_id: SYSTEM_ENTITY_ID.to_string(),
        realm_id: PRIMORDIAL_REALM_ID.to_string(),
        created: true,
    })
}
