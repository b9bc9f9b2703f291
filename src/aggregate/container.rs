use std::collections::HashMap;

use serde::Serialize;

use crate::model::container::{ContainerItem, ContainerType, Physics};
use crate::model::event::{AggregateType, Event};
use crate::model::payload::{EventPayload, Payload};

use super::Rehydrator;

/// Derived container state: identity, physics, and the items it holds.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerState {
    pub id: String,
    pub name: String,
    pub container_type: ContainerType,
    pub physics: Physics,
    pub governance_agreement_id: String,
    pub realm_id: String,
    pub owner_id: String,
    pub parent_container_id: Option<String>,
    pub items: HashMap<String, ContainerItem>,
    pub created: bool,
    pub version: u64,
}

impl ContainerState {
    pub fn item(&self, item_id: &str) -> Option<&ContainerItem> {
        self.items.get(item_id)
    }

    /// Quantity on hand for a fungible item; 0 if absent.
    pub fn quantity_of(&self, item_id: &str) -> i64 {
        self.items
            .get(item_id)
            .and_then(|i| i.quantity)
            .unwrap_or(0)
    }
}

pub struct ContainerRehydrator;

impl Rehydrator for ContainerRehydrator {
    type State = ContainerState;

    const AGGREGATE: AggregateType = AggregateType::Container;

    fn initial(id: &str) -> ContainerState {
        ContainerState {
            id: id.to_string(),
            name: String::new(),
            container_type: ContainerType::Wallet,
            physics: ContainerType::Wallet.default_physics(),
            governance_agreement_id: String::new(),
            realm_id: String::new(),
            owner_id: String::new(),
            parent_container_id: None,
            items: HashMap::new(),
            created: false,
            version: 0,
        }
    }

    fn apply(state: &mut ContainerState, event: &Event) {
        let EventPayload::Known(payload) = &event.payload else {
            return;
        };
        match payload {
            Payload::ContainerCreated {
                name,
                container_type,
                physics,
                owner_id,
                realm_id,
                parent_container_id,
                governance_agreement_id,
            } => {
                state.name = name.clone();
                state.container_type = *container_type;
                state.physics = physics.clone();
                state.owner_id = owner_id.clone();
                state.realm_id = realm_id.clone();
                state.parent_container_id = parent_container_id.clone();
                state.governance_agreement_id = governance_agreement_id.clone();
                state.created = true;
            }
            Payload::ContainerItemDeposited { item, .. } => {
                match (state.items.get_mut(&item.id), item.quantity) {
                    // Fungible top-up merges into the held stack.
                    (Some(held), Some(incoming)) if held.quantity.is_some() => {
                        held.quantity = Some(held.quantity.unwrap_or(0) + incoming);
                    }
                    _ => {
                        state.items.insert(item.id.clone(), item.clone());
                    }
                }
            }
            Payload::ContainerItemWithdrawn {
                item_id, quantity, ..
            } => {
                let remove = match (state.items.get_mut(item_id), quantity) {
                    (Some(held), Some(taken)) if held.quantity.is_some() => {
                        let left = held.quantity.unwrap_or(0) - taken;
                        held.quantity = Some(left);
                        left <= 0
                    }
                    (Some(_), _) => true,
                    (None, _) => false,
                };
                if remove {
                    state.items.remove(item_id);
                }
            }
            _ => return,
        }
        state.version += 1;
    }
}
