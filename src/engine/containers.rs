use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::aggregate::container::ContainerState;
use crate::aggregate::{ContainerRehydrator, rehydrate};
use crate::error::{LedgerError, LedgerResult};
use crate::model::container::{
    Conservation, ContainerItem, ContainerType, Permeability, Physics, TransferInfo,
};
use crate::model::event::{ActorRef, AggregateType, Event, EventInput};
use crate::model::payload::Payload;
use crate::store::EventStore;

/// One service for every container kind. Wallets, workspaces, realms,
/// inventories, and networks all flow through here; the container's physics
/// decides what each operation is allowed to do.
#[derive(Clone)]
pub struct ContainerManager {
    store: Arc<EventStore>,
}

/// Result of a universal transfer.
#[derive(Debug, Serialize)]
pub struct ItemTransfer {
    pub correlation_id: String,
    /// Move semantics (true) or Copy semantics (false).
    pub moved: bool,
    pub events: Vec<Event>,
}

impl ContainerManager {
    pub fn new(store: Arc<EventStore>) -> Self {
        ContainerManager { store }
    }

    /// Create a container with its governance agreement. Emits the
    /// agreement proposal, auto-activation, and the container itself.
    pub async fn create(
        &self,
        name: &str,
        container_type: ContainerType,
        physics: Option<Physics>,
        owner_id: &str,
        realm_id: &str,
        parent_container_id: Option<String>,
        actor: ActorRef,
    ) -> LedgerResult<ContainerState> {
        let container_id = Uuid::new_v4().to_string();
        let agreement_id = Uuid::new_v4().to_string();
        let correlation_id = Uuid::new_v4().to_string();

        let physics = physics
            .unwrap_or_else(|| container_type.default_physics())
            .with_governance(agreement_id.clone());

        self.store
            .append(
                EventInput::new(
                    AggregateType::Agreement,
                    agreement_id.clone(),
                    Payload::AgreementProposed {
                        title: format!("Governance of {name}"),
                        terms: serde_json::json!({
                            "container": container_id,
                            "container_type": container_type.to_string(),
                        }),
                        proposer_id: owner_id.to_string(),
                    },
                    actor.clone(),
                )
                .correlated(correlation_id.clone()),
            )
            .await?;

        self.store
            .append(
                EventInput::new(
                    AggregateType::Agreement,
                    agreement_id.clone(),
                    Payload::AgreementStatusChanged {
                        status: "active".to_string(),
                        reason: Some("auto-activated at container creation".to_string()),
                    },
                    actor.clone(),
                )
                .correlated(correlation_id.clone()),
            )
            .await?;

        self.store
            .append(
                EventInput::new(
                    AggregateType::Container,
                    container_id.clone(),
                    Payload::ContainerCreated {
                        name: name.to_string(),
                        container_type,
                        physics,
                        owner_id: owner_id.to_string(),
                        realm_id: realm_id.to_string(),
                        parent_container_id,
                        governance_agreement_id: agreement_id,
                    },
                    actor,
                )
                .correlated(correlation_id),
            )
            .await?;

        rehydrate::<ContainerRehydrator>(&self.store, &container_id).await
    }

    pub async fn state(&self, container_id: &str) -> LedgerResult<ContainerState> {
        let state = rehydrate::<ContainerRehydrator>(&self.store, container_id).await?;
        if !state.created {
            return Err(LedgerError::not_found("container", container_id));
        }
        Ok(state)
    }

    pub async fn deposit(
        &self,
        container_id: &str,
        item: ContainerItem,
        actor: ActorRef,
        source: Option<TransferInfo>,
        correlation_id: Option<&str>,
    ) -> LedgerResult<Event> {
        let state = self.state(container_id).await?;
        self.validate_ingress(&state, &item, &actor, source.as_ref())?;

        let mut input = EventInput::new(
            AggregateType::Container,
            container_id,
            Payload::ContainerItemDeposited { item, source },
            actor,
        );
        if let Some(correlation_id) = correlation_id {
            input = input.correlated(correlation_id);
        }
        Ok(self.store.append(input).await?)
    }

    pub async fn withdraw(
        &self,
        container_id: &str,
        item_id: &str,
        quantity: Option<i64>,
        actor: ActorRef,
        destination: Option<TransferInfo>,
        reason: Option<String>,
        correlation_id: Option<&str>,
    ) -> LedgerResult<Event> {
        let state = self.state(container_id).await?;
        self.validate_egress(&state, item_id, quantity, &actor, destination.as_ref())?;

        let mut input = EventInput::new(
            AggregateType::Container,
            container_id,
            Payload::ContainerItemWithdrawn {
                item_id: item_id.to_string(),
                quantity,
                destination,
                reason,
            },
            actor,
        );
        if let Some(correlation_id) = correlation_id {
            input = input.correlated(correlation_id);
        }
        Ok(self.store.append(input).await?)
    }

    /// The universal transfer. The source's physics picks the mode:
    /// `Strict` and `Free` move (withdraw then deposit), `Versioned`
    /// copies (the source keeps its item, and the copy keeps its id).
    /// Everything is validated before any event is appended.
    pub async fn transfer(
        &self,
        from: &str,
        to: &str,
        item_id: &str,
        quantity: Option<i64>,
        actor: ActorRef,
        agreement_id: Option<String>,
    ) -> LedgerResult<ItemTransfer> {
        let source = self.state(from).await?;
        let destination = self.state(to).await?;

        let held = source
            .item(item_id)
            .ok_or_else(|| LedgerError::not_found("item", item_id))?
            .clone();

        // Non-fungible transfers ignore quantity; fungible ones default to
        // the full stack.
        let item = match held.quantity {
            Some(have) => {
                let take = quantity.unwrap_or(have);
                if take <= 0 {
                    return Err(LedgerError::InvalidInput(format!(
                        "transfer quantity must be positive, got {take}"
                    )));
                }
                if take > have {
                    return Err(LedgerError::InsufficientQuantity {
                        container_id: from.to_string(),
                        item_id: item_id.to_string(),
                        have,
                        need: take,
                    });
                }
                ContainerItem {
                    quantity: Some(take),
                    ..held.clone()
                }
            }
            None => held.clone(),
        };

        let moved = !matches!(source.physics.conservation, Conservation::Versioned);

        let source_info = TransferInfo {
            container_id: from.to_string(),
            agreement_id: agreement_id.clone(),
        };
        let dest_info = TransferInfo {
            container_id: to.to_string(),
            agreement_id: agreement_id.clone(),
        };

        if moved {
            self.validate_egress(&source, item_id, item.quantity, &actor, Some(&dest_info))?;
        }
        self.validate_ingress(&destination, &item, &actor, Some(&source_info))?;

        let correlation_id = Uuid::new_v4().to_string();
        let mut events = Vec::new();

        if moved {
            events.push(
                self.store
                    .append(
                        EventInput::new(
                            AggregateType::Container,
                            from,
                            Payload::ContainerItemWithdrawn {
                                item_id: item_id.to_string(),
                                quantity: item.quantity,
                                destination: Some(dest_info),
                                reason: None,
                            },
                            actor.clone(),
                        )
                        .correlated(correlation_id.clone()),
                    )
                    .await?,
            );
        }

        events.push(
            self.store
                .append(
                    EventInput::new(
                        AggregateType::Container,
                        to,
                        Payload::ContainerItemDeposited {
                            item,
                            source: Some(source_info),
                        },
                        actor,
                    )
                    .correlated(correlation_id.clone()),
                )
                .await?,
        );

        Ok(ItemTransfer {
            correlation_id,
            moved,
            events,
        })
    }

    fn validate_ingress(
        &self,
        state: &ContainerState,
        item: &ContainerItem,
        actor: &ActorRef,
        source: Option<&TransferInfo>,
    ) -> LedgerResult<()> {
        if !state.container_type.accepts(&item.item_type) {
            return Err(LedgerError::PhysicsViolation {
                container_id: state.id.clone(),
                detail: format!(
                    "{} container does not accept `{}` items",
                    state.container_type, item.item_type
                ),
            });
        }
        self.authorize(state, actor, source.and_then(|s| s.agreement_id.as_deref()))
    }

    fn validate_egress(
        &self,
        state: &ContainerState,
        item_id: &str,
        quantity: Option<i64>,
        actor: &ActorRef,
        destination: Option<&TransferInfo>,
    ) -> LedgerResult<()> {
        let held = state
            .item(item_id)
            .ok_or_else(|| LedgerError::not_found("item", item_id))?;

        if let (Some(have), Some(need)) = (held.quantity, quantity) {
            if need > have {
                return Err(LedgerError::InsufficientQuantity {
                    container_id: state.id.clone(),
                    item_id: item_id.to_string(),
                    have,
                    need,
                });
            }
        }
        self.authorize(
            state,
            actor,
            destination.and_then(|d| d.agreement_id.as_deref()),
        )
    }

    /// Permeability gate. Sealed: owner or system only. Gated: owner,
    /// system, or the governance agreement presented. Open: anyone.
    fn authorize(
        &self,
        state: &ContainerState,
        actor: &ActorRef,
        agreement_id: Option<&str>,
    ) -> LedgerResult<()> {
        let owner_or_system =
            actor.is_system() || actor.entity_id() == Some(state.owner_id.as_str());
        let allowed = match state.physics.permeability {
            Permeability::Open => true,
            Permeability::Sealed => owner_or_system,
            Permeability::Gated => {
                owner_or_system || agreement_id == Some(state.governance_agreement_id.as_str())
            }
        };
        if allowed {
            Ok(())
        } else {
            Err(LedgerError::PhysicsViolation {
                container_id: state.id.clone(),
                detail: format!(
                    "{} permeability rejects actor {actor}",
                    match state.physics.permeability {
                        Permeability::Sealed => "sealed",
                        Permeability::Gated => "gated",
                        Permeability::Open => "open",
                    }
                ),
            })
        }
    }
}
