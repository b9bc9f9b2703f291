
use ledger_common::*;

use ubl_core::error::LedgerError;
use ubl_core::model::container::{
    Conservation, ContainerItem, ContainerType, Permeability,
};

// ── Physics presets ─────────────────────────────────────────────────

#[test]
fn preset_physics_match_container_kinds() {
    let wallet = ContainerType::Wallet.default_physics();
    assert_eq!(wallet.conservation, Conservation::Strict);
    assert_eq!(wallet.permeability, Permeability::Sealed);

    let workspace = ContainerType::Workspace.default_physics();
    assert_eq!(workspace.conservation, Conservation::Versioned);
    assert_eq!(workspace.permeability, Permeability::Gated);

    let realm = ContainerType::Realm.default_physics();
    assert_eq!(realm.conservation, Conservation::Strict);
    assert_eq!(realm.permeability, Permeability::Open);

    let network = ContainerType::Network.default_physics();
    assert_eq!(network.conservation, Conservation::Free);
    assert_eq!(network.permeability, Permeability::Open);
}

// ── Creation ────────────────────────────────────────────────────────

#[tokio::test]
async fn create_emits_governance_then_container() {
    let ledger = ledger();
    let container = ledger
        .containers
        .create(
            "toolbox",
            ContainerType::Inventory,
            None,
            "agent-1",
            "realm-1",
            None,
            agent("agent-1"),
        )
        .await
        .expect("create");

    assert!(container.created);
    assert_eq!(container.container_type, ContainerType::Inventory);
    assert!(!container.governance_agreement_id.is_empty());
    // Proposal, activation, creation.
    assert_eq!(ledger.store.current_sequence().await.unwrap(), 3);
}

// ── Deposits & withdrawals ──────────────────────────────────────────

#[tokio::test]
async fn fungible_deposits_merge_and_withdrawals_split() {
    let ledger = ledger();
    let inventory = ledger
        .containers
        .create(
            "toolbox",
            ContainerType::Inventory,
            None,
            "agent-1",
            "realm-1",
            None,
            agent("agent-1"),
        )
        .await
        .unwrap();

    ledger
        .containers
        .deposit(
            &inventory.id,
            ContainerItem::fungible("ore", "resource", 10),
            agent("agent-1"),
            None,
            None,
        )
        .await
        .unwrap();
    ledger
        .containers
        .deposit(
            &inventory.id,
            ContainerItem::fungible("ore", "resource", 5),
            agent("agent-1"),
            None,
            None,
        )
        .await
        .unwrap();

    let state = ledger.containers.state(&inventory.id).await.unwrap();
    assert_eq!(state.quantity_of("ore"), 15);

    ledger
        .containers
        .withdraw(
            &inventory.id,
            "ore",
            Some(6),
            agent("agent-1"),
            None,
            None,
            None,
        )
        .await
        .unwrap();
    let state = ledger.containers.state(&inventory.id).await.unwrap();
    assert_eq!(state.quantity_of("ore"), 9);
}

#[tokio::test]
async fn overdrawing_fails_before_any_state_change() {
    let ledger = ledger();
    let inventory = ledger
        .containers
        .create(
            "toolbox",
            ContainerType::Inventory,
            None,
            "agent-1",
            "realm-1",
            None,
            agent("agent-1"),
        )
        .await
        .unwrap();
    ledger
        .containers
        .deposit(
            &inventory.id,
            ContainerItem::fungible("ore", "resource", 3),
            agent("agent-1"),
            None,
            None,
        )
        .await
        .unwrap();
    let sequence_before = ledger.store.current_sequence().await.unwrap();

    let err = ledger
        .containers
        .withdraw(
            &inventory.id,
            "ore",
            Some(4),
            agent("agent-1"),
            None,
            None,
            None,
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, LedgerError::InsufficientQuantity { have: 3, need: 4, .. }),
        "{err}"
    );
    assert_eq!(
        ledger.store.current_sequence().await.unwrap(),
        sequence_before
    );
}

// ── Permeability ────────────────────────────────────────────────────

#[tokio::test]
async fn sealed_containers_reject_strangers() {
    let ledger = ledger();
    let wallet = ledger
        .containers
        .create(
            "vault",
            ContainerType::Wallet,
            None,
            "agent-1",
            "realm-1",
            None,
            agent("agent-1"),
        )
        .await
        .unwrap();

    let err = ledger
        .containers
        .deposit(
            &wallet.id,
            ContainerItem::fungible("credits", "credits", 100),
            agent("stranger"),
            None,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::PhysicsViolation { .. }), "{err}");

    // The owner may.
    ledger
        .containers
        .deposit(
            &wallet.id,
            ContainerItem::fungible("credits", "credits", 100),
            agent("agent-1"),
            None,
            None,
        )
        .await
        .expect("owner deposit");
}

#[tokio::test]
async fn wallets_reject_non_credit_items() {
    let ledger = ledger();
    let wallet = ledger
        .containers
        .create(
            "vault",
            ContainerType::Wallet,
            None,
            "agent-1",
            "realm-1",
            None,
            agent("agent-1"),
        )
        .await
        .unwrap();

    let err = ledger
        .containers
        .deposit(
            &wallet.id,
            ContainerItem::unique("sword", "artifact"),
            agent("agent-1"),
            None,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::PhysicsViolation { .. }), "{err}");
}

// ── Universal transfer ──────────────────────────────────────────────

#[tokio::test]
async fn strict_transfer_moves_the_item() {
    let ledger = ledger();
    let a = ledger
        .containers
        .create(
            "a",
            ContainerType::Inventory,
            None,
            "agent-1",
            "realm-1",
            None,
            agent("agent-1"),
        )
        .await
        .unwrap();
    let b = ledger
        .containers
        .create(
            "b",
            ContainerType::Inventory,
            None,
            "agent-1",
            "realm-1",
            None,
            agent("agent-1"),
        )
        .await
        .unwrap();
    ledger
        .containers
        .deposit(
            &a.id,
            ContainerItem::fungible("ore", "resource", 10),
            agent("agent-1"),
            None,
            None,
        )
        .await
        .unwrap();

    let transfer = ledger
        .containers
        .transfer(&a.id, &b.id, "ore", Some(4), agent("agent-1"), None)
        .await
        .expect("transfer");
    assert!(transfer.moved);
    assert_eq!(transfer.events.len(), 2);

    assert_eq!(
        ledger.containers.state(&a.id).await.unwrap().quantity_of("ore"),
        6
    );
    assert_eq!(
        ledger.containers.state(&b.id).await.unwrap().quantity_of("ore"),
        4
    );
}

#[tokio::test]
async fn versioned_transfer_copies_and_keeps_the_id() {
    let ledger = ledger();
    let workspace = ledger
        .containers
        .create(
            "studio",
            ContainerType::Workspace,
            None,
            "agent-1",
            "realm-1",
            None,
            agent("agent-1"),
        )
        .await
        .unwrap();
    let other = ledger
        .containers
        .create(
            "annex",
            ContainerType::Workspace,
            None,
            "agent-1",
            "realm-1",
            None,
            agent("agent-1"),
        )
        .await
        .unwrap();
    ledger
        .containers
        .deposit(
            &workspace.id,
            ContainerItem::unique("design-doc", "artifact"),
            agent("agent-1"),
            None,
            None,
        )
        .await
        .unwrap();

    let transfer = ledger
        .containers
        .transfer(
            &workspace.id,
            &other.id,
            "design-doc",
            None,
            agent("agent-1"),
            None,
        )
        .await
        .expect("transfer");
    assert!(!transfer.moved, "versioned source copies");
    assert_eq!(transfer.events.len(), 1, "no withdrawal on copy");

    // The source retains the artifact; the copy shares its id.
    let source = ledger.containers.state(&workspace.id).await.unwrap();
    assert!(source.item("design-doc").is_some());
    let destination = ledger.containers.state(&other.id).await.unwrap();
    assert!(destination.item("design-doc").is_some());
}

#[tokio::test]
async fn transfer_beyond_holdings_fails_cleanly() {
    let ledger = ledger();
    let a = ledger
        .containers
        .create(
            "a",
            ContainerType::Inventory,
            None,
            "agent-1",
            "realm-1",
            None,
            agent("agent-1"),
        )
        .await
        .unwrap();
    let b = ledger
        .containers
        .create(
            "b",
            ContainerType::Inventory,
            None,
            "agent-1",
            "realm-1",
            None,
            agent("agent-1"),
        )
        .await
        .unwrap();
    ledger
        .containers
        .deposit(
            &a.id,
            ContainerItem::fungible("ore", "resource", 2),
            agent("agent-1"),
            None,
            None,
        )
        .await
        .unwrap();
    let sequence_before = ledger.store.current_sequence().await.unwrap();

    let err = ledger
        .containers
        .transfer(&a.id, &b.id, "ore", Some(5), agent("agent-1"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientQuantity { .. }), "{err}");
    assert_eq!(
        ledger.store.current_sequence().await.unwrap(),
        sequence_before
    );
}

#[tokio::test]
async fn non_fungible_transfer_ignores_quantity() {
    let ledger = ledger();
    let a = ledger
        .containers
        .create(
            "a",
            ContainerType::Inventory,
            None,
            "agent-1",
            "realm-1",
            None,
            agent("agent-1"),
        )
        .await
        .unwrap();
    let b = ledger
        .containers
        .create(
            "b",
            ContainerType::Inventory,
            None,
            "agent-1",
            "realm-1",
            None,
            agent("agent-1"),
        )
        .await
        .unwrap();
    ledger
        .containers
        .deposit(
            &a.id,
            ContainerItem::unique("sword", "artifact"),
            agent("agent-1"),
            None,
            None,
        )
        .await
        .unwrap();

    // Quantity on a unique item is noise, not an error.
    ledger
        .containers
        .transfer(&a.id, &b.id, "sword", Some(99), agent("agent-1"), None)
        .await
        .expect("transfer");

    assert!(ledger.containers.state(&a.id).await.unwrap().item("sword").is_none());
    assert!(ledger.containers.state(&b.id).await.unwrap().item("sword").is_some());
}

#[tokio::test]
async fn gated_containers_accept_the_governance_agreement() {
    let ledger = ledger();
    let inventory = ledger
        .containers
        .create(
            "depot",
            ContainerType::Inventory,
            None,
            "agent-1",
            "realm-1",
            None,
            agent("agent-1"),
        )
        .await
        .unwrap();

    use ubl_core::model::container::TransferInfo;
    // A stranger without the agreement is refused.
    let err = ledger
        .containers
        .deposit(
            &inventory.id,
            ContainerItem::fungible("ore", "resource", 1),
            agent("stranger"),
            None,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::PhysicsViolation { .. }), "{err}");

    // Presenting the governance agreement opens the gate.
    ledger
        .containers
        .deposit(
            &inventory.id,
            ContainerItem::fungible("ore", "resource", 1),
            agent("stranger"),
            Some(TransferInfo {
                container_id: "elsewhere".to_string(),
                agreement_id: Some(inventory.governance_agreement_id.clone()),
            }),
            None,
        )
        .await
        .expect("gated deposit with agreement");
}
