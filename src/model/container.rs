use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What leaving/arriving items do to the source container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Conservation {
    /// Move semantics: withdraw from source, deposit to destination.
    Strict,
    /// Copy semantics: source retains the item, destination gains one.
    Versioned,
    /// No conservation rule; transfers default to Move.
    Free,
}

/// Who may move items across the container boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Permeability {
    /// Only the owner or a system actor may deposit/withdraw.
    Sealed,
    /// Owner, system, or anyone presenting the governance agreement.
    Gated,
    /// Anyone.
    Open,
}

/// Declarative descriptor that parameterizes container behavior.
/// One manager handles every container kind; the physics decides the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Physics {
    pub conservation: Conservation,
    pub permeability: Permeability,
    /// Agreement that defines who may act on this container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub governance: Option<String>,
}

impl Physics {
    pub fn new(conservation: Conservation, permeability: Permeability) -> Self {
        Physics {
            conservation,
            permeability,
            governance: None,
        }
    }

    pub fn with_governance(mut self, agreement_id: impl Into<String>) -> Self {
        self.governance = Some(agreement_id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ContainerType {
    Wallet,
    Workspace,
    Realm,
    Inventory,
    Network,
}

impl ContainerType {
    /// Preset physics for each container kind.
    pub fn default_physics(self) -> Physics {
        match self {
            ContainerType::Wallet => Physics::new(Conservation::Strict, Permeability::Sealed),
            ContainerType::Workspace => Physics::new(Conservation::Versioned, Permeability::Gated),
            ContainerType::Realm => Physics::new(Conservation::Strict, Permeability::Open),
            ContainerType::Inventory => Physics::new(Conservation::Strict, Permeability::Gated),
            ContainerType::Network => Physics::new(Conservation::Free, Permeability::Open),
        }
    }

    /// Whether this container kind holds items of the given type.
    /// Wallets hold credits and nothing else; credits live only in wallets
    /// and realm treasuries.
    pub fn accepts(self, item_type: &str) -> bool {
        match self {
            ContainerType::Wallet => item_type == "credits",
            ContainerType::Realm => true,
            ContainerType::Workspace | ContainerType::Inventory | ContainerType::Network => {
                item_type != "credits"
            }
        }
    }
}

impl std::str::FromStr for ContainerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wallet" => Ok(ContainerType::Wallet),
            "workspace" => Ok(ContainerType::Workspace),
            "realm" => Ok(ContainerType::Realm),
            "inventory" => Ok(ContainerType::Inventory),
            "network" => Ok(ContainerType::Network),
            other => Err(format!("unknown container type `{other}`")),
        }
    }
}

impl std::fmt::Display for ContainerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContainerType::Wallet => "Wallet",
            ContainerType::Workspace => "Workspace",
            ContainerType::Realm => "Realm",
            ContainerType::Inventory => "Inventory",
            ContainerType::Network => "Network",
        };
        f.write_str(s)
    }
}

/// An item held by a container. Fungible items carry a quantity; items
/// without one are unique artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContainerItem {
    pub id: String,
    pub item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}

impl ContainerItem {
    pub fn fungible(id: impl Into<String>, item_type: impl Into<String>, quantity: i64) -> Self {
        ContainerItem {
            id: id.into(),
            item_type: item_type.into(),
            quantity: Some(quantity),
            metadata: Value::Null,
        }
    }

    pub fn unique(id: impl Into<String>, item_type: impl Into<String>) -> Self {
        ContainerItem {
            id: id.into(),
            item_type: item_type.into(),
            quantity: None,
            metadata: Value::Null,
        }
    }

    pub fn is_fungible(&self) -> bool {
        self.quantity.is_some()
    }
}

/// Where a deposited item came from / where a withdrawn item is headed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TransferInfo {
    pub container_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agreement_id: Option<String>,
}
