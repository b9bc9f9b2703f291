use serde::Serialize;

use crate::model::credits::Credits;
use crate::model::event::{AggregateType, Event};
use crate::model::payload::{EventPayload, Payload};

use super::Rehydrator;

/// Derived wallet state. `total_deposited − total_withdrawn == balance`
/// holds across deposits and withdrawals; transfers touch both sides.
#[derive(Debug, Clone, Serialize)]
pub struct WalletState {
    pub id: String,
    pub owner_id: String,
    pub currency: String,
    pub balance: Credits,
    pub total_deposited: Credits,
    pub total_withdrawn: Credits,
    pub tx_count: u64,
    /// Wallet rules permit a negative balance (e.g. realm treasury overdraft).
    pub allow_negative: bool,
    pub created: bool,
    /// The fold's own update counter, not the store's aggregate version.
    pub version: u64,
}

impl WalletState {
    pub fn can_withdraw(&self, amount: Credits) -> bool {
        self.allow_negative || self.balance >= amount
    }
}

pub struct WalletRehydrator;

impl Rehydrator for WalletRehydrator {
    type State = WalletState;

    const AGGREGATE: AggregateType = AggregateType::Container;

    fn initial(id: &str) -> WalletState {
        WalletState {
            id: id.to_string(),
            owner_id: String::new(),
            currency: "UBL".to_string(),
            balance: Credits::ZERO,
            total_deposited: Credits::ZERO,
            total_withdrawn: Credits::ZERO,
            tx_count: 0,
            allow_negative: false,
            created: false,
            version: 0,
        }
    }

    fn apply(state: &mut WalletState, event: &Event) {
        let EventPayload::Known(payload) = &event.payload else {
            return;
        };
        match payload {
            Payload::WalletCreated {
                owner_id,
                currency,
                allow_negative,
            } => {
                state.owner_id = owner_id.clone();
                state.currency = currency.clone();
                state.allow_negative = *allow_negative;
                state.created = true;
            }
            Payload::CreditsMinted { amount, .. } | Payload::CreditsDeposited { amount, .. } => {
                state.balance = state.balance + *amount;
                state.total_deposited = state.total_deposited + *amount;
                state.tx_count += 1;
            }
            Payload::CreditsBurned { amount, .. } | Payload::CreditsWithdrawn { amount, .. } => {
                state.balance = state.balance - *amount;
                state.total_withdrawn = state.total_withdrawn + *amount;
                state.tx_count += 1;
            }
            _ => return,
        }
        state.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::event::ActorRef;

    fn event(payload: Payload) -> Event {
        Event {
            sequence: 1,
            id: "e".into(),
            timestamp: 0,
            event_type: payload.kind().to_string(),
            aggregate_type: AggregateType::Container,
            aggregate_id: "w1".into(),
            aggregate_version: 1,
            payload: payload.into(),
            actor: ActorRef::Anonymous,
            causation: None,
            previous_hash: "genesis".into(),
            hash: String::new(),
        }
    }

    #[test]
    fn deposits_and_withdrawals_balance() {
        let mut state = WalletRehydrator::initial("w1");
        WalletRehydrator::apply(
            &mut state,
            &event(Payload::CreditsDeposited {
                amount: Credits::from_ubl(10),
                source: None,
            }),
        );
        WalletRehydrator::apply(
            &mut state,
            &event(Payload::CreditsWithdrawn {
                amount: Credits::from_ubl(3),
                destination: None,
                reason: None,
            }),
        );
        assert_eq!(state.balance, Credits::from_ubl(7));
        assert_eq!(
            state.total_deposited - state.total_withdrawn,
            state.balance
        );
        assert_eq!(state.tx_count, 2);
        assert_eq!(state.version, 2);
    }

    #[test]
    fn unknown_events_are_noops() {
        let mut state = WalletRehydrator::initial("w1");
        let mut e = event(Payload::LoanPaidOff {
            loan_id: "other".into(),
        });
        e.payload = EventPayload::Unknown {
            event_type: "FutureThing".into(),
            raw: serde_json::json!({"type": "FutureThing"}),
        };
        WalletRehydrator::apply(&mut state, &e);
        assert_eq!(state.version, 0);
        assert_eq!(state.balance, Credits::ZERO);
    }
}
