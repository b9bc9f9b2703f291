pub mod container;
pub mod loan;
pub mod trajectory;
pub mod wallet;

pub use container::ContainerRehydrator;
pub use loan::LoanRehydrator;
pub use trajectory::TrajectoryRehydrator;
pub use wallet::WalletRehydrator;

use crate::error::LedgerResult;
use crate::model::event::{AggregateType, Event};
use crate::store::EventStore;
use crate::store::query::ReadOptions;

/// Folds one aggregate's event subsequence into current state.
///
/// `apply` is a pure state transition: no I/O, no suspension. Replaying the
/// same events always yields the same state; replaying a prefix yields the
/// state as of that prefix. Event kinds a rehydrator does not recognize are
/// a no-op, so stores written by newer builds fold cleanly.
pub trait Rehydrator {
    type State;

    /// Which event subsequence this rehydrator folds.
    const AGGREGATE: AggregateType;

    fn initial(id: &str) -> Self::State;

    fn apply(state: &mut Self::State, event: &Event);
}

/// Fold a slice of events into state. Events must belong to the aggregate
/// and be in version order; `get_by_aggregate` returns them that way.
pub fn replay<R: Rehydrator>(id: &str, events: &[Event]) -> R::State {
    let mut state = R::initial(id);
    for event in events {
        R::apply(&mut state, event);
    }
    state
}

/// Current state: full replay of the aggregate's stream.
pub async fn rehydrate<R: Rehydrator>(store: &EventStore, id: &str) -> LedgerResult<R::State> {
    rehydrate_at::<R>(store, id, ReadOptions::default()).await
}

/// Historical state: replay bounded by version or timestamp.
pub async fn rehydrate_at<R: Rehydrator>(
    store: &EventStore,
    id: &str,
    opts: ReadOptions,
) -> LedgerResult<R::State> {
    let events = store.get_by_aggregate(R::AGGREGATE, id, opts).await?;
    Ok(replay::<R>(id, &events))
}
