pub mod container;
pub mod credits;
pub mod economy;
pub mod event;
pub mod intent;
pub mod loan;
pub mod payload;
pub mod trajectory;

pub use container::{Conservation, ContainerItem, ContainerType, Permeability, Physics};
pub use credits::{Credits, FeeRate};
pub use event::{ActorRef, AggregateType, Causation, Event, EventInput, GENESIS_HASH};
pub use payload::{EventPayload, Payload};
