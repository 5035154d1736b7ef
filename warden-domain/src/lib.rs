//! Warden Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains value objects, entities, protection types and domain events.

#![warn(clippy::all)]

pub mod entities;
pub mod events;
pub mod market_data;
pub mod protection;
pub mod trailing;
pub mod value_objects;

// Re-export commonly used types
pub use entities::{ExitReason, Fill, IntentId, OrderIntent, OrderReason, Position, Signal};
pub use events::Event;
pub use market_data::{Instrument, PriceObservation};
pub use protection::{DistanceUnit, ProtectionConfig, ProtectionState, ResolvedDistances};
pub use value_objects::{DomainError, OrderSide, PositionSign, Price, Quantity, Side, Symbol};
