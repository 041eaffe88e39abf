mod balance;
mod order;
mod position;

pub use balance::Balance;
pub use order::{
    Order, OrderOptions, OrderRequest, OrderSide, OrderStatus, OrderType, PreCheckResult,
};
pub use position::{ClosedPosition, NetPosition, Position, PositionStatus};

use serde::Serialize;

/// Resolved identity of a just-submitted order.
///
/// The provider may execute an order synchronously, in which case it no
/// longer exists as an open order but as a position. Callers branch on the
/// variant, not on field presence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum OrderOutcome {
    /// Still resting on the book (or unconfirmed and synthesized as working)
    Pending(Order),
    /// Executed synchronously into a position
    Executed(Position),
}

impl OrderOutcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub fn is_executed(&self) -> bool {
        matches!(self, Self::Executed(_))
    }

    pub fn as_order(&self) -> Option<&Order> {
        match self {
            Self::Pending(order) => Some(order),
            Self::Executed(_) => None,
        }
    }

    pub fn as_position(&self) -> Option<&Position> {
        match self {
            Self::Pending(_) => None,
            Self::Executed(position) => Some(position),
        }
    }
}
