pub mod engine;
pub mod error;
pub mod events;
pub mod idempotency;
pub mod model;

pub mod prelude {
    pub use crate::engine::OrderEngine;
    pub use crate::error::OrderError;
    pub use crate::events::{OrderEvent, OrderEventKind};
    pub use crate::model::{LinePatch, Order, OrderLine, OrderStatus, OrderType};
}
