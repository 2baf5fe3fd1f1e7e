pub mod engine;
pub mod error;
pub mod events;
pub mod fees;
pub mod idempotency;
pub mod model;
pub mod provider;
pub mod providers;
pub mod webhook;

pub mod prelude {
    pub use crate::engine::PaymentOrchestrator;
    pub use crate::error::PaymentError;
    pub use crate::events::{PaymentEvent, PaymentEventKind};
    pub use crate::fees::{compute_fees, FeeRates};
    pub use crate::model::{Payment, PaymentStatus, ProviderKind};
    pub use crate::provider::PaymentProvider;
}
