pub mod error;
pub mod pool;
pub mod tx;

pub mod prelude {
    pub use crate::error::DbError;
    pub use crate::pool::{connect, DatabaseConfig};
    pub use crate::tx::{begin_tenant_scoped, Tx};
}
