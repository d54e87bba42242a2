mod account;
mod id;
mod security;
mod transaction;

pub use account::{Account, CurrentHolding};
pub use id::Id;
pub use security::{Security, SecurityType};
pub use transaction::{Transaction, TransactionType};
