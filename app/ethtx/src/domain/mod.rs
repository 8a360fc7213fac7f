pub mod chain_types;
pub mod fake_transaction;
pub mod transaction;
pub mod tx_types;
