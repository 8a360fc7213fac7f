//! ethtx - 以太坊 legacy 交易库
//!
//! 提供交易的编码/解码、签名哈希、ECDSA 签名与发送者恢复、
//! EIP-155 重放保护以及 gas/费用校验。

pub mod service;
pub mod domain;
pub mod inbound;
pub mod infrastructure;

pub use domain::chain_types::{Chain, ChainContext, GasSchedule, Hardfork};
pub use domain::fake_transaction::FakeTransaction;
pub use domain::transaction::{RecoveredSender, SenderPolicy, Transaction};
pub use domain::tx_types::{ChainRef, ChainSelector, FakeTxData, FieldValue, TxData, TxError, TxOptions};
pub use inbound::transaction_decoder::TxInput;
pub use service::transaction_validator::ValidationFailure;
