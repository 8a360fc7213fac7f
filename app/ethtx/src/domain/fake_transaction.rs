//! FakeTransaction：发送者可显式指定的交易
//!
//! 用于模拟执行：`from` 是可信输入，签名字段可以缺失或与 `from` 不一致。
//! 字段、费用与校验规则与 [`Transaction`] 完全一致，区别只在发送者解析策略
//! ([`SenderPolicy::ExplicitOrRecover`])。

use crate::domain::transaction::{SenderPolicy, Transaction};
use crate::domain::tx_types::{normalize_field, FakeTxData, FieldKind, FieldValue, TxError, TxOptions};
use crate::inbound::transaction_decoder::{decode_fields, TxInput};
use ethereum_types::Address;
use std::ops::{Deref, DerefMut};

#[derive(Debug, Clone)]
pub struct FakeTransaction {
    tx: Transaction,
}

impl FakeTransaction {
    /// 从字段映射构造，`from` 可选
    pub fn new(data: FakeTxData, opts: &TxOptions) -> Result<Self, TxError> {
        let from = data.from.as_ref().map(parse_address).transpose()?.flatten();
        Self::with_input(TxInput::Fields(data.tx), from, opts)
    }

    /// 从任意交易输入构造，并可附带显式发送者
    pub fn with_input(
        input: impl Into<TxInput>,
        from: Option<Address>,
        opts: &TxOptions,
    ) -> Result<Self, TxError> {
        let common = opts.resolve()?;
        let fields = decode_fields(&input.into())?;
        let mut tx = Transaction::from_parts(fields, common, SenderPolicy::ExplicitOrRecover)?;
        if let Some(from) = from {
            tx.set_explicit_sender(from);
        }
        Ok(Self { tx })
    }

    /// 发送者：显式值优先，否则从签名恢复
    pub fn from(&self) -> Result<Address, TxError> {
        self.tx.sender_address()
    }

    pub fn set_from(&mut self, from: Address) {
        self.tx.set_explicit_sender(from);
    }

    /// 构造时给出了 `from`，或调用过 `set_from`
    pub fn has_from(&self) -> bool {
        self.tx.explicit_sender().is_some()
    }

    pub fn into_transaction(self) -> Transaction {
        self.tx
    }
}

impl Deref for FakeTransaction {
    type Target = Transaction;

    fn deref(&self) -> &Self::Target {
        &self.tx
    }
}

impl DerefMut for FakeTransaction {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tx
    }
}

/// 空值视为未提供
fn parse_address(value: &FieldValue) -> Result<Option<Address>, TxError> {
    let bytes = normalize_field("from", FieldKind::Address, value.to_bytes()?)?;
    Ok((!bytes.is_empty()).then(|| Address::from_slice(&bytes)))
}
