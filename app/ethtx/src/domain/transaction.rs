//! 可签名、可序列化的 legacy 交易
//!
//! 线上格式为九元组 RLP 列表：
//! `[nonce, gasPrice, gasLimit, to, value, data, v, r, s]`
//!
//! 参考: https://eips.ethereum.org/EIPS/eip-155

use crate::domain::chain_types::ChainContext;
use crate::domain::tx_types::{
    bytes_to_hex, bytes_to_u64, int_to_bytes, normalize_field, strip_leading_zeros, FieldValue,
    TxError, TxOptions, TX_FIELDS,
};
use crate::inbound::transaction_decoder::{decode_fields, encode_json, TxInput};
use crate::infrastructure::crypto::{
    ecdsa_recover, ecdsa_sign, is_valid_signature, public_to_address, rlp_encode_list, rlp_hash,
    PublicKey,
};
use crate::service::transaction_validator::{
    failures_to_message, validation_failures, ValidationFailure,
};
use ethereum_types::{Address, H256, U256, U512};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace, warn};

const NONCE: usize = 0;
const GAS_PRICE: usize = 1;
const GAS_LIMIT: usize = 2;
const TO: usize = 3;
const VALUE: usize = 4;
const DATA: usize = 5;
const V: usize = 6;
const R: usize = 7;
const S: usize = 8;

/// 发送者解析策略
///
/// - `Recover`: 只从签名恢复
/// - `ExplicitOrRecover`: 优先使用显式给出的 `from`，缺省时从签名恢复；
///   存在显式 `from` 时 `hash(true)` 会把它作为额外元素计入哈希
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderPolicy {
    #[default]
    Recover,
    ExplicitOrRecover,
}

/// 从签名恢复出的发送者
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveredSender {
    pub public_key: PublicKey,
    pub address: Address,
}

/// 发送者缓存
///
/// `recovered` 由当前字段值（含 v/r/s）推导，任何字段变更都会清空；
/// `explicit` 是可信输入，只由构造或 `set_explicit_sender` 写入，不随签名变化。
#[derive(Debug, Clone, Default)]
struct SenderCache {
    recovered: OnceLock<RecoveredSender>,
    explicit: Option<Address>,
}

/// Legacy 交易
#[derive(Debug, Clone)]
pub struct Transaction {
    fields: [Vec<u8>; 9],
    common: Arc<ChainContext>,
    policy: SenderPolicy,
    sender: SenderCache,
}

impl Default for Transaction {
    fn default() -> Self {
        Self::empty(Arc::new(ChainContext::default()))
    }
}

impl Transaction {
    /// 从原始列表 / RLP 字节 / 字段映射构造
    ///
    /// 链上下文在任何字段处理之前解析；`common` 与 `chain`/`hardfork`
    /// 同时给出时返回 `TxError::Configuration`。
    pub fn new(input: impl Into<TxInput>, opts: &TxOptions) -> Result<Self, TxError> {
        let common = opts.resolve()?;
        let fields = decode_fields(&input.into())?;
        Self::from_parts(fields, common, SenderPolicy::Recover)
    }

    /// 从 RLP 编码的交易字节构造
    pub fn from_rlp(bytes: &[u8], opts: &TxOptions) -> Result<Self, TxError> {
        Self::new(TxInput::Rlp(bytes.to_vec()), opts)
    }

    /// 空的未签名交易
    pub fn empty(common: Arc<ChainContext>) -> Self {
        Self {
            fields: Default::default(),
            common,
            policy: SenderPolicy::Recover,
            sender: SenderCache::default(),
        }
    }

    pub(crate) fn from_parts(
        fields: [Vec<u8>; 9],
        common: Arc<ChainContext>,
        policy: SenderPolicy,
    ) -> Result<Self, TxError> {
        let tx = Self {
            fields,
            common,
            policy,
            sender: SenderCache::default(),
        };
        tx.validate_v(&tx.fields[V])?;

        debug!(
            chain_id = tx.common.chain_id(),
            hardfork = %tx.common.hardfork(),
            signed = !tx.is_unsigned(),
            "transaction constructed"
        );
        Ok(tx)
    }

    /// 固定显式发送者（只在 `ExplicitOrRecover` 策略下生效）
    pub(crate) fn set_explicit_sender(&mut self, from: Address) {
        self.sender.explicit = Some(from);
    }

    pub(crate) fn explicit_sender(&self) -> Option<Address> {
        self.sender.explicit
    }

    pub fn policy(&self) -> SenderPolicy {
        self.policy
    }

    pub fn common(&self) -> &Arc<ChainContext> {
        &self.common
    }

    // ========================================================================
    // 字段访问
    // ========================================================================

    /// 按线上顺序返回九个规范字段
    pub fn raw(&self) -> &[Vec<u8>; 9] {
        &self.fields
    }

    pub fn nonce(&self) -> &[u8] {
        &self.fields[NONCE]
    }

    pub fn gas_price(&self) -> &[u8] {
        &self.fields[GAS_PRICE]
    }

    pub fn gas_limit(&self) -> &[u8] {
        &self.fields[GAS_LIMIT]
    }

    pub fn to(&self) -> &[u8] {
        &self.fields[TO]
    }

    /// 接收地址，合约创建时为 None
    pub fn to_address(&self) -> Option<Address> {
        let to = self.to();
        (to.len() == 20).then(|| Address::from_slice(to))
    }

    pub fn value(&self) -> &[u8] {
        &self.fields[VALUE]
    }

    pub fn data(&self) -> &[u8] {
        &self.fields[DATA]
    }

    pub fn v(&self) -> &[u8] {
        &self.fields[V]
    }

    pub fn r(&self) -> &[u8] {
        &self.fields[R]
    }

    pub fn s(&self) -> &[u8] {
        &self.fields[S]
    }

    pub fn set_nonce(&mut self, value: impl Into<FieldValue>) -> Result<(), TxError> {
        self.set_field(NONCE, value.into())
    }

    pub fn set_gas_price(&mut self, value: impl Into<FieldValue>) -> Result<(), TxError> {
        self.set_field(GAS_PRICE, value.into())
    }

    pub fn set_gas_limit(&mut self, value: impl Into<FieldValue>) -> Result<(), TxError> {
        self.set_field(GAS_LIMIT, value.into())
    }

    pub fn set_to(&mut self, value: impl Into<FieldValue>) -> Result<(), TxError> {
        self.set_field(TO, value.into())
    }

    pub fn set_value(&mut self, value: impl Into<FieldValue>) -> Result<(), TxError> {
        self.set_field(VALUE, value.into())
    }

    pub fn set_data(&mut self, value: impl Into<FieldValue>) -> Result<(), TxError> {
        self.set_field(DATA, value.into())
    }

    /// 设置 v；若其编码的 chain id 与当前链上下文冲突则拒绝，字段保持不变
    pub fn set_v(&mut self, value: impl Into<FieldValue>) -> Result<(), TxError> {
        let (name, kind) = TX_FIELDS[V];
        let v = normalize_field(name, kind, value.into().to_bytes()?)?;
        if let Err(err) = self.validate_v(&v) {
            warn!(v = %bytes_to_hex(&v), chain_id = self.common.chain_id(), "rejected v assignment");
            return Err(err);
        }
        self.fields[V] = v;
        self.invalidate_sender();
        Ok(())
    }

    pub fn set_r(&mut self, value: impl Into<FieldValue>) -> Result<(), TxError> {
        self.set_field(R, value.into())
    }

    pub fn set_s(&mut self, value: impl Into<FieldValue>) -> Result<(), TxError> {
        self.set_field(S, value.into())
    }

    fn set_field(&mut self, index: usize, value: FieldValue) -> Result<(), TxError> {
        let (name, kind) = TX_FIELDS[index];
        self.fields[index] = normalize_field(name, kind, value.to_bytes()?)?;
        self.invalidate_sender();
        Ok(())
    }

    fn invalidate_sender(&mut self) {
        self.sender.recovered = OnceLock::new();
    }

    // ========================================================================
    // 编码与哈希
    // ========================================================================

    /// RLP 编码的九元组
    pub fn serialize(&self) -> Vec<u8> {
        rlp_encode_list(&self.fields)
    }

    /// 交易哈希
    ///
    /// - `include_signature = true`: keccak256(rlp(九个字段))，即最终交易哈希；
    ///   带显式发送者时追加 `from`
    /// - `include_signature = false`: 签名原像的哈希，EIP-155 下追加 `[chainId, 0, 0]`
    pub fn hash(&self, include_signature: bool) -> H256 {
        if !include_signature {
            return rlp_hash(&self.signing_items(self.implements_eip155()));
        }

        match self.explicit_sender() {
            Some(from) if self.policy == SenderPolicy::ExplicitOrRecover => {
                let mut items = self.fields.to_vec();
                items.push(from.as_bytes().to_vec());
                rlp_hash(&items)
            }
            _ => rlp_hash(&self.fields),
        }
    }

    fn signing_items(&self, eip155: bool) -> Vec<Vec<u8>> {
        let mut items = self.fields[..6].to_vec();
        if eip155 {
            items.push(int_to_bytes(self.common.chain_id()));
            items.push(Vec::new());
            items.push(Vec::new());
        }
        items
    }

    /// v/r/s 全部为空
    pub fn is_unsigned(&self) -> bool {
        self.fields[V].is_empty() && self.fields[R].is_empty() && self.fields[S].is_empty()
    }

    fn is_signed(&self) -> bool {
        !self.fields[V].is_empty() && !self.fields[R].is_empty() && !self.fields[S].is_empty()
    }

    /// 签名原像是否使用 EIP-155 形式
    ///
    /// 未签名交易只看链上下文；已签名交易还要求 v 属于当前 chain id 的 EIP-155 编码，
    /// 这样 v = 27/28 的旧签名在新硬分叉下仍可验证。
    fn implements_eip155(&self) -> bool {
        if !self.common.eip155_active() {
            return false;
        }
        if !self.is_signed() {
            return true;
        }
        match (bytes_to_u64(&self.fields[V]), eip155_v_base(self.common.chain_id())) {
            (Some(v), Some(base)) => v == base || Some(v) == base.checked_add(1),
            _ => false,
        }
    }

    /// v 与链上下文的兼容性检查
    fn validate_v(&self, v: &[u8]) -> Result<(), TxError> {
        if v.is_empty() || !self.common.eip155_active() {
            return Ok(());
        }
        let chain_id = self.common.chain_id();
        let v_int = bytes_to_u64(v)
            .ok_or_else(|| TxError::Signature(format!("v {} is out of range", bytes_to_hex(v))))?;
        if v_int == 27 || v_int == 28 {
            return Ok(());
        }
        let compatible = eip155_v_base(chain_id)
            .map(|base| v_int == base || Some(v_int) == base.checked_add(1))
            .unwrap_or(false);
        if compatible {
            Ok(())
        } else {
            Err(TxError::Signature(format!(
                "Incompatible EIP155-based V {} and chain id {}. See the options of the Transaction constructor to set the chain id.",
                v_int, chain_id
            )))
        }
    }

    /// v 中嵌入的 chain id，否则为链上下文的 chain id
    pub fn chain_id(&self) -> u64 {
        if self.is_signed() {
            if let Some(v) = bytes_to_u64(&self.fields[V]) {
                if v >= 35 {
                    return (v - 35) / 2;
                }
            }
        }
        self.common.chain_id()
    }

    // ========================================================================
    // 签名
    // ========================================================================

    /// 用私钥签名，覆盖已有签名
    ///
    /// 是否使用 EIP-155 只取决于链上下文，不参考之前的 v。
    pub fn sign(&mut self, private_key: &[u8]) -> Result<(), TxError> {
        let eip155 = self.common.eip155_active();
        let digest = rlp_hash(&self.signing_items(eip155));
        let sig = ecdsa_sign(&digest, private_key)?;

        let recovery_id = u64::from(sig.recovery_id);
        let v = if eip155 {
            eip155_v_base(self.common.chain_id())
                .and_then(|base| base.checked_add(recovery_id))
                .ok_or_else(|| {
                    TxError::Signature(format!(
                        "chain id {} too large for EIP155 v",
                        self.common.chain_id()
                    ))
                })?
        } else {
            27 + recovery_id
        };

        self.fields[V] = int_to_bytes(v);
        self.fields[R] = strip_leading_zeros(&sig.r).to_vec();
        self.fields[S] = strip_leading_zeros(&sig.s).to_vec();
        self.invalidate_sender();

        debug!(chain_id = self.common.chain_id(), eip155, v, "transaction signed");
        Ok(())
    }

    /// 签名在曲线阶范围内且能恢复出合法公钥；不与任何期望地址比对
    pub fn verify_signature(&self) -> bool {
        match self.recover() {
            Ok(_) => true,
            Err(err) => {
                trace!(error = %err, "signature verification failed");
                false
            }
        }
    }

    /// 恢复发送者公钥（结果缓存，直到任一字段被修改）
    pub fn sender_public_key(&self) -> Result<PublicKey, TxError> {
        Ok(self.recover()?.public_key)
    }

    /// 发送者地址
    ///
    /// `ExplicitOrRecover` 策略下优先返回显式 `from`，否则从签名恢复（结果进入恢复缓存）。
    pub fn sender_address(&self) -> Result<Address, TxError> {
        if let Some(from) = self.explicit_sender() {
            return Ok(from);
        }
        Ok(self.recover()?.address)
    }

    fn recover(&self) -> Result<RecoveredSender, TxError> {
        if let Some(cached) = self.sender.recovered.get() {
            return Ok(*cached);
        }

        let (v, r, s) = (&self.fields[V], &self.fields[R], &self.fields[S]);
        if v.is_empty() || r.is_empty() || s.is_empty() {
            return Err(TxError::Signature("transaction is not signed".to_string()));
        }
        // EIP-2: Homestead 之后 s 必须 <= n/2
        if !is_valid_signature(r, s, self.common.is_homestead()) {
            return Err(TxError::Signature("Invalid Signature".to_string()));
        }

        let recovery_id = self.recovery_id()?;
        let public_key = ecdsa_recover(&self.hash(false), r, s, recovery_id)?;
        let recovered = RecoveredSender {
            public_key,
            address: public_to_address(&public_key),
        };
        let _ = self.sender.recovered.set(recovered);
        Ok(recovered)
    }

    fn recovery_id(&self) -> Result<u64, TxError> {
        let v = bytes_to_u64(&self.fields[V]).ok_or_else(|| {
            TxError::Signature(format!("v {} is out of range", bytes_to_hex(&self.fields[V])))
        })?;
        let eip155_base = eip155_v_base(self.common.chain_id())
            .filter(|base| self.common.eip155_active() && v >= *base);
        let recovery_id = match eip155_base {
            Some(base) => v - base,
            None => v.checked_sub(27).unwrap_or(u64::MAX),
        };
        if recovery_id > 1 {
            return Err(TxError::Signature(format!("invalid v {}", v)));
        }
        Ok(recovery_id)
    }

    // ========================================================================
    // 费用
    // ========================================================================

    /// calldata 费用：零字节 4，非零字节 68（EIP-2028 后 16）
    pub fn data_fee(&self) -> U256 {
        let schedule = self.common.gas_schedule();
        let cost: u64 = self.fields[DATA]
            .iter()
            .map(|b| {
                if *b == 0 {
                    schedule.tx_data_zero
                } else {
                    schedule.tx_data_non_zero
                }
            })
            .sum();
        U256::from(cost)
    }

    /// 交易最低 gas：21000 + calldata + (Homestead 起合约创建 32000)
    pub fn base_fee(&self) -> U256 {
        let schedule = self.common.gas_schedule();
        let mut fee = self.data_fee() + U256::from(schedule.tx);
        if self.common.is_homestead() && self.to_creation_address() {
            fee += U256::from(schedule.tx_creation);
        }
        fee
    }

    /// gas_limit * gas_price + value
    pub fn upfront_cost(&self) -> U512 {
        let gas_limit = U256::from_big_endian(&self.fields[GAS_LIMIT]);
        let gas_price = U256::from_big_endian(&self.fields[GAS_PRICE]);
        let value = U256::from_big_endian(&self.fields[VALUE]);
        gas_limit.full_mul(gas_price) + U512::from(value)
    }

    pub(crate) fn gas_limit_value(&self) -> U256 {
        U256::from_big_endian(&self.fields[GAS_LIMIT])
    }

    pub fn to_creation_address(&self) -> bool {
        self.fields[TO].is_empty()
    }

    // ========================================================================
    // 校验与导出
    // ========================================================================

    /// 签名（若已签名）有效且 gas_limit 覆盖 base_fee
    pub fn validate(&self) -> bool {
        validation_failures(self).is_empty()
    }

    /// 与 `validate` 相同的规则，返回错误描述；有效时为空串
    pub fn validate_message(&self) -> String {
        failures_to_message(&validation_failures(self))
    }

    pub fn validation_failures(&self) -> Vec<ValidationFailure> {
        validation_failures(self)
    }

    /// 导出为 JSON：`labels` 为 true 时是字段名对象，否则是按线上顺序的数组
    pub fn to_json(&self, labels: bool) -> serde_json::Value {
        encode_json(&self.fields, labels)
    }
}

/// EIP-155: v = recovery_id + 35 + 2 * chain_id
fn eip155_v_base(chain_id: u64) -> Option<u64> {
    chain_id.checked_mul(2)?.checked_add(35)
}
