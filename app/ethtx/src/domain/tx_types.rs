//! 交易领域类型：错误、字段输入、构造选项
//!
//! 所有字段在内部都以"规范字节串"保存：大端无符号整数、无多余前导零，
//! 空字节串表示 0 或未设置。

use crate::domain::chain_types::{Chain, ChainContext, Hardfork};
use crate::infrastructure::crypto::CryptoError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// 交易错误
///
/// 配置与解码错误只在构造时抛出；签名错误只在真正读取发送者/公钥、
/// 或给 `v` 赋了与 chain id 不兼容的值时抛出。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    /// chain/hardfork 选项与 common 同时给出等配置冲突
    #[error("configuration error: {0}")]
    Configuration(String),
    /// 字段个数错误、定长字段长度非法、RLP 格式错误
    #[error("decoding error: {0}")]
    Decoding(String),
    /// 签名缺失或非法，或 v 与 chain id 不兼容
    #[error("signature error: {0}")]
    Signature(String),
}

impl From<rlp::DecoderError> for TxError {
    fn from(err: rlp::DecoderError) -> Self {
        Self::Decoding(format!("RLP decode failed: {}", err))
    }
}

impl From<CryptoError> for TxError {
    fn from(err: CryptoError) -> Self {
        Self::Signature(err.to_string())
    }
}

// ============================================================================
// 字段值与规范化
// ============================================================================

/// 构造输入中的单个字段值：十六进制字符串、十进制数字或原始字节
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(u64),
    Text(String),
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// 转成字节串（尚未按字段规则裁剪）
    pub fn to_bytes(&self) -> Result<Vec<u8>, TxError> {
        match self {
            Self::Number(n) => Ok(int_to_bytes(*n)),
            Self::Text(text) => hex_to_bytes(text),
            Self::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for FieldValue {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

/// 字段的规范化规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// 大端整数：去前导零，最多 `max_len` 字节
    Integer { max_len: usize },
    /// 20 字节地址或空（合约创建）
    Address,
    /// 任意字节，原样保存
    Data,
}

/// 九个规范字段的名称与规则，顺序即线上编码顺序
pub const TX_FIELDS: [(&str, FieldKind); 9] = [
    ("nonce", FieldKind::Integer { max_len: 32 }),
    ("gasPrice", FieldKind::Integer { max_len: 32 }),
    ("gasLimit", FieldKind::Integer { max_len: 32 }),
    ("to", FieldKind::Address),
    ("value", FieldKind::Integer { max_len: 32 }),
    ("data", FieldKind::Data),
    ("v", FieldKind::Integer { max_len: 8 }),
    ("r", FieldKind::Integer { max_len: 32 }),
    ("s", FieldKind::Integer { max_len: 32 }),
];

/// 按字段规则规范化字节串
pub fn normalize_field(name: &str, kind: FieldKind, bytes: Vec<u8>) -> Result<Vec<u8>, TxError> {
    match kind {
        FieldKind::Integer { max_len } => {
            let trimmed = strip_leading_zeros(&bytes);
            if trimmed.len() > max_len {
                return Err(TxError::Decoding(format!(
                    "field {} is {} bytes, at most {} allowed",
                    name,
                    trimmed.len(),
                    max_len
                )));
            }
            Ok(trimmed.to_vec())
        }
        FieldKind::Address => {
            if !bytes.is_empty() && bytes.len() != 20 {
                return Err(TxError::Decoding(format!(
                    "field {} must be 20 bytes or empty, got {}",
                    name,
                    bytes.len()
                )));
            }
            Ok(bytes)
        }
        FieldKind::Data => Ok(bytes),
    }
}

pub fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

/// 无符号整数的最短大端表示，0 为空字节串
pub fn int_to_bytes(value: u64) -> Vec<u8> {
    strip_leading_zeros(&value.to_be_bytes()).to_vec()
}

/// 规范大端字节串转 u64，超过 8 字节返回 None
pub fn bytes_to_u64(bytes: &[u8]) -> Option<u64> {
    let bytes = strip_leading_zeros(bytes);
    if bytes.len() > 8 {
        return None;
    }
    Some(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

/// 解析 `0x` 前缀的十六进制串，奇数长度左侧补 0
pub fn hex_to_bytes(text: &str) -> Result<Vec<u8>, TxError> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .ok_or_else(|| TxError::Decoding(format!("expected 0x-prefixed hex string, got {:?}", text)))?;
    let decoded = if digits.len() % 2 == 1 {
        hex::decode(format!("0{}", digits))
    } else {
        hex::decode(digits)
    };
    decoded.map_err(|e| TxError::Decoding(format!("invalid hex string {:?}: {}", text, e)))
}

pub fn bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

// ============================================================================
// 字段映射输入
// ============================================================================

/// 具名字段输入，所有字段可选，缺省为空字节串
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<FieldValue>,
    #[serde(default, alias = "gas", skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
    #[serde(default, alias = "input", skip_serializing_if = "Option::is_none")]
    pub data: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<FieldValue>,
}

impl TxData {
    /// 按线上顺序列出九个字段
    pub fn ordered(&self) -> [Option<&FieldValue>; 9] {
        [
            self.nonce.as_ref(),
            self.gas_price.as_ref(),
            self.gas_limit.as_ref(),
            self.to.as_ref(),
            self.value.as_ref(),
            self.data.as_ref(),
            self.v.as_ref(),
            self.r.as_ref(),
            self.s.as_ref(),
        ]
    }
}

/// FakeTransaction 的字段输入：额外带一个可信的 `from`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FakeTxData {
    #[serde(flatten)]
    pub tx: TxData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<FieldValue>,
}

// ============================================================================
// 构造选项
// ============================================================================

/// 链选择：名称或数字 id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChainRef {
    Id(u64),
    Name(String),
}

impl ChainRef {
    pub fn resolve(&self) -> Result<Chain, TxError> {
        match self {
            Self::Id(id) => Ok(Chain::from_chain_id(*id)),
            Self::Name(name) => Chain::from_name(name)
                .ok_or_else(|| TxError::Configuration(format!("unknown chain: {}", name))),
        }
    }
}

impl From<u64> for ChainRef {
    fn from(id: u64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for ChainRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

/// 解析后的链选择（tagged union），两组选项只能取其一
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainSelector {
    Named { chain: Chain, hardfork: Hardfork },
    Prebuilt(Arc<ChainContext>),
}

impl ChainSelector {
    pub fn into_context(self) -> Arc<ChainContext> {
        match self {
            Self::Named { chain, hardfork } => Arc::new(ChainContext::new(chain, hardfork)),
            Self::Prebuilt(ctx) => ctx,
        }
    }
}

/// 交易构造选项：`{chain, hardfork}` 或 `{common}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TxOptions {
    #[serde(default)]
    pub chain: Option<ChainRef>,
    #[serde(default)]
    pub hardfork: Option<Hardfork>,
    #[serde(skip)]
    pub common: Option<Arc<ChainContext>>,
}

impl TxOptions {
    pub fn with_chain(chain: impl Into<ChainRef>) -> Self {
        Self {
            chain: Some(chain.into()),
            ..Self::default()
        }
    }

    pub fn with_hardfork(hardfork: Hardfork) -> Self {
        Self {
            hardfork: Some(hardfork),
            ..Self::default()
        }
    }

    pub fn with_common(common: Arc<ChainContext>) -> Self {
        Self {
            common: Some(common),
            ..Self::default()
        }
    }

    pub fn hardfork(mut self, hardfork: Hardfork) -> Self {
        self.hardfork = Some(hardfork);
        self
    }

    /// 转换为 `ChainSelector`，common 与 chain/hardfork 同时出现时报错
    pub fn selector(&self) -> Result<ChainSelector, TxError> {
        match (&self.common, &self.chain, &self.hardfork) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(TxError::Configuration(
                "instantiation with both common and chain/hardfork options is not allowed"
                    .to_string(),
            )),
            (Some(common), None, None) => Ok(ChainSelector::Prebuilt(Arc::clone(common))),
            (None, chain, hardfork) => {
                let chain = match chain {
                    Some(chain) => chain.resolve()?,
                    None => Chain::Mainnet,
                };
                Ok(ChainSelector::Named {
                    chain,
                    hardfork: hardfork.unwrap_or_default(),
                })
            }
        }
    }

    pub fn resolve(&self) -> Result<Arc<ChainContext>, TxError> {
        Ok(self.selector()?.into_context())
    }
}
