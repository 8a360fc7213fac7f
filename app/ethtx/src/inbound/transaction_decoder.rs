/// Legacy 交易输入解码器
/// 支持三种输入形式：
/// - 原始字段列表（6 个字段 = 未签名，9 个字段 = 已签名）
/// - RLP 编码的交易字节
/// - 具名字段映射 (`TxData`)
///
/// 输出统一为九个规范字节串，顺序为 `[nonce, gasPrice, gasLimit, to, value, data, v, r, s]`

use crate::domain::tx_types::{bytes_to_hex, normalize_field, FieldValue, TxData, TxError, TX_FIELDS};
use rlp::{DecoderError, Rlp};
use serde_json::{Map, Value};

/// 未签名交易的字段数
pub const UNSIGNED_FIELD_COUNT: usize = 6;
/// 已签名交易的字段数
pub const SIGNED_FIELD_COUNT: usize = 9;

/// 交易构造输入
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TxInput {
    /// 全部字段为空
    #[default]
    Empty,
    /// 按线上顺序的 6 或 9 个字段
    Raw(Vec<FieldValue>),
    /// RLP 编码的列表
    Rlp(Vec<u8>),
    /// 具名字段
    Fields(TxData),
}

impl<T: Into<FieldValue>> From<Vec<T>> for TxInput {
    fn from(values: Vec<T>) -> Self {
        Self::Raw(values.into_iter().map(Into::into).collect())
    }
}

impl From<TxData> for TxInput {
    fn from(data: TxData) -> Self {
        Self::Fields(data)
    }
}

/// 将任意输入解码为九个规范字段
pub fn decode_fields(input: &TxInput) -> Result<[Vec<u8>; 9], TxError> {
    match input {
        TxInput::Empty => Ok(Default::default()),
        TxInput::Raw(values) => {
            let bytes = values
                .iter()
                .map(FieldValue::to_bytes)
                .collect::<Result<Vec<_>, _>>()?;
            canonical_fields(bytes)
        }
        TxInput::Rlp(bytes) => canonical_fields(decode_rlp_list(bytes)?),
        TxInput::Fields(data) => {
            let mut fields: [Vec<u8>; 9] = Default::default();
            for (index, value) in data.ordered().into_iter().enumerate() {
                if let Some(value) = value {
                    let (name, kind) = TX_FIELDS[index];
                    fields[index] = normalize_field(name, kind, value.to_bytes()?)?;
                }
            }
            Ok(fields)
        }
    }
}

/// 解码 RLP 字节串列表，拒绝嵌套列表与尾随字节
pub fn decode_rlp_list(bytes: &[u8]) -> Result<Vec<Vec<u8>>, TxError> {
    if bytes.is_empty() {
        return Err(TxError::Decoding("empty transaction data".to_string()));
    }

    let rlp = Rlp::new(bytes);
    if !rlp.is_list() {
        return Err(DecoderError::RlpExpectedToBeList.into());
    }
    let info = rlp.payload_info()?;
    if info.header_len + info.value_len != bytes.len() {
        return Err(DecoderError::RlpInconsistentLengthAndData.into());
    }

    let mut items = Vec::with_capacity(SIGNED_FIELD_COUNT);
    for i in 0..rlp.item_count()? {
        items.push(rlp.val_at::<Vec<u8>>(i)?);
    }
    Ok(items)
}

/// 6 个字段补齐空的 v/r/s，9 个字段原样；其余个数为解码错误
fn canonical_fields(values: Vec<Vec<u8>>) -> Result<[Vec<u8>; 9], TxError> {
    if values.len() != UNSIGNED_FIELD_COUNT && values.len() != SIGNED_FIELD_COUNT {
        return Err(TxError::Decoding(format!(
            "wrong number of fields in data: expected {} or {}, got {}",
            UNSIGNED_FIELD_COUNT,
            SIGNED_FIELD_COUNT,
            values.len()
        )));
    }

    let mut fields: [Vec<u8>; 9] = Default::default();
    for (index, value) in values.into_iter().enumerate() {
        let (name, kind) = TX_FIELDS[index];
        fields[index] = normalize_field(name, kind, value)?;
    }
    Ok(fields)
}

/// 导出为 JSON：带标签时为对象，否则为数组
pub fn encode_json(fields: &[Vec<u8>; 9], labels: bool) -> Value {
    if labels {
        let map: Map<String, Value> = TX_FIELDS
            .iter()
            .zip(fields.iter())
            .map(|((name, _), value)| (name.to_string(), Value::String(bytes_to_hex(value))))
            .collect();
        Value::Object(map)
    } else {
        Value::Array(
            fields
                .iter()
                .map(|value| Value::String(bytes_to_hex(value)))
                .collect(),
        )
    }
}
