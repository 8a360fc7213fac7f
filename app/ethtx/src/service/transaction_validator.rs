/// 交易自检：签名健康度 + gas 下限
///
/// 校验结果是普通的值而不是错误，`Transaction::validate` 与
/// `FakeTransaction` 共用同一套规则：
/// - 已签名（v/r/s 任一非空）时要求签名可恢复
/// - gas_limit >= base_fee
use crate::domain::transaction::Transaction;
use ethereum_types::U256;
use thiserror::Error;

/// 校验失败项，`Display` 即对外的错误文本
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("Invalid Signature")]
    InvalidSignature,
    #[error("gas limit is too low. Need at least {required}")]
    GasLimitTooLow { required: U256 },
}

/// 收集全部失败项，签名问题排在前面
pub fn validation_failures(tx: &Transaction) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();

    // 未签名交易没有签名可查，只检查 gas
    if !tx.is_unsigned() && !tx.verify_signature() {
        failures.push(ValidationFailure::InvalidSignature);
    }

    let base_fee = tx.base_fee();
    if base_fee > tx.gas_limit_value() {
        failures.push(ValidationFailure::GasLimitTooLow { required: base_fee });
    }

    if !failures.is_empty() {
        tracing::debug!(count = failures.len(), "transaction failed validation");
    }
    failures
}

/// 以空格拼接失败描述，全部通过时为空串
pub fn failures_to_message(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
