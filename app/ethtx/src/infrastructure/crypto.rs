//! 密码学原语适配层
//!
//! 交易核心只通过本模块接触外部原语：
//! - Keccak-256 哈希 (sha3)
//! - RLP 字节串列表编码后的哈希 (rlp)
//! - secp256k1 ECDSA 签名 / 公钥恢复 / 签名范围检查 (k256)

use ethereum_types::{Address, H256};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rlp::RlpStream;
use sha3::{Digest, Keccak256};
use thiserror::Error;

/// 未压缩公钥长度（去掉 0x04 前缀后的 x || y）
pub const PUBLIC_KEY_LENGTH: usize = 64;

/// 去掉前缀的未压缩公钥
pub type PublicKey = [u8; PUBLIC_KEY_LENGTH];

/// 密码学原语错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid recovery id {0}")]
    InvalidRecoveryId(u64),
    #[error("public key recovery failed")]
    RecoveryFailed,
}

/// ECDSA 签名结果（r, s 为 32 字节大端，s 已规范为 low-s）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcdsaSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub recovery_id: u8,
}

/// 计算 keccak256 哈希
pub fn keccak256(data: &[u8]) -> H256 {
    H256::from_slice(&Keccak256::digest(data))
}

/// 将字节串列表按 RLP 编码
pub fn rlp_encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let mut stream = RlpStream::new_list(items.len());
    for item in items {
        stream.append(item);
    }
    stream.out().to_vec()
}

/// keccak256(rlp(items))
pub fn rlp_hash(items: &[Vec<u8>]) -> H256 {
    keccak256(&rlp_encode_list(items))
}

/// 对 32 字节摘要签名
///
/// k256 的 `sign_prehash_recoverable` 使用 RFC6979 确定性 nonce，
/// 并且输出的 s 已经是 low-s（recovery id 随之调整）。
pub fn ecdsa_sign(digest: &H256, private_key: &[u8]) -> Result<EcdsaSignature, CryptoError> {
    let signing_key =
        SigningKey::from_slice(private_key).map_err(|_| CryptoError::InvalidPrivateKey)?;
    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(digest.as_bytes())
        .map_err(|_| CryptoError::InvalidSignature)?;

    let (r, s) = signature.split_bytes();
    let mut out = EcdsaSignature {
        r: [0u8; 32],
        s: [0u8; 32],
        recovery_id: recovery_id.to_byte(),
    };
    out.r.copy_from_slice(&r);
    out.s.copy_from_slice(&s);
    Ok(out)
}

/// 检查 r, s 是否落在 [1, n) 区间内；`require_low_s` 时额外要求 s <= n/2 (EIP-2)
pub fn is_valid_signature(r: &[u8], s: &[u8], require_low_s: bool) -> bool {
    match signature_from_parts(r, s) {
        Ok(signature) => !require_low_s || signature.normalize_s().is_none(),
        Err(_) => false,
    }
}

/// 从摘要和 (r, s, recovery_id) 恢复公钥
///
/// 高 s 签名会先被规范化并翻转 recovery id，恢复出的公钥不变。
pub fn ecdsa_recover(
    digest: &H256,
    r: &[u8],
    s: &[u8],
    recovery_id: u64,
) -> Result<PublicKey, CryptoError> {
    let byte = u8::try_from(recovery_id).map_err(|_| CryptoError::InvalidRecoveryId(recovery_id))?;
    let mut recid =
        RecoveryId::from_byte(byte).ok_or(CryptoError::InvalidRecoveryId(recovery_id))?;
    if recid.is_x_reduced() {
        return Err(CryptoError::InvalidRecoveryId(recovery_id));
    }

    let mut signature = signature_from_parts(r, s)?;
    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recid = RecoveryId::new(!recid.is_y_odd(), false);
    }

    let verifying_key = VerifyingKey::recover_from_prehash(digest.as_bytes(), &signature, recid)
        .map_err(|_| CryptoError::RecoveryFailed)?;
    Ok(encode_public_key(&verifying_key))
}

/// 由私钥推导去前缀的未压缩公钥
pub fn private_to_public(private_key: &[u8]) -> Result<PublicKey, CryptoError> {
    let signing_key =
        SigningKey::from_slice(private_key).map_err(|_| CryptoError::InvalidPrivateKey)?;
    Ok(encode_public_key(signing_key.verifying_key()))
}

/// 地址 = keccak256(x || y) 的后 20 字节
pub fn public_to_address(public_key: &PublicKey) -> Address {
    let hash = keccak256(public_key);
    Address::from_slice(&hash.as_bytes()[12..])
}

fn encode_public_key(verifying_key: &VerifyingKey) -> PublicKey {
    let point = verifying_key.to_encoded_point(false);
    let mut out = [0u8; PUBLIC_KEY_LENGTH];
    // 跳过 0x04 前缀
    out.copy_from_slice(&point.as_bytes()[1..]);
    out
}

/// r, s 允许少于 32 字节（规范化后的大端整数），左侧补零
fn signature_from_parts(r: &[u8], s: &[u8]) -> Result<Signature, CryptoError> {
    if r.is_empty() || s.is_empty() || r.len() > 32 || s.len() > 32 {
        return Err(CryptoError::InvalidSignature);
    }
    let mut r_bytes = [0u8; 32];
    let mut s_bytes = [0u8; 32];
    r_bytes[32 - r.len()..].copy_from_slice(r);
    s_bytes[32 - s.len()..].copy_from_slice(s);
    Signature::from_scalars(r_bytes, s_bytes).map_err(|_| CryptoError::InvalidSignature)
}
