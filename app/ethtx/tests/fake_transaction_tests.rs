//! FakeTransaction 集成测试
//!
//! 发送者账户使用私钥 0x00..01，对应地址 0x7e5f4552091a69125d5dfcb7b8c2659029395bdf

mod common;

use common::{init_tracing, unhex};
use ethereum_types::{Address, U256, U512};
use ethtx::{
    ChainContext, FakeTransaction, FakeTxData, Hardfork, Transaction, TxError, TxOptions,
};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;

const FROM: &str = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf";
const WRONG_R: &str = "0xabcd1558260ac737ea6d800906c6d085a801e5e0f0952bf93978d6fa468fbdff";

fn tx_json() -> Value {
    json!({
        "data": "0x7cf5dab00000000000000000000000000000000000000000000000000000000000000005",
        "gasLimit": "0x15f90",
        "gasPrice": "0x1",
        "nonce": "0x01",
        "to": "0xd9024df085d09398ec76fbed18cac0e1149f50dc",
        "value": "0x0",
        "from": FROM,
        "v": "0x1c",
        "r": "0x25641558260ac737ea6d800906c6d085a801e5e0f0952bf93978d6fa468fbdfe",
        "s": "0x5d0904b8f9cfc092805df0cde2574d25e2c5fc28907a9a4741b3e857b68b0778",
    })
}

/// 在基础数据上覆盖字段，`Value::Null` 表示删除
fn tx_data_with(overrides: Value) -> FakeTxData {
    let mut base = tx_json();
    if let (Some(map), Some(extra)) = (base.as_object_mut(), overrides.as_object()) {
        for (key, value) in extra {
            if value.is_null() {
                map.remove(key);
            } else {
                map.insert(key.clone(), value.clone());
            }
        }
    }
    serde_json::from_value(base).expect("valid fake tx data")
}

fn tx_data() -> FakeTxData {
    tx_data_with(json!({}))
}

#[test]
fn test_signing_hash_with_and_without_from() -> anyhow::Result<()> {
    init_tracing();
    let expected = "0401bf740d698674be321d0064f92cd6ebba5d73d1e5e5189c0bebbda33a85fe";

    let opts = TxOptions::with_chain("mainnet").hardfork(Hardfork::Homestead);
    let tx = FakeTransaction::new(tx_data(), &opts)?;
    assert_eq!(hex::encode(tx.hash(false)), expected);
    assert_ne!(tx.hash(true), tx.hash(false));

    let tx = FakeTransaction::new(tx_data_with(json!({ "from": null })), &TxOptions::default())?;
    assert_eq!(hex::encode(tx.hash(false)), expected);
    assert_eq!(
        hex::encode(tx.hash(true)),
        "80a2ca70509414908881f718502e6bbb3bc67f416abdf972ea7c0888579be7b9"
    );
    Ok(())
}

#[test]
fn test_different_senders_do_not_collide() -> anyhow::Result<()> {
    let tx = FakeTransaction::new(tx_data(), &TxOptions::default())?;
    let other = FakeTransaction::new(
        tx_data_with(json!({ "from": "0x2222222222222222222222222222222222222222" })),
        &TxOptions::default(),
    )?;
    assert_ne!(tx.hash(true), other.hash(true));
    assert_eq!(tx.hash(false), other.hash(false));
    Ok(())
}

#[test]
fn test_from_is_recovered_when_absent() -> anyhow::Result<()> {
    let tx = FakeTransaction::new(tx_data_with(json!({ "from": null })), &TxOptions::default())?;
    let plain_hash = tx.hash(true);
    assert!(!tx.has_from());
    assert_eq!(tx.from()?, Address::from_str(FROM)?);
    // 恢复出的发送者不算显式 from，不进入哈希
    assert!(!tx.has_from());
    assert_eq!(tx.hash(true), plain_hash);

    let with_from = FakeTransaction::new(tx_data(), &TxOptions::default())?;
    assert_ne!(tx.hash(true), with_from.hash(true));
    Ok(())
}

#[test]
fn test_sender_address_prefers_explicit_from() -> anyhow::Result<()> {
    let tx = FakeTransaction::new(tx_data(), &TxOptions::default())?;
    assert_eq!(tx.from()?, Address::from_str(FROM)?);
    assert_eq!(tx.sender_address()?, Address::from_str(FROM)?);

    // 显式 from 与签名互不校验
    let spoofed = FakeTransaction::new(
        tx_data_with(json!({ "from": "0x2222222222222222222222222222222222222222" })),
        &TxOptions::default(),
    )?;
    assert_eq!(spoofed.sender_address()?, Address::repeat_byte(0x22));
    assert!(spoofed.verify_signature());
    Ok(())
}

#[test]
fn test_common_and_chain_options_conflict() {
    let mut opts = TxOptions::with_common(Arc::new(ChainContext::from_chain_id(1, Hardfork::Chainstart)));
    opts.chain = Some("mainnet".into());
    let result = FakeTransaction::new(tx_data(), &opts);
    assert!(matches!(result, Err(TxError::Configuration(_))));
}

#[test]
fn test_to_creation_address() -> anyhow::Result<()> {
    let tx = FakeTransaction::new(tx_data(), &TxOptions::default())?;
    let no_to = FakeTransaction::new(tx_data_with(json!({ "to": null })), &TxOptions::default())?;
    assert!(!tx.to_creation_address());
    assert!(no_to.to_creation_address());
    Ok(())
}

#[test]
fn test_chain_id() -> anyhow::Result<()> {
    let tx = FakeTransaction::new(tx_data(), &TxOptions::default())?;
    let ropsten = FakeTransaction::new(tx_data(), &TxOptions::with_chain(3u64))?;
    assert_eq!(tx.chain_id(), 1);
    assert_eq!(ropsten.chain_id(), 3);
    Ok(())
}

#[test]
fn test_verify_signature() -> anyhow::Result<()> {
    let tx = FakeTransaction::new(tx_data(), &TxOptions::default())?;
    let wrong = FakeTransaction::new(tx_data_with(json!({ "r": WRONG_R })), &TxOptions::default())?;
    assert!(tx.verify_signature());
    assert!(!wrong.verify_signature());
    Ok(())
}

#[test]
fn test_sign_without_eip155() -> anyhow::Result<()> {
    let opts = TxOptions::with_hardfork(Hardfork::TangerineWhistle);
    let mut tx = FakeTransaction::new(tx_data(), &opts)?;
    tx.sign(&unhex("164122e5d39e9814ca723a749253663bafb07f6af91704d9754c361eb315f0c1"))?;

    assert_eq!(
        hex::encode(tx.r()),
        "c10062450d68caa5a688e2b6930f34f8302064afe6e1ba7f6ca459115a31d3b8"
    );
    assert_eq!(
        hex::encode(tx.s()),
        "31718e6bf821a98d35b0d9cd66ea86f91f420c3c4658f60c607222de925d222a"
    );
    assert_eq!(hex::encode(tx.v()), "1c");
    // 重新签名不影响显式 from
    assert_eq!(tx.from()?, Address::from_str(FROM)?);
    Ok(())
}

#[test]
fn test_fees() -> anyhow::Result<()> {
    let tx = FakeTransaction::new(tx_data_with(json!({ "data": "0x00000001" })), &TxOptions::default())?;
    assert_eq!(tx.data_fee(), U256::from(80u64));
    assert_eq!(tx.base_fee(), U256::from(21080u64));

    let tx = FakeTransaction::new(
        tx_data_with(json!({ "gasLimit": "0x6464", "gasPrice": "0x2" })),
        &TxOptions::default(),
    )?;
    assert_eq!(tx.upfront_cost(), U512::from(51400u64));
    Ok(())
}

#[test]
fn test_validate() -> anyhow::Result<()> {
    let tx = FakeTransaction::new(tx_data(), &TxOptions::default())?;
    let wrong = FakeTransaction::new(tx_data_with(json!({ "r": WRONG_R })), &TxOptions::default())?;
    let low_limit = FakeTransaction::new(tx_data_with(json!({ "gasLimit": "0x1" })), &TxOptions::default())?;

    assert!(tx.validate());
    assert!(!wrong.validate());
    assert!(!low_limit.validate());

    assert_eq!(tx.validate_message(), "");
    assert_eq!(wrong.validate_message(), "Invalid Signature");
    assert_eq!(
        low_limit.validate_message(),
        "gas limit is too low. Need at least 21464"
    );
    Ok(())
}

#[test]
fn test_into_transaction_keeps_fields() -> anyhow::Result<()> {
    let fake = FakeTransaction::new(tx_data(), &TxOptions::default())?;
    let serialized = fake.serialize();
    let tx = fake.into_transaction();
    let plain = Transaction::from_rlp(&serialized, &TxOptions::default())?;
    assert_eq!(tx.raw(), plain.raw());
    assert_eq!(plain.sender_address()?, Address::from_str(FROM)?);
    Ok(())
}
