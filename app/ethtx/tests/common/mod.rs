//! 集成测试公共工具

use tracing_subscriber::EnvFilter;

/// 安装测试日志订阅者，`RUST_LOG=ethtx=trace` 可查看交易内部日志
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// 解码不带 0x 前缀的十六进制
pub fn unhex(s: &str) -> Vec<u8> {
    hex::decode(s).expect("valid hex in test vector")
}
