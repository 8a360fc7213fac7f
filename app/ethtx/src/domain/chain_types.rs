//! 链上下文 (Chain Context)
//!
//! 为交易提供 chain id 与硬分叉特性开关，参考 geth params/config.go 的
//! `IsHomestead` / `IsEIP155` / `IsIstanbul` 判断方式。
//! 一个 `ChainContext` 构造后不可变，可以通过 `Arc` 在多个交易之间共享。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 已知网络
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chain {
    Mainnet,
    Ropsten,
    Rinkeby,
    Goerli,
    Kovan,
    /// 其他任意 chain id
    Custom(u64),
}

impl Chain {
    pub fn chain_id(&self) -> u64 {
        match self {
            Self::Mainnet => 1,
            Self::Ropsten => 3,
            Self::Rinkeby => 4,
            Self::Goerli => 5,
            Self::Kovan => 42,
            Self::Custom(id) => *id,
        }
    }

    /// 已知 id 映射为具名网络，其余为 `Custom`
    pub fn from_chain_id(chain_id: u64) -> Self {
        match chain_id {
            1 => Self::Mainnet,
            3 => Self::Ropsten,
            4 => Self::Rinkeby,
            5 => Self::Goerli,
            42 => Self::Kovan,
            id => Self::Custom(id),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mainnet" => Some(Self::Mainnet),
            "ropsten" => Some(Self::Ropsten),
            "rinkeby" => Some(Self::Rinkeby),
            "goerli" => Some(Self::Goerli),
            "kovan" => Some(Self::Kovan),
            _ => None,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Ropsten => write!(f, "ropsten"),
            Self::Rinkeby => write!(f, "rinkeby"),
            Self::Goerli => write!(f, "goerli"),
            Self::Kovan => write!(f, "kovan"),
            Self::Custom(id) => write!(f, "chain-{}", id),
        }
    }
}

/// 硬分叉（按激活顺序排列，派生的 `Ord` 即时间先后）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Hardfork {
    Chainstart,
    Homestead,
    Dao,
    TangerineWhistle,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    #[default]
    Petersburg,
    Istanbul,
    MuirGlacier,
}

impl Hardfork {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Chainstart => "chainstart",
            Self::Homestead => "homestead",
            Self::Dao => "dao",
            Self::TangerineWhistle => "tangerineWhistle",
            Self::SpuriousDragon => "spuriousDragon",
            Self::Byzantium => "byzantium",
            Self::Constantinople => "constantinople",
            Self::Petersburg => "petersburg",
            Self::Istanbul => "istanbul",
            Self::MuirGlacier => "muirGlacier",
        }
    }
}

impl fmt::Display for Hardfork {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Hardfork {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fork = match s {
            "chainstart" => Self::Chainstart,
            "homestead" => Self::Homestead,
            "dao" => Self::Dao,
            "tangerineWhistle" => Self::TangerineWhistle,
            "spuriousDragon" => Self::SpuriousDragon,
            "byzantium" => Self::Byzantium,
            "constantinople" => Self::Constantinople,
            "petersburg" => Self::Petersburg,
            "istanbul" => Self::Istanbul,
            "muirGlacier" => Self::MuirGlacier,
            other => return Err(format!("unknown hardfork: {}", other)),
        };
        Ok(fork)
    }
}

/// 交易相关的 gas 常量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasSchedule {
    /// 交易基础开销
    pub tx: u64,
    /// 合约创建附加开销 (Homestead 起)
    pub tx_creation: u64,
    /// calldata 零字节单价
    pub tx_data_zero: u64,
    /// calldata 非零字节单价 (EIP-2028 后降为 16)
    pub tx_data_non_zero: u64,
}

impl GasSchedule {
    pub const TX: u64 = 21000;
    pub const TX_CREATION: u64 = 32000;
    pub const TX_DATA_ZERO: u64 = 4;
    pub const TX_DATA_NON_ZERO_FRONTIER: u64 = 68;
    pub const TX_DATA_NON_ZERO_EIP2028: u64 = 16;
}

/// 链上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainContext {
    chain: Chain,
    hardfork: Hardfork,
}

impl Default for ChainContext {
    fn default() -> Self {
        Self::new(Chain::Mainnet, Hardfork::default())
    }
}

impl ChainContext {
    pub fn new(chain: Chain, hardfork: Hardfork) -> Self {
        Self { chain, hardfork }
    }

    /// 由 chain id 与硬分叉直接构造
    pub fn from_chain_id(chain_id: u64, hardfork: Hardfork) -> Self {
        Self::new(Chain::from_chain_id(chain_id), hardfork)
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    pub fn chain_id(&self) -> u64 {
        self.chain.chain_id()
    }

    pub fn hardfork(&self) -> Hardfork {
        self.hardfork
    }

    /// 当前硬分叉是否不早于 `hardfork`
    pub fn gte_hardfork(&self, hardfork: Hardfork) -> bool {
        self.hardfork >= hardfork
    }

    pub fn is_homestead(&self) -> bool {
        self.gte_hardfork(Hardfork::Homestead)
    }

    /// EIP-155 重放保护在 Spurious Dragon 激活
    pub fn eip155_active(&self) -> bool {
        self.gte_hardfork(Hardfork::SpuriousDragon)
    }

    /// EIP-2028 calldata 降价在 Istanbul 激活
    pub fn eip2028_active(&self) -> bool {
        self.gte_hardfork(Hardfork::Istanbul)
    }

    pub fn gas_schedule(&self) -> GasSchedule {
        GasSchedule {
            tx: GasSchedule::TX,
            tx_creation: GasSchedule::TX_CREATION,
            tx_data_zero: GasSchedule::TX_DATA_ZERO,
            tx_data_non_zero: if self.eip2028_active() {
                GasSchedule::TX_DATA_NON_ZERO_EIP2028
            } else {
                GasSchedule::TX_DATA_NON_ZERO_FRONTIER
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_context() {
        let ctx = ChainContext::default();
        assert_eq!(ctx.chain_id(), 1);
        assert_eq!(ctx.hardfork(), Hardfork::Petersburg);
        assert!(ctx.is_homestead());
        assert!(ctx.eip155_active());
        assert!(!ctx.eip2028_active());
        assert_eq!(ctx.gas_schedule().tx_data_non_zero, 68);
    }

    #[test]
    fn test_feature_flags_follow_hardfork() {
        let chainstart = ChainContext::new(Chain::Mainnet, Hardfork::Chainstart);
        assert!(!chainstart.is_homestead());
        assert!(!chainstart.eip155_active());

        let tangerine = ChainContext::new(Chain::Mainnet, Hardfork::TangerineWhistle);
        assert!(tangerine.is_homestead());
        assert!(!tangerine.eip155_active());

        let istanbul = ChainContext::new(Chain::Ropsten, Hardfork::Istanbul);
        assert!(istanbul.eip155_active());
        assert!(istanbul.eip2028_active());
        assert_eq!(istanbul.gas_schedule().tx_data_non_zero, 16);
    }

    #[test]
    fn test_chain_ids() {
        assert_eq!(Chain::from_name("Kovan"), Some(Chain::Kovan));
        assert_eq!(Chain::from_name("unknown"), None);
        assert_eq!(Chain::from_chain_id(3), Chain::Ropsten);
        assert_eq!(Chain::from_chain_id(1337), Chain::Custom(1337));
        assert_eq!(ChainContext::from_chain_id(42, Hardfork::Istanbul).chain_id(), 42);
    }

    #[test]
    fn test_hardfork_names_round_trip() {
        for fork in [
            Hardfork::Chainstart,
            Hardfork::TangerineWhistle,
            Hardfork::SpuriousDragon,
            Hardfork::MuirGlacier,
        ] {
            assert_eq!(fork.name().parse::<Hardfork>(), Ok(fork));
        }
        assert!("frontier".parse::<Hardfork>().is_err());

        let fork: Hardfork = serde_json::from_str("\"tangerineWhistle\"").unwrap();
        assert_eq!(fork, Hardfork::TangerineWhistle);
    }
}
