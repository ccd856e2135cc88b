use std::fmt;
use std::str::FromStr;

use crate::error::ChainError;

/// Blockchain backends a manager or adapter can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BcType {
    Ethereum,
    Fabric,
    Stub,
}

impl BcType {
    pub const ALL: [BcType; 3] = [BcType::Ethereum, BcType::Fabric, BcType::Stub];

    pub fn as_str(&self) -> &'static str {
        match self {
            BcType::Ethereum => "ETHEREUM",
            BcType::Fabric => "FABRIC",
            BcType::Stub => "STUB",
        }
    }
}

impl fmt::Display for BcType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BcType {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ETHEREUM" => Ok(BcType::Ethereum),
            "FABRIC" => Ok(BcType::Fabric),
            "STUB" => Ok(BcType::Stub),
            other => Err(ChainError::ConfigError(format!(
                "unknown blockchain type '{}'",
                other
            ))),
        }
    }
}
