//! 数据库类型
//!
//! 服务同时维护三类数据库：地理位置、ASN、代理检测。

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, IntoEnumIterator};

/// IP2Location 产品代码（header 第 29 字节）
pub const PRODUCT_IP2LOCATION: u8 = 1;
/// IP2Proxy 产品代码
pub const PRODUCT_IP2PROXY: u8 = 2;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DatabaseKind {
    Location,
    Asn,
    Proxy,
}

impl DatabaseKind {
    pub const COUNT: usize = 3;

    /// 按固定顺序遍历所有类型（location, asn, proxy）
    pub fn all() -> impl Iterator<Item = DatabaseKind> {
        Self::iter()
    }

    /// 在 registry 槽位数组中的下标
    pub const fn index(self) -> usize {
        match self {
            Self::Location => 0,
            Self::Asn => 1,
            Self::Proxy => 2,
        }
    }

    /// 文件 header 中期望的产品代码
    pub const fn product_code(self) -> u8 {
        match self {
            Self::Location | Self::Asn => PRODUCT_IP2LOCATION,
            Self::Proxy => PRODUCT_IP2PROXY,
        }
    }
}

impl std::fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl std::str::FromStr for DatabaseKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "location" | "geo" => Ok(Self::Location),
            "asn" => Ok(Self::Asn),
            "proxy" => Ok(Self::Proxy),
            _ => Err(format!(
                "Invalid database kind: '{}'. Valid: location, asn, proxy",
                s
            )),
        }
    }
}
