//! 地址规范化
//!
//! 把客户端输入的地址字符串转换为记录表的查找键。

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::errors::{IpGeoError, Result};

/// 查找键：落在哪张表，以及该表内的数值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKey {
    V4(u32),
    V6(u128),
}

/// 解析地址字符串（不做 trim，带空白视为非法）
pub fn parse_address(input: &str) -> Result<IpAddr> {
    input
        .parse::<IpAddr>()
        .map_err(|_| IpGeoError::invalid_address(format!("Invalid IP address: {}", input)))
}

/// 根据文件包含的地址族选择查找键；返回 `None` 表示该文件无法回答此地址
pub fn search_key(addr: IpAddr, has_ipv4: bool, has_ipv6: bool) -> Option<SearchKey> {
    let key = match addr {
        IpAddr::V4(v4) => {
            if has_ipv4 {
                SearchKey::V4(u32::from(v4))
            } else if has_ipv6 {
                SearchKey::V6(u128::from(v4.to_ipv6_mapped()))
            } else {
                return None;
            }
        }
        IpAddr::V6(v6) => match embedded_ipv4(&v6) {
            Some(v4) if has_ipv4 => SearchKey::V4(u32::from(v4)),
            _ if has_ipv6 => SearchKey::V6(u128::from(v6)),
            _ => return None,
        },
    };

    // 终止行以地址族最大值为下界，最大地址本身需要回退一位
    Some(match key {
        SearchKey::V4(u32::MAX) => SearchKey::V4(u32::MAX - 1),
        SearchKey::V6(u128::MAX) => SearchKey::V6(u128::MAX - 1),
        other => other,
    })
}

/// IPv4-mapped、6to4、Teredo 地址中携带的 IPv4 地址
pub fn embedded_ipv4(v6: &Ipv6Addr) -> Option<Ipv4Addr> {
    if let Some(v4) = v6.to_ipv4_mapped() {
        return Some(v4);
    }

    let segments = v6.segments();
    match (segments[0], segments[1]) {
        // 2002::/16 (6to4)，IPv4 位于第 16..48 位
        (0x2002, _) => Some(Ipv4Addr::from(
            ((segments[1] as u32) << 16) | segments[2] as u32,
        )),
        // 2001:0000::/32 (Teredo)，客户端 IPv4 为最后 32 位取反
        (0x2001, 0x0000) => Some(Ipv4Addr::from(
            !(((segments[6] as u32) << 16) | segments[7] as u32),
        )),
        _ => None,
    }
}
