//! 列布局
//!
//! IP2Location / IP2Proxy 文件本身只记录 db type 与列数，每一列的位置由
//! 官方定义的位置表决定（位置 1 为 ip_from，0 表示该 db type 不含此列）。
//! 这里把位置表展开成 IPv4 / IPv6 两套带偏移的 [`FieldSpec`]。

use crate::errors::{IpGeoError, Result};

use super::decoder::{FieldSpec, FieldType};
use super::kind::DatabaseKind;

const STR: FieldType = FieldType::Str { skip: 0 };
/// 国家全称紧跟在两字母国家代码之后（1 字节长度 + 2 字节代码）
const STR_LONG_COUNTRY: FieldType = FieldType::Str { skip: 3 };

struct Column {
    name: &'static str,
    ty: FieldType,
    positions: &'static [u8],
}

// IP2Location DB1..DB26，下标即 db type
const LOCATION_COLUMNS: &[Column] = &[
    Column {
        name: "country_short",
        ty: STR,
        positions: &[0, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2],
    },
    Column {
        name: "country_long",
        ty: STR_LONG_COUNTRY,
        positions: &[0, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2],
    },
    Column {
        name: "region",
        ty: STR,
        positions: &[0, 0, 0, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3],
    },
    Column {
        name: "city",
        ty: STR,
        positions: &[0, 0, 0, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4],
    },
    Column {
        name: "isp",
        ty: STR,
        positions: &[0, 0, 3, 0, 5, 0, 7, 5, 7, 0, 8, 0, 9, 0, 9, 0, 9, 0, 9, 7, 9, 0, 9, 7, 9, 9, 9],
    },
    Column {
        name: "latitude",
        ty: FieldType::F32,
        positions: &[0, 0, 0, 0, 0, 5, 5, 0, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5],
    },
    Column {
        name: "longitude",
        ty: FieldType::F32,
        positions: &[0, 0, 0, 0, 0, 6, 6, 0, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6],
    },
    Column {
        name: "domain",
        ty: STR,
        positions: &[0, 0, 0, 0, 0, 0, 0, 6, 8, 0, 9, 0, 10, 0, 10, 0, 10, 0, 10, 8, 10, 0, 10, 8, 10, 10, 10],
    },
    Column {
        name: "zipcode",
        ty: STR,
        positions: &[0, 0, 0, 0, 0, 0, 0, 0, 0, 7, 7, 7, 7, 0, 7, 7, 7, 0, 7, 0, 7, 7, 7, 0, 7, 7, 7],
    },
    Column {
        name: "timezone",
        ty: STR,
        positions: &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 8, 8, 7, 8, 8, 8, 7, 8, 0, 8, 8, 8, 0, 8, 8, 8],
    },
];

// IP2Proxy PX1..PX12
const PROXY_COLUMNS: &[Column] = &[
    Column {
        name: "country_short",
        ty: STR,
        positions: &[0, 2, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3],
    },
    Column {
        name: "country_long",
        ty: STR_LONG_COUNTRY,
        positions: &[0, 2, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3],
    },
    Column {
        name: "region",
        ty: STR,
        positions: &[0, 0, 0, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4],
    },
    Column {
        name: "city",
        ty: STR,
        positions: &[0, 0, 0, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5],
    },
    Column {
        name: "isp",
        ty: STR,
        positions: &[0, 0, 0, 0, 6, 6, 6, 6, 6, 6, 6, 6, 6],
    },
    Column {
        name: "proxy_type",
        ty: STR,
        positions: &[0, 0, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2],
    },
    Column {
        name: "domain",
        ty: STR,
        positions: &[0, 0, 0, 0, 0, 7, 7, 7, 7, 7, 7, 7, 7],
    },
    Column {
        name: "usage_type",
        ty: STR,
        positions: &[0, 0, 0, 0, 0, 0, 8, 8, 8, 8, 8, 8, 8],
    },
    Column {
        name: "asn",
        ty: STR,
        positions: &[0, 0, 0, 0, 0, 0, 0, 9, 9, 9, 9, 9, 9],
    },
    Column {
        name: "as",
        ty: STR,
        positions: &[0, 0, 0, 0, 0, 0, 0, 10, 10, 10, 10, 10, 10],
    },
    Column {
        name: "last_seen",
        ty: STR,
        positions: &[0, 0, 0, 0, 0, 0, 0, 0, 11, 11, 11, 11, 11],
    },
    Column {
        name: "threat",
        ty: STR,
        positions: &[0, 0, 0, 0, 0, 0, 0, 0, 0, 12, 12, 12, 12],
    },
    Column {
        name: "provider",
        ty: STR,
        positions: &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 13, 13],
    },
];

// ASN LITE 只有一种布局：ip_from, cidr, asn, as
const ASN_COLUMNS: &[(&str, u8)] = &[("cidr", 2), ("asn", 3), ("as", 4)];

/// Row layout of one database file for both address families
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    pub columns: u8,
    pub ipv4_row_size: usize,
    pub ipv6_row_size: usize,
    pub ipv4: Vec<FieldSpec>,
    pub ipv6: Vec<FieldSpec>,
}

impl RecordLayout {
    /// Resolve the layout for `kind` from the header's db type and column count
    pub fn resolve(kind: DatabaseKind, db_type: u8, columns: u8) -> Result<Self> {
        if columns == 0 {
            return Err(IpGeoError::corrupt_header("column count is zero"));
        }

        let positioned = positions_for(kind, db_type)?;
        let highest = positioned.iter().map(|(_, _, pos)| *pos).max().unwrap_or(1);
        if highest > columns {
            return Err(IpGeoError::corrupt_header(format!(
                "{} db type {} needs {} columns, header declares {}",
                kind, db_type, highest, columns
            )));
        }

        let mut ipv4 = vec![FieldSpec::new("ip_from", FieldType::Ipv4, 0)];
        let mut ipv6 = vec![FieldSpec::new("ip_from", FieldType::Ipv6, 0)];
        for (name, ty, pos) in positioned {
            let pos = pos as usize;
            ipv4.push(FieldSpec::new(name, ty, (pos - 1) * 4));
            ipv6.push(FieldSpec::new(name, ty, 16 + (pos - 2) * 4));
        }

        let columns_usize = columns as usize;
        Ok(Self {
            columns,
            ipv4_row_size: columns_usize * 4,
            ipv6_row_size: 16 + (columns_usize - 1) * 4,
            ipv4,
            ipv6,
        })
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.ipv4.iter().map(|f| f.name)
    }
}

fn positions_for(kind: DatabaseKind, db_type: u8) -> Result<Vec<(&'static str, FieldType, u8)>> {
    let table = match kind {
        DatabaseKind::Location => LOCATION_COLUMNS,
        DatabaseKind::Proxy => PROXY_COLUMNS,
        DatabaseKind::Asn => {
            return Ok(ASN_COLUMNS
                .iter()
                .map(|(name, pos)| (*name, STR, *pos))
                .collect());
        }
    };

    let idx = db_type as usize;
    if idx == 0 || idx >= table[0].positions.len() {
        return Err(IpGeoError::corrupt_header(format!(
            "unknown {} db type {}",
            kind, db_type
        )));
    }

    Ok(table
        .iter()
        .filter(|c| c.positions[idx] > 1)
        .map(|c| (c.name, c.ty, c.positions[idx]))
        .collect())
}
