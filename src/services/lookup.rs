//! 组合查询服务
//!
//! 对同一个 registry 快照依次查询 location / asn / proxy 三个数据库，
//! 合并成一条响应记录。

use std::net::IpAddr;
use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

use crate::errors::{IpGeoError, Result};
use crate::geodb::{AddressRecord, DatabaseKind, parse_address};
use crate::registry::{DatabaseRegistry, RegistryState};

/// Response body of `GET /ip/{address}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedRecord {
    pub ip: String,
    pub alpha2_country_code: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub zipcode: Option<String>,
    pub timezone: Option<String>,
    pub asn_asn: Option<String>,
    pub asn_name: Option<String>,
    pub is_proxy: bool,
    pub proxy_type: Option<String>,
    pub threat: Option<String>,
    pub provider: Option<String>,
}

/// IP2Proxy 代理状态：0 非代理，1 代理，2 数据中心 / 搜索引擎爬虫
///
/// PX1 没有 proxy_type 列，用国家代码是否为 `-` 判断。
pub fn proxy_status(record: &AddressRecord) -> i8 {
    match record.get_str("proxy_type") {
        Some("-") => 0,
        Some("DCH") | Some("SES") => 2,
        Some(_) => 1,
        None => match record.get_str("country_short") {
            Some("-") | None => 0,
            Some(_) => 1,
        },
    }
}

#[derive(Clone)]
pub struct LookupService {
    registry: Arc<DatabaseRegistry>,
}

impl LookupService {
    pub fn new(registry: Arc<DatabaseRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<DatabaseRegistry> {
        &self.registry
    }

    /// Resolve `address` against all three databases of one generation
    pub fn resolve(&self, address: &str) -> Result<CombinedRecord> {
        let addr = parse_address(address)?;

        let snapshot = self.registry.snapshot();
        let missing = snapshot.missing_kinds();
        if !missing.is_empty() {
            let names: Vec<String> = missing.iter().map(|k| k.to_string()).collect();
            return Err(IpGeoError::service_unavailable(format!(
                "Database not loaded: {}",
                names.join(", ")
            )));
        }

        let location = lookup_kind(&snapshot, DatabaseKind::Location, addr)?;
        let asn = lookup_kind(&snapshot, DatabaseKind::Asn, addr)?;
        let proxy = lookup_kind(&snapshot, DatabaseKind::Proxy, addr)?;
        trace!(
            "Resolved {} at generation {} (location={}, asn={}, proxy={})",
            address,
            snapshot.generation(),
            location.is_some(),
            asn.is_some(),
            proxy.is_some()
        );

        Ok(merge(address, location.as_ref(), asn.as_ref(), proxy.as_ref()))
    }
}

fn lookup_kind(
    snapshot: &RegistryState,
    kind: DatabaseKind,
    addr: IpAddr,
) -> Result<Option<AddressRecord>> {
    let installed = snapshot
        .get(kind)
        .ok_or_else(|| IpGeoError::not_ready(format!("{} database is not loaded", kind)))?;
    Ok(installed.database.lookup(addr)?.into_record())
}

fn merge(
    address: &str,
    location: Option<&AddressRecord>,
    asn: Option<&AddressRecord>,
    proxy: Option<&AddressRecord>,
) -> CombinedRecord {
    let text = |record: Option<&AddressRecord>, name: &str| {
        record.and_then(|r| r.get_str(name)).map(str::to_string)
    };
    let float = |name: &str| location.and_then(|r| r.get_f64(name));

    CombinedRecord {
        ip: address.to_string(),
        alpha2_country_code: text(location, "country_short"),
        country: text(location, "country_long"),
        region: text(location, "region"),
        city: text(location, "city"),
        latitude: float("latitude"),
        longitude: float("longitude"),
        zipcode: text(location, "zipcode"),
        timezone: text(location, "timezone"),
        asn_asn: text(asn, "asn").map(|n| format!("AS{}", n)),
        asn_name: text(asn, "as"),
        is_proxy: proxy.map(proxy_status) == Some(1),
        proxy_type: text(proxy, "proxy_type"),
        threat: text(proxy, "threat"),
        provider: text(proxy, "provider"),
    }
}
