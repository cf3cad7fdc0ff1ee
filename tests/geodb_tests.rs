mod common;

use std::net::IpAddr;

use common::*;
use ipgeo::errors::IpGeoError;
use ipgeo::geodb::{DatabaseKind, GeoDatabase, LookupOutcome};

fn open(bytes: Vec<u8>, kind: DatabaseKind) -> GeoDatabase {
    GeoDatabase::from_bytes(bytes, kind).unwrap()
}

fn country(db: &GeoDatabase, addr: &str) -> Option<String> {
    db.lookup_str(addr)
        .unwrap()
        .into_record()
        .and_then(|r| r.get_str("country_short").map(str::to_string))
}

#[test]
fn test_three_range_lookup() {
    let db = open(three_range_location().build(), DatabaseKind::Location);

    let hit = db.lookup_str("0.0.0.100").unwrap().into_record().unwrap();
    assert_eq!(hit.get_str("country_short"), Some("AA"));
    assert_eq!(hit.get_str("country_long"), Some("Country AA"));
    assert_eq!(hit.get_str("region"), Some("AA Region"));
    assert_eq!(hit.get_str("city"), Some("AA City"));
    assert_eq!(hit.get_f64("latitude"), Some(35.5));
    assert_eq!(hit.get_f64("longitude"), Some(-120.25));
    assert_eq!(hit.get_str("zipcode"), Some("12345"));
    assert_eq!(hit.get_str("timezone"), Some("+09:00"));

    assert_eq!(db.lookup_str("1.1.1.1").unwrap(), LookupOutcome::NotFound);
}

#[test]
fn test_range_boundaries() {
    let db = open(three_range_location().build(), DatabaseKind::Location);

    // 下界包含，上界不包含
    assert_eq!(country(&db, "0.0.0.0").as_deref(), Some("AA"));
    assert_eq!(country(&db, "0.0.0.255").as_deref(), Some("AA"));
    assert_eq!(country(&db, "0.0.1.0").as_deref(), Some("BB"));
    assert_eq!(country(&db, "0.0.1.255").as_deref(), Some("BB"));
    assert_eq!(country(&db, "0.0.2.0").as_deref(), Some("CC"));
    assert_eq!(country(&db, "0.0.3.255").as_deref(), Some("CC"));
    assert_eq!(country(&db, "0.0.4.0"), None);
}

#[test]
fn test_every_address_in_table_resolves_to_its_range() {
    let plain = open(three_range_location().build(), DatabaseKind::Location);
    let indexed = open(three_range_location().indexed().build(), DatabaseKind::Location);

    for n in (0u32..1100).step_by(7) {
        let addr = IpAddr::V4(n.into());
        let expected = match n {
            0..=255 => Some("AA"),
            256..=511 => Some("BB"),
            512..=1023 => Some("CC"),
            _ => None,
        };

        for db in [&plain, &indexed] {
            let got = db.lookup(addr).unwrap().into_record();
            assert_eq!(
                got.as_ref().and_then(|r| r.get_str("country_short")),
                expected,
                "address {}",
                addr
            );
        }
    }
}

#[test]
fn test_indexed_file_spanning_buckets() {
    let db = open(
        BinFixture::location()
            .with_ipv4(
                vec![
                    location_row(0, "AA"),
                    location_row(v4("1.0.0.0"), "BB"),
                    location_row(v4("1.0.128.0"), "CC"),
                    location_row(v4("9.0.0.0"), "DD"),
                ],
                u32::MAX,
            )
            .indexed()
            .build(),
        DatabaseKind::Location,
    );
    assert!(db.metadata().ipv4_indexed);

    assert_eq!(country(&db, "0.255.255.255").as_deref(), Some("AA"));
    assert_eq!(country(&db, "1.0.127.255").as_deref(), Some("BB"));
    assert_eq!(country(&db, "1.0.128.0").as_deref(), Some("CC"));
    assert_eq!(country(&db, "5.6.7.8").as_deref(), Some("CC"));
    assert_eq!(country(&db, "200.1.2.3").as_deref(), Some("DD"));
    // 终止行为 u32::MAX，最大地址仍然命中最后一段
    assert_eq!(country(&db, "255.255.255.255").as_deref(), Some("DD"));
}

#[test]
fn test_ipv6_table_and_embedded_ipv4() {
    let (location, _, _) = full_coverage();
    let db = open(location, DatabaseKind::Location);

    assert_eq!(country(&db, "2001:db8::1").as_deref(), Some("JP"));
    assert_eq!(country(&db, "2001:db9::1").as_deref(), Some("-"));
    assert_eq!(country(&db, "8.8.8.8").as_deref(), Some("US"));
    assert_eq!(country(&db, "::ffff:8.8.8.8").as_deref(), Some("US"));
    // 6to4: 2002:0808:0808::
    assert_eq!(country(&db, "2002:808:808::1").as_deref(), Some("US"));
    assert_eq!(
        country(&db, "ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff").as_deref(),
        Some("-")
    );
}

#[test]
fn test_ipv4_address_against_ipv6_only_file() {
    let db = open(
        BinFixture::location()
            .with_ipv6(
                vec![location_gap(0), location_row(v6("::ffff:10.0.0.0"), "ZZ"), location_gap(v6("::ffff:10.0.1.0"))],
                u128::MAX,
            )
            .build(),
        DatabaseKind::Location,
    );
    assert_eq!(country(&db, "10.0.0.77").as_deref(), Some("ZZ"));
    assert_eq!(country(&db, "10.0.1.0").as_deref(), Some("-"));
}

#[test]
fn test_ipv6_address_against_ipv4_only_file_is_not_found() {
    let db = open(three_range_location().build(), DatabaseKind::Location);
    assert_eq!(db.lookup_str("2001:db8::1").unwrap(), LookupOutcome::NotFound);
}

#[test]
fn test_invalid_address_input() {
    let db = open(three_range_location().build(), DatabaseKind::Location);
    for input in ["", "not-an-ip", "256.1.1.1", " 8.8.8.8", "1.2.3"] {
        let err = db.lookup_str(input).unwrap_err();
        assert!(matches!(err, IpGeoError::InvalidAddress(_)), "{:?}", input);
    }
}

#[test]
fn test_duplicate_lower_bounds_are_skipped() {
    // 空范围 [256,256) 永远不会命中
    let db = open(
        BinFixture::location()
            .with_ipv4(
                vec![location_row(0, "AA"), location_row(256, "XX"), location_row(256, "BB")],
                1024,
            )
            .build(),
        DatabaseKind::Location,
    );
    assert_eq!(country(&db, "0.0.1.0").as_deref(), Some("BB"));
    assert_eq!(country(&db, "0.0.0.255").as_deref(), Some("AA"));
}

#[test]
fn test_corrupt_headers_are_rejected() {
    let good = three_range_location().build();

    // 截断到 header 以内
    let err = GeoDatabase::from_bytes(good[..40].to_vec(), DatabaseKind::Location).unwrap_err();
    assert!(matches!(err, IpGeoError::CorruptHeader(_)));

    // 表超出文件末尾（不声明大小，只靠结构校验）
    let mut fixture = three_range_location();
    fixture.declared_size = Some(0);
    let mut cut = fixture.build();
    cut.truncate(74);
    let err = GeoDatabase::from_bytes(cut, DatabaseKind::Location).unwrap_err();
    assert!(matches!(err, IpGeoError::CorruptHeader(_)));

    // 声明大小与实际不符
    let mut short = good.clone();
    short.truncate(74);
    let err = GeoDatabase::from_bytes(short, DatabaseKind::Location).unwrap_err();
    assert!(matches!(err, IpGeoError::CorruptHeader(_)));

    // 未知 db type
    let mut fixture = three_range_location();
    fixture.db_type = 99;
    let err = GeoDatabase::from_bytes(fixture.build(), DatabaseKind::Location).unwrap_err();
    assert!(matches!(err, IpGeoError::CorruptHeader(_)));

    // 产品代码不匹配
    let err = GeoDatabase::from_bytes(good.clone(), DatabaseKind::Proxy).unwrap_err();
    assert!(matches!(err, IpGeoError::CorruptHeader(_)));

    // 没有任何记录
    let err = GeoDatabase::from_bytes(BinFixture::location().build(), DatabaseKind::Location)
        .unwrap_err();
    assert!(matches!(err, IpGeoError::CorruptHeader(_)));
}

#[test]
fn test_dangling_string_pointer_is_a_decode_error() {
    let mut bytes = three_range_location().build();
    // 第一行 country 指针（表起点 64，ip_from 之后）
    bytes[68..72].copy_from_slice(&u32::MAX.to_le_bytes());
    let db = open(bytes, DatabaseKind::Location);

    let err = db.lookup_str("0.0.0.1").unwrap_err();
    assert!(matches!(err, IpGeoError::Decode(_)));
    // 其他行不受影响
    assert_eq!(country(&db, "0.0.1.1").as_deref(), Some("BB"));
}

#[test]
fn test_asn_and_proxy_layouts() {
    let (_, asn, proxy) = full_coverage();
    let asn = open(asn, DatabaseKind::Asn);
    let proxy = open(proxy, DatabaseKind::Proxy);

    let hit = asn.lookup_str("8.8.8.8").unwrap().into_record().unwrap();
    assert_eq!(hit.get_str("asn"), Some("15169"));
    assert_eq!(hit.get_str("as"), Some("Google LLC"));
    assert_eq!(hit.get_str("cidr"), Some("0.0.0.0/24"));

    let hit = proxy.lookup_str("8.8.8.8").unwrap().into_record().unwrap();
    assert_eq!(hit.get_str("proxy_type"), Some("VPN"));
    assert_eq!(hit.get_str("country_short"), Some("US"));
    assert_eq!(hit.get_str("country_long"), Some("United States of America"));
    assert_eq!(hit.get_str("threat"), Some("SPAM"));
    assert_eq!(hit.get_str("provider"), Some("ExampleVPN"));
    assert_eq!(hit.get_str("usage_type"), Some("DCH"));
}

#[test]
fn test_open_from_disk_reports_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("IP2LOCATION-LITE-DB11.IPV6.BIN");
    let bytes = three_range_location().indexed().build();
    std::fs::write(&path, &bytes).unwrap();

    let db = GeoDatabase::open(&path, DatabaseKind::Location).unwrap();
    let meta = db.metadata();
    assert_eq!(meta.db_type, 11);
    assert_eq!(meta.columns, 8);
    assert_eq!(meta.ipv4_count, 3);
    assert!(meta.ipv4_indexed);
    assert!(!meta.ipv6_indexed);
    assert_eq!(meta.size, bytes.len());
    assert_eq!(meta.build_date.unwrap().to_string(), "2024-06-01");
    assert_eq!(db.path(), Some(path.as_path()));

    let err = GeoDatabase::open(dir.path().join("missing.BIN"), DatabaseKind::Location).unwrap_err();
    assert!(matches!(err, IpGeoError::FileOperation(_)));
}
