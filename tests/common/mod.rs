//! 测试用 BIN / ZIP 构造工具
#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;

const HEADER_LEN: usize = 64;
const INDEX_ENTRIES: usize = 65_536;

/// One non-address column of a row
#[derive(Debug, Clone)]
pub enum Cell {
    /// Two-letter code followed by the full name (country columns)
    Country(String, String),
    Text(String),
    Float(f32),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }
}

/// A range row: lower bound plus the cells for positions 2..=columns
#[derive(Debug, Clone)]
pub struct Row {
    pub from: u128,
    pub cells: Vec<Cell>,
}

/// Writes IP2Location style BIN files
#[derive(Debug, Clone)]
pub struct BinFixture {
    pub db_type: u8,
    pub columns: u8,
    pub product_code: u8,
    pub date: (u8, u8, u8),
    pub ipv4: Vec<Row>,
    pub ipv4_end: u32,
    pub ipv6: Vec<Row>,
    pub ipv6_end: u128,
    pub indexed: bool,
    /// Value written into the declared file size field; `None` writes the real size
    pub declared_size: Option<u32>,
}

impl BinFixture {
    fn new(db_type: u8, columns: u8, product_code: u8) -> Self {
        Self {
            db_type,
            columns,
            product_code,
            date: (24, 6, 1),
            ipv4: Vec::new(),
            ipv4_end: u32::MAX,
            ipv6: Vec::new(),
            ipv6_end: u128::MAX,
            indexed: false,
            declared_size: None,
        }
    }

    /// DB11: country, region, city, latitude, longitude, zipcode, timezone
    pub fn location() -> Self {
        Self::new(11, 8, 1)
    }

    /// ASN: cidr, asn, as
    pub fn asn() -> Self {
        Self::new(1, 4, 1)
    }

    /// PX12
    pub fn proxy() -> Self {
        Self::new(12, 13, 2)
    }

    pub fn with_ipv4(mut self, rows: Vec<Row>, end: u32) -> Self {
        self.ipv4 = rows;
        self.ipv4_end = end;
        self
    }

    pub fn with_ipv6(mut self, rows: Vec<Row>, end: u128) -> Self {
        self.ipv6 = rows;
        self.ipv6_end = end;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    fn v4_row_size(&self) -> usize {
        self.columns as usize * 4
    }

    fn v6_row_size(&self) -> usize {
        16 + (self.columns as usize - 1) * 4
    }

    pub fn build(&self) -> Vec<u8> {
        let index_len = INDEX_ENTRIES * 8;
        let has_v4 = !self.ipv4.is_empty();
        let has_v6 = !self.ipv6.is_empty();

        // header | v4 index | v6 index | v4 table | v6 table | string pool
        let mut cursor = HEADER_LEN;
        let v4_index = (self.indexed && has_v4).then(|| {
            let at = cursor;
            cursor += index_len;
            at
        });
        let v6_index = (self.indexed && has_v6).then(|| {
            let at = cursor;
            cursor += index_len;
            at
        });
        let v4_table = cursor;
        if has_v4 {
            cursor += (self.ipv4.len() + 1) * self.v4_row_size();
        }
        let v6_table = cursor;
        if has_v6 {
            cursor += (self.ipv6.len() + 1) * self.v6_row_size();
        }
        let pool_base = cursor;

        let mut pool = Vec::new();
        let mut v4_bytes = Vec::new();
        for row in &self.ipv4 {
            v4_bytes.extend_from_slice(&(row.from as u32).to_le_bytes());
            self.write_cells(row, pool_base, &mut pool, &mut v4_bytes);
        }
        if has_v4 {
            v4_bytes.extend_from_slice(&self.ipv4_end.to_le_bytes());
            v4_bytes.resize(v4_bytes.len() + (self.columns as usize - 1) * 4, 0);
        }

        let mut v6_bytes = Vec::new();
        for row in &self.ipv6 {
            v6_bytes.extend_from_slice(&row.from.to_le_bytes());
            self.write_cells(row, pool_base, &mut pool, &mut v6_bytes);
        }
        if has_v6 {
            v6_bytes.extend_from_slice(&self.ipv6_end.to_le_bytes());
            v6_bytes.resize(v6_bytes.len() + (self.columns as usize - 1) * 4, 0);
        }

        let total = pool_base + pool.len();
        let mut buf = vec![0u8; HEADER_LEN];
        buf[0] = self.db_type;
        buf[1] = self.columns;
        buf[2] = self.date.0;
        buf[3] = self.date.1;
        buf[4] = self.date.2;
        let put = |buf: &mut Vec<u8>, at: usize, v: u32| buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
        if has_v4 {
            put(&mut buf, 5, self.ipv4.len() as u32);
            put(&mut buf, 9, v4_table as u32 + 1);
        }
        if has_v6 {
            put(&mut buf, 13, self.ipv6.len() as u32);
            put(&mut buf, 17, v6_table as u32 + 1);
        }
        if let Some(at) = v4_index {
            put(&mut buf, 21, at as u32 + 1);
        }
        if let Some(at) = v6_index {
            put(&mut buf, 25, at as u32 + 1);
        }
        buf[29] = self.product_code;
        put(&mut buf, 31, self.declared_size.unwrap_or(total as u32));

        if v4_index.is_some() {
            let bounds: Vec<(u128, u128)> = ranges(&self.ipv4, self.ipv4_end as u128);
            buf.extend(index_entries(&bounds, 16));
        }
        if v6_index.is_some() {
            let bounds: Vec<(u128, u128)> = ranges(&self.ipv6, self.ipv6_end);
            buf.extend(index_entries(&bounds, 112));
        }
        buf.extend_from_slice(&v4_bytes);
        buf.extend_from_slice(&v6_bytes);
        buf.extend_from_slice(&pool);
        assert_eq!(buf.len(), total);
        buf
    }

    fn write_cells(&self, row: &Row, pool_base: usize, pool: &mut Vec<u8>, out: &mut Vec<u8>) {
        assert_eq!(row.cells.len(), self.columns as usize - 1, "cell count");
        for cell in &row.cells {
            match cell {
                Cell::Float(v) => out.extend_from_slice(&v.to_le_bytes()),
                Cell::Text(s) => {
                    out.extend_from_slice(&((pool_base + pool.len()) as u32).to_le_bytes());
                    pool.push(s.len() as u8);
                    pool.extend_from_slice(s.as_bytes());
                }
                Cell::Country(short, long) => {
                    out.extend_from_slice(&((pool_base + pool.len()) as u32).to_le_bytes());
                    pool.push(short.len() as u8);
                    pool.extend_from_slice(short.as_bytes());
                    pool.push(long.len() as u8);
                    pool.extend_from_slice(long.as_bytes());
                }
            }
        }
    }
}

/// `[from, to)` of every row
fn ranges(rows: &[Row], end: u128) -> Vec<(u128, u128)> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let to = rows.get(i + 1).map(|next| next.from).unwrap_or(end);
            (row.from, to)
        })
        .collect()
}

/// For each high-16-bit bucket, the first and last row overlapping it
fn index_entries(bounds: &[(u128, u128)], shift: u32) -> Vec<u8> {
    let mut entries = vec![(1u32, 0u32); INDEX_ENTRIES];
    for (row, (from, to)) in bounds.iter().enumerate() {
        if to <= from {
            continue;
        }
        let first = (from >> shift) as usize;
        let last = ((to - 1) >> shift) as usize;
        for entry in &mut entries[first..=last.min(INDEX_ENTRIES - 1)] {
            if entry.0 > entry.1 {
                *entry = (row as u32, row as u32);
            } else {
                entry.1 = row as u32;
            }
        }
    }

    let mut out = Vec::with_capacity(INDEX_ENTRIES * 8);
    for (low, high) in entries {
        out.extend_from_slice(&low.to_le_bytes());
        out.extend_from_slice(&high.to_le_bytes());
    }
    out
}

pub fn v4(addr: &str) -> u128 {
    u32::from(addr.parse::<std::net::Ipv4Addr>().unwrap()) as u128
}

pub fn v6(addr: &str) -> u128 {
    u128::from(addr.parse::<std::net::Ipv6Addr>().unwrap())
}

/// DB11 row whose text columns are derived from `code`
pub fn location_row(from: u128, code: &str) -> Row {
    Row {
        from,
        cells: vec![
            Cell::Country(code.to_string(), format!("Country {}", code)),
            Cell::text(format!("{} Region", code)),
            Cell::text(format!("{} City", code)),
            Cell::Float(35.5),
            Cell::Float(-120.25),
            Cell::text("12345"),
            Cell::text("+09:00"),
        ],
    }
}

/// Row for a gap in coverage, every text column is `-`
pub fn location_gap(from: u128) -> Row {
    Row {
        from,
        cells: vec![
            Cell::Country("-".into(), "-".into()),
            Cell::text("-"),
            Cell::text("-"),
            Cell::Float(0.0),
            Cell::Float(0.0),
            Cell::text("-"),
            Cell::text("-"),
        ],
    }
}

pub fn asn_row(from: u128, asn: &str, name: &str) -> Row {
    Row {
        from,
        cells: vec![Cell::text("0.0.0.0/24"), Cell::text(asn), Cell::text(name)],
    }
}

/// PX12 row; `proxy_type` of `-` marks a non-proxy range
pub fn proxy_row(from: u128, proxy_type: &str, threat: &str, provider: &str) -> Row {
    Row {
        from,
        cells: vec![
            Cell::text(proxy_type),
            Cell::Country("US".into(), "United States of America".into()),
            Cell::text("California"),
            Cell::text("Los Angeles"),
            Cell::text("Example ISP"),
            Cell::text("example.com"),
            Cell::text("DCH"),
            Cell::text("64500"),
            Cell::text("Example Networks"),
            Cell::text("7"),
            Cell::text(threat),
            Cell::text(provider),
        ],
    }
}

/// Location: [0,256) AA, [256,512) BB, [512,1024) CC, nothing above 1024
pub fn three_range_location() -> BinFixture {
    BinFixture::location().with_ipv4(
        vec![location_row(0, "AA"), location_row(256, "BB"), location_row(512, "CC")],
        1024,
    )
}

/// Complete set of databases covering all of IPv4 and IPv6
pub fn full_coverage() -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let location = BinFixture::location()
        .with_ipv4(
            vec![
                location_gap(0),
                location_row(v4("8.8.8.0"), "US"),
                location_gap(v4("8.8.9.0")),
            ],
            u32::MAX,
        )
        .with_ipv6(
            vec![location_gap(0), location_row(v6("2001:db8::"), "JP"), location_gap(v6("2001:db9::"))],
            u128::MAX,
        )
        .build();
    let asn = BinFixture::asn()
        .with_ipv4(
            vec![
                asn_row(0, "-", "-"),
                asn_row(v4("8.8.8.0"), "15169", "Google LLC"),
                asn_row(v4("8.8.9.0"), "-", "-"),
            ],
            u32::MAX,
        )
        .build();
    let proxy = BinFixture::proxy()
        .with_ipv4(
            vec![
                proxy_row(0, "-", "-", "-"),
                proxy_row(v4("8.8.8.0"), "VPN", "SPAM", "ExampleVPN"),
                proxy_row(v4("8.8.9.0"), "-", "-", "-"),
            ],
            u32::MAX,
        )
        .build();
    (location, asn, proxy)
}

/// ZIP archive containing the given entries
pub fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
