//! 只读数据库句柄
//!
//! 打开后不可变；多个请求线程可并发查找，无需任何锁。

use std::fs::File;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use memmap2::Mmap;
use serde::Serialize;
use tracing::debug;

use crate::errors::{IpGeoError, Result};

use super::address::{SearchKey, parse_address, search_key};
use super::decoder::{AddressRecord, FieldSpec, Value, decode_record, read_u32, read_u128};
use super::header::{DatabaseHeader, FamilyTable, INDEX_ENTRY_LEN};
use super::kind::DatabaseKind;
use super::schema::RecordLayout;

enum Storage {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl Storage {
    fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Mmap(m) => &m[..],
            Storage::Owned(v) => v.as_slice(),
        }
    }
}

/// Result of searching one database
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found(AddressRecord),
    NotFound,
}

impl LookupOutcome {
    pub fn into_record(self) -> Option<AddressRecord> {
        match self {
            LookupOutcome::Found(record) => Some(record),
            LookupOutcome::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, LookupOutcome::Found(_))
    }
}

/// Header summary for health and inspect output
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseMetadata {
    pub kind: DatabaseKind,
    pub db_type: u8,
    pub columns: u8,
    pub build_date: Option<NaiveDate>,
    pub ipv4_count: u32,
    pub ipv6_count: u32,
    pub ipv4_indexed: bool,
    pub ipv6_indexed: bool,
    pub size: usize,
    pub fields: Vec<&'static str>,
}

/// An open IP2Location / IP2Proxy BIN file
pub struct GeoDatabase {
    kind: DatabaseKind,
    path: Option<PathBuf>,
    storage: Storage,
    header: DatabaseHeader,
    layout: RecordLayout,
}

impl std::fmt::Debug for GeoDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoDatabase")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("size", &self.size())
            .field("header", &self.header)
            .finish()
    }
}

impl GeoDatabase {
    /// Memory-map `path` and validate it as a `kind` database
    pub fn open(path: impl AsRef<Path>, kind: DatabaseKind) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            IpGeoError::file_operation(format!("Failed to open {}: {}", path.display(), e))
        })?;

        // SAFETY: 数据文件只通过 rename 整体替换，不会被原地修改；
        // 已映射的旧 inode 在最后一个句柄释放前保持有效。
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
            IpGeoError::file_operation(format!("Failed to mmap {}: {}", path.display(), e))
        })?;

        let mut db = Self::from_storage(Storage::Mmap(mmap), kind)?;
        db.path = Some(path.to_path_buf());
        debug!(
            "Opened {} database {} ({} bytes)",
            kind,
            path.display(),
            db.size()
        );
        Ok(db)
    }

    /// Wrap an in-memory buffer (used by tests and the CLI)
    pub fn from_bytes(bytes: Vec<u8>, kind: DatabaseKind) -> Result<Self> {
        Self::from_storage(Storage::Owned(bytes), kind)
    }

    fn from_storage(storage: Storage, kind: DatabaseKind) -> Result<Self> {
        let buf = storage.as_slice();
        let header = DatabaseHeader::parse(buf)?;
        let layout = RecordLayout::resolve(kind, header.db_type, header.columns)?;
        header.validate(kind, &layout, buf.len())?;

        Ok(Self {
            kind,
            path: None,
            storage,
            header,
            layout,
        })
    }

    /// 文件被 rename 到正式路径后更新记录的路径
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn kind(&self) -> DatabaseKind {
        self.kind
    }

    pub fn header(&self) -> &DatabaseHeader {
        &self.header
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn size(&self) -> usize {
        self.storage.as_slice().len()
    }

    pub fn metadata(&self) -> DatabaseMetadata {
        DatabaseMetadata {
            kind: self.kind,
            db_type: self.header.db_type,
            columns: self.header.columns,
            build_date: self.header.build_date(),
            ipv4_count: self.header.ipv4.count,
            ipv6_count: self.header.ipv6.count,
            ipv4_indexed: self.header.ipv4.index_base > 0,
            ipv6_indexed: self.header.ipv6.index_base > 0,
            size: self.size(),
            fields: self.layout.field_names().collect(),
        }
    }

    /// Parse and look up an address string
    pub fn lookup_str(&self, address: &str) -> Result<LookupOutcome> {
        self.lookup(parse_address(address)?)
    }

    /// Find the range row containing `addr`
    pub fn lookup(&self, addr: IpAddr) -> Result<LookupOutcome> {
        let key = match search_key(addr, self.header.ipv4.is_present(), self.header.ipv6.is_present())
        {
            Some(key) => key,
            None => return Ok(LookupOutcome::NotFound),
        };

        let buf = self.storage.as_slice();
        match key {
            SearchKey::V4(key) => {
                let table = Table {
                    buf,
                    meta: &self.header.ipv4,
                    row_size: self.layout.ipv4_row_size,
                    schema: &self.layout.ipv4,
                };
                let bucket = (key >> 16) as usize;
                table.search(key as u128, bucket, |offset| {
                    read_u32(buf, offset).map(u128::from)
                })
                .map(|hit| hit.into_outcome(|v| IpAddr::V4(Ipv4Addr::from(v as u32))))
            }
            SearchKey::V6(key) => {
                let table = Table {
                    buf,
                    meta: &self.header.ipv6,
                    row_size: self.layout.ipv6_row_size,
                    schema: &self.layout.ipv6,
                };
                let bucket = (key >> 112) as usize;
                table
                    .search(key, bucket, |offset| read_u128(buf, offset))
                    .map(|hit| hit.into_outcome(|v| IpAddr::V6(Ipv6Addr::from(v))))
            }
        }
    }
}

struct Table<'a> {
    buf: &'a [u8],
    meta: &'a FamilyTable,
    row_size: usize,
    schema: &'a [FieldSpec],
}

struct Hit {
    record: Option<AddressRecord>,
    ip_to: u128,
}

impl Hit {
    fn into_outcome(self, to_ip: impl Fn(u128) -> IpAddr) -> LookupOutcome {
        match self.record {
            Some(mut record) => {
                // ip_to 以闭区间形式返回
                record.insert("ip_to", Value::Ip(to_ip(self.ip_to.saturating_sub(1))));
                LookupOutcome::Found(record)
            }
            None => LookupOutcome::NotFound,
        }
    }
}

impl Table<'_> {
    fn row_offset(&self, row: u32) -> Result<usize> {
        (row as usize)
            .checked_mul(self.row_size)
            .and_then(|o| o.checked_add(self.meta.table_start()))
            .ok_or_else(|| IpGeoError::decode(format!("row {} offset overflow", row)))
    }

    /// 索引给出的行窗口，无索引时为整张表
    fn window(&self, bucket: usize) -> Result<(u32, u32)> {
        let last = self.meta.count - 1;
        match self.meta.index_start() {
            Some(start) => {
                let entry = start + bucket * INDEX_ENTRY_LEN;
                let low = read_u32(self.buf, entry)?;
                let high = read_u32(self.buf, entry + 4)?;
                Ok((low, high.min(last)))
            }
            None => Ok((0, last)),
        }
    }

    fn search(
        &self,
        key: u128,
        bucket: usize,
        read_from: impl Fn(usize) -> Result<u128>,
    ) -> Result<Hit> {
        let miss = Hit {
            record: None,
            ip_to: 0,
        };
        if !self.meta.is_present() {
            return Ok(miss);
        }

        let (mut lo, mut hi) = self.window(bucket)?;
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let offset = self.row_offset(mid)?;
            let from = read_from(offset)?;
            let to = read_from(offset + self.row_size)?;

            if from <= key && key < to {
                let record = decode_record(self.buf, self.schema, offset)?;
                return Ok(Hit {
                    record: Some(record),
                    ip_to: to,
                });
            }

            if key < from {
                if mid == 0 {
                    break;
                }
                hi = mid - 1;
            } else {
                lo = mid + 1;
            }
        }
        Ok(miss)
    }
}
