//! BIN 文件头解析与结构校验
//!
//! 文件头固定 64 字节，小端序；表与索引的基址为 1-based 文件偏移。

use chrono::NaiveDate;
use serde::Serialize;

use crate::errors::{IpGeoError, Result};

use super::decoder::{read_array, read_u32};
use super::kind::DatabaseKind;
use super::schema::RecordLayout;

/// 文件头长度
pub const HEADER_LEN: usize = 64;
/// 索引项数量（按地址高 16 位分桶）
pub const INDEX_ENTRIES: usize = 65_536;
/// 每个索引项：u32 起始行 + u32 结束行
pub const INDEX_ENTRY_LEN: usize = 8;

/// 单个地址族的记录表描述
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FamilyTable {
    /// 范围记录数（不含末尾的终止行）
    pub count: u32,
    /// 记录表基址（1-based，0 表示不存在）
    pub base: u32,
    /// 索引基址（1-based，0 表示无索引）
    pub index_base: u32,
}

impl FamilyTable {
    pub fn is_present(&self) -> bool {
        self.count > 0
    }

    /// 0-based 表起点
    pub fn table_start(&self) -> usize {
        (self.base as usize).saturating_sub(1)
    }

    /// 0-based 索引起点
    pub fn index_start(&self) -> Option<usize> {
        (self.index_base > 0).then(|| self.index_base as usize - 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatabaseHeader {
    pub db_type: u8,
    pub columns: u8,
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub ipv4: FamilyTable,
    pub ipv6: FamilyTable,
    pub product_code: u8,
    pub product_type: u8,
    pub file_size: u32,
}

impl DatabaseHeader {
    /// Parse the raw header fields; structural checks happen in [`DatabaseHeader::validate`]
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(IpGeoError::corrupt_header(format!(
                "file is {} bytes, header needs {}",
                buf.len(),
                HEADER_LEN
            )));
        }

        let raw = read_array::<5>(buf, 0).map_err(to_corrupt)?;
        let word = |offset: usize| read_u32(buf, offset).map_err(to_corrupt);

        Ok(Self {
            db_type: raw[0],
            columns: raw[1],
            year: raw[2],
            month: raw[3],
            day: raw[4],
            ipv4: FamilyTable {
                count: word(5)?,
                base: word(9)?,
                index_base: word(21)?,
            },
            ipv6: FamilyTable {
                count: word(13)?,
                base: word(17)?,
                index_base: word(25)?,
            },
            product_code: buf[29],
            product_type: buf[30],
            file_size: word(31)?,
        })
    }

    /// Check the header against the expected kind, the resolved layout and the real file length
    pub fn validate(&self, kind: DatabaseKind, layout: &RecordLayout, len: usize) -> Result<()> {
        if self.product_code != kind.product_code() {
            return Err(IpGeoError::corrupt_header(format!(
                "product code {} does not belong to a {} database (expected {})",
                self.product_code,
                kind,
                kind.product_code()
            )));
        }

        if self.file_size != 0 && self.file_size as usize != len {
            return Err(IpGeoError::corrupt_header(format!(
                "declared size {} differs from actual size {}",
                self.file_size, len
            )));
        }

        if !self.ipv4.is_present() && !self.ipv6.is_present() {
            return Err(IpGeoError::corrupt_header("no IPv4 or IPv6 records"));
        }

        check_family("IPv4", &self.ipv4, layout.ipv4_row_size, len)?;
        check_family("IPv6", &self.ipv6, layout.ipv6_row_size, len)?;
        Ok(())
    }

    /// 数据库发布日期
    pub fn build_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2000 + self.year as i32, self.month as u32, self.day as u32)
    }
}

fn check_family(label: &str, table: &FamilyTable, row_size: usize, len: usize) -> Result<()> {
    if !table.is_present() {
        return Ok(());
    }

    if (table.base as usize) <= HEADER_LEN {
        return Err(IpGeoError::corrupt_header(format!(
            "{} table base {} overlaps the header",
            label, table.base
        )));
    }

    // count 行范围记录 + 1 行终止记录
    let table_end = (table.count as usize)
        .checked_add(1)
        .and_then(|rows| rows.checked_mul(row_size))
        .and_then(|bytes| bytes.checked_add(table.table_start()));
    match table_end {
        Some(end) if end <= len => {}
        _ => {
            return Err(IpGeoError::corrupt_header(format!(
                "{} table of {} rows at {} exceeds file size {}",
                label, table.count, table.base, len
            )));
        }
    }

    if let Some(index) = table.index_start() {
        let index_end = index + INDEX_ENTRIES * INDEX_ENTRY_LEN;
        if index < HEADER_LEN || index_end > len {
            return Err(IpGeoError::corrupt_header(format!(
                "{} index at {} exceeds file size {}",
                label, table.index_base, len
            )));
        }
    }

    Ok(())
}

fn to_corrupt(err: IpGeoError) -> IpGeoError {
    IpGeoError::corrupt_header(err.message().to_string())
}
