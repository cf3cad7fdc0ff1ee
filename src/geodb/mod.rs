//! IP2Location / IP2Proxy BIN 数据库读取
//!
//! - `decoder`: 按列类型解码单行记录
//! - `header`: 文件头解析与结构校验
//! - `schema`: db type → 列布局
//! - `address`: 地址解析与查找键选择
//! - `reader`: 基于索引的二分查找

pub mod address;
pub mod decoder;
pub mod header;
pub mod kind;
pub mod reader;
pub mod schema;

pub use address::{SearchKey, parse_address, search_key};
pub use decoder::{AddressRecord, FieldSpec, FieldType, Value, decode_record};
pub use header::{DatabaseHeader, FamilyTable, HEADER_LEN};
pub use kind::DatabaseKind;
pub use reader::{DatabaseMetadata, GeoDatabase, LookupOutcome};
pub use schema::RecordLayout;
