//! 数据目录布局
//!
//! `<data_dir>/<file>` 为正式文件，`<file>.new` 为解压中的暂存文件，
//! `<code>.zip` 为下载的压缩包。

use std::path::{Path, PathBuf};

use crate::config::{DatabaseSource, DatabasesConfig, StaticConfig};
use crate::geodb::DatabaseKind;

#[derive(Debug, Clone)]
pub struct StorageLayout {
    data_dir: PathBuf,
    databases: DatabasesConfig,
}

impl StorageLayout {
    pub fn new(data_dir: impl Into<PathBuf>, databases: DatabasesConfig) -> Self {
        Self {
            data_dir: data_dir.into(),
            databases,
        }
    }

    pub fn from_config(config: &StaticConfig) -> Self {
        Self::new(&config.storage.data_dir, config.databases.clone())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn source(&self, kind: DatabaseKind) -> &DatabaseSource {
        self.databases.source(kind)
    }

    pub fn live_path(&self, kind: DatabaseKind) -> PathBuf {
        self.data_dir.join(&self.source(kind).file)
    }

    pub fn staged_path(&self, kind: DatabaseKind) -> PathBuf {
        self.data_dir.join(format!("{}.new", self.source(kind).file))
    }

    pub fn archive_path(&self, kind: DatabaseKind) -> PathBuf {
        self.data_dir.join(format!("{}.zip", self.source(kind).code))
    }
}
