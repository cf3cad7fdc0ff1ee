use serde::{Deserialize, Serialize};

use crate::geodb::DatabaseKind;
use crate::registry::ConsistencyPolicy;

/// 静态配置（从 TOML 加载，启动时使用）
///
/// - server: 监听地址、端口、worker 数量
/// - logging: 日志配置
/// - storage: 数据目录
/// - refresh: 下载与刷新调度
/// - databases: 每类数据库的下载代码与文件名
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub databases: DatabasesConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值
    /// ENV 前缀：IPGEO，分隔符：__
    /// 示例：IPGEO__SERVER__PORT=9000
    pub fn load() -> Self {
        Self::load_from("config.toml")
    }

    pub fn load_from(path: &str) -> Self {
        use config::{Config, Environment, File};

        let builder = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖
            .add_source(
                Environment::with_prefix("IPGEO")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config = match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        };

        config.apply_token_fallback(std::env::var("IP2LOCATION_TOKEN").ok());
        config
    }

    /// 未配置 token 时沿用 IP2LOCATION_TOKEN 环境变量
    pub fn apply_token_fallback(&mut self, token: Option<String>) {
        if self.refresh.token.is_empty()
            && let Some(token) = token.filter(|t| !t.is_empty())
        {
            self.refresh.token = token;
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

/// 数据文件存放位置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

/// 下载与刷新配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// 下载 token，不会写入日志
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_download_url")]
    pub download_url: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_max_archive_bytes")]
    pub max_archive_bytes: u64,
    #[serde(default = "default_on_startup")]
    pub on_startup: bool,
    #[serde(default)]
    pub consistency: ConsistencyPolicy,
}

/// 单个数据库的下载代码与解压后的文件名
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseSource {
    pub code: String,
    pub file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabasesConfig {
    #[serde(default = "default_location_source")]
    pub location: DatabaseSource,
    #[serde(default = "default_asn_source")]
    pub asn: DatabaseSource,
    #[serde(default = "default_proxy_source")]
    pub proxy: DatabaseSource,
}

impl DatabasesConfig {
    pub fn source(&self, kind: DatabaseKind) -> &DatabaseSource {
        match kind {
            DatabaseKind::Location => &self.location,
            DatabaseKind::Asn => &self.asn,
            DatabaseKind::Proxy => &self.proxy,
        }
    }
}

// ============================================================
// Default value functions for static config
// ============================================================

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    4567
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_download_url() -> String {
    "https://www.ip2location.com/download/".to_string()
}

fn default_interval_secs() -> u64 {
    86_400
}

fn default_fetch_timeout_secs() -> u64 {
    300
}

fn default_max_archive_bytes() -> u64 {
    // 512 MiB
    512 * 1024 * 1024
}

fn default_on_startup() -> bool {
    true
}

fn default_location_source() -> DatabaseSource {
    DatabaseSource {
        code: "DB11LITEBINIPV6".to_string(),
        file: "IP2LOCATION-LITE-DB11.IPV6.BIN".to_string(),
    }
}

fn default_asn_source() -> DatabaseSource {
    DatabaseSource {
        code: "DBASNLITEBINIPV6".to_string(),
        file: "IP2LOCATION-LITE-ASN.IPV6.BIN".to_string(),
    }
}

fn default_proxy_source() -> DatabaseSource {
    DatabaseSource {
        code: "PX12LITEBIN".to_string(),
        file: "IP2PROXY-LITE-PX12.BIN".to_string(),
    }
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            download_url: default_download_url(),
            interval_secs: default_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_archive_bytes: default_max_archive_bytes(),
            on_startup: default_on_startup(),
            consistency: ConsistencyPolicy::default(),
        }
    }
}

impl Default for DatabasesConfig {
    fn default() -> Self {
        Self {
            location: default_location_source(),
            asn: default_asn_source(),
            proxy: default_proxy_source(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_lite_distribution() {
        let config = StaticConfig::default();
        assert_eq!(config.databases.location.code, "DB11LITEBINIPV6");
        assert_eq!(
            config.databases.source(DatabaseKind::Proxy).file,
            "IP2PROXY-LITE-PX12.BIN"
        );
        assert_eq!(config.refresh.interval_secs, 86_400);
        assert_eq!(config.refresh.consistency, ConsistencyPolicy::Independent);
    }

    #[test]
    fn test_token_fallback_only_fills_empty() {
        let mut config = StaticConfig::default();
        config.apply_token_fallback(Some("from-env".into()));
        assert_eq!(config.refresh.token, "from-env");

        config.apply_token_fallback(Some("other".into()));
        assert_eq!(config.refresh.token, "from-env");

        let mut empty = StaticConfig::default();
        empty.apply_token_fallback(Some(String::new()));
        assert!(empty.refresh.token.is_empty());
    }

    #[test]
    fn test_sample_config_round_trips_through_toml() {
        let sample = StaticConfig::generate_sample_config();
        assert!(sample.contains("[refresh]"));
        assert!(sample.contains("consistency = \"independent\""));

        let parsed: StaticConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.databases.asn, default_asn_source());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: StaticConfig = toml::from_str(
            r#"
            [refresh]
            consistency = "atomic"
            interval_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(parsed.refresh.consistency, ConsistencyPolicy::Atomic);
        assert_eq!(parsed.refresh.interval_secs, 60);
        assert_eq!(parsed.server.port, 4567);
        assert_eq!(parsed.storage.data_dir, "data");
    }
}
