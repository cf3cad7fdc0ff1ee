//! 数据库分发源
//!
//! 默认实现从 IP2Location 下载接口获取 ZIP 压缩包。

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};
use ureq::Agent;

use crate::config::RefreshConfig;
use crate::errors::{IpGeoError, Result};

/// Where database archives come from
#[async_trait]
pub trait DistributionSource: Send + Sync {
    /// Download the archive for `code` into `dest`, returning the bytes written
    async fn fetch(&self, code: &str, dest: &Path) -> Result<u64>;
}

/// HTTP download from `<download_url>?token=<token>&file=<code>`
pub struct Ip2LocationSource {
    agent: Agent,
    download_url: String,
    token: String,
    timeout: Duration,
    max_bytes: u64,
}

impl Ip2LocationSource {
    pub fn new(config: &RefreshConfig) -> Self {
        let timeout = Duration::from_secs(config.fetch_timeout_secs.max(1));
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Self {
            agent,
            download_url: config.download_url.clone(),
            token: config.token.clone(),
            timeout,
            max_bytes: config.max_archive_bytes,
        }
    }

    /// 同步下载（在 spawn_blocking 中调用）
    fn download_sync(
        agent: Agent,
        url: String,
        token: String,
        code: String,
        dest: PathBuf,
        max_bytes: u64,
        cancelled: Arc<AtomicBool>,
    ) -> Result<u64> {
        let resp = agent
            .get(&url)
            .query("token", &token)
            .query("file", &code)
            .call()
            .map_err(|e| IpGeoError::network(format!("Download of {} failed: {}", code, e)))?;

        let mut reader = resp
            .into_body()
            .into_with_config()
            .limit(max_bytes)
            .reader();

        write_body(&mut reader, &dest, &code, &cancelled)
    }
}

/// Stream `reader` into `dest`; on any failure `dest` is removed before returning.
///
/// `cancelled` is checked between chunks so an abandoned download stops
/// writing instead of recreating a file the caller already cleaned up.
fn write_body(reader: &mut impl Read, dest: &Path, code: &str, cancelled: &AtomicBool) -> Result<u64> {
    let result = copy_chunks(reader, dest, code, cancelled);
    if result.is_err() {
        let _ = std::fs::remove_file(dest);
    }
    result
}

fn copy_chunks(reader: &mut impl Read, dest: &Path, code: &str, cancelled: &AtomicBool) -> Result<u64> {
    let file = File::create(dest).map_err(|e| {
        IpGeoError::file_operation(format!("Failed to create {}: {}", dest.display(), e))
    })?;
    let mut writer = BufWriter::new(file);
    let mut buf = vec![0u8; 64 * 1024];
    let mut written = 0u64;

    loop {
        if cancelled.load(Ordering::Acquire) {
            return Err(IpGeoError::network(format!("Download of {} was abandoned", code)));
        }
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(IpGeoError::network(format!(
                    "Failed to read {} response body: {}",
                    code, e
                )));
            }
        };
        writer.write_all(&buf[..n])?;
        written += n as u64;
    }

    writer.flush()?;
    Ok(written)
}

#[async_trait]
impl DistributionSource for Ip2LocationSource {
    async fn fetch(&self, code: &str, dest: &Path) -> Result<u64> {
        if self.token.is_empty() {
            return Err(IpGeoError::config(
                "Download token is not configured (refresh.token or IP2LOCATION_TOKEN)",
            ));
        }

        // URL 中包含 token，日志只记录 code 与目标路径
        info!("Downloading {} to {}", code, dest.display());

        let cancelled = Arc::new(AtomicBool::new(false));
        let mut task = tokio::task::spawn_blocking({
            let cancelled = cancelled.clone();
            let agent = self.agent.clone();
            let url = self.download_url.clone();
            let token = self.token.clone();
            let code = code.to_string();
            let dest = dest.to_path_buf();
            let max_bytes = self.max_bytes;
            move || Self::download_sync(agent, url, token, code, dest, max_bytes, cancelled)
        });

        // 外层超时兜底：ureq 的 timeout_global 之外再留少量余量
        let written = match tokio::time::timeout(self.timeout + Duration::from_secs(5), &mut task)
            .await
        {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => {
                return Err(IpGeoError::network(format!(
                    "Download task for {} failed: {}",
                    code, e
                )));
            }
            Err(_) => {
                // 等下载线程退出（它会删掉自己写的文件），之后暂存清理才可靠
                cancelled.store(true, Ordering::Release);
                let _ = task.await;
                return Err(IpGeoError::network(format!(
                    "Download of {} timed out after {}s",
                    code,
                    self.timeout.as_secs()
                )));
            }
        };

        debug!("Downloaded {} bytes for {}", written, code);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_token_is_config_error() {
        let config = RefreshConfig::default();
        let source = Ip2LocationSource::new(&config);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("DB11LITEBINIPV6.zip");

        let err = source.fetch("DB11LITEBINIPV6", &dest).await.unwrap_err();
        assert!(matches!(err, IpGeoError::Config(_)));
        assert!(!dest.exists());
    }

    struct FailingReader {
        chunks: usize,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.chunks == 0 {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
            }
            self.chunks -= 1;
            buf[..2].copy_from_slice(b"PK");
            Ok(2)
        }
    }

    #[test]
    fn test_write_body_copies_everything() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("DB11LITEBINIPV6.zip");
        let body = vec![7u8; 200 * 1024];

        let cancelled = AtomicBool::new(false);
        let written = write_body(&mut body.as_slice(), &dest, "DB11LITEBINIPV6", &cancelled).unwrap();
        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[test]
    fn test_abandoned_download_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("DBASNLITEBINIPV6.zip");

        let cancelled = AtomicBool::new(true);
        let err = write_body(&mut &b"PK\x03\x04"[..], &dest, "DBASNLITEBINIPV6", &cancelled)
            .unwrap_err();
        assert!(matches!(err, IpGeoError::Network(_)));
        assert!(!dest.exists());
    }

    #[test]
    fn test_broken_body_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("PX12LITEBIN.zip");

        let mut reader = FailingReader { chunks: 3 };
        let err = write_body(&mut reader, &dest, "PX12LITEBIN", &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, IpGeoError::Network(_)));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let config = RefreshConfig {
            token: "secret".into(),
            // 保留端口，连接会被立即拒绝
            download_url: "http://127.0.0.1:9/download/".into(),
            fetch_timeout_secs: 2,
            ..RefreshConfig::default()
        };
        let source = Ip2LocationSource::new(&config);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("PX12LITEBIN.zip");

        let err = source.fetch("PX12LITEBIN", &dest).await.unwrap_err();
        assert!(matches!(err, IpGeoError::Network(_)));
        assert!(!err.message().contains("secret"));
    }
}
