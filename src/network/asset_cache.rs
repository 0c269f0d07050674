//! 共享资源缓存
//!
//! 多个工作线程并行处理页面时，同一个远程资源只允许下载一次。
//! `AssetCache` 持有本次运行的缓存目录、已认领 URL 集合和下载传输层：
//! 对每个 URL，`claim` 在整个运行期间恰好返回一次 `true`，其余调用方
//! 通过 `local_path_for` 推导出相同的本地路径。

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::core::{TidyError, TidyOptions};
use crate::utils::path::remote_file_name;

/// 资源下载传输层
///
/// The seam between the cache and the network; tests substitute a counting
/// fake to observe how many real transfers a run performs.
pub trait Transport: Send + Sync {
    /// 将 url 指向的资源写入 destination 文件
    fn fetch(&self, url: &str, destination: &Path) -> Result<(), TidyError>;
}

/// 基于 reqwest 阻塞客户端的默认传输层
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(options: &TidyOptions) -> Result<Self, TidyError> {
        let mut builder = reqwest::blocking::Client::builder();

        if options.timeout > 0 {
            builder = builder.timeout(Duration::from_secs(options.timeout));
        } else {
            // No timeout; a hung transfer stalls its worker until killed
            builder = builder.timeout(None::<Duration>);
        }
        if let Some(user_agent) = &options.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        Ok(Self {
            client: builder.build().map_err(TidyError::Http)?,
        })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str, destination: &Path) -> Result<(), TidyError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|error| TidyError::Fetch {
                url: url.to_string(),
                source: Box::new(error),
            })?;

        // Stream into a sibling temp file, then rename into place, so a
        // concurrent reader (or a second legacy-mode writer) never sees a
        // half-written asset.
        let directory = destination.parent().unwrap_or(Path::new("."));
        let mut file = NamedTempFile::new_in(directory).map_err(|error| TidyError::Io {
            path: directory.to_path_buf(),
            source: error,
        })?;
        response
            .copy_to(file.as_file_mut())
            .map_err(|error| TidyError::Fetch {
                url: url.to_string(),
                source: Box::new(error),
            })?;
        file.persist(destination).map_err(|error| TidyError::Io {
            path: destination.to_path_buf(),
            source: error.error,
        })?;

        Ok(())
    }
}

/// 去重的、线程安全的资源下载与存储服务
///
/// Append-only for the lifetime of one run; the cache directory is left on
/// disk afterward as a durable artifact.
pub struct AssetCache {
    cache_dir: PathBuf,
    claimed: Mutex<HashSet<String>>,
    transport: Box<dyn Transport>,
}

impl AssetCache {
    pub fn new(cache_dir: PathBuf, transport: Box<dyn Transport>) -> Self {
        Self {
            cache_dir,
            claimed: Mutex::new(HashSet::new()),
            transport,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// 认领一个 URL 的下载权
    ///
    /// Exactly one caller per distinct URL receives `true` across the run.
    /// The lock guards only the membership check-and-insert, never a
    /// network transfer.
    pub fn claim(&self, url: &str) -> bool {
        let mut claimed = match self.claimed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        claimed.insert(url.to_string())
    }

    /// 释放一个已认领的 URL
    ///
    /// Called by a claim winner whose download failed, so a later task may
    /// claim the URL again and retry instead of trusting a file that never
    /// landed on disk.
    pub fn release(&self, url: &str) {
        let mut claimed = match self.claimed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        claimed.remove(url);
    }

    /// URL 对应的本地缓存路径（纯推导，不触网）
    pub fn local_path_for(&self, url: &str) -> PathBuf {
        self.cache_dir.join(remote_file_name(url))
    }

    /// 缓存目录下指定文件名的路径
    pub fn cached_path(&self, file_name: &str) -> PathBuf {
        self.cache_dir.join(file_name)
    }

    /// 下载 url 到按其文件名推导出的缓存路径
    ///
    /// Only the caller that won `claim` for this URL should call this.
    pub fn fetch(&self, url: &str) -> Result<PathBuf, TidyError> {
        let destination = self.local_path_for(url);
        self.transport.fetch(url, &destination)?;
        debug!(url, destination = %destination.display(), "cached remote asset");
        Ok(destination)
    }

    /// 下载 url 到缓存目录下的固定文件名
    pub fn fetch_named(&self, url: &str, file_name: &str) -> Result<PathBuf, TidyError> {
        let destination = self.cached_path(file_name);
        self.transport.fetch(url, &destination)?;
        debug!(url, destination = %destination.display(), "cached remote asset");
        Ok(destination)
    }
}
