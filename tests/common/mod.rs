// 集成测试公共模块
//
// 提供测试辅助工具和共享功能

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use notion_tidy::core::TidyError;
use notion_tidy::network::{AssetCache, Transport};

/// 每个 URL 的实际抓取次数记录（跨线程共享）
#[derive(Clone, Default)]
pub struct FetchLog {
    counts: Arc<Mutex<HashMap<String, usize>>>,
}

impl FetchLog {
    pub fn count(&self, url: &str) -> usize {
        self.counts.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.lock().unwrap().values().sum()
    }

    fn record(&self, url: &str) {
        *self
            .counts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default() += 1;
    }
}

/// 假传输层：不触网，按预置内容写文件并计数
pub struct FakeTransport {
    bodies: HashMap<String, Vec<u8>>,
    fail_all: bool,
    log: FetchLog,
}

impl FakeTransport {
    /// 为给定的 URL 返回预置内容，其余 URL 返回占位字节
    pub fn serving(bodies: &[(&str, &[u8])]) -> Self {
        Self {
            bodies: bodies
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_vec()))
                .collect(),
            fail_all: false,
            log: FetchLog::default(),
        }
    }

    /// 所有抓取都失败
    pub fn failing() -> Self {
        Self {
            bodies: HashMap::new(),
            fail_all: true,
            log: FetchLog::default(),
        }
    }

    pub fn log(&self) -> FetchLog {
        self.log.clone()
    }
}

impl Transport for FakeTransport {
    fn fetch(&self, url: &str, destination: &Path) -> Result<(), TidyError> {
        self.log.record(url);

        if self.fail_all {
            return Err(TidyError::Fetch {
                url: url.to_string(),
                source: "connection refused".into(),
            });
        }

        let body = self
            .bodies
            .get(url)
            .cloned()
            .unwrap_or_else(|| b"stub".to_vec());
        fs::write(destination, body).map_err(|error| TidyError::Io {
            path: destination.to_path_buf(),
            source: error,
        })
    }
}

/// 在导出包目录下写一个页面文件
pub fn write_page(root: &Path, relative: &str, html: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, html).unwrap();
    path
}

/// 构造一个结构完整的页面
pub fn page_with_body(body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>Page</title></head><body>{body}</body></html>"
    )
}

/// 以假传输层构造资源缓存（缓存目录为导出包根下的 .cache）
pub fn fake_cache(root: &Path, transport: FakeTransport) -> AssetCache {
    AssetCache::new(
        root.join(notion_tidy::core::CACHE_DIR_NAME),
        Box::new(transport),
    )
}
