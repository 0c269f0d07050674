//! 核心类型与并行调度
//!
//! 负责发现导出包中的页面文件、创建共享缓存目录，并用固定大小的
//! 工作线程池并行执行页面变换。结果按完成顺序回传给调用方做进度
//! 展示；完成顺序不保证稳定，调用方不得依赖它做任何正确性判断。

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::info;

use crate::network::{AssetCache, HttpTransport};
use crate::parsers::html::transform_page;

/// 缓存子目录的固定名称（位于导出包根目录下）
pub const CACHE_DIR_NAME: &str = ".cache";

/// Represents errors that can occur while tidying an export bundle
#[derive(Debug, Error)]
pub enum TidyError {
    #[error("i/o error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch {url}")]
    Fetch {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to set up HTTP client")]
    Http(#[source] reqwest::Error),

    #[error("equation figure in {path} carries no embeddable stylesheet reference")]
    MalformedEquationStyle { path: PathBuf },

    #[error("document {path} has no head element")]
    NoHead { path: PathBuf },
}

/// Configuration options for a tidy run
#[derive(Clone, Debug)]
pub struct TidyOptions {
    /// Number of worker threads; `None` uses all available processing units
    pub jobs: Option<usize>,
    /// Network timeout in seconds; 0 disables the timeout
    pub timeout: u64,
    /// Custom User-Agent header for asset downloads
    pub user_agent: Option<String>,
    /// Fetch the math stylesheet unconditionally on every qualifying page
    /// instead of claiming it through the asset cache once per run
    pub legacy_stylesheet_fetch: bool,
}

impl Default for TidyOptions {
    fn default() -> Self {
        Self {
            jobs: None,
            timeout: 60,
            user_agent: None,
            legacy_stylesheet_fetch: false,
        }
    }
}

/// 单个页面的变换结果摘要
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileReport {
    /// Page file name (without its directory)
    pub filename: String,
    /// Externally-hosted images encountered, including failed downloads
    pub images: usize,
    /// Equation figures on the page
    pub equations: usize,
}

/// 一次运行的汇总
#[derive(Debug)]
pub struct RunSummary {
    /// Reports for successfully transformed pages, in completion order
    pub reports: Vec<FileReport>,
    /// Pages whose transformation failed, with the cause
    pub failures: Vec<(PathBuf, TidyError)>,
    /// Total wall-clock time of the run
    pub elapsed: Duration,
}

/// 递归发现导出包下的全部页面文件
///
/// Sorted so submission order is deterministic; completion order is not.
pub fn find_page_files(root: &Path) -> Result<Vec<PathBuf>, TidyError> {
    let mut pages = Vec::new();
    collect_page_files(root, &mut pages)?;
    pages.sort();
    Ok(pages)
}

fn collect_page_files(directory: &Path, pages: &mut Vec<PathBuf>) -> Result<(), TidyError> {
    let entries = fs::read_dir(directory).map_err(|error| TidyError::Io {
        path: directory.to_path_buf(),
        source: error,
    })?;

    for entry in entries {
        let entry = entry.map_err(|error| TidyError::Io {
            path: directory.to_path_buf(),
            source: error,
        })?;
        let path = entry.path();

        if path.is_dir() {
            collect_page_files(&path, pages)?;
        } else if path.extension().is_some_and(|extension| extension == "html") {
            pages.push(path);
        }
    }

    Ok(())
}

/// 整理一个已解压的导出包
///
/// Creates the shared cache directory and asset cache, then delegates to
/// [`run_bundle_with_cache`]. `on_file` fires once per page as it completes.
pub fn run_bundle(
    root: &Path,
    options: &TidyOptions,
    on_file: impl FnMut(&Path, &Result<FileReport, TidyError>),
) -> Result<RunSummary, TidyError> {
    let cache_dir = root.join(CACHE_DIR_NAME);
    let transport = HttpTransport::new(options)?;
    let cache = AssetCache::new(cache_dir, Box::new(transport));

    run_bundle_with_cache(root, options, &cache, on_file)
}

/// 用调用方提供的资源缓存整理一个导出包
///
/// The cache (and its transport) is the only state shared between workers;
/// each page file is owned by exactly one task.
pub fn run_bundle_with_cache(
    root: &Path,
    options: &TidyOptions,
    cache: &AssetCache,
    mut on_file: impl FnMut(&Path, &Result<FileReport, TidyError>),
) -> Result<RunSummary, TidyError> {
    let started = Instant::now();

    let pages = find_page_files(root)?;
    fs::create_dir_all(cache.cache_dir()).map_err(|error| TidyError::Io {
        path: cache.cache_dir().to_path_buf(),
        source: error,
    })?;

    let jobs = worker_count(options);
    info!(pages = pages.len(), jobs, "starting tidy run");

    let queue = Mutex::new(VecDeque::from(pages));
    let (sender, receiver) = mpsc::channel();

    let mut reports = Vec::new();
    let mut failures = Vec::new();

    thread::scope(|scope| {
        for _ in 0..jobs {
            let sender = sender.clone();
            let queue = &queue;
            scope.spawn(move || loop {
                let page = {
                    let mut queue = match queue.lock() {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    queue.pop_front()
                };
                let Some(page) = page else {
                    break;
                };

                let result = transform_page(&page, cache, options);
                if sender.send((page, result)).is_err() {
                    break;
                }
            });
        }
        // Workers hold the remaining clones; the receive loop ends once
        // every sender is gone.
        drop(sender);

        for (page, result) in receiver.iter() {
            on_file(&page, &result);
            match result {
                Ok(report) => reports.push(report),
                Err(error) => failures.push((page, error)),
            }
        }
    });

    let summary = RunSummary {
        reports,
        failures,
        elapsed: started.elapsed(),
    };
    info!(
        processed = summary.reports.len(),
        failed = summary.failures.len(),
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "tidy run finished"
    );

    Ok(summary)
}

fn worker_count(options: &TidyOptions) -> usize {
    options
        .jobs
        .unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|parallelism| parallelism.get())
                .unwrap_or(1)
        })
        .max(1)
}
