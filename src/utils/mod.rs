//! # 工具模块
//!
//! 这个模块包含各种工具函数和实用程序：
//!
//! - 相对路径推导（页面到缓存文件的引用路径）
//! - 从 URL 和 href 中提取文件名
//!
//! # 模块组织
//!
//! - `path` - 路径与文件名处理工具函数

pub mod path;

// Re-export commonly used items for convenience
pub use path::{base_name, relative_url, remote_file_name};
