//! # Notion Tidy Library
//!
//! 一个用于整理 Notion HTML 导出包的工具库：清理导出产生的冗余标记，
//! 缓存外部资源，使整个导出包可以离线、自包含地渲染。
//!
//! ## 模块组织
//!
//! - `core` - 核心类型、页面发现与并行调度
//! - `parsers` - HTML 解析、页面变换和格式化输出
//! - `network` - 资源下载与共享缓存系统
//! - `utils` - 工具函数和实用程序

pub mod core;
pub mod network;
pub mod parsers;
pub mod utils;

// Re-export commonly used items for convenience
pub use crate::core::*;
pub use network::*;
pub use parsers::*;
pub use utils::*;
