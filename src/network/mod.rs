//! # 网络模块
//!
//! 这个模块包含所有与资源下载和共享缓存相关的功能：
//!
//! - 远程资源的流式下载与原子落盘
//! - 跨工作线程去重的下载认领机制
//!
//! # 模块组织
//!
//! - `asset_cache` - 资源缓存、下载认领、HTTP 传输

pub mod asset_cache;

// Re-export commonly used items for convenience
pub use asset_cache::{AssetCache, HttpTransport, Transport};
