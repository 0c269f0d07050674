//! # 解析器模块
//!
//! 这个模块包含页面标记的解析、变换与输出：
//!
//! - HTML 解析与 DOM 操作
//! - 页面变换流水线
//! - 保留公式子树的格式化序列化
//!
//! # 模块组织
//!
//! - `html` - HTML 相关的全部功能

pub mod html;

// Re-export commonly used items for convenience
pub use html::{serialize_document, transform_page, CSS_PATCH, MATH_STYLESHEET_FILE_NAME};
