//! HTML 解析和处理模块
//!
//! 这个模块分为三个子模块：
//!
//! - `dom`: 基础 DOM 操作
//! - `transform`: 页面变换流水线
//! - `serializer`: 保留公式子树的格式化输出

pub mod dom;
pub mod serializer;
pub mod transform;

// 重新导出主要的公共 API
pub use dom::{
    all_elements, append_child, create_element_node, create_text_node, detach_node, find_nodes,
    get_class_list, get_node_attr, get_node_name, get_parent_node, has_class, html_to_dom,
    replace_node, set_element_text, set_node_attr, text_content,
};
pub use serializer::{equation_figures, serialize_document, serialize_node};
pub use transform::{transform_page, CSS_PATCH, MATH_STYLESHEET_FILE_NAME};
