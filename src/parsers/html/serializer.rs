//! 格式化序列化
//!
//! 将变换后的 DOM 输出为缩进良好的 HTML 文本。公式 figure 子树对空白
//! 敏感，必须逐字节保留：先用占位文本节点替换每个公式子树，对整棵树
//! 做通用的缩进输出，再把占位符换回原始序列化结果，最后用正则收起
//! 打印器在公式两侧插入的换行和缩进。

use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use regex::Regex;

use super::dom::{create_text_node, find_nodes, has_class, replace_node};

/// Elements that never hold children and close themselves
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Raw-text elements: browsers never decode entities inside these, so their
/// text must be emitted verbatim, not escaped
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// 序列化单个节点及其子树（紧凑形式，不加任何格式化）
pub fn serialize_node(node: &Handle) -> String {
    let mut buf: Vec<u8> = Vec::new();
    let serializable: SerializableHandle = node.clone().into();
    serialize(
        &mut buf,
        &serializable,
        SerializeOpts {
            traversal_scope: TraversalScope::IncludeNode,
            ..Default::default()
        },
    )
    .expect("Unable to serialize DOM into buffer");

    String::from_utf8_lossy(&buf).to_string()
}

/// 收集文档中的全部公式 figure 子树
pub fn equation_figures(document: &Handle) -> Vec<Handle> {
    find_nodes(document, vec!["figure"])
        .into_iter()
        .filter(|figure| has_class(figure, "equation"))
        .collect()
}

/// 序列化整个文档为带缩进的 HTML，公式子树逐字节保留
///
/// Consumes the tree logically: equation figures are swapped out for
/// placeholder text nodes and not restored afterward, so serialize once,
/// at the very end of a page's pipeline.
pub fn serialize_document(dom: &RcDom) -> String {
    // Pass 1: swap every equation sub-tree for a unique placeholder token,
    // remembering its exact serialized markup.
    let mut placeholders: Vec<(String, String)> = Vec::new();
    for (i, equation) in equation_figures(&dom.document).iter().enumerate() {
        let token = format!("EQUATION-PLACEHOLDER-{i}");
        let markup = serialize_node(equation);
        if replace_node(equation, create_text_node(&token)) {
            placeholders.push((token, markup));
        }
    }

    let mut output = String::new();
    pretty_print(&dom.document, &mut output, 0);

    // Pass 2: substitute the placeholders back.
    for (token, markup) in &placeholders {
        output = output.replace(token, markup);
    }

    // The generic printer put each placeholder on its own indented line;
    // glue restored equations back onto the surrounding lines so each one
    // reads as a single inline unit.
    if !placeholders.is_empty() {
        let equation_line = Regex::new(r#"(?s)\n\s*(<figure class="equation".*?</figure>)\s*\n"#)
            .expect("hardcoded regex is valid");
        output = equation_line.replace_all(&output, "$1").to_string();
    }

    output
}

fn indent(output: &mut String, depth: usize) {
    for _ in 0..depth {
        output.push(' ');
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

fn pretty_print(node: &Handle, output: &mut String, depth: usize) {
    match &node.data {
        NodeData::Document => {
            for child in node.children.borrow().iter() {
                pretty_print(child, output, 0);
            }
        }
        NodeData::Doctype { name, .. } => {
            output.push_str("<!DOCTYPE ");
            output.push_str(name);
            output.push_str(">\n");
        }
        NodeData::Text { contents } => {
            let contents = contents.borrow();
            let trimmed = contents.trim();
            if !trimmed.is_empty() {
                indent(output, depth);
                output.push_str(&escape_text(trimmed));
                output.push('\n');
            }
        }
        NodeData::Comment { contents } => {
            indent(output, depth);
            output.push_str("<!--");
            output.push_str(contents);
            output.push_str("-->\n");
        }
        NodeData::Element { name, attrs, .. } => {
            let tag = name.local.as_ref();

            indent(output, depth);
            output.push('<');
            output.push_str(tag);
            for attr in attrs.borrow().iter() {
                output.push(' ');
                output.push_str(&attr.name.local);
                output.push_str("=\"");
                output.push_str(&escape_attr(&attr.value));
                output.push('"');
            }

            if VOID_ELEMENTS.contains(&tag) {
                output.push_str("/>\n");
                return;
            }
            output.push_str(">\n");

            if RAW_TEXT_ELEMENTS.contains(&tag) {
                // CSS/JS text goes out untouched apart from outer whitespace;
                // escaping would corrupt child combinators and string literals
                for child in node.children.borrow().iter() {
                    if let NodeData::Text { contents } = &child.data {
                        let contents = contents.borrow();
                        let trimmed = contents.trim();
                        if !trimmed.is_empty() {
                            indent(output, depth + 1);
                            output.push_str(trimmed);
                            output.push('\n');
                        }
                    }
                }
                indent(output, depth);
                output.push_str("</");
                output.push_str(tag);
                output.push_str(">\n");
                return;
            }

            for child in node.children.borrow().iter() {
                pretty_print(child, output, depth + 1);
            }

            indent(output, depth);
            output.push_str("</");
            output.push_str(tag);
            output.push_str(">\n");
        }
        NodeData::ProcessingInstruction { .. } => {}
    }
}
