use std::cell::RefCell;

use encoding_rs::Encoding;
use html5ever::parse_document;
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{namespace_url, ns};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: String) -> RcDom {
    let s: String;

    if let Some(encoding) = Encoding::for_label(document_encoding.as_bytes()) {
        let (string, _, _) = encoding.decode(data);
        s = string.to_string();
    } else {
        s = String::from_utf8_lossy(data).to_string();
    }

    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut s.as_bytes())
        .unwrap()
}

/// 查找指定路径的DOM节点
pub fn find_nodes(node: &Handle, node_names: Vec<&str>) -> Vec<Handle> {
    assert!(!node_names.is_empty());

    let mut found_nodes = Vec::new();
    let node_name = node_names[0];

    if node_names.len() == 1 {
        if let NodeData::Element { ref name, .. } = node.data {
            if &*name.local == node_name {
                found_nodes.push(node.clone());
            }
        }

        for child_node in node.children.borrow().iter() {
            found_nodes.append(&mut find_nodes(child_node, node_names.clone()));
        }
    } else if let NodeData::Element { ref name, .. } = node.data {
        if &*name.local == node_name {
            let mut new_node_names = node_names;
            new_node_names.remove(0);
            found_nodes.append(&mut find_nodes(node, new_node_names));
        } else {
            for child_node in node.children.borrow().iter() {
                found_nodes.append(&mut find_nodes(child_node, node_names.clone()));
            }
        }
    } else {
        for child_node in node.children.borrow().iter() {
            found_nodes.append(&mut find_nodes(child_node, node_names.clone()));
        }
    }

    found_nodes
}

/// 收集整棵子树中的全部元素节点
pub fn all_elements(node: &Handle) -> Vec<Handle> {
    let mut elements = Vec::new();

    if let NodeData::Element { .. } = node.data {
        elements.push(node.clone());
    }

    for child_node in node.children.borrow().iter() {
        elements.append(&mut all_elements(child_node));
    }

    elements
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => {
            for attr in attrs.borrow().iter() {
                if &*attr.name.local == attr_name {
                    return Some(attr.value.to_string());
                }
            }
            None
        }
        _ => None,
    }
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 获取父节点（保留原有的父子链接）
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let parent = child.parent.take();
    child.parent.set(parent.clone());
    parent.and_then(|node| node.upgrade())
}

/// 设置节点属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    use html5ever::interface::{Attribute, QualName};
    use html5ever::tendril::format_tendril;
    use html5ever::{ns, LocalName};

    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();
        let mut i = 0;
        let mut found_existing_attr: bool = false;

        while i < attrs_mut.len() {
            if &attrs_mut[i].name.local == attr_name {
                found_existing_attr = true;

                if let Some(attr_value) = attr_value.clone() {
                    let _ = &attrs_mut[i].value.clear();
                    let _ = &attrs_mut[i].value.push_slice(attr_value.as_str());
                } else {
                    // Remove attr completely if attr_value is not defined
                    attrs_mut.remove(i);
                    continue;
                }
            }

            i += 1;
        }

        if !found_existing_attr {
            // Add new attribute (since originally the target node didn't have it)
            if let Some(attr_value) = attr_value.clone() {
                let name = LocalName::from(attr_name);

                attrs_mut.push(Attribute {
                    name: QualName::new(None, ns!(), name),
                    value: format_tendril!("{}", attr_value),
                });
            }
        }
    };
}

/// 获取元素 class 属性中的类名列表
pub fn get_class_list(node: &Handle) -> Vec<String> {
    match get_node_attr(node, "class") {
        Some(value) => value.split_whitespace().map(|c| c.to_string()).collect(),
        None => Vec::new(),
    }
}

/// 判断元素的 class 列表中是否包含指定类名
pub fn has_class(node: &Handle, class_name: &str) -> bool {
    get_class_list(node).iter().any(|c| c == class_name)
}

/// 创建一个新的元素节点
pub fn create_element_node(tag_name: &str, attributes: Vec<(&str, &str)>) -> Handle {
    use html5ever::interface::{Attribute, QualName};
    use html5ever::tendril::format_tendril;
    use html5ever::LocalName;

    Node::new(NodeData::Element {
        name: QualName::new(None, ns!(html), LocalName::from(tag_name)),
        attrs: RefCell::new(
            attributes
                .into_iter()
                .map(|(name, value)| Attribute {
                    name: QualName::new(None, ns!(), LocalName::from(name)),
                    value: format_tendril!("{}", value),
                })
                .collect(),
        ),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

/// 创建一个新的文本节点
pub fn create_text_node(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from(text)),
    })
}

/// 获取节点下所有文本内容（按文档顺序拼接）
pub fn text_content(node: &Handle) -> String {
    let mut content = String::new();

    if let NodeData::Text { contents } = &node.data {
        content.push_str(&contents.borrow());
    }

    for child_node in node.children.borrow().iter() {
        content.push_str(&text_content(child_node));
    }

    content
}

/// 向元素追加一个子节点
pub fn append_child(parent: &Handle, child: Handle) {
    child.parent.set(Some(std::rc::Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// 用新节点替换树中的某个节点，返回是否成功
pub fn replace_node(old_node: &Handle, new_node: Handle) -> bool {
    let parent = match get_parent_node(old_node) {
        Some(parent) => parent,
        None => return false,
    };

    let mut children = parent.children.borrow_mut();
    for child in children.iter_mut() {
        if std::rc::Rc::ptr_eq(child, old_node) {
            new_node.parent.set(Some(std::rc::Rc::downgrade(&parent)));
            *child = new_node;
            return true;
        }
    }

    false
}

/// 从树中摘除某个节点
pub fn detach_node(node: &Handle) {
    if let Some(parent) = get_parent_node(node) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !std::rc::Rc::ptr_eq(child, node));
        node.parent.set(None);
    }
}

/// 替换元素的全部子节点为一段文本
pub fn set_element_text(node: &Handle, text: &str) {
    node.children.borrow_mut().clear();
    append_child(node, create_text_node(text));
}
