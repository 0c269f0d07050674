//! 页面变换
//!
//! 对单个导出页面按固定顺序应用全部修正：
//!
//! 1. 删除所有元素的 `id` 属性（导出生成的 id 不可移植）
//! 2. 删除空的 `class` 属性
//! 3. 把本地附件链接的可见文本规范为文件名
//! 4. 向 head 注入修正样式
//! 5. 把外部图片下载到共享缓存并改写 `src` 为相对路径
//! 6. 把公式页面引用的 KaTeX 样式表落到缓存并以 `<link>` 引用
//!
//! 变换结束后通过格式化序列器写回原文件（临时文件 + 原子改名）。

use std::fs;
use std::io::Write;
use std::path::Path;

use markup5ever_rcdom::Handle;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::core::{FileReport, TidyError, TidyOptions};
use crate::network::AssetCache;
use crate::utils::path::{base_name, relative_url};

use super::dom::{
    all_elements, append_child, create_element_node, create_text_node, detach_node, find_nodes,
    get_node_attr, get_node_name, has_class, html_to_dom, set_element_text, set_node_attr,
    text_content,
};
use super::serializer::{equation_figures, serialize_document};

/// 注入到每个页面 head 的修正样式
///
/// Notion's exporter leaves pages with pre-style whitespace handling,
/// shrunken code/quote/callout fonts, and collapsed empty paragraphs;
/// this block undoes all of that for static rendering.
pub const CSS_PATCH: &str = "
/* notion-tidy injection */
body { white-space: normal !important; }
p { min-height: 1em !important; }
.code, code { font-size: 100% !important; }
blockquote { font-size: 100% !important; }
.callout { white-space: normal !important; }
.callout div:has(span.icon) { font-size: 100% !important; }
.source:not(.bookmark) { font-size: 100% !important; }
";

/// 公式样式表在缓存目录中的固定文件名
pub const MATH_STYLESHEET_FILE_NAME: &str = "katex.min.css";

/// 对一个页面文件应用全部变换并原地写回
///
/// Only this task touches the page's DOM; the asset cache is the sole piece
/// of state shared with other workers.
pub fn transform_page(
    page_path: &Path,
    cache: &AssetCache,
    options: &TidyOptions,
) -> Result<FileReport, TidyError> {
    let data = fs::read(page_path).map_err(|error| TidyError::Io {
        path: page_path.to_path_buf(),
        source: error,
    })?;
    let dom = html_to_dom(&data, "utf-8".to_string());
    let page_dir = page_path.parent().unwrap_or(Path::new("."));

    let elements = all_elements(&dom.document);

    strip_volatile_attributes(&elements);
    normalize_source_anchors(&elements);

    let head = find_nodes(&dom.document, vec!["html", "head"])
        .into_iter()
        .next()
        .ok_or_else(|| TidyError::NoHead {
            path: page_path.to_path_buf(),
        })?;
    inject_stylesheet(&head);

    let images = localize_external_images(&elements, page_dir, cache);

    let equations = equation_figures(&dom.document);
    if let Some(first_equation) = equations.first() {
        localize_math_stylesheet(first_equation, &head, page_dir, cache, options, page_path)?;
    }
    let equation_count = equations.len();

    let formatted = serialize_document(&dom);
    write_page(page_path, formatted.as_bytes())?;

    debug!(
        page = %page_path.display(),
        images,
        equations = equation_count,
        "transformed page"
    );

    Ok(FileReport {
        filename: page_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        images,
        equations: equation_count,
    })
}

/// 删除导出生成的 id 属性和空 class 属性
fn strip_volatile_attributes(elements: &[Handle]) {
    for element in elements {
        set_node_attr(element, "id", None);

        if let Some(class) = get_node_attr(element, "class") {
            if class.split_whitespace().next().is_none() {
                set_node_attr(element, "class", None);
            }
        }
    }
}

/// 把本地附件链接的可见文本替换为文件名
///
/// Wrappers carrying the `source` class hold an anchor whose href still
/// points at the export's storage-bucket path; the visible text should be
/// just the file's base name. The href itself stays untouched.
fn normalize_source_anchors(elements: &[Handle]) {
    for wrapper in elements.iter().filter(|element| has_class(element, "source")) {
        let anchors = find_nodes(wrapper, vec!["a"]);
        let Some(anchor) = anchors.first() else {
            continue;
        };
        let Some(href) = get_node_attr(anchor, "href") else {
            continue;
        };
        if !href.is_empty() && !href.starts_with("http") {
            set_element_text(anchor, base_name(&href));
        }
    }
}

/// 向 head 追加修正样式
///
/// Runs exactly once per invocation; re-running the pipeline on an already
/// processed file appends a second copy (documented behavior).
fn inject_stylesheet(head: &Handle) {
    let style = create_element_node("style", vec![]);
    append_child(&style, create_text_node(CSS_PATCH));
    append_child(head, style);
}

/// 把外部图片换成共享缓存中的本地副本，返回外链图片计数
///
/// Whoever wins the claim downloads; everyone (winner or loser) rewrites
/// `src` to the same deterministic cache path. A failed download keeps the
/// remote reference and never fails the page.
fn localize_external_images(elements: &[Handle], page_dir: &Path, cache: &AssetCache) -> usize {
    let mut images = 0;

    for img in elements
        .iter()
        .filter(|element| get_node_name(element) == Some("img"))
    {
        let Some(src) = get_node_attr(img, "src") else {
            continue;
        };
        if !src.starts_with("http") {
            continue;
        }
        images += 1;

        let local_path = if cache.claim(&src) {
            match cache.fetch(&src) {
                Ok(path) => Some(path),
                Err(error) => {
                    // Hand the claim back so later references to this URL
                    // retry instead of pointing at a file that never landed
                    cache.release(&src);
                    warn!(url = %src, %error, "image download failed, keeping remote reference");
                    None
                }
            }
        } else {
            // Another worker owns the download; converge on its path
            Some(cache.local_path_for(&src))
        };

        if let Some(local_path) = local_path {
            set_node_attr(img, "src", Some(relative_url(&local_path, page_dir)));
        }
    }

    images
}

/// 把公式页面内嵌的 KaTeX 样式表落到缓存并改为 `<link>` 引用
///
/// The first equation figure on a page embeds a `<style>` node whose
/// `url(...)` points at the shared KaTeX stylesheet. By default the fetch is
/// claimed through the asset cache like any other URL; legacy mode restores
/// the original per-page unconditional fetch.
fn localize_math_stylesheet(
    equation: &Handle,
    head: &Handle,
    page_dir: &Path,
    cache: &AssetCache,
    options: &TidyOptions,
    page_path: &Path,
) -> Result<(), TidyError> {
    let style_node = find_nodes(equation, vec!["style"])
        .into_iter()
        .next()
        .ok_or_else(|| TidyError::MalformedEquationStyle {
            path: page_path.to_path_buf(),
        })?;
    let url = extract_css_url(&text_content(&style_node)).ok_or_else(|| {
        TidyError::MalformedEquationStyle {
            path: page_path.to_path_buf(),
        }
    })?;

    let download = if options.legacy_stylesheet_fetch {
        cache
            .fetch_named(&url, MATH_STYLESHEET_FILE_NAME)
            .map(|_| ())
    } else if cache.claim(&url) {
        cache
            .fetch_named(&url, MATH_STYLESHEET_FILE_NAME)
            .map(|_| ())
            .map_err(|error| {
                // Hand the claim back so the next equation page retries
                cache.release(&url);
                error
            })
    } else if cache.cached_path(MATH_STYLESHEET_FILE_NAME).exists() {
        // Another worker already cached it; the file name is fixed, reuse it
        Ok(())
    } else {
        // Claimed by a concurrent worker whose download has not landed yet;
        // the inline style must stay or the page would reference a missing file
        Err(TidyError::Fetch {
            url: url.clone(),
            source: "stylesheet not cached yet by the claiming worker".into(),
        })
    };

    match download {
        Ok(()) => {
            detach_node(&style_node);
            let local_path = cache.cached_path(MATH_STYLESHEET_FILE_NAME);
            let link = create_element_node(
                "link",
                vec![
                    ("rel", "stylesheet"),
                    ("href", &relative_url(&local_path, page_dir)),
                ],
            );
            append_child(head, link);
        }
        Err(error) => {
            warn!(url = %url, %error, "math stylesheet download failed, keeping inline style");
        }
    }

    Ok(())
}

/// 从内嵌样式文本中提取唯一的 `url(...)` 引用
fn extract_css_url(css: &str) -> Option<String> {
    let start = css.find("url(")? + "url(".len();
    let end = css[start..].find(')')? + start;
    let url = css[start..end].trim().trim_matches(|c| c == '\'' || c == '"');

    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}

/// 写回页面：写入同目录临时文件后原子改名覆盖
fn write_page(page_path: &Path, contents: &[u8]) -> Result<(), TidyError> {
    let directory = page_path.parent().unwrap_or(Path::new("."));
    let mut file = NamedTempFile::new_in(directory).map_err(|error| TidyError::Io {
        path: directory.to_path_buf(),
        source: error,
    })?;
    file.write_all(contents).map_err(|error| TidyError::Io {
        path: page_path.to_path_buf(),
        source: error,
    })?;
    file.persist(page_path).map_err(|error| TidyError::Io {
        path: page_path.to_path_buf(),
        source: error.error,
    })?;

    Ok(())
}
