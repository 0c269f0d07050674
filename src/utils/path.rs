use std::path::{Component, Path};

use url::Url;

/// 获取路径或 URL 样式字符串的最后一段（文件名）
///
/// 导出包中的 href 保持原样，不做百分号解码。
pub fn base_name(href: &str) -> &str {
    href.rsplit('/').next().unwrap_or(href)
}

/// 从远程 URL 推导缓存文件名
///
/// Falls back to the last raw path segment for URLs the `url` crate
/// cannot parse, and to a fixed name when the URL has no file name at all.
pub fn remote_file_name(url: &str) -> String {
    if let Ok(parsed) = Url::parse(url) {
        if let Some(segments) = parsed.path_segments() {
            if let Some(name) = segments.filter(|segment| !segment.is_empty()).last() {
                return name.to_string();
            }
        }
    }

    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    match without_query.rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "asset".to_string(),
    }
}

/// 计算 target 相对于 base_dir 的引用路径（始终以 `/` 分隔）
///
/// Both paths must be rooted the same way (both absolute or both relative
/// to the same directory), which holds for everything discovered under one
/// bundle root.
pub fn relative_url(target: &Path, base_dir: &Path) -> String {
    let target_components: Vec<Component> = target.components().collect();
    let base_components: Vec<Component> = base_dir.components().collect();

    let mut shared = 0;
    while shared < target_components.len()
        && shared < base_components.len()
        && target_components[shared] == base_components[shared]
    {
        shared += 1;
    }

    let mut parts: Vec<String> = base_components[shared..]
        .iter()
        .map(|_| "..".to_string())
        .collect();
    parts.extend(
        target_components[shared..]
            .iter()
            .map(|component| component.as_os_str().to_string_lossy().into_owned()),
    );

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn base_name_strips_bucket_prefix() {
        assert_eq!(base_name("notionbucket/xyz/My Document.pdf"), "My Document.pdf");
        assert_eq!(base_name("plain.pdf"), "plain.pdf");
    }

    #[test]
    fn remote_file_name_ignores_query_and_fragment() {
        assert_eq!(remote_file_name("http://x/a.png"), "a.png");
        assert_eq!(remote_file_name("https://cdn.example.com/img/photo.jpeg?w=640#top"), "photo.jpeg");
        assert_eq!(remote_file_name("http://x/"), "asset");
    }

    #[test]
    fn relative_url_walks_up_to_shared_root() {
        let cache_file = PathBuf::from("export/.cache/a.png");
        let page_dir = PathBuf::from("export/Sub Page abc123");
        assert_eq!(relative_url(&cache_file, &page_dir), "../.cache/a.png");

        let sibling = PathBuf::from("export/.cache/a.png");
        assert_eq!(relative_url(&sibling, Path::new("export")), ".cache/a.png");
    }
}
