//! Virtual-path and filename helpers shared across host abstractions.

use super::types::MimeType;

/// Splits a typed address such as `Desktop\Notes/../todo.txt` into name segments.
///
/// Backslashes count as separators, `.` and empty parts are skipped, and `..` drops the previous
/// segment (never climbing above the starting folder). Segments are trimmed.
pub fn path_segments(address: &str) -> Vec<String> {
    let mut segments: Vec<String> = Vec::new();
    for part in address.split(['/', '\\']).map(str::trim) {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            name => segments.push(name.to_string()),
        }
    }
    segments
}

/// Splits `name` into stem and extension (without the dot).
///
/// Dotfiles such as `.profile` have no extension.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

/// Infers a file mimetype from the filename extension.
pub fn mimetype_for_filename(name: &str) -> MimeType {
    let Some(ext) = split_extension(name).1 else {
        return MimeType::Other("application/octet-stream".to_string());
    };
    match ext.to_ascii_lowercase().as_str() {
        "txt" | "log" | "text" => MimeType::PlainText,
        "md" | "markdown" => MimeType::Markdown,
        "png" => MimeType::Image("png".to_string()),
        "jpg" | "jpeg" => MimeType::Image("jpeg".to_string()),
        "gif" => MimeType::Image("gif".to_string()),
        "webp" => MimeType::Image("webp".to_string()),
        "svg" => MimeType::Image("svg+xml".to_string()),
        "pdf" => MimeType::Pdf,
        "url" | "webloc" => MimeType::Url,
        "lnk" => MimeType::Shortcut,
        "app" => MimeType::AppLink,
        "json" => MimeType::Other("application/json".to_string()),
        "html" | "htm" => MimeType::Other("text/html".to_string()),
        "css" => MimeType::Other("text/css".to_string()),
        "js" => MimeType::Other("text/javascript".to_string()),
        "rs" | "py" | "ts" | "toml" | "yaml" | "yml" => MimeType::PlainText,
        _ => MimeType::Other("application/octet-stream".to_string()),
    }
}

/// Returns `true` when `name` can be used as an item name.
pub fn is_valid_item_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty() && !trimmed.contains('/') && trimmed != "." && trimmed != ".."
}

/// Builds the `n`-th alternative for a clashing name: `report (2).txt`.
pub fn numbered_name(name: &str, n: usize) -> String {
    match split_extension(name) {
        (stem, Some(ext)) => format!("{stem} ({n}).{ext}"),
        (stem, None) => format!("{stem} ({n})"),
    }
}
