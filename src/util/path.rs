use std::path::{Path, PathBuf};

/// Lexically clean a URL path: collapse repeated slashes, drop `.` segments
/// and resolve `..` without ever climbing above `/`. Always returns a rooted
/// path.
pub fn clean_url_path(raw: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Extension of the last URL path segment including the dot, or `""`.
///
/// Unlike [`Path::extension`], a leading dot counts (`/.env` → `.env`).
pub fn url_extension(path: &str) -> &str {
    let last = path.rsplit('/').next().unwrap_or(path);
    last.rfind('.').map(|i| &last[i..]).unwrap_or("")
}

/// Expand `~` and `$VAR` / `${VAR}` in a configured path. Unknown variables
/// leave the input unchanged.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => path.to_path_buf(),
    }
}
