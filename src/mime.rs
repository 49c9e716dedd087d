//! Content types for local assets, guessed from the file extension

use std::path::Path;

/// Content type for a file path. Text types carry an explicit UTF-8 charset;
/// unknown extensions fall back to `application/octet-stream`.
pub fn content_type_for(path: &Path) -> String {
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    if mime.type_() == mime_guess::mime::TEXT && mime.get_param(mime_guess::mime::CHARSET).is_none() {
        format!("{}; charset=utf-8", mime.essence_str())
    } else {
        mime.to_string()
    }
}
