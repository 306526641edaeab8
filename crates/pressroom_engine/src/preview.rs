use crate::frontmatter;

const TRUNCATED_MARKER: &str = "\n.[truncated]";
/// Byte budget for the `preview` field stored with stage results.
pub const MAX_PREVIEW_BYTES: usize = 2_048;

/// Frontmatter-free excerpt of a document, cut on a char boundary.
pub fn preview(markdown: &str, max_bytes: usize) -> String {
    let body = frontmatter::split(markdown).1;
    if body.len() <= max_bytes {
        return body.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{TRUNCATED_MARKER}", &body[..end])
}
