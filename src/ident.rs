//! Slug and path generation for created documents.
//!
//! New document paths are rendered from a type's `path_pattern`
//! (`tasks/{title}.md`): each `{field}` token is replaced with the
//! slugified value of that field. A slug is built by:
//! 1. Converting to lowercase
//! 2. Replacing non-alphanumeric characters with hyphens
//! 3. Collapsing multiple hyphens
//! 4. Trimming leading/trailing hyphens
//! 5. Truncating to a maximum length

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::{Mapping, Value};

/// Maximum slug length for a single path token.
const MAX_SLUG_LEN: usize = 60;

static PATTERN_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\w+)\}").unwrap());

/// Convert arbitrary text to a filesystem-safe slug.
#[must_use]
pub fn slugify(text: &str) -> String {
    slugify_with_max_len(text, MAX_SLUG_LEN)
}

/// Convert text to a slug with a custom maximum length.
#[must_use]
pub fn slugify_with_max_len(text: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_was_hyphen = true; // Start true to avoid leading hyphen

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }

    if slug.ends_with('-') {
        slug.pop();
    }

    if slug.len() > max_len {
        slug.truncate(max_len);
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    slug
}

/// Render a `path_pattern` against a document's fields. Each `{field}`
/// token becomes the slugified string value of that field; a missing or
/// empty field renders as `untitled`.
#[must_use]
pub fn render_path_pattern(pattern: &str, fields: &Mapping) -> String {
    PATTERN_TOKEN
        .replace_all(pattern, |caps: &regex::Captures<'_>| {
            let value = fields
                .get(&caps[1])
                .and_then(Value::as_str)
                .map(slugify)
                .unwrap_or_default();
            if value.is_empty() {
                "untitled".to_string()
            } else {
                value
            }
        })
        .into_owned()
}

/// Pick the first non-colliding variant of a rendered path by suffixing
/// `-2`, `-3`, ... before the extension. `exists` reports whether a
/// candidate path is already taken.
#[must_use]
pub fn unique_path(rendered: &str, exists: impl Fn(&str) -> bool) -> String {
    if !exists(rendered) {
        return rendered.to_string();
    }
    let (stem, ext) = rendered
        .rsplit_once('.')
        .map_or((rendered, String::new()), |(s, e)| (s, format!(".{e}")));
    let mut n = 2_u32;
    loop {
        let candidate = format!("{stem}-{n}{ext}");
        if !exists(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
