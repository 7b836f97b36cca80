//! The document-collection boundary.
//!
//! Commands and the core algorithms never touch the filesystem directly;
//! they go through the [`Collection`] trait, which models a folder of
//! markdown documents with YAML frontmatter. The production implementation
//! is [`crate::store::FolderCollection`]; tests use
//! [`crate::testing::InMemoryCollection`].

use serde_yaml::Mapping;

use crate::error::Result;

/// A document handle: collection-relative path, parsed frontmatter, and
/// markdown body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Path relative to the collection root, forward slashes.
    pub path: String,
    /// Parsed YAML frontmatter. Empty when the document has no block.
    pub frontmatter: Mapping,
    /// Everything after the closing frontmatter delimiter, verbatim.
    pub body: String,
}

/// Sort direction for query ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

/// Ordering applied to query results. Documents missing the field sort
/// after documents that have it, regardless of direction.
#[derive(Debug, Clone)]
pub struct OrderBy {
    /// Frontmatter field to sort on.
    pub field: String,
    /// Sort direction.
    pub direction: Direction,
}

impl OrderBy {
    /// Ascending order on a field.
    #[must_use]
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Asc,
        }
    }
}

/// Capability interface over a document collection.
///
/// Each method is a single blocking call the core treats as atomic; the
/// collection is trusted for write atomicity (last-writer-wins).
pub trait Collection {
    /// Query documents of a type, optionally filtered by a where-expression
    /// (see [`crate::query`]), ordered, and truncated to `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error when the type is unknown, the expression is
    /// malformed, or reading the collection fails.
    fn query(
        &self,
        doc_type: &str,
        where_expr: Option<&str>,
        limit: Option<usize>,
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<Document>>;

    /// Read one document by collection-relative path.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileNotFound`] when no document exists at
    /// the path.
    fn read(&self, path: &str) -> Result<Document>;

    /// Shallow-merge `fields` into a document's frontmatter and rewrite it.
    /// A null value deletes the key; the body is preserved verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error when the document does not exist or cannot be
    /// rewritten.
    fn update(&self, path: &str, fields: &Mapping) -> Result<()>;

    /// Create a new document of a type from frontmatter fields and a body,
    /// returning its collection-relative path.
    ///
    /// # Errors
    ///
    /// Returns an error when the type is unknown or the document cannot be
    /// written.
    fn create(&self, doc_type: &str, fields: &Mapping, body: &str) -> Result<String>;
}

/// Sort documents by a frontmatter field. Documents missing the field (or
/// holding a non-scalar) sort after documents that have it, regardless of
/// direction; ties break on path so results are deterministic.
pub fn sort_documents(docs: &mut [Document], order: &OrderBy) {
    docs.sort_by(|a, b| {
        let key_a = sort_key(a, &order.field);
        let key_b = sort_key(b, &order.field);
        let ordering = match (key_a, key_b) {
            (Some(ka), Some(kb)) => {
                let cmp = ka.cmp(&kb);
                match order.direction {
                    Direction::Asc => cmp,
                    Direction::Desc => cmp.reverse(),
                }
            }
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        ordering.then_with(|| a.path.cmp(&b.path))
    });
}

fn sort_key(doc: &Document, field: &str) -> Option<String> {
    match doc.frontmatter.get(field)? {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(format!("{:020}", n.as_i64()?)),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Split raw document text into frontmatter and body.
///
/// The frontmatter block is delimited by `---` lines at the very start of
/// the document. Text without a block parses as an empty mapping plus the
/// whole text as body. The body keeps everything after the closing
/// delimiter's newline verbatim, so `split` then [`render_document`]
/// round-trips untouched bodies.
///
/// # Errors
///
/// Returns a YAML error when the block is present but not a valid mapping.
pub fn split_document(text: &str) -> Result<(Mapping, String)> {
    let Some(rest) = text.strip_prefix("---\n").or_else(|| text.strip_prefix("---\r\n")) else {
        return Ok((Mapping::new(), text.to_string()));
    };

    let mut yaml_end = None;
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == "---" {
            yaml_end = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }

    let Some((yaml_len, body_start)) = yaml_end else {
        // Unterminated block: treat the whole text as body.
        return Ok((Mapping::new(), text.to_string()));
    };

    let yaml = &rest[..yaml_len];
    let body = rest[body_start..].to_string();
    if yaml.trim().is_empty() {
        return Ok((Mapping::new(), body));
    }
    let frontmatter: Mapping = serde_yaml::from_str(yaml)?;
    Ok((frontmatter, body))
}

/// Render frontmatter and body back into document text.
///
/// # Errors
///
/// Returns a YAML error when the mapping cannot be serialized.
pub fn render_document(frontmatter: &Mapping, body: &str) -> Result<String> {
    if frontmatter.is_empty() {
        return Ok(body.to_string());
    }
    let yaml = serde_yaml::to_string(frontmatter)?;
    Ok(format!("---\n{yaml}---\n{body}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    #[test]
    fn test_split_document_with_frontmatter() {
        let text = "---\ntitle: Buy milk\nstatus: open\n---\n\nSome notes.\n";
        let (fm, body) = split_document(text).unwrap();
        assert_eq!(fm.get("title"), Some(&Value::from("Buy milk")));
        assert_eq!(body, "\nSome notes.\n");
    }

    #[test]
    fn test_split_document_without_frontmatter() {
        let (fm, body) = split_document("just a note\n").unwrap();
        assert!(fm.is_empty());
        assert_eq!(body, "just a note\n");
    }

    #[test]
    fn test_split_document_unterminated_block() {
        let text = "---\ntitle: Dangling\n";
        let (fm, body) = split_document(text).unwrap();
        assert!(fm.is_empty());
        assert_eq!(body, text);
    }

    #[test]
    fn test_split_then_render_round_trips_body() {
        let text = "---\ntitle: Buy milk\n---\n\nbody line\n\nmore\n";
        let (fm, body) = split_document(text).unwrap();
        let rendered = render_document(&fm, &body).unwrap();
        assert_eq!(rendered, text);
    }

    #[test]
    fn test_render_empty_frontmatter_is_body_only() {
        assert_eq!(render_document(&Mapping::new(), "hi\n").unwrap(), "hi\n");
    }

    fn doc(path: &str, yaml: &str) -> Document {
        Document {
            path: path.to_string(),
            frontmatter: serde_yaml::from_str(yaml).unwrap(),
            body: String::new(),
        }
    }

    #[test]
    fn test_sort_documents_missing_field_sorts_last() {
        let mut docs = vec![
            doc("a.md", "other: x\n"),
            doc("b.md", "due: 2024-02-01\n"),
            doc("c.md", "due: 2024-01-01\n"),
        ];
        sort_documents(&mut docs, &OrderBy::asc("due"));
        let paths: Vec<&str> = docs.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, ["c.md", "b.md", "a.md"]);

        sort_documents(
            &mut docs,
            &OrderBy {
                field: "due".to_string(),
                direction: Direction::Desc,
            },
        );
        let paths: Vec<&str> = docs.iter().map(|d| d.path.as_str()).collect();
        // Missing still sorts last under descending order.
        assert_eq!(paths, ["b.md", "c.md", "a.md"]);
    }

    #[test]
    fn test_sort_documents_numbers_order_numerically() {
        let mut docs = vec![
            doc("a.md", "timeEstimate: 120\n"),
            doc("b.md", "timeEstimate: 15\n"),
        ];
        sort_documents(&mut docs, &OrderBy::asc("timeEstimate"));
        assert_eq!(docs[0].path, "b.md");
    }
}
