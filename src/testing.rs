//! In-memory [`Collection`] for tests.
//!
//! Backs the trait with a plain `Vec` in insertion order and skips schema
//! handling entirely: no type definitions, no field defaults, no path
//! patterns. Tests that need schema behavior use a real
//! [`crate::store::FolderCollection`] over a temp directory instead.

use std::cell::RefCell;

use serde_yaml::Mapping;

use crate::collection::{sort_documents, Collection, Document, OrderBy};
use crate::error::{Error, Result};
use crate::query::WhereExpr;

/// A collection held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryCollection {
    docs: RefCell<Vec<Document>>,
}

impl InMemoryCollection {
    /// An empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document from frontmatter YAML and a body, replacing any
    /// existing document at the path.
    ///
    /// # Panics
    ///
    /// Panics on invalid YAML; fixtures are authored inline in tests.
    pub fn insert(&self, path: &str, frontmatter_yaml: &str, body: &str) {
        let frontmatter: Mapping = if frontmatter_yaml.trim().is_empty() {
            Mapping::new()
        } else {
            serde_yaml::from_str(frontmatter_yaml).expect("valid fixture YAML")
        };
        let doc = Document {
            path: path.to_string(),
            frontmatter,
            body: body.to_string(),
        };
        let mut docs = self.docs.borrow_mut();
        match docs.iter_mut().find(|d| d.path == path) {
            Some(existing) => *existing = doc,
            None => docs.push(doc),
        }
    }

    /// Number of documents held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.borrow().len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.borrow().is_empty()
    }
}

impl Collection for InMemoryCollection {
    fn query(
        &self,
        _doc_type: &str,
        where_expr: Option<&str>,
        limit: Option<usize>,
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<Document>> {
        let expr = where_expr.map(WhereExpr::parse).transpose()?;
        let mut results: Vec<Document> = self
            .docs
            .borrow()
            .iter()
            .filter(|doc| {
                expr.as_ref()
                    .map_or(true, |e| e.matches(&doc.path, &doc.frontmatter))
            })
            .cloned()
            .collect();
        if let Some(order) = order_by {
            sort_documents(&mut results, order);
        }
        if let Some(limit) = limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    fn read(&self, path: &str) -> Result<Document> {
        self.docs
            .borrow()
            .iter()
            .find(|d| d.path == path)
            .cloned()
            .ok_or_else(|| Error::FileNotFound(path.into()))
    }

    fn update(&self, path: &str, fields: &Mapping) -> Result<()> {
        let mut docs = self.docs.borrow_mut();
        let doc = docs
            .iter_mut()
            .find(|d| d.path == path)
            .ok_or_else(|| Error::FileNotFound(path.into()))?;
        for (key, value) in fields {
            if value.is_null() {
                doc.frontmatter.remove(key);
            } else {
                doc.frontmatter.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    fn create(&self, _doc_type: &str, fields: &Mapping, body: &str) -> Result<String> {
        let title = fields
            .get("title")
            .and_then(serde_yaml::Value::as_str)
            .unwrap_or("untitled");
        let rendered = format!("tasks/{}.md", crate::ident::slugify(title));
        let path = crate::ident::unique_path(&rendered, |candidate| {
            self.docs.borrow().iter().any(|d| d.path == candidate)
        });
        self.docs.borrow_mut().push(Document {
            path: path.clone(),
            frontmatter: fields.clone(),
            body: body.to_string(),
        });
        Ok(path)
    }
}
