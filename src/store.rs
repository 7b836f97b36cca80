//! Filesystem-backed [`Collection`] implementation.
//!
//! A collection is a folder of markdown documents with a schema at the
//! root (see [`crate::schema`]). Queries walk the tree on every call;
//! collections are personal-scale and the walk keeps reads coherent with
//! out-of-band edits from other tools. Writes are whole-file rewrites,
//! last writer wins.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use crate::collection::{
    render_document, sort_documents, split_document, Collection, Document, OrderBy,
};
use crate::dates::local_iso_string;
use crate::error::{Error, Result};
use crate::ident::{render_path_pattern, unique_path};
use crate::query::WhereExpr;
use crate::schema::{self, CollectionConfig, FieldDef, TypeDef};

/// A collection rooted at a directory on disk.
#[derive(Debug)]
pub struct FolderCollection {
    root: PathBuf,
    config: CollectionConfig,
}

impl FolderCollection {
    /// Open a collection, loading its `mdbase.yaml`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CollectionOpen`] when the config is missing and a
    /// YAML error when it is unreadable.
    pub fn open(root: &Path) -> Result<Self> {
        let config = schema::load_collection_config(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
        })
    }

    /// The collection root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The loaded collection config.
    #[must_use]
    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Remove a document from the collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileNotFound`] when the path does not exist.
    pub fn delete(&self, path: &str) -> Result<()> {
        let absolute = self.resolve_path(path)?;
        if !absolute.is_file() {
            return Err(Error::FileNotFound(PathBuf::from(path)));
        }
        fs::remove_file(absolute)?;
        Ok(())
    }

    fn load_type(&self, name: &str) -> Result<TypeDef> {
        schema::load_type(&self.root, &self.config, name)
    }

    fn resolve_path(&self, path: &str) -> Result<PathBuf> {
        // Collection-relative paths only; a reference may not escape the
        // root.
        if path.split('/').any(|segment| segment == "..") || path.starts_with('/') {
            return Err(Error::FileNotFound(PathBuf::from(path)));
        }
        Ok(self.root.join(path))
    }

    fn walk_documents(&self, type_def: &TypeDef) -> Result<Vec<Document>> {
        let glob = type_def
            .matcher
            .as_ref()
            .and_then(|m| m.path_glob.as_deref());
        let mut excluded = self.config.settings.exclude.clone();
        let types_folder = self.config.settings.types_folder.clone();
        if !excluded.contains(&types_folder) {
            excluded.push(types_folder);
        }

        let mut paths = Vec::new();
        collect_markdown(&self.root, "", &excluded, &mut paths)?;
        paths.sort();

        let mut documents = Vec::new();
        for path in paths {
            if let Some(glob) = glob {
                if !glob_match(glob, &path) {
                    continue;
                }
            }
            let text = fs::read_to_string(self.root.join(&path))?;
            let (frontmatter, body) = split_document(&text)?;
            documents.push(Document {
                path,
                frontmatter,
                body,
            });
        }
        Ok(documents)
    }
}

impl Collection for FolderCollection {
    fn query(
        &self,
        doc_type: &str,
        where_expr: Option<&str>,
        limit: Option<usize>,
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<Document>> {
        let type_def = self.load_type(doc_type)?;
        let expr = where_expr.map(WhereExpr::parse).transpose()?;

        let mut results: Vec<Document> = self
            .walk_documents(&type_def)?
            .into_iter()
            .filter(|doc| {
                expr.as_ref()
                    .map_or(true, |e| e.matches(&doc.path, &doc.frontmatter))
            })
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
        let absolute = self.resolve_path(path)?;
        if !absolute.is_file() {
            return Err(Error::FileNotFound(PathBuf::from(path)));
        }
        let text = fs::read_to_string(absolute)?;
        let (frontmatter, body) = split_document(&text)?;
        Ok(Document {
            path: path.to_string(),
            frontmatter,
            body,
        })
    }

    fn update(&self, path: &str, fields: &Mapping) -> Result<()> {
        let mut doc = self.read(path)?;
        for (key, value) in fields {
            if value.is_null() {
                doc.frontmatter.remove(key);
            } else {
                doc.frontmatter.insert(key.clone(), value.clone());
            }
        }
        let rendered = render_document(&doc.frontmatter, &doc.body)?;
        fs::write(self.resolve_path(path)?, rendered)?;
        Ok(())
    }

    fn create(&self, doc_type: &str, fields: &Mapping, body: &str) -> Result<String> {
        let type_def = self.load_type(doc_type)?;
        let mut frontmatter = fields.clone();
        apply_field_defaults(&mut frontmatter, &type_def);

        let pattern = type_def
            .path_pattern
            .as_deref()
            .unwrap_or("{title}.md");
        let rendered = render_path_pattern(pattern, &frontmatter);
        let path = unique_path(&rendered, |candidate| self.root.join(candidate).exists());

        let absolute = self.resolve_path(&path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(absolute, render_document(&frontmatter, body)?)?;
        Ok(path)
    }
}

/// Fill schema defaults and `generated: now` stamps for fields the caller
/// did not supply.
fn apply_field_defaults(frontmatter: &mut Mapping, type_def: &TypeDef) {
    for (key, raw_def) in &type_def.fields {
        let Some(field_name) = key.as_str() else {
            continue;
        };
        if frontmatter.contains_key(field_name) {
            continue;
        }
        let def = FieldDef::from_value(raw_def);
        if let Some(default) = def.default {
            frontmatter.insert(Value::from(field_name), default);
        } else if def.generated.as_deref() == Some("now") {
            frontmatter.insert(Value::from(field_name), Value::from(local_iso_string()));
        }
    }
}

fn collect_markdown(
    root: &Path,
    relative: &str,
    excluded: &[String],
    out: &mut Vec<String>,
) -> Result<()> {
    let dir = if relative.is_empty() {
        root.to_path_buf()
    } else {
        root.join(relative)
    };
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let child = if relative.is_empty() {
            name.to_string()
        } else {
            format!("{relative}/{name}")
        };
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if excluded.iter().any(|e| e.trim_end_matches('/') == child) {
                continue;
            }
            collect_markdown(root, &child, excluded, out)?;
        } else if file_type.is_file() && name.ends_with(".md") {
            out.push(child);
        }
    }
    Ok(())
}

/// Match a collection-relative path against a glob. Supports `*` within a
/// path segment and `**` spanning any number of segments; no character
/// classes.
#[must_use]
pub fn glob_match(pattern: &str, path: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('/').collect();
    let path_segments: Vec<&str> = path.split('/').collect();
    match_segments(&pattern_segments, &path_segments)
}

fn match_segments(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((&"**", rest)) => (0..=path.len()).any(|skip| match_segments(rest, &path[skip..])),
        Some((first, rest)) => path
            .split_first()
            .is_some_and(|(segment, tail)| match_segment(first, segment) && match_segments(rest, tail)),
    }
}

fn match_segment(pattern: &str, segment: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == segment,
        Some((prefix, rest)) => {
            if !segment.starts_with(prefix) {
                return false;
            }
            let remainder = &segment[prefix.len()..];
            match rest.split_once('*') {
                // One star: remainder must end with the suffix.
                None => remainder.ends_with(rest),
                Some(_) => (0..=remainder.len())
                    .any(|skip| match_segment(rest, &remainder[skip..])),
            }
        }
    }
}
