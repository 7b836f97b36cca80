//! Task reference resolution.
//!
//! Commands accept a task reference: a path, an exact title, an exact
//! filename, or a fuzzy fragment. Resolution tries those tiers in order
//! and stops at the first tier that matches anything. A tier with exactly
//! one match resolves; more than one is an ambiguity error listing the
//! candidates ranked best-first, so the user can pick a path.

use serde_yaml::Value;

use crate::collection::{Collection, Document};
use crate::error::{Error, Result};
use crate::fields::FieldMapping;
use crate::query::{escape_quotes, file_basename};

/// Candidates fetched per tier; enough to rank and render an ambiguity
/// listing without scanning huge collections.
const TIER_LIMIT: usize = 20;

/// Candidates shown in an ambiguity error before eliding the rest.
const AMBIGUOUS_SHOWN: usize = 5;

/// Resolve a task reference to exactly one document.
///
/// Tiers, first non-empty wins:
/// 1. Path passthrough: input containing `/` or ending in `.md` is read
///    directly (a missing `.md` extension is appended).
/// 2. Exact title match (case-sensitive equality).
/// 3. Exact filename match (basename without extension).
/// 4. Fuzzy: title or filename containing the input, case-insensitive,
///    deduplicated by path.
///
/// # Errors
///
/// Returns [`Error::TaskNotFound`] when every tier is empty,
/// [`Error::AmbiguousTask`] when the winning tier holds more than one
/// candidate, and propagates collection errors.
pub fn resolve_task(
    collection: &dyn Collection,
    mapping: &FieldMapping,
    reference: &str,
) -> Result<Document> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(Error::TaskNotFound(reference.to_string()));
    }

    if reference.contains('/') || reference.ends_with(".md") {
        let path = if reference.ends_with(".md") {
            reference.to_string()
        } else {
            format!("{reference}.md")
        };
        return collection.read(&path);
    }

    let title_field = mapping.resolve("title");
    let escaped = escape_quotes(reference);

    let exact_title = collection.query(
        "task",
        Some(&format!("{title_field} == \"{escaped}\"")),
        Some(TIER_LIMIT),
        None,
    )?;
    if !exact_title.is_empty() {
        return pick(exact_title, mapping, reference);
    }

    let exact_basename = collection.query(
        "task",
        Some(&format!("file.basename == \"{escaped}\"")),
        Some(TIER_LIMIT),
        None,
    )?;
    if !exact_basename.is_empty() {
        return pick(exact_basename, mapping, reference);
    }

    let by_title = collection.query(
        "task",
        Some(&format!("{title_field}.contains(\"{escaped}\")")),
        Some(TIER_LIMIT),
        None,
    )?;
    let by_basename = collection.query(
        "task",
        Some(&format!("file.basename.contains(\"{escaped}\")")),
        Some(TIER_LIMIT),
        None,
    )?;

    let mut fuzzy = by_title;
    for doc in by_basename {
        if !fuzzy.iter().any(|d| d.path == doc.path) {
            fuzzy.push(doc);
        }
    }
    if fuzzy.is_empty() {
        return Err(Error::TaskNotFound(reference.to_string()));
    }
    pick(fuzzy, mapping, reference)
}

fn pick(mut candidates: Vec<Document>, mapping: &FieldMapping, reference: &str) -> Result<Document> {
    if candidates.len() == 1 {
        return Ok(candidates.remove(0));
    }
    rank(&mut candidates, mapping, reference);
    Err(Error::AmbiguousTask(render_ambiguous(&candidates, mapping, reference)))
}

/// Relevance ranking for an ambiguity listing. Scores favor exact and
/// prefix matches, then containment, then closeness in length; ties break
/// on lowercased title, then path, so the listing is deterministic.
fn rank(candidates: &mut [Document], mapping: &FieldMapping, reference: &str) {
    let query_lower = reference.to_lowercase();
    let mut scored: Vec<(i64, String, Document)> = candidates
        .iter()
        .map(|doc| {
            let title = display_title(doc, mapping);
            let score = score(&title, &doc.path, &query_lower);
            (score, title.to_lowercase(), doc.clone())
        })
        .collect();
    scored.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| a.1.cmp(&b.1))
            .then_with(|| a.2.path.cmp(&b.2.path))
    });
    for (slot, (_, _, doc)) in candidates.iter_mut().zip(scored) {
        *slot = doc;
    }
}

fn score(title: &str, path: &str, query_lower: &str) -> i64 {
    let title_lower = title.to_lowercase();
    let mut score = 0;
    if title_lower == *query_lower {
        score += 100;
    }
    if title_lower.starts_with(query_lower) {
        score += 50;
    }
    if title_lower.contains(query_lower) {
        score += 25;
    }
    if path.to_lowercase().contains(query_lower) {
        score += 10;
    }
    let diff = title.len().abs_diff(query_lower.len());
    score += (10_i64 - i64::try_from(diff).unwrap_or(i64::MAX)).max(0);
    score
}

fn render_ambiguous(candidates: &[Document], mapping: &FieldMapping, reference: &str) -> String {
    let mut lines = vec![
        format!("Ambiguous task reference \"{reference}\"."),
        "Matches (best first):".to_string(),
    ];
    for (index, doc) in candidates.iter().take(AMBIGUOUS_SHOWN).enumerate() {
        let title = display_title(doc, mapping);
        lines.push(format!("  {}. {} ({})", index + 1, title, doc.path));
    }
    if candidates.len() > AMBIGUOUS_SHOWN {
        lines.push(format!("  ...and {} more", candidates.len() - AMBIGUOUS_SHOWN));
    }
    if let Some(first) = candidates.first() {
        lines.push(format!(
            "Use a full path to disambiguate (for example: {}).",
            first.path
        ));
    }
    lines.join("\n")
}

/// A document's display title: the mapped title field, falling back to the
/// filename.
#[must_use]
pub fn display_title(doc: &Document, mapping: &FieldMapping) -> String {
    mapping
        .normalize(&doc.frontmatter)
        .get("title")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .map_or_else(|| file_basename(&doc.path), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryCollection;
    use proptest::prelude::*;

    fn collection_with(docs: &[(&str, &str)]) -> InMemoryCollection {
        let collection = InMemoryCollection::new();
        for (path, title) in docs {
            collection.insert(path, &format!("title: {title}\ntags: [task]\n"), "");
        }
        collection
    }

    #[test]
    fn test_path_passthrough() {
        let collection = collection_with(&[("tasks/water-plants.md", "Water plants")]);
        let mapping = FieldMapping::default();
        let doc = resolve_task(&collection, &mapping, "tasks/water-plants.md").unwrap();
        assert_eq!(doc.path, "tasks/water-plants.md");
        // A slash without extension gets `.md` appended.
        let doc = resolve_task(&collection, &mapping, "tasks/water-plants").unwrap();
        assert_eq!(doc.path, "tasks/water-plants.md");
    }

    #[test]
    fn test_path_passthrough_missing_file_errors() {
        let collection = collection_with(&[]);
        let mapping = FieldMapping::default();
        assert!(matches!(
            resolve_task(&collection, &mapping, "tasks/nope.md"),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_exact_title_beats_fuzzy() {
        let collection = collection_with(&[
            ("tasks/a.md", "Water"),
            ("tasks/b.md", "Water plants"),
        ]);
        let mapping = FieldMapping::default();
        let doc = resolve_task(&collection, &mapping, "Water").unwrap();
        assert_eq!(doc.path, "tasks/a.md");
    }

    #[test]
    fn test_exact_title_is_case_sensitive() {
        let collection = collection_with(&[("tasks/a.md", "Water plants")]);
        let mapping = FieldMapping::default();
        // Falls through to fuzzy (case-insensitive) and still resolves.
        let doc = resolve_task(&collection, &mapping, "water plants").unwrap();
        assert_eq!(doc.path, "tasks/a.md");
    }

    #[test]
    fn test_exact_basename_tier() {
        let collection = collection_with(&[
            ("tasks/standup.md", "Daily standup meeting"),
            ("tasks/standup-notes.md", "Notes"),
        ]);
        let mapping = FieldMapping::default();
        let doc = resolve_task(&collection, &mapping, "standup").unwrap();
        assert_eq!(doc.path, "tasks/standup.md");
    }

    #[test]
    fn test_fuzzy_single_match_resolves() {
        let collection = collection_with(&[
            ("tasks/a.md", "Water the plants"),
            ("tasks/b.md", "Call dentist"),
        ]);
        let mapping = FieldMapping::default();
        let doc = resolve_task(&collection, &mapping, "dent").unwrap();
        assert_eq!(doc.path, "tasks/b.md");
    }

    #[test]
    fn test_fuzzy_dedupes_title_and_basename_hits() {
        // Both fuzzy probes match the same document; one candidate, not an
        // ambiguity.
        let collection = collection_with(&[("tasks/water-plants.md", "Water plants")]);
        let mapping = FieldMapping::default();
        let doc = resolve_task(&collection, &mapping, "water").unwrap();
        assert_eq!(doc.path, "tasks/water-plants.md");
    }

    #[test]
    fn test_not_found() {
        let collection = collection_with(&[("tasks/a.md", "Water plants")]);
        let mapping = FieldMapping::default();
        let err = resolve_task(&collection, &mapping, "dentist").unwrap_err();
        assert_eq!(err.to_string(), "No task found matching \"dentist\"");
        assert!(matches!(
            resolve_task(&collection, &mapping, "  "),
            Err(Error::TaskNotFound(_))
        ));
    }

    #[test]
    fn test_ambiguous_listing_is_ranked_and_rendered() {
        let collection = collection_with(&[
            ("tasks/z.md", "Water plants and flowers"),
            ("tasks/a.md", "water"),
            ("tasks/m.md", "Deep water research"),
        ]);
        let mapping = FieldMapping::default();
        let err = resolve_task(&collection, &mapping, "water").unwrap_err();
        let Error::AmbiguousTask(message) = err else {
            panic!("expected ambiguity");
        };
        let lines: Vec<&str> = message.lines().collect();
        assert_eq!(lines[0], "Ambiguous task reference \"water\".");
        assert_eq!(lines[1], "Matches (best first):");
        // Exact-equality (ci) candidate ranks first.
        assert_eq!(lines[2], "  1. water (tasks/a.md)");
        assert_eq!(
            lines.last().unwrap(),
            &"Use a full path to disambiguate (for example: tasks/a.md)."
        );
    }

    #[test]
    fn test_ambiguous_listing_elides_after_five() {
        let docs: Vec<(String, String)> = (0..7)
            .map(|i| (format!("tasks/report-{i}.md"), format!("Water report {i}")))
            .collect();
        let pairs: Vec<(&str, &str)> = docs
            .iter()
            .map(|(p, t)| (p.as_str(), t.as_str()))
            .collect();
        let collection = collection_with(&pairs);
        let mapping = FieldMapping::default();
        let Error::AmbiguousTask(message) =
            resolve_task(&collection, &mapping, "water").unwrap_err()
        else {
            panic!("expected ambiguity");
        };
        assert!(message.contains("  ...and 2 more"));
        assert_eq!(message.matches(". Water report").count() + message.matches(". water").count(), 5);
    }

    #[test]
    fn test_untitled_document_falls_back_to_basename() {
        let collection = InMemoryCollection::new();
        collection.insert("tasks/mystery-errand.md", "tags: [task]\n", "");
        let mapping = FieldMapping::default();
        let doc = resolve_task(&collection, &mapping, "mystery-errand").unwrap();
        assert_eq!(display_title(&doc, &mapping), "mystery-errand");
    }

    proptest! {
        #[test]
        fn prop_ranking_is_order_independent(
            order in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle(),
        ) {
            let docs: Vec<(String, String)> = order
                .iter()
                .map(|i| (format!("tasks/w{i}.md"), format!("Water item {i}")))
                .collect();
            let collection = InMemoryCollection::new();
            for (path, title) in &docs {
                collection.insert(path, &format!("title: {title}\ntags: [task]\n"), "");
            }
            let mapping = FieldMapping::default();
            let Error::AmbiguousTask(message) =
                resolve_task(&collection, &mapping, "water").unwrap_err()
            else {
                panic!("expected ambiguity");
            };
            // Equal scores break ties on title then path, so the listing is
            // the same no matter the insertion order.
            prop_assert!(message.contains("  1. Water item 0 (tasks/w0.md)"));
        }
    }
}
