//! Field role mapping.
//!
//! Task logic speaks in abstract roles (`title`, `status`, `due`, ...);
//! a collection's schema is free to store those under any field names it
//! likes, marked with `tn_role` annotations. This module builds the
//! bidirectional role/field tables once per collection open. All reads of
//! task frontmatter pass through [`FieldMapping::normalize`] and all
//! writes through [`FieldMapping::denormalize`]; unknown keys pass through
//! unchanged in both directions.

use std::collections::BTreeMap;
use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::schema::{self, FieldDef};

/// Every abstract role the mapper knows, in canonical order.
pub const ALL_ROLES: [&str; 17] = [
    "title",
    "status",
    "priority",
    "due",
    "scheduled",
    "completedDate",
    "tags",
    "contexts",
    "projects",
    "timeEstimate",
    "dateCreated",
    "dateModified",
    "recurrence",
    "recurrenceAnchor",
    "completeInstances",
    "skippedInstances",
    "timeEntries",
];

/// Bidirectional mapping between roles and schema field names, plus the
/// derived set of completed status values. Pure and stateless after
/// construction.
#[derive(Debug, Clone)]
pub struct FieldMapping {
    role_to_field: BTreeMap<String, String>,
    field_to_role: BTreeMap<String, String>,
    display_name_key: String,
    completed_statuses: Vec<String>,
}

impl Default for FieldMapping {
    /// Identity mapping where every role maps to a field of the same name.
    fn default() -> Self {
        let mut role_to_field = BTreeMap::new();
        let mut field_to_role = BTreeMap::new();
        for role in ALL_ROLES {
            role_to_field.insert(role.to_string(), role.to_string());
            field_to_role.insert(role.to_string(), role.to_string());
        }
        Self {
            role_to_field,
            field_to_role,
            display_name_key: "title".to_string(),
            completed_statuses: vec!["done".to_string(), "cancelled".to_string()],
        }
    }
}

impl FieldMapping {
    /// Build a mapping from a type definition's field table.
    ///
    /// First pass takes explicit `tn_role` annotations; a role annotated on
    /// two fields keeps the first and reports a warning for the rest.
    /// Second pass fills unassigned roles by identity. Returns the mapping
    /// and any warnings for the caller to surface.
    #[must_use]
    pub fn from_fields(fields: &Mapping, display_name_key: Option<&str>) -> (Self, Vec<String>) {
        let mut role_to_field: BTreeMap<String, String> = BTreeMap::new();
        let mut field_to_role: BTreeMap<String, String> = BTreeMap::new();
        let mut warnings = Vec::new();

        for (key, def) in fields {
            let Some(field_name) = key.as_str() else {
                continue;
            };
            let parsed = FieldDef::from_value(def);
            let Some(role) = parsed.tn_role else {
                continue;
            };
            if !ALL_ROLES.contains(&role.as_str()) {
                continue;
            }
            if role_to_field.contains_key(&role) {
                warnings.push(format!(
                    "Duplicate tn_role \"{role}\" on field \"{field_name}\", ignoring."
                ));
                continue;
            }
            role_to_field.insert(role.clone(), field_name.to_string());
            field_to_role.insert(field_name.to_string(), role);
        }

        for role in ALL_ROLES {
            if role_to_field.contains_key(role) {
                continue;
            }
            role_to_field.insert(role.to_string(), role.to_string());
            if fields.contains_key(role) && !field_to_role.contains_key(role) {
                field_to_role.insert(role.to_string(), role.to_string());
            }
        }

        let status_field = role_to_field
            .get("status")
            .cloned()
            .unwrap_or_else(|| "status".to_string());
        let completed_statuses = infer_completed_statuses(fields, &status_field);

        let title_field = role_to_field
            .get("title")
            .cloned()
            .unwrap_or_else(|| "title".to_string());
        let display_name_key = match display_name_key {
            Some(key) if !key.trim().is_empty() => key.to_string(),
            _ => title_field,
        };

        (
            Self {
                role_to_field,
                field_to_role,
                display_name_key,
                completed_statuses,
            },
            warnings,
        )
    }

    /// Load the mapping from the `task` type definition at a collection
    /// root. Any load failure falls back to the identity mapping.
    #[must_use]
    pub fn load(root: &Path) -> (Self, Vec<String>) {
        let Ok(config) = schema::load_collection_config(root) else {
            return (Self::default(), Vec::new());
        };
        let Ok(type_def) = schema::load_type(root, &config, "task") else {
            return (Self::default(), Vec::new());
        };
        Self::from_fields(&type_def.fields, type_def.display_name_key.as_deref())
    }

    /// The actual schema field name for a role. Roles the mapper does not
    /// know resolve to themselves.
    #[must_use]
    pub fn resolve<'a>(&'a self, role: &'a str) -> &'a str {
        self.role_to_field.get(role).map_or(role, String::as_str)
    }

    /// Status values that count as completed, in schema order.
    #[must_use]
    pub fn completed_statuses(&self) -> &[String] {
        &self.completed_statuses
    }

    /// Whether a status value counts as completed.
    #[must_use]
    pub fn is_completed_status(&self, status: Option<&str>) -> bool {
        status.is_some_and(|s| self.completed_statuses.iter().any(|c| c == s))
    }

    /// The status value `complete` writes for non-recurring tasks.
    #[must_use]
    pub fn default_completed_status(&self) -> &str {
        self.completed_statuses
            .first()
            .map_or("done", String::as_str)
    }

    /// Translate actual frontmatter field names to role names. Unknown
    /// keys pass through unchanged.
    #[must_use]
    pub fn normalize(&self, raw: &Mapping) -> Mapping {
        let mut result = Mapping::new();
        for (key, value) in raw {
            let out_key = key
                .as_str()
                .and_then(|k| self.field_to_role.get(k))
                .map_or_else(|| key.clone(), |role| Value::from(role.as_str()));
            result.insert(out_key, value.clone());
        }
        result
    }

    /// Translate role-keyed data to actual field names. Unknown keys pass
    /// through unchanged.
    #[must_use]
    pub fn denormalize(&self, role_data: &Mapping) -> Mapping {
        let mut result = Mapping::new();
        for (key, value) in role_data {
            let out_key = key
                .as_str()
                .filter(|k| ALL_ROLES.contains(k))
                .and_then(|k| self.role_to_field.get(k))
                .map_or_else(|| key.clone(), |field| Value::from(field.as_str()));
            result.insert(out_key, value.clone());
        }
        result
    }

    /// Resolve the display title from role-keyed frontmatter, honoring the
    /// type's `display_name_key` and falling back to the `title` role.
    #[must_use]
    pub fn resolve_display_title(&self, normalized: &Mapping) -> Option<String> {
        let mapped_key = if self
            .field_to_role
            .get(&self.display_name_key)
            .is_some_and(|role| role == "title")
        {
            "title"
        } else {
            self.display_name_key.as_str()
        };

        for key in [mapped_key, "title"] {
            if let Some(value) = normalized.get(key).and_then(Value::as_str) {
                if !value.trim().is_empty() {
                    return Some(value.to_string());
                }
            }
        }
        None
    }
}

fn infer_completed_statuses(fields: &Mapping, status_field: &str) -> Vec<String> {
    let fallback = || vec!["done".to_string(), "cancelled".to_string()];
    let Some(def) = fields.get(status_field) else {
        return fallback();
    };
    let parsed = FieldDef::from_value(def);

    if let Some(ref explicit) = parsed.tn_completed_values {
        let explicit: Vec<String> = explicit
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        if !explicit.is_empty() {
            return explicit;
        }
    }

    let inferred: Vec<String> = parsed
        .enum_values()
        .into_iter()
        .filter(|v| {
            let lower = v.to_lowercase();
            lower.contains("done") || lower.contains("complete") || lower.contains("cancel")
        })
        .collect();
    if !inferred.is_empty() {
        return inferred;
    }

    fallback()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields_from_yaml(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_default_mapping_is_identity() {
        let mapping = FieldMapping::default();
        assert_eq!(mapping.resolve("title"), "title");
        assert_eq!(mapping.resolve("completeInstances"), "completeInstances");
        assert_eq!(mapping.completed_statuses(), ["done", "cancelled"]);
    }

    #[test]
    fn test_annotations_remap_roles() {
        let fields = fields_from_yaml(
            "name:\n  type: string\n  tn_role: title\nstate:\n  type: enum\n  values: [todo, finished]\n  tn_role: status\n  tn_completed_values: [finished]\n",
        );
        let (mapping, warnings) = FieldMapping::from_fields(&fields, None);
        assert!(warnings.is_empty());
        assert_eq!(mapping.resolve("title"), "name");
        assert_eq!(mapping.resolve("status"), "state");
        // Unannotated roles fall back to identity.
        assert_eq!(mapping.resolve("due"), "due");
        assert_eq!(mapping.completed_statuses(), ["finished"]);
    }

    #[test]
    fn test_duplicate_annotation_keeps_first_and_warns() {
        let fields = fields_from_yaml(
            "name:\n  tn_role: title\nheadline:\n  tn_role: title\n",
        );
        let (mapping, warnings) = FieldMapping::from_fields(&fields, None);
        assert_eq!(mapping.resolve("title"), "name");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Duplicate tn_role \"title\""));
        assert!(warnings[0].contains("headline"));
    }

    #[test]
    fn test_unknown_role_annotation_is_ignored() {
        let fields = fields_from_yaml("mood:\n  tn_role: vibe\n");
        let (mapping, warnings) = FieldMapping::from_fields(&fields, None);
        assert!(warnings.is_empty());
        assert_eq!(mapping.resolve("title"), "title");
    }

    #[test]
    fn test_completed_statuses_heuristic() {
        let fields = fields_from_yaml(
            "status:\n  type: enum\n  values: [open, doing, Done, cancelled-wontfix]\n  tn_role: status\n",
        );
        let (mapping, _) = FieldMapping::from_fields(&fields, None);
        assert_eq!(mapping.completed_statuses(), ["Done", "cancelled-wontfix"]);
        assert!(mapping.is_completed_status(Some("Done")));
        assert!(!mapping.is_completed_status(Some("doing")));
        assert!(!mapping.is_completed_status(None));
    }

    #[test]
    fn test_completed_statuses_default_when_nothing_matches() {
        let fields = fields_from_yaml("status:\n  type: enum\n  values: [red, green]\n  tn_role: status\n");
        let (mapping, _) = FieldMapping::from_fields(&fields, None);
        assert_eq!(mapping.completed_statuses(), ["done", "cancelled"]);
        assert_eq!(mapping.default_completed_status(), "done");
    }

    #[test]
    fn test_normalize_and_denormalize_pass_unknown_keys_through() {
        let fields = fields_from_yaml("name:\n  tn_role: title\n");
        let (mapping, _) = FieldMapping::from_fields(&fields, None);

        let raw = fields_from_yaml("name: Buy milk\ncustom: kept\n");
        let normalized = mapping.normalize(&raw);
        assert_eq!(normalized.get("title"), Some(&Value::from("Buy milk")));
        assert_eq!(normalized.get("custom"), Some(&Value::from("kept")));

        let denormalized = mapping.denormalize(&normalized);
        assert_eq!(denormalized.get("name"), Some(&Value::from("Buy milk")));
        assert_eq!(denormalized.get("custom"), Some(&Value::from("kept")));
    }

    #[test]
    fn test_display_title_prefers_display_name_key() {
        let fields = fields_from_yaml("title:\n  tn_role: title\nsummary:\n  type: string\n");
        let (mapping, _) = FieldMapping::from_fields(&fields, Some("summary"));

        let with_summary = fields_from_yaml("summary: Short form\ntitle: Long form\n");
        assert_eq!(
            mapping.resolve_display_title(&with_summary).as_deref(),
            Some("Short form")
        );

        let title_only = fields_from_yaml("title: Long form\nsummary: \"  \"\n");
        assert_eq!(
            mapping.resolve_display_title(&title_only).as_deref(),
            Some("Long form")
        );

        let neither = fields_from_yaml("other: x\n");
        assert_eq!(mapping.resolve_display_title(&neither), None);
    }

    #[test]
    fn test_load_falls_back_to_identity_without_schema() {
        let dir = tempfile::TempDir::new().unwrap();
        let (mapping, warnings) = FieldMapping::load(dir.path());
        assert!(warnings.is_empty());
        assert_eq!(mapping.resolve("title"), "title");
    }
}
