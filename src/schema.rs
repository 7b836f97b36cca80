//! Collection schema: the `mdbase.yaml` config and per-type definitions.
//!
//! A collection root holds `mdbase.yaml` plus a types folder (default
//! `_types/`) where each document type is described by a markdown file
//! whose frontmatter carries the type definition. Task-specific semantics
//! hang off two annotations: `tn_role` marks which abstract role a field
//! plays (see [`crate::fields`]), and `tn_completed_values` marks which
//! status values count as completed.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::collection::split_document;
use crate::error::{Error, Result};

/// Name of the collection config file at the collection root.
pub const MDBASE_FILE: &str = "mdbase.yaml";

/// Parsed `mdbase.yaml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollectionConfig {
    /// Schema version of the collection format.
    pub spec_version: String,
    /// Human-readable collection name.
    #[serde(default)]
    pub name: Option<String>,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Collection-wide settings.
    #[serde(default)]
    pub settings: Settings,
}

/// The `settings:` block of `mdbase.yaml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Folder holding type definition documents.
    pub types_folder: String,
    /// Whether unknown frontmatter keys are rejected by default.
    pub default_strict: bool,
    /// Folders excluded from document queries.
    pub exclude: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            types_folder: "_types".to_string(),
            default_strict: false,
            exclude: Vec::new(),
        }
    }
}

/// A document type definition, parsed from the frontmatter of
/// `<types_folder>/<name>.md`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TypeDef {
    /// Type name, e.g. `task`.
    pub name: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Field whose value is shown as the document's display name.
    pub display_name_key: Option<String>,
    /// Whether unknown frontmatter keys are rejected for this type.
    pub strict: Option<bool>,
    /// Pattern for paths of newly created documents, e.g.
    /// `tasks/{title}.md`.
    pub path_pattern: Option<String>,
    /// How existing documents are matched to this type.
    #[serde(rename = "match")]
    pub matcher: Option<MatchRule>,
    /// Field definitions keyed by field name, in declaration order.
    pub fields: Mapping,
}

/// The `match:` block of a type definition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MatchRule {
    /// Glob over collection-relative paths, e.g. `tasks/**/*.md`.
    pub path_glob: Option<String>,
}

/// One field definition inside a type. Keys this crate does not consume
/// (`items`, `min`, `description`, ...) are tolerated and ignored.
#[derive(Debug, Clone, Default)]
pub struct FieldDef {
    /// Whether the field is required on create.
    pub required: bool,
    /// Enum values, when the field is an enum.
    pub values: Vec<Value>,
    /// Default value applied to new documents when the field is absent.
    pub default: Option<Value>,
    /// Generation rule (`now`, `now_on_write`) for timestamp fields.
    pub generated: Option<String>,
    /// Abstract role this field plays (see [`crate::fields`]).
    pub tn_role: Option<String>,
    /// Status values that count as completed (status field only).
    pub tn_completed_values: Option<Vec<Value>>,
}

impl FieldDef {
    /// Read a field definition out of a raw frontmatter value. Each key is
    /// extracted independently, so one malformed key does not discard the
    /// rest of the definition.
    #[must_use]
    pub fn from_value(def: &Value) -> Self {
        let map = def.as_mapping();
        let get = |key: &str| map.and_then(|m| m.get(key));
        let get_str = |key: &str| get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            required: get("required").and_then(Value::as_bool).unwrap_or(false),
            values: get("values")
                .and_then(Value::as_sequence)
                .cloned()
                .unwrap_or_default(),
            default: get("default").cloned(),
            generated: get_str("generated"),
            tn_role: get_str("tn_role"),
            tn_completed_values: get("tn_completed_values")
                .and_then(Value::as_sequence)
                .cloned(),
        }
    }

    /// The field's enum values as strings, non-strings dropped.
    #[must_use]
    pub fn enum_values(&self) -> Vec<String> {
        self.values
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }
}

/// Load `mdbase.yaml` from a collection root.
///
/// # Errors
///
/// Returns [`Error::CollectionOpen`] when the file is missing and a YAML
/// error when it is unreadable.
pub fn load_collection_config(root: &Path) -> Result<CollectionConfig> {
    let path = root.join(MDBASE_FILE);
    if !path.exists() {
        return Err(Error::CollectionOpen {
            path: root.to_path_buf(),
            reason: format!("{MDBASE_FILE} not found"),
        });
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Load one type definition by name.
///
/// # Errors
///
/// Returns [`Error::UnknownType`] when no definition document exists.
pub fn load_type(root: &Path, config: &CollectionConfig, name: &str) -> Result<TypeDef> {
    let path = root
        .join(&config.settings.types_folder)
        .join(format!("{name}.md"));
    if !path.exists() {
        return Err(Error::UnknownType(name.to_string()));
    }
    let content = fs::read_to_string(path)?;
    let (frontmatter, _body) = split_document(&content)?;
    Ok(serde_yaml::from_value(Value::Mapping(frontmatter))?)
}

/// Options for the default schema written by `init`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Folder new tasks are created under.
    pub tasks_folder: String,
    /// Status enum values, first is the default.
    pub statuses: Vec<String>,
    /// Priority enum values.
    pub priorities: Vec<String>,
    /// Default status for new tasks.
    pub default_status: String,
    /// Default priority for new tasks.
    pub default_priority: String,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            tasks_folder: "tasks".to_string(),
            statuses: vec![
                "open".to_string(),
                "in-progress".to_string(),
                "done".to_string(),
                "cancelled".to_string(),
            ],
            priorities: vec![
                "low".to_string(),
                "normal".to_string(),
                "high".to_string(),
                "urgent".to_string(),
            ],
            default_status: "open".to_string(),
            default_priority: "normal".to_string(),
        }
    }
}

/// Render the default `mdbase.yaml` contents.
#[must_use]
pub fn build_mdbase_yaml() -> String {
    [
        "spec_version: \"0.2.0\"",
        "name: \"TaskNotes\"",
        "description: \"Task collection managed by mdbase-tasknotes\"",
        "settings:",
        "  types_folder: \"_types\"",
        "  default_strict: false",
        "  exclude:",
        "    - \"_types\"",
        "",
    ]
    .join("\n")
}

/// Render the default task type definition document.
#[must_use]
pub fn build_task_type_def(opts: &InitOptions) -> String {
    let completed: Vec<&str> = opts
        .statuses
        .iter()
        .map(String::as_str)
        .filter(|s| {
            let lower = s.to_lowercase();
            lower.contains("done") || lower.contains("complete") || lower.contains("cancel")
        })
        .collect();

    let mut lines: Vec<String> = Vec::new();
    let mut push = |line: &str| lines.push(line.to_string());

    push("---");
    push("name: task");
    push("description: A task managed by mdbase-tasknotes.");
    push("display_name_key: title");
    push("strict: false");
    push("");
    push(&format!("path_pattern: \"{}/{{title}}.md\"", opts.tasks_folder));
    push("");
    push("match:");
    push(&format!("  path_glob: \"{}/**/*.md\"", opts.tasks_folder));
    push("");
    push("fields:");

    push("  title:");
    push("    type: string");
    push("    required: true");
    push("    tn_role: title");

    push("  status:");
    push("    type: enum");
    push("    required: true");
    push(&format!("    values: [{}]", opts.statuses.join(", ")));
    push(&format!("    default: {}", opts.default_status));
    push("    tn_role: status");
    if !completed.is_empty() {
        push(&format!("    tn_completed_values: [{}]", completed.join(", ")));
    }

    push("  priority:");
    push("    type: enum");
    push(&format!("    values: [{}]", opts.priorities.join(", ")));
    push(&format!("    default: {}", opts.default_priority));
    push("    tn_role: priority");

    push("  due:");
    push("    type: date");
    push("    tn_role: due");
    push("  scheduled:");
    push("    type: date");
    push("    tn_role: scheduled");
    push("  completedDate:");
    push("    type: date");
    push("    tn_role: completedDate");

    push("  tags:");
    push("    type: list");
    push("    items:");
    push("      type: string");
    push("    tn_role: tags");
    push("  contexts:");
    push("    type: list");
    push("    items:");
    push("      type: string");
    push("    tn_role: contexts");
    push("  projects:");
    push("    type: list");
    push("    items:");
    push("      type: link");
    push("    description: \"Wikilinks to related project notes.\"");
    push("    tn_role: projects");

    push("  timeEstimate:");
    push("    type: integer");
    push("    min: 0");
    push("    description: \"Estimated time in minutes.\"");
    push("    tn_role: timeEstimate");

    push("  dateCreated:");
    push("    type: datetime");
    push("    required: true");
    push("    generated: \"now\"");
    push("    tn_role: dateCreated");
    push("  dateModified:");
    push("    type: datetime");
    push("    generated: \"now_on_write\"");
    push("    tn_role: dateModified");

    push("  recurrence:");
    push("    type: string");
    push("    tn_role: recurrence");
    push("  recurrenceAnchor:");
    push("    type: enum");
    push("    values: [scheduled, completion]");
    push("    default: scheduled");
    push("    tn_role: recurrenceAnchor");
    push("  completeInstances:");
    push("    type: list");
    push("    items:");
    push("      type: date");
    push("    tn_role: completeInstances");
    push("  skippedInstances:");
    push("    type: list");
    push("    items:");
    push("      type: date");
    push("    tn_role: skippedInstances");

    push("  timeEntries:");
    push("    type: list");
    push("    tn_role: timeEntries");
    push("    items:");
    push("      type: object");
    push("      fields:");
    push("        startTime:");
    push("          type: datetime");
    push("        endTime:");
    push("          type: datetime");
    push("        description:");
    push("          type: string");
    push("        duration:");
    push("          type: integer");

    push("---");
    push("");
    push("# Task");
    push("");
    push("Type definition for tasks managed by mdbase-tasknotes.");
    push("");

    lines.join("\n")
}

/// Bootstrap a collection: `mdbase.yaml`, the task type definition, and
/// the tasks folder. Returns the created entries, collection-relative.
///
/// # Errors
///
/// Returns [`Error::AlreadyInitialized`] when a schema file exists and
/// `force` is false, or an I/O error when writing fails.
pub fn init_collection(target: &Path, force: bool) -> Result<Vec<String>> {
    let opts = InitOptions::default();
    let types_dir = target.join("_types");
    let mdbase_path = target.join(MDBASE_FILE);
    let type_def_path = types_dir.join("task.md");

    fs::create_dir_all(target)?;
    fs::create_dir_all(&types_dir)?;
    fs::create_dir_all(target.join(&opts.tasks_folder))?;

    if !force && mdbase_path.exists() {
        return Err(Error::AlreadyInitialized {
            file: MDBASE_FILE.to_string(),
            path: target.to_path_buf(),
        });
    }
    if !force && type_def_path.exists() {
        return Err(Error::AlreadyInitialized {
            file: "_types/task.md".to_string(),
            path: target.to_path_buf(),
        });
    }

    fs::write(&mdbase_path, build_mdbase_yaml())?;
    fs::write(&type_def_path, build_task_type_def(&opts))?;

    Ok(vec![
        MDBASE_FILE.to_string(),
        "_types/task.md".to_string(),
        format!("{}/", opts.tasks_folder),
    ])
}
