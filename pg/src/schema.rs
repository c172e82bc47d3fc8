//! Transform rule definitions and loading
//!
//! A schema is a YAML list of rules, one per record label:
//!
//! ```yaml
//! - label: Sample
//!   gid: "sample:{{id}}"
//!   actions:
//!     - field: aliases
//!       join_list:
//!         delimiter: ","
//!     - field: variants
//!       embedded_edges:
//!         edge_label: hasVariant
//!         embedded_in: id
//!     - field: notes
//!       serialize_field:
//! ```
//!
//! The YAML tree is normalized into a string-keyed JSON tree before it is bound
//! to the rule types, so scalar keys such as `1:` or `true:` are accepted.
//! Later rules replace earlier ones with the same label.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::Record;
use crate::error::SchemaError;
use crate::template::IdTemplates;

/// What to do with one record field
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    RenameProperty { rename: String },
    SerializeField,
    SpliceMap,
    JoinList { delimiter: String },
    SingleEdge { edge_label: String },
    RepeatedEdges { edge_label: String },
    EmbeddedEdges { edge_label: String, embedded_in: String },
    InnerVertex {
        #[serde(default)]
        edge_label: String,
    },
    StoreField {
        #[serde(default)]
        store: String,
    },
}

impl ActionKind {
    /// The schema key naming this action
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::RenameProperty { .. } => "rename_property",
            ActionKind::SerializeField => "serialize_field",
            ActionKind::SpliceMap => "splice_map",
            ActionKind::JoinList { .. } => "join_list",
            ActionKind::SingleEdge { .. } => "single_edge",
            ActionKind::RepeatedEdges { .. } => "repeated_edges",
            ActionKind::EmbeddedEdges { .. } => "embedded_edges",
            ActionKind::InnerVertex { .. } => "inner_vertex",
            ActionKind::StoreField { .. } => "store_field",
        }
    }
}

/// An action bound to a field name
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAction {
    pub field: String,
    pub action: ActionKind,
}

impl FieldAction {
    pub fn new(field: impl Into<String>, action: ActionKind) -> Self {
        Self {
            field: field.into(),
            action,
        }
    }
}

/// How records of one label become mutations
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRule {
    pub label: String,
    pub id_template: String,
    pub actions: Vec<FieldAction>,
    /// Field name -> index of the last action declared for it
    index: HashMap<String, usize>,
}

impl TransformRule {
    pub fn new(label: impl Into<String>, id_template: impl Into<String>, actions: Vec<FieldAction>) -> Self {
        let index = actions
            .iter()
            .enumerate()
            .map(|(i, a)| (a.field.clone(), i))
            .collect();
        Self {
            label: label.into(),
            id_template: id_template.into(),
            actions,
            index,
        }
    }

    /// The action bound to `field`; the last declaration wins
    pub fn action_for(&self, field: &str) -> Option<&ActionKind> {
        self.index.get(field).map(|&i| &self.actions[i].action)
    }

    /// Fields that have more than one action declared, in declaration order
    pub fn duplicate_fields(&self) -> Vec<&str> {
        let mut seen = HashMap::new();
        let mut dups = Vec::new();
        for action in &self.actions {
            let count = seen.entry(action.field.as_str()).or_insert(0u32);
            *count += 1;
            if *count == 2 {
                dups.push(action.field.as_str());
            }
        }
        dups
    }
}

/// Non-fatal findings reported by [`Schema::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaWarning {
    /// More than one action targets the same field; only the last applies
    DuplicateAction { label: String, field: String },
    /// The id template references no field, so every vertex gets the same id
    ConstantId { label: String },
    /// A later rule replaced an earlier one with the same label
    Overwritten { label: String },
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaWarning::DuplicateAction { label, field } => {
                write!(f, "rule '{}': field '{}' has multiple actions, the last one wins", label, field)
            }
            SchemaWarning::ConstantId { label } => {
                write!(f, "rule '{}': id template references no fields", label)
            }
            SchemaWarning::Overwritten { label } => {
                write!(f, "rule '{}' is defined more than once, the last one wins", label)
            }
        }
    }
}

/// Rule shape as written in the schema document
#[derive(Debug, Deserialize)]
struct RawRule {
    label: String,
    #[serde(alias = "id_template")]
    gid: String,
    #[serde(default)]
    actions: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// Immutable label -> rule mapping with compiled id templates
#[derive(Debug, Default)]
pub struct Schema {
    rules: HashMap<String, TransformRule>,
    templates: IdTemplates,
    overwritten: Vec<String>,
}

impl Schema {
    /// Load a schema from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Schema::load: called");
        let content = fs::read_to_string(path).map_err(|source| SchemaError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let schema = Self::from_yaml(&content)?;
        info!(rules = schema.len(), path = %path.display(), "Loaded schema");
        Ok(schema)
    }

    /// Parse a schema from YAML text
    pub fn from_yaml(content: &str) -> Result<Self, SchemaError> {
        debug!(len = content.len(), "Schema::from_yaml: called");
        if content.trim().is_empty() {
            return Ok(Schema::default());
        }
        let doc: serde_yaml::Value = serde_yaml::from_str(content)?;
        let items = match doc {
            serde_yaml::Value::Null => Vec::new(),
            serde_yaml::Value::Sequence(items) => items,
            other => {
                return Err(SchemaError::NotAList {
                    found: kind_name(&other).to_string(),
                });
            }
        };

        let mut schema = Schema::default();
        for (index, item) in items.iter().enumerate() {
            let tree = normalize(item, &format!("[{}]", index))?;
            let rule = bind_rule(index, tree)?;
            schema.insert(rule)?;
        }
        Ok(schema)
    }

    /// Build a schema from already-constructed rules
    pub fn from_rules(rules: impl IntoIterator<Item = TransformRule>) -> Result<Self, SchemaError> {
        let mut schema = Schema::default();
        for rule in rules {
            schema.insert(rule)?;
        }
        Ok(schema)
    }

    fn insert(&mut self, rule: TransformRule) -> Result<(), SchemaError> {
        self.templates.register(&rule.label, &rule.id_template)?;
        let label = rule.label.clone();
        if self.rules.insert(label.clone(), rule).is_some() {
            warn!(%label, "Rule redefined, later definition replaces earlier one");
            self.overwritten.push(label);
        }
        Ok(())
    }

    /// Look up the rule for a label
    pub fn rule(&self, label: &str) -> Option<&TransformRule> {
        self.rules.get(label)
    }

    /// All labels, sorted
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Render the vertex id for a record under `label`
    pub fn render_id(&self, label: &str, record: &Record) -> String {
        self.templates.render(label, record)
    }

    /// Report authoring problems that do not prevent loading
    pub fn validate(&self) -> Vec<SchemaWarning> {
        let mut warnings: Vec<SchemaWarning> = self
            .overwritten
            .iter()
            .map(|label| SchemaWarning::Overwritten { label: label.clone() })
            .collect();

        for label in self.labels() {
            let rule = &self.rules[label];
            if !rule.id_template.contains("{{") {
                warnings.push(SchemaWarning::ConstantId {
                    label: label.to_string(),
                });
            }
            for field in rule.duplicate_fields() {
                warnings.push(SchemaWarning::DuplicateAction {
                    label: label.to_string(),
                    field: field.to_string(),
                });
            }
        }
        warnings
    }
}

fn kind_name(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a list",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}

/// Convert a YAML tree into a string-keyed JSON tree
pub fn normalize(value: &serde_yaml::Value, path: &str) -> Result<serde_json::Value, SchemaError> {
    let unsupported = |reason: String| SchemaError::Unsupported {
        path: path.to_string(),
        reason,
    };

    match value {
        serde_yaml::Value::Null => Ok(serde_json::Value::Null),
        serde_yaml::Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(serde_json::Value::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(serde_json::Value::from(u))
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(serde_json::Value::Number)
                    .ok_or_else(|| unsupported(format!("non-finite number {}", n)))
            }
        }
        serde_yaml::Value::String(s) => Ok(serde_json::Value::String(s.clone())),
        serde_yaml::Value::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| normalize(item, &format!("{}[{}]", path, i)))
            .collect::<Result<Vec<_>, _>>()
            .map(serde_json::Value::Array),
        serde_yaml::Value::Mapping(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => return Err(unsupported(format!("{} used as a mapping key", kind_name(other)))),
                };
                let child = normalize(v, &format!("{}.{}", path, key))?;
                out.insert(key, child);
            }
            Ok(serde_json::Value::Object(out))
        }
        serde_yaml::Value::Tagged(tagged) => Err(unsupported(format!("tag {} is not supported", tagged.tag))),
    }
}

fn bind_rule(index: usize, tree: serde_json::Value) -> Result<TransformRule, SchemaError> {
    let invalid = |message: String| SchemaError::InvalidRule { index, message };

    let raw: RawRule = serde_json::from_value(tree).map_err(|e| invalid(e.to_string()))?;
    let actions = raw
        .actions
        .into_iter()
        .map(|entry| bind_action(&raw.label, entry).map_err(&invalid))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(label = %raw.label, action_count = actions.len(), "bind_rule: bound rule");
    Ok(TransformRule::new(raw.label, raw.gid, actions))
}

/// Bind `{field: name, <kind>: <params>}` to a [`FieldAction`]
fn bind_action(label: &str, mut entry: serde_json::Map<String, serde_json::Value>) -> Result<FieldAction, String> {
    let field = match entry.remove("field") {
        Some(serde_json::Value::String(field)) => field,
        Some(_) => return Err(format!("rule '{}': action field name must be a string", label)),
        None => return Err(format!("rule '{}': action is missing 'field'", label)),
    };

    if entry.len() != 1 {
        let kinds: Vec<&String> = entry.keys().collect();
        return Err(format!(
            "rule '{}': action for '{}' must name exactly one kind, found {:?}",
            label, field, kinds
        ));
    }

    let (kind, params) = entry
        .into_iter()
        .next()
        .ok_or_else(|| format!("rule '{}': action for '{}' has no kind", label, field))?;

    // Parameterless kinds may be written as `kind:` or `kind: {}`
    let bound = match params {
        serde_json::Value::Null => bind_bare_kind(kind),
        serde_json::Value::Object(ref map) if map.is_empty() => bind_bare_kind(kind),
        params => serde_json::from_value(serde_json::Value::Object(serde_json::Map::from_iter([(kind, params)]))),
    };

    let action = bound.map_err(|e| format!("rule '{}': action for '{}': {}", label, field, e))?;
    Ok(FieldAction { field, action })
}

/// Unit kinds bind from the bare name; kinds whose parameters all default bind from `{kind: {}}`
fn bind_bare_kind(kind: String) -> serde_json::Result<ActionKind> {
    serde_json::from_value(serde_json::Value::String(kind.clone())).or_else(|_| {
        let empty = serde_json::Value::Object(serde_json::Map::new());
        serde_json::from_value(serde_json::Value::Object(serde_json::Map::from_iter([(kind, empty)])))
    })
}
