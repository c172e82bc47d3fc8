//! Record to mutation conversion
//!
//! [`Transformer::convert`] turns one decoded record into a vertex group
//! followed by any edge groups. Only an unresolvable label rejects the whole
//! record; every other problem skips a single field and is reported in
//! [`Conversion::skipped`].

use tracing::{debug, warn};

use crate::error::{FieldSkipped, RecordRejected};
use crate::mutation::MutationGroup;
use crate::schema::{ActionKind, Schema};
use crate::value::{Value, wrap};
use crate::{LABEL_KEY, Record};

/// Output of converting one record
///
/// Only [`Transformer::convert`] builds one, so the vertex group is always
/// present.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    vertex: MutationGroup,
    edges: Vec<MutationGroup>,
    skipped: Vec<FieldSkipped>,
}

impl Conversion {
    /// The group creating the record's vertex
    pub fn vertex(&self) -> &MutationGroup {
        &self.vertex
    }

    /// Edge groups in field and list order
    pub fn edges(&self) -> &[MutationGroup] {
        &self.edges
    }

    /// Vertex group first, then edge groups
    pub fn groups(&self) -> impl Iterator<Item = &MutationGroup> {
        std::iter::once(&self.vertex).chain(&self.edges)
    }

    pub fn group_count(&self) -> usize {
        1 + self.edges.len()
    }

    /// Fields that contributed nothing, with the reason
    pub fn skipped(&self) -> &[FieldSkipped] {
        &self.skipped
    }
}

/// Stateless converter over a loaded schema
#[derive(Debug, Clone, Copy)]
pub struct Transformer<'a> {
    schema: &'a Schema,
}

impl<'a> Transformer<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Convert a record, using `label` in place of the record's `#label` when given
    pub fn convert(&self, record: &Record, label: Option<&str>) -> Result<Conversion, RecordRejected> {
        let label = resolve_label(record, label)?;
        let rule = self
            .schema
            .rule(label)
            .ok_or_else(|| RecordRejected::UnknownLabel(label.to_string()))?;

        let id = self.schema.render_id(&rule.label, record);
        debug!(%label, %id, fields = record.len(), "convert: called");

        let mut builder = GroupBuilder::new(id);
        for (field, value) in record {
            match rule.action_for(field) {
                Some(action) => builder.apply(action, field, value),
                None if field == LABEL_KEY => {}
                None => builder.serialize(field, value),
            }
        }
        Ok(builder.finish())
    }
}

/// Pick the explicit label, else the record's own label field
///
/// An empty explicit label counts as absent.
fn resolve_label<'r>(record: &'r Record, explicit: Option<&'r str>) -> Result<&'r str, RecordRejected> {
    if let Some(label) = explicit.filter(|l| !l.is_empty()) {
        return Ok(label);
    }
    match record.get(LABEL_KEY) {
        Some(serde_json::Value::String(label)) => Ok(label),
        Some(_) => Err(RecordRejected::InvalidLabel),
        None => Err(RecordRejected::MissingLabel),
    }
}

/// Accumulates the groups for one record
struct GroupBuilder {
    id: String,
    vertex: MutationGroup,
    edges: Vec<MutationGroup>,
    skipped: Vec<FieldSkipped>,
}

impl GroupBuilder {
    fn new(id: String) -> Self {
        Self {
            vertex: MutationGroup::create_vertex(id.clone()),
            id,
            edges: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn apply(&mut self, action: &ActionKind, field: &str, value: &serde_json::Value) {
        match action {
            ActionKind::SerializeField | ActionKind::SpliceMap => self.serialize(field, value),
            ActionKind::JoinList { delimiter } => self.join_list(field, value, delimiter),
            ActionKind::EmbeddedEdges {
                edge_label,
                embedded_in,
            } => self.embedded_edges(field, value, edge_label, embedded_in),
            ActionKind::SingleEdge { .. }
            | ActionKind::RepeatedEdges { .. }
            | ActionKind::RenameProperty { .. }
            | ActionKind::InnerVertex { .. }
            | ActionKind::StoreField { .. } => {
                let skip = FieldSkipped::Unimplemented {
                    field: field.to_string(),
                    action: action.name(),
                };
                warn!(id = %self.id, "{}", skip);
                self.skipped.push(skip);
            }
        }
    }

    fn serialize(&mut self, field: &str, value: &serde_json::Value) {
        match wrap(value) {
            Some(wrapped) => self.vertex.set_property(field, wrapped),
            None => {
                let skip = FieldSkipped::Unsupported {
                    field: field.to_string(),
                };
                warn!(id = %self.id, "{}", skip);
                self.skipped.push(skip);
            }
        }
    }

    fn join_list(&mut self, field: &str, value: &serde_json::Value, delimiter: &str) {
        let Some(items) = value.as_array() else {
            debug!(id = %self.id, %field, "join_list: value is not a list, skipping");
            self.skipped.push(FieldSkipped::WrongShape {
                field: field.to_string(),
                action: "join_list",
                detail: "value is not a list".to_string(),
            });
            return;
        };

        let parts: Option<Vec<&str>> = items.iter().map(serde_json::Value::as_str).collect();
        match parts {
            Some(parts) => self.vertex.set_property(field, Value::String(parts.join(delimiter))),
            None => {
                let skip = FieldSkipped::WrongShape {
                    field: field.to_string(),
                    action: "join_list",
                    detail: "list holds non-string elements".to_string(),
                };
                warn!(id = %self.id, "{}", skip);
                self.skipped.push(skip);
            }
        }
    }

    fn embedded_edges(&mut self, field: &str, value: &serde_json::Value, edge_label: &str, embedded_in: &str) {
        let Some(items) = value.as_array() else {
            let skip = FieldSkipped::WrongShape {
                field: field.to_string(),
                action: "embedded_edges",
                detail: "value is not a list".to_string(),
            };
            warn!(id = %self.id, "{}", skip);
            self.skipped.push(skip);
            return;
        };

        for (i, item) in items.iter().enumerate() {
            let dst = match item.as_object().map(|m| m.get(embedded_in)) {
                Some(Some(serde_json::Value::String(dst))) => Ok(dst.clone()),
                Some(Some(serde_json::Value::Number(dst))) => Ok(dst.to_string()),
                Some(Some(_)) => Err(format!("element {} has a non-scalar '{}'", i, embedded_in)),
                Some(None) => Err(format!("element {} lacks '{}'", i, embedded_in)),
                None => Err(format!("element {} is not a map", i)),
            };

            match dst {
                Ok(dst) => {
                    self.edges
                        .push(MutationGroup::create_edge(self.id.as_str(), edge_label, dst));
                }
                Err(detail) => {
                    let skip = FieldSkipped::WrongShape {
                        field: field.to_string(),
                        action: "embedded_edges",
                        detail,
                    };
                    warn!(id = %self.id, "{}", skip);
                    self.skipped.push(skip);
                }
            }
        }
    }

    fn finish(self) -> Conversion {
        Conversion {
            vertex: self.vertex,
            edges: self.edges,
            skipped: self.skipped,
        }
    }
}
