//! Graph mutation statements
//!
//! A [`MutationGroup`] is the unit forwarded to a sink. It serializes as
//! `{"query": [...]}` with one single-key object per statement, e.g.
//!
//! ```json
//! {"query":[{"addV":"S1"},{"property":{"age":42}}]}
//! {"query":[{"V":"S1"},{"addE":"hasVariant"},{"to":"V7"}]}
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A single step of a mutation group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MutationStatement {
    /// Create a vertex with the given id
    #[serde(rename = "addV")]
    AddVertex(String),
    /// Reference an existing vertex
    #[serde(rename = "V")]
    Vertex(String),
    /// Create an edge with the given label from the current vertex
    #[serde(rename = "addE")]
    AddEdge(String),
    /// Destination vertex of the edge being created
    #[serde(rename = "to")]
    To(String),
    /// Set properties on the current vertex
    #[serde(rename = "property")]
    Property(BTreeMap<String, Value>),
}

/// Ordered statements building one vertex or one edge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationGroup {
    pub query: Vec<MutationStatement>,
}

impl MutationGroup {
    /// Start a group that creates the vertex `id`
    pub fn create_vertex(id: impl Into<String>) -> Self {
        Self {
            query: vec![MutationStatement::AddVertex(id.into())],
        }
    }

    /// A group connecting two existing vertices
    pub fn create_edge(from: impl Into<String>, label: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            query: vec![
                MutationStatement::Vertex(from.into()),
                MutationStatement::AddEdge(label.into()),
                MutationStatement::To(to.into()),
            ],
        }
    }

    /// Append a single-property assignment
    pub fn set_property(&mut self, key: impl Into<String>, value: Value) {
        self.query
            .push(MutationStatement::Property(BTreeMap::from([(key.into(), value)])));
    }

    /// Id of the vertex this group creates, if it is a vertex group
    pub fn vertex_id(&self) -> Option<&str> {
        match self.query.first() {
            Some(MutationStatement::AddVertex(id)) => Some(id),
            _ => None,
        }
    }

    /// All property maps in statement order
    pub fn properties(&self) -> impl Iterator<Item = &BTreeMap<String, Value>> {
        self.query.iter().filter_map(|s| match s {
            MutationStatement::Property(props) => Some(props),
            _ => None,
        })
    }

    /// Look up a property value set anywhere in the group
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties().find_map(|props| props.get(key))
    }

    pub fn is_edge(&self) -> bool {
        matches!(
            self.query.as_slice(),
            [
                MutationStatement::Vertex(_),
                MutationStatement::AddEdge(_),
                MutationStatement::To(_)
            ]
        )
    }

    /// Serialize as a single JSON line
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
