//! Graph submissions: the wire shape operators send
//!
//! A submission is keyed by caller-supplied temporary identifiers —
//! arbitrary strings unique within the submission. Durable identifiers
//! are minted during persistence and the temporary ones never escape
//! the request/response cycle.

use deskflow_types::RoleId;
use serde::{Deserialize, Serialize};

/// A candidate workflow graph, as submitted by an operator
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GraphSubmission {
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<EdgeSpec>,
}

impl GraphSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, node: NodeSpec) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn edge(mut self, edge: EdgeSpec) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn find_node(&self, temp_id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.temp_id == temp_id)
    }
}

/// One candidate node, keyed by its temporary id
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSpec {
    pub temp_id: String,
    pub kind: NodeKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instruction: String,
    /// Required for task nodes; start/end markers get the implicit
    /// system role during persistence.
    #[serde(default)]
    pub role: Option<RoleId>,
    /// Defaults to the step default weight when omitted.
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub display_order: u32,
}

impl NodeSpec {
    pub fn start(temp_id: impl Into<String>) -> Self {
        Self {
            temp_id: temp_id.into(),
            kind: NodeKind::Start,
            name: "Start".to_string(),
            description: String::new(),
            instruction: String::new(),
            role: None,
            weight: None,
            display_order: 0,
        }
    }

    pub fn end(temp_id: impl Into<String>) -> Self {
        Self {
            temp_id: temp_id.into(),
            kind: NodeKind::End,
            name: "End".to_string(),
            description: String::new(),
            instruction: String::new(),
            role: None,
            weight: None,
            display_order: 0,
        }
    }

    pub fn task(temp_id: impl Into<String>, name: impl Into<String>, role: RoleId) -> Self {
        Self {
            temp_id: temp_id.into(),
            kind: NodeKind::Task,
            name: name.into(),
            description: String::new(),
            instruction: String::new(),
            role: Some(role),
            weight: None,
            display_order: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.display_order = order;
        self
    }
}

/// Kind tag for a submitted node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Start,
    Task,
    End,
}

/// One candidate edge, referencing nodes of the same submission
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub label: String,
}

impl EdgeSpec {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label: String::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}
