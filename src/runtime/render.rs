//! Non-forcing views of the graph for debuggers and tracers.
//!
//! Nothing here evaluates a thunk or takes a claim, so every function is safe
//! to call while evaluators are running, including from inside a trace hook.

use std::collections::HashSet;

use serde::Serialize;

use crate::runtime::{
    data_type::DataType,
    gc::{NodeHeap, NodeId, SlotState},
    value::{HostObject, Node, format_double},
};

/// One node in a [`NodeHeap::graph_view`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    pub id: NodeId,
    pub data_type: DataType,
    pub summary: String,
    pub state: ViewState,
    pub references: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewState {
    Evaluated,
    Unevaluated,
    InProgress { actor: u32 },
}

impl From<SlotState> for ViewState {
    fn from(state: SlotState) -> Self {
        match state {
            SlotState::Evaluated => ViewState::Evaluated,
            SlotState::Unevaluated => ViewState::Unevaluated,
            SlotState::InProgress(actor) => ViewState::InProgress { actor: actor.get() },
        }
    }
}

pub fn to_json(views: &[NodeView]) -> String {
    serde_json::to_string_pretty(views).unwrap_or_default()
}

impl NodeHeap {
    /// Renders the graph under `root`, one node per line.
    ///
    /// Each line is `indent` spaces, the node's tag and handle, then its
    /// payload; children follow two spaces deeper. A node met a second time
    /// is printed as a `^TAG@n` back-reference, so shared and cyclic graphs
    /// render finitely. Thunks are shown without their environment.
    pub fn render(&self, root: NodeId, indent: usize) -> String {
        let mut lines = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![(root, indent)];

        while let Some((id, depth)) = stack.pop() {
            let pad = " ".repeat(depth);
            let Ok(node) = self.node(id) else {
                lines.push(format!("{}<dangling {}>", pad, id));
                continue;
            };
            let tag = node.data_type();
            if !seen.insert(id) {
                lines.push(format!("{}^{}{}", pad, tag, id));
                continue;
            }

            let payload = match &node {
                Node::Char(c) => format!("<{}>", c),
                Node::Int(v) => format!("<{}>", v),
                Node::Double(v) => format!("<{}>", format_double(*v)),
                Node::Object(HostObject::Str(text)) => format!("<{:?}>", text),
                Node::Object(HostObject::Opaque(_)) => "<opaque>".to_string(),
                Node::Constructor(cons) => format!("{}#{}", cons.name, cons.ordinal),
                Node::Function(func) => format!("{}/{}", func.code.name, func.remaining()),
                Node::Indirection(target) => format!("-> {}", target),
                Node::Thunk(_) => match self.state(id) {
                    Ok(SlotState::InProgress(actor)) => format!("<in progress: {}>", actor),
                    _ => "<unevaluated>".to_string(),
                },
            };
            lines.push(format!("{}{}{} {}", pad, tag, id, payload));

            let children = match &node {
                Node::Thunk(_) => &[][..],
                other => other.references(),
            };
            for child in children.iter().rev() {
                stack.push((*child, depth + 2));
            }
        }

        lines.join("\n")
    }

    /// One-line summary of the node at `id`; see [`Node::brief_summary`].
    pub fn brief_summary(&self, id: NodeId) -> String {
        match self.node(id) {
            Ok(node) => node.brief_summary(),
            Err(_) => format!("<dangling {}>", id),
        }
    }

    /// `TAG@n summary`, used for update-marker listings.
    pub fn describe(&self, id: NodeId) -> String {
        match self.node(id) {
            Ok(node) => format!("{}{} {}", node.data_type(), id, node.brief_summary()),
            Err(_) => format!("<dangling {}>", id),
        }
    }

    /// Every live node reachable from `root`, in depth-first order. Edges
    /// are the ones the collector traces: fields, captures, thunk
    /// environments and `Global` handles in code. Dangling references are
    /// skipped.
    pub fn graph_view(&self, root: NodeId) -> Vec<NodeView> {
        let mut views = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let (Ok(node), Ok(state)) = (self.node(id), self.state(id)) else {
                continue;
            };
            let mut references = node.references().to_vec();
            node.code_references(&mut HashSet::new(), &mut references);
            stack.extend(references.iter().rev());
            views.push(NodeView {
                id,
                data_type: node.data_type(),
                summary: node.brief_summary(),
                state: state.into(),
                references,
            });
        }

        views
    }
}
