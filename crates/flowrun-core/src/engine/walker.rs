//! Graph traversal.
//!
//! The walker decides which node runs next. It holds nothing but a borrow of
//! the graph, so every answer is a pure function of (graph, current id,
//! branch). Acyclicity is never checked; [`StepCounter`] is the only guard
//! against a graph that loops forever.

use flowrun_types::graph::{FlowEdge, FlowGraph, FlowNode, NodeType};

use super::error::{FlowError, NodeError};

// ---------------------------------------------------------------------------
// Edge selection
// ---------------------------------------------------------------------------

/// The edge to follow out of `from` when no branch is involved.
///
/// Prefers the first untagged edge; if every outgoing edge carries a branch
/// tag, falls back to the first one in encounter order.
pub fn next_normal<'g>(edges: &'g [FlowEdge], from: &str) -> Option<&'g FlowEdge> {
    let mut outgoing = edges.iter().filter(|e| e.source_node_id == from).peekable();
    let first = *outgoing.peek()?;

    let mut candidates = 0usize;
    let mut untagged = None;
    for edge in outgoing {
        candidates += 1;
        if untagged.is_none() && edge.branch_tag().is_none() {
            untagged = Some(edge);
        }
    }

    if candidates > 1 {
        tracing::debug!(
            node_id = from,
            candidates,
            "multiple outgoing edges; taking the first untagged one"
        );
    }

    Some(untagged.unwrap_or(first))
}

/// The first edge out of `from` tagged with `branch`.
pub fn next_branch<'g>(edges: &'g [FlowEdge], from: &str, branch: bool) -> Option<&'g FlowEdge> {
    let tag = if branch { "true" } else { "false" };
    edges
        .iter()
        .find(|e| e.source_node_id == from && e.branch_tag() == Some(tag))
}

/// The traversal root: the first node if it is start-typed, otherwise the
/// first start-typed node anywhere in the list.
pub fn start_node(nodes: &[FlowNode]) -> Option<&FlowNode> {
    match nodes.first() {
        Some(first) if first.node_type == NodeType::Start => Some(first),
        _ => nodes.iter().find(|n| n.node_type == NodeType::Start),
    }
}

// ---------------------------------------------------------------------------
// GraphWalker
// ---------------------------------------------------------------------------

/// Resolves edges to nodes for one graph.
#[derive(Debug, Clone, Copy)]
pub struct GraphWalker<'g> {
    graph: &'g FlowGraph,
}

impl<'g> GraphWalker<'g> {
    pub fn new(graph: &'g FlowGraph) -> Self {
        Self { graph }
    }

    pub fn start(&self) -> Option<&'g FlowNode> {
        start_node(&self.graph.nodes)
    }

    /// Follow the normal edge out of `from`.
    ///
    /// `Ok(None)` means there is no outgoing edge; a dangling edge target is
    /// a [`NodeError::MissingNode`].
    pub fn follow_normal(&self, from: &str) -> Result<Option<&'g FlowNode>, NodeError> {
        next_normal(&self.graph.edges, from)
            .map(|edge| self.resolve(edge))
            .transpose()
    }

    /// Follow the edge out of `from` tagged with `branch`.
    pub fn follow_branch(
        &self,
        from: &str,
        branch: bool,
    ) -> Result<Option<&'g FlowNode>, NodeError> {
        next_branch(&self.graph.edges, from, branch)
            .map(|edge| self.resolve(edge))
            .transpose()
    }

    fn resolve(&self, edge: &FlowEdge) -> Result<&'g FlowNode, NodeError> {
        self.graph
            .node(&edge.target_node_id)
            .ok_or_else(|| NodeError::MissingNode(edge.target_node_id.clone()))
    }
}

// ---------------------------------------------------------------------------
// StepCounter
// ---------------------------------------------------------------------------

/// Counts node transitions and enforces the step bound.
#[derive(Debug, Clone, Copy)]
pub struct StepCounter {
    limit: u32,
    taken: u32,
}

impl StepCounter {
    pub fn new(limit: u32) -> Self {
        Self { limit, taken: 0 }
    }

    /// Take one step, returning its 1-based number.
    ///
    /// Fails once the count exceeds the bound, so a run may execute exactly
    /// `limit` nodes.
    pub fn advance(&mut self) -> Result<u32, FlowError> {
        self.taken = self.taken.saturating_add(1);
        if self.taken > self.limit {
            return Err(FlowError::StepLimitExceeded { limit: self.limit });
        }
        Ok(self.taken)
    }

    pub fn taken(&self) -> u32 {
        self.taken
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}
