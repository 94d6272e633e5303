//! Search tree vertex.
//!
//! Nodes live in the [`crate::SearchTree`] arena and refer to each other by
//! [`NodeId`]. Statistics are stored from the perspective of the player who
//! made the move into the node, so a parent picks the child with the highest
//! `Q + U` without negating anything.

use crate::game::GameState;

/// Index into the node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A position reached in the search, together with its visit statistics.
#[derive(Debug, Clone)]
pub struct Node<G: GameState> {
    /// Move played from the parent (None for the root).
    pub mv: Option<G::Move>,

    /// Parent index (None for the root). Never used for ownership.
    pub parent: Option<NodeId>,

    /// Materialised the first time a traversal reaches the node.
    pub position: Option<G>,

    /// Prior used by selection. At the root this may include noise.
    pub prior: f32,

    /// Prior as produced by the policy.
    pub base_prior: f32,

    pub visit_count: u32,

    /// Sum of backpropagated values, mover's perspective.
    pub total_value: f32,

    /// Traversals currently passing through this node.
    pub virtual_loss_count: u32,

    pub expanded: bool,
    pub terminal: bool,

    /// Game result for the side to move at this node (only if `terminal`).
    pub terminal_value: f32,

    /// One child per move, in move enumeration order.
    pub children: Vec<NodeId>,
}

impl<G: GameState> Node<G> {
    pub fn root(position: G) -> Self {
        Self {
            mv: None,
            parent: None,
            position: Some(position),
            prior: 1.0,
            base_prior: 1.0,
            visit_count: 0,
            total_value: 0.0,
            virtual_loss_count: 0,
            expanded: false,
            terminal: false,
            terminal_value: 0.0,
            children: Vec::new(),
        }
    }

    pub fn child(parent: NodeId, mv: G::Move, prior: f32) -> Self {
        Self {
            mv: Some(mv),
            parent: Some(parent),
            position: None,
            prior,
            base_prior: prior,
            visit_count: 0,
            total_value: 0.0,
            virtual_loss_count: 0,
            expanded: false,
            terminal: false,
            terminal_value: 0.0,
            children: Vec::new(),
        }
    }

    /// Mean value without virtual loss. 0 if never visited.
    #[inline]
    pub fn mean_value(&self) -> f32 {
        if self.visit_count == 0 {
            0.0
        } else {
            self.total_value / self.visit_count as f32
        }
    }

    /// `Q = (W - n_vl * L) / (N + n_vl)`, 0 when both counts are 0.
    #[inline]
    pub fn q(&self, virtual_loss: f32) -> f32 {
        let denom = self.visit_count + self.virtual_loss_count;
        if denom == 0 {
            return 0.0;
        }
        (self.total_value - self.virtual_loss_count as f32 * virtual_loss) / denom as f32
    }

    /// `U = c_puct * P * sqrt(N_parent) / (1 + N)`.
    #[inline]
    pub fn u(&self, parent_visits: u32, c_puct: f32) -> f32 {
        c_puct * self.prior * (parent_visits as f32).sqrt() / (1.0 + self.visit_count as f32)
    }

    #[inline]
    pub fn score(&self, parent_visits: u32, c_puct: f32, virtual_loss: f32) -> f32 {
        self.q(virtual_loss) + self.u(parent_visits, c_puct)
    }

    /// Selection can descend below this node.
    #[inline]
    pub fn has_children(&self) -> bool {
        self.expanded && !self.children.is_empty()
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod node_tests;
