//! Search tree with arena allocation.
//!
//! All nodes live in one `Vec` and point at each other through [`NodeId`]s.
//! Children are owned by index from their parent; the parent link is only
//! followed upwards for bookkeeping. Discarding part of the tree means
//! rebuilding the arena from the subtree that is kept.

use std::collections::VecDeque;

use crate::game::GameState;
use crate::node::{Node, NodeId};

#[derive(Debug, Clone)]
pub struct SearchTree<G: GameState> {
    nodes: Vec<Node<G>>,
    root: NodeId,
}

impl<G: GameState> SearchTree<G> {
    /// Fresh tree holding only an unexpanded root.
    pub fn new(position: G) -> Self {
        Self {
            nodes: vec![Node::root(position)],
            root: NodeId(0),
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn root_node(&self) -> &Node<G> {
        self.get(self.root)
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> &Node<G> {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node<G> {
        &mut self.nodes[id.index()]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Root position. Always materialised.
    pub fn root_position(&self) -> Option<&G> {
        self.root_node().position.as_ref()
    }

    fn allocate(&mut self, node: Node<G>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Child of `id` with the highest `Q + U`, first child on ties.
    /// `None` if the node cannot be descended.
    pub fn select_child(&self, id: NodeId, c_puct: f32, virtual_loss: f32) -> Option<NodeId> {
        let node = self.get(id);
        if !node.has_children() {
            return None;
        }

        let mut best: Option<(NodeId, f32)> = None;
        for &child_id in &node.children {
            let score = self
                .get(child_id)
                .score(node.visit_count, c_puct, virtual_loss);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((child_id, score)),
            }
        }
        best.map(|(child_id, _)| child_id)
    }

    /// Path from the root to the leaf chosen by repeated [`Self::select_child`].
    pub fn select_path(&self, c_puct: f32, virtual_loss: f32) -> Vec<NodeId> {
        let mut path = vec![self.root];
        let mut current = self.root;
        while let Some(next) = self.select_child(current, c_puct, virtual_loss) {
            path.push(next);
            current = next;
        }
        path
    }

    /// Compute the node's position from its parent's if not done yet.
    /// Returns false only if the parent has no position either.
    pub fn materialize(&mut self, id: NodeId) -> bool {
        let node = self.get(id);
        if node.position.is_some() {
            return true;
        }
        let (Some(parent), Some(mv)) = (node.parent, node.mv) else {
            return false;
        };
        let Some(position) = self.get(parent).position.as_ref().map(|p| p.apply(mv)) else {
            return false;
        };
        self.get_mut(id).position = Some(position);
        true
    }

    /// Create one child per move. `priors` must be aligned with `moves`.
    pub fn expand(&mut self, id: NodeId, moves: &[G::Move], priors: &[f32]) {
        debug_assert_eq!(moves.len(), priors.len());
        debug_assert!(!self.get(id).expanded);

        let children: Vec<NodeId> = moves
            .iter()
            .zip(priors)
            .map(|(&mv, &prior)| self.allocate(Node::child(id, mv, prior)))
            .collect();
        let node = self.get_mut(id);
        node.children = children;
        node.expanded = true;
    }

    /// Mark a finished game. `value` is from the side to move at the node.
    pub fn mark_terminal(&mut self, id: NodeId, value: f32) {
        let node = self.get_mut(id);
        node.terminal = true;
        node.terminal_value = value;
        node.expanded = true;
        node.children.clear();
    }

    pub fn apply_virtual_loss(&mut self, path: &[NodeId]) {
        for &id in path {
            self.get_mut(id).virtual_loss_count += 1;
        }
    }

    pub fn remove_virtual_loss(&mut self, path: &[NodeId]) {
        for &id in path {
            let node = self.get_mut(id);
            node.virtual_loss_count = node.virtual_loss_count.saturating_sub(1);
        }
    }

    /// Record a leaf value along `path` (root first).
    ///
    /// `value` is from the side to move at the leaf. Each node stores values
    /// for the player who moved into it, so the leaf receives `-value` and the
    /// sign flips once per edge on the way up.
    pub fn backpropagate(&mut self, path: &[NodeId], value: f32) {
        let mut x = -value;
        for &id in path.iter().rev() {
            let node = self.get_mut(id);
            node.visit_count += 1;
            node.total_value += x;
            x = -x;
        }
    }

    /// Root children as `(move, visits)`, in enumeration order.
    pub fn root_visits(&self) -> Vec<(G::Move, u32)> {
        self.root_node()
            .children
            .iter()
            .filter_map(|&id| {
                let child = self.get(id);
                child.mv.map(|mv| (mv, child.visit_count))
            })
            .collect()
    }

    /// Most visited child, first on ties. Falls back to the highest prior
    /// when no child has been visited yet.
    pub fn best_child(&self, id: NodeId) -> Option<NodeId> {
        let node = self.get(id);
        let most_visited = node.children.iter().copied().fold(None, |best, child| {
            let visits = self.get(child).visit_count;
            match best {
                Some((_, best_visits)) if visits <= best_visits => best,
                _ => Some((child, visits)),
            }
        });
        match most_visited {
            Some((child, visits)) if visits > 0 => Some(child),
            _ => self.highest_prior_child(id),
        }
    }

    fn highest_prior_child(&self, id: NodeId) -> Option<NodeId> {
        let mut best: Option<(NodeId, f32)> = None;
        for &child in &self.get(id).children {
            let prior = self.get(child).prior;
            match best {
                Some((_, best_prior)) if prior <= best_prior => {}
                _ => best = Some((child, prior)),
            }
        }
        best.map(|(child, _)| child)
    }

    /// Most visited line from the root.
    pub fn principal_variation(&self) -> Vec<G::Move> {
        let mut line = Vec::new();
        let mut current = self.root;
        loop {
            let node = self.get(current);
            let next = node
                .children
                .iter()
                .copied()
                .filter(|&child| self.get(child).visit_count > 0)
                .fold(None, |best: Option<NodeId>, child| match best {
                    Some(b) if self.get(child).visit_count <= self.get(b).visit_count => Some(b),
                    _ => Some(child),
                });
            let Some(next) = next else {
                break;
            };
            let Some(mv) = self.get(next).mv else {
                break;
            };
            line.push(mv);
            current = next;
        }
        line
    }

    /// Priors of the root children as produced by the policy.
    pub fn root_base_priors(&self) -> Vec<f32> {
        self.root_node()
            .children
            .iter()
            .map(|&id| self.get(id).base_prior)
            .collect()
    }

    /// Overwrite the selection priors of the root children.
    pub fn set_root_priors(&mut self, priors: &[f32]) {
        let children = self.root_node().children.clone();
        for (id, &prior) in children.into_iter().zip(priors) {
            self.get_mut(id).prior = prior;
        }
    }

    /// Breadth-first search for a node whose position has `fingerprint`,
    /// at most `max_depth` plies below the root.
    ///
    /// Unmaterialised children are checked by applying their move to the
    /// parent position on the fly.
    pub fn find(&self, fingerprint: u64, max_depth: usize) -> Option<NodeId> {
        let mut queue = VecDeque::from([(self.root, 0usize)]);
        while let Some((id, depth)) = queue.pop_front() {
            if self.fingerprint_of(id) == Some(fingerprint) {
                return Some(id);
            }
            if depth < max_depth {
                for &child in &self.get(id).children {
                    queue.push_back((child, depth + 1));
                }
            }
        }
        None
    }

    fn fingerprint_of(&self, id: NodeId) -> Option<u64> {
        let node = self.get(id);
        if let Some(position) = &node.position {
            return Some(position.fingerprint());
        }
        let parent = self.get(node.parent?).position.as_ref()?;
        Some(parent.apply(node.mv?).fingerprint())
    }

    /// Make `id` the root, discarding everything outside its subtree.
    ///
    /// The kept nodes are compacted into a new arena in breadth-first order,
    /// with their statistics untouched. The new root keeps its children but
    /// loses its move, its parent and any terminal mark.
    pub fn promote(&mut self, id: NodeId) {
        if id == self.root {
            return;
        }
        self.materialize(id);

        let mut order = vec![id];
        let mut i = 0;
        while i < order.len() {
            order.extend(self.get(order[i]).children.iter().copied());
            i += 1;
        }

        let mut remap = vec![None; self.nodes.len()];
        for (new_index, old) in order.iter().enumerate() {
            remap[old.index()] = Some(NodeId(new_index as u32));
        }

        let mut old_nodes: Vec<Option<Node<G>>> =
            std::mem::take(&mut self.nodes).into_iter().map(Some).collect();
        let mut nodes = Vec::with_capacity(order.len());
        for old in order {
            let Some(mut node) = old_nodes[old.index()].take() else {
                continue;
            };
            node.parent = node.parent.and_then(|p| remap[p.index()]);
            node.children = node
                .children
                .iter()
                .filter_map(|c| remap[c.index()])
                .collect();
            nodes.push(node);
        }

        self.nodes = nodes;
        self.root = NodeId(0);

        let root = self.get_mut(NodeId(0));
        root.mv = None;
        root.parent = None;
        root.prior = 1.0;
        root.base_prior = 1.0;
        if root.terminal {
            root.terminal = false;
            root.terminal_value = 0.0;
            root.expanded = false;
        }
    }

    /// Replace the root position (e.g. with the caller's copy, which carries
    /// the real game history).
    pub fn set_root_position(&mut self, position: G) {
        let root = self.root;
        self.get_mut(root).position = Some(position);
    }

    /// Deepest ply reached below the root.
    pub fn max_depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            max = max.max(depth);
            for &child in &self.get(id).children {
                stack.push((child, depth + 1));
            }
        }
        max
    }
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tree_tests;
