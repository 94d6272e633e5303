use super::*;
use crate::testing::ToyState;

const C_PUCT: f32 = 1.5;
const VL: f32 = 1.0;

fn expanded_tree(values: &[f32], priors: &[f32]) -> SearchTree<ToyState> {
    let mut tree = SearchTree::new(ToyState::new(values));
    let moves: Vec<u8> = (0..values.len() as u8).collect();
    tree.expand(tree.root(), &moves, priors);
    tree
}

#[test]
fn test_new_tree() {
    let tree = SearchTree::new(ToyState::new(&[0.1]));
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.root(), NodeId(0));
    assert!(tree.root_position().is_some());
    assert!(!tree.root_node().expanded);
}

#[test]
fn test_expand_creates_children_in_order() {
    let tree = expanded_tree(&[0.1, 0.2, 0.3], &[0.2, 0.5, 0.3]);
    let root = tree.root_node();
    assert!(root.expanded);
    assert_eq!(root.children.len(), 3);

    for (i, &id) in root.children.iter().enumerate() {
        let child = tree.get(id);
        assert_eq!(child.mv, Some(i as u8));
        assert_eq!(child.parent, Some(tree.root()));
        assert!(child.position.is_none());
    }
    let sum: f32 = tree.root_base_priors().iter().sum();
    assert!((sum - 1.0).abs() < 1e-6);
}

#[test]
fn test_select_child_prefers_prior_when_unvisited() {
    let mut tree = expanded_tree(&[0.0, 0.0], &[0.3, 0.7]);
    let root = tree.root();
    tree.get_mut(root).visit_count = 1;
    let best = tree.select_child(root, C_PUCT, VL).unwrap();
    assert_eq!(tree.get(best).mv, Some(1));
}

#[test]
fn test_select_child_ties_keep_first() {
    let tree = expanded_tree(&[0.0, 0.0, 0.0], &[1.0 / 3.0; 3]);
    let best = tree.select_child(tree.root(), C_PUCT, VL).unwrap();
    assert_eq!(best, tree.root_node().children[0]);
}

#[test]
fn test_select_child_on_leaf_is_none() {
    let tree = SearchTree::new(ToyState::new(&[0.1, 0.2]));
    assert!(tree.select_child(tree.root(), C_PUCT, VL).is_none());
    assert_eq!(tree.select_path(C_PUCT, VL), vec![tree.root()]);
}

#[test]
fn test_virtual_loss_steers_selection() {
    let mut tree = expanded_tree(&[0.0, 0.0], &[0.5, 0.5]);
    let root = tree.root();
    tree.get_mut(root).visit_count = 4;

    let first = tree.select_path(C_PUCT, VL);
    tree.apply_virtual_loss(&first);
    let second = tree.select_path(C_PUCT, VL);
    assert_ne!(first.last(), second.last());

    tree.remove_virtual_loss(&first);
    assert!(tree.get(root).virtual_loss_count == 0);
    assert!(first.iter().all(|&id| tree.get(id).virtual_loss_count == 0));
}

#[test]
fn test_materialize_child_position() {
    let mut tree = expanded_tree(&[0.1, 0.2], &[0.5, 0.5]);
    let child = tree.root_node().children[1];
    assert!(tree.materialize(child));
    let position = tree.get(child).position.as_ref().unwrap();
    assert_eq!(position.path, vec![1]);
}

#[test]
fn test_backpropagate_alternates_sign() {
    let mut tree = expanded_tree(&[0.0], &[1.0]);
    let child = tree.root_node().children[0];
    tree.materialize(child);
    tree.expand(child, &[0], &[1.0]);
    let grandchild = tree.get(child).children[0];

    let path = vec![tree.root(), child, grandchild];
    tree.backpropagate(&path, 0.6);

    assert_eq!(tree.get(grandchild).visit_count, 1);
    assert_eq!(tree.get(child).visit_count, 1);
    assert_eq!(tree.root_node().visit_count, 1);

    assert!((tree.get(grandchild).total_value + 0.6).abs() < 1e-6);
    assert!((tree.get(child).total_value - 0.6).abs() < 1e-6);
    assert!((tree.root_node().total_value + 0.6).abs() < 1e-6);
}

#[test]
fn test_mark_terminal() {
    let mut tree = expanded_tree(&[0.0], &[1.0]);
    let child = tree.root_node().children[0];
    tree.mark_terminal(child, -1.0);
    let node = tree.get(child);
    assert!(node.terminal);
    assert!(node.expanded);
    assert!(node.children.is_empty());
    assert!(!node.has_children());
}

#[test]
fn test_best_child_and_principal_variation() {
    let mut tree = expanded_tree(&[0.0, 0.0], &[0.9, 0.1]);
    let children = tree.root_node().children.clone();

    // Nothing visited: highest prior.
    assert_eq!(tree.best_child(tree.root()), Some(children[0]));

    tree.get_mut(children[0]).visit_count = 3;
    tree.get_mut(children[1]).visit_count = 8;
    assert_eq!(tree.best_child(tree.root()), Some(children[1]));
    assert_eq!(tree.principal_variation(), vec![1]);
    assert_eq!(tree.root_visits(), vec![(0, 3), (1, 8)]);
}

#[test]
fn test_find_by_fingerprint() {
    let mut tree = expanded_tree(&[0.1, 0.2], &[0.5, 0.5]);
    let child = tree.root_node().children[1];
    tree.materialize(child);
    tree.expand(child, &[0], &[1.0]);
    let grandchild = tree.get(child).children[0];

    let root_position = tree.root_position().unwrap().clone();
    let target = root_position.apply(1).apply(0);

    assert_eq!(tree.find(root_position.fingerprint(), 2), Some(tree.root()));
    assert_eq!(tree.find(target.fingerprint(), 2), Some(grandchild));
    assert_eq!(tree.find(target.fingerprint(), 1), None);
}

#[test]
fn test_promote_keeps_subtree_statistics() {
    let mut tree = expanded_tree(&[0.1, 0.2], &[0.5, 0.5]);
    let child = tree.root_node().children[0];
    let sibling = tree.root_node().children[1];
    tree.materialize(child);
    tree.expand(child, &[0], &[1.0]);
    let grandchild = tree.get(child).children[0];
    tree.get_mut(child).visit_count = 5;
    tree.get_mut(child).total_value = 2.0;
    tree.get_mut(grandchild).visit_count = 4;
    tree.get_mut(sibling).visit_count = 9;

    tree.promote(child);

    assert_eq!(tree.len(), 2);
    let root = tree.root_node();
    assert_eq!(root.visit_count, 5);
    assert!((root.total_value - 2.0).abs() < 1e-6);
    assert!(root.mv.is_none());
    assert!(root.parent.is_none());
    assert_eq!(root.children, vec![NodeId(1)]);
    assert_eq!(tree.get(NodeId(1)).parent, Some(NodeId(0)));
    assert_eq!(tree.get(NodeId(1)).visit_count, 4);
    assert_eq!(tree.max_depth(), 1);
}

#[test]
fn test_promote_unmaterialised_child() {
    let mut tree = expanded_tree(&[0.1, 0.2], &[0.5, 0.5]);
    let child = tree.root_node().children[1];
    tree.promote(child);
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.root_position().unwrap().path, vec![1]);
}

#[test]
fn test_promoted_root_is_not_terminal() {
    let mut tree = expanded_tree(&[0.1, 0.2], &[0.5, 0.5]);
    let child = tree.root_node().children[0];
    tree.mark_terminal(child, 0.0);
    tree.promote(child);
    let root = tree.root_node();
    assert!(!root.terminal);
    assert!(!root.expanded);
}

#[test]
fn test_root_priors_override() {
    let mut tree = expanded_tree(&[0.1, 0.2], &[0.5, 0.5]);
    tree.set_root_priors(&[0.8, 0.2]);
    let children = tree.root_node().children.clone();
    assert!((tree.get(children[0]).prior - 0.8).abs() < 1e-6);
    assert!((tree.get(children[0]).base_prior - 0.5).abs() < 1e-6);
}
