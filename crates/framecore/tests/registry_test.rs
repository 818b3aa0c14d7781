// crates/framecore/tests/registry_test.rs

use framecore::{NodeRegistry, TreeError, TreeNode};

fn registry_with(ids: &[usize]) -> NodeRegistry<&'static str> {
    let mut registry = NodeRegistry::new();
    for id in ids {
        registry.create("node", Some(*id)).unwrap();
    }
    registry
}

#[test]
fn test_duplicate_explicit_id_is_rejected() {
    let mut registry = NodeRegistry::new();
    registry.register(TreeNode::new("first"), Some(5)).unwrap();
    let before = registry.ids().to_vec();

    let err = registry.register(TreeNode::new("second"), Some(5)).unwrap_err();

    assert_eq!(err, TreeError::DuplicateId(5));
    assert_eq!(registry.ids(), before.as_slice());
    assert_eq!(*registry.find_by_id(5).unwrap().payload(), "first");
}

#[test]
fn test_find_by_id_errors() {
    let mut registry = NodeRegistry::new();
    assert_eq!(registry.find_by_id(0).unwrap_err(), TreeError::EmptyRegistry);

    registry.create("a", None).unwrap();
    assert_eq!(registry.find_by_id(3).unwrap_err(), TreeError::UnknownId(3));
    assert_eq!(registry.find_by_id(0).unwrap().node_id(), 0);
}

#[test]
fn test_delete_unknown_id() {
    let mut registry = registry_with(&[0]);
    assert_eq!(registry.delete(9, true).unwrap_err(), TreeError::UnknownId(9));
}

#[test]
fn test_non_recursive_delete_keeps_registry_and_structure() {
    let mut registry = registry_with(&[0, 1, 2]);
    registry.add_child(0, 1).unwrap();
    registry.add_child(0, 2).unwrap();

    let err = registry.delete(0, false).unwrap_err();

    assert!(matches!(err, TreeError::Structural(_)));
    assert_eq!(registry.ids(), &[0, 1, 2]);
    assert_eq!(registry.find_by_id(0).unwrap().children(), &[1, 2]);
    assert_eq!(registry.find_by_id(1).unwrap().parent(), Some(0));
}

#[test]
fn test_recursive_delete_removes_exact_subtree() {
    // root -> A -> {B, C}
    let mut registry = registry_with(&[0, 1, 2, 3]);
    registry.add_child(0, 1).unwrap();
    registry.add_child(1, 2).unwrap();
    registry.add_child(1, 3).unwrap();

    let removed = registry.delete(1, true).unwrap();

    assert_eq!(removed, vec![1, 2, 3]);
    assert_eq!(registry.ids(), &[0]);
    assert!(registry.is_leaf(0).unwrap());
    assert!(registry.get(2).is_none());
}

#[test]
fn test_delete_node_detaches_but_keeps_ids() {
    let mut registry = registry_with(&[0, 1, 2]);
    registry.add_child(0, 1).unwrap();
    registry.add_child(1, 2).unwrap();

    registry.delete_node(1, true).unwrap();

    assert!(registry.is_leaf(0).unwrap());
    assert_eq!(registry.find_by_id(1).unwrap().parent(), None);
    assert_eq!(registry.find_by_id(2).unwrap().parent(), None);
    assert_eq!(registry.len(), 3);
}

#[test]
fn test_remove_child_reference_on_missing_edge() {
    let mut registry = registry_with(&[0, 1]);
    let err = registry.remove_child_reference(0, 1).unwrap_err();
    assert_eq!(err, TreeError::NotAChild { parent: 0, child: 1 });
}
