//! Property-based tests over randomly shaped call trees.
//!
//! Times are whole milliseconds so sums compare exactly.

use calltree_core::{AggregateTree, Container, NodeId, ProfileNode, SortProperty};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Shape {
    uid: String,
    self_time: u32,
    children: Vec<Shape>,
}

fn shape() -> impl Strategy<Value = Shape> {
    let leaf = ("[a-e]", 0u32..50).prop_map(|(uid, self_time)| Shape {
        uid,
        self_time,
        children: Vec::new(),
    });
    leaf.prop_recursive(4, 48, 4, |inner| {
        ("[a-e]", 0u32..50, prop::collection::vec(inner, 0..4)).prop_map(
            |(uid, self_time, children)| Shape {
                uid,
                self_time,
                children,
            },
        )
    })
}

fn to_profile(shape: &Shape) -> ProfileNode {
    let children: Vec<ProfileNode> = shape.children.iter().map(to_profile).collect();
    let total = f64::from(shape.self_time) + children.iter().map(|c| c.total_time).sum::<f64>();
    ProfileNode::new(shape.uid.as_str(), shape.uid.as_str(), f64::from(shape.self_time), total)
        .with_children(children)
}

fn build(top_level: &[Shape]) -> AggregateTree {
    let children: Vec<ProfileNode> = top_level.iter().map(to_profile).collect();
    let total = children.iter().map(|c| c.total_time).sum();
    AggregateTree::new(ProfileNode::new("(root)", "(root)", 0.0, total).with_children(children))
}

/// Populate everything and return nodes in display pre-order.
fn populate_all(tree: &mut AggregateTree) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut stack: Vec<NodeId> = tree.top_level().iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        tree.populate(Container::Node(id));
        order.push(id);
        stack.extend(tree.children(Container::Node(id)).iter().rev());
    }
    order
}

/// (depth, call uid, self, total) for every attached node, in pre-order.
fn outline(tree: &AggregateTree) -> Vec<(usize, String, f64, f64)> {
    let mut rows = Vec::new();
    let mut stack: Vec<(NodeId, usize)> = tree.top_level().iter().rev().map(|&id| (id, 0)).collect();
    while let Some((id, depth)) = stack.pop() {
        let Some(node) = tree.node(id) else { continue };
        rows.push((depth, node.call_uid().to_string(), node.self_time(), node.total_time()));
        stack.extend(
            tree.children(Container::Node(id))
                .iter()
                .rev()
                .map(|&child| (child, depth + 1)),
        );
    }
    rows
}

/// Attached nodes in display pre-order, without populating anything.
fn attached(tree: &AggregateTree) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut stack: Vec<NodeId> = tree.top_level().iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        order.push(id);
        stack.extend(tree.children(Container::Node(id)).iter().rev());
    }
    order
}

fn attached_self_sum(tree: &AggregateTree) -> f64 {
    attached(tree)
        .iter()
        .filter_map(|&id| tree.node(id))
        .map(|n| n.self_time())
        .sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_self_times_add_up(top_level in prop::collection::vec(shape(), 0..5)) {
        let mut tree = build(&top_level);
        let order = populate_all(&mut tree);

        let self_sum: f64 = order.iter().filter_map(|&id| tree.node(id)).map(|n| n.self_time()).sum();
        prop_assert_eq!(self_sum, tree.total_time());

        for &id in &order {
            let node = tree.node(id).expect("attached node");
            let children_total: f64 = tree
                .children(Container::Node(id))
                .iter()
                .filter_map(|&child| tree.node(child))
                .map(|child| child.total_time())
                .sum();
            prop_assert_eq!(node.total_time(), node.self_time() + children_total);
        }
    }

    #[test]
    fn prop_siblings_have_unique_call_uids(top_level in prop::collection::vec(shape(), 0..5)) {
        let mut tree = build(&top_level);
        let mut containers = vec![Container::Root];
        containers.extend(populate_all(&mut tree).into_iter().map(Container::Node));
        for container in containers {
            let children = tree.children(container);
            for &child in children {
                let uid = tree.node(child).expect("child").call_uid().clone();
                prop_assert_eq!(tree.find_child_by_call_uid(container, &uid), Some(child));
            }
            let mut uids: Vec<String> = children
                .iter()
                .filter_map(|&id| tree.node(id))
                .map(|n| n.call_uid().to_string())
                .collect();
            let before = uids.len();
            uids.sort();
            uids.dedup();
            prop_assert_eq!(uids.len(), before);
        }
    }

    #[test]
    fn prop_save_then_restore_is_identity(top_level in prop::collection::vec(shape(), 0..5)) {
        let mut tree = build(&top_level);
        let order = populate_all(&mut tree);
        let before = outline(&tree);

        tree.save(Container::Root);
        for &id in &order {
            tree.save(Container::Node(id));
        }
        tree.restore(Container::Root);

        prop_assert_eq!(outline(&tree), before);
        prop_assert!(order.iter().filter_map(|&id| tree.node(id)).all(|n| !n.has_snapshot()));
    }

    #[test]
    fn prop_exclude_then_restore_is_identity(
        top_level in prop::collection::vec(shape(), 1..5),
        excluded in "[a-e]",
    ) {
        let mut tree = build(&top_level);
        populate_all(&mut tree);
        let before = outline(&tree);
        let total = tree.total_time();

        tree.exclude(&excluded);
        prop_assert!(outline(&tree).iter().all(|(_, uid, _, _)| *uid != excluded));
        tree.restore(Container::Root);

        prop_assert_eq!(outline(&tree), before);
        prop_assert_eq!(tree.total_time(), total);
    }

    #[test]
    fn prop_focus_then_restore_is_identity(
        top_level in prop::collection::vec(shape(), 1..5),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut tree = build(&top_level);
        let order = populate_all(&mut tree);
        let before = outline(&tree);
        let target = order[pick.index(order.len())];

        prop_assert_eq!(tree.focus(target), Ok(()));
        prop_assert_eq!(tree.top_level(), &[target]);
        tree.restore(Container::Root);

        prop_assert_eq!(outline(&tree), before);
    }

    #[test]
    fn prop_exclude_under_focus_then_restore_is_identity(
        top_level in prop::collection::vec(shape(), 1..5),
        pick in any::<prop::sample::Index>(),
        excluded in "[a-e]",
    ) {
        let mut tree = build(&top_level);
        let order = populate_all(&mut tree);
        let before = outline(&tree);
        let total = tree.total_time();
        let target = order[pick.index(order.len())];

        prop_assert_eq!(tree.focus(target), Ok(()));
        tree.exclude(&excluded);
        tree.restore(Container::Root);

        prop_assert_eq!(outline(&tree), before);
        prop_assert_eq!(tree.total_time(), total);
        prop_assert!(order.iter().filter_map(|&id| tree.node(id)).all(|n| !n.has_snapshot()));
    }

    #[test]
    fn prop_accumulating_merges_conserve_self_time(
        top_level in prop::collection::vec(shape(), 1..5),
        idle in 0u32..20,
        steps in prop::collection::vec(
            (any::<prop::sample::Index>(), any::<prop::sample::Index>()),
            1..8,
        ),
    ) {
        let mut children: Vec<ProfileNode> = top_level.iter().map(to_profile).collect();
        children.push(ProfileNode::new("(idle)", "(idle)", f64::from(idle), f64::from(idle)).into_idle());
        let root_total: f64 = children.iter().map(|c| c.total_time).sum();
        let mut tree = AggregateTree::new(
            ProfileNode::new("(root)", "(root)", 0.0, root_total).with_children(children),
        );
        populate_all(&mut tree);
        prop_assert_eq!(tree.total_time() + f64::from(idle), root_total);
        prop_assert_eq!(attached_self_sum(&tree), root_total);

        for (pick, into) in steps {
            let nodes = attached(&tree);
            let node = nodes[pick.index(nodes.len())];
            let parent = tree.node(node).and_then(|n| n.parent()).expect("attached node has a parent");
            prop_assert_eq!(tree.remove_child(parent, node), Ok(()));

            let targets = attached(&tree);
            if targets.is_empty() {
                prop_assert_eq!(tree.append_child(parent, node), Ok(()));
                continue;
            }
            let target = targets[into.index(targets.len())];
            prop_assert_eq!(tree.merge(target.into(), node, false), Ok(()));

            prop_assert_eq!(attached_self_sum(&tree), root_total);
            prop_assert_eq!(tree.total_time() + f64::from(idle), root_total);
        }
    }

    #[test]
    fn prop_find_after_insert(
        top_level in prop::collection::vec(shape(), 1..5),
        pick in any::<prop::sample::Index>(),
        index in 0usize..8,
    ) {
        let mut tree = build(&top_level);
        let node = tree.top_level()[pick.index(tree.top_level().len())];
        let uid = tree.node(node).expect("top-level node").call_uid().clone();

        prop_assert_eq!(tree.remove_child(Container::Root, node), Ok(()));
        prop_assert_eq!(tree.find_child_by_call_uid(Container::Root, &uid), None);

        let len = tree.top_level().len();
        prop_assert_eq!(tree.insert_child(Container::Root, node, index), Ok(()));
        prop_assert_eq!(tree.find_child(Container::Root, Some(node)), Some(node));
        prop_assert_eq!(tree.top_level().iter().position(|&id| id == node), Some(index.min(len)));
    }

    #[test]
    fn prop_sort_is_idempotent_and_ordered(
        top_level in prop::collection::vec(shape(), 0..5),
        ascending in any::<bool>(),
    ) {
        let mut tree = build(&top_level);
        for id in populate_all(&mut tree) {
            tree.expand(id).expect("known node");
        }
        let comparator = tree.property_comparator(SortProperty::TotalTime, ascending);
        tree.sort(Container::Root, comparator, true);
        let once = outline(&tree);
        tree.sort(Container::Root, comparator, true);
        prop_assert_eq!(outline(&tree), once);

        let mut containers = vec![Container::Root];
        containers.extend(populate_all(&mut tree).into_iter().map(Container::Node));
        for container in containers {
            let totals: Vec<f64> = tree
                .children(container)
                .iter()
                .filter_map(|&id| tree.node(id))
                .map(|n| n.total_time())
                .collect();
            let ordered = totals.windows(2).all(|pair| {
                if ascending { pair[0] <= pair[1] } else { pair[0] >= pair[1] }
            });
            prop_assert!(ordered, "{:?} not sorted", totals);
        }
    }
}
