use std::io::{self, Write};

use calltree_core::{AggregateNode, AggregateTree, Container, NodeId};

const INDENT: &str = "  ";

/// Write the visible rows of `tree`: every top-level node, and the children
/// of every expanded node, in display order.
pub fn print_tree(tree: &AggregateTree, out: &mut impl Write) -> io::Result<()> {
    writeln!(
        out,
        "  {:>11} {:>7} {:>11} {:>7}  Function",
        "Self (ms)", "", "Total (ms)", ""
    )?;

    let current = tree.current_search_result();
    let mut stack: Vec<(NodeId, usize)> = tree.top_level().iter().rev().map(|&id| (id, 0)).collect();
    while let Some((id, depth)) = stack.pop() {
        let Some(node) = tree.node(id) else {
            continue;
        };
        let marker = if current == Some(id) {
            '>'
        } else if node.search_matches().any() {
            '*'
        } else {
            ' '
        };
        write_row(tree, id, node, depth, marker, out)?;
        if node.is_expanded() {
            let children = tree.children(Container::Node(id));
            stack.extend(children.iter().rev().map(|&child| (child, depth + 1)));
        }
    }
    Ok(())
}

fn write_row(
    tree: &AggregateTree,
    id: NodeId,
    node: &AggregateNode,
    depth: usize,
    marker: char,
    out: &mut impl Write,
) -> io::Result<()> {
    let toggle = match (node.has_children(), node.is_expanded()) {
        (false, _) => ' ',
        (true, true) => '-',
        (true, false) => '+',
    };
    write!(
        out,
        "{marker} {:>11.2} {:>7} {:>11.2} {:>7}  {}{toggle} {}",
        node.self_time(),
        percent(tree.display_self_percent(id)),
        node.total_time(),
        percent(tree.display_total_percent(id)),
        INDENT.repeat(depth),
        node.function_name(),
    )?;
    if !node.url().is_empty() {
        write!(out, "  {}", node.url())?;
    }
    if let Some(reason) = node.deopt_reason() {
        write!(out, "  [deopt: {reason}]")?;
    }
    writeln!(out)
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(String::new, |p| format!("{p:.2}%"))
}
