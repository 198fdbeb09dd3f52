mod cli;
mod printer;

use std::io::{self, Write};

use anyhow::{Context, Result};
use calltree_core::{AggregateTree, Container, NodeId, SearchConfig};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cli::Cli;

/// Logs go to stderr so they never interleave with the printed tree.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let data = std::fs::read(&cli.profile)
        .with_context(|| format!("failed to read {}", cli.profile.display()))?;
    let mut tree = AggregateTree::load(&data)
        .with_context(|| format!("failed to parse {}", cli.profile.display()))?;

    for call_uid in &cli.exclude {
        tree.exclude(call_uid);
    }
    if let Some(call_uid) = &cli.focus {
        let node = find_first(&mut tree, call_uid)
            .with_context(|| format!("no call to {call_uid} in the profile"))?;
        tree.focus(node)?;
    }
    if let Some(column) = cli.sort {
        tree.sort_by_property(column.into(), cli.ascending);
    }
    expand_to_depth(&mut tree, cli.depth);

    if let Some(query) = &cli.search {
        let config = SearchConfig {
            query: query.clone(),
            case_sensitive: cli.case_sensitive,
            is_regex: cli.regex,
        };
        let count = tree.perform_search(&config, true);
        // Reveal every match, ending on the first.
        for _ in 0..count {
            tree.jump_to_next_search_result();
        }
        debug!(count, "search results revealed");
    }

    let mut out = io::BufWriter::new(io::stdout().lock());
    printer::print_tree(&tree, &mut out)?;
    out.flush()?;
    Ok(())
}

/// First node with `call_uid` in display order, populating as it goes.
fn find_first(tree: &mut AggregateTree, call_uid: &str) -> Option<NodeId> {
    let mut stack: Vec<NodeId> = tree.top_level().iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        if tree.node(id).is_some_and(|node| node.call_uid() == &call_uid) {
            return Some(id);
        }
        tree.populate(Container::Node(id));
        stack.extend(tree.children(Container::Node(id)).iter().rev());
    }
    None
}

/// Expand nodes `depth` levels below the top level.
fn expand_to_depth(tree: &mut AggregateTree, depth: usize) {
    let mut stack: Vec<(NodeId, usize)> = tree.top_level().iter().map(|&id| (id, 0)).collect();
    while let Some((id, level)) = stack.pop() {
        if level >= depth || tree.expand(id).is_err() {
            continue;
        }
        stack.extend(tree.children(Container::Node(id)).iter().map(|&child| (child, level + 1)));
    }
}
