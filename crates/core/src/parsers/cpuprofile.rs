use std::collections::{HashMap, HashSet};

use calltree_protocol::ProfileNode;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CpuProfileParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing or empty nodes")]
    MissingNodes,
    #[error("no root node: every node is listed as a child")]
    MissingRoot,
    #[error("node {parent} lists unknown child {child}")]
    UnknownChild { parent: u64, child: u64 },
    #[error("node {0} is reachable through more than one parent")]
    SharedNode(u64),
}

/// V8 CPU profile node.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CpuProfileNode {
    id: u64,
    call_frame: CallFrame,
    #[serde(default)]
    children: Vec<u64>,
    #[serde(default)]
    hit_count: Option<u64>,
    #[serde(default)]
    deopt_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallFrame {
    #[serde(default)]
    function_name: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    line_number: Option<i64>,
    #[serde(default)]
    column_number: Option<i64>,
}

/// V8 CPU profile top-level structure (.cpuprofile files). Times are µs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CpuProfile {
    nodes: Vec<CpuProfileNode>,
    start_time: f64,
    end_time: f64,
    #[serde(default)]
    samples: Vec<u64>,
    #[serde(default)]
    time_deltas: Vec<f64>,
}

const IDLE_FUNCTION: &str = "(idle)";

/// Parse a V8 CPU profile (.cpuprofile) into a `ProfileNode` tree with self
/// and total times in milliseconds.
///
/// Used by: Node.js `--cpu-prof`, Chrome DevTools CPU profiler, Deno.
///
/// With `samples` and matching `timeDeltas`, each sample is charged the
/// time until the next one (the last runs to `endTime`). Otherwise the
/// profile duration is spread evenly over the nodes' `hitCount`s.
pub fn parse_cpuprofile(data: &[u8]) -> Result<ProfileNode, CpuProfileParseError> {
    let cpu_profile: CpuProfile = serde_json::from_slice(data)?;

    if cpu_profile.nodes.is_empty() {
        return Err(CpuProfileParseError::MissingNodes);
    }

    let node_map: HashMap<u64, &CpuProfileNode> =
        cpu_profile.nodes.iter().map(|n| (n.id, n)).collect();

    let mut has_parent: HashSet<u64> = HashSet::new();
    for node in &cpu_profile.nodes {
        for &child in &node.children {
            if !node_map.contains_key(&child) {
                return Err(CpuProfileParseError::UnknownChild {
                    parent: node.id,
                    child,
                });
            }
            has_parent.insert(child);
        }
    }
    let root_id = cpu_profile
        .nodes
        .iter()
        .find(|n| !has_parent.contains(&n.id))
        .map(|n| n.id)
        .ok_or(CpuProfileParseError::MissingRoot)?;

    let self_times = self_times_ms(&cpu_profile);

    // Pre-order from the root; reversed, every child comes before its parent.
    let mut order = Vec::with_capacity(cpu_profile.nodes.len());
    let mut seen = HashSet::new();
    let mut stack = vec![root_id];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            return Err(CpuProfileParseError::SharedNode(id));
        }
        order.push(id);
        if let Some(node) = node_map.get(&id) {
            stack.extend(node.children.iter().rev());
        }
    }
    if order.len() < cpu_profile.nodes.len() {
        debug!(
            unreachable = cpu_profile.nodes.len() - order.len(),
            "ignoring nodes not reachable from the root"
        );
    }

    let mut built: HashMap<u64, ProfileNode> = HashMap::with_capacity(order.len());
    for &id in order.iter().rev() {
        let Some(node) = node_map.get(&id) else {
            continue;
        };
        let mut children = Vec::with_capacity(node.children.len());
        for child in &node.children {
            let built_child = built
                .remove(child)
                .ok_or(CpuProfileParseError::UnknownChild {
                    parent: id,
                    child: *child,
                })?;
            children.push(built_child);
        }
        let self_time = self_times.get(&id).copied().unwrap_or(0.0);
        let total_time = self_time + children.iter().map(|c| c.total_time).sum::<f64>();
        built.insert(id, to_profile_node(node, self_time, total_time, children));
    }

    built
        .remove(&root_id)
        .ok_or(CpuProfileParseError::MissingRoot)
}

fn to_profile_node(
    node: &CpuProfileNode,
    self_time: f64,
    total_time: f64,
    children: Vec<ProfileNode>,
) -> ProfileNode {
    let frame = &node.call_frame;
    let url = frame.url.clone().unwrap_or_default();
    let call_uid = format!(
        "{}@{}:{}:{}",
        frame.function_name,
        url,
        frame.line_number.unwrap_or_default(),
        frame.column_number.unwrap_or_default()
    );
    ProfileNode {
        call_uid: call_uid.into(),
        function_name: frame.function_name.clone(),
        url,
        self_time,
        total_time,
        deopt_reason: node.deopt_reason.clone(),
        idle: frame.function_name == IDLE_FUNCTION,
        children,
    }
}

/// Self time per node id, in milliseconds.
fn self_times_ms(profile: &CpuProfile) -> HashMap<u64, f64> {
    let mut self_times: HashMap<u64, f64> = HashMap::new();

    if !profile.samples.is_empty() && profile.samples.len() == profile.time_deltas.len() {
        let mut timestamps = Vec::with_capacity(profile.samples.len());
        let mut now = profile.start_time;
        for delta in &profile.time_deltas {
            now += delta;
            timestamps.push(now);
        }
        for (i, &sample) in profile.samples.iter().enumerate() {
            let next = timestamps.get(i + 1).copied().unwrap_or(profile.end_time);
            let duration_us = (next - timestamps[i]).max(0.0);
            *self_times.entry(sample).or_default() += duration_us / 1000.0;
        }
        return self_times;
    }

    let mut hits: HashMap<u64, u64> = HashMap::new();
    if profile.samples.is_empty() {
        for node in &profile.nodes {
            hits.insert(node.id, node.hit_count.unwrap_or(0));
        }
    } else {
        for &sample in &profile.samples {
            *hits.entry(sample).or_default() += 1;
        }
    }
    let total_hits: u64 = hits.values().sum();
    if total_hits == 0 {
        return self_times;
    }
    let interval_ms = (profile.end_time - profile.start_time).max(0.0) / 1000.0 / total_hits as f64;
    for (id, count) in hits {
        self_times.insert(id, count as f64 * interval_ms);
    }
    self_times
}
