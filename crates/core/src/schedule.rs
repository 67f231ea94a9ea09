use crate::models::DependencyGraph;
use std::collections::VecDeque;

const SLACK_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct ActivityTiming {
    pub name: String,
    pub earliest_start: f64,
    pub earliest_finish: f64,
    pub latest_start: f64,
    pub latest_finish: f64,
    pub slack: f64,
}

impl ActivityTiming {
    pub fn is_critical(&self) -> bool {
        self.slack.abs() < SLACK_EPSILON
    }
}

#[derive(Debug, Clone, Default)]
pub struct Schedule {
    pub has_cycles: bool,
    pub total_duration: f64,
    pub critical_path: Vec<String>,
    pub timings: Vec<ActivityTiming>,
}

impl Schedule {
    pub fn timing_for(&self, name: &str) -> Option<&ActivityTiming> {
        self.timings.iter().find(|timing| timing.name == name)
    }
}

/// Classic forward/backward critical-path pass over the activity graph.
/// A cycle degrades the result (`has_cycles`, empty path) instead of
/// failing the document.
pub fn compute_schedule(graph: &DependencyGraph) -> Schedule {
    let node_count = graph.nodes.len();
    if node_count == 0 {
        return Schedule::default();
    }

    let mut successors = vec![Vec::new(); node_count];
    let mut predecessors = vec![Vec::new(); node_count];
    for edge in &graph.edges {
        if edge.from >= node_count || edge.to >= node_count {
            continue;
        }
        successors[edge.from].push(edge.to);
        predecessors[edge.to].push(edge.from);
    }

    let order = match topological_order(node_count, &successors, &predecessors) {
        Some(order) => order,
        None => {
            return Schedule {
                has_cycles: true,
                ..Schedule::default()
            }
        }
    };

    let durations: Vec<f64> = graph
        .nodes
        .iter()
        .map(|node| node.duration_days.max(0.0))
        .collect();

    let mut earliest_start = vec![0.0f64; node_count];
    let mut earliest_finish = vec![0.0f64; node_count];
    for &node in &order {
        earliest_start[node] = predecessors[node]
            .iter()
            .map(|&pred| earliest_finish[pred])
            .fold(0.0, f64::max);
        earliest_finish[node] = earliest_start[node] + durations[node];
    }

    let total_duration = earliest_finish.iter().copied().fold(0.0, f64::max);

    let mut latest_finish = vec![total_duration; node_count];
    let mut latest_start = vec![0.0f64; node_count];
    for &node in order.iter().rev() {
        if !successors[node].is_empty() {
            latest_finish[node] = successors[node]
                .iter()
                .map(|&succ| latest_start[succ])
                .fold(f64::INFINITY, f64::min);
        }
        latest_start[node] = latest_finish[node] - durations[node];
    }

    let timings: Vec<ActivityTiming> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(index, node)| ActivityTiming {
            name: node.name.clone(),
            earliest_start: earliest_start[index],
            earliest_finish: earliest_finish[index],
            latest_start: latest_start[index],
            latest_finish: latest_finish[index],
            slack: latest_start[index] - earliest_start[index],
        })
        .collect();

    let critical_path = trace_critical_path(graph, &timings, &successors);

    Schedule {
        has_cycles: false,
        total_duration,
        critical_path,
        timings,
    }
}

fn topological_order(
    node_count: usize,
    successors: &[Vec<usize>],
    predecessors: &[Vec<usize>],
) -> Option<Vec<usize>> {
    let mut in_degree: Vec<usize> = predecessors.iter().map(|preds| preds.len()).collect();
    let mut ready: VecDeque<usize> = (0..node_count)
        .filter(|&node| in_degree[node] == 0)
        .collect();

    let mut order = Vec::with_capacity(node_count);
    while let Some(node) = ready.pop_front() {
        order.push(node);
        for &succ in &successors[node] {
            in_degree[succ] -= 1;
            if in_degree[succ] == 0 {
                ready.push_back(succ);
            }
        }
    }

    (order.len() == node_count).then_some(order)
}

// The critical path is the edge-connected chain of zero-slack nodes,
// walked from the earliest zero-slack start.
fn trace_critical_path(
    graph: &DependencyGraph,
    timings: &[ActivityTiming],
    successors: &[Vec<usize>],
) -> Vec<String> {
    let mut current = timings
        .iter()
        .enumerate()
        .filter(|(_, timing)| timing.is_critical() && timing.earliest_start.abs() < SLACK_EPSILON)
        .map(|(index, _)| index)
        .next();

    let mut path = Vec::new();
    while let Some(node) = current {
        path.push(graph.nodes[node].name.clone());
        current = successors[node]
            .iter()
            .copied()
            .find(|&succ| {
                timings[succ].is_critical()
                    && (timings[succ].earliest_start - timings[node].earliest_finish).abs()
                        < SLACK_EPSILON
            });
    }

    path
}

#[cfg(test)]
mod tests {
    use super::compute_schedule;
    use crate::models::{DependencyGraph, GraphEdge, GraphNode};

    fn node(name: &str, duration_days: f64) -> GraphNode {
        GraphNode {
            name: name.to_string(),
            duration_days,
        }
    }

    #[test]
    fn longest_chain_is_the_critical_path() {
        // A -> B -> C and A -> D -> C with durations 1, 2, 3 and 1, 4, 3.
        let graph = DependencyGraph {
            nodes: vec![node("A", 1.0), node("B", 2.0), node("C", 3.0), node("D", 4.0)],
            edges: vec![
                GraphEdge { from: 0, to: 1 },
                GraphEdge { from: 1, to: 2 },
                GraphEdge { from: 0, to: 3 },
                GraphEdge { from: 3, to: 2 },
            ],
        };

        let schedule = compute_schedule(&graph);
        assert!(!schedule.has_cycles);
        assert_eq!(schedule.critical_path, ["A", "D", "C"]);
        assert!((schedule.total_duration - 8.0).abs() < 1e-9);

        let slack_b = schedule.timing_for("B").expect("B timing").slack;
        assert!((slack_b - 2.0).abs() < 1e-9);
    }

    #[test]
    fn cycles_degrade_instead_of_failing() {
        let graph = DependencyGraph {
            nodes: vec![node("A", 1.0), node("B", 2.0)],
            edges: vec![GraphEdge { from: 0, to: 1 }, GraphEdge { from: 1, to: 0 }],
        };

        let schedule = compute_schedule(&graph);
        assert!(schedule.has_cycles);
        assert!(schedule.critical_path.is_empty());
        assert!(schedule.timings.is_empty());
    }

    #[test]
    fn empty_graph_produces_an_empty_schedule() {
        let schedule = compute_schedule(&DependencyGraph::default());
        assert!(!schedule.has_cycles);
        assert!(schedule.critical_path.is_empty());
    }

    #[test]
    fn independent_activities_all_have_zero_start() {
        let graph = DependencyGraph {
            nodes: vec![node("A", 2.0), node("B", 5.0)],
            edges: Vec::new(),
        };

        let schedule = compute_schedule(&graph);
        assert!((schedule.total_duration - 5.0).abs() < 1e-9);
        let timing_a = schedule.timing_for("A").expect("A timing");
        assert!((timing_a.earliest_start).abs() < 1e-9);
        // The shorter independent task can slip without moving the finish.
        assert!((timing_a.slack - 3.0).abs() < 1e-9);
    }
}
