use petgraph::{
    algo::toposort,
    graph::{DiGraph, NodeIndex},
    visit::{Dfs, Reversed},
};
use std::collections::{HashMap, HashSet};

use crate::error::{PipelineError, Result};
use crate::pipeline::Stage;

/// Dependency graph over every [`Stage`]; edges point from a dependency to
/// the stage that reads it.
pub struct StageGraph {
    graph: DiGraph<Stage, ()>,
    nodes: HashMap<Stage, NodeIndex>,
}

impl StageGraph {
    pub fn new() -> Self {
        let mut graph = DiGraph::new();
        let nodes: HashMap<Stage, NodeIndex> = Stage::ALL
            .into_iter()
            .map(|stage| (stage, graph.add_node(stage)))
            .collect();

        for stage in Stage::ALL {
            for dep in stage.requires() {
                graph.add_edge(nodes[dep], nodes[&stage], ());
            }
        }
        Self { graph, nodes }
    }

    /// `target` and everything it transitively requires, dependencies first.
    pub fn plan(&self, target: Stage) -> Result<Vec<Stage>> {
        let start = self.nodes[&target];
        let reversed = Reversed(&self.graph);
        let mut needed = HashSet::new();
        let mut dfs = Dfs::new(reversed, start);
        while let Some(node) = dfs.next(reversed) {
            needed.insert(node);
        }

        let order = toposort(&self.graph, None)
            .map_err(|cycle| PipelineError::CyclicGraph(self.graph[cycle.node_id()]))?;

        Ok(order
            .into_iter()
            .filter(|node| needed.contains(node))
            .map(|node| self.graph[node])
            .collect())
    }
}

impl Default for StageGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(plan: &[Stage], stage: Stage) -> usize {
        plan.iter().position(|s| *s == stage).unwrap()
    }

    #[test]
    fn full_plan_respects_dependencies() {
        let plan = StageGraph::new().plan(Stage::Orchestrate).unwrap();
        assert_eq!(plan.len(), Stage::ALL.len());
        for stage in Stage::ALL {
            for dep in stage.requires() {
                assert!(
                    position(&plan, *dep) < position(&plan, stage),
                    "{dep} must precede {stage} in {plan:?}"
                );
            }
        }
        assert_eq!(plan.first(), Some(&Stage::Fetch));
        assert_eq!(plan.last(), Some(&Stage::Orchestrate));
    }

    #[test]
    fn partial_plan_only_includes_ancestors() {
        let plan = StageGraph::new().plan(Stage::CountsByType).unwrap();
        assert_eq!(plan, vec![Stage::Fetch, Stage::Normalize, Stage::CountsByType]);
    }
}
