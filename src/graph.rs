//! Skill co-occurrence graph.
//!
//! Nodes are distinct skills; an edge joins two skills that appear in the
//! same record and carries the number of records in which they co-occur.
//! Node and edge indices follow first-encountered order, which is also the
//! tie-break for the ranked views.

use std::collections::HashMap;

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use serde::Serialize;
use tracing::{debug, info};

use crate::models::{Column, RecordSet, SkillDegree, SkillPair};
use crate::normalize::distinct_sorted_skills;

#[derive(Debug, Default, Clone)]
pub struct SkillGraph {
    graph: UnGraph<String, u32>,
    index: HashMap<String, NodeIndex>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSummary {
    pub node_count: usize,
    pub edge_count: usize,
    pub top_skills: Vec<SkillDegree>,
    pub top_pairs: Vec<SkillPair>,
}

impl SkillGraph {
    pub fn build(records: &RecordSet) -> Self {
        let mut skill_graph = SkillGraph::default();
        if !records.has(Column::SkillTags) {
            return skill_graph;
        }

        let mut edges: HashMap<(NodeIndex, NodeIndex), EdgeIndex> = HashMap::new();
        for record in &records.records {
            let skills: Vec<NodeIndex> = distinct_sorted_skills(&record.skill_tags)
                .into_iter()
                .map(|skill| skill_graph.node(skill))
                .collect();

            for (i, &a) in skills.iter().enumerate() {
                for &b in &skills[i + 1..] {
                    match edges.get(&(a, b)) {
                        Some(&edge) => skill_graph.graph[edge] += 1,
                        None => {
                            let edge = skill_graph.graph.add_edge(a, b, 1);
                            edges.insert((a, b), edge);
                        }
                    }
                }
            }
        }

        debug!(
            nodes = skill_graph.graph.node_count(),
            edges = skill_graph.graph.edge_count(),
            "built skill graph"
        );
        skill_graph
    }

    fn node(&mut self, skill: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(skill) {
            return idx;
        }
        let idx = self.graph.add_node(skill.to_string());
        self.index.insert(skill.to_string(), idx);
        idx
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn degree(&self, skill: &str) -> Option<usize> {
        let idx = *self.index.get(skill)?;
        Some(self.graph.neighbors(idx).count())
    }

    pub fn weight(&self, a: &str, b: &str) -> Option<u32> {
        let a = *self.index.get(a)?;
        let b = *self.index.get(b)?;
        let edge = self.graph.find_edge(a, b)?;
        Some(self.graph[edge])
    }

    /// Skills ranked by number of distinct partners, descending.
    /// Skills that never co-occur with another are not ranked.
    pub fn top_skills(&self, n: usize) -> Vec<SkillDegree> {
        let mut ranked: Vec<SkillDegree> = self
            .graph
            .node_indices()
            .map(|idx| SkillDegree {
                skill: self.graph[idx].clone(),
                degree: self.graph.neighbors(idx).count(),
            })
            .filter(|skill| skill.degree > 0)
            .collect();
        // stable sort keeps first-encountered order among ties
        ranked.sort_by(|a, b| b.degree.cmp(&a.degree));
        ranked.truncate(n);
        ranked
    }

    pub fn top_pairs(&self, n: usize) -> Vec<SkillPair> {
        let mut ranked: Vec<SkillPair> = self
            .graph
            .edge_indices()
            .filter_map(|edge| {
                let (a, b) = self.graph.edge_endpoints(edge)?;
                Some(SkillPair {
                    skill_1: self.graph[a].clone(),
                    skill_2: self.graph[b].clone(),
                    weight: self.graph[edge],
                })
            })
            .collect();
        ranked.sort_by(|a, b| b.weight.cmp(&a.weight));
        ranked.truncate(n);
        ranked
    }

    pub fn summary(&self, n: usize) -> GraphSummary {
        GraphSummary {
            node_count: self.node_count(),
            edge_count: self.edge_count(),
            top_skills: self.top_skills(n),
            top_pairs: self.top_pairs(n),
        }
    }
}

pub fn build_summary(records: &RecordSet, top_n: usize) -> GraphSummary {
    let graph = SkillGraph::build(records);
    let summary = graph.summary(top_n);
    info!(
        nodes = summary.node_count,
        edges = summary.edge_count,
        "skill graph summarized"
    );
    summary
}
