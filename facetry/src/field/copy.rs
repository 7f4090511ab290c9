//! Copy fan-out graph
//!
//! Built once from the declared fields: every `copy_to` on a source and every
//! `copy_from` on a destination becomes an edge source -> destination.
//! Endpoints with no declaration of their own get a pass-through plan.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::schema::FieldDefinition;
use crate::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct CopyGraph {
    edges: BTreeMap<String, Vec<String>>,
}

impl CopyGraph {
    pub(crate) fn build(definitions: &[FieldDefinition]) -> Result<Self> {
        let mut graph = CopyGraph::default();
        for definition in definitions {
            for destination in &definition.copy_to {
                graph.add_edge(&definition.name, destination);
            }
            for source in &definition.copy_from {
                graph.add_edge(source, &definition.name);
            }
        }
        if let Some(cycle) = graph.find_cycle() {
            return Err(Error::Schema(format!(
                "Copy cycle detected: {}",
                cycle.join(" -> ")
            )));
        }
        Ok(graph)
    }

    fn add_edge(&mut self, source: &str, destination: &str) {
        let destinations = self.edges.entry(source.to_string()).or_default();
        if !destinations.iter().any(|d| d == destination) {
            destinations.push(destination.to_string());
        }
    }

    /// Destinations fed by `source`, in declaration order.
    pub fn destinations(&self, source: &str) -> &[String] {
        self.edges.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sources feeding `destination`.
    pub fn sources(&self, destination: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|(_, destinations)| destinations.iter().any(|d| d == destination))
            .map(|(source, _)| source.as_str())
            .collect()
    }

    /// Every field name that appears on either end of an edge.
    pub fn endpoints(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        for (source, destinations) in &self.edges {
            names.insert(source.as_str());
            names.extend(destinations.iter().map(String::as_str));
        }
        names
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            graph: &'a CopyGraph,
            node: &'a str,
            marks: &mut HashMap<&'a str, Mark>,
            stack: &mut Vec<&'a str>,
        ) -> Option<Vec<String>> {
            match marks.get(node) {
                Some(Mark::Done) => return None,
                Some(Mark::Visiting) => {
                    let start = stack.iter().position(|n| *n == node).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        stack[start..].iter().map(|n| n.to_string()).collect();
                    cycle.push(node.to_string());
                    return Some(cycle);
                }
                None => {}
            }
            marks.insert(node, Mark::Visiting);
            stack.push(node);
            for next in graph.destinations(node) {
                if let Some(cycle) = visit(graph, next, marks, stack) {
                    return Some(cycle);
                }
            }
            stack.pop();
            marks.insert(node, Mark::Done);
            None
        }

        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        for source in self.edges.keys() {
            if let Some(cycle) = visit(self, source, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }
}
