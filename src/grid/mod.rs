//! Grid model: agents, lines and topology, plus their JSON loaders.
//!
//! Grid elements are loaded from `{"agents": {...}, "lines": {...}}` and the
//! topology from `{"paths": {...}, "nodes": {...}}`. Every map is keyed by
//! name. [`validate_consistency`] cross-checks the two documents once at load
//! time; the simulation loop trusts them afterwards.

pub mod agent;
pub mod line;
pub mod state;
pub mod topology;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path as FsPath;

use serde_json::Value;

pub use agent::Agent;
pub use line::Line;
pub use state::State;
pub use topology::{Node, Path, Route};

use crate::error::{Result, SimError};

pub type Agents = BTreeMap<String, Agent>;
pub type Lines = BTreeMap<String, Line>;
pub type Paths = BTreeMap<String, Path>;
pub type Nodes = BTreeMap<String, Node>;

/// Agents and lines of one grid.
#[derive(Debug, Clone, Default)]
pub struct GridElements {
    pub agents: Agents,
    pub lines: Lines,
}

/// Routes and node graph of one grid.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub paths: Paths,
    pub nodes: Nodes,
}

/// Reads a JSON document, failing with [`SimError::FilePathNotFound`] if the
/// file does not exist.
pub fn read_json(path: &FsPath) -> Result<Value> {
    if !path.is_file() {
        return Err(SimError::FilePathNotFound {
            path: path.to_path_buf(),
        });
    }
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn section<'a>(doc: &'a Value, entity: &str, key: &str) -> Result<&'a serde_json::Map<String, Value>> {
    doc.get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| SimError::validation(entity, format!("missing object \"{key}\"")))
}

/// Builds agents and lines from a grid-elements document.
pub fn load_grid_elements(doc: &Value) -> Result<GridElements> {
    let mut elements = GridElements::default();
    for (name, item) in section(doc, "GridElements", "agents")? {
        elements.agents.insert(name.clone(), Agent::load(name, item)?);
    }
    for (name, item) in section(doc, "GridElements", "lines")? {
        elements.lines.insert(name.clone(), Line::load(name, item)?);
    }
    Ok(elements)
}

/// Builds paths and nodes from a topology document.
pub fn load_topology(doc: &Value) -> Result<Topology> {
    let mut topology = Topology::default();
    for (name, item) in section(doc, "Topology", "paths")? {
        topology.paths.insert(name.clone(), Path::load(name, item)?);
    }
    for (name, item) in section(doc, "Topology", "nodes")? {
        topology.nodes.insert(name.clone(), Node::load(name, item)?);
    }
    Ok(topology)
}

/// Checks that agents, paths, nodes and lines reference each other consistently.
///
/// Every agent needs a path and a hosting node, every path and node-hosted
/// agent must exist, and every line named by a route or adjacency entry must
/// be defined. All problems are reported together.
pub fn validate_consistency(elements: &GridElements, topology: &Topology) -> Result<()> {
    let mut issues = Vec::new();

    for name in elements.agents.keys() {
        if !topology.paths.contains_key(name) {
            issues.push(format!("agent {name} has no path"));
        }
        if !topology
            .nodes
            .values()
            .any(|n| n.agent.as_deref() == Some(name.as_str()))
        {
            issues.push(format!("agent {name} is not hosted by any node"));
        }
    }
    for (name, path) in &topology.paths {
        if !elements.agents.contains_key(name) {
            issues.push(format!("path {name} refers to an unknown agent"));
        }
        for route in &path.routes {
            for line in &route.path {
                if !elements.lines.contains_key(line) {
                    issues.push(format!("path {name} uses unknown line {line}"));
                }
            }
        }
    }
    for (name, node) in &topology.nodes {
        if let Some(agent) = &node.agent {
            if !elements.agents.contains_key(agent) {
                issues.push(format!("node {name} hosts unknown agent {agent}"));
            }
        }
        for (neighbor, line) in &node.adjacency {
            if !topology.nodes.contains_key(neighbor) {
                issues.push(format!("node {name} is adjacent to unknown node {neighbor}"));
            }
            if !elements.lines.contains_key(line) {
                issues.push(format!("node {name} uses unknown line {line}"));
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(SimError::validation("Grid", issues.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn topology_doc() -> Value {
        json!({
            "paths": {"A": [{"active": 1, "path": ["B0"]}]},
            "nodes": {
                "SLACK": {"branches_in": [], "branches_out": ["B0"], "adjacency": [["N1", "B0"]]},
                "N1": {"branches_in": ["B0"], "branches_out": [], "adjacency": [["SLACK", "B0"]], "agent": "A"}
            }
        })
    }

    #[test]
    fn test_load_topology() {
        let topology = load_topology(&topology_doc()).unwrap();
        assert_eq!(topology.paths.len(), 1);
        assert_eq!(topology.nodes.len(), 2);
    }

    #[test]
    fn test_missing_section() {
        let err = load_topology(&json!({"paths": {}})).unwrap_err();
        assert!(err.to_string().contains("nodes"));
    }

    #[test]
    fn test_consistency_reports_unknown_agent_and_line() {
        let topology = load_topology(&topology_doc()).unwrap();
        let elements = GridElements::default();
        let err = validate_consistency(&elements, &topology).unwrap_err().to_string();
        assert!(err.contains("path A refers to an unknown agent"));
        assert!(err.contains("unknown line B0"));
    }

    #[test]
    fn test_read_json_missing_file() {
        let err = read_json(FsPath::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, SimError::FilePathNotFound { .. }));
    }
}
