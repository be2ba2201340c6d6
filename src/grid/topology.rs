//! Grid topology: routes from each agent to the root bus and the node graph.

use serde::{Deserialize, Serialize};

use crate::devices::FieldChecks;
use crate::error::{Result, SimError};

/// One route from an agent towards the root bus, as an ordered list of lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Route {
    pub active: u8,
    #[serde(default)]
    pub path: Vec<String>,
}

impl Route {
    pub fn is_active(&self) -> bool {
        self.active == 1
    }
}

/// Every route known for one agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path {
    pub routes: Vec<Route>,
}

impl Path {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn load(agent: &str, value: &serde_json::Value) -> Result<Self> {
        let path: Path = serde_json::from_value(value.clone())
            .map_err(|e| SimError::validation(format!("Path {agent}"), e.to_string()))?;
        let mut checks = FieldChecks::new(format!("Path {agent}"));
        for route in &path.routes {
            checks.flag("active", route.active);
        }
        checks.finish()?;
        Ok(path)
    }

    pub fn active_routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(|r| r.is_active())
    }
}

/// A bus in the node graph.
///
/// `adjacency` holds `(neighbor_node, line_name)` pairs and serializes as
/// two-element arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Node {
    pub branches_in: Vec<String>,
    pub branches_out: Vec<String>,
    pub adjacency: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

impl Node {
    pub fn load(name: &str, value: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| SimError::validation(format!("Node {name}"), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_active_routes_filters_inactive() {
        let path = Path::load(
            "AGENT0",
            &json!([
                {"active": 1, "path": ["B0", "B1"]},
                {"active": 0, "path": ["B0", "B2"]}
            ]),
        )
        .unwrap();
        let active: Vec<_> = path.active_routes().collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].path, vec!["B0", "B1"]);
    }

    #[test]
    fn test_path_serde_round_trip() {
        let path = Path::new(vec![
            Route {
                active: 1,
                path: vec!["B0".to_string(), "B1".to_string()],
            },
            Route {
                active: 0,
                path: vec!["B0".to_string(), "B2".to_string(), "B3".to_string()],
            },
        ]);
        let text = serde_json::to_string(&path).unwrap();
        let back: Path = serde_json::from_str(&text).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn test_route_flag_out_of_range() {
        let err = Path::load("AGENT0", &json!([{"active": 2, "path": []}])).unwrap_err();
        assert!(err.to_string().contains("active must be 0 or 1"));
    }

    #[test]
    fn test_node_adjacency_pairs() {
        let node = Node::load(
            "N1",
            &json!({
                "branches_in": ["B0"],
                "branches_out": ["B1"],
                "adjacency": [["SLACK", "B0"], ["N2", "B1"]],
                "agent": "AGENT0"
            }),
        )
        .unwrap();
        assert_eq!(node.adjacency[1], ("N2".to_string(), "B1".to_string()));
        assert_eq!(node.agent.as_deref(), Some("AGENT0"));
    }

    #[test]
    fn test_node_serde_round_trip() {
        let node = Node {
            branches_in: vec!["B0".to_string()],
            branches_out: vec!["B1".to_string(), "B2".to_string()],
            adjacency: vec![
                ("SLACK".to_string(), "B0".to_string()),
                ("N1".to_string(), "B1".to_string()),
                ("N2".to_string(), "B2".to_string()),
            ],
            agent: Some("AGENT0".to_string()),
        };
        let text = serde_json::to_string(&node).unwrap();
        let back: Node = serde_json::from_str(&text).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_node_without_agent() {
        let node = Node::load(
            "SLACK",
            &json!({"branches_in": [], "branches_out": ["B0"], "adjacency": [["N1", "B0"]]}),
        )
        .unwrap();
        assert!(node.agent.is_none());
    }
}
