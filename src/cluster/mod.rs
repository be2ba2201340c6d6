//! Agent clusters and the controllers that redistribute power inside them.
//!
//! A cluster names a disjoint group of agents and the controller that runs
//! over them once per tick, before the agents are stepped. The whole set is
//! replaced whenever a new cluster configuration arrives.

pub mod load_sharing;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

pub use load_sharing::LoadSharing;

use crate::error::{Result, SimError};
use crate::grid::{Agents, Lines, Nodes, Paths};

/// The grid a controller may inspect and the agents it may adjust.
pub struct ClusterContext<'a> {
    pub agents: &'a mut Agents,
    pub lines: &'a Lines,
    pub nodes: &'a Nodes,
    pub paths: &'a Paths,
}

/// A cluster control strategy.
pub trait ClusterPolicy {
    /// Adjusts the member agents for the coming tick.
    fn run(&self, members: &[String], ctx: &mut ClusterContext<'_>);
}

/// Keeps its members as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct StayingAlive;

impl ClusterPolicy for StayingAlive {
    fn run(&self, _members: &[String], _ctx: &mut ClusterContext<'_>) {}
}

/// The closed set of controllers a cluster can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Controller {
    LoadSharing,
    StayingAlive,
}

impl Controller {
    /// Resolves a controller from its serialized name.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownController`] for any other name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "LoadSharingCluster" => Ok(Controller::LoadSharing),
            "StayingAliveCluster" => Ok(Controller::StayingAlive),
            _ => Err(SimError::UnknownController {
                name: name.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Controller::LoadSharing => "LoadSharingCluster",
            Controller::StayingAlive => "StayingAliveCluster",
        }
    }

    pub fn policy(&self) -> &'static dyn ClusterPolicy {
        match self {
            Controller::LoadSharing => &LoadSharing,
            Controller::StayingAlive => &StayingAlive,
        }
    }
}

impl fmt::Display for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for Controller {
    type Error = SimError;

    fn try_from(value: String) -> Result<Self> {
        Controller::from_name(&value)
    }
}

impl From<Controller> for String {
    fn from(value: Controller) -> Self {
        value.name().to_string()
    }
}

/// A named group of agents under one controller.
///
/// The name is the key the cluster is configured under and is not part of
/// its serialized body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cluster {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub cluster_agents: Vec<String>,
    pub controller: Controller,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<i64>,
}

impl Cluster {
    /// Parses a cluster, resolving its controller first.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownController`] if the controller name has no
    /// policy, [`SimError::Validation`] for any other schema problem.
    pub fn load(name: &str, value: &Value) -> Result<Self> {
        let controller = value
            .get("controller")
            .and_then(Value::as_str)
            .ok_or_else(|| SimError::validation(format!("Cluster {name}"), "missing controller"))?;
        Controller::from_name(controller)?;

        let mut cluster: Cluster = serde_json::from_value(value.clone())
            .map_err(|e| SimError::validation(format!("Cluster {name}"), e.to_string()))?;
        cluster.name = name.to_string();
        Ok(cluster)
    }

    pub fn run(&self, ctx: &mut ClusterContext<'_>) {
        self.controller.policy().run(&self.cluster_agents, ctx);
    }
}

/// Every cluster of a simulation, keyed by name and run in name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterSet {
    clusters: BTreeMap<String, Cluster>,
}

impl ClusterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a cluster set from a `{name: cluster}` map.
    ///
    /// # Errors
    ///
    /// Fails on the first invalid cluster, or with a [`SimError::Validation`]
    /// naming the agents that appear in more than one cluster.
    pub fn from_map(clusters: &BTreeMap<String, Value>) -> Result<Self> {
        let mut set = ClusterSet::new();
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut parsed = Vec::with_capacity(clusters.len());
        for (name, item) in clusters {
            parsed.push(Cluster::load(name, item)?);
        }
        for cluster in &parsed {
            let overlapping: Vec<&str> = cluster
                .cluster_agents
                .iter()
                .map(String::as_str)
                .filter(|a| seen.contains(a))
                .collect();
            if !overlapping.is_empty() {
                return Err(SimError::validation(
                    "Cluster",
                    format!("agents {overlapping:?} are already in a cluster"),
                ));
            }
            seen.extend(cluster.cluster_agents.iter().map(String::as_str));
        }
        for cluster in parsed {
            set.clusters.insert(cluster.name.clone(), cluster);
        }
        Ok(set)
    }

    /// Parses a `{name: cluster}` JSON object.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map: BTreeMap<String, Value> = serde_json::from_value(value.clone())
            .map_err(|e| SimError::validation("Cluster", e.to_string()))?;
        Self::from_map(&map)
    }

    /// Checks that every member is a known agent.
    pub fn check_members(&self, agents: &Agents) -> Result<()> {
        let missing: Vec<String> = self
            .clusters
            .values()
            .flat_map(|c| &c.cluster_agents)
            .filter(|a| !agents.contains_key(*a))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SimError::validation(
                "Cluster",
                format!("unknown agents {missing:?}"),
            ))
        }
    }

    /// Runs every cluster's controller. Members that are not known agents
    /// are skipped with a warning.
    pub fn run(&self, ctx: &mut ClusterContext<'_>) {
        for cluster in self.clusters.values() {
            if let Some(ghost) = cluster
                .cluster_agents
                .iter()
                .find(|a| !ctx.agents.contains_key(*a))
            {
                warn!(cluster = %cluster.name, agent = %ghost, "skipping cluster with unknown member");
                continue;
            }
            cluster.run(ctx);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Cluster> {
        self.clusters.get(name)
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Cluster)> {
        self.clusters.iter()
    }

    /// Serialized `{name: cluster}` form, as stored with the simulation.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(&self.clusters)?)
    }
}
