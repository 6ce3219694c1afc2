use crate::error::{StationError, WarnCode};
use crate::station::warn::{self, WarnEvent};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Read-only view of the station graph needed by an archive build.
pub trait Topology: Send + Sync {
    fn neighbors(&self, station: &str) -> Result<Vec<String>, StationError>;

    /// Dates shared by `station` and `neighbor`. An edge without a `dates`
    /// attribute yields an empty list and a warning.
    fn edge_dates(&self, station: &str, neighbor: &str) -> Result<Vec<String>, StationError>;

    fn stations(&self) -> Vec<String>;
}

#[derive(Debug, Deserialize)]
struct NodeLinkDocument {
    #[serde(default)]
    directed: bool,
    #[serde(default)]
    nodes: Vec<NodeLinkNode>,
    #[serde(default, alias = "edges")]
    links: Vec<NodeLinkEdge>,
}

#[derive(Debug, Deserialize)]
struct NodeLinkNode {
    id: String,
}

#[derive(Debug, Deserialize)]
struct NodeLinkEdge {
    source: String,
    target: String,
    #[serde(default)]
    dates: Option<Vec<String>>,
}

/// Undirected adjacency-map graph. Neighbor order follows edge insertion.
#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    order: Vec<String>,
    adjacency: HashMap<String, Vec<String>>,
    edges: BTreeMap<(String, String), Option<Vec<String>>>,
}

fn edge_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_station(&mut self, station: &str) {
        if self.adjacency.contains_key(station) {
            return;
        }
        self.order.push(station.to_string());
        self.adjacency.insert(station.to_string(), Vec::new());
    }

    /// Adds or replaces the undirected edge `a`-`b`. `None` models an edge
    /// that carries no `dates` attribute.
    pub fn add_edge(&mut self, a: &str, b: &str, dates: Option<Vec<String>>) -> Result<()> {
        if a == b {
            bail!("self-loop on station {a} is not a valid topology edge");
        }
        self.add_station(a);
        self.add_station(b);

        let key = edge_key(a, b);
        if !self.edges.contains_key(&key) {
            if let Some(list) = self.adjacency.get_mut(a) {
                list.push(b.to_string());
            }
            if let Some(list) = self.adjacency.get_mut(b) {
                list.push(a.to_string());
            }
        }
        self.edges.insert(key, dates);
        Ok(())
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let doc: NodeLinkDocument =
            serde_json::from_str(raw).context("failed to parse node-link topology document")?;
        if doc.directed {
            bail!("directed topology graphs are not supported");
        }

        let mut graph = Self::new();
        for node in &doc.nodes {
            graph.add_station(&node.id);
        }
        for link in doc.links {
            graph.add_edge(&link.source, &link.target, link.dates)?;
        }
        Ok(graph)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read topology {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("failed to load topology {}", path.display()))
    }

    pub fn station_count(&self) -> usize {
        self.order.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

impl Topology for TopologyGraph {
    fn neighbors(&self, station: &str) -> Result<Vec<String>, StationError> {
        self.adjacency
            .get(station)
            .cloned()
            .ok_or_else(|| StationError::UnknownStation(station.to_string()))
    }

    fn edge_dates(&self, station: &str, neighbor: &str) -> Result<Vec<String>, StationError> {
        let Some(attr) = self.edges.get(&edge_key(station, neighbor)) else {
            return Err(StationError::MissingEdge {
                station: station.to_string(),
                neighbor: neighbor.to_string(),
            });
        };

        match attr {
            Some(dates) => Ok(dates.clone()),
            None => {
                warn::emit(WarnEvent {
                    code: WarnCode::MissingEdgeAttribute,
                    stage: "topology",
                    station,
                    subject: neighbor,
                    reason: "edge-has-no-dates-attribute",
                    err: "treated as empty date list",
                });
                Ok(Vec::new())
            }
        }
    }

    fn stations(&self) -> Vec<String> {
        self.order.clone()
    }
}
