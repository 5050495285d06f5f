// src/config.rs

/// Input-document model for the fabric router. The document is a single JSON
/// object with `Nodes`, `Connections`, `Constants` and `Routing` sections.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::ConfigError;

#[derive(Debug, Default, Deserialize)]
pub struct FabricConfig {
    /// Model name -> node name -> profile tuple.
    #[serde(rename = "Nodes")]
    pub nodes: BTreeMap<String, BTreeMap<String, NodeProfile>>,

    /// `"srcName,srcPort"` -> `"dstName,dstPort"`, undirected.
    #[serde(rename = "Connections", default)]
    pub connections: BTreeMap<String, String>,

    /// Numeric constants per model name, plus the `Fabric` section.
    #[serde(rename = "Constants", default)]
    pub constants: BTreeMap<String, ConstantsConfig>,

    /// `TC<n>` -> traffic-class policy.
    #[serde(rename = "Routing", default)]
    pub routing: BTreeMap<String, TrafficClassConfig>,
}

/// `(address, topology-id, geo-id, enabled, gcids)` as found in the document.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeProfile(pub String, pub String, pub String, pub bool, pub Vec<String>);

impl NodeProfile {
    pub fn address(&self) -> &str {
        &self.0
    }

    pub fn topology_id(&self) -> &str {
        &self.1
    }

    pub fn geo_id(&self) -> &str {
        &self.2
    }

    pub fn enabled(&self) -> bool {
        self.3
    }

    pub fn gcids(&self) -> &[String] {
        &self.4
    }
}

/// Inclusive `[lo, hi]` index ranges; which keys are present depends on the
/// model the section describes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConstantsConfig {
    #[serde(rename = "SWITCHES")]
    pub switches: Option<[u32; 2]>,
    #[serde(rename = "SWITCH_PORTS")]
    pub switch_ports: Option<[u32; 2]>,
    #[serde(rename = "FABRIC_ADAPTER_PORTS")]
    pub fabric_adapter_ports: Option<[u32; 2]>,
    #[serde(rename = "ENDPOINTS")]
    pub endpoints: Option<[u32; 2]>,
    #[serde(rename = "VCS")]
    pub vcs: Option<[u32; 2]>,
    #[serde(rename = "Dimensions")]
    pub dimensions: Option<u32>,
    #[serde(rename = "Rkey_Enable")]
    pub rkey_enable: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrafficClassConfig {
    #[serde(rename = "Parameters")]
    pub parameters: ParametersConfig,

    /// `PC<k>` -> `RC<r>` -> `["VC<v>", ...]`. Keys that do not look like a
    /// protocol class are ignored, matching the original tooling.
    #[serde(flatten)]
    pub classes: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParametersConfig {
    #[serde(rename = "Algorithm")]
    pub algorithm: Option<String>,
    #[serde(rename = "XDimensionFirst", default = "default_x_first")]
    pub x_dimension_first: bool,
    #[serde(rename = "IngressRC", default)]
    pub ingress_rc: u8,
    #[serde(rename = "EgressRC", default = "default_egress_rc")]
    pub egress_rc: i16,
    #[serde(rename = "NodeRouters", default)]
    pub node_routers: Vec<String>,
    #[serde(rename = "Dimensions")]
    pub dimensions: Option<u32>,
}

fn default_x_first() -> bool {
    true
}

fn default_egress_rc() -> i16 {
    -1
}

impl FabricConfig {
    /// Read and parse a configuration document from `path`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Constants for the `Fabric` section, if present.
    pub fn fabric_constants(&self) -> ConstantsConfig {
        self.constants.get("Fabric").cloned().unwrap_or_default()
    }
}

/// Parse a GCID string in hex (`"0x001"`) or decimal form.
pub fn parse_gcid(node: &str, value: &str) -> Result<u32, ConfigError> {
    let parsed = if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        value.parse::<u32>()
    };
    match parsed {
        Ok(gcid) if gcid < (1 << 24) => Ok(gcid),
        _ => Err(ConfigError::Gcid {
            node: node.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Parse a dot-separated topology id into its integer tokens.
pub fn parse_topology_id(node: &str, value: &str) -> Result<Vec<u16>, ConfigError> {
    value
        .split('.')
        .map(|token| {
            token.parse::<u16>().map_err(|_| ConfigError::TopologyId {
                node: node.to_string(),
                value: value.to_string(),
                reason: format!("token '{token}' is not an integer"),
            })
        })
        .collect()
}

/// Geo ids are carried for inventory only, but their shape is still checked:
/// four dot-separated tokens (rack.chassis.slot.node).
pub fn check_geo_id(node: &str, value: &str) -> Result<(), ConfigError> {
    if value.split('.').count() == 4 && !value.split('.').any(|t| t.is_empty()) {
        Ok(())
    } else {
        Err(ConfigError::GeoId {
            node: node.to_string(),
            value: value.to_string(),
        })
    }
}

/// Split a `"name,port"` connection endpoint.
pub fn parse_endpoint(connection: &str, value: &str) -> Result<(String, u32), ConfigError> {
    let malformed = |reason: &str| ConfigError::Connection {
        connection: connection.to_string(),
        reason: reason.to_string(),
    };
    let (name, port) = value
        .rsplit_once(',')
        .ok_or_else(|| malformed("expected 'name,port'"))?;
    let name = name.trim();
    let port = port
        .trim()
        .parse::<u32>()
        .map_err(|_| malformed("port is not an integer"))?;
    if name.is_empty() {
        return Err(malformed("empty node name"));
    }
    Ok((name.to_string(), port))
}
