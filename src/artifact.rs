// src/artifact.rs

/// Emission of the routing artifact: a JSON document keyed by node name.
/// Logical switches are merged back under their physical base name; every
/// mapping serializes from an integer-keyed ordered map, so the output is
/// byte-identical across runs.

use petgraph::graph::NodeIndex;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::RouterError;
use crate::fabric::node::Model;
use crate::fabric::tables::{RouteTable, VcatCell, VcatTable};
use crate::fabric::FabricModel;

/// Opaque placeholder carried by every route set.
const RAW_ENTRY_HEX: &str = "0x34EF124500000000";

/// Number of action slots in a VCAT row.
const VCAT_SLOTS: u8 = 8;

#[derive(Debug, Serialize)]
pub struct RouteEntryArtifact {
    #[serde(rename = "Valid")]
    pub valid: bool,
    #[serde(rename = "VCAction")]
    pub vc_action: u8,
    #[serde(rename = "HopCount")]
    pub hop_count: u8,
    #[serde(rename = "EgressIdentifier")]
    pub egress_identifier: u32,
}

#[derive(Debug, Serialize)]
pub struct RouteSetArtifact {
    #[serde(rename = "MinimumHopCount")]
    pub minimum_hop_count: u8,
    #[serde(rename = "RawEntryHex")]
    pub raw_entry_hex: &'static str,
    #[serde(rename = "Entries")]
    pub entries: BTreeMap<u32, RouteEntryArtifact>,
}

pub type RouteTableArtifact = BTreeMap<u16, RouteSetArtifact>;

#[derive(Debug, Serialize)]
pub struct VcatCellArtifact {
    #[serde(rename = "Threshold")]
    pub threshold: u8,
    #[serde(rename = "VCMask")]
    pub vc_mask: u16,
}

/// VC -> slot 0..7 -> cell, dense.
pub type VcatArtifact = BTreeMap<u8, BTreeMap<u8, VcatCellArtifact>>;

#[derive(Debug, Serialize)]
pub struct PortArtifact {
    #[serde(rename = "LPRT")]
    pub lprt: RouteTableArtifact,
    #[serde(rename = "MPRT")]
    pub mprt: RouteTableArtifact,
    #[serde(rename = "VCAT")]
    pub vcat: VcatArtifact,
    #[serde(rename = "Registers")]
    pub registers: Option<()>,
}

#[derive(Debug, Serialize)]
pub struct ConstantsArtifact {
    #[serde(rename = "Enabled")]
    pub enabled: Vec<u32>,
    #[serde(rename = "Model")]
    pub model: Model,
    #[serde(rename = "Rkey_Enable")]
    pub rkey_enable: u32,
}

#[derive(Debug, Serialize)]
pub struct NodeArtifact {
    #[serde(rename = "Model")]
    pub model: Model,
    #[serde(rename = "Registers")]
    pub registers: serde_json::Value,
    #[serde(rename = "Constants")]
    pub constants: ConstantsArtifact,
    #[serde(rename = "Links")]
    pub links: BTreeMap<u32, (String, u32)>,
    #[serde(rename = "Ports")]
    pub ports: BTreeMap<u32, PortArtifact>,
    #[serde(rename = "GCIDs")]
    pub gcids: Vec<u32>,
    #[serde(rename = "SSDT", skip_serializing_if = "Option::is_none")]
    pub ssdt: Option<RouteTableArtifact>,
    #[serde(rename = "MSDT", skip_serializing_if = "Option::is_none")]
    pub msdt: Option<RouteTableArtifact>,
    #[serde(rename = "REQ-VCAT", skip_serializing_if = "Option::is_none")]
    pub req_vcat: Option<VcatArtifact>,
    #[serde(rename = "RSP-VCAT", skip_serializing_if = "Option::is_none")]
    pub rsp_vcat: Option<VcatArtifact>,
}

/// Assemble the artifact, merging logical switches under their base name.
pub fn build(fabric: &FabricModel) -> BTreeMap<String, NodeArtifact> {
    let mut groups: BTreeMap<String, Vec<NodeIndex>> = BTreeMap::new();
    for idx in fabric.endpoint_nodes() {
        groups
            .entry(fabric.node(idx).name.clone())
            .or_default()
            .push(idx);
    }
    for idx in fabric.logical_switches() {
        groups
            .entry(fabric.node(idx).base.clone())
            .or_default()
            .push(idx);
    }
    groups
        .into_iter()
        .map(|(name, indices)| (name, node_artifact(fabric, &indices)))
        .collect()
}

fn node_artifact(fabric: &FabricModel, indices: &[NodeIndex]) -> NodeArtifact {
    let first = fabric.node(indices[0]);
    let model = first.model;
    let mut links = BTreeMap::new();
    let mut ports = BTreeMap::new();
    for &idx in indices {
        for (port, (remote_idx, remote_port)) in fabric.incident_ports(idx) {
            links.insert(port, (fabric.node(remote_idx).base.clone(), remote_port));
        }
        for (index, port) in &fabric.node(idx).ports {
            ports.insert(
                *index,
                PortArtifact {
                    lprt: route_table(&port.lprt),
                    mprt: route_table(&port.mprt),
                    vcat: vcat_table(&port.vcat),
                    registers: None,
                },
            );
        }
    }
    let endpoint = !model.is_switch();
    NodeArtifact {
        model,
        registers: serde_json::Value::Object(Default::default()),
        constants: ConstantsArtifact {
            enabled: ports.keys().copied().collect(),
            model,
            rkey_enable: fabric.rkey_enable,
        },
        links,
        ports,
        gcids: first.gcids.iter().copied().collect(),
        ssdt: endpoint.then(|| route_table(&first.ssdt)),
        msdt: endpoint.then(|| route_table(&first.msdt)),
        req_vcat: endpoint.then(|| vcat_table(&first.req_vcat)),
        rsp_vcat: endpoint.then(|| vcat_table(&first.rsp_vcat)),
    }
}

fn route_table(table: &RouteTable) -> RouteTableArtifact {
    table
        .sets
        .iter()
        .map(|(&key, set)| {
            let entries = set
                .entries
                .iter()
                .enumerate()
                .map(|(index, entry)| {
                    (
                        index as u32,
                        RouteEntryArtifact {
                            valid: true,
                            vc_action: entry.vc_action,
                            hop_count: entry.hop_count,
                            egress_identifier: entry.egress,
                        },
                    )
                })
                .collect();
            (
                key,
                RouteSetArtifact {
                    minimum_hop_count: set.mhc,
                    raw_entry_hex: RAW_ENTRY_HEX,
                    entries,
                },
            )
        })
        .collect()
}

fn vcat_table(table: &VcatTable) -> VcatArtifact {
    table
        .rows
        .iter()
        .map(|(&vc, row)| {
            let slots = (0..VCAT_SLOTS)
                .map(|action| {
                    let cell = row
                        .get(&action)
                        .copied()
                        .unwrap_or(VcatCell { mask: 0, threshold: 0 });
                    (
                        action,
                        VcatCellArtifact {
                            threshold: cell.threshold,
                            vc_mask: cell.mask,
                        },
                    )
                })
                .collect();
            (vc, slots)
        })
        .collect()
}

/// Serialize the artifact to `path` as pretty-printed JSON.
pub fn write(artifact: &BTreeMap<String, NodeArtifact>, path: &str) -> Result<(), RouterError> {
    let output = |source| RouterError::Output {
        path: path.to_string(),
        source,
    };
    let json = serde_json::to_string_pretty(artifact)
        .map_err(|e| output(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    std::fs::write(path, json + "\n").map_err(output)
}
