// src/fabric/node.rs

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::fabric::tables::{RouteTable, VcatTable};

/// Hardware model of a fabric node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Model {
    Switch,
    Compute,
    #[serde(rename = "IO")]
    Io,
    Memory,
}

impl Model {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Switch" => Some(Model::Switch),
            "Compute" => Some(Model::Compute),
            "IO" => Some(Model::Io),
            "Memory" => Some(Model::Memory),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Switch => "Switch",
            Model::Compute => "Compute",
            Model::Io => "IO",
            Model::Memory => "Memory",
        }
    }

    pub fn is_switch(&self) -> bool {
        matches!(self, Model::Switch)
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a port. Endpoint nodes carry `L`/`R` ports, logical
/// switches carry `L`/`X`/`Y` ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PortKind {
    /// Faces a locally attached non-switch node.
    L,
    /// Endpoint port facing the switched fabric.
    R,
    /// Switch port towards a same-subnet switch (X dimension).
    X,
    /// Switch port towards a different-subnet switch (Y dimension).
    Y,
}

impl PortKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortKind::L => "L",
            PortKind::R => "R",
            PortKind::X => "X",
            PortKind::Y => "Y",
        }
    }
}

impl std::fmt::Display for PortKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A connected port together with its relay tables.
#[derive(Debug, Clone)]
pub struct Port {
    pub index: u32,
    pub kind: PortKind,
    pub lprt: RouteTable,
    pub mprt: RouteTable,
    pub vcat: VcatTable,
}

impl Port {
    pub fn new(index: u32, kind: PortKind) -> Self {
        Port {
            index,
            kind,
            lprt: RouteTable::default(),
            mprt: RouteTable::default(),
            vcat: VcatTable::default(),
        }
    }
}

/// A node of the post-transform fabric graph: either an endpoint (Compute,
/// IO, Memory) or a logical switch produced by the split phase.
#[derive(Debug, Clone)]
pub struct FabricNode {
    pub name: String,
    /// Physical name for logical switches, equal to `name` for endpoints.
    pub base: String,
    pub model: Model,
    pub plane: u16,
    pub subnet: u16,
    /// Grid position of a logical switch; endpoints carry none.
    pub coords: Option<(u16, u16)>,
    pub gcids: BTreeSet<u32>,
    pub ports: BTreeMap<u32, Port>,
    /// GCIDs visible through each local port, one hop past non-switch
    /// neighbours included.
    pub closure: BTreeMap<u32, BTreeSet<u32>>,
    pub ssdt: RouteTable,
    pub msdt: RouteTable,
    pub req_vcat: VcatTable,
    pub rsp_vcat: VcatTable,
}

impl FabricNode {
    pub fn is_switch(&self) -> bool {
        self.model.is_switch()
    }

    /// Port indices of the given kind, in index order.
    pub fn ports_of_kind(&self, kind: PortKind) -> Vec<u32> {
        self.ports
            .values()
            .filter(|p| p.kind == kind)
            .map(|p| p.index)
            .collect()
    }

    /// Every GCID visible through the node's local ports.
    pub fn closure_gcids(&self) -> BTreeSet<u32> {
        self.closure.values().flatten().copied().collect()
    }
}
