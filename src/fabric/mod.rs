// src/fabric/mod.rs

/// The fabric model: a petgraph arena of endpoint nodes and logical switches
/// connected by links. Names are resolved to `NodeIndex` once, during build;
/// everything downstream works on indices.

pub mod node;
pub mod split;
pub mod tables;

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::config::{self, FabricConfig};
use crate::error::ConfigError;
use node::{FabricNode, Model, Port, PortKind};
use tables::{RouteEntry, VcatTable};

/// Low 12 bits of a GCID: the component id within a subnet.
pub fn cid(gcid: u32) -> u16 {
    (gcid & 0xfff) as u16
}

/// High 12 bits of a GCID: the subnet id.
pub fn sid(gcid: u32) -> u16 {
    ((gcid >> 12) & 0xfff) as u16
}

/// Filter a GCID set down to one subnet.
pub fn gcids_in_subnet(gcids: &BTreeSet<u32>, subnet: u16) -> BTreeSet<u32> {
    gcids.iter().copied().filter(|&g| sid(g) == subnet).collect()
}

/// A physical connection; `a_port` belongs to the edge's source node.
#[derive(Debug, Clone)]
pub struct FabricLink {
    pub a_port: u32,
    pub b_port: u32,
}

#[derive(Debug)]
pub struct FabricModel {
    pub graph: UnGraph<FabricNode, FabricLink>,
    name_index: BTreeMap<String, NodeIndex>,
    position_index: BTreeMap<(u16, u16, u16), NodeIndex>,
    /// Union of every endpoint's GCIDs.
    pub all_gcids: BTreeSet<u32>,
    pub dimensions: u32,
    pub rkey_enable: u32,
}

/// Parsed node profile before the graph exists; cross-references are still
/// by name here.
struct StagedNode {
    name: String,
    /// Physical name for logical switches.
    base: String,
    model: Model,
    plane: u16,
    subnet: u16,
    /// Split index 1..=4 for logical switches.
    logical: Option<u8>,
    gcids: BTreeSet<u32>,
    port_lo: u32,
    port_hi: u32,
    links: BTreeMap<u32, (String, u32)>,
}

impl FabricModel {
    /// Build the post-transform fabric from a configuration document.
    ///
    /// The build runs in four phases: parse node profiles, bind connections,
    /// split physical switches into logical switches (remapping link
    /// endpoints), then classify ports and compute connection closures. Any
    /// error aborts the build; no partial model is returned.
    pub fn build(cfg: &FabricConfig) -> Result<Self, ConfigError> {
        let mut staged: BTreeMap<String, StagedNode> = BTreeMap::new();
        let mut disabled: BTreeSet<String> = BTreeSet::new();

        // Phase 1: node profiles.
        for (model_name, nodes) in &cfg.nodes {
            let model = Model::from_name(model_name).ok_or_else(|| ConfigError::UnknownModel {
                model: model_name.clone(),
            })?;
            let constants = cfg.constants.get(model_name).cloned().unwrap_or_default();
            let (port_lo, port_hi) = port_space(model, model_name, &constants)?;

            for (name, profile) in nodes {
                if !profile.enabled() {
                    debug!("skipping disabled node {name}");
                    disabled.insert(name.clone());
                    continue;
                }
                let topo = config::parse_topology_id(name, profile.topology_id())?;
                config::check_geo_id(name, profile.geo_id())?;
                let expected = if model.is_switch() { 2usize..=2 } else { 3..=4 };
                if !expected.contains(&topo.len()) {
                    return Err(ConfigError::TopologyId {
                        node: name.clone(),
                        value: profile.topology_id().to_string(),
                        reason: format!("expected {expected:?} tokens, found {}", topo.len()),
                    });
                }
                let mut gcids = BTreeSet::new();
                for value in profile.gcids() {
                    gcids.insert(config::parse_gcid(name, value)?);
                }
                if !model.is_switch() && gcids.is_empty() {
                    return Err(ConfigError::MissingGcids { node: name.clone() });
                }
                let subnet = if model.is_switch() {
                    topo[1]
                } else {
                    // Endpoint subnet comes from its lowest GCID.
                    sid(*gcids.iter().next().unwrap_or(&0))
                };
                staged.insert(
                    name.clone(),
                    StagedNode {
                        name: name.clone(),
                        base: name.clone(),
                        model,
                        plane: topo[0],
                        subnet,
                        logical: None,
                        gcids,
                        port_lo,
                        port_hi,
                        links: BTreeMap::new(),
                    },
                );
            }
        }

        // Phase 2: connections, still against physical names.
        let mut connections: Vec<((String, u32), (String, u32))> = Vec::new();
        for (src, dst) in &cfg.connections {
            let key = format!("{src} -> {dst}");
            let a = config::parse_endpoint(&key, src)?;
            let b = config::parse_endpoint(&key, dst)?;
            if a == b {
                return Err(ConfigError::Connection {
                    connection: key,
                    reason: "connects a port to itself".to_string(),
                });
            }
            if disabled.contains(&a.0) || disabled.contains(&b.0) {
                warn!("dropping connection {key}: touches a disabled node");
                continue;
            }
            for (name, port) in [&a, &b] {
                let node = staged.get(name).ok_or_else(|| ConfigError::UnknownNode {
                    connection: key.clone(),
                    node: name.clone(),
                })?;
                if *port < node.port_lo || *port >= node.port_hi {
                    return Err(ConfigError::PortOutOfRange {
                        node: name.clone(),
                        port: *port,
                        lo: node.port_lo,
                        hi: node.port_hi,
                    });
                }
            }
            for ((name, port), (rname, rport)) in [(&a, &b), (&b, &a)] {
                let node = staged.get_mut(name).expect("endpoint validated above");
                if node
                    .links
                    .insert(*port, (rname.clone(), *rport))
                    .is_some()
                {
                    return Err(ConfigError::DuplicatePort {
                        node: name.clone(),
                        port: *port,
                    });
                }
            }
            connections.push((a, b));
        }

        // Phase 3: split physical switches into logical switches and remap
        // every link endpoint that names a physical switch.
        let mut port_owner: BTreeMap<(String, u32), String> = BTreeMap::new();
        let mut logicals: BTreeMap<String, StagedNode> = BTreeMap::new();
        for switch in staged.values().filter(|n| n.model.is_switch()) {
            if switch.port_hi > split::SWITCH_PORT_SPACE {
                return Err(ConfigError::SplitSpace {
                    node: switch.name.clone(),
                    ports: switch.port_hi,
                    space: split::SWITCH_PORT_SPACE,
                });
            }
            for index in 1..=split::LOGICAL_SWITCH_COUNT {
                let name = split::logical_name(&switch.name, index);
                let links = switch
                    .links
                    .iter()
                    .filter(|(port, _)| split::logical_index(**port) == Some(index))
                    .map(|(port, remote)| (*port, remote.clone()))
                    .collect::<BTreeMap<_, _>>();
                for port in links.keys() {
                    port_owner.insert((switch.name.clone(), *port), name.clone());
                }
                logicals.insert(
                    name.clone(),
                    StagedNode {
                        name,
                        base: switch.name.clone(),
                        model: Model::Switch,
                        plane: switch.plane,
                        subnet: switch.subnet,
                        logical: Some(index),
                        gcids: switch.gcids.clone(),
                        port_lo: switch.port_lo,
                        port_hi: switch.port_hi,
                        links,
                    },
                );
            }
        }
        let remap = |endpoint: &(String, u32)| -> (String, u32) {
            match port_owner.get(&(endpoint.0.clone(), endpoint.1)) {
                Some(logical) => (logical.clone(), endpoint.1),
                None => endpoint.clone(),
            }
        };
        let connections: Vec<_> = connections
            .iter()
            .map(|(a, b)| (remap(a), remap(b)))
            .collect();

        // Phase 4: assemble the graph, classify ports, compute closures.
        let mut model = FabricModel {
            graph: UnGraph::new_undirected(),
            name_index: BTreeMap::new(),
            position_index: BTreeMap::new(),
            all_gcids: BTreeSet::new(),
            dimensions: cfg.fabric_constants().dimensions.unwrap_or(2),
            rkey_enable: cfg.fabric_constants().rkey_enable.unwrap_or(3),
        };

        let endpoints = staged.into_values().filter(|n| !n.model.is_switch());
        for staged_node in endpoints.chain(logicals.into_values()) {
            model.add_node(&staged_node)?;
        }
        for ((a_name, a_port), (b_name, b_port)) in &connections {
            let a = model.name_index[a_name];
            let b = model.name_index[b_name];
            model.graph.add_edge(
                a,
                b,
                FabricLink {
                    a_port: *a_port,
                    b_port: *b_port,
                },
            );
        }
        model.classify_ports();
        model.compute_closures();
        Ok(model)
    }

    fn add_node(&mut self, staged: &StagedNode) -> Result<(), ConfigError> {
        let coords = staged
            .logical
            .map(|index| (split::logical_x(index), staged.subnet));
        let fabric_node = FabricNode {
            name: staged.name.clone(),
            base: staged.base.clone(),
            model: staged.model,
            plane: staged.plane,
            subnet: staged.subnet,
            coords,
            gcids: staged.gcids.clone(),
            ports: BTreeMap::new(),
            closure: BTreeMap::new(),
            ssdt: Default::default(),
            msdt: Default::default(),
            req_vcat: Default::default(),
            rsp_vcat: Default::default(),
        };
        if !fabric_node.is_switch() {
            self.all_gcids.extend(&fabric_node.gcids);
        }
        let idx = self.graph.add_node(fabric_node);
        self.name_index.insert(staged.name.clone(), idx);
        if let Some((x, y)) = self.graph[idx].coords {
            let plane = self.graph[idx].plane;
            if let Some(&other) = self.position_index.get(&(plane, x, y)) {
                return Err(ConfigError::DuplicatePosition {
                    a: self.graph[other].name.clone(),
                    b: staged.name.clone(),
                    plane,
                    x,
                    y,
                });
            }
            self.position_index.insert((plane, x, y), idx);
        }
        Ok(())
    }

    /// Assign L/X/Y kinds to switch ports and L/R kinds to endpoint ports.
    fn classify_ports(&mut self) {
        let indices: Vec<_> = self.name_index.values().copied().collect();
        for idx in indices {
            let mut ports = BTreeMap::new();
            for (port, (remote_idx, _)) in self.incident_ports(idx) {
                let this = &self.graph[idx];
                let remote = &self.graph[remote_idx];
                let kind = if this.is_switch() {
                    if !remote.is_switch() {
                        PortKind::L
                    } else if remote.subnet == this.subnet {
                        PortKind::X
                    } else {
                        PortKind::Y
                    }
                } else if remote.is_switch() || this.model == Model::Memory {
                    PortKind::R
                } else {
                    PortKind::L
                };
                ports.insert(port, Port::new(port, kind));
            }
            self.graph[idx].ports = ports;
        }
    }

    /// For every L port, record the GCIDs of the attached node and of every
    /// non-switch node one hop behind it. This resolves switch -> IO ->
    /// memory chains to the single local port that reaches them.
    fn compute_closures(&mut self) {
        let indices: Vec<_> = self.name_index.values().copied().collect();
        for idx in indices {
            let mut closure: BTreeMap<u32, BTreeSet<u32>> = BTreeMap::new();
            for (port, (neighbour_idx, _)) in self.incident_ports(idx) {
                if self.graph[idx].ports[&port].kind != PortKind::L {
                    continue;
                }
                let mut visible = self.graph[neighbour_idx].gcids.clone();
                for (_, (far_idx, _)) in self.incident_ports(neighbour_idx) {
                    if far_idx != idx && !self.graph[far_idx].is_switch() {
                        visible.extend(&self.graph[far_idx].gcids);
                    }
                }
                closure.insert(port, visible);
            }
            self.graph[idx].closure = closure;
        }
    }

    /// `(local port, (remote node, remote port))` for every connection on a
    /// node, in port order.
    pub fn incident_ports(&self, idx: NodeIndex) -> BTreeMap<u32, (NodeIndex, u32)> {
        let mut out = BTreeMap::new();
        for edge in self.graph.edges(idx) {
            let link = edge.weight();
            // Undirected edge iteration may flip the pair; the stored
            // orientation decides which port belongs to which side.
            let (a, b) = self
                .graph
                .edge_endpoints(edge.id())
                .expect("edge endpoints");
            if a == idx {
                out.insert(link.a_port, (b, link.b_port));
            }
            if b == idx {
                out.insert(link.b_port, (a, link.a_port));
            }
        }
        out
    }

    pub fn node(&self, idx: NodeIndex) -> &FabricNode {
        &self.graph[idx]
    }

    pub fn by_name(&self, name: &str) -> Option<NodeIndex> {
        self.name_index.get(name).copied()
    }

    /// Logical switches in name order.
    pub fn logical_switches(&self) -> Vec<NodeIndex> {
        self.name_index
            .values()
            .copied()
            .filter(|&idx| self.graph[idx].is_switch())
            .collect()
    }

    /// Non-switch nodes in name order.
    pub fn endpoint_nodes(&self) -> Vec<NodeIndex> {
        self.name_index
            .values()
            .copied()
            .filter(|&idx| !self.graph[idx].is_switch())
            .collect()
    }

    /// Logical switch at a grid position, if any.
    pub fn switch_at(&self, plane: u16, x: u16, y: u16) -> Option<NodeIndex> {
        self.position_index.get(&(plane, x, y)).copied()
    }

    /// Ports on `src` that connect directly to `dst`.
    pub fn ports_between(&self, src: NodeIndex, dst: NodeIndex) -> BTreeSet<u32> {
        self.incident_ports(src)
            .into_iter()
            .filter(|(_, (remote, _))| *remote == dst)
            .map(|(port, _)| port)
            .collect()
    }

    // Typed table writers. These are the only mutation paths for routing
    // state; a missing port here is a programming error, not a
    // configuration error.

    pub fn set_lprt(&mut self, idx: NodeIndex, port: u32, key: u16, mhc: u8, entry: RouteEntry) {
        self.port_mut(idx, port).lprt.insert(key, mhc, entry);
    }

    pub fn set_mprt(&mut self, idx: NodeIndex, port: u32, key: u16, mhc: u8, entry: RouteEntry) {
        self.port_mut(idx, port).mprt.insert(key, mhc, entry);
    }

    pub fn set_vcat(&mut self, idx: NodeIndex, port: u32, table: VcatTable) {
        self.port_mut(idx, port).vcat = table;
    }

    pub fn set_ssdt(&mut self, idx: NodeIndex, key: u16, mhc: u8, entry: RouteEntry) {
        self.graph[idx].ssdt.insert(key, mhc, entry);
    }

    pub fn set_msdt(&mut self, idx: NodeIndex, key: u16, mhc: u8, entry: RouteEntry) {
        self.graph[idx].msdt.insert(key, mhc, entry);
    }

    pub fn set_req_vcat(&mut self, idx: NodeIndex, table: VcatTable) {
        self.graph[idx].req_vcat = table;
    }

    pub fn set_rsp_vcat(&mut self, idx: NodeIndex, table: VcatTable) {
        self.graph[idx].rsp_vcat = table;
    }

    fn port_mut(&mut self, idx: NodeIndex, port: u32) -> &mut Port {
        let name = self.graph[idx].name.clone();
        self.graph[idx]
            .ports
            .get_mut(&port)
            .unwrap_or_else(|| panic!("no port {port} on {name}"))
    }
}

fn port_space(
    model: Model,
    model_name: &str,
    constants: &crate::config::ConstantsConfig,
) -> Result<(u32, u32), ConfigError> {
    let require = |range: Option<[u32; 2]>, key: &'static str| {
        range.ok_or(ConfigError::MissingConstant {
            model: model_name.to_string(),
            key,
        })
    };
    let (groups, ports) = match model {
        Model::Switch => (
            require(constants.switches, "SWITCHES")?,
            require(constants.switch_ports, "SWITCH_PORTS")?,
        ),
        Model::Memory => ([0, 0], require(constants.switch_ports, "SWITCH_PORTS")?),
        Model::Compute | Model::Io => (
            [0, 0],
            require(constants.fabric_adapter_ports, "FABRIC_ADAPTER_PORTS")?,
        ),
    };
    if groups[1] < groups[0] || ports[1] < ports[0] {
        return Err(ConfigError::InvertedRange {
            model: model_name.to_string(),
        });
    }
    let count = (1 + groups[1] - groups[0]) * (1 + ports[1] - ports[0]);
    Ok((ports[0], ports[0] + count))
}
