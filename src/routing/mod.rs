// src/routing/mod.rs

/// Router engines and the controller driving them. An engine is a state
/// machine over (location, ingress port kind) pairs producing route types
/// and the ingress resource classes allowed to take them, plus the VC-mask
/// and threshold rules that turn those pairs into VCAT cells.

pub mod doal;
pub mod dor;
pub mod vdal;

use petgraph::graph::NodeIndex;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::PolicyError;
use crate::fabric::node::PortKind;
use crate::fabric::tables::{VcatCell, VcatTable};
use crate::fabric::{self, FabricModel};
use crate::policy::{Algorithm, TrafficPolicy};

pub use doal::Doal;
pub use dor::Dor;
pub use vdal::Vdal;

/// Credit threshold used by endpoint-side VCAT rows.
const NODE_THRESHOLD: u8 = 7;

/// How a packet progresses at a switch. `*Direct` minimally aligns a
/// dimension, `*Deroute` moves away on a non-aligned axis (first hop of a
/// two-hop pair), `*Finish` completes a deroute, `Exit` delivers to a local
/// endpoint. Action code 7 is reserved as the invalid slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RouteType {
    XDirect,
    XDeroute,
    XFinish,
    YDirect,
    YDeroute,
    YFinish,
    Exit,
}

impl RouteType {
    /// Hardware action code (u3).
    pub fn action(self) -> u8 {
        match self {
            RouteType::XDirect => 0,
            RouteType::XDeroute => 1,
            RouteType::XFinish => 2,
            RouteType::YDirect => 3,
            RouteType::YDeroute => 4,
            RouteType::YFinish => 5,
            RouteType::Exit => 6,
        }
    }

    /// Deroutes burn one extra hop.
    pub fn hopcount(self) -> u8 {
        u8::from(self.is_deroute())
    }

    pub fn is_deroute(self) -> bool {
        matches!(self, RouteType::XDeroute | RouteType::YDeroute)
    }

    /// X-family route types key the LPRT; Y-family key the MPRT.
    pub fn is_x_family(self) -> bool {
        matches!(
            self,
            RouteType::XDirect | RouteType::XDeroute | RouteType::XFinish
        )
    }
}

/// Per-dimension alignment of an ordered switch pair, written as the
/// two-character codes XY / Xy / xY / xy (uppercase = aligned).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Location {
    /// `XY`: aligned in both dimensions (at the destination switch).
    Aligned,
    /// `Xy`: aligned in X only.
    AlignedX,
    /// `xY`: aligned in Y only.
    AlignedY,
    /// `xy`: aligned in neither dimension.
    Unaligned,
}

impl Location {
    pub fn of(src: (u16, u16), dst: (u16, u16)) -> Self {
        match (src.0 == dst.0, src.1 == dst.1) {
            (true, true) => Location::Aligned,
            (true, false) => Location::AlignedX,
            (false, true) => Location::AlignedY,
            (false, false) => Location::Unaligned,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Location::Aligned => "XY",
            Location::AlignedX => "Xy",
            Location::AlignedY => "xY",
            Location::Unaligned => "xy",
        }
    }
}

/// Ingress resource classes admitted to one route type.
pub type RcList = &'static [u8];

/// `(location, ingress port kind) -> [(route type, admitted RCs)]`.
#[derive(Debug, Default)]
pub struct StateMachine {
    rows: BTreeMap<(Location, PortKind), Vec<(RouteType, RcList)>>,
}

impl StateMachine {
    pub fn from_rows(rows: &[(Location, PortKind, RouteType, RcList)]) -> Self {
        let mut sm = StateMachine::default();
        for &(location, kind, route_type, rcs) in rows {
            sm.rows
                .entry((location, kind))
                .or_default()
                .push((route_type, rcs));
        }
        sm
    }

    pub fn actions(&self, location: Location, kind: PortKind) -> &[(RouteType, RcList)] {
        self.rows
            .get(&(location, kind))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&(Location, PortKind), &Vec<(RouteType, RcList)>)> {
        self.rows.iter()
    }
}

/// Resolved per-protocol-class mask context handed to engines.
#[derive(Debug, Clone)]
pub struct ClassMasks {
    pub pc: u8,
    masks: BTreeMap<u8, u16>,
    pub ingress_rc: u8,
    pub egress_rc: u8,
    algorithm: &'static str,
}

impl ClassMasks {
    /// VC mask of one resource class; missing RCs are policy errors.
    pub fn rc(&self, rc: u8) -> Result<u16, PolicyError> {
        self.masks
            .get(&rc)
            .copied()
            .ok_or(PolicyError::MissingResourceClass {
                pc: self.pc,
                rc,
                algorithm: self.algorithm,
            })
    }

    pub fn ingress(&self) -> Result<u16, PolicyError> {
        self.rc(self.ingress_rc)
    }

    pub fn egress(&self) -> Result<u16, PolicyError> {
        self.rc(self.egress_rc)
    }
}

/// The rules an algorithm contributes on top of the shared derivations.
pub trait RouteEngine {
    fn name(&self) -> &'static str;

    fn state_machine(&self) -> &StateMachine;

    /// Credit threshold of a VCAT cell (active when credits >= threshold).
    fn threshold(&self, kind: PortKind, route_type: RouteType, rc: u8) -> u8;

    /// VC mask of a VCAT cell.
    fn mask(
        &self,
        location: Location,
        kind: PortKind,
        route_type: RouteType,
        rc: u8,
        class: &ClassMasks,
    ) -> Result<u16, PolicyError>;
}

/// Egress port sets for one ordered switch pair.
#[derive(Debug, Clone)]
pub struct SwitchRoutes {
    pub location: Location,
    pub ports: BTreeMap<RouteType, BTreeSet<u32>>,
}

/// The three VC-indexed tables carried by endpoint nodes.
#[derive(Debug, Clone)]
pub struct NodeVcats {
    /// Written to every endpoint port.
    pub switch: VcatTable,
    /// REQ-VCAT, keyed by request VC.
    pub request: VcatTable,
    /// RSP-VCAT, keyed by request-aligned VC (response VC minus delta).
    pub response: VcatTable,
}

/// Port-to-destination mappings for one endpoint node; keys become CIDs or
/// SIDs when the tables are written.
#[derive(Debug, Clone, Default)]
pub struct NodeRoutes {
    pub ssdt: BTreeMap<u32, BTreeSet<u32>>,
    pub msdt: BTreeMap<u32, BTreeSet<u16>>,
    pub lprt: BTreeMap<(u32, u32), BTreeSet<u32>>,
    pub mprt: BTreeMap<(u32, u32), BTreeSet<u16>>,
}

/// Controller over one traffic class: owns the parsed policy, instantiates
/// the engine and derives everything the applier writes.
pub struct Router {
    pub policy: TrafficPolicy,
    engine: Box<dyn RouteEngine>,
    class_masks: Vec<ClassMasks>,
}

impl Router {
    pub fn new(policy: TrafficPolicy) -> Result<Self, PolicyError> {
        let engine: Box<dyn RouteEngine> = match policy.algorithm {
            Algorithm::Dor => Box::new(Dor::new(policy.x_dimension_first)),
            Algorithm::Doal => Box::new(Doal::new(policy.x_dimension_first)),
            Algorithm::Vdal => Box::new(Vdal::new(policy.dimensions)),
        };
        let class_masks = policy
            .classes
            .iter()
            .map(|class| ClassMasks {
                pc: class.pc,
                masks: class
                    .rc_vcs
                    .keys()
                    .filter_map(|&rc| class.rc_mask(rc).map(|mask| (rc, mask)))
                    .collect(),
                ingress_rc: policy.ingress_rc,
                egress_rc: policy.egress_rc_for(class),
                algorithm: engine.name(),
            })
            .collect();
        Ok(Router {
            policy,
            engine,
            class_masks,
        })
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Route types admitted at `(location, kind)`, in state-machine order.
    /// EXIT is withheld unless explicitly allowed, mirroring the transit
    /// passes which never exit mid-route.
    pub fn routing_state(
        &self,
        location: Location,
        kind: PortKind,
        exit_allowed: bool,
    ) -> impl Iterator<Item = (RouteType, RcList)> + '_ {
        self.engine
            .state_machine()
            .actions(location, kind)
            .iter()
            .copied()
            .filter(move |(route_type, _)| exit_allowed || *route_type != RouteType::Exit)
    }

    pub fn threshold(&self, kind: PortKind, route_type: RouteType, rc: u8) -> u8 {
        self.engine.threshold(kind, route_type, rc)
    }

    /// Per-port-kind VCATs for logical switches.
    ///
    /// A cell `(vc, action)` aggregates every state-machine row that admits
    /// the action for the VC's resource class on that ingress kind. Two
    /// rows assigning different masks to one cell is a fatal contradiction.
    pub fn switch_vcats(&self) -> Result<BTreeMap<PortKind, VcatTable>, PolicyError> {
        let mut out = BTreeMap::new();
        for kind in [PortKind::L, PortKind::X, PortKind::Y] {
            let mut table = VcatTable::default();
            for (&(location, row_kind), actions) in self.engine.state_machine().iter() {
                if row_kind != kind {
                    continue;
                }
                for &(route_type, rcs) in actions {
                    for &rc in rcs {
                        for (class, masks) in self.policy.classes.iter().zip(&self.class_masks) {
                            let Some(vcs) = class.rc_vcs.get(&rc) else {
                                continue;
                            };
                            let cell = VcatCell {
                                mask: self.engine.mask(location, kind, route_type, rc, masks)?,
                                threshold: self.engine.threshold(kind, route_type, rc),
                            };
                            for &vc in vcs {
                                set_cell(&mut table, kind, vc, route_type.action(), cell)?;
                            }
                        }
                    }
                }
            }
            out.insert(kind, table);
        }
        Ok(out)
    }

    /// The switch-facing, request and response tables for endpoint nodes.
    pub fn node_vcats(&self) -> Result<NodeVcats, PolicyError> {
        let mut switch = VcatTable::default();
        for (class, masks) in self.policy.classes.iter().zip(&self.class_masks) {
            for (&rc, vcs) in &class.rc_vcs {
                let cell = VcatCell {
                    mask: masks.rc(rc)?,
                    threshold: NODE_THRESHOLD,
                };
                for &vc in vcs {
                    set_cell(&mut switch, PortKind::R, vc, 0, cell)?;
                }
            }
        }

        let mut request = VcatTable::default();
        let request_cell = VcatCell {
            mask: self.class_masks[0].ingress()?,
            threshold: NODE_THRESHOLD,
        };
        for vc in self.policy.request().vcs() {
            request.try_set(vc, 0, request_cell).ok();
        }

        // Response rows are keyed back into request space by the fixed
        // delta so a responder indexes with the VC the request arrived on.
        let delta = self.policy.response_delta();
        let mut response = VcatTable::default();
        let response_cell = VcatCell {
            mask: self.class_masks[1].ingress()?,
            threshold: NODE_THRESHOLD,
        };
        for vc in self.policy.response().vcs() {
            let key = (i16::from(vc) - delta).clamp(0, 15) as u8;
            response.try_set(key, 0, response_cell).ok();
        }

        Ok(NodeVcats {
            switch,
            request,
            response,
        })
    }

    /// Egress port sets for routing from `src` towards `dst`, or `None`
    /// when the pair is unroutable (different planes, or a required
    /// intermediate switch does not exist).
    pub fn switch_to_switch_routes(
        &self,
        fabric: &FabricModel,
        src: NodeIndex,
        dst: NodeIndex,
    ) -> Option<SwitchRoutes> {
        let s = fabric.node(src);
        let d = fabric.node(dst);
        if s.plane != d.plane {
            return None;
        }
        let (sx, sy) = s.coords?;
        let (dx, dy) = d.coords?;
        let location = Location::of((sx, sy), (dx, dy));

        let mut ports: BTreeMap<RouteType, BTreeSet<u32>> = BTreeMap::new();
        if sx != dx {
            // The X host sits at the destination's X offset in our row.
            let host = fabric.switch_at(s.plane, dx, sy)?;
            let direct = fabric.ports_between(src, host);
            let all_x: BTreeSet<u32> = s.ports_of_kind(PortKind::X).into_iter().collect();
            ports.insert(RouteType::XDeroute, &all_x - &direct);
            ports.insert(RouteType::XFinish, direct.clone());
            ports.insert(RouteType::XDirect, direct);
        }
        if sy != dy {
            let host = fabric.switch_at(s.plane, sx, dy)?;
            let direct = fabric.ports_between(src, host);
            let all_y: BTreeSet<u32> = s.ports_of_kind(PortKind::Y).into_iter().collect();
            ports.insert(RouteType::YDeroute, &all_y - &direct);
            ports.insert(RouteType::YFinish, direct.clone());
            ports.insert(RouteType::YDirect, direct);
        }
        Some(SwitchRoutes { location, ports })
    }

    /// Destination mappings for one endpoint node.
    ///
    /// Remote (switch-facing) ports reach every same-subnet GCID that is
    /// not local to the node; local ports reach their closure. Nodes whose
    /// model is listed in `NodeRouters` additionally relay between port
    /// pairs of the same kind.
    pub fn node_routes(&self, fabric: &FabricModel, idx: NodeIndex) -> NodeRoutes {
        let node = fabric.node(idx);
        let local: BTreeSet<u32> = node.closure_gcids();
        let own_or_local: BTreeSet<u32> = node.gcids.union(&local).copied().collect();
        let remote_same: BTreeSet<u32> = fabric
            .all_gcids
            .iter()
            .copied()
            .filter(|&g| fabric::sid(g) == node.subnet && !own_or_local.contains(&g))
            .collect();
        let foreign_sids: BTreeSet<u16> = fabric
            .all_gcids
            .iter()
            .copied()
            .filter(|&g| fabric::sid(g) != node.subnet)
            .map(fabric::sid)
            .collect();
        let relay = self.policy.node_routers.contains(&node.model);
        let r_ports = node.ports_of_kind(PortKind::R);
        let l_ports = node.ports_of_kind(PortKind::L);
        let local_reach = |port: u32| -> BTreeSet<u32> {
            node.closure
                .get(&port)
                .map(|gcids| fabric::gcids_in_subnet(gcids, node.subnet))
                .unwrap_or_default()
        };

        let mut routes = NodeRoutes::default();
        for &r in &r_ports {
            if !remote_same.is_empty() {
                routes.ssdt.insert(r, remote_same.clone());
            }
            if !foreign_sids.is_empty() {
                routes.msdt.insert(r, foreign_sids.clone());
            }
        }
        for &l in &l_ports {
            let reach = local_reach(l);
            if !reach.is_empty() {
                routes.ssdt.insert(l, reach);
            }
        }

        for &l in &l_ports {
            for &r in &r_ports {
                if !remote_same.is_empty() {
                    routes.lprt.insert((l, r), remote_same.clone());
                }
                if !foreign_sids.is_empty() {
                    routes.mprt.insert((l, r), foreign_sids.clone());
                }
                let reach = local_reach(l);
                if !reach.is_empty() {
                    routes.lprt.insert((r, l), reach);
                }
            }
        }
        if relay {
            for &i in &r_ports {
                for &e in &r_ports {
                    if i == e {
                        continue;
                    }
                    if !remote_same.is_empty() {
                        routes.lprt.insert((i, e), remote_same.clone());
                    }
                    if !foreign_sids.is_empty() {
                        routes.mprt.insert((i, e), foreign_sids.clone());
                    }
                }
            }
            for &i in &l_ports {
                for &e in &l_ports {
                    if i == e {
                        continue;
                    }
                    let reach = local_reach(e);
                    if !reach.is_empty() {
                        routes.lprt.insert((i, e), reach);
                    }
                }
            }
        }
        routes
    }
}

fn set_cell(
    table: &mut VcatTable,
    kind: PortKind,
    vc: u8,
    action: u8,
    cell: VcatCell,
) -> Result<(), PolicyError> {
    table
        .try_set(vc, action, cell)
        .map_err(|existing| PolicyError::VcatContradiction {
            kind: kind.as_str(),
            vc,
            action,
            a: existing.mask,
            b: cell.mask,
        })
}
