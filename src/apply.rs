// src/apply.rs

/// Table application: walks the fabric twice, first filling switch relay
/// tables (core pass), then endpoint destination tables (edge pass). All
/// writes go through the model's typed writers.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::error::PolicyError;
use crate::fabric::node::PortKind;
use crate::fabric::tables::{RouteEntry, VcatTable};
use crate::fabric::{self, FabricModel};
use crate::routing::{NodeVcats, RouteType, Router};

const X_FAMILY_MHC: u8 = 1;
const Y_FAMILY_MHC: u8 = 2;
const EXIT_MHC: u8 = 7;
const NODE_MHC: u8 = 7;

/// Fill every routing table in the model. VCAT synthesis runs first so a
/// contradictory policy rejects the whole job before any table is written.
pub fn apply(fabric: &mut FabricModel, router: &Router) -> Result<(), PolicyError> {
    let switch_vcats = router.switch_vcats()?;
    let node_vcats = router.node_vcats()?;
    apply_core(fabric, router, &switch_vcats);
    apply_edge(fabric, router, &node_vcats);
    Ok(())
}

fn apply_core(fabric: &mut FabricModel, router: &Router, vcats: &BTreeMap<PortKind, VcatTable>) {
    let switches = fabric.logical_switches();
    for &src in &switches {
        // Relay entries towards every other switch's endpoints.
        for &dst in &switches {
            if dst == src {
                continue;
            }
            let Some(routes) = router.switch_to_switch_routes(fabric, src, dst) else {
                continue;
            };
            let dst_gcids = fabric.node(dst).closure_gcids();
            if dst_gcids.is_empty() {
                continue;
            }
            let dst_sids: BTreeSet<u16> = dst_gcids.iter().map(|&g| fabric::sid(g)).collect();
            debug!(
                "{} -> {}: location {}",
                fabric.node(src).name,
                fabric.node(dst).name,
                routes.location.code()
            );
            for kind in [PortKind::L, PortKind::X, PortKind::Y] {
                let ingress = fabric.node(src).ports_of_kind(kind);
                if ingress.is_empty() {
                    continue;
                }
                for (route_type, _) in router.routing_state(routes.location, kind, false) {
                    let Some(egress) = routes.ports.get(&route_type) else {
                        continue;
                    };
                    for &ip in &ingress {
                        for &ep in egress {
                            if ep == ip {
                                continue;
                            }
                            let entry = RouteEntry {
                                vc_action: route_type.action(),
                                hop_count: route_type.hopcount(),
                                egress: ep,
                            };
                            if route_type.is_x_family() {
                                for &g in &dst_gcids {
                                    fabric.set_lprt(src, ip, fabric::cid(g), X_FAMILY_MHC, entry);
                                }
                            } else {
                                for &s in &dst_sids {
                                    fabric.set_mprt(src, ip, s, Y_FAMILY_MHC, entry);
                                }
                            }
                        }
                    }
                }
            }
        }

        // Local delivery: every other port exits through the L port that
        // faces the destination endpoint.
        let closure = fabric.node(src).closure.clone();
        let all_ports: Vec<u32> = fabric.node(src).ports.keys().copied().collect();
        for (lp, gcids) in closure {
            for &ip in &all_ports {
                if ip == lp {
                    continue;
                }
                let entry = RouteEntry {
                    vc_action: RouteType::Exit.action(),
                    hop_count: 0,
                    egress: lp,
                };
                for &g in &gcids {
                    fabric.set_lprt(src, ip, fabric::cid(g), EXIT_MHC, entry);
                }
            }
        }

        let kinds: Vec<(u32, PortKind)> = fabric
            .node(src)
            .ports
            .values()
            .map(|p| (p.index, p.kind))
            .collect();
        for (port, kind) in kinds {
            if let Some(table) = vcats.get(&kind) {
                fabric.set_vcat(src, port, table.clone());
            }
        }
    }
}

fn apply_edge(fabric: &mut FabricModel, router: &Router, vcats: &NodeVcats) {
    for idx in fabric.endpoint_nodes() {
        let routes = router.node_routes(fabric, idx);
        debug!(
            "{}: {} SSDT ports, {} MSDT ports, {} relay pairs",
            fabric.node(idx).name,
            routes.ssdt.len(),
            routes.msdt.len(),
            routes.lprt.len() + routes.mprt.len()
        );
        for (egress, gcids) in &routes.ssdt {
            for &g in gcids {
                fabric.set_ssdt(idx, fabric::cid(g), NODE_MHC, node_entry(*egress));
            }
        }
        for (egress, sids) in &routes.msdt {
            for &s in sids {
                fabric.set_msdt(idx, s, NODE_MHC, node_entry(*egress));
            }
        }
        for ((ingress, egress), gcids) in &routes.lprt {
            for &g in gcids {
                fabric.set_lprt(idx, *ingress, fabric::cid(g), NODE_MHC, node_entry(*egress));
            }
        }
        for ((ingress, egress), sids) in &routes.mprt {
            for &s in sids {
                fabric.set_mprt(idx, *ingress, s, NODE_MHC, node_entry(*egress));
            }
        }

        let ports: Vec<u32> = fabric.node(idx).ports.keys().copied().collect();
        for port in ports {
            fabric.set_vcat(idx, port, vcats.switch.clone());
        }
        fabric.set_req_vcat(idx, vcats.request.clone());
        fabric.set_rsp_vcat(idx, vcats.response.clone());
    }
}

fn node_entry(egress: u32) -> RouteEntry {
    RouteEntry {
        vc_action: 0,
        hop_count: 0,
        egress,
    }
}
