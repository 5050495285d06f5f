// src/policy.rs

/// Traffic-class policy parsing. A policy names one traffic class holding a
/// request and a response protocol class; each protocol class lists its
/// resource classes and the virtual channels backing them. The parsed form
/// is the ordered (TC, PC, RC, VC) map plus per-class bit masks.

use regex::Regex;
use std::collections::BTreeMap;

use crate::config::FabricConfig;
use crate::error::PolicyError;
use crate::fabric::node::Model;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Dor,
    Doal,
    Vdal,
}

impl Algorithm {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "DOR" => Some(Algorithm::Dor),
            "DOAL" => Some(Algorithm::Doal),
            "VDAL" => Some(Algorithm::Vdal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Dor => "DOR",
            Algorithm::Doal => "DOAL",
            Algorithm::Vdal => "VDAL",
        }
    }
}

/// One lane of the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VcEntry {
    pub tc: u8,
    pub pc: u8,
    pub rc: u8,
    pub vc: u8,
}

#[derive(Debug, Clone)]
pub struct ProtocolClass {
    pub pc: u8,
    /// RC -> VCs, in document order.
    pub rc_vcs: BTreeMap<u8, Vec<u8>>,
}

impl ProtocolClass {
    /// All VCs of the class, ascending.
    pub fn vcs(&self) -> Vec<u8> {
        let mut vcs: Vec<u8> = self.rc_vcs.values().flatten().copied().collect();
        vcs.sort_unstable();
        vcs
    }

    /// Bit mask (`1 << vc`) over the VCs of one resource class.
    pub fn rc_mask(&self, rc: u8) -> Option<u16> {
        self.rc_vcs
            .get(&rc)
            .map(|vcs| vcs.iter().fold(0u16, |mask, &vc| mask | (1 << vc)))
    }

    pub fn max_rc(&self) -> u8 {
        self.rc_vcs.keys().copied().max().unwrap_or(0)
    }

    pub fn min_vc(&self) -> u8 {
        self.vcs().first().copied().unwrap_or(0)
    }

    pub fn rc_of(&self, vc: u8) -> Option<u8> {
        self.rc_vcs
            .iter()
            .find(|(_, vcs)| vcs.contains(&vc))
            .map(|(rc, _)| *rc)
    }
}

#[derive(Debug, Clone)]
pub struct TrafficPolicy {
    pub tc: u8,
    pub algorithm: Algorithm,
    pub x_dimension_first: bool,
    pub ingress_rc: u8,
    /// `None` selects the last RC of the protocol class.
    pub egress_rc: Option<u8>,
    /// Models allowed to relay traffic for foreign destinations.
    pub node_routers: Vec<Model>,
    pub dimensions: u32,
    /// Ordered (TC, PC, RC, VC) tuples.
    pub vc_map: Vec<VcEntry>,
    /// Protocol classes ascending by number; `[0]` is the request class,
    /// `[1]` the response class.
    pub classes: Vec<ProtocolClass>,
}

impl TrafficPolicy {
    /// Parse and validate the `Routing` section of a configuration document.
    pub fn from_config(cfg: &FabricConfig) -> Result<Self, PolicyError> {
        let tc_re = Regex::new(r"^TC(\d+)$").unwrap();
        let mut sections = cfg
            .routing
            .iter()
            .filter_map(|(key, section)| {
                tc_re
                    .captures(key)
                    .and_then(|c| c[1].parse::<u8>().ok())
                    .map(|tc| (tc, section))
            })
            .collect::<Vec<_>>();
        if sections.len() != 1 {
            return Err(PolicyError::TrafficClassCount {
                count: sections.len(),
            });
        }
        let (tc, section) = sections.remove(0);

        let params = &section.parameters;
        let algorithm_name = params
            .algorithm
            .as_deref()
            .ok_or(PolicyError::MissingAlgorithm { tc })?;
        let algorithm =
            Algorithm::from_name(algorithm_name).ok_or_else(|| PolicyError::UnknownAlgorithm {
                tc,
                name: algorithm_name.to_string(),
            })?;
        let mut node_routers = Vec::new();
        for name in &params.node_routers {
            node_routers.push(Model::from_name(name).ok_or_else(|| {
                PolicyError::UnknownRelayModel {
                    tc,
                    model: name.clone(),
                }
            })?);
        }
        let dimensions = params
            .dimensions
            .or(cfg.fabric_constants().dimensions)
            .unwrap_or(2);

        // Protocol classes; keys that do not look like PC<n>/RC<n>/VC<n> are
        // passed over, matching the original tooling.
        let pc_re = Regex::new(r"^PC(\d+)$").unwrap();
        let rc_re = Regex::new(r"^RC(\d+)$").unwrap();
        let vc_re = Regex::new(r"^VC(\d+)$").unwrap();
        let mut classes: Vec<ProtocolClass> = Vec::new();
        let mut vc_map: Vec<VcEntry> = Vec::new();
        let mut pcs: Vec<(u8, &BTreeMap<String, Vec<String>>)> = section
            .classes
            .iter()
            .filter_map(|(key, rcs)| {
                pc_re
                    .captures(key)
                    .and_then(|c| c[1].parse::<u8>().ok())
                    .map(|pc| (pc, rcs))
            })
            .collect();
        pcs.sort_by_key(|(pc, _)| *pc);
        for (pc, rcs) in pcs {
            let mut rc_vcs: BTreeMap<u8, Vec<u8>> = BTreeMap::new();
            let mut numbered: Vec<(u8, &Vec<String>)> = rcs
                .iter()
                .filter_map(|(key, vcs)| {
                    rc_re
                        .captures(key)
                        .and_then(|c| c[1].parse::<u8>().ok())
                        .map(|rc| (rc, vcs))
                })
                .collect();
            numbered.sort_by_key(|(rc, _)| *rc);
            for (rc, vc_names) in numbered {
                let mut vcs = Vec::new();
                for name in vc_names {
                    let vc = vc_re
                        .captures(name)
                        .and_then(|c| c[1].parse::<u8>().ok())
                        .ok_or_else(|| PolicyError::MalformedKey {
                            tc,
                            key: name.clone(),
                        })?;
                    if vc >= 16 {
                        return Err(PolicyError::VcOutOfRange { pc, vc });
                    }
                    if let Some([_, hi]) = cfg.fabric_constants().vcs {
                        if u32::from(vc) > hi {
                            return Err(PolicyError::VcOutOfRange { pc, vc });
                        }
                    }
                    vcs.push(vc);
                    vc_map.push(VcEntry { tc, pc, rc, vc });
                }
                rc_vcs.insert(rc, vcs);
            }
            classes.push(ProtocolClass { pc, rc_vcs });
        }

        let policy = TrafficPolicy {
            tc,
            algorithm,
            x_dimension_first: params.x_dimension_first,
            ingress_rc: params.ingress_rc,
            egress_rc: (params.egress_rc >= 0).then(|| params.egress_rc.unsigned_abs() as u8),
            node_routers,
            dimensions,
            vc_map,
            classes,
        };
        policy.validate()?;
        Ok(policy)
    }

    fn validate(&self) -> Result<(), PolicyError> {
        if self.classes.len() != 2 {
            return Err(PolicyError::ProtocolClassCount {
                count: self.classes.len(),
            });
        }
        for class in &self.classes {
            let vcs = class.vcs();
            let contiguous = vcs.windows(2).all(|w| w[1] == w[0] + 1);
            if vcs.is_empty() || !contiguous {
                return Err(PolicyError::NonContiguousVcs {
                    pc: class.pc,
                    vcs,
                });
            }
        }

        // The response class must mirror the request class so that response
        // VCs align to request VCs by a fixed delta.
        let (request, response) = (self.request(), self.response());
        let delta = self.response_delta();
        let aligned = request.rc_vcs.len() == response.rc_vcs.len()
            && request.rc_vcs.iter().all(|(rc, req_vcs)| {
                response.rc_vcs.get(rc).is_some_and(|rsp_vcs| {
                    let mut req: Vec<i16> = req_vcs.iter().map(|&v| i16::from(v)).collect();
                    let mut rsp: Vec<i16> = rsp_vcs.iter().map(|&v| i16::from(v) - delta).collect();
                    req.sort_unstable();
                    rsp.sort_unstable();
                    req == rsp
                })
            });
        if !aligned {
            return Err(PolicyError::MisalignedClasses {
                request: request.pc,
                response: response.pc,
            });
        }

        for class in &self.classes {
            if class.rc_mask(self.ingress_rc).is_none() {
                return Err(PolicyError::BadResourceClass {
                    pc: class.pc,
                    rc: self.ingress_rc,
                    role: "ingress",
                });
            }
            if let Some(egress) = self.egress_rc {
                if class.rc_mask(egress).is_none() {
                    return Err(PolicyError::BadResourceClass {
                        pc: class.pc,
                        rc: egress,
                        role: "egress",
                    });
                }
            }
        }
        Ok(())
    }

    pub fn request(&self) -> &ProtocolClass {
        &self.classes[0]
    }

    pub fn response(&self) -> &ProtocolClass {
        &self.classes[1]
    }

    /// Offset from a request VC to the aligned response VC.
    pub fn response_delta(&self) -> i16 {
        i16::from(self.response().min_vc()) - i16::from(self.request().min_vc())
    }

    /// Resolved egress RC for one protocol class.
    pub fn egress_rc_for(&self, class: &ProtocolClass) -> u8 {
        self.egress_rc.unwrap_or_else(|| class.max_rc())
    }
}
