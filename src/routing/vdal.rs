// src/routing/vdal.rs

/// Valiant dimension-adaptive routing: progress is allowed in both
/// dimensions at once and deroutes are bounded by the resource-class
/// envelope, the RC incrementing at every non-local traversal.

use crate::error::PolicyError;
use crate::fabric::node::PortKind;
use crate::routing::Location::{Aligned, AlignedX, AlignedY, Unaligned};
use crate::routing::RouteType::{Exit, XDeroute, XDirect, YDeroute, YDirect};
use crate::routing::{ClassMasks, Location, RcList, RouteEngine, RouteType, StateMachine};

const RC0: RcList = &[0];
const RC01: RcList = &[0, 1];
const RC12: RcList = &[1, 2];
const RC012: RcList = &[0, 1, 2];
const RC0123: RcList = &[0, 1, 2, 3];

pub struct Vdal {
    sm: StateMachine,
    dimensions: u32,
}

impl Vdal {
    pub fn new(dimensions: u32) -> Self {
        use PortKind::{L, X, Y};
        let rows: &[(Location, PortKind, RouteType, RcList)] = &[
            (Aligned, L, Exit, RC0123),
            (Aligned, X, Exit, RC0123),
            (Aligned, Y, Exit, RC0123),
            (AlignedX, L, YDirect, RC0123),
            (AlignedX, L, YDeroute, RC0123),
            (AlignedX, X, YDirect, RC012),
            (AlignedX, X, YDeroute, RC01),
            (AlignedX, Y, YDirect, RC12),
            (AlignedY, L, XDirect, RC0123),
            (AlignedY, L, XDeroute, RC0123),
            (AlignedY, X, XDirect, RC12),
            (AlignedY, Y, XDirect, RC012),
            (AlignedY, Y, XDeroute, RC01),
            (Unaligned, L, XDirect, RC0123),
            (Unaligned, L, XDeroute, RC0123),
            (Unaligned, L, YDirect, RC0123),
            (Unaligned, L, YDeroute, RC0123),
            (Unaligned, X, XDirect, RC01),
            (Unaligned, X, YDirect, RC01),
            (Unaligned, X, YDeroute, RC0),
            (Unaligned, Y, XDirect, RC01),
            (Unaligned, Y, XDeroute, RC0),
            (Unaligned, Y, YDirect, RC01),
        ];
        Vdal {
            sm: StateMachine::from_rows(rows),
            dimensions,
        }
    }
}

impl RouteEngine for Vdal {
    fn name(&self) -> &'static str {
        "VDAL"
    }

    fn state_machine(&self) -> &StateMachine {
        &self.sm
    }

    fn threshold(&self, kind: PortKind, route_type: RouteType, rc: u8) -> u8 {
        let budget = (2 * self.dimensions).min(7) as u8;
        if !route_type.is_deroute() {
            7
        } else if kind == PortKind::L {
            budget
        } else {
            budget.saturating_sub(rc)
        }
    }

    fn mask(
        &self,
        location: Location,
        kind: PortKind,
        _route_type: RouteType,
        rc: u8,
        class: &ClassMasks,
    ) -> Result<u16, PolicyError> {
        if location == Aligned {
            // Destination switch: configured egress RCs.
            class.egress()
        } else if kind == PortKind::L {
            // Originating switch: configured ingress RCs.
            class.ingress()
        } else {
            // Every further traversal climbs one RC.
            class.rc(rc + 1)
        }
    }
}
