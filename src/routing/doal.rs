// src/routing/doal.rs

/// Dimension-order-adaptive routing: adds a deroute alternative on the
/// first traversed dimension. A deroute starts on RC1 and its finish drains
/// back to the direct path; two resource classes bound the extra hop.

use crate::error::PolicyError;
use crate::fabric::node::PortKind;
use crate::routing::Location::{Aligned, AlignedX, AlignedY, Unaligned};
use crate::routing::RouteType::{Exit, XDeroute, XDirect, XFinish, YDeroute, YDirect, YFinish};
use crate::routing::{ClassMasks, Location, RcList, RouteEngine, RouteType, StateMachine};

const RC01: RcList = &[0, 1];
const RC1: RcList = &[1];

pub struct Doal {
    sm: StateMachine,
}

impl Doal {
    pub fn new(x_first: bool) -> Self {
        use PortKind::{L, X, Y};
        let rows: &[(Location, PortKind, RouteType, RcList)] = if x_first {
            &[
                (Aligned, L, Exit, RC01),
                (Aligned, X, Exit, RC01),
                (Aligned, Y, Exit, RC01),
                (AlignedX, L, YDirect, RC01),
                (AlignedX, L, YDeroute, RC01),
                (AlignedX, X, YDirect, RC01),
                (AlignedX, X, YDeroute, RC01),
                (AlignedX, Y, YFinish, RC1),
                (AlignedY, L, XDirect, RC01),
                (AlignedY, L, XDeroute, RC01),
                (AlignedY, X, XFinish, RC1),
                (Unaligned, L, XDirect, RC01),
                (Unaligned, L, XDeroute, RC01),
                (Unaligned, X, XFinish, RC1),
            ]
        } else {
            &[
                (Aligned, L, Exit, RC01),
                (Aligned, X, Exit, RC01),
                (Aligned, Y, Exit, RC01),
                (AlignedX, L, YDirect, RC01),
                (AlignedX, L, YDeroute, RC01),
                (AlignedX, Y, YFinish, RC1),
                (AlignedY, L, XDirect, RC01),
                (AlignedY, L, XDeroute, RC01),
                (AlignedY, X, XFinish, RC1),
                (AlignedY, Y, XDirect, RC01),
                (AlignedY, Y, XDeroute, RC01),
                (Unaligned, L, YDirect, RC01),
                (Unaligned, L, YDeroute, RC01),
                (Unaligned, Y, YFinish, RC1),
            ]
        };
        Doal {
            sm: StateMachine::from_rows(rows),
        }
    }
}

impl RouteEngine for Doal {
    fn name(&self) -> &'static str {
        "DOAL"
    }

    fn state_machine(&self) -> &StateMachine {
        &self.sm
    }

    fn threshold(&self, _kind: PortKind, _route_type: RouteType, rc: u8) -> u8 {
        if rc == 0 {
            2
        } else {
            1
        }
    }

    fn mask(
        &self,
        location: Location,
        _kind: PortKind,
        route_type: RouteType,
        _rc: u8,
        class: &ClassMasks,
    ) -> Result<u16, PolicyError> {
        if location == Aligned {
            // At the destination switch: configured egress RCs.
            class.egress()
        } else if route_type.is_deroute() {
            // First hop of two.
            class.rc(1)
        } else {
            // Completing a dimension.
            class.rc(0)
        }
    }
}
