// src/routing/dor.rs

/// Strict dimension-order routing: every packet fully corrects the first
/// dimension, then the second. One resource class, no adaptivity.

use crate::error::PolicyError;
use crate::fabric::node::PortKind;
use crate::routing::Location::{Aligned, AlignedX, AlignedY, Unaligned};
use crate::routing::RouteType::{Exit, XDirect, YDirect};
use crate::routing::{ClassMasks, Location, RcList, RouteEngine, RouteType, StateMachine};

const RC0: RcList = &[0];

pub struct Dor {
    sm: StateMachine,
}

impl Dor {
    pub fn new(x_first: bool) -> Self {
        use PortKind::{L, X, Y};
        let rows: &[(Location, PortKind, RouteType, RcList)] = if x_first {
            &[
                (Aligned, L, Exit, RC0),
                (Aligned, X, Exit, RC0),
                (Aligned, Y, Exit, RC0),
                (AlignedX, L, YDirect, RC0),
                (AlignedX, X, YDirect, RC0),
                (AlignedY, L, XDirect, RC0),
                (Unaligned, L, XDirect, RC0),
            ]
        } else {
            &[
                (Aligned, L, Exit, RC0),
                (Aligned, X, Exit, RC0),
                (Aligned, Y, Exit, RC0),
                (AlignedX, L, YDirect, RC0),
                (AlignedY, L, XDirect, RC0),
                (AlignedY, Y, XDirect, RC0),
                (Unaligned, L, YDirect, RC0),
            ]
        };
        Dor {
            sm: StateMachine::from_rows(rows),
        }
    }
}

impl RouteEngine for Dor {
    fn name(&self) -> &'static str {
        "DOR"
    }

    fn state_machine(&self) -> &StateMachine {
        &self.sm
    }

    fn threshold(&self, _kind: PortKind, _route_type: RouteType, _rc: u8) -> u8 {
        7
    }

    fn mask(
        &self,
        _location: Location,
        _kind: PortKind,
        _route_type: RouteType,
        _rc: u8,
        class: &ClassMasks,
    ) -> Result<u16, PolicyError> {
        // Only RC0 carries traffic under strict dimension order.
        class.rc(0)
    }
}
