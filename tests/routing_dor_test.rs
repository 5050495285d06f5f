// tests/routing_dor_test.rs

mod common;

use common::{grid_config, DOR_POLICY};
use fabric_router::fabric::node::PortKind;
use fabric_router::fabric::tables::RouteEntry;
use fabric_router::routing::{Location, RouteType};

/// Minimal two-switch fabric: C0 on S0 port 0, switches linked over port 6.
fn minimal_config() -> String {
    format!(
        r#"{{
  "Nodes": {{
    "Switch": {{
      "S0": ["10.0.0.1", "0.0", "0.0.0.1", true, ["0x010"]],
      "S1": ["10.0.0.2", "0.1", "0.0.0.2", true, ["0x1010"]]
    }},
    "Compute": {{
      "C0": ["10.0.1.1", "0.0.0", "0.1.0.1", true, ["0x001"]]
    }}
  }},
  "Connections": {{
    "C0,0": "S0,0",
    "S0,6": "S1,6"
  }},
  "Constants": {{
    "Switch": {{ "SWITCHES": [1, 2], "SWITCH_PORTS": [0, 59] }},
    "Compute": {{ "FABRIC_ADAPTER_PORTS": [0, 1] }}
  }},
  "Routing": {{ {DOR_POLICY} }}
}}"#
    )
}

#[test]
fn local_delivery_exits_on_the_endpoint_port() {
    let (fabric, _router) = common::route(&minimal_config());

    let s01 = fabric.by_name("S0.1").unwrap();
    let node = fabric.node(s01);
    // Every ingress except the endpoint port itself carries exactly one
    // EXIT entry for CID 1.
    for (&port, state) in &node.ports {
        let set = state.lprt.get(1);
        if port == 0 {
            assert!(set.is_none(), "reflected entry on port 0");
            continue;
        }
        let set = set.expect("exit entry");
        assert_eq!(set.mhc, 7);
        assert_eq!(set.entries.len(), 1);
        let entry = set.entries.iter().next().unwrap();
        assert_eq!(
            *entry,
            RouteEntry {
                vc_action: 6,
                hop_count: 0,
                egress: 0
            }
        );
    }
}

#[test]
fn dor_routes_x_before_y_across_the_grid() {
    let (fabric, router) = common::route(&grid_config(DOR_POLICY));

    let sa1 = fabric.by_name("SA.1").unwrap();
    let sa2 = fabric.by_name("SA.2").unwrap();
    let sb2 = fabric.by_name("SB.2").unwrap();

    // (0,0) against (1,1): the only admitted route is X_DIRECT towards (1,0).
    let routes = router.switch_to_switch_routes(&fabric, sa1, sb2).unwrap();
    assert_eq!(routes.location, Location::Unaligned);
    let state: Vec<RouteType> = router
        .routing_state(routes.location, PortKind::L, false)
        .map(|(rt, _)| rt)
        .collect();
    assert_eq!(state, vec![RouteType::XDirect]);
    assert!(router
        .routing_state(routes.location, PortKind::X, false)
        .next()
        .is_none());
    assert_eq!(
        routes.ports[&RouteType::XDirect],
        [5].into_iter().collect()
    );

    // Written entry: LPRT for CB's CID on the L ingress, egress towards SA.2.
    let set = fabric.node(sa1).ports[&0].lprt.get(2).expect("x leg");
    assert_eq!(set.mhc, 1);
    assert_eq!(
        set.entries.iter().copied().collect::<Vec<_>>(),
        vec![RouteEntry {
            vc_action: 0,
            hop_count: 0,
            egress: 5
        }]
    );

    // (1,0) against (1,1): Y_DIRECT towards (1,1), keyed by subnet.
    let set = fabric.node(sa2).ports[&35].mprt.get(1).expect("y leg");
    assert_eq!(set.mhc, 2);
    assert_eq!(
        set.entries.iter().copied().collect::<Vec<_>>(),
        vec![RouteEntry {
            vc_action: 3,
            hop_count: 0,
            egress: 36
        }]
    );

    // (1,1): local delivery.
    let set = fabric.node(sb2).ports[&36].lprt.get(2).expect("exit");
    assert_eq!(set.mhc, 7);
    assert_eq!(
        set.entries.iter().copied().collect::<Vec<_>>(),
        vec![RouteEntry {
            vc_action: 6,
            hop_count: 0,
            egress: 32
        }]
    );
}

#[test]
fn dor_vcats_use_only_rc0_masks() {
    let (_fabric, router) = common::route(&grid_config(DOR_POLICY));
    let vcats = router.switch_vcats().unwrap();

    // Request VC0 and response VC1; every populated cell carries the RC0
    // mask of its own protocol class.
    let l = &vcats[&PortKind::L];
    assert_eq!(l.cell(0, 0).unwrap().mask, 0b0001); // X_DIRECT
    assert_eq!(l.cell(0, 3).unwrap().mask, 0b0001); // Y_DIRECT
    assert_eq!(l.cell(0, 6).unwrap().mask, 0b0001); // EXIT
    assert_eq!(l.cell(1, 0).unwrap().mask, 0b0010);
    for vc in [0u8, 1] {
        for action in [1u8, 2, 4, 5, 7] {
            assert!(l.cell(vc, action).is_none(), "vc {vc} action {action}");
        }
        // Thresholds are universally 7 under strict dimension order.
        assert_eq!(l.cell(vc, 0).unwrap().threshold, 7);
    }

    let x = &vcats[&PortKind::X];
    assert!(x.cell(0, 0).is_none());
    assert_eq!(x.cell(0, 3).unwrap().mask, 0b0001);
    assert_eq!(x.cell(0, 6).unwrap().mask, 0b0001);

    let y = &vcats[&PortKind::Y];
    assert_eq!(
        y.rows[&0].keys().copied().collect::<Vec<u8>>(),
        vec![6],
        "Y ingress only exits"
    );
}
