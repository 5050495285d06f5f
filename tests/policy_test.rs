// tests/policy_test.rs

mod common;

use fabric_router::error::PolicyError;
use fabric_router::policy::{Algorithm, TrafficPolicy};
use fabric_router::routing::Router;

fn policy_of(routing: &str) -> Result<TrafficPolicy, PolicyError> {
    let json = format!(
        r#"{{ "Nodes": {{}}, "Connections": {{}}, "Constants": {{}}, "Routing": {{ {routing} }} }}"#
    );
    TrafficPolicy::from_config(&common::parse(&json))
}

#[test]
fn vc_map_is_ordered_by_pc_then_rc() {
    let policy = policy_of(
        r#""TC0": {
            "Parameters": { "Algorithm": "DOAL" },
            "PC0": { "RC0": ["VC0"], "RC1": ["VC1"] },
            "PC1": { "RC0": ["VC2"], "RC1": ["VC3"] }
        }"#,
    )
    .unwrap();
    assert_eq!(policy.algorithm, Algorithm::Doal);
    let lanes: Vec<(u8, u8, u8)> = policy.vc_map.iter().map(|e| (e.pc, e.rc, e.vc)).collect();
    assert_eq!(lanes, vec![(0, 0, 0), (0, 1, 1), (1, 0, 2), (1, 1, 3)]);
    assert_eq!(policy.request().rc_mask(0), Some(0b0001));
    assert_eq!(policy.request().rc_mask(1), Some(0b0010));
    assert_eq!(policy.response().rc_mask(1), Some(0b1000));
}

#[test]
fn missing_algorithm_is_rejected() {
    let err = policy_of(
        r#""TC0": { "Parameters": {}, "PC0": { "RC0": ["VC0"] }, "PC1": { "RC0": ["VC1"] } }"#,
    )
    .unwrap_err();
    assert!(matches!(err, PolicyError::MissingAlgorithm { tc: 0 }));
}

#[test]
fn unknown_algorithm_is_rejected() {
    let err = policy_of(
        r#""TC0": {
            "Parameters": { "Algorithm": "SPIRAL" },
            "PC0": { "RC0": ["VC0"] },
            "PC1": { "RC0": ["VC1"] }
        }"#,
    )
    .unwrap_err();
    assert!(matches!(err, PolicyError::UnknownAlgorithm { name, .. } if name == "SPIRAL"));
}

#[test]
fn exactly_one_traffic_class_is_required() {
    assert!(matches!(
        policy_of(""),
        Err(PolicyError::TrafficClassCount { count: 0 })
    ));
    let err = policy_of(
        r#""TC0": { "Parameters": { "Algorithm": "DOR" }, "PC0": { "RC0": ["VC0"] }, "PC1": { "RC0": ["VC1"] } },
           "TC1": { "Parameters": { "Algorithm": "DOR" }, "PC0": { "RC0": ["VC0"] }, "PC1": { "RC0": ["VC1"] } }"#,
    )
    .unwrap_err();
    assert!(matches!(err, PolicyError::TrafficClassCount { count: 2 }));
}

#[test]
fn non_contiguous_vcs_are_rejected() {
    let err = policy_of(
        r#""TC0": {
            "Parameters": { "Algorithm": "DOAL" },
            "PC0": { "RC0": ["VC0"], "RC1": ["VC2"] },
            "PC1": { "RC0": ["VC4"], "RC1": ["VC6"] }
        }"#,
    )
    .unwrap_err();
    assert!(matches!(err, PolicyError::NonContiguousVcs { pc: 0, .. }));
}

#[test]
fn two_protocol_classes_are_required() {
    let err = policy_of(
        r#""TC0": { "Parameters": { "Algorithm": "DOR" }, "PC0": { "RC0": ["VC0"] } }"#,
    )
    .unwrap_err();
    assert!(matches!(err, PolicyError::ProtocolClassCount { count: 1 }));

    let err = policy_of(
        r#""TC0": {
            "Parameters": { "Algorithm": "DOR" },
            "PC0": { "RC0": ["VC0"] },
            "PC1": { "RC0": ["VC1"] },
            "PC2": { "RC0": ["VC2"] }
        }"#,
    )
    .unwrap_err();
    assert!(matches!(err, PolicyError::ProtocolClassCount { count: 3 }));
}

#[test]
fn misaligned_protocol_classes_are_rejected() {
    let err = policy_of(
        r#""TC0": {
            "Parameters": { "Algorithm": "DOAL" },
            "PC0": { "RC0": ["VC0"], "RC1": ["VC1"] },
            "PC1": { "RC0": ["VC2", "VC3"] }
        }"#,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        PolicyError::MisalignedClasses {
            request: 0,
            response: 1
        }
    ));
}

#[test]
fn response_rows_are_keyed_back_into_request_space() {
    // Request VCs {0,1}, response VCs {2,3}: delta 2, RSP-VCAT keys 0 and 1.
    let policy = policy_of(
        r#""TC0": {
            "Parameters": { "Algorithm": "DOAL" },
            "PC0": { "RC0": ["VC0"], "RC1": ["VC1"] },
            "PC1": { "RC0": ["VC2"], "RC1": ["VC3"] }
        }"#,
    )
    .unwrap();
    assert_eq!(policy.response_delta(), 2);

    let router = Router::new(policy).unwrap();
    let vcats = router.node_vcats().unwrap();
    let keys: Vec<u8> = vcats.response.rows.keys().copied().collect();
    assert_eq!(keys, vec![0, 1]);
    let keys: Vec<u8> = vcats.request.rows.keys().copied().collect();
    assert_eq!(keys, vec![0, 1]);
}

#[test]
fn ingress_rc_must_exist() {
    let err = policy_of(
        r#""TC0": {
            "Parameters": { "Algorithm": "DOR", "IngressRC": 3 },
            "PC0": { "RC0": ["VC0"] },
            "PC1": { "RC0": ["VC1"] }
        }"#,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        PolicyError::BadResourceClass { rc: 3, role: "ingress", .. }
    ));
}
