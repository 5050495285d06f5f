// tests/artifact_test.rs

mod common;

use common::{wide_grid_config, DOAL_POLICY};
use fabric_router::artifact;
use serde_json::Value;

fn artifact_value(json: &str) -> Value {
    let (fabric, _router) = common::route(json);
    serde_json::to_value(artifact::build(&fabric)).unwrap()
}

#[test]
fn logical_switches_merge_under_the_base_name() {
    let value = artifact_value(&wide_grid_config(DOAL_POLICY));
    let nodes = value.as_object().unwrap();

    assert_eq!(
        nodes.keys().collect::<Vec<_>>(),
        vec!["CA", "CB", "SA", "SB"]
    );
    let sa = &nodes["SA"];
    assert_eq!(sa["Model"], "Switch");
    let enabled: Vec<u64> = sa["Constants"]["Enabled"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_u64().unwrap())
        .collect();
    assert_eq!(enabled, vec![0, 5, 6, 7, 35, 36, 37, 65, 66, 67]);
    assert_eq!(sa["Constants"]["Rkey_Enable"], 3);

    // Links resolve to physical base names on both sides.
    assert_eq!(sa["Links"]["5"][0], "SA");
    assert_eq!(sa["Links"]["5"][1], 35);
    assert_eq!(sa["Links"]["6"][0], "SB");
    assert_eq!(sa["Links"]["0"][0], "CA");
}

#[test]
fn endpoints_carry_the_destination_tables() {
    let value = artifact_value(&wide_grid_config(DOAL_POLICY));
    let nodes = value.as_object().unwrap();

    let ca = nodes["CA"].as_object().unwrap();
    for key in ["SSDT", "MSDT", "REQ-VCAT", "RSP-VCAT"] {
        assert!(ca.contains_key(key), "missing {key}");
    }
    let sa = nodes["SA"].as_object().unwrap();
    for key in ["SSDT", "MSDT", "REQ-VCAT", "RSP-VCAT"] {
        assert!(!sa.contains_key(key), "unexpected {key}");
    }
    assert_eq!(ca["Model"], "Compute");
    assert_eq!(ca["GCIDs"][0], 0x001);

    // CA only talks across subnets here: one MSDT row for subnet 1.
    let msdt = ca["MSDT"].as_object().unwrap();
    assert_eq!(msdt.keys().collect::<Vec<_>>(), vec!["1"]);
    let row = &msdt["1"];
    assert_eq!(row["MinimumHopCount"], 7);
    assert_eq!(row["RawEntryHex"], "0x34EF124500000000");
    assert_eq!(row["Entries"]["0"]["Valid"], true);
    assert_eq!(row["Entries"]["0"]["EgressIdentifier"], 0);
}

#[test]
fn vcat_rows_are_dense_over_eight_slots() {
    let value = artifact_value(&wide_grid_config(DOAL_POLICY));

    let vcat = value["SA"]["Ports"]["0"]["VCAT"].as_object().unwrap();
    // One row per policy VC.
    assert_eq!(vcat.keys().collect::<Vec<_>>(), vec!["0", "1", "2", "3"]);
    for row in vcat.values() {
        let slots = row.as_object().unwrap();
        assert_eq!(slots.len(), 8);
        for slot in 0..8 {
            assert!(slots.contains_key(&slot.to_string()));
        }
    }
    // An unpopulated slot is all zeroes.
    assert_eq!(vcat["0"]["7"]["VCMask"], 0);
    assert_eq!(vcat["0"]["7"]["Threshold"], 0);
    // Port registers are placeholders, node registers an empty object.
    assert_eq!(value["SA"]["Ports"]["0"]["Registers"], Value::Null);
    assert!(value["SA"]["Registers"].as_object().unwrap().is_empty());
}

#[test]
fn hop_counts_and_mhc_values_audit_clean() {
    let value = artifact_value(&wide_grid_config(DOAL_POLICY));

    for (name, node) in value.as_object().unwrap() {
        let endpoint = node["Model"] != "Switch";
        for (port, state) in node["Ports"].as_object().unwrap() {
            for (table, key_space) in [("LPRT", 1u64), ("MPRT", 2)] {
                for set in state[table].as_object().unwrap().values() {
                    let mhc = set["MinimumHopCount"].as_u64().unwrap();
                    if endpoint {
                        assert_eq!(mhc, 7, "{name} port {port}");
                    } else {
                        assert!(
                            mhc == key_space || mhc == 7,
                            "{name} port {port} {table} MHC {mhc}"
                        );
                    }
                    for entry in set["Entries"].as_object().unwrap().values() {
                        let action = entry["VCAction"].as_u64().unwrap();
                        let hops = entry["HopCount"].as_u64().unwrap();
                        assert_eq!(hops, u64::from(action == 1 || action == 4));
                        // No reflection anywhere.
                        assert_ne!(
                            entry["EgressIdentifier"].as_u64().unwrap().to_string(),
                            *port
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn emission_is_deterministic() {
    let json = wide_grid_config(DOAL_POLICY);
    let first = {
        let (fabric, _) = common::route(&json);
        serde_json::to_string_pretty(&artifact::build(&fabric)).unwrap()
    };
    let second = {
        let (fabric, _) = common::route(&json);
        serde_json::to_string_pretty(&artifact::build(&fabric)).unwrap()
    };
    assert_eq!(first, second);
}

#[test]
fn rkey_enable_is_configurable() {
    let json = wide_grid_config(DOAL_POLICY).replace(
        r#""Fabric": { "Dimensions": 2 }"#,
        r#""Fabric": { "Dimensions": 2, "Rkey_Enable": 1 }"#,
    );
    let value = artifact_value(&json);
    assert_eq!(value["CA"]["Constants"]["Rkey_Enable"], 1);
}
