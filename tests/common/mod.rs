// tests/common/mod.rs

#![allow(dead_code)]

use fabric_router::apply;
use fabric_router::config::FabricConfig;
use fabric_router::fabric::FabricModel;
use fabric_router::policy::TrafficPolicy;
use fabric_router::routing::Router;

pub fn parse(json: &str) -> FabricConfig {
    serde_json::from_str(json).expect("config parses")
}

/// Parse, build, route and apply in one step.
pub fn route(json: &str) -> (FabricModel, Router) {
    let cfg = parse(json);
    let policy = TrafficPolicy::from_config(&cfg).expect("policy");
    let mut fabric = FabricModel::build(&cfg).expect("fabric");
    let router = Router::new(policy).expect("router");
    apply::apply(&mut fabric, &router).expect("apply");
    (fabric, router)
}

/// Two physical switches (subnets 0 and 1), two logical columns in use:
///
/// ```text
///   SA.1 (0,0) --5/35-- SA.2 (1,0)        CA on SA.1 port 0, GCID 0x001
///     |6                  |36
///   SB.1 (0,1) --5/35-- SB.2 (1,1)        CB on SB.2 port 32, GCID 0x1002
/// ```
pub fn grid_config(routing: &str) -> String {
    format!(
        r#"{{
  "Nodes": {{
    "Switch": {{
      "SA": ["10.0.0.1", "0.0", "0.0.0.1", true, []],
      "SB": ["10.0.0.2", "0.1", "0.0.0.2", true, []]
    }},
    "Compute": {{
      "CA": ["10.0.1.1", "0.0.0", "0.1.0.1", true, ["0x001"]],
      "CB": ["10.0.1.2", "0.1.0", "0.1.0.2", true, ["0x1002"]]
    }}
  }},
  "Connections": {{
    "CA,0": "SA,0",
    "CB,0": "SB,32",
    "SA,5": "SA,35",
    "SB,5": "SB,35",
    "SA,6": "SB,6",
    "SA,36": "SB,36"
  }},
  "Constants": {{
    "Switch": {{ "SWITCHES": [1, 2], "SWITCH_PORTS": [0, 59] }},
    "Compute": {{ "FABRIC_ADAPTER_PORTS": [0, 1] }},
    "Fabric": {{ "Dimensions": 2 }}
  }},
  "Routing": {{ {routing} }}
}}"#
    )
}

/// Same shape as `grid_config` but three logical columns wide, so deroute
/// and finish port sets are non-empty.
pub fn wide_grid_config(routing: &str) -> String {
    format!(
        r#"{{
  "Nodes": {{
    "Switch": {{
      "SA": ["10.0.0.1", "0.0", "0.0.0.1", true, []],
      "SB": ["10.0.0.2", "0.1", "0.0.0.2", true, []]
    }},
    "Compute": {{
      "CA": ["10.0.1.1", "0.0.0", "0.1.0.1", true, ["0x001"]],
      "CB": ["10.0.1.2", "0.1.0", "0.1.0.2", true, ["0x1002"]]
    }}
  }},
  "Connections": {{
    "CA,0": "SA,0",
    "CB,0": "SB,32",
    "SA,5": "SA,35",
    "SA,7": "SA,65",
    "SA,37": "SA,67",
    "SB,5": "SB,35",
    "SB,7": "SB,65",
    "SB,37": "SB,67",
    "SA,6": "SB,6",
    "SA,36": "SB,36",
    "SA,66": "SB,66"
  }},
  "Constants": {{
    "Switch": {{ "SWITCHES": [1, 2], "SWITCH_PORTS": [0, 59] }},
    "Compute": {{ "FABRIC_ADAPTER_PORTS": [0, 1] }},
    "Fabric": {{ "Dimensions": 2 }}
  }},
  "Routing": {{ {routing} }}
}}"#
    )
}

pub const DOR_POLICY: &str = r#"
  "TC0": {
    "Parameters": { "Algorithm": "DOR" },
    "PC0": { "RC0": ["VC0"] },
    "PC1": { "RC0": ["VC1"] }
  }"#;

pub const DOAL_POLICY: &str = r#"
  "TC0": {
    "Parameters": { "Algorithm": "DOAL" },
    "PC0": { "RC0": ["VC0"], "RC1": ["VC1"] },
    "PC1": { "RC0": ["VC2"], "RC1": ["VC3"] }
  }"#;

pub const VDAL_POLICY: &str = r#"
  "TC0": {
    "Parameters": { "Algorithm": "VDAL" },
    "PC0": { "RC0": ["VC0"], "RC1": ["VC1"], "RC2": ["VC2"], "RC3": ["VC3"] },
    "PC1": { "RC0": ["VC4"], "RC1": ["VC5"], "RC2": ["VC6"], "RC3": ["VC7"] }
  }"#;
