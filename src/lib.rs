// src/lib.rs

pub mod apply;
pub mod artifact;
pub mod config;
pub mod error;
pub mod fabric;
pub mod policy;
pub mod routing;

use tracing::{debug, info};

use crate::config::FabricConfig;
use crate::error::RouterError;
use crate::fabric::FabricModel;
use crate::policy::TrafficPolicy;
use crate::routing::Router;

/// Entry point called from `main.rs`: parse the configuration, build the
/// fabric model, run the routing engine over it and write the artifact.
pub fn run(config_path: &str, route_path: &str) -> Result<(), RouterError> {
    let cfg = FabricConfig::load(config_path)?;
    info!("configuration loaded from {config_path}");

    let policy = TrafficPolicy::from_config(&cfg)?;
    debug!(
        "traffic class TC{}: {} lanes, algorithm {}",
        policy.tc,
        policy.vc_map.len(),
        policy.algorithm.as_str()
    );

    let mut fabric = FabricModel::build(&cfg)?;
    info!(
        "fabric built: {} logical switches, {} endpoints, {} GCIDs",
        fabric.logical_switches().len(),
        fabric.endpoint_nodes().len(),
        fabric.all_gcids.len()
    );

    let router = Router::new(policy)?;
    apply::apply(&mut fabric, &router)?;
    info!("tables applied with the {} engine", router.engine_name());

    let artifact = artifact::build(&fabric);
    artifact::write(&artifact, route_path)?;
    info!("routing artifact written to {route_path}");
    Ok(())
}
