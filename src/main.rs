// src/main.rs

use clap::Parser;
use std::process;
use tracing_subscriber::{fmt, EnvFilter};

/// Fabric router: computes forwarding and VC action tables for a fabric
/// described by a configuration document.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the fabric configuration file
    #[arg(short, long)]
    config: String,

    /// Path the routing artifact is written to
    #[arg(short, long)]
    route: String,

    /// Dump debug output while routing
    #[arg(short, long)]
    debug: bool,
}

fn main() {
    let args = Args::parse();

    // Honour RUST_LOG unless --debug asks for more.
    let filter = if args.debug {
        EnvFilter::new("fabric_router=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fabric_router=info"))
    };
    fmt::Subscriber::builder().with_env_filter(filter).init();

    if let Err(e) = fabric_router::run(&args.config, &args.route) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
