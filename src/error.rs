// src/error.rs

use thiserror::Error;

/// Errors raised while parsing and validating the fabric configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown node model '{model}'")]
    UnknownModel { model: String },

    #[error("no '{key}' constants for model {model}")]
    MissingConstant { model: String, key: &'static str },

    #[error("constants for model {model}: range upper bound below lower bound")]
    InvertedRange { model: String },

    #[error("node {node}: malformed topology id '{value}' ({reason})")]
    TopologyId {
        node: String,
        value: String,
        reason: String,
    },

    #[error("node {node}: malformed geo id '{value}' (expected rack.chassis.slot.node)")]
    GeoId { node: String, value: String },

    #[error("node {node}: malformed GCID '{value}'")]
    Gcid { node: String, value: String },

    #[error("node {node}: an enabled endpoint needs at least one GCID")]
    MissingGcids { node: String },

    #[error("connection '{connection}': {reason}")]
    Connection { connection: String, reason: String },

    #[error("connection '{connection}': unknown node {node}")]
    UnknownNode { connection: String, node: String },

    #[error("node {node} port {port}: already connected")]
    DuplicatePort { node: String, port: u32 },

    #[error("node {node} port {port}: outside the port space {lo}..{hi}")]
    PortOutOfRange {
        node: String,
        port: u32,
        lo: u32,
        hi: u32,
    },

    #[error("switch {node}: port space {ports} exceeds the {space}-port logical split table")]
    SplitSpace {
        node: String,
        ports: u32,
        space: u32,
    },

    #[error("switches {a} and {b} share grid position plane {plane}, ({x}, {y})")]
    DuplicatePosition {
        a: String,
        b: String,
        plane: u16,
        x: u16,
        y: u16,
    },
}

/// Errors raised while parsing the traffic-class policy or synthesizing
/// virtual-channel tables from it.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("expected exactly one TC<n> section in Routing, found {count}")]
    TrafficClassCount { count: usize },

    #[error("TC{tc}: Parameters.Algorithm is missing")]
    MissingAlgorithm { tc: u8 },

    #[error("TC{tc}: unknown algorithm '{name}'")]
    UnknownAlgorithm { tc: u8, name: String },

    #[error("TC{tc}: malformed class key '{key}'")]
    MalformedKey { tc: u8, key: String },

    #[error("TC{tc}: unknown relay model '{model}' in NodeRouters")]
    UnknownRelayModel { tc: u8, model: String },

    #[error("PC{pc}: VCs {vcs:?} are not contiguous")]
    NonContiguousVcs { pc: u8, vcs: Vec<u8> },

    #[error("PC{pc}: VC{vc} is outside the supported channel range")]
    VcOutOfRange { pc: u8, vc: u8 },

    #[error("expected a request and a response protocol class, found {count}")]
    ProtocolClassCount { count: usize },

    #[error("PC{request} and PC{response} differ in internal VC layout")]
    MisalignedClasses { request: u8, response: u8 },

    #[error("PC{pc} does not define RC{rc}, required by the {algorithm} engine")]
    MissingResourceClass {
        pc: u8,
        rc: u8,
        algorithm: &'static str,
    },

    #[error("PC{pc} does not define the configured {role} RC{rc}")]
    BadResourceClass {
        pc: u8,
        rc: u8,
        role: &'static str,
    },

    #[error(
        "VCAT contradiction on {kind} ports: VC{vc} action {action} assigned \
         masks {a:#06x} and {b:#06x}"
    )]
    VcatContradiction {
        kind: &'static str,
        vc: u8,
        action: u8,
        a: u16,
        b: u16,
    },
}

/// Top-level error for the `router` binary.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("cannot write {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
