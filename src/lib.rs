//! Static analyzer for TEAL smart-contract programs: parsing, CFG and
//! call-graph reconstruction, field dataflow, and path-based detectors.

pub mod analysis;
pub mod callgraph;
pub mod cfg;
pub mod dataflow;
pub mod detectors;
pub mod error;
pub mod group_config;
pub mod mode;
pub mod parser;
pub mod printers;

pub mod prelude {
    //! Commonly used types, re-exported.

    pub use teal_asm::{
        GlobalField, Instruction, OnComplete, Opcode, TxnField, TxnType, MAX_AVM_VERSION,
    };

    pub use crate::analysis::Analysis;
    pub use crate::callgraph::{CallEdge, CallGraph, Subroutine};
    pub use crate::cfg::{BasicBlock, BlockId, Cfg, Edge, EdgeKind, ExitKind, Owner};
    pub use crate::dataflow::{FieldState, Lattice, TrackedField, Value, WIDENING_CAP};
    pub use crate::detectors::{
        run_detectors, Category, Confidence, Detector, DetectorRegistry, Finding, Severity,
    };
    pub use crate::error::{AnalysisError, CfgError, ConfigError, DetectorError, ParseError};
    pub use crate::group_config::GroupConfig;
    pub use crate::mode::ExecutionMode;
    pub use crate::parser::Program;
    pub use crate::printers::{Printer, PrinterRegistry};
}
