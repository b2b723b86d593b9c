//! End-to-end pipeline from a parsed program to an annotated graph.

use crate::callgraph::{self, CallGraph};
use crate::cfg::Cfg;
use crate::dataflow::{engine, FieldState, WIDENING_CAP};
use crate::error::CfgError;
use crate::mode::ExecutionMode;
use crate::parser::Program;

/// A fully analyzed program: its CFG with dataflow annotations attached,
/// and the recovered call graph. Read-only once built.
#[derive(Debug)]
pub struct Analysis {
    cfg: Cfg,
    call_graph: CallGraph,
}

impl Analysis {
    /// Build the CFG, recover the call graph and run the dataflow engine.
    ///
    /// `seed` is the entry state; pass `None` for an unconstrained entry
    /// (no group configuration attached).
    pub fn build(program: Program, seed: Option<FieldState>) -> Result<Self, CfgError> {
        let mut cfg = Cfg::build(program)?;
        let call_graph = callgraph::recover(&mut cfg)?;
        let seed = seed.unwrap_or_else(FieldState::top);
        engine::run(&mut cfg, &seed, WIDENING_CAP);
        Ok(Self { cfg, call_graph })
    }

    /// The annotated control-flow graph.
    pub fn cfg(&self) -> &Cfg {
        &self.cfg
    }

    /// The recovered call graph.
    pub fn call_graph(&self) -> &CallGraph {
        &self.call_graph
    }

    /// The analyzed program.
    pub fn program(&self) -> &Program {
        self.cfg.program()
    }

    /// Execution mode of the analyzed program.
    pub fn mode(&self) -> ExecutionMode {
        self.cfg.program().mode()
    }
}
