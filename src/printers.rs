//! Structural printers over the annotated graph, with the same registry
//! shape as the detectors.

use std::collections::BTreeMap;
use std::io;

use crate::analysis::Analysis;

pub mod dot;
pub mod summary;

/// A registered printer.
pub trait Printer {
    /// Stable identifier, used for selection.
    fn id(&self) -> &'static str;
    /// One-line description.
    fn description(&self) -> &'static str;
    /// Render the analysis to the given writer.
    fn print(&self, analysis: &Analysis, out: &mut dyn io::Write) -> io::Result<()>;
}

/// Constructor registered for a printer identifier.
pub type PrinterCtor = fn() -> Box<dyn Printer>;

/// Registration table mapping identifier to constructor.
pub struct PrinterRegistry {
    ctors: BTreeMap<&'static str, PrinterCtor>,
}

impl PrinterRegistry {
    /// Empty table.
    pub fn new() -> Self {
        Self {
            ctors: BTreeMap::new(),
        }
    }

    /// Table holding the built-in printers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("cfg-dot", || Box::new(dot::CfgDotPrinter));
        registry.register("call-graph-dot", || Box::new(dot::CallGraphDotPrinter));
        registry.register("human-summary", || Box::new(summary::HumanSummary));
        registry
    }

    /// Register (or replace) a constructor.
    pub fn register(&mut self, id: &'static str, ctor: PrinterCtor) {
        self.ctors.insert(id, ctor);
    }

    /// All registered identifiers.
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.ctors.keys().copied()
    }

    /// Instantiate a printer by identifier.
    pub fn build(&self, id: &str) -> Option<Box<dyn Printer>> {
        self.ctors.get(id).map(|ctor| ctor())
    }
}

impl Default for PrinterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
