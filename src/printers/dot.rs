//! Graphviz printers for the control-flow and call graphs.

use std::io::{self, Write as _};

use crate::analysis::Analysis;
use crate::cfg::{EdgeKind, Owner};
use crate::printers::Printer;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '{' | '}' | '<' | '>' | '|' | '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

const fn edge_label(kind: EdgeKind) -> &'static str {
    match kind {
        EdgeKind::Fallthrough => "fallthrough",
        EdgeKind::Jump => "jump",
        EdgeKind::BranchTaken => "taken",
        EdgeKind::BranchNotTaken => "not-taken",
        EdgeKind::CallsubToEntry => "callsub",
        EdgeKind::RetsubToReturnSite => "retsub",
    }
}

/// Renders the CFG as a digraph of record nodes, one per basic block.
pub struct CfgDotPrinter;

impl CfgDotPrinter {
    fn header(&self, out: &mut dyn io::Write) -> io::Result<()> {
        writeln!(out, "digraph cfg {{")?;
        writeln!(out, "    node [shape=record];")
    }

    fn block_nodes(&self, analysis: &Analysis, out: &mut dyn io::Write) -> io::Result<()> {
        let cfg = analysis.cfg();
        for block in cfg.blocks() {
            let mut label = format!("block {}", block.id());
            for instruction in cfg.instructions(block.id()) {
                label.push_str("\\l");
                label.push_str(&escape(&instruction.to_string()));
            }
            writeln!(out, "    b{} [label=\"{{{label}\\l}}\"];", block.id())?;
        }
        Ok(())
    }

    fn connections(&self, analysis: &Analysis, out: &mut dyn io::Write) -> io::Result<()> {
        for block in analysis.cfg().blocks() {
            for edge in block.successors() {
                writeln!(
                    out,
                    "    b{} -> b{} [label=\"{}\"];",
                    edge.from,
                    edge.to,
                    edge_label(edge.kind)
                )?;
            }
        }
        Ok(())
    }
}

impl Printer for CfgDotPrinter {
    fn id(&self) -> &'static str {
        "cfg-dot"
    }

    fn description(&self) -> &'static str {
        "control-flow graph in Graphviz format"
    }

    fn print(&self, analysis: &Analysis, out: &mut dyn io::Write) -> io::Result<()> {
        self.header(out)?;
        self.block_nodes(analysis, out)?;
        self.connections(analysis, out)?;
        writeln!(out, "}}")
    }
}

/// Renders the subroutine call graph.
pub struct CallGraphDotPrinter;

impl Printer for CallGraphDotPrinter {
    fn id(&self) -> &'static str {
        "call-graph-dot"
    }

    fn description(&self) -> &'static str {
        "subroutine call graph in Graphviz format"
    }

    fn print(&self, analysis: &Analysis, out: &mut dyn io::Write) -> io::Result<()> {
        let graph = analysis.call_graph();
        writeln!(out, "digraph callgraph {{")?;
        writeln!(out, "    main;")?;
        for subroutine in &graph.subroutines {
            writeln!(out, "    \"{}\";", escape(&subroutine.name))?;
        }
        let mut seen = std::collections::BTreeSet::new();
        for call in &graph.calls {
            let caller = match call.caller {
                Owner::Main => "main".to_string(),
                Owner::Subroutine(index) => graph.subroutines[index].name.clone(),
            };
            let callee = graph.subroutines[call.callee].name.clone();
            if seen.insert((caller.clone(), callee.clone())) {
                writeln!(out, "    \"{}\" -> \"{}\";", escape(&caller), escape(&callee))?;
            }
        }
        writeln!(out, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Program;

    fn analysis(source: &str) -> Analysis {
        Analysis::build(Program::parse(source).unwrap(), None).unwrap()
    }

    #[test]
    fn cfg_dot_names_every_block_and_edge() {
        let analysis = analysis("int 1\nbnz a\nerr\na:\nint 1\nreturn\n");
        let mut out = Vec::new();
        CfgDotPrinter.print(&analysis, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("digraph cfg {"));
        assert!(text.contains("b0 ["));
        assert!(text.contains("b0 -> b2 [label=\"taken\"]"));
        // The record separators of `<=`-style mnemonics are escaped.
        assert!(!text.contains("label=\"{block 0|"));
    }

    #[test]
    fn call_graph_dot_lists_main_and_subroutines() {
        let analysis = analysis("#pragma version 4\ncallsub f\nreturn\nf:\nretsub\n");
        let mut out = Vec::new();
        CallGraphDotPrinter.print(&analysis, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("main"));
        assert!(text.contains("\"f\""));
        assert!(text.contains("\"main\" -> \"f\"") || text.contains("main -> \"f\""));
    }
}
