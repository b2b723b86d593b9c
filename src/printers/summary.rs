//! Human-readable program summary.

use std::io::{self, Write as _};

use strum::IntoEnumIterator;

use crate::analysis::Analysis;
use crate::cfg::ExitKind;
use crate::dataflow::{Lattice, TrackedField, WIDENING_CAP};
use crate::printers::Printer;

/// Prints mode, version, graph shape and the joined field states at the
/// approving exits.
pub struct HumanSummary;

impl Printer for HumanSummary {
    fn id(&self) -> &'static str {
        "human-summary"
    }

    fn description(&self) -> &'static str {
        "textual program summary"
    }

    fn print(&self, analysis: &Analysis, out: &mut dyn io::Write) -> io::Result<()> {
        let cfg = analysis.cfg();
        let program = analysis.program();
        writeln!(out, "mode: {}", program.mode())?;
        writeln!(out, "version: {}", program.version())?;

        let reachable = cfg.reachable().iter().filter(|&&r| r).count();
        let edges: usize = cfg.blocks().iter().map(|b| b.successors().len()).sum();
        writeln!(
            out,
            "blocks: {} ({} reachable), edges: {}",
            cfg.blocks().len(),
            reachable,
            edges
        )?;

        for subroutine in &analysis.call_graph().subroutines {
            writeln!(
                out,
                "subroutine {}: entry b{}, blocks {:?}, call sites {:?}",
                subroutine.name, subroutine.entry, subroutine.blocks, subroutine.call_sites
            )?;
        }

        writeln!(out, "fields at approving exits:")?;
        for field in TrackedField::iter() {
            let mut joined = Lattice::Bottom;
            for block in cfg.blocks() {
                if block.exit() == Some(ExitKind::Accept) {
                    joined = joined.join(block.context.output.get(field), WIDENING_CAP);
                }
            }
            writeln!(out, "  {field}: {joined}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Program;

    #[test]
    fn summary_reports_shape_and_exit_states() {
        let analysis = Analysis::build(
            Program::parse(
                "#pragma version 3\nglobal GroupSize\nint 1\n==\nassert\nint 1\nreturn\n",
            )
            .unwrap(),
            None,
        )
        .unwrap();
        let mut out = Vec::new();
        HumanSummary.print(&analysis, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("mode: Stateless"));
        assert!(text.contains("version: 3"));
        assert!(text.contains("GroupSize: {1}"));
        assert!(text.contains("Fee: any"));
    }
}
