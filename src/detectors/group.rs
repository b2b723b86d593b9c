//! Group-size hygiene: sibling accesses with a literal index while
//! `GroupSize` is still unconstrained.

use std::collections::BTreeMap;

use teal_asm::Opcode;

use crate::analysis::Analysis;
use crate::cfg::BlockId;
use crate::dataflow::transfer::transfer;
use crate::dataflow::{TrackedField, WIDENING_CAP};
use crate::detectors::{path_to_block, Category, Confidence, Detector, Finding, Severity};
use crate::error::DetectorError;
use crate::mode::ExecutionMode;

/// Reports `gtxn`/`gtxna` uses with a literal group index on which
/// `GroupSize` is still ⊤ at the use site.
pub struct GroupSizeCheck;

impl Detector for GroupSizeCheck {
    fn id(&self) -> &'static str {
        "group-size-check"
    }
    fn category(&self) -> Category {
        Category::Security
    }
    fn severity(&self) -> Severity {
        Severity::Medium
    }
    fn confidence(&self) -> Confidence {
        Confidence::High
    }
    fn description(&self) -> &'static str {
        "a sibling transaction is accessed without checking GroupSize"
    }
    fn applicable(&self, _mode: ExecutionMode) -> bool {
        true
    }
    fn detect(&self, analysis: &Analysis) -> Result<Vec<Finding>, DetectorError> {
        let cfg = analysis.cfg();
        // Offending instruction lines, grouped per block.
        let mut offending: BTreeMap<BlockId, Vec<u32>> = BTreeMap::new();
        for block in cfg.blocks() {
            let input = &block.context.input;
            if input.is_unreachable() {
                continue;
            }
            let instructions = cfg.instructions(block.id());
            for (offset, instruction) in instructions.iter().enumerate() {
                let uses_literal_index = matches!(
                    instruction.op(),
                    Opcode::Gtxn(_, _) | Opcode::Gtxna(_, _, _)
                );
                if !uses_literal_index {
                    continue;
                }
                // State in force right before the use, asserts earlier in
                // the block included.
                let before = transfer(&instructions[..offset], input, WIDENING_CAP).output;
                if before.get(TrackedField::GroupSize).is_top() {
                    offending
                        .entry(block.id())
                        .or_default()
                        .push(instruction.line());
                }
            }
        }

        Ok(offending
            .into_iter()
            .filter_map(|(block, lines)| {
                path_to_block(cfg, block).map(|path| Finding {
                    detector: self.id(),
                    severity: self.severity(),
                    confidence: self.confidence(),
                    description: "gtxn with a literal index while GroupSize is unconstrained"
                        .to_string(),
                    path,
                    lines,
                })
            })
            .collect())
    }
}
