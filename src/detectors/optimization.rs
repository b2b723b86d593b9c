//! Structural optimization hints. These scan the instruction sequence
//! directly; no dataflow is involved.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use teal_asm::{Opcode, TxnField};

use crate::analysis::Analysis;
use crate::cfg::BlockId;
use crate::detectors::{path_to_block, Category, Confidence, Detector, Finding, Severity};
use crate::error::DetectorError;
use crate::mode::ExecutionMode;

/// One finding per block holding offending lines.
fn structural_findings(
    analysis: &Analysis,
    detector: &dyn Detector,
    description: &str,
    lines: Vec<u32>,
) -> Vec<Finding> {
    let cfg = analysis.cfg();
    let mut per_block: BTreeMap<BlockId, Vec<u32>> = BTreeMap::new();
    for line in lines {
        let index = cfg
            .program()
            .instructions()
            .iter()
            .position(|i| i.line() == line)
            .expect("line comes from this program");
        if let Some(block) = cfg.block_of_instruction(index) {
            per_block.entry(block).or_default().push(line);
        }
    }
    per_block
        .into_iter()
        .filter_map(|(block, lines)| {
            path_to_block(cfg, block).map(|path| Finding {
                detector: detector.id(),
                severity: detector.severity(),
                confidence: detector.confidence(),
                description: description.to_string(),
                path,
                lines,
            })
        })
        .collect()
}

/// `gtxn i F` where the program has already pinned its own group index
/// to `i`: `txn F` is equivalent and cheaper.
pub struct ConstantGtxn;

impl Detector for ConstantGtxn {
    fn id(&self) -> &'static str {
        "constant-gtxn"
    }
    fn category(&self) -> Category {
        Category::Optimization
    }
    fn severity(&self) -> Severity {
        Severity::Optimization
    }
    fn confidence(&self) -> Confidence {
        Confidence::High
    }
    fn description(&self) -> &'static str {
        "gtxn with an index the program pins to its own position"
    }
    fn applicable(&self, _mode: ExecutionMode) -> bool {
        true
    }
    fn detect(&self, analysis: &Analysis) -> Result<Vec<Finding>, DetectorError> {
        let instructions = analysis.program().instructions();
        let pinned: BTreeSet<u64> = instructions
            .iter()
            .tuple_windows()
            .filter_map(|(a, b, c, d)| match (a.op(), b.op(), c.op(), d.op()) {
                (
                    Opcode::Txn(TxnField::GroupIndex),
                    Opcode::Int(index),
                    Opcode::Eq,
                    Opcode::Assert,
                )
                | (
                    Opcode::Int(index),
                    Opcode::Txn(TxnField::GroupIndex),
                    Opcode::Eq,
                    Opcode::Assert,
                ) => Some(*index),
                _ => None,
            })
            .collect();
        if pinned.is_empty() {
            return Ok(Vec::new());
        }

        let lines: Vec<u32> = instructions
            .iter()
            .filter(|instruction| match instruction.op() {
                Opcode::Gtxn(index, _) | Opcode::Gtxna(index, _, _) => {
                    pinned.contains(&(*index as u64))
                }
                _ => false,
            })
            .map(|instruction| instruction.line())
            .collect();
        Ok(structural_findings(
            analysis,
            self,
            "replace gtxn on the pinned own index with txn",
            lines,
        ))
    }
}

/// `txna Accounts 0` is the sender's account: `txn Sender` says so
/// directly.
pub struct SelfAccess;

impl Detector for SelfAccess {
    fn id(&self) -> &'static str {
        "self-access"
    }
    fn category(&self) -> Category {
        Category::Optimization
    }
    fn severity(&self) -> Severity {
        Severity::Optimization
    }
    fn confidence(&self) -> Confidence {
        Confidence::High
    }
    fn description(&self) -> &'static str {
        "Accounts[0] is always the sender"
    }
    fn applicable(&self, _mode: ExecutionMode) -> bool {
        true
    }
    fn detect(&self, analysis: &Analysis) -> Result<Vec<Finding>, DetectorError> {
        let lines: Vec<u32> = analysis
            .program()
            .instructions()
            .iter()
            .filter(|instruction| {
                matches!(instruction.op(), Opcode::Txna(TxnField::Accounts, 0))
            })
            .map(|instruction| instruction.line())
            .collect();
        Ok(structural_findings(
            analysis,
            self,
            "replace txna Accounts 0 with txn Sender",
            lines,
        ))
    }
}

/// `txn Sender` fed into a local-state opcode: the account-index
/// shorthand 0 means the sender and avoids the reference.
pub struct SenderAccess;

impl Detector for SenderAccess {
    fn id(&self) -> &'static str {
        "sender-access"
    }
    fn category(&self) -> Category {
        Category::Optimization
    }
    fn severity(&self) -> Severity {
        Severity::Optimization
    }
    fn confidence(&self) -> Confidence {
        Confidence::Medium
    }
    fn description(&self) -> &'static str {
        "local state of the sender can be addressed by index 0"
    }
    fn applicable(&self, mode: ExecutionMode) -> bool {
        mode == ExecutionMode::Stateful
    }
    fn detect(&self, analysis: &Analysis) -> Result<Vec<Finding>, DetectorError> {
        let lines: Vec<u32> = analysis
            .program()
            .instructions()
            .iter()
            .tuple_windows()
            .filter_map(|(a, _b, c)| {
                let feeds_local_state = matches!(
                    c.op(),
                    Opcode::AppLocalGet | Opcode::AppLocalDel | Opcode::AppOptedIn
                );
                (matches!(a.op(), Opcode::Txn(TxnField::Sender)) && feeds_local_state)
                    .then(|| a.line())
            })
            .collect();
        Ok(structural_findings(
            analysis,
            self,
            "replace txn Sender with int 0 for local-state access",
            lines,
        ))
    }
}
