//! Detectors for transaction fields left unconstrained on approving
//! paths: close-to targets, fee and rekeying.

use crate::analysis::Analysis;
use crate::cfg::BlockId;
use crate::dataflow::TrackedField;
use crate::detectors::app::block_lines;
use crate::detectors::{accepting_paths, Category, Confidence, Detector, Finding, Severity};
use crate::error::DetectorError;
use crate::mode::ExecutionMode;

/// A constant stub that never looks at the transaction or its arguments
/// authorizes nothing in particular; field hygiene is only meaningful
/// for programs that inspect their context.
fn inspects_context(analysis: &Analysis) -> bool {
    use teal_asm::Opcode;
    analysis.program().instructions().iter().any(|i| {
        matches!(
            i.op(),
            Opcode::Txn(_)
                | Opcode::Txna(_, _)
                | Opcode::Txnas(_)
                | Opcode::Gtxn(_, _)
                | Opcode::Gtxna(_, _, _)
                | Opcode::Gtxns(_)
                | Opcode::Gtxnsa(_, _)
                | Opcode::Global(_)
                | Opcode::Arg(_)
                | Opcode::Arg0
                | Opcode::Arg1
                | Opcode::Arg2
                | Opcode::Arg3
                | Opcode::Args
        )
    })
}

/// Approving paths whose exit still has `field` fully unconstrained.
fn unconstrained_field_paths(analysis: &Analysis, field: TrackedField) -> Vec<Vec<BlockId>> {
    if !inspects_context(analysis) {
        return Vec::new();
    }
    let cfg = analysis.cfg();
    accepting_paths(cfg, |_, _| true)
        .into_iter()
        .filter(|path| {
            let last = *path.last().expect("paths are nonempty");
            cfg.block(last).context.output.get(field).is_top()
        })
        .collect()
}

fn field_findings(
    analysis: &Analysis,
    detector: &dyn Detector,
    field: TrackedField,
    description: &str,
) -> Vec<Finding> {
    unconstrained_field_paths(analysis, field)
        .into_iter()
        .map(|path| {
            let last = *path.last().expect("paths are nonempty");
            Finding {
                detector: detector.id(),
                severity: detector.severity(),
                confidence: detector.confidence(),
                description: description.to_string(),
                lines: block_lines(analysis.cfg(), last),
                path,
            }
        })
        .collect()
}

/// Logic signature approving a transaction whose `CloseRemainderTo` was
/// never checked: the remainder of the account can be drained.
pub struct CanCloseAccount;

impl Detector for CanCloseAccount {
    fn id(&self) -> &'static str {
        "can-close-account"
    }
    fn category(&self) -> Category {
        Category::Security
    }
    fn severity(&self) -> Severity {
        Severity::High
    }
    fn confidence(&self) -> Confidence {
        Confidence::High
    }
    fn description(&self) -> &'static str {
        "the signed account can be closed out"
    }
    fn applicable(&self, mode: ExecutionMode) -> bool {
        mode == ExecutionMode::Stateless
    }
    fn detect(&self, analysis: &Analysis) -> Result<Vec<Finding>, DetectorError> {
        Ok(field_findings(
            analysis,
            self,
            TrackedField::CloseRemainderTo,
            "an approving path leaves CloseRemainderTo unconstrained",
        ))
    }
}

/// Logic signature approving a transfer whose `AssetCloseTo` was never
/// checked.
pub struct CanCloseAsset;

impl Detector for CanCloseAsset {
    fn id(&self) -> &'static str {
        "can-close-asset"
    }
    fn category(&self) -> Category {
        Category::Security
    }
    fn severity(&self) -> Severity {
        Severity::High
    }
    fn confidence(&self) -> Confidence {
        Confidence::High
    }
    fn description(&self) -> &'static str {
        "the asset holding can be closed out"
    }
    fn applicable(&self, mode: ExecutionMode) -> bool {
        mode == ExecutionMode::Stateless
    }
    fn detect(&self, analysis: &Analysis) -> Result<Vec<Finding>, DetectorError> {
        Ok(field_findings(
            analysis,
            self,
            TrackedField::AssetCloseTo,
            "an approving path leaves AssetCloseTo unconstrained",
        ))
    }
}

/// Logic signature approving a transaction with an unbounded `Fee`:
/// the signed account can be drained through fees.
pub struct MissingFeeCheck;

impl Detector for MissingFeeCheck {
    fn id(&self) -> &'static str {
        "missing-fee-check"
    }
    fn category(&self) -> Category {
        Category::Security
    }
    fn severity(&self) -> Severity {
        Severity::High
    }
    fn confidence(&self) -> Confidence {
        Confidence::Medium
    }
    fn description(&self) -> &'static str {
        "the transaction fee is unbounded"
    }
    fn applicable(&self, mode: ExecutionMode) -> bool {
        mode == ExecutionMode::Stateless
    }
    fn detect(&self, analysis: &Analysis) -> Result<Vec<Finding>, DetectorError> {
        Ok(field_findings(
            analysis,
            self,
            TrackedField::Fee,
            "an approving path leaves Fee unconstrained",
        ))
    }
}

/// Approving a transaction whose `RekeyTo` was never pinned to the zero
/// address hands over the authorization key.
pub struct RekeyTo;

impl Detector for RekeyTo {
    fn id(&self) -> &'static str {
        "rekey-to"
    }
    fn category(&self) -> Category {
        Category::Security
    }
    fn severity(&self) -> Severity {
        Severity::High
    }
    fn confidence(&self) -> Confidence {
        Confidence::High
    }
    fn description(&self) -> &'static str {
        "the sender account can be rekeyed"
    }
    fn applicable(&self, _mode: ExecutionMode) -> bool {
        true
    }
    fn detect(&self, analysis: &Analysis) -> Result<Vec<Finding>, DetectorError> {
        Ok(field_findings(
            analysis,
            self,
            TrackedField::RekeyTo,
            "an approving path leaves RekeyTo unconstrained",
        ))
    }
}
