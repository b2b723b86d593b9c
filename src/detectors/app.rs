//! Application lifecycle detectors: deletable/updatable paths and their
//! unprotected variants.

use teal_asm::OnComplete;

use crate::analysis::Analysis;
use crate::cfg::{BlockId, Cfg};
use crate::dataflow::{TrackedField, Value};
use crate::detectors::{accepting_paths, Category, Confidence, Detector, Finding, Severity};
use crate::error::DetectorError;
use crate::mode::ExecutionMode;

/// Lines of the instructions in a path's final block, used as evidence.
pub(crate) fn block_lines(cfg: &Cfg, block: BlockId) -> Vec<u32> {
    cfg.instructions(block).iter().map(|i| i.line()).collect()
}

/// Paths to an approving exit on which `action` is never refuted.
/// With `require_unprotected`, only paths whose exit still has an
/// unconstrained `Sender` are kept.
fn lifecycle_paths(
    analysis: &Analysis,
    action: OnComplete,
    require_unprotected: bool,
) -> Vec<Vec<BlockId>> {
    let cfg = analysis.cfg();
    let value = Value::Uint(action.value());
    accepting_paths(cfg, |cfg, block| {
        cfg.block(block)
            .context
            .input
            .get(TrackedField::OnCompletion)
            .may_contain(&value)
    })
    .into_iter()
    .filter(|path| {
        let last = *path.last().expect("paths are nonempty");
        let exit_state = &cfg.block(last).context.output;
        exit_state.get(TrackedField::OnCompletion).may_contain(&value)
            && (!require_unprotected || exit_state.get(TrackedField::Sender).is_top())
    })
    .collect()
}

fn lifecycle_findings(
    analysis: &Analysis,
    detector: &dyn Detector,
    action: OnComplete,
    require_unprotected: bool,
    description: &str,
) -> Vec<Finding> {
    lifecycle_paths(analysis, action, require_unprotected)
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

/// Reports approving paths on which `OnCompletion = DeleteApplication`
/// is never refuted.
pub struct IsDeletable;

impl Detector for IsDeletable {
    fn id(&self) -> &'static str {
        "is-deletable"
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
        "the application can be deleted"
    }
    fn applicable(&self, mode: ExecutionMode) -> bool {
        mode == ExecutionMode::Stateful
    }
    fn detect(&self, analysis: &Analysis) -> Result<Vec<Finding>, DetectorError> {
        Ok(lifecycle_findings(
            analysis,
            self,
            OnComplete::DeleteApplication,
            false,
            "an approving path accepts OnCompletion = DeleteApplication",
        ))
    }
}

/// Reports approving paths on which `OnCompletion = UpdateApplication`
/// is never refuted.
pub struct IsUpdatable;

impl Detector for IsUpdatable {
    fn id(&self) -> &'static str {
        "is-updatable"
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
        "the application can be updated"
    }
    fn applicable(&self, mode: ExecutionMode) -> bool {
        mode == ExecutionMode::Stateful
    }
    fn detect(&self, analysis: &Analysis) -> Result<Vec<Finding>, DetectorError> {
        Ok(lifecycle_findings(
            analysis,
            self,
            OnComplete::UpdateApplication,
            false,
            "an approving path accepts OnCompletion = UpdateApplication",
        ))
    }
}

/// Like [`IsDeletable`], and the path never pins `Sender` down either:
/// anyone can perform the deletion.
pub struct UnprotectedDeletable;

impl Detector for UnprotectedDeletable {
    fn id(&self) -> &'static str {
        "unprotected-deletable"
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
        "anyone can delete the application"
    }
    fn applicable(&self, mode: ExecutionMode) -> bool {
        mode == ExecutionMode::Stateful
    }
    fn detect(&self, analysis: &Analysis) -> Result<Vec<Finding>, DetectorError> {
        Ok(lifecycle_findings(
            analysis,
            self,
            OnComplete::DeleteApplication,
            true,
            "an approving path accepts OnCompletion = DeleteApplication without any Sender check",
        ))
    }
}

/// Like [`IsUpdatable`], without any `Sender` refinement on the path.
pub struct UnprotectedUpdatable;

impl Detector for UnprotectedUpdatable {
    fn id(&self) -> &'static str {
        "unprotected-updatable"
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
        "anyone can update the application"
    }
    fn applicable(&self, mode: ExecutionMode) -> bool {
        mode == ExecutionMode::Stateful
    }
    fn detect(&self, analysis: &Analysis) -> Result<Vec<Finding>, DetectorError> {
        Ok(lifecycle_findings(
            analysis,
            self,
            OnComplete::UpdateApplication,
            true,
            "an approving path accepts OnCompletion = UpdateApplication without any Sender check",
        ))
    }
}
