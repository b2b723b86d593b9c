//! Detector framework: the trait every detector implements, the
//! registration table, path-search strategies and finding collection.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashSet};
use std::hash::{Hash, Hasher};

use crate::analysis::Analysis;
use crate::cfg::{BlockId, Cfg, ExitKind};
use crate::error::DetectorError;
use crate::mode::ExecutionMode;

pub mod app;
pub mod fields;
pub mod group;
pub mod optimization;

/// Detector category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Category {
    /// Exploitable or dangerous behavior.
    Security,
    /// Cheaper or simpler equivalent code.
    Optimization,
}

/// Impact of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
#[allow(missing_docs)]
pub enum Severity {
    Informational,
    Optimization,
    Low,
    Medium,
    High,
}

/// Confidence in a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
#[allow(missing_docs)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// A detector's positive result.
#[derive(Debug, Clone)]
pub struct Finding {
    /// Identifier of the reporting detector.
    pub detector: &'static str,
    /// Impact.
    pub severity: Severity,
    /// Confidence.
    pub confidence: Confidence,
    /// Human description.
    pub description: String,
    /// Evidence path: block ids from the entry to the offending block.
    pub path: Vec<BlockId>,
    /// Source lines of the instructions justifying the finding.
    pub lines: Vec<u32>,
}

/// A registered analysis pass over the annotated CFG.
pub trait Detector {
    /// Stable identifier, used for selection and dedup.
    fn id(&self) -> &'static str;
    /// Category of the findings.
    fn category(&self) -> Category;
    /// Severity of the findings.
    fn severity(&self) -> Severity;
    /// Confidence of the findings.
    fn confidence(&self) -> Confidence;
    /// One-line description of what the detector reports.
    fn description(&self) -> &'static str;
    /// Whether the detector applies to programs of the given mode.
    fn applicable(&self, mode: ExecutionMode) -> bool;
    /// Run over an analyzed program.
    fn detect(&self, analysis: &Analysis) -> Result<Vec<Finding>, DetectorError>;
}

/// Constructor registered for a detector identifier.
pub type DetectorCtor = fn() -> Box<dyn Detector>;

/// Registration table mapping identifier to constructor. Plugins are
/// additional registrations performed at startup.
pub struct DetectorRegistry {
    ctors: BTreeMap<&'static str, DetectorCtor>,
}

impl DetectorRegistry {
    /// Empty table.
    pub fn new() -> Self {
        Self {
            ctors: BTreeMap::new(),
        }
    }

    /// Table holding the built-in detector library.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("is-deletable", || Box::new(app::IsDeletable));
        registry.register("is-updatable", || Box::new(app::IsUpdatable));
        registry.register("unprotected-deletable", || Box::new(app::UnprotectedDeletable));
        registry.register("unprotected-updatable", || Box::new(app::UnprotectedUpdatable));
        registry.register("group-size-check", || Box::new(group::GroupSizeCheck));
        registry.register("can-close-account", || Box::new(fields::CanCloseAccount));
        registry.register("can-close-asset", || Box::new(fields::CanCloseAsset));
        registry.register("missing-fee-check", || Box::new(fields::MissingFeeCheck));
        registry.register("rekey-to", || Box::new(fields::RekeyTo));
        registry.register("constant-gtxn", || Box::new(optimization::ConstantGtxn));
        registry.register("self-access", || Box::new(optimization::SelfAccess));
        registry.register("sender-access", || Box::new(optimization::SenderAccess));
        registry
    }

    /// Register (or replace) a constructor.
    pub fn register(&mut self, id: &'static str, ctor: DetectorCtor) {
        self.ctors.insert(id, ctor);
    }

    /// All registered identifiers.
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.ctors.keys().copied()
    }

    /// Instantiate the selected detectors. An empty `include` selects all
    /// registered detectors; `exclude` always wins.
    pub fn select(&self, include: &[String], exclude: &[String]) -> Vec<Box<dyn Detector>> {
        self.ctors
            .iter()
            .filter(|(id, _)| include.is_empty() || include.iter().any(|i| i == *id))
            .filter(|(id, _)| !exclude.iter().any(|e| e == *id))
            .map(|(_, ctor)| ctor())
            .collect()
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Run detectors over one analyzed program, skipping inapplicable ones,
/// logging and dropping any that fail, and deduplicating findings by
/// (detector, last block, path).
pub fn run_detectors(analysis: &Analysis, detectors: &[Box<dyn Detector>]) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut seen: HashSet<(String, BlockId, u64)> = HashSet::new();
    for detector in detectors {
        if !detector.applicable(analysis.mode()) {
            continue;
        }
        let batch = match detector.detect(analysis) {
            Ok(batch) => batch,
            Err(error) => {
                tracing::error!(%error, "detector failed, skipping");
                continue;
            }
        };
        for finding in batch {
            let last = finding.path.last().copied().unwrap_or_default();
            let mut hasher = DefaultHasher::new();
            finding.path.hash(&mut hasher);
            let key = (finding.detector.to_string(), last, hasher.finish());
            if seen.insert(key) {
                findings.push(finding);
            }
        }
    }
    findings
}

/// Upper bound on enumerated paths per search, to keep the DFS tame on
/// branch-heavy programs.
const MAX_PATHS: usize = 4096;

/// Depth-first path enumeration with loop-edge suppression: a path
/// traverses each block at most once. `enter` prunes blocks (unreachable
/// blocks are always pruned); `target` marks path endpoints.
pub fn search_paths<E, T>(cfg: &Cfg, start: BlockId, enter: E, target: T) -> Vec<Vec<BlockId>>
where
    E: Fn(&Cfg, BlockId) -> bool,
    T: Fn(&Cfg, BlockId) -> bool,
{
    let mut paths = Vec::new();
    if cfg.blocks().is_empty() {
        return paths;
    }
    let mut on_path = vec![false; cfg.blocks().len()];
    let mut path = Vec::new();
    walk(cfg, start, &enter, &target, &mut on_path, &mut path, &mut paths);
    paths
}

fn walk<E, T>(
    cfg: &Cfg,
    block: BlockId,
    enter: &E,
    target: &T,
    on_path: &mut Vec<bool>,
    path: &mut Vec<BlockId>,
    paths: &mut Vec<Vec<BlockId>>,
) where
    E: Fn(&Cfg, BlockId) -> bool,
    T: Fn(&Cfg, BlockId) -> bool,
{
    if paths.len() >= MAX_PATHS {
        return;
    }
    if on_path[block] || cfg.block(block).context.input.is_unreachable() || !enter(cfg, block) {
        return;
    }
    on_path[block] = true;
    path.push(block);
    if target(cfg, block) {
        paths.push(path.clone());
    } else {
        for edge in cfg.block(block).successors() {
            walk(cfg, edge.to, enter, target, on_path, path, paths);
        }
    }
    path.pop();
    on_path[block] = false;
}

/// Strategy: every path from the entry to an accepting halt.
pub fn accepting_paths<E>(cfg: &Cfg, enter: E) -> Vec<Vec<BlockId>>
where
    E: Fn(&Cfg, BlockId) -> bool,
{
    search_paths(cfg, Cfg::ENTRY, enter, |cfg, block| {
        cfg.block(block).exit() == Some(ExitKind::Accept)
    })
}

/// Strategy: every path from the entry to a state-changing operation
/// (application state writes and inner-transaction submits).
pub fn state_changing_paths<E>(cfg: &Cfg, enter: E) -> Vec<Vec<BlockId>>
where
    E: Fn(&Cfg, BlockId) -> bool,
{
    use teal_asm::Opcode;
    search_paths(cfg, Cfg::ENTRY, enter, |cfg, block| {
        cfg.instructions(block).iter().any(|i| {
            matches!(
                i.op(),
                Opcode::AppGlobalPut
                    | Opcode::AppLocalPut
                    | Opcode::AppGlobalDel
                    | Opcode::AppLocalDel
                    | Opcode::ItxnSubmit
            )
        })
    })
}

/// Strategy: paths internal to one subroutine, entry to `retsub`.
pub fn subroutine_paths(analysis: &Analysis, subroutine: usize) -> Vec<Vec<BlockId>> {
    let sub = &analysis.call_graph().subroutines[subroutine];
    let owned: HashSet<BlockId> = sub.blocks.iter().copied().collect();
    search_paths(
        analysis.cfg(),
        sub.entry,
        |_, block| owned.contains(&block),
        |cfg, block| {
            cfg.program().instructions()[cfg.block(block).last()]
                .op()
                .is_retsub()
        },
    )
}

/// First path from the entry to the given block, if it is reachable.
pub fn path_to_block(cfg: &Cfg, target_block: BlockId) -> Option<Vec<BlockId>> {
    search_paths(cfg, Cfg::ENTRY, |_, _| true, |_, block| block == target_block)
        .into_iter()
        .next()
}
