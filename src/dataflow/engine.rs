//! Worklist fixed point over the control-flow graph.
//!
//! Callsub edges carry the caller's out-state into the callee entry;
//! retsub edges carry the callee's out-state back to the return site.
//! There is no context sensitivity: merges across call sites are
//! accepted over-approximations.

use std::collections::VecDeque;

use strum::EnumCount as _;

use crate::cfg::{BlockId, Cfg, EdgeKind};
use crate::dataflow::transfer::{apply, transfer, Refinement, Transfer};
use crate::dataflow::{BlockContext, FieldState, TrackedField};

struct BlockTransfer {
    output: FieldState,
    /// One refinement per successor edge, aligned with the edge order.
    edge_refinements: Vec<Refinement>,
}

/// Propagate field states over the graph until the fixed point.
///
/// `seed` is the entry state: all-⊤ unless a group configuration
/// constrains some fields. Unreached blocks keep their all-⊥ context.
pub fn run(cfg: &mut Cfg, seed: &FieldState, cap: usize) {
    let count = cfg.blocks().len();
    if count == 0 {
        return;
    }
    for id in 0..count {
        cfg.block_mut(id).context = BlockContext::default();
    }

    let mut transfers: Vec<Option<BlockTransfer>> = (0..count).map(|_| None).collect();
    let mut queued = vec![false; count];
    let mut worklist: VecDeque<BlockId> = VecDeque::new();
    worklist.push_back(Cfg::ENTRY);
    queued[Cfg::ENTRY] = true;

    // The lattice has height cap + 2 per field; anything past this bound
    // would be a monotonicity bug, so bail out instead of spinning.
    let budget = (count * TrackedField::COUNT * (cap + 2) + count) * 4;
    let mut pops = 0usize;

    while let Some(id) = worklist.pop_front() {
        queued[id] = false;
        pops += 1;
        if pops > budget {
            tracing::warn!(pops, "dataflow fixed point exceeded its budget, stopping early");
            break;
        }

        let mut input = if id == Cfg::ENTRY {
            seed.clone()
        } else {
            FieldState::bottom()
        };
        let pred_blocks: std::collections::BTreeSet<BlockId> = cfg
            .block(id)
            .predecessors()
            .iter()
            .map(|e| e.from)
            .collect();
        for from in pred_blocks {
            let Some(pred) = transfers[from].as_ref() else {
                continue;
            };
            for (ordinal, edge) in cfg.block(from).successors().iter().enumerate() {
                if edge.to != id {
                    continue;
                }
                let mut contribution = pred.output.clone();
                apply(&mut contribution, &pred.edge_refinements[ordinal], cap);
                // An infeasible edge contributes nothing.
                if !contribution.is_unreachable() {
                    input.join_with(&contribution, cap);
                }
            }
        }

        let first_visit = transfers[id].is_none();
        if !first_visit && cfg.block(id).context.input == input {
            continue;
        }

        let result = transfer(cfg.instructions(id), &input, cap);
        let edge_refinements = edge_refinements(cfg, id, &result);
        let context = BlockContext {
            input,
            output: result.output.clone(),
        };
        transfers[id] = Some(BlockTransfer {
            output: result.output,
            edge_refinements,
        });
        cfg.block_mut(id).context = context;

        let successors: Vec<BlockId> = cfg.block(id).successors().iter().map(|e| e.to).collect();
        for succ in successors {
            if !queued[succ] {
                queued[succ] = true;
                worklist.push_back(succ);
            }
        }
    }
}

fn edge_refinements(cfg: &Cfg, id: BlockId, result: &Transfer) -> Vec<Refinement> {
    let mut taken_ordinal = 0usize;
    cfg.block(id)
        .successors()
        .iter()
        .map(|edge| match edge.kind {
            EdgeKind::BranchTaken => {
                let refinement = if result.per_target.is_empty() {
                    result.taken.clone()
                } else {
                    result
                        .per_target
                        .get(taken_ordinal)
                        .cloned()
                        .unwrap_or_default()
                };
                taken_ordinal += 1;
                refinement
            }
            EdgeKind::BranchNotTaken => result.not_taken.clone(),
            _ => Refinement::new(),
        })
        .collect()
}
