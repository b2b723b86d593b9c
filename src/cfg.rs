//! Control-flow graph reconstruction.
//!
//! Blocks live in an arena indexed by dense integer ids; edges are
//! `(from, to, kind)` triples and predecessor lists are derived from the
//! successor lists, never authoritative.

use std::collections::{BTreeMap, BTreeSet};

use teal_asm::{Instruction, Opcode};

use crate::dataflow::BlockContext;
use crate::error::CfgError;
use crate::parser::Program;

/// Dense identifier of a basic block.
pub type BlockId = usize;

/// Kind of a control-flow edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Implicit flow into the next block.
    Fallthrough,
    /// Unconditional `b`.
    Jump,
    /// `bnz`/`bz`/`switch`/`match` edge taken on the branch condition.
    BranchTaken,
    /// The complementary fall-through edge of a conditional branch.
    BranchNotTaken,
    /// `callsub` into a subroutine entry.
    CallsubToEntry,
    /// Synthesized edge from a `retsub` back to a call site's
    /// fall-through block.
    RetsubToReturnSite,
}

/// A typed control-flow edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    /// Source block.
    pub from: BlockId,
    /// Target block.
    pub to: BlockId,
    /// Edge kind.
    pub kind: EdgeKind,
}

/// How a halting block leaves the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// `return` of a value not provably zero, or falling off the end.
    Accept,
    /// `err`, or `return` of the constant zero.
    Reject,
}

/// Region owning a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// The entry region.
    Main,
    /// A subroutine, by index into the call graph.
    Subroutine(usize),
}

/// A maximal straight-line run of instructions.
#[derive(Debug)]
pub struct BasicBlock {
    id: BlockId,
    first: usize,
    last: usize,
    successors: Vec<Edge>,
    predecessors: Vec<Edge>,
    owner: Owner,
    exit: Option<ExitKind>,
    /// Dataflow context slot, written by the engine after construction.
    pub context: BlockContext,
}

impl BasicBlock {
    /// Stable identifier.
    pub const fn id(&self) -> BlockId {
        self.id
    }

    /// Index of the first instruction.
    pub const fn first(&self) -> usize {
        self.first
    }

    /// Index of the last instruction (inclusive).
    pub const fn last(&self) -> usize {
        self.last
    }

    /// Outgoing edges.
    pub fn successors(&self) -> &[Edge] {
        &self.successors
    }

    /// Incoming edges, derived from the successor lists.
    pub fn predecessors(&self) -> &[Edge] {
        &self.predecessors
    }

    /// Region owning the block.
    pub const fn owner(&self) -> Owner {
        self.owner
    }

    /// Exit classification when the block halts the program.
    pub const fn exit(&self) -> Option<ExitKind> {
        self.exit
    }
}

/// The control-flow graph of one program.
#[derive(Debug)]
pub struct Cfg {
    program: Program,
    blocks: Vec<BasicBlock>,
    leader_to_block: BTreeMap<usize, BlockId>,
    return_sites: BTreeMap<BlockId, BlockId>,
}

impl Cfg {
    /// Identifier of the entry block.
    pub const ENTRY: BlockId = 0;

    /// Split the program into basic blocks and link the static edges.
    /// `retsub` return edges are synthesized later by call-graph recovery.
    pub fn build(program: Program) -> Result<Self, CfgError> {
        let instructions = program.instructions();
        let count = instructions.len();

        let mut leaders: BTreeSet<usize> = BTreeSet::new();
        if count > 0 {
            leaders.insert(0);
        }
        for &target in program.labels().values() {
            if target < count {
                leaders.insert(target);
            }
        }
        for (index, instruction) in instructions.iter().enumerate() {
            let op = instruction.op();
            if (op.is_branch() || op.is_terminator()) && index + 1 < count {
                leaders.insert(index + 1);
            }
        }

        let starts: Vec<usize> = leaders.into_iter().collect();
        let mut blocks: Vec<BasicBlock> = Vec::with_capacity(starts.len());
        let mut leader_to_block: BTreeMap<usize, BlockId> = BTreeMap::new();
        for (id, &first) in starts.iter().enumerate() {
            let last = starts.get(id + 1).map_or(count - 1, |&next| next - 1);
            leader_to_block.insert(first, id);
            blocks.push(BasicBlock {
                id,
                first,
                last,
                successors: Vec::new(),
                predecessors: Vec::new(),
                owner: Owner::Main,
                exit: None,
                context: BlockContext::default(),
            });
        }

        let mut cfg = Self {
            program,
            blocks,
            leader_to_block,
            return_sites: BTreeMap::new(),
        };
        cfg.link_static_edges()?;
        cfg.rebuild_predecessors();
        Ok(cfg)
    }

    fn link_static_edges(&mut self) -> Result<(), CfgError> {
        let mut edges: Vec<Edge> = Vec::new();
        let mut exits: Vec<(BlockId, ExitKind)> = Vec::new();
        let mut return_sites: Vec<(BlockId, BlockId)> = Vec::new();

        for block in &self.blocks {
            let id = block.id;
            let instruction = &self.program.instructions()[block.last];
            let next = self.leader_to_block.get(&(block.last + 1)).copied();
            match instruction.op() {
                Opcode::B(label) => {
                    edges.push(Edge {
                        from: id,
                        to: self.target_block(label)?,
                        kind: EdgeKind::Jump,
                    });
                }
                Opcode::Bnz(label) | Opcode::Bz(label) => {
                    edges.push(Edge {
                        from: id,
                        to: self.target_block(label)?,
                        kind: EdgeKind::BranchTaken,
                    });
                    let fallthrough = next.ok_or_else(|| CfgError::FallthroughAtEnd {
                        line: instruction.line(),
                        op: instruction.to_string(),
                    })?;
                    edges.push(Edge {
                        from: id,
                        to: fallthrough,
                        kind: EdgeKind::BranchNotTaken,
                    });
                }
                Opcode::Switch(labels) | Opcode::Match(labels) => {
                    for label in labels {
                        edges.push(Edge {
                            from: id,
                            to: self.target_block(label)?,
                            kind: EdgeKind::BranchTaken,
                        });
                    }
                    let fallthrough = next.ok_or_else(|| CfgError::FallthroughAtEnd {
                        line: instruction.line(),
                        op: instruction.to_string(),
                    })?;
                    edges.push(Edge {
                        from: id,
                        to: fallthrough,
                        kind: EdgeKind::BranchNotTaken,
                    });
                }
                Opcode::Callsub(label) => {
                    edges.push(Edge {
                        from: id,
                        to: self.target_block(label)?,
                        kind: EdgeKind::CallsubToEntry,
                    });
                    let site = next.ok_or_else(|| CfgError::FallthroughAtEnd {
                        line: instruction.line(),
                        op: instruction.to_string(),
                    })?;
                    return_sites.push((id, site));
                }
                Opcode::Retsub => {
                    // Return edges are synthesized during call-graph
                    // recovery, once callers are known.
                }
                Opcode::Error => exits.push((id, ExitKind::Reject)),
                Opcode::Return => {
                    let kind = if block.last > block.first
                        && matches!(
                            self.program.instructions()[block.last - 1].op(),
                            Opcode::Int(0) | Opcode::PushInt(0)
                        ) {
                        ExitKind::Reject
                    } else {
                        ExitKind::Accept
                    };
                    exits.push((id, kind));
                }
                _ => match next {
                    Some(fallthrough) => edges.push(Edge {
                        from: id,
                        to: fallthrough,
                        kind: EdgeKind::Fallthrough,
                    }),
                    // Falling off the end approves with the top of stack.
                    None => exits.push((id, ExitKind::Accept)),
                },
            }
        }

        for edge in edges {
            self.blocks[edge.from].successors.push(edge);
        }
        for (id, kind) in exits {
            self.blocks[id].exit = Some(kind);
        }
        self.return_sites = return_sites.into_iter().collect();
        Ok(())
    }

    fn target_block(&self, label: &str) -> Result<BlockId, CfgError> {
        self.program
            .label_target(label)
            .and_then(|index| self.leader_to_block.get(&index).copied())
            .ok_or_else(|| CfgError::BadBranchTarget {
                label: label.to_string(),
            })
    }

    /// Recompute every predecessor list from the successor lists.
    pub(crate) fn rebuild_predecessors(&mut self) {
        for block in &mut self.blocks {
            block.predecessors.clear();
        }
        let edges: Vec<Edge> = self
            .blocks
            .iter()
            .flat_map(|b| b.successors.iter().copied())
            .collect();
        for edge in edges {
            self.blocks[edge.to].predecessors.push(edge);
        }
    }

    /// Append an edge. Used by call-graph recovery for return edges.
    pub(crate) fn add_edge(&mut self, edge: Edge) {
        self.blocks[edge.from].successors.push(edge);
    }

    pub(crate) fn set_owner(&mut self, id: BlockId, owner: Owner) {
        self.blocks[id].owner = owner;
    }

    /// The analyzed program.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// All blocks, indexed by id.
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// One block by id.
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id]
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id]
    }

    /// Instructions of a block.
    pub fn instructions(&self, id: BlockId) -> &[Instruction] {
        let block = &self.blocks[id];
        &self.program.instructions()[block.first..=block.last]
    }

    /// Block starting at the given instruction index, if any.
    pub fn block_at(&self, instruction_index: usize) -> Option<BlockId> {
        self.leader_to_block.get(&instruction_index).copied()
    }

    /// Block containing the given instruction index.
    pub fn block_of_instruction(&self, instruction_index: usize) -> Option<BlockId> {
        self.leader_to_block
            .range(..=instruction_index)
            .next_back()
            .map(|(_, &id)| id)
            .filter(|&id| instruction_index <= self.blocks[id].last)
    }

    /// Fall-through block of a `callsub` block.
    pub fn return_site(&self, callsub_block: BlockId) -> Option<BlockId> {
        self.return_sites.get(&callsub_block).copied()
    }

    /// All `callsub` blocks with their return sites.
    pub fn call_sites(&self) -> impl Iterator<Item = (BlockId, BlockId)> + '_ {
        self.return_sites.iter().map(|(&c, &r)| (c, r))
    }

    /// Structural reachability from the entry block.
    pub fn reachable(&self) -> Vec<bool> {
        let mut seen = vec![false; self.blocks.len()];
        if self.blocks.is_empty() {
            return seen;
        }
        let mut stack = vec![Self::ENTRY];
        seen[Self::ENTRY] = true;
        while let Some(id) = stack.pop() {
            for edge in &self.blocks[id].successors {
                if !seen[edge.to] {
                    seen[edge.to] = true;
                    stack.push(edge.to);
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Program;

    fn cfg(source: &str) -> Cfg {
        Cfg::build(Program::parse(source).unwrap()).unwrap()
    }

    #[test]
    fn single_block_program_halts() {
        let cfg = cfg("#pragma version 6\nint 1\nreturn\n");
        assert_eq!(cfg.blocks().len(), 1);
        assert!(cfg.block(0).successors().is_empty());
        assert_eq!(cfg.block(0).exit(), Some(ExitKind::Accept));
    }

    #[test]
    fn branch_blocks_have_two_edges() {
        let cfg = cfg("int 1\nbnz yes\nerr\nyes:\nint 1\nreturn\n");
        let branch = cfg.block(0);
        assert_eq!(branch.successors().len(), 2);
        let kinds: Vec<EdgeKind> = branch.successors().iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&EdgeKind::BranchTaken));
        assert!(kinds.contains(&EdgeKind::BranchNotTaken));
    }

    #[test]
    fn return_of_zero_rejects() {
        let cfg = cfg("int 0\nreturn\n");
        assert_eq!(cfg.block(0).exit(), Some(ExitKind::Reject));
    }

    #[test]
    fn err_rejects() {
        let cfg = cfg("err\n");
        assert_eq!(cfg.block(0).exit(), Some(ExitKind::Reject));
    }

    #[test]
    fn block_ranges_partition_the_program() {
        let cfg = cfg("int 1\nbnz a\nint 2\npop\na:\nint 3\nreturn\n");
        let mut covered = vec![false; cfg.program().instructions().len()];
        for block in cfg.blocks() {
            for index in block.first()..=block.last() {
                assert!(!covered[index], "instruction {index} covered twice");
                covered[index] = true;
            }
        }
        assert!(covered.into_iter().all(|c| c));
    }

    #[test]
    fn predecessors_are_derived_from_successors() {
        let cfg = cfg("int 1\nbnz a\nerr\na:\nint 1\nreturn\n");
        let target = cfg.block_at(cfg.program().label_target("a").unwrap()).unwrap();
        let preds = cfg.block(target).predecessors();
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].from, 0);
        assert_eq!(preds[0].kind, EdgeKind::BranchTaken);
    }

    #[test]
    fn unreachable_blocks_are_retained() {
        let cfg = cfg("b end\nint 2\npop\nend:\nint 1\nreturn\n");
        let reachable = cfg.reachable();
        assert_eq!(cfg.blocks().len(), 3);
        assert!(reachable[0]);
        assert!(!reachable[1]);
        assert!(reachable[2]);
    }

    #[test]
    fn switch_links_every_target_and_the_fallthrough() {
        let cfg = cfg(
            "#pragma version 8\nint 1\nswitch a b\nerr\na:\nint 1\nreturn\nb:\nint 0\nreturn\n",
        );
        let taken = cfg
            .block(0)
            .successors()
            .iter()
            .filter(|e| e.kind == EdgeKind::BranchTaken)
            .count();
        let not_taken = cfg
            .block(0)
            .successors()
            .iter()
            .filter(|e| e.kind == EdgeKind::BranchNotTaken)
            .count();
        assert_eq!((taken, not_taken), (2, 1));
    }

    #[test]
    fn every_edge_targets_an_existing_block() {
        let cfg = cfg("int 1\nbnz a\nint 2\npop\na:\nint 3\nreturn\n");
        for block in cfg.blocks() {
            for edge in block.successors() {
                assert!(edge.to < cfg.blocks().len());
            }
        }
    }
}
