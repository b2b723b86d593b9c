//! Subroutine discovery and call-graph recovery.
//!
//! Call/return linking is modeled with explicit retsub-to-return-site
//! edges instead of a runtime call stack: every `retsub` of a callee gets
//! one edge back to each call site's fall-through block.

use std::collections::BTreeMap;

use teal_asm::Opcode;

use crate::cfg::{BlockId, Cfg, Edge, EdgeKind, Owner};
use crate::error::CfgError;

/// A recovered subroutine.
#[derive(Debug)]
pub struct Subroutine {
    /// Label naming the subroutine.
    pub name: String,
    /// Entry block.
    pub entry: BlockId,
    /// Blocks owned by the subroutine, entry first.
    pub blocks: Vec<BlockId>,
    /// `callsub` blocks invoking the subroutine.
    pub call_sites: Vec<BlockId>,
}

/// One call edge of the call graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallEdge {
    /// Calling region.
    pub caller: Owner,
    /// Called subroutine, by index.
    pub callee: usize,
    /// `callsub` block performing the call.
    pub site: BlockId,
}

/// Subroutines plus the call edges between them (and from `main`).
#[derive(Debug, Default)]
pub struct CallGraph {
    /// Recovered subroutines.
    pub subroutines: Vec<Subroutine>,
    /// Call edges, one per call site.
    pub calls: Vec<CallEdge>,
}

impl CallGraph {
    /// Subroutine owning a block, if any.
    pub fn subroutine_of(&self, block: BlockId) -> Option<usize> {
        self.subroutines
            .iter()
            .position(|s| s.blocks.contains(&block))
    }
}

/// Recover subroutines from `callsub`/`retsub` pairing, assign block
/// ownership, and synthesize the retsub return edges.
pub fn recover(cfg: &mut Cfg) -> Result<CallGraph, CfgError> {
    // Subroutine entries, in call-site order.
    let mut entries: Vec<(BlockId, String)> = Vec::new();
    let mut call_sites: BTreeMap<BlockId, Vec<BlockId>> = BTreeMap::new();
    for block in cfg.blocks() {
        if let Opcode::Callsub(label) = cfg.program().instructions()[block.last()].op() {
            let entry = block
                .successors()
                .iter()
                .find(|e| e.kind == EdgeKind::CallsubToEntry)
                .map(|e| e.to)
                .expect("callsub block always carries its entry edge");
            if !entries.iter().any(|(e, _)| *e == entry) {
                entries.push((entry, label.clone()));
            }
            call_sites.entry(entry).or_default().push(block.id());
        }
    }

    // Ownership: reachable from the entry without following call edges
    // (a callsub block continues at its return site) and without leaving
    // through a retsub. First traversal claims a block.
    let mut owner: Vec<Option<Owner>> = vec![None; cfg.blocks().len()];
    let mut subroutines: Vec<Subroutine> = Vec::new();
    for (index, (entry, name)) in entries.iter().enumerate() {
        let blocks = claim(cfg, *entry, Owner::Subroutine(index), &mut owner);
        subroutines.push(Subroutine {
            name: name.clone(),
            entry: *entry,
            blocks,
            call_sites: call_sites.get(entry).cloned().unwrap_or_default(),
        });
    }
    if !cfg.blocks().is_empty() {
        claim(cfg, Cfg::ENTRY, Owner::Main, &mut owner);
    }

    for (id, owner) in owner.iter().enumerate() {
        cfg.set_owner(id, owner.unwrap_or(Owner::Main));
    }

    // A retsub must belong to some subroutine.
    let reachable = cfg.reachable();
    for block in cfg.blocks() {
        let op = cfg.program().instructions()[block.last()].op();
        if op.is_retsub() && reachable[block.id()] && !matches!(block.owner(), Owner::Subroutine(_))
        {
            return Err(CfgError::RetsubOutsideSubroutine {
                line: cfg.program().instructions()[block.last()].line(),
            });
        }
    }

    // Synthesize one return edge per (retsub block, call site).
    let mut return_edges: Vec<Edge> = Vec::new();
    for subroutine in &subroutines {
        for &block in &subroutine.blocks {
            if !cfg.program().instructions()[cfg.block(block).last()].op().is_retsub() {
                continue;
            }
            for &site in &subroutine.call_sites {
                if let Some(return_site) = cfg.return_site(site) {
                    return_edges.push(Edge {
                        from: block,
                        to: return_site,
                        kind: EdgeKind::RetsubToReturnSite,
                    });
                }
            }
        }
    }
    for edge in return_edges {
        cfg.add_edge(edge);
    }
    cfg.rebuild_predecessors();

    let calls = subroutines
        .iter()
        .enumerate()
        .flat_map(|(callee, s)| {
            s.call_sites.iter().map(move |&site| (callee, site))
        })
        .map(|(callee, site)| CallEdge {
            caller: cfg.block(site).owner(),
            callee,
            site,
        })
        .collect();

    Ok(CallGraph { subroutines, calls })
}

fn claim(cfg: &Cfg, entry: BlockId, tag: Owner, owner: &mut [Option<Owner>]) -> Vec<BlockId> {
    let mut owned = Vec::new();
    let mut stack = vec![entry];
    while let Some(id) = stack.pop() {
        if owner[id].is_some() {
            continue;
        }
        owner[id] = Some(tag);
        owned.push(id);
        let block = cfg.block(id);
        let is_callsub = cfg.program().instructions()[block.last()].op().is_callsub();
        if is_callsub {
            // Stay in the caller: continue at the return site, not in the
            // callee body.
            if let Some(site) = cfg.return_site(id) {
                stack.push(site);
            }
            continue;
        }
        for edge in block.successors() {
            if edge.kind != EdgeKind::CallsubToEntry && edge.kind != EdgeKind::RetsubToReturnSite {
                stack.push(edge.to);
            }
        }
    }
    owned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Program;

    fn analyzed(source: &str) -> (Cfg, CallGraph) {
        let mut cfg = Cfg::build(Program::parse(source).unwrap()).unwrap();
        let graph = recover(&mut cfg).unwrap();
        (cfg, graph)
    }

    const CALL_PROGRAM: &str = "#pragma version 4
int 1
callsub check
return
check:
int 1
retsub
";

    #[test]
    fn discovers_subroutines_and_call_sites() {
        let (_cfg, graph) = analyzed(CALL_PROGRAM);
        assert_eq!(graph.subroutines.len(), 1);
        let sub = &graph.subroutines[0];
        assert_eq!(sub.name, "check");
        assert_eq!(sub.call_sites.len(), 1);
        assert_eq!(graph.calls.len(), 1);
        assert_eq!(graph.calls[0].caller, Owner::Main);
    }

    #[test]
    fn retsub_links_back_to_the_return_site() {
        let (cfg, graph) = analyzed(CALL_PROGRAM);
        let sub = &graph.subroutines[0];
        let retsub_block = *sub.blocks.last().unwrap();
        let return_edge = cfg
            .block(retsub_block)
            .successors()
            .iter()
            .find(|e| e.kind == EdgeKind::RetsubToReturnSite)
            .expect("return edge present");
        let return_site = cfg.return_site(graph.calls[0].site).unwrap();
        assert_eq!(return_edge.to, return_site);
    }

    #[test]
    fn subroutine_blocks_are_owned_once() {
        let (cfg, graph) = analyzed(CALL_PROGRAM);
        let sub = &graph.subroutines[0];
        for &block in &sub.blocks {
            assert_eq!(cfg.block(block).owner(), Owner::Subroutine(0));
        }
        assert_eq!(cfg.block(Cfg::ENTRY).owner(), Owner::Main);
    }

    #[test]
    fn retsub_in_main_is_rejected() {
        let program = Program::parse("#pragma version 4\nint 1\nretsub\n").unwrap();
        let mut cfg = Cfg::build(program).unwrap();
        assert!(matches!(
            recover(&mut cfg),
            Err(CfgError::RetsubOutsideSubroutine { .. })
        ));
    }

    #[test]
    fn recursion_is_permitted() {
        let (_cfg, graph) = analyzed(
            "#pragma version 4
callsub ping
return
ping:
callsub pong
retsub
pong:
callsub ping
retsub
",
        );
        assert_eq!(graph.subroutines.len(), 2);
        assert!(graph
            .calls
            .iter()
            .any(|c| matches!(c.caller, Owner::Subroutine(_))));
    }
}
