use teal_analyzer::prelude::*;

fn build(source: &str) -> Cfg {
    Cfg::build(Program::parse(source).unwrap()).unwrap()
}

const BRANCHY: &str = r#"#pragma version 4
txn ApplicationID
int 0
==
bnz create
txn OnCompletion
int NoOp
==
bnz handle
err
create:
int 1
return
handle:
callsub work
int 1
return
work:
int 1
retsub
"#;

#[test]
fn minimal_program_is_one_halting_block() {
    let cfg = build("#pragma version 6\nint 1\nreturn\n");
    assert_eq!(cfg.blocks().len(), 1);
    let block = cfg.block(Cfg::ENTRY);
    assert!(block.successors().is_empty());
    assert_eq!(block.exit(), Some(ExitKind::Accept));
    assert_eq!(cfg.program().mode(), ExecutionMode::Stateless);
}

#[test]
fn every_block_has_at_least_one_instruction() {
    let cfg = build(BRANCHY);
    for block in cfg.blocks() {
        assert!(block.last() >= block.first());
    }
}

#[test]
fn edge_counts_match_the_terminator_kind() {
    let cfg = build(BRANCHY);
    for block in cfg.blocks() {
        let op = cfg.program().instructions()[block.last()].op();
        let out = block.successors().len();
        if matches!(op, Opcode::Bnz(_) | Opcode::Bz(_)) {
            assert_eq!(out, 2, "branch block b{}", block.id());
        } else if matches!(op, Opcode::B(_)) {
            assert_eq!(out, 1, "jump block b{}", block.id());
        } else if op.is_err() || matches!(op, Opcode::Return) {
            assert_eq!(out, 0, "halt block b{}", block.id());
        }
    }
}

#[test]
fn edges_target_existing_blocks_and_invert_cleanly() {
    let cfg = build(BRANCHY);
    for block in cfg.blocks() {
        for edge in block.successors() {
            assert!(edge.to < cfg.blocks().len());
            assert!(cfg
                .block(edge.to)
                .predecessors()
                .iter()
                .any(|e| e.from == block.id() && e.kind == edge.kind));
        }
    }
}

#[test]
fn block_ranges_partition_the_instruction_list() {
    let cfg = build(BRANCHY);
    let mut covered = vec![false; cfg.program().instructions().len()];
    for block in cfg.blocks() {
        for index in block.first()..=block.last() {
            assert!(!covered[index]);
            covered[index] = true;
        }
    }
    assert!(covered.into_iter().all(|c| c));
}

#[test]
fn lone_label_targets_stay_distinct_blocks() {
    let cfg = build("b only\nonly:\nint 1\nreturn\n");
    assert_eq!(cfg.blocks().len(), 2);
    let target = cfg.block_at(cfg.program().label_target("only").unwrap()).unwrap();
    assert_eq!(cfg.block(Cfg::ENTRY).successors()[0].to, target);
}

#[test]
fn call_graph_assigns_each_block_to_one_region() {
    let program = Program::parse(BRANCHY).unwrap();
    let analysis = Analysis::build(program, None).unwrap();
    let graph = analysis.call_graph();
    assert_eq!(graph.subroutines.len(), 1);
    let sub = &graph.subroutines[0];
    assert_eq!(sub.name, "work");
    for block in analysis.cfg().blocks() {
        match block.owner() {
            Owner::Subroutine(index) => assert!(graph.subroutines[index]
                .blocks
                .contains(&block.id())),
            Owner::Main => assert!(!sub.blocks.contains(&block.id())),
        }
    }
}
