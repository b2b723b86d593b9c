use teal_analyzer::prelude::*;

fn analyze(source: &str) -> Analysis {
    Analysis::build(Program::parse(source).unwrap(), None).unwrap()
}

fn block_of_label(analysis: &Analysis, label: &str) -> BlockId {
    let index = analysis.program().label_target(label).unwrap();
    analysis.cfg().block_at(index).unwrap()
}

#[test]
fn group_size_stays_unconstrained_without_a_check() {
    let analysis = analyze("#pragma version 2\ngtxn 1 Amount\nint 100\n>=\nreturn\n");
    let entry = analysis.cfg().block(Cfg::ENTRY);
    assert!(entry.context.input.get(TrackedField::GroupSize).is_top());
}

#[test]
fn an_assert_pins_the_field_for_every_following_block() {
    let analysis = analyze(
        "#pragma version 3
global GroupSize
int 2
==
assert
b rest
rest:
int 1
return
",
    );
    let rest = block_of_label(&analysis, "rest");
    assert_eq!(
        analysis.cfg().block(rest).context.input.get(TrackedField::GroupSize),
        &Lattice::singleton(Value::Uint(2))
    );
}

#[test]
fn sender_refined_in_a_subroutine_reaches_the_return_site() {
    let analysis = analyze(
        "#pragma version 4
callsub auth
int 1
return
auth:
txn Sender
byte \"admin\"
==
assert
retsub
",
    );
    let return_site = analysis.cfg().return_site(Cfg::ENTRY).unwrap();
    assert_eq!(
        analysis
            .cfg()
            .block(return_site)
            .context
            .input
            .get(TrackedField::Sender),
        &Lattice::singleton(Value::Bytes(b"admin".to_vec()))
    );
}

#[test]
fn mutually_recursive_subroutines_converge() {
    let analysis = analyze(
        "#pragma version 4
callsub even
int 1
return
even:
global GroupSize
int 2
==
assert
int 1
bnz even_done
callsub odd
even_done:
retsub
odd:
global GroupSize
int 2
==
assert
callsub even
retsub
",
    );
    let return_site = analysis.cfg().return_site(Cfg::ENTRY).unwrap();
    assert_eq!(
        analysis
            .cfg()
            .block(return_site)
            .context
            .input
            .get(TrackedField::GroupSize),
        &Lattice::singleton(Value::Uint(2))
    );
}

#[test]
fn joins_only_widen_when_predecessors_are_added() {
    // One path into `done`.
    let narrow = analyze(
        "#pragma version 3
txn OnCompletion
int NoOp
==
assert
b done
done:
int 1
return
",
    );
    // A second path into `done` carrying OptIn.
    let wide = analyze(
        "#pragma version 3
txn OnCompletion
int OptIn
==
bnz done
txn OnCompletion
int NoOp
==
assert
b done
done:
int 1
return
",
    );
    let narrow_state = narrow
        .cfg()
        .block(block_of_label(&narrow, "done"))
        .context
        .input
        .get(TrackedField::OnCompletion)
        .clone();
    let wide_state = wide
        .cfg()
        .block(block_of_label(&wide, "done"))
        .context
        .input
        .get(TrackedField::OnCompletion)
        .clone();
    assert!(narrow_state.le(&wide_state));
    assert_eq!(
        wide_state,
        Lattice::from_set(
            [Value::Uint(0), Value::Uint(1)].into_iter().collect(),
            WIDENING_CAP
        )
    );
}

#[test]
fn widening_collapses_large_sets_to_top() {
    // 17 distinct Fee values joined into one block exceed the cap.
    let mut source = String::from("#pragma version 3\n");
    for value in 0..17 {
        source.push_str(&format!(
            "txn Fee\nint {value}\n==\nbnz done\n"
        ));
    }
    source.push_str("err\ndone:\nint 1\nreturn\n");
    let analysis = analyze(&source);
    let done = block_of_label(&analysis, "done");
    assert!(analysis
        .cfg()
        .block(done)
        .context
        .input
        .get(TrackedField::Fee)
        .is_top());
}

#[test]
fn rejecting_paths_contribute_nothing() {
    let analysis = analyze(
        "#pragma version 3
txn OnCompletion
int NoOp
==
bnz good
err
good:
int 1
return
",
    );
    let good = block_of_label(&analysis, "good");
    assert_eq!(
        analysis.cfg().block(good).context.input.get(TrackedField::OnCompletion),
        &Lattice::singleton(Value::Uint(0))
    );
}

#[test]
fn group_config_seed_constrains_the_entry() {
    let config: GroupConfig = toml::from_str(
        r#"
[[contracts]]
name = "swap"
path = "swap.teal"
artifact = "LogicSig"
version = 4

[[groups]]
name = "swap-pair"

[[groups.transactions]]
txn_id = "t0"
txn_type = "pay"
absolute_index = 0

[[groups.transactions]]
txn_id = "t1"
txn_type = "axfer"

[groups.transactions.logic_sig]
contract = "swap"
"#,
    )
    .unwrap();
    let seed = config.entry_state("swap").unwrap();
    let program = Program::parse("#pragma version 4\ntxn Amount\nint 1\n>=\nreturn\n").unwrap();
    let analysis = Analysis::build(program, Some(seed)).unwrap();
    let entry = analysis.cfg().block(Cfg::ENTRY);
    assert_eq!(
        entry.context.input.get(TrackedField::GroupSize),
        &Lattice::singleton(Value::Uint(2))
    );
    assert_eq!(
        entry.context.input.get(TrackedField::TypeEnum),
        &Lattice::singleton(Value::Uint(4))
    );
}
