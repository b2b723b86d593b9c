use pretty_assertions::assert_eq;
use rstest::rstest;
use teal_analyzer::prelude::*;

const REALISTIC: &str = r#"#pragma version 6
// dispatcher
txn ApplicationID
int 0
==
bnz create
txn OnCompletion
int NoOp
==
assert
byte "counter"
app_global_get
int 1
+
store 0
byte "counter"
load 0
app_global_put
int 1
return
create:
int 1
return
"#;

#[test]
fn canonical_round_trip_preserves_the_program() {
    let parsed = Program::parse(REALISTIC).unwrap();
    let reparsed = Program::parse(&parsed.to_canonical_string()).unwrap();
    assert_eq!(parsed.instructions().len(), reparsed.instructions().len());
    for (a, b) in parsed.instructions().iter().zip(reparsed.instructions()) {
        assert_eq!(a.op(), b.op());
    }
    assert_eq!(parsed.labels(), reparsed.labels());
    assert_eq!(parsed.version(), reparsed.version());
    // The canonical form is a fixed point.
    assert_eq!(
        reparsed.to_canonical_string(),
        Program::parse(&reparsed.to_canonical_string())
            .unwrap()
            .to_canonical_string()
    );
}

#[rstest]
#[case("assert", 3)]
#[case("callsub done", 4)]
#[case("txnas ApplicationArgs", 5)]
#[case("itxn_next", 6)]
#[case("switch done", 8)]
fn opcodes_reject_older_pragmas(#[case] line: &str, #[case] introduced: u8) {
    let source = format!("#pragma version {}\ndone:\nint 1\n{line}\n", introduced - 1);
    let err = Program::parse(&source).unwrap_err();
    assert!(
        matches!(err, ParseError::VersionGate { required, .. } if required == introduced),
        "unexpected error: {err}"
    );

    let accepted = format!("#pragma version {introduced}\ndone:\nint 1\n{line}\n");
    Program::parse(&accepted).unwrap();
}

#[test]
fn duplicate_labels_are_always_rejected() {
    let err = Program::parse("main:\nint 1\nmain:\nreturn\n").unwrap_err();
    assert!(matches!(err, ParseError::DuplicateLabel { .. }));
}

#[test]
fn unknown_mnemonics_name_the_line() {
    let err = Program::parse("int 1\nfrobnicate 3\n").unwrap_err();
    match err {
        ParseError::Opcode { line, .. } => assert_eq!(line, 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn byte_literal_forms_agree() {
    let program = Program::parse(
        "byte base64 aGk=\nbyte b64(aGk=)\nbyte 0x6869\nbyte \"hi\"\n",
    )
    .unwrap();
    let ops: Vec<&Opcode> = program.instructions().iter().map(Instruction::op).collect();
    assert!(ops.iter().all(|op| **op == Opcode::Byte(b"hi".to_vec())));
}

#[test]
fn instruction_lines_are_unique_and_ascending() {
    let program = Program::parse(REALISTIC).unwrap();
    let lines: Vec<u32> = program.instructions().iter().map(Instruction::line).collect();
    let mut sorted = lines.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(lines, sorted);
}

#[test]
fn stateful_mode_is_detected_from_app_opcodes() {
    let program = Program::parse(REALISTIC).unwrap();
    assert_eq!(program.mode(), ExecutionMode::Stateful);

    let stateless = Program::parse("arg 0\nbtoi\nreturn\n").unwrap();
    assert_eq!(stateless.mode(), ExecutionMode::Stateless);
}
