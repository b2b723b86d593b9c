//! Line-oriented lexer/parser producing a typed instruction stream.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use teal_asm::{Instruction, Opcode, MAX_AVM_VERSION};

use crate::error::ParseError;
use crate::mode::{self, ExecutionMode};

/// A parsed program: ordered instructions, the label table, the declared
/// language version and the detected execution mode. Immutable after
/// parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
    labels: BTreeMap<String, usize>,
    version: u8,
    mode: ExecutionMode,
}

impl Program {
    /// Parse a full source text.
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let mut instructions: Vec<Instruction> = Vec::new();
        let mut labels: BTreeMap<String, usize> = BTreeMap::new();
        let mut version: u8 = 1;
        let mut version_declared = false;

        for (index, raw_line) in source.lines().enumerate() {
            let line = index as u32 + 1;
            let tokens = tokenize(raw_line);
            if tokens.is_empty() {
                continue;
            }

            if tokens[0].starts_with("#pragma") {
                if version_declared || !instructions.is_empty() || !labels.is_empty() {
                    return Err(ParseError::MisplacedPragma { line });
                }
                version = parse_pragma(&tokens, line)?;
                version_declared = true;
                continue;
            }

            if tokens.len() == 1 && tokens[0].len() > 1 && tokens[0].ends_with(':') {
                let label = tokens[0].trim_end_matches(':').to_string();
                if labels.insert(label.clone(), instructions.len()).is_some() {
                    return Err(ParseError::DuplicateLabel { line, label });
                }
                continue;
            }
            if tokens[0].ends_with(':') {
                return Err(ParseError::MalformedLabel {
                    line,
                    label: tokens[0].trim_end_matches(':').to_string(),
                });
            }

            let op = Opcode::parse(tokens[0], &tokens[1..])
                .map_err(|source| ParseError::Opcode { line, source })?;
            let required = op.min_version();
            if required > version {
                return Err(ParseError::VersionGate {
                    line,
                    op: op.to_string(),
                    required,
                    version,
                });
            }
            instructions.push(Instruction::new(op, line));
        }

        // Undefined label references are deferred to end of parse.
        for instruction in &instructions {
            for label in instruction.op().label_refs() {
                if !labels.contains_key(label) {
                    return Err(ParseError::UndefinedLabel {
                        line: instruction.line(),
                        label: label.to_string(),
                    });
                }
            }
        }

        let mode = mode::detect(&instructions);
        Ok(Self {
            instructions,
            labels,
            version,
            mode,
        })
    }

    /// Ordered instruction sequence.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Label table: name to instruction index.
    pub fn labels(&self) -> &BTreeMap<String, usize> {
        &self.labels
    }

    /// Instruction index a label resolves to.
    pub fn label_target(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }

    /// Labels defined at the given instruction index.
    pub fn labels_at(&self, index: usize) -> Vec<&str> {
        self.labels
            .iter()
            .filter(|(_, &i)| i == index)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Declared language version (1 when no pragma is present).
    pub const fn version(&self) -> u8 {
        self.version
    }

    /// Detected execution mode.
    pub const fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Canonical textual form: pragma, labels, and one instruction per
    /// line. Parsing the canonical form yields an equal program.
    pub fn to_canonical_string(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "#pragma version {}", self.version);
        for (index, instruction) in self.instructions.iter().enumerate() {
            for label in self.labels_at(index) {
                let _ = writeln!(out, "{label}:");
            }
            let _ = writeln!(out, "{instruction}");
        }
        for label in self.labels_at(self.instructions.len()) {
            let _ = writeln!(out, "{label}:");
        }
        out
    }
}

fn parse_pragma(tokens: &[&str], line: u32) -> Result<u8, ParseError> {
    let words: Vec<&str> = if tokens[0] == "#pragma" {
        tokens[1..].to_vec()
    } else {
        return Err(ParseError::InvalidPragma {
            line,
            detail: format!("malformed directive `{}`", tokens[0]),
        });
    };
    match words.as_slice() {
        ["version", value] => {
            let version: u8 = value.parse().map_err(|_| ParseError::InvalidPragma {
                line,
                detail: format!("version `{value}` is not a number"),
            })?;
            if version == 0 || version > MAX_AVM_VERSION {
                return Err(ParseError::InvalidPragma {
                    line,
                    detail: format!("unsupported version {version}"),
                });
            }
            Ok(version)
        }
        _ => Err(ParseError::InvalidPragma {
            line,
            detail: "expected `#pragma version N`".to_string(),
        }),
    }
}

/// Split a line into tokens, keeping quoted strings (escapes included)
/// as single tokens and stopping at a `//` comment outside quotes.
fn tokenize(line: &str) -> Vec<&str> {
    let bytes = line.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'/') {
            break;
        }
        let start = i;
        if bytes[i] == b'"' {
            i += 1;
            while i < bytes.len() {
                match bytes[i] {
                    b'\\' => i += 2,
                    b'"' => {
                        i += 1;
                        break;
                    }
                    _ => i += 1,
                }
            }
        } else {
            while i < bytes.len()
                && !bytes[i].is_ascii_whitespace()
                && !(bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'/'))
            {
                i += 1;
            }
        }
        tokens.push(&line[start..i.min(bytes.len())]);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use teal_asm::TxnField;

    #[test]
    fn tokenizer_handles_quotes_and_comments() {
        assert_eq!(tokenize("int 1 // push"), vec!["int", "1"]);
        assert_eq!(tokenize("byte \"a b//c\""), vec!["byte", "\"a b//c\""]);
        assert_eq!(tokenize("   "), Vec::<&str>::new());
    }

    #[test]
    fn parses_labels_and_instructions() {
        let program = Program::parse(
            "#pragma version 4\nmain:\nint 1\nbnz main\nreturn\n",
        )
        .unwrap();
        assert_eq!(program.version(), 4);
        assert_eq!(program.label_target("main"), Some(0));
        assert_eq!(program.instructions().len(), 3);
        assert_eq!(program.instructions()[0].line(), 3);
    }

    #[test]
    fn rejects_duplicate_labels() {
        let err = Program::parse("a:\na:\nint 1\n").unwrap_err();
        assert!(matches!(err, ParseError::DuplicateLabel { line: 2, .. }));
    }

    #[test]
    fn undefined_labels_are_deferred_to_end_of_parse() {
        let err = Program::parse("int 1\nbnz nowhere\n").unwrap_err();
        assert!(matches!(
            err,
            ParseError::UndefinedLabel { line: 2, .. }
        ));
    }

    #[test]
    fn version_gate_rejects_new_opcodes() {
        let err = Program::parse("#pragma version 3\ncallsub sub\nsub:\n").unwrap_err();
        assert!(matches!(
            err,
            ParseError::VersionGate {
                required: 4,
                version: 3,
                ..
            }
        ));
    }

    #[test]
    fn version_gate_covers_field_immediates() {
        let err = Program::parse("#pragma version 1\ntxn OnCompletion\n").unwrap_err();
        assert!(matches!(err, ParseError::VersionGate { required: 2, .. }));
    }

    #[test]
    fn pragma_must_come_first() {
        let err = Program::parse("int 1\n#pragma version 2\n").unwrap_err();
        assert!(matches!(err, ParseError::MisplacedPragma { line: 2 }));
    }

    #[test]
    fn pseudo_ops_normalize_to_byte_pushes() {
        let program = Program::parse("method \"add(uint64,uint64)uint64\"\n").unwrap();
        assert!(matches!(
            program.instructions()[0].op(),
            Opcode::Byte(bytes) if bytes.len() == 4
        ));
    }

    #[test]
    fn named_int_constants_resolve() {
        let program = Program::parse("int pay\ntxn TypeEnum\n").unwrap();
        assert_eq!(program.instructions()[0].op(), &Opcode::Int(1));
        assert_eq!(
            program.instructions()[1].op(),
            &Opcode::Txn(TxnField::TypeEnum)
        );
    }
}
