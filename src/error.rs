//! Analyzer error implementation.

use std::io;
use std::path::PathBuf;

use teal_asm::OpcodeError;
use thiserror::Error;

/// Errors raised while turning source text into a program.
///
/// Every variant is fatal for the program being parsed; analysis continues
/// with the next input file.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A mnemonic or one of its immediates failed to parse.
    #[error("line {line}: {source}")]
    Opcode {
        /// One-based source line.
        line: u32,
        /// Catalogue-level failure.
        source: OpcodeError,
    },
    /// The opcode (or a field immediate) is newer than the program version.
    #[error("line {line}: `{op}` requires version {required}, program is version {version}")]
    VersionGate {
        /// One-based source line.
        line: u32,
        /// Canonical form of the offending instruction.
        op: String,
        /// Version the instruction needs.
        required: u8,
        /// Declared program version.
        version: u8,
    },
    /// `#pragma version` appeared after the first instruction or label.
    #[error("line {line}: #pragma version must precede all instructions")]
    MisplacedPragma {
        /// One-based source line.
        line: u32,
    },
    /// The pragma is malformed or names an unsupported version.
    #[error("line {line}: invalid #pragma: {detail}")]
    InvalidPragma {
        /// One-based source line.
        line: u32,
        /// Failure detail.
        detail: String,
    },
    /// The same label was defined twice.
    #[error("line {line}: duplicate label `{label}`")]
    DuplicateLabel {
        /// One-based source line.
        line: u32,
        /// Offending label.
        label: String,
    },
    /// A label was referenced but never defined. Reported at end of parse.
    #[error("line {line}: reference to undefined label `{label}`")]
    UndefinedLabel {
        /// Line of the referencing instruction.
        line: u32,
        /// Offending label.
        label: String,
    },
    /// A label line carried extra tokens.
    #[error("line {line}: label `{label}` must stand alone")]
    MalformedLabel {
        /// One-based source line.
        line: u32,
        /// Offending label.
        label: String,
    },
}

/// Errors raised while rebuilding the control-flow and call graphs.
#[derive(Debug, Error)]
pub enum CfgError {
    /// A branch target resolved to an instruction index that does not
    /// start a basic block.
    #[error("branch target `{label}` does not start a basic block")]
    BadBranchTarget {
        /// Offending label.
        label: String,
    },
    /// A branch falls through past the end of the program.
    #[error("line {line}: `{op}` has no fall-through instruction")]
    FallthroughAtEnd {
        /// Line of the branch.
        line: u32,
        /// Canonical form of the branch.
        op: String,
    },
    /// `retsub` is reachable without an enclosing subroutine.
    #[error("line {line}: retsub outside any subroutine")]
    RetsubOutsideSubroutine {
        /// Line of the `retsub`.
        line: u32,
    },
}

/// Errors raised while loading the group configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read group configuration {path}: {source}")]
    Io {
        /// Configuration path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The file is not valid TOML for the expected schema.
    #[error("invalid group configuration {path}: {source}")]
    Toml {
        /// Configuration path.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
}

/// A detector failed internally. The framework logs it and moves on.
#[derive(Debug, Error)]
#[error("detector `{detector}` failed: {detail}")]
pub struct DetectorError {
    /// Identifier of the failing detector.
    pub detector: &'static str,
    /// Failure detail.
    pub detail: String,
}

/// Top-level error for one analyzed program.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The program text did not parse.
    #[error("{path}: {source}")]
    Parse {
        /// Source file.
        path: String,
        /// Underlying parse error.
        source: ParseError,
    },
    /// The control-flow graph could not be rebuilt.
    #[error("{path}: {source}")]
    Cfg {
        /// Source file.
        path: String,
        /// Underlying CFG error.
        source: CfgError,
    },
    /// The group configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The input file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// Source file.
        path: String,
        /// Underlying error.
        source: io::Error,
    },
}
