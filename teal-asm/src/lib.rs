//! Atomic types of the TEAL assembly language: the instruction catalogue,
//! named-field constants, and literal decoding.

#![warn(missing_docs)]

mod field;
mod instruction;
mod literal;
mod opcode;

pub use field::{AssetHoldingField, AssetParamsField, GlobalField, OnComplete, TxnField, TxnType};
pub use instruction::Instruction;
pub use literal::{decode_address, method_selector, parse_byte_literal, parse_uint, LiteralError};
pub use opcode::{Opcode, OpcodeError};

/// Highest AVM version this catalogue knows about.
pub const MAX_AVM_VERSION: u8 = 8;
