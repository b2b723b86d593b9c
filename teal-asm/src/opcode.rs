//! Instruction catalogue: one variant per supported mnemonic, immediates
//! inline, with the version stamp, stack signature and classification of
//! every opcode.

use core::fmt;
use std::str::FromStr;

use crate::field::{
    AssetHoldingField, AssetParamsField, GlobalField, TxnField,
};
use crate::literal::{self, LiteralError};

/// Instruction representation for the analyzer.
///
/// Each variant carries its immediates already parsed to their semantic
/// type. Branch targets and subroutine selectors are kept as label names;
/// resolution to instruction indices happens in the program parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Opcode {
    // Flow control and assertions.
    Error,
    Return,
    Assert,
    B(String),
    Bnz(String),
    Bz(String),
    Callsub(String),
    Retsub,
    Switch(Vec<String>),
    Match(Vec<String>),

    // Cryptographic primitives.
    Sha256,
    Keccak256,
    Sha512_256,
    Ed25519Verify,

    // Arithmetic, comparison and logic.
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Le,
    Ge,
    LogicAnd,
    LogicOr,
    Eq,
    Neq,
    LogicNot,
    BitOr,
    BitAnd,
    BitXor,
    BitNot,
    Mulw,
    Addw,
    Divmodw,
    Shl,
    Shr,
    Sqrt,
    Bitlen,
    Exp,
    Expw,

    // Byte-array manipulation.
    Len,
    Itob,
    Btoi,
    Concat,
    Substring(u8, u8),
    Substring3,
    GetBit,
    SetBit,
    GetByte,
    SetByte,

    // Constants.
    Intcblock(Vec<u64>),
    Intc(u8),
    Intc0,
    Intc1,
    Intc2,
    Intc3,
    Bytecblock(Vec<Vec<u8>>),
    Bytec(u8),
    Bytec0,
    Bytec1,
    Bytec2,
    Bytec3,
    Int(u64),
    Byte(Vec<u8>),
    PushInt(u64),
    PushBytes(Vec<u8>),

    // Logic-signature arguments.
    Arg(u8),
    Arg0,
    Arg1,
    Arg2,
    Arg3,
    Args,

    // Transaction-context access.
    Txn(TxnField),
    Txna(TxnField, u8),
    Txnas(TxnField),
    Gtxn(u8, TxnField),
    Gtxna(u8, TxnField, u8),
    Gtxns(TxnField),
    Gtxnsa(TxnField, u8),
    Global(GlobalField),

    // Scratch space.
    Load(u8),
    Store(u8),
    Loads,
    Stores,

    // Stack manipulation.
    Pop,
    Dup,
    Dup2,
    Dig(u8),
    Swap,
    Select,
    Cover(u8),
    Uncover(u8),

    // Application state.
    Balance,
    MinBalance,
    AppOptedIn,
    AppLocalGet,
    AppLocalGetEx,
    AppGlobalGet,
    AppGlobalGetEx,
    AppLocalPut,
    AppGlobalPut,
    AppLocalDel,
    AppGlobalDel,
    AssetHoldingGet(AssetHoldingField),
    AssetParamsGet(AssetParamsField),

    // Inner transactions and logging.
    ItxnBegin,
    ItxnField(TxnField),
    ItxnNext,
    ItxnSubmit,
    Itxn(TxnField),
    Itxna(TxnField, u8),
    Log,
}

/// Errors produced while parsing a single mnemonic and its immediates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpcodeError {
    /// The mnemonic does not name any catalogued opcode.
    UnknownMnemonic(String),
    /// The number of immediates does not match the opcode's slots.
    OperandCount {
        /// Offending mnemonic.
        mnemonic: &'static str,
        /// Human description of the expected immediates.
        expected: &'static str,
        /// Number of immediates found.
        found: usize,
    },
    /// An immediate failed to decode to its slot type.
    Operand {
        /// Offending mnemonic.
        mnemonic: &'static str,
        /// Failure detail.
        detail: String,
    },
}

impl fmt::Display for OpcodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMnemonic(m) => write!(f, "unknown mnemonic `{m}`"),
            Self::OperandCount {
                mnemonic,
                expected,
                found,
            } => write!(f, "`{mnemonic}` expects {expected}, found {found} immediates"),
            Self::Operand { mnemonic, detail } => write!(f, "`{mnemonic}`: {detail}"),
        }
    }
}

impl std::error::Error for OpcodeError {}

fn operand_err(mnemonic: &'static str, e: LiteralError) -> OpcodeError {
    OpcodeError::Operand {
        mnemonic,
        detail: e.to_string(),
    }
}

fn expect(mnemonic: &'static str, expected: &'static str, operands: &[&str], n: usize) -> Result<(), OpcodeError> {
    if operands.len() == n {
        Ok(())
    } else {
        Err(OpcodeError::OperandCount {
            mnemonic,
            expected,
            found: operands.len(),
        })
    }
}

fn uint(mnemonic: &'static str, token: &str) -> Result<u64, OpcodeError> {
    literal::parse_uint(token).map_err(|e| operand_err(mnemonic, e))
}

fn slot(mnemonic: &'static str, token: &str) -> Result<u8, OpcodeError> {
    let value = uint(mnemonic, token)?;
    u8::try_from(value).map_err(|_| OpcodeError::Operand {
        mnemonic,
        detail: format!("immediate {value} does not fit in a byte"),
    })
}

fn txn_field(mnemonic: &'static str, token: &str) -> Result<TxnField, OpcodeError> {
    TxnField::from_str(token).map_err(|_| OpcodeError::Operand {
        mnemonic,
        detail: format!("unknown transaction field `{token}`"),
    })
}

fn bytes(mnemonic: &'static str, operands: &[&str]) -> Result<Vec<u8>, OpcodeError> {
    let (decoded, used) = literal::parse_byte_literal(operands).map_err(|e| operand_err(mnemonic, e))?;
    if used != operands.len() {
        return Err(OpcodeError::OperandCount {
            mnemonic,
            expected: "one byte literal",
            found: operands.len(),
        });
    }
    Ok(decoded)
}

impl Opcode {
    /// Parse a mnemonic and its raw immediate tokens into an opcode.
    pub fn parse(mnemonic: &str, operands: &[&str]) -> Result<Self, OpcodeError> {
        use Opcode::*;
        let op = match mnemonic {
            "err" => expect("err", "no immediates", operands, 0).map(|_| Error)?,
            "return" => expect("return", "no immediates", operands, 0).map(|_| Return)?,
            "assert" => expect("assert", "no immediates", operands, 0).map(|_| Assert)?,
            "b" => {
                expect("b", "one label", operands, 1)?;
                B(operands[0].to_string())
            }
            "bnz" => {
                expect("bnz", "one label", operands, 1)?;
                Bnz(operands[0].to_string())
            }
            "bz" => {
                expect("bz", "one label", operands, 1)?;
                Bz(operands[0].to_string())
            }
            "callsub" => {
                expect("callsub", "one label", operands, 1)?;
                Callsub(operands[0].to_string())
            }
            "retsub" => expect("retsub", "no immediates", operands, 0).map(|_| Retsub)?,
            "switch" => {
                if operands.is_empty() {
                    return Err(OpcodeError::OperandCount {
                        mnemonic: "switch",
                        expected: "at least one label",
                        found: 0,
                    });
                }
                Switch(operands.iter().map(|s| s.to_string()).collect())
            }
            "match" => {
                if operands.is_empty() {
                    return Err(OpcodeError::OperandCount {
                        mnemonic: "match",
                        expected: "at least one label",
                        found: 0,
                    });
                }
                Match(operands.iter().map(|s| s.to_string()).collect())
            }

            "sha256" => expect("sha256", "no immediates", operands, 0).map(|_| Sha256)?,
            "keccak256" => expect("keccak256", "no immediates", operands, 0).map(|_| Keccak256)?,
            "sha512_256" => expect("sha512_256", "no immediates", operands, 0).map(|_| Sha512_256)?,
            "ed25519verify" => {
                expect("ed25519verify", "no immediates", operands, 0).map(|_| Ed25519Verify)?
            }

            "+" => expect("+", "no immediates", operands, 0).map(|_| Add)?,
            "-" => expect("-", "no immediates", operands, 0).map(|_| Sub)?,
            "*" => expect("*", "no immediates", operands, 0).map(|_| Mul)?,
            "/" => expect("/", "no immediates", operands, 0).map(|_| Div)?,
            "%" => expect("%", "no immediates", operands, 0).map(|_| Mod)?,
            "<" => expect("<", "no immediates", operands, 0).map(|_| Lt)?,
            ">" => expect(">", "no immediates", operands, 0).map(|_| Gt)?,
            "<=" => expect("<=", "no immediates", operands, 0).map(|_| Le)?,
            ">=" => expect(">=", "no immediates", operands, 0).map(|_| Ge)?,
            "&&" => expect("&&", "no immediates", operands, 0).map(|_| LogicAnd)?,
            "||" => expect("||", "no immediates", operands, 0).map(|_| LogicOr)?,
            "==" => expect("==", "no immediates", operands, 0).map(|_| Eq)?,
            "!=" => expect("!=", "no immediates", operands, 0).map(|_| Neq)?,
            "!" => expect("!", "no immediates", operands, 0).map(|_| LogicNot)?,
            "|" => expect("|", "no immediates", operands, 0).map(|_| BitOr)?,
            "&" => expect("&", "no immediates", operands, 0).map(|_| BitAnd)?,
            "^" => expect("^", "no immediates", operands, 0).map(|_| BitXor)?,
            "~" => expect("~", "no immediates", operands, 0).map(|_| BitNot)?,
            "mulw" => expect("mulw", "no immediates", operands, 0).map(|_| Mulw)?,
            "addw" => expect("addw", "no immediates", operands, 0).map(|_| Addw)?,
            "divmodw" => expect("divmodw", "no immediates", operands, 0).map(|_| Divmodw)?,
            "shl" => expect("shl", "no immediates", operands, 0).map(|_| Shl)?,
            "shr" => expect("shr", "no immediates", operands, 0).map(|_| Shr)?,
            "sqrt" => expect("sqrt", "no immediates", operands, 0).map(|_| Sqrt)?,
            "bitlen" => expect("bitlen", "no immediates", operands, 0).map(|_| Bitlen)?,
            "exp" => expect("exp", "no immediates", operands, 0).map(|_| Exp)?,
            "expw" => expect("expw", "no immediates", operands, 0).map(|_| Expw)?,

            "len" => expect("len", "no immediates", operands, 0).map(|_| Len)?,
            "itob" => expect("itob", "no immediates", operands, 0).map(|_| Itob)?,
            "btoi" => expect("btoi", "no immediates", operands, 0).map(|_| Btoi)?,
            "concat" => expect("concat", "no immediates", operands, 0).map(|_| Concat)?,
            "substring" => {
                expect("substring", "two byte offsets", operands, 2)?;
                Substring(slot("substring", operands[0])?, slot("substring", operands[1])?)
            }
            "substring3" => expect("substring3", "no immediates", operands, 0).map(|_| Substring3)?,
            "getbit" => expect("getbit", "no immediates", operands, 0).map(|_| GetBit)?,
            "setbit" => expect("setbit", "no immediates", operands, 0).map(|_| SetBit)?,
            "getbyte" => expect("getbyte", "no immediates", operands, 0).map(|_| GetByte)?,
            "setbyte" => expect("setbyte", "no immediates", operands, 0).map(|_| SetByte)?,

            "intcblock" => Intcblock(
                operands
                    .iter()
                    .map(|t| uint("intcblock", t))
                    .collect::<Result<_, _>>()?,
            ),
            "intc" => {
                expect("intc", "one constant index", operands, 1)?;
                Intc(slot("intc", operands[0])?)
            }
            "intc_0" => expect("intc_0", "no immediates", operands, 0).map(|_| Intc0)?,
            "intc_1" => expect("intc_1", "no immediates", operands, 0).map(|_| Intc1)?,
            "intc_2" => expect("intc_2", "no immediates", operands, 0).map(|_| Intc2)?,
            "intc_3" => expect("intc_3", "no immediates", operands, 0).map(|_| Intc3)?,
            "bytecblock" => {
                let mut constants = Vec::new();
                let mut rest = operands;
                while !rest.is_empty() {
                    let (decoded, used) =
                        literal::parse_byte_literal(rest).map_err(|e| operand_err("bytecblock", e))?;
                    constants.push(decoded);
                    rest = &rest[used..];
                }
                Bytecblock(constants)
            }
            "bytec" => {
                expect("bytec", "one constant index", operands, 1)?;
                Bytec(slot("bytec", operands[0])?)
            }
            "bytec_0" => expect("bytec_0", "no immediates", operands, 0).map(|_| Bytec0)?,
            "bytec_1" => expect("bytec_1", "no immediates", operands, 0).map(|_| Bytec1)?,
            "bytec_2" => expect("bytec_2", "no immediates", operands, 0).map(|_| Bytec2)?,
            "bytec_3" => expect("bytec_3", "no immediates", operands, 0).map(|_| Bytec3)?,
            "int" => {
                expect("int", "one integer", operands, 1)?;
                Int(uint("int", operands[0])?)
            }
            "byte" => Byte(bytes("byte", operands)?),
            "pushint" => {
                expect("pushint", "one integer", operands, 1)?;
                PushInt(uint("pushint", operands[0])?)
            }
            "pushbytes" => PushBytes(bytes("pushbytes", operands)?),
            // Pseudo-ops normalized to single byte pushes.
            "addr" => {
                expect("addr", "one address", operands, 1)?;
                let key = literal::decode_address(operands[0]).map_err(|e| operand_err("addr", e))?;
                Byte(key.to_vec())
            }
            "method" => {
                expect("method", "one method signature", operands, 1)?;
                let signature = operands[0].trim_matches('"');
                Byte(literal::method_selector(signature).to_vec())
            }

            "arg" => {
                expect("arg", "one argument index", operands, 1)?;
                Arg(slot("arg", operands[0])?)
            }
            "arg_0" => expect("arg_0", "no immediates", operands, 0).map(|_| Arg0)?,
            "arg_1" => expect("arg_1", "no immediates", operands, 0).map(|_| Arg1)?,
            "arg_2" => expect("arg_2", "no immediates", operands, 0).map(|_| Arg2)?,
            "arg_3" => expect("arg_3", "no immediates", operands, 0).map(|_| Arg3)?,
            "args" => expect("args", "no immediates", operands, 0).map(|_| Args)?,

            "txn" => {
                expect("txn", "one field", operands, 1)?;
                Txn(txn_field("txn", operands[0])?)
            }
            "txna" => {
                expect("txna", "a field and an index", operands, 2)?;
                Txna(txn_field("txna", operands[0])?, slot("txna", operands[1])?)
            }
            "txnas" => {
                expect("txnas", "one field", operands, 1)?;
                Txnas(txn_field("txnas", operands[0])?)
            }
            "gtxn" => {
                expect("gtxn", "a group index and a field", operands, 2)?;
                Gtxn(slot("gtxn", operands[0])?, txn_field("gtxn", operands[1])?)
            }
            "gtxna" => {
                expect("gtxna", "a group index, a field and an index", operands, 3)?;
                Gtxna(
                    slot("gtxna", operands[0])?,
                    txn_field("gtxna", operands[1])?,
                    slot("gtxna", operands[2])?,
                )
            }
            "gtxns" => {
                expect("gtxns", "one field", operands, 1)?;
                Gtxns(txn_field("gtxns", operands[0])?)
            }
            "gtxnsa" => {
                expect("gtxnsa", "a field and an index", operands, 2)?;
                Gtxnsa(txn_field("gtxnsa", operands[0])?, slot("gtxnsa", operands[1])?)
            }
            "global" => {
                expect("global", "one field", operands, 1)?;
                Global(GlobalField::from_str(operands[0]).map_err(|_| OpcodeError::Operand {
                    mnemonic: "global",
                    detail: format!("unknown global field `{}`", operands[0]),
                })?)
            }

            "load" => {
                expect("load", "one scratch slot", operands, 1)?;
                Load(slot("load", operands[0])?)
            }
            "store" => {
                expect("store", "one scratch slot", operands, 1)?;
                Store(slot("store", operands[0])?)
            }
            "loads" => expect("loads", "no immediates", operands, 0).map(|_| Loads)?,
            "stores" => expect("stores", "no immediates", operands, 0).map(|_| Stores)?,

            "pop" => expect("pop", "no immediates", operands, 0).map(|_| Pop)?,
            "dup" => expect("dup", "no immediates", operands, 0).map(|_| Dup)?,
            "dup2" => expect("dup2", "no immediates", operands, 0).map(|_| Dup2)?,
            "dig" => {
                expect("dig", "one depth", operands, 1)?;
                Dig(slot("dig", operands[0])?)
            }
            "swap" => expect("swap", "no immediates", operands, 0).map(|_| Swap)?,
            "select" => expect("select", "no immediates", operands, 0).map(|_| Select)?,
            "cover" => {
                expect("cover", "one depth", operands, 1)?;
                Cover(slot("cover", operands[0])?)
            }
            "uncover" => {
                expect("uncover", "one depth", operands, 1)?;
                Uncover(slot("uncover", operands[0])?)
            }

            "balance" => expect("balance", "no immediates", operands, 0).map(|_| Balance)?,
            "min_balance" => expect("min_balance", "no immediates", operands, 0).map(|_| MinBalance)?,
            "app_opted_in" => {
                expect("app_opted_in", "no immediates", operands, 0).map(|_| AppOptedIn)?
            }
            "app_local_get" => {
                expect("app_local_get", "no immediates", operands, 0).map(|_| AppLocalGet)?
            }
            "app_local_get_ex" => {
                expect("app_local_get_ex", "no immediates", operands, 0).map(|_| AppLocalGetEx)?
            }
            "app_global_get" => {
                expect("app_global_get", "no immediates", operands, 0).map(|_| AppGlobalGet)?
            }
            "app_global_get_ex" => {
                expect("app_global_get_ex", "no immediates", operands, 0).map(|_| AppGlobalGetEx)?
            }
            "app_local_put" => {
                expect("app_local_put", "no immediates", operands, 0).map(|_| AppLocalPut)?
            }
            "app_global_put" => {
                expect("app_global_put", "no immediates", operands, 0).map(|_| AppGlobalPut)?
            }
            "app_local_del" => {
                expect("app_local_del", "no immediates", operands, 0).map(|_| AppLocalDel)?
            }
            "app_global_del" => {
                expect("app_global_del", "no immediates", operands, 0).map(|_| AppGlobalDel)?
            }
            "asset_holding_get" => {
                expect("asset_holding_get", "one field", operands, 1)?;
                AssetHoldingGet(AssetHoldingField::from_str(operands[0]).map_err(|_| {
                    OpcodeError::Operand {
                        mnemonic: "asset_holding_get",
                        detail: format!("unknown holding field `{}`", operands[0]),
                    }
                })?)
            }
            "asset_params_get" => {
                expect("asset_params_get", "one field", operands, 1)?;
                AssetParamsGet(AssetParamsField::from_str(operands[0]).map_err(|_| {
                    OpcodeError::Operand {
                        mnemonic: "asset_params_get",
                        detail: format!("unknown params field `{}`", operands[0]),
                    }
                })?)
            }

            "itxn_begin" => expect("itxn_begin", "no immediates", operands, 0).map(|_| ItxnBegin)?,
            "itxn_field" => {
                expect("itxn_field", "one field", operands, 1)?;
                ItxnField(txn_field("itxn_field", operands[0])?)
            }
            "itxn_next" => expect("itxn_next", "no immediates", operands, 0).map(|_| ItxnNext)?,
            "itxn_submit" => {
                expect("itxn_submit", "no immediates", operands, 0).map(|_| ItxnSubmit)?
            }
            "itxn" => {
                expect("itxn", "one field", operands, 1)?;
                Itxn(txn_field("itxn", operands[0])?)
            }
            "itxna" => {
                expect("itxna", "a field and an index", operands, 2)?;
                Itxna(txn_field("itxna", operands[0])?, slot("itxna", operands[1])?)
            }
            "log" => expect("log", "no immediates", operands, 0).map(|_| Log)?,

            _ => return Err(OpcodeError::UnknownMnemonic(mnemonic.to_string())),
        };
        Ok(op)
    }

    /// AVM version that introduced the opcode itself. Immediates may raise
    /// the requirement further, see [`Opcode::min_version`].
    pub const fn introduced_in(&self) -> u8 {
        use Opcode::*;
        match self {
            Error | Sha256 | Keccak256 | Sha512_256 | Ed25519Verify | Add | Sub | Mul | Div
            | Mod | Lt | Gt | Le | Ge | LogicAnd | LogicOr | Eq | Neq | LogicNot | Len | Itob
            | Btoi | BitOr | BitAnd | BitXor | BitNot | Mulw | Intcblock(_) | Intc(_) | Intc0
            | Intc1 | Intc2 | Intc3 | Bytecblock(_) | Bytec(_) | Bytec0 | Bytec1 | Bytec2
            | Bytec3 | Int(_) | Byte(_) | Arg(_) | Arg0 | Arg1 | Arg2 | Arg3 | Txn(_)
            | Gtxn(_, _) | Global(_) | Load(_) | Store(_) | Bnz(_) | Pop | Dup => 1,
            Addw | Txna(_, _) | Gtxna(_, _, _) | Bz(_) | B(_) | Return | Dup2 | Concat
            | Substring(_, _) | Substring3 | Balance | AppOptedIn | AppLocalGet | AppLocalGetEx
            | AppGlobalGet | AppGlobalGetEx | AppLocalPut | AppGlobalPut | AppLocalDel
            | AppGlobalDel | AssetHoldingGet(_) | AssetParamsGet(_) => 2,
            Assert | Dig(_) | Swap | Select | GetBit | SetBit | GetByte | SetByte | MinBalance
            | PushInt(_) | PushBytes(_) | Gtxns(_) | Gtxnsa(_, _) => 3,
            Callsub(_) | Retsub | Shl | Shr | Sqrt | Bitlen | Exp | Expw | Divmodw | Cover(_)
            | Uncover(_) | Loads | Stores => 4,
            Txnas(_) | Args | ItxnBegin | ItxnField(_) | ItxnSubmit | Itxn(_) | Itxna(_, _)
            | Log => 5,
            ItxnNext => 6,
            Switch(_) | Match(_) => 8,
        }
    }

    /// Minimum program version required by the opcode together with any
    /// named-field immediates it carries.
    pub fn min_version(&self) -> u8 {
        use Opcode::*;
        let field_version = match self {
            Txn(f) | Txnas(f) | Gtxn(_, f) | Gtxna(_, f, _) | Txna(f, _) | Gtxns(f)
            | Gtxnsa(f, _) | ItxnField(f) | Itxn(f) | Itxna(f, _) => f.introduced_in(),
            Global(f) => f.introduced_in(),
            _ => 0,
        };
        self.introduced_in().max(field_version)
    }

    /// Number of stack values the opcode consumes.
    pub fn pops(&self) -> usize {
        use Opcode::*;
        match self {
            Error | Retsub | B(_) | Callsub(_) | Intcblock(_) | Intc(_) | Intc0 | Intc1 | Intc2
            | Intc3 | Bytecblock(_) | Bytec(_) | Bytec0 | Bytec1 | Bytec2 | Bytec3 | Int(_)
            | Byte(_) | PushInt(_) | PushBytes(_) | Arg(_) | Arg0 | Arg1 | Arg2 | Arg3
            | Txn(_) | Txna(_, _) | Gtxn(_, _) | Gtxna(_, _, _) | Global(_) | Load(_)
            | ItxnBegin | ItxnNext | ItxnSubmit | Itxn(_) | Itxna(_, _) => 0,
            Return | Assert | Bnz(_) | Bz(_) | Switch(_) | Pop | Store(_) | Sha256 | Keccak256
            | Sha512_256 | Len | Itob | Btoi | BitNot | LogicNot | Sqrt | Bitlen | Dup
            | Txnas(_) | Gtxns(_) | Gtxnsa(_, _) | Args | Loads | Balance | MinBalance
            | AppGlobalGet | AppGlobalDel | AssetParamsGet(_) | ItxnField(_) | Log
            | Substring(_, _) => 1,
            Add | Sub | Mul | Div | Mod | Lt | Gt | Le | Ge | LogicAnd | LogicOr | Eq | Neq
            | BitOr | BitAnd | BitXor | Mulw | Addw | Shl | Shr | Exp | Expw | Concat
            | GetBit | GetByte | Dup2 | Swap | Stores | AppOptedIn | AppLocalGet
            | AppGlobalGetEx | AppLocalDel | AppGlobalPut | AssetHoldingGet(_) => 2,
            Ed25519Verify | Substring3 | SetBit | SetByte | Select | AppLocalGetEx
            | AppLocalPut => 3,
            Divmodw => 4,
            Dig(n) => *n as usize + 1,
            Cover(n) | Uncover(n) => *n as usize + 1,
            Match(targets) => targets.len() + 1,
        }
    }

    /// Number of stack values the opcode produces.
    pub fn pushes(&self) -> usize {
        use Opcode::*;
        match self {
            Error | Return | Assert | B(_) | Bnz(_) | Bz(_) | Callsub(_) | Retsub | Switch(_)
            | Match(_) | Intcblock(_) | Bytecblock(_) | Pop | Store(_) | Stores | AppLocalPut
            | AppGlobalPut | AppLocalDel | AppGlobalDel | ItxnBegin | ItxnField(_) | ItxnNext
            | ItxnSubmit | Log => 0,
            Sha256 | Keccak256 | Sha512_256 | Ed25519Verify | Add | Sub | Mul | Div | Mod | Lt
            | Gt | Le | Ge | LogicAnd | LogicOr | Eq | Neq | LogicNot | Len | Itob | Btoi
            | BitOr | BitAnd | BitXor | BitNot | Shl | Shr | Sqrt | Bitlen | Exp | Concat
            | Substring(_, _) | Substring3 | GetBit | GetByte | SetBit | SetByte | Intc(_)
            | Intc0 | Intc1 | Intc2 | Intc3 | Bytec(_) | Bytec0 | Bytec1 | Bytec2 | Bytec3
            | Int(_) | Byte(_) | PushInt(_) | PushBytes(_) | Arg(_) | Arg0 | Arg1 | Arg2
            | Arg3 | Args | Txn(_) | Txna(_, _) | Txnas(_) | Gtxn(_, _) | Gtxna(_, _, _)
            | Gtxns(_) | Gtxnsa(_, _) | Global(_) | Load(_) | Loads | Select | Balance
            | MinBalance | AppOptedIn | AppLocalGet | AppGlobalGet | Itxn(_) | Itxna(_, _) => 1,
            Mulw | Addw | Expw | Dup2 | Swap | AppLocalGetEx | AppGlobalGetEx
            | AssetHoldingGet(_) | AssetParamsGet(_) => 2,
            Divmodw => 4,
            Dup => 2,
            Dig(n) => *n as usize + 2,
            Cover(n) | Uncover(n) => *n as usize + 1,
        }
    }

    /// True for opcodes after which control never falls through.
    pub const fn is_terminator(&self) -> bool {
        matches!(
            self,
            Opcode::Error | Opcode::Return | Opcode::Retsub | Opcode::B(_)
        )
    }

    /// True for opcodes that end a basic block by transferring control.
    pub const fn is_branch(&self) -> bool {
        matches!(
            self,
            Opcode::B(_)
                | Opcode::Bnz(_)
                | Opcode::Bz(_)
                | Opcode::Callsub(_)
                | Opcode::Retsub
                | Opcode::Switch(_)
                | Opcode::Match(_)
        )
    }

    /// True for `callsub`.
    pub const fn is_callsub(&self) -> bool {
        matches!(self, Opcode::Callsub(_))
    }

    /// True for `retsub`.
    pub const fn is_retsub(&self) -> bool {
        matches!(self, Opcode::Retsub)
    }

    /// True for `err`.
    pub const fn is_err(&self) -> bool {
        matches!(self, Opcode::Error)
    }

    /// True for opcodes only available to applications.
    pub const fn is_stateful_only(&self) -> bool {
        use Opcode::*;
        matches!(
            self,
            Balance
                | MinBalance
                | AppOptedIn
                | AppLocalGet
                | AppLocalGetEx
                | AppGlobalGet
                | AppGlobalGetEx
                | AppLocalPut
                | AppGlobalPut
                | AppLocalDel
                | AppGlobalDel
                | AssetHoldingGet(_)
                | AssetParamsGet(_)
                | ItxnBegin
                | ItxnField(_)
                | ItxnNext
                | ItxnSubmit
                | Itxn(_)
                | Itxna(_, _)
                | Log
        )
    }

    /// True for opcodes only available to logic signatures.
    pub const fn is_stateless_only(&self) -> bool {
        matches!(
            self,
            Opcode::Arg(_) | Opcode::Arg0 | Opcode::Arg1 | Opcode::Arg2 | Opcode::Arg3 | Opcode::Args
        )
    }

    /// Labels referenced by the opcode, in operand order.
    pub fn label_refs(&self) -> Vec<&str> {
        use Opcode::*;
        match self {
            B(l) | Bnz(l) | Bz(l) | Callsub(l) => vec![l.as_str()],
            Switch(ls) | Match(ls) => ls.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Canonical mnemonic of the opcode.
    pub const fn mnemonic(&self) -> &'static str {
        use Opcode::*;
        match self {
            Error => "err",
            Return => "return",
            Assert => "assert",
            B(_) => "b",
            Bnz(_) => "bnz",
            Bz(_) => "bz",
            Callsub(_) => "callsub",
            Retsub => "retsub",
            Switch(_) => "switch",
            Match(_) => "match",
            Sha256 => "sha256",
            Keccak256 => "keccak256",
            Sha512_256 => "sha512_256",
            Ed25519Verify => "ed25519verify",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Lt => "<",
            Gt => ">",
            Le => "<=",
            Ge => ">=",
            LogicAnd => "&&",
            LogicOr => "||",
            Eq => "==",
            Neq => "!=",
            LogicNot => "!",
            BitOr => "|",
            BitAnd => "&",
            BitXor => "^",
            BitNot => "~",
            Mulw => "mulw",
            Addw => "addw",
            Divmodw => "divmodw",
            Shl => "shl",
            Shr => "shr",
            Sqrt => "sqrt",
            Bitlen => "bitlen",
            Exp => "exp",
            Expw => "expw",
            Len => "len",
            Itob => "itob",
            Btoi => "btoi",
            Concat => "concat",
            Substring(_, _) => "substring",
            Substring3 => "substring3",
            GetBit => "getbit",
            SetBit => "setbit",
            GetByte => "getbyte",
            SetByte => "setbyte",
            Intcblock(_) => "intcblock",
            Intc(_) => "intc",
            Intc0 => "intc_0",
            Intc1 => "intc_1",
            Intc2 => "intc_2",
            Intc3 => "intc_3",
            Bytecblock(_) => "bytecblock",
            Bytec(_) => "bytec",
            Bytec0 => "bytec_0",
            Bytec1 => "bytec_1",
            Bytec2 => "bytec_2",
            Bytec3 => "bytec_3",
            Int(_) => "int",
            Byte(_) => "byte",
            PushInt(_) => "pushint",
            PushBytes(_) => "pushbytes",
            Arg(_) => "arg",
            Arg0 => "arg_0",
            Arg1 => "arg_1",
            Arg2 => "arg_2",
            Arg3 => "arg_3",
            Args => "args",
            Txn(_) => "txn",
            Txna(_, _) => "txna",
            Txnas(_) => "txnas",
            Gtxn(_, _) => "gtxn",
            Gtxna(_, _, _) => "gtxna",
            Gtxns(_) => "gtxns",
            Gtxnsa(_, _) => "gtxnsa",
            Global(_) => "global",
            Load(_) => "load",
            Store(_) => "store",
            Loads => "loads",
            Stores => "stores",
            Pop => "pop",
            Dup => "dup",
            Dup2 => "dup2",
            Dig(_) => "dig",
            Swap => "swap",
            Select => "select",
            Cover(_) => "cover",
            Uncover(_) => "uncover",
            Balance => "balance",
            MinBalance => "min_balance",
            AppOptedIn => "app_opted_in",
            AppLocalGet => "app_local_get",
            AppLocalGetEx => "app_local_get_ex",
            AppGlobalGet => "app_global_get",
            AppGlobalGetEx => "app_global_get_ex",
            AppLocalPut => "app_local_put",
            AppGlobalPut => "app_global_put",
            AppLocalDel => "app_local_del",
            AppGlobalDel => "app_global_del",
            AssetHoldingGet(_) => "asset_holding_get",
            AssetParamsGet(_) => "asset_params_get",
            ItxnBegin => "itxn_begin",
            ItxnField(_) => "itxn_field",
            ItxnNext => "itxn_next",
            ItxnSubmit => "itxn_submit",
            Itxn(_) => "itxn",
            Itxna(_, _) => "itxna",
            Log => "log",
        }
    }
}

impl fmt::Display for Opcode {
    /// Canonical textual form: the mnemonic followed by its immediates,
    /// byte strings rendered in base16.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Opcode::*;
        write!(f, "{}", self.mnemonic())?;
        match self {
            B(l) | Bnz(l) | Bz(l) | Callsub(l) => write!(f, " {l}"),
            Switch(ls) | Match(ls) => {
                for l in ls {
                    write!(f, " {l}")?;
                }
                Ok(())
            }
            Substring(s, e) => write!(f, " {s} {e}"),
            Intcblock(cs) => {
                for c in cs {
                    write!(f, " {c}")?;
                }
                Ok(())
            }
            Bytecblock(cs) => {
                for c in cs {
                    write!(f, " 0x{}", hex::encode(c))?;
                }
                Ok(())
            }
            Intc(i) | Bytec(i) | Arg(i) | Load(i) | Store(i) | Dig(i) | Cover(i) | Uncover(i) => {
                write!(f, " {i}")
            }
            Int(n) | PushInt(n) => write!(f, " {n}"),
            Byte(b) | PushBytes(b) => write!(f, " 0x{}", hex::encode(b)),
            Txn(field) | Txnas(field) | Gtxns(field) | ItxnField(field) | Itxn(field) => {
                write!(f, " {field}")
            }
            Txna(field, i) | Gtxnsa(field, i) | Itxna(field, i) => write!(f, " {field} {i}"),
            Gtxn(g, field) => write!(f, " {g} {field}"),
            Gtxna(g, field, i) => write!(f, " {g} {field} {i}"),
            Global(field) => write!(f, " {field}"),
            AssetHoldingGet(field) => write!(f, " {field}"),
            AssetParamsGet(field) => write!(f, " {field}"),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::TxnField;
    use rstest::rstest;

    #[rstest]
    #[case("int", &["pay"], Opcode::Int(1))]
    #[case("txn", &["Sender"], Opcode::Txn(TxnField::Sender))]
    #[case("gtxn", &["1", "Amount"], Opcode::Gtxn(1, TxnField::Amount))]
    #[case("bnz", &["done"], Opcode::Bnz("done".to_string()))]
    #[case("byte", &["0x68690a"], Opcode::Byte(vec![0x68, 0x69, 0x0a]))]
    #[case("byte", &["base64", "aGk="], Opcode::Byte(b"hi".to_vec()))]
    #[case("switch", &["a", "b"], Opcode::Switch(vec!["a".into(), "b".into()]))]
    fn parses_representative_forms(
        #[case] mnemonic: &str,
        #[case] operands: &[&str],
        #[case] expected: Opcode,
    ) {
        assert_eq!(Opcode::parse(mnemonic, operands).unwrap(), expected);
    }

    #[test]
    fn unknown_mnemonic_is_reported() {
        assert_eq!(
            Opcode::parse("frobnicate", &[]),
            Err(OpcodeError::UnknownMnemonic("frobnicate".to_string()))
        );
    }

    #[test]
    fn operand_arity_is_checked() {
        assert!(matches!(
            Opcode::parse("gtxn", &["1"]),
            Err(OpcodeError::OperandCount { .. })
        ));
        assert!(matches!(
            Opcode::parse("txn", &["NotAField"]),
            Err(OpcodeError::Operand { .. })
        ));
    }

    #[test]
    fn field_immediates_raise_min_version() {
        let op = Opcode::parse("txn", &["OnCompletion"]).unwrap();
        assert_eq!(op.introduced_in(), 1);
        assert_eq!(op.min_version(), 2);
    }

    #[rstest]
    #[case("callsub", &["sub"], 4)]
    #[case("assert", &[], 3)]
    #[case("switch", &["a"], 8)]
    #[case("arg", &["0"], 1)]
    fn version_stamps(#[case] mnemonic: &str, #[case] operands: &[&str], #[case] version: u8) {
        assert_eq!(Opcode::parse(mnemonic, operands).unwrap().min_version(), version);
    }

    #[test]
    fn classification_flags() {
        let retsub = Opcode::Retsub;
        assert!(retsub.is_terminator() && retsub.is_branch() && retsub.is_retsub());
        let bnz = Opcode::Bnz("l".into());
        assert!(bnz.is_branch() && !bnz.is_terminator());
        assert!(Opcode::AppGlobalGet.is_stateful_only());
        assert!(Opcode::Arg0.is_stateless_only());
    }

    #[test]
    fn canonical_display_round_trips() {
        for (mnemonic, operands) in [
            ("txn", vec!["Sender"]),
            ("gtxna", vec!["0", "ApplicationArgs", "2"]),
            ("int", vec!["42"]),
            ("byte", vec!["0xdead"]),
            ("switch", vec!["a", "b"]),
        ] {
            let op = Opcode::parse(mnemonic, &operands).unwrap();
            let printed = op.to_string();
            let mut tokens = printed.split_whitespace();
            let head = tokens.next().unwrap();
            let rest: Vec<&str> = tokens.collect();
            assert_eq!(Opcode::parse(head, &rest).unwrap(), op);
        }
    }
}
