//! Group-configuration loader: named group templates that constrain the
//! dataflow entry state of the contracts they mention.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::dataflow::{FieldState, Lattice, TrackedField, Value};
use crate::error::ConfigError;

/// Root of the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupConfig {
    /// Declared contracts.
    #[serde(default)]
    pub contracts: Vec<ContractDecl>,
    /// Named group templates.
    #[serde(default)]
    pub groups: Vec<GroupTemplate>,
}

/// A contract named by the configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractDecl {
    /// Name groups refer to.
    pub name: String,
    /// Source file of the contract.
    pub path: PathBuf,
    /// Kind of artifact the file holds.
    pub artifact: ArtifactKind,
    /// Language version the contract is compiled for.
    pub version: u8,
    /// Dispatch entries: block paths identifying functions.
    #[serde(default)]
    pub dispatch: Vec<DispatchEntry>,
}

/// Kind of program artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ArtifactKind {
    /// Application approval program.
    ApprovalProgram,
    /// Application clear-state program.
    ClearStateProgram,
    /// Logic signature.
    LogicSig,
}

/// Ordered block ids from the entry to a function's first distinctive
/// block.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchEntry {
    /// Function name.
    pub name: String,
    /// Block ids from the entry to the function's dispatch point.
    pub dispatch_path: Vec<usize>,
}

/// One named transaction-group template.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupTemplate {
    /// Template name.
    pub name: String,
    /// Ordered transactions of the group.
    #[serde(default)]
    pub transactions: Vec<TxnDecl>,
}

/// One transaction of a group template.
#[derive(Debug, Clone, Deserialize)]
pub struct TxnDecl {
    /// Identifier inside the template.
    pub txn_id: String,
    /// Transaction type.
    pub txn_type: TxnTypeDecl,
    /// Application call target, when the transaction is an `appl`.
    #[serde(default)]
    pub application: Option<TargetRef>,
    /// Logic signature authorizing the transaction, if any.
    #[serde(default)]
    pub logic_sig: Option<TargetRef>,
    /// Fixed position inside the group, when declared.
    #[serde(default)]
    pub absolute_index: Option<u64>,
}

/// Transaction types usable in a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum TxnTypeDecl {
    Pay,
    Appl,
    Axfer,
    Afrz,
    Keyreg,
    Acfg,
}

impl TxnTypeDecl {
    const fn value(self) -> u64 {
        match self {
            Self::Pay => 1,
            Self::Keyreg => 2,
            Self::Acfg => 3,
            Self::Axfer => 4,
            Self::Afrz => 5,
            Self::Appl => 6,
        }
    }
}

/// Reference to a declared contract (and optionally one of its
/// functions).
#[derive(Debug, Clone, Deserialize)]
pub struct TargetRef {
    /// Contract name.
    pub contract: String,
    /// Function name, resolved through the contract's dispatch entries.
    #[serde(default)]
    pub function: Option<String>,
}

impl TxnDecl {
    fn mentions(&self, contract: &str) -> bool {
        self.application
            .as_ref()
            .is_some_and(|t| t.contract == contract)
            || self
                .logic_sig
                .as_ref()
                .is_some_and(|t| t.contract == contract)
    }
}

impl GroupConfig {
    /// Load and deserialize a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The declared contract a source file belongs to, matched by path or
    /// by file stem against the contract name.
    pub fn contract_for_source(&self, source: &Path) -> Option<&ContractDecl> {
        let stem = source.file_stem().and_then(|s| s.to_str());
        self.contracts.iter().find(|decl| {
            decl.path == source || decl.path.file_name() == source.file_name() || stem == Some(decl.name.as_str())
        })
    }

    /// Entry-state refinement for a contract: `GroupSize` from the sizes
    /// of the templates mentioning it, `GroupIndex` from declared
    /// absolute indices, `TypeEnum` from the declared transaction types.
    /// `None` when no template mentions the contract.
    pub fn entry_state(&self, contract: &str) -> Option<FieldState> {
        let mut sizes: BTreeSet<Value> = BTreeSet::new();
        let mut indices: BTreeSet<Value> = BTreeSet::new();
        let mut types: BTreeSet<Value> = BTreeSet::new();
        let mut mentioned = false;

        for group in &self.groups {
            for txn in group.transactions.iter().filter(|t| t.mentions(contract)) {
                mentioned = true;
                sizes.insert(Value::Uint(group.transactions.len() as u64));
                if let Some(index) = txn.absolute_index {
                    indices.insert(Value::Uint(index));
                }
                types.insert(Value::Uint(txn.txn_type.value()));
            }
        }
        if !mentioned {
            return None;
        }

        let mut state = FieldState::top();
        if !sizes.is_empty() {
            state.set(TrackedField::GroupSize, Lattice::Set(sizes));
        }
        if !indices.is_empty() {
            state.set(TrackedField::GroupIndex, Lattice::Set(indices));
        }
        if !types.is_empty() {
            state.set(TrackedField::TypeEnum, Lattice::Set(types));
        }
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[[contracts]]
name = "vault"
path = "vault.teal"
artifact = "ApprovalProgram"
version = 6

[[contracts.dispatch]]
name = "withdraw"
dispatch_path = [0, 2, 5]

[[groups]]
name = "bootstrap"

[[groups.transactions]]
txn_id = "t0"
txn_type = "pay"
absolute_index = 0

[[groups.transactions]]
txn_id = "t1"
txn_type = "appl"
absolute_index = 1

[groups.transactions.application]
contract = "vault"
function = "withdraw"
"#;

    #[test]
    fn parses_the_full_schema() {
        let config: GroupConfig = toml::from_str(CONFIG).unwrap();
        assert_eq!(config.contracts.len(), 1);
        assert_eq!(config.contracts[0].artifact, ArtifactKind::ApprovalProgram);
        assert_eq!(config.contracts[0].dispatch[0].dispatch_path, vec![0, 2, 5]);
        assert_eq!(config.groups[0].transactions.len(), 2);
        assert_eq!(
            config.groups[0].transactions[1].txn_type,
            TxnTypeDecl::Appl
        );
    }

    #[test]
    fn entry_state_pins_group_fields() {
        let config: GroupConfig = toml::from_str(CONFIG).unwrap();
        let state = config.entry_state("vault").unwrap();
        assert_eq!(
            state.get(TrackedField::GroupSize),
            &Lattice::singleton(Value::Uint(2))
        );
        assert_eq!(
            state.get(TrackedField::GroupIndex),
            &Lattice::singleton(Value::Uint(1))
        );
        assert_eq!(
            state.get(TrackedField::TypeEnum),
            &Lattice::singleton(Value::Uint(6))
        );
        assert!(state.get(TrackedField::Sender).is_top());
    }

    #[test]
    fn unmentioned_contracts_have_no_refinement() {
        let config: GroupConfig = toml::from_str(CONFIG).unwrap();
        assert!(config.entry_state("other").is_none());
    }

    #[test]
    fn source_matching_uses_path_or_stem() {
        let config: GroupConfig = toml::from_str(CONFIG).unwrap();
        assert!(config.contract_for_source(Path::new("vault.teal")).is_some());
        assert!(config
            .contract_for_source(Path::new("contracts/vault.teal"))
            .is_some());
        assert!(config.contract_for_source(Path::new("other.teal")).is_none());
    }
}
