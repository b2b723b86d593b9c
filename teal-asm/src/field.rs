//! Named-field constants of the transaction and global namespaces.

/// Transaction fields addressable through `txn`, `gtxn` and their indexed
/// variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(strum::Display, strum::EnumString, strum::EnumIter)]
#[allow(missing_docs)]
pub enum TxnField {
    Sender,
    Fee,
    FirstValid,
    FirstValidTime,
    LastValid,
    Note,
    Lease,
    Receiver,
    Amount,
    CloseRemainderTo,
    VotePK,
    SelectionPK,
    VoteFirst,
    VoteLast,
    VoteKeyDilution,
    Type,
    TypeEnum,
    XferAsset,
    AssetAmount,
    AssetSender,
    AssetReceiver,
    AssetCloseTo,
    GroupIndex,
    TxID,
    ApplicationID,
    OnCompletion,
    ApplicationArgs,
    NumAppArgs,
    Accounts,
    NumAccounts,
    ApprovalProgram,
    ClearStateProgram,
    RekeyTo,
    ConfigAsset,
    ConfigAssetTotal,
    ConfigAssetDecimals,
    ConfigAssetDefaultFrozen,
    ConfigAssetUnitName,
    ConfigAssetName,
    ConfigAssetURL,
    ConfigAssetMetadataHash,
    ConfigAssetManager,
    ConfigAssetReserve,
    ConfigAssetFreeze,
    ConfigAssetClawback,
    FreezeAsset,
    FreezeAssetAccount,
    FreezeAssetFrozen,
    Assets,
    NumAssets,
    Applications,
    NumApplications,
    GlobalNumUint,
    GlobalNumByteSlice,
    LocalNumUint,
    LocalNumByteSlice,
    ExtraProgramPages,
    Nonparticipation,
    Logs,
    NumLogs,
    CreatedAssetID,
    CreatedApplicationID,
    LastLog,
    StateProofPK,
}

impl TxnField {
    /// AVM version that introduced the field.
    pub const fn introduced_in(&self) -> u8 {
        use TxnField::*;
        match self {
            Sender | Fee | FirstValid | FirstValidTime | LastValid | Note | Lease | Receiver
            | Amount | CloseRemainderTo | VotePK | SelectionPK | VoteFirst | VoteLast
            | VoteKeyDilution | Type | TypeEnum | XferAsset | AssetAmount | AssetSender
            | AssetReceiver | AssetCloseTo | GroupIndex | TxID => 1,
            ApplicationID | OnCompletion | ApplicationArgs | NumAppArgs | Accounts
            | NumAccounts | ApprovalProgram | ClearStateProgram | RekeyTo | ConfigAsset
            | ConfigAssetTotal | ConfigAssetDecimals | ConfigAssetDefaultFrozen
            | ConfigAssetUnitName | ConfigAssetName | ConfigAssetURL | ConfigAssetMetadataHash
            | ConfigAssetManager | ConfigAssetReserve | ConfigAssetFreeze
            | ConfigAssetClawback | FreezeAsset | FreezeAssetAccount | FreezeAssetFrozen => 2,
            Assets | NumAssets | Applications | NumApplications | GlobalNumUint
            | GlobalNumByteSlice | LocalNumUint | LocalNumByteSlice => 3,
            ExtraProgramPages => 4,
            Nonparticipation | Logs | NumLogs | CreatedAssetID | CreatedApplicationID => 5,
            LastLog | StateProofPK => 6,
        }
    }

    /// Whether the field is an array and requires an index immediate
    /// (`txna` family) or a stack index (`txnas` family).
    pub const fn is_array(&self) -> bool {
        use TxnField::*;
        matches!(
            self,
            ApplicationArgs | Accounts | Assets | Applications | Logs
        )
    }
}

/// Fields of the `global` namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(strum::Display, strum::EnumString, strum::EnumIter)]
#[allow(missing_docs)]
pub enum GlobalField {
    MinTxnFee,
    MinBalance,
    MaxTxnLife,
    ZeroAddress,
    GroupSize,
    LogicSigVersion,
    Round,
    LatestTimestamp,
    CurrentApplicationID,
    CreatorAddress,
    CurrentApplicationAddress,
    GroupID,
    OpcodeBudget,
    CallerApplicationID,
    CallerApplicationAddress,
}

impl GlobalField {
    /// AVM version that introduced the field.
    pub const fn introduced_in(&self) -> u8 {
        use GlobalField::*;
        match self {
            MinTxnFee | MinBalance | MaxTxnLife | ZeroAddress | GroupSize => 1,
            LogicSigVersion | Round | LatestTimestamp | CurrentApplicationID => 2,
            CreatorAddress => 3,
            CurrentApplicationAddress | GroupID => 5,
            OpcodeBudget | CallerApplicationID | CallerApplicationAddress => 6,
        }
    }
}

/// On-completion actions of an application call, as named integer constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(strum::Display, strum::EnumString, strum::EnumIter)]
#[repr(u64)]
#[allow(missing_docs)]
pub enum OnComplete {
    NoOp = 0,
    OptIn = 1,
    CloseOut = 2,
    ClearState = 3,
    UpdateApplication = 4,
    DeleteApplication = 5,
}

impl OnComplete {
    /// Numeric value of the constant.
    pub const fn value(&self) -> u64 {
        *self as u64
    }
}

/// Transaction type constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(strum::Display, strum::EnumString, strum::EnumIter)]
#[repr(u64)]
#[allow(missing_docs)]
pub enum TxnType {
    #[strum(serialize = "unknown")]
    Unknown = 0,
    #[strum(serialize = "pay")]
    Payment = 1,
    #[strum(serialize = "keyreg")]
    KeyRegistration = 2,
    #[strum(serialize = "acfg")]
    AssetConfig = 3,
    #[strum(serialize = "axfer")]
    AssetTransfer = 4,
    #[strum(serialize = "afrz")]
    AssetFreeze = 5,
    #[strum(serialize = "appl")]
    ApplicationCall = 6,
}

impl TxnType {
    /// Numeric value of the constant.
    pub const fn value(&self) -> u64 {
        *self as u64
    }
}

/// Immediate field of `asset_holding_get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::Display, strum::EnumString)]
#[allow(missing_docs)]
pub enum AssetHoldingField {
    AssetBalance,
    AssetFrozen,
}

/// Immediate field of `asset_params_get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::Display, strum::EnumString)]
#[allow(missing_docs)]
pub enum AssetParamsField {
    AssetTotal,
    AssetDecimals,
    AssetDefaultFrozen,
    AssetUnitName,
    AssetName,
    AssetURL,
    AssetMetadataHash,
    AssetManager,
    AssetReserve,
    AssetFreeze,
    AssetClawback,
    AssetCreator,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn txn_field_names_round_trip() {
        for field in TxnField::iter() {
            let name = field.to_string();
            assert_eq!(TxnField::from_str(&name).unwrap(), field);
        }
    }

    #[test]
    fn on_complete_values_are_contiguous() {
        let values: Vec<u64> = OnComplete::iter().map(|oc| oc.value()).collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn txn_type_short_names() {
        assert_eq!(TxnType::from_str("pay").unwrap(), TxnType::Payment);
        assert_eq!(TxnType::from_str("appl").unwrap(), TxnType::ApplicationCall);
        assert_eq!(TxnType::ApplicationCall.to_string(), "appl");
        assert!(TxnType::from_str("Payment").is_err());
    }

    #[test]
    fn version_stamps_are_ordered_families() {
        assert_eq!(TxnField::Sender.introduced_in(), 1);
        assert_eq!(TxnField::OnCompletion.introduced_in(), 2);
        assert_eq!(TxnField::StateProofPK.introduced_in(), 6);
        assert_eq!(GlobalField::GroupSize.introduced_in(), 1);
        assert_eq!(GlobalField::CallerApplicationID.introduced_in(), 6);
    }
}
