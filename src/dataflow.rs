//! Dataflow facts: the per-field value lattice and the dense field map
//! attached to every basic block.

use std::collections::BTreeSet;

use strum::EnumCount as _;
use teal_asm::{GlobalField, TxnField};

pub mod engine;
pub mod transfer;

/// Cap on enumerated value sets before they widen to ⊤.
pub const WIDENING_CAP: usize = 16;

/// Transaction-context fields tracked by the engine. Any other field is
/// reported as ⊤ and never materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(strum::Display, strum::EnumCount, strum::EnumIter)]
#[allow(missing_docs)]
pub enum TrackedField {
    GroupSize,
    GroupIndex,
    TypeEnum,
    Sender,
    Receiver,
    CloseRemainderTo,
    AssetCloseTo,
    RekeyTo,
    ApplicationId,
    OnCompletion,
    Fee,
}

impl TrackedField {
    /// The tracked field behind a `txn` field read, if it is tracked.
    pub const fn from_txn_field(field: TxnField) -> Option<Self> {
        match field {
            TxnField::Sender => Some(Self::Sender),
            TxnField::Receiver => Some(Self::Receiver),
            TxnField::CloseRemainderTo => Some(Self::CloseRemainderTo),
            TxnField::AssetCloseTo => Some(Self::AssetCloseTo),
            TxnField::RekeyTo => Some(Self::RekeyTo),
            TxnField::ApplicationID => Some(Self::ApplicationId),
            TxnField::OnCompletion => Some(Self::OnCompletion),
            TxnField::Fee => Some(Self::Fee),
            TxnField::GroupIndex => Some(Self::GroupIndex),
            TxnField::TypeEnum => Some(Self::TypeEnum),
            _ => None,
        }
    }

    /// The tracked field behind a `global` field read, if it is tracked.
    pub const fn from_global_field(field: GlobalField) -> Option<Self> {
        match field {
            GlobalField::GroupSize => Some(Self::GroupSize),
            _ => None,
        }
    }

    /// Finite value domain of the field, when the protocol bounds it.
    /// Used to enumerate ordered comparisons and complements.
    pub const fn domain(&self) -> Option<(u64, u64)> {
        match self {
            Self::GroupSize => Some((1, 16)),
            Self::GroupIndex => Some((0, 15)),
            Self::OnCompletion => Some((0, 5)),
            Self::TypeEnum => Some((0, 6)),
            _ => None,
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// A concrete field value: an integer or a byte string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    /// Unsigned 64-bit integer.
    Uint(u64),
    /// Byte string (addresses included).
    Bytes(Vec<u8>),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uint(n) => write!(f, "{n}"),
            Self::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
        }
    }
}

/// Per-field lattice: ⊥ < finite set < ⊤. The empty set is normalized
/// to ⊥ by every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lattice {
    /// Unreachable given the current constraints.
    Bottom,
    /// A finite enumeration of possible values.
    Set(BTreeSet<Value>),
    /// Any value possible.
    Top,
}

impl Lattice {
    /// A single known value.
    pub fn singleton(value: Value) -> Self {
        Self::Set(BTreeSet::from([value]))
    }

    /// A finite enumeration, normalized and capped.
    pub fn from_set(values: BTreeSet<Value>, cap: usize) -> Self {
        if values.is_empty() {
            Self::Bottom
        } else if values.len() > cap {
            tracing::debug!(size = values.len(), "value set exceeds cap, widening to top");
            Self::Top
        } else {
            Self::Set(values)
        }
    }

    /// Join (least upper bound): set union with the widening cap.
    pub fn join(&self, other: &Self, cap: usize) -> Self {
        match (self, other) {
            (Self::Bottom, x) | (x, Self::Bottom) => x.clone(),
            (Self::Top, _) | (_, Self::Top) => Self::Top,
            (Self::Set(a), Self::Set(b)) => {
                Self::from_set(a.union(b).cloned().collect(), cap)
            }
        }
    }

    /// Meet with a constraint set: keeps only the allowed values.
    pub fn refine(&self, allowed: &BTreeSet<Value>) -> Self {
        match self {
            Self::Bottom => Self::Bottom,
            Self::Top => Self::from_set(allowed.clone(), usize::MAX),
            Self::Set(current) => {
                Self::from_set(current.intersection(allowed).cloned().collect(), usize::MAX)
            }
        }
    }

    /// Remove the excluded values. ⊤ can only be narrowed when the field
    /// has a finite domain to enumerate.
    pub fn exclude(&self, excluded: &BTreeSet<Value>, field: TrackedField, cap: usize) -> Self {
        match self {
            Self::Bottom => Self::Bottom,
            Self::Set(current) => {
                Self::from_set(current.difference(excluded).cloned().collect(), usize::MAX)
            }
            Self::Top => match field.domain() {
                Some((lo, hi)) if (hi - lo) as usize + 1 <= cap => {
                    let complement: BTreeSet<Value> = (lo..=hi)
                        .map(Value::Uint)
                        .filter(|v| !excluded.contains(v))
                        .collect();
                    Self::from_set(complement, cap)
                }
                _ => Self::Top,
            },
        }
    }

    /// Whether the value could still occur.
    pub fn may_contain(&self, value: &Value) -> bool {
        match self {
            Self::Bottom => false,
            Self::Top => true,
            Self::Set(values) => values.contains(value),
        }
    }

    /// Whether the lattice is ⊤.
    pub const fn is_top(&self) -> bool {
        matches!(self, Self::Top)
    }

    /// Whether the lattice is ⊥.
    pub const fn is_bottom(&self) -> bool {
        matches!(self, Self::Bottom)
    }

    /// Whether `self` is below or equal to `other` in the lattice order.
    pub fn le(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bottom, _) => true,
            (_, Self::Top) => true,
            (Self::Set(a), Self::Set(b)) => a.is_subset(b),
            _ => false,
        }
    }
}

impl std::fmt::Display for Lattice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Top => write!(f, "any"),
            Self::Bottom => write!(f, "none"),
            Self::Set(values) => {
                write!(f, "{{")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Dense map from every tracked field to its lattice value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldState {
    values: [Lattice; TrackedField::COUNT],
}

impl FieldState {
    /// Everything unconstrained.
    pub fn top() -> Self {
        Self {
            values: std::array::from_fn(|_| Lattice::Top),
        }
    }

    /// Unreachable state.
    pub fn bottom() -> Self {
        Self {
            values: std::array::from_fn(|_| Lattice::Bottom),
        }
    }

    /// Lattice value of one field.
    pub fn get(&self, field: TrackedField) -> &Lattice {
        &self.values[field.index()]
    }

    /// Overwrite one field.
    pub fn set(&mut self, field: TrackedField, value: Lattice) {
        self.values[field.index()] = value;
    }

    /// Field-wise join; reports whether `self` changed.
    pub fn join_with(&mut self, other: &Self, cap: usize) -> bool {
        let mut changed = false;
        for index in 0..TrackedField::COUNT {
            let joined = self.values[index].join(&other.values[index], cap);
            if joined != self.values[index] {
                self.values[index] = joined;
                changed = true;
            }
        }
        changed
    }

    /// A state is unreachable as soon as one field has no possible value.
    pub fn is_unreachable(&self) -> bool {
        self.values.iter().any(Lattice::is_bottom)
    }
}

impl Default for FieldState {
    fn default() -> Self {
        Self::bottom()
    }
}

/// Dataflow slot of a basic block: the joined state on entry and the
/// state after the block's transfer function. Both start unreachable and
/// are written by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockContext {
    /// State on entry to the block.
    pub input: FieldState,
    /// State after the block's instructions.
    pub output: FieldState,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uints(values: &[u64]) -> BTreeSet<Value> {
        values.iter().copied().map(Value::Uint).collect()
    }

    #[test]
    fn join_unions_and_caps() {
        let a = Lattice::from_set(uints(&[1, 2]), WIDENING_CAP);
        let b = Lattice::from_set(uints(&[2, 3]), WIDENING_CAP);
        assert_eq!(a.join(&b, WIDENING_CAP), Lattice::from_set(uints(&[1, 2, 3]), WIDENING_CAP));

        let big_a = Lattice::from_set((0..10).map(Value::Uint).collect(), WIDENING_CAP);
        let big_b = Lattice::from_set((10..20).map(Value::Uint).collect(), WIDENING_CAP);
        assert!(big_a.join(&big_b, WIDENING_CAP).is_top());
    }

    #[test]
    fn bottom_is_the_join_identity() {
        let set = Lattice::singleton(Value::Uint(7));
        assert_eq!(Lattice::Bottom.join(&set, WIDENING_CAP), set);
    }

    #[test]
    fn refine_meets_and_normalizes_empty_to_bottom() {
        let set = Lattice::from_set(uints(&[1, 2]), WIDENING_CAP);
        assert_eq!(set.refine(&uints(&[2, 3])), Lattice::singleton(Value::Uint(2)));
        assert!(set.refine(&uints(&[9])).is_bottom());
        assert_eq!(Lattice::Top.refine(&uints(&[4])), Lattice::singleton(Value::Uint(4)));
    }

    #[test]
    fn exclude_enumerates_finite_domains() {
        let narrowed = Lattice::Top.exclude(&uints(&[5]), TrackedField::OnCompletion, WIDENING_CAP);
        assert_eq!(narrowed, Lattice::from_set(uints(&[0, 1, 2, 3, 4]), WIDENING_CAP));
        // No finite domain: ⊤ stays ⊤.
        assert!(Lattice::Top
            .exclude(&uints(&[5]), TrackedField::Fee, WIDENING_CAP)
            .is_top());
    }

    #[test]
    fn join_is_monotone_in_both_arguments() {
        let small = Lattice::singleton(Value::Uint(1));
        let wider = Lattice::from_set(uints(&[1, 2]), WIDENING_CAP);
        let other = Lattice::singleton(Value::Uint(3));
        assert!(small.join(&other, WIDENING_CAP).le(&wider.join(&other, WIDENING_CAP)));
    }

    #[test]
    fn field_state_join_reports_change() {
        let mut state = FieldState::bottom();
        let top = FieldState::top();
        assert!(state.join_with(&top, WIDENING_CAP));
        assert!(!state.join_with(&top, WIDENING_CAP));
        assert!(!state.is_unreachable());
    }
}
