//! Per-block transfer function: a small abstract stack evaluator that
//! recognizes the compare-and-assert idioms and branch conditions over
//! tracked fields.

use std::collections::{BTreeMap, BTreeSet};

use teal_asm::{GlobalField, Instruction, Opcode};

use super::{FieldState, Lattice, TrackedField, Value};

/// Constraint on one field implied by a recognized condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// The field is one of these values.
    In(BTreeSet<Value>),
    /// The field is none of these values.
    NotIn(BTreeSet<Value>),
}

/// Field constraints implied by one truth outcome of a condition.
pub type Refinement = BTreeMap<TrackedField, Constraint>;

/// Apply a refinement to a state in place.
pub fn apply(state: &mut FieldState, refinement: &Refinement, cap: usize) {
    for (&field, constraint) in refinement {
        let updated = match constraint {
            Constraint::In(values) => state.get(field).refine(values),
            Constraint::NotIn(values) => state.get(field).exclude(values, field, cap),
        };
        state.set(field, updated);
    }
}

/// Result of evaluating one block under an input state.
#[derive(Debug, Clone, Default)]
pub struct Transfer {
    /// State after the block's instructions (asserts applied).
    pub output: FieldState,
    /// Refinement along branch-taken edges.
    pub taken: Refinement,
    /// Refinement along the branch-not-taken edge.
    pub not_taken: Refinement,
    /// `switch` only: refinement per branch-taken edge, in target order.
    pub per_target: Vec<Refinement>,
}

#[derive(Debug, Clone)]
enum Sym {
    Const(Value),
    Field(TrackedField),
    Test(Cond),
    Opaque,
}

#[derive(Debug, Clone, Default)]
struct Cond {
    when_true: Refinement,
    when_false: Refinement,
}

impl Cond {
    fn invert(self) -> Self {
        Self {
            when_true: self.when_false,
            when_false: self.when_true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// Mirror the operator for a swapped operand order.
    fn flip(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
            other => other,
        }
    }

    fn negate(self) -> Self {
        match self {
            Self::Eq => Self::Neq,
            Self::Neq => Self::Eq,
            Self::Lt => Self::Ge,
            Self::Le => Self::Gt,
            Self::Gt => Self::Le,
            Self::Ge => Self::Lt,
        }
    }

    fn holds(self, value: u64, constant: u64) -> bool {
        match self {
            Self::Eq => value == constant,
            Self::Neq => value != constant,
            Self::Lt => value < constant,
            Self::Le => value <= constant,
            Self::Gt => value > constant,
            Self::Ge => value >= constant,
        }
    }
}

/// Evaluate a block's instructions under `input`.
pub fn transfer(instructions: &[Instruction], input: &FieldState, cap: usize) -> Transfer {
    let mut state = input.clone();
    let mut stack: Vec<Sym> = Vec::new();
    let mut result = Transfer::default();

    for instruction in instructions {
        let op = instruction.op();
        match op {
            Opcode::Int(n) | Opcode::PushInt(n) => stack.push(Sym::Const(Value::Uint(*n))),
            Opcode::Byte(b) | Opcode::PushBytes(b) => {
                stack.push(Sym::Const(Value::Bytes(b.clone())))
            }
            Opcode::Txn(field) => stack.push(
                TrackedField::from_txn_field(*field).map_or(Sym::Opaque, Sym::Field),
            ),
            Opcode::Global(GlobalField::ZeroAddress) => {
                stack.push(Sym::Const(Value::Bytes(vec![0u8; 32])))
            }
            Opcode::Global(field) => stack.push(
                TrackedField::from_global_field(*field).map_or(Sym::Opaque, Sym::Field),
            ),
            // A sibling access is the current transaction exactly when
            // GroupIndex is already pinned to that literal index.
            Opcode::Gtxn(index, field) => {
                let own = state.get(TrackedField::GroupIndex)
                    == &Lattice::singleton(Value::Uint(*index as u64));
                let sym = if own {
                    TrackedField::from_txn_field(*field).map_or(Sym::Opaque, Sym::Field)
                } else {
                    Sym::Opaque
                };
                stack.push(sym);
            }
            Opcode::Eq => binary_compare(&mut stack, CmpOp::Eq, cap),
            Opcode::Neq => binary_compare(&mut stack, CmpOp::Neq, cap),
            Opcode::Lt => binary_compare(&mut stack, CmpOp::Lt, cap),
            Opcode::Le => binary_compare(&mut stack, CmpOp::Le, cap),
            Opcode::Gt => binary_compare(&mut stack, CmpOp::Gt, cap),
            Opcode::Ge => binary_compare(&mut stack, CmpOp::Ge, cap),
            Opcode::LogicNot => {
                let top = pop(&mut stack);
                stack.push(match top {
                    Sym::Test(cond) => Sym::Test(cond.invert()),
                    _ => Sym::Opaque,
                });
            }
            Opcode::LogicAnd => {
                let rhs = pop(&mut stack);
                let lhs = pop(&mut stack);
                stack.push(match (lhs, rhs) {
                    (Sym::Test(a), Sym::Test(b)) => Sym::Test(Cond {
                        when_true: conjunction(&a.when_true, &b.when_true),
                        when_false: disjunction(&a.when_false, &b.when_false),
                    }),
                    _ => Sym::Opaque,
                });
            }
            Opcode::LogicOr => {
                let rhs = pop(&mut stack);
                let lhs = pop(&mut stack);
                stack.push(match (lhs, rhs) {
                    (Sym::Test(a), Sym::Test(b)) => Sym::Test(Cond {
                        when_true: disjunction(&a.when_true, &b.when_true),
                        when_false: conjunction(&a.when_false, &b.when_false),
                    }),
                    _ => Sym::Opaque,
                });
            }
            Opcode::Assert => {
                if let Sym::Test(cond) = pop(&mut stack) {
                    apply(&mut state, &cond.when_true, cap);
                }
            }
            Opcode::Dup => {
                let top = stack.last().cloned().unwrap_or(Sym::Opaque);
                stack.push(top);
            }
            Opcode::Dup2 => {
                let len = stack.len();
                let a = stack.get(len.wrapping_sub(2)).cloned().unwrap_or(Sym::Opaque);
                let b = stack.last().cloned().unwrap_or(Sym::Opaque);
                stack.push(a);
                stack.push(b);
            }
            Opcode::Swap => {
                let len = stack.len();
                if len >= 2 {
                    stack.swap(len - 1, len - 2);
                }
            }
            Opcode::Pop => {
                pop(&mut stack);
            }
            Opcode::Bnz(_) => {
                if let Sym::Test(cond) = pop(&mut stack) {
                    result.taken = cond.when_true;
                    result.not_taken = cond.when_false;
                }
            }
            Opcode::Bz(_) => {
                if let Sym::Test(cond) = pop(&mut stack) {
                    result.taken = cond.when_false;
                    result.not_taken = cond.when_true;
                }
            }
            Opcode::Switch(targets) => {
                if let Sym::Field(field) = pop(&mut stack) {
                    result.per_target = (0..targets.len() as u64)
                        .map(|index| {
                            Refinement::from([(
                                field,
                                Constraint::In(BTreeSet::from([Value::Uint(index)])),
                            )])
                        })
                        .collect();
                    result.not_taken = Refinement::from([(
                        field,
                        Constraint::NotIn(
                            (0..targets.len() as u64).map(Value::Uint).collect(),
                        ),
                    )]);
                }
            }
            other => {
                for _ in 0..other.pops() {
                    pop(&mut stack);
                }
                for _ in 0..other.pushes() {
                    stack.push(Sym::Opaque);
                }
            }
        }
    }

    result.output = state;
    result
}

fn pop(stack: &mut Vec<Sym>) -> Sym {
    // Values produced in predecessor blocks are simply unknown here.
    stack.pop().unwrap_or(Sym::Opaque)
}

fn binary_compare(stack: &mut Vec<Sym>, op: CmpOp, cap: usize) {
    let rhs = pop(stack);
    let lhs = pop(stack);
    let sym = match (lhs, rhs) {
        (Sym::Field(field), Sym::Const(constant)) => compare(field, op, constant, cap),
        (Sym::Const(constant), Sym::Field(field)) => compare(field, op.flip(), constant, cap),
        _ => Sym::Opaque,
    };
    stack.push(sym);
}

fn compare(field: TrackedField, op: CmpOp, constant: Value, cap: usize) -> Sym {
    match op {
        CmpOp::Eq => {
            let set = BTreeSet::from([constant]);
            Sym::Test(Cond {
                when_true: Refinement::from([(field, Constraint::In(set.clone()))]),
                when_false: Refinement::from([(field, Constraint::NotIn(set))]),
            })
        }
        CmpOp::Neq => {
            let set = BTreeSet::from([constant]);
            Sym::Test(Cond {
                when_true: Refinement::from([(field, Constraint::NotIn(set.clone()))]),
                when_false: Refinement::from([(field, Constraint::In(set))]),
            })
        }
        _ => match constant {
            Value::Uint(c) => {
                let mut when_true = Refinement::new();
                if let Some(values) = satisfying(field, op, c, cap) {
                    when_true.insert(field, Constraint::In(values));
                }
                let mut when_false = Refinement::new();
                if let Some(values) = satisfying(field, op.negate(), c, cap) {
                    when_false.insert(field, Constraint::In(values));
                }
                if when_true.is_empty() && when_false.is_empty() {
                    Sym::Opaque
                } else {
                    Sym::Test(Cond {
                        when_true,
                        when_false,
                    })
                }
            }
            // Ordered comparison on byte strings: not modeled.
            Value::Bytes(_) => Sym::Opaque,
        },
    }
}

/// Enumerate the values satisfying `field OP constant`, either inside the
/// field's finite domain or inside `0..=constant` for upper bounds, as
/// long as the result stays within the cap. `None` means "cannot
/// enumerate, no refinement".
fn satisfying(field: TrackedField, op: CmpOp, constant: u64, cap: usize) -> Option<BTreeSet<Value>> {
    let (lo, hi) = match field.domain() {
        Some((lo, hi)) => (lo, hi),
        None => match op {
            CmpOp::Lt if constant as u128 <= cap as u128 => (0, constant.saturating_sub(1)),
            CmpOp::Le if constant as u128 + 1 <= cap as u128 => (0, constant),
            _ => return None,
        },
    };
    let values: BTreeSet<Value> = (lo..=hi)
        .filter(|&v| op.holds(v, constant))
        .map(Value::Uint)
        .collect();
    (values.len() <= cap).then_some(values)
}

fn conjunction(a: &Refinement, b: &Refinement) -> Refinement {
    let mut merged = a.clone();
    for (field, constraint) in b {
        match merged.remove(field) {
            None => {
                merged.insert(*field, constraint.clone());
            }
            Some(existing) => {
                merged.insert(*field, combine_conjunct(existing, constraint.clone()));
            }
        }
    }
    merged
}

fn combine_conjunct(a: Constraint, b: Constraint) -> Constraint {
    use Constraint::{In, NotIn};
    match (a, b) {
        (In(x), In(y)) => In(x.intersection(&y).cloned().collect()),
        (In(x), NotIn(y)) | (NotIn(y), In(x)) => In(x.difference(&y).cloned().collect()),
        (NotIn(x), NotIn(y)) => NotIn(x.union(&y).cloned().collect()),
    }
}

/// A disjunction refines only when both arms constrain the same single
/// field with an enumeration; anything else drops to "no information".
fn disjunction(a: &Refinement, b: &Refinement) -> Refinement {
    if a.len() != 1 || b.len() != 1 {
        return Refinement::new();
    }
    let (field_a, constraint_a) = a.iter().next().expect("len checked");
    let (field_b, constraint_b) = b.iter().next().expect("len checked");
    if field_a != field_b {
        return Refinement::new();
    }
    match (constraint_a, constraint_b) {
        (Constraint::In(x), Constraint::In(y)) => Refinement::from([(
            *field_a,
            Constraint::In(x.union(y).cloned().collect()),
        )]),
        _ => Refinement::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::WIDENING_CAP;
    use crate::parser::Program;

    fn run(source: &str) -> Transfer {
        let program = Program::parse(source).unwrap();
        transfer(program.instructions(), &FieldState::top(), WIDENING_CAP)
    }

    fn uints(values: &[u64]) -> BTreeSet<Value> {
        values.iter().copied().map(Value::Uint).collect()
    }

    #[test]
    fn equality_assert_refines_the_field() {
        let t = run("#pragma version 3\nglobal GroupSize\nint 2\n==\nassert\n");
        assert_eq!(
            t.output.get(TrackedField::GroupSize),
            &Lattice::singleton(Value::Uint(2))
        );
    }

    #[test]
    fn flipped_operands_are_recognized() {
        let t = run("#pragma version 3\nint 2\nglobal GroupSize\n==\nassert\n");
        assert_eq!(
            t.output.get(TrackedField::GroupSize),
            &Lattice::singleton(Value::Uint(2))
        );
    }

    #[test]
    fn zero_address_compare_refines_rekey_to() {
        let t = run("#pragma version 3\ntxn RekeyTo\nglobal ZeroAddress\n==\nassert\n");
        assert_eq!(
            t.output.get(TrackedField::RekeyTo),
            &Lattice::singleton(Value::Bytes(vec![0u8; 32]))
        );
    }

    #[test]
    fn ordered_compare_enumerates_the_domain() {
        let t = run("#pragma version 3\nglobal GroupSize\nint 3\n<=\nassert\n");
        assert_eq!(
            t.output.get(TrackedField::GroupSize),
            &Lattice::from_set(uints(&[1, 2, 3]), WIDENING_CAP)
        );
    }

    #[test]
    fn unbounded_fields_widen_on_ordered_compare() {
        // Fee has no finite domain and 10000 exceeds the cap.
        let t = run("#pragma version 3\ntxn Fee\nint 10000\n<=\nassert\n");
        assert!(t.output.get(TrackedField::Fee).is_top());
    }

    #[test]
    fn disjunction_of_same_field_unions() {
        let t = run(
            "#pragma version 3\ntxn OnCompletion\nint OptIn\n==\ntxn OnCompletion\nint NoOp\n==\n||\nassert\n",
        );
        assert_eq!(
            t.output.get(TrackedField::OnCompletion),
            &Lattice::from_set(uints(&[0, 1]), WIDENING_CAP)
        );
    }

    #[test]
    fn conjunction_applies_both_fields() {
        let t = run(
            "#pragma version 3\ntxn TypeEnum\nint pay\n==\nglobal GroupSize\nint 1\n==\n&&\nassert\n",
        );
        assert_eq!(
            t.output.get(TrackedField::TypeEnum),
            &Lattice::singleton(Value::Uint(1))
        );
        assert_eq!(
            t.output.get(TrackedField::GroupSize),
            &Lattice::singleton(Value::Uint(1))
        );
    }

    #[test]
    fn branch_refinements_split_by_edge() {
        let t = run("#pragma version 2\ntxn OnCompletion\nint DeleteApplication\n==\nbnz delete\ndelete:\n");
        assert_eq!(
            t.taken.get(&TrackedField::OnCompletion),
            Some(&Constraint::In(uints(&[5])))
        );
        assert_eq!(
            t.not_taken.get(&TrackedField::OnCompletion),
            Some(&Constraint::NotIn(uints(&[5])))
        );
    }

    #[test]
    fn bz_swaps_the_refinements() {
        let t = run("#pragma version 2\ntxn OnCompletion\nint NoOp\n==\nbz other\nother:\n");
        assert_eq!(
            t.taken.get(&TrackedField::OnCompletion),
            Some(&Constraint::NotIn(uints(&[0])))
        );
    }

    #[test]
    fn logic_not_inverts_the_condition() {
        let t = run("#pragma version 3\ntxn OnCompletion\nint NoOp\n==\n!\nassert\n");
        // not(== NoOp) asserted: NoOp is excluded, domain enumerates.
        assert_eq!(
            t.output.get(TrackedField::OnCompletion),
            &Lattice::from_set(uints(&[1, 2, 3, 4, 5]), WIDENING_CAP)
        );
    }

    #[test]
    fn gtxn_refines_only_with_pinned_group_index() {
        let pinned = run(
            "#pragma version 3\ntxn GroupIndex\nint 1\n==\nassert\ngtxn 1 TypeEnum\nint pay\n==\nassert\n",
        );
        assert_eq!(
            pinned.output.get(TrackedField::TypeEnum),
            &Lattice::singleton(Value::Uint(1))
        );

        let unpinned = run("#pragma version 3\ngtxn 1 TypeEnum\nint pay\n==\nassert\n");
        assert!(unpinned.output.get(TrackedField::TypeEnum).is_top());
    }

    #[test]
    fn switch_refines_each_target() {
        let t = run("#pragma version 8\ntxn OnCompletion\nswitch a b\nerr\na:\nint 1\nreturn\nb:\nint 1\nreturn\n");
        // The whole program is evaluated as one straight line here; only
        // the switch terminator's refinements matter.
        assert_eq!(t.per_target.len(), 2);
        assert_eq!(
            t.per_target[1].get(&TrackedField::OnCompletion),
            Some(&Constraint::In(uints(&[1])))
        );
    }
}
