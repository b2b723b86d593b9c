//! Execution-mode classification from the opcodes a program uses.

use teal_asm::Instruction;

/// Whether a program is an application (stateful) or a logic signature
/// (stateless transaction authorizer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ExecutionMode {
    /// Application approval or clear-state program.
    Stateful,
    /// Logic signature.
    Stateless,
}

/// Classify a program from mode-exclusive opcodes. When both families
/// appear the program is treated as stateful and a warning is recorded;
/// when neither appears it defaults to stateless.
pub fn detect(instructions: &[Instruction]) -> ExecutionMode {
    let stateful = instructions.iter().any(|i| i.op().is_stateful_only());
    let stateless = instructions.iter().any(|i| i.op().is_stateless_only());
    match (stateful, stateless) {
        (true, true) => {
            tracing::warn!(
                "program mixes application-only and logic-signature-only opcodes; assuming stateful"
            );
            ExecutionMode::Stateful
        }
        (true, false) => ExecutionMode::Stateful,
        _ => ExecutionMode::Stateless,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teal_asm::Opcode;

    fn program(ops: Vec<Opcode>) -> Vec<Instruction> {
        ops.into_iter()
            .enumerate()
            .map(|(i, op)| Instruction::new(op, i as u32 + 1))
            .collect()
    }

    #[test]
    fn application_opcodes_mean_stateful() {
        let instructions = program(vec![Opcode::AppGlobalGet, Opcode::Return]);
        assert_eq!(detect(&instructions), ExecutionMode::Stateful);
    }

    #[test]
    fn argument_opcodes_mean_stateless() {
        let instructions = program(vec![Opcode::Arg0, Opcode::Return]);
        assert_eq!(detect(&instructions), ExecutionMode::Stateless);
    }

    #[test]
    fn neither_family_defaults_to_stateless() {
        let instructions = program(vec![Opcode::Int(1), Opcode::Return]);
        assert_eq!(detect(&instructions), ExecutionMode::Stateless);
    }

    #[test]
    fn mixed_families_prefer_stateful() {
        let instructions = program(vec![Opcode::Arg0, Opcode::AppGlobalGet]);
        assert_eq!(detect(&instructions), ExecutionMode::Stateful);
    }
}
