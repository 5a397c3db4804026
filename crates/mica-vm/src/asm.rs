//! Interpreter for inline-assembly blocks.
//!
//! The block text is lowercased and split into tokens on whitespace and
//! commas, so `mov rax, 7`, `mov rax,7` and `mov rax 7` all parse the same.
//! `push`/`pop` operate on the bytecode machine's operand stack; this is the
//! bridge between the two execution models.

use mica_syntax::error::{error, Error, Result};

use crate::cpu::{CpuState, Register};

/// Execute one inline-assembly block against the register file and the
/// shared operand stack.
pub(crate) fn exec_asm(text: &str, cpu: &mut CpuState, stack: &mut Vec<i64>) -> Result<()> {
    let tokens: Vec<String> = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
        .collect();

    let mut cursor = Cursor {
        tokens: &tokens,
        pos: 0,
    };
    while let Some(mnemonic) = cursor.next() {
        match mnemonic.as_str() {
            "mov" => {
                let dst = cursor.register("mov")?;
                let src = cursor.operand("mov")?;
                // An operand that parses as a number is an immediate;
                // anything else must name a register.
                let value = match src.parse::<i64>() {
                    Ok(imm) => imm,
                    Err(_) => cpu.get(to_register(src)?),
                };
                cpu.set(dst, value);
            }
            "add" => {
                let dst = cursor.register("add")?;
                let imm = cursor.immediate("add")?;
                let value = cpu.get(dst) + imm;
                cpu.set(dst, value);
                cpu.update_flags(value);
            }
            "sub" => {
                let dst = cursor.register("sub")?;
                let imm = cursor.immediate("sub")?;
                let value = cpu.get(dst) - imm;
                cpu.set(dst, value);
                cpu.update_flags(value);
            }
            "push" => {
                let src = cursor.register("push")?;
                stack.push(cpu.get(src));
            }
            "pop" => {
                let dst = cursor.register("pop")?;
                let Some(value) = stack.pop() else {
                    return error("stack underflow in asm pop");
                };
                cpu.set(dst, value);
            }
            "inc" => {
                let dst = cursor.register("inc")?;
                let value = cpu.get(dst) + 1;
                cpu.set(dst, value);
                cpu.update_flags(value);
            }
            "dec" => {
                let dst = cursor.register("dec")?;
                let value = cpu.get(dst) - 1;
                cpu.set(dst, value);
                cpu.update_flags(value);
            }
            other => return error(format!("Unknown asm instruction '{}'", other)),
        }
    }
    Ok(())
}

fn to_register(name: &str) -> Result<Register> {
    Register::from_name(name).ok_or_else(|| Error::new(format!("Unknown register '{}'", name)))
}

struct Cursor<'a> {
    tokens: &'a [String],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn next(&mut self) -> Option<&'a String> {
        let tk = self.tokens.get(self.pos);
        if tk.is_some() {
            self.pos += 1;
        }
        tk
    }

    fn operand(&mut self, mnemonic: &str) -> Result<&'a String> {
        match self.next() {
            Some(tk) => Ok(tk),
            None => error(format!("Missing operand for '{}'", mnemonic)),
        }
    }

    fn register(&mut self, mnemonic: &str) -> Result<Register> {
        let tk = self.operand(mnemonic)?;
        to_register(tk)
    }

    fn immediate(&mut self, mnemonic: &str) -> Result<i64> {
        let tk = self.operand(mnemonic)?;
        tk.parse::<i64>()
            .map_err(|_| Error::new(format!("'{}' expects an immediate, got '{}'", mnemonic, tk)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str) -> (CpuState, Vec<i64>) {
        let mut cpu = CpuState::default();
        let mut stack = Vec::new();
        exec_asm(text, &mut cpu, &mut stack).expect("asm should execute");
        (cpu, stack)
    }

    #[test]
    fn mov_immediate_and_register() {
        let (cpu, _) = run("mov rax, 7 mov rbx, rax");
        assert_eq!(cpu.get(Register::Rax), 7);
        assert_eq!(cpu.get(Register::Rbx), 7);
    }

    #[test]
    fn comma_spellings_are_equivalent() {
        let (a, _) = run("mov rax, 7");
        let (b, _) = run("mov rax,7");
        let (c, _) = run("mov rax 7");
        assert_eq!(a.get(Register::Rax), 7);
        assert_eq!(b.get(Register::Rax), 7);
        assert_eq!(c.get(Register::Rax), 7);
    }

    #[test]
    fn mnemonics_are_case_insensitive() {
        let (cpu, _) = run("MOV RAX, 3 INC RAX");
        assert_eq!(cpu.get(Register::Rax), 4);
    }

    #[test]
    fn negative_immediates() {
        let (cpu, _) = run("mov rcx, -3");
        assert_eq!(cpu.get(Register::Rcx), -3);
    }

    #[test]
    fn arithmetic_updates_flags() {
        let (cpu, _) = run("mov rax, 1 sub rax, 1");
        assert!(cpu.zf && !cpu.sf);
        let (cpu, _) = run("mov rax, 0 dec rax");
        assert_eq!(cpu.get(Register::Rax), -1);
        assert!(!cpu.zf && cpu.sf);
        let (cpu, _) = run("mov rdx, 40 add rdx, 2");
        assert_eq!(cpu.get(Register::Rdx), 42);
        assert!(!cpu.zf && !cpu.sf);
    }

    #[test]
    fn mov_does_not_touch_flags() {
        let mut cpu = CpuState::default();
        let mut stack = Vec::new();
        exec_asm("mov rax, 1 sub rax, 1", &mut cpu, &mut stack).unwrap();
        assert!(cpu.zf);
        exec_asm("mov rax, 5", &mut cpu, &mut stack).unwrap();
        assert!(cpu.zf);
    }

    #[test]
    fn push_pop_bridge_the_operand_stack() {
        let mut cpu = CpuState::default();
        let mut stack = vec![11];
        exec_asm("pop rax push rax push rax", &mut cpu, &mut stack).unwrap();
        assert_eq!(cpu.get(Register::Rax), 11);
        assert_eq!(stack, vec![11, 11]);
    }

    #[test]
    fn push_then_pop_is_stack_neutral() {
        let (cpu, stack) = run("mov rax, 7 push rax pop rbx");
        assert_eq!(cpu.get(Register::Rbx), 7);
        assert!(stack.is_empty());
    }

    #[test]
    fn faults() {
        let mut cpu = CpuState::default();
        let mut stack = Vec::new();
        let err = exec_asm("mov rfx, 1", &mut cpu, &mut stack).unwrap_err();
        assert!(err.msg.contains("Unknown register 'rfx'"));
        let err = exec_asm("xor rax, rax", &mut cpu, &mut stack).unwrap_err();
        assert!(err.msg.contains("Unknown asm instruction"));
        let err = exec_asm("pop rax", &mut cpu, &mut stack).unwrap_err();
        assert!(err.msg.contains("stack underflow"));
        let err = exec_asm("mov rax", &mut cpu, &mut stack).unwrap_err();
        assert!(err.msg.contains("Missing operand"));
        let err = exec_asm("add rax, rbx", &mut cpu, &mut stack).unwrap_err();
        assert!(err.msg.contains("expects an immediate"));
    }
}
