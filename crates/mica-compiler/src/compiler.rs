//! Bytecode compiler from AST to the flat instruction sequence.

use std::collections::HashMap;

use mica_bytecode::Instruction as BC;
use mica_syntax::ast::*;
use mica_syntax::error::{error, Error, Result};

use crate::scope::{SymbolTable, VariableInfo};

/// Single-pass code generator. Walks the tree once, resolving variables
/// through the scope stack and function references through an address table;
/// calls to functions not yet seen go through an explicit backpatch list.
///
/// The compiler is reusable: every [`compile`](Compiler::compile) call resets
/// all internal state first.
pub struct Compiler {
    code: Vec<BC>,
    symbols: SymbolTable,
    function_addresses: HashMap<String, usize>,
    pending_calls: Vec<(usize, String)>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            symbols: SymbolTable::new(),
            function_addresses: HashMap::new(),
            pending_calls: Vec::new(),
        }
    }

    /// Compile a program into the flat instruction sequence. Appends the
    /// entry sequence `Call(main)`, `Halt` after the walk, so top-level
    /// declarations execute once, in source order, before `main` runs.
    pub fn compile(&mut self, program: &Program) -> Result<Vec<BC>> {
        self.reset();

        for item in &program.items {
            match item {
                Item::Function(f) => self.compile_function(f)?,
                Item::Stmt(s) => self.compile_stmt(s)?,
            }
        }

        let main = match self.function_addresses.get("main") {
            Some(&addr) => addr,
            None => return error("Entry point 'main' was not defined"),
        };
        self.emit(BC::Call(main));
        self.emit(BC::Halt);

        if let Some((_, name)) = self.pending_calls.first() {
            return error(format!("Unresolved call to undefined function '{}'", name));
        }

        Ok(std::mem::take(&mut self.code))
    }

    fn reset(&mut self) {
        self.code.clear();
        self.symbols.reset();
        self.function_addresses.clear();
        self.pending_calls.clear();
    }

    fn emit(&mut self, i: BC) -> usize {
        self.code.push(i);
        self.code.len() - 1
    }

    fn here(&self) -> usize {
        self.code.len()
    }

    fn patch_jump(&mut self, at: usize, target: usize) -> Result<()> {
        match &mut self.code[at] {
            BC::Jump(ref mut x) | BC::JumpIfFalse(ref mut x) => {
                *x = target;
                Ok(())
            }
            other => error(format!("Internal compiler error: cannot patch {:?}", other)),
        }
    }

    /// Resolve every queued forward call to `name` now that its entry
    /// address is known.
    fn resolve_pending_calls(&mut self, name: &str, address: usize) {
        let mut i = 0;
        while i < self.pending_calls.len() {
            if self.pending_calls[i].1 == name {
                let (at, _) = self.pending_calls.remove(i);
                self.code[at] = BC::Call(address);
            } else {
                i += 1;
            }
        }
    }

    fn compile_function(&mut self, f: &Function) -> Result<()> {
        if self.function_addresses.contains_key(&f.name) {
            return error(format!("Duplicate function '{}'", f.name));
        }

        // Normal control flow skips over the body; patched once its extent
        // is known.
        let skip = self.emit(BC::Jump(0));

        let entry = self.here();
        self.function_addresses.insert(f.name.clone(), entry);
        self.resolve_pending_calls(&f.name, entry);

        self.symbols.enter_function();
        self.compile_block(&f.body)?;
        // Fall-through return value for bodies that never hit `return`.
        self.emit(BC::Push(0));
        self.emit(BC::Return);
        self.symbols.leave_function();

        let after = self.here();
        self.patch_jump(skip, after)
    }

    fn compile_block(&mut self, stmts: &[Stmt]) -> Result<()> {
        self.symbols.enter_scope();
        for s in stmts {
            self.compile_stmt(s)?;
        }
        self.symbols.leave_scope();
        Ok(())
    }

    fn compile_stmt(&mut self, s: &Stmt) -> Result<()> {
        match s {
            Stmt::VarDecl { name, init } => {
                let info = self.symbols.declare(name)?;
                self.compile_expr(init)?;
                self.emit_store(info);
                Ok(())
            }
            Stmt::Print(e) => {
                self.compile_expr(e)?;
                self.emit(BC::Print);
                Ok(())
            }
            Stmt::Asm(text) => {
                self.emit(BC::ExecAsm(text.clone()));
                Ok(())
            }
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => self.compile_if(cond, then_block, else_block.as_deref()),
            Stmt::While { cond, body } => self.compile_while(cond, body),
            Stmt::Return(value) => self.compile_return(value.as_ref()),
            Stmt::Block(stmts) => self.compile_block(stmts),
            Stmt::Expr(e) => {
                self.compile_expr(e)?;
                self.emit(BC::Pop);
                Ok(())
            }
        }
    }

    fn compile_if(
        &mut self,
        cond: &Expr,
        then_block: &[Stmt],
        else_block: Option<&[Stmt]>,
    ) -> Result<()> {
        self.compile_expr(cond)?;
        let jump_false = self.emit(BC::JumpIfFalse(0));
        self.compile_block(then_block)?;

        if let Some(else_block) = else_block {
            let jump_end = self.emit(BC::Jump(0));
            let else_entry = self.here();
            self.patch_jump(jump_false, else_entry)?;
            self.compile_block(else_block)?;
            let merge = self.here();
            self.patch_jump(jump_end, merge)
        } else {
            let merge = self.here();
            self.patch_jump(jump_false, merge)
        }
    }

    fn compile_while(&mut self, cond: &Expr, body: &[Stmt]) -> Result<()> {
        let loop_start = self.here();
        self.compile_expr(cond)?;
        let exit_jump = self.emit(BC::JumpIfFalse(0));
        self.compile_block(body)?;
        self.emit(BC::Jump(loop_start));
        let exit = self.here();
        self.patch_jump(exit_jump, exit)
    }

    fn compile_return(&mut self, value: Option<&Expr>) -> Result<()> {
        if !self.symbols.in_function() {
            return error("Return statement outside of function");
        }
        match value {
            Some(e) => self.compile_expr(e)?,
            None => {
                self.emit(BC::Push(0));
            }
        }
        self.emit(BC::Return);
        Ok(())
    }

    fn compile_expr(&mut self, e: &Expr) -> Result<()> {
        match e {
            Expr::Number(n) => {
                self.emit(BC::Push(*n));
                Ok(())
            }
            Expr::Ident(name) => {
                let info = self.resolve_variable(name)?;
                self.emit_load(info);
                Ok(())
            }
            Expr::Assign { name, value } => {
                let info = self.resolve_variable(name)?;
                self.compile_expr(value)?;
                // Store then reload: assignment yields the assigned value.
                self.emit_store(info);
                self.emit_load(info);
                Ok(())
            }
            Expr::Binary { op, lhs, rhs } => {
                // Left-to-right evaluation order.
                self.compile_expr(lhs)?;
                self.compile_expr(rhs)?;
                self.emit(match op {
                    BinOp::Add => BC::Add,
                    BinOp::Sub => BC::Sub,
                    BinOp::Mul => BC::Mul,
                    BinOp::Div => BC::Div,
                    BinOp::Eq => BC::CmpEq,
                    BinOp::Ne => BC::CmpNe,
                    BinOp::Lt => BC::CmpLt,
                    BinOp::Le => BC::CmpLe,
                    BinOp::Gt => BC::CmpGt,
                    BinOp::Ge => BC::CmpGe,
                });
                Ok(())
            }
            Expr::Call { name, args } => self.compile_call(name, args),
        }
    }

    fn compile_call(&mut self, name: &str, args: &[Expr]) -> Result<()> {
        if !args.is_empty() {
            return error(format!("Function '{}' takes no arguments", name));
        }
        match self.function_addresses.get(name) {
            Some(&addr) => {
                self.emit(BC::Call(addr));
            }
            None => {
                // Target not seen yet: emit a placeholder and queue it for
                // backpatching when (if) the definition arrives.
                let at = self.emit(BC::Call(0));
                self.pending_calls.push((at, name.to_string()));
            }
        }
        Ok(())
    }

    fn resolve_variable(&self, name: &str) -> Result<VariableInfo> {
        self.symbols
            .resolve(name)
            .ok_or_else(|| Error::new(format!("Undefined variable '{}'", name)))
    }

    fn emit_store(&mut self, info: VariableInfo) {
        if info.is_global {
            self.emit(BC::StoreGlobal(info.index));
        } else {
            self.emit(BC::StoreLocal(info.index));
        }
    }

    fn emit_load(&mut self, info: VariableInfo) {
        if info.is_global {
            self.emit(BC::LoadGlobal(info.index));
        } else {
            self.emit(BC::LoadLocal(info.index));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mica_lexer::Lexer;
    use mica_parser::Parser;

    fn compile_src(src: &str) -> Result<Vec<BC>> {
        let mut lexer = Lexer::new(src);
        let tokens = lexer.tokenize().expect("Lexing should succeed");
        let mut parser = Parser::new(tokens);
        let program = parser.parse_program().expect("Parsing should succeed");
        Compiler::new().compile(&program)
    }

    #[test]
    fn empty_main_gets_entry_sequence() {
        let code = compile_src("void main() { }").unwrap();
        assert_eq!(
            code,
            vec![
                BC::Jump(3),
                BC::Push(0),
                BC::Return,
                BC::Call(1),
                BC::Halt,
            ]
        );
    }

    #[test]
    fn while_loop_shape() {
        let code = compile_src("int x = 0; void main() { while (x < 2) { x = x + 1; } }").unwrap();
        assert_eq!(
            code,
            vec![
                BC::Push(0),
                BC::StoreGlobal(0),
                BC::Jump(16),
                BC::LoadGlobal(0),
                BC::Push(2),
                BC::CmpLt,
                BC::JumpIfFalse(14),
                BC::LoadGlobal(0),
                BC::Push(1),
                BC::Add,
                BC::StoreGlobal(0),
                BC::LoadGlobal(0),
                BC::Pop,
                BC::Jump(3),
                BC::Push(0),
                BC::Return,
                BC::Call(3),
                BC::Halt,
            ]
        );
    }

    #[test]
    fn if_else_shape() {
        let code = compile_src("void main() { if (1) print(2); else print(3); }").unwrap();
        assert_eq!(
            code,
            vec![
                BC::Jump(10),
                BC::Push(1),
                BC::JumpIfFalse(6),
                BC::Push(2),
                BC::Print,
                BC::Jump(8),
                BC::Push(3),
                BC::Print,
                BC::Push(0),
                BC::Return,
                BC::Call(1),
                BC::Halt,
            ]
        );
    }

    #[test]
    fn locals_and_globals_get_distinct_addressing() {
        let code = compile_src("int g = 1; void main() { int l = 2; }").unwrap();
        assert!(code.contains(&BC::StoreGlobal(0)));
        assert!(code.contains(&BC::StoreLocal(0)));
    }

    #[test]
    fn forward_reference_is_backpatched() {
        let code = compile_src("void main() { later(); } void later() { }").unwrap();
        // main's call site is instruction 1; later's entry is 6.
        assert_eq!(code[1], BC::Call(6));
    }

    #[test]
    fn unresolved_call_is_an_error() {
        let err = compile_src("void main() { ghost(); }").unwrap_err();
        assert!(err.msg.contains("Unresolved call"));
        assert!(err.msg.contains("ghost"));
    }

    #[test]
    fn missing_main_is_an_error() {
        let err = compile_src("void helper() { }").unwrap_err();
        assert!(err.msg.contains("main"));
    }

    #[test]
    fn duplicate_declaration_in_same_scope_is_rejected() {
        let err = compile_src("void main() { int x = 1; int x = 2; }").unwrap_err();
        assert!(err.msg.contains("already declared"));
    }

    #[test]
    fn shadowing_in_nested_block_is_allowed() {
        compile_src("void main() { int x = 1; { int x = 2; print(x); } print(x); }").unwrap();
    }

    #[test]
    fn block_scoped_variable_expires() {
        let err = compile_src("void main() { { int x = 1; } print(x); }").unwrap_err();
        assert!(err.msg.contains("Undefined variable 'x'"));
    }

    #[test]
    fn undefined_variable_is_an_error() {
        let err = compile_src("void main() { print(missing); }").unwrap_err();
        assert!(err.msg.contains("Undefined variable"));
    }

    #[test]
    fn return_outside_function_is_rejected() {
        // Not reachable through the grammar; defend against hand-built trees.
        let program = Program {
            items: vec![Item::Stmt(Stmt::Return(None))],
        };
        let err = Compiler::new().compile(&program).unwrap_err();
        assert!(err.msg.contains("outside of function"));
    }

    #[test]
    fn call_arguments_are_rejected() {
        let err = compile_src("void f() { } void main() { f(1); }").unwrap_err();
        assert!(err.msg.contains("takes no arguments"));
    }

    #[test]
    fn duplicate_function_is_rejected() {
        let err = compile_src("void main() { } void main() { }").unwrap_err();
        assert!(err.msg.contains("Duplicate function"));
    }

    #[test]
    fn compiler_is_reusable_across_runs() {
        let mut lexer = Lexer::new("int a = 1; void main() { print(a); }");
        let tokens = lexer.tokenize().unwrap();
        let program = Parser::new(tokens).parse_program().unwrap();
        let mut compiler = Compiler::new();
        let first = compiler.compile(&program).unwrap();
        let second = compiler.compile(&program).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn assignment_stores_then_reloads() {
        let code = compile_src("int x = 0; void main() { x = 5; }").unwrap();
        // Inside main: Push 5, StoreGlobal, LoadGlobal, Pop.
        assert_eq!(
            &code[3..7],
            &[
                BC::Push(5),
                BC::StoreGlobal(0),
                BC::LoadGlobal(0),
                BC::Pop,
            ]
        );
    }
}
