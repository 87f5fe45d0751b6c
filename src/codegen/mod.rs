//! Lowers a program to x86_64 assembly in AT&T syntax.
//!
//! Every expression leaves its result in `%rax`. Integers and booleans are
//! the only values with a machine representation; booleans are `0` or `1`.

use std::{collections::HashMap, fmt::Write, format_args as f};

use crate::{
    ast::{BlockStatement, Expression, InfixOperator, PrefixOperator, Program, Statement},
    control_flow::LoopContext,
};

#[cfg(test)]
mod tests;

/// Bytes reserved below the frame pointer for locals.
pub const LOCAL_AREA_SIZE: usize = 256;

/// Bytes taken by each local.
pub const SLOT_SIZE: usize = 8;

const ENTRY_POINT: &str = "_main";
const SECTION_DATA: &str = "__DATA,__data";
const SECTION_TEXT: &str = "__TEXT,__text,regular,pure_instructions";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),
    #[error("unsupported expression type: {0}")]
    UnsupportedExpression(&'static str),
    #[error("break statement outside of loop")]
    BreakOutsideLoop,
    #[error("continue statement outside of loop")]
    ContinueOutsideLoop,
}

type Result<T = (), E = Error> = std::result::Result<T, E>;

#[derive(Default)]
pub struct CodeGenerator {
    body: String,
    label_counter: usize,
    stack_offset: usize,
    /// Variable name to its offset below `%rbp`. Not scoped: a later `let`
    /// of the same name takes over the entry.
    variables: HashMap<String, usize>,
    loops: Vec<LoopContext>,
}

impl CodeGenerator {
    pub fn new() -> CodeGenerator {
        CodeGenerator::default()
    }

    /// Generates the assembly of a whole program.
    ///
    /// Nothing is returned on failure; partial output is discarded.
    pub fn generate(mut self, program: &Program) -> Result<String> {
        for stmt in &program.statements {
            self.g_stmt(stmt)?;
        }

        let local_area = LOCAL_AREA_SIZE.max(self.stack_offset.next_multiple_of(16));
        tracing::debug!(
            labels = self.label_counter,
            slots = self.variables.len(),
            local_area,
            "generated code"
        );

        let mut out = String::with_capacity(self.body.len() + 256);
        Self::g_prologue(&mut out, local_area);
        out.push_str(&self.body);
        Self::g_epilogue(&mut out);
        Ok(out)
    }

    fn g_prologue(out: &mut String, local_area: usize) {
        writeln!(
            out,
            "# pug compiler generated assembly\n\
             .section {SECTION_DATA}\n\
             \n\
             .section {SECTION_TEXT}\n\
             .globl {ENTRY_POINT}\n\
             \n\
             {ENTRY_POINT}:\n    \
             pushq %rbp\n    \
             movq %rsp, %rbp\n    \
             subq ${local_area}, %rsp"
        )
        .expect("writing to a string should not fail");
    }

    fn g_epilogue(out: &mut String) {
        out.push_str("    movq $0, %rax\n");
        Self::g_teardown(out);
    }

    fn g_teardown(out: &mut String) {
        out.push_str("    movq %rbp, %rsp\n");
        out.push_str("    popq %rbp\n");
        out.push_str("    ret\n");
    }
}

/// Statements.
impl CodeGenerator {
    fn g_stmt(&mut self, stmt: &Statement) -> Result {
        match stmt {
            Statement::Let { name, value } => {
                match value {
                    Some(value) => self.g_expr(value)?,
                    None => self.ins("movq $0, %rax"),
                }
                self.stack_offset += SLOT_SIZE;
                let offset = self.stack_offset;
                tracing::trace!(name = %name.name, offset, "allocated slot");
                self.variables.insert(name.name.clone(), offset);
                self.ins(f!("movq %rax, -{offset}(%rbp)"));
                self.ins(f!("# let {} = ...", name.name));
            }
            Statement::Return(value) => {
                match value {
                    Some(value) => self.g_expr(value)?,
                    None => self.ins("movq $0, %rax"),
                }
                Self::g_teardown(&mut self.body);
            }
            Statement::Expression(expr) => {
                if let Some(expr) = expr {
                    self.g_expr(expr)?;
                }
            }
            Statement::Block(block) => self.g_block(block)?,
            Statement::While { condition, body } => {
                let start = self.label("while_start");
                let end = self.label("while_end");

                self.def_label(&start);
                self.g_expr(condition)?;
                self.ins("testq %rax, %rax");
                self.ins(f!("jz {end}"));
                self.in_loop(LoopContext::new(&end, &start), |this| this.g_block(body))?;
                self.ins(f!("jmp {start}"));
                self.def_label(&end);
            }
            Statement::For {
                init,
                condition,
                update,
                body,
            } => {
                let start = self.label("for_start");
                let cont = self.label("for_continue");
                let end = self.label("for_end");

                if let Some(init) = init {
                    self.g_stmt(init)?;
                }
                self.def_label(&start);
                if let Some(condition) = condition {
                    self.g_expr(condition)?;
                    self.ins("testq %rax, %rax");
                    self.ins(f!("jz {end}"));
                }
                self.in_loop(LoopContext::new(&end, &cont), |this| this.g_block(body))?;
                self.def_label(&cont);
                if let Some(update) = update {
                    self.g_expr(update)?;
                }
                self.ins(f!("jmp {start}"));
                self.def_label(&end);
            }
            Statement::Break => {
                let target = self.loops.last().ok_or(Error::BreakOutsideLoop)?;
                let label = target.break_label.clone();
                self.ins(f!("jmp {label}"));
            }
            Statement::Continue => {
                let target = self.loops.last().ok_or(Error::ContinueOutsideLoop)?;
                let label = target.continue_label.clone();
                self.ins(f!("jmp {label}"));
            }
        }
        Ok(())
    }

    fn g_block(&mut self, block: &BlockStatement) -> Result {
        block.statements.iter().try_for_each(|stmt| self.g_stmt(stmt))
    }

    /// Runs `f` with `ctx` as the innermost loop.
    fn in_loop(&mut self, ctx: LoopContext, f: impl FnOnce(&mut Self) -> Result) -> Result {
        self.loops.push(ctx);
        let res = f(self);
        self.loops.pop();
        res
    }
}

/// Expressions.
impl CodeGenerator {
    fn g_expr(&mut self, expr: &Expression) -> Result {
        match expr {
            Expression::Integer(value) => self.ins(f!("movq ${value}, %rax")),
            Expression::Boolean(value) => self.ins(f!("movq ${}, %rax", u8::from(*value))),
            Expression::Identifier(ident) => {
                let offset = *self
                    .variables
                    .get(&ident.name)
                    .ok_or_else(|| Error::UndefinedVariable(ident.name.clone()))?;
                self.ins(f!("movq -{offset}(%rbp), %rax"));
                self.ins(f!("# load variable {}", ident.name));
            }
            Expression::Prefix { op, right } => {
                self.g_expr(right)?;
                match op {
                    PrefixOperator::Neg => self.ins("negq %rax"),
                    PrefixOperator::Plus => {}
                    PrefixOperator::Not => {
                        self.ins("testq %rax, %rax");
                        self.g_flag_to_rax("jz");
                    }
                }
            }
            Expression::Infix { left, op, right } if op.is_logical() => {
                self.g_logical(left, *op, right)?;
            }
            Expression::Infix { left, op, right } => {
                self.g_expr(left)?;
                self.ins("pushq %rax");
                self.g_expr(right)?;
                self.ins("movq %rax, %rbx");
                self.ins("popq %rax");
                self.g_binary(*op);
            }
            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                let else_label = self.label("if_else");
                let end = self.label("if_end");

                self.g_expr(condition)?;
                self.ins("testq %rax, %rax");
                self.ins(f!("jz {else_label}"));
                self.g_block(consequence)?;
                self.ins(f!("jmp {end}"));
                self.def_label(&else_label);
                if let Some(alternative) = alternative {
                    self.g_block(alternative)?;
                }
                self.def_label(&end);
            }
            Expression::Float { .. }
            | Expression::String(_)
            | Expression::Function(_)
            | Expression::Call { .. }
            | Expression::Array(_)
            | Expression::Hash(_)
            | Expression::Index { .. } => {
                return Err(Error::UnsupportedExpression(expr.kind_name()));
            }
        }
        Ok(())
    }

    /// Combines `%rax` (left) with `%rbx` (right) into `%rax`.
    fn g_binary(&mut self, op: InfixOperator) {
        use InfixOperator::*;
        match op {
            Add => self.ins("addq %rbx, %rax"),
            Sub => self.ins("subq %rbx, %rax"),
            Mul => self.ins("imulq %rbx, %rax"),
            Div => {
                self.ins("cqto");
                self.ins("idivq %rbx");
            }
            Mod => {
                self.ins("cqto");
                self.ins("idivq %rbx");
                self.ins("movq %rdx, %rax");
            }
            Eq | NotEq | Lt | Gt | LtEq | GtEq => {
                let jump = match op {
                    Eq => "je",
                    NotEq => "jne",
                    Lt => "jl",
                    Gt => "jg",
                    LtEq => "jle",
                    _ => "jge",
                };
                self.ins("cmpq %rbx, %rax");
                self.g_flag_to_rax(jump);
            }
            // Short-circuited before both sides are evaluated.
            And | Or => unreachable!("logical operators are lowered by g_logical"),
        }
    }

    /// Sets `%rax` to 1 if `jump` is taken on the current flags, else to 0.
    fn g_flag_to_rax(&mut self, jump: &str) {
        let true_label = self.label("true");
        let end = self.label("end");
        self.ins(f!("{jump} {true_label}"));
        self.ins("movq $0, %rax");
        self.ins(f!("jmp {end}"));
        self.def_label(&true_label);
        self.ins("movq $1, %rax");
        self.def_label(&end);
    }

    fn g_logical(&mut self, left: &Expression, op: InfixOperator, right: &Expression) -> Result {
        // `&&` stops at the first zero, `||` at the first non-zero.
        let (prefix, jump, short, full) = match op {
            InfixOperator::And => ("and_false", "jz", 0, 1),
            _ => ("or_true", "jnz", 1, 0),
        };
        let short_label = self.label(prefix);
        let end = self.label(if short == 0 { "and_end" } else { "or_end" });

        for side in [left, right] {
            self.g_expr(side)?;
            self.ins("testq %rax, %rax");
            self.ins(f!("{jump} {short_label}"));
        }
        self.ins(f!("movq ${full}, %rax"));
        self.ins(f!("jmp {end}"));
        self.def_label(&short_label);
        self.ins(f!("movq ${short}, %rax"));
        self.def_label(&end);
        Ok(())
    }
}

/// Utility functions.
impl CodeGenerator {
    /// Returns a fresh `.L<prefix><n>` label.
    fn label(&mut self, prefix: &str) -> String {
        let label = format!(".L{prefix}{}", self.label_counter);
        self.label_counter += 1;
        label
    }

    /// Emits an indented instruction or comment.
    fn ins(&mut self, f: impl std::fmt::Display) {
        writeln!(self.body, "    {f}").expect("writing to a string should not fail");
    }

    fn def_label(&mut self, label: &str) {
        writeln!(self.body, "{label}:").expect("writing to a string should not fail");
    }
}
