use std::{collections::HashMap, fmt, mem};

use crate::{
    ast::{BlockStatement, Expression, Statement},
    types::Type,
};

pub const BREAK_OUTSIDE_LOOP: &str = "break statement outside of loop";
pub const CONTINUE_OUTSIDE_LOOP: &str = "continue statement outside of loop";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    Global,
    Function,
    Local,
}

impl Scope {
    fn from_level(level: usize) -> Scope {
        match level {
            0 => Scope::Global,
            1 => Scope::Function,
            _ => Scope::Local,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::Global => "global",
            Scope::Function => "function",
            Scope::Local => "local",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    /// Position of the symbol within its table, in definition order.
    pub index: usize,
    pub scope: Scope,
}

/// A lexically scoped symbol table.
///
/// Each table owns its parent, so entering a scope moves the current table
/// inside the new one and leaving it moves the parent back out.
#[derive(Debug, Default)]
pub struct SymbolTable {
    parent: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    num_symbols: usize,
    scope_level: usize,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    pub fn new_enclosed(parent: SymbolTable) -> SymbolTable {
        SymbolTable {
            scope_level: parent.scope_level + 1,
            parent: Some(Box::new(parent)),
            ..SymbolTable::default()
        }
    }

    /// Defines `name` in this table, shadowing any outer definition.
    ///
    /// Redefining a name in the same table replaces the entry but still
    /// consumes a new index.
    pub fn define(&mut self, name: impl Into<String>, ty: Type) -> &Symbol {
        let name = name.into();
        let symbol = Symbol {
            name: name.clone(),
            ty,
            index: self.num_symbols,
            scope: Scope::from_level(self.scope_level),
        };
        self.num_symbols += 1;
        self.store.insert(name.clone(), symbol);
        &self.store[&name]
    }

    /// Looks `name` up in this table, then in each enclosing one.
    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        match self.store.get(name) {
            Some(symbol) => Some(symbol),
            None => self.parent.as_deref()?.resolve(name),
        }
    }

    pub fn scope_level(&self) -> usize {
        self.scope_level
    }

    pub fn num_symbols(&self) -> usize {
        self.num_symbols
    }

    pub fn parent(&self) -> Option<&SymbolTable> {
        self.parent.as_deref()
    }

    /// Detaches the parent table, if any.
    fn into_parent(self) -> Result<SymbolTable, SymbolTable> {
        match self.parent {
            Some(parent) => Ok(*parent),
            None => Err(self),
        }
    }
}

/// The jump targets of an enclosing loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopContext {
    pub break_label: String,
    pub continue_label: String,
}

impl LoopContext {
    pub fn new(break_label: impl Into<String>, continue_label: impl Into<String>) -> LoopContext {
        LoopContext {
            break_label: break_label.into(),
            continue_label: continue_label.into(),
        }
    }
}

/// Checks that every `break` and `continue` has a loop to target, tracking
/// scopes and `let` bindings along the way.
#[derive(Debug, Default)]
pub struct ControlFlowAnalyzer {
    symbol_table: SymbolTable,
    loops: Vec<LoopContext>,
    errors: Vec<String>,
    label_counter: usize,
}

impl ControlFlowAnalyzer {
    pub fn new() -> ControlFlowAnalyzer {
        ControlFlowAnalyzer::default()
    }

    pub fn enter_scope(&mut self) {
        let current = mem::take(&mut self.symbol_table);
        self.symbol_table = SymbolTable::new_enclosed(current);
    }

    /// Leaves the current scope. The global scope is never left.
    pub fn exit_scope(&mut self) {
        let current = mem::take(&mut self.symbol_table);
        self.symbol_table = match current.into_parent() {
            Ok(parent) | Err(parent) => parent,
        };
    }

    pub fn enter_loop(&mut self, break_label: impl Into<String>, continue_label: impl Into<String>) {
        self.loops.push(LoopContext::new(break_label, continue_label));
    }

    pub fn exit_loop(&mut self) {
        self.loops.pop();
    }

    pub fn current_loop(&self) -> Option<&LoopContext> {
        self.loops.last()
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbol_table
    }

    /// Defines `name` in the current scope.
    pub fn define(&mut self, name: impl Into<String>, ty: Type) -> &Symbol {
        self.symbol_table.define(name, ty)
    }

    /// Resolves `name` from the current scope outwards.
    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        self.symbol_table.resolve(name)
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Validates every statement of a program and returns the collected
    /// errors.
    pub fn analyze(mut self, statements: &[Statement]) -> Vec<String> {
        for stmt in statements {
            self.validate(stmt);
        }
        tracing::debug!(errors = self.errors.len(), "analyzed control flow");
        self.errors
    }

    pub fn validate(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Break => {
                if self.current_loop().is_none() {
                    self.errors.push(BREAK_OUTSIDE_LOOP.into());
                }
            }
            Statement::Continue => {
                if self.current_loop().is_none() {
                    self.errors.push(CONTINUE_OUTSIDE_LOOP.into());
                }
            }
            Statement::Block(block) => self.validate_block(block),
            Statement::Let { name, value } => {
                if let Some(value) = value {
                    self.validate_expr(value);
                }
                self.define(name.name.as_str(), Type::unknown("let"));
            }
            Statement::Return(value) | Statement::Expression(value) => {
                if let Some(value) = value {
                    self.validate_expr(value);
                }
            }
            Statement::While { condition, body } => {
                self.validate_expr(condition);
                self.validate_loop("while", body);
            }
            Statement::For {
                init,
                condition,
                update,
                body,
            } => {
                self.enter_scope();
                if let Some(init) = init {
                    self.validate(init);
                }
                for expr in [condition, update].into_iter().flatten() {
                    self.validate_expr(expr);
                }
                self.validate_loop("for", body);
                self.exit_scope();
            }
        }
    }

    fn validate_loop(&mut self, kind: &str, body: &BlockStatement) {
        let n = self.label_counter;
        self.label_counter += 1;
        self.enter_loop(format!(".L{kind}_end{n}"), format!(".L{kind}_continue{n}"));
        self.validate_block(body);
        self.exit_loop();
    }

    fn validate_block(&mut self, block: &BlockStatement) {
        self.enter_scope();
        for stmt in &block.statements {
            self.validate(stmt);
        }
        self.exit_scope();
    }

    fn validate_expr(&mut self, expr: &Expression) {
        match expr {
            Expression::Identifier(_)
            | Expression::Integer(_)
            | Expression::Float { .. }
            | Expression::String(_)
            | Expression::Boolean(_) => {}
            Expression::Prefix { right, .. } => self.validate_expr(right),
            Expression::Infix { left, right, .. } => {
                self.validate_expr(left);
                self.validate_expr(right);
            }
            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                self.validate_expr(condition);
                self.validate_block(consequence);
                if let Some(alternative) = alternative {
                    self.validate_block(alternative);
                }
            }
            Expression::Function(func) => {
                // A function body never targets a loop around its definition.
                let outer_loops = mem::take(&mut self.loops);
                self.enter_scope();
                for param in func.params.iter() {
                    self.define(param.name.as_str(), Type::unknown("param"));
                }
                for stmt in &func.body.statements {
                    self.validate(stmt);
                }
                self.exit_scope();
                self.loops = outer_loops;
            }
            Expression::Call {
                function,
                arguments,
            } => {
                self.validate_expr(function);
                for arg in arguments {
                    self.validate_expr(arg);
                }
            }
            Expression::Array(elements) => {
                for element in elements {
                    self.validate_expr(element);
                }
            }
            Expression::Hash(pairs) => {
                for (key, value) in pairs {
                    self.validate_expr(key);
                    self.validate_expr(value);
                }
            }
            Expression::Index { left, index } => {
                self.validate_expr(left);
                self.validate_expr(index);
            }
        }
    }
}
