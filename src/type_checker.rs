use std::collections::HashMap;

use crate::{
    ast::{
        BlockStatement, Expression, FunctionLiteral, InfixOperator, PrefixOperator, Program,
        Statement,
    },
    types::{builtins, Type},
};

/// Variable types, one map per lexical scope.
struct TypeEnv {
    scopes: Vec<HashMap<String, Type>>,
}

impl TypeEnv {
    fn get(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn set(&mut self, name: impl Into<String>, ty: Type) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), ty);
        }
    }
}

/// Infers the types of a program, reporting inconsistencies as messages.
///
/// The checker is purely informational; nothing it reports prevents
/// evaluation or code generation.
pub struct TypeChecker {
    env: TypeEnv,
    errors: Vec<String>,
}

impl Default for TypeChecker {
    fn default() -> Self {
        TypeChecker::new()
    }
}

impl TypeChecker {
    pub fn new() -> TypeChecker {
        let mut globals = HashMap::new();
        for (name, ty) in builtins::signatures() {
            globals.insert(name.to_owned(), ty);
        }
        TypeChecker {
            env: TypeEnv {
                scopes: vec![globals],
            },
            errors: Vec::new(),
        }
    }

    /// Returns the type of the last statement along with every error found.
    pub fn check_program(mut self, program: &Program) -> (Type, Vec<String>) {
        let ty = self.check_statements(&program.statements);
        tracing::debug!(%ty, errors = self.errors.len(), "type checked program");
        (ty, self.errors)
    }

    fn check_statements(&mut self, statements: &[Statement]) -> Type {
        let mut last = void();
        for stmt in statements {
            last = self.check_statement(stmt);
        }
        last
    }

    fn check_statement(&mut self, stmt: &Statement) -> Type {
        match stmt {
            Statement::Let { name, value } => {
                // Lets recursive functions refer to themselves.
                if let Some(Expression::Function(_)) = value {
                    self.env.set(&name.name, Type::unknown(&name.name));
                }
                let ty = match value {
                    Some(value) => self.check_expr(value),
                    None => error(),
                };
                self.env.set(&name.name, ty.clone());
                ty
            }
            Statement::Return(value) | Statement::Expression(value) => match value {
                Some(value) => self.check_expr(value),
                None => void(),
            },
            Statement::Block(block) => self.check_block(block),
            // Loop bodies share the enclosing scope, as in the evaluator.
            Statement::While { condition, body } => {
                self.check_expr(condition);
                self.check_statements(&body.statements);
                void()
            }
            Statement::For {
                init,
                condition,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.check_statement(init);
                }
                for expr in [condition, update].into_iter().flatten() {
                    self.check_expr(expr);
                }
                self.check_statements(&body.statements);
                void()
            }
            Statement::Break | Statement::Continue => void(),
        }
    }

    fn check_block(&mut self, block: &BlockStatement) -> Type {
        self.scoped(|this| this.check_statements(&block.statements))
    }

    fn check_expr(&mut self, expr: &Expression) -> Type {
        match expr {
            Expression::Integer(_) => Type::Int,
            Expression::Float { .. } => Type::Float,
            Expression::String(_) => Type::String,
            Expression::Boolean(_) => Type::Bool,
            Expression::Identifier(ident) => match self.env.get(&ident.name) {
                Some(ty) => ty.clone(),
                None => {
                    self.error(format!("identifier not found: {}", ident.name));
                    error()
                }
            },
            Expression::Prefix { op, right } => self.check_prefix(*op, right),
            Expression::Infix { left, op, right } => self.check_infix(left, *op, right),
            Expression::If {
                condition,
                consequence,
                alternative,
            } => self.check_if(condition, consequence, alternative.as_ref()),
            Expression::Function(func) => self.check_function(func),
            Expression::Call {
                function,
                arguments,
            } => self.check_call(function, arguments),
            Expression::Array(elements) => self.check_array(elements),
            Expression::Hash(pairs) => {
                for (key, value) in pairs {
                    self.check_expr(key);
                    self.check_expr(value);
                }
                Type::unknown("hash")
            }
            Expression::Index { left, index } => {
                let left = self.check_expr(left);
                let index = self.check_expr(index);
                match left {
                    Type::Array(elem) if index.matches(&Type::Int) => *elem,
                    _ => Type::unknown("T"),
                }
            }
        }
    }

    fn check_prefix(&mut self, op: PrefixOperator, right: &Expression) -> Type {
        let right = self.check_expr(right);
        let accepted = right.is_unknown()
            || match op {
                PrefixOperator::Neg | PrefixOperator::Plus => right.is_numeric(),
                PrefixOperator::Not => right == Type::Bool,
            };
        match op {
            PrefixOperator::Neg | PrefixOperator::Plus => {
                if !accepted {
                    self.error(format!("operand of unary {op} must be numeric, got {right}"));
                }
                right
            }
            PrefixOperator::Not => {
                if !accepted {
                    self.error(format!("operand of ! must be bool, got {right}"));
                }
                Type::Bool
            }
        }
    }

    fn check_infix(&mut self, left: &Expression, op: InfixOperator, right: &Expression) -> Type {
        let left = self.check_expr(left);
        let right = self.check_expr(right);

        if op.is_equality() {
            if !left.matches(&right) {
                self.error(format!("cannot compare {left} with {right}"));
            }
            return Type::Bool;
        }

        if op.is_logical() {
            for (side, ty) in [("left", &left), ("right", &right)] {
                if !ty.matches(&Type::Bool) {
                    self.error(format!("{side} operand of {op} must be bool, got {ty}"));
                }
            }
            return Type::Bool;
        }

        // Arithmetic and ordering operators.
        for (side, ty) in [("left", &left), ("right", &right)] {
            if !ty.is_numeric() && !ty.is_unknown() {
                self.error(format!("{side} operand of {op} must be numeric, got {ty}"));
            }
        }
        if op.is_comparison() {
            Type::Bool
        } else if left == Type::Float || right == Type::Float {
            Type::Float
        } else {
            Type::Int
        }
    }

    fn check_if(
        &mut self,
        condition: &Expression,
        consequence: &BlockStatement,
        alternative: Option<&BlockStatement>,
    ) -> Type {
        let condition = self.check_expr(condition);
        if !condition.matches(&Type::Bool) {
            self.error(format!("if condition must be bool, got {condition}"));
        }

        let consequence_ty = self.check_block(consequence);
        let Some(alternative) = alternative else {
            return consequence_ty;
        };
        let alternative_ty = self.check_block(alternative);

        if !consequence.statements.is_empty()
            && !alternative.statements.is_empty()
            && !consequence_ty.matches(&alternative_ty)
        {
            self.error(format!(
                "if-else branches have different types: {consequence_ty} vs {alternative_ty}"
            ));
        }
        if alternative.statements.is_empty() {
            consequence_ty
        } else {
            alternative_ty
        }
    }

    fn check_function(&mut self, func: &FunctionLiteral) -> Type {
        let params: Vec<_> = (0..func.params.len())
            .map(|i| Type::unknown(format!("param{i}")))
            .collect();

        let ret = self.scoped(|this| {
            for (param, ty) in func.params.iter().zip(&params) {
                this.env.set(&param.name, ty.clone());
            }
            // The last top-level `return` decides, then the last statement.
            let mut explicit = None;
            let mut last = void();
            for stmt in &func.body.statements {
                last = this.check_statement(stmt);
                if matches!(stmt, Statement::Return(_)) {
                    explicit = Some(last.clone());
                }
            }
            explicit.unwrap_or(last)
        });

        Type::function(params, ret)
    }

    fn check_call(&mut self, function: &Expression, arguments: &[Expression]) -> Type {
        let is_puts = matches!(function, Expression::Identifier(ident) if ident.name == "puts")
            && self.env.get("puts").is_none();
        if is_puts {
            for arg in arguments {
                self.check_expr(arg);
            }
            return builtins::puts();
        }

        let callee = self.check_expr(function);
        if callee.is_unknown() {
            for arg in arguments {
                self.check_expr(arg);
            }
            return Type::unknown("T");
        }

        let Type::Function { params, ret } = callee else {
            self.error(format!("not a function: {callee}"));
            return error();
        };

        if params.len() != arguments.len() {
            self.error(format!(
                "wrong number of arguments: expected {}, got {}",
                params.len(),
                arguments.len()
            ));
            return *ret;
        }

        for (i, (arg, expected)) in arguments.iter().zip(&params).enumerate() {
            let actual = self.check_expr(arg);
            if !expected.matches(&actual) {
                self.error(format!("argument {i}: expected {expected}, got {actual}"));
            }
        }
        *ret
    }

    fn check_array(&mut self, elements: &[Expression]) -> Type {
        let types: Vec<_> = elements.iter().map(|e| self.check_expr(e)).collect();
        let Some((first, rest)) = types.split_first() else {
            return Type::array(Type::unknown("T"));
        };
        for ty in rest {
            if !first.matches(ty) {
                self.error(format!(
                    "array elements have different types: {first} vs {ty}"
                ));
            }
        }
        Type::array(first.clone())
    }

    /// Runs `f` in a fresh scope enclosed by the current one.
    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.env.scopes.push(HashMap::new());
        let res = f(self);
        self.env.scopes.pop();
        res
    }

    fn error(&mut self, message: String) {
        self.errors.push(message);
    }
}

fn void() -> Type {
    Type::unknown("void")
}

fn error() -> Type {
    Type::unknown("error")
}

#[cfg(test)]
mod tests {
    use crate::util::test_utils::tree_tests;

    tree_tests!(
        use checker;

        fn literals() {
            let src = "1; 2.5; \"s\"; true";
            let tree_ok = "bool";
        }

        fn empty_program() {
            let src = "";
            let tree_ok = "?void";
        }

        fn arithmetic_promotes_to_float() {
            let src = "let a = 1 + 2; let b = a * 1.5; b";
            let tree_ok = "float";
        }

        fn arithmetic_stays_int() {
            let src = "10 % 3 - 4 / 2";
            let tree_ok = "int";
        }

        fn arithmetic_on_strings() {
            let src = "\"a\" + \"b\"";
            let tree_error = "int";
            let expected_errors = &[
                "left operand of + must be numeric, got string",
                "right operand of + must be numeric, got string",
            ];
        }

        fn comparisons() {
            let src = "1 < 2.0; 1 == 1; true != false";
            let tree_ok = "bool";
        }

        fn incomparable_types() {
            let src = "1 == true";
            let tree_error = "bool";
            let expected_errors = &["cannot compare int with bool"];
        }

        fn ordering_non_numbers() {
            let src = "true < \"x\"";
            let expected_errors = &[
                "left operand of < must be numeric, got bool",
                "right operand of < must be numeric, got string",
            ];
        }

        fn logical_operators() {
            let src = "true && 1; 2.0 || false";
            let tree_error = "bool";
            let expected_errors = &[
                "right operand of && must be bool, got int",
                "left operand of || must be bool, got float",
            ];
        }

        fn prefix_operators() {
            let src = "-\"s\"; !1; +true; -2.5";
            let tree_error = "float";
            let expected_errors = &[
                "operand of unary - must be numeric, got string",
                "operand of ! must be bool, got int",
                "operand of unary + must be numeric, got bool",
            ];
        }

        fn if_expression() {
            let src = "if (1 < 2) { 10 } else { 20 }";
            let tree_ok = "int";
        }

        fn if_without_else() {
            let src = "if (true) { \"yes\" }";
            let tree_ok = "string";
        }

        fn if_with_empty_else() {
            let src = "if (true) { 1 } else { }";
            let tree_ok = "int";
        }

        fn if_with_empty_branches() {
            let src = "if (true) { } else { }";
            let tree_ok = "?void";
        }

        fn if_errors() {
            let src = "if (1) { 1 } else { true }";
            let tree_error = "bool";
            let expected_errors = &[
                "if condition must be bool, got int",
                "if-else branches have different types: int vs bool",
            ];
        }

        fn if_branches_are_scoped() {
            let src = "if (true) { let x = 1; x }; x";
            let tree_error = "?error";
            let expected_errors = &["identifier not found: x"];
        }

        fn function_literal() {
            let src = "fn(a, b) { a + b }";
            let tree_ok = "fn(?param0, ?param1) -> int";
        }

        fn function_last_return_wins() {
            let src = "fn() { return \"s\"; return 1; }";
            let tree_ok = "fn() -> int";
        }

        fn function_return_before_trailing_statement() {
            let src = "fn() { return 1; \"unreachable\" }";
            let tree_ok = "fn() -> int";
        }

        fn empty_function() {
            let src = "fn() {}";
            let tree_ok = "fn() -> ?void";
        }

        fn calls() {
            let src = "let add = fn(a, b) { a + b }; add(1, 2)";
            let tree_ok = "int";
        }

        fn wrong_arity() {
            let src = "let id = fn(x) { x }; id(1, 2)";
            let tree_error = "?param0";
            let expected_errors = &["wrong number of arguments: expected 1, got 2"];
        }

        fn not_a_function() {
            let src = "let x = 5; x(1)";
            let tree_error = "?error";
            let expected_errors = &["not a function: int"];
        }

        fn builtin_calls() {
            let src = "len([1, 2]); len(\"abc\"); push([1], 2); first([true])";
            let tree_ok = "?T";
        }

        fn builtin_argument_mismatch() {
            let src = "rest(1)";
            let tree_error = "[?T]";
            let expected_errors = &["argument 0: expected [?T], got int"];
        }

        fn puts_is_variadic() {
            let src = "puts(1, \"a\", true)";
            let tree_ok = "?void";
        }

        fn recursive_functions() {
            let src = "let f = fn(n) { if (n < 1) { 0 } else { f(n - 1) } }; f";
            let tree_ok = "fn(?param0) -> ?T";
        }

        fn unknown_identifier() {
            let src = "y + 1";
            let tree_error = "int";
            let expected_errors = &["identifier not found: y"];
        }

        fn arrays_and_index() {
            let src = "let a = [1, 2, 3]; a[0]";
            let tree_ok = "int";
        }

        fn mixed_array() {
            let src = "[1, true, 2]";
            let tree_error = "[int]";
            let expected_errors = &["array elements have different types: int vs bool"];
        }

        fn hashes() {
            let src = "let h = {\"a\": 1}; h[\"a\"]";
            let tree_ok = "?T";
        }

        fn loops() {
            let src = "
                let n = 0;
                while (n < 3) { let n = n + 1; }
                for (let i = 0; i < 3; i + 1) { if (i == 1) { break; } }
            ";
            let tree_ok = "?void";
        }

        fn loop_bindings_stay_visible() {
            let src = "for (let i = 0; i < 1; i + 1) { let last = true; }; i; last";
            let tree_ok = "bool";
        }
    );
}
