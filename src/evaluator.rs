use std::rc::Rc;

use crate::{
    ast::{
        BlockStatement, Expression, FunctionLiteral, InfixOperator, PrefixOperator, Program,
        Statement,
    },
    builtins,
    control_flow::{BREAK_OUTSIDE_LOOP, CONTINUE_OUTSIDE_LOOP},
    environment::{Env, Environment},
    object::{Function, HashObject, Object},
};

/// A node of any kind, as accepted by [`eval`].
#[derive(Copy, Clone, Debug)]
pub enum Node<'a> {
    Program(&'a Program),
    Statement(&'a Statement),
    Block(&'a BlockStatement),
    Expression(&'a Expression),
}

/// Why evaluation stopped before producing a value.
#[derive(Debug)]
enum Unwind {
    Return(Object),
    Fault(String),
    Break,
    Continue,
}

type Flow<T = Object> = Result<T, Unwind>;

/// Evaluates the program, unwrapping a top-level `return`.
pub fn eval_program(program: &Program, env: &Env) -> Object {
    match eval_statements(&program.statements, env) {
        Ok(value) | Err(Unwind::Return(value)) => value,
        Err(unwind) => settle(Err(unwind)),
    }
}

/// Evaluates any node.
///
/// A `return` that escapes the node is reported as [`Object::ReturnValue`],
/// and a fault as [`Object::Error`].
pub fn eval(node: Node<'_>, env: &Env) -> Object {
    let result = match node {
        Node::Program(program) => return eval_program(program, env),
        Node::Statement(stmt) => eval_statement(stmt, env),
        Node::Block(block) => eval_block(block, env),
        Node::Expression(expr) => eval_expr(expr, env),
    };
    settle(result)
}

fn settle(result: Flow) -> Object {
    match result {
        Ok(value) => value,
        Err(Unwind::Return(value)) => Object::ReturnValue(Box::new(value)),
        Err(Unwind::Fault(message)) => Object::Error(message),
        Err(Unwind::Break) => Object::Error(BREAK_OUTSIDE_LOOP.into()),
        Err(Unwind::Continue) => Object::Error(CONTINUE_OUTSIDE_LOOP.into()),
    }
}

fn fault<T>(message: String) -> Flow<T> {
    Err(Unwind::Fault(message))
}

/// Turns an in-band error produced by a builtin into an unwind.
fn lift(object: Object) -> Flow {
    match object {
        Object::Error(message) => fault(message),
        other => Ok(other),
    }
}

/// Evaluates statements in order, yielding the value of the last one.
fn eval_statements(statements: &[Statement], env: &Env) -> Flow {
    let mut result = Object::Null;
    for stmt in statements {
        result = eval_statement(stmt, env)?;
    }
    Ok(result)
}

/// Blocks are evaluated in the environment they appear in.
fn eval_block(block: &BlockStatement, env: &Env) -> Flow {
    eval_statements(&block.statements, env)
}

fn eval_statement(stmt: &Statement, env: &Env) -> Flow {
    match stmt {
        Statement::Let { name, value } => {
            let value = eval_opt(value.as_ref(), env)?;
            let stored = value.bound_in(env);
            env.borrow_mut().set(name.name.as_str(), stored);
            Ok(value)
        }
        Statement::Return(value) => {
            let value = eval_opt(value.as_ref(), env)?;
            Err(Unwind::Return(value))
        }
        Statement::Expression(expr) => eval_opt(expr.as_ref(), env),
        Statement::Block(block) => eval_block(block, env),
        Statement::While { condition, body } => {
            while eval_expr(condition, env)?.is_truthy() {
                if run_iteration(body, env)?.is_break() {
                    break;
                }
            }
            Ok(Object::Null)
        }
        Statement::For {
            init,
            condition,
            update,
            body,
        } => {
            if let Some(init) = init {
                eval_statement(init, env)?;
            }
            loop {
                if let Some(condition) = condition {
                    if !eval_expr(condition, env)?.is_truthy() {
                        break;
                    }
                }
                if run_iteration(body, env)?.is_break() {
                    break;
                }
                if let Some(update) = update {
                    eval_expr(update, env)?;
                }
            }
            Ok(Object::Null)
        }
        Statement::Break => Err(Unwind::Break),
        Statement::Continue => Err(Unwind::Continue),
    }
}

#[derive(PartialEq)]
enum Iteration {
    Next,
    Break,
}

impl Iteration {
    fn is_break(&self) -> bool {
        *self == Iteration::Break
    }
}

/// Runs a loop body, absorbing `break` and `continue`.
fn run_iteration(body: &BlockStatement, env: &Env) -> Flow<Iteration> {
    match eval_block(body, env) {
        Ok(_) | Err(Unwind::Continue) => Ok(Iteration::Next),
        Err(Unwind::Break) => Ok(Iteration::Break),
        Err(unwind) => Err(unwind),
    }
}

fn eval_opt(expr: Option<&Expression>, env: &Env) -> Flow {
    match expr {
        Some(expr) => eval_expr(expr, env),
        None => Ok(Object::Null),
    }
}

fn eval_expr(expr: &Expression, env: &Env) -> Flow {
    match expr {
        Expression::Identifier(ident) => eval_identifier(&ident.name, env),
        Expression::Integer(value) => Ok(Object::Integer(*value)),
        Expression::Float { value, .. } => Ok(Object::Float(*value)),
        Expression::String(value) => Ok(Object::string(value.as_str())),
        Expression::Boolean(value) => Ok(Object::from_bool(*value)),
        Expression::Prefix { op, right } => {
            let right = eval_expr(right, env)?;
            eval_prefix(*op, &right)
        }
        Expression::Infix {
            left,
            op: op @ (InfixOperator::And | InfixOperator::Or),
            right,
        } => {
            let left = eval_expr(left, env)?.is_truthy();
            let value = match op {
                InfixOperator::And if !left => false,
                InfixOperator::Or if left => true,
                _ => eval_expr(right, env)?.is_truthy(),
            };
            Ok(Object::from_bool(value))
        }
        Expression::Infix { left, op, right } => {
            let left = eval_expr(left, env)?;
            let right = eval_expr(right, env)?;
            eval_infix(*op, &left, &right)
        }
        Expression::If {
            condition,
            consequence,
            alternative,
        } => {
            if eval_expr(condition, env)?.is_truthy() {
                eval_block(consequence, env)
            } else if let Some(alternative) = alternative {
                eval_block(alternative, env)
            } else {
                Ok(Object::Null)
            }
        }
        Expression::Function(FunctionLiteral { params, body }) => Ok(Object::Function(
            Rc::new(Function::new(Rc::clone(params), Rc::clone(body), env)),
        )),
        Expression::Call {
            function,
            arguments,
        } => {
            let function = eval_expr(function, env)?;
            let args = eval_exprs(arguments, env)?;
            apply_function(&function, args)
        }
        Expression::Array(elements) => Ok(Object::array(eval_exprs(elements, env)?)),
        Expression::Hash(pairs) => {
            let mut hash = HashObject::default();
            for (key_expr, value_expr) in pairs {
                let key = eval_expr(key_expr, env)?;
                let Some(hash_key) = key.hash_key() else {
                    return fault(format!("unusable as hash key: {}", key.type_tag()));
                };
                let value = eval_expr(value_expr, env)?;
                hash.insert(hash_key, key, value);
            }
            Ok(Object::Hash(Rc::new(hash)))
        }
        Expression::Index { left, index } => {
            let left = eval_expr(left, env)?;
            let index = eval_expr(index, env)?;
            eval_index(&left, &index)
        }
    }
}

fn eval_exprs(exprs: &[Expression], env: &Env) -> Flow<Vec<Object>> {
    exprs.iter().map(|e| eval_expr(e, env)).collect()
}

fn eval_identifier(name: &str, env: &Env) -> Flow {
    if let Some(value) = env.borrow().get(name) {
        return Ok(value);
    }
    if let Some(builtin) = builtins::lookup(name) {
        return Ok(Object::Builtin(builtin));
    }
    fault(format!("identifier not found: {name}"))
}

fn eval_prefix(op: PrefixOperator, right: &Object) -> Flow {
    let value = match (op, right) {
        (PrefixOperator::Not, right) => Object::from_bool(!right.is_truthy()),
        (PrefixOperator::Neg, Object::Integer(value)) => Object::Integer(value.wrapping_neg()),
        (PrefixOperator::Neg, Object::Float(value)) => Object::Float(-value),
        (PrefixOperator::Plus, value @ (Object::Integer(_) | Object::Float(_))) => value.clone(),
        (op, right) => return fault(format!("unknown operator: {op}{}", right.type_tag())),
    };
    Ok(value)
}

#[expect(clippy::cast_precision_loss)]
fn eval_infix(op: InfixOperator, left: &Object, right: &Object) -> Flow {
    match (left, right) {
        (Object::Integer(l), Object::Integer(r)) => eval_integer_infix(op, *l, *r),
        (Object::Float(l), Object::Float(r)) => eval_float_infix(op, *l, *r),
        (Object::Integer(l), Object::Float(r)) => eval_float_infix(op, *l as f64, *r),
        (Object::Float(l), Object::Integer(r)) => eval_float_infix(op, *l, *r as f64),
        (Object::String(l), Object::String(r)) => match op {
            InfixOperator::Add => Ok(Object::string(format!("{l}{r}"))),
            InfixOperator::Eq => Ok(Object::from_bool(l == r)),
            InfixOperator::NotEq => Ok(Object::from_bool(l != r)),
            _ => unknown_infix(op, left, right),
        },
        _ => match op {
            InfixOperator::Eq => Ok(Object::from_bool(left.is_same(right))),
            InfixOperator::NotEq => Ok(Object::from_bool(!left.is_same(right))),
            _ => unknown_infix(op, left, right),
        },
    }
}

fn unknown_infix(op: InfixOperator, left: &Object, right: &Object) -> Flow {
    fault(format!(
        "unknown operator: {} {op} {}",
        left.type_tag(),
        right.type_tag()
    ))
}

fn eval_integer_infix(op: InfixOperator, l: i64, r: i64) -> Flow {
    use InfixOperator::*;
    let value = match op {
        Add => Object::Integer(l.wrapping_add(r)),
        Sub => Object::Integer(l.wrapping_sub(r)),
        Mul => Object::Integer(l.wrapping_mul(r)),
        Div if r == 0 => return fault("division by zero".into()),
        Div => Object::Integer(l.wrapping_div(r)),
        Mod if r == 0 => return fault("modulo by zero".into()),
        Mod => Object::Integer(l.wrapping_rem(r)),
        Lt => Object::from_bool(l < r),
        Gt => Object::from_bool(l > r),
        LtEq => Object::from_bool(l <= r),
        GtEq => Object::from_bool(l >= r),
        Eq => Object::from_bool(l == r),
        NotEq => Object::from_bool(l != r),
        And | Or => return fault(format!("unknown operator: {op}")),
    };
    Ok(value)
}

#[allow(clippy::float_cmp)]
fn eval_float_infix(op: InfixOperator, l: f64, r: f64) -> Flow {
    use InfixOperator::*;
    let value = match op {
        Add => Object::Float(l + r),
        Sub => Object::Float(l - r),
        Mul => Object::Float(l * r),
        Div if r == 0.0 => return fault("division by zero".into()),
        Div => Object::Float(l / r),
        Mod if r == 0.0 => return fault("modulo by zero".into()),
        Mod => Object::Float(l % r),
        Lt => Object::from_bool(l < r),
        Gt => Object::from_bool(l > r),
        LtEq => Object::from_bool(l <= r),
        GtEq => Object::from_bool(l >= r),
        Eq => Object::from_bool(l == r),
        NotEq => Object::from_bool(l != r),
        And | Or => return fault(format!("unknown operator: {op}")),
    };
    Ok(value)
}

fn eval_index(left: &Object, index: &Object) -> Flow {
    match (left, index) {
        (Object::Array(elements), Object::Integer(i)) => Ok(usize::try_from(*i)
            .ok()
            .and_then(|i| elements.get(i))
            .cloned()
            .unwrap_or(Object::Null)),
        (Object::Hash(hash), key) => {
            let Some(hash_key) = key.hash_key() else {
                return fault(format!("unusable as hash key: {}", key.type_tag()));
            };
            Ok(hash.get(&hash_key).cloned().unwrap_or(Object::Null))
        }
        _ => fault(format!(
            "index operator not supported: {}",
            left.type_tag()
        )),
    }
}

#[tracing::instrument(level = "trace", skip_all, fields(args = args.len()))]
fn apply_function(function: &Object, args: Vec<Object>) -> Flow {
    match function {
        Object::Function(func) => {
            if args.len() != func.params.len() {
                return fault(format!(
                    "wrong number of arguments: want={}, got={}",
                    func.params.len(),
                    args.len()
                ));
            }
            let Some(captured) = func.env() else {
                return fault("closure environment is gone".into());
            };
            let call_env = Environment::new_enclosed(&captured);
            {
                let mut scope = call_env.borrow_mut();
                for (param, arg) in func.params.iter().zip(args) {
                    scope.set(param.name.as_str(), arg);
                }
            }
            match eval_block(&func.body, &call_env) {
                Ok(value) | Err(Unwind::Return(value)) => Ok(value),
                Err(Unwind::Break) => fault(BREAK_OUTSIDE_LOOP.into()),
                Err(Unwind::Continue) => fault(CONTINUE_OUTSIDE_LOOP.into()),
                Err(other) => Err(other),
            }
        }
        Object::Builtin(builtin) => lift((builtin.func)(&args)),
        other => fault(format!("not a function: {}", other.type_tag())),
    }
}
