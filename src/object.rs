use std::{
    cell::RefCell,
    collections::HashMap,
    fmt,
    rc::{Rc, Weak},
};

use crate::{
    ast::{BlockStatement, Identifier},
    environment::{Env, Environment},
};

pub const INTEGER: &str = "INTEGER";
pub const FLOAT: &str = "FLOAT";
pub const BOOLEAN: &str = "BOOLEAN";
pub const STRING: &str = "STRING";
pub const NULL: &str = "NULL";
pub const RETURN_VALUE: &str = "RETURN_VALUE";
pub const ERROR: &str = "ERROR";
pub const FUNCTION: &str = "FUNCTION";
pub const BUILTIN: &str = "BUILTIN";
pub const ARRAY: &str = "ARRAY";
pub const HASH: &str = "HASH";

pub const TRUE: Object = Object::Boolean(true);
pub const FALSE: Object = Object::Boolean(false);

/// A runtime value.
///
/// Compound values are reference counted; cloning an object never copies an
/// array, hash or closure.
#[derive(Clone, Debug)]
pub enum Object {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(Rc<str>),
    Null,
    ReturnValue(Box<Object>),
    Error(String),
    Function(Rc<Function>),
    Builtin(Builtin),
    Array(Rc<Vec<Object>>),
    Hash(Rc<HashObject>),
}

impl Object {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Object::Integer(_) => INTEGER,
            Object::Float(_) => FLOAT,
            Object::Boolean(_) => BOOLEAN,
            Object::String(_) => STRING,
            Object::Null => NULL,
            Object::ReturnValue(_) => RETURN_VALUE,
            Object::Error(_) => ERROR,
            Object::Function(_) => FUNCTION,
            Object::Builtin(_) => BUILTIN,
            Object::Array(_) => ARRAY,
            Object::Hash(_) => HASH,
        }
    }

    /// The user-facing rendering of the value.
    pub fn inspect(&self) -> String {
        self.to_string()
    }

    pub fn from_bool(value: bool) -> Object {
        if value {
            TRUE
        } else {
            FALSE
        }
    }

    pub fn string(value: impl Into<Rc<str>>) -> Object {
        Object::String(value.into())
    }

    pub fn array(elements: Vec<Object>) -> Object {
        Object::Array(Rc::new(elements))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Object::Error(_))
    }

    /// Only `false` and `null` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Boolean(false) | Object::Null)
    }

    /// Identity comparison, used by `==` and `!=` on values without a
    /// structural equality.
    pub fn is_same(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Boolean(a), Object::Boolean(b)) => a == b,
            (Object::Null, Object::Null) => true,
            (Object::Function(a), Object::Function(b)) => a.is_same(b),
            (Object::Builtin(a), Object::Builtin(b)) => a.name == b.name,
            (Object::Array(a), Object::Array(b)) => Rc::ptr_eq(a, b),
            (Object::Hash(a), Object::Hash(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The value to store when binding it in `env`.
    ///
    /// A closure that captured `env` itself holds it weakly once stored there,
    /// so the binding does not keep its own scope alive.
    pub fn bound_in(&self, env: &Env) -> Object {
        match self {
            Object::Function(func) if func.captures(env) => Object::Function(Rc::new(Function {
                params: Rc::clone(&func.params),
                body: Rc::clone(&func.body),
                env: Captured::Weak(Rc::downgrade(env)),
            })),
            other => other.clone(),
        }
    }

    /// The value as handed out of an environment: a weakly bound closure
    /// gets a strong handle again, so it may outlive the scope it was read
    /// from.
    pub fn loaded(&self) -> Object {
        match self {
            Object::Function(func) => match &func.env {
                Captured::Weak(env) => match env.upgrade() {
                    Some(env) => Object::Function(Rc::new(Function {
                        params: Rc::clone(&func.params),
                        body: Rc::clone(&func.body),
                        env: Captured::Strong(env),
                    })),
                    None => self.clone(),
                },
                Captured::Strong(_) => self.clone(),
            },
            other => other.clone(),
        }
    }

    /// Returns the key used to store this value in a hash, if it is hashable.
    pub fn hash_key(&self) -> Option<HashKey> {
        let key = match self {
            Object::Integer(value) => HashKey {
                tag: INTEGER,
                value: u64::from_ne_bytes(value.to_ne_bytes()),
            },
            Object::Boolean(value) => HashKey {
                tag: BOOLEAN,
                value: u64::from(*value),
            },
            Object::String(value) => HashKey {
                tag: STRING,
                value: fnv1a(value.as_bytes()),
            },
            _ => return None,
        };
        Some(key)
    }
}

impl PartialEq for Object {
    /// Structural equality for scalars and containers, identity for
    /// closures.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Integer(a), Object::Integer(b)) => a == b,
            (Object::Float(a), Object::Float(b)) => a == b,
            (Object::String(a), Object::String(b)) => a == b,
            (Object::ReturnValue(a), Object::ReturnValue(b)) => a == b,
            (Object::Error(a), Object::Error(b)) => a == b,
            (Object::Array(a), Object::Array(b)) => a == b,
            (Object::Hash(a), Object::Hash(b)) => a.pairs == b.pairs,
            _ => self.is_same(other),
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Integer(value) => write!(f, "{value}"),
            Object::Float(value) => fmt_float(f, *value),
            Object::Boolean(value) => write!(f, "{value}"),
            Object::String(value) => f.write_str(value),
            Object::Null => f.write_str("null"),
            Object::ReturnValue(value) => write!(f, "{value}"),
            Object::Error(message) => write!(f, "ERROR: {message}"),
            Object::Function(func) => {
                let params: Vec<_> = func.params.iter().map(|p| p.name.as_str()).collect();
                write!(f, "fn({}) {{\n{}\n}}", params.join(", "), func.body)
            }
            Object::Builtin(_) => f.write_str("builtin function"),
            Object::Array(elements) => {
                f.write_str("[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str("]")
            }
            Object::Hash(hash) => {
                f.write_str("{")?;
                for (i, (key, value)) in hash.pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

/// A user-defined closure.
pub struct Function {
    pub params: Rc<[Identifier]>,
    pub body: Rc<BlockStatement>,
    pub env: Captured,
}

/// The environment a closure was created in.
pub enum Captured {
    Strong(Env),
    /// Only held by the binding stored in that same environment.
    Weak(Weak<RefCell<Environment>>),
}

impl Function {
    pub fn new(params: Rc<[Identifier]>, body: Rc<BlockStatement>, env: &Env) -> Function {
        Function {
            params,
            body,
            env: Captured::Strong(Rc::clone(env)),
        }
    }

    /// The captured environment, if it is still alive.
    pub fn env(&self) -> Option<Env> {
        match &self.env {
            Captured::Strong(env) => Some(Rc::clone(env)),
            Captured::Weak(env) => env.upgrade(),
        }
    }

    fn env_ptr(&self) -> *const RefCell<Environment> {
        match &self.env {
            Captured::Strong(env) => Rc::as_ptr(env),
            Captured::Weak(env) => env.as_ptr(),
        }
    }

    fn captures(&self, env: &Env) -> bool {
        std::ptr::eq(self.env_ptr(), Rc::as_ptr(env))
    }

    /// The same literal closed over the same environment.
    pub fn is_same(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.body, &other.body) && std::ptr::eq(self.env_ptr(), other.env_ptr())
    }
}

impl fmt::Debug for Function {
    // The captured environment may contain the function itself.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<_> = self.params.iter().map(|p| p.name.as_str()).collect();
        write!(f, "Function({params:?})")
    }
}

pub type BuiltinFn = fn(&[Object]) -> Object;

#[derive(Copy, Clone)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct HashKey {
    pub tag: &'static str,
    pub value: u64,
}

/// An insertion-ordered hash.
#[derive(Clone, Debug, Default)]
pub struct HashObject {
    pairs: Vec<(Object, Object)>,
    index: HashMap<HashKey, usize>,
}

impl HashObject {
    /// Inserts the pair, replacing the value of an existing equal key.
    pub fn insert(&mut self, key: HashKey, key_object: Object, value: Object) {
        match self.index.get(&key) {
            Some(&i) => self.pairs[i].1 = value,
            None => {
                self.index.insert(key, self.pairs.len());
                self.pairs.push((key_object, value));
            }
        }
    }

    pub fn get(&self, key: &HashKey) -> Option<&Object> {
        self.index.get(key).map(|&i| &self.pairs[i].1)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Formats a float like `%g`: the shortest digits that round-trip, in
/// exponent form when the exponent is below -4 or at least 6.
fn fmt_float(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.is_nan() {
        return f.write_str("NaN");
    }
    if value.is_infinite() {
        return f.write_str(if value > 0.0 { "+Inf" } else { "-Inf" });
    }
    let scientific = format!("{value:e}");
    let (mantissa, exp) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    if (-4..6).contains(&exp) {
        return write!(f, "{value}");
    }
    let sign = if exp < 0 { '-' } else { '+' };
    write!(f, "{mantissa}e{sign}{:02}", exp.unsigned_abs())
}

/// 64-bit FNV-1a.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    bytes.iter().fold(OFFSET_BASIS, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn inspect_forms() {
        let hash = {
            let mut h = HashObject::default();
            let key = Object::string("a");
            h.insert(key.hash_key().unwrap(), key, Object::Integer(1));
            Object::Hash(Rc::new(h))
        };
        let cases = [
            (Object::Integer(-7), "-7"),
            (Object::Float(8.0), "8"),
            (Object::Float(1.5), "1.5"),
            (Object::Float(123_456.0), "123456"),
            (Object::Float(1e21), "1e+21"),
            (Object::Float(1_234_567.0), "1.234567e+06"),
            (Object::Float(0.0001), "0.0001"),
            (Object::Float(0.000_012_5), "1.25e-05"),
            (Object::Float(-2.5e-7), "-2.5e-07"),
            (Object::Float(f64::INFINITY), "+Inf"),
            (Object::Float(f64::NAN), "NaN"),
            (TRUE, "true"),
            (Object::string("hi"), "hi"),
            (Object::Null, "null"),
            (Object::Error("boom".into()), "ERROR: boom"),
            (
                Object::array(vec![Object::Integer(1), Object::string("x")]),
                "[1, x]",
            ),
            (hash, "{a: 1}"),
        ];
        for (object, expected) in cases {
            assert_eq!(object.inspect(), expected);
        }
    }

    #[test]
    fn type_tags() {
        assert_eq!(Object::Integer(1).type_tag(), "INTEGER");
        assert_eq!(Object::Float(1.0).type_tag(), "FLOAT");
        assert_eq!(Object::Null.type_tag(), "NULL");
        assert_eq!(Object::array(vec![]).type_tag(), "ARRAY");
        assert_eq!(
            Object::ReturnValue(Box::new(Object::Null)).type_tag(),
            "RETURN_VALUE"
        );
    }

    #[test]
    fn string_hash_keys_are_structural() {
        let a = Object::string("Hello World");
        let b = Object::string("Hello World");
        let c = Object::string("My name is johnny");
        assert_eq!(a.hash_key(), b.hash_key());
        assert_ne!(a.hash_key(), c.hash_key());
        assert_ne!(Object::Integer(1).hash_key(), TRUE.hash_key());
        assert_eq!(Object::Float(1.0).hash_key(), None);
    }

    #[test]
    fn fnv1a_reference_values() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn truthiness() {
        assert!(!FALSE.is_truthy());
        assert!(!Object::Null.is_truthy());
        assert!(Object::Integer(0).is_truthy());
        assert!(Object::string("").is_truthy());
    }

    #[test]
    fn hash_insert_replaces_existing_key() {
        let mut h = HashObject::default();
        let key = Object::Integer(1);
        let hk = key.hash_key().unwrap();
        h.insert(hk, key.clone(), Object::Integer(10));
        h.insert(hk, key, Object::Integer(20));
        assert_eq!(h.len(), 1);
        assert_eq!(h.get(&hk), Some(&Object::Integer(20)));
    }
}
