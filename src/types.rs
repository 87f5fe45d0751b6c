use std::fmt;

/// A static type.
///
/// `Unknown` types are placeholders for what can't be inferred, such as
/// function parameters. They render as `?name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Int,
    Float,
    String,
    Bool,
    Function { params: Vec<Type>, ret: Box<Type> },
    Array(Box<Type>),
    Unknown(String),
}

impl Type {
    pub fn unknown(name: impl Into<String>) -> Type {
        Type::Unknown(name.into())
    }

    pub fn function(params: Vec<Type>, ret: Type) -> Type {
        Type::Function {
            params,
            ret: Box::new(ret),
        }
    }

    pub fn array(elem: Type) -> Type {
        Type::Array(Box::new(elem))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    /// Whether two types are compatible, treating `Unknown` as a wildcard at
    /// any depth.
    pub fn matches(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Unknown(_), _) | (_, Type::Unknown(_)) => true,
            (Type::Array(a), Type::Array(b)) => a.matches(b),
            (
                Type::Function { params: pa, ret: ra },
                Type::Function { params: pb, ret: rb },
            ) => {
                pa.len() == pb.len()
                    && pa.iter().zip(pb).all(|(a, b)| a.matches(b))
                    && ra.matches(rb)
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => f.write_str("int"),
            Type::Float => f.write_str("float"),
            Type::String => f.write_str("string"),
            Type::Bool => f.write_str("bool"),
            Type::Function { params, ret } => {
                f.write_str("fn(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ") -> {ret}")
            }
            Type::Array(elem) => write!(f, "[{elem}]"),
            Type::Unknown(name) => write!(f, "?{name}"),
        }
    }
}

pub mod builtins {
    use super::Type;

    /// Signatures of the builtin functions that the checker knows about.
    ///
    /// `puts` is absent: it takes any number of arguments of any type and is
    /// handled by the checker directly.
    pub fn signatures() -> [(&'static str, Type); 6] {
        let t = || Type::unknown("T");
        [
            // Strings are accepted too.
            ("len", Type::function(vec![t()], Type::Int)),
            ("first", Type::function(vec![Type::array(t())], t())),
            ("last", Type::function(vec![Type::array(t())], t())),
            (
                "rest",
                Type::function(vec![Type::array(t())], Type::array(t())),
            ),
            (
                "push",
                Type::function(vec![Type::array(t()), t()], Type::array(t())),
            ),
            ("type", Type::function(vec![t()], Type::String)),
        ]
    }

    /// The result type of `puts`.
    pub fn puts() -> Type {
        Type::unknown("void")
    }
}
