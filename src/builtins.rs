use crate::object::{Builtin, Object, ARRAY};

pub static BUILTINS: phf::Map<&'static str, Builtin> = phf::phf_map! {
    "len" => Builtin { name: "len", func: len },
    "first" => Builtin { name: "first", func: first },
    "last" => Builtin { name: "last", func: last },
    "rest" => Builtin { name: "rest", func: rest },
    "push" => Builtin { name: "push", func: push },
    "puts" => Builtin { name: "puts", func: puts },
    "type" => Builtin { name: "type", func: type_of },
};

pub fn lookup(name: &str) -> Option<Builtin> {
    BUILTINS.get(name).copied()
}

fn error(message: String) -> Object {
    Object::Error(message)
}

fn check_arity(args: &[Object], want: usize) -> Result<(), Object> {
    if args.len() == want {
        Ok(())
    } else {
        Err(error(format!(
            "wrong number of arguments. got={}, want={want}",
            args.len()
        )))
    }
}

/// Extracts the single array argument of `name`.
fn array_arg<'a>(name: &str, args: &'a [Object]) -> Result<&'a [Object], Object> {
    match &args[0] {
        Object::Array(elements) => Ok(elements.as_slice()),
        other => Err(error(format!(
            "argument to `{name}` must be {ARRAY}, got {}",
            other.type_tag()
        ))),
    }
}

fn len(args: &[Object]) -> Object {
    if let Err(e) = check_arity(args, 1) {
        return e;
    }
    let len = match &args[0] {
        Object::Array(elements) => elements.len(),
        Object::String(s) => s.len(),
        other => {
            return error(format!(
                "argument to `len` not supported, got {}",
                other.type_tag()
            ))
        }
    };
    Object::Integer(i64::try_from(len).unwrap_or(i64::MAX))
}

fn first(args: &[Object]) -> Object {
    let elements = match check_arity(args, 1).and_then(|()| array_arg("first", args)) {
        Ok(elements) => elements,
        Err(e) => return e,
    };
    elements.first().cloned().unwrap_or(Object::Null)
}

fn last(args: &[Object]) -> Object {
    let elements = match check_arity(args, 1).and_then(|()| array_arg("last", args)) {
        Ok(elements) => elements,
        Err(e) => return e,
    };
    elements.last().cloned().unwrap_or(Object::Null)
}

fn rest(args: &[Object]) -> Object {
    let elements = match check_arity(args, 1).and_then(|()| array_arg("rest", args)) {
        Ok(elements) => elements,
        Err(e) => return e,
    };
    match elements.split_first() {
        Some((_, tail)) => Object::array(tail.to_vec()),
        None => Object::Null,
    }
}

fn push(args: &[Object]) -> Object {
    let elements = match check_arity(args, 2).and_then(|()| array_arg("push", args)) {
        Ok(elements) => elements,
        Err(e) => return e,
    };
    let mut pushed = Vec::with_capacity(elements.len() + 1);
    pushed.extend_from_slice(elements);
    pushed.push(args[1].clone());
    Object::array(pushed)
}

fn puts(args: &[Object]) -> Object {
    for arg in args {
        println!("{arg}");
    }
    Object::Null
}

fn type_of(args: &[Object]) -> Object {
    if let Err(e) = check_arity(args, 1) {
        return e;
    }
    Object::string(args[0].type_tag())
}
