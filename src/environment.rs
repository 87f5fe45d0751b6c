use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::object::Object;

/// A shared handle to an environment.
///
/// Closures keep the environment they were created in alive; the chain is
/// freed once the last handle is dropped. A closure stored in the scope it
/// captured holds that scope weakly (see [`Object::bound_in`]). Cycles
/// through arrays, hashes or a returned closure bound in an outer scope are
/// still reference cycles.
pub type Env = Rc<RefCell<Environment>>;

/// A single lexical scope.
#[derive(Debug, Default)]
pub struct Environment {
    store: HashMap<String, Object>,
    outer: Option<Env>,
}

impl Environment {
    /// Create a new empty environment with no parent.
    pub fn new() -> Env {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// Create a new environment enclosed by `outer`, as done for every call.
    pub fn new_enclosed(outer: &Env) -> Env {
        Rc::new(RefCell::new(Environment {
            store: HashMap::new(),
            outer: Some(Rc::clone(outer)),
        }))
    }

    /// Look up a name, walking outwards through the enclosing environments.
    pub fn get(&self, name: &str) -> Option<Object> {
        if let Some(value) = self.store.get(name) {
            return Some(value.loaded());
        }
        self.outer.as_ref()?.borrow().get(name)
    }

    /// Bind a name in this environment, shadowing any outer binding.
    pub fn set(&mut self, name: impl Into<String>, value: Object) -> Object {
        self.store.insert(name.into(), value.clone());
        value
    }

    /// Whether the name is bound in this environment (ignoring outer ones).
    pub fn has_local(&self, name: &str) -> bool {
        self.store.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn get_walks_outwards() {
        let global = Environment::new();
        global.borrow_mut().set("x", Object::Integer(1));
        let inner = Environment::new_enclosed(&global);
        assert_eq!(inner.borrow().get("x"), Some(Object::Integer(1)));
        assert_eq!(inner.borrow().get("y"), None);
    }

    #[test]
    fn set_binds_innermost() {
        let global = Environment::new();
        global.borrow_mut().set("x", Object::Integer(1));
        let inner = Environment::new_enclosed(&global);
        inner.borrow_mut().set("x", Object::Integer(2));

        assert_eq!(inner.borrow().get("x"), Some(Object::Integer(2)));
        assert_eq!(global.borrow().get("x"), Some(Object::Integer(1)));
        assert!(inner.borrow().has_local("x"));
        assert!(!Environment::new_enclosed(&global).borrow().has_local("x"));
    }
}
