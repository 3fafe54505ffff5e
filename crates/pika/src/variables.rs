//! Variable spaces: the symbol and native bindings a frame works on.

use std::rc::Rc;

use indexmap::IndexMap;
use std::collections::BTreeMap;

use crate::native::Native;
use crate::value::Value;

/// The interface a [`crate::Frame`] uses to read and write its bindings.
///
/// A variable space associates symbols with [`Value`]s and identifiers with
/// natives. Natives are exclusively owned by their space: reassigning or
/// clearing an identifier drops the previous native, and dropping the space
/// drops them all.
///
/// Implementations other than [`MapVariables`] are useful for optimization
/// and integration needs (shared globals, test doubles); the frame only
/// relies on this contract.
pub trait Variables {
    /// Looks up `symbol`, returning its value if bound.
    fn lookup(&self, symbol: &str) -> Option<Value>;

    /// Assigns `value` to `symbol`. Returning false signals "cannot modify"
    /// and makes the calling frame fail the assignment.
    fn assign(&mut self, symbol: &str, value: Value) -> bool;

    /// Erases `symbol`. True if it existed and was removed.
    fn erase(&mut self, symbol: &str) -> bool;

    /// Pushes every `(symbol, value)` pair whose symbol begins with `prefix`
    /// onto `out`. Order is unspecified; `out` is not cleared first.
    fn list(&self, prefix: &str, out: &mut Vec<(String, Value)>);

    /// Looks up the native registered under `identifier`.
    fn lookup_native(&self, identifier: &str) -> Option<Rc<dyn Native>>;

    /// Registers `native` under `identifier`, dropping any prior
    /// registration. `None` unregisters. Returning false signals refusal.
    fn assign_native(&mut self, identifier: &str, native: Option<Rc<dyn Native>>) -> bool;
}

/// The standard variable space.
///
/// Symbols live in an ordered map so that [`Variables::list`] is a
/// lower-bound scan; natives live in an insertion-ordered map of their own.
#[derive(Default)]
pub struct MapVariables {
    vars: BTreeMap<String, Value>,
    natives: IndexMap<String, Rc<dyn Native>>,
}

impl MapVariables {
    /// Creates an empty space.
    pub fn new() -> MapVariables {
        MapVariables::default()
    }
}

impl Variables for MapVariables {
    fn lookup(&self, symbol: &str) -> Option<Value> {
        self.vars.get(symbol).cloned()
    }

    fn assign(&mut self, symbol: &str, value: Value) -> bool {
        self.vars.insert(symbol.to_string(), value);
        true
    }

    fn erase(&mut self, symbol: &str) -> bool {
        self.vars.remove(symbol).is_some()
    }

    fn list(&self, prefix: &str, out: &mut Vec<(String, Value)>) {
        for (symbol, value) in self.vars.range(prefix.to_string()..) {
            if !symbol.starts_with(prefix) {
                break;
            }
            out.push((symbol.clone(), value.clone()));
        }
    }

    fn lookup_native(&self, identifier: &str) -> Option<Rc<dyn Native>> {
        self.natives.get(identifier).cloned()
    }

    fn assign_native(&mut self, identifier: &str, native: Option<Rc<dyn Native>>) -> bool {
        match native {
            Some(native) => {
                self.natives.insert(identifier.to_string(), native);
            }
            None => {
                self.natives.shift_remove(identifier);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native;

    #[test]
    fn test_lookup_assign_erase() {
        let mut vars = MapVariables::new();
        assert_eq!(vars.lookup("x"), None);
        assert!(vars.assign("x", Value::from(1i64)));
        assert_eq!(vars.lookup("x"), Some(Value::from(1i64)));
        assert!(vars.assign("x", Value::from(2i64)));
        assert_eq!(vars.lookup("x"), Some(Value::from(2i64)));
        assert!(vars.erase("x"));
        assert!(!vars.erase("x"));
        assert_eq!(vars.lookup("x"), None);
    }

    #[test]
    fn test_list_prefix_scan() {
        let mut vars = MapVariables::new();
        vars.assign("c.a", Value::from(1i64));
        vars.assign("c.b", Value::from(2i64));
        vars.assign("ca", Value::from(3i64));
        vars.assign("b", Value::from(4i64));

        let mut out = Vec::new();
        vars.list("c.", &mut out);
        let mut names: Vec<&str> = out.iter().map(|(n, _)| n.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["c.a", "c.b"]);

        let mut all = Vec::new();
        vars.list("", &mut all);
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_native_ownership() {
        let mut vars = MapVariables::new();
        assert!(vars.lookup_native("f").is_none());
        assert!(vars.assign_native("f", Some(Rc::new(native::nullary(|| 1i64)))));
        assert!(vars.lookup_native("f").is_some());
        // Reassigning replaces the previous native.
        assert!(vars.assign_native("f", Some(Rc::new(native::nullary(|| 2i64)))));
        assert!(vars.lookup_native("f").is_some());
        // Unregistering drops it.
        assert!(vars.assign_native("f", None));
        assert!(vars.lookup_native("f").is_none());
    }
}
