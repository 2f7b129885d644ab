//! Namespaces and variable tables
//!
//! A [`Namespace`] is one scope in a chain: it owns a name → value table
//! and links to its enclosing scope. Lookups walk the chain outward,
//! innermost first. The same structure serves user bindings and
//! method-style dispatch on value kinds (see [`Value::namespace`]).
//!
//! Named namespaces are registered per thread so they can be found again
//! by name. Four of them always exist: the root `global` scope and the
//! `array`, `string` and `number` dispatch namespaces.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;
use indexmap::IndexMap;
use tracing::debug;

use crate::runtime::error::{RtResult, RuntimeError};
use crate::runtime::value::{Array, CFunc, Str, Value};

/// Instances may be created from this namespace.
const NS_INSTANTIABLE: u32 = 1 << 0;

struct NsInner {
    name: Option<Str>,
    prev: Option<Namespace>,
    table: RefCell<IndexMap<Str, Value>>,
    flags: Cell<u32>,
}

/// A shared handle to one scope.
#[derive(Clone)]
pub struct Namespace(Rc<NsInner>);

struct Builtins {
    global: Namespace,
    array: Namespace,
    string: Namespace,
    number: Namespace,
}

impl Builtins {
    fn new() -> Self {
        let global = Namespace::alloc(None, None);
        Self {
            array: Namespace::new(Some(&global), "array"),
            string: Namespace::new(Some(&global), "string"),
            number: Namespace::new(Some(&global), "number"),
            global,
        }
    }
}

thread_local! {
    static REGISTRY: RefCell<HashMap<Str, Namespace>> = RefCell::new(HashMap::new());
    static BUILTINS: Builtins = Builtins::new();
}

/// Root scope of this thread.
pub fn global() -> Namespace {
    BUILTINS.with(|b| b.global.clone())
}

/// Default dispatch namespace for arrays without their own.
pub fn array() -> Namespace {
    BUILTINS.with(|b| b.array.clone())
}

/// Dispatch namespace for strings.
pub fn string() -> Namespace {
    BUILTINS.with(|b| b.string.clone())
}

/// Dispatch namespace for numbers.
pub fn number() -> Namespace {
    BUILTINS.with(|b| b.number.clone())
}

impl Namespace {
    fn alloc(
        prev: Option<&Namespace>,
        name: Option<Str>,
    ) -> Self {
        Namespace(Rc::new(NsInner {
            name,
            prev: prev.cloned(),
            table: RefCell::new(IndexMap::new()),
            flags: Cell::new(0),
        }))
    }

    /// Find the registered namespace `name`, creating and registering it
    /// under `prev` if absent.
    pub fn new(
        prev: Option<&Namespace>,
        name: &str,
    ) -> Self {
        if let Some(ns) = Namespace::find(name) {
            return ns;
        }
        let key = Str::intern(name);
        let ns = Namespace::alloc(prev, Some(key.clone()));
        REGISTRY.with(|r| r.borrow_mut().insert(key, ns.clone()));
        debug!(name, "namespace registered");
        ns
    }

    /// Create a user namespace. Fails if the name is taken.
    pub fn create(
        prev: Option<&Namespace>,
        name: &str,
    ) -> RtResult<Self> {
        if Namespace::find(name).is_some() {
            return Err(RuntimeError::NamespaceExists(name.to_string()));
        }
        Ok(Namespace::new(prev, name))
    }

    /// Anonymous scope nested in `prev`. Not registered.
    pub fn scope(prev: Option<&Namespace>) -> Self {
        Namespace::alloc(prev, None)
    }

    /// Registered namespace with this name.
    pub fn find(name: &str) -> Option<Self> {
        REGISTRY.with(|r| r.borrow().get(name.as_bytes()).cloned())
    }

    pub fn name(&self) -> Option<&Str> {
        self.0.name.as_ref()
    }

    /// Enclosing scope.
    pub fn prev(&self) -> Option<&Namespace> {
        self.0.prev.as_ref()
    }

    /// Bind `name` in this scope. A name can be defined once per scope.
    pub fn define(
        &self,
        name: &str,
        value: Value,
    ) -> RtResult<()> {
        let mut table = self.0.table.borrow_mut();
        if table.contains_key(name.as_bytes()) {
            return Err(RuntimeError::AlreadyDefined(name.to_string()));
        }
        table.insert(Str::intern(name), value);
        Ok(())
    }

    /// Bind a native function.
    pub fn define_func(
        &self,
        name: &str,
        func: CFunc,
    ) -> RtResult<()> {
        self.define(name, Value::from_cfunc(func))
    }

    /// Bind or rebind `name` in this scope.
    pub fn set(
        &self,
        name: &str,
        value: Value,
    ) {
        self.0.table.borrow_mut().insert(Str::intern(name), value);
    }

    /// Value bound to `name` in this scope only.
    pub fn lookup_local(
        &self,
        name: &str,
    ) -> Option<Value> {
        self.0.table.borrow().get(name.as_bytes()).cloned()
    }

    /// Value bound to `name` in this scope or the nearest enclosing one.
    pub fn lookup(
        &self,
        name: &str,
    ) -> Option<Value> {
        let mut ns = Some(self);
        while let Some(scope) = ns {
            if let Some(v) = scope.lookup_local(name) {
                return Some(v);
            }
            ns = scope.prev();
        }
        None
    }

    /// Like [`Namespace::lookup`], failing with `Unbound`.
    pub fn get(
        &self,
        name: &str,
    ) -> RtResult<Value> {
        self.lookup(name)
            .ok_or_else(|| RuntimeError::Unbound(name.to_string()))
    }

    /// Names bound in this scope, in definition order.
    pub fn names(&self) -> Vec<Str> {
        self.0.table.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.table.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.table.borrow().is_empty()
    }

    pub fn mark_instantiable(&self) {
        self.0.flags.set(self.0.flags.get() | NS_INSTANTIABLE);
    }

    pub fn is_instantiable(&self) -> bool {
        self.0.flags.get() & NS_INSTANTIABLE != 0
    }

    /// Build a struct bound to this namespace.
    pub fn instantiate(
        &self,
        headers: Array,
        values: Vec<Value>,
    ) -> RtResult<Value> {
        if !self.is_instantiable() {
            let name = self
                .name()
                .map(|n| n.to_string())
                .unwrap_or_else(|| "<anonymous>".to_string());
            return Err(RuntimeError::NotInstantiable(name));
        }
        let ary = Array::with_namespace(values, self.clone());
        ary.set_headers(headers)?;
        Ok(Value::Struct(ary))
    }

    pub fn ptr_eq(
        &self,
        other: &Namespace,
    ) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Namespace {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "<namespace {}>", name),
            None => write!(f, "<namespace {:p}>", Rc::as_ptr(&self.0)),
        }
    }
}

#[cfg(test)]
mod tests;
