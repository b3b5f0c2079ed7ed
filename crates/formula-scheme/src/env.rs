//! Scoped storage of lazy definitions and memoized values.
//!
//! Every [`Environment`] is a cheap handle to a shared scope. A scope resolves a name from, in order:
//!
//! 1. its value slots,
//! 2. its definitions, forced in a throwaway child scope and then memoized here,
//! 3. its parent chain,
//!
//! and fails with [`SchemeError::UnresolvedSymbol`] when no ancestor knows the name.
//!
//! A child registers a weak listener reference with its parent when it is created. Changing a
//! definition clears the whole value cache of that scope and of every live descendant. Writing a
//! value (`add`, `update`, `assign`) drops what lookups memoized there and below, but keeps the
//! values other writes bound, such as the parameters of a running procedure call. Hosts that
//! redefine formulas keep their parameters in an ancestor of the scope holding the definitions.
//!
//! A procedure stored in the scope it closes over refers back to it weakly, so the scope and the
//! procedure do not keep each other alive.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::config::EvalOptions;
use crate::error::{SchemeError, SchemeResult};
use crate::eval;
use crate::expr::Expr;
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotKind {
    Bound,
    Derived,
}

#[derive(Clone, Debug)]
struct Slot {
    value: Value,
    kind: SlotKind,
}

/// How much of a value cache an invalidation drops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Invalidation {
    /// Every slot, bound or derived.
    Everything,
    /// Only slots memoized by lookups.
    Derived,
}

/// State shared by a whole scope tree.
#[derive(Debug)]
struct Shared {
    options: EvalOptions,
    depth: Cell<usize>,
}

struct Scope {
    parent: Option<Environment>,
    definitions: RefCell<HashMap<String, Expr>>,
    values: RefCell<HashMap<String, Slot>>,
    listeners: RefCell<Vec<Weak<Scope>>>,
    /// Bumped on every invalidation; a lookup only memoizes if it did not change meanwhile.
    generation: Cell<u64>,
    shared: Rc<Shared>,
}

/// A handle to one scope. Cloning the handle shares the scope.
///
/// Not thread-safe: the scope graph uses `Rc`/`RefCell` and must stay on one thread.
#[derive(Clone)]
pub struct Environment {
    scope: Rc<Scope>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// A root scope with default [`EvalOptions`].
    pub fn new() -> Self {
        Self::with_options(EvalOptions::default())
    }

    pub fn with_options(options: EvalOptions) -> Self {
        let shared = Rc::new(Shared {
            options,
            depth: Cell::new(0),
        });
        Self::from_scope(Scope::new(None, shared, HashMap::new()))
    }

    /// A new scope whose parent is `self`.
    pub fn child(&self) -> Self {
        self.child_with_values(std::iter::empty::<(String, Value)>())
    }

    /// A new child scope with `values` bound from the start.
    pub fn child_with_values<S: Into<String>>(
        &self,
        values: impl IntoIterator<Item = (S, Value)>,
    ) -> Self {
        let values = values
            .into_iter()
            .map(|(name, value)| {
                (
                    name.into(),
                    Slot {
                        value,
                        kind: SlotKind::Bound,
                    },
                )
            })
            .collect();
        let child = Self::from_scope(Scope::new(
            Some(self.clone()),
            Rc::clone(&self.scope.shared),
            values,
        ));
        self.add_listener(&child);
        child
    }

    fn from_scope(scope: Scope) -> Self {
        Self {
            scope: Rc::new(scope),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakEnvironment {
        WeakEnvironment {
            scope: Rc::downgrade(&self.scope),
        }
    }

    /// Whether both handles refer to the same scope.
    pub(crate) fn same_scope(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.scope, &other.scope)
    }

    pub fn parent(&self) -> Option<&Environment> {
        self.scope.parent.as_ref()
    }

    fn add_listener(&self, child: &Environment) {
        let mut listeners = self.scope.listeners.borrow_mut();
        listeners.retain(|listener| listener.strong_count() > 0);
        listeners.push(Rc::downgrade(&child.scope));
    }

    /// Number of live child scopes that receive invalidations from this one.
    pub fn listener_count(&self) -> usize {
        self.scope
            .listeners
            .borrow()
            .iter()
            .filter(|listener| listener.strong_count() > 0)
            .count()
    }

    /// Evaluate `expr` in a fresh child scope, so temporary bindings never land here.
    pub fn evaluate(&self, expr: &Expr) -> SchemeResult<Value> {
        eval::eval(expr, &self.child())
    }

    /// Resolve `name`, memoizing the result in this scope.
    pub fn lookup(&self, name: &str) -> SchemeResult<Value> {
        let cached = self
            .scope
            .values
            .borrow()
            .get(name)
            .map(|slot| slot.value.clone());
        if let Some(value) = cached {
            log::trace!("cache hit for {name}");
            return Ok(value.attach());
        }

        let generation = self.scope.generation.get();
        let definition = self.scope.definitions.borrow().get(name).cloned();
        let value = match (definition, &self.scope.parent) {
            (Some(expr), _) => {
                log::trace!("forcing definition of {name}: {expr}");
                let scratch = self.child();
                let value = eval::eval(&expr, &scratch)?;
                if scratch.holds_only_derived() {
                    value.recapture(&scratch, self)
                } else {
                    value
                }
            }
            (None, Some(parent)) => parent.lookup(name)?,
            (None, None) => return Err(SchemeError::UnresolvedSymbol(name.to_string())),
        };

        if self.scope.generation.get() == generation {
            self.store(name.to_string(), value.clone(), SlotKind::Derived);
        }
        Ok(value)
    }

    /// `set!`: overwrite the nearest value slot for `name`, starting at this scope.
    ///
    /// A scope where `name` is also a definition is skipped. A name that so far exists only as a
    /// definition that was never read has no value slot, so assigning it fails with
    /// [`SchemeError::InvalidAssignment`].
    pub fn assign(&self, name: &str, value: Value) -> SchemeResult<()> {
        let assignable = self.scope.values.borrow().contains_key(name)
            && !self.scope.definitions.borrow().contains_key(name);
        if assignable {
            log::debug!("assigning {name}");
            // The slot keeps its kind: a memoized copy of an ancestor's value stays derived.
            let kind = self
                .scope
                .values
                .borrow()
                .get(name)
                .map_or(SlotKind::Bound, |slot| slot.kind);
            self.invalidate(Invalidation::Derived);
            self.store(name.to_string(), value, kind);
            return Ok(());
        }
        match &self.scope.parent {
            Some(parent) => parent.assign(name, value),
            None => Err(SchemeError::InvalidAssignment(name.to_string())),
        }
    }

    /// Bind `name` to `value` in this scope, bypassing definitions.
    pub fn add(&self, name: impl Into<String>, value: Value) {
        self.invalidate(Invalidation::Derived);
        self.store(name.into(), value, SlotKind::Bound);
    }

    /// Bind many values at once, e.g. a batch of resolved parameters.
    pub fn update<S: Into<String>>(&self, values: impl IntoIterator<Item = (S, Value)>) {
        self.invalidate(Invalidation::Derived);
        for (name, value) in values {
            self.store(name.into(), value, SlotKind::Bound);
        }
    }

    /// Install or replace the lazy definition of `name`.
    ///
    /// Clears the entire value cache of this scope and of every live descendant.
    pub fn define(&self, name: impl Into<String>, expr: Expr) -> &Self {
        let name = name.into();
        log::debug!("defining {name} := {expr}");
        self.scope.definitions.borrow_mut().insert(name, expr);
        self.invalidate(Invalidation::Everything);
        self
    }

    /// True if `name` would resolve through this scope.
    pub fn contains(&self, name: &str) -> bool {
        self.scope.values.borrow().contains_key(name)
            || self.scope.definitions.borrow().contains_key(name)
            || self
                .scope
                .parent
                .as_ref()
                .is_some_and(|parent| parent.contains(name))
    }

    /// The unevaluated definition of `name` in this scope, if any.
    pub fn definition(&self, name: &str) -> Option<Expr> {
        self.scope.definitions.borrow().get(name).cloned()
    }

    /// Whether this scope currently holds a value slot (bound or memoized) for `name`.
    pub fn has_local_value(&self, name: &str) -> bool {
        self.scope.values.borrow().contains_key(name)
    }

    fn store(&self, name: String, value: Value, kind: SlotKind) {
        let value = value.detach_from(self);
        self.scope
            .values
            .borrow_mut()
            .insert(name, Slot { value, kind });
    }

    /// True while nothing but memoized lookups live here.
    fn holds_only_derived(&self) -> bool {
        self.scope.definitions.borrow().is_empty()
            && self
                .scope
                .values
                .borrow()
                .values()
                .all(|slot| slot.kind == SlotKind::Derived)
    }

    fn invalidate(&self, reach: Invalidation) {
        let mut pending = vec![Rc::clone(&self.scope)];
        let mut notified = 0usize;
        while let Some(scope) = pending.pop() {
            // Released before the listeners are read, so scopes they kept alive are pruned.
            drop(scope.clear(reach));
            let mut listeners = scope.listeners.borrow_mut();
            let before = listeners.len();
            listeners.retain(|listener| match listener.upgrade() {
                Some(child) => {
                    pending.push(child);
                    true
                }
                None => false,
            });
            if listeners.len() < before {
                log::trace!("pruned {} dead listener(s)", before - listeners.len());
            }
            notified += listeners.len();
        }
        log::debug!("invalidation ({reach:?}) reached {notified} descendant scope(s)");
    }

    /// Track one more level of evaluation nesting for this scope tree.
    pub(crate) fn enter(&self) -> SchemeResult<DepthGuard> {
        let shared = &self.scope.shared;
        let depth = shared.depth.get();
        if depth >= shared.options.max_depth {
            return Err(SchemeError::DepthLimit {
                limit: shared.options.max_depth,
            });
        }
        shared.depth.set(depth + 1);
        Ok(DepthGuard {
            shared: Rc::clone(shared),
        })
    }
}

pub(crate) struct DepthGuard {
    shared: Rc<Shared>,
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        let depth = self.shared.depth.get();
        self.shared.depth.set(depth.saturating_sub(1));
    }
}

impl Scope {
    fn new(
        parent: Option<Environment>,
        shared: Rc<Shared>,
        values: HashMap<String, Slot>,
    ) -> Self {
        Self {
            parent,
            definitions: RefCell::new(HashMap::new()),
            values: RefCell::new(values),
            listeners: RefCell::new(Vec::new()),
            generation: Cell::new(0),
            shared,
        }
    }

    /// Empty the cache according to `reach`, handing back what was removed.
    fn clear(&self, reach: Invalidation) -> Vec<Slot> {
        self.generation.set(self.generation.get().wrapping_add(1));
        let mut values = self.values.borrow_mut();
        match reach {
            Invalidation::Everything => values.drain().map(|(_, slot)| slot).collect(),
            Invalidation::Derived => {
                let (derived, bound): (HashMap<_, _>, HashMap<_, _>) = values
                    .drain()
                    .partition(|(_, slot)| slot.kind == SlotKind::Derived);
                *values = bound;
                derived.into_values().collect()
            }
        }
    }
}

/// A handle that does not keep its scope alive.
#[derive(Clone)]
pub(crate) struct WeakEnvironment {
    scope: Weak<Scope>,
}

impl WeakEnvironment {
    pub(crate) fn upgrade(&self) -> Option<Environment> {
        self.scope.upgrade().map(|scope| Environment { scope })
    }

    pub(crate) fn points_to(&self, env: &Environment) -> bool {
        std::ptr::eq(self.scope.as_ptr(), Rc::as_ptr(&env.scope))
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut definitions: Vec<String> =
            self.scope.definitions.borrow().keys().cloned().collect();
        definitions.sort();
        let mut values: Vec<String> = self.scope.values.borrow().keys().cloned().collect();
        values.sort();
        f.debug_struct("Environment")
            .field("definitions", &definitions)
            .field("values", &values)
            .field("has_parent", &self.scope.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resolves_through_parent_chain_and_memoizes_locally() {
        let root = Environment::new();
        root.add("a", Value::from(3));
        let child = root.child();

        assert!(!child.has_local_value("a"));
        assert_eq!(child.lookup("a").unwrap(), Value::from(3));
        assert!(child.has_local_value("a"));
    }

    #[test]
    fn unknown_symbol_fails_at_root() {
        let root = Environment::new();
        let child = root.child();
        assert_eq!(
            child.lookup("nope").unwrap_err(),
            SchemeError::UnresolvedSymbol("nope".into())
        );
        assert!(!child.contains("nope"));
    }

    #[test]
    fn dead_children_are_pruned_from_listeners() {
        let root = Environment::new();
        let kept = root.child();
        for _ in 0..10 {
            let _ = root.child();
        }
        assert_eq!(root.listener_count(), 1);
        drop(kept);
        assert_eq!(root.listener_count(), 0);
        // Broadcasting with only dead listeners is fine.
        root.define("x", Expr::from(1));
    }

    #[test]
    fn redefinition_clears_every_cached_value_below() {
        let root = Environment::new();
        root.define("x", Expr::from(1));
        let child = root.child_with_values([("param", Value::from(7))]);
        assert_eq!(child.lookup("x").unwrap(), Value::from(1));

        root.define("x", Expr::from(2));
        assert!(!child.has_local_value("x"));
        assert!(!child.has_local_value("param"));
        assert_eq!(child.lookup("x").unwrap(), Value::from(2));
    }

    #[test]
    fn value_writes_drop_only_memoized_slots() {
        let root = Environment::new();
        root.add("a", Value::from(1));
        let child = root.child_with_values([("param", Value::from(7))]);
        assert_eq!(child.lookup("a").unwrap(), Value::from(1));

        root.add("a", Value::from(2));
        assert!(!child.has_local_value("a"));
        assert!(child.has_local_value("param"));
        assert_eq!(child.lookup("a").unwrap(), Value::from(2));
    }

    #[test]
    fn assigned_copy_of_ancestor_value_yields_to_redefinition() {
        let root = Environment::new();
        root.define("y", Expr::from(1));
        let child = root.child();
        assert_eq!(child.lookup("y").unwrap(), Value::from(1));

        child.assign("y", Value::from(5)).unwrap();
        assert_eq!(child.lookup("y").unwrap(), Value::from(5));

        root.define("y", Expr::from(10));
        assert_eq!(child.lookup("y").unwrap(), Value::from(10));
    }

    #[test]
    fn procedure_stored_in_its_own_scope_does_not_keep_it_alive() {
        let root = Environment::new();
        let scope = root.child();
        let procedure = Value::Procedure(crate::value::Procedure::new(
            vec!["x".into()],
            Expr::symbol("x"),
            &scope,
        ));
        scope.add("f", procedure.clone());
        assert_eq!(scope.lookup("f").unwrap(), procedure);

        drop(scope);
        assert_eq!(root.listener_count(), 1, "the outside copy still holds the scope");
        drop(procedure);
        assert_eq!(root.listener_count(), 0);
    }

    #[test]
    fn depth_guard_unwinds() {
        let env = Environment::with_options(EvalOptions::default().with_max_depth(2));
        {
            let _a = env.enter().unwrap();
            let _b = env.enter().unwrap();
            assert_eq!(
                env.enter().err(),
                Some(SchemeError::DepthLimit { limit: 2 })
            );
        }
        assert!(env.enter().is_ok());
    }
}
