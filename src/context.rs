//! Data Context (DC) and Context Stack (CS): the binding scopes `$data`,
//! `$root`, and `$index` are resolved against while walking a template.
//!
//! `DataContext` is kept small and `Clone`-cheap (it borrows nothing); the
//! stack is an explicit `Vec`, not hidden in the call stack, so the
//! visitor can push and pop it directly as it descends and ascends the
//! tree.

use serde_json::Value;

use crate::error::ExpandError;
use crate::expr::{self, MemoryView, Options};

/// One binding scope: the currently bound JSON token, the root value shared
/// by the whole expansion call, and — when this scope was produced by
/// array fan-out — the element index.
#[derive(Debug, Clone)]
pub struct DataContext {
    token: Value,
    root: Value,
    is_array: bool,
    index: Option<usize>,
}

impl DataContext {
    /// Parses `json_text` and binds it as the root context. Fails with
    /// [`ExpandError::MalformedData`] if it isn't valid JSON — this is the
    /// one JSON-parse failure in the whole evaluator that is *not*
    /// swallowed, since there is no enclosing scope left to fall back to.
    pub fn new_root(json_text: &str, root: Value) -> Result<Self, ExpandError> {
        let token: Value = serde_json::from_str(json_text)?;
        Ok(Self::from_value(token, root))
    }

    /// Binds an already-materialized value directly, without going through
    /// JSON text (the `new_from_expression` case where EE returned a
    /// non-string value).
    pub fn from_value(token: Value, root: Value) -> Self {
        let is_array = token.is_array();
        Self {
            token,
            root,
            is_array,
            index: None,
        }
    }

    pub fn token(&self) -> &Value {
        &self.token
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn is_array(&self) -> bool {
        self.is_array
    }

    /// Number of fan-out iterations this context implies, when array-kind.
    pub fn array_len(&self) -> usize {
        self.token.as_array().map_or(0, |a| a.len())
    }

    /// Requires `self.is_array()`. `i` must be in bounds — the caller
    /// (the visitor) always derives it from `array_len()`.
    pub fn derive_at_index(&self, i: usize) -> DataContext {
        debug_assert!(self.is_array, "derive_at_index requires an array-kind context");
        let item = self
            .token
            .as_array()
            .and_then(|a| a.get(i))
            .cloned()
            .unwrap_or(Value::Null);
        let is_array = item.is_array();
        DataContext {
            token: item,
            root: self.root.clone(),
            is_array,
            index: Some(i),
        }
    }

    /// Evaluates `expr_src` (the `$data` pair's value text) against `self`'s
    /// memory and attempts to derive a child context from the result.
    /// Returns `None` on any failure — expression parse error, evaluation
    /// error, or (for a string result) JSON parse error — so the caller
    /// keeps using the parent context unchanged.
    pub fn new_from_expression(&self, expr_src: &str, opts: &Options) -> Option<DataContext> {
        let expr = expr::parse(expr_src).ok()?;
        let mem = self.memory();
        let value = expr::evaluate(&expr, &mem, opts).ok()?;
        match value {
            Value::String(s) => DataContext::new_root(&s, self.root.clone()).ok(),
            other => Some(DataContext::from_value(other, self.root.clone())),
        }
    }

    pub fn memory(&self) -> Memory {
        Memory {
            data: self.token.clone(),
            root: self.root.clone(),
            index: self.index.map(|i| Value::Number(i.into())),
        }
    }
}

/// The `MemoryView` backing a single [`DataContext`]: `$data`, `$root`, and
/// (only for fan-out-derived contexts) `$index`.
pub struct Memory {
    data: Value,
    root: Value,
    index: Option<Value>,
}

impl MemoryView for Memory {
    fn get(&self, key: &str) -> Option<&Value> {
        match key {
            "$data" => Some(&self.data),
            "$root" => Some(&self.root),
            "$index" => self.index.as_ref(),
            _ => None,
        }
    }
}

/// A LIFO stack of [`DataContext`]. The top is the active scope consulted
/// by the visitor and by expression evaluation.
#[derive(Debug, Default)]
pub struct ContextStack {
    stack: Vec<DataContext>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    pub fn push(&mut self, dc: DataContext) {
        self.stack.push(dc);
    }

    pub fn pop(&mut self) -> Option<DataContext> {
        self.stack.pop()
    }

    pub fn peek(&self) -> Option<&DataContext> {
        self.stack.last()
    }

    pub fn has_context(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

/// Scoped-acquisition guard for `ContextStack::push`/`pop`: every push made
/// while entering a node is balanced by a pop on *every* exit path from
/// that node, including the internal error-swallowing ones. Build one with
/// [`ScopeGuard::push`] (or
/// [`ScopeGuard::none`] when the node didn't push anything) and let it drop
/// at the end of the node's visit.
pub struct ScopeGuard<'a> {
    stack: &'a mut ContextStack,
    pushed: bool,
}

impl<'a> ScopeGuard<'a> {
    pub fn push(stack: &'a mut ContextStack, dc: DataContext) -> Self {
        stack.push(dc);
        Self { stack, pushed: true }
    }

    pub fn none(stack: &'a mut ContextStack) -> Self {
        Self {
            stack,
            pushed: false,
        }
    }

    pub fn stack(&self) -> &ContextStack {
        self.stack
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if self.pushed {
            self.stack.pop();
        }
    }
}
