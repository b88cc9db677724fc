// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation metadata and callback dispatch.
//!
//! An operation is the unit a workflow node instantiates: named ports, an
//! initial state, a strategy reference, and a set of callbacks registered
//! by name at definition time. The wire only ever carries operation
//! *names*; every runtime in a cluster runs the same binary and resolves
//! names through its [`OperationRegistry`].

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::DefinitionError;
use crate::Value;

/// Declared properties of a callback, used by strategies to skip state
/// reads or emission handling when a callback does neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackInfo {
    pub read: bool,
    pub write: bool,
    pub emit: bool,
    pub arity: usize,
}

impl CallbackInfo {
    /// A callback that only looks at its arguments.
    pub fn pure(arity: usize) -> Self {
        Self { read: false, write: false, emit: false, arity }
    }

    /// A callback that reads and writes state.
    pub fn stateful(arity: usize) -> Self {
        Self { read: true, write: true, emit: false, arity }
    }

    /// A callback that emits on its out-ports.
    pub fn emitting(arity: usize) -> Self {
        Self { read: false, write: false, emit: true, arity }
    }

    pub fn with_read(mut self) -> Self {
        self.read = true;
        self
    }

    pub fn with_write(mut self) -> Self {
        self.write = true;
        self
    }

    pub fn with_emit(mut self) -> Self {
        self.emit = true;
        self
    }
}

/// Out-port name → ordered values produced by a callback.
pub type EmitMap = IndexMap<String, Vec<Value>>;

/// The outcome of a callback: replacement state, emissions, and an
/// optional direct result for the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackResult {
    pub state: Value,
    pub emit: EmitMap,
    pub result: Option<Value>,
}

impl CallbackResult {
    /// A result that leaves state untouched and emits nothing.
    pub fn unchanged(state: Value) -> Self {
        Self { state, emit: EmitMap::new(), result: None }
    }

    pub fn with_emit(mut self, port: impl Into<String>, values: Vec<Value>) -> Self {
        self.emit.insert(port.into(), values);
        self
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }
}

/// Callback implementation: `(state, config, args) -> CallbackResult`.
///
/// Plain function pointers keep operations `Clone` and registerable from
/// static definitions; a panicking callback kills only the worker that
/// invoked it.
pub type CallbackFn = fn(Value, &Value, &[Value]) -> CallbackResult;

/// A named callback with its declared info.
#[derive(Clone)]
pub struct Callback {
    pub info: CallbackInfo,
    pub func: CallbackFn,
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").field("info", &self.info).finish_non_exhaustive()
    }
}

/// A reactive unit with ports, callbacks and a strategy reference.
///
/// Port lists are immutable after construction; indices follow the
/// declaration order and are the addresses link tables use.
#[derive(Debug, Clone)]
pub struct Operation {
    name: String,
    in_ports: Vec<String>,
    out_ports: Vec<String>,
    strategy: String,
    initial_state: Value,
    callbacks: IndexMap<String, Callback>,
}

impl Operation {
    pub fn builder(name: impl Into<String>) -> OperationBuilder {
        OperationBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn in_ports(&self) -> &[String] {
        &self.in_ports
    }

    pub fn out_ports(&self) -> &[String] {
        &self.out_ports
    }

    /// Name of the strategy driving this operation's workers.
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn initial_state(&self) -> Value {
        self.initial_state.clone()
    }

    pub fn in_port_index(&self, port: &str) -> Option<usize> {
        self.in_ports.iter().position(|p| p == port)
    }

    pub fn out_port_index(&self, port: &str) -> Option<usize> {
        self.out_ports.iter().position(|p| p == port)
    }

    /// The registered callbacks as `(name, arity)` pairs.
    pub fn callbacks(&self) -> Vec<(String, usize)> {
        self.callbacks.iter().map(|(name, cb)| (name.clone(), cb.info.arity)).collect()
    }

    pub fn callback_info(&self, name: &str) -> Option<CallbackInfo> {
        self.callbacks.get(name).map(|cb| cb.info)
    }

    /// Invoke a callback by name.
    ///
    /// Unknown names and arity mismatches are definition errors; a failure
    /// *inside* the callback is a panic that kills the calling worker.
    pub fn call(
        &self,
        name: &str,
        state: Value,
        config: &Value,
        args: &[Value],
    ) -> Result<CallbackResult, DefinitionError> {
        let cb = self.callbacks.get(name).ok_or_else(|| DefinitionError::UnknownCallback {
            operation: self.name.clone(),
            callback: name.to_string(),
        })?;
        if args.len() != cb.info.arity {
            return Err(DefinitionError::BadArity {
                callback: name.to_string(),
                expected: cb.info.arity,
                got: args.len(),
            });
        }
        Ok((cb.func)(state, config, args))
    }
}

/// Builder for [`Operation`].
pub struct OperationBuilder {
    name: String,
    in_ports: Vec<String>,
    out_ports: Vec<String>,
    strategy: String,
    initial_state: Value,
    callbacks: IndexMap<String, Callback>,
}

impl OperationBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            in_ports: Vec::new(),
            out_ports: Vec::new(),
            strategy: String::new(),
            initial_state: json!(null),
            callbacks: IndexMap::new(),
        }
    }

    pub fn in_port(mut self, port: impl Into<String>) -> Self {
        self.in_ports.push(port.into());
        self
    }

    pub fn out_port(mut self, port: impl Into<String>) -> Self {
        self.out_ports.push(port.into());
        self
    }

    pub fn strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = strategy.into();
        self
    }

    pub fn initial_state(mut self, state: Value) -> Self {
        self.initial_state = state;
        self
    }

    pub fn callback(
        mut self,
        name: impl Into<String>,
        info: CallbackInfo,
        func: CallbackFn,
    ) -> Self {
        self.callbacks.insert(name.into(), Callback { info, func });
        self
    }

    pub fn build(self) -> Result<Operation, DefinitionError> {
        for ports in [&self.in_ports, &self.out_ports] {
            for (i, port) in ports.iter().enumerate() {
                if ports[..i].contains(port) {
                    return Err(DefinitionError::DuplicatePort(port.clone()));
                }
            }
        }
        Ok(Operation {
            name: self.name,
            in_ports: self.in_ports,
            out_ports: self.out_ports,
            strategy: self.strategy,
            initial_state: self.initial_state,
            callbacks: self.callbacks,
        })
    }
}

/// Process-wide table of operations, keyed by name.
///
/// Registered once at startup; workflows and the wire refer to operations
/// by name only.
#[derive(Debug, Default, Clone)]
pub struct OperationRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<Operation>>>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation under its name. Re-registering a name
    /// replaces the previous definition.
    pub fn register(&self, operation: Operation) -> Arc<Operation> {
        let operation = Arc::new(operation);
        self.inner.write().insert(operation.name().to_string(), Arc::clone(&operation));
        operation
    }

    pub fn get(&self, name: &str) -> Result<Arc<Operation>, DefinitionError> {
        self.inner
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DefinitionError::UnknownOperation(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().contains_key(name)
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
