//! Method name → terminal handler.

use std::collections::HashMap;
use std::sync::Arc;

use crate::rpc::handler::Handler;

/// Error type for method registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A handler is already registered under this name.
    #[error("method `{0}` is already registered")]
    Duplicate(String),
    /// Method names must not be empty.
    #[error("method name must not be empty")]
    EmptyName,
}

/// Registered terminal handlers, keyed by full method name
/// (e.g. `/greeter.Greeter/SayHello`).
///
/// Registering the same name twice is an error; the first registration is
/// kept.
#[derive(Default, Clone)]
pub struct MethodRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl MethodRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `method`.
    ///
    /// Fails on an empty name or a name that is already registered.
    pub fn register(
        &mut self,
        method: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> Result<(), RegistryError> {
        let method = method.into();
        if method.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.handlers.contains_key(&method) {
            return Err(RegistryError::Duplicate(method));
        }
        tracing::debug!(method = %method, "Registered method");
        self.handlers.insert(method, handler);
        Ok(())
    }

    /// Get the handler registered for `method`.
    pub fn get(&self, method: &str) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(method)
    }

    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn Handler>)> {
        self.handlers.iter()
    }
}

impl std::fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.methods())
            .finish()
    }
}
