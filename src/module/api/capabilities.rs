//! Capability registry (`core`)
//!
//! Named services that modules install for one another. The kernel clears
//! the whole registry at the start of every full load pass so nothing from
//! a previous code generation lingers.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::module::api::store::SharedTable;

/// Shared table of named functions/services
#[derive(Clone, Default)]
pub struct Capabilities {
    table: SharedTable,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a capability, replacing any previous one with the same name
    pub fn install<T: Any + Send + Sync>(&self, name: &str, service: T) {
        if self.table.insert(name, service).is_some() {
            debug!("Capability {} replaced", name);
        }
    }

    /// Install an already shared capability
    pub fn install_arc<T: Any + Send + Sync>(&self, name: &str, service: Arc<T>) {
        if self.table.insert_arc(name, service).is_some() {
            debug!("Capability {} replaced", name);
        }
    }

    /// Look up a capability by name and concrete type
    ///
    /// Returns `None` when the name is absent or installed with another type.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.table.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains(name)
    }

    pub fn remove(&self, name: &str) -> bool {
        self.table.remove(name)
    }

    /// Installed capability names, sorted
    pub fn names(&self) -> Vec<String> {
        self.table.names()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn clear(&self) {
        self.table.clear();
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities").field("names", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Greeter = Arc<dyn Fn(&str) -> String + Send + Sync>;

    #[test]
    fn test_install_and_call_function_capability() {
        let core = Capabilities::new();
        let greet: Greeter = Arc::new(|who| format!("hello {}", who));
        core.install("greet", greet);

        let greet = core.get::<Greeter>("greet").unwrap();
        assert_eq!(greet("lobby"), "hello lobby");
    }

    #[test]
    fn test_wrong_type_is_none() {
        let core = Capabilities::new();
        core.install("limit", 5u32);
        assert!(core.get::<String>("limit").is_none());
        assert_eq!(*core.get::<u32>("limit").unwrap(), 5);
    }

    #[test]
    fn test_clear_is_shared_between_handles() {
        let core = Capabilities::new();
        let other = core.clone();
        core.install("a", 1u8);
        core.install("b", 2u8);
        assert_eq!(other.names(), vec!["a".to_string(), "b".to_string()]);

        other.clear();
        assert!(core.is_empty());
    }
}
