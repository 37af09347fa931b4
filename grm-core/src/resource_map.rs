//! Name-keyed store owning evaluated rules and function definitions.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::ast;
use crate::value::Value;

/// What a store entry can hold.
#[derive(Debug, Clone)]
pub enum Resource {
    Value(Arc<Value>),
    Function(Arc<ast::Function>),
}

impl Resource {
    fn kind_name(&self) -> &'static str {
        match self {
            Resource::Value(_) => <Value as Storable>::NAME,
            Resource::Function(_) => <ast::Function as Storable>::NAME,
        }
    }
}

/// A type with its own [`Resource`] variant.
pub trait Storable: Sized {
    const NAME: &'static str;

    fn into_resource(this: Arc<Self>) -> Resource;
    fn from_resource(resource: &Resource) -> Option<Arc<Self>>;
}

impl Storable for Value {
    const NAME: &'static str = "value";

    fn into_resource(this: Arc<Self>) -> Resource {
        Resource::Value(this)
    }

    fn from_resource(resource: &Resource) -> Option<Arc<Self>> {
        match resource {
            Resource::Value(value) => Some(Arc::clone(value)),
            Resource::Function(_) => None,
        }
    }
}

impl Storable for ast::Function {
    const NAME: &'static str = "function";

    fn into_resource(this: Arc<Self>) -> Resource {
        Resource::Function(this)
    }

    fn from_resource(resource: &Resource) -> Option<Arc<Self>> {
        match resource {
            Resource::Function(function) => Some(Arc::clone(function)),
            Resource::Value(_) => None,
        }
    }
}

/// Every operation takes the single lock. Handles returned by
/// [`ResourceMap::get`] stay valid after the entry is replaced or erased.
///
/// Retrieving an entry as the wrong type is a contract violation and
/// panics.
#[derive(Debug, Default)]
pub struct ResourceMap {
    entries: Mutex<HashMap<String, Resource>>,
}

impl ResourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `name`, dropping any previous entry. Returns
    /// `true` when the name was not present before.
    pub fn insert<T: Storable>(&self, name: impl Into<String>, value: T) -> bool {
        self.insert_shared(name, Arc::new(value))
    }

    pub fn insert_shared<T: Storable>(&self, name: impl Into<String>, value: Arc<T>) -> bool {
        self.entries
            .lock()
            .insert(name.into(), T::into_resource(value))
            .is_none()
    }

    /// # Panics
    ///
    /// Panics when `name` holds a different type.
    pub fn get<T: Storable>(&self, name: &str) -> Option<Arc<T>> {
        let entries = self.entries.lock();
        let resource = entries.get(name)?;
        match T::from_resource(resource) {
            Some(value) => Some(value),
            None => panic!(
                "resource '{name}' holds a {}, not a {}",
                resource.kind_name(),
                T::NAME
            ),
        }
    }

    pub fn erase(&self, name: &str) -> bool {
        self.entries.lock().remove(name).is_some()
    }

    /// Removes the entry and hands its value to the caller, cloning only
    /// if another handle is still alive.
    ///
    /// # Panics
    ///
    /// Panics when `name` holds a different type.
    pub fn release<T: Storable + Clone>(&self, name: &str) -> Option<T> {
        let mut entries = self.entries.lock();
        let resource = entries.remove(name)?;
        match T::from_resource(&resource) {
            Some(value) => {
                drop(resource);
                Some(Arc::unwrap_or_clone(value))
            }
            None => panic!(
                "resource '{name}' holds a {}, not a {}",
                resource.kind_name(),
                T::NAME
            ),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.lock().contains_key(name)
    }

    pub fn contains_of_type<T: Storable>(&self, name: &str) -> bool {
        self.entries
            .lock()
            .get(name)
            .is_some_and(|resource| T::from_resource(resource).is_some())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
