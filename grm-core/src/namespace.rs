//! Scopes of one compilation.
//!
//! A [`Namespace`] stands for one grammar file. Imported files become
//! child namespaces under their alias. All namespaces of a compilation
//! share one global [`ResourceMap`], where a rule `r` of file `f` is
//! stored as `f/r`. Function calls push local scopes that shadow the
//! global store for unqualified names.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ast::Identifier;
use crate::error::CoreError;
use crate::resource_map::{ResourceMap, Storable};

const UNKNOWN_FILE: &str = "<unknown file>";

#[derive(Debug)]
pub struct Namespace {
    filename: String,
    resources: Arc<ResourceMap>,
    children: BTreeMap<String, Namespace>,
    locals: Vec<ResourceMap>,
    top_level: bool,
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

impl Namespace {
    /// A root namespace owning a fresh global store.
    pub fn new() -> Self {
        Self::with_resources(String::new(), Arc::new(ResourceMap::new()))
    }

    fn with_resources(filename: String, resources: Arc<ResourceMap>) -> Self {
        Namespace {
            filename,
            resources,
            children: BTreeMap::new(),
            locals: Vec::new(),
            top_level: false,
        }
    }

    pub fn filename(&self) -> &str {
        if self.filename.is_empty() {
            UNKNOWN_FILE
        } else {
            &self.filename
        }
    }

    pub fn set_filename(&mut self, filename: impl Into<String>) {
        self.filename = filename.into();
    }

    pub fn set_top_level(&mut self) {
        self.top_level = true;
    }

    pub fn is_top_level(&self) -> bool {
        self.top_level
    }

    pub fn resources(&self) -> &Arc<ResourceMap> {
        &self.resources
    }

    /// Creates the namespace of an imported file. Reusing an alias within
    /// one file is fatal.
    pub fn add_child(&mut self, filename: &str, alias: &str) -> Result<&mut Namespace, CoreError> {
        let child = Namespace::with_resources(filename.to_string(), Arc::clone(&self.resources));
        self.adopt_child(alias, child)
    }

    /// Attaches an already evaluated namespace under `alias`.
    pub fn adopt_child(&mut self, alias: &str, child: Namespace) -> Result<&mut Namespace, CoreError> {
        use std::collections::btree_map::Entry;
        let file = self.filename().to_string();
        match self.children.entry(alias.to_string()) {
            Entry::Occupied(_) => Err(CoreError::DuplicateAlias {
                alias: alias.to_string(),
                file,
            }),
            Entry::Vacant(slot) => Ok(slot.insert(child)),
        }
    }

    pub fn child(&self, alias: &str) -> Option<&Namespace> {
        self.children.get(alias)
    }

    /// Same file, same store and the same alias tree, without local
    /// scopes. Used when a file is imported a second time.
    pub fn clone_skeleton(&self) -> Namespace {
        Namespace {
            filename: self.filename.clone(),
            resources: Arc::clone(&self.resources),
            children: self
                .children
                .iter()
                .map(|(alias, child)| (alias.clone(), child.clone_skeleton()))
                .collect(),
            locals: Vec::new(),
            top_level: false,
        }
    }

    pub fn push_local(&mut self) {
        self.locals.push(ResourceMap::new());
    }

    pub fn pop_local(&mut self) {
        self.locals.pop();
    }

    /// Number of active local scopes, i.e. the call depth inside this
    /// file.
    pub fn local_depth(&self) -> usize {
        self.locals.len()
    }

    /// Walks the alias chain of `identifier`, returning the namespace
    /// that owns its final component.
    pub fn resolve(&self, identifier: &Identifier) -> Option<&Namespace> {
        identifier
            .namespaces()
            .iter()
            .try_fold(self, |ns, alias| ns.children.get(alias))
    }

    pub fn resolve_mut(&mut self, identifier: &Identifier) -> Option<&mut Namespace> {
        identifier
            .namespaces()
            .iter()
            .try_fold(self, |ns, alias| ns.children.get_mut(alias))
    }

    /// Global key of `name` in this file.
    pub fn map_name(&self, name: &str) -> String {
        format!("{}/{}", self.filename(), name)
    }

    /// Binds `name` in the innermost local scope, or globally when no
    /// call is active. Returns `true` for a fresh binding.
    pub fn insert<T: Storable>(&self, name: &str, value: T) -> bool {
        match self.locals.last() {
            Some(local) => local.insert(name, value),
            None => self.resources.insert(self.map_name(name), value),
        }
    }

    pub fn insert_global<T: Storable>(&self, name: &str, value: T) -> bool {
        self.resources.insert(self.map_name(name), value)
    }

    /// Whether `name` is already bound where [`Namespace::insert`] would
    /// bind it.
    pub fn defines(&self, name: &str) -> bool {
        match self.locals.last() {
            Some(local) => local.contains(name),
            None => self.resources.contains(&self.map_name(name)),
        }
    }

    pub fn erase_local(&self, name: &str) -> bool {
        self.locals.last().is_some_and(|local| local.erase(name))
    }

    /// Whether `identifier` names an entry of type `T`, resolving it the
    /// same way as [`Namespace::get`].
    pub fn holds<T: Storable>(&self, identifier: &Identifier) -> bool {
        if !identifier.is_namespaced() {
            if let Some(local) = self.locals.last().filter(|local| local.contains(identifier.name())) {
                return local.contains_of_type::<T>(identifier.name());
            }
        }
        self.resolve(identifier)
            .is_some_and(|owner| self.resources.contains_of_type::<T>(&owner.map_name(identifier.name())))
    }

    /// Unqualified names look in the innermost local scope first, then in
    /// this file's globals. Dotted names go through the alias chain to the
    /// owning file's globals.
    pub fn get<T: Storable>(&self, identifier: &Identifier) -> Option<Arc<T>> {
        if !identifier.is_namespaced() {
            if let Some(found) = self.locals.last().and_then(|local| local.get::<T>(identifier.name())) {
                return Some(found);
            }
        }
        let owner = self.resolve(identifier)?;
        self.resources.get::<T>(&owner.map_name(identifier.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn id(name: &str) -> Identifier {
        Identifier::new(name, 1)
    }

    fn int_of(ns: &Namespace, name: &str) -> Option<i32> {
        ns.get::<Value>(&id(name)).map(|value| *value.get::<i32>())
    }

    #[test]
    fn globals_are_keyed_by_file() {
        let mut root = Namespace::new();
        root.set_filename("root.grm");
        root.insert("r", Value::Int(1));
        assert!(root.resources().contains("root.grm/r"));
        let child = root.add_child("lib.grm", "m").expect("child");
        child.insert("r", Value::Int(2));
        assert_eq!(int_of(&root, "r"), Some(1));
        assert_eq!(int_of(&root, "m.r"), Some(2));
        assert_eq!(int_of(&root, "x.r"), None);
    }

    #[test]
    fn unnamed_file_uses_placeholder() {
        let root = Namespace::new();
        assert_eq!(root.map_name("r"), "<unknown file>/r");
    }

    #[test]
    fn locals_shadow_and_restore() {
        let mut ns = Namespace::new();
        ns.insert("x", Value::Int(1));
        ns.push_local();
        assert_eq!(int_of(&ns, "x"), Some(1));
        ns.insert("x", Value::Int(2));
        ns.push_local();
        ns.insert("x", Value::Int(3));
        assert_eq!(ns.local_depth(), 2);
        assert_eq!(int_of(&ns, "x"), Some(3));
        ns.pop_local();
        assert_eq!(int_of(&ns, "x"), Some(2));
        ns.pop_local();
        assert_eq!(int_of(&ns, "x"), Some(1));
        assert_eq!(ns.local_depth(), 0);
    }

    #[test]
    fn popped_bindings_disappear() {
        let mut ns = Namespace::new();
        ns.push_local();
        ns.insert("y", Value::Int(5));
        assert!(ns.erase_local("y"));
        ns.insert("y", Value::Int(6));
        ns.pop_local();
        assert_eq!(int_of(&ns, "y"), None);
    }

    #[test]
    fn holds_checks_kind_without_panicking() {
        let mut ns = Namespace::new();
        ns.insert_global(
            "F",
            crate::ast::Function {
                name: "F".to_string(),
                params: Vec::new(),
                body: Vec::new(),
                line: 1,
            },
        );
        assert!(ns.holds::<crate::ast::Function>(&id("F")));
        assert!(!ns.holds::<Value>(&id("F")));
        ns.push_local();
        ns.insert("F", Value::Int(1));
        assert!(ns.holds::<Value>(&id("F")));
        assert!(!ns.holds::<crate::ast::Function>(&id("F")));
        assert!(!ns.holds::<Value>(&id("m.F")));
    }

    #[test]
    fn defines_looks_where_insert_binds() {
        let mut ns = Namespace::new();
        ns.insert("x", Value::Int(1));
        assert!(ns.defines("x"));
        ns.push_local();
        assert!(!ns.defines("x"));
        ns.insert("x", Value::Int(2));
        assert!(ns.defines("x"));
        ns.pop_local();
        assert!(!ns.defines("y"));
    }

    #[test]
    fn duplicate_alias_is_fatal() {
        let mut root = Namespace::new();
        root.add_child("a.grm", "m").expect("first");
        let err = root.add_child("b.grm", "m").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn skeleton_shares_globals() {
        let mut root = Namespace::new();
        let child = root.add_child("lib.grm", "m").expect("child");
        child.insert("r", Value::Int(9));
        let copy = root.child("m").expect("child").clone_skeleton();
        assert_eq!(int_of(&copy, "r"), Some(9));
        root.adopt_child("n", copy).expect("adopt");
        assert_eq!(int_of(&root, "n.r"), Some(9));
    }
}
