//=============================================
// joss/interpreter/classes.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Class table
// Objective: Arena of class entries linked to their parent by index, with
//            ancestor walks for method lookup and native detection
//=============================================

use std::collections::HashMap;
use std::sync::Arc;

use super::errors::RuntimeError;
use crate::ast::{ClassDecl, FunctionDecl};

pub type ClassId = usize;

#[derive(Debug, Clone)]
pub struct ClassEntry {
    pub decl: Arc<ClassDecl>,
    pub parent: Option<ClassId>,
    pub native: bool,
}

#[derive(Debug, Default)]
pub struct ClassTable {
    entries: Vec<ClassEntry>,
    by_name: HashMap<String, ClassId>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ClassEntry> {
        self.by_name.get(name).map(|id| &self.entries[*id])
    }

    /// Pre-register a host-backed class with an empty body.
    pub fn register_native(&mut self, name: &str) {
        if let Some(id) = self.by_name.get(name) {
            self.entries[*id].native = true;
            return;
        }
        let id = self.entries.len();
        self.entries.push(ClassEntry {
            decl: Arc::new(ClassDecl::empty(name)),
            parent: None,
            native: true,
        });
        self.by_name.insert(name.to_string(), id);
    }

    //Function: register
    //Purpose: Add or replace a user class, rejecting declarations that close a cycle
    //Inputs: decl: Arc<ClassDecl>
    //Returns: Result<ClassId, RuntimeError>
    pub fn register(&mut self, decl: Arc<ClassDecl>) -> Result<ClassId, RuntimeError> {
        self.ensure_acyclic(&decl)?;

        let id = match self.by_name.get(&decl.name) {
            Some(id) => {
                self.entries[*id].decl = Arc::clone(&decl);
                *id
            }
            None => {
                let id = self.entries.len();
                self.entries.push(ClassEntry {
                    decl: Arc::clone(&decl),
                    parent: None,
                    native: false,
                });
                self.by_name.insert(decl.name.clone(), id);
                id
            }
        };

        self.relink();
        Ok(id)
    }

    /// Walk the would-be parent chain by name; reaching the new class again
    /// means the declaration closes a cycle.
    fn ensure_acyclic(&self, decl: &ClassDecl) -> Result<(), RuntimeError> {
        let mut next = decl.parent.clone();
        let mut steps = 0;
        while let Some(name) = next {
            if name == decl.name || steps > self.entries.len() {
                return Err(RuntimeError::InheritanceCycle(decl.name.clone()));
            }
            next = self
                .get(&name)
                .and_then(|entry| entry.decl.parent.clone());
            steps += 1;
        }
        Ok(())
    }

    fn relink(&mut self) {
        for index in 0..self.entries.len() {
            let parent = self.entries[index]
                .decl
                .parent
                .as_ref()
                .and_then(|name| self.by_name.get(name).copied());
            self.entries[index].parent = parent;
        }
    }

    /// Class followed by its ancestors, child first.
    pub fn chain(&self, name: &str) -> Vec<&ClassEntry> {
        let mut chain = Vec::new();
        let mut next = self.by_name.get(name).copied();
        while let Some(id) = next {
            if chain.len() > self.entries.len() {
                break;
            }
            let entry = &self.entries[id];
            chain.push(entry);
            next = entry.parent;
        }
        chain
    }

    /// User-defined method or initializer, searched upward from `class`.
    pub fn find_method(&self, class: &str, method: &str) -> Option<Arc<FunctionDecl>> {
        self.chain(class)
            .into_iter()
            .find_map(|entry| entry.decl.method(method).cloned())
    }

    /// Nearest native class in the ancestor chain, including `class` itself.
    pub fn native_ancestor(&self, class: &str) -> Option<String> {
        self.chain(class)
            .into_iter()
            .find(|entry| entry.native)
            .map(|entry| entry.decl.name.clone())
    }

    pub fn is_a(&self, class: &str, ancestor: &str) -> bool {
        self.chain(class)
            .into_iter()
            .any(|entry| entry.decl.name == ancestor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FunctionDecl;

    fn class(name: &str, parent: Option<&str>, methods: &[&str]) -> Arc<ClassDecl> {
        Arc::new(ClassDecl {
            name: name.into(),
            parent: parent.map(str::to_string),
            properties: Vec::new(),
            methods: methods
                .iter()
                .map(|m| {
                    Arc::new(FunctionDecl {
                        name: m.to_string(),
                        params: Vec::new(),
                        body: Some(Vec::new()),
                        is_init: false,
                    })
                })
                .collect(),
        })
    }

    #[test]
    fn methods_resolve_through_forward_declared_parents() {
        let mut table = ClassTable::new();
        table
            .register(class("Dog", Some("Animal"), &["bark"]))
            .expect("register child");
        table
            .register(class("Animal", None, &["greet"]))
            .expect("register parent");
        assert!(table.find_method("Dog", "greet").is_some());
        assert!(table.is_a("Dog", "Animal"));
        assert!(!table.is_a("Animal", "Dog"));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut table = ClassTable::new();
        table.register(class("A", Some("B"), &[])).expect("A");
        let result = table.register(class("B", Some("A"), &[]));
        assert!(matches!(result, Err(RuntimeError::InheritanceCycle(name)) if name == "B"));
        assert!(table.get("B").is_none());
    }

    #[test]
    fn native_ancestry_is_inherited() {
        let mut table = ClassTable::new();
        table.register_native("Stack");
        table
            .register(class("History", Some("Stack"), &[]))
            .expect("register");
        assert_eq!(table.native_ancestor("History").as_deref(), Some("Stack"));
        assert_eq!(table.native_ancestor("Missing"), None);
    }
}
