//=============================================
// joss/interpreter/scope.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Variable frames
// Objective: Global frame plus one frame per active call, each carrying its
//            own bindings, declared type tags and `this` receiver
//=============================================

use std::collections::HashMap;

use super::value::{TypeTag, Value};

#[derive(Debug, Default, Clone)]
pub struct Frame {
    vars: HashMap<String, Value>,
    types: HashMap<String, TypeTag>,
    this: Option<Value>,
}

/// Frame stack. Index 0 is the global frame and is never popped.
///
/// Lookups check the innermost frame, then globals. Assignments update the
/// innermost binding if present, else an existing global, else create a
/// binding in the innermost frame.
#[derive(Debug, Clone)]
pub struct Scope {
    frames: Vec<Frame>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::default()],
        }
    }

    /// Start a scope whose globals are the given bindings and tags.
    pub fn with_globals(
        vars: HashMap<String, Value>,
        types: HashMap<String, TypeTag>,
        this: Option<Value>,
    ) -> Self {
        Self {
            frames: vec![Frame { vars, types, this }],
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn push_frame(&mut self, this: Option<Value>) {
        self.frames.push(Frame {
            this,
            ..Frame::default()
        });
    }

    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    fn innermost(&self) -> usize {
        self.frames.len() - 1
    }

    /// Frame that owns `name` for reads and writes.
    fn slot_of(&self, name: &str) -> Option<usize> {
        let inner = self.innermost();
        if self.frames[inner].vars.contains_key(name) {
            Some(inner)
        } else if self.frames[0].vars.contains_key(name) {
            Some(0)
        } else {
            None
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.slot_of(name)
            .and_then(|slot| self.frames[slot].vars.get(name).cloned())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        let slot = self.slot_of(name)?;
        self.frames[slot].vars.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slot_of(name).is_some()
    }

    /// Declared tag for the binding `name` would resolve to.
    pub fn type_of(&self, name: &str) -> Option<&TypeTag> {
        let slot = self.slot_of(name).unwrap_or_else(|| self.innermost());
        self.frames[slot].types.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        let slot = self.slot_of(name).unwrap_or_else(|| self.innermost());
        self.frames[slot].vars.insert(name.to_string(), value);
    }

    /// Bind `name` in the innermost frame, recording its tag if typed.
    pub fn declare(&mut self, name: &str, value: Value, tag: Option<TypeTag>) {
        let inner = self.innermost();
        let frame = &mut self.frames[inner];
        frame.vars.insert(name.to_string(), value);
        match tag {
            Some(tag) => {
                frame.types.insert(name.to_string(), tag);
            }
            None => {
                frame.types.remove(name);
            }
        }
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.frames[0].vars.insert(name.to_string(), value);
    }

    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.frames[0].vars.get(name).cloned()
    }

    pub fn remove_global(&mut self, name: &str) -> Option<Value> {
        self.frames[0].vars.remove(name)
    }

    pub fn this(&self) -> Option<Value> {
        self.frames[self.innermost()].this.clone()
    }

    /// Bindings and tags visible from the innermost frame, flattened.
    pub fn visible(&self) -> (HashMap<String, Value>, HashMap<String, TypeTag>) {
        let mut vars = self.frames[0].vars.clone();
        let mut types = self.frames[0].types.clone();
        let inner = self.innermost();
        if inner > 0 {
            let frame = &self.frames[inner];
            vars.extend(frame.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
            types.extend(frame.types.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        (vars, types)
    }
}
