use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use compact_str::{CompactString, ToCompactString};

use super::native::NativeClock;
use crate::value::{LoxValue, NativeFunction};

/// One local frame in the lexical chain: a dense slot vector in
/// declaration order, the name→slot map recorded alongside, and the parent
/// link. Frames are shared, not owned — a closure keeps its declaration
/// frame alive past the call that created it.
///
/// The resolved path reads slots only; the name map serves lookups made
/// without a resolution entry, such as retrieving the `this` an
/// initializer returns.
#[derive(Debug, Clone)]
pub struct Environment {
    inner: Arc<Mutex<Frame>>,
}

#[derive(Debug)]
struct Frame {
    slots: Vec<LoxValue>,
    names: HashMap<CompactString, usize>,
    parent: Option<Environment>,
}

impl Environment {
    pub fn new(parent: Option<Environment>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Frame {
                slots: Vec::new(),
                names: HashMap::new(),
                parent,
            })),
        }
    }

    /// Appends a slot and returns its index. Slot order equals declaration
    /// order, which is what the resolver's indices assume.
    pub fn define(&self, name: &str, value: LoxValue) -> usize {
        let mut frame = self.inner.lock().unwrap();
        let slot = frame.slots.len();
        frame.slots.push(value);
        frame.names.insert(name.to_compact_string(), slot);
        slot
    }

    pub fn get_at(&self, depth: usize, slot: usize) -> Option<LoxValue> {
        let environment = self.ancestor(depth)?;
        let frame = environment.inner.lock().unwrap();
        frame.slots.get(slot).cloned()
    }

    pub fn assign_at(&self, depth: usize, slot: usize, value: LoxValue) -> Result<(), ()> {
        let environment = self.ancestor(depth).ok_or(())?;
        let mut frame = environment.inner.lock().unwrap();
        let target = frame.slots.get_mut(slot).ok_or(())?;
        *target = value;
        Ok(())
    }

    /// By-name lookup in this frame only.
    pub fn get_local(&self, name: &str) -> Option<LoxValue> {
        let frame = self.inner.lock().unwrap();
        let slot = *frame.names.get(name)?;
        frame.slots.get(slot).cloned()
    }

    fn ancestor(&self, depth: usize) -> Option<Environment> {
        let mut environment = self.clone();
        for _ in 0..depth {
            let parent = environment.inner.lock().unwrap().parent.clone();
            environment = parent?;
        }
        Some(environment)
    }
}

/// The global frame. Unlike locals it is name-keyed and dynamic:
/// declarations may repeat, and references resolve at runtime.
#[derive(Debug, Clone)]
pub struct Globals {
    inner: Arc<Mutex<HashMap<CompactString, LoxValue>>>,
}

impl Globals {
    pub fn new() -> Self {
        let mut values = HashMap::new();

        // Native bindings are injected before any user code runs.
        let clock = NativeClock;
        values.insert(
            clock.name().to_compact_string(),
            LoxValue::NativeFunction(Arc::new(clock)),
        );

        Self {
            inner: Arc::new(Mutex::new(values)),
        }
    }

    pub fn define(&self, name: &str, value: LoxValue) {
        let mut values = self.inner.lock().unwrap();
        values.insert(name.to_compact_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<LoxValue> {
        let values = self.inner.lock().unwrap();
        values.get(name).cloned()
    }

    /// Assignment never creates a binding; an unknown name is an error.
    pub fn assign(&self, name: &str, value: LoxValue) -> Result<(), ()> {
        let mut values = self.inner.lock().unwrap();
        match values.get_mut(name) {
            Some(target) => {
                *target = value;
                Ok(())
            }
            None => Err(()),
        }
    }
}

impl Default for Globals {
    fn default() -> Self {
        Self::new()
    }
}
