use std::collections::BTreeMap;

use serde_json::Value;

use crate::context::Context;
use crate::vm::stack::Stack;

/// The state of the interpreter.
/// We pass it around rather than put it on the VM to avoid multiple borrow issues.
#[derive(Debug)]
pub(crate) struct State<'t> {
    pub(crate) stack: Stack<'t>,
    /// Variables assigned by directives. They shadow payload keys.
    set_variables: BTreeMap<String, Value>,
    pub(crate) context: &'t Context,
}

impl<'t> State<'t> {
    pub(crate) fn new(context: &'t Context) -> Self {
        Self {
            stack: Stack::new(),
            set_variables: BTreeMap::new(),
            context,
        }
    }

    pub(crate) fn store(&mut self, name: &str, value: Value) {
        self.set_variables.insert(name.to_string(), value);
    }

    /// Name resolution: directive variables first, then the payload keys.
    /// `None` means the name is undefined, which is an error at the call site.
    pub(crate) fn get(&self, name: &str) -> Option<Value> {
        if let Some(val) = self.set_variables.get(name) {
            return Some(val.clone());
        }

        self.context.data.get(name).cloned()
    }
}
