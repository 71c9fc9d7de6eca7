use serde_json::Value;

use crate::utils::Span;

/// The value stack. Spans are borrowed from the chunk so errors can point
/// back at the template source.
#[derive(Debug, PartialEq, Default)]
pub(crate) struct Stack<'c> {
    values: Vec<(Value, Option<&'c Span>)>,
}

impl<'c> Stack<'c> {
    pub(crate) fn new() -> Self {
        Self {
            values: Vec::with_capacity(16),
        }
    }

    pub(crate) fn push(&mut self, val: Value, span: Option<&'c Span>) {
        self.values.push((val, span));
    }

    pub(crate) fn pop(&mut self) -> (Value, Option<&'c Span>) {
        self.values.pop().expect("to have a value")
    }

    pub(crate) fn peek(&mut self) -> &(Value, Option<&'c Span>) {
        self.values.last().expect("to peek a value")
    }
}
