pub(crate) mod interpreter;
pub(crate) mod stack;
pub(crate) mod state;
