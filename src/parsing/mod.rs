pub(crate) mod ast;
pub(crate) mod compiler;
pub(crate) mod instructions;
pub(crate) mod lexer;
pub(crate) mod parser;
