pub mod ast;
pub mod language;
