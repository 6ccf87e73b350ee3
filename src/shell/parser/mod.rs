pub mod ast;
pub mod expand;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;

pub use ast::{Command, Pipeline, Redirection};
pub use lexer::RedirectOp;
pub use parser::parse_line;
