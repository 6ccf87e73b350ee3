pub(crate) mod error;
mod executor;
mod parser;
mod readline;
mod session;
#[allow(clippy::module_inception)]
mod shell;
mod signals;
mod variables;

pub use session::Session;
pub use shell::Shell;
