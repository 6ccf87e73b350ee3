mod builtins;
#[allow(clippy::module_inception)]
mod executor;
mod redirect;
mod wait;

pub use executor::Executor;
