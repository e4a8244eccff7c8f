//! Plugin-facing actions and the worker dispatch that runs them.
mod dispatch;
mod facade;

pub use dispatch::Dispatcher;
pub use facade::{Bridge, ResultCallback};
