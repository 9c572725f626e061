// Clippy allows for reasonable defaults
#![allow(clippy::new_without_default)] // Default not always appropriate for stateful types
#![allow(clippy::collapsible_if)] // Separate ifs can be more readable
#![allow(clippy::needless_borrow)] // Explicit borrows can clarify ownership

pub mod gateway;
pub mod models;
pub mod orchestrator;
pub mod report;
pub mod server;
pub mod store;
pub mod utils;
