//! Bookshelf application library: the book catalogue and users modules and
//! the bootstrap that wires them onto the module kernel.

pub mod app;
pub mod modules;

pub use app::{run, Application};
