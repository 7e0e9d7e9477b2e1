pub mod compiler;
pub mod locator;
pub mod page;
pub mod render;
pub mod service;
pub mod trace;
