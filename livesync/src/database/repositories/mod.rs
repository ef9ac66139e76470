//! Record store implementations.

pub mod livestream;
pub mod memory;
pub mod postgrest;

pub use livestream::*;
pub use memory::*;
pub use postgrest::*;
