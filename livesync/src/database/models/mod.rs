//! Row models for the SQLite store.

pub mod livestream;

pub use livestream::LivestreamDbModel;
