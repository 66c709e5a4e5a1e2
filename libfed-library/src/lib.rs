//! The library (server) process: a grid-positioned book inventory that
//! elects a leader over its grid overlay and serves as a distributed
//! directory for lookups that miss locally.
mod grid;
mod inventory;
mod process;

pub use process::LibraryProcess;
