//! The borrower (client) process: a tree-positioned loan history that
//! elects a leader over its neighbor overlay and drives donation
//! distribution and the two aggregation passes.
mod history;
mod process;

pub use process::BorrowerProcess;
