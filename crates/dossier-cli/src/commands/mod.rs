pub mod check;
pub mod common;
pub mod completions;
pub mod policy;
pub mod suggest;
