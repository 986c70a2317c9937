//! policyctl commands

pub mod compile;
pub mod explain;
pub mod validate;
