pub mod env;
pub mod plan;
pub mod provision;
