pub mod catalog;
pub mod error;
pub mod expression;
pub mod plan;
pub mod planner;
pub mod scenario;
pub mod types;
