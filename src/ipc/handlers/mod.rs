pub mod classes;
pub mod core;
pub mod grading;
pub mod scores;
pub mod setup;
