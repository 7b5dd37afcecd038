pub mod application;
pub mod cli;
pub mod domain;
pub mod notify;
pub mod storage;

pub use application::Engine;
pub use storage::Repository;
