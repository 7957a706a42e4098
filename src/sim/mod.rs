pub mod backend;
pub mod config;
pub mod log;
pub mod retire;
pub mod top;
