pub mod config;
pub mod poller;
pub mod service;

pub use config::*;
pub use poller::*;
pub use service::*;
