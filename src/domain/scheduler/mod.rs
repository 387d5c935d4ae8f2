pub mod config;
pub mod request;
pub mod scheduler;
pub mod scheduler_message;
pub mod scheduler_proxy;
