pub mod config;
pub mod drive;
pub mod hub;
pub mod messages;
pub mod runtime;
