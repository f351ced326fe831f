pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod logger;
pub mod media;
pub mod model;
pub mod payment;
pub mod service;

pub trait Located {
    fn location(&self) -> snafu::Location;
}
