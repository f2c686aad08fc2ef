pub mod db;
pub mod error;
pub mod export;
pub mod health;
pub mod live;
pub mod metrics;
pub mod models;
pub mod repository;
pub mod service;

pub use error::{CoreError, Result};
