pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod sequence;
pub mod services;
pub mod views;

pub use app::AppContext;
pub use config::Config;
pub use error::{ClientError, ClientResult};
