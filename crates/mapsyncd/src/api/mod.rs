//! HTTP API handlers for mapsyncd

pub mod error;
pub mod health;
pub mod locations;
pub mod ui;

pub use error::ApiError;
pub use health::health_routes;
pub use locations::get_locations;
pub use ui::serve_index;
