//! Gateway-local routes. Everything else is proxied or served from disk.

pub mod health;
pub mod landing;

pub use health::{HealthResponse, health, health_routes};
pub use landing::landing;
