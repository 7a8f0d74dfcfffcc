// handlers/mod.rs - route handlers grouped by resource
//
// movies: /api/v1/movies CRUD, aliases and aggregations
// system: banner, health check and the unknown-route fallback

pub mod movies;
pub mod system;

pub use movies::*;
pub use system::*;
