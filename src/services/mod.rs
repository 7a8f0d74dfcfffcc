pub mod movie_service;
pub mod movie_stats;

pub use movie_service::MovieService;
