pub mod aggregator;
pub mod chart;
pub mod decoder;
pub mod error;
pub mod geolocation;
pub mod pipeline;
pub mod projector;
pub mod settings;
pub mod summary;
