#![forbid(unsafe_code)]

pub mod http;
pub mod repository;

pub use http::{ApiConfig, HttpProgressRepository};
pub use repository::{
    InMemoryProgressRepository, ProgressRepository, RoadmapOverview, Storage, StorageError,
};
