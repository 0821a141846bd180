mod catalog;
mod completion;
mod ids;

pub use catalog::{CatalogLevel, CatalogTechnology, CatalogTopic, RoadmapCatalog};
pub use completion::CompletionMap;
pub use ids::{ParseIdError, RoadmapId};
