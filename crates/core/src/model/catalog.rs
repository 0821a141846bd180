use serde::{Deserialize, Serialize};

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Fully-resolved content tree for one roadmap: `level → technology → topic →
/// [items]`.
///
/// The catalog is supplied by an external data source and is read-only here;
/// the core performs no validation beyond defensive handling of empty or
/// missing item lists. Ordering of levels, technologies, topics, and items is
/// display-relevant and preserved as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadmapCatalog {
    levels: Vec<CatalogLevel>,
}

/// One difficulty tier of a roadmap (e.g. `Beginner`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogLevel {
    pub name: String,
    pub technologies: Vec<CatalogTechnology>,
}

/// One technology within a level (e.g. `HTML`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTechnology {
    pub name: String,
    pub topics: Vec<CatalogTopic>,
}

/// One topic within a technology, holding the ordered item identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTopic {
    pub name: String,
    pub items: Vec<String>,
}

impl RoadmapCatalog {
    #[must_use]
    pub fn new(levels: Vec<CatalogLevel>) -> Self {
        Self { levels }
    }

    #[must_use]
    pub fn levels(&self) -> &[CatalogLevel] {
        &self.levels
    }

    /// Returns the ordered items under the given path, or `None` when any
    /// segment does not exist in this catalog.
    #[must_use]
    pub fn items(&self, level: &str, tech: &str, topic: &str) -> Option<&[String]> {
        let level = self.levels.iter().find(|l| l.name == level)?;
        let tech = level.technologies.iter().find(|t| t.name == tech)?;
        let topic = tech.topics.iter().find(|t| t.name == topic)?;
        Some(&topic.items)
    }

    /// Total item count across every level, technology, and topic.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        let count: usize = self
            .levels
            .iter()
            .flat_map(|level| &level.technologies)
            .flat_map(|tech| &tech.topics)
            .map(|topic| topic.items.len())
            .sum();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl CatalogLevel {
    #[must_use]
    pub fn new(name: impl Into<String>, technologies: Vec<CatalogTechnology>) -> Self {
        Self {
            name: name.into(),
            technologies,
        }
    }
}

impl CatalogTechnology {
    #[must_use]
    pub fn new(name: impl Into<String>, topics: Vec<CatalogTopic>) -> Self {
        Self {
            name: name.into(),
            topics,
        }
    }
}

impl CatalogTopic {
    #[must_use]
    pub fn new(name: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
