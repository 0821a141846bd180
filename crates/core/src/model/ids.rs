use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier (slug) for a roadmap, e.g. `frontend` or `backend`.
///
/// Roadmap identifiers are externally defined by the content catalog; the core
/// treats them as opaque strings.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoadmapId(String);

impl RoadmapId {
    /// Creates a new `RoadmapId` from an already-resolved slug.
    #[must_use]
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    /// Returns the underlying slug.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RoadmapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoadmapId({})", self.0)
    }
}

impl fmt::Display for RoadmapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for parsing an ID from a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to parse {kind} from string")]
pub struct ParseIdError {
    kind: String,
}

impl FromStr for RoadmapId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseIdError {
                kind: "RoadmapId".to_string(),
            });
        }
        Ok(RoadmapId::new(trimmed))
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roadmap_id_display() {
        let id = RoadmapId::new("frontend");
        assert_eq!(id.to_string(), "frontend");
    }

    #[test]
    fn test_roadmap_id_from_str() {
        let id: RoadmapId = "backend".parse().unwrap();
        assert_eq!(id, RoadmapId::new("backend"));
    }

    #[test]
    fn test_roadmap_id_from_str_trims_whitespace() {
        let id: RoadmapId = "  devops  ".parse().unwrap();
        assert_eq!(id.as_str(), "devops");
    }

    #[test]
    fn test_roadmap_id_from_str_empty() {
        let result = "   ".parse::<RoadmapId>();
        assert!(result.is_err());
    }

    #[test]
    fn test_roadmap_id_serde_is_transparent() {
        let id = RoadmapId::new("frontend");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"frontend\"");
        let back: RoadmapId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
