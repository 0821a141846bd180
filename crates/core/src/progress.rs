//! Pure progress derivations over a completion map and a roadmap catalog.

use crate::model::{CompletionMap, RoadmapCatalog};

//
// ─── SNAPSHOTS ─────────────────────────────────────────────────────────────────
//

/// Derived completion figures for a topic, a roadmap, or any other item scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Rounded percentage in `0..=100`.
    pub percentage: u8,
    pub completed: u32,
    pub total: u32,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn new(completed: u32, total: u32) -> Self {
        Self {
            percentage: percentage(completed, total),
            completed,
            total,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.percentage == 100
    }
}

/// Cross-roadmap rollup for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateProgress {
    /// Rounded mean of the per-roadmap percentages; `0` when no roadmaps.
    pub average_completion: u8,
    pub completed_roadmaps: u32,
    pub in_progress_roadmaps: u32,
    pub total_roadmaps: u32,
}

//
// ─── CALCULATIONS ──────────────────────────────────────────────────────────────
//

/// Rounded percentage of `completed` out of `total`, half-up.
///
/// A zero total yields `0`, never a division error. Uses integer arithmetic so
/// boundary values (1/3 → 33, 2/3 → 67) are deterministic on every platform.
#[must_use]
pub fn percentage(completed: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = u64::from(completed.min(total));
    let total = u64::from(total);
    let rounded = (completed * 200 + total) / (total * 2);
    u8::try_from(rounded).unwrap_or(100)
}

/// Progress for a single topic.
///
/// A path missing from the catalog, or a topic with an empty item list, counts
/// as zero-total (a malformed catalog entry is not an error here).
#[must_use]
pub fn topic_progress(
    map: &CompletionMap,
    catalog: &RoadmapCatalog,
    level: &str,
    tech: &str,
    topic: &str,
) -> ProgressSnapshot {
    let Some(items) = catalog.items(level, tech, topic) else {
        return ProgressSnapshot::new(0, 0);
    };
    let completed = items
        .iter()
        .filter(|item| map.is_completed(level, tech, topic, item))
        .count();
    ProgressSnapshot::new(
        u32::try_from(completed).unwrap_or(u32::MAX),
        u32::try_from(items.len()).unwrap_or(u32::MAX),
    )
}

/// Progress across every level, technology, and topic of a roadmap.
#[must_use]
pub fn roadmap_progress(map: &CompletionMap, catalog: &RoadmapCatalog) -> ProgressSnapshot {
    let mut total: u64 = 0;
    let mut completed: u64 = 0;

    for level in catalog.levels() {
        for tech in &level.technologies {
            for topic in &tech.topics {
                total += topic.items.len() as u64;
                completed += topic
                    .items
                    .iter()
                    .filter(|item| map.is_completed(&level.name, &tech.name, &topic.name, item))
                    .count() as u64;
            }
        }
    }

    ProgressSnapshot::new(
        u32::try_from(completed).unwrap_or(u32::MAX),
        u32::try_from(total).unwrap_or(u32::MAX),
    )
}

/// Rolls per-roadmap percentages up into dashboard figures.
///
/// A roadmap counts as completed iff its percentage is exactly 100, and as in
/// progress iff its percentage is strictly between 0 and 100.
#[must_use]
pub fn aggregate_progress<I>(percentages: I) -> AggregateProgress
where
    I: IntoIterator<Item = u8>,
{
    let mut total_roadmaps: u32 = 0;
    let mut completed_roadmaps: u32 = 0;
    let mut in_progress_roadmaps: u32 = 0;
    let mut percentage_sum: u64 = 0;

    for pct in percentages {
        total_roadmaps += 1;
        percentage_sum += u64::from(pct);
        if pct == 100 {
            completed_roadmaps += 1;
        } else if pct > 0 {
            in_progress_roadmaps += 1;
        }
    }

    let average_completion = if total_roadmaps == 0 {
        0
    } else {
        let total = u64::from(total_roadmaps);
        u8::try_from((percentage_sum * 2 + total) / (total * 2)).unwrap_or(100)
    };

    AggregateProgress {
        average_completion,
        completed_roadmaps,
        in_progress_roadmaps,
        total_roadmaps,
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
