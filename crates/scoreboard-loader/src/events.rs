use scoreboard_core::{Score, ScorecardId, Section, SectionId};

/// Monotonically increasing counter bumped on every scorecard change; any
/// load result stamped with an older value is stale and must be dropped.
pub type Generation = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScorecardLoadEvent {
    SectionsLoaded {
        generation: Generation,
        scorecard_id: ScorecardId,
        sections: Vec<Section>,
    },
    SectionScoresLoaded {
        generation: Generation,
        scorecard_id: ScorecardId,
        section_id: SectionId,
        scores: Vec<Score>,
    },
    SectionScoresFailed {
        generation: Generation,
        scorecard_id: ScorecardId,
        section_id: SectionId,
        error: String,
    },
    LoadFailed {
        generation: Generation,
        scorecard_id: ScorecardId,
        error: String,
    },
    LoadFinished {
        generation: Generation,
        scorecard_id: ScorecardId,
    },
}

impl ScorecardLoadEvent {
    pub fn generation(&self) -> Generation {
        match self {
            Self::SectionsLoaded { generation, .. }
            | Self::SectionScoresLoaded { generation, .. }
            | Self::SectionScoresFailed { generation, .. }
            | Self::LoadFailed { generation, .. }
            | Self::LoadFinished { generation, .. } => *generation,
        }
    }

    pub fn scorecard_id(&self) -> &ScorecardId {
        match self {
            Self::SectionsLoaded { scorecard_id, .. }
            | Self::SectionScoresLoaded { scorecard_id, .. }
            | Self::SectionScoresFailed { scorecard_id, .. }
            | Self::LoadFailed { scorecard_id, .. }
            | Self::LoadFinished { scorecard_id, .. } => scorecard_id,
        }
    }
}
