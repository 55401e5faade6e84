use scoreboard_core::{EvalItemId, ScoreId, ScoreVersionId, ScorecardId, SectionId, TaskId};
use scoreboard_navigation::Route;

/// Client-only selection state. Lives for the browsing session; the URL is
/// derived from it, never the other way around.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    pub scorecard_id: Option<ScorecardId>,
    /// Derived from the selected score.
    pub section_id: Option<SectionId>,
    pub score_id: Option<ScoreId>,
    pub version_id: Option<ScoreVersionId>,
    pub item_id: Option<EvalItemId>,
    pub task_id: Option<TaskId>,
    pub analysis_open: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseTarget {
    Scorecard,
    Score,
    Version,
    Item,
    Task,
    Analysis,
}

impl Selection {
    pub fn route(&self) -> Route {
        match (&self.scorecard_id, &self.score_id, &self.version_id) {
            (Some(scorecard_id), Some(score_id), Some(version_id)) => Route::Version {
                scorecard_id: scorecard_id.clone(),
                score_id: score_id.clone(),
                version_id: version_id.clone(),
            },
            (Some(scorecard_id), Some(score_id), None) => Route::Score {
                scorecard_id: scorecard_id.clone(),
                score_id: score_id.clone(),
            },
            (Some(scorecard_id), None, _) => Route::Scorecard {
                scorecard_id: scorecard_id.clone(),
            },
            (None, _, _) => Route::ScorecardList,
        }
    }

    /// Count of open side panels; the single-detail-pane policy keeps this
    /// at most one.
    pub fn open_side_panels(&self) -> usize {
        usize::from(self.item_id.is_some())
            + usize::from(self.task_id.is_some())
            + usize::from(self.analysis_open)
    }
}
