use scoreboard_core::{Score, ScoreId, ScorecardId, Section, SectionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionLoadState {
    Loading,
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionOutline {
    pub section: Section,
    pub scores: Vec<Score>,
    pub state: SectionLoadState,
}

/// Incrementally merged view of a scorecard's sections and scores. May be
/// partial: some sections render while others are still loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScorecardOutline {
    pub scorecard_id: ScorecardId,
    pub sections: Vec<SectionOutline>,
    pub complete: bool,
    pub failed: bool,
    pub error: Option<String>,
}

impl ScorecardOutline {
    pub fn loading(scorecard_id: ScorecardId, sections: Vec<Section>) -> Self {
        Self {
            scorecard_id,
            sections: sections
                .into_iter()
                .map(|section| SectionOutline {
                    section,
                    scores: Vec::new(),
                    state: SectionLoadState::Loading,
                })
                .collect(),
            complete: false,
            failed: false,
            error: None,
        }
    }

    pub fn load_failed(scorecard_id: ScorecardId, error: String) -> Self {
        Self {
            scorecard_id,
            sections: Vec::new(),
            complete: true,
            failed: true,
            error: Some(error),
        }
    }

    pub fn set_section_scores(&mut self, section_id: &SectionId, scores: Vec<Score>) {
        if let Some(outline) = self.section_mut(section_id) {
            outline.scores = scores;
            outline.state = SectionLoadState::Loaded;
        }
    }

    pub fn set_section_failed(&mut self, section_id: &SectionId, error: String) {
        if let Some(outline) = self.section_mut(section_id) {
            outline.scores = Vec::new();
            outline.state = SectionLoadState::Failed(error);
        }
    }

    pub fn find_score(&self, score_id: &ScoreId) -> Option<&Score> {
        self.sections
            .iter()
            .flat_map(|outline| outline.scores.iter())
            .find(|score| score.id == *score_id)
    }

    pub fn score_count(&self) -> usize {
        self.sections.iter().map(|outline| outline.scores.len()).sum()
    }

    fn section_mut(&mut self, section_id: &SectionId) -> Option<&mut SectionOutline> {
        self.sections
            .iter_mut()
            .find(|outline| outline.section.id == *section_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str, order: u32) -> Section {
        Section {
            id: SectionId::new(id),
            scorecard_id: ScorecardId::new("sc-1"),
            name: format!("section {id}"),
            order,
        }
    }

    fn score(id: &str, section: &str) -> Score {
        Score {
            id: ScoreId::new(id),
            section_id: SectionId::new(section),
            scorecard_id: ScorecardId::new("sc-1"),
            name: format!("score {id}"),
            key: id.to_owned(),
            external_id: None,
            description: None,
            score_type: "binary".to_owned(),
            order: 0,
            champion_version_id: None,
        }
    }

    #[test]
    fn partial_outline_merges_section_results_independently() {
        let mut outline = ScorecardOutline::loading(
            ScorecardId::new("sc-1"),
            vec![section("sec-1", 0), section("sec-2", 1)],
        );
        assert_eq!(outline.score_count(), 0);

        outline.set_section_scores(&SectionId::new("sec-1"), vec![score("score-1", "sec-1")]);
        assert_eq!(outline.score_count(), 1);
        assert_eq!(outline.sections[0].state, SectionLoadState::Loaded);
        assert_eq!(outline.sections[1].state, SectionLoadState::Loading);

        outline.set_section_failed(&SectionId::new("sec-2"), "timeout".to_owned());
        assert_eq!(
            outline.sections[1].state,
            SectionLoadState::Failed("timeout".to_owned())
        );
        assert!(outline.sections[1].scores.is_empty());

        assert!(outline.find_score(&ScoreId::new("score-1")).is_some());
        assert!(outline.find_score(&ScoreId::new("score-9")).is_none());
    }
}
