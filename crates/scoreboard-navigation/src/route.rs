use scoreboard_core::{ScoreId, ScoreVersionId, ScorecardId};

pub const SCORECARD_LIST_PATH: &str = "/scorecards";

/// Canonical address forms for a selection. Query parameters are not
/// interpreted by this core and are dropped during parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    ScorecardList,
    Scorecard {
        scorecard_id: ScorecardId,
    },
    Score {
        scorecard_id: ScorecardId,
        score_id: ScoreId,
    },
    Version {
        scorecard_id: ScorecardId,
        score_id: ScoreId,
        version_id: ScoreVersionId,
    },
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Self::ScorecardList => SCORECARD_LIST_PATH.to_owned(),
            Self::Scorecard { scorecard_id } => format!("/scorecards/{scorecard_id}"),
            Self::Score {
                scorecard_id,
                score_id,
            } => format!("/scorecards/{scorecard_id}/scores/{score_id}"),
            Self::Version {
                scorecard_id,
                score_id,
                version_id,
            } => {
                format!("/scorecards/{scorecard_id}/scores/{score_id}/versions/{version_id}")
            }
        }
    }

    pub fn parse(path: &str) -> Option<Self> {
        let path = path
            .split_once('?')
            .map_or(path, |(before, _query)| before);
        let path = path
            .split_once('#')
            .map_or(path, |(before, _fragment)| before);

        let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
        match segments.as_slice() {
            ["scorecards"] => Some(Self::ScorecardList),
            ["scorecards", scorecard_id] => Some(Self::Scorecard {
                scorecard_id: ScorecardId::new(*scorecard_id),
            }),
            ["scorecards", scorecard_id, "scores", score_id] => Some(Self::Score {
                scorecard_id: ScorecardId::new(*scorecard_id),
                score_id: ScoreId::new(*score_id),
            }),
            ["scorecards", scorecard_id, "scores", score_id, "versions", version_id] => {
                Some(Self::Version {
                    scorecard_id: ScorecardId::new(*scorecard_id),
                    score_id: ScoreId::new(*score_id),
                    version_id: ScoreVersionId::new(*version_id),
                })
            }
            _ => None,
        }
    }

    pub fn scorecard_id(&self) -> Option<&ScorecardId> {
        match self {
            Self::ScorecardList => None,
            Self::Scorecard { scorecard_id }
            | Self::Score { scorecard_id, .. }
            | Self::Version { scorecard_id, .. } => Some(scorecard_id),
        }
    }

    pub fn score_id(&self) -> Option<&ScoreId> {
        match self {
            Self::Score { score_id, .. } | Self::Version { score_id, .. } => Some(score_id),
            _ => None,
        }
    }

    pub fn version_id(&self) -> Option<&ScoreVersionId> {
        match self {
            Self::Version { version_id, .. } => Some(version_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_routes_round_trip_through_parse() {
        let routes = [
            Route::ScorecardList,
            Route::Scorecard {
                scorecard_id: ScorecardId::new("sc-1"),
            },
            Route::Score {
                scorecard_id: ScorecardId::new("sc-1"),
                score_id: ScoreId::new("score-7"),
            },
            Route::Version {
                scorecard_id: ScorecardId::new("sc-1"),
                score_id: ScoreId::new("score-7"),
                version_id: ScoreVersionId::new("sv-3"),
            },
        ];

        for route in routes {
            let parsed = Route::parse(&route.path()).expect("canonical path parses");
            assert_eq!(parsed, route);
        }
    }

    #[test]
    fn parse_ignores_query_parameters_and_fragments() {
        let parsed =
            Route::parse("/scorecards/sc-1/scores/score-7?tab=results#metrics").expect("parses");
        assert_eq!(
            parsed,
            Route::Score {
                scorecard_id: ScorecardId::new("sc-1"),
                score_id: ScoreId::new("score-7"),
            }
        );
    }

    #[test]
    fn parse_tolerates_trailing_slash() {
        assert_eq!(Route::parse("/scorecards/"), Some(Route::ScorecardList));
        assert_eq!(
            Route::parse("/scorecards/sc-1/"),
            Some(Route::Scorecard {
                scorecard_id: ScorecardId::new("sc-1"),
            })
        );
    }

    #[test]
    fn parse_rejects_unknown_shapes() {
        assert_eq!(Route::parse("/"), None);
        assert_eq!(Route::parse("/reports/sc-1"), None);
        assert_eq!(Route::parse("/scorecards/sc-1/sections/sec-1"), None);
        assert_eq!(
            Route::parse("/scorecards/sc-1/scores/score-7/versions/sv-3/extra"),
            None
        );
    }

    #[test]
    fn route_accessors_expose_component_ids() {
        let route = Route::Version {
            scorecard_id: ScorecardId::new("sc-1"),
            score_id: ScoreId::new("score-7"),
            version_id: ScoreVersionId::new("sv-3"),
        };

        assert_eq!(route.scorecard_id(), Some(&ScorecardId::new("sc-1")));
        assert_eq!(route.score_id(), Some(&ScoreId::new("score-7")));
        assert_eq!(route.version_id(), Some(&ScoreVersionId::new("sv-3")));
        assert_eq!(Route::ScorecardList.scorecard_id(), None);
    }
}
