//! Pair scoring: pick the matching pair for a request.
//!
//! A pair matches when every non-wildcard field and every header constraint
//! passes. Its score is the number of those constraints. Under the default
//! `strongest` strategy the highest score wins and ties go to the pair
//! inserted first; under `first` the earliest matching pair wins outright.

use crate::metrics;
use crate::request::RequestDetails;
use crate::simulation::{Pair, Simulation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// How a winner is chosen among several matching pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchingStrategy {
    #[default]
    Strongest,
    First,
}

impl MatchingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchingStrategy::Strongest => "strongest",
            MatchingStrategy::First => "first",
        }
    }
}

impl fmt::Display for MatchingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strongest" => Ok(MatchingStrategy::Strongest),
            "first" => Ok(MatchingStrategy::First),
            other => Err(format!(
                "unknown matching strategy '{other}' (expected 'strongest' or 'first')"
            )),
        }
    }
}

/// The failed pair that got furthest, reported with no-match errors.
#[derive(Debug, Clone)]
pub struct ClosestMiss {
    pub pair: Pair,
    pub index: usize,
    pub missed_fields: Vec<String>,
    pub score: usize,
}

impl fmt::Display for ClosestMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pair #{} matched {} constraint(s) but missed [{}]",
            self.index,
            self.score,
            self.missed_fields.join(", ")
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    /// `None` when no pair matched.
    pub pair: Option<Pair>,
    pub matched_field_count: usize,
    pub closest_miss: Option<ClosestMiss>,
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        self.pair.is_some()
    }
}

/// Scan every pair of one snapshot and return the strongest match.
pub fn find_best_match(simulation: &Simulation, request: &RequestDetails) -> MatchResult {
    find_match(simulation, request, MatchingStrategy::Strongest)
}

/// Scan one snapshot under the given strategy.
pub fn find_match(
    simulation: &Simulation,
    request: &RequestDetails,
    strategy: MatchingStrategy,
) -> MatchResult {
    let mut best: Option<(usize, usize)> = None;
    let mut closest: Option<(usize, usize, Vec<String>)> = None;

    for (index, pair) in simulation.pairs.iter().enumerate() {
        let report = pair.matcher.check(request);
        if report.is_match() {
            if best.is_none_or(|(_, score)| report.passed > score) {
                best = Some((index, report.passed));
            }
            if strategy == MatchingStrategy::First {
                break;
            }
        } else if closest
            .as_ref()
            .is_none_or(|(_, score, _)| report.passed > *score)
        {
            closest = Some((index, report.passed, report.missed));
        }
    }

    match best {
        Some((index, score)) => {
            debug!(
                pair_index = index,
                score,
                strategy = %strategy,
                method = %request.method,
                path = %request.path,
                "Simulation hit"
            );
            metrics::record_match(true);
            MatchResult {
                pair: Some(simulation.pairs[index].clone()),
                matched_field_count: score,
                closest_miss: None,
            }
        }
        None => {
            debug!(
                method = %request.method,
                path = %request.path,
                pairs = simulation.pairs.len(),
                "Simulation miss"
            );
            metrics::record_match(false);
            MatchResult {
                pair: None,
                matched_field_count: 0,
                closest_miss: closest.map(|(index, score, missed_fields)| ClosestMiss {
                    pair: simulation.pairs[index].clone(),
                    index,
                    missed_fields,
                    score,
                }),
            }
        }
    }
}
