//! Known-profile matching.
//!
//! Scores the configured device profiles against what a probe showed and
//! returns the plausible ones as ranked `CandidateMatch`es.

use crate::models::{CandidateMatch, DeviceProfile, DiscoveryHints, StrategyKind};
use crate::services::login_page::PageEvidence;

/// Service for ranking known device profiles.
pub struct CandidateMatcher {
    profiles: Vec<DeviceProfile>,
}

/// Authentication family the live page points at, if any.
pub fn live_auth_kind(evidence: &PageEvidence) -> Option<StrategyKind> {
    if evidence.hnap {
        Some(StrategyKind::Hnap)
    } else if evidence.form.is_some() {
        Some(StrategyKind::Form)
    } else if evidence.unauthorized {
        Some(StrategyKind::BasicHeader)
    } else if evidence.is_data_page() {
        Some(StrategyKind::None)
    } else {
        None
    }
}

impl CandidateMatcher {
    pub fn new(profiles: Vec<DeviceProfile>) -> Self {
        Self { profiles }
    }

    /// Profiles with at least one matching marker, best first.
    pub fn rank(
        &self,
        evidence: &PageEvidence,
        body: &str,
        hints: &DiscoveryHints,
    ) -> Vec<CandidateMatch> {
        let body_lower = body.to_lowercase();
        let url = std::iter::once(evidence.final_path.as_str())
            .chain(evidence.redirects.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        let live_kind = live_auth_kind(evidence);

        let mut candidates: Vec<CandidateMatch> = self
            .profiles
            .iter()
            .filter_map(|profile| {
                let (mut matching, mut mismatching) = profile.match_markers(&url, &body_lower);

                if let Some(model) = &hints.model {
                    let model = model.to_lowercase();
                    let name = profile.name.to_lowercase();
                    if name.contains(&model) || model.contains(&name) {
                        matching.push(format!("hinted model '{}'", model));
                    }
                }
                if matching.is_empty() {
                    return None;
                }

                // Kinds that share a login page are not a contradiction.
                let expected = profile.auth.kind();
                match live_kind {
                    Some(kind) if kind == expected => {
                        matching.push(format!("page shows {kind} authentication"))
                    }
                    Some(StrategyKind::Form) if expected == StrategyKind::UrlToken => {}
                    Some(kind) => mismatching.push(format!(
                        "page shows {kind} authentication, profile expects {expected}"
                    )),
                    None => {}
                }

                let total = (matching.len() + mismatching.len()) as f32;
                let score = matching.len() as f32 / total;
                Some(CandidateMatch {
                    profile: profile.clone(),
                    score,
                    matching,
                    mismatching,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.matching.len().cmp(&a.matching.len()))
        });
        log::debug!(
            "Matched {} known profiles: {:?}",
            candidates.len(),
            candidates
                .iter()
                .map(|c| format!("{} ({:.2})", c.profile.name, c.score))
                .collect::<Vec<_>>()
        );
        candidates
    }
}

impl Default for CandidateMatcher {
    fn default() -> Self {
        Self::new(crate::models::DiscoveryConfig::default().profiles)
    }
}
