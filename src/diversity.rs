//! Quota-based diversity curation of the final hook list.
//!
//! Evidentially-grounded hooks are preferred, so the candidate pool is
//! assembled extracted-first, then inspired, then synthesis-generated.
//! Quotas derive proportionally from the observed ad distribution with a
//! floor of 1 and a hard per-competitor ceiling, so no single competitor
//! dominates the curated list however many ads it ran.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::config::HooksConfig;
use crate::model::{
    CompetitorRecord, HookCandidate, HookProvenance, HookQuota, SegmentValidationResult,
    Violation,
};

#[derive(Debug, Clone, Copy)]
pub struct QuotaPolicy {
    pub cap: usize,
    pub max_per_competitor: usize,
    pub slack: usize,
}

impl From<&HooksConfig> for QuotaPolicy {
    fn from(config: &HooksConfig) -> Self {
        Self {
            cap: config.cap,
            max_per_competitor: config.max_per_competitor,
            slack: config.quota_slack,
        }
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Tally ad creatives per competitor and derive per-competitor quotas.
///
/// quota = clamp(ceil(cap * ads_i / total_ads) + slack, 1, ceiling).
/// Competitors outside the tally fall back to the hard ceiling alone.
pub fn compute_distribution(competitors: &[CompetitorRecord], policy: &QuotaPolicy) -> HookQuota {
    let total_ads: usize = competitors.iter().map(|c| c.ads.len()).sum();

    let mut per_competitor = HashMap::new();
    if total_ads > 0 {
        for competitor in competitors {
            if competitor.ads.is_empty() {
                continue;
            }
            let share = (policy.cap * competitor.ads.len()).div_ceil(total_ads) + policy.slack;
            let quota = share.max(1).min(policy.max_per_competitor);
            per_competitor.insert(competitor.id.clone(), quota);
        }
    }

    HookQuota {
        per_competitor,
        cap: policy.cap,
        default_per_competitor: policy.max_per_competitor,
    }
}

/// Find competitors whose hook count exceeds their quota. Deterministic
/// output order (by competitor id).
pub fn validate_diversity(hooks: &[HookCandidate], quota: &HookQuota) -> Vec<Violation> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for hook in hooks {
        if let Some(id) = hook.competitor_id.as_deref() {
            *counts.entry(id).or_insert(0) += 1;
        }
    }

    let mut violations: Vec<Violation> = counts
        .into_iter()
        .filter_map(|(id, count)| {
            let allowed = quota.for_competitor(id);
            (count > allowed).then(|| Violation {
                competitor_id: id.to_string(),
                excess: count - allowed,
            })
        })
        .collect();
    violations.sort_by(|a, b| a.competitor_id.cmp(&b.competitor_id));
    violations
}

/// Drop excess hooks for each offending competitor (stable order, earliest
/// entries retained) and backfill from the source-neutral fallback pool
/// until quotas and the aggregate cap are satisfied or the pool runs dry.
/// The total count is preserved unless the pool is insufficient.
pub fn remediate(
    hooks: Vec<HookCandidate>,
    violations: &[Violation],
    fallback: &[HookCandidate],
    quota: &HookQuota,
) -> Vec<HookCandidate> {
    let target_len = hooks.len().min(quota.cap);
    let offenders: HashSet<&str> = violations
        .iter()
        .map(|v| v.competitor_id.as_str())
        .collect();

    let mut kept = Vec::with_capacity(target_len);
    let mut per_competitor: HashMap<String, usize> = HashMap::new();
    for hook in hooks {
        match hook.competitor_id.as_deref() {
            Some(id) if offenders.contains(id) => {
                let taken = per_competitor.entry(id.to_string()).or_insert(0);
                if *taken < quota.for_competitor(id) {
                    *taken += 1;
                    kept.push(hook);
                } else {
                    debug!("Dropping over-quota hook from competitor {}", id);
                }
            }
            _ => kept.push(hook),
        }
    }

    backfill(&mut kept, fallback, target_len);
    kept.truncate(quota.cap);
    kept
}

/// Swap out hooks judged off-segment, refilling from the same fallback
/// pool. Removal can only lower per-competitor counts, so quotas hold.
pub fn apply_segment_filter(
    hooks: Vec<HookCandidate>,
    verdict: &SegmentValidationResult,
    fallback: &[HookCandidate],
    quota: &HookQuota,
) -> Vec<HookCandidate> {
    if verdict.off_segment.is_empty() {
        return hooks;
    }

    let flagged: HashSet<String> = verdict.off_segment.iter().map(|t| normalize(t)).collect();
    let target_len = hooks.len().min(quota.cap);

    let before = hooks.len();
    let mut kept: Vec<HookCandidate> = hooks
        .into_iter()
        .filter(|h| !flagged.contains(&normalize(&h.text)))
        .collect();
    if kept.len() < before {
        info!("Segment filter removed {} off-segment hooks", before - kept.len());
    }

    backfill(&mut kept, fallback, target_len);
    kept
}

fn backfill(kept: &mut Vec<HookCandidate>, fallback: &[HookCandidate], target_len: usize) {
    if kept.len() >= target_len {
        return;
    }
    let mut present: HashSet<String> = kept.iter().map(|h| normalize(&h.text)).collect();
    for candidate in fallback {
        if kept.len() >= target_len {
            break;
        }
        if present.insert(normalize(&candidate.text)) {
            kept.push(candidate.clone());
        }
    }
}

fn provenance_rank(p: HookProvenance) -> u8 {
    match p {
        HookProvenance::Extracted => 0,
        HookProvenance::Inspired => 1,
        HookProvenance::Generated => 2,
    }
}

/// Full curation pass over one request's hook material.
///
/// Selection takes evidential hooks first (extracted, then inspired),
/// tops up with generated hooks to the cap, then runs quota remediation
/// and the segment-relevance swap. The generated hooks that were not
/// selected form the backfill pool for both passes.
pub fn curate(
    extracted: Vec<HookCandidate>,
    generated: Vec<HookCandidate>,
    segment_verdict: Option<&SegmentValidationResult>,
    competitors: &[CompetitorRecord],
    policy: &QuotaPolicy,
) -> Vec<HookCandidate> {
    let quota = compute_distribution(competitors, policy);

    // Distinct-by-text across the whole pool, evidential first.
    let mut evidential = extracted;
    evidential.sort_by_key(|h| provenance_rank(h.provenance));

    let mut seen = HashSet::new();
    let mut selection: Vec<HookCandidate> = Vec::new();
    let mut fallback: Vec<HookCandidate> = Vec::new();

    for hook in evidential {
        if !seen.insert(normalize(&hook.text)) {
            continue;
        }
        if selection.len() < policy.cap {
            selection.push(hook);
        }
    }
    for hook in generated {
        if !seen.insert(normalize(&hook.text)) {
            continue;
        }
        if selection.len() < policy.cap {
            selection.push(hook);
        } else {
            fallback.push(hook);
        }
    }

    let violations = validate_diversity(&selection, &quota);
    if !violations.is_empty() {
        info!(
            "Diversity violations for {} competitors; remediating",
            violations.len()
        );
        // Hooks displaced by remediation free up fallback material too.
        selection = remediate(selection, &violations, &fallback, &quota);
    }

    if let Some(verdict) = segment_verdict {
        selection = apply_segment_filter(selection, verdict, &fallback, &quota);
    }

    selection.truncate(policy.cap);
    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AdCreative, Tier};

    fn competitor(id: &str, ad_count: usize) -> CompetitorRecord {
        CompetitorRecord {
            id: id.to_string(),
            name: id.to_uppercase(),
            tier: Tier::Full,
            reviews: None,
            pricing: None,
            ads: (0..ad_count)
                .map(|i| AdCreative {
                    hook_text: format!("{} ad {}", id, i),
                    competitor_id: id.to_string(),
                })
                .collect(),
        }
    }

    fn extracted(text: &str, competitor_id: &str) -> HookCandidate {
        HookCandidate {
            text: text.to_string(),
            provenance: HookProvenance::Extracted,
            competitor_id: Some(competitor_id.to_string()),
        }
    }

    fn counts_by_competitor(hooks: &[HookCandidate]) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for hook in hooks {
            if let Some(id) = &hook.competitor_id {
                *counts.entry(id.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    #[test]
    fn test_quota_proportional_with_floor_and_ceiling() {
        let policy = QuotaPolicy {
            cap: 10,
            max_per_competitor: 3,
            slack: 1,
        };
        let competitors = vec![competitor("a", 8), competitor("b", 1), competitor("c", 0)];
        let quota = compute_distribution(&competitors, &policy);

        // a: ceil(10*8/9)+1 = 10 -> clamped to ceiling 3.
        assert_eq!(quota.for_competitor("a"), 3);
        // b: ceil(10*1/9)+1 = 3.
        assert_eq!(quota.for_competitor("b"), 3);
        // c ran no ads; only the hard ceiling applies.
        assert_eq!(quota.for_competitor("c"), 3);
        assert_eq!(quota.cap, 10);
    }

    #[test]
    fn test_no_ads_means_ceiling_only() {
        let policy = QuotaPolicy {
            cap: 5,
            max_per_competitor: 2,
            slack: 0,
        };
        let quota = compute_distribution(&[competitor("a", 0)], &policy);
        assert!(quota.per_competitor.is_empty());
        assert_eq!(quota.for_competitor("a"), 2);
    }

    #[test]
    fn test_validate_reports_excess_in_stable_order() {
        let policy = QuotaPolicy {
            cap: 6,
            max_per_competitor: 2,
            slack: 1,
        };
        let quota = compute_distribution(&[competitor("a", 5), competitor("b", 1)], &policy);

        let hooks = vec![
            extracted("h1", "a"),
            extracted("h2", "a"),
            extracted("h3", "a"),
            extracted("h4", "b"),
            extracted("h5", "a"),
        ];
        let violations = validate_diversity(&hooks, &quota);
        assert_eq!(
            violations,
            vec![Violation {
                competitor_id: "a".to_string(),
                excess: 2
            }]
        );
    }

    #[test]
    fn test_remediation_scenario_five_to_one_distribution() {
        // Enrichment found 5 ads on A and 1 on B; extraction produced 6
        // candidates, 5 from A. With a per-competitor ceiling of 2 the
        // validator drops 3 of A's hooks and backfills 3 generated ones,
        // leaving the total count unchanged.
        let policy = QuotaPolicy {
            cap: 6,
            max_per_competitor: 2,
            slack: 1,
        };
        let competitors = vec![competitor("a", 5), competitor("b", 1)];
        let quota = compute_distribution(&competitors, &policy);
        assert_eq!(quota.for_competitor("a"), 2);

        let hooks = vec![
            extracted("a-first", "a"),
            extracted("a-second", "a"),
            extracted("a-third", "a"),
            extracted("a-fourth", "a"),
            extracted("a-fifth", "a"),
            extracted("b-only", "b"),
        ];
        let fallback = vec![
            HookCandidate::generated("g1"),
            HookCandidate::generated("g2"),
            HookCandidate::generated("g3"),
            HookCandidate::generated("g4"),
        ];

        let violations = validate_diversity(&hooks, &quota);
        assert_eq!(violations[0].excess, 3);

        let remediated = remediate(hooks, &violations, &fallback, &quota);
        assert_eq!(remediated.len(), 6);

        let counts = counts_by_competitor(&remediated);
        assert_eq!(counts.get("a"), Some(&2));
        assert_eq!(counts.get("b"), Some(&1));

        // Earliest entries retained, in their original order.
        assert_eq!(remediated[0].text, "a-first");
        assert_eq!(remediated[1].text, "a-second");
        let generated = remediated
            .iter()
            .filter(|h| h.provenance == HookProvenance::Generated)
            .count();
        assert_eq!(generated, 3);
    }

    #[test]
    fn test_remediation_with_exhausted_pool_shrinks() {
        let policy = QuotaPolicy {
            cap: 6,
            max_per_competitor: 1,
            slack: 0,
        };
        let competitors = vec![competitor("a", 4)];
        let quota = compute_distribution(&competitors, &policy);

        let hooks = vec![
            extracted("h1", "a"),
            extracted("h2", "a"),
            extracted("h3", "a"),
        ];
        let fallback = vec![HookCandidate::generated("g1")];

        let violations = validate_diversity(&hooks, &quota);
        let remediated = remediate(hooks, &violations, &fallback, &quota);

        // One kept for A, one backfilled; the pool had nothing more.
        assert_eq!(remediated.len(), 2);
    }

    #[test]
    fn test_segment_filter_swaps_flagged_hooks() {
        let policy = QuotaPolicy {
            cap: 4,
            max_per_competitor: 2,
            slack: 0,
        };
        let quota = compute_distribution(&[competitor("a", 2)], &policy);

        let hooks = vec![
            extracted("fits the segment", "a"),
            extracted("Enterprise-only pitch", "a"),
        ];
        let verdict = SegmentValidationResult {
            off_segment: vec!["enterprise-only pitch".to_string()],
            cost: 0.0,
            complete: true,
        };
        let fallback = vec![HookCandidate::generated("replacement")];

        let result = apply_segment_filter(hooks, &verdict, &fallback, &quota);
        assert_eq!(result.len(), 2);
        assert!(result.iter().any(|h| h.text == "replacement"));
        assert!(result.iter().all(|h| normalize(&h.text) != "enterprise-only pitch"));
    }

    #[test]
    fn test_curate_orders_pool_by_provenance_and_caps() {
        let policy = QuotaPolicy {
            cap: 3,
            max_per_competitor: 2,
            slack: 0,
        };
        let competitors = vec![competitor("a", 1), competitor("b", 1)];

        let extracted_pool = vec![
            HookCandidate {
                text: "inspired one".into(),
                provenance: HookProvenance::Inspired,
                competitor_id: Some("a".into()),
            },
            extracted("extracted one", "b"),
        ];
        let generated = vec![
            HookCandidate::generated("gen one"),
            HookCandidate::generated("gen two"),
        ];

        let result = curate(extracted_pool, generated, None, &competitors, &policy);
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].provenance, HookProvenance::Extracted);
        assert_eq!(result[1].provenance, HookProvenance::Inspired);
        assert_eq!(result[2].provenance, HookProvenance::Generated);
    }

    #[test]
    fn test_curate_final_length_is_min_of_cap_and_distinct() {
        let policy = QuotaPolicy {
            cap: 10,
            max_per_competitor: 3,
            slack: 1,
        };
        let competitors = vec![competitor("a", 1)];

        // Duplicate texts collapse before the cap applies.
        let extracted_pool = vec![
            extracted("same text", "a"),
            extracted("Same Text", "a"),
            extracted("other", "a"),
        ];
        let result = curate(extracted_pool, vec![], None, &competitors, &policy);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_curate_never_exceeds_quota_or_cap() {
        let policy = QuotaPolicy {
            cap: 4,
            max_per_competitor: 2,
            slack: 0,
        };
        let competitors = vec![competitor("a", 6), competitor("b", 2)];
        let extracted_pool = vec![
            extracted("a1", "a"),
            extracted("a2", "a"),
            extracted("a3", "a"),
            extracted("a4", "a"),
            extracted("b1", "b"),
            extracted("b2", "b"),
        ];
        let generated = vec![
            HookCandidate::generated("g1"),
            HookCandidate::generated("g2"),
            HookCandidate::generated("g3"),
        ];

        let result = curate(extracted_pool, generated, None, &competitors, &policy);
        assert!(result.len() <= policy.cap);
        let quota = compute_distribution(&competitors, &policy);
        for (id, count) in counts_by_competitor(&result) {
            assert!(count <= quota.for_competitor(&id));
        }
    }
}
