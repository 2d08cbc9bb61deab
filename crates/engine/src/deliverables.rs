use estimator_history::ScoredProject;
use estimator_protocol::{Deliverable, RiskyDeliverable};
use std::cmp::Ordering;

/// Historical misestimation statistics for the deliverables in scope.
///
/// Only the similarity-ranked comparables are scanned, not the full index,
/// so the statistics stay relevant to this project. Deliverables with zero
/// matching samples are omitted entirely.
pub fn aggregate(deliverables: &[Deliverable], comparables: &[ScoredProject]) -> Vec<RiskyDeliverable> {
    let mut risky = Vec::new();
    let mut seen: Vec<&str> = Vec::new();

    for deliverable in deliverables {
        let name = deliverable.name.as_str();
        // Dedupe with the same case rules as outcome matching, so "Piling"
        // and "piling" produce one row, not two identical ones.
        if seen.iter().any(|s| s.eq_ignore_ascii_case(name)) {
            continue;
        }
        seen.push(name);

        let mut errors = Vec::new();
        for comparable in comparables {
            for outcome in &comparable.project.deliverables {
                if !outcome.name.eq_ignore_ascii_case(name) {
                    continue;
                }
                if outcome.estimated_cost <= 0.0 {
                    // No baseline to compute a percentage error against.
                    continue;
                }
                errors.push(
                    (outcome.actual_cost - outcome.estimated_cost).abs() / outcome.estimated_cost,
                );
            }
        }

        if errors.is_empty() {
            continue;
        }
        risky.push(RiskyDeliverable {
            name: deliverable.name.clone(),
            avg_error: errors.iter().sum::<f64>() / errors.len() as f64,
            sample_size: errors.len(),
        });
    }

    risky.sort_by(|a, b| {
        b.avg_error
            .partial_cmp(&a.avg_error)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    risky
}

#[cfg(test)]
mod tests {
    use super::*;
    use estimator_history::{DeliverableOutcome, HistoricalProject};
    use pretty_assertions::assert_eq;

    fn deliverable(name: &str) -> Deliverable {
        Deliverable {
            name: name.to_string(),
            quantity: 1.0,
            unit: "ls".to_string(),
        }
    }

    fn comparable(outcomes: Vec<(&str, f64, f64)>) -> HistoricalProject {
        HistoricalProject {
            project_id: "p".to_string(),
            name: "p".to_string(),
            completion_year: 2022,
            embedding: vec![],
            actual_cost: 1.0,
            actual_duration: 1,
            deliverables: outcomes
                .into_iter()
                .map(|(name, estimated, actual)| DeliverableOutcome {
                    name: name.to_string(),
                    estimated_cost: estimated,
                    actual_cost: actual,
                })
                .collect(),
        }
    }

    fn scored(project: &HistoricalProject) -> ScoredProject {
        ScoredProject {
            project,
            score: 0.9,
        }
    }

    #[test]
    fn computes_mean_absolute_percentage_error() {
        let a = comparable(vec![("piling", 100.0, 150.0)]); // 50% over
        let b = comparable(vec![("piling", 200.0, 180.0)]); // 10% under
        let risky = aggregate(&[deliverable("piling")], &[scored(&a), scored(&b)]);

        assert_eq!(risky.len(), 1);
        assert_eq!(risky[0].sample_size, 2);
        assert!((risky[0].avg_error - 0.3).abs() < 1e-9);
    }

    #[test]
    fn zero_sample_deliverables_are_omitted() {
        let a = comparable(vec![("piling", 100.0, 150.0)]);
        let risky = aggregate(
            &[deliverable("piling"), deliverable("facade")],
            &[scored(&a)],
        );
        assert_eq!(risky.len(), 1);
        assert_eq!(risky[0].name, "piling");
        assert!(risky.iter().all(|r| r.sample_size >= 1));
    }

    #[test]
    fn sorted_by_avg_error_descending() {
        let a = comparable(vec![("piling", 100.0, 110.0), ("facade", 100.0, 190.0)]);
        let risky = aggregate(
            &[deliverable("piling"), deliverable("facade")],
            &[scored(&a)],
        );
        assert_eq!(risky[0].name, "facade");
        assert_eq!(risky[1].name, "piling");
    }

    #[test]
    fn matching_is_case_insensitive_and_skips_zero_baselines() {
        let a = comparable(vec![("Piling", 100.0, 130.0), ("piling", 0.0, 50.0)]);
        let risky = aggregate(&[deliverable("piling")], &[scored(&a)]);
        assert_eq!(risky[0].sample_size, 1);
        assert!((risky[0].avg_error - 0.3).abs() < 1e-9);
    }

    #[test]
    fn case_variant_duplicates_emit_one_row() {
        let a = comparable(vec![("piling", 100.0, 130.0)]);
        let risky = aggregate(
            &[deliverable("Piling"), deliverable("piling")],
            &[scored(&a)],
        );
        assert_eq!(risky.len(), 1);
        assert_eq!(risky[0].name, "Piling");
        assert_eq!(risky[0].sample_size, 1);
    }

    #[test]
    fn no_comparables_means_no_risky_deliverables() {
        let risky = aggregate(&[deliverable("piling")], &[]);
        assert!(risky.is_empty());
    }
}
