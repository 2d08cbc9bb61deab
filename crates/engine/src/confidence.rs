use estimator_predictor::CostBand;
use estimator_protocol::SimilarProject;

/// Fixed signal weights. Band tightness is capped low enough that an index
/// with no history cannot score above the low-confidence threshold.
const WEIGHT_BAND_TIGHTNESS: f32 = 0.20;
const WEIGHT_MEAN_SIMILARITY: f32 = 0.50;
const WEIGHT_HISTORY_SATURATION: f32 = 0.30;

/// Number of indexed projects at which the history signal saturates.
const SATURATION_PROJECT_COUNT: usize = 25;

/// Predictions scoring at or below this are considered low-confidence.
pub const LOW_CONFIDENCE_THRESHOLD: f32 = 0.2;

/// Combine band tightness, comparable quality and history volume into one
/// score in [0, 1]. Monotonic in each signal.
pub fn score(cost: &CostBand, comparables: &[SimilarProject], indexed_projects: usize) -> f32 {
    let tightness = band_tightness(cost);
    let mean_similarity = if comparables.is_empty() {
        0.0
    } else {
        comparables
            .iter()
            .map(|c| c.similarity_score.clamp(0.0, 1.0))
            .sum::<f32>()
            / comparables.len() as f32
    };
    let saturation =
        (indexed_projects as f32 / SATURATION_PROJECT_COUNT as f32).clamp(0.0, 1.0);

    let combined = WEIGHT_BAND_TIGHTNESS * tightness
        + WEIGHT_MEAN_SIMILARITY * mean_similarity
        + WEIGHT_HISTORY_SATURATION * saturation;

    log::debug!(
        "Confidence: tightness={:.3} mean_similarity={:.3} saturation={:.3} -> {:.3}",
        tightness,
        mean_similarity,
        saturation,
        combined
    );
    combined.clamp(0.0, 1.0)
}

/// Inverse relative spread of the quantile band: 1 when p90 equals p50,
/// falling to 0 as the band widens past the p50 value itself.
fn band_tightness(cost: &CostBand) -> f32 {
    if cost.p50 <= 0.0 {
        return 0.0;
    }
    let spread = ((cost.p90 - cost.p50) / cost.p50).clamp(0.0, 1.0);
    1.0 - spread as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(p50: f64, p90: f64) -> CostBand {
        CostBand {
            p50,
            p80: (p50 + p90) / 2.0,
            p90,
        }
    }

    fn comparable(similarity: f32) -> SimilarProject {
        SimilarProject {
            name: "c".to_string(),
            year: 2022,
            actual_cost: 1.0,
            actual_duration: 1,
            similarity_score: similarity,
        }
    }

    #[test]
    fn empty_index_scores_at_or_below_low_confidence_threshold() {
        let tight = band(1_000_000.0, 1_000_000.0);
        assert!(score(&tight, &[], 0) <= LOW_CONFIDENCE_THRESHOLD);
    }

    #[test]
    fn score_stays_in_unit_interval() {
        let comparables: Vec<SimilarProject> = (0..10).map(|_| comparable(1.0)).collect();
        let s = score(&band(1_000_000.0, 1_000_000.0), &comparables, 10_000);
        assert!((0.0..=1.0).contains(&s));

        let s = score(&band(0.0, 5_000_000.0), &[], 0);
        assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn monotonic_in_each_signal() {
        let comparables = vec![comparable(0.9), comparable(0.8)];

        // Tighter band, everything else equal.
        let wide = score(&band(1_000_000.0, 1_900_000.0), &comparables, 10);
        let tight = score(&band(1_000_000.0, 1_100_000.0), &comparables, 10);
        assert!(tight > wide);

        // Better matches.
        let weak = vec![comparable(0.3), comparable(0.2)];
        assert!(
            score(&band(1_000_000.0, 1_200_000.0), &comparables, 10)
                > score(&band(1_000_000.0, 1_200_000.0), &weak, 10)
        );

        // More history, saturating.
        let little = score(&band(1_000_000.0, 1_200_000.0), &comparables, 2);
        let plenty = score(&band(1_000_000.0, 1_200_000.0), &comparables, 25);
        let beyond = score(&band(1_000_000.0, 1_200_000.0), &comparables, 2_500);
        assert!(plenty > little);
        assert!((beyond - plenty).abs() < 1e-6);
    }
}
