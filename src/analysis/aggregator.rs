//! Vote aggregation and statistics.
//!
//! This module turns the raw votes recorded against a problem into the
//! numbers shown on the result screen: mean, population standard
//! deviation, the caller's T-score and an 11-bucket histogram.

use crate::models::{AggregateResult, HistogramBin, UserVoteStats, Vote};

/// Histogram labels, one per bucket. Index 10 holds a perfect 100 only.
pub const BUCKET_LABELS: [&str; 11] = [
    "0-9", "10-19", "20-29", "30-39", "40-49", "50-59", "60-69", "70-79", "80-89", "90-99", "100",
];

/// T-score of a caller when there is nothing to compare against.
pub const NEUTRAL_DEVIATION: f64 = 50.0;

/// Unrounded population statistics over a set of points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// Population variance (divisor N).
    pub variance: f64,
    pub std_dev: f64,
}

/// Compute count, mean, variance and standard deviation.
///
/// Returns all zeros for an empty slice.
pub fn summarize(points: &[i32]) -> Summary {
    if points.is_empty() {
        return Summary::default();
    }

    let count = points.len() as f64;
    let mean = points.iter().map(|&p| f64::from(p)).sum::<f64>() / count;
    let variance = points
        .iter()
        .map(|&p| (f64::from(p) - mean).powi(2))
        .sum::<f64>()
        / count;

    Summary {
        count: points.len(),
        mean,
        variance,
        std_dev: variance.sqrt(),
    }
}

/// Bucket index for a point: tens digit, clamped to `0..=10`.
pub fn bucket_index(point: i32) -> usize {
    point.div_euclid(10).clamp(0, 10) as usize
}

/// Count points per bucket.
pub fn histogram(points: &[i32]) -> Vec<HistogramBin> {
    let mut counts = [0usize; 11];

    for &point in points {
        counts[bucket_index(point)] += 1;
    }

    BUCKET_LABELS
        .iter()
        .zip(counts)
        .map(|(label, count)| HistogramBin {
            range: (*label).to_string(),
            count,
        })
        .collect()
}

/// T-score of `score` against a population. Neutral when the spread is zero.
pub fn t_score(score: i32, summary: &Summary) -> f64 {
    if summary.std_dev > 0.0 {
        NEUTRAL_DEVIATION + 10.0 * (f64::from(score) - summary.mean) / summary.std_dev
    } else {
        NEUTRAL_DEVIATION
    }
}

/// Round to one decimal place, half away from zero.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Build the result screen data for one problem.
///
/// Never fails: an empty vote set yields zero statistics, a neutral
/// deviation of 50 and an all-zero histogram.
pub fn aggregate(points: &[i32], user_score: i32) -> AggregateResult {
    let summary = summarize(points);

    AggregateResult {
        average: round1(summary.mean),
        std_dev: round1(summary.std_dev),
        user_score,
        user_dev: round1(t_score(user_score, &summary)),
        vote_count: summary.count,
        histogram: histogram(points),
    }
}

/// Aggregate directly from stored votes.
pub fn aggregate_votes(votes: &[Vote], user_score: i32) -> AggregateResult {
    let points: Vec<i32> = votes.iter().map(|v| v.point).collect();
    aggregate(&points, user_score)
}

/// Summarize a user's voting history.
pub fn user_vote_stats(user_id: i64, votes: Vec<Vote>) -> UserVoteStats {
    let points: Vec<i32> = votes.iter().map(|v| v.point).collect();
    let summary = summarize(&points);

    UserVoteStats {
        user_id,
        total_votes: summary.count,
        average_score: summary.mean,
        min_score: points.iter().min().copied(),
        max_score: points.iter().max().copied(),
        votes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn count_of(result: &AggregateResult, label: &str) -> usize {
        result
            .histogram
            .iter()
            .find(|bin| bin.range == label)
            .map(|bin| bin.count)
            .unwrap()
    }

    fn create_test_vote(user_id: i64, point: i32) -> Vote {
        Vote {
            id: 0,
            problem_id: 1,
            user_id,
            point,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_votes() {
        let result = aggregate(&[], 73);

        assert_eq!(result.vote_count, 0);
        assert_eq!(result.average, 0.0);
        assert_eq!(result.std_dev, 0.0);
        assert_eq!(result.user_score, 73);
        assert_eq!(result.user_dev, 50.0);
        assert_eq!(result.histogram.len(), 11);
        assert!(result.histogram.iter().all(|bin| bin.count == 0));
    }

    #[test]
    fn test_single_vote_has_neutral_deviation() {
        let result = aggregate(&[50], 50);

        assert_eq!(result.average, 50.0);
        assert_eq!(result.std_dev, 0.0);
        assert_eq!(result.user_dev, 50.0);
        assert_eq!(count_of(&result, "50-59"), 1);
    }

    #[test]
    fn test_identical_votes_ignore_user_score() {
        // Zero spread: any caller score is neutral.
        let result = aggregate(&[70, 70, 70], 10);
        assert_eq!(result.std_dev, 0.0);
        assert_eq!(result.user_dev, 50.0);
    }

    #[test]
    fn test_extremes() {
        let summary = summarize(&[0, 100]);
        assert_eq!(summary.mean, 50.0);
        assert_eq!(summary.variance, 2500.0);
        assert_eq!(summary.std_dev, 50.0);

        let result = aggregate(&[0, 100], 50);
        assert_eq!(result.average, 50.0);
        assert_eq!(result.std_dev, 50.0);
        assert_eq!(result.user_dev, 50.0);
        assert_eq!(count_of(&result, "0-9"), 1);
        assert_eq!(count_of(&result, "100"), 1);

        let others: usize = result
            .histogram
            .iter()
            .filter(|bin| bin.range != "0-9" && bin.range != "100")
            .map(|bin| bin.count)
            .sum();
        assert_eq!(others, 0);
    }

    #[test]
    fn test_one_vote_per_bucket() {
        let points = [10, 20, 30, 40, 50, 60, 70, 80, 90, 100];
        let result = aggregate(&points, 80);

        assert_eq!(result.average, 55.0);
        assert_eq!(count_of(&result, "0-9"), 0);
        for bin in &result.histogram[1..] {
            assert_eq!(bin.count, 1, "bucket {}", bin.range);
        }

        let summary = summarize(&points);
        assert_eq!(summary.variance, 825.0);
        assert_eq!(result.std_dev, round1(825f64.sqrt()));

        let expected = round1(50.0 + 10.0 * (80.0 - 55.0) / 825f64.sqrt());
        assert_eq!(result.user_dev, expected);
        assert_eq!(result.user_dev, 58.7);
    }

    #[test]
    fn test_hundred_never_lands_in_nineties() {
        let result = aggregate(&[90, 99, 100], 0);
        assert_eq!(count_of(&result, "90-99"), 2);
        assert_eq!(count_of(&result, "100"), 1);
    }

    #[test]
    fn test_bucket_index_boundaries() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(9), 0);
        assert_eq!(bucket_index(10), 1);
        assert_eq!(bucket_index(89), 8);
        assert_eq!(bucket_index(90), 9);
        assert_eq!(bucket_index(99), 9);
        assert_eq!(bucket_index(100), 10);
    }

    #[test]
    fn test_out_of_range_points_stay_in_bounds() {
        assert_eq!(bucket_index(-1), 0);
        assert_eq!(bucket_index(-250), 0);
        assert_eq!(bucket_index(150), 10);

        let result = aggregate(&[-5, 250], 0);
        assert_eq!(count_of(&result, "0-9"), 1);
        assert_eq!(count_of(&result, "100"), 1);
    }

    #[test]
    fn test_histogram_total_matches_vote_count() {
        let points: Vec<i32> = (0..500).map(|i| (i * 37) % 101).collect();
        let result = aggregate(&points, 42);

        let total: usize = result.histogram.iter().map(|bin| bin.count).sum();
        assert_eq!(total, result.vote_count);
        assert_eq!(result.vote_count, 500);
    }

    #[test]
    fn test_histogram_labels_in_order() {
        let labels: Vec<String> = aggregate(&[], 0)
            .histogram
            .into_iter()
            .map(|bin| bin.range)
            .collect();
        assert_eq!(labels, BUCKET_LABELS);
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let points = [12, 55, 55, 78, 91, 100, 3];
        let first = aggregate(&points, 66);
        let second = aggregate(&points, 66);

        assert_eq!(first, second);
        assert_eq!(first.user_dev.to_bits(), second.user_dev.to_bits());
    }

    #[test]
    fn test_order_does_not_matter() {
        let forward = aggregate(&[10, 40, 95, 100], 60);
        let reversed = aggregate(&[100, 95, 40, 10], 60);
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(28.722813), 28.7);
        assert_eq!(round1(0.05), 0.1);
        assert_eq!(round1(-0.25), -0.3);
        assert_eq!(round1(12.0), 12.0);
    }

    #[test]
    fn test_below_average_score() {
        let result = aggregate(&[0, 100], 0);
        assert_eq!(result.user_dev, 40.0);
    }

    #[test]
    fn test_aggregate_votes() {
        let votes = vec![create_test_vote(1, 0), create_test_vote(2, 100)];
        let result = aggregate_votes(&votes, 100);

        assert_eq!(result.vote_count, 2);
        assert_eq!(result.user_dev, 60.0);
    }

    #[test]
    fn test_user_vote_stats() {
        let votes = vec![
            create_test_vote(3, 40),
            create_test_vote(3, 90),
            create_test_vote(3, 65),
        ];

        let stats = user_vote_stats(3, votes);
        assert_eq!(stats.user_id, 3);
        assert_eq!(stats.total_votes, 3);
        assert_eq!(stats.average_score, 65.0);
        assert_eq!(stats.min_score, Some(40));
        assert_eq!(stats.max_score, Some(90));
        assert_eq!(stats.votes.len(), 3);
    }

    #[test]
    fn test_user_vote_stats_empty() {
        let stats = user_vote_stats(9, Vec::new());
        assert_eq!(stats.total_votes, 0);
        assert_eq!(stats.average_score, 0.0);
        assert!(stats.min_score.is_none());
        assert!(stats.max_score.is_none());
    }
}
