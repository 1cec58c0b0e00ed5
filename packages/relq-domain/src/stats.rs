use crate::execution::LatencyPercentiles;

/// Nearest-rank percentile: the value at rank `ceil(p * n / 100)` of the sorted samples.
///
/// `sorted` must be ascending. Returns `None` for an empty sample.
pub fn nearest_rank(sorted: &[u64], percentile: u32) -> Option<u64> {
	if sorted.is_empty() {
		return None;
	}

	let n = sorted.len();
	let percentile = percentile.min(100) as usize;
	let rank = (percentile * n).div_ceil(100).max(1);

	sorted.get(rank - 1).copied()
}

pub fn latency_percentiles(samples: &[u64]) -> Option<LatencyPercentiles> {
	let mut sorted = samples.to_vec();

	sorted.sort_unstable();

	Some(LatencyPercentiles {
		p50_ms: nearest_rank(&sorted, 50)?,
		p95_ms: nearest_rank(&sorted, 95)?,
		p99_ms: nearest_rank(&sorted, 99)?,
	})
}

pub fn mean<I>(values: I) -> Option<f64>
where
	I: IntoIterator<Item = f64>,
{
	let mut sum = 0.0_f64;
	let mut count = 0_usize;

	for value in values {
		sum += value;
		count += 1;
	}

	(count > 0).then(|| sum / count as f64)
}
