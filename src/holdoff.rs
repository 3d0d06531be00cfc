use core::time::Duration;
use std::{cmp, ops::Range};

/// Delay applied before reconnecting to the broker.
///
/// The first failure waits `min`, each further failure doubles the previous
/// delay up to `max`. With `min == max` this is a fixed delay.
#[derive(Debug)]
pub struct HoldOff {
	min: Duration,
	max: Duration,
	cur: Option<Duration>,
}

impl HoldOff {
	pub fn new(r: Range<Duration>) -> Self {
		Self {
			min: r.start,
			max: cmp::max(r.start, r.end),
			cur: None,
		}
	}

	/// A hold-off which always waits `delay`.
	pub fn fixed(delay: Duration) -> Self {
		Self::new(delay..delay)
	}

	/// Forget any previous failures; the next `increase()` yields `min` again.
	#[inline]
	pub fn reset(&mut self) {
		self.cur = None;
	}

	/// Records a failure and returns the delay to wait before the next
	/// attempt.
	pub fn increase(&mut self) -> Duration {
		let next = match self.cur {
			None => self.min,
			Some(cur) => cmp::min(cmp::max(cur, cur.saturating_mul(2)), self.max),
		};
		self.cur = Some(next);
		next
	}

	#[cfg(test)]
	fn current(&self) -> Option<Duration> {
		self.cur
	}

	/// Sleep for the current hold-off period. A no-op until the first
	/// `increase()`.
	#[inline]
	pub async fn wait(&self) {
		if let Some(duration) = self.cur {
			tokio::time::sleep(duration).await
		}
	}
}

#[cfg(test)]
mod tests {
	use super::HoldOff;
	use std::time::Duration;
	use tokio::time::Instant;

	const SECOND: Duration = Duration::from_secs(1);

	#[test]
	fn fixed_delay_never_grows() {
		let mut holdoff = HoldOff::fixed(10 * SECOND);
		assert_eq!(holdoff.current(), None);
		for _ in 0..4 {
			assert_eq!(holdoff.increase(), 10 * SECOND);
		}
	}

	#[test]
	fn doubles_up_to_max() {
		let mut holdoff = HoldOff::new(SECOND..5 * SECOND);
		let delays: Vec<_> = (0..5).map(|_| holdoff.increase()).collect();
		assert_eq!(
			delays,
			[SECOND, 2 * SECOND, 4 * SECOND, 5 * SECOND, 5 * SECOND]
		);

		holdoff.reset();
		assert_eq!(holdoff.current(), None);
		assert_eq!(holdoff.increase(), SECOND);
	}

	#[test]
	fn inverted_range_uses_min() {
		let mut holdoff = HoldOff::new(3 * SECOND..SECOND);
		assert_eq!(holdoff.increase(), 3 * SECOND);
		assert_eq!(holdoff.increase(), 3 * SECOND);
	}

	#[tokio::test(start_paused = true)]
	async fn waits_current_delay() {
		let mut holdoff = HoldOff::fixed(10 * SECOND);

		let start = Instant::now();
		holdoff.wait().await;
		assert_eq!(start.elapsed(), Duration::ZERO);

		holdoff.increase();
		holdoff.wait().await;
		assert!(start.elapsed() >= 10 * SECOND);
	}
}
