//! Population sizing and the start-up ramp.
//!
//! The full population for a surface is proportional to its area, clamped to
//! the configured bounds. On start the engine shows only a fraction of it and
//! grows linearly to 100% over the ramp duration, adding at most
//! `ramp_step` particles per tick.

use super::config::FlowConfig;

/// Full particle count for a surface of the given logical size.
pub fn population_for_area(width: f64, height: f64, config: &FlowConfig) -> usize {
	let area = (width * height).max(0.0);
	let count = (area * config.density).floor();
	let count = if count.is_finite() { count as usize } else { 0 };
	count.min(config.max_population).max(config.min_population)
}

/// Ramp timing taken from the configuration.
#[derive(Clone, Copy, Debug)]
pub struct RampController {
	start_ratio: f64,
	duration_ms: f64,
	step: usize,
}

impl RampController {
	pub fn new(config: &FlowConfig) -> Self {
		Self {
			start_ratio: config.ramp_start_ratio.clamp(0.0, 1.0),
			duration_ms: config.ramp_duration_ms,
			step: config.ramp_step.max(1),
		}
	}

	fn progress(&self, elapsed_ms: f64) -> f64 {
		if self.duration_ms > 0.0 {
			(elapsed_ms.max(0.0) / self.duration_ms).min(1.0)
		} else {
			1.0
		}
	}

	/// Fraction of the full population that should be live after `elapsed_ms`.
	pub fn ratio(&self, elapsed_ms: f64) -> f64 {
		self.start_ratio + (1.0 - self.start_ratio) * self.progress(elapsed_ms)
	}

	/// Target live count after `elapsed_ms`, never below 1.
	pub fn target(&self, elapsed_ms: f64, base_count: usize) -> usize {
		if self.progress(elapsed_ms) >= 1.0 {
			return base_count.max(1);
		}
		let count = (base_count as f64 * self.ratio(elapsed_ms)).floor() as usize;
		count.min(base_count).max(1)
	}

	/// Next live count when moving from `current` toward `target`.
	///
	/// Growth is limited to `step` per call; shrinking happens at once.
	pub fn next_population(&self, current: usize, target: usize) -> usize {
		if current < target {
			current + (target - current).min(self.step)
		} else {
			target
		}
	}
}
