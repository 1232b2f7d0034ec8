//! One-shot frame-rate check run while the backdrop warms up.
//!
//! The governor records wall-clock intervals between animation callbacks.
//! Once the sample window is full it estimates the frame rate and settles on
//! [`GovernorState::Ok`] or [`GovernorState::Disabled`]. Both outcomes are
//! final; a device that slows down later is not re-checked.

/// Outcome of the warm-up measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GovernorState {
	/// Still collecting samples.
	Warmup,
	/// Fast enough; no further checks.
	Ok,
	/// Too slow; the estimated frame rate is attached.
	Disabled { fps: f64 },
}

pub struct PerformanceGovernor {
	state: GovernorState,
	samples: Vec<f64>,
	window: usize,
	min_fps: f64,
	last: Option<f64>,
}

impl PerformanceGovernor {
	pub fn new(window: usize, min_fps: f64) -> Self {
		let window = window.max(1);
		Self {
			state: GovernorState::Warmup,
			samples: Vec::with_capacity(window),
			window,
			min_fps,
			last: None,
		}
	}

	pub fn state(&self) -> GovernorState {
		self.state
	}

	/// Set the timestamp the next interval is measured from.
	///
	/// Called on start and when the page becomes visible again, so time spent
	/// hidden is never sampled.
	pub fn rebase(&mut self, now: f64) {
		self.last = Some(now);
	}

	/// Record a callback at `now` and return the (possibly updated) state.
	pub fn observe(&mut self, now: f64) -> GovernorState {
		if self.state != GovernorState::Warmup {
			return self.state;
		}

		if let Some(last) = self.last {
			self.samples.push((now - last).max(0.0));
		}
		self.last = Some(now);

		if self.samples.len() >= self.window {
			let mean = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
			let fps = if mean > 0.0 { 1000.0 / mean } else { f64::INFINITY };
			self.state = if fps < self.min_fps {
				GovernorState::Disabled { fps }
			} else {
				GovernorState::Ok
			};
			self.samples = Vec::new();
		}
		self.state
	}
}
