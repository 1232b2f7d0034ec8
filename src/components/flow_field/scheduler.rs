//! Animation-frame scheduling with a capped render rate.
//!
//! The host delivers callbacks at its native refresh rate. The scheduler keeps
//! at most one callback pending and only lets a callback render when a full
//! frame interval (`1000 / target_fps` ms) has passed since the last render.

/// Handle returned by the host for a pending callback.
pub type FrameHandle = i32;

/// Host animation-frame API (`requestAnimationFrame` in the browser).
pub trait FrameDriver {
	/// Ask for one callback; `None` if the host refused.
	fn request_frame(&mut self) -> Option<FrameHandle>;
	/// Cancel a pending callback.
	fn cancel_frame(&mut self, handle: FrameHandle);
}

pub struct Scheduler {
	pending: Option<FrameHandle>,
	last_frame: Option<f64>,
	interval_ms: f64,
}

impl Scheduler {
	pub fn new(target_fps: f64) -> Self {
		Self {
			pending: None,
			last_frame: None,
			interval_ms: interval_for(target_fps),
		}
	}

	pub fn set_target_fps(&mut self, target_fps: f64) {
		self.interval_ms = interval_for(target_fps);
	}

	pub fn is_scheduled(&self) -> bool {
		self.pending.is_some()
	}

	/// Request a callback unless one is already pending.
	pub fn schedule(&mut self, driver: &mut impl FrameDriver) {
		if self.pending.is_none() {
			self.pending = driver.request_frame();
		}
	}

	/// Mark the pending callback as delivered.
	pub fn fired(&mut self) {
		self.pending = None;
	}

	/// Cancel the pending callback, if any. Safe to call repeatedly.
	pub fn cancel(&mut self, driver: &mut impl FrameDriver) {
		if let Some(handle) = self.pending.take() {
			driver.cancel_frame(handle);
		}
	}

	/// Measure the next render interval from `now`.
	pub fn reset_clock(&mut self, now: f64) {
		self.last_frame = Some(now);
	}

	/// If a render is due at `now`, record it and return the real interval
	/// since the previous render (one frame interval for the very first).
	pub fn due(&mut self, now: f64) -> Option<f64> {
		match self.last_frame {
			Some(last) if now - last < self.interval_ms => None,
			Some(last) => {
				self.last_frame = Some(now);
				Some(now - last)
			}
			None => {
				self.last_frame = Some(now);
				Some(self.interval_ms)
			}
		}
	}
}

fn interval_for(target_fps: f64) -> f64 {
	if target_fps.is_finite() && target_fps > 0.0 {
		1000.0 / target_fps
	} else {
		0.0
	}
}
