//! Tunable parameters and the responsive preset resolver.
//!
//! The engine consumes one resolved [`FlowConfig`] at a time. Pages can
//! override the built-in presets by embedding JSON in a script element:
//!
//! ```json
//! { "motion": "flow", "breakpoint": 768, "mobile": { "targetFps": 20 } }
//! ```
//!
//! Every field is optional; missing fields fall back to the preset for the
//! chosen motion model and device class.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Viewport widths below this use the mobile preset.
pub const MOBILE_BREAKPOINT: f64 = 768.0;

/// Which motion rule drives the particles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionKind {
	/// Swirling drift through a smooth vector field, with pointer attraction.
	#[default]
	Flow,
	/// Straight meteor streaks that wrap from top back to bottom.
	Meteor,
}

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
	/// The JSON could not be parsed.
	#[error("failed to parse flow config: {0}")]
	Parse(#[from] serde_json::Error),

	/// Population bounds are inverted.
	#[error("min population {min} exceeds max population {max}")]
	PopulationBounds { min: usize, max: usize },

	/// Speed bounds are inverted.
	#[error("min speed {min} exceeds max speed {max}")]
	SpeedBounds { min: f64, max: f64 },

	/// A numeric field is outside its allowed range.
	#[error("{field} = {value} is out of range")]
	OutOfRange { field: &'static str, value: f64 },
}

/// Complete set of tunables for one device class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlowConfig {
	/// Motion rule for this device class.
	pub motion: MotionKind,
	/// Population bounds applied after the area estimate.
	pub min_population: usize,
	pub max_population: usize,
	/// Particles per square logical pixel.
	pub density: f64,
	/// Spawn speed range of meteor particles.
	pub speed_min: f64,
	pub speed_max: f64,
	/// Acceleration applied along the field direction.
	pub field_strength: f64,
	/// Velocity multiplier per nominal frame, in `(0, 1]`.
	pub damping: f64,
	/// Pull toward the pointer per logical pixel of distance.
	pub pointer_attraction: f64,
	/// How far past the surface edges a flow particle may drift before recycling.
	pub bounds_margin: f64,
	/// Probability that a spawned particle lands in the near layer.
	pub near_ratio: f64,
	/// Trail length in logical pixels for far and near particles.
	pub trail_length: f64,
	pub trail_length_near: f64,
	/// Alpha of the background fill painted every rendered frame.
	pub fade: f64,
	/// Overall multiplier on the stroke shadow blur.
	pub glow: f64,
	/// Per-layer stroke weights.
	pub near_line_width: f64,
	pub far_line_width: f64,
	pub near_glow: f64,
	pub far_glow: f64,
	pub near_alpha: f64,
	pub far_alpha: f64,
	/// Upper bound on the device-pixel-ratio used for the backing store.
	pub max_dpr: f64,
	/// Render rate cap.
	pub target_fps: f64,
	/// Start-up ramp: population grows from `ramp_start_ratio` of the target
	/// to all of it over `ramp_duration_ms`.
	pub ramp_duration_ms: f64,
	pub ramp_start_ratio: f64,
	/// Maximum particles added per tick while the population grows.
	pub ramp_step: usize,
	/// Warm-up frames averaged, and the frame rate below which the backdrop
	/// turns itself off.
	pub perf_sample_window: usize,
	pub perf_min_fps: f64,
}

impl FlowConfig {
	/// Desktop preset for the given motion model.
	pub fn desktop(motion: MotionKind) -> Self {
		match motion {
			MotionKind::Flow => Self {
				motion,
				min_population: 900,
				max_population: 2600,
				density: 0.0003,
				speed_min: 2.8,
				speed_max: 6.5,
				field_strength: 0.12,
				damping: 0.92,
				pointer_attraction: 0.0006,
				bounds_margin: 40.0,
				near_ratio: 0.4,
				trail_length: 10.0,
				trail_length_near: 18.0,
				fade: 0.08,
				glow: 0.7,
				near_line_width: 1.6,
				far_line_width: 0.8,
				near_glow: 1.2,
				far_glow: 0.6,
				near_alpha: 0.85,
				far_alpha: 0.4,
				max_dpr: 1.5,
				target_fps: 30.0,
				ramp_duration_ms: 4000.0,
				ramp_start_ratio: 0.4,
				ramp_step: 40,
				perf_sample_window: 60,
				perf_min_fps: 15.0,
			},
			MotionKind::Meteor => Self {
				min_population: 28,
				max_population: 65,
				density: 0.000018,
				trail_length: 42.0,
				trail_length_near: 72.0,
				fade: 0.04,
				near_line_width: 2.0,
				far_line_width: 1.0,
				ramp_step: 3,
				..Self::desktop(MotionKind::Flow)
			}
			.with_motion(motion),
		}
	}

	/// Mobile preset for the given motion model: fewer, thinner, slower.
	pub fn mobile(motion: MotionKind) -> Self {
		let base = Self::desktop(motion);
		match motion {
			MotionKind::Flow => Self {
				min_population: 400,
				max_population: 1200,
				density: 0.0002,
				trail_length: 8.0,
				trail_length_near: 14.0,
				..base.mobile_common()
			},
			MotionKind::Meteor => Self {
				min_population: 18,
				max_population: 40,
				density: 0.000012,
				speed_min: 2.2,
				speed_max: 5.0,
				trail_length: 32.0,
				trail_length_near: 52.0,
				fade: 0.05,
				..base.mobile_common()
			},
		}
	}

	fn mobile_common(self) -> Self {
		Self {
			glow: 0.5,
			max_dpr: 1.2,
			target_fps: 24.0,
			near_line_width: 1.6,
			far_line_width: 0.85,
			near_glow: 1.0,
			far_glow: 0.5,
			near_alpha: 0.75,
			far_alpha: 0.35,
			..self
		}
	}

	fn with_motion(self, motion: MotionKind) -> Self {
		Self { motion, ..self }
	}

	/// Check cross-field constraints; returns the config unchanged when valid.
	pub fn validate(self) -> Result<Self, ConfigError> {
		if self.min_population > self.max_population {
			return Err(ConfigError::PopulationBounds {
				min: self.min_population,
				max: self.max_population,
			});
		}
		if self.speed_min > self.speed_max {
			return Err(ConfigError::SpeedBounds {
				min: self.speed_min,
				max: self.speed_max,
			});
		}

		let checks: [(&'static str, f64, bool); 8] = [
			("targetFps", self.target_fps, self.target_fps > 0.0),
			("damping", self.damping, self.damping > 0.0 && self.damping <= 1.0),
			("nearRatio", self.near_ratio, (0.0..=1.0).contains(&self.near_ratio)),
			(
				"rampStartRatio",
				self.ramp_start_ratio,
				(0.0..=1.0).contains(&self.ramp_start_ratio),
			),
			("rampDurationMs", self.ramp_duration_ms, self.ramp_duration_ms > 0.0),
			("rampStep", self.ramp_step as f64, self.ramp_step > 0),
			(
				"perfSampleWindow",
				self.perf_sample_window as f64,
				self.perf_sample_window > 0,
			),
			("density", self.density, self.density >= 0.0),
		];
		for (field, value, ok) in checks {
			if !ok || value.is_nan() {
				return Err(ConfigError::OutOfRange { field, value });
			}
		}
		Ok(self)
	}

	/// Layer-dependent trail length.
	pub fn trail_length_for(&self, near: bool) -> f64 {
		if near {
			self.trail_length_near
		} else {
			self.trail_length
		}
	}
}

impl Default for FlowConfig {
	fn default() -> Self {
		Self::desktop(MotionKind::Flow)
	}
}

/// Page-level settings: a motion model plus optional per-device overrides.
///
/// Overrides are kept as raw JSON objects and laid over the preset for their
/// device class when resolved.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlowSettings {
	pub motion: MotionKind,
	pub breakpoint: f64,
	pub desktop: Option<Map<String, Value>>,
	pub mobile: Option<Map<String, Value>>,
}

impl Default for FlowSettings {
	fn default() -> Self {
		Self {
			motion: MotionKind::Flow,
			breakpoint: MOBILE_BREAKPOINT,
			desktop: None,
			mobile: None,
		}
	}
}

impl FlowSettings {
	/// Parse settings from JSON, rejecting overrides that do not resolve to a
	/// valid configuration for either device class.
	pub fn from_json(json: &str) -> Result<Self, ConfigError> {
		let settings: Self = serde_json::from_str(json)?;
		settings.try_resolve(false)?;
		settings.try_resolve(true)?;
		Ok(settings)
	}

	/// Pick the configuration for a viewport of the given logical width.
	///
	/// Falls back to the bare preset if the override no longer validates.
	pub fn resolve(&self, viewport_width: f64) -> FlowConfig {
		let mobile = viewport_width < self.breakpoint;
		self.try_resolve(mobile).unwrap_or_else(|e| {
			warn!("flow-backdrop: ignoring config override: {}", e);
			self.preset(mobile)
		})
	}

	fn preset(&self, mobile: bool) -> FlowConfig {
		if mobile {
			FlowConfig::mobile(self.motion)
		} else {
			FlowConfig::desktop(self.motion)
		}
	}

	fn try_resolve(&self, mobile: bool) -> Result<FlowConfig, ConfigError> {
		let preset = self.preset(mobile);
		let overrides = if mobile { &self.mobile } else { &self.desktop };
		let Some(overrides) = overrides else {
			return Ok(preset);
		};

		let mut merged = match serde_json::to_value(&preset)? {
			Value::Object(map) => map,
			_ => Map::new(),
		};
		for (key, value) in overrides {
			merged.insert(key.clone(), value.clone());
		}
		let config: FlowConfig = serde_json::from_value(Value::Object(merged))?;
		config.validate()
	}
}
