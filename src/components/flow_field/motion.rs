//! Per-tick particle motion.
//!
//! Two rules are available, selected by [`MotionKind`]:
//!
//! - **Flow**: particles accelerate along a smooth direction field built from
//!   sinusoids of position and time, are optionally pulled toward the pointer,
//!   and are damped every tick. A particle is recycled in place when its life
//!   runs out or it drifts past the inflated surface bounds.
//! - **Meteor**: particles keep their spawn velocity, wrap from the top back to
//!   below the bottom edge, and bounce softly off the side edges.
//!
//! Recycling always keeps the particle's depth layer.

use std::f64::consts::{FRAC_PI_2, PI};

use rand::Rng;

use super::config::{FlowConfig, MotionKind};
use super::particles::{DepthLayer, Particle, ParticleStore};
use super::surface::SurfaceDimensions;

/// Duration of one nominal frame; `dt = 1.0` means one 60Hz frame elapsed.
pub const NOMINAL_FRAME_MS: f64 = 16.67;
/// Longest real interval a single tick may integrate.
pub const MAX_FRAME_MS: f64 = 50.0;

const LIFE_MIN: f64 = 100.0;
const LIFE_MAX: f64 = 300.0;

// Meteor shape
const METEOR_SPREAD: f64 = 0.35;
const METEOR_DRIFT: f64 = 0.08;
const METEOR_EDGE: f64 = 20.0;
const METEOR_RESPAWN_JITTER: f64 = 80.0;
const METEOR_BOUNCE: f64 = -0.6;

/// Convert a real frame interval into frame-rate-normalized time units.
///
/// Intervals are capped at [`MAX_FRAME_MS`] so a stalled tab resumes without
/// a single large jump.
pub fn dt_units(delta_ms: f64) -> f64 {
	let delta = if delta_ms.is_finite() {
		delta_ms.clamp(0.0, MAX_FRAME_MS)
	} else {
		0.0
	};
	delta / NOMINAL_FRAME_MS
}

/// Direction (radians) of the flow field at a point and time (seconds).
pub fn field_angle(x: f64, y: f64, t: f64) -> f64 {
	let a = (x * 0.0016 + t * 0.31).sin();
	let b = (y * 0.0021 - t * 0.23).cos();
	let c = ((x + y) * 0.0009 + t * 0.17).sin();
	(a + b + c) * PI * 0.66
}

/// Inputs shared by every particle during one motion step.
pub struct Step<'a> {
	pub config: &'a FlowConfig,
	pub dims: SurfaceDimensions,
	/// Normalized elapsed time, see [`dt_units`].
	pub dt: f64,
	/// Simulation clock in seconds, drives the field phase.
	pub time: f64,
	/// Pointer position while the pointer is over the page.
	pub pointer: Option<(f64, f64)>,
}

/// Create a particle at a random position with a random depth layer.
pub fn spawn<R: Rng + ?Sized>(rng: &mut R, config: &FlowConfig, dims: &SurfaceDimensions) -> Particle {
	let near_ratio = if config.near_ratio.is_nan() {
		0.0
	} else {
		config.near_ratio.clamp(0.0, 1.0)
	};
	let layer = if rng.random_bool(near_ratio) {
		DepthLayer::Near
	} else {
		DepthLayer::Far
	};
	spawn_in_layer(rng, config, dims, layer)
}

fn spawn_in_layer<R: Rng + ?Sized>(
	rng: &mut R,
	config: &FlowConfig,
	dims: &SurfaceDimensions,
	layer: DepthLayer,
) -> Particle {
	let x = rng.random::<f64>() * dims.width;
	let y = rng.random::<f64>() * dims.height;
	match config.motion {
		MotionKind::Flow => {
			let life = rng.random_range(LIFE_MIN..LIFE_MAX);
			Particle::new(x, y, 0.0, 0.0, life, layer)
		}
		MotionKind::Meteor => {
			let (vx, vy) = meteor_velocity(rng, config);
			Particle::new(x, y, vx, vy, 0.0, layer)
		}
	}
}

fn meteor_velocity<R: Rng + ?Sized>(rng: &mut R, config: &FlowConfig) -> (f64, f64) {
	let speed = if config.speed_max > config.speed_min {
		rng.random_range(config.speed_min..config.speed_max)
	} else {
		config.speed_min
	};
	let angle = -FRAC_PI_2 + (rng.random::<f64>() - 0.5) * METEOR_SPREAD;
	(angle.cos() * speed * METEOR_DRIFT, angle.sin() * speed)
}

/// Advance every live particle by one step.
pub fn advance<R: Rng + ?Sized>(store: &mut ParticleStore, step: &Step<'_>, rng: &mut R) {
	match step.config.motion {
		MotionKind::Flow => {
			for p in store.iter_mut() {
				advance_flow(p, step, rng);
			}
		}
		MotionKind::Meteor => {
			for p in store.iter_mut() {
				advance_meteor(p, step, rng);
			}
		}
	}
}

fn advance_flow<R: Rng + ?Sized>(p: &mut Particle, step: &Step<'_>, rng: &mut R) {
	let config = step.config;
	let dt = step.dt;

	let angle = field_angle(p.x, p.y, step.time);
	let (mut ax, mut ay) = (
		angle.cos() * config.field_strength,
		angle.sin() * config.field_strength,
	);
	if let Some((px, py)) = step.pointer {
		ax += (px - p.x) * config.pointer_attraction;
		ay += (py - p.y) * config.pointer_attraction;
	}

	p.vx += ax * dt;
	p.vy += ay * dt;
	let damping = config.damping.powf(dt);
	p.vx *= damping;
	p.vy *= damping;
	p.x += p.vx * dt;
	p.y += p.vy * dt;
	p.life -= dt;

	let escaped = !step.dims.contains_with_margin(p.x, p.y, config.bounds_margin);
	if escaped || p.life <= 0.0 {
		let fresh = spawn_in_layer(rng, config, &step.dims, p.layer());
		p.recycle_from(fresh);
	}
}

fn advance_meteor<R: Rng + ?Sized>(p: &mut Particle, step: &Step<'_>, rng: &mut R) {
	let dims = &step.dims;
	let trail = step.config.trail_length_for(p.layer().is_near());

	p.x += p.vx * step.dt;
	p.y += p.vy * step.dt;

	if p.y < -trail - METEOR_EDGE {
		p.x = rng.random::<f64>() * dims.width;
		p.y = dims.height + trail + rng.random::<f64>() * METEOR_RESPAWN_JITTER;
	} else if p.x < -METEOR_EDGE || p.x > dims.width + METEOR_EDGE {
		p.x = p.x.clamp(0.0, dims.width);
		p.vx *= METEOR_BOUNCE;
	}
}
