//! Particle records and the slot arena that holds them.
//!
//! The store never frees slots while the engine runs: shrinking only moves
//! the live boundary, and growing reinitializes parked slots before appending
//! new ones. Particles that leave the field are reset in their slot instead of
//! being removed.

/// Coarse depth of a particle, fixed for the lifetime of its slot contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthLayer {
	Near,
	Far,
}

impl DepthLayer {
	pub fn is_near(self) -> bool {
		matches!(self, DepthLayer::Near)
	}
}

/// A single trail segment.
#[derive(Clone, Debug)]
pub struct Particle {
	pub x: f64,
	pub y: f64,
	pub vx: f64,
	pub vy: f64,
	/// Ticks left before a flow particle is recycled. Unused by meteors.
	pub life: f64,
	layer: DepthLayer,
}

impl Particle {
	pub fn new(x: f64, y: f64, vx: f64, vy: f64, life: f64, layer: DepthLayer) -> Self {
		Self {
			x,
			y,
			vx,
			vy,
			life,
			layer,
		}
	}

	pub fn layer(&self) -> DepthLayer {
		self.layer
	}

	/// Velocity magnitude, with zero reported as 1 so it is safe to divide by.
	pub fn speed_or_unit(&self) -> f64 {
		let speed = (self.vx * self.vx + self.vy * self.vy).sqrt();
		if speed > 0.0 && speed.is_finite() { speed } else { 1.0 }
	}

	/// Take over the motion state of `fresh` while keeping this particle's layer.
	pub fn recycle_from(&mut self, fresh: Particle) {
		self.x = fresh.x;
		self.y = fresh.y;
		self.vx = fresh.vx;
		self.vy = fresh.vy;
		self.life = fresh.life;
	}
}

/// Fixed-capacity arena of particle slots with a live count.
pub struct ParticleStore {
	slots: Vec<Particle>,
	live: usize,
	capacity: usize,
}

impl ParticleStore {
	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			slots: Vec::with_capacity(capacity),
			live: 0,
			capacity,
		}
	}

	pub fn len(&self) -> usize {
		self.live
	}

	pub fn is_empty(&self) -> bool {
		self.live == 0
	}

	/// Change the maximum population, truncating live particles above it.
	pub fn set_capacity(&mut self, capacity: usize) {
		self.capacity = capacity;
		self.live = self.live.min(capacity);
		self.slots.truncate(capacity);
	}

	/// Grow or shrink the live population to `target` (clamped to capacity).
	///
	/// New live slots are filled by `spawn`. Returns the resulting live count.
	pub fn set_population(&mut self, target: usize, mut spawn: impl FnMut() -> Particle) -> usize {
		let target = target.min(self.capacity);
		for i in self.live..target {
			if i < self.slots.len() {
				self.slots[i] = spawn();
			} else {
				self.slots.push(spawn());
			}
		}
		self.live = target;
		self.live
	}

	/// Drop every live particle.
	pub fn clear(&mut self) {
		self.live = 0;
	}

	pub fn iter(&self) -> impl Iterator<Item = &Particle> {
		self.slots[..self.live].iter()
	}

	pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Particle> {
		self.slots[..self.live].iter_mut()
	}
}
