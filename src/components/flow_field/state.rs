//! Engine state and the per-frame tick.
//!
//! [`FlowFieldState`] owns everything the backdrop mutates: the particle
//! store, clock, ramp, governor and scheduler. It is created once per canvas
//! and driven by the component's animation-frame and event callbacks, which
//! all run on the same thread and never interleave with a tick.
//!
//! Disabling is terminal. Once a [`DisableReason`] is set the loop is cancelled
//! and every later call is a no-op.

use std::fmt;

use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use super::config::FlowConfig;
use super::governor::{GovernorState, PerformanceGovernor};
use super::motion::{self, Step};
use super::particles::ParticleStore;
use super::ramp::{RampController, population_for_area};
use super::render::{self, Painter};
use super::scheduler::{FrameDriver, Scheduler};
use super::surface::SurfaceDimensions;
use super::theme::Palette;

/// Why the backdrop stopped animating for good.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisableReason {
	/// No 2d rendering context could be obtained.
	Unsupported,
	/// The user prefers reduced motion.
	ReducedMotion,
	/// The warm-up frame rate was below the threshold.
	Perf,
}

impl DisableReason {
	/// Tag exposed to page styling.
	pub fn tag(self) -> &'static str {
		match self {
			DisableReason::Unsupported => "unsupported",
			DisableReason::ReducedMotion => "reduced-motion",
			DisableReason::Perf => "perf",
		}
	}

	/// Whether the canvas should be hidden. A slow device keeps the last
	/// painted frame as a static background.
	pub fn hides_surface(self) -> bool {
		!matches!(self, DisableReason::Perf)
	}
}

impl fmt::Display for DisableReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.tag())
	}
}

/// Host conditions checked once before the first tick.
#[derive(Clone, Copy, Debug)]
pub struct StartupProbe {
	/// A 2d rendering context was obtained for the canvas.
	pub context_available: bool,
	/// `(prefers-reduced-motion: reduce)` matched.
	pub reduced_motion: bool,
}

/// Monotonic time since the engine started.
#[derive(Clone, Copy, Debug, Default)]
struct SimulationClock {
	origin: f64,
	elapsed_ms: f64,
}

impl SimulationClock {
	fn reset(&mut self, now: f64) {
		self.origin = now;
		self.elapsed_ms = 0.0;
	}

	fn advance(&mut self, now: f64) {
		self.elapsed_ms = self.elapsed_ms.max(now - self.origin);
	}

	fn seconds(&self) -> f64 {
		self.elapsed_ms / 1000.0
	}
}

/// Result of one animation callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
	/// The engine is not running; nothing happened and nothing was scheduled.
	Idle,
	/// Population adjusted but no render was due.
	Skipped,
	/// A frame was simulated and painted.
	Rendered,
	/// This callback disabled the engine.
	Disabled(DisableReason),
}

/// Complete state of one backdrop instance.
pub struct FlowFieldState {
	config: FlowConfig,
	palette: Palette,
	dims: SurfaceDimensions,
	store: ParticleStore,
	rng: SmallRng,
	clock: SimulationClock,
	ramp: RampController,
	governor: PerformanceGovernor,
	scheduler: Scheduler,
	pointer: Option<(f64, f64)>,
	visible: bool,
	running: bool,
	disabled: Option<DisableReason>,
}

impl FlowFieldState {
	/// Build an idle engine for `dims`; nothing is spawned or scheduled until
	/// [`start`](Self::start).
	pub fn new(config: FlowConfig, dims: SurfaceDimensions, seed: u64) -> Self {
		Self {
			store: ParticleStore::with_capacity(config.max_population),
			ramp: RampController::new(&config),
			governor: PerformanceGovernor::new(config.perf_sample_window, config.perf_min_fps),
			scheduler: Scheduler::new(config.target_fps),
			palette: Palette::default(),
			rng: SmallRng::seed_from_u64(seed),
			clock: SimulationClock::default(),
			pointer: None,
			visible: true,
			running: false,
			disabled: None,
			config,
			dims,
		}
	}

	/// Configuration currently in effect.
	pub fn config(&self) -> &FlowConfig {
		&self.config
	}

	/// Live particles, in slot order.
	pub fn particles(&self) -> &ParticleStore {
		&self.store
	}

	pub fn governor_state(&self) -> GovernorState {
		self.governor.state()
	}

	/// The terminal disable reason, if any.
	pub fn disabled(&self) -> Option<DisableReason> {
		self.disabled
	}

	pub fn is_running(&self) -> bool {
		self.running && self.disabled.is_none()
	}

	/// Full particle count for the current surface.
	pub fn base_population(&self) -> usize {
		population_for_area(self.dims.width, self.dims.height, &self.config)
	}

	/// Check host conditions, seed the initial population and schedule the
	/// first callback.
	pub fn start(
		&mut self,
		probe: StartupProbe,
		now: f64,
		driver: &mut impl FrameDriver,
	) -> Result<(), DisableReason> {
		if let Some(reason) = self.disabled {
			return Err(reason);
		}
		if !probe.context_available {
			self.disable(DisableReason::Unsupported, driver);
			return Err(DisableReason::Unsupported);
		}
		if probe.reduced_motion {
			self.disable(DisableReason::ReducedMotion, driver);
			return Err(DisableReason::ReducedMotion);
		}

		self.clock.reset(now);
		self.governor.rebase(now);
		self.scheduler.reset_clock(now);
		self.running = true;

		let initial = self.ramp.target(0.0, self.base_population());
		self.respawn_to(initial);
		info!(
			"flow-backdrop: started {:?} field with {} of {} particles on {}x{}",
			self.config.motion,
			self.store.len(),
			self.base_population(),
			self.dims.width,
			self.dims.height
		);

		if self.visible {
			self.scheduler.schedule(driver);
		}
		Ok(())
	}

	/// Handle one animation callback at host timestamp `now`.
	pub fn frame(
		&mut self,
		now: f64,
		painter: &mut impl Painter,
		driver: &mut impl FrameDriver,
	) -> FrameOutcome {
		self.scheduler.fired();
		if !self.is_running() || !self.visible {
			return FrameOutcome::Idle;
		}

		self.clock.advance(now);

		if let GovernorState::Disabled { fps } = self.governor.observe(now) {
			warn!("flow-backdrop: estimated {:.1} fps during warm-up, stopping animation", fps);
			self.disable(DisableReason::Perf, driver);
			return FrameOutcome::Disabled(DisableReason::Perf);
		}

		let target = self.ramp.target(self.clock.elapsed_ms, self.base_population());
		let next = self.ramp.next_population(self.store.len(), target);
		self.respawn_to(next);

		let outcome = match self.scheduler.due(now) {
			Some(delta_ms) => {
				let step = Step {
					config: &self.config,
					dims: self.dims,
					dt: motion::dt_units(delta_ms),
					time: self.clock.seconds(),
					pointer: self.pointer,
				};
				motion::advance(&mut self.store, &step, &mut self.rng);
				render::render(painter, &self.store, &self.config, &self.palette, &self.dims);
				FrameOutcome::Rendered
			}
			None => FrameOutcome::Skipped,
		};

		self.scheduler.schedule(driver);
		outcome
	}

	/// Apply a new configuration and surface size after a (debounced) resize.
	///
	/// Live particles are kept; any now outside the field are recycled by the
	/// next motion step.
	pub fn resize(&mut self, config: FlowConfig, dims: SurfaceDimensions) {
		if self.disabled.is_some() {
			return;
		}
		let reseed = config.motion != self.config.motion;
		if reseed {
			// Particles spawned under the other rule carry the wrong velocity shape.
			self.store.clear();
		}
		self.store.set_capacity(config.max_population);
		self.ramp = RampController::new(&config);
		self.scheduler.set_target_fps(config.target_fps);
		self.config = config;
		self.dims = dims;
		if reseed && self.running {
			let target = self.ramp.target(self.clock.elapsed_ms, self.base_population());
			self.respawn_to(target);
		}
		info!(
			"flow-backdrop: resized to {}x{} @{}x, target population {}",
			dims.width,
			dims.height,
			dims.pixel_ratio,
			self.base_population()
		);
	}

	/// Track the pointer; `None` when it leaves the page.
	pub fn set_pointer(&mut self, pointer: Option<(f64, f64)>) {
		self.pointer = pointer;
	}

	/// React to page visibility changes.
	///
	/// Hidden pages get no callbacks. On return the render and governor
	/// clocks restart at `now` so the hidden gap never reaches the physics or
	/// the warm-up samples, even when the host held a callback pending while
	/// the page was hidden.
	///
	/// Calling this before [`start`](Self::start) records the initial
	/// visibility; a hidden page then schedules nothing until it is shown.
	pub fn set_visible(&mut self, visible: bool, now: f64, driver: &mut impl FrameDriver) {
		self.visible = visible;
		if !self.is_running() {
			return;
		}
		if !visible {
			self.scheduler.cancel(driver);
			return;
		}
		self.scheduler.reset_clock(now);
		self.governor.rebase(now);
		self.scheduler.schedule(driver);
	}

	/// Stop permanently with `reason`. Later calls keep the first reason.
	pub fn disable(&mut self, reason: DisableReason, driver: &mut impl FrameDriver) {
		self.scheduler.cancel(driver);
		self.running = false;
		if self.disabled.is_none() {
			info!("flow-backdrop: disabled ({})", reason);
			self.disabled = Some(reason);
		}
	}

	/// Stop the loop when the page goes away, without a disable reason.
	pub fn shutdown(&mut self, driver: &mut impl FrameDriver) {
		self.scheduler.cancel(driver);
		if self.running {
			info!("flow-backdrop: shut down");
		}
		self.running = false;
	}

	/// React to `pagehide`. A page kept in the back-forward cache only pauses
	/// and resumes through [`set_visible`](Self::set_visible) when restored;
	/// any other unload shuts the loop down.
	pub fn page_hide(&mut self, persisted: bool, now: f64, driver: &mut impl FrameDriver) {
		if persisted {
			self.set_visible(false, now, driver);
		} else {
			self.shutdown(driver);
		}
	}

	/// Paint the opaque background over the whole surface.
	pub fn paint_backdrop(&self, painter: &mut impl Painter) {
		render::paint_backdrop(painter, &self.palette, &self.dims);
	}

	fn respawn_to(&mut self, target: usize) {
		let Self {
			store,
			rng,
			config,
			dims,
			..
		} = self;
		store.set_population(target, || motion::spawn(&mut *rng, config, dims));
	}
}

#[cfg(test)]
mod tests {
	use super::super::config::MotionKind;
	use super::super::render::tests::Recorder;
	use super::super::scheduler::tests::FakeDriver;
	use super::super::surface::configure_surface;
	use super::*;

	const READY: StartupProbe = StartupProbe {
		context_available: true,
		reduced_motion: false,
	};

	fn engine(config: FlowConfig) -> FlowFieldState {
		FlowFieldState::new(config, configure_surface(1920.0, 1080.0, 2.0, 1.5), 42)
	}

	/// Drive callbacks every `interval` ms, `count` times, starting after `start`.
	fn run(
		state: &mut FlowFieldState,
		driver: &mut FakeDriver,
		recorder: &mut Recorder,
		start: f64,
		interval: f64,
		count: usize,
	) -> f64 {
		let mut t = start;
		for _ in 0..count {
			t += interval;
			state.frame(t, recorder, driver);
		}
		t
	}

	#[test]
	fn startup_disable_reasons() {
		let mut driver = FakeDriver::default();
		let mut state = engine(FlowConfig::default());
		let probe = StartupProbe {
			context_available: false,
			reduced_motion: true,
		};
		assert_eq!(state.start(probe, 0.0, &mut driver), Err(DisableReason::Unsupported));
		assert_eq!(state.disabled(), Some(DisableReason::Unsupported));
		assert!(DisableReason::Unsupported.hides_surface());

		let mut state = engine(FlowConfig::default());
		let probe = StartupProbe {
			context_available: true,
			reduced_motion: true,
		};
		assert_eq!(state.start(probe, 0.0, &mut driver), Err(DisableReason::ReducedMotion));
		assert_eq!(driver.requested, 0);
		assert!(state.particles().is_empty());
	}

	#[test]
	fn start_seeds_ramp_fraction_and_schedules() {
		let mut driver = FakeDriver::default();
		let mut state = engine(FlowConfig::default());
		assert!(state.start(READY, 0.0, &mut driver).is_ok());
		assert_eq!(state.base_population(), 900);
		assert_eq!(state.particles().len(), 360);
		assert_eq!(driver.requested, 1);
	}

	#[test]
	fn population_grows_by_step_then_saturates() {
		let mut driver = FakeDriver::default();
		let mut recorder = Recorder::default();
		let config = FlowConfig::default();
		let step = config.ramp_step;
		let mut state = engine(config);
		state.start(READY, 0.0, &mut driver).unwrap();

		let mut t = 0.0;
		let mut last = state.particles().len();
		for _ in 0..400 {
			t += 16.0;
			state.frame(t, &mut recorder, &mut driver);
			let len = state.particles().len();
			assert!(len >= last && len - last <= step);
			last = len;
		}
		assert_eq!(last, 900);
	}

	#[test]
	fn shrink_after_resize_is_immediate() {
		let mut driver = FakeDriver::default();
		let mut recorder = Recorder::default();
		let mut state = engine(FlowConfig::default());
		state.start(READY, 0.0, &mut driver).unwrap();
		let t = run(&mut state, &mut driver, &mut recorder, 0.0, 16.0, 400);
		assert_eq!(state.particles().len(), 900);

		let small = FlowConfig {
			min_population: 50,
			max_population: 100,
			..FlowConfig::default()
		};
		state.resize(small, configure_surface(320.0, 240.0, 1.0, 1.0));
		assert!(state.particles().len() <= 100);
		// 320x240 at the default density is below the new minimum of 50.
		state.frame(t + 16.0, &mut recorder, &mut driver);
		assert_eq!(state.particles().len(), 50);
	}

	#[test]
	fn slow_warmup_disables_with_perf_and_keeps_surface() {
		let mut driver = FakeDriver::default();
		let mut recorder = Recorder::default();
		let mut state = engine(FlowConfig::default());
		state.start(READY, 0.0, &mut driver).unwrap();
		run(&mut state, &mut driver, &mut recorder, 0.0, 100.0, 60);

		assert_eq!(state.disabled(), Some(DisableReason::Perf));
		assert!(!DisableReason::Perf.hides_surface());
		assert!(!state.is_running());
		let before = recorder.calls.len();
		assert_eq!(state.frame(1e6, &mut recorder, &mut driver), FrameOutcome::Idle);
		assert_eq!(recorder.calls.len(), before);
	}

	#[test]
	fn fast_warmup_never_disables() {
		let mut driver = FakeDriver::default();
		let mut recorder = Recorder::default();
		let mut state = engine(FlowConfig::default());
		state.start(READY, 0.0, &mut driver).unwrap();
		let t = run(&mut state, &mut driver, &mut recorder, 0.0, 20.0, 60);
		assert_eq!(state.governor_state(), GovernorState::Ok);
		run(&mut state, &mut driver, &mut recorder, t, 250.0, 200);
		assert_eq!(state.disabled(), None);
		assert!(state.is_running());
	}

	#[test]
	fn hidden_page_gets_no_ticks_and_resume_resets_dt() {
		let mut driver = FakeDriver::default();
		let mut recorder = Recorder::default();
		let mut state = engine(FlowConfig::default());
		state.start(READY, 0.0, &mut driver).unwrap();
		let t = run(&mut state, &mut driver, &mut recorder, 0.0, 20.0, 70);

		state.set_visible(false, t, &mut driver);
		assert_eq!(driver.cancelled.len(), 1);
		let calls = recorder.calls.len();
		// A stray callback delivered while hidden does nothing.
		assert_eq!(state.frame(t + 500.0, &mut recorder, &mut driver), FrameOutcome::Idle);
		assert_eq!(recorder.calls.len(), calls);

		let resume = t + 60_000.0;
		let requested = driver.requested;
		state.set_visible(true, resume, &mut driver);
		assert_eq!(driver.requested, requested + 1);

		// Right after resume nothing is due yet: the reference moved to `resume`.
		assert_eq!(state.frame(resume + 1.0, &mut recorder, &mut driver), FrameOutcome::Skipped);
		// One interval later a normal-sized step renders.
		let interval = 1000.0 / state.config().target_fps;
		assert_eq!(
			state.frame(resume + interval + 0.5, &mut recorder, &mut driver),
			FrameOutcome::Rendered
		);
		assert_eq!(state.disabled(), None);
	}

	#[test]
	fn disable_is_terminal_and_cancel_idempotent() {
		let mut driver = FakeDriver::default();
		let mut state = engine(FlowConfig::default());
		state.start(READY, 0.0, &mut driver).unwrap();
		state.disable(DisableReason::Perf, &mut driver);
		state.disable(DisableReason::Unsupported, &mut driver);
		state.shutdown(&mut driver);
		assert_eq!(driver.cancelled.len(), 1);
		assert_eq!(state.disabled(), Some(DisableReason::Perf));

		state.set_visible(true, 10.0, &mut driver);
		assert_eq!(driver.requested, 1);
		assert_eq!(state.start(READY, 20.0, &mut driver), Err(DisableReason::Perf));
	}

	#[test]
	fn meteor_engine_renders_layered_trails() {
		let mut driver = FakeDriver::default();
		let mut recorder = Recorder::default();
		let mut state = engine(FlowConfig::desktop(MotionKind::Meteor));
		state.start(READY, 0.0, &mut driver).unwrap();
		assert_eq!(state.base_population(), 37);
		run(&mut state, &mut driver, &mut recorder, 0.0, 34.0, 10);
		assert!(recorder.strokes() > 0);
		assert_eq!(state.disabled(), None);
	}

	#[test]
	fn shutdown_stops_without_reason() {
		let mut driver = FakeDriver::default();
		let mut recorder = Recorder::default();
		let mut state = engine(FlowConfig::default());
		state.start(READY, 0.0, &mut driver).unwrap();
		state.shutdown(&mut driver);
		assert_eq!(state.disabled(), None);
		assert_eq!(state.frame(16.0, &mut recorder, &mut driver), FrameOutcome::Idle);
		assert!(recorder.calls.is_empty());
	}

	#[test]
	fn showing_a_background_tab_rebases_the_warmup() {
		let mut driver = FakeDriver::default();
		let mut recorder = Recorder::default();
		let mut state = engine(FlowConfig::default());
		// The first callback stays pending while the tab is in the background.
		state.start(READY, 0.0, &mut driver).unwrap();
		state.set_visible(true, 60_000.0, &mut driver);
		assert_eq!(driver.requested, 1);

		run(&mut state, &mut driver, &mut recorder, 60_000.0, 16.7, 60);
		assert_eq!(state.governor_state(), GovernorState::Ok);
		assert_eq!(state.disabled(), None);
	}

	#[test]
	fn starting_hidden_waits_for_first_show() {
		let mut driver = FakeDriver::default();
		let mut recorder = Recorder::default();
		let mut state = engine(FlowConfig::default());
		state.set_visible(false, 0.0, &mut driver);
		assert!(state.start(READY, 0.0, &mut driver).is_ok());
		assert_eq!(driver.requested, 0);

		state.set_visible(true, 30_000.0, &mut driver);
		assert_eq!(driver.requested, 1);
		run(&mut state, &mut driver, &mut recorder, 30_000.0, 16.7, 60);
		assert_eq!(state.disabled(), None);
		assert!(recorder.strokes() > 0);
	}

	#[test]
	fn motion_switch_on_resize_reseeds_immediately() {
		let mut driver = FakeDriver::default();
		let mut state = engine(FlowConfig::default());
		state.start(READY, 0.0, &mut driver).unwrap();

		state.resize(
			FlowConfig::desktop(MotionKind::Meteor),
			configure_surface(1920.0, 1080.0, 2.0, 1.5),
		);
		let len = state.particles().len();
		assert!(len >= 1 && len <= state.base_population());
		assert_eq!(state.base_population(), 37);
	}

	#[test]
	fn cached_page_hide_pauses_instead_of_stopping() {
		let mut driver = FakeDriver::default();
		let mut recorder = Recorder::default();
		let mut state = engine(FlowConfig::default());
		state.start(READY, 0.0, &mut driver).unwrap();

		state.page_hide(true, 100.0, &mut driver);
		assert_eq!(driver.cancelled.len(), 1);
		assert!(state.is_running());
		assert_eq!(state.disabled(), None);

		state.set_visible(true, 5_000.0, &mut driver);
		assert_eq!(driver.requested, 2);
		let interval = 1000.0 / state.config().target_fps;
		assert_eq!(
			state.frame(5_000.0 + interval + 0.5, &mut recorder, &mut driver),
			FrameOutcome::Rendered
		);
	}

	#[test]
	fn final_page_hide_shuts_down() {
		let mut driver = FakeDriver::default();
		let mut state = engine(FlowConfig::default());
		state.start(READY, 0.0, &mut driver).unwrap();

		state.page_hide(false, 100.0, &mut driver);
		assert!(!state.is_running());
		assert_eq!(state.disabled(), None);
		state.set_visible(true, 200.0, &mut driver);
		assert_eq!(driver.requested, 1);
	}
}
