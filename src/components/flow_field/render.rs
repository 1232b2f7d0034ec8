//! Canvas rendering for the backdrop.
//!
//! Each rendered frame:
//! 1. Paints the background at low alpha instead of clearing, so earlier
//!    frames linger as motion blur.
//! 2. Switches to additive ("lighter") compositing.
//! 3. Strokes every particle as a short gradient trail from tail to head,
//!    tinted by height, with width, glow and opacity picked by depth layer.
//! 4. Restores normal compositing.
//!
//! Geometry and colors are computed into [`TrailStroke`] values; the actual
//! drawing goes through the [`Painter`] trait, implemented for the browser by
//! [`CanvasPainter`].

use web_sys::CanvasRenderingContext2d;

use super::config::FlowConfig;
use super::particles::{Particle, ParticleStore};
use super::surface::SurfaceDimensions;
use super::theme::{Color, Palette};

/// Shadow blur of a stroke with glow coefficients of 1.
const BASE_SHADOW_BLUR: f64 = 16.0;

/// Everything needed to draw one trail.
#[derive(Clone, Debug, PartialEq)]
pub struct TrailStroke {
	pub tail: (f64, f64),
	pub head: (f64, f64),
	/// Gradient stops from tail (offset 0) to head (offset 1).
	pub stops: [(f32, Color); 3],
	pub line_width: f64,
	pub shadow: Color,
	pub shadow_blur: f64,
}

/// Drawing operations the renderer needs from a surface.
pub trait Painter {
	/// Fill the whole `width × height` surface with `color`.
	fn fill(&mut self, color: Color, width: f64, height: f64);
	/// Start blending strokes additively.
	fn begin_additive(&mut self);
	/// Return to normal compositing.
	fn end_additive(&mut self);
	fn stroke_trail(&mut self, stroke: &TrailStroke);
}

/// Build the stroke for a particle on a surface `height` pixels tall.
pub fn trail_for(p: &Particle, config: &FlowConfig, palette: &Palette, height: f64) -> TrailStroke {
	let near = p.layer().is_near();
	let (line_width, glow_scale, alpha) = if near {
		(config.near_line_width, config.near_glow, config.near_alpha)
	} else {
		(config.far_line_width, config.far_glow, config.far_alpha)
	};
	let trail = config.trail_length_for(near);

	let speed = p.speed_or_unit();
	let tail = (p.x - p.vx / speed * trail, p.y - p.vy / speed * trail);
	let mid_y = (tail.1 + p.y) / 2.0;

	TrailStroke {
		tail,
		head: (p.x, p.y),
		stops: [
			(0.0, palette.top.with_alpha(0.0)),
			(0.4, palette.tint(mid_y, height, alpha * 0.5)),
			(1.0, palette.tint(p.y, height, alpha)),
		],
		line_width,
		shadow: palette.glow.with_alpha(0.4 + alpha * 0.5),
		shadow_blur: BASE_SHADOW_BLUR * config.glow * glow_scale,
	}
}

/// Paint the opaque background; used on start and after the canvas is resized.
pub fn paint_backdrop(painter: &mut impl Painter, palette: &Palette, dims: &SurfaceDimensions) {
	painter.fill(palette.background, dims.width, dims.height);
}

/// Render one frame of the particle field.
pub fn render(
	painter: &mut impl Painter,
	store: &ParticleStore,
	config: &FlowConfig,
	palette: &Palette,
	dims: &SurfaceDimensions,
) {
	painter.fill(palette.background.with_alpha(config.fade), dims.width, dims.height);

	painter.begin_additive();
	for p in store.iter() {
		painter.stroke_trail(&trail_for(p, config, palette, dims.height));
	}
	painter.end_additive();
}

/// [`Painter`] backed by a browser 2d context.
pub struct CanvasPainter<'a> {
	ctx: &'a CanvasRenderingContext2d,
}

impl<'a> CanvasPainter<'a> {
	pub fn new(ctx: &'a CanvasRenderingContext2d) -> Self {
		Self { ctx }
	}
}

impl Painter for CanvasPainter<'_> {
	fn fill(&mut self, color: Color, width: f64, height: f64) {
		self.ctx.set_fill_style_str(&color.to_css());
		self.ctx.fill_rect(0.0, 0.0, width, height);
	}

	fn begin_additive(&mut self) {
		self.ctx.save();
		let _ = self.ctx.set_global_composite_operation("lighter");
		self.ctx.set_line_cap("round");
	}

	fn end_additive(&mut self) {
		self.ctx.restore();
	}

	fn stroke_trail(&mut self, stroke: &TrailStroke) {
		let ctx = self.ctx;
		let gradient =
			ctx.create_linear_gradient(stroke.tail.0, stroke.tail.1, stroke.head.0, stroke.head.1);
		for (offset, color) in &stroke.stops {
			let _ = gradient.add_color_stop(*offset, &color.to_css());
		}

		#[allow(deprecated)]
		ctx.set_stroke_style(&gradient);
		ctx.set_line_width(stroke.line_width);
		ctx.set_shadow_color(&stroke.shadow.to_css());
		ctx.set_shadow_blur(stroke.shadow_blur);

		ctx.begin_path();
		ctx.move_to(stroke.tail.0, stroke.tail.1);
		ctx.line_to(stroke.head.0, stroke.head.1);
		ctx.stroke();
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::super::particles::DepthLayer;
	use super::super::surface::configure_surface;
	use super::*;

	/// Draw call log used in place of a canvas.
	#[derive(Debug, PartialEq)]
	pub(crate) enum Call {
		Fill(Color),
		BeginAdditive,
		EndAdditive,
		Stroke(TrailStroke),
	}

	#[derive(Default)]
	pub(crate) struct Recorder {
		pub calls: Vec<Call>,
	}

	impl Recorder {
		pub fn strokes(&self) -> usize {
			self.calls.iter().filter(|c| matches!(c, Call::Stroke(_))).count()
		}
	}

	impl Painter for Recorder {
		fn fill(&mut self, color: Color, _width: f64, _height: f64) {
			self.calls.push(Call::Fill(color));
		}

		fn begin_additive(&mut self) {
			self.calls.push(Call::BeginAdditive);
		}

		fn end_additive(&mut self) {
			self.calls.push(Call::EndAdditive);
		}

		fn stroke_trail(&mut self, stroke: &TrailStroke) {
			self.calls.push(Call::Stroke(stroke.clone()));
		}
	}

	#[test]
	fn frame_fades_then_strokes_additively() {
		let config = FlowConfig::default();
		let palette = Palette::default();
		let dims = configure_surface(200.0, 100.0, 1.0, 1.0);
		let mut store = ParticleStore::with_capacity(3);
		store.set_population(3, || Particle::new(50.0, 50.0, 1.0, 0.0, 100.0, DepthLayer::Far));

		let mut recorder = Recorder::default();
		render(&mut recorder, &store, &config, &palette, &dims);

		assert_eq!(recorder.calls.len(), 6);
		assert_eq!(recorder.calls[0], Call::Fill(palette.background.with_alpha(config.fade)));
		assert_eq!(recorder.calls[1], Call::BeginAdditive);
		assert_eq!(recorder.strokes(), 3);
		assert_eq!(recorder.calls[5], Call::EndAdditive);
	}

	#[test]
	fn trail_points_against_velocity() {
		let config = FlowConfig::default();
		let palette = Palette::default();
		let p = Particle::new(100.0, 60.0, 3.0, 4.0, 100.0, DepthLayer::Near);
		let stroke = trail_for(&p, &config, &palette, 120.0);
		let len = config.trail_length_near;
		assert_eq!(stroke.head, (100.0, 60.0));
		assert!((stroke.tail.0 - (100.0 - 0.6 * len)).abs() < 1e-9);
		assert!((stroke.tail.1 - (60.0 - 0.8 * len)).abs() < 1e-9);
		assert_eq!(stroke.line_width, config.near_line_width);
		assert_eq!(stroke.stops[2].1, palette.tint(60.0, 120.0, config.near_alpha));
		assert_eq!(stroke.stops[0].1.a, 0.0);
	}

	#[test]
	fn far_layer_uses_far_weights() {
		let config = FlowConfig::default();
		let palette = Palette::default();
		let p = Particle::new(10.0, 10.0, 0.0, 0.0, 100.0, DepthLayer::Far);
		let stroke = trail_for(&p, &config, &palette, 100.0);
		assert_eq!(stroke.line_width, config.far_line_width);
		assert!((stroke.shadow_blur - BASE_SHADOW_BLUR * config.glow * config.far_glow).abs() < 1e-9);
		// A resting particle still produces a finite (degenerate) trail.
		assert_eq!(stroke.tail, stroke.head);
	}

	#[test]
	fn zero_height_surface_is_safe() {
		let config = FlowConfig::default();
		let palette = Palette::default();
		let p = Particle::new(10.0, 10.0, 1.0, 1.0, 100.0, DepthLayer::Far);
		let stroke = trail_for(&p, &config, &palette, 0.0);
		assert_eq!(stroke.stops[2].1, palette.top.with_alpha(config.far_alpha));
	}
}
