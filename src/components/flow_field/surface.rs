//! Canvas sizing and device-pixel-ratio handling.
//!
//! All drawing happens in logical (CSS pixel) coordinates. The backing buffer
//! is `logical × ratio` pixels, where the ratio is the device pixel ratio
//! clamped to the configured maximum so very dense displays do not pay for
//! pixels nobody can see on a decorative layer.

use thiserror::Error;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

/// Errors raised while obtaining a drawing context.
#[derive(Error, Debug)]
pub enum SurfaceError {
	/// `getContext("2d")` threw.
	#[error("canvas refused a 2d context: {0}")]
	ContextFailed(String),

	/// `getContext("2d")` returned null.
	#[error("2d canvas context is unavailable")]
	ContextUnavailable,

	/// The returned object was not a `CanvasRenderingContext2D`.
	#[error("canvas context has an unexpected type")]
	ContextType,
}

/// Logical and backing sizes of the drawing surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceDimensions {
	/// Logical width in CSS pixels.
	pub width: f64,
	/// Logical height in CSS pixels.
	pub height: f64,
	/// Effective pixel ratio after clamping.
	pub pixel_ratio: f64,
	pub backing_width: u32,
	pub backing_height: u32,
}

impl SurfaceDimensions {
	/// Whether `(x, y)` lies within the surface grown by `margin` on every side.
	pub fn contains_with_margin(&self, x: f64, y: f64, margin: f64) -> bool {
		x >= -margin && x <= self.width + margin && y >= -margin && y <= self.height + margin
	}

	/// Push the dimensions onto a canvas and reset its transform so drawing
	/// calls use logical coordinates.
	pub fn apply(&self, canvas: &HtmlCanvasElement, ctx: &CanvasRenderingContext2d) {
		canvas.set_width(self.backing_width);
		canvas.set_height(self.backing_height);
		let style = canvas.style();
		let _ = style.set_property("width", &format!("{}px", self.width));
		let _ = style.set_property("height", &format!("{}px", self.height));
		let _ = ctx.set_transform(self.pixel_ratio, 0.0, 0.0, self.pixel_ratio, 0.0, 0.0);
	}
}

/// Compute surface dimensions for a viewport.
///
/// A missing or nonsensical device pixel ratio counts as 1, as does a
/// non-positive cap. Negative viewport sizes collapse to zero.
pub fn configure_surface(
	viewport_width: f64,
	viewport_height: f64,
	device_pixel_ratio: f64,
	max_dpr: f64,
) -> SurfaceDimensions {
	let sane = |v: f64| if v.is_finite() && v > 0.0 { v } else { 1.0 };
	let pixel_ratio = sane(device_pixel_ratio).min(sane(max_dpr));
	let width = if viewport_width.is_finite() { viewport_width.max(0.0) } else { 0.0 };
	let height = if viewport_height.is_finite() { viewport_height.max(0.0) } else { 0.0 };

	SurfaceDimensions {
		width,
		height,
		pixel_ratio,
		backing_width: (width * pixel_ratio).floor() as u32,
		backing_height: (height * pixel_ratio).floor() as u32,
	}
}

/// Obtain the 2d rendering context of a canvas.
pub fn acquire_context(canvas: &HtmlCanvasElement) -> Result<CanvasRenderingContext2d, SurfaceError> {
	canvas
		.get_context("2d")
		.map_err(|e| SurfaceError::ContextFailed(format!("{:?}", e)))?
		.ok_or(SurfaceError::ContextUnavailable)?
		.dyn_into::<CanvasRenderingContext2d>()
		.map_err(|_| SurfaceError::ContextType)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ratio_is_clamped_to_cap() {
		let dims = configure_surface(1920.0, 1080.0, 3.0, 1.5);
		assert_eq!(dims.pixel_ratio, 1.5);
		assert_eq!(dims.backing_width, 2880);
		assert_eq!(dims.backing_height, 1620);
		assert_eq!((dims.width, dims.height), (1920.0, 1080.0));
	}

	#[test]
	fn low_density_display_keeps_its_ratio() {
		let dims = configure_surface(800.0, 600.0, 1.0, 1.5);
		assert_eq!(dims.pixel_ratio, 1.0);
		assert_eq!((dims.backing_width, dims.backing_height), (800, 600));
	}

	#[test]
	fn bad_inputs_fall_back_to_unit_ratio() {
		assert_eq!(configure_surface(10.0, 10.0, 0.0, 2.0).pixel_ratio, 1.0);
		assert_eq!(configure_surface(10.0, 10.0, f64::NAN, 2.0).pixel_ratio, 1.0);
		assert_eq!(configure_surface(10.0, 10.0, 2.0, -1.0).pixel_ratio, 1.0);
		let dims = configure_surface(-5.0, f64::INFINITY, 1.0, 1.0);
		assert_eq!((dims.width, dims.height), (0.0, 0.0));
	}

	#[test]
	fn inflated_bounds_check() {
		let dims = configure_surface(100.0, 50.0, 1.0, 1.0);
		assert!(dims.contains_with_margin(-40.0, 90.0, 40.0));
		assert!(!dims.contains_with_margin(-40.1, 10.0, 40.0));
		assert!(!dims.contains_with_margin(10.0, 90.5, 40.0));
	}
}
