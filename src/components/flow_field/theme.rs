//! Colors used by the backdrop.
//!
//! Trails are tinted by vertical position, blending from [`Palette::top`] at
//! the top edge of the surface to [`Palette::bottom`] at the bottom edge.

/// RGBA color representation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
	pub r: u8,
	pub g: u8,
	pub b: u8,
	pub a: f64,
}

impl Color {
	pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
		Self { r, g, b, a: 1.0 }
	}

	pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
		Self { r, g, b, a }
	}

	pub fn with_alpha(self, a: f64) -> Self {
		Self { a, ..self }
	}

	/// Linear interpolation between two colors, `t` clamped to `[0, 1]`.
	///
	/// Channels are truncated toward zero, so `t = 0` and `t = 1` reproduce the
	/// endpoint channels exactly and every other `t` stays between them.
	pub fn lerp(self, other: Color, t: f64) -> Self {
		let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
		let channel = |from: u8, to: u8| {
			(from as f64 + (to as f64 - from as f64) * t).clamp(0.0, 255.0) as u8
		};
		Self {
			r: channel(self.r, other.r),
			g: channel(self.g, other.g),
			b: channel(self.b, other.b),
			a: self.a + (other.a - self.a) * t,
		}
	}

	pub fn to_css(self) -> String {
		if (self.a - 1.0).abs() < 0.001 {
			format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
		} else {
			format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
		}
	}
}

/// Fixed colors of the backdrop.
#[derive(Clone, Debug)]
pub struct Palette {
	/// Fill painted under the trails; its alpha is replaced by the fade coefficient.
	pub background: Color,
	/// Trail tint at `y = 0`.
	pub top: Color,
	/// Trail tint at `y = surface height`.
	pub bottom: Color,
	/// Shadow color used for the glow around each stroke.
	pub glow: Color,
}

impl Palette {
	/// Teal-to-lime palette over a near-black background.
	pub const fn aurora() -> Self {
		Self {
			background: Color::rgb(2, 3, 1),
			top: Color::rgb(35, 190, 200),
			bottom: Color::rgb(190, 215, 85),
			glow: Color::rgb(182, 234, 95),
		}
	}

	/// Tint for a point at height `y` of a surface `height` pixels tall.
	///
	/// A zero or negative height maps everything to the top color.
	pub fn tint(&self, y: f64, height: f64, alpha: f64) -> Color {
		let ratio = if height > 0.0 { y / height } else { 0.0 };
		self.top.lerp(self.bottom, ratio).with_alpha(alpha)
	}
}

impl Default for Palette {
	fn default() -> Self {
		Self::aurora()
	}
}
