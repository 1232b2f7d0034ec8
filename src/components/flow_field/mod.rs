//! Animated particle backdrop.
//!
//! Renders a depth-layered particle field on a full-viewport canvas behind
//! page content:
//! - Flow-field drift (or meteor streaks) integrated at a capped frame rate
//! - Population ramped up over the first seconds instead of spawned at once
//! - One-shot frame-rate check that turns the animation off on slow devices
//! - Pause while the page is hidden; off entirely under reduced motion
//!
//! # Example
//!
//! ```ignore
//! use flow_backdrop::{FlowFieldCanvas, FlowSettings};
//!
//! view! { <FlowFieldCanvas settings=FlowSettings::default() /> }
//! ```

mod component;
pub mod config;
mod governor;
mod motion;
mod particles;
mod ramp;
mod render;
mod scheduler;
mod state;
mod surface;
pub mod theme;

pub use component::FlowFieldCanvas;
pub use config::{ConfigError, FlowConfig, FlowSettings, MotionKind};
pub use state::{DisableReason, FlowFieldState, FrameOutcome, StartupProbe};
pub use surface::{SurfaceDimensions, SurfaceError, configure_surface};
