//! flow-backdrop: animated flow-field particle backdrop for web pages.
//!
//! This crate provides a WASM-based canvas component that paints a continuously
//! animated, depth-layered particle field behind page content, ramping its
//! population up gradually and switching itself off on slow devices or when
//! the user prefers reduced motion.

use leptos::prelude::*;
use leptos_meta::*;
use log::{Level, info, warn};
use wasm_bindgen::JsCast;
use web_sys::{HtmlScriptElement, Window};

pub mod components;

pub use components::flow_field::{DisableReason, FlowConfig, FlowFieldCanvas, FlowSettings, MotionKind};

/// Initialize logging and panic hooks for the WASM target.
pub fn init_logging() {
	let _ = console_log::init_with_level(Level::Debug);
	console_error_panic_hook::set_once();
	info!("flow-backdrop: logging initialized");
}

/// Load page settings from a script element with id="flow-config".
/// Expected format: JSON with optional { motion, breakpoint, desktop, mobile }.
fn load_flow_settings() -> Option<FlowSettings> {
	let window: Window = web_sys::window()?;
	let document = window.document()?;
	let element = document.get_element_by_id("flow-config")?;
	let script: HtmlScriptElement = element.dyn_into().ok()?;
	let json_text = script.text().ok()?;

	match FlowSettings::from_json(&json_text) {
		Ok(settings) => {
			info!(
				"flow-backdrop: loaded {:?} settings, breakpoint {}px",
				settings.motion, settings.breakpoint
			);
			Some(settings)
		}
		Err(e) => {
			warn!("flow-backdrop: {}", e);
			None
		}
	}
}

/// Main application component.
/// Loads settings from the DOM and mounts the backdrop canvas.
#[component]
pub fn App() -> impl IntoView {
	provide_meta_context();

	let settings = load_flow_settings().unwrap_or_default();
	let settings_signal = Signal::derive(move || settings.clone());

	view! {
		<Html attr:lang="en" attr:data-theme="dark" />
		<Title text="Flow Backdrop" />
		<Meta name="color-scheme" content="dark" />
		<Meta name="viewport" content="width=device-width, initial-scale=1.0" />

		<FlowFieldCanvas settings=settings_signal />
	}
}
