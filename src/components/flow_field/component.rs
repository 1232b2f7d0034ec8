//! Leptos component wrapping the backdrop canvas.
//!
//! The component creates a fixed, full-viewport canvas behind the page and
//! connects browser events to [`FlowFieldState`]:
//!
//! - `requestAnimationFrame` drives [`FlowFieldState::frame`]
//! - window `resize` is debounced, then re-resolves the config and resizes
//! - `visibilitychange` pauses and resumes the loop
//! - `mousemove`/`mouseleave` feed the pointer attraction
//! - `pagehide` shuts the loop down, or only pauses it for the back-forward cache
//!
//! When the engine disables itself the reason is published on the canvas
//! (`data-disabled`) and as a `bg-disabled-{reason}` class on `<body>`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use log::warn;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, PageTransitionEvent, Window};

use super::config::FlowSettings;
use super::render::CanvasPainter;
use super::scheduler::{FrameDriver, FrameHandle};
use super::state::{DisableReason, FlowFieldState, FrameOutcome, StartupProbe};
use super::surface::{acquire_context, configure_surface};

/// Quiet period after the last `resize` event before the surface is rebuilt.
const RESIZE_DEBOUNCE_MS: i32 = 150;

const REDUCED_MOTION_QUERY: &str = "(prefers-reduced-motion: reduce)";

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// [`FrameDriver`] over `window.requestAnimationFrame`, always re-arming the
/// shared animation callback.
struct WindowFrames {
	window: Window,
	callback: FrameCallback,
}

impl FrameDriver for WindowFrames {
	fn request_frame(&mut self) -> Option<FrameHandle> {
		let callback = self.callback.borrow();
		let cb = callback.as_ref()?;
		self.window
			.request_animation_frame(cb.as_ref().unchecked_ref())
			.ok()
	}

	fn cancel_frame(&mut self, handle: FrameHandle) {
		let _ = self.window.cancel_animation_frame(handle);
	}
}

/// Bundles the engine with the browser objects it draws through.
struct BackdropContext {
	state: FlowFieldState,
	settings: FlowSettings,
	canvas: HtmlCanvasElement,
	ctx: Option<CanvasRenderingContext2d>,
	frames: WindowFrames,
}

/// Event closures kept alive for the lifetime of the component.
#[derive(Default)]
struct Listeners {
	resize: Option<Closure<dyn FnMut()>>,
	visibility: Option<Closure<dyn FnMut()>>,
	pointer_move: Option<Closure<dyn FnMut(MouseEvent)>>,
	pointer_leave: Option<Closure<dyn FnMut()>>,
	page_hide: Option<Closure<dyn FnMut(PageTransitionEvent)>>,
}

fn viewport_size(window: &Window) -> (f64, f64) {
	let read = |v: Result<JsValue, JsValue>| v.ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
	(read(window.inner_width()), read(window.inner_height()))
}

fn now(window: &Window) -> f64 {
	window.performance().map(|p| p.now()).unwrap_or(0.0)
}

fn prefers_reduced_motion(window: &Window) -> bool {
	window
		.match_media(REDUCED_MOTION_QUERY)
		.ok()
		.flatten()
		.map(|query| query.matches())
		.unwrap_or(false)
}

fn page_hidden(window: &Window) -> bool {
	window.document().map(|d| d.hidden()).unwrap_or(false)
}

fn random_seed() -> u64 {
	(js_sys::Math::random() * u64::MAX as f64) as u64
}

/// Reflect a terminal disable on the page so styling can show a fallback.
fn publish_disabled(canvas: &HtmlCanvasElement, reason: DisableReason) {
	let _ = canvas.set_attribute("data-disabled", reason.tag());
	if reason.hides_surface() {
		let _ = web_sys::HtmlElement::style(canvas).set_property("display", "none");
	}
	if let Some(body) = web_sys::window()
		.and_then(|w| w.document())
		.and_then(|d| d.body())
	{
		let _ = body
			.class_list()
			.add_1(&format!("bg-disabled-{}", reason.tag()));
	}
}

/// Re-read the viewport, resolve the config for it and rebuild the surface.
fn apply_viewport(c: &mut BackdropContext, window: &Window) {
	if c.state.disabled().is_some() {
		return;
	}
	let Some(ctx) = c.ctx.as_ref() else {
		return;
	};
	let (w, h) = viewport_size(window);
	let config = c.settings.resolve(w);
	let dims = configure_surface(w, h, window.device_pixel_ratio(), config.max_dpr);
	dims.apply(&c.canvas, ctx);
	c.state.resize(config, dims);
	c.state.paint_backdrop(&mut CanvasPainter::new(ctx));
}

/// Renders the animated particle backdrop on a fixed full-viewport canvas.
///
/// Pass page settings via the reactive `settings` signal; the configuration
/// for the current viewport width is resolved from it on start and after
/// every resize.
#[component]
pub fn FlowFieldCanvas(#[prop(into)] settings: Signal<FlowSettings>) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let context: Rc<RefCell<Option<BackdropContext>>> = Rc::new(RefCell::new(None));
	let animate: FrameCallback = Rc::new(RefCell::new(None));
	let listeners: Rc<RefCell<Listeners>> = Rc::new(RefCell::new(Listeners::default()));

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			return;
		};
		let settings = settings.get();

		// Settings changed after start: treat it like a resize.
		if let Some(ref mut c) = *context.borrow_mut() {
			c.settings = settings;
			apply_viewport(c, &window);
			return;
		}

		let (w, h) = viewport_size(&window);
		let config = settings.resolve(w);
		let dims = configure_surface(w, h, window.device_pixel_ratio(), config.max_dpr);
		let ctx = match acquire_context(&canvas) {
			Ok(ctx) => Some(ctx),
			Err(e) => {
				warn!("flow-backdrop: {}", e);
				None
			}
		};
		let probe = StartupProbe {
			context_available: ctx.is_some(),
			reduced_motion: prefers_reduced_motion(&window),
		};

		let context_anim = context.clone();
		*animate.borrow_mut() = Some(Closure::new(move |timestamp: f64| {
			if let Some(ref mut c) = *context_anim.borrow_mut() {
				let BackdropContext {
					state,
					canvas,
					ctx,
					frames,
					..
				} = c;
				let Some(ctx) = ctx.as_ref() else {
					return;
				};
				let outcome = state.frame(timestamp, &mut CanvasPainter::new(ctx), frames);
				if let FrameOutcome::Disabled(reason) = outcome {
					publish_disabled(canvas, reason);
				}
			}
		}));

		let mut frames = WindowFrames {
			window: window.clone(),
			callback: animate.clone(),
		};
		let mut state = FlowFieldState::new(config, dims, random_seed());
		if let Some(ctx) = &ctx {
			dims.apply(&canvas, ctx);
		}

		// A page opened in a background tab starts paused.
		let started_at = now(&window);
		state.set_visible(!page_hidden(&window), started_at, &mut frames);
		let started = state.start(probe, started_at, &mut frames);
		match started {
			Ok(()) => {
				if let Some(ctx) = &ctx {
					state.paint_backdrop(&mut CanvasPainter::new(ctx));
				}
			}
			Err(reason) => publish_disabled(&canvas, reason),
		}
		*context.borrow_mut() = Some(BackdropContext {
			state,
			settings,
			canvas,
			ctx,
			frames,
		});
		if started.is_err() {
			return;
		}

		let mut l = listeners.borrow_mut();

		let context_resize = context.clone();
		let apply_resize: Rc<Closure<dyn FnMut()>> = Rc::new(Closure::new(move || {
			let Some(win) = web_sys::window() else {
				return;
			};
			if let Some(ref mut c) = *context_resize.borrow_mut() {
				apply_viewport(c, &win);
			}
		}));
		let timer: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
		l.resize = Some(Closure::new(move || {
			let Some(win) = web_sys::window() else {
				return;
			};
			if let Some(id) = timer.take() {
				win.clear_timeout_with_handle(id);
			}
			timer.set(
				win.set_timeout_with_callback_and_timeout_and_arguments_0(
					(*apply_resize).as_ref().unchecked_ref(),
					RESIZE_DEBOUNCE_MS,
				)
				.ok(),
			);
		}));

		let context_vis = context.clone();
		l.visibility = Some(Closure::new(move || {
			let Some(win) = web_sys::window() else {
				return;
			};
			let hidden = page_hidden(&win);
			if let Some(ref mut c) = *context_vis.borrow_mut() {
				c.state.set_visible(!hidden, now(&win), &mut c.frames);
			}
		}));

		let context_move = context.clone();
		l.pointer_move = Some(Closure::new(move |ev: MouseEvent| {
			if let Some(ref mut c) = *context_move.borrow_mut() {
				c.state
					.set_pointer(Some((ev.client_x() as f64, ev.client_y() as f64)));
			}
		}));

		let context_leave = context.clone();
		l.pointer_leave = Some(Closure::new(move || {
			if let Some(ref mut c) = *context_leave.borrow_mut() {
				c.state.set_pointer(None);
			}
		}));

		let context_hide = context.clone();
		l.page_hide = Some(Closure::new(move |ev: PageTransitionEvent| {
			let Some(win) = web_sys::window() else {
				return;
			};
			if let Some(ref mut c) = *context_hide.borrow_mut() {
				c.state.page_hide(ev.persisted(), now(&win), &mut c.frames);
			}
		}));

		if let Some(ref cb) = l.resize {
			let _ = window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
		}
		if let Some(ref cb) = l.page_hide {
			let _ =
				window.add_event_listener_with_callback("pagehide", cb.as_ref().unchecked_ref());
		}
		if let Some(document) = window.document() {
			if let Some(ref cb) = l.visibility {
				let _ = document
					.add_event_listener_with_callback("visibilitychange", cb.as_ref().unchecked_ref());
			}
			if let Some(root) = document.document_element() {
				if let Some(ref cb) = l.pointer_move {
					let _ =
						root.add_event_listener_with_callback("mousemove", cb.as_ref().unchecked_ref());
				}
				if let Some(ref cb) = l.pointer_leave {
					let _ = root
						.add_event_listener_with_callback("mouseleave", cb.as_ref().unchecked_ref());
				}
			}
		}
	});

	view! {
		<canvas
			node_ref=canvas_ref
			class="flow-backdrop-canvas"
			aria-hidden="true"
			style="position: fixed; inset: 0; display: block; pointer-events: none; z-index: -1;"
		/>
	}
}
