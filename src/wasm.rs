use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use web_sys::HtmlCanvasElement;

use crate::config::StreamConfig;
use crate::gpu::renderer::Renderer;
use crate::layer::{LayerKind, LayerState};
use crate::material::ShaderLibrary;
use crate::stream::CognitionStream;

#[wasm_bindgen]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

struct CanvasTarget {
    renderer: Renderer,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

struct StreamContext {
    stream: CognitionStream,
    canvas: Option<CanvasTarget>,
}

/// Browser handle to a [`CognitionStream`].
///
/// Without a canvas the host renders from `render_tree_json`; with one
/// (see [`create_canvas_stream`]) `frame` also draws.
#[wasm_bindgen]
pub struct WasmCognitionStream {
    inner: Rc<RefCell<StreamContext>>,
}

fn build_stream(width: u32, user_agent: &str, config_json: Option<String>) -> Result<CognitionStream, JsValue> {
    let config = match config_json {
        Some(json) => StreamConfig::from_json_str(&json).map_err(js_error)?,
        None => StreamConfig::default(),
    };
    CognitionStream::new(&config, width, user_agent).map_err(js_error)
}

#[wasm_bindgen]
impl WasmCognitionStream {
    #[wasm_bindgen(constructor)]
    pub fn new(width: u32, user_agent: &str, config_json: Option<String>) -> Result<WasmCognitionStream, JsValue> {
        init_panic_hook();
        let stream = build_stream(width, user_agent, config_json)?;
        Ok(Self {
            inner: Rc::new(RefCell::new(StreamContext { stream, canvas: None })),
        })
    }

    pub fn set_layers(&self, higher_mind: bool, physical_brain: bool, physical_mind: bool) {
        self.inner.borrow_mut().stream.set_visibility(LayerState {
            higher_mind,
            physical_brain,
            physical_mind,
        });
    }

    /// Toggle a layer by name ("higherMind", "physicalBrain", "physicalMind").
    pub fn toggle_layer(&self, name: &str) -> Result<(), JsValue> {
        let kind: LayerKind = name.parse().map_err(|e: String| JsValue::from_str(&e))?;
        self.inner.borrow_mut().stream.toggle_layer(kind);
        Ok(())
    }

    /// Returns true if the quality flag changed and layers were regenerated.
    pub fn resize(&self, width: u32, height: u32, user_agent: &str) -> bool {
        let mut inner = self.inner.borrow_mut();
        let ctx = &mut *inner;
        if let Some(canvas) = ctx.canvas.as_mut() {
            canvas.config.width = width.max(1);
            canvas.config.height = height.max(1);
            canvas.surface.configure(canvas.renderer.device(), &canvas.config);
            canvas.renderer.resize(canvas.config.width, canvas.config.height);
        }
        ctx.stream.resize(width, user_agent)
    }

    pub fn is_reduced_quality(&self) -> bool {
        self.inner.borrow().stream.profile().reduced
    }

    /// Advance to `elapsed` seconds; returns the frame report as JSON.
    pub fn frame(&self, elapsed: f32) -> String {
        let mut inner = self.inner.borrow_mut();
        let ctx = &mut *inner;
        let report = ctx.stream.frame(elapsed);

        if let Some(canvas) = ctx.canvas.as_mut() {
            match canvas.surface.get_current_texture() {
                Ok(output) => {
                    let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
                    canvas.renderer.render(&view, &mut ctx.stream);
                    output.present();
                }
                Err(wgpu::SurfaceError::Lost) => {
                    canvas.surface.configure(canvas.renderer.device(), &canvas.config);
                }
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    log::error!("Surface out of memory");
                }
                Err(e) => {
                    log::warn!("Surface error: {:?}", e);
                }
            }
        }

        serde_json::to_string(&report).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn render_tree_json(&self) -> String {
        self.inner
            .borrow()
            .stream
            .render_tree_json()
            .unwrap_or_else(|_| "[]".to_string())
    }

    /// Quality profile (counts, camera, interaction) as JSON.
    pub fn profile_json(&self) -> String {
        serde_json::to_string(self.inner.borrow().stream.profile()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Resource stats for a layer as JSON, `null` when unmounted.
    pub fn layer_stats_json(&self, name: &str) -> Result<String, JsValue> {
        let kind: LayerKind = name.parse().map_err(|e: String| JsValue::from_str(&e))?;
        let stats = self.inner.borrow().stream.layer_stats(kind);
        serde_json::to_string(&stats).map_err(js_error)
    }
}

/// Create a stream that renders into `canvas` with wgpu.
#[wasm_bindgen]
pub async fn create_canvas_stream(
    canvas: HtmlCanvasElement,
    user_agent: String,
    config_json: Option<String>,
) -> Result<WasmCognitionStream, JsValue> {
    init_panic_hook();
    let stream = build_stream(canvas.client_width().max(0) as u32, &user_agent, config_json)?;

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let target = wgpu::SurfaceTarget::Canvas(canvas.clone());
    let surface = instance
        .create_surface(target)
        .map_err(|e| JsValue::from_str(&format!("Failed to create surface: {}", e)))?;

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::None,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| JsValue::from_str("Failed to find an appropriate adapter"))?;

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
                memory_hints: Default::default(),
            },
            None,
        )
        .await
        .map_err(|e| JsValue::from_str(&format!("Failed to create device: {}", e)))?;

    let surface_caps = surface.get_capabilities(&adapter);
    let surface_format = surface_caps
        .formats
        .iter()
        .copied()
        .find(|f: &wgpu::TextureFormat| f.is_srgb())
        .or_else(|| surface_caps.formats.first().copied())
        .ok_or_else(|| JsValue::from_str("Surface reports no formats"))?;

    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: surface_format,
        width: canvas.width().max(1),
        height: canvas.height().max(1),
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode: surface_caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &config);

    let renderer = Renderer::new(device, queue, config.format, config.width, config.height, &ShaderLibrary::new());

    Ok(WasmCognitionStream {
        inner: Rc::new(RefCell::new(StreamContext {
            stream,
            canvas: Some(CanvasTarget {
                renderer,
                surface,
                config,
            }),
        })),
    })
}
