//! Windowed circle-field application

use anyhow::{Context, Result};
use circles_core::{FieldConfig, FrameTiming, NoiseConfig, MAX_CIRCLES};
use circles_render::{FrameScheduler, ImageResource, RenderContext};
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

/// Run the windowed viewer until the window closes.
pub fn run(config: FieldConfig, images: Vec<ImageResource>) -> Result<()> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = CirclesApp::new(config, images);
    event_loop.run_app(&mut app)?;

    Ok(())
}

struct CirclesApp {
    config: FieldConfig,
    // Taken by initialize(); present only before the window exists.
    pending_images: Option<Vec<ImageResource>>,
    window: Option<Arc<Window>>,
    context: Option<RenderContext>,
    scheduler: Option<FrameScheduler>,
    epoch: Instant,
    timing: FrameTiming,
    regenerations: u32,
}

impl CirclesApp {
    fn new(config: FieldConfig, images: Vec<ImageResource>) -> Self {
        Self {
            config,
            pending_images: Some(images),
            window: None,
            context: None,
            scheduler: None,
            epoch: Instant::now(),
            timing: FrameTiming::start(0.0),
            regenerations: 0,
        }
    }

    fn initialize(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_attrs = Window::default_attributes()
            .with_title("Circles")
            .with_inner_size(PhysicalSize::new(1024, 1024));

        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .context("Failed to create window")?,
        );
        self.window = Some(window.clone());

        let context = pollster::block_on(RenderContext::new(window.clone()))
            .context("Failed to initialize render context")?;

        let images = self.pending_images.take().unwrap_or_default();
        let scheduler = FrameScheduler::new(
            &context.device,
            &context.queue,
            context.config.format,
            images,
            self.config.noise,
            self.config.circle_count,
        )
        .context("Failed to build frame scheduler")?;

        log::info!(
            "viewer ready: {} circles, {}x{} surface",
            scheduler.circle_count(),
            context.config.width,
            context.config.height
        );

        self.epoch = Instant::now();
        self.timing = FrameTiming::start(0.0);
        self.context = Some(context);
        self.scheduler = Some(scheduler);

        window.request_redraw();
        Ok(())
    }

    fn adjust_count(&mut self, delta: i64) {
        if let Some(scheduler) = &mut self.scheduler {
            let next = (scheduler.circle_count() as i64 + delta).clamp(0, MAX_CIRCLES as i64);
            scheduler.set_circle_count(next as u32);
            log::info!("circle count: {}", scheduler.circle_count());
        }
    }

    fn regenerate(&mut self) {
        let (Some(context), Some(scheduler)) = (&self.context, &mut self.scheduler) else {
            return;
        };
        self.regenerations += 1;
        let noise = NoiseConfig {
            seed: self.config.noise.seed.wrapping_add(self.regenerations),
            ..self.config.noise
        };
        match scheduler.regenerate(&context.device, &context.queue, noise) {
            Ok(()) => log::info!("regenerated field with seed {}", noise.seed),
            Err(e) => log::error!("regenerate failed, keeping previous field: {e}"),
        }
    }

    fn redraw(&mut self) {
        let (Some(context), Some(scheduler)) = (&self.context, &mut self.scheduler) else {
            return;
        };
        self.timing = self.timing.advance(self.epoch.elapsed().as_secs_f64());
        scheduler.render_surface(context, &self.timing);
    }
}

impl ApplicationHandler for CirclesApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.initialize(event_loop) {
                log::error!("Failed to initialize viewer: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => {
                if let Some(context) = &mut self.context {
                    context.resize(new_size);
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed {
                    match event.physical_key {
                        PhysicalKey::Code(KeyCode::Escape) => {
                            event_loop.exit();
                        }
                        PhysicalKey::Code(KeyCode::ArrowUp) => {
                            self.adjust_count(8);
                        }
                        PhysicalKey::Code(KeyCode::ArrowDown) => {
                            self.adjust_count(-8);
                        }
                        PhysicalKey::Code(KeyCode::KeyR) => {
                            self.regenerate();
                        }
                        _ => {}
                    }
                }
            }

            WindowEvent::RedrawRequested => {
                self.redraw();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            _ => {}
        }
    }
}
