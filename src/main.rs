use std::collections::HashSet;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::player::{MoveIntent, Player};
use crate::renderer::RayCaster;
use crate::scaler::{ScaleLut, blit_stretch};
use crate::surface::PixelSurface;
use crate::world::World;

mod camera;
mod player;
mod renderer;
mod scaler;
mod surface;
mod vec2;
mod world;

const SCREEN_WIDTH: i32 = 640;
const SCREEN_HEIGHT: i32 = 480;

#[derive(Parser)]
#[command(name = "gridcaster", about = "Grid-world ray-casting renderer")]
struct Args {
    /// Force the render pass onto a single worker
    #[arg(long)]
    single: bool,

    /// Render worker count (defaults to the rayon heuristic)
    #[arg(long, conflicts_with = "single")]
    threads: Option<usize>,

    /// Texture atlas image, textures stacked vertically and pre-rotated -90
    #[arg(long, default_value = "textures.png")]
    textures: PathBuf,
}

struct App {
    window: Option<Rc<Window>>,
    surface: Option<softbuffer::Surface<Rc<Window>, Rc<Window>>>,
    renderer: RayCaster,
    player: Player,

    scale_lut: ScaleLut,

    // Input and movement
    keys_down: HashSet<KeyCode>,
    mouse_dx: f32,
    last_tick: Instant,

    // HUD
    frame_counter: u32,
    last_fps_log: Instant,
    total_frames: u64,
}

impl App {
    fn new(args: &Args) -> anyhow::Result<Self> {
        let textures = PixelSurface::load(&args.textures)
            .with_context(|| format!("texture atlas {} is required", args.textures.display()))?;
        if textures.height() % textures.width() != 0 {
            log::warn!(
                "atlas height {} is not a multiple of its width {}",
                textures.height(),
                textures.width()
            );
        }

        let workers = if args.single { Some(1) } else { args.threads };
        let renderer = RayCaster::new(World::new(), textures, SCREEN_WIDTH, SCREEN_HEIGHT, workers)
            .context("render pool setup failed")?;

        log::info!(
            "renderer up: {}x{} internal, {} workers",
            SCREEN_WIDTH,
            SCREEN_HEIGHT,
            workers.map_or_else(|| "default".to_string(), |n| n.to_string())
        );

        Ok(Self {
            window: None,
            surface: None,
            renderer,
            player: Player::new(),
            scale_lut: ScaleLut::empty(),
            keys_down: HashSet::new(),
            mouse_dx: 0.0,
            last_tick: Instant::now(),
            frame_counter: 0,
            last_fps_log: Instant::now(),
            total_frames: 0,
        })
    }

    fn tick(&mut self) {
        // Compute dt with a cap to avoid huge jumps if the app was paused
        let now = Instant::now();
        let mut dt = now.duration_since(self.last_tick);
        self.last_tick = now;
        if dt > Duration::from_millis(100) {
            dt = Duration::from_millis(100);
        }
        let dt_s = dt.as_secs_f32();

        let axis = |neg: KeyCode, pos: KeyCode| {
            let mut value = 0.0;
            if self.keys_down.contains(&neg) {
                value -= 1.0;
            }
            if self.keys_down.contains(&pos) {
                value += 1.0;
            }
            value
        };

        let intent = MoveIntent {
            forward: axis(KeyCode::KeyS, KeyCode::KeyW),
            strafe: axis(KeyCode::KeyA, KeyCode::KeyD),
            turn: axis(KeyCode::KeyQ, KeyCode::KeyE),
            look: self.mouse_dx,
        };
        self.mouse_dx = 0.0;

        self.player
            .update(&intent, &self.renderer.world().walls, dt_s);

        // Movement settled; snapshot the camera before the render pass
        self.renderer
            .camera
            .set(self.player.center(), self.player.angle);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let attributes = Window::default_attributes()
            .with_title("gridcaster")
            .with_inner_size(LogicalSize::new(1280.0, 720.0));

        let window = Rc::new(event_loop.create_window(attributes).expect("create window"));

        let context = softbuffer::Context::new(window.clone()).expect("softbuffer context");
        let surface =
            softbuffer::Surface::new(&context, window.clone()).expect("softbuffer surface");

        let size = window.inner_size();
        self.scale_lut = ScaleLut::build(
            size.width as usize,
            size.height as usize,
            SCREEN_WIDTH as usize,
            SCREEN_HEIGHT as usize,
        );

        self.surface = Some(surface);
        self.window = Some(window);

        self.last_tick = Instant::now();
        self.window.as_ref().unwrap().request_redraw();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("close requested; stopping");
                event_loop.exit();
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key,
                        state,
                        ..
                    },
                ..
            } => {
                if let PhysicalKey::Code(code) = physical_key {
                    match state {
                        ElementState::Pressed => {
                            self.keys_down.insert(code);
                        }
                        ElementState::Released => {
                            self.keys_down.remove(&code);
                        }
                    }
                }
            }

            WindowEvent::RedrawRequested => {
                self.tick();

                let (window, surface) = match (&self.window, &mut self.surface) {
                    (Some(w), Some(s)) if w.id() == id => (w, s),
                    _ => return,
                };

                let size = window.inner_size();
                let (dw, dh) = (size.width as usize, size.height as usize);
                if dw == 0 || dh == 0 {
                    return; // Minimized window, skip drawing
                }

                surface
                    .resize(
                        NonZeroU32::new(dw as u32).unwrap(),
                        NonZeroU32::new(dh as u32).unwrap(),
                    )
                    .unwrap();

                self.renderer.process_screen();

                let mut buf = surface.buffer_mut().expect("buffer_mut");
                blit_stretch(&mut buf, dw, self.renderer.screen(), &self.scale_lut);
                buf.present().unwrap();

                self.frame_counter += 1;
                self.total_frames += 1;
                let now = Instant::now();
                let elapsed = now.duration_since(self.last_fps_log).as_secs_f32();
                if elapsed >= 1.0 {
                    log::info!("fps: {:.1}", self.frame_counter as f32 / elapsed);
                    self.frame_counter = 0;
                    self.last_fps_log = now;
                }

                self.window.as_ref().unwrap().request_redraw();
            }

            WindowEvent::Resized(new_size) => {
                self.scale_lut = ScaleLut::build(
                    new_size.width as usize,
                    new_size.height as usize,
                    SCREEN_WIDTH as usize,
                    SCREEN_HEIGHT as usize,
                );
            }
            _ => (),
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.mouse_dx += delta.0 as f32;
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(&args)?;
    let start = Instant::now();
    event_loop.run_app(&mut app)?;

    let elapsed = start.elapsed().as_secs_f32();
    log::info!(
        "ran {:.1}s, {} frames, {:.1} fps average",
        elapsed,
        app.total_frames,
        app.total_frames as f32 / elapsed
    );

    Ok(())
}
