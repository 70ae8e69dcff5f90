//! Triangle demo
//!
//! Opens a window, builds the fixed pipeline from the configured shaders and
//! presents a triangle. Escape quits, holding Space flips the clear colour,
//! Left+Right logs a combo and W logs how long it was held.

use ash::vk;
use drunk_spock::config::ConfigError;
use drunk_spock::foundation::logging;
use drunk_spock::prelude::*;
use glfw::Key;
use input_map::MappingError;
use std::cell::Cell;
use std::rc::Rc;
use thiserror::Error;

const CONFIG_PATH: &str = "drunk_spock.toml";
const GRAPHICS_QUEUE: &str = "graphics";
const PRESENT_QUEUE: &str = "present";

/// Clear colour while Space is held
const FLASH_COLOR: [f32; 4] = [0.2, 0.05, 0.3, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Quit,
    FlashOn,
    FlashOff,
    Combo,
    Thrust,
}

#[derive(Error, Debug)]
enum AppError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    #[error("Input mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("{0}")]
    Setup(&'static str),
}

/// Game side of the loop: reacts to fired actions and notes when a frame is due
#[derive(Default)]
struct Demo {
    quit: bool,
    flash: bool,
    flash_changed: bool,
    frame_due: bool,
}

impl GameLoopHandler<Action> for Demo {
    fn game_tic(&mut self, _delta_ms: u64, input: Option<&mut KeyInput<Action>>) {
        let Some(input) = input else {
            return;
        };

        for fired in input.get_actions() {
            match fired.action {
                Action::Quit => self.quit = true,
                Action::FlashOn | Action::FlashOff => {
                    self.flash = fired.action == Action::FlashOn;
                    self.flash_changed = true;
                }
                Action::Combo => log::info!("Left+Right released"),
                Action::Thrust => log::info!("W held for {} ms", fired.time_held_ms),
            }
        }
    }

    fn render_tic(&mut self) {
        self.frame_due = true;
    }

    fn window_closing(&mut self) {
        log::info!("Window closing");
    }
}

/// Devices, pipeline and the recorded command buffers.
///
/// Field order is drop order: the pipeline goes before the devices it borrows from.
struct Renderer {
    pipeline: PipeLine,
    devices: Devices,
    command_buffers: Vec<vk::CommandBuffer>,
    base_clear: [f32; 4],
}

impl Renderer {
    fn new(spock: &DrunkSpock, window: &GameWindow<Action>, config: &RenderConfig) -> Result<Self, AppError> {
        let mut devices = Devices::new(spock)?;

        let phys = devices
            .suitable_device_index()
            .ok_or(AppError::Setup("No GPU with graphics and present support"))?;
        let (graphics, present) = devices
            .graphics_present_families(phys)
            .ok_or(AppError::Setup("No graphics and present queue families"))?;
        log::info!(
            "Using {} (graphics family {}, present family {})",
            devices.physical_device_name(phys)?,
            graphics,
            present
        );

        let mut requests = vec![QueueRequest::single(graphics)];
        if present != graphics {
            requests.push(QueueRequest::single(present));
        }
        devices.create_logical_device(phys, &requests, &[], None)?;

        let pool_flags = vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER;
        devices.set_queue_name(GRAPHICS_QUEUE, graphics, 0, pool_flags)?;
        devices.set_queue_name(PRESENT_QUEUE, present, 0, pool_flags)?;
        devices.set_out_of_date_hook(|_| log::debug!("Swapchain reported out of date"));
        devices.set_prefer_mailbox(config.prefer_mailbox);

        let (width, height) = window.framebuffer_size();
        devices.create_swapchain(spock, width, height)?;

        let mut pipeline = PipeLine::new(&devices, config.max_frames_in_flight)?;
        pipeline.load_shader(&config.vertex_shader)?;
        pipeline.load_shader(&config.fragment_shader)?;
        pipeline.create(&devices, &config.vertex_shader, &config.fragment_shader)?;
        pipeline.create_frame_buffers(&devices)?;

        let mut renderer = Self {
            pipeline,
            devices,
            command_buffers: Vec::new(),
            base_clear: config.clear_color,
        };
        renderer.record(false)?;
        Ok(renderer)
    }

    /// Re-record one command buffer per chain image
    fn record(&mut self, flash: bool) -> Result<(), AppError> {
        self.devices.wait_idle()?;
        self.devices
            .command_pool(GRAPHICS_QUEUE)?
            .free_command_buffers(&self.command_buffers);
        self.command_buffers = self.pipeline.allocate_command_buffers(&self.devices, GRAPHICS_QUEUE)?;

        let clear = if flash { FLASH_COLOR } else { self.base_clear };
        for (index, &cb) in self.command_buffers.iter().enumerate() {
            self.pipeline.begin_buffer(cb, index, clear)?;
            self.pipeline.draw(cb, 3, 1);
            self.pipeline.end_buffer(cb)?;
        }
        Ok(())
    }

    /// Rebuild everything sized by the swapchain; waits while minimised
    fn rebuild(&mut self, spock: &DrunkSpock, window: &mut GameWindow<Action>, flash: bool) -> Result<(), AppError> {
        let (mut width, mut height) = window.framebuffer_size();
        while width == 0 || height == 0 {
            if window.window().map_or(true, |w| w.should_close()) {
                return Ok(());
            }
            window.wait_events();
            (width, height) = window.framebuffer_size();
        }

        log::debug!("Rebuilding swapchain at {}x{}", width, height);
        self.devices.wait_idle()?;
        self.devices.recreate_swapchain(spock, width, height)?;
        self.pipeline.recreate(&self.devices)?;
        self.record(flash)
    }

    fn draw(&mut self) -> Result<FrameStatus, AppError> {
        Ok(self
            .pipeline
            .draw_stuffs(&self.devices, &self.command_buffers, GRAPHICS_QUEUE, PRESENT_QUEUE)?)
    }
}

fn map_keys(input: &mut KeyInput<Action>) -> Result<(), MappingError> {
    input.map_action(Action::Quit, ActionType::ActivateOnce, &[Key::Escape])?;
    input.map_toggle_action(Action::FlashOn, Action::FlashOff, Key::Space)?;
    input.map_action(Action::Combo, ActionType::PressAndRelease, &[Key::Left, Key::Right])?;
    input.map_action(Action::Thrust, ActionType::ContinuousHold, &[Key::W])?;
    Ok(())
}

fn run() -> Result<(), AppError> {
    let config = EngineConfig::load_or_default(CONFIG_PATH)?;

    let mut spock = DrunkSpock::init_vulkan(&config.app)?;
    let reported_errors = Rc::new(Cell::new(0_usize));
    let counter = Rc::clone(&reported_errors);
    spock.set_error_hook(move |_| counter.set(counter.get() + 1));

    let mut window: GameWindow<Action> = GameWindow::new(&spock, &config.window, config.timing.clone())?;
    spock.create_window_surface(&window)?;

    let mut input = KeyInput::new();
    map_keys(&mut input)?;
    window.attach_input(input);

    let mut renderer = Renderer::new(&spock, &window, &config.render)?;
    let mut demo = Demo::default();

    log::info!("Running; Escape quits");
    loop {
        if window.game_loop(&mut demo) || demo.quit {
            break;
        }
        spock.pump_validation_messages();

        if window.take_resized() {
            renderer.rebuild(&spock, &mut window, demo.flash)?;
        } else if std::mem::take(&mut demo.flash_changed) {
            renderer.record(demo.flash)?;
        }

        if std::mem::take(&mut demo.frame_due) {
            match renderer.draw()? {
                FrameStatus::Presented => {}
                FrameStatus::Suboptimal | FrameStatus::SwapchainOutOfDate => {
                    renderer.rebuild(&spock, &mut window, demo.flash)?;
                }
            }
        }
    }

    renderer.devices.wait_idle()?;
    drop(renderer);
    window.destroy();

    spock.pump_validation_messages();
    if reported_errors.get() > 0 {
        log::warn!("{} errors or validation warnings were reported", reported_errors.get());
    }
    Ok(())
}

fn main() {
    logging::init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
