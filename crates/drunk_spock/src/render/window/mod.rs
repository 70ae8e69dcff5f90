//! GLFW game window
//!
//! Owns the window, paces game and render tics, and forwards keyboard
//! events into an attached [`Input`].

pub mod placement;

use crate::config::{TimingConfig, WindowConfig};
use crate::foundation::time::{FrameClock, TicScheduler};
use crate::DrunkSpock;
use ash::vk;
use input_map::{Input, KeyState};
use placement::{compute_window_position, MonitorInfo};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Window errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not create the window
    #[error("Failed to create window: {0}")]
    CreationFailed(String),

    /// The window was already destroyed
    #[error("Window has been destroyed")]
    Destroyed,

    /// Vulkan surface creation failed
    #[error("Window surface creation failed: {0:?}")]
    Surface(vk::Result),
}

/// Input mapper fed by GLFW key events
pub type KeyInput<A> = Input<A, glfw::Key>;

/// Callbacks fired by [`GameWindow::game_loop`]
pub trait GameLoopHandler<A> {
    /// Fixed-rate game update with the milliseconds since the previous one
    fn game_tic(&mut self, delta_ms: u64, input: Option<&mut KeyInput<A>>);

    /// Fixed-rate render request
    fn render_tic(&mut self) {}

    /// The user asked to close the window
    fn window_closing(&mut self) {}
}

/// Game window
///
/// `A` is the action type of the attached input mapper.
pub struct GameWindow<A = ()> {
    glfw: glfw::Glfw,
    window: Option<glfw::PWindow>,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    input: Option<KeyInput<A>>,
    clock: FrameClock,
    scheduler: TicScheduler,
    timing: TimingConfig,
    resized: bool,
}

impl<A> GameWindow<A>
where
    A: Copy + fmt::Debug,
{
    /// Open a window without a client API and place it on the configured monitor
    pub fn new(spock: &DrunkSpock, config: &WindowConfig, timing: TimingConfig) -> Result<Self, WindowError> {
        let mut glfw = spock.glfw().clone();

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(config.resizable));

        let (mut window, events) = glfw
            .create_window(config.width, config.height, &config.title, glfw::WindowMode::Windowed)
            .ok_or_else(|| WindowError::CreationFailed(config.title.clone()))?;

        let monitors: Vec<MonitorInfo> = glfw.with_connected_monitors(|_, monitors| {
            monitors
                .iter()
                .map(|monitor| {
                    let (x, y) = monitor.get_pos();
                    let mode = monitor.get_video_mode();
                    MonitorInfo {
                        x,
                        y,
                        width: mode.map_or(0, |m| m.width),
                        height: mode.map_or(0, |m| m.height),
                    }
                })
                .collect()
        });

        let (x, y) = compute_window_position(
            &monitors,
            config.monitor,
            window.get_pos(),
            (config.width, config.height),
            config.center,
        );

        log::info!("GLFW {}", glfw::get_version_string());
        log::debug!("Placing window at {},{} ({} monitors)", x, y, monitors.len());
        window.set_pos(x, y);
        window.set_key_polling(true);
        window.set_framebuffer_size_polling(true);

        Ok(Self {
            glfw,
            window: Some(window),
            events,
            input: None,
            clock: FrameClock::new(),
            scheduler: TicScheduler::new(timing.update_tic_ms, timing.render_tic_ms),
            timing,
            resized: false,
        })
    }

    /// Change the game and render tic intervals in milliseconds
    pub fn set_tic_rate(&mut self, update_tic_ms: u64, render_tic_ms: u64) {
        self.scheduler.set_tic_rate(update_tic_ms, render_tic_ms);
    }

    /// Run one loop iteration; returns true when the game should quit
    pub fn game_loop<H>(&mut self, handler: &mut H) -> bool
    where
        H: GameLoopHandler<A>,
    {
        let Some(window) = self.window.as_ref() else {
            return true;
        };

        self.glfw.poll_events();
        for (_, event) in glfw::flush_messages(&self.events) {
            match event {
                glfw::WindowEvent::Key(key, _, action, _) => {
                    if let Some(input) = self.input.as_mut() {
                        input.process_key_event(key, key_state(action));
                    }
                }
                glfw::WindowEvent::FramebufferSize(width, height) => {
                    log::debug!("Framebuffer resized to {}x{}", width, height);
                    self.resized = true;
                }
                _ => {}
            }
        }

        if window.should_close() {
            handler.window_closing();
            return true;
        }

        let delta = self.clock.tick();
        let tics = self.scheduler.advance(delta);
        if let Some(game_ms) = tics.game {
            handler.game_tic(game_ms, self.input.as_mut());
        }
        if tics.render.is_some() {
            handler.render_tic();
        }

        if TicScheduler::should_idle(delta, self.timing.idle_threshold_ms) {
            std::thread::sleep(Duration::from_millis(self.timing.idle_sleep_ms));
        }
        false
    }

    /// Feed key events into `input`, replacing any attached mapper
    pub fn attach_input(&mut self, input: KeyInput<A>) {
        self.input = Some(input);
    }

    /// The attached input mapper
    pub fn input_mut(&mut self) -> Option<&mut KeyInput<A>> {
        self.input.as_mut()
    }

    /// Stop feeding key events and hand the mapper back
    pub fn detach_input(&mut self) -> Option<KeyInput<A>> {
        self.input.take()
    }
}

impl<A> GameWindow<A> {
    /// Framebuffer size in pixels; zero after destroy
    pub fn framebuffer_size(&self) -> (u32, u32) {
        self.window.as_ref().map_or((0, 0), |window| {
            let (width, height) = window.get_framebuffer_size();
            (
                u32::try_from(width).unwrap_or(0),
                u32::try_from(height).unwrap_or(0),
            )
        })
    }

    /// Whether the framebuffer was resized since the last call
    pub fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    /// Ask the loop to end at the next iteration
    pub fn set_should_close(&mut self, close: bool) {
        if let Some(window) = self.window.as_mut() {
            window.set_should_close(close);
        }
    }

    /// Block until an event arrives, for minimised windows
    pub fn wait_events(&mut self) {
        self.glfw.wait_events();
    }

    /// Whether [`Self::destroy`] was called
    pub fn is_destroyed(&self) -> bool {
        self.window.is_none()
    }

    /// Close the window; later calls do nothing
    pub fn destroy(&mut self) {
        if self.window.take().is_some() {
            log::debug!("Window destroyed");
        }
    }

    pub(crate) fn create_surface(&self, instance: vk::Instance) -> Result<vk::SurfaceKHR, WindowError> {
        let window = self.window.as_ref().ok_or(WindowError::Destroyed)?;
        let mut surface = vk::SurfaceKHR::null();
        let result = window.create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::Surface(result))
        }
    }

    /// Native window, for anything this wrapper does not cover
    pub fn window(&self) -> Option<&glfw::PWindow> {
        self.window.as_ref()
    }
}

fn key_state(action: glfw::Action) -> KeyState {
    match action {
        glfw::Action::Press => KeyState::Press,
        glfw::Action::Release => KeyState::Release,
        glfw::Action::Repeat => KeyState::Repeat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_state_mapping() {
        assert_eq!(key_state(glfw::Action::Press), KeyState::Press);
        assert_eq!(key_state(glfw::Action::Release), KeyState::Release);
        assert_eq!(key_state(glfw::Action::Repeat), KeyState::Repeat);
    }
}
