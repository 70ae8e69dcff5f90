//! # Input Map
//!
//! Turns raw key press/release events into game actions.
//!
//! Key combos are mapped to user-defined action values (usually a small game
//! enum). Each poll of [`Input::get_actions`] returns the actions that fired
//! since the previous poll, according to the mapping's [`ActionType`].
//!
//! The crate knows nothing about any particular windowing backend: keys are any
//! `Copy + PartialEq` type, so a GLFW key, an SDL scancode or a test enum all work.
//!
//! ```rust
//! use input_map::{ActionType, Input, KeyState};
//!
//! #[derive(Debug, Clone, Copy, PartialEq)]
//! enum Act { Fire, Quit }
//!
//! let mut input: Input<Act, char> = Input::new();
//! input.map_action(Act::Quit, ActionType::ActivateOnce, &['q']).unwrap();
//! input.map_action(Act::Fire, ActionType::PressAndRelease, &['f']).unwrap();
//!
//! input.process_key_event('q', KeyState::Press);
//! let fired = input.get_actions();
//! assert_eq!(fired[0].action, Act::Quit);
//! ```

#![warn(missing_docs)]

mod input;
mod mapping;

pub use input::{Input, KeyState};
pub use mapping::{ActionMapping, ActionType, InputAction, MappingError};
