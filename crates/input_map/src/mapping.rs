//! Action mapping types
//!
//! An [`ActionMapping`] binds a key combo to an action value and carries the
//! per-mapping runtime state the firing rules need between polls.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// How a mapped key combo turns into fired actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    /// Fires every poll while the combo is held, carrying the time since the last poll
    ContinuousHold,
    /// Fires once when the combo is released after having been fully held
    PressAndRelease,
    /// Stick axis or mouse movement amount; cannot be driven by keys
    AnalogAmount,
    /// Fires the "on" action when pressed and the "off" action when released
    Toggle,
    /// Fires on press, must be released before it can fire again
    ActivateOnce,
}

/// Errors raised when editing the mapping table
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// Toggles need an off action, map them with `map_toggle_action`
    #[error("toggle actions must be mapped with map_toggle_action")]
    ToggleNeedsOffAction,

    /// Analog amounts come from axes, not key combos
    #[error("analog amount actions cannot be mapped to keys")]
    AnalogNotKeyMappable,

    /// A mapping needs at least one key
    #[error("key combo is empty")]
    EmptyCombo,
}

/// An action that fired during a poll
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputAction<A> {
    /// Time in milliseconds the action was held since the previous poll (0 for edge actions)
    pub time_held_ms: u64,
    /// The user's action value
    pub action: A,
}

impl<A> InputAction<A> {
    pub(crate) fn new(time_held: Duration, action: A) -> Self {
        Self {
            time_held_ms: u64::try_from(time_held.as_millis()).unwrap_or(u64::MAX),
            action,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct MappingState {
    pub(crate) once_fired: bool,
    pub(crate) toggle_active: bool,
    pub(crate) was_held: bool,
}

/// A key combo bound to an action
#[derive(Debug, Clone)]
pub struct ActionMapping<A, K> {
    pub(crate) action_type: ActionType,
    pub(crate) action: A,
    pub(crate) action_off: Option<A>,
    pub(crate) keys: Vec<K>,
    pub(crate) state: MappingState,
}

impl<A: Copy, K: Copy + PartialEq> ActionMapping<A, K> {
    pub(crate) fn new(action_type: ActionType, action: A, action_off: Option<A>, keys: &[K]) -> Self {
        Self {
            action_type,
            action,
            action_off,
            keys: unique_keys(keys),
            state: MappingState::default(),
        }
    }

    /// How this mapping fires
    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    /// Action fired on activation
    pub fn action(&self) -> A {
        self.action
    }

    /// Action fired when a toggle turns off
    pub fn action_off(&self) -> Option<A> {
        self.action_off
    }

    /// Keys of the combo, without duplicates
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Whether this mapping is bound to exactly the given key set, in any order
    pub fn matches_keys(&self, keys: &[K]) -> bool {
        let keys = unique_keys(keys);
        keys.len() == self.keys.len() && keys.iter().all(|k| self.keys.contains(k))
    }
}

/// Drop repeated keys while keeping the first occurrence order
pub(crate) fn unique_keys<K: Copy + PartialEq>(keys: &[K]) -> Vec<K> {
    let mut unique = Vec::with_capacity(keys.len());
    for &key in keys {
        if !unique.contains(&key) {
            unique.push(key);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_keys_ignores_order() {
        let mapping = ActionMapping::new(ActionType::ActivateOnce, 1u8, None, &['a', 'b']);
        assert!(mapping.matches_keys(&['b', 'a']));
        assert!(!mapping.matches_keys(&['a']));
        assert!(!mapping.matches_keys(&['a', 'b', 'c']));
    }

    #[test]
    fn test_duplicate_keys_collapse() {
        let mapping = ActionMapping::new(ActionType::ContinuousHold, 1u8, None, &['a', 'a', 'b']);
        assert_eq!(mapping.keys(), &['a', 'b']);
        assert!(mapping.matches_keys(&['a', 'b', 'b']));
    }

    #[test]
    fn test_input_action_rounds_down_to_millis() {
        let act = InputAction::new(Duration::from_micros(16_900), ());
        assert_eq!(act.time_held_ms, 16);
    }
}
