//! Key state tracking and action computation
//!
//! Key events pile up between polls. Each poll refreshes held times, walks the
//! mapping table in insertion order and emits the actions whose firing rule is met.

use std::fmt;
use std::time::{Duration, Instant};

use crate::mapping::{unique_keys, ActionMapping, ActionType, InputAction, MappingError};

/// Raw key transition reported by the windowing backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyState {
    /// Key went down
    Press,
    /// Key went up
    Release,
    /// Auto-repeat while held; ignored
    Repeat,
}

#[derive(Debug, Clone, Copy)]
struct KeyHeldInfo<K> {
    initial_press: Instant,
    time_held: Duration,
    key: K,
}

/// Keyboard action mapper
///
/// `A` is the action value handed back to the game, `K` the backend key type.
pub struct Input<A, K> {
    keys_held: Vec<KeyHeldInfo<K>>,
    keys_up: Vec<KeyHeldInfo<K>>,
    mappings: Vec<ActionMapping<A, K>>,
    last_update: Option<Instant>,
    clamp: Option<Duration>,
}

impl<A, K> Default for Input<A, K>
where
    A: Copy + fmt::Debug,
    K: Copy + PartialEq + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A, K> Input<A, K>
where
    A: Copy + fmt::Debug,
    K: Copy + PartialEq + fmt::Debug,
{
    /// Create an input mapper with no mappings
    pub fn new() -> Self {
        Self {
            keys_held: Vec::new(),
            keys_up: Vec::new(),
            mappings: Vec::new(),
            last_update: None,
            clamp: None,
        }
    }

    /// Forget all key state and every mapping
    pub fn free_all(&mut self) {
        self.clear_inputs();
        self.mappings.clear();
        self.last_update = None;
        self.clamp = None;
    }

    /// Forget held and released keys and reset every mapping's firing state
    pub fn clear_inputs(&mut self) {
        self.keys_held.clear();
        self.keys_up.clear();
        for mapping in &mut self.mappings {
            mapping.state = Default::default();
        }
    }

    /// Clamp held times after a long stall (breakpoint, frame hitch).
    ///
    /// The next poll reports no held time or hold delta above `max`.
    pub fn clamp_input_times(&mut self, max: Duration) {
        for held in self.keys_held.iter_mut().chain(self.keys_up.iter_mut()) {
            held.time_held = held.time_held.min(max);
        }
        self.clamp = Some(self.clamp.map_or(max, |old| old.min(max)));
    }

    /// Feed a key event stamped with the current time
    pub fn process_key_event(&mut self, key: K, state: KeyState) {
        self.process_key_event_at(key, state, Instant::now());
    }

    /// Feed a key event that happened at `now`
    pub fn process_key_event_at(&mut self, key: K, state: KeyState, now: Instant) {
        match state {
            KeyState::Press => self.add_held_key(key, now, false),
            KeyState::Release => self.add_held_key(key, now, true),
            KeyState::Repeat => {}
        }
    }

    fn add_held_key(&mut self, key: K, now: Instant, released: bool) {
        let Some(pos) = self.keys_held.iter().position(|held| held.key == key) else {
            if released {
                // focus came back with a key already down, e.g. after ctrl-alt-del
                log::trace!("Ignoring release of {:?} that was never pressed", key);
                return;
            }
            self.keys_held.push(KeyHeldInfo {
                initial_press: now,
                time_held: Duration::ZERO,
                key,
            });
            return;
        };

        let held = &mut self.keys_held[pos];
        held.time_held = now.saturating_duration_since(held.initial_press);
        if !released {
            return;
        }

        let held = self.keys_held.remove(pos);
        if let Some(up) = self.keys_up.iter_mut().find(|up| up.key == key) {
            up.time_held = held.time_held;
        } else {
            self.keys_up.push(held);
        }
    }

    /// Poll the actions fired since the previous poll
    pub fn get_actions(&mut self) -> Vec<InputAction<A>> {
        self.get_actions_at(Instant::now())
    }

    /// Poll the actions fired since the previous poll, as seen at `now`
    pub fn get_actions_at(&mut self, now: Instant) -> Vec<InputAction<A>> {
        for held in &mut self.keys_held {
            held.time_held = now.saturating_duration_since(held.initial_press);
        }
        if let Some(max) = self.clamp.take() {
            self.apply_clamp(now, max);
        }

        let actions = self.compute_actions(now);
        self.last_update = Some(now);
        actions
    }

    /// Pretend the stall never lasted longer than `max`: press times and the
    /// last poll move forward so later polls keep measuring from there
    fn apply_clamp(&mut self, now: Instant, max: Duration) {
        let floor = now.checked_sub(max);
        for held in &mut self.keys_held {
            if held.time_held > max {
                held.time_held = max;
                if let Some(floor) = floor {
                    held.initial_press = floor;
                }
            }
        }
        for up in &mut self.keys_up {
            up.time_held = up.time_held.min(max);
        }
        if let (Some(last), Some(floor)) = (self.last_update, floor) {
            if last < floor {
                self.last_update = Some(floor);
            }
        }
    }

    fn compute_actions(&mut self, now: Instant) -> Vec<InputAction<A>> {
        let mut fired = Vec::new();
        let last_update = self.last_update;
        let held = &self.keys_held;
        let up = &self.keys_up;

        for mapping in &mut self.mappings {
            if all_listed(&mapping.keys, held) {
                match mapping.action_type {
                    ActionType::ActivateOnce => {
                        if !mapping.state.once_fired {
                            fired.push(InputAction::new(Duration::ZERO, mapping.action));
                            mapping.state.once_fired = true;
                        }
                    }
                    ActionType::Toggle => {
                        if !mapping.state.toggle_active {
                            fired.push(InputAction::new(Duration::ZERO, mapping.action));
                            mapping.state.toggle_active = true;
                        }
                    }
                    ActionType::PressAndRelease => {
                        mapping.state.was_held = true;
                    }
                    ActionType::ContinuousHold => {
                        // some time must have passed since the press
                        let min_time = min_time_listed(&mapping.keys, held);
                        if min_time.is_zero() {
                            continue;
                        }
                        let elapsed =
                            last_update.map_or(min_time, |last| now.saturating_duration_since(last));
                        fired.push(InputAction::new(elapsed, mapping.action));
                    }
                    ActionType::AnalogAmount => {}
                }
            } else if any_listed(&mapping.keys, up) {
                let elapsed = last_update.map_or_else(
                    || min_time_listed(&mapping.keys, up),
                    |last| now.saturating_duration_since(last),
                );
                match mapping.action_type {
                    ActionType::PressAndRelease => {
                        if mapping.state.was_held {
                            fired.push(InputAction::new(elapsed, mapping.action));
                            mapping.state.was_held = false;
                        }
                    }
                    ActionType::ActivateOnce => {
                        mapping.state.once_fired = false;
                    }
                    ActionType::Toggle => {
                        if mapping.state.toggle_active {
                            if let Some(off) = mapping.action_off {
                                fired.push(InputAction::new(elapsed, off));
                            }
                            mapping.state.toggle_active = false;
                        }
                    }
                    ActionType::ContinuousHold | ActionType::AnalogAmount => {}
                }
            }
        }

        self.keys_up.clear();
        fired
    }

    /// Map a key combo to an action.
    ///
    /// Re-mapping an existing combo (same keys, any order) overwrites it in place.
    pub fn map_action(&mut self, action: A, mode: ActionType, keys: &[K]) -> Result<(), MappingError> {
        match mode {
            ActionType::Toggle => return Err(MappingError::ToggleNeedsOffAction),
            ActionType::AnalogAmount => return Err(MappingError::AnalogNotKeyMappable),
            _ => {}
        }
        self.insert_mapping(ActionMapping::new(mode, action, None, keys))
    }

    /// Map a single key as a toggle firing `action` on press and `action_off` on release
    pub fn map_toggle_action(&mut self, action: A, action_off: A, key: K) -> Result<(), MappingError> {
        self.insert_mapping(ActionMapping::new(
            ActionType::Toggle,
            action,
            Some(action_off),
            &[key],
        ))
    }

    fn insert_mapping(&mut self, mapping: ActionMapping<A, K>) -> Result<(), MappingError> {
        if mapping.keys.is_empty() {
            return Err(MappingError::EmptyCombo);
        }

        if let Some(existing) = self.mappings.iter_mut().find(|m| m.matches_keys(&mapping.keys)) {
            log::debug!("Remapping {:?} to {:?}", mapping.keys, mapping.action);
            *existing = mapping;
        } else {
            self.mappings.push(mapping);
        }
        Ok(())
    }

    /// Remove the mapping bound to exactly these keys; returns whether one existed
    pub fn unmap_action(&mut self, keys: &[K]) -> bool {
        let keys = unique_keys(keys);
        match self.mappings.iter().position(|m| m.matches_keys(&keys)) {
            Some(pos) => {
                self.mappings.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Whether a key is currently down
    pub fn is_held(&self, key: K) -> bool {
        self.keys_held.iter().any(|held| held.key == key)
    }

    /// Number of mapped combos
    pub fn mapping_count(&self) -> usize {
        self.mappings.len()
    }

    /// The mapping table in firing order
    pub fn mappings(&self) -> &[ActionMapping<A, K>] {
        &self.mappings
    }
}

fn all_listed<K: PartialEq>(keys: &[K], list: &[KeyHeldInfo<K>]) -> bool {
    keys.iter().all(|k| list.iter().any(|info| info.key == *k))
}

fn any_listed<K: PartialEq>(keys: &[K], list: &[KeyHeldInfo<K>]) -> bool {
    keys.iter().any(|k| list.iter().any(|info| info.key == *k))
}

fn min_time_listed<K: PartialEq>(keys: &[K], list: &[KeyHeldInfo<K>]) -> Duration {
    keys.iter()
        .filter_map(|k| list.iter().find(|info| info.key == *k))
        .map(|info| info.time_held)
        .min()
        .unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Act {
        Jump,
        Run,
        Crouch,
        Stand,
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_release_without_press_is_ignored() {
        let mut input: Input<Act, char> = Input::new();
        let t0 = Instant::now();
        input.process_key_event_at('a', KeyState::Release, t0);
        assert!(!input.is_held('a'));
        assert!(input.keys_up.is_empty());
    }

    #[test]
    fn test_repeat_does_nothing() {
        let mut input: Input<Act, char> = Input::new();
        let t0 = Instant::now();
        input.process_key_event_at('a', KeyState::Repeat, t0);
        assert!(!input.is_held('a'));
    }

    #[test]
    fn test_press_twice_keeps_single_entry() {
        let mut input: Input<Act, char> = Input::new();
        let t0 = Instant::now();
        input.process_key_event_at('a', KeyState::Press, t0);
        input.process_key_event_at('a', KeyState::Press, t0 + ms(10));
        assert_eq!(input.keys_held.len(), 1);
        assert_eq!(input.keys_held[0].time_held, ms(10));
    }

    #[test]
    fn test_release_moves_key_to_up_list() {
        let mut input: Input<Act, char> = Input::new();
        let t0 = Instant::now();
        input.process_key_event_at('a', KeyState::Press, t0);
        input.process_key_event_at('a', KeyState::Release, t0 + ms(40));
        assert!(!input.is_held('a'));
        assert_eq!(input.keys_up.len(), 1);
        assert_eq!(input.keys_up[0].time_held, ms(40));
    }

    #[test]
    fn test_toggle_rejected_by_map_action() {
        let mut input: Input<Act, char> = Input::new();
        assert_eq!(
            input.map_action(Act::Crouch, ActionType::Toggle, &['c']),
            Err(MappingError::ToggleNeedsOffAction)
        );
        assert_eq!(
            input.map_action(Act::Crouch, ActionType::AnalogAmount, &['c']),
            Err(MappingError::AnalogNotKeyMappable)
        );
        assert_eq!(
            input.map_action(Act::Crouch, ActionType::ActivateOnce, &[]),
            Err(MappingError::EmptyCombo)
        );
        assert_eq!(input.mapping_count(), 0);
    }

    #[test]
    fn test_remap_overwrites_same_combo() {
        let mut input: Input<Act, char> = Input::new();
        input.map_action(Act::Jump, ActionType::ActivateOnce, &['a', 'b']).unwrap();
        input.map_action(Act::Run, ActionType::ContinuousHold, &['b', 'a']).unwrap();
        assert_eq!(input.mapping_count(), 1);
        assert_eq!(input.mappings()[0].action(), Act::Run);
        assert_eq!(input.mappings()[0].action_type(), ActionType::ContinuousHold);
    }

    #[test]
    fn test_unmap_action() {
        let mut input: Input<Act, char> = Input::new();
        input.map_action(Act::Jump, ActionType::ActivateOnce, &['a', 'b']).unwrap();
        assert!(!input.unmap_action(&['a']));
        assert!(input.unmap_action(&['b', 'a']));
        assert_eq!(input.mapping_count(), 0);
    }

    #[test]
    fn test_activate_once_needs_release() {
        let mut input: Input<Act, char> = Input::new();
        input.map_action(Act::Jump, ActionType::ActivateOnce, &[' ']).unwrap();
        let t0 = Instant::now();

        input.process_key_event_at(' ', KeyState::Press, t0);
        let fired = input.get_actions_at(t0 + ms(5));
        assert_eq!(fired, vec![InputAction { time_held_ms: 0, action: Act::Jump }]);

        assert!(input.get_actions_at(t0 + ms(20)).is_empty());

        input.process_key_event_at(' ', KeyState::Release, t0 + ms(30));
        assert!(input.get_actions_at(t0 + ms(35)).is_empty());

        input.process_key_event_at(' ', KeyState::Press, t0 + ms(50));
        assert_eq!(input.get_actions_at(t0 + ms(55)).len(), 1);
    }

    #[test]
    fn test_toggle_fires_on_and_off() {
        let mut input: Input<Act, char> = Input::new();
        input.map_toggle_action(Act::Crouch, Act::Stand, 'c').unwrap();
        let t0 = Instant::now();

        input.process_key_event_at('c', KeyState::Press, t0);
        let on = input.get_actions_at(t0 + ms(10));
        assert_eq!(on, vec![InputAction { time_held_ms: 0, action: Act::Crouch }]);
        assert!(input.get_actions_at(t0 + ms(20)).is_empty());

        input.process_key_event_at('c', KeyState::Release, t0 + ms(25));
        let off = input.get_actions_at(t0 + ms(30));
        assert_eq!(off, vec![InputAction { time_held_ms: 10, action: Act::Stand }]);
    }

    #[test]
    fn test_continuous_hold_waits_for_elapsed_time() {
        let mut input: Input<Act, char> = Input::new();
        input.map_action(Act::Run, ActionType::ContinuousHold, &['w']).unwrap();
        let t0 = Instant::now();

        input.process_key_event_at('w', KeyState::Press, t0);
        assert!(input.get_actions_at(t0).is_empty());

        let fired = input.get_actions_at(t0 + ms(16));
        assert_eq!(fired, vec![InputAction { time_held_ms: 16, action: Act::Run }]);

        let fired = input.get_actions_at(t0 + ms(48));
        assert_eq!(fired[0].time_held_ms, 32);
    }

    #[test]
    fn test_first_poll_hold_uses_held_time() {
        let mut input: Input<Act, char> = Input::new();
        input.map_action(Act::Run, ActionType::ContinuousHold, &['w']).unwrap();
        let t0 = Instant::now();

        input.process_key_event_at('w', KeyState::Press, t0);
        let fired = input.get_actions_at(t0 + ms(70));
        assert_eq!(fired[0].time_held_ms, 70);
    }

    #[test]
    fn test_clamp_input_times() {
        let mut input: Input<Act, char> = Input::new();
        let t0 = Instant::now();
        input.process_key_event_at('w', KeyState::Press, t0);
        input.process_key_event_at('w', KeyState::Press, t0 + ms(5000));
        input.clamp_input_times(ms(100));
        assert_eq!(input.keys_held[0].time_held, ms(100));
    }

    #[test]
    fn test_clamp_caps_first_poll_hold() {
        let mut input: Input<Act, char> = Input::new();
        input.map_action(Act::Run, ActionType::ContinuousHold, &['w']).unwrap();
        let t0 = Instant::now();

        input.process_key_event_at('w', KeyState::Press, t0);
        input.clamp_input_times(ms(100));
        let fired = input.get_actions_at(t0 + ms(5000));
        assert_eq!(fired, vec![InputAction { time_held_ms: 100, action: Act::Run }]);

        // later polls measure from the clamped point again
        let fired = input.get_actions_at(t0 + ms(5016));
        assert_eq!(fired[0].time_held_ms, 16);
        assert_eq!(input.keys_held[0].time_held, ms(116));
    }

    #[test]
    fn test_clamp_caps_hold_delta_after_stall() {
        let mut input: Input<Act, char> = Input::new();
        input.map_action(Act::Run, ActionType::ContinuousHold, &['w']).unwrap();
        let t0 = Instant::now();

        input.process_key_event_at('w', KeyState::Press, t0);
        assert_eq!(input.get_actions_at(t0 + ms(16))[0].time_held_ms, 16);

        input.clamp_input_times(ms(50));
        let fired = input.get_actions_at(t0 + ms(10_016));
        assert_eq!(fired.len(), 1);
        assert!(fired[0].time_held_ms <= 50);

        // the clamp is used up by that poll
        assert_eq!(input.get_actions_at(t0 + ms(10_116))[0].time_held_ms, 100);
    }

    #[test]
    fn test_release_again_updates_up_entry() {
        let mut input: Input<Act, char> = Input::new();
        let t0 = Instant::now();

        input.process_key_event_at('x', KeyState::Press, t0);
        input.process_key_event_at('x', KeyState::Release, t0 + ms(20));
        input.process_key_event_at('x', KeyState::Press, t0 + ms(30));
        input.process_key_event_at('x', KeyState::Release, t0 + ms(45));

        assert_eq!(input.keys_up.len(), 1);
        assert_eq!(input.keys_up[0].time_held, ms(15));
        assert!(!input.is_held('x'));
    }

    #[test]
    fn test_clear_inputs_rearms_once() {
        let mut input: Input<Act, char> = Input::new();
        input.map_action(Act::Jump, ActionType::ActivateOnce, &[' ']).unwrap();
        let t0 = Instant::now();
        input.process_key_event_at(' ', KeyState::Press, t0);
        assert_eq!(input.get_actions_at(t0 + ms(1)).len(), 1);

        input.clear_inputs();
        assert!(!input.is_held(' '));
        input.process_key_event_at(' ', KeyState::Press, t0 + ms(2));
        assert_eq!(input.get_actions_at(t0 + ms(3)).len(), 1);
    }

    #[test]
    fn test_free_all_drops_mappings() {
        let mut input: Input<Act, char> = Input::new();
        input.map_action(Act::Jump, ActionType::ActivateOnce, &[' ']).unwrap();
        input.free_all();
        assert_eq!(input.mapping_count(), 0);
    }
}
