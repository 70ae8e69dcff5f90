//! Full press / poll / release scenarios through the public API

use input_map::{ActionType, Input, InputAction, KeyState};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Game {
    Fire,
    Dash,
    MoveForward,
    LightOn,
    LightOff,
    Roll,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Key {
    W,
    F,
    LeftShift,
    Space,
    L,
    Left,
    Right,
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn game_input() -> Input<Game, Key> {
    let mut input = Input::new();
    input.map_action(Game::Fire, ActionType::PressAndRelease, &[Key::F]).unwrap();
    input
        .map_action(Game::Dash, ActionType::ActivateOnce, &[Key::LeftShift, Key::Space])
        .unwrap();
    input
        .map_action(Game::MoveForward, ActionType::ContinuousHold, &[Key::W])
        .unwrap();
    input.map_toggle_action(Game::LightOn, Game::LightOff, Key::L).unwrap();
    input
}

#[test]
fn press_and_release_fires_only_after_release() {
    let mut input = game_input();
    let t0 = Instant::now();

    input.process_key_event_at(Key::F, KeyState::Press, t0);
    assert!(input.get_actions_at(t0 + ms(10)).is_empty());
    assert!(input.get_actions_at(t0 + ms(20)).is_empty());

    input.process_key_event_at(Key::F, KeyState::Release, t0 + ms(25));
    let fired = input.get_actions_at(t0 + ms(30));
    assert_eq!(fired, vec![InputAction { time_held_ms: 10, action: Game::Fire }]);

    // nothing left over on the next poll
    assert!(input.get_actions_at(t0 + ms(40)).is_empty());
}

#[test]
fn press_and_release_between_polls_never_fires() {
    let mut input = game_input();
    let t0 = Instant::now();

    input.process_key_event_at(Key::F, KeyState::Press, t0);
    input.process_key_event_at(Key::F, KeyState::Release, t0 + ms(3));
    assert!(input.get_actions_at(t0 + ms(10)).is_empty());
}

#[test]
fn press_and_release_combo_fires_when_one_key_lets_go() {
    let mut input: Input<Game, Key> = Input::new();
    input
        .map_action(Game::Roll, ActionType::PressAndRelease, &[Key::Left, Key::Right])
        .unwrap();
    let t0 = Instant::now();

    input.process_key_event_at(Key::Left, KeyState::Press, t0);
    assert!(input.get_actions_at(t0 + ms(5)).is_empty());
    input.process_key_event_at(Key::Right, KeyState::Press, t0 + ms(8));
    assert!(input.get_actions_at(t0 + ms(10)).is_empty());

    // Right is still down, letting go of Left completes the combo
    input.process_key_event_at(Key::Left, KeyState::Release, t0 + ms(20));
    let fired = input.get_actions_at(t0 + ms(26));
    assert_eq!(fired, vec![InputAction { time_held_ms: 16, action: Game::Roll }]);

    // releasing the other key afterwards does not fire a second time
    input.process_key_event_at(Key::Right, KeyState::Release, t0 + ms(30));
    assert!(input.get_actions_at(t0 + ms(40)).is_empty());
}

#[test]
fn double_tap_between_polls_fires_once() {
    let mut input = game_input();
    let t0 = Instant::now();

    input.process_key_event_at(Key::F, KeyState::Press, t0);
    assert!(input.get_actions_at(t0 + ms(10)).is_empty());

    input.process_key_event_at(Key::F, KeyState::Release, t0 + ms(20));
    input.process_key_event_at(Key::F, KeyState::Press, t0 + ms(30));
    input.process_key_event_at(Key::F, KeyState::Release, t0 + ms(45));
    let fired = input.get_actions_at(t0 + ms(50));
    assert_eq!(fired, vec![InputAction { time_held_ms: 40, action: Game::Fire }]);

    assert!(input.get_actions_at(t0 + ms(60)).is_empty());
}

#[test]
fn combo_requires_every_key() {
    let mut input = game_input();
    let t0 = Instant::now();

    input.process_key_event_at(Key::Space, KeyState::Press, t0);
    assert!(input.get_actions_at(t0 + ms(5)).is_empty());

    input.process_key_event_at(Key::LeftShift, KeyState::Press, t0 + ms(8));
    let fired = input.get_actions_at(t0 + ms(10));
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].action, Game::Dash);

    // releasing one key of the combo re-arms it
    input.process_key_event_at(Key::Space, KeyState::Release, t0 + ms(12));
    assert!(input.get_actions_at(t0 + ms(15)).is_empty());
    input.process_key_event_at(Key::Space, KeyState::Press, t0 + ms(18));
    assert_eq!(input.get_actions_at(t0 + ms(20))[0].action, Game::Dash);
}

#[test]
fn several_mappings_fire_in_mapping_order() {
    let mut input = game_input();
    let t0 = Instant::now();

    input.process_key_event_at(Key::W, KeyState::Press, t0);
    input.process_key_event_at(Key::L, KeyState::Press, t0);
    let fired = input.get_actions_at(t0 + ms(16));
    let actions: Vec<Game> = fired.iter().map(|a| a.action).collect();
    assert_eq!(actions, vec![Game::MoveForward, Game::LightOn]);

    input.process_key_event_at(Key::W, KeyState::Release, t0 + ms(20));
    input.process_key_event_at(Key::L, KeyState::Release, t0 + ms(20));
    let fired = input.get_actions_at(t0 + ms(32));
    assert_eq!(fired, vec![InputAction { time_held_ms: 16, action: Game::LightOff }]);
}

#[test]
fn unmapped_combo_stops_firing() {
    let mut input = game_input();
    let t0 = Instant::now();

    assert!(input.unmap_action(&[Key::W]));
    input.process_key_event_at(Key::W, KeyState::Press, t0);
    assert!(input.get_actions_at(t0 + ms(50)).is_empty());
    assert_eq!(input.mapping_count(), 3);
}
