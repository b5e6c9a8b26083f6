use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

pub const DEFAULT_REPEAT_WAIT_TIME: u32 = 25;
pub const DEFAULT_REPEAT_DELAY: u32 = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("no input is mapped under the name {name:?}")]
    InvalidInputName { name: String },
}

/// Auto-repeat cadence, in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatTiming {
    pub wait_time: u32,
    pub delay: u32,
}

impl Default for RepeatTiming {
    fn default() -> Self {
        Self {
            wait_time: DEFAULT_REPEAT_WAIT_TIME,
            delay: DEFAULT_REPEAT_DELAY,
        }
    }
}

impl RepeatTiming {
    pub fn new(wait_time: u32, delay: u32) -> Self {
        let wait_time = wait_time.max(1);
        Self {
            wait_time,
            delay: delay.clamp(1, wait_time),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState {
    pub held: bool,
}

/// Raw per-tick physical key/button state, keyed by physical code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySnapshot {
    keys: HashMap<String, KeyState>,
}

impl KeySnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_held(mut self, code: &str) -> Self {
        self.set_held(code, true);
        self
    }

    pub fn set_held(&mut self, code: &str, held: bool) {
        self.keys.insert(code.to_string(), KeyState { held });
    }

    pub fn is_held(&self, code: &str) -> bool {
        self.keys.get(code).is_some_and(|state| state.held)
    }
}

/// Per-binding edge and repeat state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindingState {
    pub held: bool,
    pub pressed: bool,
    pub released: bool,
    pub repeat_timer: u32,
}

impl BindingState {
    /// Advances one tick given whether the bound code is down this tick.
    pub fn step(self, down: bool, timing: RepeatTiming) -> Self {
        let mut next = Self {
            pressed: false,
            released: false,
            ..self
        };

        if down && !self.held {
            next.pressed = true;
            next.repeat_timer = 0;
        } else if !down && self.held {
            next.released = true;
            next.repeat_timer = 0;
        }
        next.held = down;

        if next.held {
            // Backing off by `delay` rather than resetting makes the timer revisit
            // `wait_time` every `delay` ticks.
            if next.repeat_timer >= timing.wait_time {
                next.repeat_timer = next.repeat_timer.saturating_sub(timing.delay);
            }
            next.repeat_timer = next.repeat_timer.saturating_add(1);
        }

        next
    }

    pub fn pressed_with_repeat(&self, enable_repeat: bool, timing: RepeatTiming) -> bool {
        self.pressed || (enable_repeat && self.repeat_timer == timing.wait_time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBinding {
    name: String,
    code: Option<String>,
    state: BindingState,
}

impl InputBinding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn state(&self) -> BindingState {
        self.state
    }
}

/// Logical input names mapped onto physical codes, one code per name.
#[derive(Debug, Clone, Default)]
pub struct InputMap {
    bindings: Vec<InputBinding>,
    timing: RepeatTiming,
}

impl InputMap {
    pub fn new(timing: RepeatTiming) -> Self {
        Self {
            bindings: Vec::new(),
            timing,
        }
    }

    pub fn timing(&self) -> RepeatTiming {
        self.timing
    }

    /// Binds `name` to `code`. A binding already holding `code` takes over
    /// `name`'s previous code, or becomes unbound if there was none.
    pub fn map_input(&mut self, name: &str, code: &str) {
        let index = match self.position(name) {
            Some(index) => index,
            None => {
                self.bindings.push(InputBinding {
                    name: name.to_string(),
                    code: None,
                    state: BindingState::default(),
                });
                self.bindings.len() - 1
            }
        };

        let previous_code = self.bindings[index].code.clone();
        for (other_index, other) in self.bindings.iter_mut().enumerate() {
            if other_index != index && other.code.as_deref() == Some(code) {
                debug!(
                    input = name,
                    displaced = other.name.as_str(),
                    code,
                    swapped_to = previous_code.as_deref().unwrap_or("<unbound>"),
                    "input_binding_swapped"
                );
                other.code = previous_code.clone();
            }
        }
        self.bindings[index].code = Some(code.to_string());

        debug_assert!(self.codes_are_unique(), "two inputs share a physical code");
    }

    pub fn update(&mut self, keys: &KeySnapshot) {
        let timing = self.timing;
        for binding in &mut self.bindings {
            let down = binding
                .code
                .as_deref()
                .is_some_and(|code| keys.is_held(code));
            binding.state = binding.state.step(down, timing);
        }
    }

    pub fn pressed(&self, name: &str, enable_repeat: bool) -> Result<bool, InputError> {
        let state = self.binding(name)?.state;
        Ok(state.pressed_with_repeat(enable_repeat, self.timing))
    }

    pub fn released(&self, name: &str) -> Result<bool, InputError> {
        Ok(self.binding(name)?.state.released)
    }

    pub fn held(&self, name: &str) -> Result<bool, InputError> {
        Ok(self.binding(name)?.state.held)
    }

    pub fn binding(&self, name: &str) -> Result<&InputBinding, InputError> {
        self.position(name)
            .map(|index| &self.bindings[index])
            .ok_or_else(|| InputError::InvalidInputName {
                name: name.to_string(),
            })
    }

    pub fn bindings(&self) -> &[InputBinding] {
        &self.bindings
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.bindings.iter().position(|binding| binding.name == name)
    }

    fn codes_are_unique(&self) -> bool {
        let mut seen = Vec::with_capacity(self.bindings.len());
        for code in self.bindings.iter().filter_map(|binding| binding.code.as_deref()) {
            if seen.contains(&code) {
                return false;
            }
            seen.push(code);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(map: &mut InputMap, name_code: &str, held: bool) {
        let mut keys = KeySnapshot::empty();
        keys.set_held(name_code, held);
        map.update(&keys);
    }

    #[test]
    fn mapping_a_taken_code_unbinds_the_previous_owner() {
        let mut map = InputMap::default();
        map.map_input("a", "X");
        map.map_input("b", "X");

        assert_eq!(map.binding("a").expect("a").code(), None);
        assert_eq!(map.binding("b").expect("b").code(), Some("X"));
    }

    #[test]
    fn remapping_swaps_codes_between_inputs() {
        let mut map = InputMap::default();
        map.map_input("jump", "KeyZ");
        map.map_input("fire", "KeyX");
        map.map_input("jump", "KeyX");

        assert_eq!(map.binding("jump").expect("jump").code(), Some("KeyX"));
        assert_eq!(map.binding("fire").expect("fire").code(), Some("KeyZ"));
        assert!(map.codes_are_unique());
    }

    #[test]
    fn remapping_to_own_code_changes_nothing() {
        let mut map = InputMap::default();
        map.map_input("jump", "KeyZ");
        map.map_input("fire", "KeyX");
        map.map_input("jump", "KeyZ");

        assert_eq!(map.binding("jump").expect("jump").code(), Some("KeyZ"));
        assert_eq!(map.binding("fire").expect("fire").code(), Some("KeyX"));
    }

    #[test]
    fn edges_follow_the_held_sequence() {
        let mut map = InputMap::default();
        map.map_input("confirm", "KeyZ");

        let mut pressed = Vec::new();
        let mut released = Vec::new();
        let mut held = Vec::new();
        for down in [false, true, true, false] {
            feed(&mut map, "KeyZ", down);
            pressed.push(map.pressed("confirm", false).expect("mapped"));
            released.push(map.released("confirm").expect("mapped"));
            held.push(map.held("confirm").expect("mapped"));
        }

        assert_eq!(pressed, vec![false, true, false, false]);
        assert_eq!(released, vec![false, false, false, true]);
        assert_eq!(held, vec![false, true, true, false]);
    }

    #[test]
    fn repeat_fires_at_wait_time_then_every_delay() {
        let mut map = InputMap::new(RepeatTiming::new(25, 3));
        map.map_input("down", "ArrowDown");

        let mut repeat_ticks = Vec::new();
        for tick in 1..=40 {
            feed(&mut map, "ArrowDown", true);
            if map.pressed("down", true).expect("mapped") {
                repeat_ticks.push(tick);
            }
        }

        assert_eq!(repeat_ticks, vec![1, 25, 28, 31, 34, 37, 40]);
    }

    #[test]
    fn repeat_is_ignored_without_opt_in() {
        let mut map = InputMap::default();
        map.map_input("down", "ArrowDown");

        let mut pressed_ticks = Vec::new();
        for tick in 1..=30 {
            feed(&mut map, "ArrowDown", true);
            if map.pressed("down", false).expect("mapped") {
                pressed_ticks.push(tick);
            }
        }

        assert_eq!(pressed_ticks, vec![1]);
    }

    #[test]
    fn release_resets_repeat_timer() {
        let state = (0..30).fold(BindingState::default(), |state, _| {
            state.step(true, RepeatTiming::default())
        });
        assert!(state.repeat_timer > 0);

        let released = state.step(false, RepeatTiming::default());
        assert!(released.released);
        assert_eq!(released.repeat_timer, 0);
        assert!(!released.held);
    }

    #[test]
    fn unbound_input_never_goes_down() {
        let mut map = InputMap::default();
        map.map_input("a", "KeyA");
        map.map_input("b", "KeyA");

        let keys = KeySnapshot::empty().with_held("KeyA");
        map.update(&keys);

        assert!(!map.held("a").expect("a"));
        assert!(map.held("b").expect("b"));
    }

    #[test]
    fn unmapped_name_is_an_error() {
        let map = InputMap::default();

        assert_eq!(
            map.pressed("missing", false),
            Err(InputError::InvalidInputName {
                name: "missing".to_string()
            })
        );
        assert!(map.held("missing").is_err());
        assert!(map.released("missing").is_err());
    }

    #[test]
    fn repeat_timing_is_normalized() {
        assert_eq!(RepeatTiming::new(0, 0), RepeatTiming::new(1, 1));
        assert_eq!(RepeatTiming::new(4, 9).delay, 4);
    }
}
