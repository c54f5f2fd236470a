// Host-agnostic input model fed to the viewport each frame.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Forward,
    Back,
    Left,
    Right,
    Jump,
    Sprint,
    LookUp,
    LookDown,
    LookLeft,
    LookRight,
    Interact,
    Cancel,
}

impl Key {
    /// Keys that move or turn the avatar; ignored while an external modal is open.
    pub fn is_movement(self) -> bool {
        matches!(
            self,
            Key::Forward
                | Key::Back
                | Key::Left
                | Key::Right
                | Key::Jump
                | Key::LookUp
                | Key::LookDown
                | Key::LookLeft
                | Key::LookRight
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
}

/// Pointer position in normalized device coordinates (x, y in -1..=1, y up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ndc {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down {
        at: Ndc,
        button: PointerButton,
        /// Pan modifier (shift) held.
        modifier: bool,
    },
    /// `dx`/`dy` are raw pixel deltas since the previous move event.
    Move { at: Ndc, dx: f32, dy: f32 },
    Up,
    Wheel { delta: f32 },
}

/// Virtual joystick state for touch input; components in -1..=1.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Joystick {
    pub dx: f32,
    pub dy: f32,
}

#[derive(Debug, Clone, Default)]
pub struct InputState {
    held: HashSet<Key>,
    pub joystick: Option<Joystick>,
    /// One-shot touch tap, consumed by hotspot interaction.
    pub tap: bool,
}

impl InputState {
    pub fn press(&mut self, key: Key) {
        self.held.insert(key);
    }

    pub fn release(&mut self, key: Key) {
        self.held.remove(&key);
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    /// Edge-triggered read: returns whether `key` was held and clears it.
    pub fn take(&mut self, key: Key) -> bool {
        self.held.remove(&key)
    }

    pub fn clear_movement(&mut self) {
        self.held.retain(|k| !k.is_movement());
    }
}
