//! Platform-neutral input events and held-button state.
//!
//! The platform shim translates its window events into [`InputEvent`]s; the
//! render core feeds them to an [`InputState`] and reads it once per frame.

use glam::Vec2;
use hashbrown::HashMap;

/// Keys the viewer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    A,
    S,
    D,
    Q,
    E,
    Space,
    Shift,
    Tab,
    F,
    Digit1,
    Digit2,
    Digit3,
    Digit4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Input delivered by the platform shim.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyPressed(Key),
    KeyReleased(Key),
    MouseButtonPressed(MouseButton),
    MouseButtonReleased(MouseButton),
    /// Relative pointer motion in pixels.
    MouseMoved { dx: f32, dy: f32 },
    /// Wheel motion in lines; positive scrolls away from the user.
    Scroll(f32),
    /// The window lost focus; everything held is released.
    FocusLost,
}

/// State of a key or mouse button.
///
/// ```text
/// Released ─press()─> JustPressed ─end_frame()─> Pressed
///     ^                                             │
///     │                                          release()
///     │                                             v
///     └────────────end_frame()───────────── JustReleased
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonState {
    JustPressed,
    Pressed,
    JustReleased,
    #[default]
    Released,
}

impl ButtonState {
    #[inline]
    #[must_use]
    pub const fn is_pressed(self) -> bool {
        matches!(self, Self::JustPressed | Self::Pressed)
    }

    #[inline]
    #[must_use]
    pub const fn is_just_pressed(self) -> bool {
        matches!(self, Self::JustPressed)
    }

    pub fn press(&mut self) {
        if !self.is_pressed() {
            *self = Self::JustPressed;
        }
    }

    pub fn release(&mut self) {
        if self.is_pressed() {
            *self = Self::JustReleased;
        }
    }

    /// Advance single-frame states.
    pub fn end_frame(&mut self) {
        *self = match *self {
            Self::JustPressed | Self::Pressed => Self::Pressed,
            Self::JustReleased | Self::Released => Self::Released,
        };
    }
}

/// Keys, buttons and motion accumulated since the last frame.
#[derive(Debug, Default)]
pub struct InputState {
    keys: HashMap<Key, ButtonState>,
    buttons: HashMap<MouseButton, ButtonState>,
    mouse_delta: Vec2,
    scroll: f32,
}

impl InputState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event. Returns `true` if it changed the state.
    pub fn process_event(&mut self, event: &InputEvent) -> bool {
        match *event {
            InputEvent::KeyPressed(key) => self.keys.entry(key).or_default().press(),
            InputEvent::KeyReleased(key) => self.keys.entry(key).or_default().release(),
            InputEvent::MouseButtonPressed(button) => {
                self.buttons.entry(button).or_default().press();
            }
            InputEvent::MouseButtonReleased(button) => {
                self.buttons.entry(button).or_default().release();
            }
            InputEvent::MouseMoved { dx, dy } => self.mouse_delta += Vec2::new(dx, dy),
            InputEvent::Scroll(lines) => self.scroll += lines,
            InputEvent::FocusLost => {
                self.clear();
                return false;
            }
        }
        true
    }

    #[must_use]
    pub fn is_key_pressed(&self, key: Key) -> bool {
        self.keys.get(&key).is_some_and(|s| s.is_pressed())
    }

    #[must_use]
    pub fn is_key_just_pressed(&self, key: Key) -> bool {
        self.keys.get(&key).is_some_and(|s| s.is_just_pressed())
    }

    #[must_use]
    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.buttons.get(&button).is_some_and(|s| s.is_pressed())
    }

    /// Pointer motion since the last frame.
    #[must_use]
    pub const fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    /// Wheel lines since the last frame.
    #[must_use]
    pub const fn scroll_delta(&self) -> f32 {
        self.scroll
    }

    /// Call at the end of every frame.
    pub fn end_frame(&mut self) {
        for state in self.keys.values_mut().chain(self.buttons.values_mut()) {
            state.end_frame();
        }
        self.mouse_delta = Vec2::ZERO;
        self.scroll = 0.0;
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.buttons.clear();
        self.mouse_delta = Vec2::ZERO;
        self.scroll = 0.0;
    }
}
