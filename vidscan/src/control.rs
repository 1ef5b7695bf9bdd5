//! Interactive control state machine

use serde::{Deserialize, Serialize};

pub const KEY_ESCAPE: i32 = 27;
pub const KEY_SPACE: i32 = 32;

/// Control loop state. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Paused,
    Stopped,
}

impl LoopState {
    pub fn on_event(self, event: ControlEvent) -> LoopState {
        match (self, event) {
            (LoopState::Stopped, _) => LoopState::Stopped,
            (_, ControlEvent::Quit) => LoopState::Stopped,
            (LoopState::Running, ControlEvent::TogglePause) => LoopState::Paused,
            (LoopState::Paused, ControlEvent::TogglePause) => LoopState::Running,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Quit,
    TogglePause,
}

/// Key codes mapped to control events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBindings {
    pub quit: i32,
    pub pause: i32,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            quit: KEY_ESCAPE,
            pause: KEY_SPACE,
        }
    }
}

impl KeyBindings {
    /// Quit wins when both bindings share a key.
    pub fn event_for(&self, key: i32) -> Option<ControlEvent> {
        if key == self.quit {
            Some(ControlEvent::Quit)
        } else if key == self.pause {
            Some(ControlEvent::TogglePause)
        } else {
            None
        }
    }
}

/// Per-run mutable state, reset for every new pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    /// Written by the control loop only
    pub paused: bool,
    /// Written by the annotator only
    pub objects_in_current_frame: usize,
}
