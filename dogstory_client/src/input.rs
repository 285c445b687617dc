//! Input handling.
//!
//! Keyboard capture lives outside the engine; this module only turns raw
//! press/release events into the single movement command the server accepts.
//! When several arrows are held, the most recently pressed one wins.

use dogstory_shared::net::MoveCommand;

/// Ordered set of currently held movement keys (press order).
#[derive(Debug, Clone, Default)]
pub struct KeyState {
    pressed: Vec<MoveCommand>,
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a press. Returns `false` for key-repeat duplicates and `Stop`.
    pub fn key_down(&mut self, key: MoveCommand) -> bool {
        if key == MoveCommand::Stop || self.pressed.contains(&key) {
            return false;
        }
        self.pressed.push(key);
        true
    }

    /// Records a release. Returns `false` if the key was not held.
    pub fn key_up(&mut self, key: MoveCommand) -> bool {
        match self.pressed.iter().position(|k| *k == key) {
            Some(index) => {
                self.pressed.remove(index);
                true
            }
            None => false,
        }
    }

    /// The effective movement command: last pressed key still held, or `Stop`.
    pub fn last_key(&self) -> MoveCommand {
        self.pressed.last().copied().unwrap_or(MoveCommand::Stop)
    }

    /// Held keys in press order, e.g. `"UL"`.
    pub fn key_mask(&self) -> String {
        self.pressed.iter().map(|k| k.symbol()).collect()
    }

    pub fn is_idle(&self) -> bool {
        self.pressed.is_empty()
    }
}
