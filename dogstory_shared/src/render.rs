//! Rendering abstraction.
//!
//! This crate intentionally does not depend on a graphics backend.
//! The engine owns object lifecycle and motion; the adapter owns meshes,
//! materials and animation, and only ever sees handles and transforms.

use crate::{
    math::{Vec2, Vec3},
    net::{LootKind, PlayerId},
};

/// Opaque handle to an object created by the adapter.
///
/// A handle is the identity of a render object: loot that moves from the
/// world into a bag keeps its handle, so the adapter never re-creates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(pub u64);

/// Per-tick placement of a player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerTransform {
    /// Map-space position (tile origin; the adapter centres it).
    pub position: Vec2,
    /// Continuous yaw in radians.
    pub facing: f64,
    /// Whether the walk animation should play.
    pub moving: bool,
}

/// What the engine needs from a scene.
pub trait SceneAdapter {
    fn spawn_player(&mut self, id: PlayerId, name: &str) -> ObjectHandle;
    fn set_player_label(&mut self, handle: ObjectHandle, name: &str);
    fn place_player(&mut self, handle: ObjectHandle, transform: PlayerTransform);
    fn spawn_loot(&mut self, kind: LootKind, position: Vec3) -> ObjectHandle;
    fn place_loot(&mut self, handle: ObjectHandle, position: Vec3);
    /// Frees a player or loot object. The handle is never used again.
    fn release(&mut self, handle: ObjectHandle);
    fn set_score(&mut self, id: PlayerId, score: u64);
    fn focus_camera(&mut self, target: Vec2);
}

/// A scene that draws nothing, useful for headless tests.
#[derive(Default)]
pub struct NullScene {
    next_handle: u64,
}

impl NullScene {
    fn next(&mut self) -> ObjectHandle {
        self.next_handle += 1;
        ObjectHandle(self.next_handle)
    }
}

impl SceneAdapter for NullScene {
    fn spawn_player(&mut self, _id: PlayerId, _name: &str) -> ObjectHandle {
        self.next()
    }
    fn set_player_label(&mut self, _handle: ObjectHandle, _name: &str) {}
    fn place_player(&mut self, _handle: ObjectHandle, _transform: PlayerTransform) {}
    fn spawn_loot(&mut self, _kind: LootKind, _position: Vec3) -> ObjectHandle {
        self.next()
    }
    fn place_loot(&mut self, _handle: ObjectHandle, _position: Vec3) {}
    fn release(&mut self, _handle: ObjectHandle) {}
    fn set_score(&mut self, _id: PlayerId, _score: u64) {}
    fn focus_camera(&mut self, _target: Vec2) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_scene_hands_out_distinct_handles() {
        let mut scene = NullScene::default();
        let a = scene.spawn_loot(0, Vec3::ZERO);
        let b = scene.spawn_player(PlayerId(1), "rex");
        assert_ne!(a, b);
    }
}
