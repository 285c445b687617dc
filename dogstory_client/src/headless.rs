//! Headless scene.
//!
//! Keeps a registry of live objects in place of a renderer so the binary can
//! run in a terminal and tests can inspect what the engine drew.

use std::collections::BTreeMap;

use dogstory_shared::{
    math::{Vec2, Vec3},
    net::{LootKind, PlayerId},
    render::{ObjectHandle, PlayerTransform, SceneAdapter},
};
use rand::Rng;
use tracing::{debug, trace, warn};

/// A live object in the headless scene.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneObject {
    Player {
        id: PlayerId,
        label: String,
        /// Packed `0xRRGGBB` body tint.
        tint: u32,
        transform: Option<PlayerTransform>,
    },
    Loot {
        kind: LootKind,
        position: Vec3,
    },
}

#[derive(Debug, Default)]
pub struct HeadlessScene {
    next_handle: u64,
    objects: BTreeMap<ObjectHandle, SceneObject>,
    scores: BTreeMap<PlayerId, u64>,
    camera: Option<Vec2>,
    released: u64,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, object: SceneObject) -> ObjectHandle {
        self.next_handle += 1;
        let handle = ObjectHandle(self.next_handle);
        self.objects.insert(handle, object);
        handle
    }

    pub fn object(&self, handle: ObjectHandle) -> Option<&SceneObject> {
        self.objects.get(&handle)
    }

    pub fn live_objects(&self) -> usize {
        self.objects.len()
    }

    pub fn live_loot(&self) -> usize {
        self.objects
            .values()
            .filter(|o| matches!(o, SceneObject::Loot { .. }))
            .count()
    }

    /// Number of objects released so far.
    pub fn released(&self) -> u64 {
        self.released
    }

    pub fn score(&self, id: PlayerId) -> Option<u64> {
        self.scores.get(&id).copied()
    }

    pub fn camera(&self) -> Option<Vec2> {
        self.camera
    }
}

impl SceneAdapter for HeadlessScene {
    fn spawn_player(&mut self, id: PlayerId, name: &str) -> ObjectHandle {
        let tint = rand::thread_rng().gen_range(0..=0xFF_FF_FF);
        let handle = self.insert(SceneObject::Player {
            id,
            label: name.to_string(),
            tint,
            transform: None,
        });
        debug!(player = ?id, ?handle, name, tint = %format!("#{tint:06x}"), "Spawned player object");
        handle
    }

    fn set_player_label(&mut self, handle: ObjectHandle, name: &str) {
        if let Some(SceneObject::Player { label, .. }) = self.objects.get_mut(&handle) {
            *label = name.to_string();
        }
    }

    fn place_player(&mut self, handle: ObjectHandle, placed: PlayerTransform) {
        match self.objects.get_mut(&handle) {
            Some(SceneObject::Player { transform, .. }) => *transform = Some(placed),
            _ => warn!(?handle, "Placing a player object that is not live"),
        }
    }

    fn spawn_loot(&mut self, kind: LootKind, position: Vec3) -> ObjectHandle {
        let handle = self.insert(SceneObject::Loot { kind, position });
        trace!(?handle, kind, "Spawned loot object");
        handle
    }

    fn place_loot(&mut self, handle: ObjectHandle, placed: Vec3) {
        match self.objects.get_mut(&handle) {
            Some(SceneObject::Loot { position, .. }) => *position = placed,
            _ => warn!(?handle, "Placing a loot object that is not live"),
        }
    }

    fn release(&mut self, handle: ObjectHandle) {
        if self.objects.remove(&handle).is_some() {
            self.released += 1;
        } else {
            warn!(?handle, "Released an unknown object");
        }
    }

    fn set_score(&mut self, id: PlayerId, score: u64) {
        self.scores.insert(id, score);
    }

    fn focus_camera(&mut self, target: Vec2) {
        self.camera = Some(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_live_objects() {
        let mut scene = HeadlessScene::new();
        let dog = scene.spawn_player(PlayerId(3), "rex");
        let bone = scene.spawn_loot(1, Vec3::ZERO);
        assert_eq!(scene.live_objects(), 2);
        assert_eq!(scene.live_loot(), 1);

        scene.place_loot(bone, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(
            scene.object(bone),
            Some(&SceneObject::Loot {
                kind: 1,
                position: Vec3::new(1.0, 2.0, 3.0)
            })
        );

        scene.set_player_label(dog, "max");
        match scene.object(dog) {
            Some(SceneObject::Player { label, tint, .. }) => {
                assert_eq!(label, "max");
                assert!(*tint <= 0xFF_FF_FF);
            }
            other => panic!("unexpected object {other:?}"),
        }

        scene.release(bone);
        assert_eq!(scene.live_loot(), 0);
        assert_eq!(scene.released(), 1);
    }
}
