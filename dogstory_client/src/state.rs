//! Snapshot reconciliation.
//!
//! `GameState` merges sparse authoritative snapshots into a locally advanced
//! view and keeps every scene object's lifecycle in step with it:
//! - players join and leave with the roster (or appear as placeholders when a
//!   snapshot names them first),
//! - loot lives in exactly one place at a time: lying in the world, carried in
//!   a bag, or fading out after a drop,
//! - between snapshots positions are dead-reckoned, facings turn at a bounded
//!   rate and carried loot trails behind its owner.
//!
//! Nothing here does IO. The caller feeds snapshots, rosters and clock time,
//! and the engine reports transforms through a [`SceneAdapter`].

use std::collections::{BTreeMap, BTreeSet};

use dogstory_shared::{
    config::Tuning,
    math::{Vec2, Vec3},
    net::{BagItem, Direction, LootId, LootKind, PlayerId, PlayerSnapshot, Roster, Snapshot},
    render::{ObjectHandle, PlayerTransform, SceneAdapter},
};
use tracing::{debug, info, warn};

use crate::interp::{correct_velocity, MovingObject, Rotation};

/// Offset from a tile's origin to its centre.
const TILE_CENTER: f64 = 0.5;

/// Engine readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// Waiting for the first snapshot and the first roster.
    Initializing,
    /// Both arrived; motion runs every tick.
    Running,
}

/// A loot render object and where it currently is in the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LootObject {
    pub handle: ObjectHandle,
    pub kind: LootKind,
    pub position: Vec3,
}

impl LootObject {
    fn spawn(kind: LootKind, position: Vec3, scene: &mut dyn SceneAdapter) -> Self {
        let handle = scene.spawn_loot(kind, position);
        Self {
            handle,
            kind,
            position,
        }
    }

    fn place(&mut self, position: Vec3, scene: &mut dyn SceneAdapter) {
        self.position = position;
        scene.place_loot(self.handle, position);
    }
}

/// Loot attached to a player, trailing toward its slot in the bag fan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarriedLoot {
    pub object: LootObject,
    pub mover: MovingObject,
}

/// Loot that just left a bag and rises away before release.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisappearingLoot {
    pub object: LootObject,
    pub started_at: f64,
    pub last_step: f64,
}

/// Where a loot id currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LootLocation {
    World,
    Carried(PlayerId),
    Disappearing,
}

/// Locally advanced state of one player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    /// Interpolated position.
    pub pos: Vec2,
    /// Velocity currently applied, units per second (may be corrective).
    pub speed: Vec2,
    /// Velocity from the last snapshot.
    pub reported_speed: Vec2,
    /// Clock time at which a corrective velocity gives way to `reported_speed`.
    /// The correction covers only this window, not the whole interval up to
    /// the next snapshot.
    pub correction_until: Option<f64>,
    pub dir: Direction,
    pub score: u64,
    pub rotation: Rotation,
    /// Bag order from the last snapshot.
    pub bag: Vec<BagItem>,
    pub carried: BTreeMap<LootId, CarriedLoot>,
}

impl PlayerState {
    fn spawn(snap: &PlayerSnapshot, now: f64) -> Self {
        Self {
            pos: snap.pos,
            speed: snap.speed,
            reported_speed: snap.speed,
            correction_until: None,
            dir: snap.dir,
            score: snap.score,
            rotation: Rotation::settled(snap.dir.facing(), now),
            bag: snap.bag.clone(),
            carried: BTreeMap::new(),
        }
    }

    /// Builds the next state from a snapshot, keeping rotation progress and
    /// attached loot.
    fn reconciled(self, snap: &PlayerSnapshot, now: f64, tuning: &Tuning) -> Self {
        let mut rotation = self.rotation;
        rotation.retarget(snap.dir.facing(), now);
        rotation.advance(now, tuning.rotation_speed);

        let (pos, speed, correction_until) =
            match correct_velocity(self.pos, snap.pos, snap.speed, tuning) {
                Some(corrective) => (
                    self.pos,
                    corrective,
                    Some(now + tuning.correction_window_secs * 1000.0),
                ),
                None => (snap.pos, snap.speed, None),
            };

        Self {
            pos,
            speed,
            reported_speed: snap.speed,
            correction_until,
            dir: snap.dir,
            score: snap.score,
            rotation,
            bag: snap.bag.clone(),
            carried: self.carried,
        }
    }

    /// Dead reckoning over `elapsed_ms` ending at `now`.
    fn extrapolate(&mut self, elapsed_ms: f64, now: f64) {
        let mut secs = elapsed_ms / 1000.0;
        if let Some(until) = self.correction_until {
            if now >= until {
                let corrective = (until - (now - elapsed_ms)).max(0.0) / 1000.0;
                self.pos += self.speed * corrective;
                secs -= corrective;
                self.speed = self.reported_speed;
                self.correction_until = None;
            }
        }
        self.pos += self.speed * secs;
    }

    /// Moves carried loot toward its slots: item `i` sits `i` spacings behind
    /// the player, opposite to the facing.
    fn trail_loot(&mut self, elapsed_ms: f64, now: f64, tuning: &Tuning, scene: &mut dyn SceneAdapter) {
        let facing = self.rotation.converted;
        let step_x = -facing.sin() * tuning.carry_spacing;
        let step_z = -facing.cos() * tuning.carry_spacing;
        let height = tuning.carry_height + tuning.bob(now);

        for (i, item) in self.bag.iter().enumerate() {
            let Some(carried) = self.carried.get_mut(&item.id) else {
                continue;
            };
            let i = i as f64;
            carried.mover.set_target(Vec3::new(
                self.pos.x + TILE_CENTER + step_x * i,
                height,
                self.pos.y + TILE_CENTER + step_z * i,
            ));
            carried.mover.advance(elapsed_ms);
            carried.object.place(carried.mover.pos, scene);
        }
    }

    pub fn is_moving(&self) -> bool {
        !self.reported_speed.is_zero()
    }

    pub fn transform(&self) -> PlayerTransform {
        PlayerTransform {
            position: self.pos,
            facing: self.rotation.converted,
            moving: self.is_moving(),
        }
    }
}

/// The locally advanced view of every tracked player.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrentState {
    /// Timestamp of the snapshot last reconciled.
    pub update_time: f64,
    pub players: BTreeMap<PlayerId, PlayerState>,
}

/// A connected player's scene object.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterSlot {
    pub handle: ObjectHandle,
    pub name: String,
    /// Created from a snapshot before the roster listed the player.
    pub placeholder: bool,
    pub joined_at: f64,
}

/// Client-side reconciliation engine.
pub struct GameState {
    tuning: Tuning,
    local_player: Option<PlayerId>,
    phase: EnginePhase,
    roster_loaded: bool,
    /// Snapshot received before the engine started.
    pending: Option<Snapshot>,
    latest: Option<Snapshot>,
    current: CurrentState,
    roster: BTreeMap<PlayerId, RosterSlot>,
    lost: BTreeMap<LootId, LootObject>,
    disappearing: BTreeMap<LootId, DisappearingLoot>,
    last_advance: f64,
}

impl GameState {
    pub fn new(tuning: Tuning, local_player: Option<PlayerId>) -> Self {
        Self {
            tuning,
            local_player,
            phase: EnginePhase::Initializing,
            roster_loaded: false,
            pending: None,
            latest: None,
            current: CurrentState::default(),
            roster: BTreeMap::new(),
            lost: BTreeMap::new(),
            disappearing: BTreeMap::new(),
            last_advance: 0.0,
        }
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn local_player(&self) -> Option<PlayerId> {
        self.local_player
    }

    pub fn is_running(&self) -> bool {
        self.phase == EnginePhase::Running
    }

    /// Whether the initial snapshot has arrived (applied or pending).
    pub fn has_snapshot(&self) -> bool {
        self.pending.is_some() || self.latest.is_some()
    }

    pub fn has_roster(&self) -> bool {
        self.roster_loaded
    }

    /// Feeds a freshly received snapshot.
    pub fn accept_snapshot(&mut self, snapshot: Snapshot, scene: &mut dyn SceneAdapter) {
        match self.phase {
            EnginePhase::Initializing => {
                let now = snapshot.update_time;
                self.pending = Some(snapshot);
                self.try_start(now, scene);
            }
            EnginePhase::Running => self.reconcile(snapshot, scene),
        }
    }

    /// Feeds a roster response. `requested_at` is the clock time the request
    /// was issued; entries created after it are not judged by this response.
    pub fn accept_roster(
        &mut self,
        roster: &Roster,
        requested_at: f64,
        now: f64,
        scene: &mut dyn SceneAdapter,
    ) {
        self.sync_roster(roster, requested_at, now, scene);
        if self.phase == EnginePhase::Initializing {
            self.roster_loaded = true;
            self.try_start(now, scene);
        }
    }

    fn try_start(&mut self, now: f64, scene: &mut dyn SceneAdapter) {
        if !self.roster_loaded {
            return;
        }
        let Some(snapshot) = self.pending.take() else {
            return;
        };

        self.phase = EnginePhase::Running;
        info!(
            players = snapshot.players.len(),
            loot = snapshot.loot.len(),
            "Engine running"
        );
        self.last_advance = snapshot.update_time;
        self.reconcile(snapshot, scene);
        self.advance(now, scene);
    }

    /// Merges a snapshot into the current view.
    fn reconcile(&mut self, snapshot: Snapshot, scene: &mut dyn SceneAdapter) {
        let now = snapshot.update_time;

        // Bring the local view up to the snapshot's time before comparing.
        let elapsed = (now - self.last_advance).max(0.0);
        for player in self.current.players.values_mut() {
            player.extrapolate(elapsed, now);
        }
        self.last_advance = now;

        let abandoned = self.sync_world_loot(&snapshot, now, scene);

        let mut previous = std::mem::take(&mut self.current.players);
        let mut players = BTreeMap::new();
        for (id, snap) in &snapshot.players {
            self.ensure_roster_slot(*id, now, scene);
            scene.set_score(*id, snap.score);

            let state = match previous.remove(id) {
                Some(prev) => prev.reconciled(snap, now, &self.tuning),
                None => {
                    debug!(player = ?id, "Tracking player");
                    PlayerState::spawn(snap, now)
                }
            };
            players.insert(*id, state);
        }

        let mut detached = BTreeMap::new();
        for (id, gone) in previous {
            debug!(player = ?id, carried = gone.carried.len(), "Player left the snapshot");
            detached.extend(gone.carried.into_iter().map(|(loot, c)| (loot, c.object)));
        }

        self.current = CurrentState {
            update_time: now,
            players,
        };
        self.latest = Some(snapshot);

        self.attach_loot(abandoned, detached, now, scene);
    }

    /// Updates world loot. Returns loot that left the world in this snapshot;
    /// it may have just been picked up.
    fn sync_world_loot(
        &mut self,
        snapshot: &Snapshot,
        now: f64,
        scene: &mut dyn SceneAdapter,
    ) -> BTreeMap<LootId, LootObject> {
        let height = self.tuning.rest_height() + self.tuning.bob(now);

        for loot in snapshot.loot.values() {
            let position = Vec3::new(loot.pos.x + TILE_CENTER, height, loot.pos.y + TILE_CENTER);
            if let Some(object) = self.lost.get_mut(&loot.id) {
                object.place(position, scene);
                continue;
            }
            let object = match self.disappearing.remove(&loot.id) {
                Some(fading) => {
                    debug!(loot = ?loot.id, "Dropped loot is back in the world");
                    let mut object = fading.object;
                    object.place(position, scene);
                    object
                }
                None => LootObject::spawn(loot.kind, position, scene),
            };
            self.lost.insert(loot.id, object);
        }

        let (kept, abandoned) = std::mem::take(&mut self.lost)
            .into_iter()
            .partition(|(id, _)| snapshot.loot.contains_key(id));
        self.lost = kept;
        abandoned
    }

    /// Matches bag contents against attached loot records.
    fn attach_loot(
        &mut self,
        mut abandoned: BTreeMap<LootId, LootObject>,
        mut detached: BTreeMap<LootId, LootObject>,
        now: f64,
        scene: &mut dyn SceneAdapter,
    ) {
        // First lister wins; world loot is never also carried.
        let mut owners: BTreeMap<LootId, PlayerId> = BTreeMap::new();
        for (player_id, player) in &self.current.players {
            for item in &player.bag {
                if self.lost.contains_key(&item.id) {
                    warn!(loot = ?item.id, player = ?player_id, "Loot listed both in the world and in a bag");
                    continue;
                }
                if let Some(owner) = owners.get(&item.id) {
                    warn!(loot = ?item.id, player = ?player_id, owner = ?owner, "Loot listed in two bags");
                    continue;
                }
                owners.insert(item.id, *player_id);
            }
        }

        for (player_id, player) in self.current.players.iter_mut() {
            let dropped: Vec<LootId> = player
                .carried
                .keys()
                .filter(|id| owners.get(*id) != Some(player_id))
                .copied()
                .collect();
            for id in dropped {
                let Some(carried) = player.carried.remove(&id) else {
                    continue;
                };
                if self.lost.contains_key(&id) {
                    scene.release(carried.object.handle);
                } else {
                    debug!(loot = ?id, player = ?player_id, "Loot left bag");
                    detached.insert(id, carried.object);
                }
            }
        }

        let rest_height = self.tuning.rest_height();
        for (player_id, player) in self.current.players.iter_mut() {
            let home = Vec3::new(
                player.pos.x + TILE_CENTER,
                rest_height,
                player.pos.y + TILE_CENTER,
            );
            for item in &player.bag {
                if owners.get(&item.id) != Some(player_id) || player.carried.contains_key(&item.id) {
                    continue;
                }
                let object = if let Some(object) = abandoned.remove(&item.id) {
                    debug!(loot = ?item.id, player = ?player_id, "Loot picked up");
                    object
                } else if let Some(object) = detached.remove(&item.id) {
                    object
                } else if let Some(fading) = self.disappearing.remove(&item.id) {
                    fading.object
                } else {
                    LootObject::spawn(item.kind, home, scene)
                };
                let mover = MovingObject::new(self.tuning.carry_rate, object.position);
                player.carried.insert(item.id, CarriedLoot { object, mover });
            }
        }

        for (id, object) in abandoned.into_iter().chain(detached) {
            self.drop_loot(id, object, now, scene);
        }
    }

    fn drop_loot(&mut self, id: LootId, object: LootObject, now: f64, scene: &mut dyn SceneAdapter) {
        let fading = DisappearingLoot {
            object,
            started_at: now,
            last_step: now,
        };
        if let Some(stale) = self.disappearing.insert(id, fading) {
            scene.release(stale.object.handle);
        }
    }

    fn ensure_roster_slot(&mut self, id: PlayerId, now: f64, scene: &mut dyn SceneAdapter) {
        if self.roster.contains_key(&id) {
            return;
        }
        let name = format!("#{}", id.0);
        debug!(player = ?id, "Snapshot names a player the roster has not listed yet");
        let handle = scene.spawn_player(id, &name);
        self.roster.insert(
            id,
            RosterSlot {
                handle,
                name,
                placeholder: true,
                joined_at: now,
            },
        );
    }

    fn sync_roster(
        &mut self,
        roster: &Roster,
        requested_at: f64,
        now: f64,
        scene: &mut dyn SceneAdapter,
    ) {
        for (id, entry) in roster {
            match self.roster.get_mut(id) {
                Some(slot) => {
                    if slot.placeholder || slot.name != entry.name {
                        slot.name = entry.name.clone();
                        slot.placeholder = false;
                        scene.set_player_label(slot.handle, &slot.name);
                    }
                }
                None => {
                    // Any state a snapshot already built for this id stays keyed
                    // by id in `current`, bag records included.
                    info!(player = ?id, name = %entry.name, "Player joined");
                    let handle = scene.spawn_player(*id, &entry.name);
                    self.roster.insert(
                        *id,
                        RosterSlot {
                            handle,
                            name: entry.name.clone(),
                            placeholder: false,
                            joined_at: now,
                        },
                    );
                }
            }
        }

        let leaving: Vec<PlayerId> = self
            .roster
            .iter()
            .filter(|(id, slot)| !roster.contains_key(*id) && slot.joined_at <= requested_at)
            .map(|(id, _)| *id)
            .collect();
        for id in leaving {
            self.remove_player(id, scene);
        }
    }

    fn remove_player(&mut self, id: PlayerId, scene: &mut dyn SceneAdapter) {
        if let Some(slot) = self.roster.remove(&id) {
            info!(player = ?id, name = %slot.name, "Player left");
            scene.release(slot.handle);
        }
        if let Some(state) = self.current.players.remove(&id) {
            for carried in state.carried.into_values() {
                scene.release(carried.object.handle);
            }
        }
    }

    /// Advances every interpolation to clock time `now` and emits transforms.
    pub fn advance(&mut self, now: f64, scene: &mut dyn SceneAdapter) {
        if !self.is_running() {
            return;
        }
        let elapsed = (now - self.last_advance).max(0.0);
        self.last_advance = now;

        for player in self.current.players.values_mut() {
            player.extrapolate(elapsed, now);
            player.rotation.advance(now, self.tuning.rotation_speed);
            player.trail_loot(elapsed, now, &self.tuning, scene);
        }

        let height = self.tuning.rest_height() + self.tuning.bob(now);
        for object in self.lost.values_mut() {
            let position = Vec3::new(object.position.x, height, object.position.z);
            object.place(position, scene);
        }

        self.decay(now, scene);
        self.emit(scene);
    }

    fn decay(&mut self, now: f64, scene: &mut dyn SceneAdapter) {
        let duration = self.tuning.decay_duration_ms;
        let divisor = self.tuning.decay_rise_divisor;
        self.disappearing.retain(|id, fading| {
            let total = now - fading.started_at;
            if total >= duration {
                debug!(loot = ?id, "Dropped loot released");
                scene.release(fading.object.handle);
                return false;
            }
            let prev = fading.last_step - fading.started_at;
            let mut position = fading.object.position;
            position.y += (total * total - prev * prev) / divisor;
            fading.object.place(position, scene);
            fading.last_step = now;
            true
        });
    }

    fn emit(&self, scene: &mut dyn SceneAdapter) {
        for (id, player) in &self.current.players {
            if let Some(slot) = self.roster.get(id) {
                scene.place_player(slot.handle, player.transform());
            }
            if self.local_player == Some(*id) {
                scene.focus_camera(player.pos);
            }
        }
    }

    pub fn current(&self) -> &CurrentState {
        &self.current
    }

    pub fn latest_snapshot(&self) -> Option<&Snapshot> {
        self.latest.as_ref()
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.current.players.get(&id)
    }

    pub fn roster_slot(&self, id: PlayerId) -> Option<&RosterSlot> {
        self.roster.get(&id)
    }

    pub fn roster_len(&self) -> usize {
        self.roster.len()
    }

    pub fn world_loot(&self, id: LootId) -> Option<&LootObject> {
        self.lost.get(&id)
    }

    pub fn disappearing_loot(&self, id: LootId) -> Option<&DisappearingLoot> {
        self.disappearing.get(&id)
    }

    pub fn carried_loot(&self, player: PlayerId, id: LootId) -> Option<&CarriedLoot> {
        self.current.players.get(&player)?.carried.get(&id)
    }

    /// Every place a loot id is currently recorded. Holds at most one entry
    /// after each reconciliation.
    pub fn loot_locations(&self, id: LootId) -> Vec<LootLocation> {
        let mut found = Vec::new();
        if self.lost.contains_key(&id) {
            found.push(LootLocation::World);
        }
        for (player_id, player) in &self.current.players {
            if player.carried.contains_key(&id) {
                found.push(LootLocation::Carried(*player_id));
            }
        }
        if self.disappearing.contains_key(&id) {
            found.push(LootLocation::Disappearing);
        }
        found
    }

    pub fn loot_location(&self, id: LootId) -> Option<LootLocation> {
        self.loot_locations(id).into_iter().next()
    }

    /// All loot ids the engine currently tracks.
    pub fn known_loot(&self) -> BTreeSet<LootId> {
        let mut ids: BTreeSet<LootId> = self.lost.keys().copied().collect();
        for player in self.current.players.values() {
            ids.extend(player.carried.keys().copied());
        }
        ids.extend(self.disappearing.keys().copied());
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dogstory_shared::{
        net::{LootSnapshot, RosterEntry},
        render::NullScene,
    };

    fn player(x: f64, y: f64, vx: f64, vy: f64, dir: Direction, bag: &[u64]) -> PlayerSnapshot {
        PlayerSnapshot {
            pos: Vec2::new(x, y),
            speed: Vec2::new(vx, vy),
            dir,
            score: 0,
            bag: bag
                .iter()
                .map(|id| BagItem {
                    id: LootId(*id),
                    kind: 0,
                })
                .collect(),
        }
    }

    fn snapshot(at: f64, players: Vec<(u64, PlayerSnapshot)>, loot: &[u64]) -> Snapshot {
        Snapshot {
            update_time: at,
            players: players
                .into_iter()
                .map(|(id, p)| (PlayerId(id), p))
                .collect(),
            loot: loot
                .iter()
                .map(|id| {
                    (
                        LootId(*id),
                        LootSnapshot {
                            id: LootId(*id),
                            kind: 1,
                            pos: Vec2::new(*id as f64, 0.0),
                        },
                    )
                })
                .collect(),
        }
    }

    fn roster(ids: &[u64]) -> Roster {
        ids.iter()
            .map(|id| {
                (
                    PlayerId(*id),
                    RosterEntry {
                        name: format!("dog{id}"),
                    },
                )
            })
            .collect()
    }

    fn running(first: Snapshot, scene: &mut NullScene) -> GameState {
        let mut state = GameState::new(Tuning::default(), Some(PlayerId(1)));
        state.accept_roster(&roster(&[1]), 0.0, 0.0, scene);
        state.accept_snapshot(first, scene);
        state
    }

    #[test]
    fn starts_only_after_snapshot_and_roster() {
        let mut scene = NullScene::default();
        let mut state = GameState::new(Tuning::default(), None);

        state.accept_snapshot(
            snapshot(10.0, vec![(1, player(0.0, 0.0, 0.0, 0.0, Direction::Up, &[]))], &[]),
            &mut scene,
        );
        assert_eq!(state.phase(), EnginePhase::Initializing);
        assert!(state.player(PlayerId(1)).is_none());

        state.accept_roster(&roster(&[1]), 5.0, 20.0, &mut scene);
        assert_eq!(state.phase(), EnginePhase::Running);
        assert!(state.player(PlayerId(1)).is_some());
    }

    #[test]
    fn dead_reckoning_between_snapshots() {
        let mut scene = NullScene::default();
        let mut state = running(
            snapshot(0.0, vec![(1, player(1.0, 1.0, 2.0, 0.0, Direction::Right, &[]))], &[]),
            &mut scene,
        );
        state.advance(100.0, &mut scene);
        state.advance(250.0, &mut scene);
        let p = state.player(PlayerId(1)).unwrap();
        assert!((p.pos.x - 1.5).abs() < 1e-9);
        assert_eq!(p.pos.y, 1.0);
    }

    #[test]
    fn correction_hands_back_to_reported_speed() {
        let mut scene = NullScene::default();
        let mut state = running(
            snapshot(0.0, vec![(1, player(0.0, 0.0, 1.0, 0.0, Direction::Right, &[]))], &[]),
            &mut scene,
        );
        // Server says we are 1 unit further than we extrapolated.
        state.accept_snapshot(
            snapshot(0.0, vec![(1, player(1.0, 0.0, 1.0, 0.0, Direction::Right, &[]))], &[]),
            &mut scene,
        );
        let p = state.player(PlayerId(1)).unwrap();
        assert_eq!(p.pos, Vec2::ZERO);
        assert!(p.correction_until.is_some());

        // After the window the local player sits on the authoritative track.
        state.advance(100.0, &mut scene);
        state.advance(300.0, &mut scene);
        let p = state.player(PlayerId(1)).unwrap();
        assert!((p.pos.x - 1.3).abs() < 1e-9);
        assert_eq!(p.speed, Vec2::new(1.0, 0.0));
        assert!(p.correction_until.is_none());
    }

    #[test]
    fn correction_window_splits_the_crossing_frame() {
        let mut scene = NullScene::default();
        let mut state = running(
            snapshot(0.0, vec![(1, player(0.0, 0.0, 1.0, 0.0, Direction::Right, &[]))], &[]),
            &mut scene,
        );
        state.accept_snapshot(
            snapshot(0.0, vec![(1, player(1.0, 0.0, 1.0, 0.0, Direction::Right, &[]))], &[]),
            &mut scene,
        );

        // One long frame: 100 ms corrective, then 100 ms at the reported speed.
        state.advance(200.0, &mut scene);
        let p = state.player(PlayerId(1)).unwrap();
        assert!((p.pos.x - 1.2).abs() < 1e-9);
        assert_eq!(p.speed, Vec2::new(1.0, 0.0));
        assert!(p.correction_until.is_none());
    }

    #[test]
    fn disappearing_players_drop_their_loot() {
        let mut scene = NullScene::default();
        let mut state = running(
            snapshot(0.0, vec![(1, player(0.0, 0.0, 0.0, 0.0, Direction::Down, &[4]))], &[]),
            &mut scene,
        );
        assert_eq!(state.loot_location(LootId(4)), Some(LootLocation::Carried(PlayerId(1))));

        state.accept_snapshot(snapshot(50.0, vec![], &[]), &mut scene);
        assert_eq!(state.loot_location(LootId(4)), Some(LootLocation::Disappearing));
    }

    #[test]
    fn roster_removal_releases_player_and_bag() {
        let mut scene = NullScene::default();
        let mut state = running(
            snapshot(0.0, vec![(1, player(0.0, 0.0, 0.0, 0.0, Direction::Down, &[4]))], &[]),
            &mut scene,
        );
        state.accept_roster(&roster(&[]), 10.0, 20.0, &mut scene);
        assert!(state.roster_slot(PlayerId(1)).is_none());
        assert!(state.player(PlayerId(1)).is_none());
        assert!(state.known_loot().is_empty());
    }

    #[test]
    fn placeholder_survives_older_roster_response() {
        let mut scene = NullScene::default();
        let mut state = running(
            snapshot(0.0, vec![(1, player(0.0, 0.0, 0.0, 0.0, Direction::Down, &[]))], &[]),
            &mut scene,
        );
        state.accept_snapshot(
            snapshot(
                100.0,
                vec![
                    (1, player(0.0, 0.0, 0.0, 0.0, Direction::Down, &[])),
                    (2, player(3.0, 0.0, 0.0, 0.0, Direction::Down, &[])),
                ],
                &[],
            ),
            &mut scene,
        );
        assert!(state.roster_slot(PlayerId(2)).unwrap().placeholder);

        // Roster requested before player 2 showed up: it must not evict them.
        state.accept_roster(&roster(&[1]), 50.0, 120.0, &mut scene);
        assert!(state.roster_slot(PlayerId(2)).is_some());

        state.accept_roster(&roster(&[1, 2]), 130.0, 150.0, &mut scene);
        let slot = state.roster_slot(PlayerId(2)).unwrap();
        assert!(!slot.placeholder);
        assert_eq!(slot.name, "dog2");
    }

    #[test]
    fn dropped_loot_can_return_to_the_world() {
        let mut scene = NullScene::default();
        let mut state = running(
            snapshot(0.0, vec![(1, player(0.0, 0.0, 0.0, 0.0, Direction::Down, &[4]))], &[]),
            &mut scene,
        );
        let handle = state.carried_loot(PlayerId(1), LootId(4)).unwrap().object.handle;
        state.accept_snapshot(
            snapshot(10.0, vec![(1, player(0.0, 0.0, 0.0, 0.0, Direction::Down, &[]))], &[]),
            &mut scene,
        );
        state.accept_snapshot(
            snapshot(20.0, vec![(1, player(0.0, 0.0, 0.0, 0.0, Direction::Down, &[]))], &[4]),
            &mut scene,
        );
        assert_eq!(state.loot_locations(LootId(4)), vec![LootLocation::World]);
        assert_eq!(state.world_loot(LootId(4)).unwrap().handle, handle);
    }

    #[test]
    fn loot_in_two_bags_goes_to_first_player() {
        let mut scene = NullScene::default();
        let mut state = running(
            snapshot(
                0.0,
                vec![
                    (1, player(0.0, 0.0, 0.0, 0.0, Direction::Down, &[4])),
                    (2, player(1.0, 0.0, 0.0, 0.0, Direction::Down, &[4])),
                ],
                &[],
            ),
            &mut scene,
        );
        assert_eq!(
            state.loot_locations(LootId(4)),
            vec![LootLocation::Carried(PlayerId(1))]
        );
    }
}
