use std::collections::HashMap;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityId, EntityKind};
use super::Map;
use crate::geometry::Direction4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionMode {
    Overlapping,
    Containing,
    Origin,
    Facing,
    Touching,
    Center,
    Sprite,
    Custom,
}

impl CollisionMode {
    pub const ALL: [CollisionMode; 8] = [
        CollisionMode::Overlapping,
        CollisionMode::Containing,
        CollisionMode::Origin,
        CollisionMode::Facing,
        CollisionMode::Touching,
        CollisionMode::Center,
        CollisionMode::Sprite,
        CollisionMode::Custom,
    ];

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// Set of collision modes a detector reacts to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CollisionModes(u16);

impl CollisionModes {
    pub const NONE: CollisionModes = CollisionModes(0);

    pub fn contains(self, mode: CollisionMode) -> bool {
        self.0 & mode.bit() != 0
    }

    pub fn with(self, mode: CollisionMode) -> Self {
        Self(self.0 | mode.bit())
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = CollisionMode> {
        CollisionMode::ALL
            .into_iter()
            .filter(move |mode| self.contains(*mode))
    }
}

impl From<CollisionMode> for CollisionModes {
    fn from(mode: CollisionMode) -> Self {
        CollisionModes::NONE.with(mode)
    }
}

impl BitOr for CollisionMode {
    type Output = CollisionModes;

    fn bitor(self, rhs: CollisionMode) -> CollisionModes {
        CollisionModes::from(self).with(rhs)
    }
}

impl BitOr<CollisionMode> for CollisionModes {
    type Output = CollisionModes;

    fn bitor(self, rhs: CollisionMode) -> CollisionModes {
        self.with(rhs)
    }
}

impl FromIterator<CollisionMode> for CollisionModes {
    fn from_iter<I: IntoIterator<Item = CollisionMode>>(iter: I) -> Self {
        iter.into_iter().fold(CollisionModes::NONE, CollisionModes::with)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionKind {
    Mode(CollisionMode),
    /// Pixel-exact hit; indices point into each entity's sprite list.
    Sprite {
        detector_sprite: usize,
        candidate_sprite: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionEvent {
    pub detector: EntityId,
    pub detector_kind: EntityKind,
    pub candidate: EntityId,
    pub candidate_kind: EntityKind,
    pub kind: CollisionKind,
}

pub type CollisionHandler = fn(&mut Map, &CollisionEvent);

/// Routes collision events to handlers keyed by (detector kind, candidate kind).
#[derive(Debug, Clone, Default)]
pub struct CollisionDispatch {
    handlers: HashMap<(EntityKind, EntityKind), CollisionHandler>,
}

impl CollisionDispatch {
    pub fn register(
        &mut self,
        detector: EntityKind,
        candidate: EntityKind,
        handler: CollisionHandler,
    ) -> Option<CollisionHandler> {
        self.handlers.insert((detector, candidate), handler)
    }

    pub fn unregister(&mut self, detector: EntityKind, candidate: EntityKind) {
        self.handlers.remove(&(detector, candidate));
    }

    pub fn handler(&self, detector: EntityKind, candidate: EntityKind) -> Option<CollisionHandler> {
        self.handlers.get(&(detector, candidate)).copied()
    }
}

pub(crate) fn layers_compatible(a: &Entity, b: &Entity) -> bool {
    a.layer() == b.layer()
        || a.has_layer_independent_collisions()
        || b.has_layer_independent_collisions()
}

fn can_interact(detector: &Entity, candidate: &Entity) -> bool {
    detector.id() != candidate.id()
        && detector.is_active()
        && candidate.is_active()
        && layers_compatible(detector, candidate)
}

/// Bounding-box based modes of `detector` that `candidate` currently satisfies.
pub(crate) fn matching_modes(detector: &Entity, candidate: &Entity) -> Vec<CollisionMode> {
    let modes = detector.capabilities().collision_modes;
    if modes.is_empty() || !can_interact(detector, candidate) {
        return Vec::new();
    }
    let area = detector.bounding_box();
    let candidate_box = candidate.bounding_box();
    modes
        .iter()
        .filter(|mode| match mode {
            CollisionMode::Overlapping => area.overlaps(&candidate_box),
            CollisionMode::Containing => area.contains_rect(&candidate_box),
            CollisionMode::Origin => area.contains_point(candidate.xy()),
            CollisionMode::Center => area.contains_point(candidate_box.center()),
            CollisionMode::Facing => area.contains_point(candidate.facing_point()),
            CollisionMode::Touching => Direction4::ALL
                .into_iter()
                .any(|direction| area.contains_point(candidate.facing_point_towards(direction))),
            CollisionMode::Custom => detector
                .custom_collision()
                .is_some_and(|test| test(detector, candidate)),
            CollisionMode::Sprite => false,
        })
        .collect()
}

/// Pairs of (detector sprite, candidate sprite) whose pixels intersect.
pub(crate) fn matching_sprites(detector: &Entity, candidate: &Entity) -> Vec<(usize, usize)> {
    if !detector
        .capabilities()
        .collision_modes
        .contains(CollisionMode::Sprite)
        || !can_interact(detector, candidate)
    {
        return Vec::new();
    }
    let mut hits = Vec::new();
    for (candidate_index, candidate_sprite) in candidate.sprites().iter().enumerate() {
        if !candidate_sprite.are_pixel_collisions_enabled() {
            continue;
        }
        for (detector_index, detector_sprite) in detector.sprites().iter().enumerate() {
            if detector_sprite.test_collision(detector.xy(), candidate_sprite, candidate.xy()) {
                hits.push((detector_index, candidate_index));
            }
        }
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_combine_with_bitor() {
        let modes = CollisionMode::Facing | CollisionMode::Overlapping | CollisionMode::Sprite;
        assert!(modes.contains(CollisionMode::Facing));
        assert!(modes.contains(CollisionMode::Sprite));
        assert!(!modes.contains(CollisionMode::Origin));
        assert_eq!(
            modes.iter().collect::<Vec<_>>(),
            vec![
                CollisionMode::Overlapping,
                CollisionMode::Facing,
                CollisionMode::Sprite
            ]
        );
        assert!(CollisionModes::NONE.is_empty());
        let collected: CollisionModes = [CollisionMode::Center, CollisionMode::Custom]
            .into_iter()
            .collect();
        assert!(collected.contains(CollisionMode::Custom));
    }

    fn noop(_: &mut Map, _: &CollisionEvent) {}

    #[test]
    fn dispatch_table_is_keyed_by_kind_pair() {
        let mut dispatch = CollisionDispatch::default();
        assert!(dispatch
            .register(EntityKind::Chest, EntityKind::Hero, noop)
            .is_none());
        assert!(dispatch.handler(EntityKind::Chest, EntityKind::Hero).is_some());
        assert!(dispatch.handler(EntityKind::Hero, EntityKind::Chest).is_none());
        dispatch.unregister(EntityKind::Chest, EntityKind::Hero);
        assert!(dispatch.handler(EntityKind::Chest, EntityKind::Hero).is_none());
    }
}
