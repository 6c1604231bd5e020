mod detection;
mod entity;
mod index;
mod tile_clock;

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, trace};

use crate::geometry::{Direction4, Point, Rect};
use crate::ground::{Ground, GroundError, GroundGrid, Layer, CELL_SIZE};
use crate::movement::{Movement, MovementHost};
use crate::sprite::Sprite;

pub use detection::{
    CollisionDispatch, CollisionEvent, CollisionHandler, CollisionKind, CollisionMode,
    CollisionModes,
};
pub use entity::{
    Capabilities, CustomCollisionTest, Entity, EntityDesc, EntityError, EntityId,
    EntityIdAllocator, EntityKind, GroundSensitivity, KindSet, ObstacleRule,
};
pub use index::EntityIndex;
pub use tile_clock::{TileAnimationClock, TileAnimationSequence, TILE_FRAME_INTERVAL_MS};

/// A map: ground grid, entities and the collision plumbing between them.
#[derive(Debug)]
pub struct Map {
    width: i32,
    height: i32,
    ground: GroundGrid,
    allocator: EntityIdAllocator,
    entities: BTreeMap<EntityId, Entity>,
    index: EntityIndex,
    pending_removals: Vec<EntityId>,
    dispatch: CollisionDispatch,
    events: Vec<CollisionEvent>,
    tile_clock: TileAnimationClock,
    now: u64,
    suspended: bool,
}

impl Map {
    pub fn new(width: i32, height: i32) -> Result<Self, GroundError> {
        let ground = GroundGrid::new(width, height)?;
        info!(width, height, "map_created");
        Ok(Self {
            width,
            height,
            ground,
            allocator: EntityIdAllocator::default(),
            entities: BTreeMap::new(),
            index: EntityIndex::default(),
            pending_removals: Vec::new(),
            dispatch: CollisionDispatch::default(),
            events: Vec::new(),
            tile_clock: TileAnimationClock::default(),
            now: 0,
            suspended: false,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn ground_grid(&self) -> &GroundGrid {
        &self.ground
    }

    pub fn add_tile(&mut self, layer: Layer, rect: Rect, ground: Ground) -> Result<(), GroundError> {
        self.ground.add_tile(layer, rect, ground)
    }

    pub fn set_tile_ground(
        &mut self,
        layer: Layer,
        rect: Rect,
        ground: Ground,
    ) -> Result<(), GroundError> {
        self.ground.add_tile(layer, rect, ground)?;
        debug!(layer = ?layer, x = rect.x, y = rect.y, ground = ?ground, "tile_ground_changed");
        Ok(())
    }

    pub fn tile_ground(&self, layer: Layer, x: i32, y: i32) -> Ground {
        self.ground.tile_ground(layer, x, y)
    }

    /// Effective ground of one pixel: ground modifiers first, then the tile
    /// cell, falling through empty cells to the layer below.
    pub fn ground_at(&self, layer: Layer, x: i32, y: i32) -> Ground {
        let point = Point::new(x, y);
        let mut current = Some(layer);
        while let Some(layer) = current {
            if let Some(ground) = self.modifier_ground_at(layer, point) {
                return ground;
            }
            let ground = self
                .ground
                .tile_ground(layer, x, y)
                .resolve_in_cell(x.rem_euclid(CELL_SIZE), y.rem_euclid(CELL_SIZE));
            if ground != Ground::Empty {
                return ground;
            }
            current = layer.below();
        }
        Ground::Traversable
    }

    fn modifier_ground_at(&self, layer: Layer, point: Point) -> Option<Ground> {
        self.index
            .ground_modifiers(layer)
            .iter()
            .rev()
            .filter_map(|id| self.entities.get(id))
            .filter(|entity| entity.is_active() && entity.bounding_box().contains_point(point))
            .find_map(|entity| {
                entity
                    .capabilities()
                    .ground_modifier
                    .filter(|ground| *ground != Ground::Empty)
            })
    }

    /// Cell ground with empty upper cells resolved to the layer below.
    fn stacked_cell(&self, layer: Layer, cell_x: i32, cell_y: i32) -> Ground {
        let mut current = Some(layer);
        while let Some(layer) = current {
            match self.ground.cell(layer, cell_x, cell_y) {
                Some(Ground::Empty) => current = layer.below(),
                Some(ground) => return ground,
                None => return Ground::Wall,
            }
        }
        Ground::Traversable
    }

    pub fn tile_animation_frame(&self, sequence: TileAnimationSequence) -> u8 {
        self.tile_clock.frame(sequence)
    }

    pub fn add_entity(&mut self, desc: EntityDesc) -> Result<EntityId, EntityError> {
        let id = self.allocator.allocate();
        let mut entity = desc.build(id)?;
        if self.suspended {
            for sprite in &mut entity.sprites {
                sprite.set_suspended(true, self.now);
            }
        }
        self.index.insert(&entity);
        debug!(entity = id.0, kind = ?entity.kind(), layer = ?entity.layer(), "entity_added");
        self.entities.insert(id, entity);
        Ok(id)
    }

    /// Marks the entity for removal. It stops colliding immediately and is
    /// dropped at the end of the next update.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        if entity.is_being_removed() {
            return false;
        }
        entity.mark_removed();
        self.pending_removals.push(id);
        debug!(entity = id.0, "entity_removed");
        true
    }

    fn purge_removed(&mut self) {
        if self.pending_removals.is_empty() {
            return;
        }
        self.pending_removals.sort();
        self.pending_removals.dedup();
        for id in std::mem::take(&mut self.pending_removals) {
            self.index.remove(id);
            self.entities.remove(&id);
        }
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity, EntityError> {
        self.entities.get_mut(&id).ok_or(EntityError::Unknown(id))
    }

    pub fn displayed_xy(&self, id: EntityId) -> Option<Point> {
        self.entities.get(&id).map(Entity::displayed_xy)
    }

    pub fn set_entity_position(&mut self, id: EntityId, xy: Point) -> Result<(), EntityError> {
        self.entity_mut(id)?.set_xy(xy);
        self.check_collisions(id);
        Ok(())
    }

    pub fn set_entity_direction(
        &mut self,
        id: EntityId,
        direction: Direction4,
    ) -> Result<(), EntityError> {
        self.entity_mut(id)?.set_direction(direction);
        self.check_collisions(id);
        Ok(())
    }

    pub fn set_entity_layer(&mut self, id: EntityId, layer: Layer) -> Result<(), EntityError> {
        let entity = self.entities.get_mut(&id).ok_or(EntityError::Unknown(id))?;
        if entity.layer() == layer {
            return Ok(());
        }
        entity.set_layer(layer);
        self.index.remove(id);
        self.index.insert(entity);
        self.check_collisions(id);
        Ok(())
    }

    pub fn set_entity_enabled(&mut self, id: EntityId, enabled: bool) -> Result<(), EntityError> {
        self.entity_mut(id)?.set_enabled(enabled);
        if enabled {
            self.check_collisions(id);
        }
        Ok(())
    }

    pub fn add_sprite(&mut self, id: EntityId, mut sprite: Sprite) -> Result<usize, EntityError> {
        let suspended = self.suspended;
        let now = self.now;
        let entity = self.entity_mut(id)?;
        if suspended {
            sprite.set_suspended(true, now);
        }
        entity.sprites.push(sprite);
        Ok(entity.sprites.len() - 1)
    }

    pub fn sprite_mut(&mut self, id: EntityId, index: usize) -> Option<&mut Sprite> {
        self.entities.get_mut(&id)?.sprites.get_mut(index)
    }

    /// Attaches a movement, replacing and returning the previous one.
    pub fn set_movement(
        &mut self,
        id: EntityId,
        mut movement: Box<dyn Movement>,
    ) -> Result<Option<Box<dyn Movement>>, EntityError> {
        let suspended = self.suspended;
        let now = self.now;
        let entity = self.entity_mut(id)?;
        if suspended {
            movement.set_suspended(true, now);
        }
        Ok(entity.movement.replace(movement))
    }

    pub fn clear_movement(&mut self, id: EntityId) -> Option<Box<dyn Movement>> {
        self.entities.get_mut(&id)?.movement.take()
    }

    pub fn movement(&self, id: EntityId) -> Option<&dyn Movement> {
        self.entities.get(&id)?.movement()
    }

    pub fn movement_mut<M: Movement + Any>(&mut self, id: EntityId) -> Option<&mut M> {
        self.entities
            .get_mut(&id)?
            .movement
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<M>()
    }

    pub fn collision_dispatch_mut(&mut self) -> &mut CollisionDispatch {
        &mut self.dispatch
    }

    pub fn collision_events(&self) -> &[CollisionEvent] {
        &self.events
    }

    pub fn drain_collision_events(&mut self) -> Vec<CollisionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn set_suspended(&mut self, suspended: bool, now: u64) {
        if suspended == self.suspended {
            return;
        }
        self.suspended = suspended;
        self.tile_clock.set_suspended(suspended, now);
        for entity in self.entities.values_mut() {
            for sprite in &mut entity.sprites {
                sprite.set_suspended(suspended, now);
            }
            if let Some(movement) = entity.movement.as_mut() {
                movement.set_suspended(suspended, now);
            }
        }
        debug!(suspended, now, "map_suspension_changed");
    }

    /// Advances the map to `now`: tile clock, then every entity in id order,
    /// then removal of entities marked during the tick.
    pub fn update(&mut self, now: u64) {
        self.now = now;
        if !self.suspended {
            self.tile_clock.update(now);
            let ids: Vec<EntityId> = self.entities.keys().copied().collect();
            for id in ids {
                self.update_entity(id);
            }
        }
        self.purge_removed();
    }

    fn update_entity(&mut self, id: EntityId) {
        let now = self.now;
        let Some(entity) = self.entities.get_mut(&id) else {
            return;
        };
        if !entity.is_active() {
            return;
        }
        let mut frame_changed = false;
        for sprite in &mut entity.sprites {
            if sprite.update(now) && sprite.are_pixel_collisions_enabled() {
                frame_changed = true;
            }
        }
        let movement = entity.movement.take();
        if frame_changed {
            self.check_sprite_collisions(id);
        }

        let Some(mut movement) = movement else {
            return;
        };
        movement.update(&mut EntityMovementHost { map: self, entity: id });
        if let Some(entity) = self.entities.get_mut(&id) {
            // A collision handler may have attached a new movement meanwhile.
            if entity.movement.is_none() {
                entity.movement = Some(movement);
            }
        }
    }

    /// Whether `rect` would put entity `id` on a blocking ground, inside an
    /// obstacle entity or outside the map.
    pub fn test_collision_with_obstacles(&self, id: EntityId, rect: Rect) -> bool {
        let Some(entity) = self.entities.get(&id) else {
            return false;
        };
        if !self.bounds().contains_rect(&rect) {
            return true;
        }
        self.test_collision_with_ground(entity, rect)
            || self
                .index
                .obstacles(entity.layer())
                .iter()
                .filter_map(|other| self.entities.get(other))
                .any(|other| other.is_obstacle_for(entity) && other.bounding_box().overlaps(&rect))
    }

    fn test_collision_with_ground(&self, entity: &Entity, rect: Rect) -> bool {
        let layer = entity.layer();
        let sensitivity = entity.ground_sensitivity();
        let modified = Layer::ALL[..=layer.index()].iter().any(|layer| {
            self.index
                .ground_modifiers(*layer)
                .iter()
                .filter_map(|id| self.entities.get(id))
                .any(|modifier| modifier.is_active() && modifier.bounding_box().overlaps(&rect))
        });

        let first_x = rect.x.div_euclid(CELL_SIZE);
        let last_x = (rect.right() - 1).div_euclid(CELL_SIZE);
        let first_y = rect.y.div_euclid(CELL_SIZE);
        let last_y = (rect.bottom() - 1).div_euclid(CELL_SIZE);
        for cell_y in first_y..=last_y {
            for cell_x in first_x..=last_x {
                let cell = Rect::new(cell_x * CELL_SIZE, cell_y * CELL_SIZE, CELL_SIZE, CELL_SIZE);
                let Some(overlap) = rect.intersection(&cell) else {
                    continue;
                };
                let ground = self.stacked_cell(layer, cell_x, cell_y);
                if modified || ground.is_diagonal() {
                    for y in overlap.y..overlap.bottom() {
                        for x in overlap.x..overlap.right() {
                            if sensitivity.blocks(self.ground_at(layer, x, y)) {
                                return true;
                            }
                        }
                    }
                } else if sensitivity.blocks(ground) {
                    return true;
                }
            }
        }
        false
    }

    fn detectors_for(&self, candidate: &Entity) -> Vec<EntityId> {
        if candidate.has_layer_independent_collisions() {
            let all: BTreeSet<EntityId> = Layer::ALL
                .iter()
                .flat_map(|layer| self.index.detectors(*layer).iter().copied())
                .collect();
            all.into_iter().collect()
        } else {
            self.index.detectors(candidate.layer()).to_vec()
        }
    }

    /// Resets the entity's facing entity and checks it against detectors, and
    /// against every other entity when it is a detector itself.
    pub fn check_collisions(&mut self, id: EntityId) {
        match self.entities.get_mut(&id) {
            Some(entity) if entity.is_active() => entity.facing_entity = None,
            _ => return,
        }
        self.run_collision_checks(id, true);
    }

    pub fn check_sprite_collisions(&mut self, id: EntityId) {
        if !self.entities.get(&id).is_some_and(Entity::is_active) {
            return;
        }
        self.run_collision_checks(id, false);
    }

    fn run_collision_checks(&mut self, id: EntityId, boxes: bool) {
        let Some(entity) = self.entities.get(&id) else {
            return;
        };
        let mut events = Vec::new();
        let mut facing = Vec::new();
        for detector_id in self.detectors_for(entity) {
            if let Some(detector) = self.entities.get(&detector_id) {
                collect_collisions(detector, entity, boxes, &mut events, &mut facing);
            }
        }
        if entity.capabilities().is_detector() {
            for candidate in self.entities.values() {
                collect_collisions(entity, candidate, boxes, &mut events, &mut facing);
            }
        }

        for (candidate, detector) in facing {
            if let Some(candidate) = self.entities.get_mut(&candidate) {
                if candidate.facing_entity.is_none() {
                    candidate.facing_entity = Some(detector);
                }
            }
        }
        self.notify(events);
    }

    fn notify(&mut self, events: Vec<CollisionEvent>) {
        if events.is_empty() {
            return;
        }
        self.events.extend(events.iter().copied());
        for event in events {
            let still_active = [event.detector, event.candidate]
                .iter()
                .all(|id| self.entities.get(id).is_some_and(Entity::is_active));
            if !still_active {
                continue;
            }
            trace!(
                detector = event.detector.0,
                candidate = event.candidate.0,
                kind = ?event.kind,
                "collision"
            );
            if let Some(handler) = self.dispatch.handler(event.detector_kind, event.candidate_kind) {
                handler(self, &event);
            }
        }
    }
}

fn collect_collisions(
    detector: &Entity,
    candidate: &Entity,
    boxes: bool,
    events: &mut Vec<CollisionEvent>,
    facing: &mut Vec<(EntityId, EntityId)>,
) {
    let event = |kind| CollisionEvent {
        detector: detector.id(),
        detector_kind: detector.kind(),
        candidate: candidate.id(),
        candidate_kind: candidate.kind(),
        kind,
    };
    if boxes {
        for mode in detection::matching_modes(detector, candidate) {
            if mode == CollisionMode::Facing {
                facing.push((candidate.id(), detector.id()));
            }
            events.push(event(CollisionKind::Mode(mode)));
        }
    }
    for (detector_sprite, candidate_sprite) in detection::matching_sprites(detector, candidate) {
        events.push(event(CollisionKind::Sprite {
            detector_sprite,
            candidate_sprite,
        }));
    }
}

struct EntityMovementHost<'a> {
    map: &'a mut Map,
    entity: EntityId,
}

impl MovementHost for EntityMovementHost<'_> {
    fn now(&self) -> u64 {
        self.map.now
    }

    fn xy(&self) -> Point {
        self.map
            .entities
            .get(&self.entity)
            .map_or(Point::ZERO, Entity::xy)
    }

    fn top_left(&self) -> Point {
        self.map
            .entities
            .get(&self.entity)
            .map_or(Point::ZERO, |entity| entity.bounding_box().top_left())
    }

    fn set_xy(&mut self, xy: Point) {
        if let Some(entity) = self.map.entities.get_mut(&self.entity) {
            entity.set_xy(xy);
            self.map.check_collisions(self.entity);
        }
    }

    fn test_collision_with_obstacles(&self, dx: i32, dy: i32) -> bool {
        let Some(entity) = self.map.entities.get(&self.entity) else {
            return true;
        };
        self.map
            .test_collision_with_obstacles(self.entity, entity.bounding_box().translated(dx, dy))
    }

    fn entity_xy(&self, id: EntityId) -> Option<Point> {
        self.map
            .entities
            .get(&id)
            .filter(|entity| !entity.is_being_removed())
            .map(Entity::xy)
    }

    fn entity_displayed_xy(&self, id: EntityId) -> Option<Point> {
        self.map
            .entities
            .get(&id)
            .filter(|entity| !entity.is_being_removed())
            .map(Entity::displayed_xy)
    }
}
