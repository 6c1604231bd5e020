use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::detection::{CollisionMode, CollisionModes};
use crate::geometry::{Direction4, Point, Rect};
use crate::ground::{Ground, Layer, CELL_SIZE};
use crate::movement::Movement;
use crate::sprite::Sprite;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Hero,
    Npc,
    Enemy,
    Block,
    Chest,
    Stairs,
    Switch,
    Sensor,
    Teletransporter,
    Pickable,
    DynamicTile,
    Custom,
}

impl EntityKind {
    fn bit(self) -> u16 {
        1 << (self as u16)
    }

    pub fn default_obstacle_rule(self) -> ObstacleRule {
        match self {
            Self::Block | Self::Chest | Self::Npc => ObstacleRule::Always,
            Self::Teletransporter | Self::Sensor | Self::Stairs | Self::Switch => {
                ObstacleRule::AllExceptHero
            }
            Self::Hero => ObstacleRule::Kinds(KindSet::of(&[Self::Npc, Self::Block])),
            _ => ObstacleRule::Never,
        }
    }

    pub fn default_ground_sensitivity(self) -> GroundSensitivity {
        match self {
            Self::Hero => GroundSensitivity {
                low_wall: true,
                ..GroundSensitivity::NONE
            },
            Self::Enemy | Self::Npc => GroundSensitivity {
                low_wall: true,
                deep_water: true,
                hole: true,
                lava: true,
                prickle: true,
                ..GroundSensitivity::NONE
            },
            _ => GroundSensitivity {
                low_wall: true,
                ..GroundSensitivity::NONE
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KindSet(u16);

impl KindSet {
    pub fn of(kinds: &[EntityKind]) -> Self {
        Self(kinds.iter().fold(0, |bits, kind| bits | kind.bit()))
    }

    pub fn contains(self, kind: EntityKind) -> bool {
        self.0 & kind.bit() != 0
    }
}

/// Which movers an entity blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObstacleRule {
    Never,
    Always,
    AllExceptHero,
    Kinds(KindSet),
}

impl ObstacleRule {
    pub fn blocks(self, mover: EntityKind) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::AllExceptHero => mover != EntityKind::Hero,
            Self::Kinds(kinds) => kinds.contains(mover),
        }
    }
}

/// Grounds that stop an entity, beyond `Wall` which stops everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundSensitivity {
    pub low_wall: bool,
    pub deep_water: bool,
    pub shallow_water: bool,
    pub hole: bool,
    pub ice: bool,
    pub ladder: bool,
    pub prickle: bool,
    pub lava: bool,
}

impl GroundSensitivity {
    pub const NONE: GroundSensitivity = GroundSensitivity {
        low_wall: false,
        deep_water: false,
        shallow_water: false,
        hole: false,
        ice: false,
        ladder: false,
        prickle: false,
        lava: false,
    };

    /// `ground` must already be resolved to a pixel (no diagonal kinds).
    pub fn blocks(&self, ground: Ground) -> bool {
        match ground {
            Ground::Empty | Ground::Traversable | Ground::Grass => false,
            Ground::LowWall => self.low_wall,
            Ground::DeepWater => self.deep_water,
            Ground::ShallowWater => self.shallow_water,
            Ground::Hole => self.hole,
            Ground::Ice => self.ice,
            Ground::Ladder => self.ladder,
            Ground::Prickle => self.prickle,
            Ground::Lava => self.lava,
            _ => true,
        }
    }
}

impl Default for GroundSensitivity {
    fn default() -> Self {
        Self::NONE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Empty when the entity is not a detector.
    pub collision_modes: CollisionModes,
    pub ground_modifier: Option<Ground>,
    pub obstacle: ObstacleRule,
    pub layer_independent: bool,
}

impl Capabilities {
    pub fn for_kind(kind: EntityKind) -> Self {
        Self {
            collision_modes: CollisionModes::NONE,
            ground_modifier: None,
            obstacle: kind.default_obstacle_rule(),
            layer_independent: matches!(kind, EntityKind::Stairs),
        }
    }

    pub fn is_detector(&self) -> bool {
        !self.collision_modes.is_empty()
    }

    pub fn is_obstacle(&self) -> bool {
        self.obstacle != ObstacleRule::Never
    }

    pub fn is_ground_modifier(&self) -> bool {
        self.ground_modifier.is_some()
    }
}

pub type CustomCollisionTest = fn(&Entity, &Entity) -> bool;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityError {
    #[error("{kind:?} size {width}x{height} is not a multiple of {CELL_SIZE}")]
    SizeNotMultipleOf8 {
        kind: EntityKind,
        width: i32,
        height: i32,
    },
    #[error("unknown entity {0:?}")]
    Unknown(EntityId),
}

/// Description of an entity to add to a map.
#[derive(Debug)]
pub struct EntityDesc {
    kind: EntityKind,
    layer: Layer,
    xy: Point,
    origin: Point,
    width: i32,
    height: i32,
    direction: Direction4,
    capabilities: Capabilities,
    ground_sensitivity: GroundSensitivity,
    custom_collision: Option<CustomCollisionTest>,
    sprites: Vec<Sprite>,
}

impl EntityDesc {
    pub fn new(kind: EntityKind, xy: Point, width: i32, height: i32) -> Self {
        Self {
            kind,
            layer: Layer::Low,
            xy,
            origin: Point::ZERO,
            width,
            height,
            direction: Direction4::default(),
            capabilities: Capabilities::for_kind(kind),
            ground_sensitivity: kind.default_ground_sensitivity(),
            custom_collision: None,
            sprites: Vec::new(),
        }
    }

    pub fn layer(mut self, layer: Layer) -> Self {
        self.layer = layer;
        self
    }

    pub fn origin(mut self, origin: Point) -> Self {
        self.origin = origin;
        self
    }

    pub fn direction(mut self, direction: Direction4) -> Self {
        self.direction = direction;
        self
    }

    pub fn detect(mut self, modes: impl Into<CollisionModes>) -> Self {
        self.capabilities.collision_modes = modes.into();
        self
    }

    pub fn custom_collision(mut self, test: CustomCollisionTest) -> Self {
        self.custom_collision = Some(test);
        self.capabilities.collision_modes = self
            .capabilities
            .collision_modes
            .with(CollisionMode::Custom);
        self
    }

    pub fn obstacle(mut self, rule: ObstacleRule) -> Self {
        self.capabilities.obstacle = rule;
        self
    }

    pub fn ground_modifier(mut self, ground: Ground) -> Self {
        self.capabilities.ground_modifier = Some(ground);
        self
    }

    pub fn layer_independent(mut self, independent: bool) -> Self {
        self.capabilities.layer_independent = independent;
        self
    }

    pub fn ground_sensitivity(mut self, sensitivity: GroundSensitivity) -> Self {
        self.ground_sensitivity = sensitivity;
        self
    }

    pub fn sprite(mut self, sprite: Sprite) -> Self {
        self.sprites.push(sprite);
        self
    }

    pub(crate) fn build(self, id: EntityId) -> Result<Entity, EntityError> {
        if self.width <= 0
            || self.height <= 0
            || self.width % CELL_SIZE != 0
            || self.height % CELL_SIZE != 0
        {
            return Err(EntityError::SizeNotMultipleOf8 {
                kind: self.kind,
                width: self.width,
                height: self.height,
            });
        }
        Ok(Entity {
            id,
            kind: self.kind,
            layer: self.layer,
            xy: self.xy,
            origin: self.origin,
            width: self.width,
            height: self.height,
            direction: self.direction,
            enabled: true,
            being_removed: false,
            capabilities: self.capabilities,
            ground_sensitivity: self.ground_sensitivity,
            custom_collision: self.custom_collision,
            facing_entity: None,
            sprites: self.sprites,
            movement: None,
        })
    }
}

#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    kind: EntityKind,
    layer: Layer,
    xy: Point,
    origin: Point,
    width: i32,
    height: i32,
    direction: Direction4,
    enabled: bool,
    being_removed: bool,
    capabilities: Capabilities,
    ground_sensitivity: GroundSensitivity,
    custom_collision: Option<CustomCollisionTest>,
    pub(crate) facing_entity: Option<EntityId>,
    pub(crate) sprites: Vec<Sprite>,
    pub(crate) movement: Option<Box<dyn Movement>>,
}

impl Entity {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// Anchor point.
    pub fn xy(&self) -> Point {
        self.xy
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    pub fn bounding_box(&self) -> Rect {
        let top_left = self.xy - self.origin;
        Rect::new(top_left.x, top_left.y, self.width, self.height)
    }

    pub fn direction(&self) -> Direction4 {
        self.direction
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_being_removed(&self) -> bool {
        self.being_removed
    }

    /// Enabled and not scheduled for removal.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.being_removed
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn ground_sensitivity(&self) -> &GroundSensitivity {
        &self.ground_sensitivity
    }

    pub fn custom_collision(&self) -> Option<CustomCollisionTest> {
        self.custom_collision
    }

    pub fn has_layer_independent_collisions(&self) -> bool {
        self.capabilities.layer_independent
    }

    pub fn facing_entity(&self) -> Option<EntityId> {
        self.facing_entity
    }

    pub fn sprites(&self) -> &[Sprite] {
        &self.sprites
    }

    pub fn movement(&self) -> Option<&dyn Movement> {
        self.movement.as_deref()
    }

    /// Anchor point shifted by the movement's visual offset (jump height).
    pub fn displayed_xy(&self) -> Point {
        self.xy
            + self
                .movement
                .as_ref()
                .map_or(Point::ZERO, |movement| movement.displayed_offset())
    }

    pub fn is_obstacle_for(&self, other: &Entity) -> bool {
        self.is_active() && self.id != other.id && self.capabilities.obstacle.blocks(other.kind)
    }

    pub fn facing_point(&self) -> Point {
        self.facing_point_towards(self.direction)
    }

    /// Point just outside the bounding box in `direction`, measured from its
    /// center.
    pub fn facing_point_towards(&self, direction: Direction4) -> Point {
        let center = self.bounding_box().center();
        let half_width = self.width / 2;
        let half_height = self.height / 2;
        match direction {
            Direction4::Right => center.translated(half_width, 0),
            Direction4::Left => center.translated(-half_width - 1, 0),
            Direction4::Up => center.translated(0, -half_height - 1),
            Direction4::Down => center.translated(0, half_height),
        }
    }

    pub(crate) fn set_xy(&mut self, xy: Point) {
        self.xy = xy;
    }

    pub(crate) fn set_direction(&mut self, direction: Direction4) {
        self.direction = direction;
    }

    pub(crate) fn set_layer(&mut self, layer: Layer) {
        self.layer = layer;
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn mark_removed(&mut self) {
        self.being_removed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hero_at(x: i32, y: i32) -> Entity {
        EntityDesc::new(EntityKind::Hero, Point::new(x, y), 16, 16)
            .origin(Point::new(8, 13))
            .build(EntityId(1))
            .expect("hero")
    }

    #[test]
    fn allocator_never_reuses_ids() {
        let mut allocator = EntityIdAllocator::default();
        assert_eq!(allocator.allocate(), EntityId(0));
        assert_eq!(allocator.allocate(), EntityId(1));
        assert_eq!(allocator.allocate(), EntityId(2));
    }

    #[test]
    fn size_must_be_a_multiple_of_8() {
        let err = EntityDesc::new(EntityKind::Block, Point::ZERO, 16, 12)
            .build(EntityId(0))
            .expect_err("err");
        assert_eq!(
            err,
            EntityError::SizeNotMultipleOf8 {
                kind: EntityKind::Block,
                width: 16,
                height: 12
            }
        );
    }

    #[test]
    fn bounding_box_is_anchor_minus_origin() {
        let hero = hero_at(40, 50);
        assert_eq!(hero.bounding_box(), Rect::new(32, 37, 16, 16));
    }

    #[test]
    fn facing_points_sit_just_outside_the_box() {
        let mut hero = hero_at(8, 13);
        let bounds = hero.bounding_box();
        assert_eq!(bounds, Rect::new(0, 0, 16, 16));
        for direction in Direction4::ALL {
            hero.set_direction(direction);
            let point = hero.facing_point();
            assert!(!bounds.contains_point(point), "{direction:?} -> {point:?}");
        }
        assert_eq!(hero.facing_point_towards(Direction4::Right), Point::new(16, 8));
        assert_eq!(hero.facing_point_towards(Direction4::Left), Point::new(-1, 8));
        assert_eq!(hero.facing_point_towards(Direction4::Up), Point::new(8, -1));
        assert_eq!(hero.facing_point_towards(Direction4::Down), Point::new(8, 16));
    }

    #[test]
    fn default_obstacle_rules_by_kind() {
        let hero = hero_at(0, 0);
        let npc = EntityDesc::new(EntityKind::Npc, Point::ZERO, 16, 16)
            .build(EntityId(2))
            .expect("npc");
        let sensor = EntityDesc::new(EntityKind::Sensor, Point::ZERO, 16, 16)
            .build(EntityId(3))
            .expect("sensor");
        let enemy = EntityDesc::new(EntityKind::Enemy, Point::ZERO, 16, 16)
            .build(EntityId(4))
            .expect("enemy");
        assert!(npc.is_obstacle_for(&hero));
        assert!(!sensor.is_obstacle_for(&hero));
        assert!(sensor.is_obstacle_for(&enemy));
        assert!(hero.is_obstacle_for(&npc));
        assert!(!hero.is_obstacle_for(&enemy));
        assert!(!enemy.is_obstacle_for(&hero));
    }

    #[test]
    fn removed_entities_stop_blocking() {
        let hero = hero_at(0, 0);
        let mut block = EntityDesc::new(EntityKind::Block, Point::ZERO, 16, 16)
            .build(EntityId(5))
            .expect("block");
        assert!(block.is_obstacle_for(&hero));
        block.mark_removed();
        assert!(!block.is_obstacle_for(&hero));
    }

    #[test]
    fn ground_sensitivity_defaults() {
        let hero = EntityKind::Hero.default_ground_sensitivity();
        let enemy = EntityKind::Enemy.default_ground_sensitivity();
        assert!(hero.blocks(Ground::Wall));
        assert!(hero.blocks(Ground::LowWall));
        assert!(!hero.blocks(Ground::DeepWater));
        assert!(!hero.blocks(Ground::Hole));
        assert!(enemy.blocks(Ground::Hole));
        assert!(enemy.blocks(Ground::Lava));
        assert!(!enemy.blocks(Ground::Ladder));
        assert!(!enemy.blocks(Ground::Grass));
    }
}
