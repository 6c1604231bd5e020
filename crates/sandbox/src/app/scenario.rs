use std::collections::HashMap;

use groundwork::{
    CollisionMode, CollisionModes, Direction4, Direction8, EntityDesc, EntityId, EntityKind,
    FollowMovement, Ground, JumpMovement, KernelError, Layer, Map, Movement, MovementTarget,
    PathMovement, PixelMovement, PlayerMovement, Point, Rect, StraightMovement, TargetMovement,
    Trajectory,
};
use serde::Deserialize;
use tracing::info;

use super::SandboxError;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    pub(crate) name: String,
    pub(crate) width: i32,
    pub(crate) height: i32,
    #[serde(default)]
    pub(crate) tiles: Vec<TileSpec>,
    #[serde(default)]
    pub(crate) entities: Vec<EntitySpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TileSpec {
    #[serde(default)]
    pub(crate) layer: Layer,
    pub(crate) rect: Rect,
    pub(crate) ground: Ground,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct EntitySpec {
    pub(crate) name: String,
    pub(crate) kind: EntityKind,
    pub(crate) xy: Point,
    pub(crate) width: i32,
    pub(crate) height: i32,
    #[serde(default)]
    pub(crate) layer: Layer,
    #[serde(default)]
    pub(crate) origin: Point,
    #[serde(default)]
    pub(crate) direction: Direction4,
    #[serde(default)]
    pub(crate) detect: Option<Vec<CollisionMode>>,
    #[serde(default)]
    pub(crate) ground_modifier: Option<Ground>,
    #[serde(default)]
    pub(crate) movement: Option<MovementSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub(crate) enum MovementSpec {
    Pixel {
        trajectory: String,
        delay_ms: u64,
        #[serde(default)]
        looping: bool,
        #[serde(default)]
        ignore_obstacles: bool,
    },
    Straight {
        speed: f64,
        angle_degrees: f64,
        #[serde(default = "default_true")]
        smooth: bool,
        #[serde(default)]
        max_distance: u32,
        #[serde(default)]
        ignore_obstacles: bool,
    },
    Path {
        path: String,
        speed: f64,
        #[serde(default)]
        looping: bool,
        #[serde(default)]
        snap_to_grid: bool,
        #[serde(default)]
        ignore_obstacles: bool,
    },
    Target {
        speed: f64,
        #[serde(default)]
        point: Option<Point>,
        #[serde(default)]
        entity: Option<String>,
        #[serde(default)]
        offset: Point,
        #[serde(default)]
        ignore_obstacles: bool,
    },
    Follow {
        entity: String,
        #[serde(default)]
        offset: Point,
        #[serde(default)]
        ignore_obstacles: bool,
    },
    Jump {
        direction: Direction8,
        length: usize,
        speed: f64,
        #[serde(default)]
        ignore_obstacles: bool,
    },
    Player {
        #[serde(default)]
        direction: Option<Direction8>,
        #[serde(default)]
        walking_speed: Option<f64>,
    },
}

fn default_true() -> bool {
    true
}

pub(crate) fn parse_scenario_json(raw: &str) -> Result<Scenario, SandboxError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, Scenario>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let source = error.into_inner();
        if path.is_empty() || path == "." {
            SandboxError::ParseScenario {
                path: None,
                message: source.to_string(),
            }
        } else {
            SandboxError::ParseScenario {
                path: Some(path),
                message: source.to_string(),
            }
        }
    })
}

/// A map built from a scenario, with entity ids by scenario name.
#[derive(Debug)]
pub(crate) struct LoadedScenario {
    pub(crate) map: Map,
    pub(crate) names: Vec<(String, EntityId)>,
}

impl LoadedScenario {
    #[cfg(test)]
    pub(crate) fn id(&self, name: &str) -> Option<EntityId> {
        self.names
            .iter()
            .find(|(entity_name, _)| entity_name == name)
            .map(|(_, id)| *id)
    }

    pub(crate) fn name(&self, id: EntityId) -> &str {
        self.names
            .iter()
            .find(|(_, entity_id)| *entity_id == id)
            .map_or("?", |(name, _)| name.as_str())
    }
}

pub(crate) fn build_scenario(scenario: &Scenario) -> Result<LoadedScenario, SandboxError> {
    let mut map = Map::new(scenario.width, scenario.height).map_err(KernelError::from)?;
    for tile in &scenario.tiles {
        map.add_tile(tile.layer, tile.rect, tile.ground)
            .map_err(KernelError::from)?;
    }

    let mut ids: HashMap<&str, EntityId> = HashMap::new();
    let mut names = Vec::with_capacity(scenario.entities.len());
    for spec in &scenario.entities {
        if ids.contains_key(spec.name.as_str()) {
            return Err(SandboxError::DuplicateEntityName(spec.name.clone()));
        }
        let id = map
            .add_entity(entity_desc(spec))
            .map_err(KernelError::from)?;
        ids.insert(spec.name.as_str(), id);
        names.push((spec.name.clone(), id));
    }

    // Movements go last so that they can refer to any entity by name.
    for spec in &scenario.entities {
        let Some(movement_spec) = &spec.movement else {
            continue;
        };
        let lookup = |name: &str| {
            ids.get(name)
                .copied()
                .ok_or_else(|| SandboxError::UnknownEntityName {
                    name: name.to_string(),
                    referenced_by: spec.name.clone(),
                })
        };
        let movement = build_movement(movement_spec, lookup)?;
        map.set_movement(ids[spec.name.as_str()], movement)
            .map_err(KernelError::from)?;
    }

    info!(
        scenario = scenario.name.as_str(),
        tiles = scenario.tiles.len(),
        entities = map.entity_count(),
        "scenario_loaded"
    );
    Ok(LoadedScenario { map, names })
}

fn entity_desc(spec: &EntitySpec) -> EntityDesc {
    let mut desc = EntityDesc::new(spec.kind, spec.xy, spec.width, spec.height)
        .layer(spec.layer)
        .origin(spec.origin)
        .direction(spec.direction);
    if let Some(modes) = &spec.detect {
        desc = desc.detect(modes.iter().copied().collect::<CollisionModes>());
    }
    if let Some(ground) = spec.ground_modifier {
        desc = desc.ground_modifier(ground);
    }
    desc
}

fn build_movement(
    spec: &MovementSpec,
    lookup: impl Fn(&str) -> Result<EntityId, SandboxError>,
) -> Result<Box<dyn Movement>, SandboxError> {
    let movement: Box<dyn Movement> = match spec {
        MovementSpec::Pixel {
            trajectory,
            delay_ms,
            looping,
            ignore_obstacles,
        } => Box::new(PixelMovement::new(
            Trajectory::parse(trajectory).map_err(KernelError::from)?,
            *delay_ms,
            *looping,
            *ignore_obstacles,
        )),
        MovementSpec::Straight {
            speed,
            angle_degrees,
            smooth,
            max_distance,
            ignore_obstacles,
        } => {
            let mut straight = StraightMovement::new(*smooth, *ignore_obstacles);
            straight.set_max_distance(*max_distance);
            straight.set_speed(*speed, 0);
            straight.set_angle(angle_degrees.to_radians(), 0);
            Box::new(straight)
        }
        MovementSpec::Path {
            path,
            speed,
            looping,
            snap_to_grid,
            ignore_obstacles,
        } => Box::new(
            PathMovement::new(path, *speed, *looping, *ignore_obstacles, *snap_to_grid)
                .map_err(KernelError::from)?,
        ),
        MovementSpec::Target {
            speed,
            point,
            entity,
            offset,
            ignore_obstacles,
        } => {
            let target = match (point, entity) {
                (Some(point), None) => MovementTarget::Point(*point),
                (None, Some(entity)) => MovementTarget::Entity {
                    id: lookup(entity)?,
                    offset: *offset,
                },
                _ => return Err(SandboxError::AmbiguousTarget),
            };
            Box::new(TargetMovement::new(target, *speed, *ignore_obstacles))
        }
        MovementSpec::Follow {
            entity,
            offset,
            ignore_obstacles,
        } => Box::new(FollowMovement::new(
            lookup(entity)?,
            *offset,
            *ignore_obstacles,
        )),
        MovementSpec::Jump {
            direction,
            length,
            speed,
            ignore_obstacles,
        } => Box::new(JumpMovement::new(
            *direction,
            *length,
            *speed,
            *ignore_obstacles,
        )),
        MovementSpec::Player {
            direction,
            walking_speed,
        } => {
            let mut player = walking_speed.map_or_else(PlayerMovement::default, PlayerMovement::new);
            player.set_wanted_direction(*direction, 0);
            Box::new(player)
        }
    };
    Ok(movement)
}
