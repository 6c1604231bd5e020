mod follow;
mod jump;
mod path;
mod pixel;
mod player;
mod straight;
mod target;
mod trajectory;


use std::any::Any;
use std::f64::consts::SQRT_2;
use std::fmt;

use crate::geometry::{Direction8, Point};
use crate::map::EntityId;

pub use follow::FollowMovement;
pub use jump::JumpMovement;
pub use path::{PathMovement, PATH_LEG_LENGTH, SNAP_TIMEOUT_MS};
pub use pixel::PixelMovement;
pub use player::{PlayerMovement, DEFAULT_WALKING_SPEED};
pub use straight::{StraightMovement, SMOOTH_SCAN_DISTANCE};
pub use target::{MovementTarget, TargetMovement, TARGET_RECOMPUTATION_DELAY_MS};
pub use trajectory::{parse_path, Trajectory, TrajectoryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementState {
    Started,
    Running,
    Finished,
    Stopped,
}

/// What a movement sees of the entity it drives and of the map around it.
pub trait MovementHost {
    fn now(&self) -> u64;
    /// Anchor point of the moved entity.
    fn xy(&self) -> Point;
    /// Top-left corner of the moved entity's bounding box.
    fn top_left(&self) -> Point;
    fn set_xy(&mut self, xy: Point);
    /// Whether the bounding box translated by `(dx, dy)` would hit an obstacle
    /// or leave the map.
    fn test_collision_with_obstacles(&self, dx: i32, dy: i32) -> bool;
    fn entity_xy(&self, id: EntityId) -> Option<Point>;
    fn entity_displayed_xy(&self, id: EntityId) -> Option<Point>;
}

#[derive(Debug, Clone, Default)]
pub struct MovementCore {
    xy: Point,
    ignore_obstacles: bool,
    when_suspended: Option<u64>,
}

impl MovementCore {
    pub fn new(ignore_obstacles: bool) -> Self {
        Self {
            ignore_obstacles,
            ..Self::default()
        }
    }

    pub fn xy(&self) -> Point {
        self.xy
    }

    pub fn ignores_obstacles(&self) -> bool {
        self.ignore_obstacles
    }

    pub fn set_ignore_obstacles(&mut self, ignore: bool) {
        self.ignore_obstacles = ignore;
    }

    pub fn is_suspended(&self) -> bool {
        self.when_suspended.is_some()
    }

    pub(crate) fn sync(&mut self, host: &dyn MovementHost) {
        self.xy = host.xy();
    }

    pub fn test_collision_with_obstacles(&self, host: &dyn MovementHost, dx: i32, dy: i32) -> bool {
        !self.ignore_obstacles && host.test_collision_with_obstacles(dx, dy)
    }

    pub fn set_xy(&mut self, host: &mut dyn MovementHost, xy: Point) {
        self.xy = xy;
        host.set_xy(xy);
    }

    pub fn translate(&mut self, host: &mut dyn MovementHost, dx: i32, dy: i32) {
        let xy = self.xy.translated(dx, dy);
        self.set_xy(host, xy);
    }

    /// Returns the suspended duration when resuming.
    fn set_suspended(&mut self, suspended: bool, now: u64) -> Option<u64> {
        match (suspended, self.when_suspended) {
            (true, None) => {
                self.when_suspended = Some(now);
                None
            }
            (false, Some(since)) => {
                self.when_suspended = None;
                Some(now.saturating_sub(since))
            }
            _ => None,
        }
    }
}

pub trait Movement: fmt::Debug {
    fn core(&self) -> &MovementCore;
    fn core_mut(&mut self) -> &mut MovementCore;
    fn update(&mut self, host: &mut dyn MovementHost);
    fn state(&self) -> MovementState;
    /// Pushes every pending deadline `delay_ms` into the future.
    fn shift_deadlines(&mut self, delay_ms: u64);
    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn xy(&self) -> Point {
        self.core().xy()
    }

    fn is_finished(&self) -> bool {
        self.state() == MovementState::Finished
    }

    fn is_stopped(&self) -> bool {
        self.state() == MovementState::Stopped
    }

    /// Visual offset added to the entity position when drawn.
    fn displayed_offset(&self) -> Point {
        Point::ZERO
    }

    fn is_suspended(&self) -> bool {
        self.core().is_suspended()
    }

    fn set_suspended(&mut self, suspended: bool, now: u64) {
        if let Some(elapsed) = self.core_mut().set_suspended(suspended, now) {
            self.shift_deadlines(elapsed);
        }
    }
}

/// Milliseconds per pixel at `speed` pixels per second, at least 1.
pub(crate) fn speed_to_delay(speed: f64) -> u64 {
    if speed <= 0.0 {
        return u64::MAX / 4;
    }
    ((1000.0 / speed) as u64).max(1)
}

pub(crate) fn step_delay(speed: f64, direction: Direction8) -> u64 {
    let delay = speed_to_delay(speed);
    if direction.is_diagonal() {
        ((delay as f64 * SQRT_2) as u64).max(1)
    } else {
        delay
    }
}
