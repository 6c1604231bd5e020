use std::any::Any;

use tracing::debug;

use super::{Movement, MovementCore, MovementHost, MovementState};
use crate::geometry::Point;
use crate::map::EntityId;

/// Keeps the entity at a fixed offset from another entity's displayed position.
#[derive(Debug, Clone)]
pub struct FollowMovement {
    core: MovementCore,
    followed: EntityId,
    offset: Point,
    state: MovementState,
}

impl FollowMovement {
    pub fn new(followed: EntityId, offset: Point, ignore_obstacles: bool) -> Self {
        Self {
            core: MovementCore::new(ignore_obstacles),
            followed,
            offset,
            state: MovementState::Started,
        }
    }

    pub fn followed(&self) -> EntityId {
        self.followed
    }

    pub fn offset(&self) -> Point {
        self.offset
    }
}

impl Movement for FollowMovement {
    fn core(&self) -> &MovementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MovementCore {
        &mut self.core
    }

    fn update(&mut self, host: &mut dyn MovementHost) {
        if self.core.is_suspended() || self.state == MovementState::Finished {
            return;
        }
        self.core.sync(host);
        let Some(followed_xy) = host.entity_displayed_xy(self.followed) else {
            debug!(entity = self.followed.0, "followed_entity_removed");
            self.state = MovementState::Finished;
            return;
        };
        let next = followed_xy + self.offset;
        let delta = next - self.core.xy();
        if delta != Point::ZERO {
            if self
                .core
                .test_collision_with_obstacles(host, delta.x, delta.y)
            {
                debug!(entity = self.followed.0, "follow_blocked");
                self.state = MovementState::Finished;
                return;
            }
            self.core.set_xy(host, next);
        }
        self.state = MovementState::Running;
    }

    fn state(&self) -> MovementState {
        self.state
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn shift_deadlines(&mut self, _delay_ms: u64) {}
}
