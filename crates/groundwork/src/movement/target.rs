use std::any::Any;

use tracing::debug;

use super::{Movement, MovementCore, MovementHost, MovementState, StraightMovement};
use crate::geometry::Point;
use crate::map::EntityId;

/// Minimum interval between two angle recomputations toward a moving target.
pub const TARGET_RECOMPUTATION_DELAY_MS: u64 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementTarget {
    Point(Point),
    /// Anchor point of an entity plus an offset.
    Entity { id: EntityId, offset: Point },
}

/// Straight movement toward a point or an entity, finishing exactly on it.
#[derive(Debug, Clone)]
pub struct TargetMovement {
    straight: StraightMovement,
    target: MovementTarget,
    target_xy: Option<Point>,
    moving_speed: f64,
    sign: (i32, i32),
    next_recomputation_date: Option<u64>,
    state: MovementState,
}

impl TargetMovement {
    pub fn new(target: MovementTarget, speed: f64, ignore_obstacles: bool) -> Self {
        Self {
            straight: StraightMovement::new(true, ignore_obstacles),
            target,
            target_xy: match target {
                MovementTarget::Point(point) => Some(point),
                MovementTarget::Entity { .. } => None,
            },
            moving_speed: speed,
            sign: (1, 1),
            next_recomputation_date: None,
            state: MovementState::Started,
        }
    }

    pub fn target(&self) -> MovementTarget {
        self.target
    }

    /// Retargets; the direction is recomputed on the next update.
    pub fn set_target(&mut self, target: MovementTarget) {
        self.target = target;
        if let MovementTarget::Point(point) = target {
            self.target_xy = Some(point);
        }
        self.next_recomputation_date = None;
        self.state = MovementState::Started;
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.moving_speed = speed;
        self.next_recomputation_date = None;
    }

    fn resolve_target(&mut self, host: &dyn MovementHost) {
        let MovementTarget::Entity { id, offset } = self.target else {
            return;
        };
        match host.entity_xy(id) {
            Some(xy) => self.target_xy = Some(xy + offset),
            None => {
                debug!(entity = id.0, "target_entity_removed");
                let last = self.target_xy.unwrap_or_else(|| host.xy());
                self.target = MovementTarget::Point(last);
                self.target_xy = Some(last);
            }
        }
    }

    fn recompute(&mut self, xy: Point, target: Point, now: u64) {
        let dx = target.x - xy.x;
        let dy = target.y - xy.y;
        self.sign = (if dx >= 0 { 1 } else { -1 }, if dy >= 0 { 1 } else { -1 });
        let angle = xy.angle_to(target);
        if (angle - self.straight.angle()).abs() > 1e-9
            || (self.straight.speed() - self.moving_speed).abs() > 1e-9
        {
            self.straight.set_speed(self.moving_speed, now);
            self.straight.set_angle(angle, now);
        }
    }

    fn finish(&mut self) {
        self.straight.stop();
        self.state = MovementState::Finished;
    }

    /// Clamps any axis that reached or passed the target and finishes once
    /// both have.
    fn check_arrival(&mut self, host: &mut dyn MovementHost, target: Point, now: u64) {
        let xy = self.straight.core().xy();
        let dx = target.x - xy.x;
        let dy = target.y - xy.y;
        let crossed_x = dx * self.sign.0 <= 0;
        let crossed_y = dy * self.sign.1 <= 0;
        if !crossed_x && !crossed_y {
            return;
        }
        let core = self.straight.core_mut();
        let clamp_x = if crossed_x { dx } else { 0 };
        let clamp_y = if crossed_y { dy } else { 0 };
        if (clamp_x, clamp_y) != (0, 0)
            && !core.test_collision_with_obstacles(host, clamp_x, clamp_y)
        {
            core.translate(host, clamp_x, clamp_y);
        }
        if crossed_x && crossed_y {
            if core.xy() == target {
                self.finish();
            }
            return;
        }
        if crossed_x && self.straight.x_speed() != 0.0 {
            self.straight.set_x_speed(0.0, now);
        }
        if crossed_y && self.straight.y_speed() != 0.0 {
            self.straight.set_y_speed(0.0, now);
        }
    }
}

impl Movement for TargetMovement {
    fn core(&self) -> &MovementCore {
        self.straight.core()
    }

    fn core_mut(&mut self) -> &mut MovementCore {
        self.straight.core_mut()
    }

    fn update(&mut self, host: &mut dyn MovementHost) {
        if self.straight.is_suspended() || self.state == MovementState::Finished {
            return;
        }
        self.straight.core_mut().sync(host);
        let now = host.now();
        self.resolve_target(host);
        let Some(target) = self.target_xy else {
            return;
        };

        if self.next_recomputation_date.map_or(true, |date| now >= date) {
            let xy = self.straight.core().xy();
            if xy == target {
                self.finish();
                return;
            }
            self.recompute(xy, target, now);
            self.next_recomputation_date = Some(now + TARGET_RECOMPUTATION_DELAY_MS);
        }

        self.straight.update(host);
        self.state = MovementState::Running;
        self.check_arrival(host, target, now);
    }

    fn state(&self) -> MovementState {
        self.state
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn shift_deadlines(&mut self, delay_ms: u64) {
        self.straight.shift_deadlines(delay_ms);
        if let Some(date) = self.next_recomputation_date.as_mut() {
            *date += delay_ms;
        }
    }
}
