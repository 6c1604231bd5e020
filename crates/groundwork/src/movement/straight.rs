use std::any::Any;
use std::f64::consts::SQRT_2;

use tracing::debug;

use super::{speed_to_delay, Movement, MovementCore, MovementHost, MovementState};
use crate::geometry::Point;

/// How far a smooth movement looks sideways for a way around an obstacle.
pub const SMOOTH_SCAN_DISTANCE: i32 = 8;

const MIN_SPEED: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Default)]
struct AxisSchedule {
    speed: f64,
    step: i32,
    delay: u64,
    next_date: u64,
}

impl AxisSchedule {
    fn set_speed(&mut self, speed: f64, now: u64) {
        if speed.abs() < MIN_SPEED {
            *self = Self::default();
            return;
        }
        self.speed = speed;
        self.step = if speed > 0.0 { 1 } else { -1 };
        self.delay = speed_to_delay(speed.abs());
        self.next_date = now + self.delay;
    }

    fn is_due(&self, now: u64) -> bool {
        self.step != 0 && now >= self.next_date
    }
}

/// Constant velocity along an angle, with independent x and y step schedules.
#[derive(Debug, Clone)]
pub struct StraightMovement {
    core: MovementCore,
    smooth: bool,
    angle: f64,
    speed: f64,
    x: AxisSchedule,
    y: AxisSchedule,
    initial_xy: Option<Point>,
    max_distance: u32,
    state: MovementState,
}

impl StraightMovement {
    pub fn new(smooth: bool, ignore_obstacles: bool) -> Self {
        Self {
            core: MovementCore::new(ignore_obstacles),
            smooth,
            angle: 0.0,
            speed: 0.0,
            x: AxisSchedule::default(),
            y: AxisSchedule::default(),
            initial_xy: None,
            max_distance: 0,
            state: MovementState::Stopped,
        }
    }

    pub fn is_smooth(&self) -> bool {
        self.smooth
    }

    pub fn set_smooth(&mut self, smooth: bool) {
        self.smooth = smooth;
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Radians, counter-clockwise, 0 pointing right.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn x_speed(&self) -> f64 {
        self.x.speed
    }

    pub fn y_speed(&self) -> f64 {
        self.y.speed
    }

    pub fn max_distance(&self) -> u32 {
        self.max_distance
    }

    /// Finishes the movement once it is this many pixels away from where it
    /// started. 0 means unlimited.
    pub fn set_max_distance(&mut self, max_distance: u32) {
        self.max_distance = max_distance;
    }

    pub fn set_speed(&mut self, speed: f64, now: u64) {
        self.speed = speed.max(0.0);
        self.apply_velocity(now);
    }

    pub fn set_angle(&mut self, angle: f64, now: u64) {
        self.angle = angle;
        self.apply_velocity(now);
    }

    pub fn set_x_speed(&mut self, x_speed: f64, now: u64) {
        self.x.set_speed(x_speed, now);
        self.refresh_polar();
    }

    pub fn set_y_speed(&mut self, y_speed: f64, now: u64) {
        self.y.set_speed(y_speed, now);
        self.refresh_polar();
    }

    pub fn stop(&mut self) {
        self.speed = 0.0;
        self.x = AxisSchedule::default();
        self.y = AxisSchedule::default();
        self.state = MovementState::Stopped;
    }

    fn apply_velocity(&mut self, now: u64) {
        self.x.set_speed(self.speed * self.angle.cos(), now);
        self.y.set_speed(-self.speed * self.angle.sin(), now);
        self.restart();
    }

    fn refresh_polar(&mut self) {
        self.speed = self.x.speed.hypot(self.y.speed);
        if self.speed >= MIN_SPEED {
            self.angle = (-self.y.speed).atan2(self.x.speed);
        }
        self.restart();
    }

    fn restart(&mut self) {
        self.initial_xy = None;
        self.state = if self.x.step == 0 && self.y.step == 0 {
            MovementState::Stopped
        } else {
            MovementState::Started
        };
    }

    fn blocked(&self, host: &dyn MovementHost, dx: i32, dy: i32) -> bool {
        self.core.test_collision_with_obstacles(host, dx, dy)
    }

    fn update_x(&mut self, host: &mut dyn MovementHost) {
        if self.smooth {
            self.update_smooth_x(host);
        } else {
            self.update_non_smooth_x(host);
        }
    }

    fn update_y(&mut self, host: &mut dyn MovementHost) {
        if self.smooth {
            self.update_smooth_y(host);
        } else {
            self.update_non_smooth_y(host);
        }
    }

    fn update_non_smooth_x(&mut self, host: &mut dyn MovementHost) {
        let x_move = self.x.step;
        if self.blocked(host, x_move, 0) {
            debug!(x = self.core.xy().x, y = self.core.xy().y, "straight_movement_blocked");
            self.stop();
            return;
        }
        self.core.translate(host, x_move, 0);
        self.x.next_date += self.x.delay;
    }

    fn update_non_smooth_y(&mut self, host: &mut dyn MovementHost) {
        let y_move = self.y.step;
        if self.blocked(host, 0, y_move) {
            debug!(x = self.core.xy().x, y = self.core.xy().y, "straight_movement_blocked");
            self.stop();
            return;
        }
        self.core.translate(host, 0, y_move);
        self.y.next_date += self.y.delay;
    }

    fn update_smooth_x(&mut self, host: &mut dyn MovementHost) {
        let x_move = self.x.step;
        let y_move = self.y.step;
        let mut increment = self.x.delay;

        if !self.blocked(host, x_move, 0) {
            self.core.translate(host, x_move, 0);
            if y_move != 0 && self.blocked(host, 0, y_move) {
                // y is stuck: x takes the whole speed.
                increment = speed_to_delay(self.speed);
            }
        } else if y_move == 0 {
            match self.find_side_step(host, x_move, 0) {
                Some(shift) if shift.abs() == 1 => {
                    self.core.translate(host, x_move, shift);
                    increment = ((self.x.delay as f64) * SQRT_2) as u64;
                }
                Some(shift) => self.core.translate(host, 0, shift),
                None => {}
            }
        } else if !self.blocked(host, x_move, y_move) {
            self.core.translate(host, x_move, y_move);
            self.y.next_date += self.y.delay;
        } else if !self.blocked(host, 0, y_move) {
            self.core.translate(host, 0, y_move);
            self.y.next_date += self.y.delay;
        }
        self.x.next_date += increment.max(1);
    }

    fn update_smooth_y(&mut self, host: &mut dyn MovementHost) {
        let x_move = self.x.step;
        let y_move = self.y.step;
        let mut increment = self.y.delay;

        if !self.blocked(host, 0, y_move) {
            self.core.translate(host, 0, y_move);
            if x_move != 0 && self.blocked(host, x_move, 0) {
                increment = speed_to_delay(self.speed);
            }
        } else if x_move == 0 {
            match self.find_side_step(host, 0, y_move) {
                Some(shift) if shift.abs() == 1 => {
                    self.core.translate(host, shift, y_move);
                    increment = ((self.y.delay as f64) * SQRT_2) as u64;
                }
                Some(shift) => self.core.translate(host, shift, 0),
                None => {}
            }
        } else if !self.blocked(host, x_move, y_move) {
            self.core.translate(host, x_move, y_move);
            self.x.next_date += self.x.delay;
        } else if !self.blocked(host, x_move, 0) {
            self.core.translate(host, x_move, 0);
            self.x.next_date += self.x.delay;
        }
        self.y.next_date += increment.max(1);
    }

    /// Lateral shift (perpendicular to the blocked primary move) from which
    /// the primary move is free. A ±1 result means the diagonal nudge itself
    /// is free; larger results mean the entity can snap sideways first.
    fn find_side_step(&self, host: &dyn MovementHost, x_move: i32, y_move: i32) -> Option<i32> {
        let lateral = |distance: i32| {
            if x_move != 0 {
                (0, distance)
            } else {
                (distance, 0)
            }
        };
        for sign in [1, -1] {
            let (lx, ly) = lateral(sign);
            if !self.blocked(host, x_move + lx, y_move + ly) {
                return Some(sign);
            }
        }
        for distance in 2..=SMOOTH_SCAN_DISTANCE {
            for sign in [1, -1] {
                let (lx, ly) = lateral(sign * distance);
                if !self.blocked(host, x_move + lx, y_move + ly) && !self.blocked(host, lx, ly) {
                    return Some(sign * distance);
                }
            }
        }
        None
    }

    fn check_max_distance(&mut self) {
        let Some(initial) = self.initial_xy else {
            return;
        };
        if self.max_distance > 0
            && initial.distance_to(self.core.xy()) >= f64::from(self.max_distance)
        {
            self.stop();
            self.state = MovementState::Finished;
        }
    }
}

impl Movement for StraightMovement {
    fn core(&self) -> &MovementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MovementCore {
        &mut self.core
    }

    fn update(&mut self, host: &mut dyn MovementHost) {
        if self.core.is_suspended() {
            return;
        }
        self.core.sync(host);
        if matches!(self.state, MovementState::Finished | MovementState::Stopped) {
            return;
        }
        if self.initial_xy.is_none() {
            self.initial_xy = Some(self.core.xy());
        }
        let now = host.now();
        loop {
            let x_due = self.x.is_due(now);
            let y_due = self.y.is_due(now);
            if !x_due && !y_due {
                break;
            }
            self.state = MovementState::Running;
            if x_due && y_due {
                if self.x.next_date <= self.y.next_date {
                    self.update_x(host);
                    if self.y.is_due(now) {
                        self.update_y(host);
                    }
                } else {
                    self.update_y(host);
                    if self.x.is_due(now) {
                        self.update_x(host);
                    }
                }
            } else if x_due {
                self.update_x(host);
            } else {
                self.update_y(host);
            }
            self.check_max_distance();
            if self.state != MovementState::Running {
                break;
            }
        }
    }

    fn state(&self) -> MovementState {
        self.state
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn shift_deadlines(&mut self, delay_ms: u64) {
        self.x.next_date += delay_ms;
        self.y.next_date += delay_ms;
    }
}
