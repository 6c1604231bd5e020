use std::any::Any;

use super::{Movement, MovementCore, MovementHost, MovementState, StraightMovement};
use crate::geometry::Direction8;

/// Walking speed of the hero in pixels per second.
pub const DEFAULT_WALKING_SPEED: f64 = 88.0;

/// Smooth straight movement steered by an 8-direction input.
#[derive(Debug, Clone)]
pub struct PlayerMovement {
    straight: StraightMovement,
    walking_speed: f64,
    wanted_direction: Option<Direction8>,
}

impl PlayerMovement {
    pub fn new(walking_speed: f64) -> Self {
        Self {
            straight: StraightMovement::new(true, false),
            walking_speed,
            wanted_direction: None,
        }
    }

    pub fn walking_speed(&self) -> f64 {
        self.walking_speed
    }

    pub fn wanted_direction(&self) -> Option<Direction8> {
        self.wanted_direction
    }

    pub fn set_wanted_direction(&mut self, direction: Option<Direction8>, now: u64) {
        if direction == self.wanted_direction {
            return;
        }
        self.wanted_direction = direction;
        match direction {
            Some(direction) => {
                self.straight.set_speed(self.walking_speed, now);
                self.straight.set_angle(direction.angle(), now);
            }
            None => self.straight.stop(),
        }
    }

    pub fn set_walking_speed(&mut self, speed: f64, now: u64) {
        self.walking_speed = speed;
        if self.wanted_direction.is_some() {
            self.straight.set_speed(speed, now);
        }
    }
}

impl Default for PlayerMovement {
    fn default() -> Self {
        Self::new(DEFAULT_WALKING_SPEED)
    }
}

impl Movement for PlayerMovement {
    fn core(&self) -> &MovementCore {
        self.straight.core()
    }

    fn core_mut(&mut self) -> &mut MovementCore {
        self.straight.core_mut()
    }

    fn update(&mut self, host: &mut dyn MovementHost) {
        self.straight.update(host);
    }

    fn state(&self) -> MovementState {
        self.straight.state()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn shift_deadlines(&mut self, delay_ms: u64) {
        self.straight.shift_deadlines(delay_ms);
    }
}
