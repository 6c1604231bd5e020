use std::any::Any;

use super::{
    step_delay, Movement, MovementCore, MovementHost, MovementState, PixelMovement, Trajectory,
};
use crate::geometry::{Direction8, Point};

/// A straight pixel trajectory drawn with a parabolic height.
#[derive(Debug, Clone)]
pub struct JumpMovement {
    pixel: PixelMovement,
    direction: Direction8,
    length: usize,
}

impl JumpMovement {
    pub fn new(direction: Direction8, length: usize, speed: f64, ignore_obstacles: bool) -> Self {
        Self {
            pixel: PixelMovement::new(
                Trajectory::straight(direction, length),
                step_delay(speed, direction),
                false,
                ignore_obstacles,
            ),
            direction,
            length,
        }
    }

    pub fn direction(&self) -> Direction8 {
        self.direction
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn max_height(&self) -> i32 {
        (self.length / 4).clamp(4, 16) as i32
    }

    /// Current height above the ground in pixels.
    pub fn height(&self) -> i32 {
        if self.length == 0 {
            return 0;
        }
        let done = self.pixel.steps_done().min(self.length) as i64;
        let length = self.length as i64;
        let max = i64::from(self.max_height());
        (4 * max * done * (length - done) / (length * length)) as i32
    }
}

impl Movement for JumpMovement {
    fn core(&self) -> &MovementCore {
        self.pixel.core()
    }

    fn core_mut(&mut self) -> &mut MovementCore {
        self.pixel.core_mut()
    }

    fn update(&mut self, host: &mut dyn MovementHost) {
        self.pixel.update(host);
    }

    fn state(&self) -> MovementState {
        self.pixel.state()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn shift_deadlines(&mut self, delay_ms: u64) {
        self.pixel.shift_deadlines(delay_ms);
    }

    fn displayed_offset(&self) -> Point {
        Point::new(0, -self.height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_height_is_clamped() {
        assert_eq!(JumpMovement::new(Direction8::East, 8, 100.0, false).max_height(), 4);
        assert_eq!(JumpMovement::new(Direction8::East, 40, 100.0, false).max_height(), 10);
        assert_eq!(JumpMovement::new(Direction8::East, 200, 100.0, false).max_height(), 16);
    }

    #[test]
    fn grounded_before_and_after_the_jump() {
        let jump = JumpMovement::new(Direction8::South, 32, 100.0, false);
        assert_eq!(jump.height(), 0);
        assert_eq!(jump.displayed_offset(), Point::ZERO);
    }
}
