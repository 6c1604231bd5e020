use std::any::Any;
use std::collections::VecDeque;

use tracing::debug;

use super::{
    parse_path, step_delay, Movement, MovementCore, MovementHost, MovementState, PixelMovement,
    Trajectory, TrajectoryError,
};
use crate::geometry::{Direction8, Point};
use crate::ground::CELL_SIZE;

/// Pixels travelled per path digit.
pub const PATH_LEG_LENGTH: usize = 8;
/// Time allowed to reach a grid intersection before trying the other one.
pub const SNAP_TIMEOUT_MS: u64 = 500;

const MIN_PATH_SPEED: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapping {
    target: Point,
    deadline: u64,
}

fn nearest_grid_coordinate(value: i32) -> i32 {
    let shifted = value + CELL_SIZE / 2;
    shifted - shifted.rem_euclid(CELL_SIZE)
}

fn opposite_grid_coordinate(value: i32, previous: i32) -> i32 {
    if value.rem_euclid(CELL_SIZE) == 0 {
        value
    } else if previous <= value {
        previous + CELL_SIZE
    } else {
        previous - CELL_SIZE
    }
}

/// Follows a string of direction digits, each worth 8 one-pixel steps.
#[derive(Debug, Clone)]
pub struct PathMovement {
    pixel: PixelMovement,
    path: Vec<Direction8>,
    remaining: VecDeque<Direction8>,
    current_direction: Option<Direction8>,
    speed: f64,
    looping: bool,
    snap_to_grid: bool,
    snapping: Option<Snapping>,
    state: MovementState,
}

impl PathMovement {
    pub fn new(
        path: &str,
        speed: f64,
        looping: bool,
        ignore_obstacles: bool,
        snap_to_grid: bool,
    ) -> Result<Self, TrajectoryError> {
        Ok(Self::from_directions(
            parse_path(path)?,
            speed,
            looping,
            ignore_obstacles,
            snap_to_grid,
        ))
    }

    pub fn from_directions(
        path: Vec<Direction8>,
        speed: f64,
        looping: bool,
        ignore_obstacles: bool,
        snap_to_grid: bool,
    ) -> Self {
        Self {
            pixel: PixelMovement::new(Trajectory::default(), 1, false, ignore_obstacles),
            remaining: path.iter().copied().collect(),
            path,
            current_direction: None,
            speed: speed.max(MIN_PATH_SPEED),
            looping,
            snap_to_grid,
            snapping: None,
            state: MovementState::Started,
        }
    }

    pub fn current_direction(&self) -> Option<Direction8> {
        self.current_direction
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_snapping(&self) -> bool {
        self.snapping.is_some()
    }

    fn start_next_leg(&mut self, host: &mut dyn MovementHost) -> bool {
        if self.snap_to_grid {
            let top_left = host.top_left();
            if top_left.x.rem_euclid(CELL_SIZE) != 0 || top_left.y.rem_euclid(CELL_SIZE) != 0 {
                self.snap(host, top_left);
                return false;
            }
        }
        self.snapping = None;

        if self.remaining.is_empty() && self.looping {
            self.remaining.extend(self.path.iter().copied());
        }
        let Some(direction) = self.remaining.pop_front() else {
            self.state = MovementState::Finished;
            return false;
        };
        self.current_direction = Some(direction);
        self.pixel.set_delay(step_delay(self.speed, direction));
        self.pixel
            .set_trajectory(Trajectory::straight(direction, PATH_LEG_LENGTH));
        self.state = MovementState::Running;
        true
    }

    /// Nudges the entity one pixel per axis toward a grid intersection.
    fn snap(&mut self, host: &mut dyn MovementHost, top_left: Point) {
        let now = host.now();
        let snapping = match self.snapping {
            None => Snapping {
                target: Point::new(
                    nearest_grid_coordinate(top_left.x),
                    nearest_grid_coordinate(top_left.y),
                ),
                deadline: now + SNAP_TIMEOUT_MS,
            },
            Some(snapping) if now >= snapping.deadline => {
                let target = Point::new(
                    opposite_grid_coordinate(top_left.x, snapping.target.x),
                    opposite_grid_coordinate(top_left.y, snapping.target.y),
                );
                debug!(
                    target_x = target.x,
                    target_y = target.y,
                    "path_snap_reversed"
                );
                Snapping {
                    target,
                    deadline: now + SNAP_TIMEOUT_MS,
                }
            }
            Some(snapping) => snapping,
        };
        self.snapping = Some(snapping);
        self.state = MovementState::Running;

        let dx = (snapping.target.x - top_left.x).signum();
        let dy = (snapping.target.y - top_left.y).signum();
        let core = self.pixel.core_mut();
        for (step_x, step_y) in [(dx, dy), (dx, 0), (0, dy)] {
            if (step_x, step_y) == (0, 0) {
                continue;
            }
            if !core.test_collision_with_obstacles(host, step_x, step_y) {
                core.translate(host, step_x, step_y);
                return;
            }
        }
    }
}

impl Movement for PathMovement {
    fn core(&self) -> &MovementCore {
        self.pixel.core()
    }

    fn core_mut(&mut self) -> &mut MovementCore {
        self.pixel.core_mut()
    }

    fn update(&mut self, host: &mut dyn MovementHost) {
        if self.pixel.is_suspended()
            || matches!(self.state, MovementState::Finished | MovementState::Stopped)
        {
            return;
        }
        self.pixel.core_mut().sync(host);

        let failed_before = self.pixel.failed_steps();
        self.pixel.update(host);
        if self.pixel.failed_steps() > failed_before {
            debug!(
                direction = ?self.current_direction,
                "path_movement_blocked"
            );
            self.state = MovementState::Stopped;
            return;
        }
        while self.pixel.is_finished() {
            if !self.start_next_leg(host) {
                break;
            }
            self.pixel.update(host);
        }
    }

    fn state(&self) -> MovementState {
        self.state
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn shift_deadlines(&mut self, delay_ms: u64) {
        self.pixel.shift_deadlines(delay_ms);
        if let Some(snapping) = self.snapping.as_mut() {
            snapping.deadline += delay_ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_coordinates_round_to_the_nearest_intersection() {
        assert_eq!(nearest_grid_coordinate(11), 8);
        assert_eq!(nearest_grid_coordinate(12), 16);
        assert_eq!(nearest_grid_coordinate(16), 16);
        assert_eq!(nearest_grid_coordinate(-3), 0);
        assert_eq!(nearest_grid_coordinate(-5), -8);
    }

    #[test]
    fn opposite_intersection_is_on_the_other_side() {
        assert_eq!(opposite_grid_coordinate(11, 8), 16);
        assert_eq!(opposite_grid_coordinate(13, 16), 8);
        assert_eq!(opposite_grid_coordinate(16, 8), 16);
    }

    #[test]
    fn invalid_digit_is_rejected() {
        assert!(matches!(
            PathMovement::new("009", 32.0, false, false, false),
            Err(TrajectoryError::InvalidDirection { digit: '9', .. })
        ));
    }
}
