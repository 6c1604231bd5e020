use std::any::Any;

use tracing::trace;

use super::{Movement, MovementCore, MovementHost, MovementState, Trajectory};

/// Applies an explicit trajectory, one step every `delay_ms`.
#[derive(Debug, Clone)]
pub struct PixelMovement {
    core: MovementCore,
    trajectory: Trajectory,
    delay_ms: u64,
    looping: bool,
    next_step_index: usize,
    next_step_date: Option<u64>,
    steps_done: usize,
    failed_steps: usize,
    state: MovementState,
}

impl PixelMovement {
    pub fn new(trajectory: Trajectory, delay_ms: u64, looping: bool, ignore_obstacles: bool) -> Self {
        Self {
            core: MovementCore::new(ignore_obstacles),
            trajectory,
            delay_ms: delay_ms.max(1),
            looping,
            next_step_index: 0,
            next_step_date: None,
            steps_done: 0,
            failed_steps: 0,
            state: MovementState::Started,
        }
    }

    /// Replaces the trajectory; the first step happens one delay after the
    /// next update.
    pub fn set_trajectory(&mut self, trajectory: Trajectory) {
        self.trajectory = trajectory;
        self.next_step_index = 0;
        self.next_step_date = None;
        self.steps_done = 0;
        self.state = MovementState::Started;
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    pub fn set_delay(&mut self, delay_ms: u64) {
        self.delay_ms = delay_ms.max(1);
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Steps attempted since the trajectory was set, failed ones included.
    pub fn steps_done(&self) -> usize {
        self.steps_done
    }

    /// Steps skipped because of an obstacle, over the movement's lifetime.
    pub fn failed_steps(&self) -> usize {
        self.failed_steps
    }

    fn make_next_step(&mut self, host: &mut dyn MovementHost) {
        let step = self.trajectory.steps()[self.next_step_index];
        if self.core.test_collision_with_obstacles(host, step.x, step.y) {
            self.failed_steps += 1;
            trace!(dx = step.x, dy = step.y, "pixel_step_blocked");
        } else {
            self.core.translate(host, step.x, step.y);
        }
        self.steps_done += 1;
        self.next_step_index += 1;
        if self.next_step_index >= self.trajectory.len() {
            if self.looping {
                self.next_step_index = 0;
            } else {
                self.state = MovementState::Finished;
            }
        }
    }
}

impl Movement for PixelMovement {
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
        if self.trajectory.is_empty() {
            self.state = MovementState::Finished;
            return;
        }
        let now = host.now();
        let mut next = *self.next_step_date.get_or_insert(now + self.delay_ms);
        while now >= next && self.state != MovementState::Finished {
            self.state = MovementState::Running;
            self.make_next_step(host);
            next += self.delay_ms;
        }
        self.next_step_date = Some(next);
    }

    fn state(&self) -> MovementState {
        self.state
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn shift_deadlines(&mut self, delay_ms: u64) {
        if let Some(next) = self.next_step_date.as_mut() {
            *next += delay_ms;
        }
    }
}
