/// Interval between two frames of animated tiles.
pub const TILE_FRAME_INTERVAL_MS: u64 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileAnimationSequence {
    /// 0-1-2-0-1-2...
    Cycle,
    /// 0-1-2-1-0-1...
    PingPong,
}

/// Frame counter shared by all animated tiles of one map.
#[derive(Debug, Clone, Default)]
pub struct TileAnimationClock {
    counter: u64,
    next_frame_date: Option<u64>,
    when_suspended: Option<u64>,
}

impl TileAnimationClock {
    pub fn update(&mut self, now: u64) {
        if self.when_suspended.is_some() {
            return;
        }
        let next = self
            .next_frame_date
            .get_or_insert(now + TILE_FRAME_INTERVAL_MS);
        while now >= *next {
            self.counter = self.counter.wrapping_add(1);
            *next += TILE_FRAME_INTERVAL_MS;
        }
    }

    pub fn set_suspended(&mut self, suspended: bool, now: u64) {
        match (suspended, self.when_suspended) {
            (true, None) => self.when_suspended = Some(now),
            (false, Some(since)) => {
                self.when_suspended = None;
                if let Some(next) = self.next_frame_date.as_mut() {
                    *next += now.saturating_sub(since);
                }
            }
            _ => {}
        }
    }

    pub fn frame(&self, sequence: TileAnimationSequence) -> u8 {
        match sequence {
            TileAnimationSequence::Cycle => (self.counter % 3) as u8,
            TileAnimationSequence::PingPong => [0, 1, 2, 1][(self.counter % 4) as usize],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_advance_every_interval() {
        let mut clock = TileAnimationClock::default();
        clock.update(0);
        let mut cycle = Vec::new();
        let mut ping_pong = Vec::new();
        for step in 0..6 {
            clock.update(step * TILE_FRAME_INTERVAL_MS);
            cycle.push(clock.frame(TileAnimationSequence::Cycle));
            ping_pong.push(clock.frame(TileAnimationSequence::PingPong));
        }
        assert_eq!(cycle, vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(ping_pong, vec![0, 1, 2, 1, 0, 1]);
    }

    #[test]
    fn suspension_freezes_the_clock() {
        let mut clock = TileAnimationClock::default();
        clock.update(0);
        clock.set_suspended(true, 100);
        clock.update(1000);
        assert_eq!(clock.frame(TileAnimationSequence::Cycle), 0);
        clock.set_suspended(false, 1000);
        clock.update(1149);
        assert_eq!(clock.frame(TileAnimationSequence::Cycle), 0);
        clock.update(1150);
        assert_eq!(clock.frame(TileAnimationSequence::Cycle), 1);
    }
}
