use std::time::Duration;
use tokio::time::Instant;

/// Maps wall-clock instants to virtual playback time under a speed multiplier.
///
/// `now = offset` while paused, otherwise `offset + (wall - wall_ref) * speed`.
/// Every discontinuity (speed, pause state, position) goes through a rebase so
/// that later readings stay continuous from the new reference point.
///
/// The `*_at` variants take the wall-clock instant explicitly; the controller
/// reads the wall clock once per transport operation and threads it through.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    offset: Duration,
    wall_ref: Instant,
    speed: f64,
    paused: bool,
}

impl VirtualClock {
    /// Running at speed 1 from virtual time zero.
    pub fn starting_at(wall: Instant) -> Self {
        Self {
            offset: Duration::ZERO,
            wall_ref: wall,
            speed: 1.0,
            paused: false,
        }
    }

    pub fn now(&self) -> Duration {
        self.now_at(Instant::now())
    }

    pub fn now_at(&self, wall: Instant) -> Duration {
        if self.paused {
            return self.offset;
        }
        let elapsed = wall.saturating_duration_since(self.wall_ref);
        self.offset + elapsed.mul_f64(self.speed)
    }

    pub fn rebase_at(&mut self, virtual_time: Duration, wall: Instant) {
        self.offset = virtual_time;
        self.wall_ref = wall;
    }

    /// Changes only the rate going forward; the reported time does not jump.
    pub fn set_speed_at(&mut self, speed: f64, wall: Instant) {
        debug_assert!((common::MIN_SPEED..=common::MAX_SPEED).contains(&speed));
        let current = self.now_at(wall);
        self.rebase_at(current, wall);
        self.speed = speed;
    }

    pub fn pause_at(&mut self, wall: Instant) {
        if self.paused {
            return;
        }
        self.offset = self.now_at(wall);
        self.paused = true;
    }

    pub fn resume_at(&mut self, wall: Instant) {
        if !self.paused {
            return;
        }
        self.wall_ref = wall;
        self.paused = false;
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Wall-clock delay until `target` is reached when reading `from` now.
    pub fn wall_delay(&self, from: Duration, target: Duration) -> Duration {
        target.saturating_sub(from).div_f64(self.speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn advances_at_speed() {
        let t0 = Instant::now();
        let mut clock = VirtualClock::starting_at(t0);
        assert_eq!(clock.now_at(t0), Duration::ZERO);
        assert_eq!(clock.now_at(t0 + ms(250)), ms(250));

        clock.set_speed_at(4.0, t0 + ms(250));
        assert_eq!(clock.now_at(t0 + ms(250)), ms(250));
        assert_eq!(clock.now_at(t0 + ms(300)), ms(450));
    }

    #[test]
    fn pause_freezes_and_resume_continues_without_jump() {
        let t0 = Instant::now();
        let mut clock = VirtualClock::starting_at(t0);
        clock.pause_at(t0 + ms(100));
        assert!(clock.is_paused());
        assert_eq!(clock.now_at(t0 + ms(5_000)), ms(100));

        clock.resume_at(t0 + ms(5_000));
        assert_eq!(clock.now_at(t0 + ms(5_050)), ms(150));
    }

    #[test]
    fn repeated_pause_keeps_first_offset() {
        let t0 = Instant::now();
        let mut clock = VirtualClock::starting_at(t0);
        clock.pause_at(t0 + ms(100));
        clock.pause_at(t0 + ms(900));
        assert_eq!(clock.now_at(t0 + ms(900)), ms(100));
    }

    #[test]
    fn rebase_moves_position_while_paused() {
        let t0 = Instant::now();
        let mut clock = VirtualClock::starting_at(t0);
        clock.pause_at(t0 + ms(10));
        clock.rebase_at(ms(400), t0 + ms(20));
        assert_eq!(clock.now_at(t0 + ms(1_000)), ms(400));
    }

    #[test]
    fn reading_before_reference_never_goes_negative() {
        let t0 = Instant::now();
        let clock = VirtualClock::starting_at(t0 + ms(50));
        assert_eq!(clock.now_at(t0), Duration::ZERO);
    }

    #[test]
    fn wall_delay_divides_by_speed() {
        let t0 = Instant::now();
        let mut clock = VirtualClock::starting_at(t0);
        clock.set_speed_at(4.0, t0);
        assert_eq!(clock.wall_delay(ms(150), ms(300)), Duration::from_micros(37_500));
        assert_eq!(clock.wall_delay(ms(300), ms(150)), Duration::ZERO);
    }
}
