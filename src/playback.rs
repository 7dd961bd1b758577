//! Playback cursor over the time-step axis

use std::time::Duration;

/// Longest wall-clock gap honored by one tick
const MAX_TICK: Duration = Duration::from_millis(100);

/// How far past the last step the cursor may travel; keeps `floor` on the last step
const END_SLACK: f64 = 0.999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    Paused,
}

#[derive(Debug, Clone)]
pub struct Playback {
    cursor: f64,
    state: PlayState,
    min_step: u32,
    max_step: u32,
}

impl Playback {
    /// Paused at `min_step`
    pub fn new(min_step: u32, max_step: u32) -> Self {
        Self {
            cursor: f64::from(min_step),
            state: PlayState::Paused,
            min_step,
            max_step: max_step.max(min_step),
        }
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn step(&self) -> u32 {
        self.cursor.floor() as u32
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    pub fn toggle(&mut self) {
        self.state = match self.state {
            PlayState::Playing => PlayState::Paused,
            PlayState::Paused => PlayState::Playing,
        };
        tracing::debug!("Playback {:?} at {:.3}", self.state, self.cursor);
    }

    pub fn reset(&mut self) {
        self.cursor = f64::from(self.min_step);
        self.state = PlayState::Paused;
    }

    pub fn step_back(&mut self) {
        self.cursor = (self.cursor.floor() - 1.0).max(f64::from(self.min_step));
        self.state = PlayState::Paused;
    }

    pub fn step_forward(&mut self) {
        self.cursor = (self.cursor.floor() + 1.0).min(self.end());
        self.state = PlayState::Paused;
    }

    /// Jump to a whole step, clamped to the dataset's steps
    pub fn seek(&mut self, step: u32) {
        self.cursor = f64::from(step.clamp(self.min_step, self.max_step));
        self.state = PlayState::Paused;
    }

    /// Advance by `elapsed * speed` steps while playing.
    /// Gaps longer than 100 ms (e.g. a backgrounded window) count as 100 ms.
    pub fn tick(&mut self, elapsed: Duration, speed: f64) {
        if self.state != PlayState::Playing {
            return;
        }
        let dt = elapsed.min(MAX_TICK).as_secs_f64();
        let next = self.cursor + dt * speed;
        if next.is_finite() {
            self.cursor = next.clamp(f64::from(self.min_step), self.end());
        }
    }

    fn end(&self) -> f64 {
        f64::from(self.max_step) + END_SLACK
    }
}
