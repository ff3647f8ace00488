//! Frame clock
//!
//! Replaces the browser's animation-frame callback. The windowed host ticks
//! it from `RedrawRequested`; the headless runner ticks it in a plain loop.
//! Ticks take `&mut self` and are handed out one at a time, so a frame can
//! never start while another is still running.

use crate::lifecycle::FrameTime;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickMode {
    /// Follow the wall clock, clamping long stalls to `max_delta`
    Variable { max_delta: f32 },
    /// Advance by exactly `step` every tick, whatever the wall clock says
    Fixed { step: f32 },
}

impl Default for TickMode {
    fn default() -> Self {
        TickMode::Variable { max_delta: 0.1 }
    }
}

#[derive(Debug, Clone)]
pub struct FrameLoop {
    mode: TickMode,
    last_wall: Option<f32>,
    elapsed: f32,
    frames: u64,
}

impl FrameLoop {
    pub fn new(mode: TickMode) -> Self {
        Self {
            mode,
            last_wall: None,
            elapsed: 0.0,
            frames: 0,
        }
    }

    pub fn mode(&self) -> TickMode {
        self.mode
    }

    /// Produce the next frame from a wall-clock reading in seconds
    pub fn tick(&mut self, wall_seconds: f32) -> FrameTime {
        let delta = match self.mode {
            TickMode::Fixed { step } => step,
            TickMode::Variable { max_delta } => match self.last_wall {
                None => 0.0,
                Some(last) => (wall_seconds - last).clamp(0.0, max_delta),
            },
        };
        self.last_wall = Some(wall_seconds);
        self.elapsed += delta;
        self.frames += 1;
        FrameTime {
            time: self.elapsed,
            delta,
        }
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// Run `frames` ticks of `step` seconds back to back
pub fn run_fixed<F>(frames: u64, step: f32, mut on_frame: F) -> FrameLoop
where
    F: FnMut(FrameTime),
{
    let mut clock = FrameLoop::new(TickMode::Fixed { step });
    for i in 0..frames {
        on_frame(clock.tick(i as f32 * step));
    }
    clock
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_ticks_clamp_stalls() {
        let mut clock = FrameLoop::new(TickMode::Variable { max_delta: 0.1 });
        assert_eq!(clock.tick(5.0).delta, 0.0);
        assert!((clock.tick(5.016).delta - 0.016).abs() < 1e-4);
        assert!((clock.tick(9.0).delta - 0.1).abs() < 1e-6);
        // A clock that runs backwards never produces a negative step
        assert_eq!(clock.tick(1.0).delta, 0.0);
    }

    #[test]
    fn fixed_ticks_ignore_the_wall_clock() {
        let mut clock = FrameLoop::new(TickMode::Fixed { step: 0.25 });
        clock.tick(100.0);
        let frame = clock.tick(100.0);
        assert_eq!(frame.delta, 0.25);
        assert_eq!(frame.time, 0.5);
    }

    #[test]
    fn run_fixed_counts_frames() {
        let mut times = Vec::new();
        let clock = run_fixed(4, 0.5, |f| times.push(f.time));
        assert_eq!(times, vec![0.5, 1.0, 1.5, 2.0]);
        assert_eq!(clock.frames(), 4);
    }
}
