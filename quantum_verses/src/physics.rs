//! Closed-form toy physics shared by the verse animations
//!
//! Everything here is a pure function of time and parameters, except
//! [`BinaryCollapse`], which takes exactly one random draw at the moment of
//! transition and then holds its outcome until reset.

use rand::Rng;
use std::f32::consts::PI;

/// `clamp((now - start) / duration, 0, 1)`. A non-positive duration is
/// treated as already finished.
pub fn progress(now: f32, start: f32, duration: f32) -> f32 {
    if duration <= 0.0 {
        return 1.0;
    }
    ((now - start) / duration).clamp(0.0, 1.0)
}

pub fn ease_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Overshooting spring; exact at 0 and 1
pub fn ease_out_elastic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t == 0.0 || t == 1.0 {
        return t;
    }
    let c4 = 2.0 * PI / 3.0;
    2.0f32.powf(-10.0 * t) * ((t * 10.0 - 0.75) * c4).sin() + 1.0
}

/// Unnormalized Gaussian envelope, 1 at `center`
pub fn gaussian(x: f32, center: f32, width: f32) -> f32 {
    if width <= 0.0 {
        return if x == center { 1.0 } else { 0.0 };
    }
    (-(x - center).powi(2) / (2.0 * width * width)).exp()
}

/// Linear spreading of a free wave packet: `initial + rate * t`
pub fn spread_width(initial: f32, rate: f32, t: f32) -> f32 {
    initial + rate * t.max(0.0)
}

/// Probability that an event with per-second probability `p` fires within
/// `dt` seconds
pub fn chance_within(p: f32, dt: f32) -> f32 {
    if p <= 0.0 || dt <= 0.0 {
        return 0.0;
    }
    1.0 - (1.0 - p.min(1.0)).powf(dt)
}

/// `sin(x)/x` with the removable singularity filled in
pub fn sinc(x: f32) -> f32 {
    if x.abs() < 1e-6 {
        1.0
    } else {
        x.sin() / x
    }
}

/// One of two discrete measurement results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The branch selected with the configured probability (decay, spin up)
    Primary,
    Secondary,
}

impl Outcome {
    pub fn opposite(self) -> Self {
        match self {
            Outcome::Primary => Outcome::Secondary,
            Outcome::Secondary => Outcome::Primary,
        }
    }
}

/// A binary measurement that stays put once observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinaryCollapse {
    #[default]
    Pending,
    Resolved(Outcome),
}

impl BinaryCollapse {
    /// Draw once against `probability`; later calls return the stored outcome
    pub fn resolve<R: Rng + ?Sized>(&mut self, rng: &mut R, probability: f32) -> Outcome {
        match *self {
            BinaryCollapse::Resolved(outcome) => outcome,
            BinaryCollapse::Pending => {
                let outcome = if rng.gen::<f32>() < probability {
                    Outcome::Primary
                } else {
                    Outcome::Secondary
                };
                *self = BinaryCollapse::Resolved(outcome);
                outcome
            }
        }
    }

    /// Force an outcome (correlated partner of an entangled pair)
    pub fn fix(&mut self, outcome: Outcome) -> Outcome {
        if let BinaryCollapse::Resolved(existing) = *self {
            return existing;
        }
        *self = BinaryCollapse::Resolved(outcome);
        outcome
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match *self {
            BinaryCollapse::Resolved(outcome) => Some(outcome),
            BinaryCollapse::Pending => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, BinaryCollapse::Resolved(_))
    }

    pub fn reset(&mut self) {
        *self = BinaryCollapse::Pending;
    }
}

/// A transition that starts at some instant and lasts `duration` seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeline {
    pub start: Option<f32>,
    pub duration: f32,
}

impl Timeline {
    pub fn new(duration: f32) -> Self {
        Self {
            start: None,
            duration,
        }
    }

    pub fn begin(&mut self, now: f32) {
        self.start = Some(now);
    }

    pub fn clear(&mut self) {
        self.start = None;
    }

    pub fn is_started(&self) -> bool {
        self.start.is_some()
    }

    /// 0 before the transition begins
    pub fn progress_at(&self, now: f32) -> f32 {
        self.start
            .map_or(0.0, |start| progress(now, start, self.duration))
    }

    pub fn is_finished_at(&self, now: f32) -> bool {
        self.start.is_some() && self.progress_at(now) >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn progress_is_clamped_and_monotonic() {
        let mut last = 0.0;
        for i in -20..60 {
            let t = i as f32 * 0.1;
            let p = progress(t, 0.5, 2.0);
            assert!((0.0..=1.0).contains(&p));
            assert!(p >= last);
            last = p;
        }
        assert_eq!(progress(0.5, 0.5, 2.0), 0.0);
        assert_eq!(progress(10.0, 0.5, 2.0), 1.0);
        assert_eq!(progress(0.0, 1.0, 0.0), 1.0);
    }

    #[test]
    fn easings_hit_their_endpoints() {
        for ease in [ease_out_cubic, ease_in_out_cubic, ease_out_elastic] {
            assert!(ease(0.0).abs() < 1e-6);
            assert!((ease(1.0) - 1.0).abs() < 1e-6);
        }
        assert!((ease_in_out_cubic(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn gaussian_peaks_at_center() {
        assert_eq!(gaussian(1.0, 1.0, 0.3), 1.0);
        assert!(gaussian(2.0, 1.0, 0.3) < gaussian(1.5, 1.0, 0.3));
        assert!((spread_width(0.4, 0.25, 4.0) - 1.4).abs() < 1e-6);
    }

    #[test]
    fn zero_rate_never_fires() {
        assert_eq!(chance_within(0.0, 1.0), 0.0);
        assert!((chance_within(1.0, 0.016) - 1.0).abs() < 1e-6);
        assert!(chance_within(0.5, 1.0) > chance_within(0.5, 0.5));
    }

    #[test]
    fn collapse_holds_until_reset() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut collapse = BinaryCollapse::default();
        let first = collapse.resolve(&mut rng, 0.5);
        for _ in 0..100 {
            assert_eq!(collapse.resolve(&mut rng, 0.5), first);
        }
        collapse.reset();
        assert!(!collapse.is_resolved());
    }

    #[test]
    fn certain_and_impossible_draws() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let mut c = BinaryCollapse::default();
            assert_eq!(c.resolve(&mut rng, 0.0), Outcome::Secondary);
            let mut c = BinaryCollapse::default();
            assert_eq!(c.resolve(&mut rng, 1.0), Outcome::Primary);
        }
    }

    #[test]
    fn timeline_reports_zero_before_start() {
        let mut timeline = Timeline::new(2.0);
        assert_eq!(timeline.progress_at(5.0), 0.0);
        timeline.begin(1.0);
        assert!((timeline.progress_at(2.0) - 0.5).abs() < 1e-6);
        assert!(timeline.is_finished_at(3.0));
    }
}
