//! Complex probability amplitudes and phase coloring

use std::f32::consts::PI;

/// Complex number representation for amplitudes
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Complex {
    pub re: f32,
    pub im: f32,
}

impl Complex {
    /// r * e^(i*theta)
    pub fn from_polar(r: f32, theta: f32) -> Self {
        Self {
            re: r * theta.cos(),
            im: r * theta.sin(),
        }
    }

    /// |z|^2 = probability density
    pub fn norm_sq(&self) -> f32 {
        self.re * self.re + self.im * self.im
    }

    pub fn norm(&self) -> f32 {
        self.norm_sq().sqrt()
    }

    pub fn arg(&self) -> f32 {
        self.im.atan2(self.re)
    }
}

/// Hue from phase angle, brightness from amplitude
pub fn phase_color(amplitude: Complex, alpha: f32) -> [f32; 4] {
    let hue = (amplitude.arg() + PI) / (2.0 * PI);
    let (r, g, b) = hsv_to_rgb(hue, 0.85, 1.0);
    [r, g, b, alpha]
}

pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let h = h.rem_euclid(1.0) * 6.0;
    let i = h.floor() as i32;
    let f = h - i as f32;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match i % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polar_round_trip_keeps_magnitude() {
        let z = Complex::from_polar(2.0, 0.7);
        assert!((z.norm() - 2.0).abs() < 1e-5);
        assert!((z.arg() - 0.7).abs() < 1e-5);
    }

    #[test]
    fn phase_sets_hue_and_alpha_passes_through() {
        // arg = π maps to hue 1.0, which wraps to red
        let color = phase_color(Complex::from_polar(0.5, PI), 0.4);
        assert!((color[0] - 1.0).abs() < 1e-5);
        assert!((color[3] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn primary_hues() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), (1.0, 0.0, 0.0));
        let (r, g, b) = hsv_to_rgb(1.0 / 3.0, 1.0, 1.0);
        assert!(r < 1e-5 && (g - 1.0).abs() < 1e-5 && b < 1e-5);
    }
}
