//! Brush radius shown under the pointer before a spawn

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::Viewport;

/// Growth per tick while the pointer is held down
pub const PREVIEW_GROW_SPEED: f32 = 7.0;
/// Idle preview radius range
pub const PREVIEW_MIN: f32 = 100.0;
pub const PREVIEW_IDLE_SPREAD: f32 = 50.0;
/// Lower clamp when adjusting with the wheel
pub const PREVIEW_WHEEL_MIN: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadiusPreview {
    pub radius: f32,
}

impl Default for RadiusPreview {
    fn default() -> Self {
        Self {
            radius: PREVIEW_MIN,
        }
    }
}

impl RadiusPreview {
    /// Advance one tick: grow while pressed, otherwise shimmer around the idle size
    pub fn update<R: Rng>(&mut self, pressed: bool, viewport: &Viewport, rng: &mut R) -> f32 {
        if pressed {
            self.radius += PREVIEW_GROW_SPEED;
        } else {
            self.radius = PREVIEW_MIN + rng.random_range(0.0..PREVIEW_IDLE_SPREAD);
        }
        let max = ((viewport.width + viewport.height) / 6.0).max(PREVIEW_MIN);
        self.radius = self.radius.clamp(PREVIEW_MIN, max);
        self.radius
    }

    /// Mouse wheel adjustment
    pub fn scroll(&mut self, delta: f32, viewport: &Viewport) -> f32 {
        let max = ((viewport.width + viewport.height) / 4.0).max(PREVIEW_WHEEL_MIN);
        self.radius = (self.radius + delta * 2.0).clamp(PREVIEW_WHEEL_MIN, max);
        self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_grows_while_pressed_up_to_cap() {
        let vp = Viewport::new(600.0, 600.0);
        let mut rng = Pcg32::seed_from_u64(1);
        let mut preview = RadiusPreview::default();
        assert_eq!(preview.update(true, &vp, &mut rng), 107.0);
        for _ in 0..100 {
            preview.update(true, &vp, &mut rng);
        }
        assert_eq!(preview.radius, 200.0);
    }

    #[test]
    fn test_idle_stays_in_band() {
        let vp = Viewport::new(1280.0, 720.0);
        let mut rng = Pcg32::seed_from_u64(2);
        let mut preview = RadiusPreview::default();
        for _ in 0..50 {
            let r = preview.update(false, &vp, &mut rng);
            assert!((PREVIEW_MIN..PREVIEW_MIN + PREVIEW_IDLE_SPREAD).contains(&r));
        }
    }

    #[test]
    fn test_scroll_clamps() {
        let vp = Viewport::new(400.0, 400.0);
        let mut preview = RadiusPreview::default();
        assert_eq!(preview.scroll(-100.0, &vp), 50.0);
        assert_eq!(preview.scroll(1000.0, &vp), 200.0);
    }
}
