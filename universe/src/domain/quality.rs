// Render quality presets and the frame-interval throttle.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityPreset {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lighting {
    /// Unlit colors plus a flat ambient term.
    Basic,
    /// Ambient + directional light with emissive highlights.
    Standard,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualitySettings {
    pub preset: QualityPreset,
    pub pixel_ratio: f32,
    pub shadows: bool,
    pub fog: bool,
    pub lighting: Lighting,
    pub frame_interval: Duration,
}

impl QualitySettings {
    pub fn for_preset(preset: QualityPreset) -> Self {
        match preset {
            QualityPreset::Low => Self {
                preset,
                pixel_ratio: 0.75,
                shadows: false,
                fog: false,
                lighting: Lighting::Basic,
                frame_interval: Duration::from_micros(1_000_000 / 30),
            },
            QualityPreset::Medium => Self {
                preset,
                pixel_ratio: 1.0,
                shadows: false,
                fog: true,
                lighting: Lighting::Standard,
                frame_interval: Duration::from_micros(1_000_000 / 45),
            },
            QualityPreset::High => Self {
                preset,
                pixel_ratio: 1.5,
                shadows: true,
                fog: true,
                lighting: Lighting::Standard,
                frame_interval: Duration::from_micros(1_000_000 / 60),
            },
        }
    }
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self::for_preset(QualityPreset::Medium)
    }
}

/// Skips frames requested before the target interval has elapsed.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    interval: Duration,
    last: Option<Duration>,
}

impl FrameThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// `now` is a monotonic timestamp. Returns the elapsed time since the last
    /// accepted frame, or None when the frame should be skipped.
    pub fn accept(&mut self, now: Duration) -> Option<Duration> {
        match self.last {
            None => {
                self.last = Some(now);
                Some(Duration::ZERO)
            }
            Some(last) => {
                let elapsed = now.saturating_sub(last);
                if elapsed < self.interval {
                    return None;
                }
                self.last = Some(now);
                Some(elapsed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_skips_early_frames() {
        let mut throttle = FrameThrottle::new(Duration::from_millis(20));
        assert_eq!(throttle.accept(Duration::from_millis(100)), Some(Duration::ZERO));
        assert_eq!(throttle.accept(Duration::from_millis(110)), None);
        assert_eq!(
            throttle.accept(Duration::from_millis(121)),
            Some(Duration::from_millis(21))
        );
    }

    #[test]
    fn presets_scale_cost_monotonically() {
        let low = QualitySettings::for_preset(QualityPreset::Low);
        let high = QualitySettings::for_preset(QualityPreset::High);
        assert!(low.pixel_ratio < high.pixel_ratio);
        assert!(low.frame_interval > high.frame_interval);
        assert!(!low.shadows && high.shadows);
    }
}
