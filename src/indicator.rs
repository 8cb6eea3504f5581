//! Segmented level indicator shown under the popup icon.

use crate::status::StatusModel;

/// Number of filled segments for `value` on a bar of `levels` segments.
///
/// The value is clamped to `[0, 1]` and warped by `v^(1/exponent)` so device
/// scales that are perceptually non-linear fill the bar evenly. A
/// non-positive exponent is treated as linear.
pub fn filled_segments(levels: u32, value: f64, exponent: f64) -> u32 {
    if levels == 0 {
        return 0;
    }

    let level = if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    };
    let warped = if exponent > 0.0 {
        level.powf(exponent.recip())
    } else {
        level
    };

    // Truncation is the point: partially reached segments stay empty.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let filled = (f64::from(levels) * warped).floor() as u32;
    filled.min(levels)
}

/// Whether `value` is past the top of the scale.
pub fn is_warning(value: f64) -> bool {
    value > 1.0
}

/// Current indicator state for a model.
#[derive(Debug, Clone, PartialEq)]
pub struct Indicator {
    pub name: String,
    pub icon: Option<String>,
    pub levels: u32,
    pub filled: u32,
    pub warning: bool,
    pub value: f64,
}

impl Indicator {
    /// Compute the indicator for the model's current state.
    pub fn from_model(model: &StatusModel) -> Self {
        let snapshot = model.snapshot();
        Self {
            name: model.name().to_string(),
            icon: snapshot.icon.map(|i| i.as_str().to_string()),
            levels: model.levels(),
            filled: filled_segments(model.levels(), snapshot.value, model.exponent()),
            warning: is_warning(snapshot.value),
            value: snapshot.value,
        }
    }

    /// One-line text rendering, e.g. `pulse [#####-----] 50% audio-volume-medium-symbolic`.
    pub fn render(&self) -> String {
        let icon = self.icon.as_deref().unwrap_or("-");
        if self.levels == 0 {
            return format!("{} {}", self.name, icon);
        }

        let fill = if self.warning { '!' } else { '#' };
        let bar: String = (0..self.levels)
            .map(|i| if i < self.filled { fill } else { '-' })
            .collect();

        format!(
            "{} [{}] {:.0}% {}",
            self.name,
            bar,
            self.value * 100.0,
            icon
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Icon;

    #[test]
    fn test_linear_segments() {
        assert_eq!(filled_segments(10, 0.0, 1.0), 0);
        assert_eq!(filled_segments(10, 0.5, 1.0), 5);
        assert_eq!(filled_segments(10, 0.99, 1.0), 9);
        assert_eq!(filled_segments(10, 1.0, 1.0), 10);
    }

    #[test]
    fn test_exponent_warp() {
        // 128/255 with a square-root curve on 16 segments.
        let value = 128.0 / 255.0;
        assert_eq!(filled_segments(16, value, 2.0), 11);
    }

    #[test]
    fn test_segments_clamped() {
        assert_eq!(filled_segments(8, 1.5, 1.0), 8);
        assert_eq!(filled_segments(8, -0.2, 1.0), 0);
        assert_eq!(filled_segments(8, f64::NAN, 1.0), 0);
        assert_eq!(filled_segments(0, 0.7, 1.0), 0);
    }

    #[test]
    fn test_segments_monotonic() {
        for exponent in [0.5, 1.0, 2.0, 3.3] {
            let mut previous = 0;
            for step in 0..=1000 {
                let value = f64::from(step) / 1000.0;
                let filled = filled_segments(16, value, exponent);
                assert!(filled >= previous, "not monotonic at {value} (exp {exponent})");
                previous = filled;
            }
        }
    }

    #[test]
    fn test_warning() {
        assert!(!is_warning(1.0));
        assert!(is_warning(1.01));
    }

    #[test]
    fn test_render() {
        let model = StatusModel::new("pulse", 10);
        model.set_value(0.5);
        model.set_icon(Icon::themed("audio-volume-medium-symbolic"));

        let indicator = Indicator::from_model(&model);
        assert_eq!(
            indicator.render(),
            "pulse [#####-----] 50% audio-volume-medium-symbolic"
        );
    }

    #[test]
    fn test_render_over_range() {
        let model = StatusModel::new("pulse", 4);
        model.set_value(1.2);

        let indicator = Indicator::from_model(&model);
        assert!(indicator.warning);
        assert_eq!(indicator.render(), "pulse [!!!!] 120% -");
    }

    #[test]
    fn test_render_without_levels() {
        let model = StatusModel::new("ac", 0);
        model.set_icon(Icon::with_default_fallbacks("battery-level-80-charging-symbolic"));
        assert_eq!(
            Indicator::from_model(&model).render(),
            "ac battery-level-80-charging-symbolic"
        );
    }
}
