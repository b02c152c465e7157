use serde::{Serialize, Serializer};

use crate::catalog::{is_standard_vocabulary, order_labels, CategoryLevel, Polarity};
use crate::filter::ValueRange;

/// A 24-bit color, serialized as a `#rrggbb` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().strip_prefix('#').unwrap_or(hex.trim());
        if hex.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self { r, g, b })
    }

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    fn lerp(a: Rgb, b: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let channel = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
        Rgb {
            r: channel(a.r, b.r),
            g: channel(a.g, b.g),
            b: channel(a.b, b.b),
        }
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

/// The red-yellow-green diverging ramp (ColorBrewer RdYlGn, nine classes).
/// Red marks the worse end, green the better end.
const RED_YELLOW_GREEN: [Rgb; 9] = [
    Rgb::new(0xd7, 0x30, 0x27),
    Rgb::new(0xf4, 0x6d, 0x43),
    Rgb::new(0xfd, 0xae, 0x61),
    Rgb::new(0xfe, 0xe0, 0x8b),
    Rgb::new(0xff, 0xff, 0xbf),
    Rgb::new(0xd9, 0xef, 0x8b),
    Rgb::new(0xa6, 0xd9, 0x6a),
    Rgb::new(0x66, 0xbd, 0x63),
    Rgb::new(0x1a, 0x98, 0x50),
];

/// Fixed colors for the standard five category levels, low to high rank.
const LEVEL_COLORS: [Rgb; 5] = [
    Rgb::new(0xd7, 0x30, 0x27),
    Rgb::new(0xf4, 0x6d, 0x43),
    Rgb::new(0xff, 0xff, 0xbf),
    Rgb::new(0xa6, 0xd9, 0x6a),
    Rgb::new(0x1a, 0x98, 0x50),
];

/// Fixed colors for the degenerate one-category case.
const SINGLE_GOOD: Rgb = Rgb::new(0x00, 0xcc, 0x00);
const SINGLE_BAD: Rgb = Rgb::new(0xcc, 0x00, 0x00);

/// One of the two fixed diverging scales. `RdYlGn` runs red (low) to
/// green (high) for higher-is-better indicators; `RdYlGn_r` is its
/// reversal, so green still means good when lower is better.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DivergingScale {
    pub name: &'static str,
    pub reversed: bool,
}

impl DivergingScale {
    pub fn for_polarity(polarity: Polarity) -> Self {
        match polarity {
            Polarity::HigherIsBetter => Self { name: "RdYlGn", reversed: false },
            Polarity::LowerIsBetter => Self { name: "RdYlGn_r", reversed: true },
        }
    }

    /// Color at position `t` in [0, 1] along the scale.
    pub fn color_at(&self, t: f64) -> Rgb {
        let mut t = t.clamp(0.0, 1.0);
        if self.reversed {
            t = 1.0 - t;
        }
        let segments = (RED_YELLOW_GREEN.len() - 1) as f64;
        let pos = t * segments;
        let lower = pos.floor() as usize;
        let upper = pos.ceil() as usize;
        if lower == upper {
            RED_YELLOW_GREEN[lower]
        } else {
            Rgb::lerp(RED_YELLOW_GREEN[lower], RED_YELLOW_GREEN[upper], pos - lower as f64)
        }
    }

    /// `k` evenly spaced colors across the scale, the discrete fallback
    /// for non-standard category sets. Requires `k >= 2`; the degenerate
    /// single-category case is handled by [`resolve_categorical`].
    pub fn sample(&self, k: usize) -> Vec<Rgb> {
        debug_assert!(k >= 2);
        (0..k)
            .map(|i| self.color_at(i as f64 / (k - 1) as f64))
            .collect()
    }
}

/// A category label paired with its resolved color.
#[derive(Debug, Clone, Serialize)]
pub struct LabelColor {
    pub label: String,
    pub color: Rgb,
}

/// Resolved color-scale descriptor handed to the renderer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColorScale {
    /// Continuous diverging ramp.
    Diverging(DivergingScale),
    /// Standard five-level vocabulary, fixed colors, vocabulary order.
    Levels { entries: Vec<LabelColor> },
    /// Non-standard label set: evenly sampled colors over the labels in
    /// alphabetical order (documented fallback), or the single fixed
    /// color when exactly one category is present.
    Discrete { entries: Vec<LabelColor> },
}

/// Scale for a continuous indicator of the given polarity.
pub fn resolve_continuous(polarity: Polarity) -> ColorScale {
    ColorScale::Diverging(DivergingScale::for_polarity(polarity))
}

/// Fixed color of a standard category level under the given polarity.
/// Green means good under both polarities: Very High is green when
/// higher is better and red when lower is better.
pub fn level_color(polarity: Polarity, level: CategoryLevel) -> Rgb {
    match polarity {
        Polarity::HigherIsBetter => LEVEL_COLORS[level.rank()],
        Polarity::LowerIsBetter => LEVEL_COLORS[LEVEL_COLORS.len() - 1 - level.rank()],
    }
}

/// Resolve a categorical indicator over the labels actually present.
pub fn resolve_categorical(polarity: Polarity, labels_present: &[String]) -> ColorScale {
    let ordered = order_labels(labels_present);
    if ordered.len() == 1 {
        let color = match polarity {
            Polarity::HigherIsBetter => SINGLE_GOOD,
            Polarity::LowerIsBetter => SINGLE_BAD,
        };
        return ColorScale::Discrete {
            entries: vec![LabelColor { label: ordered.into_iter().next().unwrap(), color }],
        };
    }
    if !ordered.is_empty() && is_standard_vocabulary(ordered.iter().map(String::as_str)) {
        let entries = ordered
            .into_iter()
            .map(|label| {
                let level = CategoryLevel::parse(&label).expect("standard vocabulary");
                LabelColor { label, color: level_color(polarity, level) }
            })
            .collect();
        return ColorScale::Levels { entries };
    }
    let scale = DivergingScale::for_polarity(polarity);
    let entries = if ordered.is_empty() {
        Vec::new()
    } else {
        let colors = scale.sample(ordered.len());
        ordered
            .into_iter()
            .zip(colors)
            .map(|(label, color)| LabelColor { label, color })
            .collect()
    };
    ColorScale::Discrete { entries }
}

/// Color of one continuous value within a range, polarity applied. A
/// degenerate range (min == max) resolves to the middle of the scale.
pub fn resolve_value(polarity: Polarity, value: f64, range: &ValueRange) -> Rgb {
    let scale = DivergingScale::for_polarity(polarity);
    let span = range.max - range.min;
    let t = if span > 0.0 { (value - range.min) / span } else { 0.5 };
    scale.color_at(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let c = Rgb::from_hex("#1a9850").unwrap();
        assert_eq!(c, Rgb::new(0x1a, 0x98, 0x50));
        assert_eq!(c.hex(), "#1a9850");
        assert!(Rgb::from_hex("nope").is_none());
        assert!(Rgb::from_hex("#12345").is_none());
    }

    #[test]
    fn polarity_picks_the_scale_direction() {
        let higher = DivergingScale::for_polarity(Polarity::HigherIsBetter);
        assert_eq!(higher.name, "RdYlGn");
        // Low end red, high end green.
        assert_eq!(higher.color_at(0.0), RED_YELLOW_GREEN[0]);
        assert_eq!(higher.color_at(1.0), RED_YELLOW_GREEN[8]);

        let lower = DivergingScale::for_polarity(Polarity::LowerIsBetter);
        assert_eq!(lower.name, "RdYlGn_r");
        assert_eq!(lower.color_at(0.0), RED_YELLOW_GREEN[8]);
        assert_eq!(lower.color_at(1.0), RED_YELLOW_GREEN[0]);
    }

    #[test]
    fn high_value_of_good_indicator_lands_near_green() {
        let range = ValueRange { min: 10.33, max: 195.55 };
        let luxembourg = resolve_value(Polarity::HigherIsBetter, 195.55, &range);
        // Green channel dominates at the better end.
        assert!(luxembourg.g > luxembourg.r);
        let uganda = resolve_value(Polarity::HigherIsBetter, 10.33, &range);
        assert!(uganda.r > uganda.g);
    }

    #[test]
    fn degenerate_range_resolves_to_scale_midpoint() {
        let range = ValueRange { min: 50.0, max: 50.0 };
        let c = resolve_value(Polarity::HigherIsBetter, 50.0, &range);
        assert_eq!(c, DivergingScale::for_polarity(Polarity::HigherIsBetter).color_at(0.5));
    }

    #[test]
    fn standard_levels_get_fixed_colors_in_vocabulary_order() {
        let labels = vec!["High".to_string(), "Very Low".to_string()];
        let scale = resolve_categorical(Polarity::HigherIsBetter, &labels);
        match scale {
            ColorScale::Levels { entries } => {
                assert_eq!(entries.len(), 2);
                // Vocabulary order, not alphabetical: Very Low first.
                assert_eq!(entries[0].label, "Very Low");
                assert_eq!(entries[0].color.hex(), "#d73027");
                assert_eq!(entries[1].label, "High");
                assert_eq!(entries[1].color.hex(), "#a6d96a");
            }
            other => panic!("expected Levels, got {:?}", other),
        }
    }

    #[test]
    fn level_colors_keep_green_meaning_good_under_both_polarities() {
        assert_eq!(
            level_color(Polarity::HigherIsBetter, CategoryLevel::VeryHigh),
            Rgb::from_hex("#1a9850").unwrap()
        );
        assert_eq!(
            level_color(Polarity::LowerIsBetter, CategoryLevel::VeryLow),
            Rgb::from_hex("#1a9850").unwrap()
        );
        assert_eq!(
            level_color(Polarity::LowerIsBetter, CategoryLevel::VeryHigh),
            Rgb::from_hex("#d73027").unwrap()
        );
    }

    #[test]
    fn nonstandard_labels_sample_the_ramp_alphabetically() {
        let labels = vec![
            "Tropical".to_string(),
            "Arid".to_string(),
            "Temperate".to_string(),
        ];
        let scale = resolve_categorical(Polarity::HigherIsBetter, &labels);
        match scale {
            ColorScale::Discrete { entries } => {
                let names: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
                assert_eq!(names, ["Arid", "Temperate", "Tropical"]);
                assert_eq!(entries[0].color, RED_YELLOW_GREEN[0]);
                assert_eq!(entries[2].color, RED_YELLOW_GREEN[8]);
            }
            other => panic!("expected Discrete, got {:?}", other),
        }
    }

    #[test]
    fn single_category_resolves_to_one_fixed_color() {
        let labels = vec!["Moderate".to_string()];
        match resolve_categorical(Polarity::HigherIsBetter, &labels) {
            ColorScale::Discrete { entries } => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].color, SINGLE_GOOD);
            }
            other => panic!("expected Discrete, got {:?}", other),
        }
        match resolve_categorical(Polarity::LowerIsBetter, &labels) {
            ColorScale::Discrete { entries } => assert_eq!(entries[0].color, SINGLE_BAD),
            other => panic!("expected Discrete, got {:?}", other),
        }
    }
}
