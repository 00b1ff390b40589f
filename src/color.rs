//! Swatch generation for the tag color picker and the proportional band
//! layout that paints each calendar day.

use crate::model::TagRegistry;
use rand::Rng;
use std::fmt;
use std::str::FromStr;

pub const SWATCH_COUNT: usize = 8;
pub const MIN_BAND_PCT: f64 = 5.0;

pub const ETCHED_CSS: &str = "repeating-linear-gradient(45deg, rgba(26, 15, 10, 0.05) 0px, rgba(26, 15, 10, 0.05) 2px, transparent 2px, transparent 8px)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HueBucket {
    Any,
    Red,
    Orange,
    Yellow,
    Green,
    Cyan,
    Blue,
    Purple,
    Pink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Bold,
    Medium,
    Whisper,
    Mixed,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HexError {
    #[error("Please enter a valid hex code (e.g. #FF5500 or #F50)")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BandFill {
    Color(String),
    Transparent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub fill: BandFill,
    pub start: f64,
    pub end: f64,
}

/// How a day cell's paper background is drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Etched,
    Bands(Vec<Band>),
}

impl HueBucket {
    pub const ALL: [HueBucket; 9] = [
        HueBucket::Any,
        HueBucket::Red,
        HueBucket::Orange,
        HueBucket::Yellow,
        HueBucket::Green,
        HueBucket::Cyan,
        HueBucket::Blue,
        HueBucket::Purple,
        HueBucket::Pink,
    ];

    fn ranges(&self) -> &'static [(u32, u32)] {
        match self {
            HueBucket::Any => &[(0, 360)],
            HueBucket::Red => &[(0, 15), (345, 360)],
            HueBucket::Orange => &[(15, 45)],
            HueBucket::Yellow => &[(45, 75)],
            HueBucket::Green => &[(75, 165)],
            HueBucket::Cyan => &[(165, 195)],
            HueBucket::Blue => &[(195, 255)],
            HueBucket::Purple => &[(255, 285)],
            HueBucket::Pink => &[(285, 345)],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HueBucket::Any => "any",
            HueBucket::Red => "red",
            HueBucket::Orange => "orange",
            HueBucket::Yellow => "yellow",
            HueBucket::Green => "green",
            HueBucket::Cyan => "cyan",
            HueBucket::Blue => "blue",
            HueBucket::Purple => "purple",
            HueBucket::Pink => "pink",
        }
    }

    pub fn next(&self) -> HueBucket {
        let idx = Self::ALL.iter().position(|b| b == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Mixed, Tier::Bold, Tier::Medium, Tier::Whisper];

    const FIXED: [(f64, f64); 3] = [(85.0, 75.0), (65.0, 85.0), (45.0, 93.0)];

    /// Base (saturation, lightness). `Mixed` draws one of the fixed tiers.
    fn base<R: Rng + ?Sized>(&self, rng: &mut R) -> (f64, f64) {
        match self {
            Tier::Bold => Self::FIXED[0],
            Tier::Medium => Self::FIXED[1],
            Tier::Whisper => Self::FIXED[2],
            Tier::Mixed => Self::FIXED[rng.gen_range(0..Self::FIXED.len())],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::Bold => "bold",
            Tier::Medium => "medium",
            Tier::Whisper => "whisper",
            Tier::Mixed => "mixed",
        }
    }

    pub fn next(&self) -> Tier {
        let idx = Self::ALL.iter().position(|t| t == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl FromStr for HueBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        HueBucket::ALL
            .iter()
            .copied()
            .find(|b| b.label() == lowered)
            .ok_or_else(|| format!("unknown hue: {}", s))
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Tier::ALL
            .iter()
            .copied()
            .find(|t| t.label() == lowered)
            .ok_or_else(|| format!("unknown tier: {}", s))
    }
}

impl fmt::Display for HueBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn hue_for_bucket<R: Rng + ?Sized>(bucket: HueBucket, rng: &mut R) -> u32 {
    let ranges = bucket.ranges();
    let (lo, hi) = ranges[rng.gen_range(0..ranges.len())];
    rng.gen_range(lo..hi)
}

pub fn random_swatch<R: Rng + ?Sized>(tier: Tier, hue: u32, rng: &mut R) -> String {
    let (s, l) = tier.base(rng);
    let s = (s + rng.gen_range(-5.0..5.0)).clamp(20.0, 100.0);
    let l = (l + rng.gen_range(-3.0..3.0)).clamp(20.0, 98.0);
    hsl_to_hex(hue as f64, s, l)
}

/// One picker's worth of swatches. Duplicates are possible.
pub fn swatches<R: Rng + ?Sized>(tier: Tier, bucket: HueBucket, rng: &mut R) -> Vec<String> {
    (0..SWATCH_COUNT)
        .map(|_| {
            let hue = hue_for_bucket(bucket, rng);
            random_swatch(tier, hue, rng)
        })
        .collect()
}

/// `h` in degrees, `s` and `l` in percent.
pub fn hsl_to_hex(h: f64, s: f64, l: f64) -> String {
    let l = l / 100.0;
    let a = s * l.min(1.0 - l) / 100.0;
    let channel = |n: f64| -> u8 {
        let k = (n + h / 30.0) % 12.0;
        let color = l - a * (k - 3.0).min(9.0 - k).min(1.0).max(-1.0);
        (255.0 * color).round().clamp(0.0, 255.0) as u8
    };
    format!("#{:02X}{:02X}{:02X}", channel(0.0), channel(8.0), channel(4.0))
}

/// Accepts `abc`, `#abc`, `aabbcc` or `#aabbcc` in any case and returns the
/// six-digit uppercase form.
pub fn validate_hex(input: &str) -> Result<String, HexError> {
    let trimmed = input.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(HexError::Invalid(input.to_string()));
    }
    let expanded = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect::<String>(),
        6 => digits.to_string(),
        _ => return Err(HexError::Invalid(input.to_string())),
    };
    Ok(format!("#{}", expanded.to_uppercase()))
}

pub fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let canonical = validate_hex(hex).ok()?;
    let r = u8::from_str_radix(&canonical[1..3], 16).ok()?;
    let g = u8::from_str_radix(&canonical[3..5], 16).ok()?;
    let b = u8::from_str_radix(&canonical[5..7], 16).ok()?;
    Some((r, g, b))
}

/// Lays out a day's active tags as stacked bands. Every universe member
/// reserves `MIN_BAND_PCT` (or an equal share when that would overflow) and
/// the remainder is split by squared priority. Only active tags are drawn,
/// highest priority first, starting at 0%.
pub fn compute_gradient(active: &[String], universe: &TagRegistry) -> Paint {
    let mut tags: Vec<(&str, &crate::model::TagInfo)> = active
        .iter()
        .filter_map(|name| universe.get(name).map(|info| (name.as_str(), info)))
        .collect();
    if tags.is_empty() {
        return Paint::Etched;
    }

    let n = universe.len() as f64;
    let mut min_pct = MIN_BAND_PCT;
    let mut usable = 100.0 - n * min_pct;
    if usable < 0.0 {
        min_pct = 100.0 / n;
        usable = 0.0;
    }
    let total_weight: f64 = universe.iter().map(|(_, t)| weight(t.priority)).sum();
    let width = |priority: i64| -> f64 {
        let share = if total_weight > 0.0 {
            weight(priority) / total_weight
        } else {
            0.0
        };
        min_pct + share * usable
    };

    tags.sort_by(|a, b| b.1.priority.cmp(&a.1.priority));
    let mut bands = Vec::with_capacity(tags.len() + 1);
    let mut current = 0.0;
    for (_, info) in tags {
        let end = current + width(info.priority);
        bands.push(Band {
            fill: BandFill::Color(info.color.clone()),
            start: current,
            end,
        });
        current = end;
    }
    if current < 99.9 {
        bands.push(Band {
            fill: BandFill::Transparent,
            start: current,
            end: 100.0,
        });
    }
    Paint::Bands(bands)
}

fn weight(priority: i64) -> f64 {
    (priority as f64).powi(2)
}

impl Paint {
    pub fn to_css(&self) -> String {
        match self {
            Paint::Etched => ETCHED_CSS.to_string(),
            Paint::Bands(bands) => {
                let stops: Vec<String> = bands
                    .iter()
                    .flat_map(|band| {
                        let color = match &band.fill {
                            BandFill::Color(c) => c.as_str(),
                            BandFill::Transparent => "transparent",
                        };
                        [
                            format!("{} {}%", color, band.start),
                            format!("{} {}%", color, band.end),
                        ]
                    })
                    .collect();
                format!("linear-gradient(to top, {}), {}", stops.join(", "), ETCHED_CSS)
            }
        }
    }

    /// Color drawn at `pct` measured from the bottom of the cell.
    pub fn fill_at(&self, pct: f64) -> Option<&str> {
        match self {
            Paint::Etched => None,
            Paint::Bands(bands) => bands
                .iter()
                .find(|b| pct >= b.start && pct < b.end)
                .and_then(|b| match &b.fill {
                    BandFill::Color(c) => Some(c.as_str()),
                    BandFill::Transparent => None,
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TagInfo;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn universe(entries: &[(&str, i64)]) -> TagRegistry {
        TagRegistry::new(
            entries
                .iter()
                .map(|(name, priority)| {
                    (
                        name.to_string(),
                        TagInfo {
                            color: format!("#{}", name.to_uppercase()),
                            priority: *priority,
                        },
                    )
                })
                .collect(),
        )
    }

    fn widths(paint: &Paint) -> Vec<f64> {
        match paint {
            Paint::Bands(bands) => bands.iter().map(|b| b.end - b.start).collect(),
            Paint::Etched => panic!("expected bands"),
        }
    }

    #[test]
    fn three_digit_hex_doubles_each_nibble() {
        assert_eq!(validate_hex("F50").unwrap(), "#FF5500");
        assert_eq!(validate_hex("#abc").unwrap(), "#AABBCC");
        assert_eq!(validate_hex("  #a1b2c3 ").unwrap(), "#A1B2C3");
        assert_eq!(validate_hex("a1b2c3").unwrap(), "#A1B2C3");
    }

    #[test]
    fn invalid_hex_is_rejected() {
        for bad in ["", "#", "ab", "abcd", "#12345", "1234567", "#ggg", "##abc", "red"] {
            assert!(validate_hex(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn hsl_conversion_matches_primaries() {
        assert_eq!(hsl_to_hex(0.0, 100.0, 50.0), "#FF0000");
        assert_eq!(hsl_to_hex(120.0, 100.0, 50.0), "#00FF00");
        assert_eq!(hsl_to_hex(240.0, 100.0, 50.0), "#0000FF");
        assert_eq!(hsl_to_hex(0.0, 0.0, 100.0), "#FFFFFF");
    }

    #[test]
    fn hue_stays_inside_bucket() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let red = hue_for_bucket(HueBucket::Red, &mut rng);
            assert!(red < 15 || (345..360).contains(&red), "red hue {red}");
            let blue = hue_for_bucket(HueBucket::Blue, &mut rng);
            assert!((195..255).contains(&blue));
            assert!(hue_for_bucket(HueBucket::Any, &mut rng) < 360);
        }
    }

    #[test]
    fn swatches_are_valid_hex() {
        let mut rng = StdRng::seed_from_u64(42);
        for tier in Tier::ALL {
            let out = swatches(tier, HueBucket::Green, &mut rng);
            assert_eq!(out.len(), SWATCH_COUNT);
            for hex in out {
                assert_eq!(validate_hex(&hex).unwrap(), hex);
            }
        }
    }

    #[test]
    fn equal_priorities_share_pool_evenly() {
        let uni = universe(&[("aa", 2), ("bb", 2), ("cc", 2), ("dd", 2)]);
        let active: Vec<String> = vec!["aa".into(), "bb".into(), "cc".into(), "dd".into()];
        let paint = compute_gradient(&active, &uni);
        let expected = MIN_BAND_PCT + (100.0 - 4.0 * MIN_BAND_PCT) / 4.0;
        let w = widths(&paint);
        assert_eq!(w.len(), 4);
        for width in &w {
            assert!((width - expected).abs() < 1e-9);
        }
        assert!((w.iter().sum::<f64>() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn partial_activity_gets_transparent_filler() {
        let uni = universe(&[("aa", 1), ("bb", 1), ("cc", 1)]);
        let paint = compute_gradient(&["bb".to_string()], &uni);
        match &paint {
            Paint::Bands(bands) => {
                assert_eq!(bands.len(), 2);
                assert_eq!(bands[1].fill, BandFill::Transparent);
                assert!((bands[1].end - 100.0).abs() < 1e-9);
            }
            Paint::Etched => panic!("expected bands"),
        }
        assert!((widths(&paint).iter().sum::<f64>() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn oversized_universe_degrades_to_equal_bands() {
        let names: Vec<String> = (0..25).map(|i| format!("t{i:02}")).collect();
        let entries: Vec<(&str, i64)> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i as i64 + 1))
            .collect();
        let uni = universe(&entries);
        let paint = compute_gradient(&names, &uni);
        for width in widths(&paint) {
            assert!((width - 4.0).abs() < 1e-9);
        }
    }

    #[test]
    fn bands_are_drawn_highest_priority_first() {
        let uni = universe(&[("aa", 1), ("bb", 3)]);
        let paint = compute_gradient(&["aa".to_string(), "bb".to_string()], &uni);
        match paint {
            Paint::Bands(bands) => {
                assert_eq!(bands[0].fill, BandFill::Color("#BB".into()));
                assert_eq!(bands[0].start, 0.0);
                // 5 + 90 * 9/10
                assert!((bands[0].end - 86.0).abs() < 1e-9);
                assert_eq!(bands[1].fill, BandFill::Color("#AA".into()));
            }
            Paint::Etched => panic!("expected bands"),
        }
    }

    #[test]
    fn zero_weight_universe_uses_minimum_only() {
        let uni = universe(&[("aa", 0), ("bb", 0)]);
        let w = widths(&compute_gradient(&["aa".to_string()], &uni));
        assert!((w[0] - MIN_BAND_PCT).abs() < 1e-9);
    }

    #[test]
    fn unknown_tags_render_etched() {
        let uni = universe(&[("aa", 1)]);
        assert_eq!(compute_gradient(&["zz".to_string()], &uni), Paint::Etched);
        assert_eq!(compute_gradient(&[], &uni), Paint::Etched);
        assert_eq!(Paint::Etched.to_css(), ETCHED_CSS);
    }

    #[test]
    fn fill_at_walks_bands_from_bottom() {
        let uni = universe(&[("aa", 1), ("bb", 1)]);
        let paint = compute_gradient(&["aa".to_string()], &uni);
        assert_eq!(paint.fill_at(10.0), Some("#AA"));
        assert_eq!(paint.fill_at(90.0), None);
        assert!(paint.to_css().starts_with("linear-gradient(to top, #AA 0%"));
    }
}
