//! Colors, hex palettes and multi-stop interpolation.

use serde::{Deserialize, Serialize};

/// RGB color with channels in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> Self {
        c.to_hex()
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Rgb::from_hex(&s).ok_or_else(|| format!("invalid hex color '{s}'"))
    }
}

/// A color stop: position in [0, 1] mapped to a color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub t: f64,
    pub color: Rgb,
}

// Index palettes, low to high
pub const NDVI_PALETTE: [Rgb; 5] = [
    Rgb::new(0x8b, 0x00, 0x00),
    Rgb::new(0xff, 0x00, 0x00),
    Rgb::new(0xff, 0xff, 0x00),
    Rgb::new(0x00, 0xff, 0x00),
    Rgb::new(0x00, 0x64, 0x00),
];
pub const NDMI_PALETTE: [Rgb; 5] = [
    Rgb::new(0x7f, 0x3b, 0x08),
    Rgb::new(0xfd, 0xd4, 0x9e),
    Rgb::new(0xff, 0xff, 0xbf),
    Rgb::new(0xab, 0xd9, 0xe9),
    Rgb::new(0x2c, 0x7b, 0xb6),
];
pub const NDWI_PALETTE: [Rgb; 6] = [
    Rgb::new(0xff, 0xff, 0xb2),
    Rgb::new(0xfe, 0xd9, 0x76),
    Rgb::new(0xfe, 0xb2, 0x4c),
    Rgb::new(0xfd, 0x8d, 0x3c),
    Rgb::new(0xf0, 0x3b, 0x20),
    Rgb::new(0xbd, 0x00, 0x26),
];

/// Piecewise-linear color ramp over [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorRamp {
    stops: Vec<ColorStop>,
}

impl ColorRamp {
    /// Colors spread evenly over [0, 1]
    pub fn evenly_spaced(colors: &[Rgb]) -> Self {
        let last = colors.len().saturating_sub(1).max(1) as f64;
        let stops = colors
            .iter()
            .enumerate()
            .map(|(i, &color)| ColorStop {
                t: i as f64 / last,
                color,
            })
            .collect();
        Self { stops }
    }

    /// Evenly spaced ramp from `#rrggbb` strings, `None` if any fails to parse
    pub fn from_hex(palette: &[&str]) -> Option<Self> {
        let colors = palette
            .iter()
            .map(|h| Rgb::from_hex(h))
            .collect::<Option<Vec<_>>>()?;
        Some(Self::evenly_spaced(&colors))
    }

    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    /// Color at `t`, clamped to the end stops. An empty ramp is black.
    pub fn evaluate(&self, t: f64) -> Rgb {
        let (Some(first), Some(last)) = (self.stops.first(), self.stops.last()) else {
            return Rgb::new(0, 0, 0);
        };
        if t.is_nan() || t <= first.t {
            return first.color;
        }
        if t >= last.t {
            return last.color;
        }
        for pair in self.stops.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.t {
                let ratio = (t - a.t) / (b.t - a.t);
                return lerp_color(a.color, b.color, ratio);
            }
        }
        last.color
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_color(c1: Rgb, c2: Rgb, t: f64) -> Rgb {
    Rgb::new(
        lerp(c1.r as f64, c2.r as f64, t).round() as u8,
        lerp(c1.g as f64, c2.g as f64, t).round() as u8,
        lerp(c1.b as f64, c2.b as f64, t).round() as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing() {
        assert_eq!(Rgb::from_hex("#8b0000"), Some(Rgb::new(139, 0, 0)));
        assert_eq!(Rgb::from_hex("2c7bb6"), Some(Rgb::new(44, 123, 182)));
        assert_eq!(Rgb::from_hex("#fff"), None);
        assert_eq!(Rgb::from_hex("#gg0000"), None);
        assert_eq!(Rgb::new(253, 212, 158).to_hex(), "#fdd49e");
    }

    #[test]
    fn hex_ramp_matches_palette() {
        let ramp = ColorRamp::from_hex(&["#8b0000", "#ff0000", "#ffff00", "#00ff00", "#006400"])
            .unwrap();
        assert_eq!(ramp, ColorRamp::evenly_spaced(&NDVI_PALETTE));
        assert!(ColorRamp::from_hex(&["#8b0000", "red"]).is_none());
    }

    #[test]
    fn ramp_endpoints_and_clamping() {
        let ramp = ColorRamp::evenly_spaced(&NDVI_PALETTE);
        assert_eq!(ramp.evaluate(0.0), Rgb::new(139, 0, 0));
        assert_eq!(ramp.evaluate(1.0), Rgb::new(0, 100, 0));
        assert_eq!(ramp.evaluate(-3.0), Rgb::new(139, 0, 0));
        assert_eq!(ramp.evaluate(7.0), Rgb::new(0, 100, 0));
        // Middle stop is yellow
        assert_eq!(ramp.evaluate(0.5), Rgb::new(255, 255, 0));
    }

    #[test]
    fn ramp_interpolates_between_stops() {
        let ramp = ColorRamp::evenly_spaced(&[Rgb::new(0, 0, 0), Rgb::new(255, 255, 255)]);
        assert_eq!(ramp.evaluate(0.5), Rgb::new(128, 128, 128));
        assert_eq!(ramp.evaluate(0.25), Rgb::new(64, 64, 64));
    }

    #[test]
    fn degenerate_ramps() {
        assert_eq!(ColorRamp::evenly_spaced(&[]).evaluate(0.5), Rgb::new(0, 0, 0));
        let single = ColorRamp::evenly_spaced(&[Rgb::new(1, 2, 3)]);
        assert_eq!(single.evaluate(0.7), Rgb::new(1, 2, 3));
    }

    #[test]
    fn rgb_serializes_as_hex() {
        let json = serde_json::to_string(&Rgb::new(255, 0, 0)).unwrap();
        assert_eq!(json, "\"#ff0000\"");
        let back: Rgb = serde_json::from_str("\"#00ff00\"").unwrap();
        assert_eq!(back, Rgb::new(0, 255, 0));
        assert!(serde_json::from_str::<Rgb>("\"green\"").is_err());
    }
}
