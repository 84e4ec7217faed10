//! Display parameters for each exported product.

use serde::{Deserialize, Serialize};

use crate::scheme::{ColorRamp, Rgb, NDMI_PALETTE, NDVI_PALETTE, NDWI_PALETTE};

/// How a product is turned into colors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Visualization {
    /// Single band mapped through a color ramp over `[min, max]`
    Ramp { min: f64, max: f64, ramp: ColorRamp },
    /// Three bands (red, green, blue) linearly stretched from `[min, max]` to 0..=255
    Stretch { min: f64, max: f64 },
}

impl Visualization {
    pub fn ndvi() -> Self {
        Self::ramp(-0.2, 0.8, &NDVI_PALETTE)
    }

    pub fn ndmi() -> Self {
        Self::ramp(-0.2, 0.8, &NDMI_PALETTE)
    }

    pub fn ndwi() -> Self {
        Self::ramp(-1.0, 1.0, &NDWI_PALETTE)
    }

    /// True color over surface reflectance
    pub fn true_color() -> Self {
        Self::Stretch { min: 0.0, max: 0.3 }
    }

    fn ramp(min: f64, max: f64, palette: &[Rgb]) -> Self {
        Self::Ramp {
            min,
            max,
            ramp: ColorRamp::evenly_spaced(palette),
        }
    }

    /// Number of input bands this visualization consumes
    pub fn band_count(&self) -> usize {
        match self {
            Self::Ramp { .. } => 1,
            Self::Stretch { .. } => 3,
        }
    }

    pub fn range(&self) -> (f64, f64) {
        match *self {
            Self::Ramp { min, max, .. } | Self::Stretch { min, max } => (min, max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_ranges() {
        assert_eq!(Visualization::ndvi().range(), (-0.2, 0.8));
        assert_eq!(Visualization::ndmi().range(), (-0.2, 0.8));
        assert_eq!(Visualization::ndwi().range(), (-1.0, 1.0));
        assert_eq!(Visualization::true_color().range(), (0.0, 0.3));
        assert_eq!(Visualization::true_color().band_count(), 3);
        assert_eq!(Visualization::ndwi().band_count(), 1);
    }

    #[test]
    fn ndwi_ramp_ends() {
        let Visualization::Ramp { ramp, .. } = Visualization::ndwi() else {
            panic!("expected ramp");
        };
        assert_eq!(ramp.stops().len(), 6);
        assert_eq!(ramp.evaluate(0.0), Rgb::new(0xff, 0xff, 0xb2));
        assert_eq!(ramp.evaluate(1.0), Rgb::new(0xbd, 0x00, 0x26));
    }

    #[test]
    fn serializes_tagged() {
        let json = serde_json::to_value(Visualization::true_color()).unwrap();
        assert_eq!(json["kind"], "stretch");
        assert_eq!(json["max"], 0.3);
    }
}
