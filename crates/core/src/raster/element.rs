//! Raster element trait for generic cell values

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Types that can be stored in a raster cell.
///
/// Scene bands arrive as integer digital numbers and are carried through the
/// pipeline as floats, where NaN is the no-data sentinel.
pub trait RasterElement:
    Copy + Debug + PartialOrd + NumCast + Zero + Send + Sync + 'static
{
    /// Default no-data value for this type
    fn default_nodata() -> Option<Self>;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    /// Convert from f64, `None` if out of range
    fn from_f64(value: f64) -> Option<Self> {
        NumCast::from(value)
    }
}

macro_rules! impl_raster_element_int {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Option<Self> {
                None
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata.is_some_and(|nd| *self == nd)
            }
        }
    )*};
}

macro_rules! impl_raster_element_float {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Option<Self> {
                Some(<$t>::NAN)
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) if nd.is_nan() => false,
                    Some(nd) => (self - nd).abs() < <$t>::EPSILON * 100.0,
                    None => false,
                }
            }
        }
    )*};
}

impl_raster_element_int!(u8, u16, u32, i16, i32);
impl_raster_element_float!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_always_nodata() {
        assert!(f64::NAN.is_nodata(None));
        assert!(f32::NAN.is_nodata(Some(0.0)));
        assert!(!1.0f64.is_nodata(Some(f64::NAN)));
    }

    #[test]
    fn integer_nodata_matches_exactly() {
        assert!(0u16.is_nodata(Some(0)));
        assert!(!1u16.is_nodata(Some(0)));
        assert!(!0u16.is_nodata(None));
    }
}
