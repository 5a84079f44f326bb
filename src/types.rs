use fixed::types::I32F32;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Pt(I32F32);

impl Pt {
    pub const ZERO: Pt = Pt(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Pt {
        if !value.is_finite() {
            return Pt::ZERO;
        }
        let milli = (value as f64 * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Pt::from_milli_i64(milli)
    }

    pub fn from_i32(value: i32) -> Pt {
        Pt::from_milli_i64((value as i64) * 1000)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_milli_i64(self) -> i64 {
        let bits = self.0.to_bits() as i128;
        let denom = 1i128 << 32;
        let scaled = bits * 1000;
        let adj = if scaled >= 0 { denom / 2 } else { -denom / 2 };
        let milli = (scaled + adj) / denom;
        milli.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn max(self, other: Pt) -> Pt {
        if self >= other { self } else { other }
    }

    pub fn min(self, other: Pt) -> Pt {
        if self <= other { self } else { other }
    }

    pub fn mul_ratio(self, num: i32, denom: i32) -> Pt {
        if denom == 0 {
            return Pt::ZERO;
        }
        let milli = self.to_milli_i64() as i128;
        let num = num as i128;
        let denom = denom as i128;
        let value = div_round_i128(milli.saturating_mul(num), denom);
        Pt::from_milli_i128(value)
    }

    pub fn from_milli_i64(milli: i64) -> Pt {
        Pt::from_milli_i128(milli as i128)
    }

    fn from_milli_i128(milli: i128) -> Pt {
        let denom = 1i128 << 32;
        let adj = if milli >= 0 { 500 } else { -500 };
        let bits = (milli * denom + adj) / 1000;
        let bits = bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Pt(I32F32::from_bits(bits))
    }

    /// Render as a size operand with one decimal place, e.g. `14.0`.
    pub fn fmt_size(self) -> String {
        let milli = self.to_milli_i64();
        let (sign, milli) = if milli < 0 { ("-", -milli) } else { ("", milli) };
        let tenths = (milli + 50) / 100;
        format!("{}{}.{}", sign, tenths / 10, tenths % 10)
    }

    /// Render as a coordinate operand with three decimal places, e.g. `27.562`.
    pub fn fmt_coord(self) -> String {
        let milli = self.to_milli_i64();
        let (sign, milli) = if milli < 0 { ("-", -milli) } else { ("", milli) };
        format!("{}{}.{:03}", sign, milli / 1000, milli % 1000)
    }
}

impl std::ops::Add for Pt {
    type Output = Pt;
    fn add(self, rhs: Pt) -> Pt {
        Pt::from_milli_i128(self.to_milli_i64() as i128 + rhs.to_milli_i64() as i128)
    }
}

impl std::ops::Sub for Pt {
    type Output = Pt;
    fn sub(self, rhs: Pt) -> Pt {
        Pt::from_milli_i128(self.to_milli_i64() as i128 - rhs.to_milli_i64() as i128)
    }
}

impl std::ops::Mul<i32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: i32) -> Pt {
        let milli = self.to_milli_i64() as i128;
        Pt::from_milli_i128(milli.saturating_mul(rhs as i128))
    }
}

impl std::ops::Div<i32> for Pt {
    type Output = Pt;
    fn div(self, rhs: i32) -> Pt {
        if rhs == 0 {
            Pt::ZERO
        } else {
            let milli = self.to_milli_i64() as i128;
            let value = div_round_i128(milli, rhs as i128);
            Pt::from_milli_i128(value)
        }
    }
}

impl std::ops::Mul<f32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: f32) -> Pt {
        if !rhs.is_finite() {
            return Pt::ZERO;
        }
        Pt::from_f32(self.to_f32() * rhs)
    }
}

fn div_round_i128(num: i128, den: i128) -> i128 {
    if den == 0 {
        return 0;
    }
    let den_abs = den.abs();
    if num >= 0 {
        (num + (den_abs / 2)) / den
    } else {
        -(((-num) + (den_abs / 2)) / den)
    }
}

/// A field rectangle in page space, origin at the lower-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: Pt,
    pub y: Pt,
    pub width: Pt,
    pub height: Pt,
}

impl Rect {
    /// Build from a PDF `/Rect` array `[x0 y0 x1 y1]`, normalizing corner order.
    pub fn from_corners(x0: f32, y0: f32, x1: f32, y1: f32) -> Rect {
        let (x0, x1) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
        let (y0, y1) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        Rect {
            x: Pt::from_f32(x0),
            y: Pt::from_f32(y0),
            width: Pt::from_f32(x1 - x0),
            height: Pt::from_f32(y1 - y0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milli_roundtrip_is_stable() {
        for milli in [-12_345i64, -1, 0, 1, 999, 1_000, 200_000] {
            let pt = Pt::from_milli_i64(milli);
            assert_eq!(pt.to_milli_i64(), milli);
        }
    }

    #[test]
    fn mul_ratio_scales_glyph_units() {
        // 24pt at 500/1000 units is 12pt.
        let size = Pt::from_i32(24);
        assert_eq!(size.mul_ratio(500, 1000), Pt::from_i32(12));
        assert_eq!(size.mul_ratio(0, 1000), Pt::ZERO);
        assert_eq!(size.mul_ratio(1, 0), Pt::ZERO);
    }

    #[test]
    fn size_formatting_uses_one_decimal() {
        assert_eq!(Pt::from_i32(14).fmt_size(), "14.0");
        assert_eq!(Pt::from_f32(23.55).fmt_size(), "23.6");
        assert_eq!(Pt::from_f32(-2.0).fmt_size(), "-2.0");
    }

    #[test]
    fn coord_formatting_uses_three_decimals() {
        assert_eq!(Pt::from_f32(2.0).fmt_coord(), "2.000");
        assert_eq!(Pt::from_f32(27.562).fmt_coord(), "27.562");
        assert_eq!(Pt::ZERO.fmt_coord(), "0.000");
    }

    #[test]
    fn rect_normalizes_corner_order() {
        let rect = Rect::from_corners(300.0, 500.0, 100.0, 400.0);
        assert_eq!(rect.x, Pt::from_i32(100));
        assert_eq!(rect.y, Pt::from_i32(400));
        assert_eq!(rect.width, Pt::from_i32(200));
        assert_eq!(rect.height, Pt::from_i32(100));
    }
}
