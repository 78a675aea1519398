//! RGB to HSV conversion in the 8-bit convention.
//!
//! Hue is stored as degrees / 2 so it fits in a byte: H in [0, 180),
//! S and V in [0, 256).

/// An 8-bit HSV pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsv8 {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

/// Convert one RGB pixel to 8-bit HSV.
pub fn rgb_to_hsv(rgb: [u8; 3]) -> Hsv8 {
    let r = rgb[0] as f64;
    let g = rgb[1] as f64;
    let b = rgb[2] as f64;

    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v > 0.0 { diff * 255.0 / v } else { 0.0 };

    let mut h = if diff == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    // 359.x degrees rounds to 180, which wraps back to red.
    let mut h8 = (h / 2.0).round() as u32;
    if h8 >= 180 {
        h8 -= 180;
    }

    Hsv8 {
        h: h8 as u8,
        s: s.round().min(255.0) as u8,
        v: v as u8,
    }
}
