//! Colour schemes for categorical series and continuous colour maps

use plotters::style::RGBColor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ten-colour categorical cycle
const CATEGORY10: [u32; 10] = [
    0x1f77b4, 0xff7f0e, 0x2ca02c, 0xd62728, 0x9467bd, 0x8c564b, 0xe377c2, 0x7f7f7f, 0xbcbd22,
    0x17becf,
];

const VIRIDIS: [u32; 9] = [
    0x440154, 0x472d7b, 0x3b528b, 0x2c728e, 0x21918c, 0x28ae80, 0x5ec962, 0xaadc32, 0xfde725,
];
const PLASMA: [u32; 9] = [
    0x0d0887, 0x4c02a1, 0x7e03a8, 0xa92395, 0xcc4778, 0xe56b5d, 0xf89441, 0xfdc328, 0xf0f921,
];
const INFERNO: [u32; 9] = [
    0x000004, 0x1f0c48, 0x550f6d, 0x88226a, 0xba3655, 0xe35933, 0xf98e09, 0xf9cb35, 0xfcffa4,
];
const MAGMA: [u32; 9] = [
    0x000004, 0x1c1044, 0x4f127b, 0x812581, 0xb5367a, 0xe55064, 0xfb8761, 0xfec287, 0xfcfdbf,
];
const CIVIDIS: [u32; 9] = [
    0x00224e, 0x123570, 0x3b496c, 0x575d6d, 0x707173, 0x8a8779, 0xa69d75, 0xc4b56c, 0xfee838,
];
const BLUES: [u32; 9] = [
    0xf7fbff, 0xdeebf7, 0xc6dbef, 0x9ecae1, 0x6baed6, 0x4292c6, 0x2171b5, 0x08519c, 0x08306b,
];
const GREENS: [u32; 9] = [
    0xf7fcf5, 0xe5f5e0, 0xc7e9c0, 0xa1d99b, 0x74c476, 0x41ab5d, 0x238b45, 0x006d2c, 0x00441b,
];
const REDS: [u32; 9] = [
    0xfff5f0, 0xfee0d2, 0xfcbba1, 0xfc9272, 0xfb6a4a, 0xef3b2c, 0xcb181d, 0xa50f15, 0x67000d,
];
const PURPLES: [u32; 9] = [
    0xfcfbfd, 0xefedf5, 0xdadaeb, 0xbcbddc, 0x9e9ac8, 0x807dba, 0x6a51a3, 0x54278f, 0x3f007d,
];
const ORANGES: [u32; 9] = [
    0xfff5eb, 0xfee6ce, 0xfdd0a2, 0xfdae6b, 0xfd8d3c, 0xf16913, 0xd94801, 0xa63603, 0x7f2704,
];
const YLORRD: [u32; 9] = [
    0xffffcc, 0xffeda0, 0xfed976, 0xfeb24c, 0xfd8d3c, 0xfc4e2a, 0xe31a1c, 0xbd0026, 0x800026,
];
const YLGNBU: [u32; 9] = [
    0xffffd9, 0xedf8b1, 0xc7e9b4, 0x7fcdbb, 0x41b6c4, 0x1d91c0, 0x225ea8, 0x253494, 0x081d58,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Default,
    Viridis,
    Plasma,
    Inferno,
    Magma,
    Cividis,
    Blues,
    Greens,
    Reds,
    Purples,
    Oranges,
    #[serde(rename = "ylorrd")]
    YlOrRd,
    #[serde(rename = "ylgnbu")]
    YlGnBu,
}

impl ColorScheme {
    pub const ALL: [ColorScheme; 13] = [
        ColorScheme::Default,
        ColorScheme::Viridis,
        ColorScheme::Plasma,
        ColorScheme::Inferno,
        ColorScheme::Magma,
        ColorScheme::Cividis,
        ColorScheme::Blues,
        ColorScheme::Greens,
        ColorScheme::Reds,
        ColorScheme::Purples,
        ColorScheme::Oranges,
        ColorScheme::YlOrRd,
        ColorScheme::YlGnBu,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ColorScheme::Default => "default",
            ColorScheme::Viridis => "viridis",
            ColorScheme::Plasma => "plasma",
            ColorScheme::Inferno => "inferno",
            ColorScheme::Magma => "magma",
            ColorScheme::Cividis => "cividis",
            ColorScheme::Blues => "blues",
            ColorScheme::Greens => "greens",
            ColorScheme::Reds => "reds",
            ColorScheme::Purples => "purples",
            ColorScheme::Oranges => "oranges",
            ColorScheme::YlOrRd => "ylorrd",
            ColorScheme::YlGnBu => "ylgnbu",
        }
    }

    fn stops(&self) -> &'static [u32] {
        match self {
            ColorScheme::Default | ColorScheme::Viridis => &VIRIDIS,
            ColorScheme::Plasma => &PLASMA,
            ColorScheme::Inferno => &INFERNO,
            ColorScheme::Magma => &MAGMA,
            ColorScheme::Cividis => &CIVIDIS,
            ColorScheme::Blues => &BLUES,
            ColorScheme::Greens => &GREENS,
            ColorScheme::Reds => &REDS,
            ColorScheme::Purples => &PURPLES,
            ColorScheme::Oranges => &ORANGES,
            ColorScheme::YlOrRd => &YLORRD,
            ColorScheme::YlGnBu => &YLGNBU,
        }
    }

    /// Continuous colour at `t` in `[0, 1]`
    pub fn at(&self, t: f64) -> RGBColor {
        let stops = self.stops();
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let pos = t * (stops.len() - 1) as f64;
        let i = (pos.floor() as usize).min(stops.len() - 2);
        let frac = pos - i as f64;
        let (a, b) = (rgb(stops[i]), rgb(stops[i + 1]));
        let lerp = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;
        RGBColor(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
    }

    /// `n` distinct series colours. The default scheme cycles the categorical
    /// palette; the others sample the colour map away from its pale end.
    pub fn colors(&self, n: usize) -> Vec<RGBColor> {
        match self {
            ColorScheme::Default => (0..n).map(|i| rgb(CATEGORY10[i % CATEGORY10.len()])).collect(),
            _ => (0..n)
                .map(|i| self.at((i + 1) as f64 / (n + 1) as f64))
                .collect(),
        }
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ColorScheme::ALL
            .into_iter()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| format!("unknown color scheme '{}'", s))
    }
}

fn rgb(hex: u32) -> RGBColor {
    RGBColor((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

/// Black or white, whichever reads better on `bg`
pub fn contrast_text(bg: RGBColor) -> RGBColor {
    let luma = 0.299 * bg.0 as f64 + 0.587 * bg.1 as f64 + 0.114 * bg.2 as f64;
    if luma > 140.0 {
        RGBColor(0, 0, 0)
    } else {
        RGBColor(255, 255, 255)
    }
}
