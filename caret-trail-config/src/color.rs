// color.rs
// 十六进制颜色解析，分量统一存为 [0, 1] 范围的 f64

use std::str::FromStr;

use anyhow::{bail, Context};
use serde::Deserialize;

/// RGBA 颜色（非预乘）
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgba8([r, g, b, a]: [u8; 4]) -> Self {
        Self::new(
            f64::from(r) / 255.,
            f64::from(g) / 255.,
            f64::from(b) / 255.,
            f64::from(a) / 255.,
        )
    }

    /// 返回乘上额外透明度后的颜色
    pub fn with_alpha_scaled(self, alpha: f64) -> Self {
        Self {
            a: (self.a * alpha).clamp(0., 1.),
            ..self
        }
    }
}

impl FromStr for Color {
    type Err = anyhow::Error;

    // 支持 #rgb、#rrggbb、#rrggbbaa
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(hex) = s.strip_prefix('#') else {
            bail!("color {s:?} must start with '#'");
        };
        if !hex.is_ascii() {
            bail!("color {s:?} contains non-hex characters");
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .with_context(|| format!("invalid hex digits in color {s:?}"))
        };

        let rgba = match hex.len() {
            3 => {
                // 短格式：每位重复一次
                let mut rgba = [0xff; 4];
                for (i, out) in rgba.iter_mut().take(3).enumerate() {
                    let v = channel(i..i + 1)?;
                    *out = v * 16 + v;
                }
                rgba
            }
            6 => [channel(0..2)?, channel(2..4)?, channel(4..6)?, 0xff],
            8 => [
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                channel(6..8)?,
            ],
            _ => bail!("color {s:?} must have 3, 6 or 8 hex digits"),
        };

        Ok(Self::from_rgba8(rgba))
    }
}

impl TryFrom<String> for Color {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
