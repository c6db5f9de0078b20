use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaletteColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl PaletteColor {
    pub const fn from_hex(rgb: u32) -> Self {
        Self {
            r: ((rgb >> 16) & 0xff) as u8,
            g: ((rgb >> 8) & 0xff) as u8,
            b: (rgb & 0xff) as u8,
        }
    }

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

pub const DEFAULT_PALETTE: [PaletteColor; 18] = [
    PaletteColor::from_hex(0x1f77b4), // dark blue
    PaletteColor::from_hex(0xff7f0e), // dark orange
    PaletteColor::from_hex(0x2ca02c), // dark green
    PaletteColor::from_hex(0xd62728), // dark red
    PaletteColor::from_hex(0x9467bd), // dark purple
    PaletteColor::from_hex(0x8c564b), // dark brown
    PaletteColor::from_hex(0xe377c2), // pink
    PaletteColor::from_hex(0x7f7f7f), // dark gray
    PaletteColor::from_hex(0xbcbd22), // dark yellow
    PaletteColor::from_hex(0x17becf), // light blue
    PaletteColor::from_hex(0xffbb78), // light orange
    PaletteColor::from_hex(0x98df8a), // light green
    PaletteColor::from_hex(0xff9896), // light red
    PaletteColor::from_hex(0xc5b0d5), // light purple
    PaletteColor::from_hex(0xc49c94), // light brown
    PaletteColor::from_hex(0xf7b6d2), // light pink
    PaletteColor::from_hex(0xc7c7c7), // light gray
    PaletteColor::from_hex(0xdbdb8d), // light yellow
];

/// What to do once every palette color has been handed out in one chart
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PalettePolicy {
    /// Start over from the first color
    #[default]
    Cycle,
    /// Fail the chart
    Strict,
}

/// Fixed palette plus an allocation index. One pool per chart.
#[derive(Debug)]
pub struct ColorPool<'a> {
    colors: &'a [PaletteColor],
    policy: PalettePolicy,
    allocated: usize,
}

impl<'a> ColorPool<'a> {
    pub fn new(colors: &'a [PaletteColor], policy: PalettePolicy) -> Self {
        Self {
            colors,
            policy,
            allocated: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.colors.len()
    }

    pub fn allocated(&self) -> usize {
        self.allocated
    }

    /// Hand out the next unused color
    pub fn allocate(&mut self) -> Result<PaletteColor> {
        let capacity = self.capacity();
        if capacity == 0 {
            return Err(Error::PaletteExhausted { capacity });
        }

        if self.allocated >= capacity {
            match self.policy {
                PalettePolicy::Strict => return Err(Error::PaletteExhausted { capacity }),
                PalettePolicy::Cycle if self.allocated == capacity => {
                    warn!("All {} palette colors in use, reusing colors", capacity);
                }
                PalettePolicy::Cycle => {}
            }
        }

        let color = self.colors[self.allocated % capacity];
        self.allocated += 1;
        Ok(color)
    }
}
