use crate::parser::SubCategory;
use crate::tree::IssueKind;
use std::collections::BTreeMap;
use std::fmt;

/// An sRGB color with straight alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Parse `#RRGGBB`
    pub fn parse_hex(value: &str) -> Option<Self> {
        let hex = value.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Composite `self` over an opaque `below`
    pub fn over(self, below: Rgba) -> Rgba {
        let a = u16::from(self.a);
        let mix = |top: u8, bottom: u8| {
            ((u16::from(top) * a + u16::from(bottom) * (255 - a) + 127) / 255) as u8
        };
        Rgba::rgb(mix(self.r, below.r), mix(self.g, below.g), mix(self.b, below.b))
    }

    /// Relative brightness, used to pick a readable label color
    pub fn is_dark(self) -> bool {
        let luma = 299 * u32::from(self.r) + 587 * u32::from(self.g) + 114 * u32::from(self.b);
        luma < 128_000
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Default fill for each timeline group
pub fn default_color(sub_category: SubCategory) -> Rgba {
    match sub_category {
        SubCategory::CodeUnit => Rgba::rgb(0x88, 0xAE, 0x58),
        SubCategory::Workflow => Rgba::rgb(0x51, 0xA1, 0x6E),
        SubCategory::Method => Rgba::rgb(0x2B, 0x8F, 0x81),
        SubCategory::Flow => Rgba::rgb(0x33, 0x79, 0x86),
        SubCategory::Dml => Rgba::rgb(0x28, 0x56, 0x63),
        SubCategory::Soql => Rgba::rgb(0x5D, 0x49, 0x63),
        SubCategory::SystemMethod => Rgba::rgb(0x5C, 0x34, 0x44),
        SubCategory::Other => Rgba::rgb(0x6B, 0x6B, 0x6B),
    }
}

/// Translucent band drawn behind the timeline for an issue
pub fn issue_color(kind: IssueKind) -> Rgba {
    match kind {
        IssueKind::Error => Rgba::rgb(255, 128, 128).with_alpha(51),
        IssueKind::Skip => Rgba::rgb(30, 128, 255).with_alpha(51),
        IssueKind::Unexpected => Rgba::rgb(128, 128, 255).with_alpha(51),
    }
}

pub const BACKGROUND: Rgba = Rgba::rgb(0x1E, 0x1E, 0x1E);
pub const MATCH_BORDER: Rgba = Rgba::rgb(0xE0, 0x9F, 0x3E);
pub const CURRENT_MATCH_BORDER: Rgba = Rgba::rgb(0xFF, 0xD7, 0x00);

/// Resolved colors for one session.
///
/// Groups sharing a color share a slot, so the renderer issues one fill per
/// distinct color rather than one per group.
#[derive(Debug, Clone)]
pub struct Palette {
    slots: Vec<Rgba>,
    slot_of: BTreeMap<SubCategory, usize>,
}

impl Palette {
    pub fn new(colors: impl IntoIterator<Item = (SubCategory, Rgba)>) -> Self {
        let mut palette = Self {
            slots: Vec::new(),
            slot_of: BTreeMap::new(),
        };
        for sub_category in SubCategory::ALL {
            palette.assign(sub_category, default_color(sub_category));
        }
        for (sub_category, color) in colors {
            palette.assign(sub_category, color);
        }
        palette.compact();
        palette
    }

    fn assign(&mut self, sub_category: SubCategory, color: Rgba) {
        let slot = match self.slots.iter().position(|c| *c == color) {
            Some(slot) => slot,
            None => {
                self.slots.push(color);
                self.slots.len() - 1
            }
        };
        self.slot_of.insert(sub_category, slot);
    }

    /// Drop slots no group refers to any more
    fn compact(&mut self) {
        let mut used: Vec<Rgba> = Vec::new();
        for slot in self.slot_of.values_mut() {
            let color = self.slots[*slot];
            *slot = match used.iter().position(|c| *c == color) {
                Some(i) => i,
                None => {
                    used.push(color);
                    used.len() - 1
                }
            };
        }
        self.slots = used;
    }

    pub fn slot(&self, sub_category: SubCategory) -> usize {
        self.slot_of.get(&sub_category).copied().unwrap_or(0)
    }

    pub fn color(&self, sub_category: SubCategory) -> Rgba {
        self.slots[self.slot(sub_category)]
    }

    /// Distinct fill colors, indexed by slot
    pub fn slots(&self) -> &[Rgba] {
        &self.slots
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new([])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(Rgba::parse_hex("#88AE58"), Some(Rgba::rgb(0x88, 0xAE, 0x58)));
        assert_eq!(Rgba::parse_hex("#88ae58"), Some(Rgba::rgb(0x88, 0xAE, 0x58)));
        assert_eq!(Rgba::parse_hex("88AE58"), None);
        assert_eq!(Rgba::parse_hex("#88AE5"), None);
        assert_eq!(Rgba::parse_hex("#GGGGGG"), None);
        assert_eq!(Rgba::rgb(0x88, 0xAE, 0x58).to_string(), "#88AE58");
    }

    #[test]
    fn test_over_blends() {
        let white = Rgba::rgb(255, 255, 255);
        let black = Rgba::rgb(0, 0, 0);
        assert_eq!(white.over(black), white);
        assert_eq!(white.with_alpha(0).over(black), black);
        assert_eq!(white.with_alpha(51).over(black), Rgba::rgb(51, 51, 51));
    }

    #[test]
    fn test_shared_colors_share_slot() {
        let palette = Palette::new([(SubCategory::Flow, default_color(SubCategory::Method))]);

        assert_eq!(palette.slot(SubCategory::Flow), palette.slot(SubCategory::Method));
        assert_eq!(palette.slots().len(), SubCategory::ALL.len() - 1);
    }

    #[test]
    fn test_default_palette_has_one_slot_per_group() {
        let palette = Palette::default();
        assert_eq!(palette.slots().len(), SubCategory::ALL.len());
        assert_eq!(palette.color(SubCategory::Soql), Rgba::rgb(0x5D, 0x49, 0x63));
    }
}
