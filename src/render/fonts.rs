use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use ttf_parser::{Face, GlyphId};

use super::RenderError;

/// A parsed TrueType font with the metrics layout and embedding need.
#[derive(Debug)]
pub struct FontAsset {
    name: String,
    data: Vec<u8>,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    cap_height: i16,
    bbox: [i16; 4],
    italic_angle: f32,
    glyphs: HashMap<char, u16>,
    advances: Vec<u16>,
}

impl FontAsset {
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Result<Self, RenderError> {
        let name = name.into();
        let face = Face::parse(&data, 0).map_err(|e| RenderError::Font {
            name: name.clone(),
            reason: e.to_string(),
        })?;

        let mut glyphs = HashMap::new();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|cp| {
                    if let (Some(c), Some(gid)) = (char::from_u32(cp), subtable.glyph_index(cp)) {
                        glyphs.entry(c).or_insert(gid.0);
                    }
                });
            }
        }
        if glyphs.is_empty() {
            return Err(RenderError::Font {
                name,
                reason: "font has no unicode character map".to_string(),
            });
        }

        let advances = (0..face.number_of_glyphs())
            .map(|gid| face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0))
            .collect();

        let bbox = face.global_bounding_box();
        let units_per_em = face.units_per_em();
        let ascender = face.ascender();
        let descender = face.descender();
        let cap_height = face.capital_height().unwrap_or(ascender);
        let italic_angle = face.italic_angle().unwrap_or(0.0);

        Ok(Self {
            name,
            units_per_em,
            ascender,
            descender,
            cap_height,
            bbox: [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max],
            italic_angle,
            glyphs,
            advances,
            data,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Glyph id for a character; unmapped characters fall back to `.notdef`.
    pub fn glyph(&self, c: char) -> u16 {
        self.glyphs.get(&c).copied().unwrap_or(0)
    }

    pub fn advance(&self, gid: u16) -> u16 {
        self.advances.get(usize::from(gid)).copied().unwrap_or(0)
    }

    /// Width of `text` in points at `size`.
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        let units: u32 = text
            .chars()
            .map(|c| u32::from(self.advance(self.glyph(c))))
            .sum();
        units as f32 * size / f32::from(self.units_per_em)
    }

    /// Converts font units to the 1000-unit glyph space PDF expects.
    pub fn to_pdf_units(&self, value: f32) -> f32 {
        value * 1000.0 / f32::from(self.units_per_em)
    }

    pub fn ascender(&self) -> f32 {
        self.to_pdf_units(f32::from(self.ascender))
    }

    pub fn descender(&self) -> f32 {
        self.to_pdf_units(f32::from(self.descender))
    }

    pub fn cap_height(&self) -> f32 {
        self.to_pdf_units(f32::from(self.cap_height))
    }

    pub fn italic_angle(&self) -> f32 {
        self.italic_angle
    }

    pub fn bbox(&self) -> [f32; 4] {
        self.bbox.map(|v| self.to_pdf_units(f32::from(v)))
    }
}

/// Read-only set of fonts keyed by logical name (the file stem).
#[derive(Debug, Default)]
pub struct FontStore {
    fonts: BTreeMap<String, Arc<FontAsset>>,
}

impl FontStore {
    /// Loads every `.ttf` and `.otf` file directly under `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, RenderError> {
        let entries = fs::read_dir(dir).map_err(|e| RenderError::Font {
            name: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut fonts = BTreeMap::new();
        for entry in entries {
            let path = entry
                .map_err(|e| RenderError::Font {
                    name: dir.display().to_string(),
                    reason: e.to_string(),
                })?
                .path();

            let is_font = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("ttf") || ext.eq_ignore_ascii_case("otf"));
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !is_font {
                continue;
            }

            let data = fs::read(&path).map_err(|e| RenderError::Font {
                name: path.display().to_string(),
                reason: e.to_string(),
            })?;
            let asset = FontAsset::from_bytes(stem, data)?;
            tracing::debug!(font = stem, glyphs = asset.advances.len(), "Loaded font");
            fonts.insert(stem.to_string(), Arc::new(asset));
        }

        Ok(Self { fonts })
    }

    pub fn from_assets(assets: impl IntoIterator<Item = FontAsset>) -> Self {
        let fonts = assets
            .into_iter()
            .map(|asset| (asset.name.clone(), Arc::new(asset)))
            .collect();
        Self { fonts }
    }

    pub fn get(&self, name: &str) -> Option<Arc<FontAsset>> {
        self.fonts.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.fonts.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}
