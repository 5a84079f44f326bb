use crate::error::FormSealError;
use crate::fit::WidthTable;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Read-only table of font programs keyed by canonical identifier (the name
/// templates use in their `/DA` strings and font resource dictionaries).
/// Populated once at engine build time, then shared behind an `Arc`.
#[derive(Debug, Default)]
pub struct FontTable {
    fonts: Vec<FontProgram>,
    lookup: HashMap<String, usize>,
}

#[derive(Debug)]
pub struct FontProgram {
    pub(crate) name: String,
    pub(crate) data: Vec<u8>,
    pub(crate) metrics: FontMetrics,
    pub(crate) kind: FontProgramKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontProgramKind {
    TrueType,
    OpenTypeCff,
}

#[derive(Debug)]
pub(crate) struct FontMetrics {
    pub(crate) first_char: u8,
    pub(crate) last_char: u8,
    pub(crate) widths: Vec<u16>,
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) stem_v: i16,
    pub(crate) bbox: (i16, i16, i16, i16),
    pub(crate) missing_width: u16,
    pub(crate) is_fixed_pitch: bool,
    symbolic: bool,
}

impl FontTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a font program under its canonical identifier. The bytes must
    /// parse as a TrueType or OpenType face.
    pub fn register_bytes(&mut self, name: &str, data: Vec<u8>) -> Result<(), FormSealError> {
        let Ok(face) = ttf_parser::Face::parse(&data, 0) else {
            return Err(FormSealError::Font(format!("invalid font data for {name}")));
        };
        let (metrics, kind) = FontMetrics::from_face(&face);
        let key = normalize_name(name);
        if key.is_empty() {
            return Err(FormSealError::Font("empty font identifier".to_string()));
        }
        if self.lookup.contains_key(&key) {
            return Err(FormSealError::Font(format!("duplicate font identifier: {name}")));
        }
        let index = self.fonts.len();
        self.fonts.push(FontProgram {
            name: name.to_string(),
            data,
            metrics,
            kind,
        });
        self.lookup.insert(key, index);
        Ok(())
    }

    pub fn register_file(
        &mut self,
        name: &str,
        path: impl AsRef<Path>,
    ) -> Result<(), FormSealError> {
        let data = fs::read(path.as_ref())?;
        self.register_bytes(name, data)
    }

    pub fn resolve(&self, name: &str) -> Option<&FontProgram> {
        let key = normalize_name(name);
        self.lookup
            .get(&key)
            .and_then(|index| self.fonts.get(*index))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// The glyph-width table derived from the registered program, for use by
    /// the fitter when a template's own resources carry no widths.
    pub fn width_table(&self, name: &str) -> Option<WidthTable> {
        let font = self.resolve(name)?;
        Some(WidthTable::new(
            font.metrics.first_char as u32,
            font.metrics.widths.clone(),
        ))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fonts.iter().map(|font| font.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

impl FontMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> (Self, FontProgramKind) {
        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;
        let first_char = 32u8;
        let last_char = 255u8;
        let widths = build_widths(face, scale, first_char, last_char);
        let missing_width = widths
            .get((b' ' - first_char) as usize)
            .copied()
            .unwrap_or(0);

        let ascent = scale_i16(face.ascender(), scale);
        let descent = scale_i16(face.descender(), scale);
        let cap_height = face
            .capital_height()
            .map(|value| scale_i16(value, scale))
            .unwrap_or(ascent);
        let bbox = face.global_bounding_box();
        let bbox = (
            scale_i16(bbox.x_min, scale),
            scale_i16(bbox.y_min, scale),
            scale_i16(bbox.x_max, scale),
            scale_i16(bbox.y_max, scale),
        );
        let italic_angle = face
            .italic_angle()
            .map(|value| value.round() as i16)
            .unwrap_or(0);

        let kind = if face.tables().cff.is_some() {
            FontProgramKind::OpenTypeCff
        } else {
            FontProgramKind::TrueType
        };

        (
            Self {
                first_char,
                last_char,
                widths,
                ascent,
                descent,
                cap_height,
                italic_angle,
                stem_v: 80,
                bbox,
                missing_width,
                is_fixed_pitch: face.is_monospaced(),
                symbolic: !has_unicode_cmap(face),
            },
            kind,
        )
    }

    pub(crate) fn is_symbolic(&self) -> bool {
        self.symbolic
    }
}

fn has_unicode_cmap(face: &ttf_parser::Face<'_>) -> bool {
    let Some(cmap) = face.tables().cmap else {
        return false;
    };
    cmap.subtables.into_iter().any(|subtable| subtable.is_unicode())
}

fn build_widths(face: &ttf_parser::Face<'_>, scale: f32, first: u8, last: u8) -> Vec<u16> {
    let mut widths = Vec::with_capacity((last - first + 1) as usize);
    for code in first..=last {
        let width = char::from_u32(code as u32)
            .and_then(|ch| face.glyph_index(ch))
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(0);
        let scaled = (width as f32 * scale).round() as i32;
        widths.push(scaled.clamp(0, u16::MAX as i32) as u16);
    }
    widths
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn normalize_name(name: &str) -> String {
    name.trim().trim_matches('/').to_ascii_lowercase()
}
