use crate::types::Pt;

/// Tuning knobs for text fitting.
///
/// Width tables are the measurement ground truth; `heuristic_factor` only
/// applies when a field's font carries no table and is deliberately tunable
/// per engine (typical per-family values fall between 0.48 and 0.55).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitPolicy {
    /// Smallest size the fitter will select, in points.
    pub min_size: f32,
    /// Horizontal slack kept free inside the rectangle, in points.
    pub margin: f32,
    /// Approximate advance per character as a fraction of the font size.
    pub heuristic_factor: f32,
}

impl Default for FitPolicy {
    fn default() -> Self {
        Self {
            min_size: 14.0,
            margin: 4.0,
            heuristic_factor: 0.55,
        }
    }
}

/// Per-glyph advance widths in 1/1000 em, indexed from a first character code.
#[derive(Debug, Clone, PartialEq)]
pub struct WidthTable {
    first_char: u32,
    widths: Vec<u16>,
}

impl WidthTable {
    pub fn new(first_char: u32, widths: Vec<u16>) -> Self {
        Self { first_char, widths }
    }

    /// Exact width of `text` at `size`. Characters outside the table's range
    /// contribute zero width.
    pub fn measure(&self, text: &str, size: Pt) -> Pt {
        let mut units: i32 = 0;
        for ch in text.chars() {
            let code = ch as u32;
            if code < self.first_char {
                continue;
            }
            let idx = (code - self.first_char) as usize;
            if let Some(width) = self.widths.get(idx) {
                units = units.saturating_add(*width as i32);
            }
        }
        size.mul_ratio(units, 1000)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fit {
    pub size: Pt,
    pub x_offset: Pt,
}

/// Find the largest size in whole-point steps from `nominal_size` down to the
/// policy floor at which `text` fits inside `rect_width`, and the x offset
/// that centers it. If nothing fits the floor size is returned with the
/// minimal offset; overflow at the floor is accepted degradation.
pub fn fit_text(
    text: &str,
    nominal_size: Pt,
    table: Option<&WidthTable>,
    rect_width: Pt,
    policy: &FitPolicy,
) -> Fit {
    let available = rect_width - Pt::from_f32(policy.margin);
    let inset = Pt::from_f32(policy.margin / 2.0);
    let floor = Pt::from_f32(policy.min_size);

    let mut size = nominal_size;
    while size >= floor {
        let width = measure(text, size, table, policy);
        if width <= available {
            let x_offset = ((available - width) / 2 + inset).max(inset);
            return Fit { size, x_offset };
        }
        size = size - Pt::from_i32(1);
    }
    Fit {
        size: floor,
        x_offset: inset,
    }
}

fn measure(text: &str, size: Pt, table: Option<&WidthTable>, policy: &FitPolicy) -> Pt {
    match table {
        Some(table) => table.measure(text, size),
        None => (size * policy.heuristic_factor) * (text.chars().count() as i32),
    }
}
