use crate::content;
use crate::fit::{self, FitPolicy, WidthTable};
use crate::types::{Pt, Rect};

/// Build a minimal self-contained appearance stream for a field that has no
/// reusable one: clip to the rectangle interior, select the font before any
/// positioning (strict viewers reject the reverse order), fill black, center
/// the text both ways, show it.
pub fn synthesize_appearance(
    text: &str,
    rect: Rect,
    font_name: &str,
    font_size: Pt,
    table: Option<&WidthTable>,
    policy: &FitPolicy,
) -> Vec<u8> {
    let fit = fit::fit_text(text, font_size, table, rect.width, policy);
    let baseline = ((rect.height - fit.size) / 2).max(Pt::from_i32(2));
    let clip_width = (rect.width - Pt::from_i32(2)).max(Pt::ZERO);
    let clip_height = (rect.height - Pt::from_i32(2)).max(Pt::ZERO);

    let mut out = Vec::with_capacity(96 + text.len());
    out.extend_from_slice(b"q\n");
    out.extend_from_slice(
        format!(
            "1 1 {} {} re W n\n",
            clip_width.fmt_coord(),
            clip_height.fmt_coord()
        )
        .as_bytes(),
    );
    out.extend_from_slice(b"BT\n");
    out.extend_from_slice(format!("/{} {} Tf\n", font_name, fit.size.fmt_size()).as_bytes());
    out.extend_from_slice(b"0 g\n");
    out.extend_from_slice(
        format!("{} {} Td\n", fit.x_offset.fmt_coord(), baseline.fmt_coord()).as_bytes(),
    );
    out.push(b'(');
    out.extend_from_slice(&content::escape_text_literal(text));
    out.extend_from_slice(b") Tj\nET\nQ\n");
    out
}
