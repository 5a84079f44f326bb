use crate::content::{self, Instr, Op, Operand};
use crate::fit::{self, FitPolicy, WidthTable};
use crate::types::Pt;
use std::ops::Range;

/// Rewrite an existing appearance stream in place: new text, fitted size,
/// recomputed centered x offset. The vertical position, font name, clipping
/// and every unrecognized instruction keep their original bytes. Streams with
/// no position + show-text pair are returned unmodified; template structure
/// varies and an unpatchable stream is not an error. Re-running with
/// identical inputs yields byte-identical output.
pub fn patch_appearance(
    stream: &[u8],
    text: &str,
    rect_width: Pt,
    nominal_size: Pt,
    table: Option<&WidthTable>,
    policy: &FitPolicy,
) -> Vec<u8> {
    let instrs = content::tokenize(stream);
    let Some((td_idx, tj_idx)) = find_text_pair(&instrs) else {
        return stream.to_vec();
    };

    let fit = fit::fit_text(text, nominal_size, table, rect_width, policy);
    let mut edits: Vec<(Range<usize>, Vec<u8>)> = Vec::new();

    if let Some(tf) = instrs.iter().find(|instr| instr.op == Op::SelectFont) {
        if tf.operands.len() == 2 && matches!(tf.operands[1].value, Operand::Number(_)) {
            edits.push((tf.operands[1].span.clone(), fit.size.fmt_size().into_bytes()));
        }
    }

    edits.push((
        instrs[td_idx].operands[0].span.clone(),
        fit.x_offset.fmt_coord().into_bytes(),
    ));

    let mut literal = Vec::with_capacity(text.len() + 2);
    literal.push(b'(');
    literal.extend_from_slice(&content::escape_text_literal(text));
    literal.push(b')');
    edits.push((instrs[tj_idx].operands[0].span.clone(), literal));

    edits.sort_by_key(|(span, _)| span.start);
    content::splice(stream, &edits)
}

/// The single position + show-text instruction pair; the first wins when a
/// stream carries several.
fn find_text_pair(instrs: &[Instr]) -> Option<(usize, usize)> {
    for (idx, instr) in instrs.iter().enumerate() {
        if instr.op != Op::MoveText
            || instr.operands.len() != 2
            || !instr
                .operands
                .iter()
                .all(|operand| matches!(operand.value, Operand::Number(_)))
        {
            continue;
        }
        let Some(next) = instrs.get(idx + 1) else {
            continue;
        };
        if next.op == Op::ShowText
            && next.operands.len() == 1
            && matches!(next.operands[0].value, Operand::Str(_))
        {
            return Some((idx, idx + 1));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::WidthTable;

    const STREAM: &[u8] = b"q\n1 1 198.0 38.0 re W n\nBT\n/MuseoSlab-700 24.0 Tf\n0 g\n27.562 8.0 Td\n(Sample Name) Tj\nET\nQ\n";

    fn uniform_table() -> WidthTable {
        WidthTable::new(32, vec![500; 224])
    }

    #[test]
    fn patches_size_offset_and_text() {
        let table = uniform_table();
        let out = patch_appearance(
            STREAM,
            "Jane",
            Pt::from_i32(200),
            Pt::from_i32(24),
            Some(&table),
            &FitPolicy::default(),
        );
        let out_str = String::from_utf8_lossy(&out);
        // 4 glyphs * 500/1000 * 24 = 48pt wide; centered at (196-48)/2 + 2.
        assert!(out_str.contains("/MuseoSlab-700 24.0 Tf"));
        assert!(out_str.contains("76.000 8.0 Td"));
        assert!(out_str.contains("(Jane) Tj"));
        // Clip rectangle and vertical offset keep their original bytes.
        assert!(out_str.contains("1 1 198.0 38.0 re W n"));
        assert!(!out_str.contains("Sample Name"));
    }

    #[test]
    fn shrinks_font_for_long_text() {
        let table = uniform_table();
        let out = patch_appearance(
            STREAM,
            "A Name That Cannot Possibly Fit At Nominal Size",
            Pt::from_i32(200),
            Pt::from_i32(24),
            Some(&table),
            &FitPolicy::default(),
        );
        let out_str = String::from_utf8_lossy(&out);
        // 47 glyphs * 500/1000 * size <= 196 holds from size 8 downward, so
        // the floor (14) is used and the text starts at the minimal inset.
        assert!(out_str.contains("/MuseoSlab-700 14.0 Tf"));
        assert!(out_str.contains("2.000 8.0 Td"));
    }

    #[test]
    fn stream_without_text_pair_is_returned_unmodified() {
        let stream = b"q 0.9 0.9 0.9 rg 0 0 10 10 re f Q";
        let out = patch_appearance(
            stream,
            "ignored",
            Pt::from_i32(200),
            Pt::from_i32(24),
            None,
            &FitPolicy::default(),
        );
        assert_eq!(out, stream);
    }

    #[test]
    fn repatching_identical_input_is_idempotent() {
        let table = uniform_table();
        let patch = |bytes: &[u8]| {
            patch_appearance(
                bytes,
                "Cortland Bolles",
                Pt::from_i32(200),
                Pt::from_i32(24),
                Some(&table),
                &FitPolicy::default(),
            )
        };
        let once = patch(STREAM);
        let twice = patch(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn first_pair_wins_when_stream_has_several() {
        let stream = b"BT /F1 12 Tf 10 20 Td (first) Tj 10 40 Td (second) Tj ET";
        let out = patch_appearance(
            stream,
            "X",
            Pt::from_i32(100),
            Pt::from_i32(12),
            None,
            &FitPolicy::default(),
        );
        let out_str = String::from_utf8_lossy(&out);
        assert!(out_str.contains("(X) Tj"));
        assert!(out_str.contains("10 40 Td (second) Tj"));
        assert!(!out_str.contains("(first)"));
    }

    #[test]
    fn replacement_text_is_escaped() {
        let out = patch_appearance(
            STREAM,
            "Jane (JJ) Doe",
            Pt::from_i32(400),
            Pt::from_i32(24),
            None,
            &FitPolicy::default(),
        );
        let out_str = String::from_utf8_lossy(&out);
        assert!(out_str.contains(r"(Jane \(JJ\) Doe) Tj"));
    }
}
