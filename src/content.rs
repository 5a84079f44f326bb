use std::ops::Range;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(f64),
    Name(String),
    Str(Vec<u8>),
    Array(Vec<Operand>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    SaveState,
    RestoreState,
    Rect,
    Clip,
    EndPath,
    BeginText,
    EndText,
    SelectFont,
    MoveText,
    ShowText,
    Other(String),
}

impl Op {
    fn from_keyword(keyword: &str) -> Op {
        match keyword {
            "q" => Op::SaveState,
            "Q" => Op::RestoreState,
            "re" => Op::Rect,
            "W" => Op::Clip,
            "n" => Op::EndPath,
            "BT" => Op::BeginText,
            "ET" => Op::EndText,
            "Tf" => Op::SelectFont,
            "Td" => Op::MoveText,
            "Tj" => Op::ShowText,
            other => Op::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedOperand {
    pub value: Operand,
    pub span: Range<usize>,
}

/// One instruction: its operator, operands, and the byte span covering both.
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub op: Op,
    pub operands: Vec<SpannedOperand>,
    pub span: Range<usize>,
}

/// Tokenize a content stream. Never fails: bytes that do not parse as an
/// operand or keyword are skipped, and the surrounding splice machinery
/// carries them through unchanged.
pub fn tokenize(bytes: &[u8]) -> Vec<Instr> {
    let mut instrs = Vec::new();
    let mut operands: Vec<SpannedOperand> = Vec::new();
    let mut start: Option<usize> = None;
    let mut pos = 0usize;
    let len = bytes.len();

    while pos < len {
        skip_ws(bytes, &mut pos);
        if pos >= len {
            break;
        }
        if let Some((value, span)) = read_operand(bytes, pos) {
            if start.is_none() {
                start = Some(span.start);
            }
            pos = span.end;
            operands.push(SpannedOperand { value, span });
            continue;
        }
        if let Some((keyword, span)) = read_keyword(bytes, pos) {
            let instr_start = start.take().unwrap_or(span.start);
            instrs.push(Instr {
                op: Op::from_keyword(&keyword),
                operands: std::mem::take(&mut operands),
                span: instr_start..span.end,
            });
            pos = span.end;
            continue;
        }
        // Neither operand nor keyword (hex strings, dictionaries). Drop any
        // pending operands; the bytes still round-trip via splice.
        operands.clear();
        start = None;
        pos += 1;
    }

    instrs
}

/// Rebuild a stream, replacing each edited span with its new bytes and
/// copying everything between edits verbatim. Edits must be sorted by start
/// and non-overlapping.
pub fn splice(bytes: &[u8], edits: &[(Range<usize>, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 32);
    let mut cursor = 0usize;
    for (span, replacement) in edits {
        if span.start < cursor || span.end > bytes.len() {
            continue;
        }
        out.extend_from_slice(&bytes[cursor..span.start]);
        out.extend_from_slice(replacement);
        cursor = span.end;
    }
    out.extend_from_slice(&bytes[cursor..]);
    out
}

/// Escape a text value for use inside a `(...)` show-text literal.
pub fn escape_text_literal(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 4);
    for &byte in text.as_bytes() {
        match byte {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(byte);
            }
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(byte),
        }
    }
    out
}

fn skip_ws(bytes: &[u8], pos: &mut usize) {
    while *pos < bytes.len() {
        match bytes[*pos] {
            b'\0' | b'\t' | b'\n' | b'\x0c' | b'\r' | b' ' => *pos += 1,
            b'%' => {
                while *pos < bytes.len() && bytes[*pos] != b'\n' {
                    *pos += 1;
                }
            }
            _ => break,
        }
    }
}

fn read_keyword(bytes: &[u8], mut pos: usize) -> Option<(String, Range<usize>)> {
    let start = pos;
    while pos < bytes.len() && !is_delimiter(bytes[pos]) {
        pos += 1;
    }
    if pos == start {
        return None;
    }
    Some((
        String::from_utf8_lossy(&bytes[start..pos]).into_owned(),
        start..pos,
    ))
}

fn read_operand(bytes: &[u8], pos: usize) -> Option<(Operand, Range<usize>)> {
    match bytes.get(pos)? {
        b'/' => Some(read_name(bytes, pos)),
        b'(' => read_string(bytes, pos),
        b'[' => read_array(bytes, pos),
        b'+' | b'-' | b'.' => read_number(bytes, pos),
        b'0'..=b'9' => read_number(bytes, pos),
        _ => None,
    }
}

fn read_name(bytes: &[u8], mut pos: usize) -> (Operand, Range<usize>) {
    let start = pos;
    pos += 1;
    let name_start = pos;
    while pos < bytes.len() && !is_delimiter(bytes[pos]) {
        pos += 1;
    }
    let name = String::from_utf8_lossy(&bytes[name_start..pos]).into_owned();
    (Operand::Name(name), start..pos)
}

fn read_string(bytes: &[u8], mut pos: usize) -> Option<(Operand, Range<usize>)> {
    let start = pos;
    pos += 1;
    let mut buf = Vec::new();
    let mut depth = 1i32;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => {
                if pos + 1 < bytes.len() {
                    buf.push(unescape_string_byte(bytes[pos + 1]));
                    pos += 2;
                } else {
                    pos += 1;
                }
            }
            b'(' => {
                depth += 1;
                buf.push(b'(');
                pos += 1;
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((Operand::Str(buf), start..pos + 1));
                }
                buf.push(b')');
                pos += 1;
            }
            byte => {
                buf.push(byte);
                pos += 1;
            }
        }
    }
    // Unterminated literal: not an operand, let the caller skip it.
    None
}

fn unescape_string_byte(byte: u8) -> u8 {
    match byte {
        b'n' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        other => other,
    }
}

fn read_array(bytes: &[u8], mut pos: usize) -> Option<(Operand, Range<usize>)> {
    let start = pos;
    pos += 1;
    let mut items = Vec::new();
    loop {
        skip_ws(bytes, &mut pos);
        match bytes.get(pos)? {
            b']' => return Some((Operand::Array(items), start..pos + 1)),
            _ => {
                if let Some((value, span)) = read_operand(bytes, pos) {
                    items.push(value);
                    pos = span.end;
                } else if let Some((_, span)) = read_keyword(bytes, pos) {
                    pos = span.end;
                } else {
                    pos += 1;
                }
            }
        }
    }
}

fn read_number(bytes: &[u8], mut pos: usize) -> Option<(Operand, Range<usize>)> {
    let start = pos;
    if matches!(bytes[pos], b'+' | b'-') {
        pos += 1;
    }
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    let text = std::str::from_utf8(&bytes[start..pos]).ok()?;
    let value = f64::from_str(text).ok()?;
    Some((Operand::Number(value), start..pos))
}

fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'\0' | b'\t'
            | b'\n'
            | b'\x0c'
            | b'\r'
            | b' '
            | b'('
            | b')'
            | b'<'
            | b'>'
            | b'['
            | b']'
            | b'{'
            | b'}'
            | b'/'
            | b'%'
    )
}
