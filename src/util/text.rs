use std::borrow::Cow;

/// SEC-001: Strip terminal control characters and ANSI escape sequences.
///
/// Pushed entry text ends up in terminals (CLI `render`, logs), so anything a
/// remote publisher could use to drive the terminal is removed:
/// - C0 controls other than tab, newline and carriage return, plus DEL
/// - CSI sequences (`ESC [` ... final byte 0x40-0x7E)
/// - OSC sequences (`ESC ]` ... BEL or `ESC \`)
/// - a bare ESC
///
/// Returns `Cow::Borrowed` when nothing needs stripping.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.bytes().any(is_stripped_byte) {
        return Cow::Borrowed(s);
    }

    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            0x1b => i = skip_escape(bytes, i),
            b if is_stripped_byte(b) => i += 1,
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    // Only ASCII bytes are ever removed, so UTF-8 boundaries are preserved.
    Cow::Owned(String::from_utf8_lossy(&out).into_owned())
}

/// Collapses runs of blank lines and trims trailing whitespace on each line.
///
/// The HTML-to-text pass leaves paragraph gaps and padding that carry no
/// meaning once the markup is gone.
pub fn normalize_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut blank_run = 0usize;

    for line in s.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if blank_run > 0 {
                out.push('\n');
            }
        }
        blank_run = 0;
        out.push_str(line);
    }

    out
}

fn is_stripped_byte(b: u8) -> bool {
    b == 0x1b || b == 0x7f || (b < 0x20 && b != b'\t' && b != b'\n' && b != b'\r')
}

/// Returns the index just past the escape sequence starting at `start`.
fn skip_escape(bytes: &[u8], start: usize) -> usize {
    let len = bytes.len();
    match bytes.get(start + 1) {
        Some(b'[') => {
            let mut i = start + 2;
            while i < len {
                let c = bytes[i];
                i += 1;
                if (0x40..=0x7e).contains(&c) {
                    break;
                }
            }
            i
        }
        Some(b']') => {
            let mut i = start + 2;
            while i < len {
                if bytes[i] == 0x07 {
                    return i + 1;
                }
                if bytes[i] == 0x1b && bytes.get(i + 1) == Some(&b'\\') {
                    return i + 2;
                }
                i += 1;
            }
            i
        }
        _ => start + 1,
    }
}
