//! Terminal escape stripping for console transcripts.

/// Remove terminal color and cursor control sequences from `text`.
///
/// Drops CSI sequences (`ESC [ params final`), two-byte `ESC x` escapes,
/// and the bare `[0m` reset left behind when a console swallows the ESC
/// byte. An unterminated CSI sequence at the very end is kept verbatim so
/// that a later chunk can complete it.
#[must_use]
pub fn strip_terminal_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }

        match chars.peek() {
            Some(&(_, '[')) => {
                chars.next();
                let mut terminated = false;
                for (_, next) in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&next) {
                        terminated = true;
                        break;
                    }
                }
                if !terminated {
                    out.push_str(&text[start..]);
                }
            }
            Some(_) => {
                chars.next();
            }
            None => out.push(c),
        }
    }

    out.replace("[0m", "")
}
