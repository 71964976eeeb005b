use std::fmt;

/// Renders a byte string as a `b'...'` literal.
///
/// Printable ASCII is shown as-is; backslashes and control bytes are
/// escaped, everything else is written as `\xNN`. Single quotes delimit the
/// literal unless the bytes contain `'` but no `"`, in which case double
/// quotes are used and nothing needs escaping, matching Python's `repr`.
/// Diagnostics use this so that payloads read the same regardless of
/// whether they are text.
///
/// ```rust
/// use mocktcp::Literal;
///
/// assert_eq!(Literal(b"Hola!").to_string(), "b'Hola!'");
/// assert_eq!(Literal(b"\x00\x00\x00\x05").to_string(), r"b'\x00\x00\x00\x05'");
/// assert_eq!(Literal(b"it's").to_string(), r#"b"it's""#);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Literal<'a>(pub &'a [u8]);

impl fmt::Display for Literal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quote = if self.0.contains(&b'\'') && !self.0.contains(&b'"') {
            '"'
        } else {
            '\''
        };
        write!(f, "b{quote}")?;
        for &b in self.0 {
            match b {
                b'\'' if quote == '\'' => f.write_str("\\'")?,
                b'\\' => f.write_str("\\\\")?,
                b'\n' => f.write_str("\\n")?,
                b'\r' => f.write_str("\\r")?,
                b'\t' => f.write_str("\\t")?,
                0x20..=0x7e => write!(f, "{}", b as char)?,
                _ => write!(f, "\\x{b:02x}")?,
            }
        }
        write!(f, "{quote}")
    }
}
