//! HTML-escaped JSON encoding matching Go's `encoding/json` stream encoder
//! with `SetEscapeHTML(true)`: `<`, `>`, `&`, U+2028 and U+2029 are escaped
//! to `\u00XX` sequences, and the encoded form is newline-terminated.

use bytes::Bytes;
use serde::Serialize;

pub(crate) fn encode_html_escaped<T: Serialize>(value: &T) -> serde_json::Result<Bytes> {
    let raw = serde_json::to_vec(value)?;
    let mut out = Vec::with_capacity(raw.len() + 1);

    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'<' => {
                out.extend_from_slice(b"\\u003c");
                i += 1;
            }
            b'>' => {
                out.extend_from_slice(b"\\u003e");
                i += 1;
            }
            b'&' => {
                out.extend_from_slice(b"\\u0026");
                i += 1;
            }
            0xE2 if raw.get(i + 1) == Some(&0x80)
                && matches!(raw.get(i + 2), Some(&0xA8) | Some(&0xA9)) =>
            {
                out.extend_from_slice(if raw[i + 2] == 0xA8 {
                    b"\\u2028"
                } else {
                    b"\\u2029"
                });
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out.push(b'\n');
    Ok(Bytes::from(out))
}
