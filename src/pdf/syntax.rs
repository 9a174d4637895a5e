//! Low-level PDF syntax serialization for appended revisions.
//!
//! The placeholder phase appends an incremental update to an existing file;
//! every byte of that revision must land at a predictable offset, so the
//! objects are serialized here instead of going through a full document
//! writer that could re-flow the body.

use lopdf::{Dictionary, Object, ObjectId, StringFormat};

use crate::infra::error::{SignError, SignResult};

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Serialize one indirect object: `N G obj ... endobj`.
pub fn write_indirect_object(out: &mut Vec<u8>, id: ObjectId, object: &Object) -> SignResult<()> {
    out.extend_from_slice(format!("{} {} obj\n", id.0, id.1).as_bytes());
    write_object(out, object)?;
    out.extend_from_slice(b"\nendobj\n");
    Ok(())
}

/// Serialize a direct object.
pub fn write_object(out: &mut Vec<u8>, object: &Object) -> SignResult<()> {
    match object {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(value) => {
            out.extend_from_slice(if *value { b"true" as &[u8] } else { b"false" });
        }
        Object::Integer(value) => out.extend_from_slice(value.to_string().as_bytes()),
        Object::Real(value) => out.extend_from_slice(format!("{value}").as_bytes()),
        Object::Name(name) => write_name(out, name),
        Object::String(bytes, format) => write_string(out, bytes, format),
        Object::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_object(out, item)?;
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => write_dictionary(out, dict)?,
        Object::Reference(id) => {
            out.extend_from_slice(format!("{} {} R", id.0, id.1).as_bytes());
        }
        Object::Stream(stream) => {
            write_dictionary(out, &stream.dict)?;
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(&stream.content);
            out.extend_from_slice(b"\nendstream");
        }
    }
    Ok(())
}

pub fn write_dictionary(out: &mut Vec<u8>, dict: &Dictionary) -> SignResult<()> {
    out.extend_from_slice(b"<<");
    for (key, value) in dict.iter() {
        write_name(out, key);
        out.push(b' ');
        write_object(out, value)?;
        out.push(b' ');
    }
    out.extend_from_slice(b">>");
    Ok(())
}

/// `/Name`, with irregular bytes escaped as `#xx`.
fn write_name(out: &mut Vec<u8>, name: &[u8]) {
    out.push(b'/');
    for &byte in name {
        let regular = (0x21..=0x7E).contains(&byte)
            && !matches!(
                byte,
                b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' | b'#'
            );
        if regular {
            out.push(byte);
        } else {
            out.push(b'#');
            out.push(HEX_UPPER[(byte >> 4) as usize]);
            out.push(HEX_UPPER[(byte & 0x0F) as usize]);
        }
    }
}

fn write_string(out: &mut Vec<u8>, bytes: &[u8], format: &StringFormat) {
    match format {
        StringFormat::Literal => {
            out.push(b'(');
            out.extend_from_slice(&escape_literal_string(bytes));
            out.push(b')');
        }
        StringFormat::Hexadecimal => {
            out.push(b'<');
            for &byte in bytes {
                out.push(HEX_UPPER[(byte >> 4) as usize]);
                out.push(HEX_UPPER[(byte & 0x0F) as usize]);
            }
            out.push(b'>');
        }
    }
}

/// Escape `\`, `(` and `)` inside a literal string body.
pub fn escape_literal_string(bytes: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(bytes.len());
    for &byte in bytes {
        match byte {
            b'\\' => escaped.extend_from_slice(b"\\\\"),
            b'(' => escaped.extend_from_slice(b"\\("),
            b')' => escaped.extend_from_slice(b"\\)"),
            b'\r' => escaped.extend_from_slice(b"\\r"),
            b'\n' => escaped.extend_from_slice(b"\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Locate the `startxref` offset recorded at the end of `bytes`.
pub fn find_previous_startxref(bytes: &[u8]) -> SignResult<u64> {
    let token = b"startxref";
    let pos = rfind(bytes, token)
        .ok_or_else(|| SignError::PdfMalformed("'startxref' marker not found".to_string()))?;
    let tail = &bytes[pos + token.len()..];
    let digits: Vec<u8> = tail
        .iter()
        .copied()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(u8::is_ascii_digit)
        .collect();
    if digits.is_empty() {
        return Err(SignError::PdfMalformed(
            "'startxref' marker carries no offset".to_string(),
        ));
    }
    String::from_utf8_lossy(&digits)
        .parse::<u64>()
        .map_err(|e| SignError::PdfMalformed(format!("bad 'startxref' offset: {e}")))
}

/// First occurrence of `needle` in `haystack` at or after `from`.
pub fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| from + pos)
}

/// Last occurrence of `needle` in `haystack`.
pub fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}
