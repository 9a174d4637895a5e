//! `/Contents` region I/O: inject the DER CMS as uppercase ASCII-hex,
//! zero-fill, extract, and export.
//!
//! The region runs from just past `<` to just before `>`; nothing outside
//! it is ever touched.

use std::fs;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use openssl::pkcs7::Pkcs7;

use crate::domain::types::ByteRange;
use crate::infra::error::{SignError, SignResult};

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Overwrite the reserved hex region with the CMS DER; the remainder is
/// filled with ASCII `'0'`.
///
/// The space check runs before the file is opened, so a placeholder that
/// is too small is left byte-for-byte unchanged.
pub fn inject_contents(
    path: &Path,
    range: &ByteRange,
    der: &[u8],
    buffer: &mut [u8],
) -> SignResult<()> {
    let start = range.contents_start();
    let reserved = usize::try_from(range.contents_len()).map_err(|_| {
        SignError::PdfMalformed("/ByteRange quadruple out of bounds".to_string())
    })?;
    debug_assert!(buffer.len() >= 2);
    let hex_len = der.len() * 2;
    if hex_len > reserved {
        return Err(SignError::PlaceholderTooSmall {
            needed: hex_len,
            reserved,
        });
    }

    let mut file = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| SignError::io(path, e))?;
    file.seek(SeekFrom::Start(start))
        .map_err(|e| SignError::io(path, e))?;

    // lowercase hex invalidates some verifiers; always emit uppercase
    let pair_capacity = (buffer.len() / 2).max(1);
    for chunk in der.chunks(pair_capacity) {
        let mut filled = 0;
        for &byte in chunk {
            buffer[filled] = HEX_UPPER[(byte >> 4) as usize];
            buffer[filled + 1] = HEX_UPPER[(byte & 0x0F) as usize];
            filled += 2;
        }
        file.write_all(&buffer[..filled])
            .map_err(|e| SignError::io(path, e))?;
    }

    fill_zeros(&mut file, reserved - hex_len, buffer).map_err(|e| SignError::io(path, e))?;
    log::info!(
        "injected {} CMS bytes into {} ({} hex chars, {} zero-filled)",
        der.len(),
        path.display(),
        hex_len,
        reserved - hex_len
    );
    Ok(())
}

/// Fill the whole reserved region with ASCII `'0'`.
pub fn zero_out(path: &Path, range: &ByteRange, buffer: &mut [u8]) -> SignResult<()> {
    let reserved = usize::try_from(range.contents_len()).map_err(|_| {
        SignError::PdfMalformed("/ByteRange quadruple out of bounds".to_string())
    })?;
    let mut file = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| SignError::io(path, e))?;
    file.seek(SeekFrom::Start(range.contents_start()))
        .map_err(|e| SignError::io(path, e))?;
    fill_zeros(&mut file, reserved, buffer).map_err(|e| SignError::io(path, e))?;
    Ok(())
}

fn fill_zeros(file: &mut fs::File, mut remaining: usize, buffer: &mut [u8]) -> std::io::Result<()> {
    buffer.fill(b'0');
    while remaining > 0 {
        let chunk = remaining.min(buffer.len());
        file.write_all(&buffer[..chunk])?;
        remaining -= chunk;
    }
    Ok(())
}

/// Read the reserved hex region back and decode it to DER bytes.
/// Trailing `'0'` filler decodes to trailing zero bytes, which DER readers
/// ignore past the end of the outer structure.
pub fn extract_contents(path: &Path, range: &ByteRange) -> SignResult<Vec<u8>> {
    let bytes = fs::read(path).map_err(|e| SignError::io(path, e))?;
    let start = usize::try_from(range.contents_start()).map_err(|_| {
        SignError::PdfMalformed("/ByteRange quadruple out of bounds".to_string())
    })?;
    let length = range.contents_len() as usize;
    if bytes.len() < start + length {
        return Err(SignError::PdfMalformed(
            "not enough bytes to read '/Contents'".to_string(),
        ));
    }
    if length % 2 != 0 {
        return Err(SignError::PdfMalformed(
            "'/Contents' hex region has odd length".to_string(),
        ));
    }

    let region = &bytes[start..start + length];
    let mut decoded = Vec::with_capacity(length / 2);
    for pair in region.chunks_exact(2) {
        let high = hex_nibble(pair[0])?;
        let low = hex_nibble(pair[1])?;
        decoded.push((high << 4) | low);
    }
    Ok(decoded)
}

fn hex_nibble(byte: u8) -> SignResult<u8> {
    match byte {
        b'0'..=b'9' => Ok(byte - b'0'),
        b'a'..=b'f' => Ok(byte - b'a' + 10),
        b'A'..=b'F' => Ok(byte - b'A' + 10),
        _ => Err(SignError::PdfMalformed(format!(
            "'/Contents' holds a non-hex byte 0x{byte:02X}"
        ))),
    }
}

/// Extract the embedded CMS and re-emit it as a `-----BEGIN PKCS7-----` PEM file.
pub fn export_pem(pdf_path: &Path, range: &ByteRange, out_path: &Path) -> SignResult<()> {
    let der = extract_contents(pdf_path, range)?;
    let pkcs7 = Pkcs7::from_der(&der)
        .map_err(|e| SignError::CryptoFailure(format!("unable to load PKCS#7: {e}")))?;
    let pem = pkcs7.to_pem()?;
    fs::write(out_path, pem).map_err(|e| SignError::io(out_path, e))?;
    log::info!(
        "exported PKCS#7 from {} to {}",
        pdf_path.display(),
        out_path.display()
    );
    Ok(())
}
