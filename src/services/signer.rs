//! Signer orchestrator: drives placeholder, digest, CMS and injection
//! phases and exposes the public signing API.
//!
//! One orchestrator serves one signing session at a time; the phases are
//! strictly sequential and no state survives between sessions apart from
//! the reusable I/O buffer.

use std::path::{Path, PathBuf};

use crate::domain::types::{
    ByteRange, Certificate, Certificates, PrivateKey, SignatureAnnotation, SigningAttributes,
};
use crate::infra::error::{SignError, SignResult};
use crate::pdf::appearance::{SignaturePainter, TextAppearancePainter};
use crate::pdf::reader::ByteRangeReader;
use crate::pdf::writer::{adjust_byte_range, PlaceholderWriter};
use crate::services::{cms_builder, digest, injector};

const IO_BUFFER_SIZE: usize = 4096;

pub struct PdfSigner {
    signer_name: String,
    painter: Box<dyn SignaturePainter>,
    buffer: Vec<u8>,
}

impl Default for PdfSigner {
    fn default() -> Self {
        Self::new("pdf-signer")
    }
}

impl PdfSigner {
    #[must_use]
    pub fn new(signer_name: impl Into<String>) -> Self {
        Self {
            signer_name: signer_name.into(),
            painter: Box::new(TextAppearancePainter::default()),
            buffer: vec![0u8; IO_BUFFER_SIZE],
        }
    }

    /// Replace the appearance painter used for visible signatures.
    #[must_use]
    pub fn with_painter(mut self, painter: Box<dyn SignaturePainter>) -> Self {
        self.painter = painter;
        self
    }

    /// Current UTC time as ASN.1 UTCTime `YYMMDDHHMMSSZ`.
    pub fn get_signing_time(&self, out: &mut String) {
        *out = cms_builder::current_utc_time();
    }

    // === Placeholder phase ===

    /// Insert an unsigned signature placeholder into `input`, writing the
    /// result to `output` and stamping the computed `ByteRange` on the
    /// annotation. `output` may equal `input` for in-place operation.
    pub fn set_placeholder(
        &mut self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        annotation: &mut SignatureAnnotation,
    ) -> SignResult<()> {
        let input = input.as_ref();
        let output = output.as_ref();
        log::info!(
            "placing signature '{}' ({} reserved bytes) into {}",
            annotation.name(),
            annotation.info().size_in_bytes,
            output.display()
        );

        let writer = PlaceholderWriter::new(&self.signer_name, self.painter.as_ref());
        writer.append(input, output, annotation, false)?;

        // the /ByteRange beacon is only resolvable once the revision is on disk
        let range = adjust_byte_range(output)?;
        annotation.set_byte_range(range);

        injector::zero_out(output, &range, &mut self.buffer)
    }

    /// `set_placeholder` into a fresh unique sibling of `input`, keeping
    /// the original intact. Returns the path of the placeholder copy.
    pub fn set_placeholder_unique(
        &mut self,
        input: impl AsRef<Path>,
        annotation: &mut SignatureAnnotation,
    ) -> SignResult<PathBuf> {
        let input = input.as_ref();
        let output = unique_sibling(input)?;
        self.set_placeholder(input, &output, annotation)?;
        Ok(output)
    }

    // === Discovery ===

    /// `/ByteRange` of the signature field `name`. `page` follows the
    /// trinary convention: `< 0` scans pages backwards, `0` forwards, and
    /// `>= 1` selects that single page.
    pub fn get_byte_range(
        &self,
        path: impl AsRef<Path>,
        page: i64,
        name: &str,
    ) -> SignResult<ByteRange> {
        ByteRangeReader::open(path)?.byte_range(page, name)
    }

    pub fn page_count(&self, path: impl AsRef<Path>) -> SignResult<usize> {
        Ok(ByteRangeReader::open(path)?.page_count())
    }

    // === Signing attributes ===

    /// Digest the document over `range` and build the unsigned
    /// authenticated attributes. Fills `digest`, `signing_time` and
    /// `auth_attr` of `info`.
    pub fn calculate_signing_attributes(
        &mut self,
        path: impl AsRef<Path>,
        range: &ByteRange,
        certificate: Option<&Certificate>,
        info: &mut SigningAttributes,
    ) -> SignResult<()> {
        info.digest = digest::byte_range_digest_b64(path.as_ref(), range, &mut self.buffer)?;
        info.auth_attr =
            cms_builder::compute_auth_attr(&info.digest, certificate, &mut info.signing_time)?;
        Ok(())
    }

    /// Build the authenticated attributes from an already-computed digest.
    pub fn calculate_signing_attributes_pre_bound(
        &self,
        certificate: &Certificate,
        info: &mut SigningAttributes,
    ) -> SignResult<()> {
        if info.digest.is_empty() {
            return Err(SignError::InvalidArgument(
                "SigningAttributes.digest".to_string(),
            ));
        }
        info.auth_attr = cms_builder::compute_auth_attr(
            &info.digest,
            Some(certificate),
            &mut info.signing_time,
        )?;
        Ok(())
    }

    /// Sign previously calculated attributes with a local RSA key,
    /// filling `enc_digest`.
    pub fn sign_signing_attributes(
        &self,
        key: &PrivateKey,
        info: &mut SigningAttributes,
    ) -> SignResult<()> {
        info.enc_digest = cms_builder::sign_auth_attr(key, &info.auth_attr)?;
        Ok(())
    }

    // === Document signing ===

    /// Local-key flow: compute attributes, sign them with `key`, assemble
    /// the CMS and inject it. Every computed intermediate is written back
    /// into `info`.
    pub fn sign_local(
        &mut self,
        path: impl AsRef<Path>,
        range: &ByteRange,
        digest_b64: &str,
        certificates: &Certificates,
        key: &PrivateKey,
        info: &mut SigningAttributes,
    ) -> SignResult<()> {
        let path = path.as_ref();
        info.digest = digest_b64.to_string();
        info.signing_time.clear();
        info.auth_attr.clear();
        info.enc_digest.clear();

        self.calculate_signing_attributes_pre_bound(&certificates.signing, info)?;
        self.sign_signing_attributes(key, info)?;

        let cms = cms_builder::assemble(
            certificates,
            &info.digest,
            &info.enc_digest,
            &info.signing_time,
        )?;
        injector::inject_contents(path, range, cms.as_der(), &mut self.buffer)
    }

    /// External-oracle flow: `info` carries the digest, signing time and
    /// the signature obtained out-of-band over `auth_attr`.
    pub fn sign_external(
        &mut self,
        path: impl AsRef<Path>,
        range: &ByteRange,
        info: &SigningAttributes,
        certificates: &Certificates,
    ) -> SignResult<()> {
        let cms = cms_builder::assemble(
            certificates,
            &info.digest,
            &info.enc_digest,
            &info.signing_time,
        )?;
        injector::inject_contents(path.as_ref(), range, cms.as_der(), &mut self.buffer)
    }

    // === Other ===

    /// Refill the reserved `/Contents` region with ASCII `'0'`.
    pub fn zero_out_contents(
        &mut self,
        path: impl AsRef<Path>,
        range: &ByteRange,
    ) -> SignResult<()> {
        injector::zero_out(path.as_ref(), range, &mut self.buffer)
    }

    /// Extract the embedded CMS and export it as a PKCS#7 PEM file.
    pub fn export_pkcs7(
        &self,
        pdf_path: impl AsRef<Path>,
        range: &ByteRange,
        out_path: impl AsRef<Path>,
    ) -> SignResult<()> {
        injector::export_pem(pdf_path.as_ref(), range, out_path.as_ref())
    }
}

/// Derive a not-yet-existing sibling path of `input` and claim it.
fn unique_sibling(input: &Path) -> SignResult<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    let extension = input.extension().and_then(|s| s.to_str()).unwrap_or("pdf");
    let directory = input.parent().unwrap_or_else(|| Path::new("."));
    let pid = std::process::id();

    for counter in 0u32..10_000 {
        let candidate = directory.join(format!("{stem}-{pid}-{counter}.{extension}"));
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(SignError::io(&candidate, e)),
        }
    }
    Err(SignError::AlreadyExists(format!(
        "no unique sibling available for '{}'",
        input.display()
    )))
}
