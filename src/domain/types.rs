//! Core data model of the signing pipeline.
//!
//! These types are plain data exchanged between phases; the interchange
//! types (`SignatureInfo`, `SigningAttributes`) additionally derive serde
//! so callers can ship them across whatever transport the external signing
//! round-trip uses.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::infra::error::{SignError, SignResult};

/// The two disjoint byte intervals of a signed PDF covered by the digest.
///
/// Invariants: `before_start + before_size <= after_start`,
/// `after_start + after_size <= file_size`, and the gap between the two
/// intervals holds exactly the `<...hex...>` placeholder including its
/// angle brackets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ByteRange {
    pub before_start: u64,
    pub before_size: u64,
    pub after_start: u64,
    pub after_size: u64,
}

impl ByteRange {
    #[must_use]
    pub fn new(before_start: u64, before_size: u64, after_start: u64, after_size: u64) -> Self {
        Self {
            before_start,
            before_size,
            after_start,
            after_size,
        }
    }

    /// Start offset of the reserved hex region, just past `<`.
    #[must_use]
    pub fn contents_start(&self) -> u64 {
        self.before_start + self.before_size + 1
    }

    /// Length of the reserved hex region, excluding both angle brackets.
    #[must_use]
    pub fn contents_len(&self) -> u64 {
        (self.after_start - 1).saturating_sub(self.contents_start())
    }

    /// Check the quadruple against the size of the file it refers to.
    pub fn validate(&self, file_size: u64) -> SignResult<()> {
        if self.before_start + self.before_size > self.after_start
            || self.after_start + self.after_size > file_size
            || self.after_start < self.before_start + self.before_size + 2
        {
            return Err(SignError::PdfMalformed(format!(
                "/ByteRange [{} {} {} {}] inconsistent with file size {}",
                self.before_start, self.before_size, self.after_start, self.after_size, file_size
            )));
        }
        Ok(())
    }
}

/// Annotation rectangle in points. `x`/`y` are top-origin as supplied by
/// callers; the placeholder writer converts to PDF bottom-origin
/// coordinates against the page height.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    #[must_use]
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }
}

/// Advisory role of a certificate within the signing chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateRole {
    Entity,
    Intermediate,
    Issuer,
}

/// An X.509 certificate identified by an in-memory PEM blob or a
/// filesystem path, tagged with its chain role.
#[derive(Debug, Clone)]
pub struct Certificate {
    source: CertificateSource,
    role: CertificateRole,
}

#[derive(Debug, Clone)]
pub enum CertificateSource {
    /// Path to a PEM file on disk.
    File(PathBuf),
    /// PEM data already in memory.
    Memory(String),
}

impl Certificate {
    #[must_use]
    pub fn from_file(path: impl Into<PathBuf>, role: CertificateRole) -> Self {
        Self {
            source: CertificateSource::File(path.into()),
            role,
        }
    }

    #[must_use]
    pub fn from_pem(pem: impl Into<String>, role: CertificateRole) -> Self {
        Self {
            source: CertificateSource::Memory(pem.into()),
            role,
        }
    }

    #[must_use]
    pub fn source(&self) -> &CertificateSource {
        &self.source
    }

    #[must_use]
    pub fn role(&self) -> CertificateRole {
        self.role
    }

    /// Read the PEM text, from memory or from disk.
    pub fn pem(&self) -> SignResult<String> {
        match &self.source {
            CertificateSource::Memory(data) => Ok(data.clone()),
            CertificateSource::File(path) => {
                std::fs::read_to_string(path).map_err(|e| SignError::io(path, e))
            }
        }
    }
}

/// The signing certificate plus the remaining certificates of its chain,
/// in the order they should be embedded after the entity certificate.
#[derive(Debug, Clone)]
pub struct Certificates {
    pub signing: Certificate,
    pub chain: Vec<Certificate>,
}

impl Certificates {
    #[must_use]
    pub fn new(signing: Certificate) -> Self {
        Self {
            signing,
            chain: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_chain(mut self, chain: Vec<Certificate>) -> Self {
        self.chain = chain;
        self
    }
}

/// A PEM-encoded RSA private key on disk, with an optional password.
/// The password stays in process memory and is only handed to the PEM
/// loader; it is never persisted.
#[derive(Clone)]
pub struct PrivateKey {
    path: PathBuf,
    password: Option<String>,
}

impl PrivateKey {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            password: None,
        }
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never leak the password through Debug output
        write!(f, "PrivateKey(path={}, password=[{}])", self.path.display(),
            if self.password.is_some() { "set" } else { "none" })
    }
}

/// Visible and verifiable attributes of one signature.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub oid: String,
    pub author: String,
    pub reason: String,
    pub certified_by: String,
    /// Display string rendered into the appearance stream.
    pub date_time: String,
    /// Display string, UTC.
    pub utc_date_time: String,
    /// Size of the `/Contents` reservation in bytes; the hex region holds
    /// twice as many characters. Must exceed the final CMS DER length.
    pub size_in_bytes: usize,
}

/// Intermediate state exchanged between the CMS builder and the external
/// signer. All binary fields travel Base64-encoded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SigningAttributes {
    /// Base64 of SHA-256 over the document's two byte-range chunks.
    pub digest: String,
    /// ASN.1 UTCTime string `YYMMDDHHMMSSZ`.
    pub signing_time: String,
    /// Base64 DER of the SET OF Attribute handed to the signer.
    pub auth_attr: String,
    /// Base64 of the RSA-PKCS#1 v1.5 signature over the decoded `auth_attr`.
    pub enc_digest: String,
}

/// A placeholder request: where the signature goes and what it says.
/// Built by the caller, stamped once with the computed `ByteRange` by the
/// placeholder phase, then consumed read-only by the later phases.
#[derive(Debug, Clone)]
pub struct SignatureAnnotation {
    name: String,
    page: usize,
    rect: Rect,
    visible: bool,
    info: SignatureInfo,
    byte_range: Option<ByteRange>,
}

impl SignatureAnnotation {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            page: 1,
            rect: Rect::default(),
            visible: false,
            info: SignatureInfo::default(),
            byte_range: None,
        }
    }

    /// Set rectangle, 1-based page and visibility in one call.
    pub fn set_geometry(&mut self, rect: Rect, page: usize, visible: bool) {
        self.rect = rect;
        self.page = page;
        self.visible = visible;
    }

    pub fn set_info(&mut self, info: SignatureInfo) {
        self.info = info;
    }

    pub(crate) fn set_byte_range(&mut self, range: ByteRange) {
        self.byte_range = Some(range);
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn page(&self) -> usize {
        self.page
    }

    #[must_use]
    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    #[must_use]
    pub fn visible(&self) -> bool {
        self.visible
    }

    #[must_use]
    pub fn info(&self) -> &SignatureInfo {
        &self.info
    }

    /// The computed quadruple; `None` until the placeholder phase ran.
    #[must_use]
    pub fn byte_range(&self) -> Option<&ByteRange> {
        self.byte_range.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_range_contents_span() {
        // "...< h e x >..." with '<' at 10 and '>' at 15
        let range = ByteRange::new(0, 10, 16, 84);
        assert_eq!(range.contents_start(), 11);
        assert_eq!(range.contents_len(), 4);
    }

    #[test]
    fn byte_range_validation() {
        let range = ByteRange::new(0, 10, 16, 84);
        assert!(range.validate(100).is_ok());
        // after interval runs past the file end
        assert!(range.validate(99).is_err());
        // intervals overlap
        assert!(ByteRange::new(0, 20, 16, 84).validate(100).is_err());
    }

    #[test]
    fn private_key_debug_hides_password() {
        let key = PrivateKey::new("/tmp/key.pem").with_password("hunter2");
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn annotation_lifecycle() {
        let mut annotation = SignatureAnnotation::new("approval-1");
        assert!(annotation.byte_range().is_none());
        annotation.set_geometry(Rect::new(36.0, 720.0, 180.0, 60.0), 1, true);
        annotation.set_byte_range(ByteRange::new(0, 100, 300, 50));
        assert_eq!(annotation.byte_range().unwrap().after_start, 300);
    }
}
