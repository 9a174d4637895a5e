//! PDF Signer Library
//!
//! Affixes PAdES-style CMS/PKCS#7 signatures to existing PDF documents.
//! A signing session runs in three phases: reserve a zero-filled
//! `/Contents` placeholder with a correctly adjusted `/ByteRange`, digest
//! the two byte ranges flanking it and build the detached CMS
//! `SignedData`, then inject the DER into the reservation as uppercase
//! hex. Both a local RSA private key and a split flow against an external
//! signing oracle (HSM) are supported.

pub mod domain;
pub mod infra;
pub mod pdf;
pub mod services;

use std::path::Path;

pub use domain::cms::CmsSignedData;
pub use domain::types::{
    ByteRange, Certificate, CertificateRole, CertificateSource, Certificates, PrivateKey, Rect,
    SignatureAnnotation, SignatureInfo, SigningAttributes,
};
pub use infra::error::{SignError, SignResult};
pub use pdf::appearance::{SignaturePainter, TextAppearancePainter};
pub use pdf::reader::ByteRangeReader;
pub use services::signer::PdfSigner;

/// Convenience wrapper for the whole local-key pipeline: place a
/// placeholder for `annotation` in a copy of `input` at `output`, then
/// digest, sign and inject in one go.
///
/// Returns the signing attributes that were computed along the way.
pub fn sign_pdf_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    annotation: &mut SignatureAnnotation,
    certificates: &Certificates,
    key: &PrivateKey,
) -> SignResult<SigningAttributes> {
    let input = input.as_ref();
    let output = output.as_ref();
    log::info!(
        "signing {} -> {} as '{}'",
        input.display(),
        output.display(),
        annotation.name()
    );

    let mut signer = PdfSigner::default();
    signer.set_placeholder(input, output, annotation)?;
    let range = *annotation
        .byte_range()
        .ok_or_else(|| SignError::InvalidArgument("SignatureAnnotation.byte_range".to_string()))?;

    let mut info = SigningAttributes::default();
    signer.calculate_signing_attributes(output, &range, Some(&certificates.signing), &mut info)?;
    signer.sign_signing_attributes(key, &mut info)?;
    signer.sign_external(output, &range, &info, certificates)?;

    log::info!("successfully signed {}", output.display());
    Ok(info)
}
