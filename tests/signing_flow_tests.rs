//! End-to-end signing flows: local key, split flow against a simulated
//! external signer, and the extraction operations.

mod common;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use openssl::hash::MessageDigest;
use openssl::pkcs7::Pkcs7;
use openssl::sign::Verifier;
use sha2::{Digest, Sha256};

use pdf_signer::services::cms_builder::decode_base64_any;
use pdf_signer::{
    Certificate, CertificateRole, Certificates, PdfSigner, PrivateKey, Rect, SignError,
    SignatureAnnotation, SignatureInfo, SigningAttributes,
};

struct SignedFixture {
    dir: tempfile::TempDir,
    output: std::path::PathBuf,
    range: pdf_signer::ByteRange,
    info: SigningAttributes,
    identity: common::TestIdentity,
}

fn placeholder_fixture(
    dir: &tempfile::TempDir,
    size_in_bytes: usize,
    visible: bool,
) -> (std::path::PathBuf, SignatureAnnotation) {
    let input = dir.path().join("fixture.pdf");
    std::fs::write(&input, common::build_test_pdf(2)).unwrap();

    let mut annotation = SignatureAnnotation::new("approval-1");
    annotation.set_geometry(Rect::new(36.0, 720.0, 180.0, 60.0), 1, visible);
    annotation.set_info(SignatureInfo {
        author: "Unit Signer".to_string(),
        reason: "Integration test".to_string(),
        date_time: "2024-05-02 10:11:12".to_string(),
        size_in_bytes,
        ..SignatureInfo::default()
    });

    let output = dir.path().join("placeholder.pdf");
    let mut signer = PdfSigner::default();
    signer
        .set_placeholder(&input, &output, &mut annotation)
        .unwrap();
    (output, annotation)
}

fn sign_locally() -> SignedFixture {
    let dir = tempfile::tempdir().unwrap();
    let identity = common::generate_identity(dir.path(), "Unit Signer");
    let (output, annotation) = placeholder_fixture(&dir, 8192, true);
    let range = *annotation.byte_range().unwrap();

    let certificates = Certificates::new(Certificate::from_file(
        &identity.cert_path,
        CertificateRole::Entity,
    ));
    let key = PrivateKey::new(&identity.key_path);

    let mut signer = PdfSigner::default();
    let mut info = SigningAttributes::default();
    signer
        .calculate_signing_attributes(&output, &range, Some(&certificates.signing), &mut info)
        .unwrap();
    let digest = info.digest.clone();
    signer
        .sign_local(&output, &range, &digest, &certificates, &key, &mut info)
        .unwrap();

    SignedFixture {
        dir,
        output,
        range,
        info,
        identity,
    }
}

#[test]
fn local_sign_embeds_matching_digest_and_valid_cms() {
    let fixture = sign_locally();
    let bytes = std::fs::read(&fixture.output).unwrap();

    // hex region is printable uppercase hex throughout
    let start = fixture.range.contents_start() as usize;
    let end = fixture.range.after_start as usize - 1;
    assert!(bytes[start..end]
        .iter()
        .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(b)));

    // digest over the byte ranges of the *signed* file still matches what
    // was signed: only the hex region changed
    let mut hasher = Sha256::new();
    hasher.update(&bytes[..fixture.range.before_size as usize]);
    hasher.update(&bytes[fixture.range.after_start as usize..]);
    let recomputed = STANDARD.encode(hasher.finalize());
    assert_eq!(recomputed, fixture.info.digest);

    // the embedded CMS parses and carries the digest in its signedAttrs
    let region = pdf_signer::services::injector::extract_contents(&fixture.output, &fixture.range).unwrap();
    let digest_bytes = decode_base64_any(&fixture.info.digest).unwrap();
    assert!(region
        .windows(digest_bytes.len())
        .any(|window| window == digest_bytes.as_slice()));
    Pkcs7::from_der(&region).expect("embedded CMS parses");

    // the signer certificate travels inside the CMS
    let cert_der = fixture.identity.cert.to_der().unwrap();
    assert!(region
        .windows(cert_der.len())
        .any(|window| window == cert_der.as_slice()));
}

#[test]
fn signature_verifies_against_the_auth_attr() {
    let fixture = sign_locally();

    let auth_attr = decode_base64_any(&fixture.info.auth_attr).unwrap();
    let signature = decode_base64_any(&fixture.info.enc_digest).unwrap();

    let public = fixture.identity.pkey.clone();
    let mut verifier = Verifier::new(MessageDigest::sha256(), &public).unwrap();
    verifier.update(&auth_attr).unwrap();
    assert!(verifier.verify(&signature).unwrap());
}

#[test]
fn split_flow_matches_local_flow_byte_for_byte() {
    let dir = tempfile::tempdir().unwrap();
    let identity = common::generate_identity(dir.path(), "Unit Signer");
    let (local_path, annotation) = placeholder_fixture(&dir, 8192, false);
    let range = *annotation.byte_range().unwrap();

    // two identical placeholder copies
    let external_path = dir.path().join("external.pdf");
    std::fs::copy(&local_path, &external_path).unwrap();

    let certificates = Certificates::new(Certificate::from_file(
        &identity.cert_path,
        CertificateRole::Entity,
    ));
    let key = PrivateKey::new(&identity.key_path);

    let mut signer = PdfSigner::default();

    // local flow
    let mut local_info = SigningAttributes::default();
    signer
        .calculate_signing_attributes(&local_path, &range, None, &mut local_info)
        .unwrap();
    let digest = local_info.digest.clone();
    signer
        .sign_local(&local_path, &range, &digest, &certificates, &key, &mut local_info)
        .unwrap();

    // split flow: same digest and signing time, signature produced "remotely"
    let mut external_info = SigningAttributes {
        digest: local_info.digest.clone(),
        signing_time: local_info.signing_time.clone(),
        ..SigningAttributes::default()
    };
    signer
        .calculate_signing_attributes_pre_bound(&certificates.signing, &mut external_info)
        .unwrap();
    assert_eq!(external_info.auth_attr, local_info.auth_attr);

    // the "HSM": a local RSA key standing in for the oracle
    signer
        .sign_signing_attributes(&key, &mut external_info)
        .unwrap();
    assert_eq!(external_info.enc_digest, local_info.enc_digest);

    signer
        .sign_external(&external_path, &range, &external_info, &certificates)
        .unwrap();

    assert_eq!(
        std::fs::read(&local_path).unwrap(),
        std::fs::read(&external_path).unwrap()
    );
}

#[test]
fn assembled_cms_fits_the_default_reservation() {
    let dir = tempfile::tempdir().unwrap();
    let identity = common::generate_identity(dir.path(), "Unit Signer");
    let certificates = Certificates::new(Certificate::from_file(
        &identity.cert_path,
        CertificateRole::Entity,
    ));
    let key = PrivateKey::new(&identity.key_path);

    let signer = PdfSigner::default();
    let mut info = SigningAttributes {
        digest: STANDARD.encode([0x5Au8; 32]),
        ..SigningAttributes::default()
    };
    signer
        .calculate_signing_attributes_pre_bound(&certificates.signing, &mut info)
        .unwrap();
    signer.sign_signing_attributes(&key, &mut info).unwrap();

    let cms = pdf_signer::services::cms_builder::assemble(
        &certificates,
        &info.digest,
        &info.enc_digest,
        &info.signing_time,
    )
    .unwrap();

    assert!(!cms.is_empty());
    assert_eq!(cms.as_der()[0], 0x30);
    // a single-certificate RSA-2048 signature must leave ample slack in
    // the typical 8 KiB reservation
    assert!(cms.len() <= 8192, "CMS unexpectedly large: {} bytes", cms.len());
}

#[test]
fn undersized_placeholder_fails_without_touching_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let entity = common::generate_identity(dir.path(), "Unit Signer");
    let intermediate = common::generate_identity(dir.path(), "Fixture Intermediate");
    let issuer = common::generate_identity(dir.path(), "Fixture Issuer");
    let (output, annotation) = placeholder_fixture(&dir, 64, false);
    let range = *annotation.byte_range().unwrap();

    let certificates = Certificates::new(Certificate::from_file(
        &entity.cert_path,
        CertificateRole::Entity,
    ))
    .with_chain(vec![
        Certificate::from_file(&intermediate.cert_path, CertificateRole::Intermediate),
        Certificate::from_file(&issuer.cert_path, CertificateRole::Issuer),
    ]);
    let key = PrivateKey::new(&entity.key_path);

    let before = std::fs::read(&output).unwrap();
    let mut signer = PdfSigner::default();
    let mut info = SigningAttributes::default();
    signer
        .calculate_signing_attributes(&output, &range, None, &mut info)
        .unwrap();
    let digest = info.digest.clone();
    let err = signer
        .sign_local(&output, &range, &digest, &certificates, &key, &mut info)
        .unwrap_err();

    assert!(matches!(err, SignError::PlaceholderTooSmall { .. }));
    assert_eq!(std::fs::read(&output).unwrap(), before);
}

#[test]
fn byte_range_extraction_and_pem_export() {
    let fixture = sign_locally();

    let mut signer = PdfSigner::default();
    let discovered = signer
        .get_byte_range(&fixture.output, 0, "approval-1")
        .unwrap();
    assert_eq!(discovered, fixture.range);

    let pem_path = fixture.dir.path().join("signature.p7.pem");
    signer
        .export_pkcs7(&fixture.output, &discovered, &pem_path)
        .unwrap();

    let pem = std::fs::read(&pem_path).unwrap();
    assert!(pem.starts_with(b"-----BEGIN PKCS7-----"));

    // the exported PEM re-encodes to exactly the DER embedded in /Contents
    let exported = Pkcs7::from_pem(&pem).unwrap().to_der().unwrap();
    let region = pdf_signer::services::injector::extract_contents(&fixture.output, &fixture.range).unwrap();
    let embedded = &region[..common::der_total_len(&region)];
    assert_eq!(exported, embedded);
}

#[test]
fn zero_out_refills_the_whole_reservation() {
    let fixture = sign_locally();

    let mut signer = PdfSigner::default();
    signer
        .zero_out_contents(&fixture.output, &fixture.range)
        .unwrap();

    let bytes = std::fs::read(&fixture.output).unwrap();
    let start = fixture.range.contents_start() as usize;
    let end = fixture.range.after_start as usize - 1;
    assert!(bytes[start..end].iter().all(|&b| b == b'0'));
    assert_eq!(bytes[start - 1], b'<');
    assert_eq!(bytes[end], b'>');
}

#[test]
fn signing_time_is_a_utc_time_string() {
    let signer = PdfSigner::default();
    let mut signing_time = String::new();
    signer.get_signing_time(&mut signing_time);

    assert_eq!(signing_time.len(), 13);
    assert!(signing_time.ends_with('Z'));
    assert!(signing_time[..12].bytes().all(|b| b.is_ascii_digit()));
}

#[test]
fn convenience_pipeline_signs_in_one_call() {
    let dir = tempfile::tempdir().unwrap();
    let identity = common::generate_identity(dir.path(), "Unit Signer");
    let input = dir.path().join("fixture.pdf");
    std::fs::write(&input, common::build_test_pdf(2)).unwrap();
    let output = dir.path().join("signed.pdf");

    let mut annotation = SignatureAnnotation::new("approval-1");
    annotation.set_geometry(Rect::new(0.0, 0.0, 0.0, 0.0), 1, false);
    annotation.set_info(SignatureInfo {
        reason: "One call".to_string(),
        size_in_bytes: 8192,
        ..SignatureInfo::default()
    });

    let certificates = Certificates::new(Certificate::from_file(
        &identity.cert_path,
        CertificateRole::Entity,
    ));
    let key = PrivateKey::new(&identity.key_path);

    let info = pdf_signer::sign_pdf_file(&input, &output, &mut annotation, &certificates, &key)
        .unwrap();
    assert!(!info.digest.is_empty());
    assert!(!info.enc_digest.is_empty());

    let range = annotation.byte_range().unwrap();
    let region = pdf_signer::services::injector::extract_contents(&output, range).unwrap();
    Pkcs7::from_der(&region).expect("embedded CMS parses");
}
