//! CMS `SignedData` assembly.
//!
//! Three entry points mirror the three halves of the signing round-trip:
//! `compute_auth_attr` emits the DER the oracle signs, `sign_auth_attr`
//! plays the oracle with a local RSA key, and `assemble` produces the
//! finished detached `SignedData` from the pieces.
//!
//! The structures are concatenated DER; the byte vocabulary lives in
//! `domain::constants`.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;

use crate::domain::cms::{CmsSignedData, SignedAttribute, SignedAttributesCanonical};
use crate::domain::constants;
use crate::domain::types::{Certificate, Certificates, PrivateKey};
use crate::infra::error::{SignError, SignResult};

// === DER primitives ===

fn encode_len(len: usize) -> Vec<u8> {
    if len < 0x80 {
        vec![len as u8]
    } else if len < 0x100 {
        vec![0x81, len as u8]
    } else if len < 0x1_0000 {
        vec![0x82, (len >> 8) as u8, (len & 0xFF) as u8]
    } else {
        vec![
            0x83,
            (len >> 16) as u8,
            ((len >> 8) & 0xFF) as u8,
            (len & 0xFF) as u8,
        ]
    }
}

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut der = vec![tag];
    der.extend_from_slice(&encode_len(content.len()));
    der.extend_from_slice(content);
    der
}

fn oid(value: &[u8]) -> Vec<u8> {
    tlv(constants::ASN1_OID_TAG, value)
}

/// AlgorithmIdentifier for SHA-256 with explicit NULL parameters.
fn algorithm_sha256() -> Vec<u8> {
    let mut body = oid(constants::OID_SHA256);
    body.extend_from_slice(constants::ASN1_NULL);
    tlv(constants::ASN1_SEQUENCE_TAG, &body)
}

/// AlgorithmIdentifier for rsaEncryption with NULL parameters.
fn algorithm_rsa_encryption() -> Vec<u8> {
    let mut body = oid(constants::OID_RSA_ENCRYPTION);
    body.extend_from_slice(constants::ASN1_NULL);
    tlv(constants::ASN1_SEQUENCE_TAG, &body)
}

// === Base64 / time helpers ===

/// Decode RFC 4648 padded Base64, falling back to the URL-safe unpadded
/// alphabet on parse error. External signers legitimately emit either.
pub fn decode_base64_any(value: &str) -> SignResult<Vec<u8>> {
    match STANDARD.decode(value) {
        Ok(bytes) => Ok(bytes),
        Err(_) => URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|e| SignError::Base64Error(e.to_string())),
    }
}

/// Current UTC time as ASN.1 UTCTime `YYMMDDHHMMSSZ`.
#[must_use]
pub fn current_utc_time() -> String {
    chrono::Utc::now().format("%y%m%d%H%M%SZ").to_string()
}

fn validate_utc_time(value: &str) -> SignResult<()> {
    let bytes = value.as_bytes();
    let well_formed = bytes.len() == 13
        && bytes[12] == b'Z'
        && bytes[..12].iter().all(u8::is_ascii_digit);
    if well_formed {
        Ok(())
    } else {
        Err(SignError::CryptoFailure(format!(
            "'{value}' is not a YYMMDDHHMMSSZ UTCTime"
        )))
    }
}

// === Signed attributes ===

/// The authenticated attributes as canonically ordered Attribute SEQUENCEs.
/// `signing_time` may be empty, in which case the attribute is omitted.
fn signed_attributes(digest: &[u8], signing_time: &str) -> SignedAttributesCanonical {
    let mut attrs = Vec::with_capacity(3);

    // contentType = id-data
    let values = tlv(constants::ASN1_SET_TAG, &oid(constants::OID_PKCS7_DATA));
    let mut body = oid(constants::OID_ATTR_CONTENT_TYPE);
    body.extend_from_slice(&values);
    attrs.push(SignedAttribute {
        oid: "1.2.840.113549.1.9.3",
        der: tlv(constants::ASN1_SEQUENCE_TAG, &body),
    });

    // signingTime = UTCTime
    if !signing_time.is_empty() {
        let utc = tlv(constants::ASN1_UTCTIME_TAG, signing_time.as_bytes());
        let values = tlv(constants::ASN1_SET_TAG, &utc);
        let mut body = oid(constants::OID_ATTR_SIGNING_TIME);
        body.extend_from_slice(&values);
        attrs.push(SignedAttribute {
            oid: "1.2.840.113549.1.9.5",
            der: tlv(constants::ASN1_SEQUENCE_TAG, &body),
        });
    }

    // messageDigest = OCTET STRING
    let octets = tlv(constants::ASN1_OCTET_STRING_TAG, digest);
    let values = tlv(constants::ASN1_SET_TAG, &octets);
    let mut body = oid(constants::OID_ATTR_MESSAGE_DIGEST);
    body.extend_from_slice(&values);
    attrs.push(SignedAttribute {
        oid: "1.2.840.113549.1.9.4",
        der: tlv(constants::ASN1_SEQUENCE_TAG, &body),
    });

    SignedAttributesCanonical::new(attrs)
}

// === Certificate / key loading ===

pub(crate) fn load_x509(certificate: &Certificate) -> SignResult<X509> {
    let pem = certificate.pem()?;
    X509::from_pem(pem.as_bytes())
        .map_err(|e| SignError::CryptoFailure(format!("unable to parse certificate PEM: {e}")))
}

fn load_private_key(key: &PrivateKey) -> SignResult<PKey<Private>> {
    let pem = std::fs::read(key.path()).map_err(|e| SignError::io(key.path(), e))?;
    let loaded = match key.password() {
        Some(password) => PKey::private_key_from_pem_passphrase(&pem, password.as_bytes()),
        None => PKey::private_key_from_pem(&pem),
    };
    loaded.map_err(|e| SignError::CryptoFailure(format!("error while loading private key: {e}")))
}

/// IssuerAndSerialNumber SEQUENCE of the given certificate.
fn issuer_and_serial(x509: &X509) -> SignResult<Vec<u8>> {
    let issuer_der = x509.issuer_name().to_der()?;
    let serial_bn = x509.serial_number().to_bn()?;
    let mut serial_bytes = serial_bn.to_vec();
    if serial_bytes.is_empty() {
        serial_bytes.push(0);
    }
    // INTEGER is signed; prepend a zero when the high bit is set
    if serial_bytes[0] & 0x80 != 0 {
        serial_bytes.insert(0, 0);
    }
    let mut body = issuer_der;
    body.extend_from_slice(&tlv(constants::ASN1_INTEGER_TAG, &serial_bytes));
    Ok(tlv(constants::ASN1_SEQUENCE_TAG, &body))
}

// === Entry points ===

/// Build the SET OF authenticated attributes and return it Base64-encoded.
///
/// An empty `signing_time` is replaced with the current UTC time; the
/// value actually used is written back so a later `assemble` reproduces
/// the identical attribute set. The certificate, when supplied, is parsed
/// up front so a bad PEM surfaces before the external round-trip; it does
/// not alter the emitted bytes.
pub fn compute_auth_attr(
    digest_b64: &str,
    certificate: Option<&Certificate>,
    signing_time: &mut String,
) -> SignResult<String> {
    if digest_b64.is_empty() {
        return Err(SignError::InvalidArgument(
            "SigningAttributes.digest".to_string(),
        ));
    }
    if let Some(certificate) = certificate {
        load_x509(certificate)?;
    }
    if signing_time.is_empty() {
        *signing_time = current_utc_time();
    } else {
        validate_utc_time(signing_time)?;
    }
    let digest = decode_base64_any(digest_b64)?;

    let attrs = signed_attributes(&digest, signing_time);
    let set_of = tlv(constants::ASN1_SET_TAG, attrs.concatenated_der());
    log::debug!(
        "computed {} authenticated attributes ({} DER bytes)",
        attrs.ordered().len(),
        set_of.len()
    );
    Ok(STANDARD.encode(set_of))
}

/// RSA-PKCS#1 v1.5 sign the decoded `auth_attr` DER with SHA-256.
pub fn sign_auth_attr(key: &PrivateKey, auth_attr_b64: &str) -> SignResult<String> {
    if auth_attr_b64.is_empty() {
        return Err(SignError::InvalidArgument(
            "SigningAttributes.auth_attr".to_string(),
        ));
    }
    let auth_attr = decode_base64_any(auth_attr_b64)?;
    let pkey = load_private_key(key)?;

    let mut signer = openssl::sign::Signer::new(MessageDigest::sha256(), &pkey)?;
    signer.update(&auth_attr)?;
    let signature = signer.sign_to_vec()?;
    log::debug!("signed {} attribute bytes with RSA", auth_attr.len());
    Ok(STANDARD.encode(signature))
}

/// Assemble the detached CMS `SignedData`.
///
/// The signed attributes are rebuilt from `digest_b64` and `signing_time`,
/// so the SHA-256 of the emitted signedAttrs equals what the signature in
/// `enc_digest_b64` was computed over, provided both came from the same
/// `compute_auth_attr` output.
pub fn assemble(
    certificates: &Certificates,
    digest_b64: &str,
    enc_digest_b64: &str,
    signing_time: &str,
) -> SignResult<CmsSignedData> {
    if digest_b64.is_empty() {
        return Err(SignError::InvalidArgument(
            "SigningAttributes.digest".to_string(),
        ));
    }
    if enc_digest_b64.is_empty() {
        return Err(SignError::InvalidArgument(
            "SigningAttributes.enc_digest".to_string(),
        ));
    }
    if !signing_time.is_empty() {
        validate_utc_time(signing_time)?;
    }

    let entity = load_x509(&certificates.signing)?;
    let mut chain = Vec::with_capacity(certificates.chain.len());
    for certificate in &certificates.chain {
        chain.push(load_x509(certificate)?);
    }
    let digest = decode_base64_any(digest_b64)?;
    let enc_digest = decode_base64_any(enc_digest_b64)?;

    // SignerInfo
    let mut signer_info = Vec::new();
    signer_info.extend_from_slice(constants::DER_INTEGER_ONE);
    signer_info.extend_from_slice(&issuer_and_serial(&entity)?);
    signer_info.extend_from_slice(&algorithm_sha256());
    // signedAttrs travel as [0] IMPLICIT; the SET OF form is only signed
    let attrs = signed_attributes(&digest, signing_time);
    signer_info.extend_from_slice(&tlv(constants::ASN1_CONTEXT_0_TAG, attrs.concatenated_der()));
    signer_info.extend_from_slice(&algorithm_rsa_encryption());
    signer_info.extend_from_slice(&tlv(constants::ASN1_OCTET_STRING_TAG, &enc_digest));
    let signer_infos = tlv(
        constants::ASN1_SET_TAG,
        &tlv(constants::ASN1_SEQUENCE_TAG, &signer_info),
    );

    // SignedData
    let mut signed_data = Vec::new();
    signed_data.extend_from_slice(constants::DER_INTEGER_ONE);
    signed_data.extend_from_slice(&tlv(constants::ASN1_SET_TAG, &algorithm_sha256()));
    // encapContentInfo: eContentType only, eContent absent (detached)
    signed_data.extend_from_slice(&tlv(
        constants::ASN1_SEQUENCE_TAG,
        &oid(constants::OID_PKCS7_DATA),
    ));
    let mut cert_bytes = entity.to_der()?;
    for x509 in &chain {
        cert_bytes.extend_from_slice(&x509.to_der()?);
    }
    signed_data.extend_from_slice(&tlv(constants::ASN1_CONTEXT_0_TAG, &cert_bytes));
    signed_data.extend_from_slice(&signer_infos);
    let signed_data = tlv(constants::ASN1_SEQUENCE_TAG, &signed_data);

    // outer ContentInfo
    let mut content_info = oid(constants::OID_PKCS7_SIGNED_DATA);
    content_info.extend_from_slice(&tlv(constants::ASN1_CONTEXT_0_TAG, &signed_data));
    let der = tlv(constants::ASN1_SEQUENCE_TAG, &content_info);

    log::info!(
        "assembled detached CMS SignedData: {} bytes, {} certificate(s)",
        der.len(),
        1 + chain.len()
    );
    Ok(CmsSignedData::from_der(der))
}
