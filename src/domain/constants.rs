//! Centralized constants for commonly repeated DER/OID bytes and PDF names.
//! Keep this intentionally small; only broadly reused literals should live here.

// === ASN.1 DER Constants ===

/// ASN.1 NULL value (tag + zero length)
pub const ASN1_NULL: &[u8] = &[0x05, 0x00];

/// ASN.1 SEQUENCE tag (constructed)
pub const ASN1_SEQUENCE_TAG: u8 = 0x30;

/// ASN.1 SET tag (constructed)
pub const ASN1_SET_TAG: u8 = 0x31;

/// ASN.1 INTEGER tag
pub const ASN1_INTEGER_TAG: u8 = 0x02;

/// ASN.1 OBJECT IDENTIFIER tag
pub const ASN1_OID_TAG: u8 = 0x06;

/// ASN.1 OCTET STRING tag
pub const ASN1_OCTET_STRING_TAG: u8 = 0x04;

/// ASN.1 UTCTime tag
pub const ASN1_UTCTIME_TAG: u8 = 0x17;

/// ASN.1 context-specific constructed tag [0]
pub const ASN1_CONTEXT_0_TAG: u8 = 0xA0;

/// INTEGER value 1 as a complete TLV (CMS version fields)
pub const DER_INTEGER_ONE: &[u8] = &[0x02, 0x01, 0x01];

// === CMS / PKCS OID Constants (value bytes, without tag/length) ===

/// id-data (1.2.840.113549.1.7.1)
pub const OID_PKCS7_DATA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x01];

/// id-signedData (1.2.840.113549.1.7.2)
pub const OID_PKCS7_SIGNED_DATA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x02];

/// contentType attribute (1.2.840.113549.1.9.3)
pub const OID_ATTR_CONTENT_TYPE: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x03];

/// messageDigest attribute (1.2.840.113549.1.9.4)
pub const OID_ATTR_MESSAGE_DIGEST: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x04];

/// signingTime attribute (1.2.840.113549.1.9.5)
pub const OID_ATTR_SIGNING_TIME: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x05];

/// id-sha256 (2.16.840.1.101.3.4.2.1)
pub const OID_SHA256: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01];

/// rsaEncryption (1.2.840.113549.1.1.1)
pub const OID_RSA_ENCRYPTION: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x01];

// === PDF Signature Dictionary Constants ===

/// `/Filter` value of the signature dictionary
pub const SIG_FILTER: &str = "Adobe.PPKLite";

/// `/SubFilter` value for detached PKCS#7 signatures
pub const SIG_SUBFILTER: &str = "adbe.pkcs7.detached";

/// `/SigFlags` written into the AcroForm (SignaturesExist | AppendOnly)
pub const ACROFORM_SIG_FLAGS: i64 = 3;

/// Widget annotation flags for a visible signature (Print | Locked)
pub const ANNOT_FLAGS_VISIBLE: i64 = 0x04 | 0x80;

/// Widget annotation flags for an invisible signature (Invisible | Hidden | Locked)
pub const ANNOT_FLAGS_INVISIBLE: i64 = 0x01 | 0x02 | 0x80;

/// Field flag marking the signature field read-only
pub const FIELD_FLAG_READ_ONLY: i64 = 1;

/// Widest `/ByteRange` entry the beacon reserves room for; the post-write
/// adjustment pads shorter real values with spaces so offsets never shift.
pub const BYTE_RANGE_BEACON: i64 = 0xFFFF_FFFF;
