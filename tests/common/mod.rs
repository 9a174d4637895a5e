//! Shared fixtures: a deterministic classic-xref PDF builder and throwaway
//! RSA signing identities.
#![allow(dead_code)] // each test binary uses its own subset

use std::path::{Path, PathBuf};

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::{X509Builder, X509NameBuilder, X509};

/// Build a small, valid PDF with `page_count` pages and a classic xref
/// table. Offsets are recorded while appending, so the table is correct by
/// construction.
pub fn build_test_pdf(page_count: usize) -> Vec<u8> {
    assert!(page_count >= 1);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

    let total = 2 + 2 * page_count;
    let mut offsets: Vec<usize> = Vec::with_capacity(total);
    let mut push_obj = |out: &mut Vec<u8>, offsets: &mut Vec<usize>, num: usize, body: String| {
        offsets.push(out.len());
        out.extend_from_slice(format!("{num} 0 obj\n{body}\nendobj\n").as_bytes());
    };

    push_obj(
        &mut out,
        &mut offsets,
        1,
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
    );

    let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", 3 + i)).collect();
    push_obj(
        &mut out,
        &mut offsets,
        2,
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 612 792] >>",
            kids.join(" "),
            page_count
        ),
    );

    for i in 0..page_count {
        push_obj(
            &mut out,
            &mut offsets,
            3 + i,
            format!(
                "<< /Type /Page /Parent 2 0 R /Resources << >> /Contents {} 0 R >>",
                3 + page_count + i
            ),
        );
    }
    for i in 0..page_count {
        let text = format!("BT 72 720 Td (Fixture page {}) Tj ET", i + 1);
        push_obj(
            &mut out,
            &mut offsets,
            3 + page_count + i,
            format!("<< /Length {} >>\nstream\n{}\nendstream", text.len(), text),
        );
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", total + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            total + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

pub struct TestIdentity {
    pub cert: X509,
    pub pkey: PKey<Private>,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Generate a self-signed RSA-2048 identity and drop cert + PKCS#8 key
/// PEMs into `dir`.
pub fn generate_identity(dir: &Path, common_name: &str) -> TestIdentity {
    let rsa = Rsa::generate(2048).expect("rsa generate");
    let pkey = PKey::from_rsa(rsa).expect("pkey");

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", common_name).unwrap();
    name.append_entry_by_text("O", "Fixture Signing").unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(0x1001).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&pkey).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(365).unwrap())
        .unwrap();
    builder.sign(&pkey, MessageDigest::sha256()).unwrap();
    let cert = builder.build();

    let slug = common_name.to_lowercase().replace(' ', "-");
    let cert_path = dir.join(format!("{slug}-cert.pem"));
    let key_path = dir.join(format!("{slug}-key.pem"));
    std::fs::write(&cert_path, cert.to_pem().unwrap()).unwrap();
    std::fs::write(&key_path, pkey.private_key_to_pem_pkcs8().unwrap()).unwrap();

    TestIdentity {
        cert,
        pkey,
        cert_path,
        key_path,
    }
}

/// Total encoded length of the outer DER TLV starting at `bytes[0]`.
pub fn der_total_len(bytes: &[u8]) -> usize {
    assert!(bytes.len() >= 2);
    let first = bytes[1] as usize;
    if first < 0x80 {
        2 + first
    } else {
        let count = first & 0x7F;
        let mut len = 0usize;
        for &b in &bytes[2..2 + count] {
            len = (len << 8) | b as usize;
        }
        2 + count + len
    }
}
