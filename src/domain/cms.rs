//! CMS `SignedData` domain wrappers.
//!
//! Thin newtypes around DER bytes so assembly steps cannot be mixed up,
//! plus the canonical ordering rule for signed attributes: a DER SET OF
//! sorts its elements by their encoded octets.

use std::fmt;

/// A finished, DER-encoded CMS `SignedData` (outer `ContentInfo`).
pub struct CmsSignedData {
    der: Vec<u8>,
}

impl CmsSignedData {
    #[must_use]
    pub fn from_der(der: Vec<u8>) -> Self {
        Self { der }
    }

    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.der.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.der.is_empty()
    }
}

impl fmt::Debug for CmsSignedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CmsSignedData(len={})", self.der.len())
    }
}

/// One complete `Attribute` SEQUENCE, tagged with its dotted OID for
/// diagnostics.
#[derive(Clone)]
pub struct SignedAttribute {
    pub oid: &'static str,
    pub der: Vec<u8>,
}

impl fmt::Debug for SignedAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignedAttribute(oid={}, len={})", self.oid, self.der.len())
    }
}

/// Canonically ordered signed attributes: the concatenation is ready to be
/// wrapped in either the SET OF form (what the oracle signs) or the
/// `[0]` IMPLICIT form (what goes on the wire).
pub struct SignedAttributesCanonical {
    ordered: Vec<SignedAttribute>,
    concatenated_der: Vec<u8>,
}

impl SignedAttributesCanonical {
    #[must_use]
    pub fn new(attrs: Vec<SignedAttribute>) -> Self {
        // a DER SET OF serializes its elements in ascending encoded-octet
        // order, regardless of the order attributes were declared in
        let mut ordered = attrs;
        ordered.sort_by(|left, right| left.der.cmp(&right.der));
        let concatenated_der = ordered
            .iter()
            .flat_map(|attr| attr.der.iter().copied())
            .collect();
        Self {
            ordered,
            concatenated_der,
        }
    }

    #[must_use]
    pub fn concatenated_der(&self) -> &[u8] {
        &self.concatenated_der
    }

    #[must_use]
    pub fn ordered(&self) -> &[SignedAttribute] {
        &self.ordered
    }
}

impl fmt::Debug for SignedAttributesCanonical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let oids: Vec<&str> = self.ordered.iter().map(|attr| attr.oid).collect();
        write!(
            f,
            "SignedAttributesCanonical[{}; {} bytes]",
            oids.join(", "),
            self.concatenated_der.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_ordering_is_lexicographic_by_der() {
        let a = SignedAttribute {
            oid: "b",
            der: vec![0x30, 0x03, 0x02, 0x01, 0x02],
        };
        let b = SignedAttribute {
            oid: "a",
            der: vec![0x30, 0x03, 0x02, 0x01, 0x01],
        };
        let c = SignedAttribute {
            oid: "c",
            der: vec![0x30, 0x03, 0x02, 0x01, 0x03],
        };
        let canonical = SignedAttributesCanonical::new(vec![a.clone(), b.clone(), c.clone()]);
        let ordered: Vec<_> = canonical.ordered().iter().map(|x| x.oid).collect();
        assert_eq!(ordered, vec!["a", "b", "c"]);

        // determinism: any input order concatenates identically
        let canonical2 = SignedAttributesCanonical::new(vec![c, a, b]);
        assert_eq!(canonical.concatenated_der(), canonical2.concatenated_der());
    }
}
