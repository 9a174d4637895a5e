//! Domain layer: data model, CMS wrappers and shared byte constants.

pub mod cms;
pub mod constants;
pub mod types;

pub use cms::{CmsSignedData, SignedAttribute, SignedAttributesCanonical};
pub use types::{
    ByteRange, Certificate, CertificateRole, CertificateSource, Certificates, PrivateKey, Rect,
    SignatureAnnotation, SignatureInfo, SigningAttributes,
};
