//! PDF-facing layer: byte-range discovery, placeholder insertion and the
//! appearance painter capability.

pub mod appearance;
pub mod reader;
pub mod syntax;
pub mod writer;

pub use appearance::{SignaturePainter, TextAppearancePainter};
pub use reader::ByteRangeReader;
pub use writer::{adjust_byte_range, PlaceholderWriter};

use lopdf::{Dictionary, Document, Object};

use crate::infra::error::{SignError, SignResult};

/// Follow indirect references until a direct object is reached.
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> SignResult<&'a Object> {
    let mut current = object;
    for _ in 0..32 {
        match current {
            Object::Reference(id) => current = doc.get_object(*id)?,
            direct => return Ok(direct),
        }
    }
    Err(SignError::PdfMalformed(
        "reference chain too deep".to_string(),
    ))
}

/// `/FT` of a field, looked up on the field itself or inherited from its
/// `/Parent` chain.
pub(crate) fn field_type(doc: &Document, field: &Dictionary) -> SignResult<Option<Vec<u8>>> {
    let mut dict = field;
    for _ in 0..32 {
        if let Ok(ft) = dict.get(b"FT") {
            let name = resolve(doc, ft)?
                .as_name()
                .map_err(|_| SignError::PdfMalformed("field /FT is not a name".to_string()))?;
            return Ok(Some(name.to_vec()));
        }
        match dict.get(b"Parent") {
            Ok(parent) => dict = resolve(doc, parent)?.as_dict()?,
            Err(_) => return Ok(None),
        }
    }
    Err(SignError::PdfMalformed("/Parent chain too deep".to_string()))
}
