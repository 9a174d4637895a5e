//! Byte-range discovery on an existing PDF.
//!
//! Locates a `/Sig` field by fully-qualified name among the widget
//! annotations of the selected page(s) and extracts its `/ByteRange`
//! quadruple.

use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::domain::types::ByteRange;
use crate::infra::error::{SignError, SignResult};
use crate::pdf::{field_type, resolve};

#[derive(Debug)]
pub struct ByteRangeReader {
    doc: Document,
    path: PathBuf,
}

impl ByteRangeReader {
    /// Open a PDF read-only.
    pub fn open(path: impl AsRef<Path>) -> SignResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| SignError::io(path, e))?;
        let doc = Document::load_mem(&bytes)?;
        Ok(Self {
            doc,
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Find the `/ByteRange` of the signature field named `name`.
    ///
    /// Page selection is trinary: a negative page scans all pages
    /// last-to-first, `0` scans first-to-last, and a page `>= 1` scans only
    /// that page. Asking for a page the document does not have is a hard
    /// error, distinct from a signature that is merely absent.
    pub fn byte_range(&self, page: i64, name: &str) -> SignResult<ByteRange> {
        let pages: Vec<ObjectId> = self.doc.get_pages().values().copied().collect();

        let selected: Vec<ObjectId> = if page < 0 {
            pages.iter().rev().copied().collect()
        } else if page == 0 {
            pages
        } else {
            let index = page as usize;
            if index > pages.len() {
                return Err(SignError::InvalidArgument(format!(
                    "page {page} (document has {} pages)",
                    pages.len()
                )));
            }
            vec![pages[index - 1]]
        };

        for page_id in selected {
            if let Some(range) = self.scan_page(page_id, name)? {
                log::debug!(
                    "found /ByteRange for '{name}' in {}: [{} {} {} {}]",
                    self.path.display(),
                    range.before_start,
                    range.before_size,
                    range.after_start,
                    range.after_size
                );
                return Ok(range);
            }
        }
        Err(SignError::NotFound(format!("'/Sig' field named '{name}'")))
    }

    fn scan_page(&self, page_id: ObjectId, name: &str) -> SignResult<Option<ByteRange>> {
        let page = self.doc.get_dictionary(page_id)?;
        let Ok(annots) = page.get(b"Annots") else {
            return Ok(None);
        };
        let Ok(annots) = resolve(&self.doc, annots)?.as_array() else {
            return Ok(None);
        };

        for annot in annots {
            let Ok(Object::Dictionary(dict)) = resolve(&self.doc, annot) else {
                continue;
            };
            let is_widget = matches!(dict.get(b"Subtype"), Ok(Object::Name(sub)) if sub == b"Widget");
            if !is_widget {
                continue;
            }
            if field_type(&self.doc, dict)?.as_deref() != Some(b"Sig".as_slice()) {
                continue;
            }
            if self.fully_qualified_name(dict)? != name {
                continue;
            }
            return self.read_byte_range(dict, name).map(Some);
        }
        Ok(None)
    }

    /// Partial field names joined root-to-leaf with `.`.
    fn fully_qualified_name(&self, field: &Dictionary) -> SignResult<String> {
        let mut parts: Vec<String> = Vec::new();
        let mut dict = field;
        for _ in 0..32 {
            if let Ok(Object::String(bytes, _)) = dict.get(b"T") {
                parts.push(String::from_utf8_lossy(bytes).into_owned());
            }
            match dict.get(b"Parent") {
                Ok(parent) => dict = resolve(&self.doc, parent)?.as_dict()?,
                Err(_) => {
                    parts.reverse();
                    return Ok(parts.join("."));
                }
            }
        }
        Err(SignError::PdfMalformed("/Parent chain too deep".to_string()))
    }

    fn read_byte_range(&self, field: &Dictionary, name: &str) -> SignResult<ByteRange> {
        let value = field.get(b"V").map_err(|_| {
            SignError::PdfMalformed(format!("signature field '{name}' has no /V dictionary"))
        })?;
        let sig_dict = resolve(&self.doc, value)?.as_dict().map_err(|_| {
            SignError::PdfMalformed(format!("signature field '{name}' /V is not a dictionary"))
        })?;
        let array = match sig_dict.get(b"ByteRange") {
            Ok(object) => resolve(&self.doc, object)?.as_array().map_err(|_| {
                SignError::PdfMalformed(format!(
                    "/ByteRange of '{name}' found but it is not a valid array"
                ))
            })?,
            Err(_) => {
                return Err(SignError::PdfMalformed(format!(
                    "signature dictionary of '{name}' has no /ByteRange"
                )))
            }
        };
        if array.len() != 4 {
            return Err(SignError::PdfMalformed(format!(
                "/ByteRange of '{name}' found but it is not a valid array"
            )));
        }
        let mut values = [0u64; 4];
        for (slot, object) in values.iter_mut().zip(array) {
            let number = resolve(&self.doc, object)?.as_i64().map_err(|_| {
                SignError::PdfMalformed(format!(
                    "/ByteRange of '{name}' found but it is not a valid array"
                ))
            })?;
            *slot = u64::try_from(number).map_err(|_| {
                SignError::PdfMalformed(format!("/ByteRange of '{name}' holds a negative value"))
            })?;
        }
        Ok(ByteRange::new(values[0], values[1], values[2], values[3]))
    }
}
