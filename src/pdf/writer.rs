//! Placeholder insertion: append a `/Sig` field and widget annotation to an
//! existing PDF as an incremental update, then fix up `/ByteRange` in place.
//!
//! The update is appended as a new revision so every byte offset of the
//! original document survives. `/ByteRange` is first written at maximum
//! width and rewritten in place afterwards; `/Contents` is reserved as a
//! zero-filled hex string so its byte length is already final when the
//! digest is computed.

use std::fs;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::domain::constants;
use crate::domain::types::{ByteRange, SignatureAnnotation};
use crate::infra::error::{SignError, SignResult};
use crate::pdf::appearance::SignaturePainter;
use crate::pdf::{field_type, resolve, syntax};

pub struct PlaceholderWriter<'a> {
    creator: &'a str,
    painter: &'a dyn SignaturePainter,
}

impl<'a> PlaceholderWriter<'a> {
    #[must_use]
    pub fn new(creator: &'a str, painter: &'a dyn SignaturePainter) -> Self {
        Self { creator, painter }
    }

    /// Append an unsigned signature placeholder to `input`, writing the new
    /// revision to `output` (which may equal `input`).
    pub fn append(
        &self,
        input: &Path,
        output: &Path,
        annotation: &SignatureAnnotation,
        overwrite: bool,
    ) -> SignResult<()> {
        if annotation.name().is_empty() {
            return Err(SignError::InvalidArgument(
                "SignatureAnnotation.name".to_string(),
            ));
        }
        if annotation.info().size_in_bytes == 0 {
            return Err(SignError::InvalidArgument(
                "SignatureInfo.size_in_bytes".to_string(),
            ));
        }

        prepare_output(input, output, overwrite)?;

        let base = fs::read(output).map_err(|e| SignError::io(output, e))?;
        let doc = Document::load_mem(&base)?;

        let revision = self.build_revision(&doc, annotation)?;
        let bytes = serialize_revision(&doc, &base, revision)?;

        fs::write(output, bytes).map_err(|e| SignError::io(output, e))?;
        log::info!(
            "appended signature placeholder '{}' to {}",
            annotation.name(),
            output.display()
        );
        Ok(())
    }

    fn build_revision(
        &self,
        doc: &Document,
        annotation: &SignatureAnnotation,
    ) -> SignResult<Revision> {
        let root_id = doc
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .map_err(|_| SignError::PdfMalformed("trailer has no /Root reference".to_string()))?;
        let mut catalog = doc.catalog()?.clone();

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(SignError::PdfMalformed("document has no pages".to_string()));
        }

        let mut revision = Revision::new(doc.max_id);
        let appearance_id = annotation.visible().then(|| revision.reserve());
        let widget_id = revision.reserve();
        let sig_id = revision.reserve();

        // AcroForm: held inline in the catalog or behind a reference.
        let (mut acro_form, acro_form_ref) = match catalog.get(b"AcroForm") {
            Ok(Object::Reference(id)) => (doc.get_dictionary(*id)?.clone(), Some(*id)),
            Ok(Object::Dictionary(dict)) => (dict.clone(), None),
            Ok(_) => {
                return Err(SignError::PdfMalformed(
                    "/AcroForm is neither a dictionary nor a reference".to_string(),
                ))
            }
            Err(_) => (Dictionary::new(), None),
        };

        if signature_field_exists(doc, &acro_form, annotation.name())? {
            return Err(SignError::AlreadyExists(annotation.name().to_string()));
        }

        match acro_form.get(b"SigFlags") {
            Ok(Object::Integer(flags)) if *flags != constants::ACROFORM_SIG_FLAGS => {
                log::debug!("rewriting /SigFlags {} -> {}", flags, constants::ACROFORM_SIG_FLAGS);
            }
            _ => {}
        }
        acro_form.set("SigFlags", Object::Integer(constants::ACROFORM_SIG_FLAGS));
        acro_form.remove(b"NeedAppearances");

        let page_id = *pages
            .get(&u32::try_from(annotation.page()).unwrap_or(0))
            .ok_or_else(|| SignError::NotFound(format!("page {}", annotation.page())))?;

        // Fields array: inline, behind a reference, or absent.
        match acro_form.get(b"Fields").cloned() {
            Ok(Object::Reference(fields_id)) => {
                let mut fields = doc
                    .get_object(fields_id)?
                    .as_array()
                    .map_err(|_| {
                        SignError::PdfMalformed("/AcroForm /Fields is not an array".to_string())
                    })?
                    .clone();
                fields.push(Object::Reference(widget_id));
                revision.add(fields_id, Object::Array(fields));
            }
            Ok(Object::Array(mut fields)) => {
                fields.push(Object::Reference(widget_id));
                acro_form.set("Fields", Object::Array(fields));
            }
            Ok(_) => {
                return Err(SignError::PdfMalformed(
                    "/AcroForm /Fields is not an array".to_string(),
                ))
            }
            Err(_) => {
                acro_form.set("Fields", Object::Array(vec![Object::Reference(widget_id)]));
            }
        }

        match acro_form_ref {
            Some(id) => revision.add(id, Object::Dictionary(acro_form)),
            None => {
                // the form lives (or will live) inside the catalog itself
                catalog.set("AcroForm", Object::Dictionary(acro_form));
                revision.add(root_id, Object::Dictionary(catalog));
            }
        }

        // Page: attach the widget to /Annots.
        let mut page_dict = doc.get_dictionary(page_id)?.clone();
        match page_dict.get(b"Annots").cloned() {
            Ok(Object::Reference(annots_id)) => {
                let mut annots = doc
                    .get_object(annots_id)?
                    .as_array()
                    .map_err(|_| {
                        SignError::PdfMalformed("page /Annots is not an array".to_string())
                    })?
                    .clone();
                annots.push(Object::Reference(widget_id));
                revision.add(annots_id, Object::Array(annots));
            }
            Ok(Object::Array(mut annots)) => {
                annots.push(Object::Reference(widget_id));
                page_dict.set("Annots", Object::Array(annots));
            }
            Ok(_) => {
                return Err(SignError::PdfMalformed(
                    "page /Annots is not an array".to_string(),
                ))
            }
            Err(_) => {
                page_dict.set("Annots", Object::Array(vec![Object::Reference(widget_id)]));
            }
        }
        revision.add(page_id, Object::Dictionary(page_dict));

        // PDF coordinates are bottom-origin; the caller hands in top-origin.
        let page_height = media_box_height(doc, page_id)?;
        let rect = annotation.rect();
        let y = page_height - rect.y - rect.h;
        let pdf_rect = Object::Array(vec![
            Object::from(rect.x),
            Object::from(y),
            Object::from(rect.x + rect.w),
            Object::from(y + rect.h),
        ]);

        if let Some(ap_id) = appearance_id {
            let mut form_rect = *rect;
            form_rect.x = 0.0;
            form_rect.y = 0.0;
            let ops = self
                .painter
                .draw_signature_appearance(&form_rect, annotation.info());
            revision.add(ap_id, Object::Stream(appearance_stream(rect.w, rect.h, ops)));
        }

        revision.add(
            widget_id,
            Object::Dictionary(widget_field(
                annotation,
                &pdf_rect,
                page_id,
                sig_id,
                appearance_id,
            )),
        );
        // the signature dictionary goes last so the /ByteRange and
        // /Contents tokens of this revision are the final ones in the file
        revision.add(
            sig_id,
            Object::Dictionary(signature_dictionary(annotation, self.creator)),
        );

        Ok(revision)
    }
}

struct Revision {
    objects: Vec<(ObjectId, Object)>,
    next_id: u32,
}

impl Revision {
    fn new(max_id: u32) -> Self {
        Self {
            objects: Vec::new(),
            next_id: max_id,
        }
    }

    fn reserve(&mut self) -> ObjectId {
        self.next_id += 1;
        (self.next_id, 0)
    }

    fn add(&mut self, id: ObjectId, object: Object) {
        self.objects.push((id, object));
    }
}

fn prepare_output(input: &Path, output: &Path, overwrite: bool) -> SignResult<()> {
    if input == output {
        return Ok(());
    }
    match fs::metadata(output) {
        Ok(meta) if meta.len() > 0 && !overwrite => {
            return Err(SignError::AlreadyExists(output.display().to_string()));
        }
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(SignError::io(output, e)),
    }
    fs::copy(input, output).map_err(|e| SignError::io(output, e))?;
    Ok(())
}

fn signature_field_exists(doc: &Document, acro_form: &Dictionary, name: &str) -> SignResult<bool> {
    let Ok(fields) = acro_form.get(b"Fields") else {
        return Ok(false);
    };
    let Ok(fields) = resolve(doc, fields)?.as_array() else {
        return Ok(false);
    };
    for item in fields {
        let Ok(id) = item.as_reference() else {
            continue;
        };
        let Ok(dict) = doc.get_dictionary(id) else {
            continue;
        };
        let matches_name = match dict.get(b"T") {
            Ok(Object::String(bytes, _)) => bytes.as_slice() == name.as_bytes(),
            _ => false,
        };
        if matches_name && field_type(doc, dict)?.as_deref() == Some(b"Sig".as_slice()) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Page height from `/MediaBox`, walking `/Parent` for inherited boxes.
fn media_box_height(doc: &Document, page_id: ObjectId) -> SignResult<f64> {
    let mut dict = doc.get_dictionary(page_id)?;
    for _ in 0..32 {
        if let Ok(media_box) = dict.get(b"MediaBox") {
            let values = resolve(doc, media_box)?.as_array().map_err(|_| {
                SignError::PdfMalformed("/MediaBox is not an array".to_string())
            })?;
            if values.len() != 4 {
                return Err(SignError::PdfMalformed(
                    "/MediaBox is not a 4-element array".to_string(),
                ));
            }
            let lower = object_to_f64(&values[1])?;
            let upper = object_to_f64(&values[3])?;
            return Ok(upper - lower);
        }
        match dict.get(b"Parent") {
            Ok(parent) => dict = resolve(doc, parent)?.as_dict()?,
            Err(_) => break,
        }
    }
    Err(SignError::PdfMalformed(
        "page has no /MediaBox (own or inherited)".to_string(),
    ))
}

fn object_to_f64(object: &Object) -> SignResult<f64> {
    match object {
        Object::Integer(value) => Ok(*value as f64),
        Object::Real(value) => Ok(f64::from(*value)),
        _ => Err(SignError::PdfMalformed(
            "expected a numeric value".to_string(),
        )),
    }
}

fn widget_field(
    annotation: &SignatureAnnotation,
    pdf_rect: &Object,
    page_id: ObjectId,
    sig_id: ObjectId,
    appearance_id: Option<ObjectId>,
) -> Dictionary {
    let flags = if annotation.visible() {
        constants::ANNOT_FLAGS_VISIBLE
    } else {
        constants::ANNOT_FLAGS_INVISIBLE
    };
    let mut widget = Dictionary::new();
    widget.set("Type", Object::Name(b"Annot".to_vec()));
    widget.set("Subtype", Object::Name(b"Widget".to_vec()));
    widget.set("FT", Object::Name(b"Sig".to_vec()));
    widget.set("Rect", pdf_rect.clone());
    widget.set("F", Object::Integer(flags));
    widget.set(
        "T",
        Object::String(annotation.name().as_bytes().to_vec(), StringFormat::Literal),
    );
    widget.set("Ff", Object::Integer(constants::FIELD_FLAG_READ_ONLY));
    widget.set("P", Object::Reference(page_id));
    widget.set("V", Object::Reference(sig_id));
    if let Some(ap_id) = appearance_id {
        let mut ap = Dictionary::new();
        ap.set("N", Object::Reference(ap_id));
        widget.set("AP", Object::Dictionary(ap));
    }
    widget
}

fn signature_dictionary(annotation: &SignatureAnnotation, creator: &str) -> Dictionary {
    let info = annotation.info();
    let mut sig = Dictionary::new();
    sig.set("Type", Object::Name(b"Sig".to_vec()));
    sig.set("Filter", Object::Name(constants::SIG_FILTER.as_bytes().to_vec()));
    sig.set(
        "SubFilter",
        Object::Name(constants::SIG_SUBFILTER.as_bytes().to_vec()),
    );
    // widest representation; rewritten in place after the revision lands
    sig.set(
        "ByteRange",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(constants::BYTE_RANGE_BEACON),
            Object::Integer(constants::BYTE_RANGE_BEACON),
            Object::Integer(constants::BYTE_RANGE_BEACON),
        ]),
    );
    sig.set(
        "Contents",
        Object::String(vec![0u8; info.size_in_bytes], StringFormat::Hexadecimal),
    );
    if !info.reason.is_empty() {
        sig.set(
            "Reason",
            Object::String(info.reason.as_bytes().to_vec(), StringFormat::Literal),
        );
    }
    if !info.author.is_empty() {
        sig.set(
            "Name",
            Object::String(info.author.as_bytes().to_vec(), StringFormat::Literal),
        );
    }
    let date = chrono::Utc::now().format("D:%Y%m%d%H%M%SZ").to_string();
    sig.set("M", Object::String(date.into_bytes(), StringFormat::Literal));
    let mut app = Dictionary::new();
    app.set("Name", Object::Name(creator.as_bytes().to_vec()));
    let mut prop_build = Dictionary::new();
    prop_build.set("App", Object::Dictionary(app));
    sig.set("Prop_Build", Object::Dictionary(prop_build));
    sig
}

fn appearance_stream(w: f64, h: f64, ops: Vec<u8>) -> Stream {
    let mut helv = Dictionary::new();
    helv.set("Type", Object::Name(b"Font".to_vec()));
    helv.set("Subtype", Object::Name(b"Type1".to_vec()));
    helv.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    helv.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    let mut fonts = Dictionary::new();
    fonts.set("Helv", Object::Dictionary(helv));
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));

    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Form".to_vec()));
    dict.set("FormType", Object::Integer(1));
    dict.set(
        "BBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::from(w),
            Object::from(h),
        ]),
    );
    dict.set("Resources", Object::Dictionary(resources));
    Stream::new(dict, ops)
}

fn serialize_revision(doc: &Document, base: &[u8], revision: Revision) -> SignResult<Vec<u8>> {
    let mut out = base.to_vec();
    if !out.ends_with(b"\n") {
        out.push(b'\n');
    }

    let mut offsets: Vec<(ObjectId, usize)> = Vec::with_capacity(revision.objects.len());
    for (id, object) in &revision.objects {
        offsets.push((*id, out.len()));
        syntax::write_indirect_object(&mut out, *id, object)?;
    }
    offsets.sort_by_key(|(id, _)| id.0);

    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 1\n0000000000 65535 f \n");
    let mut index = 0;
    while index < offsets.len() {
        let mut end = index;
        while end + 1 < offsets.len() && offsets[end + 1].0 .0 == offsets[end].0 .0 + 1 {
            end += 1;
        }
        out.extend_from_slice(
            format!("{} {}\n", offsets[index].0 .0, end - index + 1).as_bytes(),
        );
        for (id, offset) in &offsets[index..=end] {
            out.extend_from_slice(format!("{offset:010} {:05} n \n", id.1).as_bytes());
        }
        index = end + 1;
    }

    let mut trailer = Dictionary::new();
    trailer.set("Size", Object::Integer(i64::from(revision.next_id) + 1));
    trailer.set(
        "Prev",
        Object::Integer(syntax::find_previous_startxref(base)? as i64),
    );
    if let Ok(root) = doc.trailer.get(b"Root") {
        trailer.set("Root", root.clone());
    }
    if let Ok(info) = doc.trailer.get(b"Info") {
        trailer.set("Info", info.clone());
    }
    if let Ok(file_id) = doc.trailer.get(b"ID") {
        trailer.set("ID", file_id.clone());
    }
    out.extend_from_slice(b"trailer\n");
    syntax::write_dictionary(&mut out, &trailer)?;
    out.extend_from_slice(format!("\nstartxref\n{xref_start}\n%%EOF\n").as_bytes());
    Ok(out)
}

/// Rewrite the `/ByteRange` of the newest revision with the real offsets,
/// preserving its encoded width so no byte in the file shifts.
///
/// Safe to re-run: an already-adjusted file recomputes to the same values
/// and is rewritten with identical bytes.
pub fn adjust_byte_range(path: &Path) -> SignResult<ByteRange> {
    let bytes = fs::read(path).map_err(|e| SignError::io(path, e))?;

    let br = syntax::rfind(&bytes, b"/ByteRange")
        .ok_or_else(|| SignError::PdfMalformed("no /ByteRange token".to_string()))?;
    let open = syntax::find(&bytes, b"[", br)
        .ok_or_else(|| SignError::PdfMalformed("/ByteRange has no array".to_string()))?;
    let close = syntax::find(&bytes, b"]", open)
        .ok_or_else(|| SignError::PdfMalformed("/ByteRange array unterminated".to_string()))?;
    let contents = syntax::find(&bytes, b"/Contents", close)
        .ok_or_else(|| SignError::PdfMalformed("no /Contents after /ByteRange".to_string()))?;
    let lt = syntax::find(&bytes, b"<", contents)
        .ok_or_else(|| SignError::PdfMalformed("/Contents has no hex string".to_string()))?;
    let gt = syntax::find(&bytes, b">", lt)
        .ok_or_else(|| SignError::PdfMalformed("/Contents hex string unterminated".to_string()))?;

    let after_start = gt + 1;
    let range = ByteRange::new(
        0,
        lt as u64,
        after_start as u64,
        (bytes.len() - after_start) as u64,
    );

    let width = close - open - 1;
    let mut rendered = format!(
        "{} {} {} {}",
        range.before_start, range.before_size, range.after_start, range.after_size
    );
    if rendered.len() > width {
        return Err(SignError::PdfMalformed(format!(
            "/ByteRange values need {} chars but only {} are reserved",
            rendered.len(),
            width
        )));
    }
    // pad with spaces so total field width is preserved
    while rendered.len() < width {
        rendered.push(' ');
    }

    let mut file = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| SignError::io(path, e))?;
    file.seek(SeekFrom::Start((open + 1) as u64))
        .map_err(|e| SignError::io(path, e))?;
    file.write_all(rendered.as_bytes())
        .map_err(|e| SignError::io(path, e))?;

    log::debug!(
        "adjusted /ByteRange of {} to [0 {} {} {}]",
        path.display(),
        range.before_size,
        range.after_start,
        range.after_size
    );
    Ok(range)
}
