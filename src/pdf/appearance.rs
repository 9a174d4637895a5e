//! Painter capability for the visible signature appearance.
//!
//! The placeholder writer composes a painter instead of subclassing one;
//! implementors only produce content-stream operators, the writer owns the
//! surrounding form XObject.

use crate::domain::types::{Rect, SignatureInfo};
use crate::pdf::syntax::escape_literal_string;

/// Renders the visible appearance of a signature widget.
///
/// `rect` is in form space (origin bottom-left, `w` x `h`); the returned
/// bytes are the operators of the appearance stream.
pub trait SignaturePainter {
    fn draw_signature_appearance(&self, rect: &Rect, info: &SignatureInfo) -> Vec<u8>;
}

/// Default painter: stacked text lines in Helvetica.
pub struct TextAppearancePainter {
    pub font_size: f64,
    pub margin: f64,
}

impl Default for TextAppearancePainter {
    fn default() -> Self {
        Self {
            font_size: 9.0,
            margin: 2.0,
        }
    }
}

impl TextAppearancePainter {
    fn lines<'a>(info: &'a SignatureInfo) -> Vec<&'a str> {
        [
            info.author.as_str(),
            info.reason.as_str(),
            info.certified_by.as_str(),
            info.date_time.as_str(),
        ]
        .into_iter()
        .filter(|line| !line.is_empty())
        .collect()
    }
}

impl SignaturePainter for TextAppearancePainter {
    fn draw_signature_appearance(&self, rect: &Rect, info: &SignatureInfo) -> Vec<u8> {
        let leading = self.font_size * 1.2;
        let start_y = rect.h - self.margin - self.font_size;
        let mut ops = Vec::new();
        ops.extend_from_slice(b"q\nBT\n");
        ops.extend_from_slice(format!("/Helv {} Tf\n", self.font_size).as_bytes());
        ops.extend_from_slice(format!("{leading} TL\n").as_bytes());
        ops.extend_from_slice(format!("{} {} Td\n", self.margin, start_y).as_bytes());
        for line in Self::lines(info) {
            ops.push(b'(');
            ops.extend_from_slice(&escape_literal_string(line.as_bytes()));
            ops.extend_from_slice(b") Tj\nT*\n");
        }
        ops.extend_from_slice(b"ET\nQ\n");
        ops
    }
}
