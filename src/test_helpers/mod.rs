//! Shared test utilities.
//!
//! Encoded test images are generated in memory (no fixture files), and the
//! draft builders return values that pass validation so each test only
//! spells out the field it is about.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let file = UploadFile::new("a.jpg", "image/jpeg", jpeg_bytes(800, 600));
//! let big = padded_jpeg(2400, 1200, 6 * 1024 * 1024);
//! let mut draft = trip_draft("Pedra Azul");
//! draft.price = Some(-1.0);
//! ```

use chrono::NaiveDate;

use crate::content::{FaqDraft, TripDraft};

mod images;

pub use images::{jpeg_bytes, padded_jpeg, png_bytes};

// =========================================================================
// Drafts
// =========================================================================

pub fn faq_draft(question: &str, answer: &str) -> FaqDraft {
    FaqDraft::new(question, answer)
}

/// A complete, active, non-featured trip in ES.
pub fn trip_draft(title: &str) -> TripDraft {
    TripDraft {
        title: title.to_string(),
        description: format!("Um dia inteiro em {title}."),
        destination: title.to_string(),
        state: "ES".to_string(),
        date: NaiveDate::from_ymd_opt(2026, 6, 13),
        duration: "1 dia".to_string(),
        price: Some(180.0),
        main_image: "https://memory.local/storage/v1/object/public/viagens/main/capa.jpg"
            .to_string(),
        ativo: true,
        ..TripDraft::default()
    }
}

#[test]
fn trip_draft_is_valid() {
    trip_draft("Pedra Azul").check().unwrap();
}
