//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every listed record leads with its display position and its human name;
//! identifiers, URLs and status flags follow as indented context lines. The
//! position is the record's place in display order (1-based), not its raw
//! `ordem`, so the listing reads the same way the site shows it.
//!
//! # Output Format
//!
//! ## Trips
//!
//! ```text
//! Trips
//! 001 Pico da Bandeira [featured]
//!     pico-da-bandeira · id 8c1f...
//!     04/07/2026 · Caparaó, ES · 2 dias · Difícil
//!     8/20 seats · R$ 390,00
//! 002 Rascunho [hidden]
//!     ...
//! ```
//!
//! ## Dashboard
//!
//! ```text
//! Dashboard
//!     Active trips: 3
//!     Open seats: 17
//!     Next trip: 04/07/2026 Pico da Bandeira
//! ```
//!
//! ## Gallery
//!
//! ```text
//! Gallery (12 photos)
//! 001 Pôr do sol em Itaúnas
//!     https://.../galeria/momentos/1718000000000-a1b2c3.jpg
//! 002 (no caption) [hidden]
//!     https://...
//! ```
//!
//! ## FAQ
//!
//! ```text
//! FAQ
//! 001 Precisa de experiência?
//!     Não. Todas as trilhas têm guia...
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::content::{Dashboard, FaqEntry, GalleryPhoto, SiteSettings, Trip};
use crate::homepage::Homepage;
use crate::types::UploadFile;
use crate::upload::{UploadProgress, human_size};

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Position + title, then any status markers.
///
/// ```text
/// 001 Pico da Bandeira [featured]
/// 002 Rascunho [hidden]
/// ```
fn entity_header(index: usize, title: &str, markers: &[&str]) -> String {
    let mut line = format!("{} {}", format_index(index), title);
    for marker in markers {
        line.push_str(&format!(" [{marker}]"));
    }
    line
}

fn visibility(ativo: bool) -> Option<&'static str> {
    (!ativo).then_some("hidden")
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut.trim_end())
    }
}

/// Brazilian real: `R$ 1.234,50`.
pub fn format_brl(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let (whole, frac) = (cents / 100, cents % 100);
    let digits = whole.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}R$ {grouped},{frac:02}")
}

// ============================================================================
// Trips
// ============================================================================

fn trip_lines(position: usize, trip: &Trip) -> Vec<String> {
    let markers: Vec<&str> = [trip.destaque.then_some("featured"), visibility(trip.ativo)]
        .into_iter()
        .flatten()
        .collect();
    let ctx = indent(1);
    let mut price = format_brl(trip.price);
    if let Some(installments) = trip.installment_price.as_deref().filter(|s| !s.is_empty()) {
        price.push_str(&format!(" ({installments})"));
    }
    vec![
        entity_header(position, &trip.title, &markers),
        format!("{ctx}{} · id {}", trip.slug, trip.id),
        format!(
            "{ctx}{} · {}, {} · {} · {}",
            trip.date.format("%d/%m/%Y"),
            trip.destination,
            trip.state,
            trip.duration,
            trip.difficulty
        ),
        format!(
            "{ctx}{}/{} seats · {}",
            trip.available_seats, trip.total_seats, price
        ),
    ]
}

/// Format a trip listing in display order.
pub fn format_trips(trips: &[Trip]) -> Vec<String> {
    let mut lines = vec!["Trips".to_string()];
    if trips.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
    }
    for (i, trip) in trips.iter().enumerate() {
        lines.extend(trip_lines(i + 1, trip));
    }
    lines
}

pub fn print_trips(trips: &[Trip]) {
    for line in format_trips(trips) {
        println!("{}", line);
    }
}

fn list_block(lines: &mut Vec<String>, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    lines.push(format!("{}{}:", indent(1), label));
    for item in items {
        lines.push(format!("{}- {}", indent(2), item));
    }
}

/// Everything about one trip.
pub fn format_trip_detail(trip: &Trip) -> Vec<String> {
    let mut lines = trip_lines(1, trip);
    lines[0] = lines[0].trim_start_matches("001 ").to_string();
    let ctx = indent(1);
    if let Some(short) = trip.short_description.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("{ctx}{short}"));
    }
    if let Some(departure) = trip.departure_point.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("{ctx}Departure: {departure}"));
    }
    lines.push(format!("{ctx}Main image: {}", trip.main_image));
    lines.push(format!("{ctx}Order: {}", trip.ordem));
    list_block(&mut lines, "Gallery", &trip.gallery);
    list_block(&mut lines, "Included", &trip.included);
    list_block(&mut lines, "Not included", &trip.not_included);
    list_block(&mut lines, "What to bring", &trip.what_to_bring);
    lines.push(String::new());
    lines.extend(trip.description.lines().map(|l| format!("{ctx}{l}")));
    lines
}

pub fn print_trip_detail(trip: &Trip) {
    for line in format_trip_detail(trip) {
        println!("{}", line);
    }
}

pub fn format_dashboard(dashboard: &Dashboard) -> Vec<String> {
    let ctx = indent(1);
    let next = match &dashboard.next_trip {
        Some(trip) => format!("{} {}", trip.date.format("%d/%m/%Y"), trip.title),
        None => "-".to_string(),
    };
    vec![
        "Dashboard".to_string(),
        format!("{ctx}Active trips: {}", dashboard.active_trips),
        format!("{ctx}Open seats: {}", dashboard.available_seats),
        format!("{ctx}Next trip: {next}"),
    ]
}

pub fn print_dashboard(dashboard: &Dashboard) {
    for line in format_dashboard(dashboard) {
        println!("{}", line);
    }
}

// ============================================================================
// Gallery
// ============================================================================

pub fn format_gallery(photos: &[GalleryPhoto]) -> Vec<String> {
    let mut lines = vec![format!("Gallery ({} photos)", photos.len())];
    for (i, photo) in photos.iter().enumerate() {
        let caption = photo
            .caption
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or("(no caption)");
        let markers: Vec<&str> = visibility(photo.ativo).into_iter().collect();
        lines.push(entity_header(i + 1, caption, &markers));
        lines.push(format!("{}{}", indent(1), photo.image_url));
        lines.push(format!("{}id {}", indent(1), photo.id));
    }
    lines
}

pub fn print_gallery(photos: &[GalleryPhoto]) {
    for line in format_gallery(photos) {
        println!("{}", line);
    }
}

// ============================================================================
// FAQ
// ============================================================================

pub fn format_faq(entries: &[FaqEntry]) -> Vec<String> {
    let mut lines = vec!["FAQ".to_string()];
    for (i, entry) in entries.iter().enumerate() {
        let markers: Vec<&str> = visibility(entry.ativo).into_iter().collect();
        lines.push(entity_header(i + 1, &entry.question, &markers));
        lines.push(format!("{}{}", indent(1), truncate_desc(&entry.answer, 72)));
        lines.push(format!("{}id {}", indent(1), entry.id));
    }
    lines
}

pub fn print_faq(entries: &[FaqEntry]) {
    for line in format_faq(entries) {
        println!("{}", line);
    }
}

// ============================================================================
// Settings
// ============================================================================

/// `key = value`, known keys first, then any extra keys found in the store.
pub fn format_settings(settings: &SiteSettings) -> Vec<String> {
    let mut lines = vec!["Settings".to_string()];
    let known: Vec<&str> = SiteSettings::known_keys().collect();
    let extra = settings
        .values()
        .keys()
        .map(String::as_str)
        .filter(|k| !known.contains(k));
    for key in known.iter().copied().chain(extra) {
        let value = settings.get(key);
        let shown = if value.is_empty() {
            "(empty)".to_string()
        } else {
            truncate_desc(value, 60)
        };
        lines.push(format!("{}{} = {}", indent(1), key, shown));
    }
    lines
}

pub fn print_settings(settings: &SiteSettings) {
    for line in format_settings(settings) {
        println!("{}", line);
    }
}

// ============================================================================
// Uploads
// ============================================================================

/// One progress event as a status line.
pub fn format_upload_progress(name: &str, event: UploadProgress) -> String {
    match event {
        UploadProgress::Percent(100) => format!("{name}: done"),
        UploadProgress::Percent(p) => format!("{name}: {p:>3}%"),
        UploadProgress::Failed => format!("{name}: failed"),
        UploadProgress::Reset => format!("{name}: idle"),
    }
}

/// Before/after summary for a prepared image.
pub fn format_prepared(original: &UploadFile, prepared: &UploadFile) -> Vec<String> {
    vec![
        original.name.clone(),
        format!(
            "{}{} → {} ({})",
            indent(1),
            human_size(original.size()),
            human_size(prepared.size()),
            prepared.mime
        ),
    ]
}

/// Uploaded URLs, one per line, in upload order.
pub fn format_uploaded(urls: &[String]) -> Vec<String> {
    let mut lines = vec![format!("Uploaded {} file(s)", urls.len())];
    lines.extend(
        urls.iter()
            .enumerate()
            .map(|(i, url)| format!("{}{} {}", indent(1), format_index(i + 1), url)),
    );
    lines
}

pub fn print_uploaded(urls: &[String]) {
    for line in format_uploaded(urls) {
        println!("{}", line);
    }
}

// ============================================================================
// Homepage
// ============================================================================

pub fn format_homepage(home: &Homepage) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push("Featured".to_string());
    for (i, trip) in home.featured.iter().enumerate() {
        lines.push(format!(
            "{}{} · {} · {}",
            indent(1),
            entity_header(i + 1, &trip.title, &[]),
            trip.date.format("%d/%m/%Y"),
            format_brl(trip.price)
        ));
    }

    lines.push(String::new());
    lines.push(format!("Upcoming trips ({})", home.trips.len()));
    for (i, trip) in home.trips.iter().enumerate() {
        lines.push(format!(
            "{}{} · {}, {}",
            indent(1),
            entity_header(i + 1, &trip.title, &[]),
            trip.destination,
            trip.state
        ));
    }

    lines.push(String::new());
    lines.push(format!("Moments ({} shown)", home.photos.len()));
    for photo in &home.photos {
        lines.push(format!("{}{}", indent(1), photo.image_url));
    }

    lines.push(String::new());
    lines.push(format!("FAQ ({})", home.faq.len()));
    for (i, entry) in home.faq.iter().enumerate() {
        lines.push(format!("{}{}", indent(1), entity_header(i + 1, &entry.question, &[])));
    }

    lines.push(String::new());
    let stats: Vec<String> = home
        .settings
        .stats()
        .iter()
        .map(|(label, value)| format!("{value} {label}"))
        .collect();
    lines.push(format!("About: {}", stats.join(" · ")));
    lines.push(format!("{}{}", indent(1), truncate_desc(home.settings.about(), 72)));
    lines.push(format!("{}WhatsApp: {}", indent(1), home.settings.whatsapp_link("")));
    lines.push(format!("{}Instagram: {}", indent(1), home.settings.instagram()));

    if !home.failed.is_empty() {
        let failed: Vec<String> = home.failed.iter().map(ToString::to_string).collect();
        lines.push(String::new());
        lines.push(format!("Unavailable: {}", failed.join(", ")));
    }
    lines
}

pub fn print_homepage(home: &Homepage) {
    for line in format_homepage(home) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Difficulty;
    use crate::homepage::Section;
    use chrono::NaiveDate;

    fn trip(title: &str) -> Trip {
        Trip {
            id: "t1".into(),
            slug: "pico-da-bandeira".into(),
            title: title.into(),
            short_description: None,
            description: "Subida noturna.\nNascer do sol no topo.".into(),
            destination: "Caparaó".into(),
            state: "ES".into(),
            departure_point: Some("Vitória".into()),
            date: NaiveDate::from_ymd_opt(2026, 7, 4).unwrap(),
            duration: "2 dias".into(),
            difficulty: Difficulty::Hard,
            total_seats: 20,
            available_seats: 8,
            price: 1390.5,
            installment_price: Some("3x de R$ 463,50".into()),
            main_image: "https://cdn/capa.jpg".into(),
            gallery: vec![],
            included: vec!["Guia".into(), "Seguro".into()],
            not_included: vec![],
            what_to_bring: vec![],
            ativo: true,
            destaque: true,
            ordem: 0,
            created_at: None,
        }
    }

    fn photo(caption: Option<&str>, ativo: bool) -> GalleryPhoto {
        GalleryPhoto {
            id: "p1".into(),
            image_url: "https://cdn/p.jpg".into(),
            caption: caption.map(String::from),
            ordem: 1,
            ativo,
            created_at: None,
        }
    }

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn entity_header_markers() {
        assert_eq!(entity_header(2, "Itaúnas", &[]), "002 Itaúnas");
        assert_eq!(
            entity_header(1, "Pico", &["featured", "hidden"]),
            "001 Pico [featured] [hidden]"
        );
    }

    #[test]
    fn truncate_desc_counts_characters() {
        assert_eq!(truncate_desc("Não", 3), "Não");
        assert_eq!(truncate_desc("Expedição noturna", 9), "Expedição...");
    }

    #[test]
    fn dashboard_shows_next_trip_or_dash() {
        let dashboard = Dashboard {
            active_trips: 3,
            available_seats: 17,
            next_trip: Some(trip("Pico da Bandeira")),
        };
        assert_eq!(
            format_dashboard(&dashboard),
            vec![
                "Dashboard",
                "    Active trips: 3",
                "    Open seats: 17",
                "    Next trip: 04/07/2026 Pico da Bandeira",
            ]
        );

        let empty = Dashboard {
            active_trips: 0,
            available_seats: 0,
            next_trip: None,
        };
        assert_eq!(format_dashboard(&empty)[3], "    Next trip: -");
    }

    #[test]
    fn brl_formatting() {
        assert_eq!(format_brl(0.0), "R$ 0,00");
        assert_eq!(format_brl(390.0), "R$ 390,00");
        assert_eq!(format_brl(1390.5), "R$ 1.390,50");
        assert_eq!(format_brl(1_234_567.891), "R$ 1.234.567,89");
    }

    #[test]
    fn trip_listing() {
        let mut hidden = trip("Rascunho");
        hidden.destaque = false;
        hidden.ativo = false;
        let lines = format_trips(&[trip("Pico da Bandeira"), hidden]);

        assert_eq!(lines[0], "Trips");
        assert_eq!(lines[1], "001 Pico da Bandeira [featured]");
        assert_eq!(lines[2], "    pico-da-bandeira · id t1");
        assert_eq!(lines[3], "    04/07/2026 · Caparaó, ES · 2 dias · Difícil");
        assert_eq!(lines[4], "    8/20 seats · R$ 1.390,50 (3x de R$ 463,50)");
        assert_eq!(lines[5], "002 Rascunho [hidden]");
    }

    #[test]
    fn empty_trip_listing() {
        assert_eq!(format_trips(&[]), vec!["Trips", "    (none)"]);
    }

    #[test]
    fn trip_detail_lists_extras() {
        let lines = format_trip_detail(&trip("Pico da Bandeira"));
        assert_eq!(lines[0], "Pico da Bandeira [featured]");
        assert!(lines.contains(&"    Departure: Vitória".to_string()));
        assert!(lines.contains(&"    Included:".to_string()));
        assert!(lines.contains(&"        - Seguro".to_string()));
        assert!(!lines.iter().any(|l| l.contains("What to bring")));
        assert_eq!(lines.last().unwrap(), "    Nascer do sol no topo.");
    }

    #[test]
    fn gallery_listing() {
        let lines = format_gallery(&[photo(Some("Pôr do sol"), true), photo(Some(" "), false)]);
        assert_eq!(lines[0], "Gallery (2 photos)");
        assert_eq!(lines[1], "001 Pôr do sol");
        assert_eq!(lines[2], "    https://cdn/p.jpg");
        assert_eq!(lines[4], "002 (no caption) [hidden]");
    }

    #[test]
    fn faq_listing_truncates_answers() {
        let entry = FaqEntry {
            id: "f1".into(),
            question: "Precisa de experiência?".into(),
            answer: "a".repeat(100),
            ordem: 0,
            ativo: true,
            created_at: None,
        };
        let lines = format_faq(&[entry]);
        assert_eq!(lines[1], "001 Precisa de experiência?");
        assert_eq!(lines[2], format!("    {}...", "a".repeat(72)));
    }

    #[test]
    fn settings_show_known_keys_then_extras() {
        let settings = SiteSettings::default().overlay([("slogan", "Bora!")]);
        let lines = format_settings(&settings);
        assert_eq!(lines[1], "    whatsapp = 5527999999999");
        assert!(lines.contains(&"    footer_imagem = (empty)".to_string()));
        assert_eq!(lines.last().unwrap(), "    slogan = Bora!");
    }

    #[test]
    fn progress_lines() {
        assert_eq!(format_upload_progress("a.jpg", UploadProgress::Percent(30)), "a.jpg:  30%");
        assert_eq!(format_upload_progress("a.jpg", UploadProgress::Percent(100)), "a.jpg: done");
        assert_eq!(format_upload_progress("a.jpg", UploadProgress::Failed), "a.jpg: failed");
    }

    #[test]
    fn uploaded_urls_are_numbered() {
        let lines = format_uploaded(&["https://a".into(), "https://b".into()]);
        assert_eq!(lines, vec!["Uploaded 2 file(s)", "    001 https://a", "    002 https://b"]);
    }

    #[test]
    fn homepage_reports_missing_sections() {
        let home = Homepage {
            trips: vec![trip("Pico da Bandeira")],
            featured: vec![trip("Pico da Bandeira")],
            photos: vec![photo(None, true)],
            faq: vec![],
            settings: SiteSettings::default(),
            failed: vec![Section::Faq],
        };
        let lines = format_homepage(&home);
        assert_eq!(lines[0], "Featured");
        assert_eq!(lines[1], "    001 Pico da Bandeira · 04/07/2026 · R$ 1.390,50");
        assert!(lines.contains(&"About: 500 adventurers · 50 trails · 4 states".to_string()));
        assert_eq!(lines.last().unwrap(), "Unavailable: FAQ");
    }
}
