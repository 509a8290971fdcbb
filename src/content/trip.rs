//! Trips (`viagens`).
//!
//! A trip is the main listing on the site. Its public URL is
//! `/viagem/{slug}`, so slugs are derived from the title when not given
//! and must be unique across the table.
//!
//! ## Rules checked before anything is written
//!
//! | Rule | Applies to |
//! |---|---|
//! | title, description, destination, date, duration and main image present | create, update |
//! | `1 ≤ total seats`, `available ≤ total` | create, update |
//! | price present and `≥ 0` | create, update |
//! | at most 10 gallery images | create, update |
//! | state is one of the served states | create, update |
//! | slug unique | create, update (when the slug changes) |
//!
//! Blank entries in the included / not included / what-to-bring lists are
//! dropped on save. Equal `ordem` values list the earliest trip first.

use super::{Entity, Flag, Repository, clean_list, is_blank, null_as_default};
use crate::error::{ContentError, ContentResult};
use crate::imaging::ImageBackend;
use crate::naming::generate_slug;
use crate::ordering::{Orderable, featured_with_fallback};
use crate::store::{BlobStore, ContentStore, Query};
use crate::types::{RecordId, UploadFile};
use crate::upload::UploadService;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

pub const MAX_GALLERY_IMAGES: usize = 10;
pub const DEFAULT_FEATURED_LIMIT: usize = 5;
/// States the operator runs trips from.
pub const STATES: [&str; 4] = ["ES", "RJ", "MG", "BA"];
pub const MAIN_IMAGE_FOLDER: &str = "main";
pub const GALLERY_FOLDER: &str = "gallery";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Difficulty {
    #[serde(rename = "Fácil")]
    Easy,
    #[default]
    #[serde(rename = "Moderada")]
    Moderate,
    #[serde(rename = "Difícil")]
    Hard,
    #[serde(rename = "Extrema")]
    Extreme,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Moderate,
        Difficulty::Hard,
        Difficulty::Extreme,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "Fácil",
            Difficulty::Moderate => "Moderada",
            Difficulty::Hard => "Difícil",
            Difficulty::Extreme => "Extrema",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    /// Accepts the stored labels and their unaccented spellings, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = generate_slug(s);
        Difficulty::ALL
            .into_iter()
            .find(|d| generate_slug(d.label()) == wanted)
            .ok_or_else(|| {
                format!("unknown difficulty '{s}' (expected Fácil, Moderada, Difícil or Extrema)")
            })
    }
}

/// Dates may come back as `2026-03-14` or a full timestamp; only the day matters.
fn deserialize_day<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let day = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: RecordId,
    pub slug: String,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "descricao_curta", default)]
    pub short_description: Option<String>,
    #[serde(rename = "descricao", deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "destino", deserialize_with = "null_as_default")]
    pub destination: String,
    #[serde(rename = "estado", deserialize_with = "null_as_default")]
    pub state: String,
    #[serde(rename = "local_saida", default)]
    pub departure_point: Option<String>,
    #[serde(rename = "data_viagem", deserialize_with = "deserialize_day")]
    pub date: NaiveDate,
    #[serde(rename = "duracao", deserialize_with = "null_as_default")]
    pub duration: String,
    #[serde(rename = "dificuldade", default, deserialize_with = "null_as_default")]
    pub difficulty: Difficulty,
    #[serde(rename = "vagas_total", default, deserialize_with = "null_as_default")]
    pub total_seats: u32,
    #[serde(rename = "vagas_disponiveis", default, deserialize_with = "null_as_default")]
    pub available_seats: u32,
    #[serde(rename = "preco", default, deserialize_with = "null_as_default")]
    pub price: f64,
    #[serde(rename = "preco_parcelado", default)]
    pub installment_price: Option<String>,
    #[serde(rename = "imagem_principal", deserialize_with = "null_as_default")]
    pub main_image: String,
    #[serde(rename = "galeria", default, deserialize_with = "null_as_default")]
    pub gallery: Vec<String>,
    #[serde(rename = "inclusos", default, deserialize_with = "null_as_default")]
    pub included: Vec<String>,
    #[serde(rename = "nao_inclusos", default, deserialize_with = "null_as_default")]
    pub not_included: Vec<String>,
    #[serde(rename = "o_que_levar", default, deserialize_with = "null_as_default")]
    pub what_to_bring: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ativo: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub destaque: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ordem: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A trip that doesn't exist yet.
///
/// Also the shape of trip files passed to `trilhos trips create`: the same
/// column names, any field may be left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "descricao_curta")]
    pub short_description: Option<String>,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "destino")]
    pub destination: String,
    #[serde(rename = "estado")]
    pub state: String,
    #[serde(rename = "local_saida")]
    pub departure_point: Option<String>,
    #[serde(rename = "data_viagem")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "duracao")]
    pub duration: String,
    #[serde(rename = "dificuldade")]
    pub difficulty: Difficulty,
    #[serde(rename = "vagas_total")]
    pub total_seats: u32,
    #[serde(rename = "vagas_disponiveis")]
    pub available_seats: u32,
    #[serde(rename = "preco")]
    pub price: Option<f64>,
    #[serde(rename = "preco_parcelado")]
    pub installment_price: Option<String>,
    #[serde(rename = "imagem_principal")]
    pub main_image: String,
    #[serde(rename = "galeria")]
    pub gallery: Vec<String>,
    #[serde(rename = "inclusos")]
    pub included: Vec<String>,
    #[serde(rename = "nao_inclusos")]
    pub not_included: Vec<String>,
    #[serde(rename = "o_que_levar")]
    pub what_to_bring: Vec<String>,
    pub ativo: bool,
    pub destaque: bool,
    pub ordem: i32,
}

impl Default for TripDraft {
    fn default() -> Self {
        Self {
            slug: None,
            title: String::new(),
            short_description: None,
            description: String::new(),
            destination: String::new(),
            state: "ES".to_string(),
            departure_point: None,
            date: None,
            duration: String::new(),
            difficulty: Difficulty::default(),
            total_seats: 20,
            available_seats: 20,
            price: None,
            installment_price: None,
            main_image: String::new(),
            gallery: Vec::new(),
            included: Vec::new(),
            not_included: Vec::new(),
            what_to_bring: Vec::new(),
            ativo: true,
            destaque: false,
            ordem: 0,
        }
    }
}

impl From<&Trip> for TripDraft {
    fn from(trip: &Trip) -> Self {
        Self {
            slug: Some(trip.slug.clone()),
            title: trip.title.clone(),
            short_description: trip.short_description.clone(),
            description: trip.description.clone(),
            destination: trip.destination.clone(),
            state: trip.state.clone(),
            departure_point: trip.departure_point.clone(),
            date: Some(trip.date),
            duration: trip.duration.clone(),
            difficulty: trip.difficulty,
            total_seats: trip.total_seats,
            available_seats: trip.available_seats,
            price: Some(trip.price),
            installment_price: trip.installment_price.clone(),
            main_image: trip.main_image.clone(),
            gallery: trip.gallery.clone(),
            included: trip.included.clone(),
            not_included: trip.not_included.clone(),
            what_to_bring: trip.what_to_bring.clone(),
            ativo: trip.ativo,
            destaque: trip.destaque,
            ordem: trip.ordem,
        }
    }
}

impl TripDraft {
    /// Every rule that doesn't need the store.
    pub fn check(&self) -> ContentResult<()> {
        let mut missing = Vec::new();
        for (label, value) in [
            ("title", self.title.as_str()),
            ("description", self.description.as_str()),
            ("destination", self.destination.as_str()),
            ("duration", self.duration.as_str()),
            ("main image", self.main_image.as_str()),
        ] {
            if is_blank(value) {
                missing.push(label);
            }
        }
        if self.date.is_none() {
            missing.push("date");
        }
        if self.price.is_none() {
            missing.push("price");
        }
        if !missing.is_empty() {
            return Err(ContentError::validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        if self.total_seats == 0 {
            return Err(ContentError::validation("A trip needs at least one seat"));
        }
        if self.available_seats > self.total_seats {
            return Err(ContentError::validation(format!(
                "Available seats ({}) exceed total seats ({})",
                self.available_seats, self.total_seats
            )));
        }
        match self.price {
            Some(price) if !(price.is_finite() && price >= 0.0) => {
                return Err(ContentError::validation(format!(
                    "Price must be zero or more, got {price}"
                )));
            }
            _ => {}
        }
        if self.gallery.len() > MAX_GALLERY_IMAGES {
            return Err(ContentError::validation(format!(
                "At most {MAX_GALLERY_IMAGES} gallery images, got {}",
                self.gallery.len()
            )));
        }
        if !STATES.contains(&self.state.as_str()) {
            return Err(ContentError::validation(format!(
                "Unknown state '{}' (expected one of {})",
                self.state,
                STATES.join(", ")
            )));
        }
        Ok(())
    }

    fn normalize(mut self) -> Self {
        for text in [
            &mut self.title,
            &mut self.description,
            &mut self.destination,
            &mut self.duration,
            &mut self.main_image,
        ] {
            *text = text.trim().to_string();
        }
        self.state = self.state.trim().to_ascii_uppercase();
        self.gallery = clean_list(self.gallery);
        self.included = clean_list(self.included);
        self.not_included = clean_list(self.not_included);
        self.what_to_bring = clean_list(self.what_to_bring);

        let source = match self.slug.as_deref() {
            Some(s) if !is_blank(s) => s.to_string(),
            _ => self.title.clone(),
        };
        self.slug = Some(generate_slug(&source));
        self
    }
}

/// Partial trip update. `None` leaves a column as it is.
///
/// Also the shape of patch files passed to `trilhos trips edit --file`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(rename = "titulo", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "descricao_curta", skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(rename = "descricao", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "destino", skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(rename = "estado", skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "local_saida", skip_serializing_if = "Option::is_none")]
    pub departure_point: Option<String>,
    #[serde(rename = "data_viagem", skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "duracao", skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(rename = "dificuldade", skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(rename = "vagas_total", skip_serializing_if = "Option::is_none")]
    pub total_seats: Option<u32>,
    #[serde(rename = "vagas_disponiveis", skip_serializing_if = "Option::is_none")]
    pub available_seats: Option<u32>,
    #[serde(rename = "preco", skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(rename = "preco_parcelado", skip_serializing_if = "Option::is_none")]
    pub installment_price: Option<String>,
    #[serde(rename = "imagem_principal", skip_serializing_if = "Option::is_none")]
    pub main_image: Option<String>,
    #[serde(rename = "galeria", skip_serializing_if = "Option::is_none")]
    pub gallery: Option<Vec<String>>,
    #[serde(rename = "inclusos", skip_serializing_if = "Option::is_none")]
    pub included: Option<Vec<String>>,
    #[serde(rename = "nao_inclusos", skip_serializing_if = "Option::is_none")]
    pub not_included: Option<Vec<String>>,
    #[serde(rename = "o_que_levar", skip_serializing_if = "Option::is_none")]
    pub what_to_bring: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ativo: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destaque: Option<bool>,
}

impl TripPatch {
    pub fn is_empty(&self) -> bool {
        *self == TripPatch::default()
    }
}

/// Admin overview of the trip list.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub active_trips: usize,
    /// Open seats summed over active trips.
    pub available_seats: u64,
    /// Earliest active trip dated today or later.
    pub next_trip: Option<Trip>,
}

impl Dashboard {
    pub fn from_trips(trips: &[Trip], today: NaiveDate) -> Self {
        let active: Vec<&Trip> = trips.iter().filter(|t| t.ativo).collect();
        let available_seats = active.iter().map(|t| u64::from(t.available_seats)).sum();
        let next_trip = active
            .iter()
            .filter(|t| t.date >= today)
            .min_by_key(|t| t.date)
            .map(|t| (*t).clone());
        Self {
            active_trips: active.len(),
            available_seats,
            next_trip,
        }
    }
}

impl Orderable for Trip {
    fn ordem(&self) -> i32 {
        self.ordem
    }

    fn is_active(&self) -> bool {
        self.ativo
    }

    fn tie_break(&self, other: &Self) -> Ordering {
        self.date.cmp(&other.date)
    }
}

impl Entity for Trip {
    const TABLE: &'static str = "viagens";
    const SECONDARY_ORDER: (&'static str, bool) = ("data_viagem", true);
    const UNIQUE_COLUMN: Option<&'static str> = Some("slug");

    type Draft = TripDraft;
    type Patch = TripPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_ordem(&mut self, ordem: i32) {
        self.ordem = ordem;
    }

    fn prepare_draft(draft: TripDraft, existing: &[Self]) -> ContentResult<TripDraft> {
        let draft = draft.normalize();
        draft.check()?;

        let slug = draft.slug.as_deref().unwrap_or_default();
        if slug.is_empty() {
            return Err(ContentError::validation(
                "Title has no characters usable in a URL slug",
            ));
        }
        if existing.iter().any(|t| t.slug == slug) {
            return Err(ContentError::validation(format!(
                "slug '{slug}' is already used by another viagens record"
            )));
        }
        Ok(draft)
    }

    fn normalize_patch(mut patch: TripPatch) -> TripPatch {
        patch.gallery = patch.gallery.map(clean_list);
        patch.included = patch.included.map(clean_list);
        patch.not_included = patch.not_included.map(clean_list);
        patch.what_to_bring = patch.what_to_bring.map(clean_list);
        patch.slug = patch.slug.map(|s| generate_slug(&s));
        patch.state = patch.state.map(|s| s.trim().to_ascii_uppercase());
        patch
    }

    fn validate(&self) -> ContentResult<()> {
        if self.slug.is_empty() {
            return Err(ContentError::validation("Slug cannot be empty"));
        }
        TripDraft::from(self).check()
    }

    fn flag(&self, flag: Flag) -> Option<bool> {
        Some(match flag {
            Flag::Ativo => self.ativo,
            Flag::Destaque => self.destaque,
        })
    }

    fn set_flag(&mut self, flag: Flag, value: bool) {
        match flag {
            Flag::Ativo => self.ativo = value,
            Flag::Destaque => self.destaque = value,
        }
    }
}

impl<S: ContentStore + ?Sized> Repository<Trip, S> {
    /// Active featured trips in display order, or the first active trips
    /// when none are featured.
    pub async fn featured(&self, limit: usize) -> ContentResult<Vec<Trip>> {
        let active = self.fetch(&Self::display_query(crate::ordering::View::Public)).await?;
        let picked = featured_with_fallback(&active, limit, |t| t.destaque);
        if !picked.iter().any(|t| t.destaque) && !picked.is_empty() {
            tracing::debug!(count = picked.len(), "no featured trips, showing active ones");
        }
        Ok(picked)
    }

    /// Fetch every trip and summarise the active ones as of `today`.
    pub async fn dashboard(&mut self, today: NaiveDate) -> ContentResult<Dashboard> {
        let trips = self.list(crate::ordering::View::Admin).await?;
        Ok(Dashboard::from_trips(&trips, today))
    }

    /// The active trip with this slug.
    pub async fn find_by_slug(&self, slug: &str) -> ContentResult<Option<Trip>> {
        let query = Query::new().eq("slug", slug).eq("ativo", true).limit(1);
        Ok(self.fetch(&query).await?.into_iter().next())
    }
}

/// Upload a trip's images and record their URLs on the draft.
///
/// The main image replaces `draft.main_image`; gallery files are appended
/// after any gallery URLs already on the draft. The gallery limit is
/// checked before anything is uploaded.
pub async fn attach_images<B: BlobStore + ?Sized>(
    draft: &mut TripDraft,
    uploads: &UploadService<B>,
    backend: &impl ImageBackend,
    main: Option<UploadFile>,
    gallery: Vec<UploadFile>,
) -> ContentResult<()> {
    let total = clean_list(draft.gallery.clone()).len() + gallery.len();
    if total > MAX_GALLERY_IMAGES {
        return Err(ContentError::validation(format!(
            "At most {MAX_GALLERY_IMAGES} gallery images, got {total}"
        )));
    }
    if let Some(main) = main {
        draft.main_image = uploads
            .prepare_and_upload(backend, main, Some(MAIN_IMAGE_FOLDER))
            .await?;
    }
    if !gallery.is_empty() {
        let urls = uploads
            .prepare_and_upload_many(backend, gallery, Some(GALLERY_FOLDER))
            .await?;
        draft.gallery.extend(urls);
    }
    Ok(())
}
