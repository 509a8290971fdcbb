//! Everything the public homepage shows, fetched in one go.
//!
//! The five reads run concurrently and fail independently:
//!
//! | Section | Query | On failure |
//! |---|---|---|
//! | trips | active trips, display order | empty |
//! | featured | featured trips, falling back to active ones | empty |
//! | photos | random sample of active gallery photos | empty |
//! | faq | active entries, display order | empty |
//! | settings | cached or fetched site settings | defaults |
//!
//! Nothing is retried. Failed sections are listed in [`Homepage::failed`].

use crate::content::{FaqEntry, GalleryPhoto, Repository, SettingsRepository, SiteSettings, Trip};
use crate::error::ContentResult;
use crate::ordering::{View, sample};
use crate::store::ContentStore;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Trips,
    Featured,
    Photos,
    Faq,
    Settings,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Trips => "trips",
            Section::Featured => "featured trips",
            Section::Photos => "gallery",
            Section::Faq => "FAQ",
            Section::Settings => "settings",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomepageOptions {
    pub featured_limit: usize,
    pub photo_sample: usize,
}

impl Default for HomepageOptions {
    fn default() -> Self {
        Self {
            featured_limit: crate::content::trip::DEFAULT_FEATURED_LIMIT,
            photo_sample: 6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Homepage {
    pub trips: Vec<Trip>,
    pub featured: Vec<Trip>,
    pub photos: Vec<GalleryPhoto>,
    pub faq: Vec<FaqEntry>,
    pub settings: SiteSettings,
    pub failed: Vec<Section>,
}

fn section<T: Default>(name: Section, result: ContentResult<T>, failed: &mut Vec<Section>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(section = %name, error = %e, "homepage section failed");
            failed.push(name);
            T::default()
        }
    }
}

impl Homepage {
    pub async fn load<S: ContentStore + ?Sized>(
        store: Arc<S>,
        settings: &mut SettingsRepository<S>,
        options: HomepageOptions,
    ) -> Homepage {
        let mut trips = Repository::<Trip, S>::new(store.clone());
        let featured_source = Repository::<Trip, S>::new(store.clone());
        let mut gallery = Repository::<GalleryPhoto, S>::new(store.clone());
        let mut faq = Repository::<FaqEntry, S>::new(store);

        let (trips_res, featured_res, photos_res, faq_res, settings_res) = tokio::join!(
            trips.list(View::Public),
            featured_source.featured(options.featured_limit),
            gallery.list(View::Public),
            faq.list(View::Public),
            settings.load_cached(),
        );

        let mut failed = Vec::new();
        let trips = section(Section::Trips, trips_res, &mut failed);
        let featured = section(Section::Featured, featured_res, &mut failed);
        let photos = section(Section::Photos, photos_res, &mut failed);
        let faq = section(Section::Faq, faq_res, &mut failed);
        let settings = match settings_res {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(section = %Section::Settings, error = %e, "homepage section failed");
                failed.push(Section::Settings);
                settings.current().clone()
            }
        };

        let photos = sample(&photos, options.photo_sample, &mut rand::thread_rng());

        tracing::info!(
            trips = trips.len(),
            featured = featured.len(),
            photos = photos.len(),
            faq = faq.len(),
            failed = failed.len(),
            "homepage loaded"
        );

        Homepage {
            trips,
            featured,
            photos,
            faq,
            settings,
            failed,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Click-to-chat link asking about a trip.
    pub fn trip_whatsapp_link(&self, trip: &Trip) -> String {
        self.settings.whatsapp_link(&format!(
            "Olá! Tenho interesse na viagem \"{}\" ({}).",
            trip.title,
            trip.date.format("%d/%m/%Y")
        ))
    }
}
