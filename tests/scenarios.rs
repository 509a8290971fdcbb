//! End-to-end flows through the public API, backed by the in-memory store.
//!
//! Each test wires repositories and the upload service the way the CLI does,
//! then checks what ends up in the store and in the repository caches.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use trilhos_admin::content::{
    Flag, GalleryPhoto, Outcome, PhotoDraft, Repository, Trip, TripDraft, TripPatch,
};
use trilhos_admin::error::ContentError;
use trilhos_admin::imaging::{PrepareConfig, RustBackend, prepare_image};
use trilhos_admin::ordering::View;
use trilhos_admin::store::MemoryStore;
use trilhos_admin::store::memory::OpKind;
use trilhos_admin::types::UploadFile;
use trilhos_admin::upload::UploadService;

#[allow(dead_code)]
#[path = "../src/test_helpers/images.rs"]
mod images;

use images::{jpeg_bytes, padded_jpeg};

const PUBLIC_PREFIX: &str = "https://memory.local/storage/v1/object/public/";

fn trip(title: &str, ordem: i32, destaque: bool) -> TripDraft {
    TripDraft {
        title: title.to_string(),
        description: "Trilha guiada com paradas para banho de cachoeira.".to_string(),
        destination: title.to_string(),
        date: NaiveDate::from_ymd_opt(2026, 8, 15),
        duration: "1 dia".to_string(),
        price: Some(150.0),
        main_image: format!("{PUBLIC_PREFIX}viagens/main/capa.jpg"),
        ativo: true,
        destaque,
        ordem,
        ..TripDraft::default()
    }
}

fn trips(store: &Arc<MemoryStore>) -> Repository<Trip, MemoryStore> {
    Repository::new(store.clone())
}

// =========================================================================
// Scenarios
// =========================================================================

#[tokio::test]
async fn featured_query_returns_only_the_featured_trip() {
    let store = Arc::new(MemoryStore::new());
    let mut repo = trips(&store);
    repo.create(trip("Pedra Azul", 0, false)).await.unwrap();
    let featured = repo.create(trip("Pico da Bandeira", 1, true)).await.unwrap();

    let picked = repo.featured(5).await.unwrap();
    assert_eq!(picked.len(), 1);
    assert_eq!(picked[0].id, featured.id);
}

#[tokio::test]
async fn oversized_photo_is_rejected_then_accepted_after_resizing() {
    let store = Arc::new(MemoryStore::new());
    let uploads = UploadService::new(store.clone(), "galeria");
    let original = UploadFile::new(
        "cachoeira.jpg",
        "image/jpeg",
        padded_jpeg(2600, 1300, 6 * 1024 * 1024),
    );
    assert!(original.size() > 6 * 1024 * 1024 - 1);

    let err = uploads.upload(&original, Some("momentos")).await.unwrap_err();
    assert!(matches!(err, ContentError::Validation(_)));
    assert_eq!(store.object_count("galeria"), 0);

    let resized = prepare_image(&RustBackend::new(), original, &PrepareConfig::default()).unwrap();
    assert!(resized.size() < 5 * 1024 * 1024);
    let url = uploads.upload(&resized, Some("momentos")).await.unwrap();

    assert!(url.starts_with(&format!("{PUBLIC_PREFIX}galeria/momentos/")));
    assert!(url.ends_with(".jpg"));
    assert_eq!(store.object_count("galeria"), 1);
}

#[tokio::test]
async fn failed_visibility_toggle_reverts_the_photo() {
    let store = Arc::new(MemoryStore::new());
    let mut gallery = Repository::<GalleryPhoto, _>::new(store.clone());
    let photo = gallery
        .create(PhotoDraft::new(format!("{PUBLIC_PREFIX}galeria/momentos/a.jpg")))
        .await
        .unwrap();
    assert!(photo.ativo);

    store.fail_next(OpKind::Update);
    let outcome = gallery.toggle_flag(&photo.id, Flag::Ativo).await.unwrap();

    assert!(matches!(
        outcome,
        Outcome::RolledBack(ContentError::Persistence { .. })
    ));
    assert!(gallery.get(&photo.id).unwrap().ativo);
    assert_eq!(store.rows("galeria_momentos")[0]["ativo"], true);
}

#[tokio::test]
async fn deleted_trip_is_gone_from_the_list() {
    let store = Arc::new(MemoryStore::new());
    let mut repo = trips(&store);
    let keep = repo.create(trip("Itaúnas", 0, false)).await.unwrap();
    let gone = repo.create(trip("Caparaó", 1, false)).await.unwrap();

    repo.delete(&gone.id).await.unwrap();

    let ids: Vec<String> = repo
        .list(View::Admin)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec![keep.id]);
}

// =========================================================================
// Properties
// =========================================================================

#[test]
fn wide_images_are_scaled_to_the_max_width() {
    let backend = RustBackend::new();
    let config = PrepareConfig::default();
    for (w, h) in [(2400, 1600), (3001, 997), (1921, 1080)] {
        let file = UploadFile::new("x.jpg", "image/jpeg", jpeg_bytes(w, h));
        let out = prepare_image(&backend, file, &config).unwrap();
        let img = image::load_from_memory(&out.bytes).unwrap();

        assert_eq!(img.width(), 1920);
        let expected = h as f64 * 1920.0 / w as f64;
        assert!(
            (img.height() as f64 - expected).abs() <= 1.0,
            "{w}x{h} became {}x{}",
            img.width(),
            img.height()
        );
    }
}

#[tokio::test]
async fn policy_violations_never_reach_the_blob_store() {
    let store = Arc::new(MemoryStore::new());
    let uploads = UploadService::new(store.clone(), "viagens");
    let rejected = [
        UploadFile::new("roteiro.pdf", "application/pdf", vec![0; 1024]),
        UploadFile::new("anim.gif", "image/gif", vec![0; 1024]),
        UploadFile::new("big.png", "image/png", vec![0; 5 * 1024 * 1024 + 1]),
    ];

    for file in &rejected {
        let err = uploads.upload(file, None).await.unwrap_err();
        assert!(matches!(err, ContentError::Validation(_)), "{}", file.name);
    }
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn repeated_uploads_of_one_file_get_distinct_urls() {
    let store = Arc::new(MemoryStore::new());
    let uploads = UploadService::new(store.clone(), "galeria");
    let file = UploadFile::new("a.jpg", "image/jpeg", jpeg_bytes(32, 32));

    let mut urls = HashSet::new();
    for _ in 0..20 {
        urls.insert(uploads.upload(&file, None).await.unwrap());
    }
    assert_eq!(urls.len(), 20);
    assert_eq!(store.object_count("galeria"), 20);
}

#[tokio::test]
async fn incomplete_trip_is_rejected_without_touching_the_cache() {
    let store = Arc::new(MemoryStore::new());
    let mut repo = trips(&store);
    repo.create(trip("Pedra Azul", 0, false)).await.unwrap();

    let mut missing_title = trip("", 1, false);
    missing_title.title = "   ".into();
    let mut missing_price = trip("Caparaó", 1, false);
    missing_price.price = None;

    for draft in [missing_title, missing_price, TripDraft::default()] {
        let err = repo.create(draft).await.unwrap_err();
        assert!(matches!(err, ContentError::Validation(_)));
        assert_eq!(repo.cached().len(), 1);
    }
    assert_eq!(store.rows("viagens").len(), 1);
}

#[tokio::test]
async fn update_of_unknown_id_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let mut repo = trips(&store);
    repo.create(trip("Pedra Azul", 0, false)).await.unwrap();
    let before = repo.cached().to_vec();

    let patch = TripPatch {
        price: Some(99.0),
        ..Default::default()
    };
    let err = repo.update("does-not-exist", patch).await.unwrap_err();

    assert!(matches!(err, ContentError::NotFound { .. }));
    assert_eq!(repo.cached(), before.as_slice());
}

fn ordem_by_id(store: &MemoryStore, table: &str) -> HashMap<String, i64> {
    store
        .rows(table)
        .into_iter()
        .map(|r| {
            (
                r["id"].as_str().unwrap().to_string(),
                r["ordem"].as_i64().unwrap(),
            )
        })
        .collect()
}

#[tokio::test]
async fn reordering_twice_matches_reordering_once() {
    for bulk in [true, false] {
        let store = Arc::new(MemoryStore::new().with_bulk_upsert(bulk));
        let mut gallery = Repository::<GalleryPhoto, _>::new(store.clone());
        let urls: Vec<String> = (0..5).map(|i| format!("{PUBLIC_PREFIX}galeria/{i}.jpg")).collect();
        let photos = gallery.add_photos(&urls).await.unwrap();

        let mut ids: Vec<String> = photos.iter().map(|p| p.id.clone()).collect();
        ids.reverse();

        gallery.reorder(&ids).await.unwrap();
        let once = ordem_by_id(&store, "galeria_momentos");
        gallery.reorder(&ids).await.unwrap();
        let twice = ordem_by_id(&store, "galeria_momentos");

        assert_eq!(once, twice, "bulk upsert: {bulk}");
        assert_eq!(once[&ids[0]], 0);
        assert_eq!(once[&ids[4]], 4);
    }
}

#[tokio::test]
async fn listing_is_sorted_by_ordem() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut ordens: Vec<i32> = (0..40).map(|i| i * 3).collect();
    ordens.shuffle(&mut rng);

    let store = Arc::new(MemoryStore::new());
    store.seed(
        "galeria_momentos",
        ordens
            .iter()
            .map(|o| json!({"imagem_url": format!("u{o}"), "ordem": o, "ativo": true}))
            .collect(),
    );

    let mut gallery = Repository::<GalleryPhoto, _>::new(store);
    let listed = gallery.list(View::Public).await.unwrap();
    assert_eq!(listed.len(), 40);
    assert!(listed.windows(2).all(|w| w[0].ordem <= w[1].ordem));
}
