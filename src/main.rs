use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trilhos_admin::cache::SettingsCache;
use trilhos_admin::config::{self, AppConfig};
use trilhos_admin::content::settings::{FOOTER_FOLDER, FOOTER_IMAGE};
use trilhos_admin::content::trip::{MAIN_IMAGE_FOLDER, attach_images};
use trilhos_admin::content::{
    Difficulty, Direction, Entity, FaqDraft, FaqEntry, FaqPatch, Flag, GalleryPhoto, Repository,
    SettingsRepository, Trip, TripDraft, TripPatch,
};
use trilhos_admin::homepage::{Homepage, HomepageOptions};
use trilhos_admin::imaging::{RustBackend, prepare_image};
use trilhos_admin::ordering::View;
use trilhos_admin::output;
use trilhos_admin::store::RestStore;
use trilhos_admin::types::UploadFile;
use trilhos_admin::upload::{UploadProgress, UploadService};

#[derive(Parser)]
#[command(name = "trilhos")]
#[command(version)]
#[command(about = "Admin toolkit for the Trilhos & Trilhas site")]
#[command(long_about = "\
Admin toolkit for the Trilhos & Trilhas site

Manages trips, homepage gallery photos, FAQ entries and site settings in the
content store, and uploads images to the blob store after shrinking them.

Connection settings come from config.toml and the environment (a .env file
is read too):

  SUPABASE_URL        project URL
  SUPABASE_ANON_KEY   public API key
  WHATSAPP_NUMBER     default contact number
  INSTAGRAM_URL       default Instagram profile

Run 'trilhos gen-config' to generate a documented config.toml.")]
struct Cli {
    /// Config file
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Trips (viagens)
    #[command(subcommand)]
    Trips(TripsCommand),
    /// Homepage gallery photos (momentos)
    #[command(subcommand)]
    Gallery(GalleryCommand),
    /// Frequently asked questions
    #[command(subcommand)]
    Faq(FaqCommand),
    /// Site-wide settings
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Shrink and recompress images locally, exactly as uploads do
    Prepare {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output directory
        #[arg(long, default_value = "prepared")]
        out: PathBuf,
    },
    /// Active trips, open seats and the next departure
    Dashboard,
    /// Load everything the public homepage shows
    Homepage,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

/// Shared flag for list commands.
#[derive(clap::Args, Clone, Copy)]
struct ListArgs {
    /// Include hidden records
    #[arg(long)]
    all: bool,
}

impl ListArgs {
    fn view(self) -> View {
        if self.all { View::Admin } else { View::Public }
    }
}

#[derive(Subcommand)]
enum TripsCommand {
    List(ListArgs),
    /// Featured trips, or the first active ones when none are featured
    Featured {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one trip by slug or id
    Show { slug: String },
    /// Create a trip from a TOML file using the table's column names
    Create {
        file: PathBuf,
        /// Main image to upload
        #[arg(long)]
        main_image: Option<PathBuf>,
        /// Gallery image to upload (repeatable)
        #[arg(long = "gallery-image")]
        gallery: Vec<PathBuf>,
    },
    /// Change some fields of a trip
    Edit(TripEditArgs),
    Delete { id: String },
    /// Flip visibility, or the featured flag with --featured
    Toggle {
        id: String,
        #[arg(long)]
        featured: bool,
    },
    /// Set the display order: ids in their new order
    Reorder {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(clap::Args)]
struct TripEditArgs {
    id: String,
    /// TOML file with the columns to change; flags override it
    #[arg(long)]
    file: Option<PathBuf>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    destination: Option<String>,
    #[arg(long)]
    state: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    date: Option<NaiveDate>,
    #[arg(long)]
    duration: Option<String>,
    #[arg(long)]
    difficulty: Option<Difficulty>,
    #[arg(long)]
    price: Option<f64>,
    #[arg(long)]
    total_seats: Option<u32>,
    #[arg(long)]
    available_seats: Option<u32>,
    /// New main image to upload
    #[arg(long)]
    main_image: Option<PathBuf>,
}

impl TripEditArgs {
    fn patch(&self) -> Result<TripPatch, Box<dyn Error>> {
        let patch: TripPatch = match &self.file {
            Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
            None => TripPatch::default(),
        };
        Ok(TripPatch {
            title: self.title.clone().or(patch.title),
            description: self.description.clone().or(patch.description),
            destination: self.destination.clone().or(patch.destination),
            state: self.state.clone().or(patch.state),
            date: self.date.or(patch.date),
            duration: self.duration.clone().or(patch.duration),
            difficulty: self.difficulty.or(patch.difficulty),
            price: self.price.or(patch.price),
            total_seats: self.total_seats.or(patch.total_seats),
            available_seats: self.available_seats.or(patch.available_seats),
            ..patch
        })
    }
}

#[derive(Subcommand)]
enum GalleryCommand {
    List(ListArgs),
    /// Shrink, upload and register photos
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Delete a photo and its stored file
    Delete {
        id: String,
        /// Leave the file in the bucket
        #[arg(long)]
        keep_file: bool,
    },
    Toggle { id: String },
    Caption { id: String, caption: String },
    Reorder {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MoveDirection {
    Up,
    Down,
}

impl From<MoveDirection> for Direction {
    fn from(d: MoveDirection) -> Self {
        match d {
            MoveDirection::Up => Direction::Up,
            MoveDirection::Down => Direction::Down,
        }
    }
}

#[derive(Subcommand)]
enum FaqCommand {
    List(ListArgs),
    Add {
        question: String,
        answer: String,
        /// Create it hidden
        #[arg(long)]
        hidden: bool,
    },
    /// Change the question, the answer, or both
    #[command(group = clap::ArgGroup::new("text").required(true).multiple(true))]
    Edit {
        id: String,
        #[arg(long, group = "text")]
        question: Option<String>,
        #[arg(long, group = "text")]
        answer: Option<String>,
    },
    Delete { id: String },
    Toggle { id: String },
    /// Move an entry one place up or down
    Move { id: String, direction: MoveDirection },
}

#[derive(Subcommand)]
enum SettingsCommand {
    Show {
        /// Skip the local cache
        #[arg(long)]
        refresh: bool,
    },
    /// Write KEY=VALUE pairs, in order
    Set {
        #[arg(required = true, value_parser = parse_pair)]
        pairs: Vec<(String, String)>,
    },
    /// Upload the footer image and point the setting at it
    Footer { image: PathBuf },
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))
}

/// Connected collaborators plus the config they were built from.
struct App {
    config: AppConfig,
    store: Arc<RestStore>,
    backend: RustBackend,
}

impl App {
    fn connect(config: AppConfig) -> Result<Self, Box<dyn Error>> {
        config.require_backend()?;
        let store = RestStore::new(
            config.backend.url.as_str(),
            config.backend.anon_key.as_str(),
            config.timeout(),
        )?;
        Ok(Self {
            config,
            store: Arc::new(store),
            backend: RustBackend::new(),
        })
    }

    fn repo<E: Entity>(&self) -> Repository<E, RestStore> {
        Repository::new(self.store.clone())
    }

    fn uploads(&self, bucket: &str) -> UploadService<RestStore> {
        UploadService::new(self.store.clone(), bucket)
            .with_policy(self.config.upload_policy())
            .with_prepare_config(self.config.prepare_config())
    }

    fn settings(&self) -> SettingsRepository<RestStore> {
        let repo =
            SettingsRepository::new(self.store.clone()).with_defaults(self.config.site_defaults());
        match self.config.settings_ttl() {
            Some(ttl) => repo.with_cache(SettingsCache::new(&self.config.cache_dir(), ttl)),
            None => repo,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Prepare { files, out } => {
            let config = config::load_config_with_env(&cli.config)?;
            prepare_files(&config, &files, &out)?;
        }
        command => {
            let config = config::load_config_with_env(&cli.config)?;
            let app = App::connect(config)?;
            match command {
                Command::Trips(cmd) => trips(&app, cmd).await?,
                Command::Gallery(cmd) => gallery(&app, cmd).await?,
                Command::Faq(cmd) => faq(&app, cmd).await?,
                Command::Settings(cmd) => settings(&app, cmd).await?,
                Command::Dashboard => {
                    let today = chrono::Local::now().date_naive();
                    let dashboard = app.repo::<Trip>().dashboard(today).await?;
                    output::print_dashboard(&dashboard);
                }
                Command::Homepage => {
                    let mut settings = app.settings();
                    let options = HomepageOptions {
                        featured_limit: app.config.homepage.featured_limit,
                        photo_sample: app.config.homepage.photo_sample,
                    };
                    let home = Homepage::load(app.store.clone(), &mut settings, options).await;
                    output::print_homepage(&home);
                }
                Command::GenConfig | Command::Prepare { .. } => {}
            }
        }
    }

    Ok(())
}

fn prepare_files(
    config: &AppConfig,
    files: &[PathBuf],
    out: &std::path::Path,
) -> Result<(), Box<dyn Error>> {
    std::fs::create_dir_all(out)?;
    let backend = RustBackend::new();
    let prepare = config.prepare_config();
    for path in files {
        let original = UploadFile::from_path(path)?;
        let prepared = prepare_image(&backend, original.clone(), &prepare)?;
        std::fs::write(out.join(&prepared.name), &prepared.bytes)?;
        for line in output::format_prepared(&original, &prepared) {
            println!("{}", line);
        }
    }
    Ok(())
}

async fn trips(app: &App, cmd: TripsCommand) -> Result<(), Box<dyn Error>> {
    let mut repo = app.repo::<Trip>();
    match cmd {
        TripsCommand::List(args) => {
            output::print_trips(&repo.list(args.view()).await?);
        }
        TripsCommand::Featured { limit } => {
            let limit = limit.unwrap_or(app.config.homepage.featured_limit);
            output::print_trips(&repo.featured(limit).await?);
        }
        TripsCommand::Show { slug } => {
            let trip = match repo.find_by_slug(&slug).await? {
                Some(trip) => Some(trip),
                None => repo
                    .list(View::Admin)
                    .await?
                    .into_iter()
                    .find(|t| t.slug == slug || t.id == slug),
            };
            match trip {
                Some(trip) => output::print_trip_detail(&trip),
                None => return Err(format!("No trip with slug or id '{slug}'").into()),
            }
        }
        TripsCommand::Create {
            file,
            main_image,
            gallery,
        } => {
            let mut draft: TripDraft = toml::from_str(&std::fs::read_to_string(&file)?)?;
            let main = main_image.as_deref().map(UploadFile::from_path).transpose()?;

            // Validate before uploading anything; the main image URL is
            // filled in by the upload.
            let mut candidate = draft.clone();
            if let Some(main) = &main {
                candidate.main_image = main.name.clone();
            }
            candidate.check()?;

            let uploads = app.uploads(&app.config.buckets.trips);
            let gallery = gallery
                .iter()
                .map(|p| UploadFile::from_path(p))
                .collect::<Result<Vec<_>, _>>()?;
            let before: Vec<String> = std::iter::once(draft.main_image.clone())
                .chain(draft.gallery.iter().cloned())
                .collect();
            attach_images(&mut draft, &uploads, &app.backend, main, gallery).await?;

            repo.list(View::Admin).await?;
            match repo.create(draft.clone()).await {
                Ok(trip) => output::print_trip_detail(&trip),
                Err(e) => {
                    let uploaded = std::iter::once(&draft.main_image)
                        .chain(draft.gallery.iter())
                        .filter(|url| !url.is_empty() && !before.contains(url));
                    for url in uploaded {
                        if let Err(cleanup) = uploads.remove(url).await {
                            tracing::warn!(url = %url, error = %cleanup, "orphaned upload left in bucket");
                        }
                    }
                    return Err(e.into());
                }
            }
        }
        TripsCommand::Edit(args) => {
            let mut patch = args.patch()?;
            if patch.is_empty() && args.main_image.is_none() {
                return Err("Nothing to change: pass --file or a field flag".into());
            }
            repo.list(View::Admin).await?;
            if repo.get(&args.id).is_none() {
                return Err(format!("No trip with id '{}'", args.id).into());
            }

            let uploads = app.uploads(&app.config.buckets.trips);
            let new_main = match &args.main_image {
                Some(path) => {
                    let file = UploadFile::from_path(path)?;
                    let url = uploads
                        .prepare_and_upload(&app.backend, file, Some(MAIN_IMAGE_FOLDER))
                        .await?;
                    patch.main_image = Some(url.clone());
                    Some(url)
                }
                None => None,
            };

            match repo.update(&args.id, patch).await {
                Ok(trip) => output::print_trip_detail(&trip),
                Err(e) => {
                    if let Some(url) = new_main
                        && let Err(cleanup) = uploads.remove(&url).await
                    {
                        tracing::warn!(url = %url, error = %cleanup, "orphaned upload left in bucket");
                    }
                    return Err(e.into());
                }
            }
        }
        TripsCommand::Delete { id } => {
            repo.delete(&id).await?;
            println!("Deleted trip {id}");
        }
        TripsCommand::Toggle { id, featured } => {
            let flag = if featured { Flag::Destaque } else { Flag::Ativo };
            repo.list(View::Admin).await?;
            let trip = repo.toggle_flag(&id, flag).await?.into_result()?;
            println!(
                "{}: active={} featured={}",
                trip.title, trip.ativo, trip.destaque
            );
        }
        TripsCommand::Reorder { ids } => {
            repo.list(View::Admin).await?;
            repo.reorder(&ids).await?;
            output::print_trips(repo.cached());
        }
    }
    Ok(())
}

async fn gallery(app: &App, cmd: GalleryCommand) -> Result<(), Box<dyn Error>> {
    let mut repo = app.repo::<GalleryPhoto>();
    match cmd {
        GalleryCommand::List(args) => {
            output::print_gallery(&repo.list(args.view()).await?);
        }
        GalleryCommand::Upload { files } => {
            let files = files
                .iter()
                .map(|p| UploadFile::from_path(p))
                .collect::<Result<Vec<_>, _>>()?;
            let uploads = app.uploads(&app.config.buckets.gallery);
            repo.list(View::Admin).await?;
            let photos = repo.upload_photos(&uploads, &app.backend, files).await?;
            let urls: Vec<String> = photos.into_iter().map(|p| p.image_url).collect();
            output::print_uploaded(&urls);
        }
        GalleryCommand::Delete { id, keep_file } => {
            repo.list(View::Admin).await?;
            let url = repo.get(&id).map(|p| p.image_url.clone());
            repo.delete(&id).await?;
            println!("Deleted photo {id}");
            if let (false, Some(url)) = (keep_file, url) {
                let uploads = app.uploads(&app.config.buckets.gallery);
                if let Err(e) = uploads.remove(&url).await {
                    tracing::warn!(url = %url, error = %e, "photo row deleted but file remains");
                }
            }
        }
        GalleryCommand::Toggle { id } => {
            repo.list(View::Admin).await?;
            let photo = repo.toggle_flag(&id, Flag::Ativo).await?.into_result()?;
            println!("{}: active={}", photo.id, photo.ativo);
        }
        GalleryCommand::Caption { id, caption } => {
            let photo = repo.set_caption(&id, &caption).await?;
            output::print_gallery(std::slice::from_ref(&photo));
        }
        GalleryCommand::Reorder { ids } => {
            repo.list(View::Admin).await?;
            repo.reorder(&ids).await?;
            output::print_gallery(repo.cached());
        }
    }
    Ok(())
}

async fn faq(app: &App, cmd: FaqCommand) -> Result<(), Box<dyn Error>> {
    let mut repo = app.repo::<FaqEntry>();
    match cmd {
        FaqCommand::List(args) => {
            output::print_faq(&repo.list(args.view()).await?);
        }
        FaqCommand::Add {
            question,
            answer,
            hidden,
        } => {
            repo.list(View::Admin).await?;
            let draft = FaqDraft {
                ativo: !hidden,
                ..FaqDraft::new(question, answer)
            };
            let entry = repo.create(draft).await?;
            output::print_faq(std::slice::from_ref(&entry));
        }
        FaqCommand::Edit {
            id,
            question,
            answer,
        } => {
            repo.list(View::Admin).await?;
            let entry = repo.update(&id, FaqPatch { question, answer, ativo: None }).await?;
            output::print_faq(std::slice::from_ref(&entry));
        }
        FaqCommand::Delete { id } => {
            repo.delete(&id).await?;
            println!("Deleted FAQ entry {id}");
        }
        FaqCommand::Toggle { id } => {
            repo.list(View::Admin).await?;
            let entry = repo.toggle_flag(&id, Flag::Ativo).await?.into_result()?;
            println!("{}: active={}", entry.question, entry.ativo);
        }
        FaqCommand::Move { id, direction } => {
            repo.list(View::Admin).await?;
            let index = repo
                .cached()
                .iter()
                .position(|e| e.id == id)
                .ok_or_else(|| format!("No FAQ entry with id '{id}'"))?;
            repo.move_entry(index, direction.into()).await?;
            output::print_faq(repo.cached());
        }
    }
    Ok(())
}

async fn settings(app: &App, cmd: SettingsCommand) -> Result<(), Box<dyn Error>> {
    let mut repo = app.settings();
    match cmd {
        SettingsCommand::Show { refresh } => {
            let settings = if refresh {
                repo.load().await?
            } else {
                repo.load_cached().await?
            };
            output::print_settings(&settings);
        }
        SettingsCommand::Set { pairs } => {
            match pairs.as_slice() {
                [(key, value)] => repo.set(key, value).await?,
                many => repo.set_many(many).await?,
            }
            println!("Saved {} setting(s)", pairs.len());
        }
        SettingsCommand::Footer { image } => {
            let file = UploadFile::from_path(&image)?;
            let prepared = prepare_image(&app.backend, file, &app.config.prepare_config())?;
            let uploads = app.uploads(&app.config.buckets.gallery);

            let (tx, mut rx) = mpsc::unbounded_channel();
            let name = prepared.name.clone();
            let printer = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    eprintln!("{}", output::format_upload_progress(&name, event));
                    if event == UploadProgress::Reset {
                        break;
                    }
                }
            });
            let result = uploads
                .upload_with_progress(&prepared, Some(FOOTER_FOLDER), Some(&tx))
                .await;
            drop(tx);
            printer.await?;

            let url = result?;
            repo.set(FOOTER_IMAGE, &url).await?;
            println!("{FOOTER_IMAGE} = {url}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trips_command(args: &[&str]) -> TripsCommand {
        let argv = ["trilhos", "trips"].iter().chain(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Trips(cmd) => cmd,
            _ => panic!("not a trips command"),
        }
    }

    #[test]
    fn trip_edit_flags_become_a_patch() {
        let TripsCommand::Edit(args) = trips_command(&[
            "edit", "t1", "--price", "250", "--date", "2026-09-05", "--difficulty", "dificil",
        ]) else {
            panic!("not an edit");
        };

        let patch = args.patch().unwrap();
        assert_eq!(args.id, "t1");
        assert_eq!(patch.price, Some(250.0));
        assert_eq!(patch.date, NaiveDate::from_ymd_opt(2026, 9, 5));
        assert_eq!(patch.difficulty, Some(Difficulty::Hard));
        assert_eq!(patch.title, None);
    }

    #[test]
    fn trip_edit_flags_override_the_patch_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("patch.toml");
        std::fs::write(&file, "titulo = \"Antigo\"\npreco = 100.0\nativo = false\n").unwrap();

        let TripsCommand::Edit(args) =
            trips_command(&["edit", "t1", "--file", file.to_str().unwrap(), "--title", "Novo"])
        else {
            panic!("not an edit");
        };

        let patch = args.patch().unwrap();
        assert_eq!(patch.title.as_deref(), Some("Novo"));
        assert_eq!(patch.price, Some(100.0));
        assert_eq!(patch.ativo, Some(false));
    }

    #[test]
    fn faq_edit_needs_question_or_answer() {
        assert!(Cli::try_parse_from(["trilhos", "faq", "edit", "f1"]).is_err());
        assert!(Cli::try_parse_from(["trilhos", "faq", "edit", "f1", "--answer", "Sim."]).is_ok());
    }
}
