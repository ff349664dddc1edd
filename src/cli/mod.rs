use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use crate::config;
use crate::domain::query::{DEFAULT_LIMIT, DEFAULT_PAGE, SortField, SortOrder, TrackQuery};
use crate::domain::slug::slugify;
use crate::domain::track::TrackDraft;
use crate::http::server::HttpServer;
use crate::storage::Storage;

#[derive(Parser)]
#[command(name = "trackdeck")]
#[command(version = "0.1")]
#[command(about = "Music track catalog backed by plain files")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the storage directories and the default genre catalog
    Init,
    /// Run http server hosting the catalog
    Serve,
    /// Fill the catalog with sample tracks
    Seed {
        /// Number of tracks to create
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,
        /// Delete all existing tracks first
        #[arg(long)]
        clean: bool,
    },
    /// List tracks
    List(ListArgs),
    /// Print the genre catalog
    Genres,
}

#[derive(Args)]
pub struct ListArgs {
    /// Substring of title, artist or album
    #[arg(short, long)]
    search: Option<String>,
    #[arg(short, long)]
    genre: Option<String>,
    #[arg(short, long)]
    artist: Option<String>,
    /// title, artist, album or createdAt
    #[arg(long)]
    sort: Option<SortField>,
    /// asc or desc
    #[arg(long)]
    order: Option<SortOrder>,
    #[arg(short, long, default_value_t = DEFAULT_PAGE)]
    page: u32,
    #[arg(short, long, default_value_t = DEFAULT_LIMIT)]
    limit: u32,
}

impl From<ListArgs> for TrackQuery {
    fn from(args: ListArgs) -> Self {
        TrackQuery {
            search: args.search,
            genre: args.genre,
            artist: args.artist,
            sort: args.sort,
            order: args.order,
            page: args.page.max(1),
            limit: args.limit.max(1),
        }
    }
}

const SAMPLE_ARTISTS: &[&str] = &[
    "The Midnight Owls",
    "Luna Park",
    "Static Garden",
    "Marisol Vega",
    "Northern Lights Collective",
    "DJ Parallax",
    "Blue Harbor",
];

const SAMPLE_WORDS: &[&str] = &[
    "Echoes", "Neon", "River", "Golden", "Silent", "Summer", "Midnight", "Paper", "Electric",
    "Wild", "Glass", "Highway",
];

const SAMPLE_NOUNS: &[&str] = &[
    "Dreams", "Hearts", "Skyline", "Waves", "Static", "Roads", "Fire", "Horizon", "Shadows",
];

/// Deterministic sample data: the same index always yields the same draft
fn sample_draft(index: usize, genres: &[String]) -> TrackDraft {
    let title = format!(
        "{} {}",
        SAMPLE_WORDS[index % SAMPLE_WORDS.len()],
        SAMPLE_NOUNS[(index / SAMPLE_WORDS.len() + index) % SAMPLE_NOUNS.len()]
    );
    let title = if index >= SAMPLE_WORDS.len() * SAMPLE_NOUNS.len() {
        format!("{title} {}", index + 1)
    } else {
        title
    };

    let picked = if genres.is_empty() {
        Vec::new()
    } else {
        (0..1 + index % 2)
            .map(|offset| genres[(index * 3 + offset) % genres.len()].clone())
            .collect()
    };

    TrackDraft {
        slug: slugify(&title),
        title,
        artist: SAMPLE_ARTISTS[index % SAMPLE_ARTISTS.len()].to_string(),
        album: (index % 3 != 0).then(|| format!("Volume {}", index % 4 + 1)),
        genres: picked,
        cover_image: Some(format!("https://picsum.photos/seed/{}/300/300", index + 1)),
    }
}

fn seed(storage: &Storage, count: usize, clean: bool) -> anyhow::Result<usize> {
    if clean {
        let all = storage.tracks.list(&TrackQuery {
            limit: u32::MAX,
            ..Default::default()
        });
        let report = storage
            .tracks
            .delete_batch(all.items.iter().map(|t| t.id.to_string()));
        info!(
            "removed {} tracks ({} failed)",
            report.succeeded.len(),
            report.failed.len()
        );
    }

    let genres = storage.genres.list();
    let mut created = 0;
    for index in 0..count {
        let draft = sample_draft(index, &genres);
        if storage.tracks.get_by_slug(&draft.slug).is_some() {
            continue;
        }
        storage
            .tracks
            .create(draft)
            .with_context(|| format!("failed to create sample track #{index}"))?;
        created += 1;
    }
    Ok(created)
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::Config::load(&cli.config)?;
    let storage = Storage::open(&cfg.storage).with_context(|| "Failed to initialize storage")?;

    match cli.command {
        Commands::Init => {
            println!(
                "Storage ready: tracks in {}, uploads in {}, genres in {}",
                cfg.storage.tracks_dir.display(),
                cfg.storage.uploads_dir.display(),
                cfg.storage.genres_file.display()
            );
        }

        Commands::Serve => {
            println!("Starting HTTP server...");
            let http_server = HttpServer::new(storage, cfg.http, cfg.uploads, cfg.query);

            println!(
                "HTTP server running at http://{}:{}",
                http_server.config.bind_addr, http_server.config.port
            );
            http_server.run();
        }

        Commands::Seed { count, clean } => {
            let created = seed(&storage, count, clean)?;
            println!("Seeded {created} tracks");
        }

        Commands::List(args) => {
            let page = storage.tracks.list(&args.into());

            for track in &page.items {
                println!("{}  {} - {}", track.id, track.artist, track.title);
                if let Some(album) = &track.album {
                    println!("    album: {album}");
                }
                if !track.genres.is_empty() {
                    println!("    genres: {}", track.genres.join(", "));
                }
                if let Some(audio) = &track.audio_file {
                    println!("    audio: {audio}");
                }
            }
            println!(
                "page {}/{} ({} tracks)",
                page.page, page.total_pages, page.total
            );
        }

        Commands::Genres => {
            for genre in storage.genres.list() {
                println!("{genre}");
            }
        }
    }

    Ok(())
}
