//! # NoteOrbit CLI (`orbit`)
//!
//! Upload a document, browse its sections, and generate study notes from the
//! terminal, or start the browser UI.
//!
//! ## Usage
//!
//! ```bash
//! orbit --config ./config/orbit.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `orbit upload <path>` | Analyze a PDF/JPG/PNG and make it the current document |
//! | `orbit sections` | Show the section index |
//! | `orbit notes <id>` | Select a section, generating notes if not cached |
//! | `orbit status` | Summarize the session |
//! | `orbit reset` | Forget the current document |
//! | `orbit theme` | Toggle the dark-mode flag |
//! | `orbit download` | Write the original upload back to disk |
//! | `orbit serve` | Start the browser UI |

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use noteorbit::ai::GeminiClient;
use noteorbit::config::{self, Config};
use noteorbit::error::NoteError;
use noteorbit::logging;
use noteorbit::server;
use noteorbit::session::{SelectOutcome, Session, UploadOutcome};
use noteorbit::store::JsonFileStore;
use noteorbit::view::{self, terminal, Screen, UiFilters};

/// NoteOrbit: section-by-section study notes from PDFs and images.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "orbit",
    about = "NoteOrbit: section-by-section study notes from PDFs and images",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/orbit.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a document and make it the current one.
    ///
    /// Replaces any previous document, its sections and its notes. On
    /// failure the previous document is kept.
    Upload {
        /// PDF, JPG or PNG file.
        path: PathBuf,

        /// Declared MIME type. Guessed from the extension when omitted.
        #[arg(long)]
        mime: Option<String>,
    },

    /// Show the section index.
    Sections {
        /// Only sections whose title or summary contains this text.
        #[arg(long)]
        search: Option<String>,
    },

    /// Select a section and print its notes.
    ///
    /// Notes are generated on first selection and reused afterwards.
    Notes {
        /// Section id, e.g. `section-0`.
        id: String,

        /// Highlight this text in the notes.
        #[arg(long)]
        find: Option<String>,
    },

    /// Summarize the current session.
    Status,

    /// Forget the current document. The theme is kept.
    Reset,

    /// Toggle dark mode.
    Theme,

    /// Write the original upload to disk.
    Download {
        /// Destination. Defaults to the original file name in the current directory.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Start the browser UI.
    Serve,
}

fn open_session(cfg: &Config) -> anyhow::Result<Session> {
    let model = GeminiClient::from_config(&cfg.ai)?;
    if !model.has_credential() {
        tracing::debug!(var = %cfg.ai.api_key_env, "no API key in environment");
    }
    let store = JsonFileStore::new(&cfg.storage.state_dir);
    Ok(
        Session::open(Arc::new(model), Arc::new(store), cfg.prefers_dark())
            .with_error_ttl(Duration::from_secs(cfg.ui.error_dismiss_secs)),
    )
}

fn user_facing(err: NoteError) -> anyhow::Error {
    anyhow::anyhow!(err.user_message())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;
    logging::init_logging(&cfg.logging);

    let session = open_session(&cfg)?;
    let ansi = atty::is(atty::Stream::Stdout);

    match cli.command {
        Commands::Upload { path, mime } => {
            let outcome = session
                .upload_path(&path, mime.as_deref())
                .await
                .map_err(user_facing)?;
            let UploadOutcome::Loaded { sections } = outcome else {
                bail!("Session was reset while analyzing {}.", path.display());
            };
            println!("Analyzed {}: {} sections", path.display(), sections);
            let screen = view::build_screen(&session.snapshot(), session.loading(), &UiFilters::default());
            if let Screen::Workspace { index, .. } = screen {
                print!("{}", terminal::render_index(&index));
            }
        }
        Commands::Sections { search } => {
            let filters = UiFilters {
                index_search: search.unwrap_or_default(),
                note_find: String::new(),
            };
            match view::build_screen(&session.snapshot(), session.loading(), &filters) {
                Screen::Upload { .. } => {
                    println!("No document loaded. Run `orbit upload <path>` first.")
                }
                Screen::Workspace { index, .. } => print!("{}", terminal::render_index(&index)),
            }
        }
        Commands::Notes { id, find } => {
            let state = session.snapshot();
            if state.file.is_none() {
                bail!("No document loaded. Run `orbit upload <path>` first.");
            }
            if state.section(&id).is_none() {
                bail!("No section with id '{}'. Run `orbit sections` to list them.", id);
            }

            let outcome = session.select(&id).await.map_err(user_facing)?;
            if outcome == SelectOutcome::Cached {
                tracing::debug!(section = %id, "using cached notes");
            }

            let filters = UiFilters {
                index_search: String::new(),
                note_find: find.unwrap_or_default(),
            };
            if let Screen::Workspace { viewer, .. } =
                view::build_screen(&session.snapshot(), session.loading(), &filters)
            {
                print!("{}", terminal::render_viewer(&viewer, &filters.note_find, ansi));
            }
        }
        Commands::Status => {
            let state = session.snapshot();
            match &state.file {
                Some(file) => println!("document: {} ({})", file.name, file.mime_type),
                None => println!("document: none"),
            }
            println!("sections: {}", state.sections.len());
            println!("notes cached: {}", state.notes.len());
            println!(
                "selected: {}",
                state.selected_section_id.as_deref().unwrap_or("none")
            );
            println!("theme: {}", if state.is_dark_mode { "dark" } else { "light" });
            println!("model: {}", session.model_name());
        }
        Commands::Reset => {
            session.reset();
            println!("Session reset.");
        }
        Commands::Theme => {
            let dark = session.toggle_theme();
            println!("Theme: {}", if dark { "dark" } else { "light" });
        }
        Commands::Download { output } => {
            let Some(export) = session.download()? else {
                bail!("No document loaded.");
            };
            let path = output.unwrap_or_else(|| PathBuf::from(&export.name));
            std::fs::write(&path, &export.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {} ({} bytes)", path.display(), export.bytes.len());
        }
        Commands::Serve => {
            server::run_server(&cfg, Arc::new(session)).await?;
        }
    }

    Ok(())
}
