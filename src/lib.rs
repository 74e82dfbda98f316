//! # NoteOrbit
//!
//! Turn a PDF or a scanned page into study notes, one section at a time.
//!
//! A document is uploaded once; a hosted Gemini model splits it into logical
//! sections, and notes for a section are generated the first time it is
//! selected and cached for the rest of the session. The session survives
//! restarts as a single JSON snapshot.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────────┐
//! │  Intake  │──▶│  Session  │──▶│  NotesModel  │──▶ Gemini REST
//! │ pdf/img  │   │ container │   │ analyze/notes│
//! └──────────┘   └─────┬─────┘   └──────────────┘
//!                      │ snapshot        ▲
//!          ┌───────────┼───────────┐     │
//!          ▼           ▼           ▼     │
//!     ┌─────────┐ ┌─────────┐ ┌─────────┐
//!     │  Store  │ │  View   │ │ Server  │
//!     │  JSON   │ │ html/tty│ │  axum   │
//!     └─────────┘ └─────────┘ └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GEMINI_API_KEY=...
//! orbit upload ./lecture.pdf        # analyze into sections
//! orbit sections                    # list the index
//! orbit notes section-2 --find rna  # generate (or reuse) notes
//! orbit serve                       # browser UI on 127.0.0.1:7341
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and the persisted snapshot |
//! | [`error`] | Error taxonomy and remote failure classification |
//! | [`intake`] | Upload validation and data-URI encoding |
//! | [`ai`] | Model trait and Gemini client |
//! | [`store`] | Snapshot persistence port |
//! | [`session`] | State container and orchestration |
//! | [`view`] | Pure rendering (HTML page, terminal) |
//! | [`server`] | Browser UI and JSON API |
//! | [`logging`] | Tracing subscriber setup |

pub mod ai;
pub mod config;
pub mod error;
pub mod intake;
pub mod logging;
pub mod models;
pub mod server;
pub mod session;
pub mod store;
pub mod view;
