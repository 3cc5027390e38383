//! # Lens Bundle
//!
//! Portable workspace bundles for a local document-analysis store.
//!
//! A workspace holds documents (identified by the SHA-256 of their source
//! bytes), per-document analysis results, named groupings of documents, and
//! analysis profiles. This crate exports a workspace to a single `.lens`
//! archive and imports such an archive into another workspace, remapping
//! identifiers and deduplicating by content.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │   admit     │──▶│    Store    │──▶│  bundle::    │──▶ .lens
//! │ local files │   │ SQLite/Mem  │   │  writer      │
//! └─────────────┘   └──────┬──────┘   └──────────────┘
//!                          ▲
//!                          │          ┌──────────────┐
//!                          └──────────│  bundle::    │◀── .lens
//!                                     │ reader/import│
//!                                     └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lens init                          # create database and workspace row
//! lens add reports/*.pdf             # admit source files
//! lens export team.lens --source-files
//! lens preview team.lens             # on another machine
//! lens import team.lens
//! lens history
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Live workspace entities |
//! | [`identity`] | Content identity (SHA-256) |
//! | [`store`] | Storage trait with SQLite and in-memory backends |
//! | [`bundle`] | Archive format, export, preview, import |
//! | [`progress`] | Progress reporting for long operations |
//! | [`admit`] | Admission of local files into a workspace |
//! | [`export`] | `lens estimate` / `lens export` |
//! | [`import_cmd`] | `lens preview` / `lens import` / `lens history` |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod admit;
pub mod bundle;
pub mod config;
pub mod db;
pub mod export;
pub mod identity;
pub mod import_cmd;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod store;
