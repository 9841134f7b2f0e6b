//! Consent-document retrieval from a clinical records portal.
//!
//! Drives the portal through WebDriver to log in, look up clients by name
//! and save their two consent forms as PDFs, while three flat
//! comma-separated files (queue, success ledger, failure ledger) track
//! which clients still need processing. Runs are incremental and safe to
//! repeat: anything already recorded is subtracted from the queue before
//! a browser session is even opened.

pub mod client;
pub mod config;
pub mod errors;
pub mod portal;
pub mod roster;
pub mod runner;

pub use client::{ClientName, ClientProfile, ConsentDoc};
pub use config::{Config, Credentials};
pub use errors::PortalError;
pub use portal::{PortalOptions, PortalSession};
pub use roster::Roster;
pub use runner::{run_batch, ClientProcessor, RunSummary};
