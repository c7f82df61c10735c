//! Message source adapters.
//!
//! A source is pure transport: it lists messages its backend considers
//! unseen and hands them to the pipeline as `RawMessage`. All triage logic
//! lives downstream.

pub mod imap;

pub use imap::ImapSource;
