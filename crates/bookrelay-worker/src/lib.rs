//! Bookrelay Worker Library
//!
//! Consumes file notifications from an AMQP queue, streams the referenced CSV
//! object out of S3-compatible storage, enriches each book row with Google
//! Books metadata and pushes the rows to a downstream consumer over TCP.
//!
//! # Flow
//!
//! - **Consumer** ([`consumer`]): one control task, prefetch-bounded, acks each
//!   delivery right after spawning its file task
//! - **Pipeline** ([`pipeline`]): fetch, parse, enrich and send one file
//! - **Stream** ([`stream`]): per-file TCP session speaking the line protocol
//! - **Webhook** ([`webhook`]): receives status callbacks from downstream
//!
//! # Wire protocol
//!
//! ```text
//! {"request_id":"…","mapper":{…},"webhook_url":"…","filename":"…"}
//! title,authors,publisher,language,isbn_10,isbn_13,description,smallThumbnail,thumbnail
//! Dune,Herbert,Ace,en,0441013597,9780441013593,A desert planet...,,
//! endacabadofinalizadoanimalesco
//! ```
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod codec;
pub mod config;
pub mod consumer;
pub mod enrichment;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod storage;
pub mod stream;
pub mod webhook;

pub use config::Config;
pub use pipeline::{FilePipeline, ProcessSummary};
