//! Shared fakes for the worker integration tests
//!
//! - [`StubLookup`]: canned metadata per ISBN, counts calls
//! - [`MemorySource`]: scripted deliveries, records acknowledgments
//! - [`spawn_sink`]: local TCP listener collecting one stream's lines

#![allow(dead_code)]

use async_trait::async_trait;
use bookrelay_worker::consumer::{DeliverySource, WorkMessage};
use bookrelay_worker::enrichment::MetadataLookup;
use bookrelay_worker::error::{EnrichmentError, QueueError};
use bookrelay_worker::model::Enrichment;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const CSV_HEADER: &str = "title,authors,publisher,language,isbn_10,isbn_13";

/// Lookup answering from a fixed table; unknown ISBNs fail with `NotFound`
#[derive(Default)]
pub struct StubLookup {
    answers: HashMap<String, Enrichment>,
    calls: AtomicUsize,
}

impl StubLookup {
    pub fn with(mut self, isbn: &str, enrichment: Enrichment) -> Self {
        self.answers.insert(isbn.to_string(), enrichment);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataLookup for StubLookup {
    async fn lookup(&self, isbn: &str) -> Result<Enrichment, EnrichmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .get(isbn)
            .cloned()
            .ok_or_else(|| EnrichmentError::NotFound(isbn.to_string()))
    }
}

pub fn description(text: &str) -> Enrichment {
    Enrichment {
        description: text.to_string(),
        ..Default::default()
    }
}

/// Observable state of a [`MemorySource`]
#[derive(Debug, Default)]
pub struct SourceState {
    pub acked: Vec<u64>,
    pub outstanding: usize,
    pub max_outstanding: usize,
    pub closed: bool,
}

/// What the source does once its scripted deliveries run out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhenDrained {
    End,
    Hang,
    Fail,
}

/// Scripted delivery source.
///
/// Like a broker honoring `basic_qos`, it withholds further deliveries while
/// `prefetch` of them are unacknowledged.
pub struct MemorySource {
    pending: VecDeque<WorkMessage>,
    when_drained: WhenDrained,
    prefetch: usize,
    state: Arc<Mutex<SourceState>>,
}

impl MemorySource {
    pub fn new<I, B>(bodies: I, when_drained: WhenDrained) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        let pending = bodies
            .into_iter()
            .enumerate()
            .map(|(i, body)| WorkMessage::new(i as u64 + 1, body))
            .collect();

        Self {
            pending,
            when_drained,
            prefetch: usize::MAX,
            state: Arc::new(Mutex::new(SourceState::default())),
        }
    }

    pub fn with_prefetch(mut self, prefetch: usize) -> Self {
        self.prefetch = prefetch;
        self
    }

    pub fn state(&self) -> Arc<Mutex<SourceState>> {
        Arc::clone(&self.state)
    }
}

#[async_trait]
impl DeliverySource for MemorySource {
    async fn recv(&mut self) -> Option<Result<WorkMessage, QueueError>> {
        if self.state.lock().unwrap().outstanding >= self.prefetch {
            // Nothing more is delivered until an ack arrives, and acks only
            // come from the caller.
            return std::future::pending().await;
        }

        match self.pending.pop_front() {
            Some(message) => {
                let mut state = self.state.lock().unwrap();
                state.outstanding += 1;
                state.max_outstanding = state.max_outstanding.max(state.outstanding);
                Some(Ok(message))
            }
            None => match self.when_drained {
                WhenDrained::End => None,
                WhenDrained::Fail => Some(Err(QueueError::Closed)),
                WhenDrained::Hang => std::future::pending().await,
            },
        }
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap();
        state.outstanding -= 1;
        state.acked.push(delivery_tag);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), QueueError> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Accept one connection and collect every line it carries
pub async fn spawn_sink() -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut lines = BufReader::new(socket).lines();
        let mut received = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            received.push(line);
        }
        received
    });

    (addr, handle)
}
