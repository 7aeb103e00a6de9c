//! Lock-free order book state
//!
//! Uses DashMap for concurrent reads/writes with minimal contention

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use triarb_core::{OrderBookSnapshot, Symbol};

/// Timestamped book entry
#[derive(Debug, Clone)]
pub struct BookEntry {
    pub snapshot: Arc<OrderBookSnapshot>,
    pub fetched_at: Instant,
}

impl BookEntry {
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.age() > max_age
    }
}

/// Latest fetched book per symbol
#[derive(Debug)]
pub struct BookState {
    books: DashMap<Symbol, BookEntry>,

    hits: AtomicU64,
    misses: AtomicU64,
    update_count: AtomicU64,
    last_update: RwLock<Option<Instant>>,
}

impl BookState {
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            update_count: AtomicU64::new(0),
            last_update: RwLock::new(None),
        }
    }

    /// Store a freshly fetched book, replacing any previous one
    pub fn insert(&self, snapshot: OrderBookSnapshot) -> Arc<OrderBookSnapshot> {
        let snapshot = Arc::new(snapshot);
        let now = Instant::now();
        self.books.insert(
            snapshot.symbol.clone(),
            BookEntry {
                snapshot: Arc::clone(&snapshot),
                fetched_at: now,
            },
        );
        self.update_count.fetch_add(1, Ordering::Relaxed);
        *self.last_update.write() = Some(now);
        snapshot
    }

    /// Book for `symbol` if fetched within `max_age`; counts hits and misses
    pub fn get_fresh(&self, symbol: &Symbol, max_age: Duration) -> Option<Arc<OrderBookSnapshot>> {
        let fresh = self
            .books
            .get(symbol)
            .filter(|entry| !entry.is_stale(max_age))
            .map(|entry| Arc::clone(&entry.snapshot));

        let counter = if fresh.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        fresh
    }

    /// Latest book regardless of age
    pub fn get(&self, symbol: &Symbol) -> Option<BookEntry> {
        self.books.get(symbol).map(|r| r.value().clone())
    }

    pub fn invalidate(&self, symbol: &Symbol) {
        self.books.remove(symbol);
    }

    /// Drop entries older than `max_age`
    pub fn cleanup(&self, max_age: Duration) {
        self.books.retain(|_, v| !v.is_stale(max_age));
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn stats(&self) -> BookStateStats {
        BookStateStats {
            book_count: self.books.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            update_count: self.update_count.load(Ordering::Relaxed),
            last_update_age: self.last_update.read().map(|t| t.elapsed()),
        }
    }
}

impl Default for BookState {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about cached books
#[derive(Debug, Clone)]
pub struct BookStateStats {
    pub book_count: usize,
    pub hits: u64,
    pub misses: u64,
    pub update_count: u64,
    pub last_update_age: Option<Duration>,
}
