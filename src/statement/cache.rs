//! Prepared statement cache keyed by statement text.
//!
//! At most one prepare per text is in flight. Later callers for the same
//! text await the same shared future. The map lock only guards registering
//! and settling entries; the round trip to the session runs outside it.
//!
//! The shared prepare settles its own entry before it completes, so there
//! is no window where the prepare is done but the entry still reads as in
//! flight. In-flight entries hold only a weak reference to the prepare: when
//! every waiter is dropped the prepare is dropped with them, the weak
//! reference no longer upgrades, and the dead entry is pruned.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};

use crate::error::{DriverError, MapperError, Result};
use crate::session::{PreparedStatement, Session};

type PrepareOutcome = std::result::Result<Arc<PreparedStatement>, DriverError>;
type PrepareFuture = Shared<BoxFuture<'static, PrepareOutcome>>;
type Entries = Mutex<HashMap<String, Entry>>;

enum Entry {
    Ready(Arc<PreparedStatement>),
    InFlight {
        ticket: u64,
        prepare: WeakShared<BoxFuture<'static, PrepareOutcome>>,
    },
}

impl Entry {
    /// An in-flight entry whose waiters have all gone away.
    fn is_abandoned(&self) -> bool {
        match self {
            Entry::Ready(_) => false,
            Entry::InFlight { prepare, .. } => prepare.upgrade().is_none(),
        }
    }
}

/// Prepared handles for one session, deduplicated by statement text.
pub struct PreparedStatementCache {
    session: Arc<dyn Session>,
    entries: Arc<Entries>,
    next_ticket: AtomicU64,
}

impl PreparedStatementCache {
    /// Create an empty cache preparing through `session`.
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self {
            session,
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Prepared handle for `cql`, preparing it if needed.
    pub async fn get(&self, cql: &str) -> Result<Arc<PreparedStatement>> {
        let prepare = {
            let mut entries = lock(&self.entries);
            let joined = match entries.get(cql) {
                Some(Entry::Ready(prepared)) => {
                    tracing::trace!(cql, "Prepared statement cache hit");
                    return Ok(Arc::clone(prepared));
                }
                Some(Entry::InFlight { prepare, .. }) => prepare.upgrade(),
                None => None,
            };
            match joined {
                Some(prepare) => {
                    tracing::trace!(cql, "Joining in-flight prepare");
                    prepare
                }
                None => self.start(&mut entries, cql),
            }
        };

        prepare.await.map_err(|source| MapperError::Prepare {
            cql: cql.to_string(),
            source,
        })
    }

    /// Whether a prepared handle for `cql` is cached. In-flight prepares do
    /// not count.
    pub fn contains(&self, cql: &str) -> bool {
        matches!(lock(&self.entries).get(cql), Some(Entry::Ready(_)))
    }

    /// Number of cached prepared handles.
    pub fn len(&self) -> usize {
        let mut entries = lock(&self.entries);
        prune(&mut entries);
        entries
            .values()
            .filter(|e| matches!(e, Entry::Ready(_)))
            .count()
    }

    /// Whether no prepared handle is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached handle. Prepares already in flight still complete
    /// for their waiters but are not cached.
    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    fn start(&self, entries: &mut HashMap<String, Entry>, cql: &str) -> PrepareFuture {
        prune(entries);

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let session = Arc::clone(&self.session);
        let registry = Arc::downgrade(&self.entries);
        let text = cql.to_string();
        let prepare = async move {
            tracing::debug!(cql = %text, "Preparing statement");
            let outcome = session
                .prepare(&text)
                .await
                .map(Arc::new)
                .map_err(DriverError::from);
            settle(&registry, &text, ticket, &outcome);
            outcome
        }
        .boxed()
        .shared();

        // `downgrade` is only `None` once the future has completed, which a
        // freshly created one cannot have.
        if let Some(weak) = prepare.downgrade() {
            entries.insert(
                cql.to_string(),
                Entry::InFlight {
                    ticket,
                    prepare: weak,
                },
            );
        }
        prepare
    }
}

fn lock(entries: &Entries) -> MutexGuard<'_, HashMap<String, Entry>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

fn prune(entries: &mut HashMap<String, Entry>) {
    entries.retain(|_, entry| !entry.is_abandoned());
}

/// Record the outcome, unless the entry was replaced or cleared while the
/// prepare was running.
fn settle(registry: &Weak<Entries>, cql: &str, ticket: u64, outcome: &PrepareOutcome) {
    let Some(entries) = registry.upgrade() else {
        return;
    };
    let mut entries = lock(&entries);
    let current = matches!(
        entries.get(cql),
        Some(Entry::InFlight { ticket: t, .. }) if *t == ticket
    );
    if !current {
        return;
    }
    match outcome {
        Ok(prepared) => {
            entries.insert(cql.to_string(), Entry::Ready(Arc::clone(prepared)));
        }
        Err(err) => {
            tracing::warn!(cql, error = %err, "Prepare failed");
            entries.remove(cql);
        }
    }
}
