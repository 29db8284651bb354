//! # Event Numbering Engine
//!
//! Decides which sequence number a two-stage screenshot gets inside its
//! folder and keeps the in-memory pending hints consistent with the remote
//! listing.
//!
//! ## Sources of truth
//!
//! - The remote folder listing is authoritative: a `{n}-1.*` file means event
//!   `n` started, a `{n}-2.*` file means it ended.
//! - Pending entries only remember what a user started recently.
//! - Fallback counters are used when the folder cannot be listed at all.
//!
//! Number assignment never fails: every remote error degrades to a usable
//! number. Listing and summary calls return the adapter error to the caller.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::categories::TwoStageKind;
use crate::clock::current_week_bucket_key;
use crate::errors::DiskResult;
use crate::key_locks::KeyedLocks;
use crate::pending::{FallbackCounters, PendingEntry, PendingTable, UserId};
use crate::remote::RemoteDisk;
use crate::stage_files::{EventNumber, EventSummary, FolderListing};

/// How an end screenshot was matched to an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndResolution {
    /// The user's pending start was closed
    Continuation,
    /// The pending start had already been closed remotely, a new number was allocated
    SupersededCompleted,
    /// No pending start, but the folder had an open event which is now closed
    Orphaned,
    /// No open event anywhere, the end starts a new number
    Fresh,
}

impl EndResolution {
    /// Whether the end closes an existing event
    pub fn is_continuation(self) -> bool {
        matches!(self, EndResolution::Continuation | EndResolution::Orphaned)
    }
}

/// Number chosen for an end screenshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndAssignment {
    pub number: EventNumber,
    pub resolution: EndResolution,
}

impl EndAssignment {
    pub fn is_continuation(&self) -> bool {
        self.resolution.is_continuation()
    }
}

/// Sequence and pending-state engine shared by all users
pub struct EventEngine {
    pending: PendingTable,
    counters: FallbackCounters,
    locks: KeyedLocks,
}

impl EventEngine {
    pub fn new(pending: PendingTable, counters: FallbackCounters) -> Self {
        Self {
            pending,
            counters,
            locks: KeyedLocks::new(),
        }
    }

    /// Engine with process-local stores
    pub fn in_memory() -> Self {
        Self::new(PendingTable::in_memory(), FallbackCounters::in_memory())
    }

    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    fn lock_key(user_id: UserId, category: TwoStageKind) -> String {
        format!("{user_id}_{}", category.key())
    }

    async fn listing<D>(&self, disk: &D, folder: &str) -> DiskResult<FolderListing>
    where
        D: RemoteDisk + ?Sized,
    {
        let names = disk.list_files(folder).await?;
        Ok(FolderListing::from_names(names))
    }

    fn fallback_number(&self, category: TwoStageKind) -> EventNumber {
        let number = self.counters.next(category, &current_week_bucket_key());
        warn!(category = %category, number, "Using fallback counter for event number");
        number
    }

    /// First free number in the folder, re-listing once to catch a writer
    /// that raced the first listing
    ///
    /// Falls back to the weekly counter when the folder has no number left
    /// above its highest one.
    async fn fresh_number<D>(
        &self,
        disk: &D,
        category: TwoStageKind,
        folder: &str,
        listing: &FolderListing,
    ) -> EventNumber
    where
        D: RemoteDisk + ?Sized,
    {
        let Some(candidate) = listing.next_number().and_then(|next| listing.first_free_from(next)) else {
            warn!(category = %category, folder, "No free event number left in folder");
            return self.fallback_number(category);
        };
        match self.listing(disk, folder).await {
            Ok(recheck) => match recheck.first_free_from(candidate) {
                Some(number) => {
                    if number != candidate {
                        debug!(category = %category, candidate, number, "Candidate taken, moved forward");
                    }
                    number
                }
                None => {
                    warn!(category = %category, folder, "No free event number left in folder");
                    self.fallback_number(category)
                }
            },
            Err(e) => {
                debug!(category = %category, error = %e, "Re-check listing failed, keeping candidate");
                candidate
            }
        }
    }

    /// Number for a start screenshot
    ///
    /// Takes `max + 1` over the folder's stage files (or `1`), moving forward
    /// past any number that got taken meanwhile. The result is recorded as the
    /// user's pending entry for the category, replacing an older one.
    pub async fn assign_number_for_start<D>(
        &self,
        disk: &D,
        user_id: UserId,
        category: TwoStageKind,
        folder: &str,
    ) -> EventNumber
    where
        D: RemoteDisk + ?Sized,
    {
        let _guard = self.locks.lock(&Self::lock_key(user_id, category)).await;

        let number = match self.listing(disk, folder).await {
            Ok(listing) => self.fresh_number(disk, category, folder, &listing).await,
            Err(e) => {
                warn!(user_id, folder, error = %e, "Could not list folder for start");
                self.fallback_number(category)
            }
        };

        self.pending.insert(user_id, category, number, folder, Utc::now());
        info!(user_id, category = %category, number, folder, "Assigned start number");
        number
    }

    /// Number for an end screenshot
    ///
    /// Resolution order: the user's pending start, then the lowest open
    /// event in the folder, then a new number. Never fails.
    ///
    /// A pending start recorded for a different folder is not used and stays
    /// pending until its own folder gets an end or it expires.
    pub async fn assign_number_for_end<D>(
        &self,
        disk: &D,
        user_id: UserId,
        category: TwoStageKind,
        folder: &str,
    ) -> EndAssignment
    where
        D: RemoteDisk + ?Sized,
    {
        let _guard = self.locks.lock(&Self::lock_key(user_id, category)).await;

        let listing = self.listing(disk, folder).await;

        let pending = self.pending.take(user_id, category).and_then(|entry| {
            if entry.folder == folder {
                return Some(entry);
            }
            // The start lives in another folder, its number means nothing here
            warn!(
                user_id,
                category = %category,
                number = entry.event_number,
                pending_folder = %entry.folder,
                folder,
                "Pending start belongs to another folder, leaving it open"
            );
            self.pending
                .insert(user_id, category, entry.event_number, &entry.folder, entry.created_at);
            None
        });

        let assignment = if let Some(entry) = pending {
            match &listing {
                Ok(listing) if listing.has_end(entry.event_number) => EndAssignment {
                    number: self.fresh_number(disk, category, folder, listing).await,
                    resolution: EndResolution::SupersededCompleted,
                },
                Ok(_) => EndAssignment {
                    number: entry.event_number,
                    resolution: EndResolution::Continuation,
                },
                Err(e) => {
                    warn!(user_id, folder, error = %e, "Could not verify pending event, trusting it");
                    EndAssignment {
                        number: entry.event_number,
                        resolution: EndResolution::Continuation,
                    }
                }
            }
        } else {
            match &listing {
                Ok(listing) => match listing.first_unfinished() {
                    Some(number) => EndAssignment {
                        number,
                        resolution: EndResolution::Orphaned,
                    },
                    None => EndAssignment {
                        number: self.fresh_number(disk, category, folder, listing).await,
                        resolution: EndResolution::Fresh,
                    },
                },
                Err(e) => {
                    warn!(user_id, folder, error = %e, "Could not list folder for end");
                    EndAssignment {
                        number: self.fallback_number(category),
                        resolution: EndResolution::Fresh,
                    }
                }
            }
        };

        info!(
            user_id,
            category = %category,
            number = assignment.number,
            resolution = ?assignment.resolution,
            folder,
            "Assigned end number"
        );
        assignment
    }

    /// Forget a start whose upload failed, if the pending entry still holds
    /// that number
    pub async fn release_start(
        &self,
        user_id: UserId,
        category: TwoStageKind,
        number: EventNumber,
    ) -> bool {
        let _guard = self.locks.lock(&Self::lock_key(user_id, category)).await;
        match self.pending.get(user_id, category) {
            Some(entry) if entry.event_number == number => {
                debug!(user_id, category = %category, number, "Released pending start");
                self.pending.take(user_id, category).is_some()
            }
            _ => false,
        }
    }

    /// Numbers with a start file and no end file, ascending
    pub async fn list_unfinished<D>(&self, disk: &D, folder: &str) -> DiskResult<Vec<EventNumber>>
    where
        D: RemoteDisk + ?Sized,
    {
        Ok(self.listing(disk, folder).await?.unfinished())
    }

    /// Totals of started, completed and open events in the folder
    pub async fn summarize<D>(&self, disk: &D, folder: &str) -> DiskResult<EventSummary>
    where
        D: RemoteDisk + ?Sized,
    {
        Ok(self.listing(disk, folder).await?.summary())
    }

    /// Remove pending entries older than `ttl`
    pub fn sweep_expired_pending(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let removed = self.pending.sweep_expired(now, ttl);
        if removed > 0 {
            info!(removed, "Expired pending events removed");
        }
        removed
    }

    pub fn pending_for_user(&self, user_id: UserId) -> Vec<PendingEntry> {
        self.pending.for_user(user_id)
    }

    pub fn clear_pending_for_user(&self, user_id: UserId) -> usize {
        self.pending.clear_user(user_id)
    }

    /// Drop idle per-key locks
    pub fn prune_locks(&self) -> usize {
        self.locks.prune()
    }
}
