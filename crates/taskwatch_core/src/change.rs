//! Render gating for polled snapshots.
use serde::Serialize;

/// Order-sensitive serialization of a snapshot, compared for equality only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(String);

impl Signature {
    pub fn of<T: Serialize>(snapshot: &[T]) -> Option<Self> {
        serde_json::to_string(snapshot).ok().map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Decides whether `snapshot` must be rendered given the signature of the last
/// rendered snapshot.
///
/// Forced refreshes always render. A snapshot that cannot be serialized counts
/// as changed and leaves no signature behind.
pub fn should_render<T: Serialize>(
    snapshot: &[T],
    previous: Option<&Signature>,
    force: bool,
) -> (bool, Option<Signature>) {
    let next = Signature::of(snapshot);
    let render = force || next.is_none() || next.as_ref() != previous;
    (render, next)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeDetector {
    last: Option<Signature>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe<T: Serialize>(&mut self, snapshot: &[T], force: bool) -> bool {
        let (render, next) = should_render(snapshot, self.last.as_ref(), force);
        if render {
            self.last = next;
        }
        render
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn last_signature(&self) -> Option<&Signature> {
        self.last.as_ref()
    }
}

/// Ordering bookkeeping for one polled resource (history or tasks).
///
/// Background requests are not stacked while one is outstanding, and a
/// response older than the newest applied one is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotFeed {
    detector: ChangeDetector,
    next_seq: u64,
    latest_applied: u64,
    outstanding: usize,
}

impl SnapshotFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new request; `None` means a background refresh is skipped.
    pub fn begin(&mut self, force: bool) -> Option<u64> {
        if !force && self.outstanding > 0 {
            return None;
        }
        self.next_seq += 1;
        self.outstanding += 1;
        Some(self.next_seq)
    }

    /// Registers a request regardless of outstanding ones.
    pub fn begin_unqueued(&mut self) -> u64 {
        self.next_seq += 1;
        self.outstanding += 1;
        self.next_seq
    }

    /// Marks request `seq` as finished; returns false if a newer one already landed.
    pub fn complete(&mut self, seq: u64) -> bool {
        self.outstanding = self.outstanding.saturating_sub(1);
        if seq <= self.latest_applied {
            return false;
        }
        self.latest_applied = seq;
        true
    }

    pub fn detector_mut(&mut self) -> &mut ChangeDetector {
        &mut self.detector
    }

    pub fn reset(&mut self) {
        *self = Self {
            next_seq: self.next_seq,
            latest_applied: self.next_seq,
            ..Self::default()
        };
    }
}
