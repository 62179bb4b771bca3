use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Next section in the same unit.
pub const PRIMARY: i32 = 10;
/// First section of the next main unit.
pub const UNIT_TRANSITION: i32 = 5;
/// Any other in-course link found on a page.
pub const DISCOVERED: i32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub priority: i32,
    pub depth: u32,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, priority: i32, depth: u32) -> Self {
        FetchRequest {
            url: url.into(),
            priority,
            depth,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Queued {
    request: FetchRequest,
    seq: u64,
}

impl Ord for Queued {
    // Higher priority first; FIFO among equals.
    fn cmp(&self, other: &Self) -> Ordering {
        self.request
            .priority
            .cmp(&other.request.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pending requests. A URL is handed out at most once per run; re-pushing a
/// still-queued URL at a higher priority moves it up.
#[derive(Debug, Default)]
pub struct Frontier {
    heap: BinaryHeap<Queued>,
    /// Best priority seen for every URL ever pushed.
    scheduled: HashMap<String, i32>,
    popped: HashSet<String>,
    seq: u64,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the URL was already handed out, or is queued at the
    /// same or a higher priority.
    pub fn push(&mut self, request: FetchRequest) -> bool {
        if self.popped.contains(&request.url) {
            return false;
        }
        match self.scheduled.get(&request.url) {
            Some(&best) if best >= request.priority => return false,
            _ => {}
        }
        self.scheduled.insert(request.url.clone(), request.priority);
        self.seq += 1;
        self.heap.push(Queued {
            request,
            seq: self.seq,
        });
        true
    }

    pub fn extend(&mut self, requests: impl IntoIterator<Item = FetchRequest>) -> usize {
        requests
            .into_iter()
            .map(|r| self.push(r))
            .filter(|&added| added)
            .count()
    }

    pub fn pop(&mut self) -> Option<FetchRequest> {
        while let Some(Queued { request, .. }) = self.heap.pop() {
            // Entries superseded by an upgrade are skipped.
            let current = self.scheduled.get(&request.url).copied();
            if self.popped.contains(&request.url) || current != Some(request.priority) {
                continue;
            }
            self.popped.insert(request.url.clone());
            return Some(request);
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// URLs still waiting to be handed out.
    pub fn len(&self) -> usize {
        self.scheduled.len() - self.popped.len()
    }

    pub fn scheduled(&self) -> usize {
        self.scheduled.len()
    }
}

// ── Tests ──
