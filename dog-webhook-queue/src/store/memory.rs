use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::Instant;

use crate::{QueueResult, QueueError, store::{KvStore, SCAN_DONE}};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-memory KV store for testing and single-process deployments.
///
/// Expired keys are dropped lazily on access. A SCAN cursor is the last key
/// returned and the next step resumes strictly after it, so keys present for
/// the whole scan are returned even when others are deleted mid-scan. Keys
/// written mid-scan may or may not be seen.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.read().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining time to live of a key, if it has one
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .read()
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| at - now)
    }

    fn purge_expired(&self, now: Instant) {
        self.entries.write().retain(|_, e| e.is_live(now));
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> QueueResult<Option<String>> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> QueueResult<()> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().insert(key.to_string(), entry);
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> QueueResult<u64> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let removed = keys
            .iter()
            .filter_map(|key| entries.remove(key))
            .filter(|e| e.is_live(now))
            .count();
        Ok(removed as u64)
    }

    async fn mget(&self, keys: &[String]) -> QueueResult<Vec<Option<String>>> {
        let now = Instant::now();
        let entries = self.entries.read();
        Ok(keys
            .iter()
            .map(|key| entries.get(key).filter(|e| e.is_live(now)).map(|e| e.value.clone()))
            .collect())
    }

    async fn scan(&self, cursor: &str, pattern: &str, count: usize) -> QueueResult<(String, Vec<String>)> {
        let after = decode_cursor(cursor)?;
        let now = Instant::now();
        self.purge_expired(now);

        let entries = self.entries.read();
        let lower = match &after {
            Some(last) => Bound::Excluded(last.clone()),
            None => Bound::Unbounded,
        };
        let mut walked = entries.range::<String, _>((lower, Bound::Unbounded)).map(|(key, _)| key);

        let step: Vec<&String> = walked.by_ref().take(count.max(1)).collect();
        let matched = step
            .iter()
            .filter(|key| glob_match(pattern, key))
            .map(|key| (*key).clone())
            .collect();

        let next_cursor = match (step.last(), walked.next()) {
            (Some(last), Some(_)) => encode_cursor(last),
            _ => SCAN_DONE.to_string(),
        };
        Ok((next_cursor, matched))
    }
}

/// Cursors carry the last key returned, hex encoded behind a `k` so they can
/// never collide with the terminal `"0"`.
fn encode_cursor(last: &str) -> String {
    format!("k{}", hex::encode(last))
}

fn decode_cursor(cursor: &str) -> QueueResult<Option<String>> {
    if cursor == SCAN_DONE {
        return Ok(None);
    }
    let invalid = || QueueError::Store(format!("invalid scan cursor: {cursor}"));
    let raw = cursor.strip_prefix('k').ok_or_else(invalid)?;
    let bytes = hex::decode(raw).map_err(|_| invalid())?;
    String::from_utf8(bytes).map(Some).map_err(|_| invalid())
}

/// Redis-style glob matching: `*`, `?`, `[...]` classes (with `^` negation
/// and ranges) and `\` escapes.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    // position of the last `*` and the text index it is currently absorbing up to
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        let step = match p.get(pi) {
            Some('*') => {
                backtrack = Some((pi, ti));
                pi += 1;
                continue;
            }
            Some('?') => Some(pi + 1),
            Some('[') => match_class(&p, pi, t[ti]),
            Some('\\') if pi + 1 < p.len() => (p[pi + 1] == t[ti]).then_some(pi + 2),
            Some(&c) => (c == t[ti]).then_some(pi + 1),
            None => None,
        };

        match step {
            Some(next) => {
                pi = next;
                ti += 1;
            }
            None => match backtrack {
                Some((star, absorbed)) => {
                    pi = star + 1;
                    ti = absorbed + 1;
                    backtrack = Some((star, absorbed + 1));
                }
                None => return false,
            },
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}

/// Match `c` against the class starting at `p[start] == '['`; returns the
/// pattern index after the class on success.
fn match_class(p: &[char], start: usize, c: char) -> Option<usize> {
    let mut i = start + 1;
    let negate = p.get(i) == Some(&'^');
    if negate {
        i += 1;
    }
    let mut matched = false;
    while i < p.len() && p[i] != ']' {
        if p[i] == '\\' && i + 1 < p.len() {
            matched |= p[i + 1] == c;
            i += 2;
        } else if i + 2 < p.len() && p[i + 1] == '-' && p[i + 2] != ']' {
            let (lo, hi) = if p[i] <= p[i + 2] { (p[i], p[i + 2]) } else { (p[i + 2], p[i]) };
            matched |= lo <= c && c <= hi;
            i += 3;
        } else {
            matched |= p[i] == c;
            i += 1;
        }
    }
    // an unterminated class matches up to the end of the pattern, like Redis
    let next = if i < p.len() { i + 1 } else { i };
    (matched != negate).then_some(next)
}
