//! In-process store speaking the subset of the protocol the facade issues.
//!
//! Used as the test double for the facade and for embedding the router
//! without a server. Every command is appended to a journal so callers can
//! assert exactly which verbs and keys reached the store.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry as Slot;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use parking_lot::Mutex;
use redis::{Arg, Cmd, Value};

use super::traits::{StoreConnection, Topology};
use crate::error::{KvError, Result};
use crate::facade::lock::RELEASE_SCRIPT;

#[derive(Debug, Clone)]
enum Data {
    Str(String),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    data: Data,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(data: Data) -> Self {
        Self { data, expires_at: None }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

/// Absolute expiry for a positive TTL. Refused when it overflows the clock.
fn deadline(secs: i64, command: &str) -> Result<Instant> {
    Instant::now()
        .checked_add(Duration::from_secs(secs.unsigned_abs()))
        .ok_or_else(|| KvError::InvalidArgument(format!("ERR invalid expire time in '{}' command", command)))
}

pub struct InMemoryStore {
    data: DashMap<String, Entry>,
    journal: Mutex<Vec<Vec<String>>>,
    topology: Topology,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_topology(Topology::Standalone)
    }

    /// Same store, reporting a different topology.
    #[must_use]
    pub fn with_topology(topology: Topology) -> Self {
        Self {
            data: DashMap::new(),
            journal: Mutex::new(Vec::new()),
            topology,
        }
    }

    /// Live (non-expired) key count
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data.iter().filter(|e| !e.value().is_expired(now)).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, physical_key: &str) -> bool {
        self.live(physical_key).is_some()
    }

    /// Every command received so far, verb first.
    pub fn journal(&self) -> Vec<Vec<String>> {
        self.journal.lock().clone()
    }

    /// Commands received with the given verb.
    pub fn commands(&self, verb: &str) -> Vec<Vec<String>> {
        self.journal
            .lock()
            .iter()
            .filter(|c| c.first().is_some_and(|v| v.eq_ignore_ascii_case(verb)))
            .cloned()
            .collect()
    }

    pub fn clear_journal(&self) {
        self.journal.lock().clear();
    }

    /// Returns a snapshot of the entry, dropping it if it has expired.
    fn live(&self, key: &str) -> Option<Entry> {
        let now = Instant::now();
        let expired = match self.data.get(key) {
            None => return None,
            Some(entry) if !entry.is_expired(now) => return Some(entry.clone()),
            Some(_) => true,
        };
        if expired {
            self.data.remove_if(key, |_, e| e.is_expired(now));
        }
        None
    }

    fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.live(key).map(|e| e.data) {
            None => Ok(None),
            Some(Data::Str(s)) => Ok(Some(s)),
            Some(Data::Hash(_)) => Err(KvError::InvalidArgument(WRONGTYPE.into())),
        }
    }

    fn get_hash(&self, key: &str) -> Result<HashMap<String, String>> {
        match self.live(key).map(|e| e.data) {
            None => Ok(HashMap::new()),
            Some(Data::Hash(h)) => Ok(h),
            Some(Data::Str(_)) => Err(KvError::InvalidArgument(WRONGTYPE.into())),
        }
    }

    /// Overwrites value and clears any TTL, like SET.
    fn put_string(&self, key: &str, value: String) {
        self.data.insert(key.to_string(), Entry::new(Data::Str(value)));
    }

    /// Write guard on a live entry, created (or reset if expired) from
    /// `empty`. The shard stays locked until the guard drops, so callers can
    /// read-modify-write without racing.
    fn live_slot(&self, key: &str, empty: fn() -> Data) -> RefMut<'_, String, Entry> {
        let now = Instant::now();
        let mut entry = self.data.entry(key.to_string()).or_insert_with(|| Entry::new(empty()));
        if entry.is_expired(now) {
            *entry = Entry::new(empty());
        }
        entry
    }

    fn update_hash(&self, key: &str, pairs: &[String]) -> Result<u64> {
        let mut entry = self.live_slot(key, || Data::Hash(HashMap::new()));
        let Data::Hash(hash) = &mut entry.data else {
            return Err(KvError::InvalidArgument(WRONGTYPE.into()));
        };
        let mut added = 0;
        for pair in pairs.chunks(2) {
            if hash.insert(pair[0].clone(), pair[1].clone()).is_none() {
                added += 1;
            }
        }
        Ok(added)
    }

    fn append(&self, key: &str, suffix: &str) -> Result<i64> {
        let mut entry = self.live_slot(key, || Data::Str(String::new()));
        match &mut entry.data {
            Data::Str(s) => {
                s.push_str(suffix);
                Ok(s.len() as i64)
            }
            Data::Hash(_) => Err(KvError::InvalidArgument(WRONGTYPE.into())),
        }
    }

    fn add_to_counter(&self, key: &str, delta: i64) -> Result<i64> {
        let mut entry = self.live_slot(key, || Data::Str("0".into()));
        let current = match &entry.data {
            Data::Str(s) => s
                .parse::<i64>()
                .map_err(|_| KvError::InvalidArgument("ERR value is not an integer or out of range".into()))?,
            Data::Hash(_) => return Err(KvError::InvalidArgument(WRONGTYPE.into())),
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| KvError::InvalidArgument("ERR increment or decrement would overflow".into()))?;
        entry.data = Data::Str(next.to_string());
        Ok(next)
    }

    fn expire_key(&self, key: &str, seconds: i64) -> Result<bool> {
        if self.live(key).is_none() {
            return Ok(false);
        }
        if seconds <= 0 {
            self.data.remove(key);
            return Ok(true);
        }
        let at = deadline(seconds, "expire")?;
        match self.data.get_mut(key) {
            Some(mut entry) => {
                entry.expires_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn ttl(&self, key: &str) -> i64 {
        match self.live(key) {
            None => -2,
            Some(Entry { expires_at: None, .. }) => -1,
            Some(Entry { expires_at: Some(at), .. }) => {
                let remaining = at.saturating_duration_since(Instant::now());
                // round up like the server does for sub-second remainders
                remaining.as_millis().div_ceil(1000) as i64
            }
        }
    }

    fn matching_keys(&self, pattern: &str) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .data
            .iter()
            .filter(|e| !e.value().is_expired(now) && glob_match(pattern.as_bytes(), e.key().as_bytes()))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }

    fn apply(&self, verb: &str, args: &[String]) -> Result<Value> {
        let need = |n: usize| -> Result<()> {
            if args.len() < n {
                Err(KvError::InvalidArgument(format!(
                    "ERR wrong number of arguments for '{}' command",
                    verb.to_ascii_lowercase()
                )))
            } else {
                Ok(())
            }
        };

        match verb {
            "GET" => {
                need(1)?;
                Ok(opt_bulk(self.get_string(&args[0])?))
            }
            "SET" => {
                need(2)?;
                self.set_with_options(&args[0], &args[1], &args[2..])
            }
            "APPEND" => {
                need(2)?;
                Ok(Value::Int(self.append(&args[0], &args[1])?))
            }
            "MGET" => {
                need(1)?;
                let values = args
                    .iter()
                    .map(|k| match self.live(k).map(|e| e.data) {
                        Some(Data::Str(s)) => bulk(s),
                        _ => Value::Nil,
                    })
                    .collect();
                Ok(Value::Array(values))
            }
            "MSET" => {
                if args.is_empty() || args.len() % 2 != 0 {
                    return Err(KvError::InvalidArgument("ERR wrong number of arguments for 'mset' command".into()));
                }
                for pair in args.chunks(2) {
                    self.put_string(&pair[0], pair[1].clone());
                }
                Ok(Value::Okay)
            }
            "DEL" => {
                need(1)?;
                let removed = args.iter().filter(|k| self.live(k).is_some() && self.data.remove(*k).is_some()).count();
                Ok(Value::Int(removed as i64))
            }
            "EXISTS" => {
                need(1)?;
                Ok(Value::Int(args.iter().filter(|k| self.live(k).is_some()).count() as i64))
            }
            "HSET" | "HMSET" => {
                if args.len() < 3 || args.len() % 2 == 0 {
                    return Err(KvError::InvalidArgument(format!(
                        "ERR wrong number of arguments for '{}' command",
                        verb.to_ascii_lowercase()
                    )));
                }
                let added = self.update_hash(&args[0], &args[1..])?;
                if verb == "HMSET" {
                    Ok(Value::Okay)
                } else {
                    Ok(Value::Int(added as i64))
                }
            }
            "HGET" => {
                need(2)?;
                Ok(opt_bulk(self.get_hash(&args[0])?.remove(&args[1])))
            }
            "HMGET" => {
                need(2)?;
                let hash = self.get_hash(&args[0])?;
                Ok(Value::Array(args[1..].iter().map(|f| opt_bulk(hash.get(f).cloned())).collect()))
            }
            "HGETALL" => {
                need(1)?;
                let mut pairs: Vec<(String, String)> = self.get_hash(&args[0])?.into_iter().collect();
                pairs.sort();
                Ok(Value::Array(pairs.into_iter().flat_map(|(f, v)| [bulk(f), bulk(v)]).collect()))
            }
            "HKEYS" => {
                need(1)?;
                let mut fields: Vec<String> = self.get_hash(&args[0])?.into_keys().collect();
                fields.sort();
                Ok(Value::Array(fields.into_iter().map(bulk).collect()))
            }
            "INCR" => {
                need(1)?;
                Ok(Value::Int(self.add_to_counter(&args[0], 1)?))
            }
            "DECR" => {
                need(1)?;
                Ok(Value::Int(self.add_to_counter(&args[0], -1)?))
            }
            "EXPIRE" => {
                need(2)?;
                let seconds = args[1]
                    .parse::<i64>()
                    .map_err(|_| KvError::InvalidArgument("ERR value is not an integer or out of range".into()))?;
                Ok(Value::Int(self.expire_key(&args[0], seconds)? as i64))
            }
            "TTL" => {
                need(1)?;
                Ok(Value::Int(self.ttl(&args[0])))
            }
            "KEYS" => {
                need(1)?;
                Ok(Value::Array(self.matching_keys(&args[0]).into_iter().map(bulk).collect()))
            }
            "FLUSHDB" | "FLUSHALL" => {
                self.data.clear();
                Ok(Value::Okay)
            }
            "EVAL" => {
                need(4)?;
                if args[0] != RELEASE_SCRIPT {
                    return Err(KvError::InvalidArgument("ERR script not supported by in-memory store".into()));
                }
                let now = Instant::now();
                let released = self.data.remove_if(args[2].as_str(), |_, e| {
                    !e.is_expired(now) && matches!(&e.data, Data::Str(token) if *token == args[3])
                });
                Ok(Value::Int(released.is_some() as i64))
            }
            other => Err(KvError::InvalidArgument(format!(
                "ERR unknown command '{}'",
                other.to_ascii_lowercase()
            ))),
        }
    }

    fn set_with_options(&self, key: &str, value: &str, options: &[String]) -> Result<Value> {
        let mut nx = false;
        let mut ttl_secs: Option<i64> = None;
        let mut iter = options.iter();
        while let Some(opt) = iter.next() {
            match opt.to_ascii_uppercase().as_str() {
                "NX" => nx = true,
                "EX" => {
                    let secs = iter
                        .next()
                        .and_then(|s| s.parse::<i64>().ok())
                        .filter(|s| *s > 0)
                        .ok_or_else(|| KvError::InvalidArgument("ERR invalid expire time in 'set' command".into()))?;
                    ttl_secs = Some(secs);
                }
                _ => return Err(KvError::InvalidArgument("ERR syntax error".into())),
            }
        }

        let expires_at = ttl_secs.map(|s| deadline(s, "set")).transpose()?;
        let fresh = Entry { data: Data::Str(value.to_string()), expires_at };

        // NX check and insert under one shard lock
        match self.data.entry(key.to_string()) {
            Slot::Occupied(mut slot) => {
                if nx && !slot.get().is_expired(Instant::now()) {
                    return Ok(Value::Nil);
                }
                slot.insert(fresh);
            }
            Slot::Vacant(slot) => {
                slot.insert(fresh);
            }
        }
        Ok(Value::Okay)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn bulk(s: String) -> Value {
    Value::BulkString(s.into_bytes())
}

fn opt_bulk(s: Option<String>) -> Value {
    s.map(bulk).unwrap_or(Value::Nil)
}

fn command_parts(cmd: &Cmd) -> Vec<String> {
    cmd.args_iter()
        .filter_map(|arg| match arg {
            Arg::Simple(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            Arg::Cursor => None,
        })
        .collect()
}

/// Glob match supporting `*`, `?`, `[...]` classes and `\` escapes.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some(b'*') => (0..=text.len()).any(|i| glob_match(&pattern[1..], &text[i..])),
        Some(b'?') => !text.is_empty() && glob_match(&pattern[1..], &text[1..]),
        Some(b'[') => {
            let Some(&c) = text.first() else { return false };
            let Some(end) = pattern.iter().skip(1).position(|&b| b == b']').map(|p| p + 1) else {
                return c == b'[' && glob_match(&pattern[1..], &text[1..]);
            };
            let class = &pattern[1..end];
            let (negate, class) = match class.first() {
                Some(b'^') => (true, &class[1..]),
                _ => (false, class),
            };
            let mut hit = false;
            let mut i = 0;
            while i < class.len() {
                if i + 2 < class.len() && class[i + 1] == b'-' {
                    hit |= class[i] <= c && c <= class[i + 2];
                    i += 3;
                } else {
                    hit |= class[i] == c;
                    i += 1;
                }
            }
            hit != negate && glob_match(&pattern[end + 1..], &text[1..])
        }
        Some(b'\\') if pattern.len() > 1 => {
            text.first() == Some(&pattern[1]) && glob_match(&pattern[2..], &text[1..])
        }
        Some(&p) => text.first() == Some(&p) && glob_match(&pattern[1..], &text[1..]),
    }
}

#[async_trait]
impl StoreConnection for InMemoryStore {
    async fn query(&self, cmd: &Cmd) -> Result<Value> {
        let parts = command_parts(cmd);
        let Some((verb, args)) = parts.split_first() else {
            return Err(KvError::InvalidArgument("ERR empty command".into()));
        };
        let verb = verb.to_ascii_uppercase();
        self.journal.lock().push(parts.clone());
        self.apply(&verb, args)
    }

    fn topology(&self) -> Topology {
        self.topology
    }
}
