//! Generic command dispatch for [`KvOperations::execute`].
//!
//! A fixed table maps command names to handlers. Names not in the table
//! are forwarded with only their first argument namespaced and **no**
//! implicit expiration, even when the command mutates data (`INCR`,
//! `LPUSH`, `APPEND`, ...). Callers that need a TTL on such keys must call
//! [`KvOperations::expire`] themselves.

use redis::{cmd, Value};
use tracing::debug;

use super::{CommandFacade, KvOperations};
use crate::error::{KvError, Result};
use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// `MGET` → [`KvOperations::batch_get`]
    BatchGet,
    /// `MSET` → [`KvOperations::batch_set`]
    BatchSet,
    /// `DEL` → [`KvOperations::delete`]
    Delete,
    /// `KEYS` → [`KvOperations::list_keys`]
    ListKeys,
    /// `HKEYS` → [`KvOperations::list_hash_fields`]
    ListHashFields,
    /// Forward, then one `EXPIRE` on the primary key.
    ExpiringWrite,
    /// Forward only. No expiration is applied.
    Passthrough,
}

const DISPATCH_TABLE: &[(&str, CommandKind)] = &[
    ("MGET", CommandKind::BatchGet),
    ("MSET", CommandKind::BatchSet),
    ("DEL", CommandKind::Delete),
    ("KEYS", CommandKind::ListKeys),
    ("HKEYS", CommandKind::ListHashFields),
    ("SET", CommandKind::ExpiringWrite),
    ("HSET", CommandKind::ExpiringWrite),
    ("HMSET", CommandKind::ExpiringWrite),
];

/// Metrics label for every command outside the table.
pub const OTHER_LABEL: &str = "OTHER";

fn lookup(name: &str) -> Option<(&'static str, CommandKind)> {
    DISPATCH_TABLE
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .copied()
}

impl CommandKind {
    /// Case-insensitive lookup; anything unknown is [`CommandKind::Passthrough`].
    pub fn from_name(name: &str) -> Self {
        lookup(name).map_or(CommandKind::Passthrough, |(_, kind)| kind)
    }
}

/// Bounded label set: table names as-is, everything else collapsed.
fn metric_label(name: &str) -> &'static str {
    lookup(name).map_or(OTHER_LABEL, |(known, _)| known)
}

fn bulk(s: String) -> Value {
    Value::BulkString(s.into_bytes())
}

fn bulk_array(items: Vec<String>) -> Value {
    Value::Array(items.into_iter().map(bulk).collect())
}

fn single_arg<'a>(command: &str, args: &[&'a str]) -> Result<&'a str> {
    match args {
        [only] => Ok(only),
        _ => Err(KvError::InvalidArgument(format!(
            "{} takes exactly one argument, got {}",
            command,
            args.len()
        ))),
    }
}

impl CommandFacade {
    pub(super) async fn dispatch(&self, command: &str, args: &[&str], ttl: Option<i64>) -> Result<Value> {
        let kind = CommandKind::from_name(command);
        debug!(command, ?kind, "Dispatching");

        match kind {
            CommandKind::BatchGet => {
                let values = self.batch_get(args).await?;
                Ok(Value::Array(
                    values.into_iter().map(|v| v.map(bulk).unwrap_or(Value::Nil)).collect(),
                ))
            }
            CommandKind::BatchSet => {
                if args.len() % 2 != 0 {
                    return Err(KvError::InvalidArgument(format!(
                        "MSET needs key/value pairs, got {} arguments",
                        args.len()
                    )));
                }
                let pairs: Vec<(&str, &str)> = args.chunks_exact(2).map(|p| (p[0], p[1])).collect();
                self.batch_set(&pairs, ttl).await?;
                Ok(Value::Okay)
            }
            CommandKind::Delete => Ok(Value::Int(self.delete(args).await? as i64)),
            CommandKind::ListKeys => {
                let pattern = single_arg(command, args)?;
                Ok(bulk_array(self.list_keys(pattern).await?))
            }
            CommandKind::ListHashFields => {
                let key = single_arg(command, args)?;
                Ok(bulk_array(self.list_hash_fields(key).await?))
            }
            CommandKind::ExpiringWrite | CommandKind::Passthrough => self.forward(command, args, ttl, kind).await,
        }
    }

    /// Namespace the first argument, forward the rest unchanged.
    async fn forward(&self, command: &str, args: &[&str], ttl: Option<i64>, kind: CommandKind) -> Result<Value> {
        let label = metric_label(command);
        let Some((first, rest)) = args.split_first() else {
            return self.run(&cmd(command), label).await;
        };

        let primary = self.key(first);
        let mut forwarded = cmd(command);
        forwarded.arg(&primary).arg(rest);
        let reply = self.run(&forwarded, label).await?;

        if kind == CommandKind::ExpiringWrite {
            self.apply_ttl(&primary, self.expiration.resolve(ttl)).await?;
        } else {
            debug!(command, key = %primary, "Forwarded without implicit expiration");
            metrics::record_unexpired_passthrough();
        }
        Ok(reply)
    }
}
