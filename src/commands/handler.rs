//! Command parsing and execution.
//!
//! Supported commands (case-insensitive keywords, case-sensitive keys):
//!
//! - `SET key value [EX seconds]` - store a key, optionally with a TTL
//! - `GET key` - fetch a value
//! - `DEL key` - remove a key
//! - `EXISTS key` - check for a live key
//! - `TTL key` - remaining seconds, or -1 if no expiration is set
//! - `EXPIRE key seconds` - set a TTL on an existing key
//! - `KEYS pattern` - glob scan over live keys
//! - `SAVE` - write a snapshot now
//! - `STATS` - store activity counters
//! - `FLUSHALL` - drop everything
//! - `HELP` - this list
//! - `EXIT` - leave the shell
//!
//! Values may be quoted with double quotes to include spaces.

use crate::persist;
use crate::storage::{Store, StoreError};
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// A parsed CLI command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set {
        key: String,
        value: String,
        ttl_secs: Option<i64>,
    },
    Get { key: String },
    Del { key: String },
    Exists { key: String },
    Ttl { key: String },
    Expire { key: String, ttl_secs: i64 },
    Keys { pattern: String },
    Save,
    Stats,
    FlushAll,
    Help,
    Exit,
}

/// Errors from turning an input line into a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty input")]
    Empty,

    #[error("unknown command '{0}' (try HELP)")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("'{0}' is not a valid integer")]
    BadInteger(String),

    #[error("unterminated quote")]
    UnterminatedQuote,
}

impl Command {
    /// Parses one input line.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let tokens = tokenize(line)?;
        let (name, args) = match tokens.split_first() {
            Some((name, args)) => (name.to_uppercase(), args),
            None => return Err(ParseError::Empty),
        };

        match name.as_str() {
            "SET" => {
                let (key, value) = match args {
                    [key, value, ..] => (key.clone(), value.clone()),
                    _ => return Err(ParseError::Usage("SET key value [EX seconds]")),
                };
                let ttl_secs = match &args[2..] {
                    [] => None,
                    [ex, secs] if ex.eq_ignore_ascii_case("EX") => Some(parse_i64(secs)?),
                    _ => return Err(ParseError::Usage("SET key value [EX seconds]")),
                };
                Ok(Command::Set { key, value, ttl_secs })
            }
            "GET" => Ok(Command::Get {
                key: one_arg(args, "GET key")?,
            }),
            "DEL" => Ok(Command::Del {
                key: one_arg(args, "DEL key")?,
            }),
            "EXISTS" => Ok(Command::Exists {
                key: one_arg(args, "EXISTS key")?,
            }),
            "TTL" => Ok(Command::Ttl {
                key: one_arg(args, "TTL key")?,
            }),
            "EXPIRE" => match args {
                [key, secs] => Ok(Command::Expire {
                    key: key.clone(),
                    ttl_secs: parse_i64(secs)?,
                }),
                _ => Err(ParseError::Usage("EXPIRE key seconds")),
            },
            "KEYS" => Ok(Command::Keys {
                pattern: one_arg(args, "KEYS pattern")?,
            }),
            "SAVE" => no_args(args, "SAVE", Command::Save),
            "STATS" => no_args(args, "STATS", Command::Stats),
            "FLUSHALL" => no_args(args, "FLUSHALL", Command::FlushAll),
            "HELP" => Ok(Command::Help),
            "EXIT" | "QUIT" => Ok(Command::Exit),
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

fn one_arg(args: &[String], usage: &'static str) -> Result<String, ParseError> {
    match args {
        [arg] => Ok(arg.clone()),
        _ => Err(ParseError::Usage(usage)),
    }
}

fn no_args(args: &[String], usage: &'static str, cmd: Command) -> Result<Command, ParseError> {
    if args.is_empty() {
        Ok(cmd)
    } else {
        Err(ParseError::Usage(usage))
    }
}

fn parse_i64(token: &str) -> Result<i64, ParseError> {
    token
        .parse()
        .map_err(|_| ParseError::BadInteger(token.to_string()))
}

/// Splits a line on whitespace, keeping double-quoted runs together.
fn tokenize(line: &str) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(inner) => current.push(inner),
                        None => return Err(ParseError::UnterminatedQuote),
                    }
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// The outcome of executing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Text to show the user.
    Text(String),
    /// The user asked to leave.
    Exit,
}

impl Reply {
    fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }
}

/// Executes commands against the store and the snapshot file.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    store: Arc<Store>,
    snapshot_path: PathBuf,
}

impl CommandHandler {
    /// Creates a handler bound to a store and a snapshot path (for SAVE).
    pub fn new(store: Arc<Store>, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            snapshot_path: snapshot_path.into(),
        }
    }

    /// Runs one command and formats its reply.
    pub fn execute(&self, command: Command) -> Reply {
        match command {
            Command::Set { key, value, ttl_secs } => {
                match self.store.set(&key, Bytes::from(value), ttl_secs) {
                    Ok(()) => Reply::text("OK"),
                    Err(e) => Reply::text(format!("error: {e}")),
                }
            }
            Command::Get { key } => match self.store.get(&key) {
                Ok(value) => Reply::text(String::from_utf8_lossy(&value).into_owned()),
                Err(StoreError::KeyNotFound) => Reply::text(format!("no such key '{key}'")),
                Err(e) => Reply::text(format!("error: {e}")),
            },
            Command::Del { key } => {
                if self.store.delete(&key) {
                    Reply::text("deleted")
                } else {
                    Reply::text(format!("no such key '{key}'"))
                }
            }
            Command::Exists { key } => Reply::text(self.store.exists(&key).to_string()),
            Command::Ttl { key } => match self.store.ttl(&key) {
                Ok(Some(secs)) => Reply::text(secs.to_string()),
                Ok(None) => Reply::text("-1"),
                Err(StoreError::KeyNotFound) => Reply::text(format!("no such key '{key}'")),
                Err(e) => Reply::text(format!("error: {e}")),
            },
            Command::Expire { key, ttl_secs } => match self.store.expire(&key, ttl_secs) {
                Ok(()) => Reply::text("OK"),
                Err(StoreError::KeyNotFound) => Reply::text(format!("no such key '{key}'")),
                Err(e) => Reply::text(format!("error: {e}")),
            },
            Command::Keys { pattern } => match self.store.keys(&pattern) {
                Ok(keys) if keys.is_empty() => Reply::text("(no matching keys)"),
                Ok(mut keys) => {
                    keys.sort();
                    Reply::text(keys.join("\n"))
                }
                Err(e) => Reply::text(format!("error: {e}")),
            },
            Command::Save => {
                let entries = self.store.export();
                let count = entries.len();
                match persist::write_snapshot(&entries, &self.snapshot_path) {
                    Ok(()) => Reply::text(format!(
                        "saved {} entries to {}",
                        count,
                        self.snapshot_path.display()
                    )),
                    Err(e) => Reply::text(format!("save failed: {e}")),
                }
            }
            Command::Stats => {
                let stats = self.store.stats();
                Reply::text(format!(
                    "keys: {}\ngets: {} (hits {}, misses {})\nsets: {}\ndeletes: {}\nexpired: {}",
                    self.store.len(),
                    stats.gets,
                    stats.hits,
                    stats.misses,
                    stats.sets,
                    stats.deletes,
                    stats.expired,
                ))
            }
            Command::FlushAll => {
                self.store.flush_all();
                Reply::text("OK")
            }
            Command::Help => Reply::text(HELP_TEXT.trim_end()),
            Command::Exit => Reply::Exit,
        }
    }
}

const HELP_TEXT: &str = "\
Commands:
  SET key value [EX seconds]   store a key, optionally expiring
  GET key                      fetch a value
  DEL key                      remove a key
  EXISTS key                   true if the key is live
  TTL key                      remaining seconds (-1 = no expiration)
  EXPIRE key seconds           set a TTL on an existing key
  KEYS pattern                 glob scan (* ? and \\ escapes)
  SAVE                         write a snapshot now
  STATS                        store activity counters
  FLUSHALL                     drop all keys
  HELP                         this message
  EXIT                         quit (saves a final snapshot)
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set() {
        assert_eq!(
            Command::parse("SET user:1 nigel").unwrap(),
            Command::Set {
                key: "user:1".into(),
                value: "nigel".into(),
                ttl_secs: None
            }
        );
        assert_eq!(
            Command::parse("set session abc ex 30").unwrap(),
            Command::Set {
                key: "session".into(),
                value: "abc".into(),
                ttl_secs: Some(30)
            }
        );
    }

    #[test]
    fn test_parse_quoted_value() {
        assert_eq!(
            Command::parse(r#"SET greeting "hello world""#).unwrap(),
            Command::Set {
                key: "greeting".into(),
                value: "hello world".into(),
                ttl_secs: None
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse(""), Err(ParseError::Empty));
        assert_eq!(Command::parse("   "), Err(ParseError::Empty));
        assert!(matches!(
            Command::parse("BOGUS x"),
            Err(ParseError::Unknown(_))
        ));
        assert!(matches!(Command::parse("GET"), Err(ParseError::Usage(_))));
        assert!(matches!(
            Command::parse("GET a b"),
            Err(ParseError::Usage(_))
        ));
        assert!(matches!(
            Command::parse("SET k v EX soon"),
            Err(ParseError::BadInteger(_))
        ));
        assert_eq!(
            Command::parse(r#"SET k "unclosed"#),
            Err(ParseError::UnterminatedQuote)
        );
    }

    #[test]
    fn test_parse_negative_ttl_reaches_store() {
        // Parsing accepts the integer; rejection is the store's job.
        assert_eq!(
            Command::parse("EXPIRE k -1").unwrap(),
            Command::Expire {
                key: "k".into(),
                ttl_secs: -1
            }
        );
    }

    #[test]
    fn test_parse_exit_aliases() {
        assert_eq!(Command::parse("exit").unwrap(), Command::Exit);
        assert_eq!(Command::parse("QUIT").unwrap(), Command::Exit);
    }

    fn handler(dir: &tempfile::TempDir) -> CommandHandler {
        CommandHandler::new(Arc::new(Store::new()), dir.path().join("cli.snapshot"))
    }

    #[test]
    fn test_execute_set_get_del() {
        let dir = tempfile::tempdir().unwrap();
        let h = handler(&dir);

        assert_eq!(
            h.execute(Command::parse("SET a 1").unwrap()),
            Reply::text("OK")
        );
        assert_eq!(h.execute(Command::parse("GET a").unwrap()), Reply::text("1"));
        assert_eq!(
            h.execute(Command::parse("DEL a").unwrap()),
            Reply::text("deleted")
        );
        assert_eq!(
            h.execute(Command::parse("GET a").unwrap()),
            Reply::text("no such key 'a'")
        );
        assert_eq!(
            h.execute(Command::parse("DEL a").unwrap()),
            Reply::text("no such key 'a'")
        );
    }

    #[test]
    fn test_execute_ttl_and_expire() {
        let dir = tempfile::tempdir().unwrap();
        let h = handler(&dir);

        h.execute(Command::parse("SET a 1").unwrap());
        assert_eq!(h.execute(Command::parse("TTL a").unwrap()), Reply::text("-1"));

        assert_eq!(
            h.execute(Command::parse("EXPIRE a 100").unwrap()),
            Reply::text("OK")
        );
        match h.execute(Command::parse("TTL a").unwrap()) {
            Reply::Text(s) => {
                let secs: u64 = s.parse().unwrap();
                assert!(secs > 0 && secs <= 100);
            }
            other => panic!("unexpected reply: {other:?}"),
        }

        // InvalidTtl surfaces as a plain error message
        match h.execute(Command::parse("EXPIRE a -1").unwrap()) {
            Reply::Text(s) => assert!(s.contains("invalid TTL")),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn test_execute_keys_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let h = handler(&dir);

        h.execute(Command::parse("SET user:2 b").unwrap());
        h.execute(Command::parse("SET user:1 a").unwrap());
        h.execute(Command::parse("SET order:1 c").unwrap());

        assert_eq!(
            h.execute(Command::parse("KEYS user:*").unwrap()),
            Reply::text("user:1\nuser:2")
        );
        assert_eq!(
            h.execute(Command::parse("KEYS nothing*").unwrap()),
            Reply::text("(no matching keys)")
        );
    }

    #[test]
    fn test_execute_save_then_flushall() {
        let dir = tempfile::tempdir().unwrap();
        let h = handler(&dir);

        h.execute(Command::parse("SET a 1").unwrap());
        match h.execute(Command::Save) {
            Reply::Text(s) => assert!(s.starts_with("saved 1 entries")),
            other => panic!("unexpected reply: {other:?}"),
        }

        assert_eq!(h.execute(Command::FlushAll), Reply::text("OK"));
        assert_eq!(
            h.execute(Command::parse("EXISTS a").unwrap()),
            Reply::text("false")
        );
    }

    #[test]
    fn test_execute_exit() {
        let dir = tempfile::tempdir().unwrap();
        let h = handler(&dir);
        assert_eq!(h.execute(Command::Exit), Reply::Exit);
    }
}
