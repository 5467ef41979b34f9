//! Redis-compatible key-value backend.
//!
//! State is stored under two keys:
//! - `topology-builder.type`: the collection tag
//! - `topology-builder.bindings`: a set of JSON-encoded bindings
//!
//! Saving replaces the set inside a single MULTI/EXEC transaction.

use crate::backend::Backend;
use crate::backend::resp::{self, Value};
use crate::binding::AccessBinding;
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::io::{BufReader, Write};
use std::net::TcpStream;

/// Key holding the collection tag.
pub const TYPE_KEY: &str = "topology-builder.type";

/// Key holding the set of serialized bindings.
pub const BINDINGS_KEY: &str = "topology-builder.bindings";

/// An open connection to the server.
struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Connection {
    fn connect(host: &str, port: u16) -> std::io::Result<Self> {
        let writer = TcpStream::connect((host, port))?;
        writer.set_nodelay(true)?;
        let reader = BufReader::new(writer.try_clone()?);
        Ok(Self { reader, writer })
    }

    fn send<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<Value> {
        self.writer.write_all(&resp::encode_command(args))?;
        self.writer.flush()?;
        let reply = resp::read_value(&mut self.reader)?;
        match reply {
            Value::Error(message) => {
                let command = args
                    .first()
                    .map(|a| String::from_utf8_lossy(a.as_ref()).into_owned())
                    .unwrap_or_default();
                Err(Error::storage(format!("redis rejected {command}: {message}")))
            }
            other => Ok(other),
        }
    }
}

/// Backend persisting bindings to a Redis-compatible server.
pub struct RedisBackend {
    host: String,
    port: u16,
    connection: Option<Connection>,
}

impl RedisBackend {
    /// Create a backend for the given server. No connection is made until
    /// [`Backend::create_or_open`].
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connection: None,
        }
    }

    /// Whether a connection is currently held.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn connection(&mut self) -> Result<&mut Connection> {
        let (host, port) = (&self.host, self.port);
        self.connection
            .as_mut()
            .ok_or_else(|| Error::storage(format!("redis backend {host}:{port} is not open")))
    }

    fn replace_members(conn: &mut Connection, members: &[Vec<u8>]) -> Result<()> {
        conn.send(&["MULTI"])?;

        let queued = (|| -> Result<()> {
            conn.send(&["DEL", BINDINGS_KEY])?;
            if !members.is_empty() {
                let mut args: Vec<&[u8]> = Vec::with_capacity(members.len() + 2);
                args.push(b"SADD");
                args.push(BINDINGS_KEY.as_bytes());
                args.extend(members.iter().map(Vec::as_slice));
                conn.send(&args)?;
            }
            Ok(())
        })();

        if let Err(e) = queued {
            let _ = conn.send(&["DISCARD"]);
            return Err(e);
        }

        match conn.send(&["EXEC"])? {
            Value::Array(replies) => {
                if let Some(Value::Error(message)) = replies.iter().find(|r| r.is_error()) {
                    return Err(Error::storage(format!("redis transaction failed: {message}")));
                }
                Ok(())
            }
            Value::Null => Err(Error::storage("redis transaction aborted")),
            other => Err(Error::storage(format!(
                "unexpected EXEC reply: {other:?}"
            ))),
        }
    }
}

impl Backend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn create_or_open(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        let connection =
            Connection::connect(&self.host, self.port).map_err(|e| Error::StorageUnavailable {
                backend: "redis",
                message: format!("cannot connect to {}:{}: {e}", self.host, self.port),
            })?;

        log::debug!("Connected to redis at {}:{}", self.host, self.port);
        self.connection = Some(connection);
        Ok(())
    }

    fn save_type(&mut self, tag: &str) -> Result<()> {
        self.connection()?.send(&["SET", TYPE_KEY, tag])?;
        Ok(())
    }

    fn save_bindings(&mut self, bindings: &HashSet<AccessBinding>) -> Result<()> {
        let members = bindings
            .iter()
            .map(serde_json::to_vec)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let conn = self.connection()?;
        Self::replace_members(conn, &members)?;

        log::debug!("Saved {} bindings to redis key {BINDINGS_KEY}", members.len());
        Ok(())
    }

    fn load(&mut self) -> Result<HashSet<AccessBinding>> {
        let reply = self.connection()?.send(&["SMEMBERS", BINDINGS_KEY])?;

        let members = match reply {
            Value::Array(members) => members,
            Value::Null => Vec::new(),
            other => {
                return Err(Error::storage(format!(
                    "unexpected SMEMBERS reply: {other:?}"
                )));
            }
        };

        let mut bindings = HashSet::with_capacity(members.len());
        for member in members {
            let raw = match member {
                Value::Bulk(raw) => raw,
                other => {
                    return Err(Error::storage(format!(
                        "unexpected member in {BINDINGS_KEY}: {other:?}"
                    )));
                }
            };
            let binding: AccessBinding = serde_json::from_slice(&raw).map_err(|e| {
                Error::storage(format!("corrupt binding in {BINDINGS_KEY}: {e}"))
            })?;
            bindings.insert(binding);
        }

        log::debug!("Loaded {} bindings from redis", bindings.len());
        Ok(bindings)
    }

    fn close(&mut self) {
        if self.connection.take().is_some() {
            log::debug!("Closed redis connection to {}:{}", self.host, self.port);
        }
    }
}
