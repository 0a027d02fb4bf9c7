//! Command Handler
//!
//! Turns tokenized shell input into calls on the [`StorageEngine`] and
//! renders the results as [`Reply`] values.
//!
//! ## Supported Commands
//!
//! ### Generic
//! - `SET key value [EX seconds | PX milliseconds]` - Set a string
//! - `GET key` - Get a string
//! - `DEL key [key ...]`, `EXISTS key [key ...]`
//! - `INCR key`, `INCRBY key n`, `DECR key`, `DECRBY key n`
//! - `MSET key value [key value ...]`, `MGET key [key ...]`
//! - `KEYS pattern`, `TYPE key`, `DUMP key`, `SNAPSHOT [pattern]`
//!
//! ### Expiry
//! - `EXPIRE key seconds`, `PEXPIRE key milliseconds`
//! - `TTL key`, `PTTL key`, `PERSIST key`
//!
//! ### Hash
//! - `HSET key field value [field value ...]`, `HGET key field [default]`
//! - `HDEL key field [field ...]`, `HEXISTS key field`
//! - `HGETALL key`, `HKEYS key`, `HVALS key`, `HLEN key`
//!
//! ### List
//! - `LPUSH key value [value ...]`, `RPUSH key value [value ...]`
//! - `LPOP key`, `RPOP key`, `LLEN key`, `LINDEX key index`
//! - `LRANGE key start stop`, `LSET key index value`, `LREM key count value`
//!
//! ### Set
//! - `SADD key member [member ...]`, `SREM key member [member ...]`
//! - `SMEMBERS key`, `SISMEMBER key member`, `SCARD key`
//! - `SPOP key`, `SMOVE source destination member`
//!
//! ### Pub/Sub
//! - `SUBSCRIBE channel [channel ...]`, `UNSUBSCRIBE channel [channel ...]`
//! - `PSUBSCRIBE pattern [pattern ...]`, `PUNSUBSCRIBE pattern [pattern ...]`
//! - `PUBLISH channel message`
//! - `PUBSUB SUBSCRIBERS channel`, `PUBSUB PATTERNS`
//!
//! ### Server
//! - `PING [message]`, `ECHO message`, `INFO`
//! - `DBSIZE`, `FLUSHDB`, `COMMAND`

use crate::error::StoreError;
use crate::protocol::Reply;
use crate::pubsub::SubscriberId;
use crate::storage::{KeyType, StorageEngine, ValueData};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Source of per-handler subscriber ids.
static NEXT_SUBSCRIBER: AtomicU64 = AtomicU64::new(1);

/// Pending messages of every live handler, keyed by its subscriber id.
///
/// Subscriber ids are unique across the process, so handlers sharing an
/// engine deliver into each other's mailboxes through this map.
static MAILBOXES: Mutex<BTreeMap<SubscriberId, Vec<Message>>> =
    parking_lot::const_mutex(BTreeMap::new());

/// Commands report failures through the error side; both sides are replies.
type CmdResult = Result<Reply, Reply>;

impl From<StoreError> for Reply {
    fn from(err: StoreError) -> Self {
        if err.is_wrong_type() {
            Reply::error(err.to_string())
        } else {
            Reply::error(format!("ERR {}", err))
        }
    }
}

/// A published message addressed to this handler's subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub channel: String,
    /// The pattern that matched, for pattern subscriptions
    pub pattern: Option<String>,
    pub payload: String,
}

impl Message {
    /// Renders the message the way a Redis client shows pushed messages.
    pub fn to_reply(&self) -> Reply {
        match &self.pattern {
            None => Reply::bulk_array(["message", self.channel.as_str(), self.payload.as_str()]),
            Some(pattern) => Reply::bulk_array([
                "pmessage",
                pattern.as_str(),
                self.channel.as_str(),
                self.payload.as_str(),
            ]),
        }
    }
}

/// Handles shell commands by dispatching them to the storage engine.
///
/// Each handler has its own [`SubscriberId`] and mailbox. `PUBLISH` on any
/// handler queues messages into the mailboxes of the subscribed handlers.
/// Subscriptions and the mailbox are removed when the handler is dropped.
pub struct CommandHandler {
    /// The storage engine
    storage: Arc<StorageEngine>,
    subscriber: SubscriberId,
    /// Start time for INFO command
    start_time: Instant,
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("subscriber", &self.subscriber)
            .field(
                "pending_messages",
                &MAILBOXES.lock().get(&self.subscriber).map_or(0, Vec::len),
            )
            .finish()
    }
}

impl CommandHandler {
    /// Creates a new command handler with the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        let subscriber = SubscriberId::from_raw(NEXT_SUBSCRIBER.fetch_add(1, Ordering::Relaxed));
        MAILBOXES.lock().insert(subscriber, Vec::new());

        Self {
            storage,
            subscriber,
            start_time: Instant::now(),
        }
    }

    pub fn subscriber(&self) -> SubscriberId {
        self.subscriber
    }

    /// Takes all messages delivered to this handler since the last call.
    pub fn drain_messages(&self) -> Vec<Message> {
        MAILBOXES
            .lock()
            .get_mut(&self.subscriber)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Executes a command and returns the reply.
    ///
    /// The first argument is the command name, matched case-insensitively.
    pub fn execute(&self, args: Vec<String>) -> Reply {
        let Some((name, rest)) = args.split_first() else {
            return Reply::error("ERR empty command");
        };

        let cmd = name.to_uppercase();
        debug!(command = %cmd, args = rest.len(), "Executing command");

        self.dispatch(&cmd, rest).unwrap_or_else(|reply| reply)
    }

    /// Dispatches a command to its handler.
    fn dispatch(&self, cmd: &str, args: &[String]) -> CmdResult {
        match cmd {
            // Generic commands
            "SET" => self.cmd_set(args),
            "GET" => self.cmd_get(args),
            "DEL" => self.cmd_del(args),
            "EXISTS" => self.cmd_exists(args),
            "INCR" => self.cmd_incr_by("INCR", args, 1, false),
            "DECR" => self.cmd_incr_by("DECR", args, -1, false),
            "INCRBY" => self.cmd_incr_by("INCRBY", args, 1, true),
            "DECRBY" => self.cmd_incr_by("DECRBY", args, -1, true),
            "MSET" => self.cmd_mset(args),
            "MGET" => self.cmd_mget(args),
            "KEYS" => self.cmd_keys(args),
            "TYPE" => self.cmd_type(args),
            "DUMP" => self.cmd_dump(args),
            "SNAPSHOT" => self.cmd_snapshot(args),

            // Expiry commands
            "EXPIRE" => self.cmd_expire(args, false),
            "PEXPIRE" => self.cmd_expire(args, true),
            "TTL" => self.cmd_ttl(args, false),
            "PTTL" => self.cmd_ttl(args, true),
            "PERSIST" => self.cmd_persist(args),

            // Hash commands
            "HSET" => self.cmd_hset(args),
            "HGET" => self.cmd_hget(args),
            "HDEL" => self.cmd_hdel(args),
            "HEXISTS" => self.cmd_hexists(args),
            "HGETALL" => self.cmd_hgetall(args),
            "HKEYS" => self.cmd_hkeys(args),
            "HVALS" => self.cmd_hvals(args),
            "HLEN" => self.cmd_hlen(args),

            // List commands
            "LPUSH" => self.cmd_push(args, true),
            "RPUSH" => self.cmd_push(args, false),
            "LPOP" => self.cmd_pop(args, true),
            "RPOP" => self.cmd_pop(args, false),
            "LLEN" => self.cmd_llen(args),
            "LINDEX" => self.cmd_lindex(args),
            "LRANGE" => self.cmd_lrange(args),
            "LSET" => self.cmd_lset(args),
            "LREM" => self.cmd_lrem(args),

            // Set commands
            "SADD" => self.cmd_sadd(args),
            "SREM" => self.cmd_srem(args),
            "SMEMBERS" => self.cmd_smembers(args),
            "SISMEMBER" => self.cmd_sismember(args),
            "SCARD" => self.cmd_scard(args),
            "SPOP" => self.cmd_spop(args),
            "SMOVE" => self.cmd_smove(args),

            // Pub/Sub commands
            "SUBSCRIBE" => self.cmd_subscribe(args, false),
            "PSUBSCRIBE" => self.cmd_subscribe(args, true),
            "UNSUBSCRIBE" => self.cmd_unsubscribe(args, false),
            "PUNSUBSCRIBE" => self.cmd_unsubscribe(args, true),
            "PUBLISH" => self.cmd_publish(args),
            "PUBSUB" => self.cmd_pubsub(args),

            // Server commands
            "PING" => self.cmd_ping(args),
            "ECHO" => self.cmd_echo(args),
            "INFO" => self.cmd_info(args),
            "DBSIZE" => Ok(Reply::count(self.storage.len())),
            "FLUSHDB" | "FLUSHALL" => {
                self.storage.flush();
                Ok(Reply::ok())
            }
            "COMMAND" => Ok(Reply::bulk_array(COMMANDS.iter().copied())),
            "QUIT" | "EXIT" => Ok(Reply::ok()),

            // Unknown command
            _ => Err(Reply::error(format!("ERR unknown command '{}'", cmd))),
        }
    }

    // ========================================================================
    // Generic Commands
    // ========================================================================

    /// SET key value [EX seconds | PX milliseconds]
    fn cmd_set(&self, args: &[String]) -> CmdResult {
        if args.len() != 2 && args.len() != 4 {
            return Err(wrong_arity("SET"));
        }

        let (key, value) = (&args[0], &args[1]);
        if args.len() == 2 {
            self.storage.set(key, value.as_str());
            return Ok(Reply::ok());
        }

        let amount = parse_int(&args[3])?;
        if amount <= 0 {
            return Err(Reply::error("ERR invalid expire time in 'SET' command"));
        }
        let ttl = match args[2].to_uppercase().as_str() {
            "EX" => Duration::from_secs(amount as u64),
            "PX" => Duration::from_millis(amount as u64),
            _ => return Err(Reply::error("ERR syntax error")),
        };

        self.storage.set_with_ttl(key, value.as_str(), ttl);
        Ok(Reply::ok())
    }

    /// GET key
    fn cmd_get(&self, args: &[String]) -> CmdResult {
        let [key] = exact::<1>("GET", args)?;
        Ok(self.storage.get(key)?.into())
    }

    /// DEL key [key ...]
    fn cmd_del(&self, args: &[String]) -> CmdResult {
        at_least("DEL", args, 1)?;
        Ok(Reply::count(self.storage.del(args)))
    }

    /// EXISTS key [key ...]
    fn cmd_exists(&self, args: &[String]) -> CmdResult {
        at_least("EXISTS", args, 1)?;
        Ok(Reply::count(self.storage.exists(args)))
    }

    /// INCR/DECR key, INCRBY/DECRBY key amount
    fn cmd_incr_by(&self, name: &str, args: &[String], sign: i64, with_amount: bool) -> CmdResult {
        let expected = if with_amount { 2 } else { 1 };
        if args.len() != expected {
            return Err(wrong_arity(name));
        }

        let amount = if with_amount { parse_int(&args[1])? } else { 1 };
        let result = if sign > 0 {
            self.storage.incr_by(&args[0], amount)
        } else {
            self.storage.decr_by(&args[0], amount)
        };
        Ok(Reply::integer(result?))
    }

    /// MSET key value [key value ...]
    fn cmd_mset(&self, args: &[String]) -> CmdResult {
        if args.is_empty() || args.len() % 2 != 0 {
            return Err(wrong_arity("MSET"));
        }

        self.storage
            .mset(args.chunks_exact(2).map(|pair| (&pair[0], pair[1].as_str())));
        Ok(Reply::ok())
    }

    /// MGET key [key ...]
    fn cmd_mget(&self, args: &[String]) -> CmdResult {
        at_least("MGET", args, 1)?;
        Ok(Reply::Array(
            self.storage.mget(args).into_iter().map(Reply::from).collect(),
        ))
    }

    /// KEYS pattern
    fn cmd_keys(&self, args: &[String]) -> CmdResult {
        let [pattern] = exact::<1>("KEYS", args)?;
        let mut keys = self.storage.keys(pattern);
        keys.sort();
        Ok(Reply::bulk_array(keys))
    }

    /// TYPE key
    fn cmd_type(&self, args: &[String]) -> CmdResult {
        let [key] = exact::<1>("TYPE", args)?;
        Ok(self.storage.key_type(key)?.into())
    }

    /// DUMP key: type, ttl and full contents
    fn cmd_dump(&self, args: &[String]) -> CmdResult {
        let [key] = exact::<1>("DUMP", args)?;
        let dump = self.storage.dump(key)?;

        let value = match dump.value {
            None => Reply::Nil,
            Some(ValueData::Str(s)) => Reply::Bulk(s),
            Some(ValueData::List(list)) => Reply::bulk_array(list),
            Some(ValueData::Hash(hash)) => flatten_hash(hash),
            Some(ValueData::Set(set)) => sorted_array(set),
        };

        Ok(Reply::Array(vec![
            Reply::bulk(dump.key_type.as_str()),
            Reply::integer(dump.ttl),
            value,
        ]))
    }

    /// SNAPSHOT [pattern]: type and ttl of every matching key
    fn cmd_snapshot(&self, args: &[String]) -> CmdResult {
        let pattern = match args {
            [] => "*",
            [pattern] => pattern.as_str(),
            _ => return Err(wrong_arity("SNAPSHOT")),
        };

        let snapshot = self.storage.snapshot(pattern)?;
        Ok(Reply::Array(
            snapshot
                .into_iter()
                .map(|(key, meta)| {
                    Reply::Array(vec![
                        Reply::Bulk(key),
                        Reply::bulk(meta.key_type.as_str()),
                        Reply::integer(meta.ttl),
                    ])
                })
                .collect(),
        ))
    }

    // ========================================================================
    // Expiry Commands
    // ========================================================================

    /// EXPIRE key seconds / PEXPIRE key milliseconds
    fn cmd_expire(&self, args: &[String], millis: bool) -> CmdResult {
        let name = if millis { "PEXPIRE" } else { "EXPIRE" };
        let [key, amount] = exact::<2>(name, args)?;
        let amount = parse_int(amount)?;

        let applied = if millis {
            self.storage.pexpire(key, amount)
        } else {
            self.storage.expire(key, amount)
        };
        Ok(Reply::boolean(applied))
    }

    /// TTL key / PTTL key
    fn cmd_ttl(&self, args: &[String], millis: bool) -> CmdResult {
        let name = if millis { "PTTL" } else { "TTL" };
        let [key] = exact::<1>(name, args)?;
        Ok(Reply::integer(if millis {
            self.storage.pttl(key)
        } else {
            self.storage.ttl(key)
        }))
    }

    /// PERSIST key
    fn cmd_persist(&self, args: &[String]) -> CmdResult {
        let [key] = exact::<1>("PERSIST", args)?;
        Ok(Reply::boolean(self.storage.persist(key)))
    }

    // ========================================================================
    // Hash Commands
    // ========================================================================

    /// HSET key field value [field value ...]
    fn cmd_hset(&self, args: &[String]) -> CmdResult {
        if args.len() < 3 || args.len() % 2 == 0 {
            return Err(wrong_arity("HSET"));
        }

        let key = &args[0];
        let mut created = 0;
        for pair in args[1..].chunks_exact(2) {
            if self.storage.hset(key, pair[0].as_str(), pair[1].as_str())? {
                created += 1;
            }
        }
        Ok(Reply::integer(created))
    }

    /// HGET key field [default]
    fn cmd_hget(&self, args: &[String]) -> CmdResult {
        match args {
            [key, field] => Ok(self.storage.hget(key, field)?.into()),
            [key, field, default] => Ok(Reply::Bulk(self.storage.hget_or(key, field, default)?)),
            _ => Err(wrong_arity("HGET")),
        }
    }

    /// HDEL key field [field ...]
    fn cmd_hdel(&self, args: &[String]) -> CmdResult {
        at_least("HDEL", args, 2)?;
        Ok(Reply::count(self.storage.hdel(&args[0], &args[1..])?))
    }

    /// HEXISTS key field
    fn cmd_hexists(&self, args: &[String]) -> CmdResult {
        let [key, field] = exact::<2>("HEXISTS", args)?;
        Ok(Reply::boolean(self.storage.hexists(key, field)?))
    }

    /// HGETALL key: field/value pairs sorted by field
    fn cmd_hgetall(&self, args: &[String]) -> CmdResult {
        let [key] = exact::<1>("HGETALL", args)?;
        Ok(flatten_hash(self.storage.hgetall(key)?))
    }

    /// HKEYS key
    fn cmd_hkeys(&self, args: &[String]) -> CmdResult {
        let [key] = exact::<1>("HKEYS", args)?;
        Ok(sorted_array(self.storage.hkeys(key)?))
    }

    /// HVALS key
    fn cmd_hvals(&self, args: &[String]) -> CmdResult {
        let [key] = exact::<1>("HVALS", args)?;
        Ok(sorted_array(self.storage.hvals(key)?))
    }

    /// HLEN key
    fn cmd_hlen(&self, args: &[String]) -> CmdResult {
        let [key] = exact::<1>("HLEN", args)?;
        Ok(Reply::count(self.storage.hlen(key)?))
    }

    // ========================================================================
    // List Commands
    // ========================================================================

    /// LPUSH/RPUSH key value [value ...]
    fn cmd_push(&self, args: &[String], head: bool) -> CmdResult {
        let name = if head { "LPUSH" } else { "RPUSH" };
        at_least(name, args, 2)?;

        let values = args[1..].iter().map(String::as_str);
        let len = if head {
            self.storage.lpush(&args[0], values)?
        } else {
            self.storage.rpush(&args[0], values)?
        };
        Ok(Reply::count(len))
    }

    /// LPOP key / RPOP key
    fn cmd_pop(&self, args: &[String], head: bool) -> CmdResult {
        let name = if head { "LPOP" } else { "RPOP" };
        let [key] = exact::<1>(name, args)?;
        let value = if head {
            self.storage.lpop(key)?
        } else {
            self.storage.rpop(key)?
        };
        Ok(value.into())
    }

    /// LLEN key
    fn cmd_llen(&self, args: &[String]) -> CmdResult {
        let [key] = exact::<1>("LLEN", args)?;
        Ok(Reply::count(self.storage.llen(key)?))
    }

    /// LINDEX key index
    fn cmd_lindex(&self, args: &[String]) -> CmdResult {
        let [key, index] = exact::<2>("LINDEX", args)?;
        Ok(self.storage.lindex(key, parse_int(index)?)?.into())
    }

    /// LRANGE key start stop
    fn cmd_lrange(&self, args: &[String]) -> CmdResult {
        let [key, start, stop] = exact::<3>("LRANGE", args)?;
        let (start, stop) = (parse_int(start)?, parse_int(stop)?);
        Ok(Reply::bulk_array(self.storage.lrange(key, start, stop)?))
    }

    /// LSET key index value
    fn cmd_lset(&self, args: &[String]) -> CmdResult {
        let [key, index, value] = exact::<3>("LSET", args)?;
        let index = parse_int(index)?;

        if self.storage.lset(key, index, value.as_str())? {
            Ok(Reply::ok())
        } else if self.storage.key_exists(key) {
            Err(Reply::error("ERR index out of range"))
        } else {
            Err(Reply::error("ERR no such key"))
        }
    }

    /// LREM key count value
    fn cmd_lrem(&self, args: &[String]) -> CmdResult {
        let [key, count, value] = exact::<3>("LREM", args)?;
        let count = parse_int(count)?;
        Ok(Reply::count(self.storage.lrem(key, count, value)?))
    }

    // ========================================================================
    // Set Commands
    // ========================================================================

    /// SADD key member [member ...]
    fn cmd_sadd(&self, args: &[String]) -> CmdResult {
        at_least("SADD", args, 2)?;
        let members = args[1..].iter().map(String::as_str);
        Ok(Reply::count(self.storage.sadd(&args[0], members)?))
    }

    /// SREM key member [member ...]
    fn cmd_srem(&self, args: &[String]) -> CmdResult {
        at_least("SREM", args, 2)?;
        Ok(Reply::count(self.storage.srem(&args[0], &args[1..])?))
    }

    /// SMEMBERS key, sorted
    fn cmd_smembers(&self, args: &[String]) -> CmdResult {
        let [key] = exact::<1>("SMEMBERS", args)?;
        Ok(sorted_array(self.storage.smembers(key)?))
    }

    /// SISMEMBER key member
    fn cmd_sismember(&self, args: &[String]) -> CmdResult {
        let [key, member] = exact::<2>("SISMEMBER", args)?;
        Ok(Reply::boolean(self.storage.sismember(key, member)?))
    }

    /// SCARD key
    fn cmd_scard(&self, args: &[String]) -> CmdResult {
        let [key] = exact::<1>("SCARD", args)?;
        Ok(Reply::count(self.storage.scard(key)?))
    }

    /// SPOP key
    fn cmd_spop(&self, args: &[String]) -> CmdResult {
        let [key] = exact::<1>("SPOP", args)?;
        Ok(self.storage.spop(key)?.into())
    }

    /// SMOVE source destination member
    fn cmd_smove(&self, args: &[String]) -> CmdResult {
        let [source, destination, member] = exact::<3>("SMOVE", args)?;
        Ok(Reply::boolean(
            self.storage.smove(source, destination, member)?,
        ))
    }

    // ========================================================================
    // Pub/Sub Commands
    // ========================================================================

    /// SUBSCRIBE channel [channel ...] / PSUBSCRIBE pattern [pattern ...]
    ///
    /// Replies with the number of registrations added.
    fn cmd_subscribe(&self, args: &[String], pattern: bool) -> CmdResult {
        at_least(if pattern { "PSUBSCRIBE" } else { "SUBSCRIBE" }, args, 1)?;

        for target in args {
            if pattern {
                self.storage.psubscribe(target, self.subscriber);
            } else {
                self.storage.subscribe(target, self.subscriber);
            }
        }
        Ok(Reply::count(args.len()))
    }

    /// UNSUBSCRIBE channel [channel ...] / PUNSUBSCRIBE pattern [pattern ...]
    ///
    /// Replies with the number of registrations removed.
    fn cmd_unsubscribe(&self, args: &[String], pattern: bool) -> CmdResult {
        at_least(if pattern { "PUNSUBSCRIBE" } else { "UNSUBSCRIBE" }, args, 1)?;

        let removed = args
            .iter()
            .filter(|target| {
                if pattern {
                    self.storage.punsubscribe(target, self.subscriber)
                } else {
                    self.storage.unsubscribe(target, self.subscriber)
                }
            })
            .count();
        Ok(Reply::count(removed))
    }

    /// PUBLISH channel message
    ///
    /// Queues the message in the mailbox of every matching subscriber and
    /// replies with the number of messages queued. Subscriber ids registered
    /// on the engine without a live handler have no mailbox and are skipped.
    fn cmd_publish(&self, args: &[String]) -> CmdResult {
        let [channel, payload] = exact::<2>("PUBLISH", args)?;
        let deliveries = self.storage.publish(channel);

        let mut mailboxes = MAILBOXES.lock();
        let mut delivered = 0;
        for delivery in deliveries {
            match mailboxes.get_mut(&delivery.subscriber) {
                Some(mailbox) => {
                    mailbox.push(Message {
                        channel: channel.clone(),
                        pattern: delivery.pattern,
                        payload: payload.clone(),
                    });
                    delivered += 1;
                }
                None => trace!(subscriber = %delivery.subscriber, "No mailbox for subscriber"),
            }
        }

        Ok(Reply::count(delivered))
    }

    /// PUBSUB SUBSCRIBERS channel | PUBSUB PATTERNS
    fn cmd_pubsub(&self, args: &[String]) -> CmdResult {
        let Some(sub) = args.first() else {
            return Err(wrong_arity("PUBSUB"));
        };

        match (sub.to_uppercase().as_str(), &args[1..]) {
            ("SUBSCRIBERS", [channel]) => Ok(Reply::Array(
                self.storage
                    .get_subscribers(channel)
                    .into_iter()
                    .map(|id| Reply::integer(id.as_raw() as i64))
                    .collect(),
            )),
            ("PATTERNS", []) => {
                let mut patterns: Vec<_> =
                    self.storage.get_all_pattern_subscriptions().into_iter().collect();
                patterns.sort();
                Ok(Reply::Array(
                    patterns
                        .into_iter()
                        .map(|(pattern, ids)| {
                            Reply::Array(vec![
                                Reply::Bulk(pattern),
                                Reply::Array(
                                    ids.into_iter()
                                        .map(|id| Reply::integer(id.as_raw() as i64))
                                        .collect(),
                                ),
                            ])
                        })
                        .collect(),
                ))
            }
            (other, _) => Err(Reply::error(format!(
                "ERR unknown subcommand or wrong number of arguments for '{}'",
                other
            ))),
        }
    }

    // ========================================================================
    // Server Commands
    // ========================================================================

    /// PING [message]
    fn cmd_ping(&self, args: &[String]) -> CmdResult {
        match args {
            [] => Ok(Reply::pong()),
            [message] => Ok(Reply::bulk(message.as_str())),
            _ => Err(wrong_arity("PING")),
        }
    }

    /// ECHO message
    fn cmd_echo(&self, args: &[String]) -> CmdResult {
        let [message] = exact::<1>("ECHO", args)?;
        Ok(Reply::bulk(message.as_str()))
    }

    /// INFO
    fn cmd_info(&self, _args: &[String]) -> CmdResult {
        let stats = self.storage.stats();
        let config = self.storage.config();
        let uptime = self.start_time.elapsed().as_secs();

        let info = format!(
            "# Server\n\
             keystash_version:{}\n\
             os:{}\n\
             uptime_in_seconds:{}\n\
             sweep_interval_ms:{}\n\
             \n\
             # Keyspace\n\
             keys:{}\n\
             expired_lazy:{}\n\
             expired_swept:{}\n\
             sweep_passes:{}\n\
             \n\
             # Pool\n\
             pool_capacity:{}\n\
             pool_in_use:{}\n\
             pool_overflow:{}\n\
             \n\
             # PubSub\n\
             pubsub_channels:{}\n\
             pubsub_patterns:{}\n\
             total_publishes:{}\n",
            crate::VERSION,
            std::env::consts::OS,
            uptime,
            config.sweep_interval.as_millis(),
            stats.keys,
            stats.expired_lazy,
            stats.expired_swept,
            stats.sweep_passes,
            stats.pool.capacity,
            stats.pool.in_use,
            stats.pool.overflow,
            stats.channels,
            stats.patterns,
            stats.publishes,
        );

        Ok(Reply::Bulk(info))
    }
}

impl Drop for CommandHandler {
    fn drop(&mut self) {
        self.storage.remove_subscriber(self.subscriber);
        MAILBOXES.lock().remove(&self.subscriber);
    }
}

/// Names reported by COMMAND.
const COMMANDS: &[&str] = &[
    "SET", "GET", "DEL", "EXISTS", "INCR", "INCRBY", "DECR", "DECRBY", "MSET", "MGET", "KEYS",
    "TYPE", "DUMP", "SNAPSHOT", "EXPIRE", "PEXPIRE", "TTL", "PTTL", "PERSIST", "HSET", "HGET",
    "HDEL", "HEXISTS", "HGETALL", "HKEYS", "HVALS", "HLEN", "LPUSH", "RPUSH", "LPOP", "RPOP",
    "LLEN", "LINDEX", "LRANGE", "LSET", "LREM", "SADD", "SREM", "SMEMBERS", "SISMEMBER", "SCARD",
    "SPOP", "SMOVE", "SUBSCRIBE", "UNSUBSCRIBE", "PSUBSCRIBE", "PUNSUBSCRIBE", "PUBLISH",
    "PUBSUB", "PING", "ECHO", "INFO", "DBSIZE", "FLUSHDB", "FLUSHALL", "COMMAND", "QUIT", "EXIT",
];

// ============================================================================
// Helper functions
// ============================================================================

fn wrong_arity(name: &str) -> Reply {
    Reply::error(format!("ERR wrong number of arguments for '{}' command", name))
}

/// Destructures exactly `N` arguments.
fn exact<'a, const N: usize>(name: &str, args: &'a [String]) -> Result<&'a [String; N], Reply> {
    args.try_into().map_err(|_| wrong_arity(name))
}

fn at_least(name: &str, args: &[String], min: usize) -> Result<(), Reply> {
    if args.len() < min {
        Err(wrong_arity(name))
    } else {
        Ok(())
    }
}

fn parse_int(s: &str) -> Result<i64, Reply> {
    s.parse()
        .map_err(|_| Reply::error("ERR value is not an integer or out of range"))
}

fn sorted_array(items: impl IntoIterator<Item = String>) -> Reply {
    let mut items: Vec<String> = items.into_iter().collect();
    items.sort();
    Reply::bulk_array(items)
}

/// Field/value pairs as a flat array, sorted by field.
fn flatten_hash(hash: HashMap<String, String>) -> Reply {
    let mut pairs: Vec<(String, String)> = hash.into_iter().collect();
    pairs.sort();
    Reply::bulk_array(pairs.into_iter().flat_map(|(field, value)| [field, value]))
}

impl From<KeyType> for Reply {
    fn from(key_type: KeyType) -> Self {
        Reply::Status(key_type.as_str().to_lowercase())
    }
}
