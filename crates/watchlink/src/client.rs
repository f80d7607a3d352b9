//! # Client Façade
//!
//! Named daemon operations built on top of [`Connection`]. Nothing
//! here is protocol machinery: every method assembles a command value
//! and submits it. The one piece of state is the subscription map,
//! which routes `"subscription"`-labeled unilateral messages to the
//! callback registered for that subscription's name.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use bser::Value;
use dashmap::DashMap;

use crate::connection::ConnectOptions;
use crate::connection::Connection;
use crate::connection::UnilateralCallback;
use crate::error::Result;
use crate::transport::Transport;

/// Invoked with each change notification for one subscription.
pub type SubscriptionCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// Identifies a registered subscription by (root path, name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionDescriptor {
    root: String,
    name: String,
}

impl SubscriptionDescriptor {
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

struct SubscriptionEntry {
    root: String,
    callback: SubscriptionCallback,
}

/// A client session with the file-watching daemon.
pub struct Client {
    conn: Connection,
    subscriptions: Arc<DashMap<String, SubscriptionEntry>>,
    next_sub_id: AtomicU64,
}

impl Client {
    /// Wires a connection over the transport with the unilateral
    /// labels the daemon uses for push traffic.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        let subscriptions: Arc<DashMap<String, SubscriptionEntry>> = Arc::new(DashMap::new());
        let router = Self::unilateral_router(subscriptions.clone());
        let options = ConnectOptions {
            unilateral_labels: vec!["subscription".into(), "log".into()],
            on_unilateral: Some(router),
            listener: None,
        };
        Self {
            conn: Connection::from_transport(transport, options),
            subscriptions,
            next_sub_id: AtomicU64::new(0),
        }
    }

    fn unilateral_router(
        subscriptions: Arc<DashMap<String, SubscriptionEntry>>,
    ) -> UnilateralCallback {
        Arc::new(move |message: Value| {
            let name = message
                .get("subscription")
                .and_then(Value::as_str)
                .map(str::to_owned);
            match name {
                Some(name) => {
                    // Clone the callback out so it never runs under
                    // the map shard lock; it may unsubscribe.
                    let callback = subscriptions
                        .get(&name)
                        .map(|entry| entry.callback.clone());
                    match callback {
                        Some(callback) => callback(message),
                        None => {
                            tracing::warn!(%name, "notification for unknown subscription");
                        }
                    }
                }
                None => {
                    tracing::debug!("dropping non-subscription unilateral message");
                }
            }
        })
    }

    /// Begins the receive loop. Call once, before waiting on any
    /// command.
    pub fn start(&self) {
        self.conn.start();
    }

    /// Closes the connection. Registered subscriptions die with it.
    pub fn close(&self) {
        self.subscriptions.clear();
        self.conn.close();
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }

    /// Executes an arbitrary daemon command.
    pub async fn run(&self, command: &Value) -> Result<Value> {
        self.conn.run(command).await
    }

    pub async fn version(&self) -> Result<Value> {
        self.run(&bser::array!["version"]).await
    }

    /// `version` with capability lists, the building block for
    /// capability checks.
    pub async fn version_with_capabilities(
        &self,
        optional: &[&str],
        required: &[&str],
    ) -> Result<Value> {
        let as_values = |caps: &[&str]| {
            Value::Array(caps.iter().map(|c| Value::from(*c)).collect())
        };
        let args = bser::object! {
            "optional" => as_values(optional),
            "required" => as_values(required),
        };
        self.run(&bser::array!["version", args]).await
    }

    /// Queries the file-system clock for a watched root.
    pub async fn clock(&self, root: &str) -> Result<Value> {
        self.run(&bser::array!["clock", root]).await
    }

    /// `clock` with a sync timeout, in milliseconds.
    pub async fn clock_sync(&self, root: &str, timeout_ms: i64) -> Result<Value> {
        let args = bser::object! { "sync_timeout" => timeout_ms };
        self.run(&bser::array!["clock", root, args]).await
    }

    pub async fn watch(&self, root: &str) -> Result<Value> {
        self.run(&bser::array!["watch", root]).await
    }

    pub async fn watch_del(&self, root: &str) -> Result<Value> {
        self.run(&bser::array!["watch-del", root]).await
    }

    /// Registers a subscription. `callback` runs on the receive-loop
    /// task for every matching change notification, so it must not
    /// block.
    pub async fn subscribe(
        &self,
        root: &str,
        query: Value,
        callback: SubscriptionCallback,
    ) -> Result<SubscriptionDescriptor> {
        let name = format!("sub-{}", self.next_sub_id.fetch_add(1, Ordering::Relaxed));

        // Registered before the command goes out: the daemon may push
        // the first notification hard on the heels of its reply.
        self.subscriptions.insert(
            name.clone(),
            SubscriptionEntry {
                root: root.to_owned(),
                callback,
            },
        );

        let command = bser::array!["subscribe", root, name.as_str(), query];
        if let Err(e) = self.run(&command).await {
            self.subscriptions.remove(&name);
            return Err(e);
        }

        Ok(SubscriptionDescriptor {
            root: root.to_owned(),
            name,
        })
    }

    /// Cancels a subscription. Returns whether the daemon actually
    /// deleted it.
    pub async fn unsubscribe(&self, descriptor: &SubscriptionDescriptor) -> Result<bool> {
        self.subscriptions.remove(&descriptor.name);
        let command = bser::array![
            "unsubscribe",
            descriptor.root.as_str(),
            descriptor.name.as_str()
        ];
        let reply = self.run(&command).await?;
        Ok(reply.get("deleted").and_then(Value::as_bool).unwrap_or(false))
    }

    /// Cancels every registered subscription, returning how many the
    /// daemon deleted.
    pub async fn unsubscribe_all(&self) -> Result<usize> {
        let descriptors: Vec<SubscriptionDescriptor> = self
            .subscriptions
            .iter()
            .map(|entry| SubscriptionDescriptor {
                root: entry.root.clone(),
                name: entry.key().clone(),
            })
            .collect();

        let mut deleted = 0;
        for descriptor in descriptors {
            if self.unsubscribe(&descriptor).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
