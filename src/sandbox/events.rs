//! Event subscription bookkeeping.
//!
//! Every subscription made through the sandbox is forwarded to the platform
//! event system and recorded in an [`EventRegistry`], so a reset can take all
//! of them back off the platform in one sweep.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use rhai::{Dynamic, FnPtr, AST};
use tracing::{debug, error};

use crate::error::{Result, SandboxError};

/// A callback registered on an event channel.
#[derive(Clone)]
pub enum Listener {
    /// A script function or closure.
    Script {
        /// The callback itself.
        callback: FnPtr,
        /// Compiled module the callback was defined in.
        ast: Rc<AST>,
        /// Resolved path of that module.
        filename: Rc<str>,
    },
    /// A host callback.
    Native(Rc<dyn Fn(&Dynamic)>),
}

impl Listener {
    /// Wrap a host callback.
    pub fn native(callback: impl Fn(&Dynamic) + 'static) -> Self {
        Listener::Native(Rc::new(callback))
    }

    /// Identity comparison.
    ///
    /// Script callbacks are the same when they name the same function of the
    /// same compiled module and captured equal values; host callbacks when
    /// they share the allocation.
    pub fn is_same(&self, other: &Listener) -> bool {
        match (self, other) {
            (
                Listener::Script { callback: a, ast: a_ast, .. },
                Listener::Script { callback: b, ast: b_ast, .. },
            ) => {
                Rc::ptr_eq(a_ast, b_ast) && a.fn_name() == b.fn_name() && same_captures(a, b)
            }
            (Listener::Native(a), Listener::Native(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            _ => false,
        }
    }
}

/// Closures created by one expression differ only in what they captured.
fn same_captures(a: &FnPtr, b: &FnPtr) -> bool {
    let (a, b) = (a.curry(), b.curry());
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_value(x, y))
}

fn same_value(a: &Dynamic, b: &Dynamic) -> bool {
    let (a, b) = (a.clone().flatten(), b.clone().flatten());
    a.type_name() == b.type_name() && a.to_string() == b.to_string()
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Listener::Script { callback, filename, .. } => f
                .debug_struct("Script")
                .field("callback", &callback.fn_name())
                .field("filename", filename)
                .finish(),
            Listener::Native(_) => f.write_str("Native"),
        }
    }
}

/// The platform's own event system.
pub trait EventPlatform {
    /// Subscribe `listener` to `name` on `channel`.
    fn add_event_listener(&self, channel: &str, name: &str, listener: &Listener)
        -> anyhow::Result<()>;

    /// Unsubscribe `listener` from `name` on `channel`.
    fn remove_event_listener(
        &self,
        channel: &str,
        name: &str,
        listener: &Listener,
    ) -> anyhow::Result<()>;
}

/// Subscriptions owned by the sandbox: channel -> event name -> listeners.
#[derive(Debug, Default)]
pub struct EventRegistry {
    channels: BTreeMap<String, BTreeMap<String, Vec<Listener>>>,
}

impl EventRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `listener` in the `(channel, name)` bucket.
    pub fn record(&mut self, channel: &str, name: &str, listener: Listener) {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .entry(name.to_string())
            .or_default()
            .push(listener);
    }

    /// Drop the oldest entry identical to `listener` from its bucket.
    ///
    /// One call undoes one [`record`](Self::record), the same way one platform
    /// removal undoes one subscription. Returns whether an entry was dropped.
    pub fn forget(&mut self, channel: &str, name: &str, listener: &Listener) -> bool {
        let Some(names) = self.channels.get_mut(channel) else {
            return false;
        };
        let Some(bucket) = names.get_mut(name) else {
            return false;
        };

        let dropped = match bucket.iter().position(|l| l.is_same(listener)) {
            Some(idx) => {
                bucket.remove(idx);
                true
            }
            None => false,
        };

        if bucket.is_empty() {
            names.remove(name);
        }
        if names.is_empty() {
            self.channels.remove(channel);
        }
        dropped
    }

    /// Listeners recorded for `(channel, name)`, in registration order.
    pub fn listeners(&self, channel: &str, name: &str) -> &[Listener] {
        self.channels
            .get(channel)
            .and_then(|names| names.get(name))
            .map_or(&[], Vec::as_slice)
    }

    /// Total number of recorded listeners.
    pub fn len(&self) -> usize {
        self.channels
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    /// Check if nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Remove every recorded listener from the platform.
    ///
    /// All removals are attempted even if some fail. Returns the number of
    /// listeners removed.
    pub fn drain_all(self, platform: &dyn EventPlatform) -> Result<usize> {
        let mut removed = 0;
        let mut failed = 0;
        let mut first_failure = None;

        for (channel, names) in self.channels {
            for (name, bucket) in names {
                for listener in bucket {
                    match platform.remove_event_listener(&channel, &name, &listener) {
                        Ok(()) => removed += 1,
                        Err(err) => {
                            error!(%channel, %name, error = %err, "failed to remove listener");
                            failed += 1;
                            first_failure.get_or_insert(err);
                        }
                    }
                }
            }
        }

        match first_failure {
            None => Ok(removed),
            Some(first) => Err(SandboxError::Drain {
                attempted: removed + failed,
                failed,
                first,
            }),
        }
    }
}

/// An in-process event system.
///
/// Keeps the listeners it is handed and counts platform calls, so hosts can
/// fire events at sandboxed code and check for leaked subscriptions.
#[derive(Debug, Default)]
pub struct EventBus {
    listeners: RefCell<HashMap<(String, String), Vec<Listener>>>,
    add_calls: Cell<usize>,
    remove_calls: Cell<usize>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the listeners subscribed to `(channel, name)`.
    pub fn listeners(&self, channel: &str, name: &str) -> Vec<Listener> {
        self.listeners
            .borrow()
            .get(&(channel.to_string(), name.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of listeners subscribed to `(channel, name)`.
    pub fn listener_count(&self, channel: &str, name: &str) -> usize {
        self.listeners
            .borrow()
            .get(&(channel.to_string(), name.to_string()))
            .map_or(0, Vec::len)
    }

    /// Number of listeners subscribed anywhere.
    pub fn total_listeners(&self) -> usize {
        self.listeners.borrow().values().map(Vec::len).sum()
    }

    /// Number of subscribe calls received.
    pub fn add_calls(&self) -> usize {
        self.add_calls.get()
    }

    /// Number of unsubscribe calls received, matched or not.
    pub fn remove_calls(&self) -> usize {
        self.remove_calls.get()
    }
}

impl EventPlatform for EventBus {
    fn add_event_listener(
        &self,
        channel: &str,
        name: &str,
        listener: &Listener,
    ) -> anyhow::Result<()> {
        self.add_calls.set(self.add_calls.get() + 1);
        self.listeners
            .borrow_mut()
            .entry((channel.to_string(), name.to_string()))
            .or_default()
            .push(listener.clone());
        Ok(())
    }

    fn remove_event_listener(
        &self,
        channel: &str,
        name: &str,
        listener: &Listener,
    ) -> anyhow::Result<()> {
        self.remove_calls.set(self.remove_calls.get() + 1);
        let mut listeners = self.listeners.borrow_mut();
        let key = (channel.to_string(), name.to_string());
        if let Some(bucket) = listeners.get_mut(&key) {
            if let Some(idx) = bucket.iter().position(|l| l.is_same(listener)) {
                bucket.remove(idx);
            }
            if bucket.is_empty() {
                listeners.remove(&key);
            }
        } else {
            debug!(channel, name, "removal of unknown listener");
        }
        Ok(())
    }
}
