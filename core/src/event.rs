//! Listener lists for vault events.
//!
//! Listeners are closures registered with [`Listener::new`]. The list only holds weak
//! references, so a listener stays registered exactly as long as its [`Listener`]
//! handle is alive. Dispatch calls listeners synchronously, in registration order;
//! listeners that need to do I/O should hand the event off (e.g. to a channel).

use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Weak,
    },
};

use crossbeam_skiplist::SkipSet;

use crate::storage::VaultFile;

/// Marker for values that can be dispatched through a [`ListenerList`].
pub trait Event: fmt::Debug + Send + Sync {}

/// A file was created in the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCreated {
    pub file: VaultFile,
}

/// A file was moved or renamed. `file` carries the new path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRenamed {
    pub file: VaultFile,
    pub old_path: String,
}

/// A file became the active file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOpened {
    pub file: VaultFile,
}

impl Event for FileCreated {}
impl Event for FileRenamed {}
impl Event for FileOpened {}

type Callback<E> = dyn Fn(&E) + Send + Sync;

struct ListenerEntry<E: Event> {
    callback: Weak<Callback<E>>,
    order: usize,
}

// Entries compare by registration order only.
impl<E: Event> Eq for ListenerEntry<E> {}

impl<E: Event> PartialEq for ListenerEntry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
    }
}

impl<E: Event> Ord for ListenerEntry<E> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.order.cmp(&other.order)
    }
}

impl<E: Event> PartialOrd for ListenerEntry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

static NEXT_LISTENER_ORDER: AtomicUsize = AtomicUsize::new(0);

/// The listeners registered for one event type.
pub struct ListenerList<E: Event> {
    inner: SkipSet<ListenerEntry<E>>,
}

impl<E: Event + 'static> ListenerList<E> {
    pub fn new() -> Self {
        ListenerList {
            inner: SkipSet::new(),
        }
    }

    /// Number of registered entries, including ones whose handle was dropped but that
    /// haven't been cleaned up by a dispatch yet.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Calls every live listener with `event`, in registration order, and drops
    /// entries whose handle is gone.
    ///
    /// Only code in this crate fires events.
    pub(crate) fn dispatch(&self, event: &E) {
        for entry in self.inner.iter() {
            match entry.value().callback.upgrade() {
                Some(callback) => callback(event),
                None => {
                    entry.remove();
                }
            }
        }
    }
}

impl<E: Event + 'static> Default for ListenerList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> fmt::Debug for ListenerList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerList")
            .field("listener_count", &self.inner.len())
            .finish()
    }
}

/// An active listener registration. Dropping it unregisters the listener.
pub struct Listener<E: Event> {
    // The list holds a weak reference; this is the only strong one.
    #[allow(dead_code)]
    callback: Arc<Callback<E>>,
    order: usize,
}

impl<E: Event + 'static> Listener<E> {
    /// Registers `callback` with `listeners`. Keep the returned handle alive for as long
    /// as the listener should receive events.
    pub fn new<F>(listeners: &ListenerList<E>, callback: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let order = NEXT_LISTENER_ORDER.fetch_add(1, Ordering::SeqCst);
        let callback: Arc<Callback<E>> = Arc::new(callback);
        listeners.inner.insert(ListenerEntry {
            callback: Arc::downgrade(&callback),
            order,
        });
        Listener { callback, order }
    }
}

impl<E: Event> fmt::Debug for Listener<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("order", &self.order).finish()
    }
}

/// Defines a struct holding one public `ListenerList` per event type.
macro_rules! define_event_listeners {
    ($struct_name:ident { $($field_name:ident: $event_type:ty),* $(,)? }) => {
        /// Holds listener lists for various events.
        #[derive(Debug, Default)]
        pub struct $struct_name {
            $(
                pub $field_name: $crate::event::ListenerList<$event_type>,
            )*
        }

        impl $struct_name {
            /// Creates a new instance with empty listener lists.
            pub fn new() -> Self {
                Self {
                    $(
                        $field_name: $crate::event::ListenerList::new(),
                    )*
                }
            }
        }
    };
}

define_event_listeners! { VaultEvents {
    file_created: FileCreated,
    file_renamed: FileRenamed,
    file_opened: FileOpened,
}}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn created(path: &str) -> FileCreated {
        FileCreated { file: VaultFile::new(path) }
    }

    #[test]
    fn test_dispatch_reaches_listeners() {
        let events = VaultEvents::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _listener = Listener::new(&events.file_created, move |e: &FileCreated| {
            sink.lock().unwrap().push(e.file.path().to_string());
        });

        events.file_created.dispatch(&created("Inbox/a.md"));
        events.file_created.dispatch(&created("Inbox/b.md"));

        assert_eq!(*seen.lock().unwrap(), vec!["Inbox/a.md", "Inbox/b.md"]);
    }

    #[test]
    fn test_event_types_are_separate() {
        let events = VaultEvents::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let _listener = Listener::new(&events.file_renamed, move |_: &FileRenamed| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        events.file_created.dispatch(&created("a.md"));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        events.file_renamed.dispatch(&FileRenamed {
            file: VaultFile::new("b.md"),
            old_path: "a.md".to_string(),
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_cleanup_on_drop() {
        let events = VaultEvents::new();
        let count = Arc::new(AtomicUsize::new(0));
        {
            let c = count.clone();
            let _temp = Listener::new(&events.file_created, move |_: &FileCreated| {
                c.fetch_add(1, Ordering::SeqCst);
            });
            assert_eq!(events.file_created.len(), 1);
        }

        // Stale entries linger until the next dispatch
        assert_eq!(events.file_created.len(), 1);
        events.file_created.dispatch(&created("a.md"));
        assert_eq!(events.file_created.len(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_order() {
        let events = VaultEvents::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let (a, b, c) = (order.clone(), order.clone(), order.clone());

        let _la = Listener::new(&events.file_opened, move |_: &FileOpened| a.lock().unwrap().push("A"));
        let _lb = Listener::new(&events.file_opened, move |_: &FileOpened| b.lock().unwrap().push("B"));
        let _lc = Listener::new(&events.file_opened, move |_: &FileOpened| c.lock().unwrap().push("C"));

        events.file_opened.dispatch(&FileOpened { file: VaultFile::new("a.md") });
        assert_eq!(*order.lock().unwrap(), vec!["A", "B", "C"]);
    }
}
