//! Hierarchical listener registry.
//!
//! Listeners subscribe to dot-separated paths. Publishing on `a.b.c`
//! invokes the listeners of `a.b.c`, then `a.b`, then `a`: most specific
//! first, registration order within one path. Each level's list is
//! snapshotted before it is walked, so listeners may subscribe or
//! unsubscribe while being invoked.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use super::event::Event;

pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    once: bool,
    listener: Listener,
}

#[derive(Default)]
pub struct EventBus {
    listeners: DashMap<String, Vec<Registration>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, path: &str, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.register(path, false, Arc::new(listener))
    }

    /// Like [`EventBus::on`], removed right before its first invocation.
    pub fn once<F>(&self, path: &str, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.register(path, true, Arc::new(listener))
    }

    /// Returns false when `id` was not registered on `path`.
    pub fn off(&self, path: &str, id: ListenerId) -> bool {
        let removed = match self.listeners.get_mut(path) {
            Some(mut regs) => {
                let before = regs.len();
                regs.retain(|r| r.id != id);
                regs.len() != before
            }
            None => false,
        };
        self.listeners.remove_if(path, |_, regs| regs.is_empty());
        removed
    }

    pub fn listener_count(&self, path: &str) -> usize {
        self.listeners.get(path).map_or(0, |regs| regs.len())
    }

    /// Publish on `path` and every ancestor. Returns how many listeners ran.
    pub fn publish(&self, path: &str, event: &Event) -> usize {
        let mut invoked = 0;
        let mut current = Some(path);
        while let Some(p) = current {
            invoked += self.publish_exact(p, event);
            current = p.rfind('.').map(|i| &p[..i]);
        }
        invoked
    }

    fn register(&self, path: &str, once: bool, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .entry(path.to_string())
            .or_default()
            .push(Registration { id, once, listener });
        id
    }

    fn publish_exact(&self, path: &str, event: &Event) -> usize {
        // no map guard may be held while listeners run
        let snapshot: Vec<(ListenerId, bool, Listener)> = match self.listeners.get(path) {
            Some(regs) => regs
                .iter()
                .map(|r| (r.id, r.once, Arc::clone(&r.listener)))
                .collect(),
            None => return 0,
        };

        let mut invoked = 0;
        for (id, once, listener) in snapshot {
            // a once-listener already consumed by a nested publish is skipped
            if once && !self.off(path, id) {
                continue;
            }
            listener(event);
            invoked += 1;
        }
        invoked
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("paths", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Listener) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        let make = move |tag: &'static str| -> Listener {
            let l = Arc::clone(&l);
            Arc::new(move |_: &Event| l.lock().unwrap().push(tag.to_string()))
        };
        (log, make)
    }

    #[test]
    fn specific_paths_run_before_ancestors() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        bus.register("a", false, make("a"));
        bus.register("a.b.c", false, make("abc1"));
        bus.register("a.b", false, make("ab"));
        bus.register("a.b.c", false, make("abc2"));
        bus.register("a.x", false, make("ax"));

        let n = bus.publish("a.b.c", &Event::Custom(json!(null)));
        assert_eq!(n, 4);
        assert_eq!(*log.lock().unwrap(), vec!["abc1", "abc2", "ab", "a"]);
    }

    #[test]
    fn once_runs_a_single_time() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        bus.register("x", true, make("once"));
        bus.publish("x", &Event::Custom(json!(1)));
        bus.publish("x", &Event::Custom(json!(2)));
        assert_eq!(*log.lock().unwrap(), vec!["once"]);
        assert_eq!(bus.listener_count("x"), 0);
    }

    #[test]
    fn off_removes_only_the_named_listener() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let a = bus.register("x", false, make("a"));
        bus.register("x", false, make("b"));
        assert!(bus.off("x", a));
        assert!(!bus.off("x", a));
        bus.publish("x", &Event::Custom(json!(null)));
        assert_eq!(*log.lock().unwrap(), vec!["b"]);
    }
}
