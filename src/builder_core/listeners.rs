use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub type Listener<E> = Rc<dyn Fn(&E)>;

/// Ordered set of listeners keyed by `Rc` identity.
///
/// Emission works on a snapshot, so a listener may add or remove listeners
/// (itself included) while it runs.
pub struct ListenerSet<E> {
    entries: Rc<RefCell<Vec<Listener<E>>>>,
}

impl<E> Clone for ListenerSet<E> {
    fn clone(&self) -> Self {
        Self {
            entries: Rc::clone(&self.entries),
        }
    }
}

impl<E> Default for ListenerSet<E> {
    fn default() -> Self {
        Self {
            entries: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<E: 'static> ListenerSet<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`. A listener already present is not added twice.
    pub fn add(&self, listener: Listener<E>) -> Subscription {
        {
            let mut entries = self.entries.borrow_mut();
            if !entries.iter().any(|l| Rc::ptr_eq(l, &listener)) {
                entries.push(Rc::clone(&listener));
            }
        }
        let weak: Weak<RefCell<Vec<Listener<E>>>> = Rc::downgrade(&self.entries);
        Subscription::new(move || {
            if let Some(entries) = weak.upgrade() {
                entries
                    .borrow_mut()
                    .retain(|l| !Rc::ptr_eq(l, &listener));
            }
        })
    }

    pub fn remove(&self, listener: &Listener<E>) {
        self.entries
            .borrow_mut()
            .retain(|l| !Rc::ptr_eq(l, listener));
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Deliver `event` to every listener registered at call time, in order.
    pub fn emit(&self, event: &E) -> usize {
        let snapshot: Vec<Listener<E>> = self.entries.borrow().clone();
        for listener in &snapshot {
            listener(event);
        }
        snapshot.len()
    }
}

/// Keeps a registration alive; dropping it unregisters.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Unregister now. Calling it again (or dropping afterwards) does nothing.
    pub fn cancel(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn dropping_subscription_unregisters() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = set.add(Rc::new(move |v: &u32| h.set(h.get() + *v)));
        set.emit(&2);
        drop(sub);
        set.emit(&5);
        assert_eq!(hits.get(), 2);
        assert!(set.is_empty());
    }

    #[test]
    fn same_listener_is_registered_once() {
        let set: ListenerSet<()> = ListenerSet::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let listener: Listener<()> = Rc::new(move |_: &()| h.set(h.get() + 1));
        let _a = set.add(Rc::clone(&listener));
        let _b = set.add(Rc::clone(&listener));
        assert_eq!(set.emit(&()), 1);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn listener_may_unregister_itself_during_emit() {
        let set: ListenerSet<()> = ListenerSet::new();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let s = Rc::clone(&slot);
        let sub = set.add(Rc::new(move |_: &()| {
            s.borrow_mut().take();
        }));
        *slot.borrow_mut() = Some(sub);
        set.emit(&());
        assert!(set.is_empty());
    }
}
