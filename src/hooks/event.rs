use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::value::Value;

pub type EventCallback<E> = Rc<dyn Fn(&E)>;

/// Something `use_event` can subscribe to.
///
/// `unsubscribe` receives the exact callback `subscribe` returned.
pub trait EventSignal<E> {
    fn subscribe(&self, callback: EventCallback<E>, options: Option<&Value>) -> EventCallback<E>;
    fn unsubscribe(&self, callback: &EventCallback<E>);
}

/// In-process signal. Listeners run in subscription order.
pub struct LocalSignal<E> {
    listeners: RefCell<Vec<EventCallback<E>>>,
}

impl<E> Default for LocalSignal<E> {
    fn default() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
        }
    }
}

impl<E> LocalSignal<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: &E) {
        let listeners = self.listeners.borrow().clone();
        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl<E> EventSignal<E> for LocalSignal<E> {
    fn subscribe(&self, callback: EventCallback<E>, _options: Option<&Value>) -> EventCallback<E> {
        self.listeners.borrow_mut().push(Rc::clone(&callback));
        callback
    }

    fn unsubscribe(&self, callback: &EventCallback<E>) {
        self.listeners
            .borrow_mut()
            .retain(|existing| !Rc::ptr_eq(existing, callback));
    }
}

impl<E> fmt::Debug for LocalSignal<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSignal")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn unsubscribe_removes_only_that_callback() {
        let signal = LocalSignal::<u32>::new();
        let hits = Rc::new(Cell::new(0));
        let a = {
            let hits = hits.clone();
            signal.subscribe(Rc::new(move |n: &u32| hits.set(hits.get() + n)), None)
        };
        let _b = {
            let hits = hits.clone();
            signal.subscribe(Rc::new(move |n: &u32| hits.set(hits.get() + n * 10)), None)
        };
        signal.emit(&1);
        assert_eq!(hits.get(), 11);

        signal.unsubscribe(&a);
        signal.emit(&1);
        assert_eq!(hits.get(), 21);
        assert_eq!(signal.listener_count(), 1);
    }
}
