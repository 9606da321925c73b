use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Typed observer list. Handlers fire in the order they were connected.
/// Disconnecting (or connecting) during an emit is safe: the traversal
/// captures each next pointer before invoking, so handlers registered during
/// an emit only fire on the next one, and unlinked handlers are skipped.
pub struct Signal<A> {
    list: Rc<List<A>>,
}

struct List<A> {
    head: RefCell<Option<Rc<Node<A>>>>,
    tail: RefCell<Weak<Node<A>>>,
}

struct Node<A> {
    callback: RefCell<Box<dyn FnMut(&A)>>,
    once: bool,
    connected: Cell<bool>,
    prev: RefCell<Weak<Node<A>>>,
    next: RefCell<Option<Rc<Node<A>>>>,
    list: Weak<List<A>>,
}

/// Handle to a single subscription. Dropping the handle does not disconnect;
/// the subscription lives until `disconnect` or, for one-shots, first fire.
pub struct Connection<A> {
    node: Weak<Node<A>>,
}

/// Promise form of a one-shot subscription: captures the first value emitted
/// after registration.
pub struct OnceValue<A> {
    value: Rc<RefCell<Option<A>>>,
    connection: Connection<A>,
}

impl<A> List<A> {
    fn append(&self, node: &Rc<Node<A>>) {
        match self.tail.borrow().upgrade() {
            Some(tail) => {
                *node.prev.borrow_mut() = Rc::downgrade(&tail);
                *tail.next.borrow_mut() = Some(node.clone());
            }
            None => *self.head.borrow_mut() = Some(node.clone()),
        }

        *self.tail.borrow_mut() = Rc::downgrade(node);
    }

    fn unlink(node: &Rc<Node<A>>) {
        if !node.connected.replace(false) {
            return;
        }

        let list = match node.list.upgrade() {
            Some(list) => list,
            None => return,
        };

        let prev = node.prev.borrow().upgrade();
        let next = node.next.borrow().clone();

        match &prev {
            Some(prev) => *prev.next.borrow_mut() = next.clone(),
            None => *list.head.borrow_mut() = next.clone(),
        }

        match &next {
            Some(next) => {
                *next.prev.borrow_mut() = prev.as_ref().map(Rc::downgrade).unwrap_or_else(Weak::new)
            }
            None => {
                *list.tail.borrow_mut() = prev.as_ref().map(Rc::downgrade).unwrap_or_else(Weak::new)
            }
        }

        // The unlinked node keeps its own next pointer so a traversal that is
        // currently parked on it can still continue down the list.
        *node.prev.borrow_mut() = Weak::new();
    }
}

impl<A> Signal<A> {
    #[inline]
    pub fn new() -> Signal<A> {
        Signal {
            list: Rc::new(List {
                head: RefCell::new(None),
                tail: RefCell::new(Weak::new()),
            }),
        }
    }

    /// Register a persistent handler. Returns the handle used to disconnect.
    pub fn connect<F: FnMut(&A) + 'static>(&self, callback: F) -> Connection<A> {
        self.register(callback, false)
    }

    /// Register a handler that disconnects itself after its first fire.
    pub fn once<F: FnMut(&A) + 'static>(&self, callback: F) -> Connection<A> {
        self.register(callback, true)
    }

    fn register<F: FnMut(&A) + 'static>(&self, callback: F, once: bool) -> Connection<A> {
        let node = Rc::new(Node {
            callback: RefCell::new(Box::new(callback)),
            once,
            connected: Cell::new(true),
            prev: RefCell::new(Weak::new()),
            next: RefCell::new(None),
            list: Rc::downgrade(&self.list),
        });

        self.list.append(&node);

        Connection {
            node: Rc::downgrade(&node),
        }
    }

    /// Invoke every connected handler in registration order. Handlers
    /// registered while the emit is running are not invoked by it: the
    /// traversal stops at the node that was the tail when the emit began.
    pub fn emit(&self, arg: &A) {
        let stop = self.list.tail.borrow().upgrade();
        let mut cursor = self.list.head.borrow().clone();

        while let Some(node) = cursor {
            let next = node.next.borrow().clone();
            let is_last = stop
                .as_ref()
                .map(|stop| Rc::ptr_eq(stop, &node))
                .unwrap_or(true);

            if node.connected.get() {
                (node.callback.borrow_mut())(arg);

                if node.once {
                    List::unlink(&node);
                }
            }

            if is_last {
                break;
            }

            cursor = next;
        }
    }

    /// Disconnect every handler.
    pub fn clear(&self) {
        let mut cursor = self.list.head.borrow().clone();

        while let Some(node) = cursor {
            let next = node.next.borrow().clone();
            List::unlink(&node);
            cursor = next;
        }
    }

    /// Number of currently connected handlers.
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut cursor = self.list.head.borrow().clone();

        while let Some(node) = cursor {
            count += 1;
            cursor = node.next.borrow().clone();
        }

        count
    }
}

impl<A: Clone + 'static> Signal<A> {
    /// One-shot subscription in promise form: the first value emitted after
    /// this call becomes available through the returned handle.
    pub fn next(&self) -> OnceValue<A> {
        let value = Rc::new(RefCell::new(None));
        let slot = value.clone();

        let connection = self.once(move |arg: &A| {
            *slot.borrow_mut() = Some(arg.clone());
        });

        OnceValue { value, connection }
    }
}

impl<A> Connection<A> {
    /// Unlink the subscription. Returns false when it was already gone.
    pub fn disconnect(&self) -> bool {
        match self.node.upgrade() {
            Some(node) => {
                let was_connected = node.connected.get();
                List::unlink(&node);
                was_connected
            }
            None => false,
        }
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.node
            .upgrade()
            .map(|node| node.connected.get())
            .unwrap_or(false)
    }
}

impl<A> OnceValue<A> {
    /// Take the captured value, leaving the slot empty.
    #[inline]
    pub fn take(&self) -> Option<A> {
        self.value.borrow_mut().take()
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.value.borrow().is_some()
    }

    /// Abandon the subscription without waiting for a value.
    #[inline]
    pub fn cancel(&self) {
        self.connection.disconnect();
    }
}
