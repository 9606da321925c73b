use crate::payload::Payload;
use crate::pool::Pool;

/// Default capacity of a pooled message buffer. Buffers grow on demand and
/// keep their larger allocation when reclaimed.
pub const MESSAGE_CAPACITY: usize = 1024;

/// A single user payload travelling over a channel. Outgoing messages are
/// written through the cursor; an incoming message is the same type with the
/// received bytes already in the buffer and the cursor rewound for reading.
pub struct Message {
    payload: Payload,
}

impl Message {
    #[inline]
    fn new(capacity: usize) -> Message {
        Message {
            payload: Payload::new(capacity),
        }
    }

    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    #[inline]
    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    /// Bytes written so far; what actually goes on the wire.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.payload.pack()
    }
}

/// Free-lists for the allocation-heavy objects on the hot path. Owned by the
/// socket and passed down explicitly; acquired objects must be released (or
/// handed back through the receive path) before the next acquire batch.
pub struct Pools {
    messages: Pool<Message>,
    payloads: Pool<Payload>,
}

impl Pools {
    pub fn new(capacity: usize) -> Pools {
        Pools {
            messages: Pool::with_capacity(capacity, || Message::new(MESSAGE_CAPACITY)),
            payloads: Pool::with_capacity(capacity, || Payload::new(MESSAGE_CAPACITY)),
        }
    }

    /// Fresh outgoing message with a rewound cursor.
    pub fn acquire_message(&mut self) -> Message {
        let mut message = self.messages.acquire();
        let capacity = message.payload.capacity().max(MESSAGE_CAPACITY);
        message.payload.prepare(capacity);
        message
    }

    /// Message wrapping a received frame, cursor rewound for reading and the
    /// capacity clamped to the frame length.
    pub fn incoming_message(&mut self, data: &[u8]) -> Message {
        let mut message = self.messages.acquire();
        message.payload.prepare(data.len());
        message
            .payload
            .write(data)
            .expect("Prepared capacity must fit the frame");
        message
            .payload
            .seek(0)
            .expect("Rewind within capacity cannot fail");
        message
    }

    #[inline]
    pub fn release_message(&mut self, message: Message) {
        self.messages.release(message);
    }

    #[inline]
    pub fn acquire_payload(&mut self) -> Payload {
        let mut payload = self.payloads.acquire();
        let capacity = payload.capacity().max(MESSAGE_CAPACITY);
        payload.prepare(capacity);
        payload
    }

    #[inline]
    pub fn release_payload(&mut self, payload: Payload) {
        self.payloads.release(payload);
    }
}
