use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};


/// Quadrature transitions per mechanical detent.
pub const TRANSITIONS_PER_DETENT: i32 = 4;

/// Direction of a transition, indexed by `previous << 2 | current` where each
/// state is `a << 1 | b`. Invalid (skipped) transitions count as zero.
const QUADRATURE: [i8; 16] = [
     0, -1,  1,  0,
     1,  0,  0, -1,
    -1,  0,  0,  1,
     0,  1, -1,  0,
];


/// Rotary encoder counters shared between the edge producer and the main loop.
///
/// The producer only ever adds to the counters; the loop consumes whole detents
/// from the delta and leaves partial ones for next time.
#[derive(Debug, Default)]
pub struct EncoderCounter {
    pins: AtomicU8,
    delta: AtomicI32,
    position: AtomicI32,
}

impl EncoderCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the current pin levels.
    pub fn on_edge(&self, a: bool, b: bool) {
        let current = ((a as u8) << 1) | b as u8;
        let previous = self.pins.swap(current, Ordering::AcqRel);

        let step = QUADRATURE[((previous << 2) | current) as usize & 0x0F];
        if step != 0 {
            self.record(step as i32);
        }
    }

    /// Add `transitions` (positive is clockwise).
    pub fn record(&self, transitions: i32) {
        self.delta.fetch_add(transitions, Ordering::AcqRel);
        self.position.fetch_add(transitions, Ordering::AcqRel);
    }

    /// Detents turned since the last call.
    pub fn take_delta(&self) -> i32 {
        let mut current = self.delta.load(Ordering::Acquire);

        loop {
            let detents = current / TRANSITIONS_PER_DETENT;
            if detents == 0 {
                return 0;
            }

            let remainder = current - detents * TRANSITIONS_PER_DETENT;

            match self.delta.compare_exchange_weak(current, remainder, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return detents,
                Err(actual) => current = actual,
            }
        }
    }

    /// Absolute position in detents.
    pub fn position(&self) -> i32 {
        self.position.load(Ordering::Acquire) / TRANSITIONS_PER_DETENT
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    /// Gray code sequence for one clockwise detent, starting from rest (both high).
    const CLOCKWISE: [(bool, bool); 4] = [(false, true), (false, false), (true, false), (true, true)];

    fn rest() -> EncoderCounter {
        let counter = EncoderCounter::new();
        counter.pins.store(0b11, Ordering::Release);
        counter
    }

    #[test]
    fn test_quadrature_clockwise() {
        let counter = rest();

        for (a, b) in CLOCKWISE {
            counter.on_edge(a, b);
        }

        assert_eq!(counter.position(), 1);
        assert_eq!(counter.take_delta(), 1);
        assert_eq!(counter.take_delta(), 0);
    }

    #[test]
    fn test_quadrature_counter_clockwise() {
        let counter = rest();

        for (a, b) in CLOCKWISE.iter().rev().skip(1).chain([(true, true)].iter()) {
            counter.on_edge(*a, *b);
        }

        assert_eq!(counter.take_delta(), -1);
    }

    #[test]
    fn test_bounce_cancels_out() {
        let counter = rest();

        counter.on_edge(false, true);
        counter.on_edge(true, true);
        counter.on_edge(false, true);
        counter.on_edge(true, true);

        assert_eq!(counter.take_delta(), 0);
        assert_eq!(counter.position(), 0);
    }

    #[test]
    fn test_partial_detent_is_kept() {
        let counter = EncoderCounter::new();

        counter.record(6);
        assert_eq!(counter.take_delta(), 1);

        counter.record(2);
        assert_eq!(counter.take_delta(), 1);
        assert_eq!(counter.take_delta(), 0);

        counter.record(-5);
        assert_eq!(counter.take_delta(), -1);
        counter.record(-3);
        assert_eq!(counter.take_delta(), -1);
    }

    #[test]
    fn test_no_lost_updates() {
        let counter = Arc::new(EncoderCounter::new());

        let producer = {
            let counter = counter.clone();
            thread::spawn(move || {
                for _ in 0..10_000 {
                    counter.record(1);
                }
            })
        };

        let mut consumed = 0;
        while !producer.is_finished() {
            consumed += counter.take_delta();
        }
        producer.join().unwrap();
        consumed += counter.take_delta();

        assert_eq!(consumed, 10_000 / TRANSITIONS_PER_DETENT);
        assert_eq!(counter.position(), 10_000 / TRANSITIONS_PER_DETENT);
    }
}
