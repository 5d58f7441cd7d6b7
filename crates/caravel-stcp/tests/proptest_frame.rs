//! Property-based tests for the STCP data-unit codec and the ack ring.

use std::collections::VecDeque;

use caravel_stcp::frame::{encode_data_unit, FRAME_HEADER_LEN, KEEP_ALIVE_FRAME};
use caravel_stcp::ring::AckRing;
use proptest::prelude::*;

// ─── Data Unit Layout ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn data_unit_is_prefix_then_payload(payload in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let unit = encode_data_unit(&payload).unwrap();
        prop_assert_eq!(unit.len(), FRAME_HEADER_LEN + payload.len());
        prop_assert_eq!(&unit[..FRAME_HEADER_LEN], &(payload.len() as u32).to_be_bytes()[..]);
        prop_assert_eq!(&unit[FRAME_HEADER_LEN..], &payload[..]);
    }

    #[test]
    fn only_the_empty_bundle_encodes_the_keep_alive(payload in proptest::collection::vec(any::<u8>(), 0..64)) {
        let unit = encode_data_unit(&payload).unwrap();
        prop_assert_eq!(payload.is_empty(), &unit[..] == KEEP_ALIVE_FRAME);
    }
}

// ─── Ack Ring ───────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn ring_drains_in_write_order(lens in proptest::collection::vec(1u32..1_000_000, 1..64)) {
        let ring = AckRing::new(64);
        for &len in &lens {
            let idx = ring.try_reserve_write().unwrap();
            ring.store_len(idx, len);
            ring.commit_write();
        }
        for &expected in &lens {
            let idx = ring.try_acquire_read().unwrap();
            prop_assert_eq!(ring.load_len(idx), expected);
            ring.commit_read();
        }
        prop_assert!(ring.is_empty());
    }

    /// Arbitrary push/pop interleavings behave exactly like a bounded FIFO.
    #[test]
    fn ring_matches_a_bounded_fifo_model(
        ops in proptest::collection::vec(any::<bool>(), 1..256),
        capacity in 1usize..16,
    ) {
        let ring = AckRing::new(capacity);
        let mut model: VecDeque<u32> = VecDeque::new();
        let mut next = 0u32;

        for push in ops {
            if push {
                match ring.try_reserve_write() {
                    Some(idx) => {
                        prop_assert!(model.len() < capacity, "reserve succeeded on a full ring");
                        ring.store_len(idx, next);
                        ring.commit_write();
                        model.push_back(next);
                        next += 1;
                    }
                    None => prop_assert_eq!(model.len(), capacity),
                }
            } else {
                match ring.try_acquire_read() {
                    Some(idx) => {
                        let expected = model.pop_front();
                        prop_assert_eq!(Some(ring.load_len(idx)), expected);
                        ring.commit_read();
                    }
                    None => prop_assert!(model.is_empty(), "acquire failed on a non-empty ring"),
                }
            }
            prop_assert_eq!(ring.len(), model.len());
        }
    }
}
