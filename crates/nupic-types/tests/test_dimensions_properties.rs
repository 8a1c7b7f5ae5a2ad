// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Property tests for node addressing and buffer placement

use nupic_types::{BasicType, Dimensions, TypedBuffer};
use proptest::prelude::*;

fn specified_dimensions() -> impl Strategy<Value = Dimensions> {
    prop::collection::vec(1usize..6, 1..4).prop_map(Dimensions::new)
}

proptest! {
    #[test]
    fn coordinate_and_index_agree(dims in specified_dimensions(), seed in any::<usize>()) {
        let index = seed % dims.count();
        let coordinate = dims.coordinate(index).unwrap();
        prop_assert_eq!(coordinate.len(), dims.rank());
        prop_assert_eq!(dims.index(&coordinate).unwrap(), index);
    }

    #[test]
    fn every_index_past_count_is_rejected(dims in specified_dimensions(), extra in 0usize..10) {
        prop_assert!(dims.coordinate(dims.count() + extra).is_err());
    }

    #[test]
    fn promote_keeps_node_count(dims in specified_dimensions(), rank in 1usize..6) {
        let promoted = dims.promote(rank);
        prop_assert_eq!(promoted.count(), dims.count());
        prop_assert_eq!(promoted.rank(), dims.rank().max(rank));
    }

    #[test]
    fn copy_at_offset_touches_only_its_window(
        src in prop::collection::vec(-1000i32..1000, 1..8),
        pad in 0usize..8,
    ) {
        let mut dest = TypedBuffer::allocated(BasicType::Int32, pad + src.len() + pad);
        dest.copy_from_at(pad, &TypedBuffer::from_values(&src)).unwrap();
        let values = dest.as_slice::<i32>().unwrap();
        prop_assert!(values[..pad].iter().all(|&v| v == 0));
        prop_assert_eq!(&values[pad..pad + src.len()], src.as_slice());
        prop_assert!(values[pad + src.len()..].iter().all(|&v| v == 0));
    }
}

#[test]
fn test_oversized_copy_is_rejected() {
    let mut dest = TypedBuffer::allocated(BasicType::Real32, 4);
    let src = TypedBuffer::from_values(&[1.0f32, 2.0, 3.0]);
    assert!(dest.copy_from_at(2, &src).is_err());
    assert!(dest.copy_from_at(1, &src).is_ok());
}
