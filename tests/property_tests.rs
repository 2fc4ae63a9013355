use proptest::prelude::*;

use chunkview::downsample::bucket_range;
use chunkview::{aggregate, derive_stride, downsample, ChunkedStore};

fn finite_or_nan() -> impl Strategy<Value = f64> {
    prop_oneof![
        8 => -1e9f64..1e9f64,
        1 => Just(f64::NAN),
        1 => Just(f64::INFINITY),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        max_shrink_iters: 1000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_read_window_matches_flat_slice(
        ys in prop::collection::vec(-1e6f64..1e6f64, 0..600),
        chunk_size in 1usize..50,
        start in 0usize..700,
        count in 0usize..700,
    ) {
        let mut store = ChunkedStore::new(chunk_size);
        for (i, &y) in ys.iter().enumerate() {
            prop_assert_eq!(store.append(i as f64, y).unwrap(), i);
        }
        prop_assert_eq!(store.total_rows(), ys.len());
        prop_assert_eq!(store.chunk_count(), ys.len().div_ceil(chunk_size));

        let w = store.read_window(start, count);
        if ys.is_empty() {
            prop_assert!(w.is_empty());
        } else {
            let s = start.min(ys.len() - 1);
            let e = (s + count).min(ys.len());
            prop_assert_eq!(w.start, s);
            prop_assert_eq!(&w.y[..], &ys[s..e]);
            prop_assert_eq!(w.x.len(), e - s);
        }
    }

    #[test]
    fn prop_derive_stride_is_even_and_fits_budget(n in 0usize..5_000_000, threshold in 1usize..5_000) {
        let stride = derive_stride(n, threshold);
        prop_assert!(stride >= 2);
        prop_assert_eq!(stride % 2, 0);
        prop_assert!(n.div_ceil(stride) <= threshold);
    }

    #[test]
    fn prop_downsample_buckets_are_bounded(
        ys in prop::collection::vec(finite_or_nan(), 0..2_000),
        threshold in 3usize..300,
        start_index in 0usize..10_000,
    ) {
        let xs: Vec<f64> = (0..ys.len()).map(|i| (start_index + i) as f64).collect();
        let stride = derive_stride(ys.len(), threshold);
        let out = downsample(&xs, &ys, threshold, stride, start_index);

        if ys.len() <= threshold {
            prop_assert_eq!(out.len(), ys.len());
            return Ok(());
        }

        prop_assert!(out.len() <= threshold);
        for (i, b) in out.buckets().enumerate() {
            let range = bucket_range(i, ys.len(), stride, start_index);
            prop_assert!(!range.is_empty());
            prop_assert!(range.len() <= stride);
            prop_assert!(xs[range.clone()].contains(&b.x));
            let has_finite = ys[range].iter().any(|v| v.is_finite());
            if has_finite {
                prop_assert!(b.y_min <= b.y_line && b.y_line <= b.y_max);
            }
        }
    }

    #[test]
    fn prop_bucket_boundaries_follow_absolute_grid(
        offset in 0usize..10_000,
        n in 100usize..1_000,
        threshold in 3usize..50,
    ) {
        let stride = derive_stride(n, threshold);
        for i in 1..n.div_ceil(stride).min(threshold) {
            let range = bucket_range(i, n, stride, offset);
            prop_assert_eq!((offset + range.start) % stride, 0);
        }
    }

    #[test]
    fn prop_aggregate_invariants(ys in prop::collection::vec(finite_or_nan(), 0..1_000)) {
        let r = aggregate(&ys);
        let finite: Vec<f64> = ys.iter().copied().filter(|v| v.is_finite()).collect();
        prop_assert_eq!(r.count, finite.len() as u64);
        if finite.is_empty() {
            prop_assert_eq!((r.min, r.max, r.mean, r.variance), (0.0, 0.0, 0.0, 0.0));
        } else {
            prop_assert!(r.min <= r.mean && r.mean <= r.max);
            prop_assert!(r.variance >= 0.0);
            prop_assert_eq!(r.min, finite.iter().copied().fold(f64::INFINITY, f64::min));
            prop_assert_eq!(r.max, finite.iter().copied().fold(f64::NEG_INFINITY, f64::max));
        }
    }
}
