//! Introsort keyed by a floating point value.
//!
//! Quicksort with median-of-three pivots until the recursion budget of
//! `2 * floor(log2 n)` is spent, heapsort below that, and one insertion-sort
//! pass over the whole slice for the short partitions left behind.

use crate::core::constants::INSERTION_SORT_THRESHOLD;
use crate::core::error::{Result, WoodError};
use num_traits::Float;

/// Sorts `data` ascending by `key`. Not stable.
pub fn intro_sort_by_key<T, K, F>(data: &mut [T], key: F)
where
    K: Float,
    F: Fn(&T) -> K,
{
    let n = data.len();
    if n < 2 {
        return;
    }
    let depth_limit = 2 * floor_log2(n);
    introsort_loop(data, 0, n, depth_limit, &key);
    insertion_sort(data, &key);
}

/// Sorts `values` ascending and applies the same permutation to `payloads`.
pub fn sort_pairs<K, P>(values: &mut [K], payloads: &mut [P]) -> Result<()>
where
    K: Float,
    P: Copy,
{
    if values.len() != payloads.len() {
        return Err(WoodError::dimension_mismatch(
            format!("{} payloads", values.len()),
            format!("{} payloads", payloads.len()),
        ));
    }

    let mut pairs: Vec<(K, P)> = values
        .iter()
        .copied()
        .zip(payloads.iter().copied())
        .collect();
    intro_sort_by_key(&mut pairs, |pair| pair.0);

    for (i, (value, payload)) in pairs.into_iter().enumerate() {
        values[i] = value;
        payloads[i] = payload;
    }
    Ok(())
}

fn floor_log2(n: usize) -> usize {
    (usize::BITS - 1 - n.leading_zeros()) as usize
}

fn introsort_loop<T, K, F>(data: &mut [T], lo: usize, mut hi: usize, mut depth_limit: usize, key: &F)
where
    K: Float,
    F: Fn(&T) -> K,
{
    while hi - lo > INSERTION_SORT_THRESHOLD {
        if depth_limit == 0 {
            heap_sort(&mut data[lo..hi], key);
            return;
        }
        depth_limit -= 1;

        let cut = partition(data, lo, hi, key);
        introsort_loop(data, cut, hi, depth_limit, key);
        hi = cut;
    }
}

/// Moves the median of three candidates to `lo` and partitions `(lo, hi)`
/// around it. Returns a cut strictly inside `(lo, hi)`.
fn partition<T, K, F>(data: &mut [T], lo: usize, hi: usize, key: &F) -> usize
where
    K: Float,
    F: Fn(&T) -> K,
{
    let mid = lo + (hi - lo) / 2 + 1;
    let median = median_of_three(data, lo, mid, hi - 1, key);
    data.swap(lo, median);

    let pivot = key(&data[lo]);
    let mut left = lo + 1;
    let mut right = hi;
    loop {
        while key(&data[left]) < pivot {
            left += 1;
        }
        right -= 1;
        while pivot < key(&data[right]) {
            right -= 1;
        }
        if left >= right {
            return left;
        }
        data.swap(left, right);
        left += 1;
    }
}

fn median_of_three<T, K, F>(data: &[T], a: usize, b: usize, c: usize, key: &F) -> usize
where
    K: Float,
    F: Fn(&T) -> K,
{
    let (ka, kb, kc) = (key(&data[a]), key(&data[b]), key(&data[c]));
    if ka < kb {
        if kb < kc {
            b
        } else if ka < kc {
            c
        } else {
            a
        }
    } else if ka < kc {
        a
    } else if kb < kc {
        c
    } else {
        b
    }
}

fn heap_sort<T, K, F>(data: &mut [T], key: &F)
where
    K: Float,
    F: Fn(&T) -> K,
{
    let n = data.len();
    for start in (0..n / 2).rev() {
        sift_down(data, start, n, key);
    }
    for end in (1..n).rev() {
        data.swap(0, end);
        sift_down(data, 0, end, key);
    }
}

fn sift_down<T, K, F>(data: &mut [T], mut root: usize, end: usize, key: &F)
where
    K: Float,
    F: Fn(&T) -> K,
{
    loop {
        let mut child = 2 * root + 1;
        if child >= end {
            break;
        }
        if child + 1 < end && key(&data[child]) < key(&data[child + 1]) {
            child += 1;
        }
        if !(key(&data[root]) < key(&data[child])) {
            break;
        }
        data.swap(root, child);
        root = child;
    }
}

fn insertion_sort<T, K, F>(data: &mut [T], key: &F)
where
    K: Float,
    F: Fn(&T) -> K,
{
    for i in 1..data.len() {
        let mut j = i;
        while j > 0 && key(&data[j]) < key(&data[j - 1]) {
            data.swap(j, j - 1);
            j -= 1;
        }
    }
}
