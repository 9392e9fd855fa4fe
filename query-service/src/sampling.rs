//! Random display sampling.

use rand::seq::index;
use rand::Rng;

use common::models::{SampleRequest, SampleSize};

/// Uniform sample without replacement, fresh randomness per call.
pub fn sample<T>(rows: Vec<T>, size: SampleSize) -> Vec<T> {
    sample_with(rows, size, &mut rand::thread_rng())
}

/// Same as [`sample`] with a caller-provided generator. Selected rows keep
/// their source order.
pub fn sample_with<T, R: Rng + ?Sized>(rows: Vec<T>, size: SampleSize, rng: &mut R) -> Vec<T> {
    let request = SampleRequest::new(size, rows.len());
    let amount = request.effective_size();
    if amount >= rows.len() {
        return rows;
    }

    let mut picked = index::sample(rng, rows.len(), amount).into_vec();
    picked.sort_unstable();

    let mut keep = vec![false; rows.len()];
    for i in picked {
        keep[i] = true;
    }
    rows.into_iter()
        .zip(keep)
        .filter_map(|(row, keep)| keep.then_some(row))
        .collect()
}
