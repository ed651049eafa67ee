// Vector helpers for affinity-feed-service

use crate::models::{DenseVector, TagId};

/// Cosine similarity between two dense vectors.
///
/// Returns 0.0 when either vector has zero norm. Vectors of different
/// lengths are compared over their common prefix.
pub fn cosine_similarity(a: &DenseVector, b: &DenseVector) -> f32 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }

    let a = a.slice(ndarray::s![..len]);
    let b = b.slice(ndarray::s![..len]);

    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    a.dot(&b) / (norm_a * norm_b)
}

/// Build a dense vector from sparse (tag, weight) pairs, dropping tags
/// outside the vocabulary.
pub fn sparse_to_dense<'a>(
    pairs: impl IntoIterator<Item = &'a (TagId, f64)>,
    vocabulary_size: usize,
) -> DenseVector {
    let mut vector = DenseVector::zeros(vocabulary_size);
    for &(tag, weight) in pairs {
        if let Some(slot) = vector.get_mut(tag as usize) {
            *slot = weight as f32;
        }
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cosine_similarity() {
        let a = array![1.0f32, 0.0, 0.0];
        let b = array![1.0f32, 0.0, 0.0];
        let c = array![0.0f32, 1.0, 0.0];

        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_norm() {
        let zero = DenseVector::zeros(3);
        let a = array![0.5f32, 0.5, 0.0];

        assert_eq!(cosine_similarity(&zero, &a), 0.0);
        assert_eq!(cosine_similarity(&a, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn test_sparse_to_dense_drops_out_of_vocabulary() {
        let pairs: Vec<(TagId, f64)> = vec![(0, 0.25), (2, 0.75), (9, 1.0)];
        let vector = sparse_to_dense(&pairs, 3);

        assert_eq!(vector, array![0.25f32, 0.0, 0.75]);
    }
}
