//! Cross-view aggregation: several parallel views of one sample (e.g.
//! random crops of the same frame window) are scored separately and their
//! score vectors summed into the sample's score.

use crate::error::{CoreError, CoreResult};

/// Element-wise sum of all score vectors.
///
/// # Examples
///
/// ```rust
/// use twostream_core::aggregation::combine;
///
/// let combined = combine(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![2.0, 0.0]]).unwrap();
/// assert_eq!(combined, vec![3.0, 1.0]);
/// ```
pub fn combine<V: AsRef<[f32]>>(scores: &[V]) -> CoreResult<Vec<f32>> {
    let (first, rest) = scores.split_first().ok_or(CoreError::EmptyStreams)?;
    let mut total = first.as_ref().to_vec();
    for view in rest {
        add_into(&mut total, view.as_ref())?;
    }
    Ok(total)
}

/// Adds `scores` into `total` element-wise; lengths must match.
pub(crate) fn add_into(total: &mut [f32], scores: &[f32]) -> CoreResult<()> {
    if total.len() != scores.len() {
        return Err(CoreError::ShapeMismatch {
            expected: total.len(),
            found: scores.len(),
        });
    }
    for (acc, score) in total.iter_mut().zip(scores) {
        *acc += *score;
    }
    Ok(())
}
