use glam::DMat4;
use serde::{Serialize, Serializer, ser::SerializeStruct};

const EPSILON: f64 = 1e-9;

/// A matrix together with its inverse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub matrix: DMat4,
    pub inverse: DMat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            matrix: DMat4::IDENTITY,
            inverse: DMat4::IDENTITY,
        }
    }

    pub fn from_matrix(matrix: DMat4) -> Self {
        Self {
            matrix,
            inverse: matrix.inverse(),
        }
    }

    /// Row-major layout expected by the renderer document.
    pub fn to_row_major(&self) -> [f64; 16] {
        self.matrix.transpose().to_cols_array()
    }

    pub fn approx_eq(&self, other: &Transform) -> bool {
        self.matrix.abs_diff_eq(other.matrix, EPSILON)
    }

    /// `self` applied after `other`.
    pub fn then(&self, other: &Transform) -> Transform {
        Transform::from_matrix(self.matrix * other.matrix)
    }
}

impl Serialize for Transform {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Transform", 1)?;
        s.serialize_field("matrix", &self.to_row_major().to_vec())?;
        s.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransformKey {
    pub time: f64,
    #[serde(flatten)]
    pub transform: Transform,
}

/// Transforms keyed by normalized shutter time, kept sorted by time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TransformSequence {
    keys: Vec<TransformKey>,
}

impl TransformSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_transform(transform: Transform) -> Self {
        let mut seq = Self::new();
        seq.set_transform(0.0, transform);
        seq
    }

    /// Replaces the key at `time` if one exists.
    pub fn set_transform(&mut self, time: f64, transform: Transform) {
        match self
            .keys
            .binary_search_by(|k| k.time.total_cmp(&time))
        {
            Ok(i) => self.keys[i].transform = transform,
            Err(i) => self.keys.insert(i, TransformKey { time, transform }),
        }
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[TransformKey] {
        &self.keys
    }

    pub fn earliest(&self) -> Transform {
        self.keys
            .first()
            .map(|k| k.transform)
            .unwrap_or_default()
    }

    /// Collapses a sequence of identical transforms to one key.
    pub fn optimize(&mut self) {
        if let Some(first) = self.keys.first().copied() {
            if self.keys.iter().all(|k| k.transform.approx_eq(&first.transform)) {
                self.keys.truncate(1);
            }
        }
    }

    /// Applies `transform` after every key.
    pub fn premultiply(&mut self, transform: &Transform) {
        for k in &mut self.keys {
            k.transform = transform.then(&k.transform);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn translate(x: f64) -> Transform {
        Transform::from_matrix(DMat4::from_translation(DVec3::new(x, 0.0, 0.0)))
    }

    #[test]
    fn keys_stay_sorted_and_replace_same_time() {
        let mut seq = TransformSequence::new();
        seq.set_transform(1.0, translate(1.0));
        seq.set_transform(0.0, translate(0.0));
        seq.set_transform(1.0, translate(5.0));
        let times: Vec<f64> = seq.keys().iter().map(|k| k.time).collect();
        assert_eq!(times, vec![0.0, 1.0]);
        assert!(seq.keys()[1].transform.approx_eq(&translate(5.0)));
    }

    #[test]
    fn optimize_collapses_identical_transforms_only() {
        let mut still = TransformSequence::new();
        still.set_transform(0.0, translate(2.0));
        still.set_transform(0.5, translate(2.0));
        still.set_transform(1.0, translate(2.0));
        still.optimize();
        assert_eq!(still.len(), 1);

        let mut moving = TransformSequence::new();
        moving.set_transform(0.0, translate(0.0));
        moving.set_transform(1.0, translate(1.0));
        moving.optimize();
        assert_eq!(moving.len(), 2);
    }

    #[test]
    fn row_major_puts_translation_in_last_column() {
        let m = translate(3.0).to_row_major();
        assert_eq!(m[3], 3.0);
        assert_eq!(m[12], 0.0);
    }
}
