/// Real tensor with `legs` legs of equal size, stored flat in row-major order.
///
/// Gate quasi-probabilities put their input legs first, so a fixed input
/// multi-index selects one contiguous row of output entries.
#[derive(Clone, Debug, PartialEq)]
pub struct QdTensor {
    legs: usize,
    leg_size: usize,
    data: Vec<f64>,
}

impl QdTensor {
    pub fn zeros(legs: usize, leg_size: usize) -> Self {
        Self {
            legs,
            leg_size,
            data: vec![0.0; leg_size.pow(legs as u32)],
        }
    }

    pub fn from_vec(legs: usize, leg_size: usize, data: Vec<f64>) -> Self {
        assert_eq!(
            data.len(),
            leg_size.pow(legs as u32),
            "QdTensor data does not match its shape"
        );
        Self {
            legs,
            leg_size,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn flat_index(&self, index: &[usize]) -> usize {
        debug_assert_eq!(index.len(), self.legs);
        index.iter().fold(0, |acc, &i| acc * self.leg_size + i)
    }

    pub fn get(&self, index: &[usize]) -> f64 {
        self.data[self.flat_index(index)]
    }

    pub fn set_flat(&mut self, i: usize, v: f64) {
        self.data[i] = v;
    }

    /// Size of the row addressed by fixing the first `in_legs` legs.
    pub fn row_len(&self, in_legs: usize) -> usize {
        self.leg_size.pow((self.legs - in_legs) as u32)
    }

    /// Row of output entries for the input multi-index `row`.
    pub fn row(&self, in_legs: usize, row: usize) -> &[f64] {
        let len = self.row_len(in_legs);
        &self.data[row * len..(row + 1) * len]
    }

    pub fn rows(&self, in_legs: usize) -> impl Iterator<Item = &[f64]> {
        self.data.chunks(self.row_len(in_legs))
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn abs_sum(&self) -> f64 {
        self.data.iter().map(|v| v.abs()).sum()
    }

    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0, |m, v| m.max(v.abs()))
    }

    /// Signed sum over the output legs, one value per input multi-index.
    pub fn row_sums(&self, in_legs: usize) -> Vec<f64> {
        self.rows(in_legs).map(|r| r.iter().sum()).collect()
    }

    /// Sum of |entries| over the output legs, one value per input multi-index.
    pub fn row_abs_sums(&self, in_legs: usize) -> Vec<f64> {
        self.rows(in_legs)
            .map(|r| r.iter().map(|v| v.abs()).sum())
            .collect()
    }
}

/// -1, 0 or +1; zero stays zero so zero-weight entries contribute nothing.
pub fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::QdTensor;

    #[test]
    fn rows_follow_input_legs() {
        let t = QdTensor::from_vec(2, 2, vec![1.0, -2.0, 3.0, 4.0]);
        assert_eq!(t.row(1, 1), &[3.0, 4.0]);
        assert_eq!(t.row_abs_sums(1), vec![3.0, 7.0]);
        assert_eq!(t.row_sums(1), vec![-1.0, 7.0]);
        assert_eq!(t.get(&[0, 1]), -2.0);
    }
}
