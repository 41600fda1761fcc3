//! Model input tensor

use ndarray::{Array4, ArrayView4};

/// Normalized NHWC image tensor (batch, height, width, channels)
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Array4<f32>,
}

impl ImageTensor {
    /// Wrap an already normalized array
    pub fn from_array(data: Array4<f32>) -> Self {
        Self { data }
    }

    /// Tensor shape as `[batch, height, width, channels]`
    pub fn shape(&self) -> [usize; 4] {
        let (n, h, w, c) = self.data.dim();
        [n, h, w, c]
    }

    /// Number of scalar values
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the tensor holds no values
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the underlying array
    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// Copy values out in row-major (logical) order
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }

    /// Smallest and largest value, `None` for an empty tensor
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.data.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// Consume into the underlying array
    pub fn into_inner(self) -> Array4<f32> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_and_range() {
        let tensor = ImageTensor::from_array(Array4::from_elem((1, 2, 3, 3), 0.5));
        assert_eq!(tensor.shape(), [1, 2, 3, 3]);
        assert_eq!(tensor.len(), 18);
        assert_eq!(tensor.min_max(), Some((0.5, 0.5)));
    }

    #[test]
    fn test_empty_tensor() {
        let tensor = ImageTensor::from_array(Array4::zeros((0, 224, 224, 3)));
        assert!(tensor.is_empty());
        assert_eq!(tensor.min_max(), None);
    }
}
