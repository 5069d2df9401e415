//! Wrapper around `VkTransformMatrixKHR` for easy usage

use ash::vk;

use crate::util::to_vk::IntoVulkanType;

/// Represents a row-major affine transformation matrix with 3 rows and 4 columns.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TransformMatrix([f32; 12]);

impl TransformMatrix {
    /// Create an identity matrix
    pub fn identity() -> Self {
        Self([1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0])
    }

    /// Build a transform matrix from 12 elements, specified in row-major order.
    pub fn from_elements(elements: &[f32; 12]) -> Self {
        Self(*elements)
    }

    /// Build a transform matrix from 3 rows of 4 elements.
    pub fn from_rows(rows: &[[f32; 4]; 3]) -> Self {
        let mut matrix = [0.0; 12];
        for (dst, src) in matrix.chunks_exact_mut(4).zip(rows) {
            dst.copy_from_slice(src);
        }
        Self(matrix)
    }

    /// The elements in row-major order
    pub fn elements(&self) -> &[f32; 12] {
        &self.0
    }
}

impl Default for TransformMatrix {
    /// The identity transform
    fn default() -> Self {
        Self::identity()
    }
}

impl IntoVulkanType for TransformMatrix {
    type Output = vk::TransformMatrixKHR;

    fn into_vulkan(self) -> Self::Output {
        vk::TransformMatrixKHR {
            matrix: self.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_laid_out_row_major() {
        let m = TransformMatrix::from_rows(&[[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0], [9.0, 10.0, 11.0, 12.0]]);
        assert_eq!(m.elements(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);
    }

    #[test]
    fn default_is_identity() {
        assert_eq!(TransformMatrix::default(), TransformMatrix::identity());
        assert_eq!(TransformMatrix::identity().into_vulkan().matrix[10], 1.0);
    }
}
