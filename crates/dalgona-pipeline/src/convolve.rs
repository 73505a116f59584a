//! 2D kernel convolution with toroidal boundary handling.
//!
//! Pixel coordinates that fall outside the image wrap cyclically to the
//! opposite edge: the left border samples the right border, the top
//! border samples the bottom, and so on. There is no clamping or zero
//! padding. Both the Gaussian smoother and the derivative kernels run
//! through [`convolve`], so the whole pipeline shares this boundary
//! policy and its output is reproducible bit for bit.

use crate::types::Dimensions;

/// Square convolution kernel of odd size `N = 2r + 1`.
///
/// Weights are indexed `weights[kx][ky]`: the outer index walks the
/// horizontal offset and the inner index the vertical offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kernel<const N: usize> {
    weights: [[f64; N]; N],
}

impl<const N: usize> Kernel<N> {
    const ODD_SIZE: () = assert!(N % 2 == 1, "kernel size must be odd");

    /// Create a kernel from its weight matrix.
    ///
    /// Fails to compile for even `N`.
    #[must_use]
    pub const fn new(weights: [[f64; N]; N]) -> Self {
        let () = Self::ODD_SIZE;
        Self { weights }
    }

    /// Kernel radius `r`, where the size is `2r + 1`.
    #[must_use]
    pub const fn radius(&self) -> usize {
        N / 2
    }

    /// Kernel side length.
    #[must_use]
    pub const fn size(&self) -> usize {
        N
    }

    /// Weight at horizontal offset `kx` and vertical offset `ky`.
    #[must_use]
    pub const fn weight(&self, kx: usize, ky: usize) -> f64 {
        self.weights[kx][ky]
    }

    /// Kernel with a single center weight of 1.
    ///
    /// Convolving with it returns the input unchanged.
    #[must_use]
    pub const fn identity() -> Self {
        let mut weights = [[0.0; N]; N];
        weights[N / 2][N / 2] = 1.0;
        Self::new(weights)
    }
}

/// Map a possibly out-of-range coordinate onto `[0, n)` cyclically.
///
/// Equivalent to `((v mod n) + n) mod n`. `n` must be non-zero.
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub const fn wrap(v: isize, n: usize) -> usize {
    // Image sides are u32, so `n` fits in isize and the result in usize.
    v.rem_euclid(n as isize) as usize
}

/// Convolve `source` with `kernel`, wrapping at the image borders.
///
/// For every output pixel `(x, y)` this sums
/// `source[wrap(y + ky - r, h) * w + wrap(x + kx - r, w)] * kernel[kx][ky]`
/// over the kernel window, `kx` outermost, starting from `0.0`. The
/// output has the same length as `source`, which must be
/// `dimensions.pixel_count()`.
///
/// Images smaller than the kernel are fine: a 1×1 image samples its
/// single pixel at every kernel position.
#[must_use = "returns the convolved buffer"]
#[allow(clippy::cast_possible_wrap)]
pub fn convolve<const N: usize>(
    kernel: &Kernel<N>,
    source: &[f64],
    dimensions: Dimensions,
) -> Vec<f64> {
    debug_assert_eq!(source.len(), dimensions.pixel_count());

    let (w, h) = (dimensions.width_usize(), dimensions.height_usize());
    let r = kernel.radius() as isize;

    // Wrapped source column/row for each kernel offset, computed once per
    // output column/row rather than per tap.
    let columns: Vec<[usize; N]> = (0..w)
        .map(|x| std::array::from_fn(|kx| wrap(x as isize + kx as isize - r, w)))
        .collect();
    let rows: Vec<[usize; N]> = (0..h)
        .map(|y| std::array::from_fn(|ky| wrap(y as isize + ky as isize - r, h) * w))
        .collect();

    let mut out = vec![0.0; source.len()];
    for (y, row_offsets) in rows.iter().enumerate() {
        for (x, col_indices) in columns.iter().enumerate() {
            let mut acc = 0.0;
            for (kx, &sx) in col_indices.iter().enumerate() {
                for (ky, &row) in row_offsets.iter().enumerate() {
                    acc += source[row + sx] * kernel.weight(kx, ky);
                }
            }
            out[y * w + x] = acc;
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn ramp(dims: Dimensions) -> Vec<f64> {
        (0..dims.pixel_count())
            .map(|i| f64::from(u32::try_from(i).unwrap()) * 0.125)
            .collect()
    }

    #[test]
    fn wrap_handles_negative_and_overflowing_coordinates() {
        assert_eq!(wrap(-1, 5), 4);
        assert_eq!(wrap(-2, 5), 3);
        assert_eq!(wrap(5, 5), 0);
        assert_eq!(wrap(6, 5), 1);
        assert_eq!(wrap(-7, 5), 3);
        assert_eq!(wrap(3, 5), 3);
    }

    #[test]
    fn wrap_single_pixel_axis_always_resolves_to_zero() {
        for v in -3..=3 {
            assert_eq!(wrap(v, 1), 0);
        }
    }

    #[test]
    fn kernel_radius_and_size() {
        let k3 = Kernel::<3>::identity();
        let k5 = Kernel::<5>::identity();
        assert_eq!((k3.radius(), k3.size()), (1, 3));
        assert_eq!((k5.radius(), k5.size()), (2, 5));
    }

    #[test]
    fn identity_kernel_preserves_input_at_borders() {
        let dims = Dimensions::new(4, 3);
        let source = ramp(dims);
        assert_eq!(convolve(&Kernel::<3>::identity(), &source, dims), source);
        assert_eq!(convolve(&Kernel::<5>::identity(), &source, dims), source);
    }

    #[test]
    fn left_border_samples_right_border() {
        // Kernel picks the pixel one step to the left (kx = 0, ky = 1).
        let kernel = Kernel::new([[0.0, 1.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]]);
        let dims = Dimensions::new(3, 1);
        let out = convolve(&kernel, &[1.0, 2.0, 3.0], dims);
        assert_eq!(out, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn top_border_samples_bottom_border() {
        // Kernel picks the pixel one step up (kx = 1, ky = 0).
        let kernel = Kernel::new([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 0.0]]);
        let dims = Dimensions::new(1, 3);
        let out = convolve(&kernel, &[1.0, 2.0, 3.0], dims);
        assert_eq!(out, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn single_pixel_image_sums_whole_kernel() {
        let kernel = Kernel::new([[1.0; 5]; 5]);
        let out = convolve(&kernel, &[2.0], Dimensions::new(1, 1));
        assert_eq!(out, vec![50.0]);
    }

    #[test]
    fn single_row_and_column_images_do_not_go_out_of_bounds() {
        let kernel = Kernel::new([[1.0; 5]; 5]);
        let row = convolve(&kernel, &[1.0, 2.0], Dimensions::new(2, 1));
        let column = convolve(&kernel, &[1.0, 2.0], Dimensions::new(1, 2));
        assert_eq!(row.len(), 2);
        assert_eq!(column.len(), 2);
    }

    #[test]
    fn uniform_input_stays_uniform() {
        let kernel = Kernel::new([[0.5, 0.25, 0.0], [1.0, 2.0, 0.25], [0.0, 0.0, 1.0]]);
        let dims = Dimensions::new(6, 4);
        let out = convolve(&kernel, &vec![0.5; dims.pixel_count()], dims);
        let first = out[0];
        assert!(out.iter().all(|v| v.to_bits() == first.to_bits()));
    }

    proptest! {
        #[test]
        fn identity_kernel_is_identity(
            width in 1..12u32,
            height in 1..12u32,
            data in prop::collection::vec(-10.0..10.0f64, 144),
        ) {
            let dims = Dimensions::new(width, height);
            let source = &data[..dims.pixel_count()];
            prop_assert_eq!(convolve(&Kernel::<3>::identity(), source, dims), source.to_vec());
            prop_assert_eq!(convolve(&Kernel::<5>::identity(), source, dims), source.to_vec());
        }

        #[test]
        fn output_length_matches_input(width in 1..12u32, height in 1..12u32) {
            let dims = Dimensions::new(width, height);
            let source = vec![1.0; dims.pixel_count()];
            prop_assert_eq!(convolve(&Kernel::new([[1.0; 5]; 5]), &source, dims).len(), source.len());
        }
    }
}
