//! Separable Gaussian blur of a single 8-bit channel, Q16 fixed point.

/// Gaussian weights for `-radius..=radius`, normalized to sum to 1 << 16.
fn gaussian_kernel_q16(radius: u32, sigma: f32) -> Vec<u32> {
    let r = radius as i32;
    let denom = 2.0 * (sigma as f64).powi(2);
    let weights_f: Vec<f64> = (-r..=r)
        .map(|i| (-(i as f64).powi(2) / denom).exp())
        .collect();
    let sum: f64 = weights_f.iter().sum();

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|w| ((w / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    // Push the rounding error into the center tap
    let acc: i64 = weights.iter().map(|&w| w as i64).sum();
    let mid = weights.len() / 2;
    weights[mid] = (weights[mid] as i64 + 65536 - acc).clamp(0, 65536) as u32;
    weights
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + 32768) >> 16).min(255) as u8
}

/// Blur `mask` (row-major, `width` x `height`) with a Gaussian of the given
/// radius; sigma is half the radius. Edges clamp.
pub(super) fn blur_mask(mask: &[u8], width: u32, height: u32, radius: u32) -> Vec<u8> {
    if radius == 0 {
        return mask.to_vec();
    }
    let kernel = gaussian_kernel_q16(radius, radius as f32 / 2.0);
    let (w, h) = (width as i64, height as i64);
    let r = radius as i64;

    let mut tmp = vec![0u8; mask.len()];
    for y in 0..h {
        let row = (y * w) as usize;
        for x in 0..w {
            let acc: u64 = kernel
                .iter()
                .enumerate()
                .map(|(k, &kw)| {
                    let sx = (x + k as i64 - r).clamp(0, w - 1) as usize;
                    kw as u64 * mask[row + sx] as u64
                })
                .sum();
            tmp[row + x as usize] = q16_to_u8(acc);
        }
    }

    let mut out = vec![0u8; mask.len()];
    for y in 0..h {
        for x in 0..w {
            let acc: u64 = kernel
                .iter()
                .enumerate()
                .map(|(k, &kw)| {
                    let sy = (y + k as i64 - r).clamp(0, h - 1);
                    kw as u64 * tmp[(sy * w + x) as usize] as u64
                })
                .sum();
            out[(y * w + x) as usize] = q16_to_u8(acc);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_zero_is_identity() {
        let mask = vec![0, 50, 100, 255];
        assert_eq!(blur_mask(&mask, 2, 2, 0), mask);
    }

    #[test]
    fn kernel_sums_to_one() {
        for radius in [1, 2, 5, 12] {
            let k = gaussian_kernel_q16(radius, radius as f32 / 2.0);
            assert_eq!(k.len(), (2 * radius + 1) as usize);
            assert_eq!(k.iter().sum::<u32>(), 65536);
        }
    }

    #[test]
    fn constant_mask_is_unchanged() {
        let mask = vec![180u8; 6 * 4];
        assert_eq!(blur_mask(&mask, 6, 4, 3), mask);
    }

    #[test]
    fn single_pixel_spreads_symmetrically() {
        let (w, h) = (9u32, 9u32);
        let mut mask = vec![0u8; 81];
        mask[4 * 9 + 4] = 255;
        let out = blur_mask(&mask, w, h, 2);
        assert!(out[4 * 9 + 4] < 255);
        assert!(out[4 * 9 + 3] > 0);
        assert_eq!(out[4 * 9 + 3], out[4 * 9 + 5]);
        assert_eq!(out[3 * 9 + 4], out[5 * 9 + 4]);
        assert_eq!(out[0], 0);
    }
}
