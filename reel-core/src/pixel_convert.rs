// PIXEL CONVERT - YUV 4:2:0 to RGBA
//
// Decoded frames are planar I420 with arbitrary row strides. Hosts want
// packed RGBA. Conversion uses fixed-point lookup tables built once per
// converter from the colour matrix.

use serde::{Deserialize, Serialize};

use crate::decode::VideoFrame;
use crate::error::{Error, Result};

// ============================================================================
// Color Spaces
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorSpace {
    BT601,
    BT709,
}

impl ColorSpace {
    /// (Wr, Wb); Wg = 1 - Wr - Wb
    pub fn coefficients(&self) -> (f32, f32) {
        match self {
            Self::BT601 => (0.299, 0.114),
            Self::BT709 => (0.2126, 0.0722),
        }
    }

    /// Rows are R, G, B; columns are Y, Cb, Cr.
    pub fn yuv_to_rgb_matrix(&self) -> [[f32; 3]; 3] {
        let (wr, wb) = self.coefficients();
        let wg = 1.0 - wr - wb;

        // R = Y + 2(1-Wr)Cr
        // G = Y - 2Wb(1-Wb)/Wg Cb - 2Wr(1-Wr)/Wg Cr
        // B = Y + 2(1-Wb)Cb
        let cr_r = 2.0 * (1.0 - wr);
        let cb_g = -2.0 * wb * (1.0 - wb) / wg;
        let cr_g = -2.0 * wr * (1.0 - wr) / wg;
        let cb_b = 2.0 * (1.0 - wb);

        [[1.0, 0.0, cr_r], [1.0, cb_g, cr_g], [1.0, cb_b, 0.0]]
    }
}

/// Sample value range of the luma/chroma planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorRange {
    /// Y in 16..=235, chroma in 16..=240.
    Limited,
    /// Every plane uses 0..=255.
    Full,
}

// ============================================================================
// Converter
// ============================================================================

pub struct PixelConverter {
    color_space: ColorSpace,
    range: ColorRange,
    // 8.8 fixed point contributions
    y_table: [i32; 256],
    u_table_g: [i32; 256],
    u_table_b: [i32; 256],
    v_table_r: [i32; 256],
    v_table_g: [i32; 256],
}

impl std::fmt::Debug for PixelConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelConverter")
            .field("color_space", &self.color_space)
            .field("range", &self.range)
            .finish()
    }
}

impl Default for PixelConverter {
    fn default() -> Self {
        Self::new(ColorSpace::BT601, ColorRange::Full)
    }
}

impl PixelConverter {
    pub fn new(color_space: ColorSpace, range: ColorRange) -> Self {
        let mut converter = Self {
            color_space,
            range,
            y_table: [0; 256],
            u_table_g: [0; 256],
            u_table_b: [0; 256],
            v_table_r: [0; 256],
            v_table_g: [0; 256],
        };
        converter.build_tables();
        converter
    }

    fn build_tables(&mut self) {
        let m = self.color_space.yuv_to_rgb_matrix();
        // Limited range stretches chroma by 255/224.
        let (y_scale, y_offset, c_scale) = match self.range {
            ColorRange::Limited => (255.0 / 219.0, 16.0, 255.0 / 224.0),
            ColorRange::Full => (1.0, 0.0, 1.0),
        };

        for i in 0..256 {
            let y = (i as f32 - y_offset) * y_scale;
            let c = (i as f32 - 128.0) * c_scale;
            self.y_table[i] = (y * 256.0).round() as i32;
            self.u_table_g[i] = (c * m[1][1] * 256.0).round() as i32;
            self.u_table_b[i] = (c * m[2][1] * 256.0).round() as i32;
            self.v_table_r[i] = (c * m[0][2] * 256.0).round() as i32;
            self.v_table_g[i] = (c * m[1][2] * 256.0).round() as i32;
        }
    }

    #[inline]
    fn pixel(&self, y: u8, u: u8, v: u8) -> [u8; 4] {
        let yc = self.y_table[y as usize];
        let r = (yc + self.v_table_r[v as usize] + 128) >> 8;
        let g = (yc + self.u_table_g[u as usize] + self.v_table_g[v as usize] + 128) >> 8;
        let b = (yc + self.u_table_b[u as usize] + 128) >> 8;
        [r.clamp(0, 255) as u8, g.clamp(0, 255) as u8, b.clamp(0, 255) as u8, 255]
    }

    /// Convert into `dst`, resizing it to `width * height * 4`.
    pub fn yuv420_to_rgba(&self, frame: &VideoFrame<'_>, dst: &mut Vec<u8>) -> Result<()> {
        if !frame.is_valid() {
            return Err(Error::InvalidParam(format!(
                "cannot convert {}x{} frame with missing planes",
                frame.width, frame.height
            )));
        }
        let (w, h) = (frame.width as usize, frame.height as usize);
        let (cw, ch) = (frame.chroma_width(), frame.chroma_height());
        let y_need = frame.y_stride * (h - 1) + w;
        let uv_need = frame.uv_stride * (ch - 1) + cw;
        if frame.y.len() < y_need || frame.u.len() < uv_need || frame.v.len() < uv_need {
            return Err(Error::InvalidParam(format!(
                "planes too short for {}x{} (strides {}/{})",
                w, h, frame.y_stride, frame.uv_stride
            )));
        }

        dst.resize(w * h * 4, 0);
        for (row, out) in dst.chunks_exact_mut(w * 4).enumerate() {
            let y_row = frame.y_row(row);
            let u_row = frame.u_row(row / 2);
            let v_row = frame.v_row(row / 2);
            for (x, px) in out.chunks_exact_mut(4).enumerate() {
                px.copy_from_slice(&self.pixel(y_row[x], u_row[x / 2], v_row[x / 2]));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::FrameOwnership;

    fn frame<'a>(y: &'a [u8], u: &'a [u8], v: &'a [u8], w: u32, h: u32, ys: usize, cs: usize) -> VideoFrame<'a> {
        VideoFrame {
            y,
            u,
            v,
            width: w,
            height: h,
            y_stride: ys,
            uv_stride: cs,
            timestamp: 0.0,
            ownership: FrameOwnership::BorrowedFromEngine,
        }
    }

    #[test]
    fn test_bt601_matrix() {
        let m = ColorSpace::BT601.yuv_to_rgb_matrix();
        assert!((m[0][2] - 1.402).abs() < 1e-3);
        assert!((m[1][1] + 0.344136).abs() < 1e-3);
        assert!((m[1][2] + 0.714136).abs() < 1e-3);
        assert!((m[2][1] - 1.772).abs() < 1e-3);
    }

    #[test]
    fn test_gray_and_extremes() {
        let conv = PixelConverter::default();
        assert_eq!(conv.pixel(128, 128, 128), [128, 128, 128, 255]);
        assert_eq!(conv.pixel(0, 128, 128), [0, 0, 0, 255]);
        assert_eq!(conv.pixel(255, 128, 128), [255, 255, 255, 255]);
        // Strong red chroma saturates R and never wraps.
        let [r, _, _, a] = conv.pixel(200, 128, 255);
        assert_eq!((r, a), (255, 255));
    }

    #[test]
    fn test_limited_range_black_and_white() {
        let conv = PixelConverter::new(ColorSpace::BT601, ColorRange::Limited);
        assert_eq!(conv.pixel(16, 128, 128), [0, 0, 0, 255]);
        assert_eq!(conv.pixel(235, 128, 128), [255, 255, 255, 255]);
    }

    #[test]
    fn test_strided_frame() {
        // 3x2 frame, luma stride 8, chroma stride 4
        let y = [10, 20, 30, 0, 0, 0, 0, 0, 40, 50, 60];
        let u = [128, 128, 0, 0];
        let v = [128, 128, 0, 0];
        let f = frame(&y, &u, &v, 3, 2, 8, 4);
        let mut out = Vec::new();
        PixelConverter::default().yuv420_to_rgba(&f, &mut out).unwrap();
        assert_eq!(out.len(), 3 * 2 * 4);
        let lumas: Vec<u8> = out.chunks(4).map(|p| p[0]).collect();
        assert_eq!(lumas, vec![10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn test_rejects_short_planes() {
        let y = [0u8; 4];
        let u = [128u8; 1];
        let f = frame(&y, &u, &u, 4, 4, 4, 2);
        let mut out = Vec::new();
        assert!(PixelConverter::default().yuv420_to_rgba(&f, &mut out).is_err());
    }
}
