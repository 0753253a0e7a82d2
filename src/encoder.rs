//! Field encoders
//!
//! Each encoder turns a value 0..=99 and an origin column into a short
//! list of draw operations. Encoders never touch hardware; [`draw`]
//! replays the operations onto a [`MatrixDisplay`].

use heapless::Vec;

use crate::display::{MatrixDisplay, HEIGHT};
use crate::style::ClockStyle;

/// Lowest row used by the binary encoding. Rows 7..=2 hold bits 0..=5.
const BINARY_TOP_ROW: i32 = 2;

/// One primitive to light on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DrawOp {
    Pixel { x: i32, y: i32 },
    /// Lit pixels `(x, top)..(x, top + len - 1)`
    VLine { x: i32, top: i32, len: i32 },
}

/// Enough for BCD: two columns of six bits
pub type DrawOps = Vec<DrawOp, 12>;

/// Encode `value` at `origin` using `style`
pub fn render(style: ClockStyle, value: u8, origin: i32) -> DrawOps {
    let mut ops = DrawOps::new();
    match style {
        ClockStyle::Binary => binary_at(&mut ops, value, origin),
        ClockStyle::Bcd => bcd_at(&mut ops, value, origin),
        ClockStyle::Length => length_at(&mut ops, value, origin),
    }
    ops
}

/// Encode `value` at `origin` straight onto a display
pub fn draw<D: MatrixDisplay>(style: ClockStyle, value: u8, origin: i32, display: &mut D) {
    for op in render(style, value, origin) {
        match op {
            DrawOp::Pixel { x, y } => display.set_pixel(x, y, true),
            DrawOp::VLine { x, top, len } => display.draw_vertical_line(x, top, len, true),
        }
    }
}

/// Six bits, least significant at the bottom. Bits 6 and 7 are dropped.
fn binary_at(ops: &mut DrawOps, value: u8, x: i32) {
    let mut rest = value;
    for y in (BINARY_TOP_ROW..HEIGHT).rev() {
        if rest & 0x01 == 1 {
            // At most 12 ops are ever pushed
            let _ = ops.push(DrawOp::Pixel { x, y });
        }
        rest >>= 1;
    }
}

fn bcd_at(ops: &mut DrawOps, value: u8, x: i32) {
    let (tens, ones) = digits(value);
    binary_at(ops, tens, x);
    binary_at(ops, ones, x + 1);
}

/// Tens bar at `x`, ones bar at `x + 1`. The 9 marker sits at row 0 of `x`.
fn length_at(ops: &mut DrawOps, value: u8, x: i32) {
    let (tens, ones) = digits(value);
    bar(ops, x, tens);
    // A full column reads as 8; the marker tells 9 apart
    if ones == 9 {
        let _ = ops.push(DrawOp::Pixel { x, y: 0 });
    }
    bar(ops, x + 1, ones);
}

fn bar(ops: &mut DrawOps, x: i32, height: u8) {
    let len = i32::from(height).min(HEIGHT);
    if len > 0 {
        let _ = ops.push(DrawOp::VLine {
            x,
            top: HEIGHT - len,
            len,
        });
    }
}

fn digits(value: u8) -> (u8, u8) {
    (value / 10, value % 10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::FrameBuffer;

    fn lit_rows(ops: &DrawOps, x: i32) -> heapless::Vec<i32, 8> {
        ops.iter()
            .filter_map(|op| match *op {
                DrawOp::Pixel { x: px, y } if px == x => Some(y),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_binary_lsb_at_bottom() {
        let ops = render(ClockStyle::Binary, 5, 3);
        assert_eq!(lit_rows(&ops, 3).as_slice(), &[7, 5]);
    }

    #[test]
    fn test_binary_drops_high_bits() {
        // 99 = 0b110_0011: bit 6 is lost
        let ops = render(ClockStyle::Binary, 99, 0);
        assert_eq!(lit_rows(&ops, 0).as_slice(), &[7, 6, 2]);
        assert_eq!(render(ClockStyle::Binary, 64, 0).len(), 0);
    }

    #[test]
    fn test_binary_zero_is_dark() {
        assert!(render(ClockStyle::Binary, 0, 9).is_empty());
    }

    #[test]
    fn test_bcd_splits_digits() {
        let ops = render(ClockStyle::Bcd, 47, 11);
        assert_eq!(lit_rows(&ops, 11).as_slice(), &[5]);
        assert_eq!(lit_rows(&ops, 12).as_slice(), &[7, 6, 5]);
    }

    #[test]
    fn test_length_bars_anchor_at_bottom() {
        let ops = render(ClockStyle::Length, 35, 0);
        assert_eq!(
            ops.as_slice(),
            &[
                DrawOp::VLine { x: 0, top: 5, len: 3 },
                DrawOp::VLine { x: 1, top: 3, len: 5 },
            ]
        );
    }

    #[test]
    fn test_length_nine_sets_overflow_marker() {
        let ops = render(ClockStyle::Length, 9, 0);
        assert_eq!(
            ops.as_slice(),
            &[
                DrawOp::Pixel { x: 0, y: 0 },
                DrawOp::VLine { x: 1, top: 0, len: 8 },
            ]
        );
    }

    #[test]
    fn test_length_marker_only_on_nine() {
        for value in 0..=99u8 {
            let marker = render(ClockStyle::Length, value, 4)
                .iter()
                .any(|op| *op == DrawOp::Pixel { x: 4, y: 0 });
            assert_eq!(marker, value % 10 == 9, "value {}", value);
        }
    }

    #[test]
    fn test_length_clamps_tall_bars() {
        let mut frame = FrameBuffer::new();
        let ops = render(ClockStyle::Length, 99, 6);
        for op in &ops {
            if let DrawOp::VLine { top, len, .. } = *op {
                assert!(top >= 0);
                assert!(top + len <= HEIGHT);
            }
        }
        for op in ops {
            if let DrawOp::VLine { x, top, len } = op {
                frame.vline(x, top, len, true);
            }
        }
        assert_eq!(frame.column_height(6), 8);
        assert_eq!(frame.column_height(7), 8);
    }
}
