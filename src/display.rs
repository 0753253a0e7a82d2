//! 16x8 frame buffer and the panel output seam
//!
//! Two 8x8 panels are addressed as one logical grid. Column 0 is the
//! leftmost column of panel 0, row 0 the top row.

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle};

pub const WIDTH: i32 = 16;
pub const HEIGHT: i32 = 8;
pub const PANELS: usize = (WIDTH / 8) as usize;

/// Drawing surface the clock renders into
pub trait MatrixDisplay {
    type Error;

    fn clear(&mut self);

    /// Out-of-range coordinates are ignored
    fn set_pixel(&mut self, x: i32, y: i32, on: bool);

    /// Draw `len` pixels downwards from `(x, y_start)`, clipped to the grid
    fn draw_vertical_line(&mut self, x: i32, y_start: i32, len: i32, on: bool);

    /// Push the frame to the hardware
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// One bit per pixel, one `u16` per row. Bit 15 is column 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameBuffer {
    rows: [u16; HEIGHT as usize],
}

impl FrameBuffer {
    pub const fn new() -> Self {
        Self {
            rows: [0; HEIGHT as usize],
        }
    }

    pub fn clear(&mut self) {
        self.rows = [0; HEIGHT as usize];
    }

    pub fn set(&mut self, x: i32, y: i32, on: bool) {
        if !(0..WIDTH).contains(&x) || !(0..HEIGHT).contains(&y) {
            return;
        }
        let mask = 1u16 << (15 - x);
        if on {
            self.rows[y as usize] |= mask;
        } else {
            self.rows[y as usize] &= !mask;
        }
    }

    pub fn get(&self, x: i32, y: i32) -> bool {
        if !(0..WIDTH).contains(&x) || !(0..HEIGHT).contains(&y) {
            return false;
        }
        self.rows[y as usize] & (1 << (15 - x)) != 0
    }

    pub fn vline(&mut self, x: i32, y_start: i32, len: i32, on: bool) {
        if len <= 0 {
            return;
        }
        let color = if on { BinaryColor::On } else { BinaryColor::Off };
        let end = Point::new(x, y_start + len - 1);
        // Infallible target
        let _ = Line::new(Point::new(x, y_start), end)
            .into_styled(PrimitiveStyle::with_stroke(color, 1))
            .draw(self);
    }

    /// Number of lit pixels in a column
    pub fn column_height(&self, x: i32) -> usize {
        (0..HEIGHT).filter(|&y| self.get(x, y)).count()
    }

    /// Split the frame into per-panel row bytes, MSB = leftmost column.
    pub fn panel_rows(&self) -> [[u8; 8]; PANELS] {
        let mut panels = [[0u8; 8]; PANELS];
        for (idx, panel) in panels.iter_mut().enumerate() {
            let shift = 8 - (idx * 8);
            for (r, row) in panel.iter_mut().enumerate() {
                *row = ((self.rows[r] >> shift) & 0xFF) as u8;
            }
        }
        panels
    }
}

impl DrawTarget for FrameBuffer {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.set(point.x, point.y, color.is_on());
        }
        Ok(())
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, HEIGHT as u32)
    }
}

/// Writes one 8x8 panel's rows to the hardware
pub trait PanelSink {
    type Error;

    fn write_panel(&mut self, index: usize, rows: &[u8; 8]) -> Result<(), Self::Error>;
}

/// Frame buffer backed by a chain of panels
pub struct LedMatrix<S> {
    frame: FrameBuffer,
    sink: S,
}

impl<S: PanelSink> LedMatrix<S> {
    pub fn new(sink: S) -> Self {
        Self {
            frame: FrameBuffer::new(),
            sink,
        }
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

impl<S: PanelSink> MatrixDisplay for LedMatrix<S> {
    type Error = S::Error;

    fn clear(&mut self) {
        self.frame.clear();
    }

    fn set_pixel(&mut self, x: i32, y: i32, on: bool) {
        self.frame.set(x, y, on);
    }

    fn draw_vertical_line(&mut self, x: i32, y_start: i32, len: i32, on: bool) {
        self.frame.vline(x, y_start, len, on);
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        for (idx, rows) in self.frame.panel_rows().iter().enumerate() {
            self.sink.write_panel(idx, rows)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        writes: heapless::Vec<(usize, [u8; 8]), 4>,
    }

    impl PanelSink for Recorder {
        type Error = ();

        fn write_panel(&mut self, index: usize, rows: &[u8; 8]) -> Result<(), ()> {
            self.writes.push((index, *rows)).map_err(|_| ())
        }
    }

    #[test]
    fn test_panel_packing_corners() {
        let mut frame = FrameBuffer::new();
        frame.set(0, 0, true);
        frame.set(15, 7, true);
        let panels = frame.panel_rows();
        assert_eq!(panels[0][0], 0x80);
        assert_eq!(panels[1][7], 0x01);
        assert_eq!(panels[0][7], 0);
        assert_eq!(panels[1][0], 0);
    }

    #[test]
    fn test_out_of_range_pixels_ignored() {
        let mut frame = FrameBuffer::new();
        frame.set(16, 0, true);
        frame.set(-1, 3, true);
        frame.set(3, 8, true);
        assert_eq!(frame, FrameBuffer::new());
    }

    #[test]
    fn test_vline_is_clipped() {
        let mut frame = FrameBuffer::new();
        frame.vline(1, -1, 9, true);
        assert_eq!(frame.column_height(1), 8);
        frame.vline(2, 6, 0, true);
        assert_eq!(frame.column_height(2), 0);
    }

    #[test]
    fn test_flush_writes_every_panel() {
        let mut matrix = LedMatrix::new(Recorder {
            writes: heapless::Vec::new(),
        });
        matrix.set_pixel(8, 2, true);
        matrix.flush().unwrap();

        let writes = &matrix.sink().writes;
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].1, [0; 8]);
        assert_eq!(writes[1].0, 1);
        assert_eq!(writes[1].1[2], 0x80);
    }

    #[test]
    fn test_clear_empties_frame() {
        let mut matrix = LedMatrix::new(Recorder {
            writes: heapless::Vec::new(),
        });
        matrix.draw_vertical_line(4, 0, 8, true);
        matrix.clear();
        assert_eq!(*matrix.frame(), FrameBuffer::new());
    }
}
