use crate::timeline::colors::BACKGROUND;
use crate::timeline::{DrawSurface, Rgba, ScreenRect};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
};

pub fn to_color(color: Rgba) -> Color {
    let color = color.over(BACKGROUND);
    Color::Rgb(color.r, color.g, color.b)
}

/// Draws timeline frames into a region of a ratatui buffer.
///
/// One surface unit is one terminal cell. A rectangle covers every cell it
/// overlaps, so anything wider than zero gets at least one column.
pub struct TerminalSurface<'a> {
    buf: &'a mut Buffer,
    area: Rect,
}

impl<'a> TerminalSurface<'a> {
    pub fn new(buf: &'a mut Buffer, area: Rect) -> Self {
        Self { buf, area }
    }

    /// Cell columns and rows covered by `rect`, relative to the area
    fn cells(&self, rect: &ScreenRect) -> (std::ops::Range<u16>, std::ops::Range<u16>) {
        let clamp = |v: f64, max: u16| v.clamp(0.0, max as f64) as u16;

        let x0 = clamp(rect.x.floor(), self.area.width);
        let x1 = clamp((rect.x + rect.width).ceil(), self.area.width).max(x0 + 1);
        let y0 = clamp(rect.y.floor(), self.area.height);
        let y1 = clamp((rect.y + rect.height).ceil(), self.area.height).max(y0 + 1);

        (x0..x1.min(self.area.width), y0..y1.min(self.area.height))
    }

    fn cell_mut(&mut self, col: u16, row: u16) -> Option<&mut ratatui::buffer::Cell> {
        self.buf.cell_mut((self.area.x + col, self.area.y + row))
    }

    fn background_at(&mut self, col: u16, row: u16) -> Rgba {
        match self.cell_mut(col, row).map(|cell| cell.bg) {
            Some(Color::Rgb(r, g, b)) => Rgba::rgb(r, g, b),
            _ => BACKGROUND,
        }
    }
}

impl DrawSurface for TerminalSurface<'_> {
    fn clear(&mut self) {
        let style = Style::default().bg(to_color(BACKGROUND));
        self.buf.set_style(self.area, style);
        for row in 0..self.area.height {
            for col in 0..self.area.width {
                if let Some(cell) = self.cell_mut(col, row) {
                    cell.set_symbol(" ");
                }
            }
        }
    }

    fn fill_rects(&mut self, color: Rgba, rects: &[ScreenRect]) {
        for rect in rects {
            let (cols, rows) = self.cells(rect);
            for row in rows {
                for col in cols.clone() {
                    let below = self.background_at(col, row);
                    let blended = color.over(below);
                    if let Some(cell) = self.cell_mut(col, row) {
                        cell.set_bg(Color::Rgb(blended.r, blended.g, blended.b));
                    }
                }
            }
        }
    }

    fn stroke_rects(&mut self, color: Rgba, line_width: f64, rects: &[ScreenRect]) {
        let mut style = Style::default().fg(to_color(color));
        if line_width > 1.0 {
            style = style.add_modifier(Modifier::BOLD);
        }

        for rect in rects {
            let (cols, rows) = self.cells(rect);
            let (Some(first), Some(last)) = (cols.clone().next(), cols.clone().last()) else {
                continue;
            };
            for row in rows {
                if first == last {
                    if let Some(cell) = self.cell_mut(first, row) {
                        cell.set_symbol("◆").set_style(style);
                    }
                    continue;
                }
                if let Some(cell) = self.cell_mut(first, row) {
                    cell.set_symbol("[").set_style(style);
                }
                if let Some(cell) = self.cell_mut(last, row) {
                    cell.set_symbol("]").set_style(style);
                }
            }
        }
    }

    fn draw_text(&mut self, x: f64, y: f64, max_width: f64, text: &str, color: Rgba) {
        // Leave the first and last cell free for match brackets
        let col = x.max(0.0).floor() as u16 + 1;
        let row = y.max(0.0).floor() as u16;
        let width = (max_width.floor() as usize).saturating_sub(2);
        if width == 0 || col >= self.area.width || row >= self.area.height {
            return;
        }

        let fg = Color::Rgb(color.r, color.g, color.b);
        for (i, ch) in text.chars().take(width).enumerate() {
            let Some(cell) = self.cell_mut(col + i as u16, row) else {
                break;
            };
            cell.set_char(ch).set_fg(fg);
        }
    }
}
