use super::colors::{self, Palette, Rgba};
use super::{FindEngine, SpatialIndex, Viewport};
use crate::tree::NodeId;

/// Axis-aligned rectangle in surface units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    /// Trim to `[0, max_width]` horizontally
    fn clip_x(mut self, max_width: f64) -> Option<Self> {
        if self.x < 0.0 {
            self.width += self.x;
            self.x = 0.0;
        }
        let overflow = self.x + self.width - max_width;
        if overflow > 0.0 {
            self.width -= overflow;
        }
        (self.width >= 0.0 && self.x <= max_width).then_some(self)
    }
}

/// The drawing capability the timeline needs from a backend
pub trait DrawSurface {
    fn clear(&mut self);

    fn fill_rects(&mut self, color: Rgba, rects: &[ScreenRect]);

    fn stroke_rects(&mut self, color: Rgba, line_width: f64, rects: &[ScreenRect]);

    /// Label text clipped to `max_width`; surfaces without text ignore it
    fn draw_text(&mut self, _x: f64, _y: f64, _max_width: f64, _text: &str, _color: Rgba) {}
}

/// Counters for the last frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub rects: usize,
    pub fill_passes: usize,
    pub too_narrow: usize,
}

/// Everything a frame reads
pub struct FrameInput<'a> {
    pub index: &'a SpatialIndex,
    pub viewport: &'a Viewport,
    pub palette: &'a Palette,
    pub find: &'a FindEngine,
    pub min_rect_width: f64,
    pub label_min_width: f64,
}

struct Label {
    rect: ScreenRect,
    id: NodeId,
    color: Rgba,
}

/// Culls and batches the visible nodes.
///
/// The per-color queues are kept between frames to reuse their allocations.
#[derive(Default)]
pub struct Renderer {
    queues: Vec<Vec<ScreenRect>>,
    matches: Vec<ScreenRect>,
    current: Vec<ScreenRect>,
    labels: Vec<Label>,
    bands: Vec<(Rgba, Vec<ScreenRect>)>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, surface: &mut dyn DrawSurface, input: &FrameInput<'_>) -> FrameStats {
        let FrameInput {
            index,
            viewport,
            palette,
            find,
            min_rect_width,
            label_min_width,
        } = *input;
        let tree = index.tree();
        let mut stats = FrameStats::default();

        surface.clear();
        if viewport.is_empty() {
            return stats;
        }

        self.queues.resize_with(palette.slots().len(), Vec::new);
        for queue in &mut self.queues {
            queue.clear();
        }
        self.matches.clear();
        self.current.clear();
        self.labels.clear();

        self.draw_issues(surface, index, viewport);

        let current = find.current();
        let (t0, t1) = viewport.visible_time_range();
        let (d0, d1) = viewport.visible_depth_range();
        let d1 = d1.min(index.depth_count().saturating_sub(1));

        for depth in d0..=d1 {
            let y = viewport.depth_to_y(depth);
            for &id in index.visible(depth, t0, t1) {
                let node = tree.node(id);
                let width = node.duration.total as f64 * viewport.zoom();
                let is_current = current == Some(id);

                if width < min_rect_width && !is_current {
                    stats.too_narrow += 1;
                    continue;
                }

                let rect = ScreenRect {
                    x: viewport.time_to_x(node.timestamp),
                    y,
                    width,
                    height: viewport.row_height(),
                };
                let Some(rect) = rect.clip_x(viewport.width()) else {
                    continue;
                };

                let slot = palette.slot(node.sub_category);
                self.queues[slot].push(rect);
                stats.rects += 1;

                if is_current {
                    self.current.push(rect);
                } else if find.is_match(id) {
                    self.matches.push(rect);
                }
                if rect.width >= label_min_width {
                    self.labels.push(Label {
                        rect,
                        id,
                        color: palette.slots()[slot],
                    });
                }
            }
        }

        for (slot, rects) in self.queues.iter().enumerate() {
            if !rects.is_empty() {
                surface.fill_rects(palette.slots()[slot], rects);
                stats.fill_passes += 1;
            }
        }

        for label in &self.labels {
            let text_color = if label.color.is_dark() {
                Rgba::rgb(0xFF, 0xFF, 0xFF)
            } else {
                Rgba::rgb(0, 0, 0)
            };
            surface.draw_text(
                label.rect.x,
                label.rect.y,
                label.rect.width,
                &tree.node(label.id).text,
                text_color,
            );
        }

        if !self.matches.is_empty() {
            surface.stroke_rects(colors::MATCH_BORDER, 1.0, &self.matches);
        }
        if !self.current.is_empty() {
            surface.stroke_rects(colors::CURRENT_MATCH_BORDER, 3.0, &self.current);
        }

        stats
    }

    /// Each issue shades from its start to the next issue's start (or the trace end)
    fn draw_issues(&mut self, surface: &mut dyn DrawSurface, index: &SpatialIndex, viewport: &Viewport) {
        let tree = index.tree();
        let issues = tree.issues();
        let trace_end = tree.root().exit_timestamp;

        for (_, bands) in &mut self.bands {
            bands.clear();
        }

        for (i, issue) in issues.iter().enumerate() {
            let end = issues.get(i + 1).map_or(trace_end, |next| next.start_time);
            let x = viewport.time_to_x(issue.start_time);
            let band = ScreenRect {
                x,
                y: 0.0,
                width: viewport.time_to_x(end.max(issue.start_time)) - x,
                height: viewport.height(),
            };
            let Some(band) = band.clip_x(viewport.width()) else {
                continue;
            };

            let color = colors::issue_color(issue.kind);
            match self.bands.iter_mut().find(|(c, _)| *c == color) {
                Some((_, bands)) => bands.push(band),
                None => self.bands.push((color, vec![band])),
            }
        }

        for (color, bands) in &self.bands {
            if !bands.is_empty() {
                surface.fill_rects(*color, bands);
            }
        }
    }
}

/// Records calls instead of drawing; used by tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub clears: usize,
    pub fills: Vec<(Rgba, Vec<ScreenRect>)>,
    pub strokes: Vec<(Rgba, f64, Vec<ScreenRect>)>,
    pub texts: Vec<String>,
}

#[cfg(test)]
impl DrawSurface for RecordingSurface {
    fn clear(&mut self) {
        self.clears += 1;
        self.fills.clear();
        self.strokes.clear();
        self.texts.clear();
    }

    fn fill_rects(&mut self, color: Rgba, rects: &[ScreenRect]) {
        self.fills.push((color, rects.to_vec()));
    }

    fn stroke_rects(&mut self, color: Rgba, line_width: f64, rects: &[ScreenRect]) {
        self.strokes.push((color, line_width, rects.to_vec()));
    }

    fn draw_text(&mut self, _x: f64, _y: f64, _max_width: f64, text: &str, _color: Rgba) {
        self.texts.push(text.to_string());
    }
}
