//! Interactive flame-chart model: hit testing, zoom/pan, find and frame
//! batching, independent of any terminal backend.

pub mod colors;
mod find;
mod index;
mod redraw;
mod render;
mod scale;
mod session;
mod viewport;

pub use colors::{Palette, Rgba};
pub use find::{FindEngine, FindMessage, FindOptions, FindResults, FindUpdate};
pub use index::{HitMode, SpatialIndex};
pub use redraw::RedrawScheduler;
pub use render::{DrawSurface, FrameInput, FrameStats, Renderer, ScreenRect};
pub use scale::{Tick, ticks};
pub use session::{Command, NodeActivated, Notification, Tooltip, TraceSession};
pub use viewport::Viewport;
