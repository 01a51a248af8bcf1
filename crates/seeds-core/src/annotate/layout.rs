//! Overlay layout, in photo pixels

use embedded_graphics::mono_font::MonoFont;
use embedded_graphics::mono_font::ascii::FONT_10X20;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;

pub(super) const TEXT_COLOR: Rgb888 = Rgb888::WHITE;

/// Bitmap font for the timestamp and readings
pub(super) const TEXT_FONT: &MonoFont<'static> = &FONT_10X20;

/// Magnification applied to [`TEXT_FONT`] (20 px glyphs become 40 px lines)
pub(super) const TEXT_SCALE: u32 = 2;

/// Left margin shared by every overlay element
pub(super) const MARGIN_LEFT_PX: i32 = 10;

// ============================================================================
// Text rows
// ============================================================================

pub(super) const TIMESTAMP_Y_PX: i32 = 10;
pub(super) const TEMPERATURE_Y_PX: i32 = 50;
pub(super) const PRESSURE_Y_PX: i32 = 90;
pub(super) const LIGHT_Y_PX: i32 = 130;
pub(super) const RGB_Y_PX: i32 = 170;
pub(super) const CCT_Y_PX: i32 = 210;

// ============================================================================
// Sparklines
// ============================================================================

/// Top of the first sparkline row
pub(super) const SPARKLINE_TOP_PX: i32 = 265;

/// Vertical distance between sparkline rows
pub(super) const SPARKLINE_PITCH_PX: i32 = 25;

/// Height of a full (top level) bar
pub(super) const SPARKLINE_HEIGHT_PX: u32 = 20;

/// Horizontal space taken by one glyph
pub(super) const SPARKLINE_CELL_WIDTH_PX: i32 = 10;

/// Width of the bar inside its cell
pub(super) const SPARKLINE_BAR_WIDTH_PX: u32 = 8;
