use std::io::Cursor;

use anyhow::{Context, Result};
use image::{codecs::png::PngEncoder, ImageEncoder, Rgba, RgbaImage};

use crate::models::Trend;
use crate::settings::GlucoseRange;

use super::payload::format_value;
use super::ports::{CardRenderer, RenderRequest};

type Color = Rgba<u8>;

const URGENT: Color = Rgba([196, 40, 40, 255]);
const LOW: Color = Rgba([226, 110, 36, 255]);
const IN_RANGE: Color = Rgba([38, 150, 82, 255]);
const HIGH: Color = Rgba([222, 168, 30, 255]);
const NO_DATA: Color = Rgba([96, 96, 96, 255]);
const DISABLED: Color = Rgba([36, 36, 36, 255]);
const WHITE: Color = Rgba([255, 255, 255, 255]);
const BLACK: Color = Rgba([0, 0, 0, 255]);

// Segment order: a b c d e f g.
const SEGMENTS: [[bool; 7]; 10] = [
    [true, true, true, true, true, true, false],
    [false, true, true, false, false, false, false],
    [true, true, false, true, true, false, true],
    [true, true, true, true, false, false, true],
    [false, true, true, false, false, true, true],
    [true, false, true, true, false, true, true],
    [true, false, true, true, true, true, true],
    [true, true, true, false, false, false, false],
    [true, true, true, true, true, true, true],
    [true, true, true, true, false, true, true],
];

/// Draws the card as a square PNG: a colour band for the range, the value in
/// seven-segment digits and a trend arrow underneath.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCardRenderer;

impl CardRenderer for PngCardRenderer {
    fn render(&self, request: &RenderRequest) -> Result<Vec<u8>> {
        let size = request.size.max(16);
        let (background, foreground) = palette(request);
        let mut canvas = RgbaImage::from_pixel(size, size, background);

        if !request.disabled {
            let text = match request.value {
                Some(value) => format_value(value, request.unit),
                None => "---".to_string(),
            };
            draw_text(&mut canvas, &text, foreground);

            if let Some(trend) = request.trend {
                draw_trend(&mut canvas, trend, foreground);
            }
            if request.value.is_some() && !request.is_up_to_date {
                draw_strike(&mut canvas, foreground);
            }
        }

        encode_png(&canvas)
    }
}

fn band_color(value: f64, range: &GlucoseRange) -> Color {
    if value <= range.urgent_low || value >= range.urgent_high {
        URGENT
    } else if value < range.low {
        LOW
    } else if value > range.high {
        HIGH
    } else {
        IN_RANGE
    }
}

fn palette(request: &RenderRequest) -> (Color, Color) {
    if request.disabled {
        return (DISABLED, WHITE);
    }
    let Some(value) = request.value else {
        return (NO_DATA, WHITE);
    };

    let (background, foreground) = if request.high_contrast {
        let urgent = band_color(value, &request.range) == URGENT;
        if urgent {
            (WHITE, BLACK)
        } else {
            (BLACK, WHITE)
        }
    } else {
        (band_color(value, &request.range), WHITE)
    };

    if request.is_up_to_date {
        (background, foreground)
    } else {
        (dim(background), dim(foreground))
    }
}

fn dim(color: Color) -> Color {
    let Rgba([r, g, b, a]) = color;
    let mix = |channel: u8| ((u16::from(channel) + 128) / 2) as u8;
    Rgba([mix(r), mix(g), mix(b), a])
}

fn fill_rect(canvas: &mut RgbaImage, x: i64, y: i64, w: i64, h: i64, color: Color) {
    let (width, height) = (i64::from(canvas.width()), i64::from(canvas.height()));
    for py in y.max(0)..(y + h).min(height) {
        for px in x.max(0)..(x + w).min(width) {
            canvas.put_pixel(px as u32, py as u32, color);
        }
    }
}

fn glyph_width(ch: char, digit_w: i64, thickness: i64) -> i64 {
    match ch {
        '.' => thickness * 2,
        _ => digit_w + thickness,
    }
}

fn draw_text(canvas: &mut RgbaImage, text: &str, color: Color) {
    let size = i64::from(canvas.width());
    let units: f64 = text
        .chars()
        .map(|ch| if ch == '.' { 0.25 } else { 0.625 })
        .sum();
    let by_width = (size as f64 * 0.9 / units.max(0.625)) as i64;
    let digit_h = ((size * 2) / 5).min(by_width).max(8);
    let digit_w = digit_h / 2;
    let thickness = (digit_h / 8).max(1);

    let total: i64 = text
        .chars()
        .map(|ch| glyph_width(ch, digit_w, thickness))
        .sum::<i64>()
        - thickness;
    let mut x = (size - total) / 2;
    let y = size / 6;

    for ch in text.chars() {
        match ch {
            '0'..='9' => {
                let segments = SEGMENTS[ch as usize - '0' as usize];
                draw_digit(canvas, x, y, digit_w, digit_h, thickness, segments, color);
            }
            '-' => {
                let mut segments = [false; 7];
                segments[6] = true;
                draw_digit(canvas, x, y, digit_w, digit_h, thickness, segments, color);
            }
            '.' => fill_rect(
                canvas,
                x,
                y + digit_h - thickness,
                thickness,
                thickness,
                color,
            ),
            _ => {}
        }
        x += glyph_width(ch, digit_w, thickness);
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_digit(
    canvas: &mut RgbaImage,
    x: i64,
    y: i64,
    w: i64,
    h: i64,
    t: i64,
    segments: [bool; 7],
    color: Color,
) {
    let half = h / 2;
    let rects = [
        (x + t, y, w - 2 * t, t),
        (x + w - t, y + t, t, half - t),
        (x + w - t, y + half, t, half - t),
        (x + t, y + h - t, w - 2 * t, t),
        (x, y + half, t, half - t),
        (x, y + t, t, half - t),
        (x + t, y + half - t / 2, w - 2 * t, t),
    ];
    for (on, (rx, ry, rw, rh)) in segments.iter().zip(rects) {
        if *on {
            fill_rect(canvas, rx, ry, rw, rh, color);
        }
    }
}

fn trend_angle(trend: Trend) -> Option<(f64, u8)> {
    use std::f64::consts::FRAC_PI_4;
    match trend {
        Trend::DoubleUp => Some((2.0 * FRAC_PI_4, 2)),
        Trend::SingleUp => Some((2.0 * FRAC_PI_4, 1)),
        Trend::FortyFiveUp => Some((FRAC_PI_4, 1)),
        Trend::Flat => Some((0.0, 1)),
        Trend::FortyFiveDown => Some((-FRAC_PI_4, 1)),
        Trend::SingleDown => Some((-2.0 * FRAC_PI_4, 1)),
        Trend::DoubleDown => Some((-2.0 * FRAC_PI_4, 2)),
        Trend::NotComputable => None,
    }
}

fn draw_trend(canvas: &mut RgbaImage, trend: Trend, color: Color) {
    let Some((angle, count)) = trend_angle(trend) else {
        return;
    };
    let size = f64::from(canvas.width());
    let length = size * 0.18;
    let thickness = (size / 40.0).max(1.0);
    let center_y = size * 0.8;
    let spacing = size * 0.16;

    for index in 0..count {
        let offset = (f64::from(index) - f64::from(count - 1) / 2.0) * spacing;
        let cx = size / 2.0 + offset;
        let (dx, dy) = (angle.cos(), -angle.sin());
        let (x0, y0) = (cx - dx * length / 2.0, center_y - dy * length / 2.0);
        let (x1, y1) = (cx + dx * length / 2.0, center_y + dy * length / 2.0);

        draw_line(canvas, (x0, y0), (x1, y1), thickness, color);
        // Arrowhead: two short strokes folded back from the tip.
        for fold in [2.5, -2.5] {
            let back = angle + std::f64::consts::PI + fold / 4.0;
            let (hx, hy) = (x1 + back.cos() * length * 0.4, y1 - back.sin() * length * 0.4);
            draw_line(canvas, (x1, y1), (hx, hy), thickness, color);
        }
    }
}

fn draw_line(canvas: &mut RgbaImage, from: (f64, f64), to: (f64, f64), thickness: f64, color: Color) {
    let steps = ((to.0 - from.0).hypot(to.1 - from.1) * 2.0).ceil().max(1.0) as i64;
    let half = (thickness / 2.0).round() as i64;
    for step in 0..=steps {
        let t = step as f64 / steps as f64;
        let x = (from.0 + (to.0 - from.0) * t).round() as i64;
        let y = (from.1 + (to.1 - from.1) * t).round() as i64;
        fill_rect(canvas, x - half, y - half, half * 2 + 1, half * 2 + 1, color);
    }
}

fn draw_strike(canvas: &mut RgbaImage, color: Color) {
    let size = f64::from(canvas.width());
    let thickness = (size / 32.0).max(1.0);
    draw_line(
        canvas,
        (size * 0.1, size * 0.62),
        (size * 0.9, size * 0.1),
        thickness,
        color,
    );
}

fn encode_png(canvas: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    PngEncoder::new(&mut buffer)
        .write_image(
            canvas.as_raw(),
            canvas.width(),
            canvas.height(),
            image::ExtendedColorType::Rgba8,
        )
        .context("failed to encode card PNG")?;
    Ok(buffer.into_inner())
}
