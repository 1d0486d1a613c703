//! SVG documents for the pool table

use std::fmt::Write;

use super::Render;
use crate::consts::*;
use crate::physics::collision::{OBSTACLES, Obstacle};
use crate::table::{Ball, TableState};

/// Fill colour by ball number (cue ball first)
pub const BALL_COLOURS: [&str; 16] = [
    "WHITE",
    "YELLOW",
    "BLUE",
    "RED",
    "PURPLE",
    "ORANGE",
    "GREEN",
    "BROWN",
    "BLACK",
    "LIGHTYELLOW",
    "LIGHTBLUE",
    "PINK",
    "MEDIUMPURPLE",
    "LIGHTSALMON",
    "LIGHTGREEN",
    "SANDYBROWN",
];

/// Cushion thickness drawn around the playing surface
const CUSHION: f64 = 25.0;

pub fn ball_colour(number: u8) -> &'static str {
    BALL_COLOURS
        .get(number as usize)
        .copied()
        .unwrap_or("GRAY")
}

/// Renders a full-table SVG at half scale
#[derive(Debug, Clone)]
pub struct SvgRenderer {
    /// Displayed width in pixels; height follows the table aspect ratio
    pub width_px: u32,
}

impl Default for SvgRenderer {
    fn default() -> Self {
        Self { width_px: 700 }
    }
}

impl SvgRenderer {
    fn header(&self, out: &mut String) {
        let outer_w = TABLE_WIDTH + 2.0 * CUSHION;
        let outer_h = TABLE_LENGTH + 2.0 * CUSHION;
        let height_px = (self.width_px as f64 * outer_h / outer_w).round() as u32;
        let _ = write!(
            out,
            concat!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n",
                "<svg width=\"{}\" height=\"{}\" viewBox=\"{} {} {} {}\"\n",
                "xmlns=\"http://www.w3.org/2000/svg\"\n",
                "xmlns:xlink=\"http://www.w3.org/1999/xlink\">\n",
                "<rect width=\"{}\" height=\"{}\" x=\"0\" y=\"0\" fill=\"#C0D0C0\" />\n",
            ),
            self.width_px, height_px, -CUSHION, -CUSHION, outer_w, outer_h, TABLE_WIDTH, TABLE_LENGTH,
        );
    }

    fn furniture(&self, out: &mut String) {
        for obstacle in &OBSTACLES {
            let _ = match *obstacle {
                Obstacle::HCushion(y) => writeln!(
                    out,
                    "<rect width=\"{}\" height=\"{}\" x=\"{}\" y=\"{}\" fill=\"darkgreen\" />",
                    TABLE_WIDTH + 2.0 * CUSHION,
                    CUSHION,
                    -CUSHION,
                    if y == 0.0 { -CUSHION } else { TABLE_LENGTH },
                ),
                Obstacle::VCushion(x) => writeln!(
                    out,
                    "<rect width=\"{}\" height=\"{}\" x=\"{}\" y=\"{}\" fill=\"darkgreen\" />",
                    CUSHION,
                    TABLE_LENGTH + 2.0 * CUSHION,
                    if x == 0.0 { -CUSHION } else { TABLE_WIDTH },
                    -CUSHION,
                ),
                Obstacle::Pocket(centre) => writeln!(
                    out,
                    "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"black\" />",
                    centre.x, centre.y, HOLE_RADIUS,
                ),
            };
        }
    }

    fn ball(&self, out: &mut String, ball: &Ball) {
        let _ = writeln!(
            out,
            "<circle id=\"ball-{}\" cx=\"{:.1}\" cy=\"{:.1}\" r=\"{}\" fill=\"{}\" />",
            ball.number,
            ball.pos.x,
            ball.pos.y,
            BALL_RADIUS,
            ball_colour(ball.number),
        );
    }
}

impl Render for SvgRenderer {
    fn render_table(&self, table: &TableState) -> String {
        let mut out = String::with_capacity(2048);
        self.header(&mut out);
        self.furniture(&mut out);
        for ball in table.balls() {
            self.ball(&mut out, ball);
        }
        out.push_str("</svg>\n");
        out
    }
}
