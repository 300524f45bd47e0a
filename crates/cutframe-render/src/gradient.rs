//! CSS background parsing and painting.
//!
//! Accepts a solid CSS color, `transparent`, `linear-gradient(...)` or
//! `radial-gradient(...)`. Radial gradients are always circles reaching the
//! farthest corner from their center.

use cutframe_core::{Color, CutframeError, FrameBuffer, PixelFormat, Result, Vec2};
use rayon::prelude::*;

use crate::canvas::blend_over;

/// Direction of a linear gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Direction {
    /// CSS angle in degrees: 0 points up, 90 points right
    Angle(f32),
    /// `to <side-or-corner>`; each component is -1, 0 or 1 (y grows down)
    Toward { x: i8, y: i8 },
}

impl Default for Direction {
    fn default() -> Self {
        Self::Toward { x: 1, y: 0 }
    }
}

/// Stop position, as written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopPosition {
    /// Fraction of the gradient line
    Fraction(f32),
    /// Absolute distance along the gradient line
    Pixels(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub color: Color,
    pub position: Option<StopPosition>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Gradient {
    Linear {
        stops: Vec<ColorStop>,
        direction: Direction,
    },
    Radial {
        stops: Vec<ColorStop>,
        /// Center as a fraction of the surface size
        center: Vec2,
    },
}

/// A parsed background value.
#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    /// `transparent`: leave the surface cleared
    None,
    Solid(Color),
    Gradient(Gradient),
}

impl Fill {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("transparent") || trimmed.is_empty() {
            return Ok(Self::None);
        }
        if is_gradient(trimmed) {
            return Gradient::parse(trimmed).map(Self::Gradient);
        }
        let color = Color::parse_css(trimmed)?;
        Ok(if color.is_transparent() {
            Self::None
        } else {
            Self::Solid(color)
        })
    }

    /// Blend this fill over the whole surface.
    pub fn paint(&self, surface: &mut FrameBuffer) {
        match self {
            Self::None => {}
            Self::Solid(color) => {
                if color.a >= 1.0 {
                    surface.fill(*color);
                } else {
                    let rgba = [color.r, color.g, color.b, color.a];
                    for_each_pixel(surface, |_| rgba);
                }
            }
            Self::Gradient(gradient) => gradient.paint(surface),
        }
    }
}

/// Whether `input` is a gradient function rather than a color.
pub fn is_gradient(input: &str) -> bool {
    let lower = input.trim_start().to_ascii_lowercase();
    lower.starts_with("linear-gradient(") || lower.starts_with("radial-gradient(")
}

impl Gradient {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let open = input
            .find('(')
            .ok_or_else(|| parse_error(input, "missing '('"))?;
        if !input.ends_with(')') {
            return Err(parse_error(input, "missing ')'"));
        }
        let name = input[..open].trim().to_ascii_lowercase();
        let body = &input[open + 1..input.len() - 1];
        let args = split_top_level(body, ',');

        let (gradient, stop_args) = match name.as_str() {
            "linear-gradient" => {
                let first = args.first().copied().unwrap_or_default();
                match parse_direction(first)? {
                    Some(direction) => (LinearOrRadial::Linear(direction), &args[1..]),
                    None => (LinearOrRadial::Linear(Direction::default()), &args[..]),
                }
            }
            "radial-gradient" => {
                let first = args.first().copied().unwrap_or_default();
                if parse_stops(first).is_ok() {
                    (LinearOrRadial::Radial(Vec2::splat(0.5)), &args[..])
                } else {
                    (LinearOrRadial::Radial(parse_radial_center(first)?), &args[1..])
                }
            }
            other => return Err(parse_error(input, &format!("unknown function '{other}'"))),
        };

        let mut stops = Vec::new();
        for arg in stop_args {
            stops.extend(parse_stops(arg)?);
        }
        if stops.len() < 2 {
            return Err(parse_error(input, "a gradient needs at least two color stops"));
        }

        Ok(match gradient {
            LinearOrRadial::Linear(direction) => Self::Linear { stops, direction },
            LinearOrRadial::Radial(center) => Self::Radial { stops, center },
        })
    }

    pub fn stops(&self) -> &[ColorStop] {
        match self {
            Self::Linear { stops, .. } | Self::Radial { stops, .. } => stops,
        }
    }

    /// Blend the gradient over the whole surface.
    pub fn paint(&self, surface: &mut FrameBuffer) {
        let size = Vec2::new(surface.width as f32, surface.height as f32);
        let shader = Shader::new(self, size);
        for_each_pixel(surface, |p| shader.color_at(p));
    }

    /// Color at a point of a `size` surface.
    pub fn color_at(&self, point: Vec2, size: Vec2) -> Color {
        let [r, g, b, a] = Shader::new(self, size).color_at(point);
        Color::new(r, g, b, a)
    }
}

enum LinearOrRadial {
    Linear(Direction),
    Radial(Vec2),
}

// ── Painting ────────────────────────────────────────────────────

/// Gradient resolved against a surface size.
struct Shader {
    origin: Vec2,
    /// Linear: unit direction. Radial: unused.
    axis: Vec2,
    /// Gradient line length (linear) or radius (radial)
    length: f32,
    radial: bool,
    /// (position, premultiplied color)
    stops: Vec<(f32, [f32; 4])>,
}

impl Shader {
    fn new(gradient: &Gradient, size: Vec2) -> Self {
        let (origin, axis, length, radial) = match gradient {
            Gradient::Linear { direction, .. } => {
                let axis = direction_vector(*direction, size);
                let length = (size.x * axis.x).abs() + (size.y * axis.y).abs();
                (size * 0.5, axis, length, false)
            }
            Gradient::Radial { center, .. } => {
                let origin = *center * size;
                let corners = [Vec2::ZERO, Vec2::new(size.x, 0.0), Vec2::new(0.0, size.y), size];
                let radius = corners
                    .iter()
                    .map(|corner| corner.distance(origin))
                    .fold(0.0f32, f32::max);
                (origin, Vec2::ZERO, radius, true)
            }
        };
        let stops = resolve_stops(gradient.stops(), length)
            .into_iter()
            .map(|(pos, c)| (pos, [c.r * c.a, c.g * c.a, c.b * c.a, c.a]))
            .collect();
        Self {
            origin,
            axis,
            length,
            radial,
            stops,
        }
    }

    fn color_at(&self, point: Vec2) -> [f32; 4] {
        let t = if self.length <= f32::EPSILON {
            0.0
        } else if self.radial {
            point.distance(self.origin) / self.length
        } else {
            (point - self.origin).dot(self.axis) / self.length + 0.5
        };
        let premultiplied = self.sample(t);
        if premultiplied[3] <= 0.0 {
            return [0.0; 4];
        }
        let a = premultiplied[3];
        [premultiplied[0] / a, premultiplied[1] / a, premultiplied[2] / a, a]
    }

    fn sample(&self, t: f32) -> [f32; 4] {
        let Some(&(first_pos, first)) = self.stops.first() else {
            return [0.0; 4];
        };
        if t <= first_pos {
            return first;
        }
        for pair in self.stops.windows(2) {
            let (p0, c0) = pair[0];
            let (p1, c1) = pair[1];
            if t <= p1 {
                if p1 - p0 <= f32::EPSILON {
                    return c1;
                }
                let f = (t - p0) / (p1 - p0);
                return [
                    c0[0] + (c1[0] - c0[0]) * f,
                    c0[1] + (c1[1] - c0[1]) * f,
                    c0[2] + (c1[2] - c0[2]) * f,
                    c0[3] + (c1[3] - c0[3]) * f,
                ];
            }
        }
        self.stops.last().map(|&(_, c)| c).unwrap_or([0.0; 4])
    }
}

fn direction_vector(direction: Direction, size: Vec2) -> Vec2 {
    match direction {
        Direction::Angle(degrees) => {
            let rad = degrees.to_radians();
            Vec2::new(rad.sin(), -rad.cos())
        }
        Direction::Toward { x, y } if x != 0 && y != 0 => {
            // Perpendicular to the diagonal joining the two neighbouring corners.
            Vec2::new(x as f32 * size.y, y as f32 * size.x).normalize_or_zero()
        }
        Direction::Toward { x, y } => Vec2::new(x as f32, y as f32),
    }
}

/// Positions for every stop: missing ends become 0 and 1, positions never
/// decrease, and runs of missing positions are spread evenly.
fn resolve_stops(stops: &[ColorStop], length: f32) -> Vec<(f32, Color)> {
    let n = stops.len();
    let mut positions: Vec<Option<f32>> = stops
        .iter()
        .map(|stop| {
            stop.position.map(|pos| match pos {
                StopPosition::Fraction(f) => f,
                StopPosition::Pixels(px) if length > 0.0 => px / length,
                StopPosition::Pixels(_) => 0.0,
            })
        })
        .collect();
    if n == 0 {
        return Vec::new();
    }
    positions[0].get_or_insert(0.0);
    positions[n - 1].get_or_insert(1.0);

    let mut max_seen = f32::NEG_INFINITY;
    for pos in positions.iter_mut().flatten() {
        *pos = pos.max(max_seen);
        max_seen = *pos;
    }

    let mut i = 1;
    while i < n {
        if positions[i].is_some() {
            i += 1;
            continue;
        }
        let start = i - 1;
        let mut end = i;
        while positions[end].is_none() {
            end += 1;
        }
        let (from, to) = (positions[start].unwrap_or(0.0), positions[end].unwrap_or(1.0));
        let steps = (end - start) as f32;
        for (k, slot) in positions[start + 1..end].iter_mut().enumerate() {
            *slot = Some(from + (to - from) * (k + 1) as f32 / steps);
        }
        i = end + 1;
    }

    stops
        .iter()
        .zip(positions)
        .map(|(stop, pos)| (pos.unwrap_or(0.0), stop.color))
        .collect()
}

fn for_each_pixel<F>(surface: &mut FrameBuffer, shade: F)
where
    F: Fn(Vec2) -> [f32; 4] + Sync,
{
    if surface.format != PixelFormat::Rgba8 || surface.is_empty() {
        return;
    }
    let width = surface.width as usize;
    let stride = surface.plane.stride;
    surface
        .plane
        .data
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            let pixels: &mut [[u8; 4]] = bytemuck::cast_slice_mut(&mut row[..width * 4]);
            for (x, px) in pixels.iter_mut().enumerate() {
                blend_over(px, shade(Vec2::new(x as f32 + 0.5, y as f32 + 0.5)));
            }
        });
}

// ── Parsing ─────────────────────────────────────────────────────

fn parse_error(input: &str, reason: &str) -> CutframeError {
    CutframeError::Parse(format!("invalid gradient '{input}': {reason}"))
}

/// Split on `separator` outside parentheses.
fn split_top_level(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in input.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c == separator && depth == 0 => {
                parts.push(input[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(input[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}

/// `Some` when `arg` is a direction, `None` when it is a color stop.
fn parse_direction(arg: &str) -> Result<Option<Direction>> {
    let lower = arg.trim().to_ascii_lowercase();
    if let Some(rest) = lower.strip_prefix("to ") {
        let (mut x, mut y) = (0i8, 0i8);
        for word in rest.split_whitespace() {
            match word {
                "left" => x = -1,
                "right" => x = 1,
                "top" => y = -1,
                "bottom" => y = 1,
                _ => return Err(parse_error(arg, &format!("unknown side '{word}'"))),
            }
        }
        if x == 0 && y == 0 {
            return Err(parse_error(arg, "empty direction"));
        }
        return Ok(Some(Direction::Toward { x, y }));
    }
    Ok(parse_angle(&lower).map(Direction::Angle))
}

fn parse_angle(value: &str) -> Option<f32> {
    let units: [(&str, f32); 4] = [
        ("deg", 1.0),
        ("grad", 0.9),
        ("rad", 180.0 / std::f32::consts::PI),
        ("turn", 360.0),
    ];
    for (suffix, to_degrees) in units {
        // "grad" is checked before "rad"
        if let Some(number) = value.strip_suffix(suffix) {
            return number.trim().parse::<f32>().ok().map(|n| n * to_degrees);
        }
    }
    None
}

/// Center from a radial shape argument such as `circle at 25% 75%`.
fn parse_radial_center(arg: &str) -> Result<Vec2> {
    let lower = arg.trim().to_ascii_lowercase();
    let (shape, position) = match lower.split_once("at ") {
        Some((shape, position)) => (shape, Some(position)),
        None => (lower.as_str(), None),
    };
    for word in shape.split_whitespace() {
        if !matches!(
            word,
            "circle"
                | "ellipse"
                | "closest-side"
                | "closest-corner"
                | "farthest-side"
                | "farthest-corner"
        ) {
            return Err(parse_error(arg, &format!("unsupported shape '{word}'")));
        }
    }
    let Some(position) = position else {
        return Ok(Vec2::splat(0.5));
    };

    let mut center = Vec2::splat(0.5);
    let words: Vec<&str> = position.split_whitespace().collect();
    match words.as_slice() {
        [single] => match *single {
            "top" | "bottom" => center.y = keyword_fraction(single, arg)?,
            _ => center.x = keyword_fraction(single, arg)?,
        },
        [first, second] => {
            // Keywords may come in either order ("top left").
            if matches!(*first, "top" | "bottom") || matches!(*second, "left" | "right") {
                center.x = keyword_fraction(second, arg)?;
                center.y = keyword_fraction(first, arg)?;
            } else {
                center.x = keyword_fraction(first, arg)?;
                center.y = keyword_fraction(second, arg)?;
            }
        }
        _ => return Err(parse_error(arg, "bad position")),
    }
    Ok(center)
}

fn keyword_fraction(word: &str, arg: &str) -> Result<f32> {
    match word {
        "left" | "top" => Ok(0.0),
        "center" => Ok(0.5),
        "right" | "bottom" => Ok(1.0),
        other => match parse_position(other) {
            Some(StopPosition::Fraction(f)) => Ok(f),
            _ => Err(parse_error(arg, &format!("bad position '{other}'"))),
        },
    }
}

fn parse_position(token: &str) -> Option<StopPosition> {
    if let Some(number) = token.strip_suffix('%') {
        return number.parse::<f32>().ok().map(|n| StopPosition::Fraction(n / 100.0));
    }
    if let Some(number) = token.strip_suffix("px") {
        return number.parse::<f32>().ok().map(StopPosition::Pixels);
    }
    if token == "0" {
        return Some(StopPosition::Fraction(0.0));
    }
    None
}

/// One stop argument: a color followed by zero, one or two positions.
fn parse_stops(arg: &str) -> Result<Vec<ColorStop>> {
    let tokens = split_top_level(arg, ' ');
    let mut split = tokens.len();
    while split > 1 && parse_position(tokens[split - 1]).is_some() {
        split -= 1;
    }
    let positions: Vec<StopPosition> = tokens[split..]
        .iter()
        .filter_map(|token| parse_position(token))
        .collect();
    if positions.len() > 2 {
        return Err(parse_error(arg, "too many stop positions"));
    }
    let color = Color::parse_css(&tokens[..split].join(" "))?;

    Ok(if positions.is_empty() {
        vec![ColorStop {
            color,
            position: None,
        }]
    } else {
        positions
            .into_iter()
            .map(|position| ColorStop {
                color,
                position: Some(position),
            })
            .collect()
    })
}
