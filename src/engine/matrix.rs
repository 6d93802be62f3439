use crate::error::{BridgeError, Result};
use std::fmt;
use std::str::FromStr;

const EPSILON: f64 = 1e-9;

/// 2D affine transform in CSS `matrix(a, b, c, d, e, f)` order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix2D {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix2D {
    pub const IDENTITY: Self = Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Rotation by `angle` radians
    pub fn rotate(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// Skew by `ax`/`ay` radians
    pub fn skew(ax: f64, ay: f64) -> Self {
        Self::new(1.0, ay.tan(), ax.tan(), 1.0, 0.0, 0.0)
    }

    /// `self × other`, i.e. `other` is applied first
    pub fn multiply(&self, other: &Matrix2D) -> Matrix2D {
        Matrix2D {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn is_identity(&self) -> bool {
        let i = Self::IDENTITY;
        [
            (self.a, i.a),
            (self.b, i.b),
            (self.c, i.c),
            (self.d, i.d),
            (self.e, i.e),
            (self.f, i.f),
        ]
        .iter()
        .all(|(value, expected)| (value - expected).abs() < EPSILON)
    }

    pub fn without_translation(&self) -> Matrix2D {
        Matrix2D { e: 0.0, f: 0.0, ..*self }
    }

    /// CSS text of the matrix with translation removed; `"none"` when nothing remains
    pub fn to_css_without_translation(&self) -> String {
        let stripped = self.without_translation();
        if stripped.is_identity() {
            "none".to_string()
        } else {
            stripped.to_string()
        }
    }

    /// Parse a computed or authored `transform` value.
    ///
    /// Accepts `none`, `matrix()`, `matrix3d()` (projected to 2D) and lists of
    /// `translate`, `scale`, `rotate` and `skew` functions.
    pub fn parse(value: &str) -> Result<Matrix2D> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("none") {
            return Ok(Self::IDENTITY);
        }

        let mut result = Self::IDENTITY;
        let mut rest = value;
        while !rest.trim_start().is_empty() {
            rest = rest.trim_start();
            let open = rest.find('(').ok_or_else(|| invalid(value))?;
            let close = rest[open..].find(')').ok_or_else(|| invalid(value))? + open;

            let name = rest[..open].trim().to_ascii_lowercase();
            let args: Vec<&str> = rest[open + 1..close]
                .split(',')
                .flat_map(str::split_whitespace)
                .collect();

            let function = parse_function(&name, &args).ok_or_else(|| invalid(value))?;
            result = result.multiply(&function);
            rest = &rest[close + 1..];
        }

        Ok(result)
    }
}

impl FromStr for Matrix2D {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        Matrix2D::parse(s)
    }
}

impl fmt::Display for Matrix2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "matrix({}, {}, {}, {}, {}, {})",
            round(self.a),
            round(self.b),
            round(self.c),
            round(self.d),
            round(self.e),
            round(self.f)
        )
    }
}

fn invalid(value: &str) -> BridgeError {
    BridgeError::InvalidTransform(value.to_string())
}

fn round(value: f64) -> f64 {
    let rounded = (value * 1e6).round() / 1e6;
    // avoid printing "-0"
    if rounded == 0.0 { 0.0 } else { rounded }
}

fn parse_function(name: &str, args: &[&str]) -> Option<Matrix2D> {
    let numbers = || args.iter().map(|a| parse_number(a)).collect::<Option<Vec<f64>>>();
    let lengths = || args.iter().map(|a| parse_length(a)).collect::<Option<Vec<f64>>>();
    let angles = || args.iter().map(|a| parse_angle(a)).collect::<Option<Vec<f64>>>();

    match name {
        "matrix" => {
            let n = numbers()?;
            (n.len() == 6).then(|| Matrix2D::new(n[0], n[1], n[2], n[3], n[4], n[5]))
        }
        "matrix3d" => {
            let n = numbers()?;
            (n.len() == 16).then(|| Matrix2D::new(n[0], n[1], n[4], n[5], n[12], n[13]))
        }
        "translate" => match lengths()?.as_slice() {
            [x] => Some(Matrix2D::translate(*x, 0.0)),
            [x, y] => Some(Matrix2D::translate(*x, *y)),
            _ => None,
        },
        "translatex" => single(lengths()?).map(|x| Matrix2D::translate(x, 0.0)),
        "translatey" => single(lengths()?).map(|y| Matrix2D::translate(0.0, y)),
        "scale" => match numbers()?.as_slice() {
            [s] => Some(Matrix2D::scale(*s, *s)),
            [x, y] => Some(Matrix2D::scale(*x, *y)),
            _ => None,
        },
        "scalex" => single(numbers()?).map(|x| Matrix2D::scale(x, 1.0)),
        "scaley" => single(numbers()?).map(|y| Matrix2D::scale(1.0, y)),
        "rotate" | "rotatez" => single(angles()?).map(Matrix2D::rotate),
        "skew" => match angles()?.as_slice() {
            [x] => Some(Matrix2D::skew(*x, 0.0)),
            [x, y] => Some(Matrix2D::skew(*x, *y)),
            _ => None,
        },
        "skewx" => single(angles()?).map(|x| Matrix2D::skew(x, 0.0)),
        "skewy" => single(angles()?).map(|y| Matrix2D::skew(0.0, y)),
        _ => None,
    }
}

fn single(values: Vec<f64>) -> Option<f64> {
    match values.as_slice() {
        [value] => Some(*value),
        _ => None,
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_length(value: &str) -> Option<f64> {
    let value = value.trim();
    parse_number(value.strip_suffix("px").unwrap_or(value))
}

fn parse_angle(value: &str) -> Option<f64> {
    let value = value.trim().to_ascii_lowercase();
    if let Some(deg) = value.strip_suffix("deg") {
        return parse_number(deg).map(f64::to_radians);
    }
    if let Some(grad) = value.strip_suffix("grad") {
        return parse_number(grad).map(|g| g * std::f64::consts::PI / 200.0);
    }
    if let Some(rad) = value.strip_suffix("rad") {
        return parse_number(rad);
    }
    if let Some(turn) = value.strip_suffix("turn") {
        return parse_number(turn).map(|t| t * std::f64::consts::TAU);
    }
    // unitless zero is the only valid bare angle
    parse_number(&value).filter(|n| *n == 0.0)
}
