// src/geometry.rs - Planar point/line/polygon math used by the classifiers and the guide overlay
use nalgebra::{Point2, Vector2};

pub type Point = Point2<f64>;

// A vertical line has no numeric slope; callers must treat `Vertical` as
// "cannot compare" instead of doing arithmetic with it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slope {
    Finite(f64),
    Vertical,
}

impl Slope {
    pub fn finite(self) -> Option<f64> {
        match self {
            Slope::Finite(m) => Some(m),
            Slope::Vertical => None,
        }
    }
}

pub fn distance_point_to_line(l1: &Point, l2: &Point, p: &Point) -> Option<f64> {
    let a = l2.y - l1.y;
    let b = l1.x - l2.x;
    let c = l2.x * l1.y - l1.x * l2.y;

    let norm = (a * a + b * b).sqrt();
    if norm == 0.0 {
        return None;
    }

    Some((a * p.x + b * p.y + c).abs() / norm)
}

pub fn polygon_area(points: &[Point]) -> Option<f64> {
    let n = points.len();
    if n < 3 {
        return None;
    }

    let twice_area: f64 = (0..n)
        .map(|i| {
            let p1 = points[i];
            let p2 = points[(i + 1) % n];
            p1.x * p2.y - p2.x * p1.y
        })
        .sum();

    Some((twice_area / 2.0).abs())
}

pub fn slope(p1: &Point, p2: &Point) -> Slope {
    if p1.x == p2.x {
        return Slope::Vertical;
    }
    Slope::Finite((p2.y - p1.y) / (p2.x - p1.x))
}

pub fn distance(p1: &Point, p2: &Point) -> f64 {
    nalgebra::distance(p1, p2)
}

pub fn midpoint(p1: &Point, p2: &Point) -> Point {
    nalgebra::center(p1, p2)
}

pub fn reflect_across_vertical(p: &Point, axis_x: f64) -> Point {
    Point::new(axis_x + (axis_x - p.x), p.y)
}

pub fn reflect_across_horizontal(p: &Point, axis_y: f64) -> Point {
    Point::new(p.x, axis_y + (axis_y - p.y))
}

pub fn translate(p: &Point, dx: f64, dy: f64) -> Point {
    *p + Vector2::new(dx, dy)
}

pub fn scale_about_origin(p: &Point, cx: f64, cy: f64, factor: f64) -> Point {
    let origin = Point::new(cx, cy);
    origin + (*p - origin) * factor
}

// The polygon may or may not repeat its first vertex at the end. Points on
// an edge are not guaranteed either way.
pub fn polygon_contains(polygon: &[Point], p: &Point) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut winding = 0i32;
    for (i, a) in polygon.iter().enumerate() {
        let b = &polygon[(i + 1) % polygon.len()];
        let side = (b.x - a.x) * (p.y - a.y) - (p.x - a.x) * (b.y - a.y);

        if a.y <= p.y {
            if b.y > p.y && side > 0.0 {
                winding += 1;
            }
        } else if b.y <= p.y && side < 0.0 {
            winding -= 1;
        }
    }

    winding != 0
}
