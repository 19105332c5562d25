use serde::{Deserialize, Serialize};

/// Orientation tolerance on the unit direction vector.
const ORIENTATION_TOLERANCE: f64 = 0.1;

/// Distance below which two detected segments count as the same physical line.
pub const DEFAULT_NEAR_DISTANCE: f64 = 30.0;

const HORIZONTAL: Point = Point { x: 1.0, y: 0.0 };
const VERTICAL: Point = Point { x: 0.0, y: 1.0 };

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Self) -> f64 {
        self.distance_sq(other).sqrt()
    }

    fn distance_sq(&self, other: &Self) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }
}

/// Integer pixel rectangle, origin top-left.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    /// Intersection with the `width` x `height` image plane. Disjoint
    /// rectangles collapse to a zero-sized rect at the nearest corner.
    pub fn clip_to(&self, width: u32, height: u32) -> Rect {
        let max_x = i32::try_from(width).unwrap_or(i32::MAX);
        let max_y = i32::try_from(height).unwrap_or(i32::MAX);
        let x1 = self.x.clamp(0, max_x);
        let y1 = self.y.clamp(0, max_y);
        let x2 = self.right().clamp(x1, max_x);
        let y2 = self.bottom().clamp(y1, max_y);
        Rect::from_corners(x1, y1, x2, y2)
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn inset(&self, border: i32) -> Rect {
        Rect::new(
            self.x + border,
            self.y + border,
            self.width - 2 * border,
            self.height - 2 * border,
        )
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// A detected straight segment. Endpoints are ordered left to right.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Line {
    p1: Point,
    p2: Point,
}

impl Line {
    pub fn new(a: Point, b: Point) -> Self {
        if a.x < b.x {
            Self { p1: a, p2: b }
        } else {
            Self { p1: b, p2: a }
        }
    }

    pub fn from_coords(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(Point::new(x1, y1), Point::new(x2, y2))
    }

    pub fn p1(&self) -> Point {
        self.p1
    }

    pub fn p2(&self) -> Point {
        self.p2
    }

    pub fn length(&self) -> f64 {
        self.p1.distance(&self.p2)
    }

    /// Unit direction vector from `p1` to `p2`.
    pub fn normal(&self) -> Point {
        let length = self.length();
        Point::new(
            (self.p2.x - self.p1.x) / length,
            (self.p2.y - self.p1.y) / length,
        )
    }

    pub fn normal_abs(&self) -> Point {
        let n = self.normal();
        Point::new(n.x.abs(), n.y.abs())
    }

    pub fn same_orientation(&self, normal_abs: Point) -> bool {
        self.normal_abs().distance(&normal_abs) < ORIENTATION_TOLERANCE
    }

    pub fn is_horizontal(&self) -> bool {
        self.same_orientation(HORIZONTAL)
    }

    pub fn is_vertical(&self) -> bool {
        self.same_orientation(VERTICAL)
    }

    /// Shortest distance from `point` to this segment.
    pub fn distance_to(&self, point: Point) -> f64 {
        let length_sq = self.p1.distance_sq(&self.p2);
        if length_sq == 0.0 {
            return self.p1.distance(&point);
        }

        let dx = self.p2.x - self.p1.x;
        let dy = self.p2.y - self.p1.y;
        let t = ((point.x - self.p1.x) * dx + (point.y - self.p1.y) * dy) / length_sq;
        if t < 0.0 {
            return point.distance(&self.p1);
        }
        if t > 1.0 {
            return point.distance(&self.p2);
        }
        point.distance(&Point::new(self.p1.x + t * dx, self.p1.y + t * dy))
    }

    /// True when the two segments are likely the same physical line:
    /// both ends of one lie close to the other, or one end is close and
    /// the far end stays within the other segment's length.
    pub fn is_near(&self, other: &Line, near_distance: f64) -> bool {
        let a1 = other.distance_to(self.p1);
        let a2 = other.distance_to(self.p2);
        let al = other.length();
        let b1 = self.distance_to(other.p1);
        let b2 = self.distance_to(other.p2);
        let bl = self.length();

        if a1 < near_distance && a2 < near_distance {
            return true;
        }
        if b1 < near_distance && b2 < near_distance {
            return true;
        }

        (a1 < near_distance && a2 < al)
            || (a2 < near_distance && a1 < al)
            || (b1 < near_distance && b2 < bl)
            || (b2 < near_distance && b1 < bl)
    }

    /// Segment/segment intersection point, if both parameters fall in `[0, 1]`.
    pub fn intersection(&self, other: &Line) -> Option<Point> {
        let x1d = self.p2.x - self.p1.x;
        let y1d = self.p2.y - self.p1.y;
        let x2d = other.p2.x - other.p1.x;
        let y2d = other.p2.y - other.p1.y;

        let denom = -x2d * y1d + x1d * y2d;
        if denom == 0.0 {
            return None;
        }
        let ox = self.p1.x - other.p1.x;
        let oy = self.p1.y - other.p1.y;
        let s = (-y1d * ox + x1d * oy) / denom;
        let t = (x2d * oy - y2d * ox) / denom;

        if (0.0..=1.0).contains(&s) && (0.0..=1.0).contains(&t) {
            Some(Point::new(self.p1.x + t * x1d, self.p1.y + t * y1d))
        } else {
            None
        }
    }

    pub fn intersects(&self, other: &Line) -> bool {
        self.intersection(other).is_some()
    }

    /// Both lines share an orientation and their end x-coordinates agree
    /// within `margin`, in either pairing.
    pub fn is_horizontal_pair(&self, other: &Line, margin: f64) -> bool {
        if !self.same_orientation(other.normal_abs()) {
            return false;
        }

        let straight = (self.p1.x - other.p1.x).abs() < margin
            && (self.p2.x - other.p2.x).abs() < margin;
        let crossed = (self.p1.x - other.p2.x).abs() < margin
            && (self.p2.x - other.p1.x).abs() < margin;
        straight || crossed
    }
}

/// Keeps each candidate only if it is not near any line already accepted.
pub fn accept_distinct<I>(candidates: I, near_distance: f64) -> Vec<Line>
where
    I: IntoIterator<Item = Line>,
{
    let mut accepted: Vec<Line> = Vec::new();
    for line in candidates {
        if line.length() == 0.0 {
            continue;
        }
        if accepted.iter().any(|kept| kept.is_near(&line, near_distance)) {
            continue;
        }
        accepted.push(line);
    }
    accepted
}
