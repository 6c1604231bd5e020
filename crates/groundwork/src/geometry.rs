use std::f64::consts::FRAC_PI_4;
use std::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};

/// Pixel position in map space. The y axis points down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn translated(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        let dx = f64::from(other.x - self.x);
        let dy = f64::from(other.y - self.y);
        (dx * dx + dy * dy).sqrt()
    }

    /// Angle from `self` toward `other` in radians, counter-clockwise with
    /// 0 pointing right (screen y is flipped).
    pub fn angle_to(self, other: Point) -> f64 {
        let dx = f64::from(other.x - self.x);
        let dy = f64::from(other.y - self.y);
        (-dy).atan2(dx)
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Axis-aligned pixel rectangle. `right()` and `bottom()` are exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        !other.is_empty()
            && other.x >= self.x
            && other.right() <= self.right()
            && other.y >= self.y
            && other.bottom() <= self.bottom()
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.overlaps(other) {
            return None;
        }
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Some(Rect::new(x, y, right - x, bottom - y))
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn is_aligned_to(&self, grid: i32) -> bool {
        self.x.rem_euclid(grid) == 0
            && self.y.rem_euclid(grid) == 0
            && self.width.rem_euclid(grid) == 0
            && self.height.rem_euclid(grid) == 0
    }
}

/// Facing direction of an entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction4 {
    #[default]
    Right,
    Up,
    Left,
    Down,
}

impl Direction4 {
    pub const ALL: [Direction4; 4] = [
        Direction4::Right,
        Direction4::Up,
        Direction4::Left,
        Direction4::Down,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    pub fn index(self) -> u8 {
        match self {
            Self::Right => 0,
            Self::Up => 1,
            Self::Left => 2,
            Self::Down => 3,
        }
    }
}

/// One of the eight movement directions, numbered counter-clockwise from east.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction8 {
    East,
    NorthEast,
    North,
    NorthWest,
    West,
    SouthWest,
    South,
    SouthEast,
}

impl Direction8 {
    pub const ALL: [Direction8; 8] = [
        Direction8::East,
        Direction8::NorthEast,
        Direction8::North,
        Direction8::NorthWest,
        Direction8::West,
        Direction8::SouthWest,
        Direction8::South,
        Direction8::SouthEast,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    pub fn from_digit(digit: char) -> Option<Self> {
        let index = digit.to_digit(10)?;
        u8::try_from(index).ok().and_then(Self::from_index)
    }

    pub fn index(self) -> u8 {
        match self {
            Self::East => 0,
            Self::NorthEast => 1,
            Self::North => 2,
            Self::NorthWest => 3,
            Self::West => 4,
            Self::SouthWest => 5,
            Self::South => 6,
            Self::SouthEast => 7,
        }
    }

    pub fn delta(self) -> Point {
        match self {
            Self::East => Point::new(1, 0),
            Self::NorthEast => Point::new(1, -1),
            Self::North => Point::new(0, -1),
            Self::NorthWest => Point::new(-1, -1),
            Self::West => Point::new(-1, 0),
            Self::SouthWest => Point::new(-1, 1),
            Self::South => Point::new(0, 1),
            Self::SouthEast => Point::new(1, 1),
        }
    }

    pub fn is_diagonal(self) -> bool {
        self.index() % 2 == 1
    }

    pub fn angle(self) -> f64 {
        f64::from(self.index()) * FRAC_PI_4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_edges_are_exclusive() {
        let rect = Rect::new(8, 8, 16, 8);
        assert!(rect.contains_point(Point::new(8, 8)));
        assert!(rect.contains_point(Point::new(23, 15)));
        assert!(!rect.contains_point(Point::new(24, 8)));
        assert!(!rect.contains_point(Point::new(8, 16)));
    }

    #[test]
    fn touching_rects_do_not_overlap() {
        let a = Rect::new(0, 0, 8, 8);
        let b = Rect::new(8, 0, 8, 8);
        assert!(!a.overlaps(&b));
        assert_eq!(a.intersection(&b), None);
        assert!(a.overlaps(&b.translated(-1, 0)));
    }

    #[test]
    fn intersection_clips_both_axes() {
        let a = Rect::new(0, 0, 16, 16);
        let b = Rect::new(10, -4, 16, 8);
        assert_eq!(a.intersection(&b), Some(Rect::new(10, 0, 6, 4)));
    }

    #[test]
    fn grid_alignment_handles_negative_coordinates() {
        assert!(Rect::new(-8, 16, 8, 8).is_aligned_to(8));
        assert!(!Rect::new(-3, 16, 8, 8).is_aligned_to(8));
        assert!(!Rect::new(0, 0, 12, 8).is_aligned_to(8));
    }

    #[test]
    fn direction8_digits_and_deltas() {
        assert_eq!(Direction8::from_digit('0'), Some(Direction8::East));
        assert_eq!(Direction8::from_digit('7'), Some(Direction8::SouthEast));
        assert_eq!(Direction8::from_digit('8'), None);
        assert_eq!(Direction8::from_digit('x'), None);
        assert_eq!(Direction8::North.delta(), Point::new(0, -1));
        assert!(Direction8::SouthWest.is_diagonal());
        assert!(!Direction8::West.is_diagonal());
    }

    #[test]
    fn angle_to_uses_screen_coordinates() {
        let origin = Point::ZERO;
        assert!((origin.angle_to(Point::new(10, 0)) - 0.0).abs() < 1e-9);
        assert!((origin.angle_to(Point::new(0, -10)) - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        assert!((origin.angle_to(Point::new(10, 10)) + FRAC_PI_4).abs() < 1e-9);
    }
}
