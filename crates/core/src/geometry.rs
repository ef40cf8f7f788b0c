use serde::{Deserialize, Serialize};

/// Crops narrower or shorter than this (after clamping) hold no usable text.
pub const MIN_CROP_SIDE: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Truncates toward zero, the way engines reporting sub-pixel corners are read.
    pub fn from_f32(x: f32, y: f32) -> Self {
        Self { x: x as i32, y: y as i32 }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box, inclusive of its minimum and maximum coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl BoundingBox {
    pub fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> i32 {
        self.max_y - self.min_y
    }

    /// Corners in NW, NE, SE, SW order.
    pub fn to_quad(self) -> Quad {
        Quad([
            Point::new(self.min_x, self.min_y),
            Point::new(self.max_x, self.min_y),
            Point::new(self.max_x, self.max_y),
            Point::new(self.min_x, self.max_y),
        ])
    }
}

/// Four ordered corner points bounding a piece of recognized content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    pub fn points(&self) -> &[Point; 4] {
        &self.0
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let [first, rest @ ..] = &self.0;
        enclose(first, rest)
    }
}

impl From<[(i32, i32); 4]> for Quad {
    fn from(corners: [(i32, i32); 4]) -> Self {
        Quad(corners.map(Point::from))
    }
}

/// A pixel rectangle guaranteed to lie inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Reduces an arbitrary point set to its axis-aligned bounding box.
/// Returns `None` for an empty set.
pub fn bounding_box(points: &[Point]) -> Option<BoundingBox> {
    let (first, rest) = points.split_first()?;
    Some(enclose(first, rest))
}

fn enclose(first: &Point, rest: &[Point]) -> BoundingBox {
    let init = BoundingBox { min_x: first.x, min_y: first.y, max_x: first.x, max_y: first.y };
    rest.iter().fold(init, |b, p| BoundingBox {
        min_x: b.min_x.min(p.x),
        min_y: b.min_y.min(p.y),
        max_x: b.max_x.max(p.x),
        max_y: b.max_y.max(p.y),
    })
}

/// Smallest axis-aligned quad covering every corner of every input quad.
pub fn union_of_polygons(polygons: &[Quad]) -> Option<Quad> {
    let corners: Vec<Point> = polygons.iter().flat_map(|q| q.0).collect();
    bounding_box(&corners).map(BoundingBox::to_quad)
}

/// Clamps `region` into a `width` × `height` image.
///
/// `None` means the clamped region is degenerate (a side below
/// [`MIN_CROP_SIDE`]) and must be treated as holding no text.
pub fn clamp_to_image(region: &Quad, width: u32, height: u32) -> Option<CropRect> {
    let b = region.bounding_box();
    let clamp = |v: i32, hi: u32| -> u32 { v.clamp(0, hi.min(i32::MAX as u32) as i32) as u32 };

    let x0 = clamp(b.min_x, width);
    let x1 = clamp(b.max_x, width);
    let y0 = clamp(b.min_y, height);
    let y1 = clamp(b.max_y, height);

    let rect = CropRect { x: x0, y: y0, width: x1 - x0, height: y1 - y0 };
    if rect.width < MIN_CROP_SIDE || rect.height < MIN_CROP_SIDE {
        return None;
    }
    Some(rect)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> Quad {
        Quad::from([(x0, y0), (x1, y0), (x1, y1), (x0, y1)])
    }

    #[test]
    fn bounding_box_of_tilted_quad() {
        let pts = [
            Point::new(10, 12),
            Point::new(50, 8),
            Point::new(52, 30),
            Point::new(11, 34),
        ];
        let b = bounding_box(&pts).unwrap();
        assert_eq!(b, BoundingBox { min_x: 10, min_y: 8, max_x: 52, max_y: 34 });
    }

    #[test]
    fn bounding_box_of_nothing_is_none() {
        assert!(bounding_box(&[]).is_none());
    }

    #[test]
    fn from_f32_truncates() {
        assert_eq!(Point::from_f32(10.9, 3.2), Point::new(10, 3));
    }

    #[test]
    fn union_of_disjoint_rectangles_is_minimal_enclosure() {
        let a = rect(0, 0, 10, 10);
        let b = rect(20, 30, 40, 50);
        let u = union_of_polygons(&[a, b]).unwrap();
        assert_eq!(u, rect(0, 0, 40, 50));
    }

    #[test]
    fn union_corners_are_nw_ne_se_sw() {
        let u = union_of_polygons(&[rect(5, 6, 7, 8)]).unwrap();
        assert_eq!(
            u.points(),
            &[Point::new(5, 6), Point::new(7, 6), Point::new(7, 8), Point::new(5, 8)]
        );
    }

    #[test]
    fn union_of_nothing_is_none() {
        assert!(union_of_polygons(&[]).is_none());
    }

    #[test]
    fn clamp_keeps_inner_region() {
        let r = clamp_to_image(&rect(10, 20, 60, 40), 100, 100).unwrap();
        assert_eq!(r, CropRect { x: 10, y: 20, width: 50, height: 20 });
    }

    #[test]
    fn clamp_trims_region_hanging_off_the_edges() {
        let r = clamp_to_image(&rect(-15, -5, 130, 70), 100, 60).unwrap();
        assert_eq!(r, CropRect { x: 0, y: 0, width: 100, height: 60 });
    }

    #[test]
    fn clamp_rejects_sliver_below_floor() {
        assert!(clamp_to_image(&rect(10, 10, 14, 40), 100, 100).is_none());
        assert!(clamp_to_image(&rect(10, 10, 40, 13), 100, 100).is_none());
    }

    #[test]
    fn clamp_rejects_region_entirely_outside() {
        assert!(clamp_to_image(&rect(200, 200, 300, 300), 100, 100).is_none());
    }

    #[test]
    fn clamp_accepts_region_exactly_at_floor() {
        let r = clamp_to_image(&rect(0, 0, 5, 5), 100, 100).unwrap();
        assert_eq!((r.width, r.height), (5, 5));
    }
}
