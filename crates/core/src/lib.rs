pub mod amount;
pub mod field;
pub mod geometry;
pub mod token;

pub use amount::{AmountError, NormalizedAmount};
pub use field::{FieldKind, FieldResult};
pub use geometry::{
    bounding_box, clamp_to_image, union_of_polygons, BoundingBox, CropRect, Point, Quad,
    MIN_CROP_SIDE,
};
pub use token::{RecognizedToken, TokenStream};
