use foundation::bounds::Aabb2;
use foundation::grid::GridResolution;

/// Expands `[a, b)` outward to whole multiples of `res`:
/// `[a - a mod res, b + res - b mod res)`, with a floored modulo so negative
/// coordinates round towards negative infinity.
pub fn align_interval(a: f64, b: f64, res: f64) -> (f64, f64) {
    (a - a.rem_euclid(res), b + res - b.rem_euclid(res))
}

/// Aligns both axes of a requested box to the dataset's native cells so a
/// window never truncates a partial source cell.
pub fn align_window(bounds: &Aabb2, res: GridResolution) -> Aabb2 {
    let (x_min, x_max) = align_interval(bounds.x_min(), bounds.x_max(), res.x);
    let (y_min, y_max) = align_interval(bounds.y_min(), bounds.y_max(), res.y);
    Aabb2::new([x_min, y_min], [x_max, y_max])
}
