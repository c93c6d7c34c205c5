use std::f64::consts::PI;

/// Area-to-radius conversion: a bubble covers screen area equal to the
/// magnitude it represents, so radius = sqrt(magnitude / pi).
pub fn radius_from_area(area: f64) -> f32 {
    (area.max(0.0) / PI).sqrt() as f32
}
