//! Look-angle derivation for gaze commands.

use serde::{Deserialize, Serialize};

use super::types::{LookAngles, Position};
use crate::error::TranslateError;

/// Height of the character's eyes above the position origin.
pub const DEFAULT_CALIBRATION_OFFSET: f64 = 11.89;

/// Gaze distance handed to the animation runtime unchanged.
pub const DEFAULT_GAZE_DISTANCE: f64 = 55.0;

/// Calibration constants for turning positions into look angles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeGeometry {
    pub calibration_offset: f64,
    pub distance: f64,
}

impl Default for GazeGeometry {
    fn default() -> Self {
        Self {
            calibration_offset: DEFAULT_CALIBRATION_OFFSET,
            distance: DEFAULT_GAZE_DISTANCE,
        }
    }
}

/// Derive horizontal and vertical look angles (degrees) for a position.
///
/// Horizontal is `atan(x / y)`, vertical is
/// `atan((z - offset) / sqrt(x² + y²))`. Both results lie strictly inside
/// (-90, 90). Fails for `y == 0`, and for any position whose ratios overflow
/// or whose angle rounds to ±90, instead of producing a degenerate angle.
pub fn derive_look_angles(
    position: Position,
    geometry: &GazeGeometry,
) -> Result<LookAngles, TranslateError> {
    let Position { x, y, z } = position;
    if y == 0.0 {
        return Err(TranslateError::UndefinedAngle);
    }

    let run = x / y;
    let rise = (z - geometry.calibration_offset) / x.hypot(y);
    if !run.is_finite() || !rise.is_finite() {
        return Err(TranslateError::UndefinedAngle);
    }

    let horizontal = run.atan().to_degrees();
    let vertical = rise.atan().to_degrees();

    // Huge ratios round atan to exactly ±π/2.
    if horizontal.abs() >= 90.0 || vertical.abs() >= 90.0 {
        return Err(TranslateError::UndefinedAngle);
    }

    Ok(LookAngles {
        horizontal,
        vertical,
        distance: geometry.distance,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn forty_five_degrees_at_eye_height() {
        let angles =
            derive_look_angles(Position::new(1.0, 1.0, 11.89), &GazeGeometry::default()).unwrap();
        assert!((angles.horizontal - 45.0).abs() < EPS);
        assert!(angles.vertical.abs() < EPS);
        assert!((angles.distance - 55.0).abs() < EPS);
    }

    #[test]
    fn zero_y_is_undefined() {
        let err = derive_look_angles(Position::new(3.0, 0.0, 1.0), &GazeGeometry::default())
            .unwrap_err();
        assert_eq!(err, TranslateError::UndefinedAngle);

        let err = derive_look_angles(Position::new(3.0, -0.0, 1.0), &GazeGeometry::default())
            .unwrap_err();
        assert_eq!(err, TranslateError::UndefinedAngle);
    }

    #[test]
    fn angles_stay_within_open_interval() {
        let geometry = GazeGeometry::default();
        for &(x, y, z) in &[
            (0.0, 1.0, 0.0),
            (-5.0, 2.0, 40.0),
            (100.0, -3.0, -20.0),
            (0.5, 0.25, 11.89),
            (-7.0, -7.0, 12.0),
        ] {
            let angles = derive_look_angles(Position::new(x, y, z), &geometry).unwrap();
            assert!(angles.horizontal.is_finite() && angles.vertical.is_finite());
            assert!(angles.horizontal > -90.0 && angles.horizontal < 90.0);
            assert!(angles.vertical > -90.0 && angles.vertical < 90.0);
            assert!((angles.distance - 55.0).abs() < EPS);
        }
    }

    #[test]
    fn degenerate_ratios_are_undefined() {
        let geometry = GazeGeometry::default();
        for &(x, y, z) in &[
            (1.0, 1e-320, 11.89),
            (1e17, 1.0, 11.89),
            (0.0, 1e-320, 20.0),
            (0.0, 1.0, 1e300),
        ] {
            assert_eq!(
                derive_look_angles(Position::new(x, y, z), &geometry),
                Err(TranslateError::UndefinedAngle),
                "({x}, {y}, {z})"
            );
        }
    }

    #[test]
    fn looking_up_is_positive() {
        let angles =
            derive_look_angles(Position::new(0.0, 10.0, 21.89), &GazeGeometry::default()).unwrap();
        assert!(angles.horizontal.abs() < EPS);
        assert!((angles.vertical - 45.0).abs() < EPS);
    }

    #[test]
    fn custom_geometry_is_honoured() {
        let geometry = GazeGeometry {
            calibration_offset: 0.0,
            distance: 80.0,
        };
        let angles = derive_look_angles(Position::new(0.0, 1.0, 0.0), &geometry).unwrap();
        assert!(angles.vertical.abs() < EPS);
        assert!((angles.distance - 80.0).abs() < EPS);
    }
}
