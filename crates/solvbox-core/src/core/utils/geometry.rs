use nalgebra::{Point3, UnitQuaternion, Vector3};

/// Composes a rotation from three Euler angles applied as successive
/// axis-angle rotations about x, then y, then z.
pub fn rotation_from_euler_xyz(ax: f64, ay: f64, az: f64) -> UnitQuaternion<f64> {
    let rx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), ax);
    let ry = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), ay);
    let rz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), az);
    rz * ry * rx
}

/// Mass-weighted centre of a set of positions.
///
/// `positions` and `masses` must have equal length and the total mass must
/// be nonzero; callers validate both when the tables are built.
pub fn centre_of_mass(positions: &[Point3<f64>], masses: &[f64]) -> Point3<f64> {
    let total: f64 = masses.iter().sum();
    let weighted: Vector3<f64> = positions
        .iter()
        .zip(masses)
        .map(|(p, &m)| p.coords * m)
        .sum();
    Point3::from(weighted / total)
}

/// Molecular dipole moment about `origin`: the charge-weighted sum of the
/// atom displacements. For a neutral molecule the choice of origin is
/// immaterial; the boundary term uses the centre of mass.
pub fn dipole_moment(
    positions: &[Point3<f64>],
    charges: &[f64],
    origin: &Point3<f64>,
) -> Vector3<f64> {
    positions
        .iter()
        .zip(charges)
        .map(|(p, &q)| (p - origin) * q)
        .sum()
}

/// Clamps a cosine that may have slipped fractionally outside [-1, 1]
/// through floating rounding. Expected and silent.
#[inline]
pub fn clamp_cosine(value: f64) -> f64 {
    value.clamp(-1.0, 1.0)
}
