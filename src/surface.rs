use crate::error::HeliosError;

/// Default tolerance under which a particle is considered to sit on a
/// surface. Overridable through the `surface_tolerance` setting.
pub const SURFACE_TOLERANCE: f64 = 1e-10;

// Below this the quadratic term degenerates to a linear equation.
const COEFF_EPSILON: f64 = 1e-30;

/// Which side of a surface a point is on: the sign of the surface function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sense {
    Positive,
    Negative,
}

impl Sense {
    /// Classify a surface function value.
    pub fn of(value: f64) -> Self {
        if value > 0.0 {
            Sense::Positive
        } else {
            Sense::Negative
        }
    }

    pub fn flip(self) -> Self {
        match self {
            Sense::Positive => Sense::Negative,
            Sense::Negative => Sense::Positive,
        }
    }
}

/// Boundary markers parsed from the input definition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfaceFlags {
    pub reflective: bool,
    pub vacuum: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// The two coordinate indices transverse to this axis, in order.
    #[inline]
    pub fn others(self) -> [usize; 2] {
        match self {
            Axis::X => [1, 2],
            Axis::Y => [0, 2],
            Axis::Z => [0, 1],
        }
    }
}

/// Surface kinds, dispatched by tag on the hot path. Coefficients are
/// stored inline per kind.
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceKind {
    /// px / py / pz: p_axis - d0
    PlaneOnAxis { axis: Axis, offset: f64 },
    /// p: n . p - d0
    Plane { normal: [f64; 3], offset: f64 },
    /// c/x, c/y, c/z: sum over transverse coordinates of (p_i - c_i)^2 - r^2.
    /// `center` holds the two transverse coordinates in axis order.
    CylinderOnAxis { axis: Axis, center: [f64; 2], radius: f64 },
    /// s, so: |p - c|^2 - r^2
    Sphere { center: [f64; 3], radius: f64 },
    /// sq: ax^2 + by^2 + cz^2 + 2(dxy + eyz + fzx) + 2(gx + hy + iz) + j
    Quadric { coefficients: [f64; 10] },
}

/// A surface of the problem geometry.
///
/// The scalar function partitions space into two half-spaces: positive sense
/// where the function is > 0, negative where it is < 0; the surface itself
/// is the zero set.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    pub user_id: String,
    pub internal_id: usize,
    pub flags: SurfaceFlags,
    pub kind: SurfaceKind,
}

impl Surface {
    /// Construct a surface from its parser tag and coefficient vector.
    ///
    /// Recognized tags: `px` `py` `pz` (1 coefficient), `p` (4),
    /// `c/x` `c/y` `c/z` (radius then the two transverse center
    /// coordinates), `s` (center then radius), `so` (radius, at origin),
    /// `sq` (10 coefficients).
    pub fn from_coefficients(
        tag: &str,
        user_id: impl Into<String>,
        coefficients: &[f64],
        flags: SurfaceFlags,
    ) -> Result<Self, HeliosError> {
        let user_id = user_id.into();
        let bad = |reason: &str| HeliosError::BadSurfaceCreation {
            user_id: user_id.clone(),
            reason: reason.to_string(),
        };

        let kind = match tag {
            "px" | "py" | "pz" => {
                if coefficients.len() != 1 {
                    return Err(bad("bad number of coefficients"));
                }
                let axis = match tag {
                    "px" => Axis::X,
                    "py" => Axis::Y,
                    _ => Axis::Z,
                };
                SurfaceKind::PlaneOnAxis {
                    axis,
                    offset: coefficients[0],
                }
            }
            "p" => {
                if coefficients.len() != 4 {
                    return Err(bad("bad number of coefficients"));
                }
                let normal = [coefficients[0], coefficients[1], coefficients[2]];
                if norm(normal) < COEFF_EPSILON {
                    return Err(bad("degenerate plane normal"));
                }
                SurfaceKind::Plane {
                    normal,
                    offset: coefficients[3],
                }
            }
            "c/x" | "c/y" | "c/z" => {
                if coefficients.len() != 3 {
                    return Err(bad("bad number of coefficients"));
                }
                if coefficients[0] <= 0.0 {
                    return Err(bad("cylinder radius must be positive"));
                }
                let axis = match tag {
                    "c/x" => Axis::X,
                    "c/y" => Axis::Y,
                    _ => Axis::Z,
                };
                SurfaceKind::CylinderOnAxis {
                    axis,
                    center: [coefficients[1], coefficients[2]],
                    radius: coefficients[0],
                }
            }
            "s" => {
                if coefficients.len() != 4 {
                    return Err(bad("bad number of coefficients"));
                }
                if coefficients[3] <= 0.0 {
                    return Err(bad("sphere radius must be positive"));
                }
                SurfaceKind::Sphere {
                    center: [coefficients[0], coefficients[1], coefficients[2]],
                    radius: coefficients[3],
                }
            }
            "so" => {
                if coefficients.len() != 1 {
                    return Err(bad("bad number of coefficients"));
                }
                if coefficients[0] <= 0.0 {
                    return Err(bad("sphere radius must be positive"));
                }
                SurfaceKind::Sphere {
                    center: [0.0, 0.0, 0.0],
                    radius: coefficients[0],
                }
            }
            "sq" => {
                if coefficients.len() != 10 {
                    return Err(bad("bad number of coefficients"));
                }
                let mut c = [0.0; 10];
                c.copy_from_slice(coefficients);
                SurfaceKind::Quadric { coefficients: c }
            }
            _ => return Err(bad("unknown surface kind")),
        };

        Ok(Surface {
            user_id,
            internal_id: 0,
            flags,
            kind,
        })
    }

    /// Parser tag for this surface kind. `so` is constructor sugar and
    /// normalizes to `s`.
    pub fn name(&self) -> &'static str {
        match &self.kind {
            SurfaceKind::PlaneOnAxis { axis: Axis::X, .. } => "px",
            SurfaceKind::PlaneOnAxis { axis: Axis::Y, .. } => "py",
            SurfaceKind::PlaneOnAxis { axis: Axis::Z, .. } => "pz",
            SurfaceKind::Plane { .. } => "p",
            SurfaceKind::CylinderOnAxis { axis: Axis::X, .. } => "c/x",
            SurfaceKind::CylinderOnAxis { axis: Axis::Y, .. } => "c/y",
            SurfaceKind::CylinderOnAxis { axis: Axis::Z, .. } => "c/z",
            SurfaceKind::Sphere { .. } => "s",
            SurfaceKind::Quadric { .. } => "sq",
        }
    }

    /// Evaluate the surface function at a point.
    pub fn function(&self, p: [f64; 3]) -> f64 {
        match &self.kind {
            SurfaceKind::PlaneOnAxis { axis, offset } => p[axis.index()] - offset,
            SurfaceKind::Plane { normal, offset } => dot(*normal, p) - offset,
            SurfaceKind::CylinderOnAxis {
                axis,
                center,
                radius,
            } => {
                let [i, j] = axis.others();
                let u = p[i] - center[0];
                let v = p[j] - center[1];
                u * u + v * v - radius * radius
            }
            SurfaceKind::Sphere { center, radius } => {
                let d = sub(p, *center);
                dot(d, d) - radius * radius
            }
            SurfaceKind::Quadric { coefficients: q } => {
                let [x, y, z] = p;
                q[0] * x * x
                    + q[1] * y * y
                    + q[2] * z * z
                    + 2.0 * (q[3] * x * y + q[4] * y * z + q[5] * z * x)
                    + 2.0 * (q[6] * x + q[7] * y + q[8] * z)
                    + q[9]
            }
        }
    }

    /// Which half-space the point is in.
    pub fn sense(&self, p: [f64; 3]) -> Sense {
        Sense::of(self.function(p))
    }

    /// Outward gradient at a point. Unit length for spheres and cylinders
    /// (divided by the radius); planes return the plane normal directly;
    /// quadrics return the raw gradient. Only the direction is load-bearing
    /// for the navigator.
    pub fn normal(&self, p: [f64; 3]) -> [f64; 3] {
        match &self.kind {
            SurfaceKind::PlaneOnAxis { axis, .. } => {
                let mut n = [0.0; 3];
                n[axis.index()] = 1.0;
                n
            }
            SurfaceKind::Plane { normal, .. } => *normal,
            SurfaceKind::CylinderOnAxis {
                axis,
                center,
                radius,
            } => {
                let [i, j] = axis.others();
                let mut n = [0.0; 3];
                n[i] = (p[i] - center[0]) / radius;
                n[j] = (p[j] - center[1]) / radius;
                n
            }
            SurfaceKind::Sphere { center, radius } => {
                let d = sub(p, *center);
                [d[0] / radius, d[1] / radius, d[2] / radius]
            }
            SurfaceKind::Quadric { coefficients: q } => {
                let [x, y, z] = p;
                [
                    2.0 * (q[0] * x + q[3] * y + q[5] * z + q[6]),
                    2.0 * (q[1] * y + q[3] * x + q[4] * z + q[7]),
                    2.0 * (q[2] * z + q[4] * y + q[5] * x + q[8]),
                ]
            }
        }
    }

    /// Forward distance along a unit direction to this surface.
    ///
    /// `sense` is the particle's current half-space with respect to this
    /// surface; for curved surfaces it selects which root of the quadratic
    /// is the next crossing. Returns None when no forward intersection
    /// exists.
    pub fn intersect(&self, p: [f64; 3], d: [f64; 3], sense: Sense) -> Option<f64> {
        self.intersect_with_tolerance(p, d, sense, SURFACE_TOLERANCE)
    }

    /// As [`Surface::intersect`], with an explicit on-surface tolerance.
    pub fn intersect_with_tolerance(
        &self,
        p: [f64; 3],
        d: [f64; 3],
        sense: Sense,
        tolerance: f64,
    ) -> Option<f64> {
        match &self.kind {
            SurfaceKind::PlaneOnAxis { axis, offset } => {
                plane_intersect(p[axis.index()] - offset, d[axis.index()])
            }
            SurfaceKind::Plane { normal, offset } => {
                plane_intersect(dot(*normal, p) - offset, dot(*normal, d))
            }
            SurfaceKind::CylinderOnAxis {
                axis,
                center,
                radius,
            } => {
                let [i, j] = axis.others();
                let u = p[i] - center[0];
                let v = p[j] - center[1];
                let a = 1.0 - d[axis.index()] * d[axis.index()];
                let k = d[i] * u + d[j] * v;
                let c = u * u + v * v - radius * radius;
                quadratic_intersect(a, k, c, sense, tolerance)
            }
            SurfaceKind::Sphere { center, radius } => {
                let t = sub(p, *center);
                let k = dot(d, t);
                let c = dot(t, t) - radius * radius;
                quadratic_intersect(1.0, k, c, sense, tolerance)
            }
            SurfaceKind::Quadric { coefficients: q } => {
                let [x, y, z] = p;
                let [dx, dy, dz] = d;
                let a = q[0] * dx * dx
                    + q[1] * dy * dy
                    + q[2] * dz * dz
                    + 2.0 * (q[3] * dx * dy + q[4] * dy * dz + q[5] * dz * dx);
                let k = q[0] * x * dx
                    + q[1] * y * dy
                    + q[2] * z * dz
                    + q[3] * (x * dy + y * dx)
                    + q[4] * (y * dz + z * dy)
                    + q[5] * (z * dx + x * dz)
                    + q[6] * dx
                    + q[7] * dy
                    + q[8] * dz;
                let c = self.function(p);
                quadratic_intersect(a, k, c, sense, tolerance)
            }
        }
    }

    /// A translated clone of this surface, sharing user id and flags.
    pub fn transformate(&self, translation: [f64; 3]) -> Surface {
        let kind = match &self.kind {
            SurfaceKind::PlaneOnAxis { axis, offset } => SurfaceKind::PlaneOnAxis {
                axis: *axis,
                offset: offset + translation[axis.index()],
            },
            SurfaceKind::Plane { normal, offset } => SurfaceKind::Plane {
                normal: *normal,
                offset: offset + dot(*normal, translation),
            },
            SurfaceKind::CylinderOnAxis {
                axis,
                center,
                radius,
            } => {
                let [i, j] = axis.others();
                SurfaceKind::CylinderOnAxis {
                    axis: *axis,
                    center: [center[0] + translation[i], center[1] + translation[j]],
                    radius: *radius,
                }
            }
            SurfaceKind::Sphere { center, radius } => SurfaceKind::Sphere {
                center: add(*center, translation),
                radius: *radius,
            },
            SurfaceKind::Quadric { coefficients: q } => {
                // f'(p) = f(p - T): the quadratic terms are unchanged, the
                // linear terms absorb the cross products, the constant
                // absorbs f evaluated at -T.
                let [tx, ty, tz] = translation;
                let mut c = *q;
                c[6] = q[6] - (q[0] * tx + q[3] * ty + q[5] * tz);
                c[7] = q[7] - (q[3] * tx + q[1] * ty + q[4] * tz);
                c[8] = q[8] - (q[5] * tx + q[4] * ty + q[2] * tz);
                c[9] = self.function([-tx, -ty, -tz]);
                SurfaceKind::Quadric { coefficients: c }
            }
        };
        Surface {
            user_id: self.user_id.clone(),
            internal_id: self.internal_id,
            flags: self.flags,
            kind,
        }
    }
}

// Distance to the plane f = 0 given f(p) and the directional derivative.
fn plane_intersect(f: f64, df: f64) -> Option<f64> {
    if df.abs() < COEFF_EPSILON {
        return None;
    }
    let t = -f / df;
    (t > 0.0).then_some(t)
}

/// Shared root selection for all quadric surfaces, solving
/// a t^2 + 2 k t + c = 0 for the next crossing.
///
/// With the particle inside the convex interior (negative sense), the next
/// crossing is the larger positive root. Outside (positive sense) it is the
/// smaller root, and a non-positive smaller root means the surface is behind
/// the particle. When |c| is below the surface tolerance the particle sits
/// on the surface: the root at the surface itself is skipped and the far
/// root is taken only when the motion points inward (d . grad f < 0).
pub fn quadratic_intersect(a: f64, k: f64, c: f64, sense: Sense, tolerance: f64) -> Option<f64> {
    if a.abs() < COEFF_EPSILON {
        // Degenerate linear equation 2 k t + c = 0
        if k.abs() < COEFF_EPSILON {
            return None;
        }
        let t = -c / (2.0 * k);
        return (t > 0.0).then_some(t);
    }

    let disc = k * k - a * c;
    if disc <= 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    let (t1, t2) = {
        let ra = (-k - sq) / a;
        let rb = (-k + sq) / a;
        if ra <= rb {
            (ra, rb)
        } else {
            (rb, ra)
        }
    };

    if c.abs() < tolerance {
        // On the surface: k carries the sign of d . grad f.
        return if k < 0.0 { (t2 > 0.0).then_some(t2) } else { None };
    }

    match sense {
        Sense::Negative => (t2 > 0.0).then_some(t2),
        Sense::Positive => (t1 > 0.0).then_some(t1),
    }
}

#[inline]
pub(crate) fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub(crate) fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub(crate) fn add(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// Euclidean length of a vector.
#[inline]
pub fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}
