/// Failure codes recorded on a particle when a history dies abnormally.
/// The history terminates but the simulation continues.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureCode {
    /// The navigator lost the particle (no cell found at its position).
    LostInGeometry,
    /// The history exceeded the configured step limit.
    MaxStepsExceeded,
}

#[derive(Clone, Debug)]
pub struct Particle {
    pub position: [f64; 3],
    pub direction: [f64; 3],
    pub energy: f64,
    pub weight: f64,
    pub alive: bool,
    /// History index, for reproducible per-history RNG streams.
    pub history: u64,
    pub failure: Option<FailureCode>,
}

impl Particle {
    pub fn new(position: [f64; 3], direction: [f64; 3], energy: f64) -> Self {
        Self {
            position,
            direction,
            energy,
            weight: 1.0,
            alive: true,
            history: 0,
            failure: None,
        }
    }

    /// Move the particle along its current direction by the given distance.
    pub fn move_by(&mut self, distance: f64) {
        for i in 0..3 {
            self.position[i] += self.direction[i] * distance;
        }
    }

    /// Terminate the history abnormally.
    pub fn fail(&mut self, code: FailureCode) {
        self.failure = Some(code);
        self.alive = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_particle_construction() {
        let p = Particle::new([0.0, 1.0, 2.0], [1.0, 0.0, 0.0], 1e6);
        assert_eq!(p.position, [0.0, 1.0, 2.0]);
        assert_eq!(p.direction, [1.0, 0.0, 0.0]);
        assert_eq!(p.energy, 1e6);
        assert_eq!(p.weight, 1.0);
        assert!(p.alive);
        assert_eq!(p.failure, None);
    }

    #[test]
    fn test_particle_move_by() {
        let mut p = Particle::new([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], 1e6);

        p.move_by(2.0);
        assert_eq!(p.position, [2.0, 0.0, 0.0]);

        p.move_by(1.5);
        assert_eq!(p.position, [3.5, 0.0, 0.0]);

        let sqrt_2_inv = 1.0 / 2.0_f64.sqrt();
        let mut p2 = Particle::new([0.0, 0.0, 0.0], [sqrt_2_inv, sqrt_2_inv, 0.0], 1e6);
        p2.move_by(2.0_f64.sqrt());
        assert!((p2.position[0] - 1.0).abs() < 1e-10);
        assert!((p2.position[1] - 1.0).abs() < 1e-10);
        assert_eq!(p2.position[2], 0.0);
    }

    #[test]
    fn test_particle_failure() {
        let mut p = Particle::new([0.0; 3], [0.0, 0.0, 1.0], 1.0);
        p.fail(FailureCode::LostInGeometry);
        assert!(!p.alive);
        assert_eq!(p.failure, Some(FailureCode::LostInGeometry));
    }
}
