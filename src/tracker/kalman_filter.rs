//! Kalman filter for point tracking using ndarray and a nalgebra-based inverse.
//!
//! State is `[x, y, vx, vy]` with a constant-velocity transition at
//! `dt = 1` frame; the measurement is the observed `[x, y]` position.

use ndarray::{Array1, Array2};

/// Noise and initialization parameters for the point filter.
#[derive(Debug, Clone)]
pub struct KalmanConfig {
    /// Process noise variance on the position components.
    pub process_noise_position: f64,
    /// Process noise variance on the velocity components.
    pub process_noise_velocity: f64,
    /// Measurement noise variance on observed positions.
    pub measurement_variance: f64,
    /// Initial position variance for a freshly created track.
    pub initial_position_variance: f64,
    /// Initial velocity variance; inflated since new tracks start with
    /// zero velocity.
    pub initial_velocity_variance: f64,
    /// Upper bound on any diagonal covariance entry, clamping blow-up
    /// over long missed-detection runs.
    pub max_variance: f64,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            process_noise_position: 1.0,
            process_noise_velocity: 0.1,
            measurement_variance: 4.0,
            initial_position_variance: 1.0,
            initial_velocity_variance: 10.0,
            max_variance: 1e4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: Array2<f64>,
    update_mat: Array2<f64>,
    process_noise: Array2<f64>,
    measurement_variance: f64,
    config: KalmanConfig,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new(KalmanConfig::default())
    }
}

impl KalmanFilter {
    pub fn new(config: KalmanConfig) -> Self {
        let ndim = 2;
        let mut motion_mat = Array2::eye(2 * ndim);
        for i in 0..ndim {
            motion_mat[[i, ndim + i]] = 1.0;
        }

        let mut update_mat = Array2::zeros((ndim, 2 * ndim));
        for i in 0..ndim {
            update_mat[[i, i]] = 1.0;
        }

        let mut process_noise = Array2::zeros((2 * ndim, 2 * ndim));
        for i in 0..ndim {
            process_noise[[i, i]] = config.process_noise_position;
            process_noise[[ndim + i, ndim + i]] = config.process_noise_velocity;
        }

        Self {
            motion_mat,
            update_mat,
            process_noise,
            measurement_variance: config.measurement_variance,
            config,
        }
    }

    /// Create state mean and covariance from a first measurement.
    ///
    /// Velocity starts at zero with inflated uncertainty.
    pub fn initiate(&self, measurement: [f64; 2]) -> (Array1<f64>, Array2<f64>) {
        let mut mean = Array1::zeros(4);
        mean[0] = measurement[0];
        mean[1] = measurement[1];

        let mut cov = Array2::zeros((4, 4));
        cov[[0, 0]] = self.config.initial_position_variance;
        cov[[1, 1]] = self.config.initial_position_variance;
        cov[[2, 2]] = self.config.initial_velocity_variance;
        cov[[3, 3]] = self.config.initial_velocity_variance;

        (mean, cov)
    }

    /// Advance the state one frame under the constant-velocity model.
    pub fn predict(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let new_mean = self.motion_mat.dot(mean);
        let mut new_covariance =
            self.motion_mat.dot(covariance).dot(&self.motion_mat.t()) + &self.process_noise;
        self.regularize(&mut new_covariance);

        (new_mean, new_covariance)
    }

    /// Project state into measurement space: `(H x, H P H^T + R)`.
    pub fn project(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let mut innovation_cov = Array2::zeros((2, 2));
        innovation_cov[[0, 0]] = self.measurement_variance;
        innovation_cov[[1, 1]] = self.measurement_variance;

        let mean_proj = self.update_mat.dot(mean);
        let covariance_proj =
            self.update_mat.dot(covariance).dot(&self.update_mat.t()) + innovation_cov;

        (mean_proj, covariance_proj)
    }

    /// Apply the measurement update for an observed position.
    pub fn update(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: [f64; 2],
    ) -> (Array1<f64>, Array2<f64>) {
        let (projected_mean, projected_cov) = self.project(mean, covariance);

        let measurement_arr = Array1::from_vec(measurement.to_vec());
        let innovation = measurement_arr - projected_mean;

        // K = P * H^T * S^-1
        // H is [I 0], so P * H^T is the first 2 columns of P (4x2).
        // S is projected_cov (2x2), invertible since R > 0.
        let s_inv = self.invert_2x2(&projected_cov);

        let pht = covariance.dot(&self.update_mat.t()); // 4x2
        let kalman_gain = pht.dot(&s_inv); // 4x2

        let new_mean = mean + kalman_gain.dot(&innovation);
        let mut new_covariance = covariance - kalman_gain.dot(&projected_cov).dot(&kalman_gain.t());
        self.regularize(&mut new_covariance);

        (new_mean, new_covariance)
    }

    /// Restore symmetry and clamp diagonal growth after a predict/update.
    fn regularize(&self, covariance: &mut Array2<f64>) {
        let transposed = covariance.t().to_owned();
        *covariance += &transposed;
        *covariance *= 0.5;

        for i in 0..4 {
            if covariance[[i, i]] > self.config.max_variance {
                covariance[[i, i]] = self.config.max_variance;
            }
        }
    }

    /// Helper to invert a 2x2 matrix using nalgebra (pure Rust).
    fn invert_2x2(&self, m: &Array2<f64>) -> Array2<f64> {
        let nm = nalgebra::Matrix2::new(m[[0, 0]], m[[0, 1]], m[[1, 0]], m[[1, 1]]);
        let inv = nm.try_inverse().expect("2x2 innovation inversion failed");
        let mut res = Array2::zeros((2, 2));
        for i in 0..2 {
            for j in 0..2 {
                res[[i, j]] = inv[(i, j)];
            }
        }
        res
    }
}
