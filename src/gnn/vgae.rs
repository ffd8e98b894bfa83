//! VGAE objective: reparameterization, inner-product decoder, losses.

use crate::gnn::encoder::LatentParams;
use ndarray::{Array2, Axis, Zip};
use rand::Rng;
use rand_distr::StandardNormal;

/// Added inside logarithms of the reconstruction loss.
pub const EPS: f64 = 1e-15;

/// Numerically stable logistic function.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Sample z = mean + eps * exp(0.5 * logvar). Returns z and the noise used.
pub fn reparameterize<R: Rng + ?Sized>(params: &LatentParams, rng: &mut R) -> (Array2<f64>, Array2<f64>) {
    let noise = Array2::from_shape_fn(params.mean.dim(), |_| rng.sample::<f64, _>(StandardNormal));
    let z = Zip::from(&params.mean)
        .and(&params.logvar)
        .and(&noise)
        .map_collect(|m, lv, e| m + e * (0.5 * lv).exp());
    (z, noise)
}

/// Map dL/dz back to dL/dmean and dL/dlogvar.
pub fn reparameterize_backward(
    params: &LatentParams,
    noise: &Array2<f64>,
    grad_z: &Array2<f64>,
) -> (Array2<f64>, Array2<f64>) {
    let grad_logvar = Zip::from(grad_z)
        .and(noise)
        .and(&params.logvar)
        .map_collect(|g, e, lv| g * e * 0.5 * (0.5 * lv).exp());
    (grad_z.clone(), grad_logvar)
}

/// Inner-product logits z_s . z_t for each pair.
pub fn decode(z: &Array2<f64>, pairs: &[(usize, usize)]) -> Vec<f64> {
    pairs.iter().map(|&(s, t)| z.row(s).dot(&z.row(t))).collect()
}

/// sigma(Z Zᵗ)
pub fn probability_matrix(z: &Array2<f64>) -> Array2<f64> {
    z.dot(&z.t()).mapv(sigmoid)
}

/// Binary cross-entropy over positive and negative pairs and its gradient
/// with respect to z.
///
/// Each side is averaged over its own pairs; an empty side contributes zero.
pub fn recon_loss(z: &Array2<f64>, positive: &[(usize, usize)], negative: &[(usize, usize)]) -> (f64, Array2<f64>) {
    let mut grad = Array2::zeros(z.dim());
    let mut loss = 0.0;

    let mut side = |pairs: &[(usize, usize)], is_positive: bool| {
        if pairs.is_empty() {
            return;
        }
        let n = pairs.len() as f64;
        for (&(s, t), logit) in pairs.iter().zip(decode(z, pairs)) {
            let p = sigmoid(logit);
            let (term, d_logit) = if is_positive {
                (-(p + EPS).ln(), -p * (1.0 - p) / (p + EPS))
            } else {
                (-(1.0 - p + EPS).ln(), p * (1.0 - p) / (1.0 - p + EPS))
            };
            loss += term / n;
            let d = d_logit / n;
            let zs = z.row(s).to_owned();
            let zt = z.row(t).to_owned();
            grad.row_mut(s).scaled_add(d, &zt);
            grad.row_mut(t).scaled_add(d, &zs);
        }
    };
    side(positive, true);
    side(negative, false);

    (loss, grad)
}

/// KL divergence to the standard normal, averaged over nodes and scaled by
/// 1/N, with gradients for mean and logvar.
pub fn kl_divergence(params: &LatentParams) -> (f64, Array2<f64>, Array2<f64>) {
    let n = params.mean.nrows();
    if n == 0 {
        return (0.0, params.mean.clone(), params.logvar.clone());
    }
    let n = n as f64;

    let per_node = Zip::from(&params.mean)
        .and(&params.logvar)
        .map_collect(|m, lv| 1.0 + lv - m * m - lv.exp())
        .sum_axis(Axis(1));
    let kl = -0.5 * per_node.mean().unwrap_or(0.0) / n;

    let scale = 1.0 / (n * n);
    let grad_mean = params.mean.mapv(|m| m * scale);
    let grad_logvar = params.logvar.mapv(|lv| -0.5 * (1.0 - lv.exp()) * scale);

    (kl, grad_mean, grad_logvar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sigmoid() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_kl_zero_at_prior() {
        let params = LatentParams {
            mean: Array2::zeros((4, 3)),
            logvar: Array2::zeros((4, 3)),
        };
        let (kl, gm, gl) = kl_divergence(&params);
        assert!(kl.abs() < 1e-12);
        assert!(gm.iter().all(|g| *g == 0.0));
        assert!(gl.iter().all(|g| g.abs() < 1e-12));
    }

    #[test]
    fn test_kl_gradient_matches_finite_difference() {
        let params = LatentParams {
            mean: arr2(&[[0.3, -0.4], [1.1, 0.2]]),
            logvar: arr2(&[[-0.2, 0.5], [0.1, -1.0]]),
        };
        let (kl, gm, gl) = kl_divergence(&params);
        let h = 1e-7;

        let mut bumped = params.clone();
        bumped.mean[[1, 0]] += h;
        assert!(((kl_divergence(&bumped).0 - kl) / h - gm[[1, 0]]).abs() < 1e-5);

        let mut bumped = params.clone();
        bumped.logvar[[0, 1]] += h;
        assert!(((kl_divergence(&bumped).0 - kl) / h - gl[[0, 1]]).abs() < 1e-5);
    }

    #[test]
    fn test_recon_gradient_matches_finite_difference() {
        let z = arr2(&[[0.5, -0.1], [0.2, 0.4], [-0.3, 0.7]]);
        let pos = [(0, 1), (1, 2)];
        let neg = [(2, 0)];
        let (loss, grad) = recon_loss(&z, &pos, &neg);
        assert!(loss > 0.0);

        let h = 1e-7;
        for (r, c) in [(0, 0), (1, 1), (2, 0)] {
            let mut bumped = z.clone();
            bumped[[r, c]] += h;
            let numeric = (recon_loss(&bumped, &pos, &neg).0 - loss) / h;
            assert!((numeric - grad[[r, c]]).abs() < 1e-5, "z[{},{}]", r, c);
        }
    }

    #[test]
    fn test_recon_self_pair_gradient() {
        // s == t contributes twice through the same row
        let z = arr2(&[[0.4, 0.2]]);
        let (loss, grad) = recon_loss(&z, &[(0, 0)], &[]);
        let h = 1e-7;
        let mut bumped = z.clone();
        bumped[[0, 1]] += h;
        let numeric = (recon_loss(&bumped, &[(0, 0)], &[]).0 - loss) / h;
        assert!((numeric - grad[[0, 1]]).abs() < 1e-5);
    }

    #[test]
    fn test_reparameterize_backward() {
        let mut rng = StdRng::seed_from_u64(9);
        let params = LatentParams {
            mean: arr2(&[[0.1, 0.2]]),
            logvar: arr2(&[[0.3, -0.6]]),
        };
        let (z, noise) = reparameterize(&params, &mut rng);
        let expected = 0.2 + noise[[0, 1]] * (-0.3_f64).exp();
        assert!((z[[0, 1]] - expected).abs() < 1e-12);

        let grad_z = arr2(&[[1.0, 1.0]]);
        let (gm, gl) = reparameterize_backward(&params, &noise, &grad_z);
        assert_eq!(gm, grad_z);
        let expected = noise[[0, 0]] * 0.5 * (0.15_f64).exp();
        assert!((gl[[0, 0]] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_probability_matrix() {
        let z = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
        let p = probability_matrix(&z);
        assert!((p[[0, 1]] - 0.5).abs() < 1e-12);
        assert!((p[[0, 0]] - sigmoid(1.0)).abs() < 1e-12);
        assert_eq!(decode(&z, &[(0, 0), (0, 1)]), vec![1.0, 0.0]);
    }
}
