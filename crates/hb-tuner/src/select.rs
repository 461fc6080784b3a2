//! Top-k culling.

use hb_types::{invalid_argument, HbResult};
use std::cmp::Ordering;

/// Return the `k` configurations with the lowest losses, ordered by loss.
///
/// Uses a partial selection (`select_nth_unstable_by`) and only sorts the
/// kept prefix. Ties are broken by position in the input, so the result is
/// deterministic. The inputs are not modified.
pub fn select_top_k<C: Clone>(
    configs: &[C],
    losses: &[f64],
    k: usize,
) -> HbResult<(Vec<C>, Vec<f64>)> {
    if configs.len() != losses.len() {
        return Err(invalid_argument!(
            "got {} configurations but {} losses",
            configs.len(),
            losses.len()
        ));
    }
    if k < 1 || k > configs.len() {
        return Err(invalid_argument!(
            "k is {k}, but it must be in 1..={}",
            configs.len()
        ));
    }

    let by_loss = |a: &usize, b: &usize| -> Ordering {
        losses[*a].total_cmp(&losses[*b]).then(a.cmp(b))
    };

    let mut order: Vec<usize> = (0..configs.len()).collect();
    if k < order.len() {
        order.select_nth_unstable_by(k - 1, by_loss);
        order.truncate(k);
    }
    order.sort_unstable_by(by_loss);

    let kept_configs = order.iter().map(|&i| configs[i].clone()).collect();
    let kept_losses = order.iter().map(|&i| losses[i]).collect();
    Ok((kept_configs, kept_losses))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_types::HbError;

    fn brute_force(configs: &[u32], losses: &[f64], k: usize) -> Vec<f64> {
        let mut pairs: Vec<(f64, u32)> =
            losses.iter().copied().zip(configs.iter().copied()).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        pairs.into_iter().take(k).map(|(l, _)| l).collect()
    }

    #[test]
    fn matches_full_sort_for_every_k() {
        let configs: Vec<u32> = (0..12).collect();
        let losses = vec![5.0, 0.5, 9.0, 3.5, 7.25, 1.0, 8.0, 2.0, 6.5, 4.0, 0.75, 11.0];

        for k in 1..=configs.len() {
            let (kept, kept_losses) = select_top_k(&configs, &losses, k).unwrap();
            assert_eq!(kept.len(), k);
            assert_eq!(kept_losses, brute_force(&configs, &losses, k), "k = {k}");
            for (config, loss) in kept.iter().zip(&kept_losses) {
                assert_eq!(losses[*config as usize], *loss);
            }
        }
    }

    #[test]
    fn full_selection_returns_everything_sorted() {
        let configs = vec!["a", "b", "c", "d"];
        let losses = vec![3.0, 1.0, 4.0, 2.0];
        let (kept, kept_losses) = select_top_k(&configs, &losses, 4).unwrap();
        assert_eq!(kept, vec!["b", "d", "a", "c"]);
        assert_eq!(kept_losses, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn ties_keep_first_occurrence() {
        let configs = vec!["first", "second", "third", "fourth"];
        let losses = vec![1.0, 0.5, 1.0, 1.0];
        let (kept, _) = select_top_k(&configs, &losses, 2).unwrap();
        assert_eq!(kept, vec!["second", "first"]);

        let (kept, _) = select_top_k(&configs, &losses, 3).unwrap();
        assert_eq!(kept, vec!["second", "first", "third"]);
    }

    #[test]
    fn inputs_are_untouched() {
        let configs = vec![3, 1, 2];
        let losses = vec![3.0, 1.0, 2.0];
        let _ = select_top_k(&configs, &losses, 1).unwrap();
        assert_eq!(configs, vec![3, 1, 2]);
        assert_eq!(losses, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn rejects_out_of_range_k() {
        let configs = vec![1, 2];
        let losses = vec![1.0, 2.0];
        assert!(matches!(
            select_top_k(&configs, &losses, 0),
            Err(HbError::InvalidArgument(_))
        ));
        assert!(matches!(
            select_top_k(&configs, &losses, 3),
            Err(HbError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let configs = vec![1, 2, 3];
        let losses = vec![1.0, 2.0];
        assert!(matches!(
            select_top_k(&configs, &losses, 1),
            Err(HbError::InvalidArgument(_))
        ));
    }
}
