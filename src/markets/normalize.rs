use crate::markets::types::OutcomeOption;

pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        clamp(value, 0.0, 1.0)
    } else {
        0.0
    }
}

/// Rescale outcome probabilities so they sum to exactly 1 after rounding.
///
/// Every entry but the last is rounded to two decimals; the last takes the
/// remainder. A set with no positive mass is split into equal rounded
/// shares with the rounding residue on the last entry, so three outcomes
/// come out as `0.33 / 0.33 / 0.34` rather than three equal thirds. Output
/// values always lie in `[0, 1]`.
pub fn normalize_probabilities(outcomes: Vec<OutcomeOption>) -> Vec<OutcomeOption> {
    if outcomes.is_empty() {
        return outcomes;
    }

    let clamped: Vec<f64> = outcomes.iter().map(|o| clamp_unit(o.probability)).collect();
    let sum: f64 = clamped.iter().sum();
    let count = outcomes.len();
    let last = count - 1;

    let mut used = 0.0;
    outcomes
        .into_iter()
        .enumerate()
        .map(|(idx, outcome)| {
            let probability = if idx < last {
                let share = if sum <= 0.0 {
                    round2(1.0 / count as f64)
                } else {
                    round2(clamped[idx] / sum)
                };
                // Rounding up must not push the running total past 1.
                let share = share.min(round2(1.0 - used).max(0.0));
                used += share;
                share
            } else {
                clamp_unit(round2(1.0 - used))
            };
            OutcomeOption {
                label: outcome.label,
                probability,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probs(outcomes: &[OutcomeOption]) -> Vec<f64> {
        outcomes.iter().map(|o| o.probability).collect()
    }

    fn set(values: &[f64]) -> Vec<OutcomeOption> {
        values
            .iter()
            .enumerate()
            .map(|(i, p)| OutcomeOption::new(format!("o{i}"), *p))
            .collect()
    }

    fn assert_valid(outcomes: &[OutcomeOption]) {
        let sum: f64 = outcomes.iter().map(|o| o.probability).sum();
        assert!((sum - 1.0).abs() <= 0.01, "sum={sum} {outcomes:?}");
        for o in outcomes {
            assert!((0.0..=1.0).contains(&o.probability), "{o:?}");
        }
    }

    #[test]
    fn yes_no_pair_rescales_against_fixed_no() {
        let out = normalize_probabilities(set(&[0.5, 1.0]));
        assert_eq!(probs(&out), vec![0.33, 0.67]);
    }

    #[test]
    fn last_entry_absorbs_rounding_remainder() {
        let out = normalize_probabilities(set(&[0.2, 0.4, 0.4]));
        assert_eq!(probs(&out), vec![0.2, 0.4, 0.4]);
        let out = normalize_probabilities(set(&[1.0, 1.0, 1.0]));
        assert_eq!(probs(&out), vec![0.33, 0.33, 0.34]);
    }

    #[test]
    fn zero_mass_splits_evenly() {
        let out = normalize_probabilities(set(&[0.0, -2.0, 0.0, 0.0]));
        assert_eq!(probs(&out), vec![0.25, 0.25, 0.25, 0.25]);
        let out = normalize_probabilities(set(&[0.0, 0.0, 0.0]));
        assert_eq!(probs(&out), vec![0.33, 0.33, 0.34]);
        let out = normalize_probabilities(set(&[0.0; 7]));
        assert_valid(&out);
    }

    #[test]
    fn out_of_range_and_non_finite_values_are_clamped() {
        let out = normalize_probabilities(set(&[3.0, f64::NAN, 1.0]));
        assert_valid(&out);
        assert_eq!(probs(&out), vec![0.5, 0.0, 0.5]);
    }

    #[test]
    fn arbitrary_sets_stay_within_tolerance() {
        let samples: [&[f64]; 6] = [
            &[0.125, 0.875, 0.0],
            &[0.01, 0.01, 0.01, 0.01, 0.01, 0.01],
            &[0.45, 0.33, 0.22],
            &[0.9, 0.05],
            &[0.3333, 0.3333, 0.3334],
            &[0.7],
        ];
        for sample in samples {
            assert_valid(&normalize_probabilities(set(sample)));
        }
    }

    #[test]
    fn empty_set_is_returned_unchanged() {
        assert!(normalize_probabilities(Vec::new()).is_empty());
    }
}
