//! Threshold-exceedance run detection for a single grid cell.

/// One surviving exceedance run. Indices are inclusive; `time_start` and
/// `time_end` are the time-axis values of the first and last exceeding day.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EventSpan {
    pub start_index: usize,
    pub end_index: usize,
    pub time_start: f64,
    pub time_end: f64,
}

impl EventSpan {
    pub fn len(&self) -> usize {
        self.end_index - self.start_index + 1
    }
}

/// `value > threshold`, strictly; NaN on either side never exceeds.
pub fn exceedance_mask(values: &[f64], threshold: &[f64]) -> Vec<bool> {
    values
        .iter()
        .zip(threshold)
        .map(|(&v, &thr)| v > thr)
        .collect()
}

/// Maximal runs of `true`, as inclusive `(start, end)` index pairs.
pub fn label_runs(mask: &[bool]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start: Option<usize> = None;
    for (i, &on) in mask.iter().enumerate() {
        match (on, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((s, i - 1));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, mask.len() - 1));
    }
    runs
}

/// Detect heatwave events in one cell's series.
///
/// `values`, `threshold` and `time` must have equal length; runs shorter
/// than `min_duration` days are dropped.
pub fn detect_events(
    values: &[f64],
    threshold: &[f64],
    time: &[f64],
    min_duration: usize,
) -> Vec<EventSpan> {
    let mask = exceedance_mask(values, threshold);
    label_runs(&mask)
        .into_iter()
        .filter(|(s, e)| e - s + 1 >= min_duration)
        .map(|(s, e)| EventSpan {
            start_index: s,
            end_index: e,
            time_start: time[s],
            time_end: time[e],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_time(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn single_run_of_five() {
        let values = [0.0, 0.0, 0.0, 5.0, 5.0, 5.0, 5.0, 5.0, 0.0, 0.0];
        let thr = [1.0; 10];
        let events = detect_events(&values, &thr, &index_time(10), 5);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start_index, 3);
        assert_eq!(events[0].end_index, 7);
        assert_eq!(events[0].len(), 5);

        assert!(detect_events(&values, &thr, &index_time(10), 6).is_empty());
    }

    #[test]
    fn times_come_from_the_time_axis() {
        let values = [2.0; 6];
        let thr = [1.0; 6];
        let time = [100.5, 101.5, 102.5, 103.5, 104.5, 105.5];
        let events = detect_events(&values, &thr, &time, 5);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].time_start, 100.5);
        assert_eq!(events[0].time_end, 105.5);
    }

    #[test]
    fn ties_and_nan_do_not_exceed() {
        let values = [1.0, 2.0, f64::NAN, 2.0];
        let thr = [1.0, f64::NAN, 0.0, 1.0];
        assert_eq!(exceedance_mask(&values, &thr), vec![false, false, false, true]);
    }

    #[test]
    fn runs_at_both_edges() {
        let mask = [true, true, false, false, true, false, true, true, true];
        assert_eq!(label_runs(&mask), vec![(0, 1), (4, 4), (6, 8)]);
        assert!(label_runs(&[]).is_empty());
        assert!(label_runs(&[false, false]).is_empty());
    }

    #[test]
    fn short_runs_are_dropped_and_long_ones_kept() {
        let mut values = vec![0.0; 30];
        for v in &mut values[2..6] {
            *v = 3.0;
        }
        for v in &mut values[10..20] {
            *v = 3.0;
        }
        let thr = vec![1.0; 30];
        let events = detect_events(&values, &thr, &index_time(30), 5);
        assert_eq!(events.len(), 1);
        assert_eq!((events[0].start_index, events[0].end_index), (10, 19));
    }
}
