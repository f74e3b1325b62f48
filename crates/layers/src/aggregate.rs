use catalog::{Descriptor, LoadState};
use serde::Serialize;

/// A layer whose state is not driven by the descriptor list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalUnit {
    pub name: String,
    pub visible: bool,
    pub load_state: LoadState,
}

impl ExternalUnit {
    pub fn new(name: impl Into<String>, visible: bool, load_state: LoadState) -> Self {
        Self {
            name: name.into(),
            visible,
            load_state,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LoadingSummary {
    pub overall_loading: bool,
    /// Settled share of requested units, rounded down. 100 when nothing is
    /// requested.
    pub progress_percent: u8,
    pub loaded_count: usize,
    pub errored_count: usize,
    /// Requested units (`Loading`, `Loaded` or `Errored`).
    pub total: usize,
}

/// Active descriptors and visible external units participate; `Idle` units
/// are not requested and stay out of the denominator. Errored units count as
/// settled, so progress reaches 100 even with permanent failures.
pub fn aggregate(descriptors: &[Descriptor], external: &[ExternalUnit]) -> LoadingSummary {
    let states = descriptors
        .iter()
        .filter(|d| d.active)
        .map(|d| d.status.load_state)
        .chain(external.iter().filter(|u| u.visible).map(|u| u.load_state))
        .filter(|s| s.is_requested());

    let mut summary = LoadingSummary::default();
    let mut settled = 0usize;
    for state in states {
        summary.total += 1;
        match state {
            LoadState::Loading => summary.overall_loading = true,
            LoadState::Loaded => summary.loaded_count += 1,
            LoadState::Errored => summary.errored_count += 1,
            LoadState::Idle => {}
        }
        if state.is_settled() {
            settled += 1;
        }
    }

    summary.progress_percent = if summary.total == 0 {
        100
    } else {
        (settled * 100 / summary.total) as u8
    };
    summary
}

#[cfg(test)]
mod tests {
    use catalog::{Descriptor, LayerKind, LoadState};

    use super::{ExternalUnit, aggregate};

    fn unit(name: &str, state: LoadState, active: bool) -> Descriptor {
        let mut d = Descriptor::new(name, LayerKind::Parcels, "http://x").with_active(active);
        d.status.load_state = state;
        d
    }

    #[test]
    fn nothing_requested_is_complete() {
        let s = aggregate(&[], &[]);
        assert_eq!(s.progress_percent, 100);
        assert!(!s.overall_loading);

        let idle = aggregate(&[unit("a", LoadState::Idle, true)], &[]);
        assert_eq!(idle.progress_percent, 100);
        assert_eq!(idle.total, 0);
    }

    #[test]
    fn inactive_and_hidden_units_are_ignored() {
        let s = aggregate(
            &[unit("a", LoadState::Loading, false)],
            &[ExternalUnit::new("roads", false, LoadState::Loading)],
        );
        assert_eq!(s.total, 0);
        assert!(!s.overall_loading);
    }

    #[test]
    fn errored_units_settle_progress() {
        let s = aggregate(
            &[
                unit("a", LoadState::Loaded, true),
                unit("b", LoadState::Errored, true),
                unit("c", LoadState::Loading, true),
            ],
            &[ExternalUnit::new("water", true, LoadState::Loaded)],
        );
        assert!(s.overall_loading);
        assert_eq!(s.total, 4);
        assert_eq!(s.loaded_count, 2);
        assert_eq!(s.errored_count, 1);
        assert_eq!(s.progress_percent, 75);
    }

    #[test]
    fn progress_never_decreases_as_units_settle() {
        let mut units: Vec<_> = (0..7)
            .map(|i| unit(&format!("d{i}"), LoadState::Loading, true))
            .collect();
        let mut last = aggregate(&units, &[]).progress_percent;
        assert_eq!(last, 0);
        for i in 0..units.len() {
            units[i].status.load_state = if i % 3 == 0 {
                LoadState::Errored
            } else {
                LoadState::Loaded
            };
            let now = aggregate(&units, &[]).progress_percent;
            assert!(now >= last);
            last = now;
        }
        assert_eq!(last, 100);
        assert!(!aggregate(&units, &[]).overall_loading);
    }
}
