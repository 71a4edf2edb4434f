//! Tally policy: which record flags turn the light on.

/// Record flags reported by Ardour.
///
/// Both start `false` and are reset to `false` whenever the peer is lost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TallyState {
    /// Global record enable (`/rec_enable_toggle`)
    pub master_record: bool,
    /// At least one track armed and recording (`/record_tally`)
    pub track_record: bool,
}

impl TallyState {
    pub fn new(master_record: bool, track_record: bool) -> Self {
        Self {
            master_record,
            track_record,
        }
    }

    /// Force both flags off.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// How the two record flags combine into the light decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CombinationMode {
    /// Light follows master record only
    Master,
    /// Light follows the track record tally only
    Track,
    /// Light is on only while both are on
    #[default]
    Both,
}

impl CombinationMode {
    /// Decide the light state for `state`.
    pub fn decide(self, state: TallyState) -> bool {
        decide(state, self)
    }
}

impl std::fmt::Display for CombinationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Master => write!(f, "master"),
            Self::Track => write!(f, "track"),
            Self::Both => write!(f, "both"),
        }
    }
}

/// The only place the light state is derived from.
pub fn decide(state: TallyState, mode: CombinationMode) -> bool {
    match mode {
        CombinationMode::Master => state.master_record,
        CombinationMode::Track => state.track_record,
        CombinationMode::Both => state.master_record && state.track_record,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truth_table() {
        use CombinationMode::*;

        let cases = [
            (false, false, Master, false),
            (false, true, Master, false),
            (true, false, Master, true),
            (true, true, Master, true),
            (false, false, Track, false),
            (false, true, Track, true),
            (true, false, Track, false),
            (true, true, Track, true),
            (false, false, Both, false),
            (false, true, Both, false),
            (true, false, Both, false),
            (true, true, Both, true),
        ];

        for (master, track, mode, expected) in cases {
            let state = TallyState::new(master, track);
            assert_eq!(
                decide(state, mode),
                expected,
                "master={} track={} mode={}",
                master,
                track,
                mode
            );
            assert_eq!(mode.decide(state), expected);
        }
    }

    #[test]
    fn test_clear() {
        let mut state = TallyState::new(true, true);
        state.clear();
        assert_eq!(state, TallyState::default());
        assert!(!state.master_record && !state.track_record);
    }

    #[test]
    fn test_default_mode_is_both() {
        assert_eq!(CombinationMode::default(), CombinationMode::Both);
    }
}
