use crate::timeline::{PhaseTag, ThinkTimelineEvent, Timeline, TOTAL_MS};

/// Virtual playback clock in timeline milliseconds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackClock {
    pub time_ms: u32,
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        self.time_ms = 0;
    }

    pub fn advance(&mut self, delta_ms: u32) {
        self.time_ms = self.time_ms.saturating_add(delta_ms);
    }

    pub fn seek(&mut self, ms: u32) {
        self.time_ms = ms;
    }
}

/// Returns the event active at `ms`, moving `index` from its last position.
///
/// Forward playback costs amortized O(1); a seek costs the number of events
/// scrubbed over. The answer always matches a linear scan.
pub fn find_current_event_o1<'a>(
    events: &'a [ThinkTimelineEvent],
    ms: u32,
    index: &mut usize,
) -> Option<&'a ThinkTimelineEvent> {
    if events.is_empty() {
        *index = 0;
        return None;
    }
    if *index >= events.len() {
        *index = events.len() - 1;
    }
    while *index > 0 && events[*index].t0 > ms {
        *index -= 1;
    }
    while *index + 1 < events.len() && events[*index + 1].t0 <= ms {
        *index += 1;
    }
    let event = &events[*index];
    event.contains(ms).then_some(event)
}

/// Cursor state for [`find_current_event_o1`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackCursor {
    index: usize,
}

impl PlaybackCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn find<'a>(&mut self, timeline: &'a Timeline, ms: u32) -> Option<&'a ThinkTimelineEvent> {
        find_current_event_o1(timeline.events(), ms, &mut self.index)
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }
}

/// Playback session over one timeline.
///
/// Until assets are marked ready the clock holds on the last millisecond of
/// the `ready` countdown.
#[derive(Debug)]
pub struct Playback<'a> {
    timeline: &'a Timeline,
    clock: PlaybackClock,
    cursor: PlaybackCursor,
    assets_ready: bool,
    phase: Option<PhaseTag>,
}

impl<'a> Playback<'a> {
    pub fn new(timeline: &'a Timeline) -> Self {
        Self {
            timeline,
            clock: PlaybackClock::default(),
            cursor: PlaybackCursor::new(),
            assets_ready: false,
            phase: None,
        }
    }

    pub fn mark_assets_ready(&mut self) {
        if !self.assets_ready {
            tracing::info!(at_ms = self.clock.time_ms, "assets ready, releasing playback");
        }
        self.assets_ready = true;
    }

    pub fn assets_ready(&self) -> bool {
        self.assets_ready
    }

    /// True while playback is parked at the end of `ready` waiting on assets.
    pub fn is_blocked(&self) -> bool {
        !self.assets_ready && self.clock.time_ms >= gate_ms()
    }

    pub fn position_ms(&self) -> u32 {
        self.clock.time_ms
    }

    pub fn is_finished(&self) -> bool {
        self.clock.time_ms >= TOTAL_MS
    }

    pub fn current(&mut self) -> Option<&'a ThinkTimelineEvent> {
        let event = self.cursor.find(self.timeline, self.clock.time_ms);
        self.note_phase(event);
        event
    }

    pub fn advance(&mut self, delta_ms: u32) -> Option<&'a ThinkTimelineEvent> {
        self.clock.advance(delta_ms);
        self.apply_gate();
        self.current()
    }

    pub fn seek(&mut self, ms: u32) -> Option<&'a ThinkTimelineEvent> {
        self.clock.seek(ms);
        self.apply_gate();
        self.current()
    }

    /// Stops advancing and drops cursor state. The timeline is untouched.
    pub fn stop(&mut self) {
        tracing::info!(at_ms = self.clock.time_ms, "playback stopped");
        self.clock.reset();
        self.cursor.reset();
        self.phase = None;
    }

    fn apply_gate(&mut self) {
        if !self.assets_ready {
            self.clock.time_ms = self.clock.time_ms.min(gate_ms());
        }
    }

    fn note_phase(&mut self, event: Option<&ThinkTimelineEvent>) {
        let phase = event.map(|event| event.phase);
        if phase.is_some() && phase != self.phase {
            tracing::debug!(?phase, at_ms = self.clock.time_ms, "phase changed");
            self.phase = phase;
        }
    }
}

fn gate_ms() -> u32 {
    PhaseTag::Ready.window().end_ms - 1
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{
        config::{AudienceProfile, ThinkConfig},
        rules::Week,
        timeline::build_timeline,
    };

    fn timeline() -> Timeline {
        build_timeline(&ThinkConfig::new(Week::Four, AudienceProfile::Advanced, 99))
    }

    fn linear(events: &[ThinkTimelineEvent], ms: u32) -> Option<&ThinkTimelineEvent> {
        events.iter().find(|event| event.contains(ms))
    }

    #[test]
    fn forward_walk_matches_linear_scan() {
        let timeline = timeline();
        let events = timeline.events();
        let mut index = 0;
        for ms in (0..TOTAL_MS).step_by(37) {
            assert_eq!(find_current_event_o1(events, ms, &mut index), linear(events, ms));
        }
        assert_eq!(find_current_event_o1(events, TOTAL_MS, &mut index), None);
    }

    #[test]
    fn backward_walk_matches_linear_scan() {
        let timeline = timeline();
        let events = timeline.events();
        let mut index = events.len() - 1;
        for ms in (0..TOTAL_MS).rev().step_by(53) {
            assert_eq!(find_current_event_o1(events, ms, &mut index), linear(events, ms));
        }
    }

    #[test]
    fn forward_walk_moves_cursor_one_step_at_a_time() {
        let timeline = timeline();
        let mut cursor = PlaybackCursor::new();
        let mut last = 0;
        for event in timeline.events() {
            cursor.find(&timeline, event.t0);
            assert!(cursor.index() - last <= 1);
            last = cursor.index();
        }
        assert_eq!(last, timeline.len() - 1);
    }

    #[test]
    fn empty_timeline_and_stale_index() {
        let mut index = 42;
        assert_eq!(find_current_event_o1(&[], 10, &mut index), None);
        assert_eq!(index, 0);

        let timeline = timeline();
        let mut index = usize::MAX;
        let found = find_current_event_o1(timeline.events(), 0, &mut index).unwrap();
        assert_eq!(found.phase, PhaseTag::Intro);
    }

    #[test]
    fn playback_waits_for_assets_at_ready() {
        let timeline = timeline();
        let mut playback = Playback::new(&timeline);

        let event = playback.advance(20_000).unwrap();
        assert_eq!(event.phase, PhaseTag::Ready);
        assert!(playback.is_blocked());
        assert_eq!(playback.position_ms(), 8_999);

        playback.mark_assets_ready();
        assert!(!playback.is_blocked());
        let event = playback.advance(1).unwrap();
        assert_eq!(event.phase, PhaseTag::StageA);
        assert_eq!(event.t0, 9_000);
    }

    #[test]
    fn playback_seek_and_stop() {
        let timeline = timeline();
        let mut playback = Playback::new(&timeline);
        playback.mark_assets_ready();

        let event = playback.seek(100_000).unwrap();
        assert_eq!(event.phase, PhaseTag::StageC);
        let event = playback.seek(1_000).unwrap();
        assert_eq!(event.phase, PhaseTag::Intro);

        playback.seek(TOTAL_MS);
        assert!(playback.is_finished());
        assert!(playback.current().is_none());

        playback.stop();
        assert_eq!(playback.position_ms(), 0);
        assert!(playback.assets_ready());
    }

    proptest! {
        #[test]
        fn random_seeks_match_linear_scan(
            seed in any::<u32>(),
            stops in prop::collection::vec(0u32..TOTAL_MS, 1..64),
        ) {
            let week = Week::from(i64::from(seed % 4) + 1);
            let timeline = build_timeline(&ThinkConfig::new(week, AudienceProfile::Standard, seed));
            let mut cursor = PlaybackCursor::new();
            for ms in stops {
                prop_assert_eq!(cursor.find(&timeline, ms), linear(timeline.events(), ms));
            }
        }
    }
}
