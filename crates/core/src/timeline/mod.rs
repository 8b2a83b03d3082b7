mod builder;

use serde::{Deserialize, Serialize};

use crate::{
    assets::AssetSet,
    rules::{Color, Week},
    Result,
};

pub use builder::{build_timeline, image_share};

/// Length of the whole routine.
pub const TOTAL_MS: u32 = 150_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhaseTag {
    Intro,
    Ready,
    StageA,
    Rest1,
    StageB,
    Rest2,
    /// Week 4 presents and recalls its memory sequences inside this phase.
    StageC,
    Rest3,
    Outro,
}

/// Fixed `[start_ms, end_ms)` window owned by a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseWindow {
    pub phase: PhaseTag,
    pub start_ms: u32,
    pub end_ms: u32,
}

impl PhaseWindow {
    pub const fn duration_ms(&self) -> u32 {
        self.end_ms - self.start_ms
    }

    pub fn contains(&self, ms: u32) -> bool {
        (self.start_ms..self.end_ms).contains(&ms)
    }
}

const fn window(phase: PhaseTag, start_ms: u32, end_ms: u32) -> PhaseWindow {
    PhaseWindow {
        phase,
        start_ms,
        end_ms,
    }
}

/// The program's timing contract. Contiguous, independent of config.
pub const PHASE_WINDOWS: [PhaseWindow; 9] = [
    window(PhaseTag::Intro, 0, 6_000),
    window(PhaseTag::Ready, 6_000, 9_000),
    window(PhaseTag::StageA, 9_000, 39_000),
    window(PhaseTag::Rest1, 39_000, 43_000),
    window(PhaseTag::StageB, 43_000, 73_000),
    window(PhaseTag::Rest2, 73_000, 76_000),
    window(PhaseTag::StageC, 76_000, 136_000),
    window(PhaseTag::Rest3, 136_000, 140_000),
    window(PhaseTag::Outro, 140_000, TOTAL_MS),
];

impl PhaseTag {
    pub fn window(self) -> PhaseWindow {
        PHASE_WINDOWS
            .into_iter()
            .find(|w| w.phase == self)
            .unwrap_or(PHASE_WINDOWS[0])
    }

    /// Phase owning `ms`; times past the end belong to the outro.
    pub fn at(ms: u32) -> Self {
        PHASE_WINDOWS
            .into_iter()
            .find(|w| w.contains(ms))
            .map(|w| w.phase)
            .unwrap_or(PhaseTag::Outro)
    }

    pub fn is_stage(self) -> bool {
        matches!(self, PhaseTag::StageA | PhaseTag::StageB | PhaseTag::StageC)
    }

    pub fn rest_id(self) -> Option<u8> {
        match self {
            PhaseTag::Rest1 => Some(1),
            PhaseTag::Rest2 => Some(2),
            PhaseTag::Rest3 => Some(3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frame {
    Cue,
    Blank,
    Hold,
}

/// Panel split the renderer uses for Stage C slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Fullscreen,
    Horizontal,
    Vertical,
}

impl Layout {
    pub fn for_slots(slot_count: u8) -> Self {
        match slot_count {
            0 | 1 => Layout::Fullscreen,
            2 => Layout::Horizontal,
            _ => Layout::Vertical,
        }
    }
}

/// One step of a week 4 memory sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCue {
    pub sequence: Vec<Color>,
    pub step: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCCue {
    pub slot_count: u8,
    pub slot_colors: Vec<Color>,
    /// One entry per slot; `None` renders as a plain color block.
    pub images: Vec<Option<String>>,
    pub week: Week,
    pub set: AssetSet,
    pub layout: Layout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryCue>,
}

/// Display payload, one closed variant per phase family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Payload {
    Intro {
        week: Week,
    },
    Ready {
        count: u8,
    },
    /// Stage A and stage B stimulus.
    Stimulus {
        color: Color,
        image_url: Option<String>,
        set: AssetSet,
    },
    StageC(StageCCue),
    Rest {
        rule_label: String,
        rest_id: u8,
    },
    Outro {
        summary_text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkTimelineEvent {
    pub t0: u32,
    pub t1: u32,
    pub phase: PhaseTag,
    pub frame: Frame,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

impl ThinkTimelineEvent {
    pub fn new(t0: u32, t1: u32, phase: PhaseTag, frame: Frame, payload: Option<Payload>) -> Self {
        Self {
            t0,
            t1,
            phase,
            frame,
            payload,
        }
    }

    pub fn duration_ms(&self) -> u32 {
        self.t1.saturating_sub(self.t0)
    }

    pub fn contains(&self, ms: u32) -> bool {
        (self.t0..self.t1).contains(&ms)
    }

    pub fn is_cue(&self) -> bool {
        self.frame == Frame::Cue
    }

    pub fn is_blank(&self) -> bool {
        self.frame == Frame::Blank
    }

    /// Color that represents this cue in statistics: the stimulus color, or
    /// the first Stage C slot.
    pub fn primary_color(&self) -> Option<Color> {
        match self.payload.as_ref()? {
            Payload::Stimulus { color, .. } => Some(*color),
            Payload::StageC(cue) => cue.slot_colors.first().copied(),
            _ => None,
        }
    }

    pub fn stage_c(&self) -> Option<&StageCCue> {
        match self.payload.as_ref()? {
            Payload::StageC(cue) => Some(cue),
            _ => None,
        }
    }

    pub fn memory(&self) -> Option<&MemoryCue> {
        self.stage_c()?.memory.as_ref()
    }

    pub fn set(&self) -> Option<AssetSet> {
        match self.payload.as_ref()? {
            Payload::Stimulus { set, .. } => Some(*set),
            Payload::StageC(cue) => Some(cue.set),
            _ => None,
        }
    }
}

/// Immutable output of [`build_timeline`]: time-ordered events covering
/// exactly `[0, TOTAL_MS)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline {
    events: Vec<ThinkTimelineEvent>,
}

impl Timeline {
    pub fn from_events(events: Vec<ThinkTimelineEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[ThinkTimelineEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ThinkTimelineEvent> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn phase_events(&self, phase: PhaseTag) -> impl Iterator<Item = &ThinkTimelineEvent> {
        self.events.iter().filter(move |event| event.phase == phase)
    }

    pub fn cues(&self) -> impl Iterator<Item = &ThinkTimelineEvent> {
        self.events.iter().filter(|event| event.is_cue())
    }

    /// Last `t1` minus first `t0`.
    pub fn total_duration_ms(&self) -> u32 {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => last.t1.saturating_sub(first.t0),
            _ => 0,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_windows_are_contiguous_and_sum_to_total() {
        let mut cursor = 0;
        for window in PHASE_WINDOWS {
            assert_eq!(window.start_ms, cursor, "{:?} starts late", window.phase);
            assert!(window.end_ms > window.start_ms);
            cursor = window.end_ms;
        }
        assert_eq!(cursor, TOTAL_MS);
        let sum: u32 = PHASE_WINDOWS.iter().map(PhaseWindow::duration_ms).sum();
        assert_eq!(sum, TOTAL_MS);
    }

    #[test]
    fn phase_lookup_by_time() {
        assert_eq!(PhaseTag::at(0), PhaseTag::Intro);
        assert_eq!(PhaseTag::at(76_000), PhaseTag::StageC);
        assert_eq!(PhaseTag::at(135_999), PhaseTag::StageC);
        assert_eq!(PhaseTag::at(200_000), PhaseTag::Outro);
        assert_eq!(PhaseTag::StageC.window().duration_ms(), 60_000);
        assert_eq!(PhaseTag::Rest2.rest_id(), Some(2));
    }

    #[test]
    fn layout_follows_slot_count() {
        assert_eq!(Layout::for_slots(1), Layout::Fullscreen);
        assert_eq!(Layout::for_slots(2), Layout::Horizontal);
        assert_eq!(Layout::for_slots(3), Layout::Vertical);
    }

    #[test]
    fn payload_serializes_with_type_tags() {
        let event = ThinkTimelineEvent::new(
            9_000,
            9_700,
            PhaseTag::StageA,
            Frame::Cue,
            Some(Payload::Stimulus {
                color: Color::Green,
                image_url: None,
                set: AssetSet::A,
            }),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["phase"], "stageA");
        assert_eq!(json["frame"], "cue");
        assert_eq!(json["payload"]["type"], "stimulus");
        assert_eq!(json["payload"]["color"], "green");
        assert!(json["payload"]["imageUrl"].is_null());
        assert_eq!(event.primary_color(), Some(Color::Green));

        let back: ThinkTimelineEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
