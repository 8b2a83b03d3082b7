use std::collections::BTreeMap;

use crate::{
    assets::{AssetPack, AssetSet},
    config::ThinkConfig,
    rng::SeededRng,
    rules::{
        balanced_color, compute_stage_c_cue_spec, memory_recall_multiplier, memory_steps,
        outro_summary, rule_label, Color, ColorCounts, CueContext, CueSpec, Week,
        SET_SWITCH_ELAPSED_MS,
    },
};

use super::{
    Frame, Layout, MemoryCue, Payload, PhaseTag, PhaseWindow, StageCCue, ThinkTimelineEvent,
    Timeline, PHASE_WINDOWS,
};

const COUNTDOWN: [u8; 3] = [3, 2, 1];

/// Share of cues that show an image rather than a plain color block.
pub fn image_share(week: Week, phase: PhaseTag) -> f64 {
    match (week, phase) {
        (Week::One, _) => 0.0,
        (Week::Two, PhaseTag::StageA) => 0.0,
        (Week::Two, PhaseTag::StageB) => 0.5,
        (Week::Three, PhaseTag::StageA) => 0.5,
        (Week::Three, PhaseTag::StageB) => 1.0,
        (Week::Four, PhaseTag::StageA | PhaseTag::StageB) => 0.5,
        (_, PhaseTag::StageC) => 1.0,
        _ => 0.0,
    }
}

/// Spreads `share` evenly over cue indices without consuming randomness.
fn shows_image(index: usize, share: f64) -> bool {
    ((index + 1) as f64 * share).floor() > (index as f64 * share).floor()
}

/// Compiles the full routine for `config`. Total: every config produces a
/// timeline covering `[0, TOTAL_MS)`.
pub fn build_timeline(config: &ThinkConfig) -> Timeline {
    let mut builder = TimelineBuilder::new(config);
    for window in PHASE_WINDOWS {
        builder.build_phase(window);
    }
    let timeline = Timeline::from_events(builder.events);
    tracing::debug!(
        week = config.week.number(),
        audience = %config.audience,
        seed = config.seed,
        events = timeline.len(),
        cues = timeline.cues().count(),
        "timeline built"
    );
    timeline
}

struct TimelineBuilder<'a> {
    config: &'a ThinkConfig,
    pack: Option<&'a AssetPack>,
    rng: SeededRng,
    counts: ColorCounts,
    last_color: Option<Color>,
    image_turns: BTreeMap<(AssetSet, Color), usize>,
    events: Vec<ThinkTimelineEvent>,
}

impl<'a> TimelineBuilder<'a> {
    fn new(config: &'a ThinkConfig) -> Self {
        Self {
            config,
            pack: config.assets.pack_for(config.week, config.month),
            rng: SeededRng::new(config.seed),
            counts: ColorCounts::new(),
            last_color: None,
            image_turns: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    fn build_phase(&mut self, window: PhaseWindow) {
        let week = self.config.week;
        match window.phase {
            PhaseTag::Intro => self.hold(window, Some(Payload::Intro { week })),
            PhaseTag::Ready => self.countdown(window),
            PhaseTag::StageA => self.stimulus_stage(window, AssetSet::A),
            PhaseTag::StageB => self.stimulus_stage(window, AssetSet::B),
            PhaseTag::StageC if week == Week::Four => self.memory_stage(window),
            PhaseTag::StageC => self.stage_c(window),
            PhaseTag::Rest1 | PhaseTag::Rest2 | PhaseTag::Rest3 => {
                let rest_id = window.phase.rest_id().unwrap_or(1);
                let payload = Payload::Rest {
                    rule_label: rule_label(week, rest_id).to_string(),
                    rest_id,
                };
                self.hold(window, Some(payload));
            }
            PhaseTag::Outro => {
                let payload = Payload::Outro {
                    summary_text: outro_summary(week),
                };
                self.hold(window, Some(payload));
            }
        }
    }

    fn push(&mut self, t0: u32, t1: u32, phase: PhaseTag, frame: Frame, payload: Option<Payload>) {
        self.events
            .push(ThinkTimelineEvent::new(t0, t1, phase, frame, payload));
    }

    fn hold(&mut self, window: PhaseWindow, payload: Option<Payload>) {
        self.push(window.start_ms, window.end_ms, window.phase, Frame::Hold, payload);
    }

    /// Leftover time that cannot fit another full pair.
    fn residual(&mut self, window: PhaseWindow, from_ms: u32) {
        if from_ms < window.end_ms {
            self.push(from_ms, window.end_ms, window.phase, Frame::Hold, None);
        }
    }

    fn countdown(&mut self, window: PhaseWindow) {
        let beat = window.duration_ms() / COUNTDOWN.len() as u32;
        for (idx, count) in COUNTDOWN.into_iter().enumerate() {
            let t0 = window.start_ms + beat * idx as u32;
            let t1 = if idx + 1 == COUNTDOWN.len() {
                window.end_ms
            } else {
                t0 + beat
            };
            self.push(t0, t1, window.phase, Frame::Hold, Some(Payload::Ready { count }));
        }
    }

    fn image_for(&mut self, set: AssetSet, color: Color) -> Option<String> {
        let pack = self.pack?;
        let turn = self.image_turns.entry((set, color)).or_insert(0);
        let url = pack.image(set, color, *turn).map(str::to_string);
        *turn += 1;
        url
    }

    fn note_color(&mut self, color: Color) {
        self.counts.record(color);
        self.last_color = Some(color);
    }

    fn stimulus_stage(&mut self, window: PhaseWindow, set: AssetSet) {
        let cue_ms = self.config.audience.cue_ms();
        let pair_ms = cue_ms * 2;
        let share = image_share(self.config.week, window.phase);
        let mut t = window.start_ms;
        let mut index = 0;

        while t + pair_ms <= window.end_ms {
            let color = balanced_color(&mut self.rng, &self.counts, self.last_color);
            self.note_color(color);
            let image_url = if shows_image(index, share) {
                self.image_for(set, color)
            } else {
                None
            };
            let payload = Payload::Stimulus {
                color,
                image_url,
                set,
            };
            self.push(t, t + cue_ms, window.phase, Frame::Cue, Some(payload));
            self.push(t + cue_ms, t + pair_ms, window.phase, Frame::Blank, None);
            t += pair_ms;
            index += 1;
        }
        self.residual(window, t);
    }

    /// Cue and blank lengths for Stage C; week 2 stretches both.
    fn stage_c_timing(&self) -> (u32, u32) {
        let cue_ms = self.config.audience.cue_ms();
        let blank_ms = self.config.audience.blank_ms();
        match self.config.week {
            Week::Two => (cue_ms * 3 / 2, blank_ms * 2),
            _ => (cue_ms, blank_ms),
        }
    }

    fn stage_c_payload(&mut self, spec: CueSpec, set: AssetSet, index: usize) -> StageCCue {
        let share = image_share(self.config.week, PhaseTag::StageC);
        let images = spec
            .slot_colors
            .iter()
            .map(|color| {
                if shows_image(index, share) {
                    self.image_for(set, *color)
                } else {
                    None
                }
            })
            .collect();
        StageCCue {
            slot_count: spec.slot_count,
            layout: Layout::for_slots(spec.slot_count),
            slot_colors: spec.slot_colors,
            images,
            week: self.config.week,
            set,
            memory: None,
        }
    }

    fn stage_c(&mut self, window: PhaseWindow) {
        let (cue_ms, blank_ms) = self.stage_c_timing();
        let pair_ms = cue_ms + blank_ms;
        let mut t = window.start_ms;
        let mut index = 0;

        while t + pair_ms <= window.end_ms {
            let elapsed_ms = t - window.start_ms;
            let set = set_for_elapsed(elapsed_ms);
            let ctx = CueContext {
                week: self.config.week,
                elapsed_ms,
                set,
                last_color: self.last_color,
            };
            let spec = compute_stage_c_cue_spec(&ctx, &mut self.rng, &self.counts);
            if let Some(primary) = spec.slot_colors.first().copied() {
                self.note_color(primary);
            }
            let cue = self.stage_c_payload(spec, set, index);
            self.push(t, t + cue_ms, window.phase, Frame::Cue, Some(Payload::StageC(cue)));
            self.push(t + cue_ms, t + pair_ms, window.phase, Frame::Blank, None);
            t += pair_ms;
            index += 1;
        }
        self.residual(window, t);
    }

    /// Week 4: back-to-back sequence cues, then one recall blank of
    /// `steps × cue_ms`.
    fn memory_stage(&mut self, window: PhaseWindow) {
        let cue_ms = self.config.audience.cue_ms();
        let mut t = window.start_ms;
        let mut index = 0;

        loop {
            let elapsed_ms = t - window.start_ms;
            let steps = memory_steps(elapsed_ms);
            let recall_ms = cue_ms * memory_recall_multiplier(steps);
            let unit_ms = cue_ms * u32::from(steps) + recall_ms;
            if t + unit_ms > window.end_ms {
                break;
            }

            let set = set_for_elapsed(elapsed_ms);
            let ctx = CueContext {
                week: Week::Four,
                elapsed_ms,
                set,
                last_color: self.last_color,
            };
            let spec = compute_stage_c_cue_spec(&ctx, &mut self.rng, &self.counts);
            let sequence = spec.memory.unwrap_or(spec.slot_colors);

            for (step, color) in sequence.iter().copied().enumerate() {
                self.note_color(color);
                let single = CueSpec {
                    slot_count: 1,
                    slot_colors: vec![color],
                    memory: None,
                };
                let mut cue = self.stage_c_payload(single, set, index);
                cue.memory = Some(MemoryCue {
                    sequence: sequence.clone(),
                    step,
                });
                self.push(t, t + cue_ms, window.phase, Frame::Cue, Some(Payload::StageC(cue)));
                t += cue_ms;
                index += 1;
            }
            self.push(t, t + recall_ms, window.phase, Frame::Blank, None);
            t += recall_ms;
        }
        self.residual(window, t);
    }
}

fn set_for_elapsed(elapsed_ms: u32) -> AssetSet {
    if elapsed_ms < SET_SWITCH_ELAPSED_MS {
        AssetSet::A
    } else {
        AssetSet::B
    }
}
