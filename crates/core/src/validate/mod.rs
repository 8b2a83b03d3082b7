use std::fmt;

use serde::Serialize;

use crate::{
    assets::AssetSet,
    rules::SET_SWITCH_ELAPSED_MS,
    timeline::{Frame, PhaseTag, Timeline, PHASE_WINDOWS, TOTAL_MS},
};

pub const DURATION_TOLERANCE_MS: u32 = 1;
/// Allowed drift of the Stage C set switch around 30 s before warning.
pub const SET_SWITCH_TOLERANCE_MS: u32 = 5_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "valid: {}", self.is_valid)?;
        for error in &self.errors {
            writeln!(f, "  error: {error}")?;
        }
        for warning in &self.warnings {
            writeln!(f, "  warning: {warning}")?;
        }
        Ok(())
    }
}

/// Collects diagnostics without failing; an invalid timeline still plays.
pub fn validate_timeline(timeline: &Timeline) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if timeline.is_empty() {
        errors.push("timeline has no events".to_string());
    } else {
        check_duration(timeline, &mut errors);
        check_contiguity(timeline, &mut errors);
        check_phase_starts(timeline, &mut errors);
        check_pairing(timeline, &mut errors);
        check_set_switch(timeline, &mut warnings);
    }

    if !errors.is_empty() {
        tracing::debug!(errors = errors.len(), "timeline failed validation");
    }

    ValidationResult {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

fn check_duration(timeline: &Timeline, errors: &mut Vec<String>) {
    let total = timeline.total_duration_ms();
    if total.abs_diff(TOTAL_MS) > DURATION_TOLERANCE_MS {
        errors.push(format!(
            "total duration is {total} ms, expected {TOTAL_MS} ms"
        ));
    }
}

fn check_contiguity(timeline: &Timeline, errors: &mut Vec<String>) {
    let events = timeline.events();
    if let Some(first) = events.first() {
        if first.t0 != 0 {
            errors.push(format!("timeline starts at {} ms, expected 0", first.t0));
        }
    }
    for (idx, event) in events.iter().enumerate() {
        if event.t1 <= event.t0 {
            errors.push(format!(
                "event {idx} has non-positive length ({}..{})",
                event.t0, event.t1
            ));
        }
        if let Some(next) = events.get(idx + 1) {
            if next.t0 > event.t1 {
                errors.push(format!("gap between {} and {} ms", event.t1, next.t0));
            } else if next.t0 < event.t1 {
                errors.push(format!("overlap between {} and {} ms", next.t0, event.t1));
            }
        }
    }
}

fn check_phase_starts(timeline: &Timeline, errors: &mut Vec<String>) {
    for window in PHASE_WINDOWS {
        match timeline.phase_events(window.phase).next() {
            Some(first) if first.t0 == window.start_ms => {}
            Some(first) => errors.push(format!(
                "{:?} starts at {} ms, expected {} ms",
                window.phase, first.t0, window.start_ms
            )),
            None => errors.push(format!("{:?} has no events", window.phase)),
        }
    }
}

/// Every cue needs a blank. A memory sequence shares one recall blank
/// between all of its cues.
fn check_pairing(timeline: &Timeline, errors: &mut Vec<String>) {
    let mut cues = 0usize;
    let mut covered = 0usize;
    let mut last_steps = 1usize;
    for event in timeline.events() {
        match event.frame {
            Frame::Cue => {
                cues += 1;
                last_steps = event.memory().map_or(1, |memory| memory.sequence.len());
            }
            Frame::Blank => covered += last_steps,
            Frame::Hold => {}
        }
    }
    if cues != covered {
        errors.push(format!(
            "cue count {cues} does not match blank count {covered}"
        ));
    }
}

fn check_set_switch(timeline: &Timeline, warnings: &mut Vec<String>) {
    let start = PhaseTag::StageC.window().start_ms;
    let switch = timeline
        .phase_events(PhaseTag::StageC)
        .filter(|event| event.is_cue())
        .find(|event| event.set() == Some(AssetSet::B));

    match switch {
        Some(event) => {
            let elapsed = event.t0.saturating_sub(start);
            if elapsed.abs_diff(SET_SWITCH_ELAPSED_MS) > SET_SWITCH_TOLERANCE_MS {
                warnings.push(format!(
                    "stage C switches to set B at {elapsed} ms, expected about {SET_SWITCH_ELAPSED_MS} ms"
                ));
            }
        }
        None => warnings.push("stage C never switches to set B".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{AudienceProfile, ThinkConfig},
        rules::Week,
        timeline::{build_timeline, ThinkTimelineEvent},
    };

    fn built(week: Week, audience: AudienceProfile) -> Timeline {
        build_timeline(&ThinkConfig::new(week, audience, 17))
    }

    #[test]
    fn generated_timelines_are_valid() {
        for week in Week::ALL {
            for audience in AudienceProfile::ALL {
                let result = validate_timeline(&built(week, audience));
                assert!(result.is_valid, "{week} {audience}: {result}");
                assert!(result.warnings.is_empty(), "{week} {audience}: {result}");
            }
        }
    }

    #[test]
    fn reports_truncated_timeline() {
        let mut events = built(Week::Two, AudienceProfile::Standard).into_events();
        events.pop();
        let result = validate_timeline(&Timeline::from_events(events));
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("total duration")));
        assert!(result.errors.iter().any(|e| e.contains("Outro has no events")));
    }

    #[test]
    fn reports_unpaired_cues_and_gaps() {
        let mut events = built(Week::One, AudienceProfile::Standard).into_events();
        let blank = events
            .iter()
            .position(ThinkTimelineEvent::is_blank)
            .unwrap();
        events.remove(blank);
        let result = validate_timeline(&Timeline::from_events(events));
        assert!(result.errors.iter().any(|e| e.contains("does not match blank count")));
        assert!(result.errors.iter().any(|e| e.starts_with("gap between")));
    }

    #[test]
    fn warns_when_set_switch_drifts() {
        let stage_c_start = PhaseTag::StageC.window().start_ms;
        let events = built(Week::Three, AudienceProfile::Standard)
            .into_events()
            .into_iter()
            .map(|mut event| {
                if event.t0 >= stage_c_start + 10_000 {
                    if let Some(crate::timeline::Payload::StageC(cue)) = event.payload.as_mut() {
                        cue.set = AssetSet::B;
                    }
                }
                event
            })
            .collect();
        let result = validate_timeline(&Timeline::from_events(events));
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("switches to set B"));
    }

    #[test]
    fn empty_timeline_is_invalid() {
        let result = validate_timeline(&Timeline::default());
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["timeline has no events".to_string()]);
    }
}
