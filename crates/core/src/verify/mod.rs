use std::fmt;

use serde::Serialize;

use crate::{
    config::ThinkConfig,
    rules::{Color, ColorCounts, Week},
    timeline::{build_timeline, Timeline},
};

pub const WEEK_ONE_REPEAT_RATIO_LIMIT: f64 = 0.21;
pub const REPEAT_RATIO_LIMIT: f64 = 0.26;

pub fn repeat_ratio_limit(week: Week) -> f64 {
    match week {
        Week::One => WEEK_ONE_REPEAT_RATIO_LIMIT,
        _ => REPEAT_RATIO_LIMIT,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineStats {
    pub total_cues: usize,
    pub red: usize,
    pub green: usize,
    pub yellow: usize,
    pub blue: usize,
    pub consecutive_same_color: usize,
    pub consecutive_same_color_ratio: f64,
    /// Distinct 2-step memory sequences (week 4).
    pub memory_two_step: usize,
    /// Distinct 3-step memory sequences (week 4).
    pub memory_three_step: usize,
}

impl TimelineStats {
    pub fn collect(timeline: &Timeline) -> Self {
        let mut counts = ColorCounts::new();
        let mut previous: Option<Color> = None;
        let mut repeats: usize = 0;
        let mut total: usize = 0;
        let mut memory_two_step = 0;
        let mut memory_three_step = 0;

        for cue in timeline.cues() {
            if let Some(memory) = cue.memory() {
                if memory.step == 0 {
                    match memory.sequence.len() {
                        2 => memory_two_step += 1,
                        3 => memory_three_step += 1,
                        _ => {}
                    }
                }
            }
            let Some(color) = cue.primary_color() else {
                continue;
            };
            total += 1;
            counts.record(color);
            if previous == Some(color) {
                repeats += 1;
            }
            previous = Some(color);
        }

        let transitions = total.saturating_sub(1);
        let ratio = if transitions == 0 {
            0.0
        } else {
            repeats as f64 / transitions as f64
        };

        Self {
            total_cues: total,
            red: counts.get(Color::Red),
            green: counts.get(Color::Green),
            yellow: counts.get(Color::Yellow),
            blue: counts.get(Color::Blue),
            consecutive_same_color: repeats,
            consecutive_same_color_ratio: ratio,
            memory_two_step,
            memory_three_step,
        }
    }

    pub fn count(&self, color: Color) -> usize {
        match color {
            Color::Red => self.red,
            Color::Green => self.green,
            Color::Yellow => self.yellow,
            Color::Blue => self.blue,
        }
    }

    pub fn max_count(&self) -> usize {
        Color::ALL.into_iter().map(|c| self.count(c)).max().unwrap_or(0)
    }

    pub fn min_count(&self) -> usize {
        Color::ALL.into_iter().map(|c| self.count(c)).min().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationCheck {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub week: Week,
    pub passed: bool,
    pub checks: Vec<VerificationCheck>,
    pub stats: TimelineStats,
}

impl VerificationReport {
    pub fn check(&self, name: &str) -> Option<&VerificationCheck> {
        self.checks.iter().find(|check| check.name == name)
    }

    pub fn failures(&self) -> impl Iterator<Item = &VerificationCheck> {
        self.checks.iter().filter(|check| !check.passed)
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.passed { "PASS" } else { "FAIL" };
        writeln!(f, "{} verification: {verdict}", self.week)?;
        for check in &self.checks {
            let mark = if check.passed { "ok" } else { "FAILED" };
            writeln!(f, "  [{mark}] {}: {}", check.name, check.detail)?;
        }
        Ok(())
    }
}

/// Rebuilds the timeline for `config` and verifies it. Not used during live
/// playback.
pub fn verify_config(config: &ThinkConfig) -> VerificationReport {
    let timeline = build_timeline(config);
    verify_timeline(config.week, &timeline)
}

pub fn verify_timeline(week: Week, timeline: &Timeline) -> VerificationReport {
    let stats = TimelineStats::collect(timeline);
    let mut checks = Vec::new();

    let spread = stats.max_count() - stats.min_count();
    let allowed = stats.total_cues.div_ceil(4);
    checks.push(VerificationCheck {
        name: "color_balance",
        passed: spread <= allowed,
        detail: format!(
            "red {} / green {} / yellow {} / blue {}; spread {spread} (allowed {allowed})",
            stats.red, stats.green, stats.yellow, stats.blue
        ),
    });

    checks.push(VerificationCheck {
        name: "red_present",
        passed: stats.red > 0,
        detail: format!("{} red cues", stats.red),
    });

    let limit = repeat_ratio_limit(week);
    checks.push(VerificationCheck {
        name: "consecutive_repeats",
        passed: stats.consecutive_same_color_ratio <= limit,
        detail: format!(
            "{} of {} transitions repeat ({:.1}%, limit {:.0}%)",
            stats.consecutive_same_color,
            stats.total_cues.saturating_sub(1),
            stats.consecutive_same_color_ratio * 100.0,
            limit * 100.0
        ),
    });

    if week == Week::Four {
        checks.push(VerificationCheck {
            name: "memory_sequences",
            passed: stats.memory_two_step > 0 && stats.memory_three_step > 0,
            detail: format!(
                "{} two-step and {} three-step sequences",
                stats.memory_two_step, stats.memory_three_step
            ),
        });
    }

    let passed = checks.iter().all(|check| check.passed);
    if !passed {
        tracing::warn!(week = week.number(), "timeline verification failed");
    }

    VerificationReport {
        week,
        passed,
        checks,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assets::AssetSet,
        config::AudienceProfile,
        timeline::{Frame, Payload, PhaseTag, ThinkTimelineEvent},
    };

    #[test]
    fn generated_timelines_pass_for_many_seeds() {
        for week in Week::ALL {
            for seed in 0..25 {
                let config = ThinkConfig::new(week, AudienceProfile::Standard, seed);
                let report = verify_config(&config);
                assert!(report.passed, "seed {seed}: {report}");
                assert!(report.stats.red > 0);
                let spread = report.stats.max_count() - report.stats.min_count();
                assert!(spread <= report.stats.total_cues.div_ceil(4));
            }
        }
    }

    #[test]
    fn week_one_repeats_stay_under_limit() {
        for audience in AudienceProfile::ALL {
            let report = verify_config(&ThinkConfig::new(Week::One, audience, 1));
            assert!(report.stats.consecutive_same_color_ratio <= 0.21, "{report}");
        }
    }

    #[test]
    fn week_four_reports_memory_sequences() {
        let report = verify_config(&ThinkConfig::new(Week::Four, AudienceProfile::Standard, 7));
        let check = report.check("memory_sequences").unwrap();
        assert!(check.passed, "{report}");
        assert_eq!(report.stats.memory_two_step, 11);
        assert_eq!(report.stats.memory_three_step, 6);

        let other = verify_config(&ThinkConfig::new(Week::Two, AudienceProfile::Standard, 7));
        assert!(other.check("memory_sequences").is_none());
    }

    #[test]
    fn flags_a_monochrome_timeline() {
        let events = (0..20)
            .flat_map(|i| {
                let t = i * 1_000;
                [
                    ThinkTimelineEvent::new(
                        t,
                        t + 500,
                        PhaseTag::StageA,
                        Frame::Cue,
                        Some(Payload::Stimulus {
                            color: Color::Blue,
                            image_url: None,
                            set: AssetSet::A,
                        }),
                    ),
                    ThinkTimelineEvent::new(
                        t + 500,
                        t + 1_000,
                        PhaseTag::StageA,
                        Frame::Blank,
                        None,
                    ),
                ]
            })
            .collect();
        let report = verify_timeline(Week::Two, &Timeline::from_events(events));

        assert!(!report.passed);
        let failed: Vec<_> = report.failures().map(|check| check.name).collect();
        assert_eq!(failed, vec!["color_balance", "red_present", "consecutive_repeats"]);
        assert_eq!(report.stats.consecutive_same_color, 19);
        assert!(report.to_string().contains("[FAILED] red_present"));
    }
}
