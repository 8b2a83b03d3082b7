use serde::{Deserialize, Serialize};

use crate::{assets::AssetSet, rng::SeededRng};

/// Elapsed time inside Stage C at which set A hands over to set B and week 4
/// moves from 2-step to 3-step sequences.
pub const SET_SWITCH_ELAPSED_MS: u32 = 30_000;

/// Week rule variant. Deserializes from any integer, clamping into `1..=4`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(from = "i64", into = "u8")]
pub enum Week {
    /// Replicate one color across 1–3 slots.
    #[default]
    One,
    /// Two slots, two distinct colors.
    Two,
    /// ANTI: display the opposite color.
    Three,
    /// MEMORY: present a sequence, then recall it.
    Four,
}

impl Week {
    pub const ALL: [Week; 4] = [Week::One, Week::Two, Week::Three, Week::Four];

    pub fn number(self) -> u8 {
        match self {
            Week::One => 1,
            Week::Two => 2,
            Week::Three => 3,
            Week::Four => 4,
        }
    }

    /// Nearest valid week for an arbitrary integer.
    pub fn clamped(value: i64) -> Self {
        match value {
            i64::MIN..=1 => Week::One,
            2 => Week::Two,
            3 => Week::Three,
            _ => Week::Four,
        }
    }
}

impl From<i64> for Week {
    fn from(value: i64) -> Self {
        Self::clamped(value)
    }
}

impl From<Week> for u8 {
    fn from(value: Week) -> Self {
        value.number()
    }
}

impl std::fmt::Display for Week {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "week {}", self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
}

impl Color {
    pub const ALL: [Color; 4] = [Color::Red, Color::Green, Color::Yellow, Color::Blue];

    pub fn index(self) -> usize {
        match self {
            Color::Red => 0,
            Color::Green => 1,
            Color::Yellow => 2,
            Color::Blue => 3,
        }
    }

    /// Diagonal partner on the 2×2 color board (red/green over yellow/blue).
    pub fn opposite(self) -> Self {
        match self {
            Color::Red => Color::Blue,
            Color::Blue => Color::Red,
            Color::Green => Color::Yellow,
            Color::Yellow => Color::Green,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Green => "green",
            Color::Yellow => "yellow",
            Color::Blue => "blue",
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running per-color occurrence counters used by balanced picks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorCounts([usize; 4]);

impl ColorCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, color: Color) {
        self.0[color.index()] += 1;
    }

    pub fn get(&self, color: Color) -> usize {
        self.0[color.index()]
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }

    pub fn max(&self) -> usize {
        self.0.iter().copied().max().unwrap_or(0)
    }

    pub fn min(&self) -> usize {
        self.0.iter().copied().min().unwrap_or(0)
    }

    /// Counts seen through the ANTI transform: the entry for `c` is the
    /// count of `c.opposite()`.
    fn through_opposite(&self) -> Self {
        let mut mapped = Self::default();
        for color in Color::ALL {
            mapped.0[color.index()] = self.get(color.opposite());
        }
        mapped
    }
}

/// Inputs for one Stage C cue decision.
#[derive(Debug, Clone, Copy)]
pub struct CueContext {
    pub week: Week,
    /// Milliseconds elapsed since Stage C started.
    pub elapsed_ms: u32,
    pub set: AssetSet,
    /// Last color shown on screen, for anti-repeat picks.
    pub last_color: Option<Color>,
}

/// What a Stage C cue shows. `memory` is only set for week 4, in which case
/// the scheduler presents one cue per sequence step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueSpec {
    pub slot_count: u8,
    pub slot_colors: Vec<Color>,
    pub memory: Option<Vec<Color>>,
}

/// Every difference between the weekly Stage C variants lives behind this
/// one `match`. Timing stays with the caller.
pub fn compute_stage_c_cue_spec(
    ctx: &CueContext,
    rng: &mut SeededRng,
    counts: &ColorCounts,
) -> CueSpec {
    match ctx.week {
        Week::One => replicate_spec(ctx, rng),
        Week::Two => pair_spec(ctx, rng, counts),
        Week::Three => anti_spec(ctx, rng, counts),
        Week::Four => memory_spec(ctx, rng, counts),
    }
}

/// Number of steps in a week 4 memory sequence starting at `elapsed_ms`.
pub fn memory_steps(elapsed_ms: u32) -> u8 {
    if elapsed_ms < SET_SWITCH_ELAPSED_MS {
        2
    } else {
        3
    }
}

/// Length of the recall blank in multiples of the base cue length.
pub fn memory_recall_multiplier(steps: u8) -> u32 {
    u32::from(steps.max(1))
}

pub(crate) fn balanced_color(
    rng: &mut SeededRng,
    counts: &ColorCounts,
    prev: Option<Color>,
) -> Color {
    rng.pick_balanced(&Color::ALL, counts.as_slice(), prev)
        .unwrap_or(Color::Red)
}

fn replicate_spec(ctx: &CueContext, rng: &mut SeededRng) -> CueSpec {
    let slot_count = rng.pick(&[1u8, 2, 3]).unwrap_or(1);
    let color = rng
        .pick_avoiding_consecutive(&Color::ALL, ctx.last_color)
        .unwrap_or(Color::Red);
    CueSpec {
        slot_count,
        slot_colors: vec![color; usize::from(slot_count)],
        memory: None,
    }
}

fn pair_spec(ctx: &CueContext, rng: &mut SeededRng, counts: &ColorCounts) -> CueSpec {
    let first = balanced_color(rng, counts, ctx.last_color);
    let second = rng
        .pick_excluding(&Color::ALL, Some(first))
        .unwrap_or(first.opposite());
    CueSpec {
        slot_count: 2,
        slot_colors: vec![first, second],
        memory: None,
    }
}

fn anti_spec(ctx: &CueContext, rng: &mut SeededRng, counts: &ColorCounts) -> CueSpec {
    // Chosen in source space so the displayed colors stay balanced.
    let source_counts = counts.through_opposite();
    let source_prev = ctx.last_color.map(Color::opposite);
    let first = balanced_color(rng, &source_counts, source_prev);
    let mut chosen = vec![first];
    if ctx.set == AssetSet::B {
        let second = rng
            .pick_excluding(&Color::ALL, Some(first))
            .unwrap_or(first.opposite());
        chosen.push(second);
    }
    let slot_colors: Vec<Color> = chosen.into_iter().map(Color::opposite).collect();
    CueSpec {
        slot_count: slot_colors.len() as u8,
        slot_colors,
        memory: None,
    }
}

fn memory_spec(ctx: &CueContext, rng: &mut SeededRng, counts: &ColorCounts) -> CueSpec {
    let steps = memory_steps(ctx.elapsed_ms);
    let mut sequence = vec![balanced_color(rng, counts, ctx.last_color)];
    while sequence.len() < usize::from(steps) {
        let next = rng
            .pick_excluding_all(&Color::ALL, &sequence)
            .unwrap_or(Color::Red);
        sequence.push(next);
    }
    CueSpec {
        slot_count: 1,
        slot_colors: vec![sequence[0]],
        memory: Some(sequence),
    }
}

/// Instruction shown during rest `rest_id` (1–3) before the next stage.
pub fn rule_label(week: Week, rest_id: u8) -> &'static str {
    match (week, rest_id) {
        (_, 3) => "Great job! Shake it out and breathe.",
        (_, 1) => "Next: touch the color you see, faster!",
        (Week::One, _) => "Touch every color you see, in any order.",
        (Week::Two, _) => "Two colors! Touch both of them.",
        (Week::Three, _) => "ANTI! Touch the opposite color.",
        (Week::Four, _) => "MEMORY! Watch the colors, then touch them in order.",
    }
}

pub fn outro_summary(week: Week) -> String {
    let rule = match week {
        Week::One => "color match",
        Week::Two => "double colors",
        Week::Three => "ANTI colors",
        Week::Four => "color memory",
    };
    format!("Well done! You finished {week}: {rule}.")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(week: Week, elapsed_ms: u32, set: AssetSet) -> CueContext {
        CueContext {
            week,
            elapsed_ms,
            set,
            last_color: None,
        }
    }

    #[test]
    fn week_clamps_out_of_range_values() {
        assert_eq!(Week::from(-3), Week::One);
        assert_eq!(Week::from(0), Week::One);
        assert_eq!(Week::from(3), Week::Three);
        assert_eq!(Week::from(99), Week::Four);
    }

    #[test]
    fn week_deserializes_leniently() {
        let week: Week = serde_json::from_str("7").unwrap();
        assert_eq!(week, Week::Four);
        assert_eq!(serde_json::to_string(&Week::Two).unwrap(), "2");
    }

    #[test]
    fn opposite_is_an_involution() {
        for color in Color::ALL {
            assert_ne!(color.opposite(), color);
            assert_eq!(color.opposite().opposite(), color);
        }
    }

    #[test]
    fn week_one_replicates_a_single_color() {
        let mut rng = SeededRng::new(11);
        let counts = ColorCounts::new();
        let mut seen_counts = [false; 3];
        for _ in 0..300 {
            let cue_ctx = ctx(Week::One, 0, AssetSet::A);
            let spec = compute_stage_c_cue_spec(&cue_ctx, &mut rng, &counts);
            assert!((1..=3).contains(&spec.slot_count));
            assert_eq!(spec.slot_colors.len(), usize::from(spec.slot_count));
            assert!(spec.slot_colors.iter().all(|c| *c == spec.slot_colors[0]));
            seen_counts[usize::from(spec.slot_count) - 1] = true;
        }
        assert_eq!(seen_counts, [true; 3]);
    }

    #[test]
    fn week_two_uses_two_distinct_colors() {
        let mut rng = SeededRng::new(12);
        for _ in 0..200 {
            let cue_ctx = ctx(Week::Two, 0, AssetSet::A);
            let spec = compute_stage_c_cue_spec(&cue_ctx, &mut rng, &ColorCounts::new());
            assert_eq!(spec.slot_count, 2);
            assert_ne!(spec.slot_colors[0], spec.slot_colors[1]);
        }
    }

    #[test]
    fn week_three_slot_count_follows_set() {
        let mut rng = SeededRng::new(13);
        let counts = ColorCounts::new();
        let a = compute_stage_c_cue_spec(&ctx(Week::Three, 0, AssetSet::A), &mut rng, &counts);
        let b = compute_stage_c_cue_spec(&ctx(Week::Three, 40_000, AssetSet::B), &mut rng, &counts);
        assert_eq!(a.slot_count, 1);
        assert_eq!(b.slot_count, 2);
        assert_ne!(b.slot_colors[0], b.slot_colors[1]);
    }

    #[test]
    fn week_three_balances_displayed_colors() {
        let mut rng = SeededRng::new(14);
        let mut counts = ColorCounts::new();
        counts.record(Color::Red);
        counts.record(Color::Green);
        counts.record(Color::Yellow);
        // Only blue is at the minimum on screen.
        let spec = compute_stage_c_cue_spec(&ctx(Week::Three, 0, AssetSet::A), &mut rng, &counts);
        assert_eq!(spec.slot_colors, vec![Color::Blue]);
    }

    #[test]
    fn week_four_sequence_length_switches_at_thirty_seconds() {
        let mut rng = SeededRng::new(15);
        let counts = ColorCounts::new();
        let early_ctx = ctx(Week::Four, 29_999, AssetSet::A);
        let early = compute_stage_c_cue_spec(&early_ctx, &mut rng, &counts).memory.unwrap();
        let late_ctx = ctx(Week::Four, 30_000, AssetSet::B);
        let late = compute_stage_c_cue_spec(&late_ctx, &mut rng, &counts).memory.unwrap();
        assert_eq!(early.len(), 2);
        assert_eq!(late.len(), 3);
        assert_ne!(early[0], early[1]);
        assert!(late[0] != late[1] && late[1] != late[2] && late[0] != late[2]);
        assert_eq!(memory_recall_multiplier(2), 2);
        assert_eq!(memory_recall_multiplier(3), 3);
    }

    #[test]
    fn rest_labels_differ_by_week_before_stage_c() {
        assert_ne!(rule_label(Week::Three, 2), rule_label(Week::Four, 2));
        assert_eq!(rule_label(Week::One, 3), rule_label(Week::Four, 3));
        assert!(outro_summary(Week::Two).contains("week 2"));
    }
}
