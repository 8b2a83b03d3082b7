//! Core library for the Think timeline compiler.
//!
//! The crate turns a small [`ThinkConfig`] into a fully reproducible
//! 150-second [`Timeline`] of cue/blank/hold events and provides the readers
//! that consume it: a structural validator, a statistical verifier, a
//! playback cursor and an audio scheduler. Each module owns one subsystem;
//! rendering and storage stay with the host application.

pub mod assets;
pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod rng;
pub mod rules;
pub mod timeline;
pub mod validate;
pub mod verify;

pub use assets::{
    get_pack_for_week, preload_for_config, preload_think_pack, preload_think_pack_by_month,
    preload_think_pack_by_week, AssetCatalog, AssetCoordinate, AssetPack, AssetSet, ImageFetcher,
    PreloadReport,
};
pub use audio::{
    plan_music_cues, plan_sound_cues, AudioHost, AudioScheduler, AudioSession, DispatchSummary,
    MusicAction, MusicCue, ScheduleAnchor, SoundBank, SoundCue, SoundKind,
};
pub use config::{AudienceProfile, ThinkConfig};
pub use error::{Result, ThinkError};
pub use playback::{find_current_event_o1, Playback, PlaybackClock, PlaybackCursor};
pub use rng::SeededRng;
pub use rules::{compute_stage_c_cue_spec, Color, ColorCounts, CueContext, CueSpec, Week};
pub use timeline::{
    build_timeline, Frame, Layout, MemoryCue, Payload, PhaseTag, PhaseWindow, StageCCue,
    ThinkTimelineEvent, Timeline, PHASE_WINDOWS, TOTAL_MS,
};
pub use validate::{validate_timeline, ValidationResult};
pub use verify::{
    verify_config, verify_timeline, TimelineStats, VerificationCheck, VerificationReport,
};
