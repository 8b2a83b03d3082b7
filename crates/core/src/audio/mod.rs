use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    timeline::{Frame, Payload, PhaseTag, Timeline},
    Result,
};

/// Steady-state background music gain.
pub const MUSIC_GAIN: f32 = 0.6;
/// Music gain while ducked under rest instructions.
pub const DUCKED_GAIN: f32 = 0.2;
pub const DUCK_RAMP_SECONDS: f64 = 0.3;
pub const MUSIC_FADE_SECONDS: f64 = 1.5;
pub const CUE_GAIN: f32 = 1.0;

pub type BufferId = usize;
pub type VoiceId = u64;

/// Primitives a browser-style audio backend exposes.
pub trait AudioHost {
    /// Monotonic host clock in seconds.
    fn current_time(&self) -> f64;
    fn decode(&mut self, url: &str) -> Result<BufferId>;
    fn play(&mut self, buffer: BufferId, at: f64, gain: f32) -> Result<VoiceId>;
    fn stop(&mut self, voice: VoiceId, at: f64);
    /// Linear ramp of a voice's gain to `target`, starting at `at`.
    fn ramp_gain(&mut self, voice: VoiceId, target: f32, at: f64, ramp_seconds: f64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SoundKind {
    Tick,
    RecallStart,
    Music,
}

/// Sound file URLs. Missing entries are simply never played.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundBank {
    #[serde(default)]
    pub tick: Option<String>,
    #[serde(default)]
    pub recall_start: Option<String>,
    #[serde(default)]
    pub music: Option<String>,
}

impl SoundBank {
    fn entries(&self) -> impl Iterator<Item = (SoundKind, &str)> {
        [
            (SoundKind::Tick, self.tick.as_deref()),
            (SoundKind::RecallStart, self.recall_start.as_deref()),
            (SoundKind::Music, self.music.as_deref()),
        ]
        .into_iter()
        .filter_map(|(kind, url)| url.map(|url| (kind, url)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct StopTimer {
    voice: VoiceId,
    due: f64,
}

#[derive(Debug, Default)]
struct MusicState {
    voice: Option<VoiceId>,
    ducked: bool,
    pending_stop: Option<StopTimer>,
}

/// Explicit audio lifecycle owned by the host application. The host owns the
/// real clock and buffers; times handed to it are host seconds.
#[derive(Debug)]
pub struct AudioSession<H: AudioHost> {
    host: H,
    buffers: BTreeMap<SoundKind, BufferId>,
    music: MusicState,
    /// One-shot voices handed to the host since the last cancel.
    queued: Vec<VoiceId>,
}

impl<H: AudioHost> AudioSession<H> {
    /// Decodes every sound in `bank`. Sounds that fail to load are logged
    /// and left out; the session still works, silently, for those cues.
    pub fn init(mut host: H, bank: &SoundBank) -> Self {
        let mut buffers = BTreeMap::new();
        for (kind, url) in bank.entries() {
            match host.decode(url) {
                Ok(buffer) => {
                    buffers.insert(kind, buffer);
                }
                Err(err) => tracing::warn!(?kind, url, %err, "sound failed to load"),
            }
        }
        tracing::info!(sounds = buffers.len(), "audio session ready");
        Self {
            host,
            buffers,
            music: MusicState::default(),
            queued: Vec::new(),
        }
    }

    /// Stops music and queued sounds immediately, drops timers and hands the
    /// host back.
    pub fn teardown(mut self) -> H {
        let now = self.host.current_time();
        self.cancel_queued(now);
        self.cut_music(now);
        tracing::info!("audio session torn down");
        self.host
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn current_time(&self) -> f64 {
        self.host.current_time()
    }

    pub fn has_sound(&self, kind: SoundKind) -> bool {
        self.buffers.contains_key(&kind)
    }

    pub fn music_playing(&self) -> bool {
        self.music.voice.is_some()
    }

    pub fn stop_pending(&self) -> bool {
        self.music.pending_stop.is_some()
    }

    pub fn queued_sounds(&self) -> usize {
        self.queued.len()
    }

    /// Stops every one-shot sound queued so far and disarms the music stop
    /// timer. Music itself keeps playing.
    pub fn cancel_queued(&mut self, at: f64) {
        for voice in self.queued.drain(..) {
            self.host.stop(voice, at);
        }
        self.music.pending_stop = None;
    }

    /// Stops music at `at` without a fade.
    pub fn cut_music(&mut self, at: f64) {
        self.music.pending_stop = None;
        if let Some(voice) = self.music.voice.take() {
            self.host.stop(voice, at);
        }
    }

    /// Plays a one-shot sound. Returns whether it was handed to the host.
    pub fn play_at(&mut self, kind: SoundKind, at: f64) -> bool {
        let Some(buffer) = self.buffers.get(&kind).copied() else {
            return false;
        };
        match self.host.play(buffer, at, CUE_GAIN) {
            Ok(voice) => {
                self.queued.push(voice);
                true
            }
            Err(err) => {
                tracing::warn!(?kind, %err, "sound playback failed");
                false
            }
        }
    }

    /// Starts background music at `at`, fading in. Any armed stop timer is
    /// cancelled and a still-fading voice is cut.
    pub fn start_music(&mut self, at: f64, fade_seconds: f64) {
        self.cut_music(at);
        let Some(buffer) = self.buffers.get(&SoundKind::Music).copied() else {
            return;
        };
        match self.host.play(buffer, at, 0.0) {
            Ok(voice) => {
                self.host.ramp_gain(voice, MUSIC_GAIN, at, fade_seconds);
                self.music.voice = Some(voice);
                self.music.ducked = false;
            }
            Err(err) => tracing::warn!(%err, "background music failed to start"),
        }
    }

    pub fn duck_music(&mut self, at: f64) {
        if let Some(voice) = self.music.voice {
            self.host.ramp_gain(voice, DUCKED_GAIN, at, DUCK_RAMP_SECONDS);
            self.music.ducked = true;
        }
    }

    pub fn unduck_music(&mut self, at: f64) {
        if let Some(voice) = self.music.voice {
            if self.music.ducked {
                self.host.ramp_gain(voice, MUSIC_GAIN, at, DUCK_RAMP_SECONDS);
                self.music.ducked = false;
            }
        }
    }

    /// Fades music out from `at` and arms a stop timer for the end of the
    /// fade. Re-arming replaces the previous timer.
    pub fn stop_music(&mut self, at: f64, fade_seconds: f64) {
        if let Some(voice) = self.music.voice {
            self.host.ramp_gain(voice, 0.0, at, fade_seconds);
            self.music.pending_stop = Some(StopTimer {
                voice,
                due: at + fade_seconds,
            });
        }
    }

    /// Fires timers that are due on the host clock.
    pub fn poll(&mut self) {
        let now = self.host.current_time();
        if let Some(timer) = self.music.pending_stop {
            if now >= timer.due {
                self.music.pending_stop = None;
                self.host.stop(timer.voice, timer.due);
                if self.music.voice == Some(timer.voice) {
                    self.music.voice = None;
                }
            }
        }
    }
}

/// Pairs the timeline origin with the present moment, both in host
/// wall-clock milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleAnchor {
    pub start_ms: f64,
    pub now_ms: f64,
}

impl ScheduleAnchor {
    pub fn new(start_ms: f64, now_ms: f64) -> Self {
        Self { start_ms, now_ms }
    }

    /// Timeline position right now.
    pub fn elapsed_ms(&self) -> f64 {
        (self.now_ms - self.start_ms).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundCue {
    pub at_ms: u32,
    pub kind: SoundKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MusicAction {
    Start,
    Duck,
    Unduck,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicCue {
    pub at_ms: u32,
    pub action: MusicAction,
}

/// Ticks on every countdown beat and cue onset, plus a recall sound at the
/// first blank after each memory sequence. Week 3 has no memory sequences
/// and so gets no recall sounds.
pub fn plan_sound_cues(timeline: &Timeline) -> Vec<SoundCue> {
    let mut cues = Vec::new();
    let mut after_memory = false;
    for event in timeline.events() {
        match (event.frame, &event.payload) {
            (Frame::Hold, Some(Payload::Ready { .. })) | (Frame::Cue, _) => cues.push(SoundCue {
                at_ms: event.t0,
                kind: SoundKind::Tick,
            }),
            (Frame::Blank, _) if after_memory => cues.push(SoundCue {
                at_ms: event.t0,
                kind: SoundKind::RecallStart,
            }),
            _ => {}
        }
        after_memory = event.is_cue() && event.memory().is_some();
    }
    cues
}

/// Music runs from stage A to the outro, ducked during rests.
pub fn plan_music_cues(timeline: &Timeline) -> Vec<MusicCue> {
    let mut cues = Vec::new();
    let mut previous: Option<PhaseTag> = None;
    for event in timeline.events() {
        if previous == Some(event.phase) {
            continue;
        }
        let action = match event.phase {
            PhaseTag::StageA => Some(MusicAction::Start),
            PhaseTag::Rest1 | PhaseTag::Rest2 | PhaseTag::Rest3 => Some(MusicAction::Duck),
            PhaseTag::StageB | PhaseTag::StageC => Some(MusicAction::Unduck),
            PhaseTag::Outro => Some(MusicAction::Stop),
            PhaseTag::Intro | PhaseTag::Ready => None,
        };
        if let Some(action) = action {
            cues.push(MusicCue {
                at_ms: event.t0,
                action,
            });
        }
        previous = Some(event.phase);
    }
    cues
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub scheduled: usize,
    pub skipped_elapsed: usize,
    pub skipped_missing: usize,
}

/// Precomputed sound plan for one timeline.
#[derive(Debug, Clone)]
pub struct AudioScheduler {
    sounds: Vec<SoundCue>,
    music: Vec<MusicCue>,
}

impl AudioScheduler {
    pub fn new(timeline: &Timeline) -> Self {
        Self {
            sounds: plan_sound_cues(timeline),
            music: plan_music_cues(timeline),
        }
    }

    pub fn sound_cues(&self) -> &[SoundCue] {
        &self.sounds
    }

    pub fn music_cues(&self) -> &[MusicCue] {
        &self.music
    }

    /// Hands every future cue to the host with an absolute dispatch time.
    /// Sounds and the stop timer left by an earlier call are cancelled first,
    /// so rescheduling after a seek replaces the old plan. Cues already in
    /// the past are skipped. Music that should already be running is started
    /// immediately.
    pub fn schedule<H: AudioHost>(
        &self,
        session: &mut AudioSession<H>,
        anchor: ScheduleAnchor,
    ) -> DispatchSummary {
        let elapsed = anchor.elapsed_ms();
        let now = session.current_time();
        let dispatch_at = |at_ms: u32| now + (f64::from(at_ms) - elapsed) / 1000.0;
        let mut summary = DispatchSummary::default();

        session.cancel_queued(now);
        self.resume_music(session, elapsed, now);
        for cue in &self.sounds {
            if f64::from(cue.at_ms) < elapsed {
                summary.skipped_elapsed += 1;
            } else if session.play_at(cue.kind, dispatch_at(cue.at_ms)) {
                summary.scheduled += 1;
            } else {
                summary.skipped_missing += 1;
            }
        }

        for cue in &self.music {
            if f64::from(cue.at_ms) < elapsed {
                continue;
            }
            let at = dispatch_at(cue.at_ms);
            match cue.action {
                MusicAction::Start => session.start_music(at, MUSIC_FADE_SECONDS),
                MusicAction::Duck => session.duck_music(at),
                MusicAction::Unduck => session.unduck_music(at),
                MusicAction::Stop => session.stop_music(at, MUSIC_FADE_SECONDS),
            }
        }

        tracing::debug!(
            scheduled = summary.scheduled,
            skipped_elapsed = summary.skipped_elapsed,
            skipped_missing = summary.skipped_missing,
            elapsed_ms = elapsed,
            "audio scheduled"
        );
        summary
    }

    /// Restores the music state a mid-timeline restart should be in.
    fn resume_music<H: AudioHost>(&self, session: &mut AudioSession<H>, elapsed: f64, now: f64) {
        let last = self
            .music
            .iter()
            .take_while(|cue| f64::from(cue.at_ms) < elapsed)
            .last()
            .map(|cue| cue.action);
        match last {
            Some(MusicAction::Start | MusicAction::Unduck) => {
                session.start_music(now, DUCK_RAMP_SECONDS)
            }
            Some(MusicAction::Duck) => {
                session.start_music(now, DUCK_RAMP_SECONDS);
                session.duck_music(now);
            }
            Some(MusicAction::Stop) | None => session.cut_music(now),
        }
    }
}
