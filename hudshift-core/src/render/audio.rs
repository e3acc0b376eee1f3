//! Audio side of the core filter graph: tempo correction and music ducking.

use crate::config::DuckingConfig;
use crate::edit::MusicTrack;
use crate::utils::{fmt_factor, fmt_secs};

/// Range a single `atempo` instance accepts.
pub const ATEMPO_MIN: f64 = 0.5;
pub const ATEMPO_MAX: f64 = 2.0;

/// Output sample rate of every render.
pub const SAMPLE_RATE: u32 = 48_000;

/// Splits `speed` into `atempo` factors, each within [0.5, 2.0].
///
/// Returns an empty chain for unit speed.
#[must_use]
pub fn atempo_chain(speed: f64) -> Vec<f64> {
    let mut factors = Vec::new();
    if !speed.is_finite() || speed <= 0.0 || (speed - 1.0).abs() < f64::EPSILON {
        return factors;
    }
    let mut remaining = speed;
    while remaining > ATEMPO_MAX {
        factors.push(ATEMPO_MAX);
        remaining /= ATEMPO_MAX;
    }
    while remaining < ATEMPO_MIN {
        factors.push(ATEMPO_MIN);
        remaining /= ATEMPO_MIN;
    }
    factors.push(remaining);
    factors
}

/// `atempo=a,atempo=b` for `speed`, or `None` for unit speed.
#[must_use]
pub fn atempo_filter(speed: f64) -> Option<String> {
    let chain = atempo_chain(speed);
    if chain.is_empty() {
        return None;
    }
    Some(
        chain
            .iter()
            .map(|factor| format!("atempo={}", fmt_tempo(*factor)))
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// Six decimals so chained factors multiply back to the requested speed.
fn fmt_tempo(factor: f64) -> String {
    let text = format!("{factor:.6}");
    let trimmed = text.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{trimmed}0")
    } else {
        trimmed.to_string()
    }
}

/// Where the game audio comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameAudio {
    /// The source's first audio stream.
    Source,
    /// Synthesized silence of the given output length.
    Silent { duration: f64 },
}

/// Builds the `[acore]` chain.
pub struct AudioGraph<'a> {
    pub game: GameAudio,
    pub speed: f64,
    /// Length of the core clip in output seconds.
    pub output_duration: f64,
    pub music: Option<&'a MusicTrack>,
    pub ducking: &'a DuckingConfig,
    pub out_label: &'a str,
}

impl AudioGraph<'_> {
    #[must_use]
    pub fn build(&self) -> String {
        match self.music {
            None => self.game_chain(&[format!("aresample={SAMPLE_RATE}[{}]", self.out_label)]),
            Some(music) => self.ducked_mix(music),
        }
    }

    /// Game audio followed by `tail` filters.
    fn game_chain(&self, tail: &[String]) -> String {
        let (input, mut filters) = match self.game {
            GameAudio::Source => (
                "[0:a]",
                atempo_filter(self.speed).into_iter().collect::<Vec<_>>(),
            ),
            GameAudio::Silent { duration } => (
                "",
                vec![
                    format!("anullsrc=channel_layout=stereo:sample_rate={SAMPLE_RATE}"),
                    format!("atrim=duration={}", fmt_secs(duration)),
                ],
            ),
        };
        filters.extend(tail.iter().cloned());
        format!("{input}{}", filters.join(","))
    }

    fn ducked_mix(&self, music: &MusicTrack) -> String {
        let d = self.ducking;
        let duration = self.output_duration;
        let mut music_chain = format!(
            "[1:a]atrim=start={}:duration={},asetpts=PTS-STARTPTS,volume={},aresample={SAMPLE_RATE}",
            fmt_secs(music.offset_seconds),
            fmt_secs(duration),
            fmt_factor(music.volume),
        );
        let fade = d.music_fade_seconds.min(duration / 3.0);
        if fade > 0.0 {
            music_chain.push_str(&format!(
                ",afade=t=in:st=0:d={fade},afade=t=out:st={start}:d={fade}",
                fade = fmt_secs(fade),
                start = fmt_secs((duration - fade).max(0.0)),
            ));
        }

        [
            self.game_chain(&[
                format!("aresample={SAMPLE_RATE}"),
                "asplit=2[game_out][game_pre]".to_string(),
            ]),
            format!(
                "[game_pre]highpass=f={},lowpass=f={},agate=threshold={}[game_trig]",
                d.trigger_highpass_hz,
                d.trigger_lowpass_hz,
                fmt_factor(d.gate_threshold)
            ),
            format!("{music_chain},asplit=2[mus_a][mus_b]"),
            format!("[mus_a]lowpass=f={}[mus_low]", d.crossover_hz),
            format!("[mus_b]highpass=f={}[mus_high]", d.crossover_hz),
            format!(
                "[mus_high][game_trig]sidechaincompress=threshold={}:ratio={}:attack={}:release={}:detection={}[mus_ducked]",
                fmt_factor(d.threshold),
                fmt_secs(d.ratio),
                fmt_secs(d.attack_ms),
                fmt_secs(d.release_ms),
                d.detection.as_str()
            ),
            "[mus_low][mus_ducked]amix=inputs=2:duration=first:normalize=0[mus_mix]".to_string(),
            format!(
                "[game_out][mus_mix]amix=inputs=2:duration=first:normalize=0,alimiter=limit={},aresample={SAMPLE_RATE}[{}]",
                fmt_factor(d.limiter),
                self.out_label
            ),
        ]
        .join(";")
    }
}
