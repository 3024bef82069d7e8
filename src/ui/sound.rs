/// Sound engine: procedural 8-bit style sound effects via rodio.
///
/// All sounds are generated as in-memory WAV buffers at init time.
/// Playback is fire-and-forget (non-blocking) via rodio's Sink.
/// Game events pick their effect through `sfx_for`.
///
/// Compile with `--no-default-features` or without "sound" feature
/// to disable audio entirely (the stub SoundEngine does nothing).

use crate::sim::event::GameEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sfx {
    Jump,
    Land,
    Splash,
    Click,
    Beam,
    Water,
    Die,
    Respawn,
    Clear,
}

/// Which effect an event makes, if any.
pub fn sfx_for(event: &GameEvent) -> Option<Sfx> {
    match event {
        GameEvent::PlayerJumped => Some(Sfx::Jump),
        GameEvent::PlayerLanded => Some(Sfx::Land),
        GameEvent::PlayerSplashed => Some(Sfx::Splash),
        GameEvent::SwitchToggled { .. } | GameEvent::SpawnChanged { .. } => Some(Sfx::Click),
        GameEvent::MirrorLit { .. } => Some(Sfx::Beam),
        GameEvent::WaterRose { .. } => Some(Sfx::Water),
        GameEvent::PlayerDied => Some(Sfx::Die),
        GameEvent::PlayerRespawned => Some(Sfx::Respawn),
        GameEvent::LevelCompleted => Some(Sfx::Clear),
        GameEvent::ExitReached { .. } | GameEvent::MirrorDark { .. } | GameEvent::WaterDrained { .. } => None,
    }
}

#[cfg(feature = "sound")]
mod inner {
    use std::collections::HashMap;
    use std::f32::consts::PI;
    use std::io::Cursor;
    use std::sync::Arc;

    use rodio::{OutputStream, OutputStreamHandle, Sink};

    use super::Sfx;

    pub(super) const SAMPLE_RATE: u32 = 22050;

    /// Pre-generated WAV buffers for each sound effect.
    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        buffers: HashMap<Sfx, Arc<Vec<u8>>>,
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = OutputStream::try_default().ok()?;

            let buffers = [
                (Sfx::Jump, gen_sweep(300.0, 700.0, 0.09, 0.2)),
                (Sfx::Land, gen_noise(0.05, 0.15, 7)),
                (Sfx::Splash, gen_noise(0.2, 0.25, 99)),
                (Sfx::Click, gen_blip(1200.0, 0.03, 0.25)),
                (Sfx::Beam, gen_sweep(900.0, 1400.0, 0.06, 0.15)),
                (Sfx::Water, gen_sweep(180.0, 120.0, 0.12, 0.15)),
                (Sfx::Die, gen_notes(&[440.0, 370.0, 311.0, 261.0], 0.12, false)),
                (Sfx::Respawn, gen_notes(&[523.0, 784.0], 0.06, false)),
                (Sfx::Clear, gen_notes(&[523.0, 659.0, 784.0, 1047.0], 0.1, true)),
            ]
            .into_iter()
            .map(|(sfx, samples)| (sfx, Arc::new(make_wav(&samples))))
            .collect();

            Some(SoundEngine { _stream: stream, handle, buffers })
        }

        pub fn play(&self, sfx: Sfx) {
            let Some(buf) = self.buffers.get(&sfx) else { return };
            if let Ok(sink) = Sink::try_new(&self.handle) {
                let cursor = Cursor::new(buf.as_ref().clone());
                if let Ok(src) = rodio::Decoder::new(cursor) {
                    sink.append(src);
                    sink.detach(); // fire-and-forget
                }
            }
        }
    }

    // ════════════════════════════════════════════════════════════
    //  Waveform generators: all produce Vec<f32> mono samples
    // ════════════════════════════════════════════════════════════

    fn sample_count(duration: f32) -> usize {
        (SAMPLE_RATE as f32 * duration) as usize
    }

    /// Sine blip with a linear fade out
    fn gen_blip(freq: f32, duration: f32, volume: f32) -> Vec<f32> {
        let n = sample_count(duration);
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32);
                (t * freq * 2.0 * PI).sin() * env * volume
            })
            .collect()
    }

    /// Pitch glide from `from` to `to` Hz
    fn gen_sweep(from: f32, to: f32, duration: f32, volume: f32) -> Vec<f32> {
        let n = sample_count(duration);
        let mut phase = 0.0_f32;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                let freq = from + (to - from) * t;
                phase += freq * 2.0 * PI / SAMPLE_RATE as f32;
                let env = (1.0 - t).powf(0.6);
                phase.sin() * env * volume
            })
            .collect()
    }

    /// LCG noise burst
    fn gen_noise(duration: f32, volume: f32, seed: u32) -> Vec<f32> {
        let n = sample_count(duration);
        let mut rng = seed;
        (0..n)
            .map(|i| {
                rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
                let noise = (rng as f32 / u32::MAX as f32) * 2.0 - 1.0;
                let env = (1.0 - i as f32 / n as f32).powf(1.5);
                noise * env * volume
            })
            .collect()
    }

    /// A run of notes; `sustain` holds the last one out
    fn gen_notes(notes: &[f32], note_dur: f32, sustain: bool) -> Vec<f32> {
        let mut samples = Vec::new();
        for &freq in notes {
            let n = sample_count(note_dur);
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32) * 0.3;
                let wave = (t * freq * 2.0 * PI).sin() * 0.7
                    + (t * freq * 2.0 * 2.0 * PI).sin() * 0.3;
                samples.push(wave * env * 0.3);
            }
        }
        if let (true, Some(&last)) = (sustain, notes.last()) {
            let n = sample_count(0.25);
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32);
                samples.push((t * last * 2.0 * PI).sin() * env * 0.3);
            }
        } else {
            let fade_len = samples.len() / 4;
            let total = samples.len();
            for (k, s) in samples[total - fade_len..].iter_mut().enumerate() {
                *s *= (fade_len - k) as f32 / fade_len as f32;
            }
        }
        samples
    }

    // ════════════════════════════════════════════════════════════
    //  WAV encoder: wraps f32 samples into a valid WAV buffer
    // ════════════════════════════════════════════════════════════

    pub(super) fn make_wav(samples: &[f32]) -> Vec<u8> {
        let num_channels: u16 = 1;
        let bits_per_sample: u16 = 16;
        let byte_rate = SAMPLE_RATE * (num_channels as u32) * (bits_per_sample as u32) / 8;
        let block_align = num_channels * bits_per_sample / 8;
        let data_size = samples.len() as u32 * 2;
        let file_size = 36 + data_size;

        let mut buf = Vec::with_capacity(44 + data_size as usize);

        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&file_size.to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&num_channels.to_le_bytes());
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&bits_per_sample.to_le_bytes());

        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());

        for &s in samples {
            let val = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
            buf.extend_from_slice(&val.to_le_bytes());
        }

        buf
    }

    #[cfg(test)]
    pub(super) fn notes_len(notes: &[f32], note_dur: f32, sustain: bool) -> usize {
        gen_notes(notes, note_dur, sustain).len()
    }
}

// ════════════════════════════════════════════════════════════
//  Public API: compiles to no-ops when sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn play(&self, _sfx: Sfx) {}
}

impl SoundEngine {
    pub fn play_events(&self, events: &[GameEvent]) {
        // One of each effect per tick
        let mut played: Vec<Sfx> = Vec::with_capacity(events.len());
        for sfx in events.iter().filter_map(sfx_for) {
            if !played.contains(&sfx) {
                self.play(sfx);
                played.push(sfx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_pick_their_effects() {
        assert_eq!(sfx_for(&GameEvent::PlayerJumped), Some(Sfx::Jump));
        assert_eq!(sfx_for(&GameEvent::SwitchToggled { id: "S1".into(), on: true }), Some(Sfx::Click));
        assert_eq!(sfx_for(&GameEvent::WaterDrained { tiles: 3 }), None);
        assert_eq!(sfx_for(&GameEvent::LevelCompleted), Some(Sfx::Clear));
    }

    #[cfg(feature = "sound")]
    #[test]
    fn wav_header_matches_the_samples() {
        let wav = inner::make_wav(&[0.0, 1.0, -1.0]);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(wav.len(), 44 + 6);
        assert_eq!(i16::from_le_bytes([wav[46], wav[47]]), 32767);
        assert_eq!(u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]), inner::SAMPLE_RATE);
    }

    #[cfg(feature = "sound")]
    #[test]
    fn sustained_runs_are_longer() {
        assert!(inner::notes_len(&[440.0, 660.0], 0.1, true) > inner::notes_len(&[440.0, 660.0], 0.1, false));
    }
}
