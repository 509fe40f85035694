//! Voice mixer feeding the output stream
//!
//! Each opened source owns a [`Voice`]: a decoded clip at the device sample
//! rate plus a cursor and volume. The output callback calls [`Mixer::fill`],
//! which sums every playing voice into the device buffer. Voices whose
//! source has been dropped are pruned on the next fill.

use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
pub struct Voice {
    /// Interleaved stereo at the device rate
    samples: Vec<f32>,
    cursor: usize,
    volume: f32,
    playing: bool,
    ended: bool,
}

impl Voice {
    pub fn new(samples: Vec<f32>) -> Self {
        Self {
            samples,
            cursor: 0,
            volume: 1.0,
            playing: false,
            ended: false,
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn seek(&mut self, frame: usize) {
        self.cursor = frame.min(self.frames());
        self.ended = false;
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        if playing && self.cursor >= self.frames() {
            self.cursor = 0;
        }
        self.playing = playing;
        if playing {
            self.ended = false;
        }
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Add this voice into `out` (interleaved stereo), advancing the cursor
    fn mix_into(&mut self, out: &mut [f32]) {
        if !self.playing {
            return;
        }
        let remaining = self.frames().saturating_sub(self.cursor);
        let frames = remaining.min(out.len() / 2);
        let start = self.cursor * 2;
        let src = &self.samples[start..start + frames * 2];

        for (dst, s) in out.iter_mut().zip(src) {
            *dst += s * self.volume;
        }
        self.cursor += frames;

        if self.cursor >= self.frames() {
            self.playing = false;
            self.ended = true;
        }
    }
}

pub type SharedVoice = Arc<Mutex<Voice>>;

pub fn lock_voice(voice: &SharedVoice) -> MutexGuard<'_, Voice> {
    voice.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Default)]
pub struct Mixer {
    voices: Mutex<Vec<SharedVoice>>,
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, voice: Voice) -> SharedVoice {
        let shared = Arc::new(Mutex::new(voice));
        self.lock().push(Arc::clone(&shared));
        shared
    }

    pub fn voice_count(&self) -> usize {
        self.lock().len()
    }

    /// Render one device buffer of interleaved stereo
    pub fn fill(&self, out: &mut [f32]) {
        out.fill(0.0);
        let mut voices = self.lock();
        voices.retain(|v| Arc::strong_count(v) > 1);
        for voice in voices.iter() {
            lock_voice(voice).mix_into(out);
        }
        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SharedVoice>> {
        self.voices.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paused_voice_is_silent() {
        let mixer = Mixer::new();
        let _voice = mixer.add(Voice::new(vec![0.5; 8]));

        let mut out = vec![1.0; 4];
        mixer.fill(&mut out);
        assert_eq!(out, vec![0.0; 4]);
    }

    #[test]
    fn test_voices_sum_with_volume() {
        let mixer = Mixer::new();
        let a = mixer.add(Voice::new(vec![0.4; 8]));
        let b = mixer.add(Voice::new(vec![0.2; 8]));
        lock_voice(&a).set_playing(true);
        {
            let mut b = lock_voice(&b);
            b.set_playing(true);
            b.set_volume(0.5);
        }

        let mut out = vec![0.0; 4];
        mixer.fill(&mut out);
        for s in out {
            assert!((s - 0.5).abs() < 1e-6);
        }
        assert_eq!(lock_voice(&a).cursor(), 2);
    }

    #[test]
    fn test_voice_ends_at_last_frame() {
        let mixer = Mixer::new();
        let voice = mixer.add(Voice::new(vec![0.1; 6]));
        lock_voice(&voice).set_playing(true);

        let mut out = vec![0.0; 8];
        mixer.fill(&mut out);

        let v = lock_voice(&voice);
        assert!(v.has_ended());
        assert!(!v.is_playing());
        assert_eq!(out[6], 0.0);
    }

    #[test]
    fn test_dropped_voice_is_pruned() {
        let mixer = Mixer::new();
        let voice = mixer.add(Voice::new(vec![0.1; 4]));
        assert_eq!(mixer.voice_count(), 1);

        drop(voice);
        let mut out = vec![0.0; 2];
        mixer.fill(&mut out);
        assert_eq!(mixer.voice_count(), 0);
    }

    #[test]
    fn test_output_is_clamped() {
        let mixer = Mixer::new();
        let voices: Vec<SharedVoice> = (0..3)
            .map(|_| mixer.add(Voice::new(vec![0.9; 2])))
            .collect();
        for v in &voices {
            lock_voice(v).set_playing(true);
        }
        let mut out = vec![0.0; 2];
        mixer.fill(&mut out);
        assert_eq!(out, vec![1.0, 1.0]);
    }
}
