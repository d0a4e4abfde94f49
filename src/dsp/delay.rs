/// Circular delay buffer.
///
/// The buffer is sized once at construction (on the control thread) and
/// never grows. Reads are linearly interpolated so modulated delay times
/// glide instead of stepping.
pub struct DelayLine {
    buffer: Box<[f32]>,
    write_pos: usize,
}

impl DelayLine {
    /// Allocate enough room for `max_seconds` at `sample_rate`.
    pub fn new(max_seconds: f32, sample_rate: f32) -> Self {
        let len = ((max_seconds * sample_rate).ceil() as usize).max(2) + 1;
        Self {
            buffer: vec![0.0; len].into_boxed_slice(),
            write_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len() - 1
    }

    /// Read `delay_samples` behind the write head without advancing.
    #[inline]
    pub fn read(&self, delay_samples: f32) -> f32 {
        let len = self.buffer.len();
        let delay = delay_samples.clamp(1.0, (len - 1) as f32);
        let whole = delay.floor() as usize;
        let frac = delay - whole as f32;

        let a = self.buffer[(self.write_pos + len - whole) % len];
        let b = self.buffer[(self.write_pos + len - whole - 1) % len];
        a + (b - a) * frac
    }

    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        self.buffer[self.write_pos] = sample;
    }

    /// Feedback delay: returns the delayed signal and writes
    /// `input + delayed · feedback` back into the line.
    #[inline]
    pub fn process(&mut self, input: f32, delay_samples: f32, feedback: f32) -> f32 {
        let delayed = self.read(delay_samples);
        self.write(input + delayed * feedback);
        delayed
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}
