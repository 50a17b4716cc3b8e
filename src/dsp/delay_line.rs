//! # Delay Line (The Bucket Chain)
//!
//! A bucket-brigade chip is a long chain of capacitors. On every clock tick
//! each capacitor hands its charge to the next one, so a voltage sampled at
//! the input arrives at the output a fixed number of ticks later. In the
//! digital model the chain becomes a ring buffer: one slot per "bucket",
//! a write head that moves forward once per sample, and a read head that
//! sits some distance behind it.
//!
//! ```text
//!            write_pos
//!                ▼
//!   ┌───┬───┬───┬───┬───┬───┬───┬───┐
//!   │ d │ e │ f │ · │ a │ b │ c │ … │     `read_interpolated(3.0)` → e
//!   └───┴───┴───┴───┴───┴───┴───┴───┘     `read_interpolated(1.0)` → f
//! ```
//!
//! ## Warm-up guard
//!
//! Right after `prepare()` or `clear()` the buffer is all zeros, but those
//! zeros were never *written*. A read that reaches further back than the
//! number of samples written since the last clear returns silence instead
//! of pretending the ring has history. The same applies to any read past
//! the physical capacity.
//!
//! ## Fractional delays
//!
//! Chorus modulation moves the read head continuously, so the read position
//! is almost never a whole number. Adjacent buckets are blended linearly:
//!
//! ```text
//! result = a + (b - a) * frac
//! ```

use std::num::NonZeroUsize;

/// A preallocated ring buffer modeling a BBD bucket chain.
///
/// All memory is allocated in [`new()`](Self::new), which the engine only
/// calls from `prepare()`. Reads and writes never allocate.
pub struct DelayLine {
    /// The buckets. One slot more than the usable capacity so a read at
    /// exactly `capacity` samples can still reach its interpolation partner.
    buffer: Vec<f32>,

    /// Next slot to be overwritten.
    write_pos: usize,

    /// Cached `buffer.len()`.
    buffer_len: usize,

    /// Samples written since the last clear, saturating at `buffer_len`.
    written: usize,
}

impl DelayLine {
    /// Create a delay line able to delay by up to `capacity` samples.
    ///
    /// `NonZeroUsize` rules out the zero-length ring, which would make the
    /// modular index arithmetic divide by zero.
    pub fn new(capacity: NonZeroUsize) -> Self {
        let buffer_len = capacity.get() + 1;
        Self {
            buffer: vec![0.0; buffer_len],
            write_pos: 0,
            buffer_len,
            written: 0,
        }
    }

    /// Longest delay, in samples, this line can produce.
    pub fn capacity(&self) -> usize {
        self.buffer_len - 1
    }

    /// Number of samples written since the last clear (saturating).
    pub fn written(&self) -> usize {
        self.written
    }

    /// Store one sample and advance the write head.
    ///
    /// Once the ring is full the oldest sample is overwritten. The cursor
    /// moves exactly once per call.
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer_len;
        self.written = (self.written + 1).min(self.buffer_len);
    }

    /// Read `delay_samples` behind the write head with linear interpolation.
    ///
    /// A delay of `1.0` is the most recently written sample. Delays below
    /// one sample are clamped to `1.0`. Returns `0.0` when the delay is not
    /// finite, longer than [`capacity()`](Self::capacity), or reaches past
    /// what has been written since the last clear.
    pub fn read_interpolated(&self, delay_samples: f32) -> f32 {
        if !delay_samples.is_finite() {
            return 0.0;
        }

        let delay = delay_samples.max(1.0);
        if delay > self.capacity() as f32 || delay > self.written as f32 {
            return 0.0;
        }

        let delay_int = delay as usize;
        let delay_frac = delay - delay_int as f32;

        let sample_a = self.tap(delay_int);
        if delay_frac == 0.0 {
            return sample_a;
        }
        let sample_b = self.tap(delay_int + 1);

        sample_a + (sample_b - sample_a) * delay_frac
    }

    /// Sample written `age` writes ago (`age >= 1`), or silence if that
    /// bucket has never been filled.
    fn tap(&self, age: usize) -> f32 {
        if age == 0 || age > self.written {
            return 0.0;
        }
        self.buffer[(self.write_pos + self.buffer_len - age) % self.buffer_len]
    }

    /// Silence the buffer and forget its history.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
        self.written = 0;
    }
}
