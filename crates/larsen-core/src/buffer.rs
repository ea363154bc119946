//! Secure fixed-capacity sample storage.
//!
//! [`SecureSampleBuffer`] owns one analysis tick's worth of multi-channel
//! samples in channel-major order. All analysis access goes through
//! [`SecureSampleBuffer::with_scoped_access`], which validates the requested
//! region and zeroes every channel when the closure returns — success or
//! failure — so captured audio never outlives a single processing call.
//! Dropping the buffer runs the same zeroing pass.

use alloc::{vec, vec::Vec};

/// Errors from buffer allocation, loading, and scoped access.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BufferError {
    /// Allocation was requested with a zero channel count or frame capacity.
    Allocation {
        /// Requested number of channels.
        channel_count: usize,
        /// Requested capacity in frames.
        frame_capacity: usize,
    },
    /// The requested frame length is zero or exceeds the buffer capacity.
    FrameLength {
        /// Requested length in frames.
        frame_length: usize,
        /// Capacity of the buffer in frames.
        frame_capacity: usize,
    },
    /// An interleaved slice does not divide into whole frames.
    RaggedInterleave {
        /// Length of the offending slice.
        len: usize,
        /// Channel count the slice was measured against.
        channel_count: usize,
    },
    /// A sample is NaN or infinite.
    NonFinite {
        /// Channel holding the offending sample.
        channel: usize,
        /// Frame index of the offending sample.
        frame: usize,
    },
    /// A sample magnitude exceeds full scale (|x| > 1.0).
    OutOfRange {
        /// Channel holding the offending sample.
        channel: usize,
        /// Frame index of the offending sample.
        frame: usize,
        /// The offending value.
        value: f32,
    },
}

#[cfg(feature = "std")]
impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Allocation {
                channel_count,
                frame_capacity,
            } => write!(
                f,
                "cannot allocate buffer with {channel_count} channels x {frame_capacity} frames"
            ),
            Self::FrameLength {
                frame_length,
                frame_capacity,
            } => write!(
                f,
                "frame length {frame_length} outside valid range 1..={frame_capacity}"
            ),
            Self::RaggedInterleave { len, channel_count } => write!(
                f,
                "interleaved slice of {len} samples is not a whole number of {channel_count}-channel frames"
            ),
            Self::NonFinite { channel, frame } => {
                write!(f, "non-finite sample at channel {channel}, frame {frame}")
            }
            Self::OutOfRange {
                channel,
                frame,
                value,
            } => write!(
                f,
                "sample {value} at channel {channel}, frame {frame} exceeds full scale"
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BufferError {}

/// Validated view over the first `frame_length` frames of every channel.
///
/// Handed to the closure passed to [`SecureSampleBuffer::with_scoped_access`];
/// the view cannot outlive the call, so the zeroing pass always runs after
/// the last access.
pub struct ChannelFrames<'a> {
    samples: &'a mut [f32],
    channel_count: usize,
    frame_length: usize,
    frame_capacity: usize,
}

impl ChannelFrames<'_> {
    /// Number of channels in the view.
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Number of validated frames per channel.
    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    /// Validated samples of one channel.
    ///
    /// # Panics
    /// Panics if `channel >= channel_count()`.
    pub fn channel(&self, channel: usize) -> &[f32] {
        let start = channel * self.frame_capacity;
        &self.samples[start..start + self.frame_length]
    }

    /// Mutable access to the validated samples of one channel.
    ///
    /// # Panics
    /// Panics if `channel >= channel_count()`.
    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        let start = channel * self.frame_capacity;
        &mut self.samples[start..start + self.frame_length]
    }
}

/// Fixed-capacity multi-channel sample buffer with guaranteed zeroing.
///
/// Allocated once per analysis session, filled and cleared once per tick.
/// Channel memory is overwritten with zeros before the buffer is reused or
/// destroyed, bounding the lifetime of captured audio to a single
/// [`with_scoped_access`](Self::with_scoped_access) call.
#[derive(Debug)]
pub struct SecureSampleBuffer {
    /// Channel-major storage: `channel_count * frame_capacity` samples.
    samples: Vec<f32>,
    channel_count: usize,
    frame_capacity: usize,
}

impl SecureSampleBuffer {
    /// Allocate a zeroed buffer for `channel_count` channels of
    /// `frame_capacity` frames each.
    pub fn new(channel_count: usize, frame_capacity: usize) -> Result<Self, BufferError> {
        if channel_count == 0 || frame_capacity == 0 {
            return Err(BufferError::Allocation {
                channel_count,
                frame_capacity,
            });
        }
        Ok(Self {
            samples: vec![0.0; channel_count * frame_capacity],
            channel_count,
            frame_capacity,
        })
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Capacity in frames per channel.
    pub fn frame_capacity(&self) -> usize {
        self.frame_capacity
    }

    /// De-interleave one tick's worth of frames into channel-major storage.
    ///
    /// The slice length must be a whole number of frames and fit within the
    /// buffer capacity. Sample values are not validated here — validation
    /// happens at [`with_scoped_access`](Self::with_scoped_access), so a
    /// rejected tick still gets cleared by the next scoped call or by drop.
    ///
    /// Returns the number of frames written.
    pub fn write_interleaved(&mut self, interleaved: &[f32]) -> Result<usize, BufferError> {
        if interleaved.len() % self.channel_count != 0 {
            return Err(BufferError::RaggedInterleave {
                len: interleaved.len(),
                channel_count: self.channel_count,
            });
        }
        let frames = interleaved.len() / self.channel_count;
        if frames == 0 || frames > self.frame_capacity {
            return Err(BufferError::FrameLength {
                frame_length: frames,
                frame_capacity: self.frame_capacity,
            });
        }
        for frame in 0..frames {
            for channel in 0..self.channel_count {
                self.samples[channel * self.frame_capacity + frame] =
                    interleaved[frame * self.channel_count + channel];
            }
        }
        Ok(frames)
    }

    /// Run `f` against the validated first `frame_length` frames, then zero
    /// the whole buffer.
    ///
    /// Validation requires `0 < frame_length <= frame_capacity` and every
    /// sample in the region to be finite and within [-1.0, 1.0]. On
    /// validation failure the error is returned and nothing else happens.
    /// Once validation passes, the zeroing pass covers every channel up to
    /// full capacity and runs whether `f` succeeds or fails. The workspace
    /// builds with `panic = "abort"`, so there is no unwinding exit path.
    pub fn with_scoped_access<T, E, F>(&mut self, frame_length: usize, f: F) -> Result<T, E>
    where
        E: From<BufferError>,
        F: FnOnce(&mut ChannelFrames<'_>) -> Result<T, E>,
    {
        if frame_length == 0 || frame_length > self.frame_capacity {
            return Err(BufferError::FrameLength {
                frame_length,
                frame_capacity: self.frame_capacity,
            }
            .into());
        }
        for channel in 0..self.channel_count {
            let start = channel * self.frame_capacity;
            for (frame, &sample) in self.samples[start..start + frame_length].iter().enumerate() {
                if !sample.is_finite() {
                    return Err(BufferError::NonFinite { channel, frame }.into());
                }
                if !(-1.0..=1.0).contains(&sample) {
                    return Err(BufferError::OutOfRange {
                        channel,
                        frame,
                        value: sample,
                    }
                    .into());
                }
            }
        }

        let mut frames = ChannelFrames {
            samples: &mut self.samples,
            channel_count: self.channel_count,
            frame_length,
            frame_capacity: self.frame_capacity,
        };
        let result = f(&mut frames);
        self.samples.fill(0.0);
        result
    }

    /// Zero every sample in every channel up to full capacity.
    ///
    /// The same pass runs automatically after every scoped access and on
    /// drop; this is the explicit hook for teardown paths that want the
    /// memory scrubbed before the buffer itself goes away.
    pub fn clear(&mut self) {
        self.samples.fill(0.0);
    }
}

impl Drop for SecureSampleBuffer {
    fn drop(&mut self) {
        self.samples.fill(0.0);
    }
}
