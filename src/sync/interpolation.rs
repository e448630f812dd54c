//! Transform interpolation for remote entities.
//!
//! Remote transforms arrive at the sender's tick rate. Rendering samples a
//! bounded history at a delayed render time and blends the two samples that
//! bracket it.

use std::collections::VecDeque;

use crate::core::Transform;
use crate::core::constants::INTERPOLATION_CAPACITY;

/// One received transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformSample {
    /// Sender timestamp in milliseconds.
    pub timestamp: u64,
    /// Transform at that time.
    pub transform: Transform,
}

/// Bounded history of transforms, kept in arrival order.
#[derive(Debug, Clone)]
pub struct InterpolationBuffer {
    samples: VecDeque<TransformSample>,
    capacity: usize,
}

impl Default for InterpolationBuffer {
    fn default() -> Self {
        Self::new(INTERPOLATION_CAPACITY)
    }
}

impl InterpolationBuffer {
    /// Create a buffer holding at most `capacity` samples (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest once full.
    pub fn push(&mut self, timestamp: u64, transform: Transform) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(TransformSample {
            timestamp,
            transform,
        });
    }

    /// Transform at `render_time`.
    ///
    /// Blends the first adjacent pair `a, b` with
    /// `a.timestamp <= render_time <= b.timestamp`. Without such a pair the
    /// newest sample is held. `None` when empty.
    pub fn sample_at(&self, render_time: u64) -> Option<Transform> {
        let newest = self.samples.back()?;
        for (a, b) in self.samples.iter().zip(self.samples.iter().skip(1)) {
            if a.timestamp <= render_time && render_time <= b.timestamp {
                let span = b.timestamp - a.timestamp;
                let t = if span == 0 {
                    0.0
                } else {
                    ((render_time - a.timestamp) as f64 / span as f64) as f32
                };
                return Some(Transform::new(
                    a.transform.position.lerp(b.transform.position, t),
                    a.transform.rotation.nlerp(b.transform.rotation, t),
                ));
            }
        }
        Some(newest.transform)
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<&TransformSample> {
        self.samples.back()
    }

    /// Number of samples held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples are held.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every sample.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
