//! AudioBufferPool: Bounded reuse of audio buffers by shape.
//!
//! Buffers are handed out as [`BufferId`] handles and stay owned by the
//! pool. Once the pool has grown to capacity, acquiring never allocates
//! unless a free buffer must be reshaped.

use super::buffer::AudioBuffer;
use crate::config::ProcessorConfig;

/// Handle to a buffer owned by an [`AudioBufferPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(u64);

#[derive(Debug)]
struct PooledBuffer {
    id: BufferId,
    buffer: AudioBuffer,
    in_use: bool,
    last_used_frame: u64,
}

#[derive(Debug)]
pub struct AudioBufferPool {
    buffers: Vec<PooledBuffer>,
    max_buffers: usize,
    /// Incremented once per acquire.
    current_frame: u64,
    next_id: u64,
}

impl AudioBufferPool {
    pub fn new(max_buffers: usize) -> Self {
        AudioBufferPool {
            buffers: Vec::with_capacity(max_buffers),
            max_buffers,
            current_frame: 0,
            next_id: 0,
        }
    }

    /// Pool sized by `pool_capacity`, warmed with one buffer of the
    /// configured block shape.
    pub fn from_config(config: &ProcessorConfig) -> Self {
        let mut pool = AudioBufferPool::new(config.pool_capacity);
        pool.preallocate(config.channels, config.max_block_size, 1);
        pool
    }

    /// Hand out a zeroed buffer of the requested shape.
    ///
    /// Prefers a free buffer of the same shape, then grows the pool, then
    /// reshapes the least recently used free buffer. `None` when every
    /// buffer is in use and the pool is full.
    pub fn acquire(&mut self, channels: usize, samples: usize) -> Option<BufferId> {
        self.current_frame += 1;
        let frame = self.current_frame;

        let matching = self.buffers.iter_mut().find(|p| {
            !p.in_use
                && p.buffer.channel_count() == channels
                && p.buffer.sample_count() == samples
        });
        if let Some(pooled) = matching {
            pooled.buffer.clear();
            pooled.in_use = true;
            pooled.last_used_frame = frame;
            return Some(pooled.id);
        }

        if self.buffers.len() < self.max_buffers {
            let id = self.create(channels, samples);
            if let Some(pooled) = self.buffers.last_mut() {
                pooled.in_use = true;
                pooled.last_used_frame = frame;
            }
            return Some(id);
        }

        let oldest = self
            .buffers
            .iter_mut()
            .filter(|p| !p.in_use)
            .min_by_key(|p| p.last_used_frame);
        match oldest {
            Some(pooled) => {
                pooled.buffer.set_size(channels, samples);
                pooled.buffer.clear();
                pooled.in_use = true;
                pooled.last_used_frame = frame;
                Some(pooled.id)
            }
            None => {
                log::warn!(
                    "buffer pool exhausted ({} in use), cannot provide {channels}x{samples}",
                    self.buffers.len()
                );
                None
            }
        }
    }

    /// Mark a buffer free. Its contents are left as they are.
    pub fn release(&mut self, id: BufferId) -> bool {
        match self.buffers.iter_mut().find(|p| p.id == id && p.in_use) {
            Some(pooled) => {
                pooled.in_use = false;
                true
            }
            None => false,
        }
    }

    pub fn release_all(&mut self) {
        for pooled in &mut self.buffers {
            pooled.in_use = false;
        }
    }

    pub fn get(&self, id: BufferId) -> Option<&AudioBuffer> {
        self.buffers.iter().find(|p| p.id == id).map(|p| &p.buffer)
    }

    pub fn get_mut(&mut self, id: BufferId) -> Option<&mut AudioBuffer> {
        self.buffers
            .iter_mut()
            .find(|p| p.id == id)
            .map(|p| &mut p.buffer)
    }

    /// Add up to `count` free buffers of the given shape, within capacity.
    pub fn preallocate(&mut self, channels: usize, samples: usize, count: usize) {
        let room = self.max_buffers.saturating_sub(self.buffers.len());
        for _ in 0..count.min(room) {
            self.create(channels, samples);
        }
    }

    /// Drop every free buffer.
    pub fn clear_unused(&mut self) {
        self.buffers.retain(|p| p.in_use);
    }

    /// Change the capacity. Existing buffers are kept even above it.
    pub fn set_max_buffers(&mut self, max_buffers: usize) {
        self.max_buffers = max_buffers;
    }

    pub fn max_buffers(&self) -> usize {
        self.max_buffers
    }

    pub fn active_buffers(&self) -> usize {
        self.buffers.iter().filter(|p| p.in_use).count()
    }

    pub fn pool_size(&self) -> usize {
        self.buffers.len()
    }

    fn create(&mut self, channels: usize, samples: usize) -> BufferId {
        let id = BufferId(self.next_id);
        self.next_id += 1;
        self.buffers.push(PooledBuffer {
            id,
            buffer: AudioBuffer::new(channels, samples),
            in_use: false,
            last_used_frame: self.current_frame,
        });
        id
    }
}

impl Default for AudioBufferPool {
    fn default() -> Self {
        Self::new(32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuse_returns_same_buffer_zeroed() {
        let mut pool = AudioBufferPool::new(4);
        let first = pool.acquire(2, 512).unwrap();
        pool.get_mut(first).unwrap().channel_mut(1).unwrap().fill(0.7);
        assert!(pool.release(first));
        // Contents survive release.
        assert_eq!(pool.get(first).unwrap().channel(1).unwrap()[0], 0.7);

        let second = pool.acquire(2, 512).unwrap();
        assert_eq!(first, second);
        assert_eq!(pool.pool_size(), 1);
        let buffer = pool.get(second).unwrap();
        assert!(buffer.channel(0).unwrap().iter().all(|&s| s == 0.0));
        assert!(buffer.channel(1).unwrap().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn grows_until_capacity_then_repurposes_lru() {
        let mut pool = AudioBufferPool::new(2);
        let a = pool.acquire(1, 64).unwrap();
        let b = pool.acquire(1, 128).unwrap();
        assert_eq!(pool.pool_size(), 2);
        pool.release(b);
        pool.release(a);

        // `a` was used before `b`, so it is the one reshaped.
        let c = pool.acquire(2, 32).unwrap();
        assert_eq!(c, a);
        let buffer = pool.get(c).unwrap();
        assert_eq!((buffer.channel_count(), buffer.sample_count()), (2, 32));
        assert_eq!(pool.pool_size(), 2);
    }

    #[test]
    fn exhausted_pool_returns_none() {
        let mut pool = AudioBufferPool::new(1);
        let a = pool.acquire(2, 16).unwrap();
        assert!(pool.acquire(2, 16).is_none());
        assert_eq!(pool.active_buffers(), 1);
        pool.release(a);
        assert!(pool.acquire(1, 8).is_some());
    }

    #[test]
    fn release_twice_is_ignored() {
        let mut pool = AudioBufferPool::new(2);
        let a = pool.acquire(1, 4).unwrap();
        assert!(pool.release(a));
        assert!(!pool.release(a));
        assert_eq!(pool.active_buffers(), 0);
    }

    #[test]
    fn preallocate_stays_free_and_respects_capacity() {
        let mut pool = AudioBufferPool::new(3);
        pool.preallocate(2, 256, 10);
        assert_eq!(pool.pool_size(), 3);
        assert_eq!(pool.active_buffers(), 0);
        pool.acquire(2, 256).unwrap();
        assert_eq!(pool.pool_size(), 3);
        assert_eq!(pool.active_buffers(), 1);
    }

    #[test]
    fn release_all_and_clear_unused() {
        let mut pool = AudioBufferPool::new(4);
        let a = pool.acquire(1, 4).unwrap();
        let _b = pool.acquire(1, 4).unwrap();
        pool.release(a);
        pool.clear_unused();
        assert_eq!(pool.pool_size(), 1);
        assert!(pool.get(a).is_none());
        pool.release_all();
        assert_eq!(pool.active_buffers(), 0);
        pool.clear_unused();
        assert_eq!(pool.pool_size(), 0);
    }

    #[test]
    fn from_config_warms_block_shape() {
        let config = ProcessorConfig::default();
        let mut pool = AudioBufferPool::from_config(&config);
        assert_eq!(pool.pool_size(), 1);
        assert_eq!(pool.max_buffers(), config.pool_capacity);
        pool.acquire(config.channels, config.max_block_size).unwrap();
        assert_eq!(pool.pool_size(), 1);
    }

    #[test]
    fn shrinking_capacity_keeps_buffers() {
        let mut pool = AudioBufferPool::new(4);
        pool.preallocate(1, 8, 3);
        pool.set_max_buffers(1);
        assert_eq!(pool.pool_size(), 3);
        assert!(pool.acquire(2, 8).is_some());
    }
}
