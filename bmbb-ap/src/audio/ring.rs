//! Ring buffer between block writes and the device callback
//!
//! The cpal callback pulls mono i16 samples from here; [`super::output::CpalSink`]
//! pushes decoded blocks in. Capacity equals the device queue (pool size
//! times block size), so a full ring is the backpressure a blocking write
//! waits on.

use crate::error::{Error, Result};
use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};
use std::sync::{Arc, Mutex, MutexGuard};

fn poisoned<T>(_: std::sync::PoisonError<T>) -> Error {
    Error::Internal("sample ring lock poisoned".to_string())
}

/// Shared mono sample queue
#[derive(Clone)]
pub struct SampleRing {
    /// Write end (block writer)
    producer: Arc<Mutex<HeapProd<i16>>>,

    /// Read end (audio callback)
    consumer: Arc<Mutex<HeapCons<i16>>>,

    /// Capacity in samples
    capacity: usize,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        let rb = HeapRb::new(capacity.max(1));
        let (producer, consumer) = rb.split();

        Self {
            producer: Arc::new(Mutex::new(producer)),
            consumer: Arc::new(Mutex::new(consumer)),
            capacity: capacity.max(1),
        }
    }

    fn producer(&self) -> Result<MutexGuard<'_, HeapProd<i16>>> {
        self.producer.lock().map_err(poisoned)
    }

    fn consumer(&self) -> Result<MutexGuard<'_, HeapCons<i16>>> {
        self.consumer.lock().map_err(poisoned)
    }

    /// Push as many samples as fit; returns the number written
    pub fn push(&self, samples: &[i16]) -> Result<usize> {
        Ok(self.producer()?.push_slice(samples))
    }

    /// Fill `out` from the ring, padding with silence on underrun.
    ///
    /// Never blocks on a poisoned lock; the callback just plays silence.
    pub fn pop_into(&self, out: &mut [i16]) -> usize {
        let read = match self.consumer.lock() {
            Ok(mut consumer) => consumer.pop_slice(out),
            Err(_) => 0,
        };
        out[read..].fill(0);
        read
    }

    /// Samples waiting to be played
    pub fn len(&self) -> Result<usize> {
        Ok(self.consumer()?.occupied_len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Room for more samples
    pub fn free_space(&self) -> Result<usize> {
        Ok(self.producer()?.vacant_len())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discard everything queued
    pub fn clear(&self) -> Result<()> {
        self.consumer()?.clear();
        Ok(())
    }
}
