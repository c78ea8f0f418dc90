//! Script hand-off from a control thread to the audio thread.
//!
//! The control side compiles, installs and initializes a fresh
//! [`Interpreter`] and pushes it through a single-producer queue. The audio
//! side swaps it in at a block boundary and pushes the replaced interpreter
//! back, so its memory is freed on the control thread.

use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::error::HandoffError;
use crate::interpreter::Interpreter;
use crate::script::{compile, CompiledScript};

/// Control-thread end.
pub struct ScriptSender {
    ready: HeapProd<Interpreter>,
    retired: HeapCons<Interpreter>,
}

/// Audio-thread end, owned by an effect.
pub struct ScriptReceiver {
    ready: HeapCons<Interpreter>,
    retired: HeapProd<Interpreter>,
}

/// A connected sender/receiver pair holding up to `capacity` scripts in
/// flight each way.
pub fn script_channel(capacity: usize) -> (ScriptSender, ScriptReceiver) {
    let capacity = capacity.max(1);
    let (ready_tx, ready_rx) = HeapRb::<Interpreter>::new(capacity).split();
    let (retired_tx, retired_rx) = HeapRb::<Interpreter>::new(capacity).split();
    (
        ScriptSender {
            ready: ready_tx,
            retired: retired_rx,
        },
        ScriptReceiver {
            ready: ready_rx,
            retired: retired_tx,
        },
    )
}

impl ScriptSender {
    /// Compile `source`, run `@init` and `@slider` at `sample_rate`, and queue
    /// the result for the audio thread.
    pub fn send_source(&mut self, source: &str, sample_rate: f64) -> Result<(), HandoffError> {
        let script = compile(source)?;
        self.send_script(script, sample_rate)
    }

    pub fn send_script(&mut self, script: CompiledScript, sample_rate: f64) -> Result<(), HandoffError> {
        let mut interpreter = Interpreter::new();
        interpreter.install(script);
        interpreter.set_sample_rate(sample_rate);
        interpreter.execute_init();
        interpreter.execute_slider();
        self.send(interpreter)
    }

    /// Queue a ready interpreter as is.
    pub fn send(&mut self, interpreter: Interpreter) -> Result<(), HandoffError> {
        self.collect_retired();
        self.ready
            .try_push(interpreter)
            .map_err(|_| HandoffError::QueueFull)
    }

    /// Drop interpreters the audio thread has replaced. Returns how many.
    pub fn collect_retired(&mut self) -> usize {
        let mut count = 0;
        while self.retired.try_pop().is_some() {
            count += 1;
        }
        if count > 0 {
            log::debug!("released {count} retired interpreter(s)");
        }
        count
    }
}

impl ScriptReceiver {
    /// Newest queued interpreter, if any. Older queued ones are retired
    /// unused.
    pub fn try_recv(&mut self) -> Option<Interpreter> {
        let mut newest = self.ready.try_pop()?;
        while let Some(next) = self.ready.try_pop() {
            self.retire(std::mem::replace(&mut newest, next));
        }
        Some(newest)
    }

    /// Send a replaced interpreter back for disposal. If the return queue
    /// is full it is dropped here instead.
    pub fn retire(&mut self, interpreter: Interpreter) {
        let _ = self.retired.try_push(interpreter);
    }
}

impl std::fmt::Debug for ScriptSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptSender").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for ScriptReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptReceiver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::SectionKind;

    #[test]
    fn test_send_and_receive() {
        let (mut tx, mut rx) = script_channel(2);
        tx.send_source("@init g = 2;\n@sample spl0 *= g;", 44100.0).unwrap();
        let mut interp = rx.try_recv().unwrap();
        assert!(interp.has_section(SectionKind::Sample));
        assert_eq!(interp.context().srate, 44100.0);
        assert_eq!(interp.execute_sample(0.5, 0.0).0, 1.0);
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_load_error_reported() {
        let (mut tx, _rx) = script_channel(1);
        let err = tx.send_source("slider0:0<0,1>X\n", 48000.0).unwrap_err();
        assert!(matches!(err, HandoffError::Load(_)), "got {err:?}");
    }

    #[test]
    fn test_queue_full() {
        let (mut tx, _rx) = script_channel(1);
        tx.send_source("@init", 48000.0).unwrap();
        let err = tx.send_source("@init", 48000.0).unwrap_err();
        assert_eq!(err, HandoffError::QueueFull);
    }

    #[test]
    fn test_newest_wins_and_old_ones_return() {
        let (mut tx, mut rx) = script_channel(4);
        tx.send_source("@init v = 1;", 48000.0).unwrap();
        tx.send_source("@init v = 2;", 48000.0).unwrap();
        let interp = rx.try_recv().unwrap();
        assert_eq!(interp.variable("v"), 2.0);
        rx.retire(interp);
        assert_eq!(tx.collect_retired(), 2);
    }

    #[test]
    fn test_across_threads() {
        let (mut tx, mut rx) = script_channel(1);
        std::thread::spawn(move || {
            tx.send_source("@sample spl1 = 0.5;", 48000.0).unwrap();
        })
        .join()
        .unwrap();
        let mut interp = rx.try_recv().unwrap();
        assert_eq!(interp.execute_sample(0.0, 0.0), (0.0, 0.5));
    }
}
