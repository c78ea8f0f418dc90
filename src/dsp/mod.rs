//! Audio buffers: Sample storage the interpreter reads and writes.
//!
//! Everything here is driven from the audio thread. Buffers are sized up
//! front and reused through the pool, so steady-state processing does not
//! allocate.

pub mod buffer;
pub mod pool;
