use crate::ast::Var;
use crate::builtins::{self, BuiltinFn};
use crate::memory::Memory;
use crate::params::MAX_PARAMETERS;

/// Host transport state visible to scripts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transport {
    pub tempo: f64,
    pub beat_position: f64,
    /// 0 stopped, 1 playing, 2 paused, 5 recording.
    pub play_state: f64,
    pub ts_num: f64,
    pub ts_denom: f64,
}

impl Default for Transport {
    fn default() -> Self {
        Transport {
            tempo: 120.0,
            beat_position: 0.0,
            play_state: 0.0,
            ts_num: 4.0,
            ts_denom: 4.0,
        }
    }
}

/// Everything a running script can read or write.
///
/// Each effect instance owns one; nothing here is shared.
#[derive(Debug)]
pub struct Context {
    pub memory: Memory,
    pub sliders: [f64; MAX_PARAMETERS],
    pub spl0: f64,
    pub spl1: f64,
    pub srate: f64,
    pub transport: Transport,
    functions: &'static [(&'static str, BuiltinFn)],
}

impl Context {
    pub fn new() -> Self {
        Context {
            memory: Memory::new(),
            sliders: [0.0; MAX_PARAMETERS],
            spl0: 0.0,
            spl1: 0.0,
            srate: 48000.0,
            transport: Transport::default(),
            functions: builtins::BUILTINS,
        }
    }

    /// Native implementation registered under `name`.
    pub fn function(&self, name: &str) -> Option<BuiltinFn> {
        self.functions
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, f)| f)
    }

    /// Call a function by name. Unknown names return 0.0.
    pub fn call_function(&self, name: &str, args: &[f64]) -> f64 {
        self.function(name).map_or(0.0, |f| f(args))
    }

    /// Value of a built-in port or slider. `None` for user variables.
    #[inline]
    pub fn port(&self, var: &Var) -> Option<f64> {
        Some(match var {
            Var::Spl0 => self.spl0,
            Var::Spl1 => self.spl1,
            Var::Srate => self.srate,
            Var::Tempo => self.transport.tempo,
            Var::BeatPosition => self.transport.beat_position,
            Var::PlayState => self.transport.play_state,
            Var::TsNum => self.transport.ts_num,
            Var::TsDenom => self.transport.ts_denom,
            Var::Slider(i) => return self.sliders.get(*i).copied(),
            Var::Named { .. } => return None,
        })
    }

    #[inline]
    pub fn port_mut(&mut self, var: &Var) -> Option<&mut f64> {
        Some(match var {
            Var::Spl0 => &mut self.spl0,
            Var::Spl1 => &mut self.spl1,
            Var::Srate => &mut self.srate,
            Var::Tempo => &mut self.transport.tempo,
            Var::BeatPosition => &mut self.transport.beat_position,
            Var::PlayState => &mut self.transport.play_state,
            Var::TsNum => &mut self.transport.ts_num,
            Var::TsDenom => &mut self.transport.ts_denom,
            Var::Slider(i) => return self.sliders.get_mut(*i),
            Var::Named { .. } => return None,
        })
    }

    /// Load declared defaults into the slider vector, zeroing the rest.
    pub fn load_slider_defaults(&mut self, defaults: impl IntoIterator<Item = (usize, f64)>) {
        self.sliders = [0.0; MAX_PARAMETERS];
        for (index, value) in defaults {
            if let Some(slot) = self.sliders.get_mut(index) {
                *slot = value;
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ctx = Context::new();
        assert_eq!(ctx.srate, 48000.0);
        assert_eq!(ctx.port(&Var::Tempo), Some(120.0));
        assert_eq!(ctx.port(&Var::TsDenom), Some(4.0));
        assert_eq!(ctx.sliders.len(), 64);
    }

    #[test]
    fn test_ports_are_writable() {
        let mut ctx = Context::new();
        *ctx.port_mut(&Var::Spl1).unwrap() = 0.5;
        *ctx.port_mut(&Var::Slider(63)).unwrap() = 2.0;
        assert_eq!(ctx.spl1, 0.5);
        assert_eq!(ctx.sliders[63], 2.0);
        assert!(ctx.port_mut(&Var::Slider(64)).is_none());
        let named = Var::Named { name: "x".into(), symbol: 0 };
        assert!(ctx.port(&named).is_none());
    }

    #[test]
    fn test_function_table() {
        let ctx = Context::new();
        assert_eq!(ctx.call_function("max", &[1.0, 3.0]), 3.0);
        assert_eq!(ctx.call_function("foo", &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_slider_defaults() {
        let mut ctx = Context::new();
        ctx.sliders[5] = 9.0;
        ctx.load_slider_defaults([(0, 0.5), (2, 1.0), (99, 3.0)]);
        assert_eq!(&ctx.sliders[..3], &[0.5, 0.0, 1.0]);
        assert_eq!(ctx.sliders[5], 0.0);
    }
}
