pub mod ast;
pub mod builtins;
pub mod chain;
pub mod config;
pub mod context;
pub mod dsp;
pub mod effect;
pub mod error;
pub mod header;
pub mod interpreter;
pub mod lexer;
pub mod library;
pub mod loader;
pub mod memory;
pub mod params;
pub mod parser;
pub mod script;
pub mod timing;
pub mod token;

pub use chain::EffectChain;
pub use config::ProcessorConfig;
pub use dsp::buffer::AudioBuffer;
pub use dsp::pool::{AudioBufferPool, BufferId};
pub use effect::Effect;
pub use error::{HandoffError, HeaderError, LoadError, ParseError};
pub use header::{ScriptInfo, SliderInfo};
pub use interpreter::Interpreter;
pub use loader::{script_channel, ScriptReceiver, ScriptSender};
pub use params::ParameterBank;
pub use script::{compile, CompiledScript, SectionKind};

use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the engine version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed: parse a script's header and body and return its metadata.
/// Errors carry an annotated report of the offending line.
#[wasm_bindgen]
pub fn inspect_script(source: &str) -> Result<JsValue, JsValue> {
    let script = compile(source).map_err(|e| JsValue::from_str(&e.report("script", source)))?;
    serde_wasm_bindgen::to_value(script.info()).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: one effect processing stereo `f32` blocks, for use from an
/// AudioWorklet.
#[wasm_bindgen]
pub struct JsfxProcessor {
    effect: Effect,
    pool: AudioBufferPool,
}

#[wasm_bindgen]
impl JsfxProcessor {
    #[wasm_bindgen(constructor)]
    pub fn new(source: &str, sample_rate: f64) -> Result<JsfxProcessor, JsValue> {
        let script = compile(source).map_err(|e| JsValue::from_str(&e.report("script", source)))?;
        let config = ProcessorConfig {
            sample_rate,
            ..ProcessorConfig::default()
        };
        let mut effect = Effect::new();
        effect.load_compiled(script);
        effect.initialize_with(&config);
        Ok(JsfxProcessor {
            effect,
            pool: AudioBufferPool::from_config(&config),
        })
    }

    /// Process one block in place. Only the overlapping length of the two
    /// slices is processed.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let len = left.len().min(right.len());
        let Some(id) = self.pool.acquire(2, len) else {
            return;
        };
        if let Some(buffer) = self.pool.get_mut(id) {
            if let Some((l, r)) = buffer.channel_pair_mut(0, 1) {
                l.copy_from_slice(&left[..len]);
                r.copy_from_slice(&right[..len]);
            }
            self.effect.process_block(buffer);
            if let Some(l) = buffer.channel(0) {
                left[..len].copy_from_slice(l);
            }
            if let Some(r) = buffer.channel(1) {
                right[..len].copy_from_slice(r);
            }
        }
        self.pool.release(id);
    }

    #[wasm_bindgen(js_name = setParameter)]
    pub fn set_parameter(&mut self, index: usize, value: f64) {
        self.effect.set_parameter(index, value);
    }

    #[wasm_bindgen(js_name = getParameter)]
    pub fn get_parameter(&self, index: usize) -> f64 {
        self.effect.get_parameter(index)
    }

    #[wasm_bindgen(js_name = parameterCount)]
    pub fn parameter_count(&self) -> usize {
        self.effect.parameter_count()
    }

    #[wasm_bindgen(js_name = scriptInfo)]
    pub fn script_info(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.effect.info())
            .map_err(|e| JsValue::from_str(&format!("{e}")))
    }

    #[wasm_bindgen(js_name = cpuUsage)]
    pub fn cpu_usage(&self) -> f64 {
        self.effect.cpu_usage()
    }

    #[wasm_bindgen(js_name = setBypassed)]
    pub fn set_bypassed(&mut self, bypassed: bool) {
        self.effect.set_bypassed(bypassed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processor_round_trip() {
        let mut processor = JsfxProcessor::new(
            "desc:Half\nslider1:0.5<0,1>Amount\n@sample\nspl0 *= slider1;\nspl1 *= slider1;\n",
            48000.0,
        )
        .unwrap();
        let mut left = [1.0f32; 8];
        let mut right = [0.5f32; 8];
        processor.process(&mut left, &mut right);
        assert_eq!(left, [0.5; 8]);
        assert_eq!(right, [0.25; 8]);
        assert_eq!(processor.parameter_count(), 1);

        processor.set_parameter(0, 1.0);
        assert_eq!(processor.get_parameter(0), 1.0);
        processor.process(&mut left, &mut right);
        assert_eq!(left, [0.5; 8]);

        processor.set_bypassed(true);
        processor.process(&mut left, &mut right);
        assert_eq!(right, [0.25; 8]);
    }

    #[test]
    fn test_processor_mismatched_lengths() {
        let mut processor = JsfxProcessor::new("@sample spl0 = 0; spl1 = 0;", 44100.0).unwrap();
        let mut left = [1.0f32; 4];
        let mut right = [1.0f32; 2];
        processor.process(&mut left, &mut right);
        assert_eq!(left, [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(right, [0.0, 0.0]);
    }

    #[test]
    fn test_version() {
        assert_eq!(core_version(), VERSION);
    }
}
