use crate::config::ProcessorConfig;
use crate::dsp::buffer::AudioBuffer;
use crate::header::ScriptInfo;
use crate::interpreter::Interpreter;
use crate::loader::ScriptReceiver;
use crate::params::{ParameterBank, MAX_PARAMETERS};
use crate::script::{compile, CompiledScript};
use crate::timing::{CpuMeter, Stopwatch};

/// Values applied to one parameter, one per processed block.
#[derive(Debug, Clone, Default)]
pub struct ParameterAutomation {
    values: Vec<f64>,
    cursor: usize,
}

impl ParameterAutomation {
    pub fn new(values: Vec<f64>) -> Self {
        ParameterAutomation { values, cursor: 0 }
    }

    pub fn is_active(&self) -> bool {
        self.cursor < self.values.len()
    }

    /// Next value, advancing the cursor. `None` once exhausted.
    pub fn next_value(&mut self) -> Option<f64> {
        let value = self.values.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(value)
    }

    pub fn remaining(&self) -> usize {
        self.values.len().saturating_sub(self.cursor)
    }
}

/// A script-driven audio effect.
///
/// Lifecycle: [`load_effect`](Self::load_effect), then
/// [`initialize`](Self::initialize), then any number of
/// [`process_block`](Self::process_block) / [`process_sample`](Self::process_sample)
/// calls. Until both steps succeed, and while bypassed, audio passes through
/// unchanged.
///
/// Parameter changes from other threads go through the
/// [`ParameterBank`] returned by [`parameter_bank`](Self::parameter_bank) and
/// take effect at the start of the next processing call.
#[derive(Debug)]
pub struct Effect {
    interpreter: Interpreter,
    loaded: bool,
    initialized: bool,
    bypassed: bool,
    sample_rate: f64,
    max_block_size: usize,
    params: ParameterBank,
    automation: Vec<ParameterAutomation>,
    cpu: CpuMeter,
    scripts: Option<ScriptReceiver>,
}

impl Effect {
    pub fn new() -> Self {
        Effect {
            interpreter: Interpreter::new(),
            loaded: false,
            initialized: false,
            bypassed: false,
            sample_rate: 48000.0,
            max_block_size: 512,
            params: ParameterBank::new(),
            automation: vec![ParameterAutomation::default(); MAX_PARAMETERS],
            cpu: CpuMeter::new(),
            scripts: None,
        }
    }

    /// Parse `source` and make it this effect's script. Returns false if the
    /// header or body cannot be parsed; the effect is then unusable until a
    /// later load succeeds.
    pub fn load_effect(&mut self, source: &str) -> bool {
        match compile(source) {
            Ok(script) => {
                self.load_compiled(script);
                true
            }
            Err(e) => {
                log::warn!("effect failed to load: {e}");
                self.loaded = false;
                self.initialized = false;
                false
            }
        }
    }

    pub fn load_compiled(&mut self, script: CompiledScript) {
        self.interpreter.install(script);
        let defaults: Vec<f64> = (0..MAX_PARAMETERS)
            .map(|i| self.interpreter.get_parameter(i))
            .collect();
        self.params.reset(&defaults);
        self.loaded = true;
        self.initialized = false;
        log::debug!(
            "loaded effect '{}' with {} parameter(s)",
            self.name(),
            self.parameter_count()
        );
    }

    /// Set the sample rate, run `@init`, then `@slider` so that derived
    /// values match the current parameters.
    pub fn initialize(&mut self, sample_rate: f64, max_block_size: usize) {
        if !self.loaded {
            log::warn!("initialize called without a loaded script");
            return;
        }
        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;
        self.interpreter.set_sample_rate(sample_rate);
        self.apply_pending_parameters();
        self.interpreter.execute_init();
        self.interpreter.execute_slider();
        self.initialized = true;
    }

    pub fn initialize_with(&mut self, config: &ProcessorConfig) {
        self.initialize(config.sample_rate, config.max_block_size);
    }

    pub fn shutdown(&mut self) {
        self.initialized = false;
    }

    /// Accept interpreters sent from a control thread with
    /// [`script_channel`](crate::loader::script_channel).
    pub fn attach_loader(&mut self, receiver: ScriptReceiver) {
        self.scripts = Some(receiver);
    }

    pub fn process_sample(&mut self, left: f64, right: f64) -> (f64, f64) {
        self.receive_script();
        if !self.is_active() {
            return (left, right);
        }
        let watch = Stopwatch::start();
        self.begin_block();
        let out = self.interpreter.execute_sample(left, right);
        self.cpu.stop(watch);
        out
    }

    pub fn process_block(&mut self, buffer: &mut AudioBuffer) {
        self.receive_script();
        if !self.is_active() {
            return;
        }
        let watch = Stopwatch::start();
        self.begin_block();
        self.interpreter.execute_block(buffer);
        self.cpu.stop(watch);
    }

    /// Request a parameter change. Applied, and `@slider` run, at the start
    /// of the next processing call.
    pub fn set_parameter(&self, index: usize, value: f64) {
        self.params.set(index, value);
    }

    /// Pending value if one is queued, otherwise the script's current value.
    pub fn get_parameter(&self, index: usize) -> f64 {
        if self.params.is_pending(index) {
            self.params.get(index).unwrap_or(0.0)
        } else {
            self.interpreter.get_parameter(index)
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.interpreter.parameter_count()
    }

    /// Control-thread handle for parameter changes.
    pub fn parameter_bank(&self) -> ParameterBank {
        self.params.clone()
    }

    /// Step `index` through `values`, one per processed block.
    pub fn set_parameter_automation(&mut self, index: usize, values: Vec<f64>) {
        if let Some(slot) = self.automation.get_mut(index) {
            *slot = ParameterAutomation::new(values);
        }
    }

    pub fn clear_automation(&mut self) {
        for slot in &mut self.automation {
            *slot = ParameterAutomation::default();
        }
    }

    pub fn info(&self) -> Option<&ScriptInfo> {
        self.interpreter.info()
    }

    /// The script's `desc:` line.
    pub fn name(&self) -> &str {
        self.info().map_or("", |info| info.description.as_str())
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    pub fn set_bypassed(&mut self, bypassed: bool) {
        self.bypassed = bypassed;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    /// Smoothed processing time per call, in milliseconds.
    pub fn cpu_usage(&self) -> f64 {
        self.cpu.average_ms()
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    fn is_active(&self) -> bool {
        self.initialized && !self.bypassed
    }

    /// Swap in an interpreter from the loader, if one arrived. It was
    /// initialized on the sending side.
    fn receive_script(&mut self) {
        let Some(receiver) = self.scripts.as_mut() else {
            return;
        };
        let Some(mut next) = receiver.try_recv() else {
            return;
        };
        next.context_mut().transport = self.interpreter.context().transport;
        let previous = std::mem::replace(&mut self.interpreter, next);
        receiver.retire(previous);
        self.loaded = true;
        self.initialized = true;
    }

    /// Apply queued parameter changes and one automation step, then run
    /// `@slider` if anything changed.
    fn begin_block(&mut self) {
        let mut changed = self.apply_pending_parameters();
        for (index, lane) in self.automation.iter_mut().enumerate() {
            if let Some(value) = lane.next_value() {
                changed |= self.interpreter.store_parameter(index, value);
            }
        }
        if changed {
            self.interpreter.execute_slider();
        }
    }

    fn apply_pending_parameters(&mut self) -> bool {
        let interpreter = &mut self.interpreter;
        self.params.drain(|index, value| {
            interpreter.store_parameter(index, value);
        })
    }
}

impl Default for Effect {
    fn default() -> Self {
        Self::new()
    }
}
