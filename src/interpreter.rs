use crate::ast::{AssignOp, BinaryOp, Node, Var};
use crate::builtins::BuiltinFn;
use crate::context::Context;
use crate::dsp::buffer::AudioBuffer;
use crate::header::ScriptInfo;
use crate::params::MAX_PARAMETERS;
use crate::script::{compile, CompiledScript, SectionKind};
use crate::timing::{CpuMeter, Stopwatch};

/// Iteration cap for a single `while` loop execution.
pub const MAX_LOOP_ITERATIONS: usize = 10_000;

/// Arguments beyond this count are evaluated but not passed on.
pub const MAX_ARGS: usize = 8;

/// Address used for a variable the arena had no room for.
const UNBOUND: usize = usize::MAX;

/// A compiled script with its names resolved against one context.
#[derive(Debug)]
struct Installed {
    script: CompiledScript,
    /// Arena address per interned variable.
    slots: Vec<usize>,
    /// Native function per interned call name.
    functions: Vec<Option<BuiltinFn>>,
}

/// Tree-walking evaluator for one script instance.
///
/// Nothing reachable from the `execute_*` methods allocates: variables were
/// bound to arena cells and calls to native functions when the script was
/// installed.
#[derive(Debug)]
pub struct Interpreter {
    context: Context,
    installed: Option<Installed>,
    cpu: CpuMeter,
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            context: Context::new(),
            installed: None,
            cpu: CpuMeter::new(),
        }
    }

    /// Compile and install `source`. On failure the previous script, if any,
    /// stays active and `false` is returned.
    pub fn load_script(&mut self, source: &str) -> bool {
        match compile(source) {
            Ok(script) => {
                self.install(script);
                true
            }
            Err(e) => {
                log::warn!("failed to load script: {e}");
                false
            }
        }
    }

    /// Make `script` the active program. The arena is reset, every variable
    /// the script names is bound, and sliders take their declared defaults.
    pub fn install(&mut self, script: CompiledScript) {
        self.context.memory.reset();
        let memory = &mut self.context.memory;
        let slots: Vec<usize> = script
            .program()
            .symbols
            .iter()
            .map(|name| memory.bind(name).unwrap_or(UNBOUND))
            .collect();
        let functions: Vec<Option<BuiltinFn>> = script
            .program()
            .functions
            .iter()
            .map(|name| {
                let f = self.context.function(name);
                if f.is_none() {
                    log::debug!("'{name}' is not a known function, calls return 0");
                }
                f
            })
            .collect();
        self.context.load_slider_defaults(script.slider_defaults());
        self.cpu.reset();
        self.installed = Some(Installed {
            script,
            slots,
            functions,
        });
    }

    pub fn is_loaded(&self) -> bool {
        self.installed.is_some()
    }

    pub fn info(&self) -> Option<&ScriptInfo> {
        self.installed.as_ref().map(|i| i.script.info())
    }

    pub fn has_section(&self, kind: SectionKind) -> bool {
        self.installed
            .as_ref()
            .is_some_and(|i| i.script.has_section(kind))
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.context.srate = sample_rate;
    }

    /// Zero all variables and run `@init`. Array declarations survive, their
    /// contents do not.
    pub fn execute_init(&mut self) {
        self.context.memory.clear();
        self.run_timed(SectionKind::Init);
    }

    pub fn execute_slider(&mut self) {
        self.run_timed(SectionKind::Slider);
    }

    /// Run `@sample` on one stereo frame. Without an `@sample` section the
    /// input is returned unchanged.
    pub fn execute_sample(&mut self, left: f64, right: f64) -> (f64, f64) {
        if !self.has_section(SectionKind::Sample) {
            return (left, right);
        }
        let watch = Stopwatch::start();
        let out = self.process_frame(left, right);
        self.cpu.stop(watch);
        out
    }

    /// Run `@block` once, then `@sample` over every frame of the first
    /// channel pair. A mono buffer feeds its channel to both inputs.
    pub fn execute_block(&mut self, buffer: &mut AudioBuffer) {
        if self.installed.is_none() || buffer.channel_count() == 0 {
            return;
        }
        let watch = Stopwatch::start();
        self.run(SectionKind::Block);
        if self.has_section(SectionKind::Sample) {
            if buffer.channel_count() >= 2 {
                if let Some((left, right)) = buffer.channel_pair_mut(0, 1) {
                    for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                        let (out_l, out_r) = self.process_frame(*l as f64, *r as f64);
                        *l = out_l as f32;
                        *r = out_r as f32;
                    }
                }
            } else if let Some(mono) = buffer.channel_mut(0) {
                for s in mono.iter_mut() {
                    let (out, _) = self.process_frame(*s as f64, *s as f64);
                    *s = out as f32;
                }
            }
        }
        self.cpu.stop(watch);
    }

    /// Set a slider and run `@slider`. Indices past the slider bank are
    /// ignored.
    pub fn set_parameter(&mut self, index: usize, value: f64) {
        if self.store_parameter(index, value) {
            self.execute_slider();
        }
    }

    /// Set a slider without running `@slider`.
    pub fn store_parameter(&mut self, index: usize, value: f64) -> bool {
        match self.context.sliders.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn get_parameter(&self, index: usize) -> f64 {
        self.context.sliders.get(index).copied().unwrap_or(0.0)
    }

    /// One past the highest declared slider.
    pub fn parameter_count(&self) -> usize {
        self.info().map_or(0, ScriptInfo::parameter_count).min(MAX_PARAMETERS)
    }

    /// Declare an array the script can index by name.
    pub fn allocate_array(&mut self, name: &str, size: usize) -> Option<usize> {
        self.context.memory.allocate_array(name, size)
    }

    /// Current value of a script variable. Unknown names read 0.0.
    pub fn variable(&self, name: &str) -> f64 {
        self.context.memory.get(name)
    }

    pub fn set_variable(&mut self, name: &str, value: f64) {
        self.context.memory.set(name, value);
    }

    /// Smoothed section execution time in milliseconds.
    pub fn cpu_usage(&self) -> f64 {
        self.cpu.average_ms()
    }

    fn process_frame(&mut self, left: f64, right: f64) -> (f64, f64) {
        self.context.spl0 = left;
        self.context.spl1 = right;
        self.run(SectionKind::Sample);
        (self.context.spl0, self.context.spl1)
    }

    fn run_timed(&mut self, kind: SectionKind) {
        if self.has_section(kind) {
            let watch = Stopwatch::start();
            self.run(kind);
            self.cpu.stop(watch);
        }
    }

    fn run(&mut self, kind: SectionKind) {
        let Some(installed) = self.installed.as_ref() else {
            return;
        };
        let Some(body) = installed.script.section(kind) else {
            return;
        };
        let mut machine = Machine {
            ctx: &mut self.context,
            slots: &installed.slots,
            functions: &installed.functions,
        };
        machine.eval_all(body);
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed view used while evaluating one section.
struct Machine<'a> {
    ctx: &'a mut Context,
    slots: &'a [usize],
    functions: &'a [Option<BuiltinFn>],
}

impl Machine<'_> {
    fn eval_all(&mut self, nodes: &[Node]) -> f64 {
        let mut result = 0.0;
        for node in nodes {
            result = self.eval(node);
        }
        result
    }

    fn eval(&mut self, node: &Node) -> f64 {
        match node {
            Node::Number(value) => *value,
            Node::String(_) => 0.0,
            Node::Variable(var) => self.read(var),
            Node::Assignment { op, target, value } => {
                let value = self.eval(value);
                match target.as_ref() {
                    Node::Variable(var) => {
                        self.assign(var, *op, value);
                        value
                    }
                    _ => 0.0,
                }
            }
            Node::BinaryOp { op, lhs, rhs } => {
                let lhs = self.eval(lhs);
                let rhs = self.eval(rhs);
                op.apply(lhs, rhs)
            }
            Node::UnaryOp { op, operand } => {
                let operand = self.eval(operand);
                op.apply(operand)
            }
            Node::FunctionCall { function, args, .. } => self.call(*function, args),
            Node::ArrayAccess { name, index } => {
                let index = self.eval(index);
                self.ctx
                    .memory
                    .element_address(name, index)
                    .map_or(0.0, |address| self.ctx.memory.read(address))
            }
            Node::IfStatement {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(condition) != 0.0 {
                    self.eval(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.eval(else_branch)
                } else {
                    0.0
                }
            }
            Node::WhileLoop { condition, body } => {
                let mut result = 0.0;
                let mut iterations = 0;
                while iterations < MAX_LOOP_ITERATIONS && self.eval(condition) != 0.0 {
                    result = self.eval(body);
                    iterations += 1;
                }
                result
            }
            Node::Block(body) | Node::Section { body, .. } => self.eval_all(body),
        }
    }

    #[inline]
    fn read(&self, var: &Var) -> f64 {
        match var {
            Var::Named { symbol, .. } => self
                .slots
                .get(*symbol)
                .map_or(0.0, |&address| self.ctx.memory.read(address)),
            port => self.ctx.port(port).unwrap_or(0.0),
        }
    }

    /// Store into `var`. The expression's value is the right-hand side,
    /// not the stored result.
    fn assign(&mut self, var: &Var, op: AssignOp, value: f64) {
        let cell = match var {
            Var::Named { symbol, .. } => {
                let address = self.slots.get(*symbol).copied().unwrap_or(UNBOUND);
                self.ctx.memory.cell_mut(address)
            }
            port => match self.ctx.port_mut(port) {
                Some(cell) => cell,
                None => return,
            },
        };
        *cell = match op {
            AssignOp::Set => value,
            AssignOp::Add => BinaryOp::Add.apply(*cell, value),
            AssignOp::Sub => BinaryOp::Sub.apply(*cell, value),
            AssignOp::Mul => BinaryOp::Mul.apply(*cell, value),
            AssignOp::Div => BinaryOp::Div.apply(*cell, value),
        };
    }

    fn call(&mut self, function: usize, args: &[Node]) -> f64 {
        let mut values = [0.0; MAX_ARGS];
        for (i, arg) in args.iter().enumerate() {
            let value = self.eval(arg);
            if let Some(slot) = values.get_mut(i) {
                *slot = value;
            }
        }
        let count = args.len().min(MAX_ARGS);
        match self.functions.get(function).copied().flatten() {
            Some(f) => f(&values[..count]),
            None => 0.0,
        }
    }
}
