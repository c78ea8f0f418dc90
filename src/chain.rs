use crate::config::ProcessorConfig;
use crate::dsp::buffer::AudioBuffer;
use crate::effect::Effect;

/// Effects processed in series. Bypassed or unloaded effects pass audio
/// through, so one broken script never silences the chain.
#[derive(Debug, Default)]
pub struct EffectChain {
    effects: Vec<Effect>,
    bypassed: bool,
}

impl EffectChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    /// Insert at `index`. Returns false, dropping `effect`, if `index` is
    /// past the end.
    pub fn insert(&mut self, index: usize, effect: Effect) -> bool {
        if index > self.effects.len() {
            return false;
        }
        self.effects.insert(index, effect);
        true
    }

    pub fn remove(&mut self, index: usize) -> Option<Effect> {
        (index < self.effects.len()).then(|| self.effects.remove(index))
    }

    /// Move the effect at `from` so it ends up before the effect currently
    /// at `to`. Moving forward therefore lands one slot earlier than `to`.
    pub fn move_effect(&mut self, from: usize, to: usize) -> bool {
        let len = self.effects.len();
        if from >= len || to >= len || from == to {
            return false;
        }
        let effect = self.effects.remove(from);
        let to = if from < to { to - 1 } else { to };
        self.effects.insert(to, effect);
        true
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn effect(&self, index: usize) -> Option<&Effect> {
        self.effects.get(index)
    }

    pub fn effect_mut(&mut self, index: usize) -> Option<&mut Effect> {
        self.effects.get_mut(index)
    }

    pub fn effects(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter()
    }

    pub fn set_effect_bypass(&mut self, index: usize, bypassed: bool) {
        if let Some(effect) = self.effects.get_mut(index) {
            effect.set_bypassed(bypassed);
        }
    }

    pub fn is_effect_bypassed(&self, index: usize) -> bool {
        self.effects.get(index).is_some_and(Effect::is_bypassed)
    }

    pub fn set_bypassed(&mut self, bypassed: bool) {
        self.bypassed = bypassed;
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    /// Initialize every loaded effect for `config`.
    pub fn initialize(&mut self, config: &ProcessorConfig) {
        for effect in self.effects.iter_mut().filter(|e| e.is_loaded()) {
            effect.initialize_with(config);
        }
    }

    pub fn process_block(&mut self, buffer: &mut AudioBuffer) {
        if self.bypassed {
            return;
        }
        for effect in &mut self.effects {
            effect.process_block(buffer);
        }
    }

    pub fn process_sample(&mut self, left: f64, right: f64) -> (f64, f64) {
        if self.bypassed {
            return (left, right);
        }
        self.effects
            .iter_mut()
            .fold((left, right), |(l, r), effect| effect.process_sample(l, r))
    }
}
