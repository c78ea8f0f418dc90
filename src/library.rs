//! Built-in effect scripts.
//!
//! Operators in the script language share one precedence level and group
//! left to right, so the scripts below parenthesize every product that is
//! not the leftmost term.

use crate::effect::Effect;

pub const SIMPLE_GAIN: &str = r#"
desc:Simple Gain
tags:utility
slider1:0<-60,24,0.1>Gain (dB)

@slider
gain = db2gain(slider1);

@sample
spl0 *= gain;
spl1 *= gain;
"#;

pub const RESONANT_LOWPASS: &str = r#"
desc:Resonant Lowpass Filter
tags:filter
slider1:1000<20,20000>Frequency (Hz)
slider2:0.8<0,1>Resonance

in_pin:left input
in_pin:right input
out_pin:left output
out_pin:right output

@slider
cut_lp = slider1 * 2 / srate;
res_lp = slider2;
fb_lp = res_lp + (res_lp / (1 - cut_lp));

@sample
n3 = n3 + (cut_lp * (spl0 - n3 + (fb_lp * (n3 - n4))));
n4 = n4 + (cut_lp * (n3 - n4));
spl0 = n4;

rn3 = rn3 + (cut_lp * (spl1 - rn3 + (fb_lp * (rn3 - rn4))));
rn4 = rn4 + (cut_lp * (rn3 - rn4));
spl1 = rn4;
"#;

pub const SIMPLE_COMPRESSOR: &str = r#"
desc:Simple Compressor
tags:dynamics
slider1:-12<-60,0,1>Threshold (dB)
slider2:4<1,20,0.1>Ratio
slider3:5<0,200,0.1>Attack (ms)
slider4:250<0,1000,1>Release (ms)
slider5:0<-24,24,1>Makeup Gain (dB)

@init
env = 0;

@slider
threshold = db2gain(slider1);
ratio = slider2;
attack = exp(-1 / (slider3 * srate / 1000));
release = exp(-1 / (slider4 * srate / 1000));
makeup = db2gain(slider5);

@sample
peak = max(abs(spl0), abs(spl1));

env = peak > env
  ? (peak * (1 - attack)) + (env * attack)
  : (peak * (1 - release)) + (env * release);

over = env > threshold ? env / threshold : 1;
over = over > 1 ? 1 + ((over - 1) / ratio) : over;
gain = over > 1 ? 1 / over : 1;

spl0 *= gain * makeup;
spl1 *= gain * makeup;
"#;

pub const HIGH_PASS: &str = r#"
desc:High Pass Filter
tags:filter
slider1:80<20,20000>Frequency (Hz)
slider2:0.707<0.1,10>Q

@slider
freq = slider1 / srate;
q = slider2;
w = 2 * $pi * freq;
cosw = cos(w);
sinw = sin(w);
alpha = sinw / (2 * q);

b0 = (1 + cosw) / 2;
b1 = -(1 + cosw);
b2 = (1 + cosw) / 2;
a0 = 1 + alpha;
a1 = -2 * cosw;
a2 = 1 - alpha;

b0 /= a0;
b1 /= a0;
b2 /= a0;
a1 /= a0;
a2 /= a0;

@sample
y = (b0 * spl0) + (b1 * x1_l) + (b2 * x2_l) - (a1 * y1_l) - (a2 * y2_l);
x2_l = x1_l;
x1_l = spl0;
y2_l = y1_l;
y1_l = y;
spl0 = y;

y = (b0 * spl1) + (b1 * x1_r) + (b2 * x2_r) - (a1 * y1_r) - (a2 * y2_r);
x2_r = x1_r;
x1_r = spl1;
y2_r = y1_r;
y1_r = y;
spl1 = y;
"#;

pub const DC_REMOVE: &str = r#"
desc:DC Offset Removal
tags:filter utility
slider1:5<1,50>Cutoff (Hz)

@slider
pole = 1 - (slider1 * 2 * $pi / srate);

@sample
y_l = spl0 - x_l + (pole * y_l);
x_l = spl0;
spl0 = y_l;

y_r = spl1 - x_r + (pole * y_r);
x_r = spl1;
spl1 = y_r;
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Dynamics,
    Filter,
    Utility,
}

#[derive(Debug, Clone, Copy)]
pub struct LibraryEntry {
    pub name: &'static str,
    pub source: &'static str,
    pub categories: &'static [Category],
}

const ENTRIES: &[LibraryEntry] = &[
    LibraryEntry {
        name: "Simple Gain",
        source: SIMPLE_GAIN,
        categories: &[Category::Utility],
    },
    LibraryEntry {
        name: "Resonant Lowpass",
        source: RESONANT_LOWPASS,
        categories: &[Category::Filter],
    },
    LibraryEntry {
        name: "Simple Compressor",
        source: SIMPLE_COMPRESSOR,
        categories: &[Category::Dynamics],
    },
    LibraryEntry {
        name: "High Pass Filter",
        source: HIGH_PASS,
        categories: &[Category::Filter],
    },
    LibraryEntry {
        name: "DC Remove",
        source: DC_REMOVE,
        categories: &[Category::Filter, Category::Utility],
    },
];

/// Lookup of the built-in effects by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinLibrary;

impl BuiltinLibrary {
    pub fn entries(&self) -> &'static [LibraryEntry] {
        ENTRIES
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        ENTRIES.iter().map(|e| e.name)
    }

    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &'static str> {
        ENTRIES
            .iter()
            .filter(move |e| e.categories.contains(&category))
            .map(|e| e.name)
    }

    pub fn script(&self, name: &str) -> Option<&'static str> {
        ENTRIES.iter().find(|e| e.name == name).map(|e| e.source)
    }

    /// A loaded, uninitialized effect running the named script.
    pub fn create_effect(&self, name: &str) -> Option<Effect> {
        let source = self.script(name)?;
        let mut effect = Effect::new();
        effect.load_effect(source).then_some(effect)
    }
}
