/// Native implementation of a script-callable function.
///
/// Receives every evaluated argument; missing arguments read as 0.0.
pub type BuiltinFn = fn(&[f64]) -> f64;

#[inline]
fn arg(args: &[f64], i: usize) -> f64 {
    args.get(i).copied().unwrap_or(0.0)
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

pub fn db2gain(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

pub fn gain2db(gain: f64) -> f64 {
    20.0 * gain.max(1e-10).log10()
}

pub fn midi2freq(note: f64) -> f64 {
    440.0 * 2f64.powf((note - 69.0) / 12.0)
}

pub fn freq2midi(freq: f64) -> f64 {
    69.0 + 12.0 * (freq.max(1e-10) / 440.0).log2()
}

/// The immutable function table every context shares.
pub static BUILTINS: &[(&str, BuiltinFn)] = &[
    ("sin", |a| arg(a, 0).sin()),
    ("cos", |a| arg(a, 0).cos()),
    ("tan", |a| arg(a, 0).tan()),
    ("asin", |a| arg(a, 0).asin()),
    ("acos", |a| arg(a, 0).acos()),
    ("atan", |a| arg(a, 0).atan()),
    ("atan2", |a| arg(a, 0).atan2(arg(a, 1))),
    ("exp", |a| arg(a, 0).exp()),
    ("log", |a| arg(a, 0).ln()),
    ("log10", |a| arg(a, 0).log10()),
    ("pow", |a| arg(a, 0).powf(arg(a, 1))),
    ("sqrt", |a| arg(a, 0).sqrt()),
    ("abs", |a| arg(a, 0).abs()),
    ("floor", |a| arg(a, 0).floor()),
    ("ceil", |a| arg(a, 0).ceil()),
    ("min", |a| arg(a, 0).min(arg(a, 1))),
    ("max", |a| arg(a, 0).max(arg(a, 1))),
    ("sign", |a| sign(arg(a, 0))),
    ("db2gain", |a| db2gain(arg(a, 0))),
    ("gain2db", |a| gain2db(arg(a, 0))),
    ("midi2freq", |a| midi2freq(arg(a, 0))),
    ("freq2midi", |a| freq2midi(arg(a, 0))),
];

pub fn lookup(name: &str) -> Option<BuiltinFn> {
    BUILTINS.iter().find(|(n, _)| *n == name).map(|&(_, f)| f)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|&(n, _)| n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[f64]) -> f64 {
        lookup(name).unwrap_or_else(|| panic!("missing builtin {name}"))(args)
    }

    #[test]
    fn test_math() {
        assert_eq!(call("abs", &[-3.0]), 3.0);
        assert_eq!(call("min", &[2.0, -1.0]), -1.0);
        assert_eq!(call("max", &[2.0, -1.0]), 2.0);
        assert_eq!(call("pow", &[2.0, 10.0]), 1024.0);
        assert_eq!(call("floor", &[1.7]), 1.0);
        assert_eq!(call("ceil", &[1.2]), 2.0);
        assert_eq!(call("sign", &[-0.5]), -1.0);
        assert_eq!(call("sign", &[0.0]), 0.0);
        assert!((call("atan2", &[1.0, 1.0]) - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
    }

    #[test]
    fn test_missing_arguments_read_zero() {
        assert_eq!(call("sin", &[]), 0.0);
        assert_eq!(call("max", &[-2.0]), 0.0);
        assert_eq!(call("pow", &[]), 1.0);
    }

    #[test]
    fn test_audio_conversions() {
        assert!((db2gain(-6.0) - 0.501_187).abs() < 1e-6);
        assert!((gain2db(1.0)).abs() < 1e-12);
        assert_eq!(gain2db(0.0), -200.0);
        assert!((midi2freq(69.0) - 440.0).abs() < 1e-9);
        assert!((midi2freq(81.0) - 880.0).abs() < 1e-9);
        assert!((freq2midi(440.0) - 69.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_name() {
        assert!(lookup("foo").is_none());
        assert_eq!(names().count(), BUILTINS.len());
    }
}
