use serde::{Deserialize, Serialize};

use crate::ast::{Node, Program};
use crate::error::LoadError;
use crate::header::{parse_header, ScriptInfo};
use crate::parser::Parser;

/// The sections a script may define.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionKind {
    Init,
    Slider,
    Sample,
    Block,
    /// Parsed but never executed.
    Gfx,
}

impl SectionKind {
    pub const ALL: [SectionKind; 5] = [
        SectionKind::Init,
        SectionKind::Slider,
        SectionKind::Sample,
        SectionKind::Block,
        SectionKind::Gfx,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "@init" => Some(SectionKind::Init),
            "@slider" => Some(SectionKind::Slider),
            "@sample" => Some(SectionKind::Sample),
            "@block" => Some(SectionKind::Block),
            "@gfx" => Some(SectionKind::Gfx),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SectionKind::Init => "@init",
            SectionKind::Slider => "@slider",
            SectionKind::Sample => "@sample",
            SectionKind::Block => "@block",
            SectionKind::Gfx => "@gfx",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// A fully parsed script, ready to be installed into an interpreter.
///
/// Building one allocates freely and belongs on a control thread. The
/// real-time side only ever receives finished values of this type.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    info: ScriptInfo,
    program: Program,
    sections: [Option<usize>; 5],
}

impl CompiledScript {
    pub fn info(&self) -> &ScriptInfo {
        &self.info
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Statements of `kind`. When a section appears more than once, the last
    /// one wins.
    pub fn section(&self, kind: SectionKind) -> Option<&[Node]> {
        let index = self.sections[kind.slot()]?;
        match &self.program.items[index] {
            Node::Section { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn has_section(&self, kind: SectionKind) -> bool {
        self.sections[kind.slot()].is_some()
    }

    /// Slider slot and declared default for every slider.
    pub fn slider_defaults(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.info.sliders.iter().map(|s| (s.index, s.default))
    }
}

/// Parse header and body of a script.
pub fn compile(source: &str) -> Result<CompiledScript, LoadError> {
    let (info, body) = parse_header(source)?;
    let program = Parser::from_source(&body).parse_program()?;

    let mut sections = [None; 5];
    let mut loose = 0usize;
    for (index, item) in program.items.iter().enumerate() {
        match item {
            Node::Section { name, .. } => match SectionKind::from_name(name) {
                Some(kind) => sections[kind.slot()] = Some(index),
                None => log::debug!("ignoring unknown section '{name}'"),
            },
            _ => loose += 1,
        }
    }
    if loose > 0 {
        log::debug!("{loose} statement(s) outside any section will not run");
    }
    log::debug!(
        "compiled '{}': sections [{}], {} variable(s), {} function(s)",
        info.description,
        SectionKind::ALL
            .iter()
            .filter(|k| sections[k.slot()].is_some())
            .map(|k| k.name())
            .collect::<Vec<_>>()
            .join(" "),
        program.symbols.len(),
        program.functions.len()
    );

    Ok(CompiledScript {
        info,
        program,
        sections,
    })
}
