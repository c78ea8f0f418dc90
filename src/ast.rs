use serde::{Deserialize, Serialize};

/// A parsed script body.
///
/// Named variables and called functions are interned while parsing so the
/// interpreter can bind them once at install time instead of hashing names
/// on every evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub items: Vec<Node>,
    /// Interned user variable names, indexed by `Var::Named::symbol`.
    pub symbols: Vec<String>,
    /// Interned function names, indexed by `Node::FunctionCall::function`.
    pub functions: Vec<String>,
}

/// One node of the script tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// `@name` followed by its statements.
    Section { name: String, body: Vec<Node> },
    /// `target op value`; only a bare `Variable` target is writable.
    Assignment {
        op: AssignOp,
        target: Box<Node>,
        value: Box<Node>,
    },
    BinaryOp {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    UnaryOp { op: UnaryOp, operand: Box<Node> },
    FunctionCall {
        name: String,
        function: usize,
        args: Vec<Node>,
    },
    Variable(Var),
    /// `name[index]` into a declared array.
    ArrayAccess { name: String, index: Box<Node> },
    Number(f64),
    /// String literal. Evaluates to 0.0.
    String(String),
    /// Also produced by the `cond ? a : b` form.
    IfStatement {
        condition: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Option<Box<Node>>,
    },
    WhileLoop { condition: Box<Node>, body: Box<Node> },
    /// Statement sequence; evaluates to its last statement.
    Block(Vec<Node>),
}

/// A variable reference, classified when parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Var {
    Spl0,
    Spl1,
    Srate,
    Tempo,
    BeatPosition,
    PlayState,
    TsNum,
    TsDenom,
    /// `sliderN`, stored zero-based.
    Slider(usize),
    Named { name: String, symbol: usize },
}

impl Var {
    /// Display name as written in scripts.
    pub fn name(&self) -> String {
        match self {
            Var::Spl0 => "spl0".into(),
            Var::Spl1 => "spl1".into(),
            Var::Srate => "srate".into(),
            Var::Tempo => "tempo".into(),
            Var::BeatPosition => "beat_position".into(),
            Var::PlayState => "play_state".into(),
            Var::TsNum => "ts_num".into(),
            Var::TsDenom => "ts_denom".into(),
            Var::Slider(index) => format!("slider{}", index + 1),
            Var::Named { name, .. } => name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(AssignOp::Set),
            "+=" => Some(AssignOp::Add),
            "-=" => Some(AssignOp::Sub),
            "*=" => Some(AssignOp::Mul),
            "/=" => Some(AssignOp::Div),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(BinaryOp::Add),
            "-" => Some(BinaryOp::Sub),
            "*" => Some(BinaryOp::Mul),
            "/" => Some(BinaryOp::Div),
            "==" => Some(BinaryOp::Eq),
            "!=" => Some(BinaryOp::Ne),
            "<" => Some(BinaryOp::Lt),
            ">" => Some(BinaryOp::Gt),
            "<=" => Some(BinaryOp::Le),
            ">=" => Some(BinaryOp::Ge),
            "&&" => Some(BinaryOp::And),
            "||" => Some(BinaryOp::Or),
            _ => None,
        }
    }

    /// Apply to two values. Division by zero yields 0.0.
    #[inline]
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        let truth = |b: bool| if b { 1.0 } else { 0.0 };
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => {
                if rhs != 0.0 {
                    lhs / rhs
                } else {
                    0.0
                }
            }
            BinaryOp::Eq => truth(lhs == rhs),
            BinaryOp::Ne => truth(lhs != rhs),
            BinaryOp::Lt => truth(lhs < rhs),
            BinaryOp::Gt => truth(lhs > rhs),
            BinaryOp::Le => truth(lhs <= rhs),
            BinaryOp::Ge => truth(lhs >= rhs),
            BinaryOp::And => truth(lhs != 0.0 && rhs != 0.0),
            BinaryOp::Or => truth(lhs != 0.0 || rhs != 0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

impl UnaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "-" => Some(UnaryOp::Neg),
            "+" => Some(UnaryOp::Plus),
            "!" => Some(UnaryOp::Not),
            _ => None,
        }
    }

    #[inline]
    pub fn apply(self, operand: f64) -> f64 {
        match self {
            UnaryOp::Neg => -operand,
            UnaryOp::Plus => operand,
            UnaryOp::Not => {
                if operand == 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

impl Program {
    /// Top-level `@section` nodes in source order.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &[Node])> {
        self.items.iter().filter_map(|item| match item {
            Node::Section { name, body } => Some((name.as_str(), body.as_slice())),
            _ => None,
        })
    }
}
