//! Resolved syntax tree of a script.
//!
//! Names are bound while the tree is built: static calls and fields carry
//! the registry member they denote, script function calls carry the
//! function's index, and listeners carry their trigger. Paths keep the
//! text they were written with so the canonical writer can reproduce them.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::runner::plugin::binding::{FieldBinding, Method};
use crate::runner::plugin::registry::TriggerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Meta {
    /// 0-based line in the source.
    pub line_index: usize,
}

pub trait HasMeta {
    fn get_meta(&self) -> &Meta;
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralData {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
    Duration(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Minus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
}

impl AssignmentOperator {
    /// Binary operator applied by a compound assignment.
    pub fn binary(&self) -> Option<BinaryOperator> {
        match self {
            AssignmentOperator::Assign => None,
            AssignmentOperator::Add => Some(BinaryOperator::Add),
            AssignmentOperator::Subtract => Some(BinaryOperator::Subtract),
            AssignmentOperator::Multiply => Some(BinaryOperator::Multiply),
            AssignmentOperator::Divide => Some(BinaryOperator::Divide),
            AssignmentOperator::Remainder => Some(BinaryOperator::Remainder),
        }
    }
}

/// Binding strength, higher binds tighter.
pub(crate) const PREC_OR: u8 = 1;
pub(crate) const PREC_AND: u8 = 2;
pub(crate) const PREC_EQUALITY: u8 = 3;
pub(crate) const PREC_COMPARISON: u8 = 4;
pub(crate) const PREC_ADDITIVE: u8 = 5;
pub(crate) const PREC_MULTIPLICATIVE: u8 = 6;
pub(crate) const PREC_UNARY: u8 = 7;
pub(crate) const PREC_POSTFIX: u8 = 8;

impl UnaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOperator::Minus => "-",
            UnaryOperator::Not => "!",
        }
    }
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Remainder => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessOrEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterOrEqual => ">=",
        }
    }

    pub(crate) fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Equal | BinaryOperator::NotEqual => PREC_EQUALITY,
            BinaryOperator::Less
            | BinaryOperator::LessOrEqual
            | BinaryOperator::Greater
            | BinaryOperator::GreaterOrEqual => PREC_COMPARISON,
            BinaryOperator::Add | BinaryOperator::Subtract => PREC_ADDITIVE,
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Remainder => {
                PREC_MULTIPLICATIVE
            }
        }
    }
}

impl LogicalOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            LogicalOperator::And => "&&",
            LogicalOperator::Or => "||",
        }
    }

    pub(crate) fn precedence(&self) -> u8 {
        match self {
            LogicalOperator::And => PREC_AND,
            LogicalOperator::Or => PREC_OR,
        }
    }
}

impl AssignmentOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            AssignmentOperator::Assign => "=",
            AssignmentOperator::Add => "+=",
            AssignmentOperator::Subtract => "-=",
            AssignmentOperator::Multiply => "*=",
            AssignmentOperator::Divide => "/=",
            AssignmentOperator::Remainder => "%=",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Argument {
    pub name: Option<String>,
    pub value: ExpressionType,
}

#[derive(Clone)]
pub enum CallTarget {
    /// Registered static method, reached through `path`.
    Static { path: String, method: Arc<Method> },
    /// Function declared in the same script.
    Function { name: String, index: usize },
    /// Instance method looked up on the receiver's class at run time.
    Instance {
        object: Box<ExpressionType>,
        name: String,
    },
}

impl fmt::Debug for CallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallTarget::Static { path, .. } => write!(f, "Static({})", path),
            CallTarget::Function { name, index } => write!(f, "Function({}#{})", name, index),
            CallTarget::Instance { object, name } => write!(f, "Instance({:?}.{})", object, name),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExpressionType {
    Literal {
        meta: Meta,
        value: LiteralData,
    },
    List {
        meta: Meta,
        elements: Vec<ExpressionType>,
    },
    Map {
        meta: Meta,
        entries: Vec<(String, ExpressionType)>,
    },
    /// Variable of the current frame.
    Variable {
        meta: Meta,
        name: String,
    },
    StaticField {
        meta: Meta,
        path: String,
        field: Arc<FieldBinding>,
    },
    Member {
        meta: Meta,
        object: Box<ExpressionType>,
        name: String,
    },
    Index {
        meta: Meta,
        object: Box<ExpressionType>,
        index: Box<ExpressionType>,
    },
    Call {
        meta: Meta,
        callee: CallTarget,
        arguments: Vec<Argument>,
    },
    Unary {
        meta: Meta,
        operator: UnaryOperator,
        argument: Box<ExpressionType>,
    },
    Binary {
        meta: Meta,
        operator: BinaryOperator,
        left: Box<ExpressionType>,
        right: Box<ExpressionType>,
    },
    Logical {
        meta: Meta,
        operator: LogicalOperator,
        left: Box<ExpressionType>,
        right: Box<ExpressionType>,
    },
}

impl HasMeta for ExpressionType {
    fn get_meta(&self) -> &Meta {
        match self {
            ExpressionType::Literal { meta, .. }
            | ExpressionType::List { meta, .. }
            | ExpressionType::Map { meta, .. }
            | ExpressionType::Variable { meta, .. }
            | ExpressionType::StaticField { meta, .. }
            | ExpressionType::Member { meta, .. }
            | ExpressionType::Index { meta, .. }
            | ExpressionType::Call { meta, .. }
            | ExpressionType::Unary { meta, .. }
            | ExpressionType::Binary { meta, .. }
            | ExpressionType::Logical { meta, .. } => meta,
        }
    }
}

impl ExpressionType {
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            ExpressionType::Binary { operator, .. } => operator.precedence(),
            ExpressionType::Logical { operator, .. } => operator.precedence(),
            ExpressionType::Unary { .. } => PREC_UNARY,
            _ => PREC_POSTFIX,
        }
    }
}

#[derive(Debug, Clone)]
pub enum AssignTarget {
    Variable(String),
    StaticField {
        path: String,
        field: Arc<FieldBinding>,
    },
    /// Instance field of a host object, or key of a map held in a variable.
    Member {
        object: ExpressionType,
        name: String,
    },
    /// Element of a list or map held in a variable.
    Index {
        variable: String,
        index: ExpressionType,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub statements: Vec<StatementType>,
}

#[derive(Debug, Clone)]
pub enum StatementType {
    Expression {
        meta: Meta,
        expression: ExpressionType,
    },
    Assign {
        meta: Meta,
        target: AssignTarget,
        operator: AssignmentOperator,
        value: ExpressionType,
    },
    /// `if` with its `else if` chain.
    If {
        meta: Meta,
        branches: Vec<(ExpressionType, Block)>,
        otherwise: Option<Block>,
    },
    While {
        meta: Meta,
        condition: ExpressionType,
        body: Block,
    },
    For {
        meta: Meta,
        variable: String,
        iterable: ExpressionType,
        body: Block,
    },
    Break {
        meta: Meta,
    },
    Continue {
        meta: Meta,
    },
    Return {
        meta: Meta,
        value: Option<ExpressionType>,
    },
    Stop {
        meta: Meta,
    },
}

impl HasMeta for StatementType {
    fn get_meta(&self) -> &Meta {
        match self {
            StatementType::Expression { meta, .. }
            | StatementType::Assign { meta, .. }
            | StatementType::If { meta, .. }
            | StatementType::While { meta, .. }
            | StatementType::For { meta, .. }
            | StatementType::Break { meta }
            | StatementType::Continue { meta }
            | StatementType::Return { meta, .. }
            | StatementType::Stop { meta } => meta,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub meta: Meta,
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct ListenerDecl {
    pub meta: Meta,
    pub path: String,
    pub trigger: TriggerId,
    pub arguments: Vec<Argument>,
    pub body: Block,
    /// May run on a worker thread.
    pub asynchronous: bool,
}

/// Top level items in source order.
#[derive(Debug, Clone)]
pub enum TopLevel {
    Statement(StatementType),
    Function(usize),
    Listener(usize),
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub source_name: String,
    pub body: Vec<TopLevel>,
    pub functions: Vec<FunctionDecl>,
    pub listeners: Vec<ListenerDecl>,
}

impl Program {
    pub fn statements(&self) -> impl Iterator<Item = &StatementType> {
        self.body.iter().filter_map(|item| match item {
            TopLevel::Statement(s) => Some(s),
            _ => None,
        })
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.iter().find(|f| f.name == name)
    }
}
