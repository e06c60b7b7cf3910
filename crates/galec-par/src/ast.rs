//! AST node definitions.
//!
//! A closed sum of node variants, each carrying its source span. Name
//! occurrences that the resolver binds to symbols (expression identifiers,
//! declared variable names, function arguments) carry a [`NodeId`] so the
//! identifier-to-symbol map can key on them.

use galec_util::FileSpan;

/// Identity of a bindable name occurrence, unique within one package.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// Allocator for [`NodeId`]s. One per package; shared by the parsers of
/// all its files.
#[derive(Debug, Default)]
pub struct NodeIds {
    next: u32,
}

impl NodeIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

// Declarations

/// One parsed source file.
#[derive(Debug)]
pub struct File {
    pub span: FileSpan,
    pub pkg: String,
    pub imports: Vec<ImportDecl>,
    pub type_decls: Vec<TypeDecl>,
    pub const_decls: Vec<ConstDecl>,
    pub var_decls: Vec<VarDecl>,
    pub func_decls: Vec<FuncDecl>,
}

#[derive(Debug)]
pub struct ImportDecl {
    pub span: FileSpan,
    pub path: String,
}

impl ImportDecl {
    /// The name the import is registered under: its last path segment.
    pub fn local_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[derive(Debug)]
pub struct TypeDecl {
    pub span: FileSpan,
    pub name: String,
    pub ty: TypeExpr,
}

#[derive(Debug)]
pub struct ConstDecl {
    pub span: FileSpan,
    pub name: String,
    pub body: Expr,
}

/// A `var` declaration, top-level or statement.
///
/// `var x T = E` is lowered by the parser into a declaration whose `init`
/// is the assignment `x = E` over a synthesized identifier node.
#[derive(Debug)]
pub struct VarDecl {
    pub span: FileSpan,
    pub id: NodeId,
    pub name: String,
    pub ty: TypeExpr,
    pub init: Option<AssignStmt>,
}

#[derive(Debug)]
pub struct FuncDecl {
    pub span: FileSpan,
    pub name: String,
    pub args: Vec<ArgDef>,
    pub ret: Option<TypeExpr>,
    pub is_var_arg: bool,
    pub body: Vec<Stmt>,
}

#[derive(Debug)]
pub struct ArgDef {
    pub span: FileSpan,
    pub id: NodeId,
    pub name: String,
    pub ty: TypeExpr,
}

// Type expressions

#[derive(Debug)]
pub enum TypeExpr {
    /// A type name: a builtin or a declared named type.
    Name { span: FileSpan, name: String },
    Pointer {
        span: FileSpan,
        inner: Box<TypeExpr>,
    },
    Array {
        span: FileSpan,
        dim: i64,
        elem: Box<TypeExpr>,
    },
    Struct {
        span: FileSpan,
        fields: Vec<FieldDef>,
    },
}

impl TypeExpr {
    pub fn span(&self) -> &FileSpan {
        match self {
            TypeExpr::Name { span, .. }
            | TypeExpr::Pointer { span, .. }
            | TypeExpr::Array { span, .. }
            | TypeExpr::Struct { span, .. } => span,
        }
    }
}

#[derive(Debug)]
pub struct FieldDef {
    pub span: FileSpan,
    pub name: String,
    pub ty: TypeExpr,
}

// Statements

#[derive(Debug)]
pub enum Stmt {
    VarDecl(VarDecl),
    If(IfStmt),
    For(ForStmt),
    Return(ReturnStmt),
    Assign(AssignStmt),
    Expr(ExprStmt),
    Break { span: FileSpan },
    Continue { span: FileSpan },
    Empty { span: FileSpan },
}

impl Stmt {
    pub fn span(&self) -> &FileSpan {
        match self {
            Stmt::VarDecl(s) => &s.span,
            Stmt::If(s) => &s.span,
            Stmt::For(s) => &s.span,
            Stmt::Return(s) => &s.span,
            Stmt::Assign(s) => &s.span,
            Stmt::Expr(s) => &s.span,
            Stmt::Break { span } | Stmt::Continue { span } | Stmt::Empty { span } => span,
        }
    }
}

#[derive(Debug)]
pub struct IfStmt {
    pub span: FileSpan,
    pub cond: Expr,
    pub body: Vec<Stmt>,
    /// Else branch; an `else if` chain is a single nested `If` here.
    pub els: Vec<Stmt>,
}

#[derive(Debug)]
pub struct ForStmt {
    pub span: FileSpan,
    pub init: Option<Box<Stmt>>,
    pub cond: Option<Expr>,
    pub step: Option<Box<Stmt>>,
    pub body: Vec<Stmt>,
}

#[derive(Debug)]
pub struct ReturnStmt {
    pub span: FileSpan,
    pub expr: Option<Expr>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
}

#[derive(Debug)]
pub struct AssignStmt {
    pub span: FileSpan,
    pub op: AssignOp,
    pub l: Expr,
    pub r: Expr,
}

#[derive(Debug)]
pub struct ExprStmt {
    pub span: FileSpan,
    pub expr: Expr,
}

// Expressions

#[derive(Debug)]
pub enum Expr {
    Ident(Ident),
    Constant(ConstantLit),
    Str(StringLit),
    Binop(Box<Binop>),
    Unop(Box<Unop>),
    Call(Box<Call>),
    Selector(Box<Selector>),
    Index(Box<IndexInto>),
}

impl Expr {
    pub fn span(&self) -> &FileSpan {
        match self {
            Expr::Ident(e) => &e.span,
            Expr::Constant(e) => &e.span,
            Expr::Str(e) => &e.span,
            Expr::Binop(e) => &e.span,
            Expr::Unop(e) => &e.span,
            Expr::Call(e) => &e.span,
            Expr::Selector(e) => &e.span,
            Expr::Index(e) => &e.span,
        }
    }
}

#[derive(Debug)]
pub struct Ident {
    pub span: FileSpan,
    pub id: NodeId,
    pub name: String,
}

#[derive(Debug)]
pub struct ConstantLit {
    pub span: FileSpan,
    pub value: i64,
}

#[derive(Debug)]
pub struct StringLit {
    pub span: FileSpan,
    pub value: String,
}

/// Binary operators, lowest to highest precedence group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Or,     // ||
    And,    // &&
    Eq,     // ==
    NotEq,  // !=
    Lt,     // <
    LtEq,   // <=
    Gt,     // >
    GtEq,   // >=
    Add,    // +
    Sub,    // -
    BitOr,  // |
    BitXor, // ^
    Mul,    // *
    Div,    // /
    Rem,    // %
    Shl,    // <<
    Shr,    // >>
    BitAnd, // &
    AndNot, // &^
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BinOp::Or => "||",
            BinOp::And => "&&",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::LtEq => "<=",
            BinOp::Gt => ">",
            BinOp::GtEq => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::BitAnd => "&",
            BinOp::AndNot => "&^",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    /// `&` address-of
    Addr,
    /// `*` dereference
    Deref,
    /// `-` negation
    Neg,
}

impl std::fmt::Display for UnOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            UnOp::Addr => "&",
            UnOp::Deref => "*",
            UnOp::Neg => "-",
        })
    }
}

#[derive(Debug)]
pub struct Binop {
    pub span: FileSpan,
    pub op: BinOp,
    pub l: Expr,
    pub r: Expr,
}

#[derive(Debug)]
pub struct Unop {
    pub span: FileSpan,
    pub op: UnOp,
    pub expr: Expr,
}

#[derive(Debug)]
pub struct Call {
    pub span: FileSpan,
    pub callee: Expr,
    pub args: Vec<Expr>,
}

#[derive(Debug)]
pub struct Selector {
    pub span: FileSpan,
    pub expr: Expr,
    pub name: String,
}

#[derive(Debug)]
pub struct IndexInto {
    pub span: FileSpan,
    pub expr: Expr,
    pub index: Expr,
}
