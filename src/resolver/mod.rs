mod error;

pub use error::{ResolutionError, ResolutionErrorKind};

use std::collections::HashMap;

use compact_str::CompactString;
use log::debug;

use crate::parser::ast::{Ast, ClassDecl, Expr, ExprId, FunctionDecl, Ident, Stmt, StmtId};
use crate::parser::ErrorLocation;

/// Coordinates of a resolved local reference: the number of environment
/// hops outward from the current frame, and the slot within that frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub depth: usize,
    pub index: usize,
}

/// Side-table from expression identity to local-variable coordinates.
/// Global references have no entry and are looked up by name at runtime.
pub type ResolutionMap = HashMap<ExprId, Slot>;

/// A program that passed resolution, bundled with its side-table. User
/// functions keep a shared handle to this so closures stay callable after
/// the run that created them.
#[derive(Debug)]
pub struct ResolvedAst {
    ast: Ast,
    resolution: ResolutionMap,
}

impl ResolvedAst {
    pub fn resolution(&self) -> &ResolutionMap {
        &self.resolution
    }

    pub fn lookup(&self, expr: ExprId) -> Option<Slot> {
        self.resolution.get(&expr).copied()
    }
}

impl std::ops::Deref for ResolvedAst {
    type Target = Ast;

    fn deref(&self) -> &Self::Target {
        &self.ast
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionEnvironment {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassEnvironment {
    None,
    Class,
}

#[derive(Debug)]
struct Variable {
    name: Ident,
    defined: bool,
    used: bool,
    /// Declaration index within the scope; equals the runtime slot.
    index: usize,
}

/// Static pass over the AST. Binds every local reference to a
/// `(depth, slot)` pair and enforces the rules that need lexical context:
/// no self-referential initializers, no duplicate declarations, no unused
/// locals, no `return` outside functions or with a value inside `init`,
/// no `break` outside loops, no `this` outside classes.
///
/// The pass never mutates the AST; its only output is the side-table.
pub struct Resolver {
    resolution: ResolutionMap,
    scopes: Vec<HashMap<CompactString, Variable>>,
    function: FunctionEnvironment,
    class: ClassEnvironment,
    loop_depth: u32,
    /// Name of the global declaration whose initializer is being resolved.
    /// Globals have no scope entry, so the self-reference rule needs this.
    global_initializer: Option<CompactString>,
    errors: Vec<ResolutionError>,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            resolution: ResolutionMap::new(),
            scopes: Vec::new(),
            function: FunctionEnvironment::None,
            class: ClassEnvironment::None,
            loop_depth: 0,
            global_initializer: None,
            errors: Vec::new(),
        }
    }

    pub fn resolve(mut self, ast: Ast) -> Result<ResolvedAst, Vec<ResolutionError>> {
        for &stmt in ast.top_level() {
            self.resolve_stmt(&ast, stmt);
        }
        debug!("resolved {} local references", self.resolution.len());
        if self.errors.is_empty() {
            Ok(ResolvedAst {
                ast,
                resolution: self.resolution,
            })
        } else {
            Err(self.errors)
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

// Statements
impl Resolver {
    fn resolve_stmt(&mut self, ast: &Ast, stmt: StmtId) {
        match ast.stmt(stmt) {
            Stmt::Print { expr } | Stmt::Expression { expr } => self.resolve_expr(ast, *expr),
            Stmt::VariableDecl(decl) => {
                self.declare(&decl.name);
                if let Some(initializer) = decl.initializer {
                    let track_global = self.scopes.is_empty();
                    if track_global {
                        self.global_initializer = Some(decl.name.name.clone());
                    }
                    self.resolve_expr(ast, initializer);
                    if track_global {
                        self.global_initializer = None;
                    }
                }
                self.define(&decl.name);
            }
            Stmt::Block { statements } => {
                self.begin_scope();
                for &stmt in statements {
                    self.resolve_stmt(ast, stmt);
                }
                self.end_scope();
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(ast, *condition);
                self.resolve_stmt(ast, *then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(ast, *else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(ast, *condition);
                self.loop_depth += 1;
                self.resolve_stmt(ast, *body);
                self.loop_depth -= 1;
            }
            Stmt::Break { line } => {
                if self.loop_depth == 0 {
                    self.error(*line, "break", ResolutionErrorKind::BreakOutsideLoop);
                }
            }
            Stmt::Return { line, value } => {
                match self.function {
                    FunctionEnvironment::None => {
                        self.error(*line, "return", ResolutionErrorKind::TopLevelReturn);
                    }
                    FunctionEnvironment::Initializer if value.is_some() => {
                        self.error(
                            *line,
                            "return",
                            ResolutionErrorKind::ReturnValueInInitializer,
                        );
                    }
                    _ => {}
                }
                if let Some(value) = value {
                    self.resolve_expr(ast, *value);
                }
            }
            Stmt::FunctionDecl(decl) => {
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(ast, decl, FunctionEnvironment::Function);
            }
            Stmt::ClassDecl(decl) => self.resolve_class_decl(ast, decl),
        }
    }

    fn resolve_function(&mut self, ast: &Ast, decl: &FunctionDecl, environment: FunctionEnvironment) {
        let enclosing_function = std::mem::replace(&mut self.function, environment);
        // `break` cannot cross a function boundary.
        let enclosing_loop_depth = std::mem::replace(&mut self.loop_depth, 0);

        self.begin_scope();
        for parameter in &decl.parameters {
            self.declare(parameter);
            self.define(parameter);
        }
        // The body's statements resolve directly in the parameter scope;
        // the body block gets no scope of its own.
        for &stmt in &decl.body {
            self.resolve_stmt(ast, stmt);
        }
        self.end_scope();

        self.loop_depth = enclosing_loop_depth;
        self.function = enclosing_function;
    }

    fn resolve_class_decl(&mut self, ast: &Ast, decl: &ClassDecl) {
        self.declare(&decl.name);
        self.define(&decl.name);

        let enclosing_class = std::mem::replace(&mut self.class, ClassEnvironment::Class);

        // Methods resolve inside a scope that pre-binds `this` at slot 0,
        // matching the frame built when a method is bound to an instance.
        self.begin_scope();
        self.declare_this(decl.name.line);
        for method in &decl.methods {
            let environment = if method.name.name == "init" {
                FunctionEnvironment::Initializer
            } else {
                FunctionEnvironment::Method
            };
            self.resolve_function(ast, method, environment);
        }
        self.end_scope();

        self.class = enclosing_class;
    }
}

// Expressions
impl Resolver {
    fn resolve_expr(&mut self, ast: &Ast, expr: ExprId) {
        match ast.expr(expr) {
            Expr::Literal { .. } => {}
            Expr::Unary { operand, .. } => self.resolve_expr(ast, *operand),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(ast, *left);
                self.resolve_expr(ast, *right);
            }
            Expr::Variable { name } => self.resolve_variable_expr(expr, name),
            Expr::Assignment { name, value } => {
                self.resolve_expr(ast, *value);
                self.resolve_local(expr, name.name.as_str());
            }
            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(ast, *callee);
                for &argument in arguments {
                    self.resolve_expr(ast, argument);
                }
            }
            Expr::Get { object, .. } => self.resolve_expr(ast, *object),
            Expr::Set { object, value, .. } => {
                self.resolve_expr(ast, *value);
                self.resolve_expr(ast, *object);
            }
            Expr::This { line } => {
                if matches!(self.class, ClassEnvironment::None) {
                    self.error(*line, "this", ResolutionErrorKind::ThisOutsideClass);
                } else {
                    self.resolve_local(expr, "this");
                }
            }
        }
    }

    fn resolve_variable_expr(&mut self, expr: ExprId, name: &Ident) {
        // Reading a variable whose own initializer is still being resolved.
        let self_referential = match self.scopes.last() {
            Some(scope) => scope
                .get(name.name.as_str())
                .is_some_and(|variable| !variable.defined),
            None => self.global_initializer.as_deref() == Some(name.name.as_str()),
        };
        if self_referential {
            self.error(
                name.line,
                name.name.as_str(),
                ResolutionErrorKind::SelfReferentialInitializer,
            );
        }
        self.resolve_local(expr, name.name.as_str());
    }

    fn resolve_local(&mut self, expr: ExprId, name: &str) {
        for (depth, scope) in self.scopes.iter_mut().rev().enumerate() {
            if let Some(variable) = scope.get_mut(name) {
                variable.used = true;
                self.resolution.insert(
                    expr,
                    Slot {
                        depth,
                        index: variable.index,
                    },
                );
                return;
            }
        }
        // No local binding: resolved dynamically against globals.
    }
}

// Scope bookkeeping
impl Resolver {
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        let scope = self.scopes.pop().expect("Scope enters and exits pair up.");
        let mut variables: Vec<Variable> = scope.into_values().collect();
        variables.sort_by_key(|variable| variable.index);
        for variable in variables {
            if !variable.used {
                self.error(
                    variable.name.line,
                    variable.name.name.as_str(),
                    ResolutionErrorKind::UnusedVariable,
                );
            }
        }
    }

    fn declare(&mut self, name: &Ident) {
        if self.scopes.is_empty() {
            // Globals are not tracked; they bind by name at runtime.
            return;
        }
        let duplicate = self
            .scopes
            .last()
            .is_some_and(|scope| scope.contains_key(name.name.as_str()));
        if duplicate {
            self.error(
                name.line,
                name.name.as_str(),
                ResolutionErrorKind::DuplicateDeclaration,
            );
            return;
        }
        let scope = self.scopes.last_mut().expect("Checked to be non-empty.");
        let index = scope.len();
        scope.insert(
            name.name.clone(),
            Variable {
                name: name.clone(),
                defined: false,
                used: false,
                index,
            },
        );
    }

    fn define(&mut self, name: &Ident) {
        if let Some(variable) = self
            .scopes
            .last_mut()
            .and_then(|scope| scope.get_mut(name.name.as_str()))
        {
            variable.defined = true;
        }
    }

    /// Synthesised binding, not a user declaration: defined up front and
    /// exempt from the unused-variable rule.
    fn declare_this(&mut self, line: u32) {
        let scope = self
            .scopes
            .last_mut()
            .expect("A scope is entered before `this` is bound.");
        let index = scope.len();
        scope.insert(
            CompactString::const_new("this"),
            Variable {
                name: Ident {
                    name: CompactString::const_new("this"),
                    line,
                },
                defined: true,
                used: true,
                index,
            },
        );
    }

    fn error(&mut self, line: u32, lexeme: &str, kind: ResolutionErrorKind) {
        self.errors.push(ResolutionError {
            kind,
            line,
            location: ErrorLocation::Lexeme(CompactString::from(lexeme)),
        });
    }
}
