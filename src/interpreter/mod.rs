pub mod context;
pub mod environment;
mod native;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use compact_str::CompactString;

use crate::parser::ast::{
    BinaryOperator, ClassDecl, Expr, ExprId, Ident, LiteralValue, LogicalOperator, Stmt, StmtId,
    UnaryOperator,
};
use crate::resolver::{ResolvedAst, Slot};
use crate::value::{
    Class, Function, Instance, LoxValue, RuntimeError, RuntimeErrorKind,
};
use environment::{Environment, Globals};

/// Output sink for the interpreter. The run pipeline also routes
/// diagnostics through it, so a single sink captures a run end to end.
pub trait SystemContext {
    fn writeln(&mut self, text: &str);
}

/// Non-error control transfer threaded up the statement walk. A loop
/// consumes `Break`; the call site of a function consumes `Return`. The
/// resolver guarantees neither escapes past its catch point.
#[derive(Debug)]
enum ProgramState {
    Run,
    Return(LoxValue),
    Break,
}

/// Walks a resolved program. Local reads and writes go straight to their
/// `(depth, slot)` coordinates; everything without a resolution entry is a
/// global, looked up by name. The global frame lives as long as the
/// interpreter, which is what lets a prompt session accumulate state.
pub struct TreeWalkInterpreter {
    globals: Globals,
    repl: bool,
}

impl TreeWalkInterpreter {
    pub fn new(repl: bool) -> Self {
        Self {
            globals: Globals::new(),
            repl,
        }
    }

    pub fn run<C: SystemContext>(
        &self,
        program: &Arc<ResolvedAst>,
        context: &mut C,
    ) -> Result<(), RuntimeError> {
        for &stmt in program.top_level() {
            // At the prompt, a bare expression statement echoes its value.
            if self.repl {
                if let Stmt::Expression { expr } = program.stmt(stmt) {
                    let value = self.evaluate(program, &None, context, *expr)?;
                    context.writeln(&format!("{value}"));
                    continue;
                }
            }
            match self.execute(program, &None, context, stmt)? {
                ProgramState::Run => {}
                ProgramState::Return(_) | ProgramState::Break => {
                    unreachable!("The resolver rejects `return` and `break` at top level.")
                }
            }
        }
        Ok(())
    }
}

// Statements
impl TreeWalkInterpreter {
    fn execute<C: SystemContext>(
        &self,
        program: &Arc<ResolvedAst>,
        environment: &Option<Environment>,
        context: &mut C,
        stmt: StmtId,
    ) -> Result<ProgramState, RuntimeError> {
        match program.stmt(stmt) {
            Stmt::Print { expr } => {
                let value = self.evaluate(program, environment, context, *expr)?;
                context.writeln(&format!("{value}"));
                Ok(ProgramState::Run)
            }
            Stmt::Expression { expr } => {
                self.evaluate(program, environment, context, *expr)?;
                Ok(ProgramState::Run)
            }
            Stmt::VariableDecl(decl) => {
                let value = match decl.initializer {
                    Some(initializer) => self.evaluate(program, environment, context, initializer)?,
                    None => LoxValue::Nil,
                };
                self.define(environment, &decl.name.name, value);
                Ok(ProgramState::Run)
            }
            Stmt::Block { statements } => {
                self.execute_block(program, environment, context, statements)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self
                    .evaluate(program, environment, context, *condition)?
                    .is_truthy()
                {
                    self.execute(program, environment, context, *then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(program, environment, context, *else_branch)
                } else {
                    Ok(ProgramState::Run)
                }
            }
            Stmt::While { condition, body } => {
                while self
                    .evaluate(program, environment, context, *condition)?
                    .is_truthy()
                {
                    match self.execute(program, environment, context, *body)? {
                        ProgramState::Run => {}
                        ProgramState::Break => break,
                        state @ ProgramState::Return(_) => return Ok(state),
                    }
                }
                Ok(ProgramState::Run)
            }
            Stmt::Break { .. } => Ok(ProgramState::Break),
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.evaluate(program, environment, context, *value)?,
                    None => LoxValue::Nil,
                };
                Ok(ProgramState::Return(value))
            }
            Stmt::FunctionDecl(decl) => {
                let function = Function {
                    name: decl.name.clone(),
                    parameters: decl.parameters.clone(),
                    body: decl.body.clone(),
                    program: program.clone(),
                    closure: environment.clone(),
                    is_initializer: false,
                };
                self.define(
                    environment,
                    &decl.name.name,
                    LoxValue::Function(Arc::new(function)),
                );
                Ok(ProgramState::Run)
            }
            Stmt::ClassDecl(decl) => self.execute_class_decl(program, environment, decl),
        }
    }

    fn execute_block<C: SystemContext>(
        &self,
        program: &Arc<ResolvedAst>,
        environment: &Option<Environment>,
        context: &mut C,
        statements: &[StmtId],
    ) -> Result<ProgramState, RuntimeError> {
        // A fresh child frame; the enclosing one is untouched on every exit
        // path, signal and error included.
        let inner = Some(Environment::new(environment.clone()));
        for &stmt in statements {
            match self.execute(program, &inner, context, stmt)? {
                ProgramState::Run => {}
                state => return Ok(state),
            }
        }
        Ok(ProgramState::Run)
    }

    fn execute_class_decl(
        &self,
        program: &Arc<ResolvedAst>,
        environment: &Option<Environment>,
        decl: &ClassDecl,
    ) -> Result<ProgramState, RuntimeError> {
        // Defined in two steps so methods can reach the class through its
        // own binding.
        let slot = self.define(environment, &decl.name.name, LoxValue::Nil);

        let mut methods = HashMap::new();
        for method in &decl.methods {
            let function = Function {
                name: method.name.clone(),
                parameters: method.parameters.clone(),
                body: method.body.clone(),
                program: program.clone(),
                closure: environment.clone(),
                is_initializer: method.name.name == "init",
            };
            methods.insert(method.name.name.clone(), Arc::new(function));
        }

        let class = LoxValue::Class(Arc::new(Class {
            name: decl.name.clone(),
            methods,
        }));
        match (environment, slot) {
            (Some(environment), Some(slot)) => {
                environment
                    .assign_at(0, slot, class)
                    .expect("Just declared the class so the slot exists.");
            }
            _ => self.globals.define(&decl.name.name, class),
        }
        Ok(ProgramState::Run)
    }
}

// Expressions
impl TreeWalkInterpreter {
    fn evaluate<C: SystemContext>(
        &self,
        program: &Arc<ResolvedAst>,
        environment: &Option<Environment>,
        context: &mut C,
        expr: ExprId,
    ) -> Result<LoxValue, RuntimeError> {
        match program.expr(expr) {
            Expr::Literal { value, .. } => Ok(match value {
                LiteralValue::Nil => LoxValue::Nil,
                LiteralValue::Bool(v) => LoxValue::Bool(*v),
                LiteralValue::Number(v) => LoxValue::Number(*v),
                LiteralValue::String(v) => LoxValue::String(v.clone()),
            }),
            Expr::Unary {
                operator,
                line,
                operand,
            } => {
                let operand = self.evaluate(program, environment, context, *operand)?;
                let result = match operator {
                    UnaryOperator::Bang => Ok(LoxValue::Bool(operand.logical_not())),
                    UnaryOperator::Minus => operand.numeric_negate(),
                };
                result.map_err(|kind| RuntimeError { kind, line: *line })
            }
            Expr::Binary {
                operator,
                line,
                left,
                right,
            } => {
                let lhs = self.evaluate(program, environment, context, *left)?;
                let rhs = self.evaluate(program, environment, context, *right)?;
                Self::apply_binary(*operator, &lhs, &rhs)
                    .map_err(|kind| RuntimeError { kind, line: *line })
            }
            Expr::Logical {
                operator,
                left,
                right,
            } => {
                // Short-circuits and yields the deciding operand itself.
                let lhs = self.evaluate(program, environment, context, *left)?;
                match operator {
                    LogicalOperator::And if !lhs.is_truthy() => Ok(lhs),
                    LogicalOperator::Or if lhs.is_truthy() => Ok(lhs),
                    _ => self.evaluate(program, environment, context, *right),
                }
            }
            Expr::Variable { name } => self.read_variable(program, environment, expr, name),
            Expr::Assignment { name, value } => {
                let value = self.evaluate(program, environment, context, *value)?;
                self.assign_variable(program, environment, expr, name, value.clone())?;
                Ok(value)
            }
            Expr::Call {
                callee,
                line,
                arguments,
            } => self.evaluate_call(program, environment, context, *callee, *line, arguments),
            Expr::Get { object, name } => {
                let object = self.evaluate(program, environment, context, *object)?;
                let LoxValue::Instance(instance) = object else {
                    return Err(RuntimeError {
                        kind: RuntimeErrorKind::NonInstanceProperty,
                        line: name.line,
                    });
                };
                // Fields shadow methods.
                let field = instance.fields.lock().unwrap().get(name.name.as_str()).cloned();
                if let Some(value) = field {
                    Ok(value)
                } else if let Some(method) = instance.class.find_method(&name.name) {
                    Ok(LoxValue::Function(Arc::new(method.bind(&instance))))
                } else {
                    Err(RuntimeError {
                        kind: RuntimeErrorKind::UndefinedProperty(name.name.clone()),
                        line: name.line,
                    })
                }
            }
            Expr::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(program, environment, context, *object)?;
                let LoxValue::Instance(instance) = object else {
                    return Err(RuntimeError {
                        kind: RuntimeErrorKind::NonInstanceField,
                        line: name.line,
                    });
                };
                let value = self.evaluate(program, environment, context, *value)?;
                instance
                    .fields
                    .lock()
                    .unwrap()
                    .insert(name.name.clone(), value.clone());
                Ok(value)
            }
            Expr::This { line } => {
                let slot = program
                    .lookup(expr)
                    .expect("`this` always resolves against the bound method frame.");
                self.read_slot(environment, slot).ok_or(RuntimeError {
                    kind: RuntimeErrorKind::UndefinedVariable(CompactString::const_new("this")),
                    line: *line,
                })
            }
        }
    }

    fn apply_binary(
        operator: BinaryOperator,
        lhs: &LoxValue,
        rhs: &LoxValue,
    ) -> Result<LoxValue, RuntimeErrorKind> {
        match operator {
            BinaryOperator::Add => lhs.add(rhs),
            BinaryOperator::Subtract => lhs.subtract(rhs),
            BinaryOperator::Multiply => lhs.multiply(rhs),
            BinaryOperator::Divide => lhs.divide(rhs),
            BinaryOperator::LessThan => lhs.less_than(rhs),
            BinaryOperator::LessThanEqual => lhs.less_than_or_equal(rhs),
            BinaryOperator::GreaterThan => lhs.greater_than(rhs),
            BinaryOperator::GreaterThanEqual => lhs.greater_than_or_equal(rhs),
            BinaryOperator::EqualEqual => Ok(LoxValue::Bool(lhs.is_equal(rhs))),
            BinaryOperator::BangEqual => Ok(LoxValue::Bool(!lhs.is_equal(rhs))),
        }
    }

    fn evaluate_call<C: SystemContext>(
        &self,
        program: &Arc<ResolvedAst>,
        environment: &Option<Environment>,
        context: &mut C,
        callee: ExprId,
        line: u32,
        argument_exprs: &[ExprId],
    ) -> Result<LoxValue, RuntimeError> {
        let callee = self.evaluate(program, environment, context, callee)?;
        let mut arguments = Vec::with_capacity(argument_exprs.len());
        for &argument in argument_exprs {
            arguments.push(self.evaluate(program, environment, context, argument)?);
        }

        match callee {
            LoxValue::NativeFunction(function) => {
                check_arity(function.arity(), arguments.len(), line)?;
                function.call(&arguments).map_err(|kind| RuntimeError { kind, line })
            }
            LoxValue::Function(function) => {
                check_arity(function.arity(), arguments.len(), line)?;
                self.call_function(context, &function, arguments)
            }
            LoxValue::Class(class) => {
                check_arity(class.arity(), arguments.len(), line)?;
                let instance = Arc::new(Instance {
                    class: class.clone(),
                    fields: Mutex::new(HashMap::new()),
                });
                if let Some(init) = class.find_method("init") {
                    let bound = init.bind(&instance);
                    self.call_function(context, &bound, arguments)?;
                }
                Ok(LoxValue::Instance(instance))
            }
            _ => Err(RuntimeError {
                kind: RuntimeErrorKind::NotCallable,
                line,
            }),
        }
    }

    fn call_function<C: SystemContext>(
        &self,
        context: &mut C,
        function: &Function,
        arguments: Vec<LoxValue>,
    ) -> Result<LoxValue, RuntimeError> {
        // One frame serves parameters and body locals alike; the body block
        // contributes no scope of its own, mirroring the resolver.
        let frame = Environment::new(function.closure.clone());
        for (parameter, argument) in function.parameters.iter().zip(arguments) {
            frame.define(&parameter.name, argument);
        }
        let environment = Some(frame);

        let mut result = LoxValue::Nil;
        for &stmt in &function.body {
            match self.execute(&function.program, &environment, context, stmt)? {
                ProgramState::Run => {}
                ProgramState::Return(value) => {
                    result = value;
                    break;
                }
                ProgramState::Break => {
                    unreachable!("The resolver rejects `break` outside loops.")
                }
            }
        }

        if function.is_initializer {
            // An initializer yields its instance whatever the body returned.
            Ok(function
                .closure
                .as_ref()
                .and_then(|closure| closure.get_local("this"))
                .expect("An initializer only runs bound to an instance."))
        } else {
            Ok(result)
        }
    }
}

// Variable access
impl TreeWalkInterpreter {
    fn define(
        &self,
        environment: &Option<Environment>,
        name: &str,
        value: LoxValue,
    ) -> Option<usize> {
        match environment {
            Some(environment) => Some(environment.define(name, value)),
            None => {
                self.globals.define(name, value);
                None
            }
        }
    }

    fn read_slot(&self, environment: &Option<Environment>, slot: Slot) -> Option<LoxValue> {
        environment.as_ref()?.get_at(slot.depth, slot.index)
    }

    fn read_variable(
        &self,
        program: &ResolvedAst,
        environment: &Option<Environment>,
        expr: ExprId,
        name: &Ident,
    ) -> Result<LoxValue, RuntimeError> {
        let value = match program.lookup(expr) {
            Some(slot) => self.read_slot(environment, slot),
            None => self.globals.get(&name.name),
        };
        value.ok_or_else(|| RuntimeError {
            kind: RuntimeErrorKind::UndefinedVariable(name.name.clone()),
            line: name.line,
        })
    }

    fn assign_variable(
        &self,
        program: &ResolvedAst,
        environment: &Option<Environment>,
        expr: ExprId,
        name: &Ident,
        value: LoxValue,
    ) -> Result<(), RuntimeError> {
        let result = match program.lookup(expr) {
            Some(slot) => environment
                .as_ref()
                .ok_or(())
                .and_then(|environment| environment.assign_at(slot.depth, slot.index, value)),
            None => self.globals.assign(&name.name, value),
        };
        result.map_err(|_| RuntimeError {
            kind: RuntimeErrorKind::UndefinedVariable(name.name.clone()),
            line: name.line,
        })
    }
}

fn check_arity(expected: usize, actual: usize, line: u32) -> Result<(), RuntimeError> {
    if expected != actual {
        return Err(RuntimeError {
            kind: RuntimeErrorKind::ArityMismatch { expected, actual },
            line,
        });
    }
    Ok(())
}
