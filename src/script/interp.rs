use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use super::ast::{
    BinaryOp, DeclKind, Expr, ForInit, FunctionBody, FunctionDef, LogicalOp, Stmt,
    TemplateSegment, UnaryOp,
};
use super::builtins;
use super::fault::{ErrorKind, Fault};
use super::parser::parse;
use super::value::{Callable, Value};

pub type Env = Rc<RefCell<Scope>>;

/// Script-level call depth at which `Maximum call stack size exceeded` is raised.
const MAX_CALL_DEPTH: usize = 10_000;

/// Host stack a chain of script calls may use unless raised with
/// [`Interpreter::with_stack_budget`]. Fits a default-sized thread.
const DEFAULT_STACK_BUDGET: usize = 1024 * 1024;

/// How many ticks pass between clock reads when a timeout is set.
const TICKS_PER_CLOCK_CHECK: u32 = 256;

struct Binding {
    value: Value,
    mutable: bool,
    var: bool,
}

#[derive(Default)]
pub struct Scope {
    vars: HashMap<String, Binding>,
    parent: Option<Env>,
}

impl Scope {
    fn child(parent: &Env) -> Env {
        Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: Some(Rc::clone(parent)),
        }))
    }
}

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Target of an assignment or update expression.
enum Place {
    Var(String),
    Prop(Value, String),
}

/// Tree-walking evaluator. Each instance owns a fresh global scope, so code
/// run in one interpreter cannot observe bindings made in another.
pub struct Interpreter {
    globals: Env,
    deadline: Option<(Instant, Duration)>,
    ticks: u32,
    call_depth: usize,
    /// Host stack position of the outermost script call.
    stack_base: usize,
    stack_budget: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Interpreter with only the pure intrinsics (`Math`, `JSON`, ...) defined.
    pub fn new() -> Self {
        let mut interp = Self {
            globals: Rc::new(RefCell::new(Scope::default())),
            deadline: None,
            ticks: 0,
            call_depth: 0,
            stack_base: 0,
            stack_budget: DEFAULT_STACK_BUDGET,
        };
        builtins::install(&mut interp);
        interp
    }

    /// Abort evaluation with a timeout fault once `limit` has elapsed.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.deadline = Some((Instant::now() + limit, limit));
        self
    }

    /// Allow script calls to use up to `bytes` of host stack. The calling
    /// thread must have at least that much left.
    pub fn with_stack_budget(mut self, bytes: usize) -> Self {
        self.stack_budget = bytes;
        self
    }

    pub fn define_global(&mut self, name: &str, value: Value) {
        self.globals.borrow_mut().vars.insert(
            name.to_string(),
            Binding {
                value,
                mutable: false,
                var: false,
            },
        );
    }

    /// Run a script body. A top-level `return` ends it early.
    pub fn run(&mut self, source: &str) -> Result<(), Fault> {
        let body = parse(source)?;
        let env = Scope::child(&self.globals);
        match self.exec_block_in(&body, &env)? {
            Flow::Normal | Flow::Return(_) => Ok(()),
            Flow::Break => Err(Fault::syntax_error("Illegal break statement")),
            Flow::Continue => Err(Fault::syntax_error("Illegal continue statement")),
        }
    }

    /// Run a script and return the value of its last expression statement.
    pub fn eval(&mut self, source: &str) -> Result<Value, Fault> {
        let body = parse(source)?;
        let env = Scope::child(&self.globals);
        self.hoist(&body, &env)?;
        let mut last = Value::Undefined;
        for stmt in &body {
            if let Stmt::Expr(expr) = stmt {
                last = self.eval_expr(expr, &env)?;
                continue;
            }
            match self.exec_stmt(stmt, &env)? {
                Flow::Normal => {}
                Flow::Return(value) => return Ok(value),
                Flow::Break | Flow::Continue => {
                    return Err(Fault::syntax_error("Illegal break statement"));
                }
            }
        }
        Ok(last)
    }

    /// Invoke a callable with the given arguments.
    pub fn call(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, Fault> {
        self.call_described(callee, args, || "value".to_string())
    }

    fn call_described(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        describe: impl FnOnce() -> String,
    ) -> Result<Value, Fault> {
        let Value::Function(callable) = callee else {
            return Err(Fault::type_error(format!("{} is not a function", describe())));
        };
        self.tick()?;
        if self.call_depth == 0 {
            self.stack_base = stack_position();
        }
        if self.call_depth >= MAX_CALL_DEPTH
            || stack_position().abs_diff(self.stack_base) > self.stack_budget
        {
            return Err(Fault::range_error("Maximum call stack size exceeded"));
        }
        self.call_depth += 1;
        let result = match callable.as_ref() {
            Callable::Native { func, .. } => func(self, args),
            Callable::Closure { def, env } => self.call_closure(def, env, args),
        };
        self.call_depth -= 1;
        result
    }

    fn call_closure(
        &mut self,
        def: &Rc<FunctionDef>,
        env: &Env,
        args: Vec<Value>,
    ) -> Result<Value, Fault> {
        let scope = Scope::child(env);
        {
            let mut s = scope.borrow_mut();
            let mut args = args.into_iter();
            for param in &def.params {
                s.vars.insert(
                    param.clone(),
                    Binding {
                        value: args.next().unwrap_or(Value::Undefined),
                        mutable: true,
                        var: true,
                    },
                );
            }
        }
        match &def.body {
            FunctionBody::Expr(expr) => self.eval_expr(expr, &scope),
            FunctionBody::Block(body) => match self.exec_block_in(body, &scope)? {
                Flow::Return(value) => Ok(value),
                Flow::Normal => Ok(Value::Undefined),
                Flow::Break => Err(Fault::syntax_error("Illegal break statement")),
                Flow::Continue => Err(Fault::syntax_error("Illegal continue statement")),
            },
        }
    }

    fn tick(&mut self) -> Result<(), Fault> {
        let Some((deadline, limit)) = self.deadline else {
            return Ok(());
        };
        self.ticks = self.ticks.wrapping_add(1);
        if self.ticks % TICKS_PER_CLOCK_CHECK == 0 && Instant::now() >= deadline {
            return Err(Fault::new(
                ErrorKind::TimeoutError,
                format!("test exceeded timeout of {}ms", limit.as_millis()),
            ));
        }
        Ok(())
    }

    // --- scopes ---

    fn declare(&self, env: &Env, name: &str, value: Value, kind: DeclKind) -> Result<(), Fault> {
        let mut scope = env.borrow_mut();
        if let Some(existing) = scope.vars.get(name)
            && !(existing.var && kind == DeclKind::Var)
        {
            return Err(Fault::syntax_error(format!(
                "Identifier '{}' has already been declared",
                name
            )));
        }
        scope.vars.insert(
            name.to_string(),
            Binding {
                value,
                mutable: kind != DeclKind::Const,
                var: kind == DeclKind::Var,
            },
        );
        Ok(())
    }

    fn lookup(&self, env: &Env, name: &str) -> Option<Value> {
        let mut current = Some(Rc::clone(env));
        while let Some(scope) = current {
            let scope = scope.borrow();
            if let Some(binding) = scope.vars.get(name) {
                return Some(binding.value.clone());
            }
            current = scope.parent.clone();
        }
        None
    }

    fn assign_var(&self, env: &Env, name: &str, value: Value) -> Result<(), Fault> {
        let mut current = Some(Rc::clone(env));
        while let Some(scope) = current {
            let mut scope = scope.borrow_mut();
            if let Some(binding) = scope.vars.get_mut(name) {
                if !binding.mutable {
                    return Err(Fault::type_error("Assignment to constant variable."));
                }
                binding.value = value;
                return Ok(());
            }
            current = scope.parent.clone();
        }
        Err(Fault::reference_error(format!("{} is not defined", name)))
    }

    /// Function declarations are visible throughout their enclosing block.
    fn hoist(&self, body: &[Stmt], env: &Env) -> Result<(), Fault> {
        for stmt in body {
            if let Stmt::Function(def) = stmt {
                let closure = Value::Function(Rc::new(Callable::Closure {
                    def: Rc::clone(def),
                    env: Rc::clone(env),
                }));
                let name = def.name.as_deref().unwrap_or_default();
                self.declare(env, name, closure, DeclKind::Var)?;
            }
        }
        Ok(())
    }

    // --- statements ---

    fn exec_block_in(&mut self, body: &[Stmt], env: &Env) -> Result<Flow, Fault> {
        self.hoist(body, env)?;
        for stmt in body {
            match self.exec_stmt(stmt, env)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_block(&mut self, body: &[Stmt], env: &Env) -> Result<Flow, Fault> {
        let scope = Scope::child(env);
        self.exec_block_in(body, &scope)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &Env) -> Result<Flow, Fault> {
        match stmt {
            Stmt::Empty | Stmt::Function(_) => Ok(Flow::Normal),
            Stmt::Expr(expr) => {
                self.eval_expr(expr, env)?;
                Ok(Flow::Normal)
            }
            Stmt::Decl(kind, decls) => {
                self.exec_decl(*kind, decls, env)?;
                Ok(Flow::Normal)
            }
            Stmt::Block(body) => self.exec_block(body, env),
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval_expr(test, env)?.is_truthy() {
                    self.exec_stmt(consequent, env)
                } else if let Some(alternate) = alternate {
                    self.exec_stmt(alternate, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { test, body } => {
                while self.eval_expr(test, env)?.is_truthy() {
                    self.tick()?;
                    match self.exec_stmt(body, env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let scope = Scope::child(env);
                match init {
                    Some(ForInit::Decl(kind, decls)) => self.exec_decl(*kind, decls, &scope)?,
                    Some(ForInit::Expr(expr)) => {
                        self.eval_expr(expr, &scope)?;
                    }
                    None => {}
                }
                loop {
                    if let Some(test) = test
                        && !self.eval_expr(test, &scope)?.is_truthy()
                    {
                        break;
                    }
                    self.tick()?;
                    match self.exec_stmt(body, &scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval_expr(update, &scope)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::ForOf {
                kind,
                binding,
                iterable,
                body,
            } => {
                let items = match self.eval_expr(iterable, env)? {
                    Value::Array(items) => items.borrow().clone(),
                    Value::Str(s) => s.chars().map(|c| Value::string(c.to_string())).collect(),
                    other => {
                        return Err(Fault::type_error(format!(
                            "{} is not iterable",
                            other.inspect()
                        )));
                    }
                };
                for item in items {
                    self.tick()?;
                    let scope = Scope::child(env);
                    self.declare(&scope, binding, item, *kind)?;
                    match self.exec_stmt(body, &scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Throw(expr) => Err(Fault::Thrown(self.eval_expr(expr, env)?)),
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
            } => self.exec_try(block, param.as_deref(), handler.as_deref(), finalizer.as_deref(), env),
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
        }
    }

    fn exec_decl(
        &mut self,
        kind: DeclKind,
        decls: &[(String, Option<Expr>)],
        env: &Env,
    ) -> Result<(), Fault> {
        for (name, init) in decls {
            let value = match init {
                Some(expr) => self.eval_expr(expr, env)?,
                None => Value::Undefined,
            };
            self.declare(env, name, value, kind)?;
        }
        Ok(())
    }

    fn exec_try(
        &mut self,
        block: &[Stmt],
        param: Option<&str>,
        handler: Option<&[Stmt]>,
        finalizer: Option<&[Stmt]>,
        env: &Env,
    ) -> Result<Flow, Fault> {
        let mut result = self.exec_block(block, env);

        if let (Err(fault), Some(handler)) = (&result, handler)
            && !is_uncatchable(fault)
        {
            let caught = fault.clone().into_value();
            let scope = Scope::child(env);
            if let Some(param) = param {
                self.declare(&scope, param, caught, DeclKind::Let)?;
            }
            result = self.exec_block_in(handler, &scope);
        }

        if let Some(finalizer) = finalizer {
            if result.as_ref().is_err_and(is_uncatchable) {
                return result;
            }
            match self.exec_block(finalizer, env)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        result
    }

    // --- expressions ---

    fn eval_expr(&mut self, expr: &Expr, env: &Env) -> Result<Value, Fault> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::string(s)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Template(segments) => {
                let mut out = String::new();
                for segment in segments {
                    match segment {
                        TemplateSegment::Text(text) => out.push_str(text),
                        TemplateSegment::Expr(expr) => {
                            out.push_str(&self.eval_expr(expr, env)?.to_js_string())
                        }
                    }
                }
                Ok(Value::string(out))
            }
            Expr::Ident(name) => self
                .lookup(env, name)
                .ok_or_else(|| Fault::reference_error(format!("{} is not defined", name))),
            Expr::Array(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval_expr(item, env))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::array(values))
            }
            Expr::Object(props) => {
                let mut map = std::collections::BTreeMap::new();
                for (key, value) in props {
                    map.insert(key.clone(), self.eval_expr(value, env)?);
                }
                Ok(Value::object(map))
            }
            Expr::Function(def) => Ok(Value::Function(Rc::new(Callable::Closure {
                def: Rc::clone(def),
                env: Rc::clone(env),
            }))),
            Expr::Member { object, property } => {
                let target = self.eval_expr(object, env)?;
                get_property(&target, property)
            }
            Expr::Index { object, index } => {
                let target = self.eval_expr(object, env)?;
                let key = self.eval_expr(index, env)?;
                get_property(&target, &key.to_js_string())
            }
            Expr::Call { callee, args } => self.eval_call(callee, args, env),
            Expr::New { callee, args } => {
                let ctor = self.eval_expr(callee, env)?;
                let args = self.eval_args(args, env)?;
                match &ctor {
                    Value::Function(f) if matches!(f.as_ref(), Callable::Native { constructor: true, .. }) => {
                        self.call(&ctor, args)
                    }
                    _ => Err(Fault::type_error(format!(
                        "{} is not a constructor",
                        callee.describe()
                    ))),
                }
            }
            Expr::Unary { op, operand } => {
                if *op == UnaryOp::TypeOf
                    && let Expr::Ident(name) = operand.as_ref()
                {
                    let ty = self.lookup(env, name).map_or("undefined", |v| v.type_of());
                    return Ok(Value::string(ty));
                }
                let value = self.eval_expr(operand, env)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::TypeOf => Value::string(value.type_of()),
                })
            }
            Expr::Update {
                increment,
                prefix,
                target,
            } => {
                let place = self.resolve_place(target, env)?;
                let old = self.read_place(&place, env)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.write_place(&place, Value::Number(new), env)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval_expr(left, env)?;
                let r = self.eval_expr(right, env)?;
                Ok(binary(*op, &l, &r))
            }
            Expr::Logical { op, left, right } => {
                let l = self.eval_expr(left, env)?;
                let short_circuit = match op {
                    LogicalOp::And => !l.is_truthy(),
                    LogicalOp::Or => l.is_truthy(),
                    LogicalOp::Nullish => !l.is_nullish(),
                };
                if short_circuit {
                    Ok(l)
                } else {
                    self.eval_expr(right, env)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval_expr(test, env)?.is_truthy() {
                    self.eval_expr(consequent, env)
                } else {
                    self.eval_expr(alternate, env)
                }
            }
            Expr::Assign { op, target, value } => {
                let place = self.resolve_place(target, env)?;
                let new = match op {
                    None => self.eval_expr(value, env)?,
                    Some(op) => {
                        let old = self.read_place(&place, env)?;
                        let rhs = self.eval_expr(value, env)?;
                        binary(*op, &old, &rhs)
                    }
                };
                self.write_place(&place, new.clone(), env)?;
                Ok(new)
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr], env: &Env) -> Result<Vec<Value>, Fault> {
        args.iter().map(|arg| self.eval_expr(arg, env)).collect()
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], env: &Env) -> Result<Value, Fault> {
        let (receiver, name) = match callee {
            Expr::Member { object, property } => (self.eval_expr(object, env)?, property.clone()),
            Expr::Index { object, index } => {
                let receiver = self.eval_expr(object, env)?;
                let key = self.eval_expr(index, env)?.to_js_string();
                (receiver, key)
            }
            _ => {
                let function = self.eval_expr(callee, env)?;
                let args = self.eval_args(args, env)?;
                return self.call_described(&function, args, || callee.describe());
            }
        };
        let args = self.eval_args(args, env)?;
        self.call_method(&receiver, &name, args, || callee.describe())
    }

    /// `receiver.name(args)`: built-in methods of arrays, strings and numbers,
    /// otherwise a function-valued property.
    fn call_method(
        &mut self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
        describe: impl FnOnce() -> String,
    ) -> Result<Value, Fault> {
        let builtin = match receiver {
            Value::Array(items) => builtins::array_method(self, items, name, &args)?,
            Value::Str(s) => builtins::string_method(s, name, &args)?,
            Value::Number(n) => builtins::number_method(*n, name, &args)?,
            _ => None,
        };
        if let Some(value) = builtin {
            return Ok(value);
        }
        let function = get_property(receiver, name)?;
        self.call_described(&function, args, describe)
    }

    fn resolve_place(&mut self, target: &Expr, env: &Env) -> Result<Place, Fault> {
        match target {
            Expr::Ident(name) => Ok(Place::Var(name.clone())),
            Expr::Member { object, property } => {
                Ok(Place::Prop(self.eval_expr(object, env)?, property.clone()))
            }
            Expr::Index { object, index } => {
                let object = self.eval_expr(object, env)?;
                let key = self.eval_expr(index, env)?.to_js_string();
                Ok(Place::Prop(object, key))
            }
            _ => Err(Fault::syntax_error("Invalid left-hand side in assignment")),
        }
    }

    fn read_place(&self, place: &Place, env: &Env) -> Result<Value, Fault> {
        match place {
            Place::Var(name) => self
                .lookup(env, name)
                .ok_or_else(|| Fault::reference_error(format!("{} is not defined", name))),
            Place::Prop(object, key) => get_property(object, key),
        }
    }

    fn write_place(&self, place: &Place, value: Value, env: &Env) -> Result<(), Fault> {
        match place {
            Place::Var(name) => self.assign_var(env, name, value),
            Place::Prop(object, key) => set_property(object, key, value),
        }
    }
}

fn is_uncatchable(fault: &Fault) -> bool {
    matches!(
        fault,
        Fault::Raised {
            kind: ErrorKind::TimeoutError,
            ..
        }
    )
}

fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse().ok()
}

/// Property read, including `length` and indexing on arrays and strings.
pub fn get_property(target: &Value, key: &str) -> Result<Value, Fault> {
    match target {
        Value::Undefined | Value::Null => Err(Fault::type_error(format!(
            "Cannot read properties of {} (reading '{}')",
            target.to_js_string(),
            key
        ))),
        Value::Array(items) => {
            let items = items.borrow();
            if key == "length" {
                return Ok(Value::Number(items.len() as f64));
            }
            Ok(array_index(key)
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Undefined))
        }
        Value::Str(s) => {
            if key == "length" {
                return Ok(Value::Number(s.encode_utf16().count() as f64));
            }
            Ok(array_index(key)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::string(c.to_string()))
                .unwrap_or(Value::Undefined))
        }
        Value::Object(props) => Ok(props.borrow().get(key).cloned().unwrap_or(Value::Undefined)),
        Value::Function(f) if key == "name" => Ok(Value::string(f.name())),
        _ => Ok(Value::Undefined),
    }
}

/// Largest gap a single index assignment may open in an array.
const MAX_ARRAY_GROWTH: usize = 1 << 20;

pub fn set_property(target: &Value, key: &str, value: Value) -> Result<(), Fault> {
    match target {
        Value::Undefined | Value::Null => Err(Fault::type_error(format!(
            "Cannot set properties of {} (setting '{}')",
            target.to_js_string(),
            key
        ))),
        Value::Array(items) => {
            let mut items = items.borrow_mut();
            if key == "length" {
                let len = value.to_number();
                if len < 0.0 || len.fract() != 0.0 || len as usize > items.len() + MAX_ARRAY_GROWTH {
                    return Err(Fault::range_error("Invalid array length"));
                }
                items.resize(len as usize, Value::Undefined);
                return Ok(());
            }
            match array_index(key) {
                Some(i) if i < items.len() => items[i] = value,
                Some(i) if i <= items.len() + MAX_ARRAY_GROWTH => {
                    items.resize(i, Value::Undefined);
                    items.push(value);
                }
                Some(_) => return Err(Fault::range_error("Invalid array length")),
                // Non-index properties on arrays are not modelled.
                None => {}
            }
            Ok(())
        }
        Value::Object(props) => {
            props.borrow_mut().insert(key.to_string(), value);
            Ok(())
        }
        // Writes to primitives are silently dropped.
        _ => Ok(()),
    }
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            let l = to_primitive(l);
            let r = to_primitive(r);
            if matches!(l, Value::Str(_)) || matches!(r, Value::Str(_)) {
                Value::string(format!("{}{}", l.to_js_string(), r.to_js_string()))
            } else {
                Value::Number(l.to_number() + r.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(l.to_number() - r.to_number()),
        BinaryOp::Mul => Value::Number(l.to_number() * r.to_number()),
        BinaryOp::Div => Value::Number(l.to_number() / r.to_number()),
        BinaryOp::Rem => Value::Number(l.to_number() % r.to_number()),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (to_primitive(l), to_primitive(r)) {
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(&b)),
                (a, b) => a.to_number().partial_cmp(&b.to_number()),
            };
            Value::Bool(ordering.is_some_and(|o| match op {
                BinaryOp::Lt => o.is_lt(),
                BinaryOp::Le => o.is_le(),
                BinaryOp::Gt => o.is_gt(),
                _ => o.is_ge(),
            }))
        }
        BinaryOp::StrictEq => Value::Bool(l.strict_equals(r)),
        BinaryOp::StrictNe => Value::Bool(!l.strict_equals(r)),
        BinaryOp::LooseEq => Value::Bool(l.loose_equals(r)),
        BinaryOp::LooseNe => Value::Bool(!l.loose_equals(r)),
    }
}

fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) | Value::Function(_) => {
            Value::string(value.to_js_string())
        }
        other => other.clone(),
    }
}

/// Address of a local in the current frame.
#[inline(never)]
fn stack_position() -> usize {
    let marker = 0u8;
    std::hint::black_box(&marker) as *const u8 as usize
}
