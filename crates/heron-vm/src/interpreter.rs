//! Tree-walking evaluator
//!
//! Scopes form a parent chain of `Arc<Scope>`. Script closures capture the
//! scope they were created in, so a binding lives as long as any closure that
//! can still see it. Top-level `var` and function declarations land on the
//! global object; top-level `let`/`const` live in the persistent script scope
//! owned by the [`Vm`].

use crate::ast::*;
use crate::error::{VmError, VmResult};
use crate::function::{Closure, Function, arg};
use crate::object::ObjectRef;
use crate::value::{Value, format_number};
use crate::vm::Vm;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScopeKind {
    Script,
    Function,
    Block,
}

struct Binding {
    value: Value,
    mutable: bool,
}

/// A lexical scope
pub struct Scope {
    kind: ScopeKind,
    vars: Mutex<HashMap<String, Binding>>,
    parent: Option<Arc<Scope>>,
}

impl Scope {
    pub(crate) fn script() -> Arc<Self> {
        Arc::new(Self {
            kind: ScopeKind::Script,
            vars: Mutex::new(HashMap::new()),
            parent: None,
        })
    }

    pub(crate) fn child(parent: &Arc<Scope>, kind: ScopeKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            vars: Mutex::new(HashMap::new()),
            parent: Some(parent.clone()),
        })
    }

    pub(crate) fn declare(&self, name: &str, value: Value, mutable: bool) {
        self.vars
            .lock()
            .insert(name.to_string(), Binding { value, mutable });
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = self;
        loop {
            if let Some(binding) = scope.vars.lock().get(name) {
                return Some(binding.value.clone());
            }
            scope = scope.parent.as_deref()?;
        }
    }

    /// Assign to an existing binding. `Ok(false)` when no scope declares `name`.
    fn assign(&self, name: &str, value: Value) -> VmResult<bool> {
        let mut scope = self;
        loop {
            if let Some(binding) = scope.vars.lock().get_mut(name) {
                if !binding.mutable {
                    return Err(VmError::type_error("Assignment to constant variable."));
                }
                binding.value = value;
                return Ok(true);
            }
            match scope.parent.as_deref() {
                Some(parent) => scope = parent,
                None => return Ok(false),
            }
        }
    }

    /// Nearest function or script scope
    fn var_scope(&self) -> &Scope {
        let mut scope = self;
        while scope.kind == ScopeKind::Block {
            match scope.parent.as_deref() {
                Some(parent) => scope = parent,
                None => break,
            }
        }
        scope
    }

    /// Drop every binding, returning the removed values
    pub(crate) fn clear(&self) -> Vec<Value> {
        self.vars.lock().drain().map(|(_, b)| b.value).collect()
    }
}

pub(crate) enum Completion {
    Normal(Option<Value>),
    Return(Value),
}

/// Run a program and return its completion value
pub(crate) fn run_program(vm: &Vm, program: &Program, scope: &Arc<Scope>) -> VmResult<Value> {
    match exec_body(vm, &program.body, scope)? {
        Completion::Normal(value) => Ok(value.unwrap_or_default()),
        Completion::Return(value) => Ok(value),
    }
}

/// Invoke a script closure
pub(crate) fn call_closure(
    vm: &Vm,
    closure: &Arc<Closure>,
    this: &Value,
    args: &[Value],
) -> VmResult<Value> {
    let def = &closure.def;
    let scope = Scope::child(&closure.scope, ScopeKind::Function);
    if !def.arrow {
        scope.declare("this", this.clone(), false);
    }
    for (index, param) in def.params.iter().enumerate() {
        scope.declare(param, arg(args, index), true);
    }
    if let Some(rest) = &def.rest {
        let extra = args.get(def.params.len()..).unwrap_or_default().to_vec();
        scope.declare(rest, Value::array(extra), true);
    }
    match &def.body {
        FunctionBody::Expr(expr) => eval_expr(vm, expr, &scope),
        FunctionBody::Block(body) => match exec_body(vm, body, &scope)? {
            Completion::Return(value) => Ok(value),
            Completion::Normal(_) => Ok(Value::Undefined),
        },
    }
}

fn make_closure(def: &Arc<FunctionDef>, scope: &Arc<Scope>) -> Value {
    Value::Object(ObjectRef::function(Function::Script(Arc::new(Closure {
        def: def.clone(),
        scope: scope.clone(),
    }))))
}

fn declare_var(vm: &Vm, scope: &Scope, name: &str, value: Option<Value>) {
    let target = scope.var_scope();
    if target.kind == ScopeKind::Script {
        let global = vm.global();
        match value {
            Some(value) => {
                global.set_own(name, value);
            }
            None if !global.has_own(name) => {
                global.set_own(name, Value::Undefined);
            }
            None => {}
        }
        return;
    }
    match value {
        Some(value) => target.declare(name, value, true),
        None if target.lookup(name).is_none() => target.declare(name, Value::Undefined, true),
        None => {}
    }
}

fn exec_body(vm: &Vm, body: &[Stmt], scope: &Arc<Scope>) -> VmResult<Completion> {
    for stmt in body {
        if let Stmt::Function(def) = stmt {
            let name = def.name.as_deref().unwrap_or_default();
            declare_var(vm, scope, name, Some(make_closure(def, scope)));
        }
    }
    let mut last = None;
    for stmt in body {
        match exec_stmt(vm, stmt, scope)? {
            Completion::Normal(Some(value)) => last = Some(value),
            Completion::Normal(None) => {}
            ret @ Completion::Return(_) => return Ok(ret),
        }
    }
    Ok(Completion::Normal(last))
}

fn exec_stmt(vm: &Vm, stmt: &Stmt, scope: &Arc<Scope>) -> VmResult<Completion> {
    match stmt {
        Stmt::Expr(expr) => Ok(Completion::Normal(Some(eval_expr(vm, expr, scope)?))),
        Stmt::Declare { kind, declarations } => {
            for (name, init) in declarations {
                let value = match init {
                    Some(expr) => Some(eval_expr(vm, expr, scope)?),
                    None => None,
                };
                match kind {
                    DeclKind::Var => declare_var(vm, scope, name, value),
                    DeclKind::Let => scope.declare(name, value.unwrap_or_default(), true),
                    DeclKind::Const => scope.declare(name, value.unwrap_or_default(), false),
                }
            }
            Ok(Completion::Normal(None))
        }
        Stmt::Function(_) | Stmt::Empty => Ok(Completion::Normal(None)),
        Stmt::Return(expr) => {
            let value = match expr {
                Some(expr) => eval_expr(vm, expr, scope)?,
                None => Value::Undefined,
            };
            Ok(Completion::Return(value))
        }
        Stmt::Throw(expr) => {
            let value = eval_expr(vm, expr, scope)?;
            let message = vm
                .to_js_string(&value)
                .unwrap_or_else(|_| "exception".to_string());
            Err(VmError::exception(value, message))
        }
        Stmt::If {
            test,
            consequent,
            alternate,
        } => {
            if eval_expr(vm, test, scope)?.truthy() {
                exec_stmt(vm, consequent, scope)
            } else if let Some(alternate) = alternate {
                exec_stmt(vm, alternate, scope)
            } else {
                Ok(Completion::Normal(None))
            }
        }
        Stmt::Block(body) => {
            let block = Scope::child(scope, ScopeKind::Block);
            exec_body(vm, body, &block)
        }
    }
}

fn lookup_ident(vm: &Vm, scope: &Scope, name: &str) -> VmResult<Value> {
    if let Some(value) = scope.lookup(name) {
        return Ok(value);
    }
    vm.global()
        .get_own(name)
        .ok_or_else(|| VmError::reference_error(format!("{} is not defined", name)))
}

/// Convert a value to a property key
pub(crate) fn property_key(vm: &Vm, key: &Value) -> VmResult<String> {
    match key {
        Value::String(s) => Ok(s.to_string()),
        Value::Number(n) => Ok(format_number(*n)),
        other => vm.to_js_string(other),
    }
}

fn member_key(vm: &Vm, key: &MemberKey, scope: &Arc<Scope>) -> VmResult<String> {
    match key {
        MemberKey::Named(name) => Ok(name.clone()),
        MemberKey::Computed(expr) => {
            let value = eval_expr(vm, expr, scope)?;
            property_key(vm, &value)
        }
    }
}

fn eval_elements(vm: &Vm, elements: &[Element], scope: &Arc<Scope>) -> VmResult<Vec<Value>> {
    let mut values = Vec::with_capacity(elements.len());
    for element in elements {
        let value = eval_expr(vm, &element.expr, scope)?;
        if element.spread {
            values.extend(spread(vm, &value, &element.expr)?);
        } else {
            values.push(value);
        }
    }
    Ok(values)
}

fn spread(vm: &Vm, value: &Value, expr: &Expr) -> VmResult<Vec<Value>> {
    match value {
        Value::String(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
        Value::Object(obj) => {
            if let Some(items) = obj.array_elements() {
                return Ok(items);
            }
            // Array-likes such as projected host lists expose `length` and indices
            let len = vm.get_property(value, "length")?;
            match len {
                Value::Number(n) if n >= 0.0 => (0..n as usize)
                    .map(|i| vm.get_property(value, &i.to_string()))
                    .collect(),
                _ => Err(VmError::type_error(format!(
                    "{} is not iterable",
                    expr.describe()
                ))),
            }
        }
        _ => Err(VmError::type_error(format!(
            "{} is not iterable",
            expr.describe()
        ))),
    }
}

pub(crate) fn eval_expr(vm: &Vm, expr: &Expr, scope: &Arc<Scope>) -> VmResult<Value> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::String(s) => Ok(Value::String(s.clone())),
        Expr::Bool(b) => Ok(Value::Boolean(*b)),
        Expr::Null => Ok(Value::Null),
        Expr::Undefined => Ok(Value::Undefined),
        Expr::This => Ok(scope.lookup("this").unwrap_or_default()),
        Expr::Ident(name) => lookup_ident(vm, scope, name),
        Expr::Array(elements) => Ok(Value::array(eval_elements(vm, elements, scope)?)),
        Expr::Object(properties) => {
            let obj = ObjectRef::ordinary();
            for (key, value) in properties {
                let value = eval_expr(vm, value, scope)?;
                obj.set_own(key, value);
            }
            Ok(Value::Object(obj))
        }
        Expr::Function(def) => Ok(make_closure(def, scope)),
        Expr::Member { object, key } => {
            let target = eval_expr(vm, object, scope)?;
            let key = member_key(vm, key, scope)?;
            vm.get_property(&target, &key)
        }
        Expr::Call { callee, args } => {
            let (func, this) = match callee.as_ref() {
                Expr::Member { object, key } => {
                    let target = eval_expr(vm, object, scope)?;
                    let key = member_key(vm, key, scope)?;
                    (vm.get_property(&target, &key)?, target)
                }
                other => (eval_expr(vm, other, scope)?, Value::Undefined),
            };
            let args = eval_elements(vm, args, scope)?;
            if !func.is_callable() {
                return Err(VmError::type_error(format!(
                    "{} is not a function",
                    callee.describe()
                )));
            }
            vm.call(&func, &this, &args)
        }
        Expr::New { callee, args } => {
            let func = eval_expr(vm, callee, scope)?;
            let args = eval_elements(vm, args, scope)?;
            if !func.is_object() {
                return Err(VmError::type_error(format!(
                    "{} is not a constructor",
                    callee.describe()
                )));
            }
            vm.construct(&func, &args)
        }
        Expr::Assign { op, target, value } => eval_assign(vm, *op, target, value, scope),
        Expr::Unary { op, expr } => eval_unary(vm, *op, expr, scope),
        Expr::Binary { op, left, right } => {
            let left = eval_expr(vm, left, scope)?;
            let right = eval_expr(vm, right, scope)?;
            binary(vm, *op, &left, &right)
        }
        Expr::Logical { op, left, right } => {
            let left = eval_expr(vm, left, scope)?;
            let short_circuit = match op {
                LogicalOp::And => !left.truthy(),
                LogicalOp::Or => left.truthy(),
                LogicalOp::Coalesce => !left.is_nullish(),
            };
            if short_circuit {
                Ok(left)
            } else {
                eval_expr(vm, right, scope)
            }
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if eval_expr(vm, test, scope)?.truthy() {
                eval_expr(vm, consequent, scope)
            } else {
                eval_expr(vm, alternate, scope)
            }
        }
    }
}

fn eval_assign(
    vm: &Vm,
    op: AssignOp,
    target: &Expr,
    value: &Expr,
    scope: &Arc<Scope>,
) -> VmResult<Value> {
    match target {
        Expr::Ident(name) => {
            let rhs = eval_expr(vm, value, scope)?;
            let new_value = match op {
                AssignOp::Assign => rhs,
                AssignOp::Add => add(vm, &lookup_ident(vm, scope, name)?, &rhs)?,
                AssignOp::Sub => {
                    Value::Number(lookup_ident(vm, scope, name)?.to_number() - rhs.to_number())
                }
            };
            if !scope.assign(name, new_value.clone())?
                && !vm.global().set_own(name, new_value.clone())
            {
                return Err(VmError::type_error(format!(
                    "Cannot assign to read only property '{}' of object",
                    name
                )));
            }
            Ok(new_value)
        }
        Expr::Member { object, key } => {
            let target = eval_expr(vm, object, scope)?;
            let key = member_key(vm, key, scope)?;
            let rhs = eval_expr(vm, value, scope)?;
            let new_value = match op {
                AssignOp::Assign => rhs,
                AssignOp::Add => add(vm, &vm.get_property(&target, &key)?, &rhs)?,
                AssignOp::Sub => Value::Number(
                    vm.get_property(&target, &key)?.to_number() - rhs.to_number(),
                ),
            };
            vm.set_property(&target, &key, new_value.clone())?;
            Ok(new_value)
        }
        _ => Err(VmError::syntax_error(
            "Invalid left-hand side in assignment",
            0,
            0,
        )),
    }
}

fn eval_unary(vm: &Vm, op: UnaryOp, expr: &Expr, scope: &Arc<Scope>) -> VmResult<Value> {
    match op {
        UnaryOp::TypeOf => {
            if let Expr::Ident(name) = expr {
                if scope.lookup(name).is_none() && !vm.global().has_own(name) {
                    return Ok(Value::from("undefined"));
                }
            }
            Ok(Value::from(eval_expr(vm, expr, scope)?.type_of()))
        }
        UnaryOp::Delete => match expr {
            Expr::Member { object, key } => {
                let target = eval_expr(vm, object, scope)?;
                let key = member_key(vm, key, scope)?;
                Ok(Value::Boolean(vm.delete_property(&target, &key)?))
            }
            _ => Ok(Value::Boolean(true)),
        },
        UnaryOp::Not => Ok(Value::Boolean(!eval_expr(vm, expr, scope)?.truthy())),
        UnaryOp::Neg => Ok(Value::Number(-eval_expr(vm, expr, scope)?.to_number())),
        UnaryOp::Plus => Ok(Value::Number(eval_expr(vm, expr, scope)?.to_number())),
    }
}

/// The `+` operator
pub(crate) fn add(vm: &Vm, left: &Value, right: &Value) -> VmResult<Value> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (Value::String(_) | Value::Object(_), _) | (_, Value::String(_) | Value::Object(_)) => {
            let mut out = vm.to_js_string(left)?;
            out.push_str(&vm.to_js_string(right)?);
            Ok(Value::from(out))
        }
        _ => Ok(Value::Number(left.to_number() + right.to_number())),
    }
}

fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

fn binary(vm: &Vm, op: BinaryOp, left: &Value, right: &Value) -> VmResult<Value> {
    use std::cmp::Ordering::*;
    let value = match op {
        BinaryOp::Add => return add(vm, left, right),
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Eq => Value::Boolean(left.loose_equals(right)),
        BinaryOp::NotEq => Value::Boolean(!left.loose_equals(right)),
        BinaryOp::StrictEq => Value::Boolean(left.strict_equals(right)),
        BinaryOp::StrictNotEq => Value::Boolean(!left.strict_equals(right)),
        BinaryOp::Lt => Value::Boolean(compare(left, right) == Some(Less)),
        BinaryOp::Gt => Value::Boolean(compare(left, right) == Some(Greater)),
        BinaryOp::LtEq => Value::Boolean(matches!(compare(left, right), Some(Less | Equal))),
        BinaryOp::GtEq => Value::Boolean(matches!(compare(left, right), Some(Greater | Equal))),
        BinaryOp::In => {
            if !right.is_object() {
                return Err(VmError::type_error(format!(
                    "Cannot use 'in' operator to search for '{}' in {}",
                    vm.to_js_string(left)?,
                    vm.to_js_string(right)?
                )));
            }
            let key = property_key(vm, left)?;
            Value::Boolean(vm.has_property(right, &key)?)
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_chain() {
        let root = Scope::script();
        root.declare("a", Value::from(1), true);
        let inner = Scope::child(&root, ScopeKind::Block);
        inner.declare("b", Value::from(2), false);
        assert!(inner.lookup("a").is_some());
        assert!(root.lookup("b").is_none());
        assert!(inner.assign("a", Value::from(3)).unwrap());
        assert_eq!(root.lookup("a").and_then(|v| v.as_number()), Some(3.0));
        assert!(inner.assign("b", Value::from(4)).is_err());
        assert!(!inner.assign("missing", Value::Null).unwrap());
    }

    #[test]
    fn test_var_scope_skips_blocks() {
        let root = Scope::script();
        let func = Scope::child(&root, ScopeKind::Function);
        let block = Scope::child(&func, ScopeKind::Block);
        assert_eq!(block.var_scope().kind, ScopeKind::Function);
    }
}
