use serde_json::Map;
use serde_json::Value;

use crate::ast::AssignOp;
use crate::ast::BinaryOp;
use crate::ast::Expr;
use crate::ast::LogicalOp;
use crate::ast::Program;
use crate::ast::Stmt;
use crate::ast::UnaryOp;
use crate::value;
use crate::ExpressionError;
use crate::Scope;

const GLOBALS: &[&str] = &["Math", "JSON", "Object", "Array"];

pub(crate) struct Interpreter<'s> {
    scope: &'s mut dyn Scope,
}

impl<'s> Interpreter<'s> {
    pub fn new(scope: &'s mut dyn Scope) -> Self {
        Self { scope }
    }

    /// Run every statement, returning the value of the last expression
    /// statement.
    pub fn run(&mut self, program: &Program) -> Result<Value, ExpressionError> {
        let mut completion = Value::Null;
        for stmt in &program.body {
            if let Some(value) = self.exec(stmt)? {
                completion = value;
            }
        }
        Ok(completion)
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Option<Value>, ExpressionError> {
        match stmt {
            Stmt::Empty => Ok(None),
            Stmt::Expr(expr) => self.eval(expr).map(Some),
            Stmt::Declare(declarations) => {
                for (name, init) in declarations {
                    let value = match init {
                        Some(expr) => self.eval(expr)?,
                        None => Value::Null,
                    };
                    self.scope.declare(name, value);
                }
                Ok(None)
            }
            Stmt::Block(body) => {
                let mut completion = None;
                for stmt in body {
                    if let Some(value) = self.exec(stmt)? {
                        completion = Some(value);
                    }
                }
                Ok(completion)
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if value::is_truthy(&self.eval(test)?) {
                    self.exec(consequent)
                } else if let Some(alternate) = alternate {
                    self.exec(alternate)
                } else {
                    Ok(None)
                }
            }
            Stmt::While { test, body } => {
                let mut completion = None;
                while value::is_truthy(&self.eval(test)?) {
                    if let Some(value) = self.exec(body)? {
                        completion = Some(value);
                    }
                }
                Ok(completion)
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.exec(init)?;
                }
                let mut completion = None;
                loop {
                    if let Some(test) = test {
                        if !value::is_truthy(&self.eval(test)?) {
                            break;
                        }
                    }
                    if let Some(value) = self.exec(body)? {
                        completion = Some(value);
                    }
                    if let Some(update) = update {
                        self.eval(update)?;
                    }
                }
                Ok(completion)
            }
        }
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value, ExpressionError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) => Ok(self.scope.get(name).cloned().unwrap_or(Value::Null)),
            Expr::Array(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Object(properties) => {
                let mut map = Map::new();
                for (key, value) in properties {
                    let value = self.eval(value)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::Object(map))
            }
            Expr::Member { object, property } => {
                if let Some(global) = self.global_name(object) {
                    return global_property(global, property);
                }
                let object = self.eval(object)?;
                Ok(get_property(&object, property))
            }
            Expr::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                Ok(get_index(&object, &index))
            }
            Expr::Call { callee, args } => self.call(callee, args),
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value::is_truthy(&operand)),
                    UnaryOp::Negate => value::number(-value::to_number(&operand)),
                    UnaryOp::Plus => value::number(value::to_number(&operand)),
                    UnaryOp::TypeOf => Value::String(value::type_of(&operand).to_string()),
                })
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !value::is_truthy(&left),
                    LogicalOp::Or => value::is_truthy(&left),
                    LogicalOp::Nullish => !left.is_null(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if value::is_truthy(&self.eval(test)?) {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
            Expr::Assign { op, target, value } => {
                let value = self.eval(value)?;
                let value = match op {
                    AssignOp::Assign => value,
                    AssignOp::Compound(op) => binary(*op, &self.eval(target)?, &value)?,
                };
                self.assign_to(target, value.clone())?;
                Ok(value)
            }
            Expr::Update {
                increment,
                prefix,
                target,
            } => {
                let old = value::to_number(&self.eval(target)?);
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.assign_to(target, value::number(new))?;
                Ok(value::number(if *prefix { new } else { old }))
            }
        }
    }

    fn global_name<'e>(&self, expr: &'e Expr) -> Option<&'e str> {
        match expr {
            Expr::Ident(name)
                if GLOBALS.contains(&name.as_str()) && self.scope.get(name).is_none() =>
            {
                Some(name.as_str())
            }
            _ => None,
        }
    }

    fn assign_to(&mut self, target: &Expr, value: Value) -> Result<(), ExpressionError> {
        match target {
            Expr::Ident(name) => {
                self.scope.assign(name, value);
                Ok(())
            }
            Expr::Member { object, property } => {
                let mut base = self.eval(object)?;
                set_key(&mut base, property, value)?;
                self.assign_to(object, base)
            }
            Expr::Index { object, index } => {
                let key = self.eval(index)?;
                let mut base = self.eval(object)?;
                match (&mut base, &key) {
                    (Value::Array(items), Value::Number(n)) => {
                        let index = array_index(n).ok_or_else(|| {
                            ExpressionError::runtime(format!("invalid array index `{n}`"))
                        })?;
                        if index >= items.len() {
                            items.resize(index + 1, Value::Null);
                        }
                        items[index] = value;
                    }
                    _ => set_key(&mut base, &value::to_string_lossy(&key), value)?,
                }
                self.assign_to(object, base)
            }
            _ => Err(ExpressionError::runtime("invalid assignment target")),
        }
    }

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Value, ExpressionError> {
        let args = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Result<Vec<_>, _>>()?;

        match callee {
            Expr::Member { object, property } => {
                if let Some(global) = self.global_name(object) {
                    return call_global(global, property, &args);
                }
                let receiver = self.eval(object)?;
                if let Value::Array(items) = &receiver {
                    if matches!(property.as_str(), "push" | "pop" | "shift" | "unshift") {
                        let mut items = items.clone();
                        let result = mutate_array(&mut items, property, args);
                        self.assign_to(object, Value::Array(items))?;
                        return Ok(result);
                    }
                }
                call_method(&receiver, property, &args)
            }
            Expr::Ident(name) if self.scope.get(name).is_none() => call_function(name, &args),
            _ => Err(ExpressionError::runtime("expression is not a function")),
        }
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    let numeric = |f: fn(f64, f64) -> f64| {
        value::number(f(value::to_number(left), value::to_number(right)))
    };
    let ordered = |accept: fn(std::cmp::Ordering) -> bool| {
        Value::Bool(value::compare(left, right).is_some_and(accept))
    };

    Ok(match op {
        BinaryOp::Add => match (left, right) {
            (Value::Number(_) | Value::Bool(_) | Value::Null, Value::Number(_) | Value::Bool(_) | Value::Null) => {
                numeric(|a, b| a + b)
            }
            _ => Value::String(value::to_string_lossy(left) + &value::to_string_lossy(right)),
        },
        BinaryOp::Sub => numeric(|a, b| a - b),
        BinaryOp::Mul => numeric(|a, b| a * b),
        BinaryOp::Div => numeric(|a, b| a / b),
        BinaryOp::Rem => numeric(|a, b| a % b),
        BinaryOp::Eq => Value::Bool(value::loose_equals(left, right)),
        BinaryOp::NotEq => Value::Bool(!value::loose_equals(left, right)),
        BinaryOp::StrictEq => Value::Bool(value::strict_equals(left, right)),
        BinaryOp::StrictNotEq => Value::Bool(!value::strict_equals(left, right)),
        BinaryOp::Lt => ordered(std::cmp::Ordering::is_lt),
        BinaryOp::Gt => ordered(std::cmp::Ordering::is_gt),
        BinaryOp::LtEq => ordered(std::cmp::Ordering::is_le),
        BinaryOp::GtEq => ordered(std::cmp::Ordering::is_ge),
        BinaryOp::In => match right {
            Value::Object(map) => Value::Bool(map.contains_key(&value::to_string_lossy(left))),
            Value::Array(items) => Value::Bool(match left {
                Value::Number(n) => array_index(n).is_some_and(|index| index < items.len()),
                _ => false,
            }),
            _ => {
                return Err(ExpressionError::runtime(
                    "cannot use `in` on a value that is not an object",
                ))
            }
        },
    })
}

fn array_index(n: &serde_json::Number) -> Option<usize> {
    n.as_u64().and_then(|index| usize::try_from(index).ok())
}

pub(crate) fn get_property(object: &Value, property: &str) -> Value {
    match (object, property) {
        (Value::Array(items), "length") => Value::from(items.len()),
        (Value::String(s), "length") => Value::from(s.chars().count()),
        (Value::Object(map), key) => map.get(key).cloned().unwrap_or(Value::Null),
        (Value::Array(items), key) => key
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index).cloned())
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn get_index(object: &Value, index: &Value) -> Value {
    match (object, index) {
        (Value::Array(items), Value::Number(n)) => array_index(n)
            .and_then(|index| items.get(index).cloned())
            .unwrap_or(Value::Null),
        (Value::String(s), Value::Number(n)) => array_index(n)
            .and_then(|index| s.chars().nth(index))
            .map_or(Value::Null, |ch| Value::String(ch.to_string())),
        _ => get_property(object, &value::to_string_lossy(index)),
    }
}

fn set_key(base: &mut Value, key: &str, value: Value) -> Result<(), ExpressionError> {
    match base {
        Value::Object(map) => {
            map.insert(key.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            let index = key
                .parse::<usize>()
                .map_err(|_| ExpressionError::runtime(format!("cannot set `{key}` on an array")))?;
            if index >= items.len() {
                items.resize(index + 1, Value::Null);
            }
            items[index] = value;
            Ok(())
        }
        other => Err(ExpressionError::runtime(format!(
            "cannot set property `{key}` of {}",
            value::type_of(other)
        ))),
    }
}

fn mutate_array(items: &mut Vec<Value>, method: &str, args: Vec<Value>) -> Value {
    match method {
        "push" => {
            items.extend(args);
            Value::from(items.len())
        }
        "unshift" => {
            items.splice(0..0, args);
            Value::from(items.len())
        }
        "pop" => items.pop().unwrap_or(Value::Null),
        _ => {
            if items.is_empty() {
                Value::Null
            } else {
                items.remove(0)
            }
        }
    }
}

fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&Value::Null)
}

fn string_arg(args: &[Value], index: usize) -> String {
    value::to_string_lossy(arg(args, index))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_null() {
        return default;
    }
    let n = value::to_number(value);
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        len.saturating_sub((-n) as usize)
    } else {
        (n as usize).min(len)
    }
}

fn position(index: Option<usize>) -> Value {
    index.map_or(Value::from(-1), Value::from)
}

fn call_method(receiver: &Value, method: &str, args: &[Value]) -> Result<Value, ExpressionError> {
    if method == "toString" {
        return Ok(Value::String(value::to_string_lossy(receiver)));
    }

    match receiver {
        Value::String(s) => string_method(s, method, args),
        Value::Array(items) => array_method(items, method, args),
        Value::Number(n) if method == "toFixed" => {
            let digits = relative_index(arg(args, 0), 100, 0);
            Ok(Value::String(format!(
                "{:.*}",
                digits,
                n.as_f64().unwrap_or(f64::NAN)
            )))
        }
        Value::Null => Err(ExpressionError::runtime(format!(
            "cannot call `{method}` on undefined"
        ))),
        _ => Err(ExpressionError::runtime(format!(
            "`{method}` is not a function"
        ))),
    }
}

fn string_method(s: &str, method: &str, args: &[Value]) -> Result<Value, ExpressionError> {
    let chars: Vec<char> = s.chars().collect();
    let slice = |start: usize, end: usize| -> Value {
        Value::String(chars[start..end.max(start)].iter().collect())
    };
    let char_position = |byte: usize| s[..byte].chars().count();

    Ok(match method {
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::String(s.trim().to_string()),
        "trimStart" => Value::String(s.trim_start().to_string()),
        "trimEnd" => Value::String(s.trim_end().to_string()),
        "includes" => Value::Bool(s.contains(&string_arg(args, 0))),
        "startsWith" => Value::Bool(s.starts_with(&string_arg(args, 0))),
        "endsWith" => Value::Bool(s.ends_with(&string_arg(args, 0))),
        "indexOf" => position(s.find(&string_arg(args, 0)).map(char_position)),
        "lastIndexOf" => position(s.rfind(&string_arg(args, 0)).map(char_position)),
        "charAt" => {
            let index = relative_index(arg(args, 0), chars.len(), 0);
            chars
                .get(index)
                .map_or(Value::String(String::new()), |ch| Value::String(ch.to_string()))
        }
        "slice" => {
            let start = relative_index(arg(args, 0), chars.len(), 0);
            let end = relative_index(arg(args, 1), chars.len(), chars.len());
            slice(start, end)
        }
        "substring" => {
            let a = relative_index(arg(args, 0), chars.len(), 0);
            let b = relative_index(arg(args, 1), chars.len(), chars.len());
            slice(a.min(b), a.max(b))
        }
        "split" => {
            let separator = arg(args, 0);
            let parts: Vec<Value> = match separator {
                Value::Null => vec![Value::String(s.to_string())],
                _ => {
                    let separator = value::to_string_lossy(separator);
                    if separator.is_empty() {
                        chars.iter().map(|ch| Value::String(ch.to_string())).collect()
                    } else {
                        s.split(separator.as_str())
                            .map(|part| Value::String(part.to_string()))
                            .collect()
                    }
                }
            };
            Value::Array(parts)
        }
        "replace" => Value::String(s.replacen(&string_arg(args, 0), &string_arg(args, 1), 1)),
        "replaceAll" => Value::String(s.replace(&string_arg(args, 0), &string_arg(args, 1))),
        "repeat" => {
            let count = relative_index(arg(args, 0), usize::MAX, 0);
            Value::String(s.repeat(count))
        }
        "concat" => {
            let mut out = s.to_string();
            for value in args {
                out.push_str(&value::to_string_lossy(value));
            }
            Value::String(out)
        }
        _ => {
            return Err(ExpressionError::runtime(format!(
                "`{method}` is not a string method"
            )))
        }
    })
}

fn array_method(items: &[Value], method: &str, args: &[Value]) -> Result<Value, ExpressionError> {
    Ok(match method {
        "join" => {
            let separator = match arg(args, 0) {
                Value::Null => ",".to_string(),
                other => value::to_string_lossy(other),
            };
            Value::String(
                items
                    .iter()
                    .map(|item| value::to_display(item).unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join(&separator),
            )
        }
        "indexOf" => position(
            items
                .iter()
                .position(|item| value::strict_equals(item, arg(args, 0))),
        ),
        "includes" => Value::Bool(
            items
                .iter()
                .any(|item| value::strict_equals(item, arg(args, 0))),
        ),
        "slice" => {
            let start = relative_index(arg(args, 0), items.len(), 0);
            let end = relative_index(arg(args, 1), items.len(), items.len());
            Value::Array(items[start..end.max(start)].to_vec())
        }
        "concat" => {
            let mut out = items.to_vec();
            for value in args {
                match value {
                    Value::Array(more) => out.extend(more.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Value::Array(out)
        }
        "reverse" => Value::Array(items.iter().rev().cloned().collect()),
        _ => {
            return Err(ExpressionError::runtime(format!(
                "`{method}` is not an array method"
            )))
        }
    })
}

fn global_property(global: &str, property: &str) -> Result<Value, ExpressionError> {
    match (global, property) {
        ("Math", "PI") => Ok(value::number(std::f64::consts::PI)),
        ("Math", "E") => Ok(value::number(std::f64::consts::E)),
        _ => Err(ExpressionError::runtime(format!(
            "`{global}.{property}` is not supported"
        ))),
    }
}

fn call_global(global: &str, function: &str, args: &[Value]) -> Result<Value, ExpressionError> {
    let numbers = || args.iter().map(value::to_number);
    let unary = |f: fn(f64) -> f64| value::number(f(value::to_number(arg(args, 0))));

    Ok(match (global, function) {
        ("Math", "max") => value::number(numbers().fold(f64::NEG_INFINITY, f64::max)),
        ("Math", "min") => value::number(numbers().fold(f64::INFINITY, f64::min)),
        ("Math", "floor") => unary(f64::floor),
        ("Math", "ceil") => unary(f64::ceil),
        ("Math", "round") => unary(|f| (f + 0.5).floor()),
        ("Math", "abs") => unary(f64::abs),
        ("Math", "sqrt") => unary(f64::sqrt),
        ("Math", "pow") => value::number(
            value::to_number(arg(args, 0)).powf(value::to_number(arg(args, 1))),
        ),
        ("JSON", "stringify") => arg(args, 0).to_string().into(),
        ("JSON", "parse") => serde_json::from_str(&string_arg(args, 0))
            .map_err(|err| ExpressionError::runtime(format!("JSON.parse: {err}")))?,
        ("Object", "keys") => match arg(args, 0) {
            Value::Object(map) => Value::Array(map.keys().cloned().map(Value::String).collect()),
            Value::Array(items) => Value::Array(
                (0..items.len())
                    .map(|index| Value::String(index.to_string()))
                    .collect(),
            ),
            _ => Value::Array(Vec::new()),
        },
        ("Object", "values") => match arg(args, 0) {
            Value::Object(map) => Value::Array(map.values().cloned().collect()),
            Value::Array(items) => Value::Array(items.clone()),
            _ => Value::Array(Vec::new()),
        },
        ("Array", "isArray") => Value::Bool(arg(args, 0).is_array()),
        _ => {
            return Err(ExpressionError::runtime(format!(
                "`{global}.{function}` is not a function"
            )))
        }
    })
}

fn call_function(name: &str, args: &[Value]) -> Result<Value, ExpressionError> {
    Ok(match name {
        "String" => Value::String(string_arg(args, 0)),
        "Number" => value::number(value::to_number(arg(args, 0))),
        "Boolean" => Value::Bool(value::is_truthy(arg(args, 0))),
        "parseInt" => {
            let text = string_arg(args, 0);
            let digits: String = text
                .trim_start()
                .chars()
                .enumerate()
                .take_while(|(index, ch)| ch.is_ascii_digit() || (*index == 0 && *ch == '-'))
                .map(|(_, ch)| ch)
                .collect();
            digits
                .parse::<i64>()
                .map_or(Value::Null, Value::from)
        }
        "parseFloat" => value::number(string_arg(args, 0).trim().parse().unwrap_or(f64::NAN)),
        "isNaN" => Value::Bool(value::to_number(arg(args, 0)).is_nan()),
        _ => {
            return Err(ExpressionError::runtime(format!(
                "`{name}` is not a function"
            )))
        }
    })
}
