//! Tree-walking evaluator for the expression AST.

use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value as JsonValue};

use super::parser::{BinOp, BoolOp, CmpOp, CompClause, Expr};
use super::{to_display_string, TemplateErrorKind};
use crate::context::LayeredContext;

type EvalResult = Result<JsonValue, TemplateErrorKind>;

/// Expression evaluator bound to a context.
pub struct Evaluator<'a> {
    ctx: &'a LayeredContext,
    limit: usize,
    scopes: Vec<IndexMap<String, JsonValue>>,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator over `ctx` with the given comprehension bound.
    pub fn new(ctx: &'a LayeredContext, limit: usize) -> Self {
        Self {
            ctx,
            limit,
            scopes: Vec::new(),
        }
    }

    /// Evaluates an expression to a JSON value.
    pub fn eval(&mut self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Int(v) => Ok(JsonValue::from(*v)),
            Expr::Float(v) => number(*v),
            Expr::Str(v) => Ok(JsonValue::String(v.clone())),
            Expr::Bool(v) => Ok(JsonValue::Bool(*v)),
            Expr::Null => Ok(JsonValue::Null),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item)?);
                }
                Ok(JsonValue::Array(out))
            }
            Expr::Set(items) => {
                let mut out: Vec<JsonValue> = Vec::with_capacity(items.len());
                for item in items {
                    let value = self.eval(item)?;
                    if !out.iter().any(|v| values_equal(v, &value)) {
                        out.push(value);
                    }
                }
                Ok(JsonValue::Array(out))
            }
            Expr::Dict(entries) => {
                let mut out = JsonMap::new();
                for (key_expr, value_expr) in entries {
                    let key = self.dict_key(key_expr)?;
                    let value = self.eval(value_expr)?;
                    out.insert(key, value);
                }
                Ok(JsonValue::Object(out))
            }
            Expr::Unary { operand, .. } => match self.eval(operand)? {
                JsonValue::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        i.checked_neg()
                            .map(JsonValue::from)
                            .ok_or_else(|| TemplateErrorKind::Type("integer overflow".to_string()))
                    } else {
                        number(-n.as_f64().unwrap_or(f64::NAN))
                    }
                }
                other => Err(TemplateErrorKind::Type(format!(
                    "cannot negate {}",
                    type_name(&other)
                ))),
            },
            Expr::Not(operand) => {
                let value = self.eval(operand)?;
                Ok(JsonValue::Bool(!truthy(&value)))
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, &left, &right)
            }
            Expr::Compare { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                compare(*op, &left, &right).map(JsonValue::Bool)
            }
            Expr::Logic { op, left, right } => {
                let left = self.eval(left)?;
                match op {
                    BoolOp::And if !truthy(&left) => Ok(left),
                    BoolOp::Or if truthy(&left) => Ok(left),
                    _ => self.eval(right),
                }
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.eval(condition)?;
                if truthy(&condition) {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                index_value(&object, &index)
            }
            Expr::Attr { object, name } => {
                let object = self.eval(object)?;
                match &object {
                    JsonValue::Object(map) => map.get(name).cloned().ok_or_else(|| {
                        TemplateErrorKind::Index(format!("key '{name}' not found"))
                    }),
                    other => Err(TemplateErrorKind::Type(format!(
                        "cannot access attribute '{name}' on {}",
                        type_name(other)
                    ))),
                }
            }
            Expr::Call { function, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                self.call_builtin(function, values)
            }
            Expr::ListComp { element, clause } => {
                let mut out = Vec::new();
                self.run_comprehension(clause, |this| {
                    let value = this.eval(element)?;
                    out.push(value);
                    Ok(out.len())
                })?;
                Ok(JsonValue::Array(out))
            }
            Expr::SetComp { element, clause } => {
                let mut out: Vec<JsonValue> = Vec::new();
                self.run_comprehension(clause, |this| {
                    let value = this.eval(element)?;
                    if !out.iter().any(|v| values_equal(v, &value)) {
                        out.push(value);
                    }
                    Ok(out.len())
                })?;
                Ok(JsonValue::Array(out))
            }
            Expr::DictComp { key, value, clause } => {
                let mut out = JsonMap::new();
                self.run_comprehension(clause, |this| {
                    let k = this.dict_key(key)?;
                    let v = this.eval(value)?;
                    out.insert(k, v);
                    Ok(out.len())
                })?;
                Ok(JsonValue::Object(out))
            }
        }
    }

    fn dict_key(&mut self, expr: &Expr) -> Result<String, TemplateErrorKind> {
        match self.eval(expr)? {
            JsonValue::String(s) => Ok(s),
            JsonValue::Number(n) => Ok(n.to_string()),
            JsonValue::Bool(b) => Ok(b.to_string()),
            other => Err(TemplateErrorKind::Type(format!(
                "dict key must be a scalar, got {}",
                type_name(&other)
            ))),
        }
    }

    fn lookup(&mut self, name: &str) -> EvalResult {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Ok(value.clone());
            }
        }
        self.ctx
            .get(name)
            .cloned()
            .ok_or_else(|| TemplateErrorKind::UndefinedName(name.to_string()))
    }

    fn run_comprehension<F>(
        &mut self,
        clause: &CompClause,
        mut produce: F,
    ) -> Result<(), TemplateErrorKind>
    where
        F: FnMut(&mut Self) -> Result<usize, TemplateErrorKind>,
    {
        let iterable = self.eval(&clause.iter)?;
        let items = iterate(&iterable)?;

        self.scopes.push(IndexMap::new());
        let result = (|| {
            for item in items {
                bind_target(self.scopes.last_mut().expect("scope pushed"), &clause.target, item)?;
                if let Some(condition) = &clause.condition {
                    let keep = self.eval(condition)?;
                    if !truthy(&keep) {
                        continue;
                    }
                }
                let produced = produce(self)?;
                if produced > self.limit {
                    return Err(TemplateErrorKind::ComprehensionLimit(self.limit));
                }
            }
            Ok(())
        })();
        self.scopes.pop();
        result
    }

    fn call_builtin(&mut self, name: &str, args: Vec<JsonValue>) -> EvalResult {
        match name {
            "len" => {
                let [arg] = take_args::<1>(name, args)?;
                let len = match &arg {
                    JsonValue::String(s) => s.chars().count(),
                    JsonValue::Array(a) => a.len(),
                    JsonValue::Object(o) => o.len(),
                    other => {
                        return Err(TemplateErrorKind::Type(format!(
                            "len() takes a string, list, or dict, got {}",
                            type_name(other)
                        )))
                    }
                };
                Ok(JsonValue::from(len))
            }
            "range" => self.builtin_range(args),
            "min" => fold_extremum(name, args, |a, b| a < b),
            "max" => fold_extremum(name, args, |a, b| a > b),
            "sum" => {
                let items = match args.len() {
                    1 => as_array(&args[0], "sum()")?.to_vec(),
                    n => {
                        return Err(TemplateErrorKind::Type(format!(
                            "sum() takes 1 argument, got {n}"
                        )))
                    }
                };
                let mut int_total: i64 = 0;
                let mut float_total = 0.0;
                let mut saw_float = false;
                for item in &items {
                    match item {
                        JsonValue::Number(n) if n.as_i64().is_some() && !saw_float => {
                            int_total = int_total
                                .checked_add(n.as_i64().expect("checked above"))
                                .ok_or_else(|| {
                                    TemplateErrorKind::Type("integer overflow in sum()".to_string())
                                })?;
                        }
                        JsonValue::Number(n) => {
                            if !saw_float {
                                saw_float = true;
                                float_total = int_total as f64;
                            }
                            float_total += n.as_f64().unwrap_or(f64::NAN);
                        }
                        other => {
                            return Err(TemplateErrorKind::Type(format!(
                                "sum() requires numbers, got {}",
                                type_name(other)
                            )))
                        }
                    }
                }
                if saw_float {
                    number(float_total)
                } else {
                    Ok(JsonValue::from(int_total))
                }
            }
            "abs" => {
                let [arg] = take_args::<1>(name, args)?;
                match &arg {
                    JsonValue::Number(n) => {
                        if let Some(i) = n.as_i64() {
                            Ok(JsonValue::from(i.abs()))
                        } else {
                            number(n.as_f64().unwrap_or(f64::NAN).abs())
                        }
                    }
                    other => Err(TemplateErrorKind::Type(format!(
                        "abs() requires a number, got {}",
                        type_name(other)
                    ))),
                }
            }
            "round" => match args.len() {
                1 => {
                    let value = as_number(&args[0], "round()")?;
                    Ok(JsonValue::from(value.round() as i64))
                }
                2 => {
                    let value = as_number(&args[0], "round()")?;
                    let digits = as_int(&args[1], "round()")?;
                    let factor = 10f64.powi(digits as i32);
                    number((value * factor).round() / factor)
                }
                n => Err(TemplateErrorKind::Type(format!(
                    "round() takes 1 or 2 arguments, got {n}"
                ))),
            },
            "sorted" => {
                let [arg] = take_args::<1>(name, args)?;
                let mut items = as_array(&arg, "sorted()")?.to_vec();
                sort_values(&mut items)?;
                Ok(JsonValue::Array(items))
            }
            "reversed" => {
                let [arg] = take_args::<1>(name, args)?;
                match arg {
                    JsonValue::Array(mut items) => {
                        items.reverse();
                        Ok(JsonValue::Array(items))
                    }
                    JsonValue::String(s) => Ok(JsonValue::String(s.chars().rev().collect())),
                    other => Err(TemplateErrorKind::Type(format!(
                        "reversed() takes a list or string, got {}",
                        type_name(&other)
                    ))),
                }
            }
            "enumerate" => {
                let (items, start) = match args.len() {
                    1 => (as_array(&args[0], "enumerate()")?.to_vec(), 0i64),
                    2 => (
                        as_array(&args[0], "enumerate()")?.to_vec(),
                        as_int(&args[1], "enumerate()")?,
                    ),
                    n => {
                        return Err(TemplateErrorKind::Type(format!(
                            "enumerate() takes 1 or 2 arguments, got {n}"
                        )))
                    }
                };
                let out = items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| JsonValue::Array(vec![JsonValue::from(start + i as i64), v]))
                    .collect();
                Ok(JsonValue::Array(out))
            }
            "zip" => {
                let mut lists = Vec::with_capacity(args.len());
                for arg in &args {
                    lists.push(as_array(arg, "zip()")?);
                }
                let shortest = lists.iter().map(|l| l.len()).min().unwrap_or(0);
                let out = (0..shortest)
                    .map(|i| JsonValue::Array(lists.iter().map(|l| l[i].clone()).collect()))
                    .collect();
                Ok(JsonValue::Array(out))
            }
            "any" => {
                let [arg] = take_args::<1>(name, args)?;
                let items = as_array(&arg, "any()")?;
                Ok(JsonValue::Bool(items.iter().any(truthy)))
            }
            "all" => {
                let [arg] = take_args::<1>(name, args)?;
                let items = as_array(&arg, "all()")?;
                Ok(JsonValue::Bool(items.iter().all(truthy)))
            }
            "str" => {
                let [arg] = take_args::<1>(name, args)?;
                Ok(JsonValue::String(to_display_string(&arg)))
            }
            "int" => {
                let [arg] = take_args::<1>(name, args)?;
                match &arg {
                    JsonValue::Number(n) => {
                        if let Some(i) = n.as_i64() {
                            Ok(JsonValue::from(i))
                        } else {
                            Ok(JsonValue::from(n.as_f64().unwrap_or(f64::NAN) as i64))
                        }
                    }
                    JsonValue::String(s) => s.trim().parse::<i64>().map(JsonValue::from).map_err(
                        |_| TemplateErrorKind::Type(format!("cannot convert '{s}' to int")),
                    ),
                    JsonValue::Bool(b) => Ok(JsonValue::from(i64::from(*b))),
                    other => Err(TemplateErrorKind::Type(format!(
                        "cannot convert {} to int",
                        type_name(other)
                    ))),
                }
            }
            "float" => {
                let [arg] = take_args::<1>(name, args)?;
                match &arg {
                    JsonValue::Number(n) => number(n.as_f64().unwrap_or(f64::NAN)),
                    JsonValue::String(s) => s
                        .trim()
                        .parse::<f64>()
                        .map_err(|_| {
                            TemplateErrorKind::Type(format!("cannot convert '{s}' to float"))
                        })
                        .and_then(number),
                    JsonValue::Bool(b) => number(f64::from(u8::from(*b))),
                    other => Err(TemplateErrorKind::Type(format!(
                        "cannot convert {} to float",
                        type_name(other)
                    ))),
                }
            }
            "bool" => {
                let [arg] = take_args::<1>(name, args)?;
                Ok(JsonValue::Bool(truthy(&arg)))
            }
            "list" | "tuple" => {
                let [arg] = take_args::<1>(name, args)?;
                match arg {
                    JsonValue::Array(items) => Ok(JsonValue::Array(items)),
                    JsonValue::String(s) => Ok(JsonValue::Array(
                        s.chars()
                            .map(|c| JsonValue::String(c.to_string()))
                            .collect(),
                    )),
                    JsonValue::Object(map) => Ok(JsonValue::Array(
                        map.keys().map(|k| JsonValue::String(k.clone())).collect(),
                    )),
                    other => Err(TemplateErrorKind::Type(format!(
                        "cannot convert {} to list",
                        type_name(&other)
                    ))),
                }
            }
            "set" => {
                let [arg] = take_args::<1>(name, args)?;
                let items = as_array(&arg, "set()")?;
                let mut out: Vec<JsonValue> = Vec::new();
                for item in items {
                    if !out.iter().any(|v| values_equal(v, item)) {
                        out.push(item.clone());
                    }
                }
                Ok(JsonValue::Array(out))
            }
            "dict" => {
                let [arg] = take_args::<1>(name, args)?;
                match arg {
                    JsonValue::Object(map) => Ok(JsonValue::Object(map)),
                    JsonValue::Array(pairs) => {
                        let mut out = JsonMap::new();
                        for pair in pairs {
                            let JsonValue::Array(kv) = pair else {
                                return Err(TemplateErrorKind::Type(
                                    "dict() requires a list of [key, value] pairs".to_string(),
                                ));
                            };
                            let [k, v]: [JsonValue; 2] = kv.try_into().map_err(|_| {
                                TemplateErrorKind::Type(
                                    "dict() requires [key, value] pairs".to_string(),
                                )
                            })?;
                            let JsonValue::String(key) = k else {
                                return Err(TemplateErrorKind::Type(
                                    "dict() keys must be strings".to_string(),
                                ));
                            };
                            out.insert(key, v);
                        }
                        Ok(JsonValue::Object(out))
                    }
                    other => Err(TemplateErrorKind::Type(format!(
                        "cannot convert {} to dict",
                        type_name(&other)
                    ))),
                }
            }
            "get" => match args.len() {
                2 => {
                    let name_arg = as_str(&args[0], "get()")?;
                    Ok(self
                        .ctx
                        .get(name_arg)
                        .cloned()
                        .unwrap_or_else(|| args[1].clone()))
                }
                n => Err(TemplateErrorKind::Type(format!(
                    "get() takes 2 arguments, got {n}"
                ))),
            },
            "exists" => {
                let [arg] = take_args::<1>(name, args)?;
                let name_arg = as_str(&arg, "exists()")?;
                Ok(JsonValue::Bool(self.ctx.contains(name_arg)))
            }
            "env" => match args.len() {
                1 | 2 => {
                    let var = as_str(&args[0], "env()")?;
                    match std::env::var(var) {
                        Ok(value) => Ok(JsonValue::String(value)),
                        Err(_) => args.get(1).cloned().ok_or_else(|| {
                            TemplateErrorKind::UndefinedName(format!("environment variable {var}"))
                        }),
                    }
                }
                n => Err(TemplateErrorKind::Type(format!(
                    "env() takes 1 or 2 arguments, got {n}"
                ))),
            },
            "uuid4" => {
                if !args.is_empty() {
                    return Err(TemplateErrorKind::Type(
                        "uuid4() takes no arguments".to_string(),
                    ));
                }
                Ok(JsonValue::String(uuid::Uuid::new_v4().to_string()))
            }
            other => Err(TemplateErrorKind::UnknownFunction(other.to_string())),
        }
    }

    fn builtin_range(&self, args: Vec<JsonValue>) -> EvalResult {
        let (start, stop, step) = match args.len() {
            1 => (0, as_int(&args[0], "range()")?, 1),
            2 => (
                as_int(&args[0], "range()")?,
                as_int(&args[1], "range()")?,
                1,
            ),
            3 => (
                as_int(&args[0], "range()")?,
                as_int(&args[1], "range()")?,
                as_int(&args[2], "range()")?,
            ),
            n => {
                return Err(TemplateErrorKind::Type(format!(
                    "range() takes 1 to 3 arguments, got {n}"
                )))
            }
        };
        if step == 0 {
            return Err(TemplateErrorKind::Type(
                "range() step must not be zero".to_string(),
            ));
        }
        let mut out = Vec::new();
        let mut current = start;
        while (step > 0 && current < stop) || (step < 0 && current > stop) {
            out.push(JsonValue::from(current));
            if out.len() > self.limit {
                return Err(TemplateErrorKind::ComprehensionLimit(self.limit));
            }
            current += step;
        }
        Ok(JsonValue::Array(out))
    }
}

/// Python-style truthiness over JSON values.
pub fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(o) => !o.is_empty(),
    }
}

/// Equality that treats `1` and `1.0` as equal, recursively.
pub fn values_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => {
            x.as_f64().zip(y.as_f64()).is_some_and(|(x, y)| x == y)
        }
        (JsonValue::Array(x), JsonValue::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (JsonValue::Object(x), JsonValue::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "list",
        JsonValue::Object(_) => "dict",
    }
}

fn number(value: f64) -> EvalResult {
    serde_json::Number::from_f64(value)
        .map(JsonValue::Number)
        .ok_or_else(|| TemplateErrorKind::Type("result is not a finite number".to_string()))
}

fn take_args<const N: usize>(
    name: &str,
    args: Vec<JsonValue>,
) -> Result<[JsonValue; N], TemplateErrorKind> {
    let got = args.len();
    args.try_into()
        .map_err(|_| TemplateErrorKind::Type(format!("{name}() takes {N} argument(s), got {got}")))
}

fn as_array<'v>(value: &'v JsonValue, what: &str) -> Result<&'v Vec<JsonValue>, TemplateErrorKind> {
    value
        .as_array()
        .ok_or_else(|| TemplateErrorKind::Type(format!("{what} requires a list, got {}", type_name(value))))
}

fn as_str<'v>(value: &'v JsonValue, what: &str) -> Result<&'v str, TemplateErrorKind> {
    value
        .as_str()
        .ok_or_else(|| TemplateErrorKind::Type(format!("{what} requires a string, got {}", type_name(value))))
}

fn as_number(value: &JsonValue, what: &str) -> Result<f64, TemplateErrorKind> {
    value
        .as_f64()
        .ok_or_else(|| TemplateErrorKind::Type(format!("{what} requires a number, got {}", type_name(value))))
}

fn as_int(value: &JsonValue, what: &str) -> Result<i64, TemplateErrorKind> {
    value
        .as_i64()
        .ok_or_else(|| TemplateErrorKind::Type(format!("{what} requires an integer, got {}", type_name(value))))
}

fn binary(op: BinOp, left: &JsonValue, right: &JsonValue) -> EvalResult {
    use JsonValue::{Array, Number, String as Str};
    match (op, left, right) {
        (BinOp::Add, Str(a), Str(b)) => Ok(JsonValue::String(format!("{a}{b}"))),
        (BinOp::Add, Array(a), Array(b)) => {
            let mut out = a.clone();
            out.extend(b.iter().cloned());
            Ok(JsonValue::Array(out))
        }
        (_, Number(a), Number(b)) => numeric_binary(op, a, b),
        _ => Err(TemplateErrorKind::Type(format!(
            "unsupported operand types for {}: {} and {}",
            op_symbol(op),
            type_name(left),
            type_name(right)
        ))),
    }
}

fn numeric_binary(op: BinOp, a: &serde_json::Number, b: &serde_json::Number) -> EvalResult {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return match op {
            BinOp::Add => x
                .checked_add(y)
                .map(JsonValue::from)
                .ok_or_else(overflow),
            BinOp::Sub => x
                .checked_sub(y)
                .map(JsonValue::from)
                .ok_or_else(overflow),
            BinOp::Mul => x
                .checked_mul(y)
                .map(JsonValue::from)
                .ok_or_else(overflow),
            BinOp::Div => {
                if y == 0 {
                    Err(TemplateErrorKind::DivisionByZero)
                } else {
                    number(x as f64 / y as f64)
                }
            }
            BinOp::Mod => {
                if y == 0 {
                    Err(TemplateErrorKind::DivisionByZero)
                } else {
                    Ok(JsonValue::from(x.rem_euclid(y)))
                }
            }
        };
    }

    let x = a.as_f64().unwrap_or(f64::NAN);
    let y = b.as_f64().unwrap_or(f64::NAN);
    match op {
        BinOp::Add => number(x + y),
        BinOp::Sub => number(x - y),
        BinOp::Mul => number(x * y),
        BinOp::Div => {
            if y == 0.0 {
                Err(TemplateErrorKind::DivisionByZero)
            } else {
                number(x / y)
            }
        }
        BinOp::Mod => {
            if y == 0.0 {
                Err(TemplateErrorKind::DivisionByZero)
            } else {
                number(x.rem_euclid(y))
            }
        }
    }
}

fn overflow() -> TemplateErrorKind {
    TemplateErrorKind::Type("integer overflow".to_string())
}

const fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
    }
}

fn compare(op: CmpOp, left: &JsonValue, right: &JsonValue) -> Result<bool, TemplateErrorKind> {
    match op {
        CmpOp::Eq => Ok(values_equal(left, right)),
        CmpOp::Ne => Ok(!values_equal(left, right)),
        CmpOp::In => membership(left, right),
        CmpOp::NotIn => membership(left, right).map(|b| !b),
        ordered => {
            let ordering = match (left, right) {
                (JsonValue::Number(a), JsonValue::Number(b)) => a
                    .as_f64()
                    .zip(b.as_f64())
                    .and_then(|(a, b)| a.partial_cmp(&b)),
                (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
                _ => None,
            };
            let Some(ordering) = ordering else {
                return Err(TemplateErrorKind::Type(format!(
                    "cannot order {} and {}",
                    type_name(left),
                    type_name(right)
                )));
            };
            Ok(match ordered {
                CmpOp::Lt => ordering.is_lt(),
                CmpOp::Le => ordering.is_le(),
                CmpOp::Gt => ordering.is_gt(),
                CmpOp::Ge => ordering.is_ge(),
                _ => unreachable!("handled above"),
            })
        }
    }
}

fn membership(needle: &JsonValue, haystack: &JsonValue) -> Result<bool, TemplateErrorKind> {
    match haystack {
        JsonValue::Array(items) => Ok(items.iter().any(|v| values_equal(v, needle))),
        JsonValue::Object(map) => match needle {
            JsonValue::String(key) => Ok(map.contains_key(key)),
            other => Err(TemplateErrorKind::Type(format!(
                "dict membership requires a string, got {}",
                type_name(other)
            ))),
        },
        JsonValue::String(text) => match needle {
            JsonValue::String(sub) => Ok(text.contains(sub.as_str())),
            other => Err(TemplateErrorKind::Type(format!(
                "string membership requires a string, got {}",
                type_name(other)
            ))),
        },
        other => Err(TemplateErrorKind::Type(format!(
            "'in' requires a list, dict, or string, got {}",
            type_name(other)
        ))),
    }
}

fn index_value(object: &JsonValue, index: &JsonValue) -> EvalResult {
    match (object, index) {
        (JsonValue::Array(items), JsonValue::Number(n)) => {
            let i = n
                .as_i64()
                .ok_or_else(|| TemplateErrorKind::Type("list index must be an integer".to_string()))?;
            let len = items.len() as i64;
            let normalized = if i < 0 { i + len } else { i };
            if normalized < 0 || normalized >= len {
                return Err(TemplateErrorKind::Index(format!(
                    "list index {i} out of range (len {len})"
                )));
            }
            Ok(items[normalized as usize].clone())
        }
        (JsonValue::Object(map), JsonValue::String(key)) => map
            .get(key)
            .cloned()
            .ok_or_else(|| TemplateErrorKind::Index(format!("key '{key}' not found"))),
        (JsonValue::String(s), JsonValue::Number(n)) => {
            let chars: Vec<char> = s.chars().collect();
            let i = n
                .as_i64()
                .ok_or_else(|| TemplateErrorKind::Type("string index must be an integer".to_string()))?;
            let len = chars.len() as i64;
            let normalized = if i < 0 { i + len } else { i };
            if normalized < 0 || normalized >= len {
                return Err(TemplateErrorKind::Index(format!(
                    "string index {i} out of range (len {len})"
                )));
            }
            Ok(JsonValue::String(chars[normalized as usize].to_string()))
        }
        _ => Err(TemplateErrorKind::Type(format!(
            "cannot index {} with {}",
            type_name(object),
            type_name(index)
        ))),
    }
}

fn iterate(value: &JsonValue) -> Result<Vec<JsonValue>, TemplateErrorKind> {
    match value {
        JsonValue::Array(items) => Ok(items.clone()),
        JsonValue::String(s) => Ok(s.chars().map(|c| JsonValue::String(c.to_string())).collect()),
        JsonValue::Object(map) => Ok(map.keys().map(|k| JsonValue::String(k.clone())).collect()),
        other => Err(TemplateErrorKind::Type(format!(
            "cannot iterate over {}",
            type_name(other)
        ))),
    }
}

fn bind_target(
    scope: &mut IndexMap<String, JsonValue>,
    target: &[String],
    item: JsonValue,
) -> Result<(), TemplateErrorKind> {
    if target.len() == 1 {
        scope.insert(target[0].clone(), item);
        return Ok(());
    }
    let JsonValue::Array(parts) = item else {
        return Err(TemplateErrorKind::Type(
            "cannot destructure a non-list element".to_string(),
        ));
    };
    if parts.len() != target.len() {
        return Err(TemplateErrorKind::Type(format!(
            "cannot destructure {} element(s) into {} name(s)",
            parts.len(),
            target.len()
        )));
    }
    for (name, part) in target.iter().zip(parts) {
        scope.insert(name.clone(), part);
    }
    Ok(())
}

fn fold_extremum(
    name: &str,
    args: Vec<JsonValue>,
    wins: fn(f64, f64) -> bool,
) -> EvalResult {
    let items = match args.len() {
        0 => {
            return Err(TemplateErrorKind::Type(format!(
                "{name}() requires at least one argument"
            )))
        }
        1 => as_array(&args[0], name)?.to_vec(),
        _ => args,
    };
    if items.is_empty() {
        return Err(TemplateErrorKind::Type(format!("{name}() of empty list")));
    }

    if items.iter().all(|v| matches!(v, JsonValue::String(_))) {
        let mut best = items[0].as_str().expect("checked").to_string();
        for item in &items[1..] {
            let s = item.as_str().expect("checked");
            let smaller = s < best.as_str();
            // `wins(0.0, 1.0)` is true exactly for min.
            if smaller == wins(0.0, 1.0) {
                best = s.to_string();
            }
        }
        return Ok(JsonValue::String(best));
    }

    let mut best = items[0].clone();
    let mut best_f = as_number(&best, name)?;
    for item in &items[1..] {
        let f = as_number(item, name)?;
        if wins(f, best_f) {
            best = item.clone();
            best_f = f;
        }
    }
    Ok(best)
}

fn sort_values(items: &mut [JsonValue]) -> Result<(), TemplateErrorKind> {
    if items.iter().all(|v| matches!(v, JsonValue::Number(_))) {
        items.sort_by(|a, b| {
            a.as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(())
    } else if items.iter().all(|v| matches!(v, JsonValue::String(_))) {
        items.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
        Ok(())
    } else if items.is_empty() {
        Ok(())
    } else {
        Err(TemplateErrorKind::Type(
            "sorted() requires a list of all numbers or all strings".to_string(),
        ))
    }
}
