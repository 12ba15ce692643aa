//! `eval_expr` / `pre_eval_expr` 및 반복 조건식을 위한 변환 훅.
//!
//! 등록된 이름이면 등록된 훅을 실행하고, 아니면 내장 문장 언어로 해석한다.
//!
//! - 문장: `result.items = {{ result.items[0] }}`, `del body.etag`
//! - 조건: `{{ result.state }} == "DONE"`, `not {{ result.pending }}`, `len({{ result.items }}) >= 2`
//! - 피연산자: `{{ path }}`(네임스페이스), `expr(path)`(결과 저장소), `len(x)`, JSON 리터럴

use super::expression::{self, is_expression};
use super::order::compare_values;
use super::store::ResultStore;
use crate::error::{EngineError, ResolutionError};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 변환 훅에 노출되는 바인딩 모음이다.
///
/// `result` 또는 `body`, `saved_results`를 담고 `expr(...)`로 결과 저장소를 조회할 수 있다.
pub struct Namespace<'a> {
    /// 바인딩 이름별 값. 항상 `Value::Object`이다.
    root: Value,
    /// 읽기 전용 결과 저장소.
    store: &'a ResultStore,
}

impl<'a> Namespace<'a> {
    /// 호출 후 변환용 네임스페이스(`result`, `saved_results`)를 만든다.
    pub fn for_result(result: Value, store: &'a ResultStore) -> Self {
        Self::with_binding("result", result, store)
    }

    /// 호출 전 변환용 네임스페이스(`body`, `saved_results`)를 만든다.
    pub fn for_body(body: Value, store: &'a ResultStore) -> Self {
        Self::with_binding("body", body, store)
    }

    fn with_binding(name: &str, value: Value, store: &'a ResultStore) -> Self {
        let mut map = Map::new();
        map.insert(name.to_string(), value);
        map.insert("saved_results".to_string(), store.as_value().clone());
        Self {
            root: Value::Object(map),
            store,
        }
    }

    /// 바인딩 값을 조회한다.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.root.get(name)
    }

    /// 바인딩 값을 설정한다.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        if let Value::Object(map) = &mut self.root {
            map.insert(name.into(), value);
        }
    }

    /// 바인딩을 꺼내 소유권을 가져온다. 없으면 `Null`이다.
    pub fn take(&mut self, name: &str) -> Value {
        match &mut self.root {
            Value::Object(map) => map.shift_remove(name).unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// 결과 저장소에 대해 표현식을 해석한다.
    pub fn expr(&self, raw: &str) -> Result<Value, ResolutionError> {
        expression::resolve(raw, self.store.as_value())
    }

    /// 바인딩 전체에 대해 표현식을 해석한다.
    pub fn resolve(&self, raw: &str) -> Result<Value, ResolutionError> {
        expression::resolve(raw, &self.root)
    }

    fn root_mut(&mut self) -> &mut Value {
        &mut self.root
    }
}

/// 네임스페이스를 변경하는 변환 훅이다.
pub trait TransformHook: Send + Sync {
    /// 네임스페이스를 받아 값을 변환한다.
    fn apply(&self, namespace: &mut Namespace<'_>) -> Result<(), EngineError>;
}

impl<F> TransformHook for F
where
    F: Fn(&mut Namespace<'_>) -> Result<(), EngineError> + Send + Sync,
{
    fn apply(&self, namespace: &mut Namespace<'_>) -> Result<(), EngineError> {
        self(namespace)
    }
}

/// 네임스페이스를 읽어 불리언을 돌려주는 조건 훅이다.
pub trait PredicateHook: Send + Sync {
    /// 조건을 평가한다.
    fn test(&self, namespace: &Namespace<'_>) -> Result<bool, EngineError>;
}

impl<F> PredicateHook for F
where
    F: Fn(&Namespace<'_>) -> Result<bool, EngineError> + Send + Sync,
{
    fn test(&self, namespace: &Namespace<'_>) -> Result<bool, EngineError> {
        self(namespace)
    }
}

/// 이름으로 등록된 변환/조건 훅 테이블이다.
#[derive(Clone, Default)]
pub struct TransformRegistry {
    /// 이름별 변환 훅.
    transforms: HashMap<String, Arc<dyn TransformHook>>,
    /// 이름별 조건 훅.
    predicates: HashMap<String, Arc<dyn PredicateHook>>,
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("transforms", &self.transforms.keys().collect::<Vec<_>>())
            .field("predicates", &self.predicates.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TransformRegistry {
    /// 빈 레지스트리를 생성한다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 변환 훅을 등록한다.
    pub fn register_transform(&mut self, name: impl Into<String>, hook: impl TransformHook + 'static) {
        self.transforms.insert(name.into(), Arc::new(hook));
    }

    /// 조건 훅을 등록한다.
    pub fn register_predicate(&mut self, name: impl Into<String>, hook: impl PredicateHook + 'static) {
        self.predicates.insert(name.into(), Arc::new(hook));
    }

    /// 변환 문장 목록을 순서대로 실행한다.
    pub fn run_statements(
        &self,
        sources: &[String],
        namespace: &mut Namespace<'_>,
    ) -> Result<(), EngineError> {
        for source in sources {
            match self.transforms.get(source.trim()) {
                Some(hook) => hook.apply(namespace)?,
                None => execute_script(source, namespace)?,
            }
        }
        Ok(())
    }

    /// 조건식을 평가한다.
    pub fn evaluate_condition(
        &self,
        source: &str,
        namespace: &Namespace<'_>,
    ) -> Result<bool, EngineError> {
        match self.predicates.get(source.trim()) {
            Some(hook) => hook.test(namespace),
            None => evaluate_condition(source, namespace),
        }
    }
}

/// 값의 참/거짓을 판정한다. `null`, `false`, 0, 빈 문자열/목록/맵은 거짓이다.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn transform_error(message: impl Into<String>) -> EngineError {
    EngineError::Transform(message.into())
}

/// 줄 또는 `;`로 구분된 문장들을 실행한다. `#`로 시작하는 줄은 주석이다.
fn execute_script(source: &str, namespace: &mut Namespace<'_>) -> Result<(), EngineError> {
    for statement in split_statements(source) {
        execute_statement(&statement, namespace)?;
    }
    Ok(())
}

fn split_statements(source: &str) -> Vec<String> {
    let mut statements = Vec::new();
    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut start = 0;
        for index in top_level_positions(line, ';') {
            statements.push(line[start..index].trim().to_string());
            start = index + 1;
        }
        statements.push(line[start..].trim().to_string());
    }
    statements.retain(|statement| !statement.is_empty());
    statements
}

fn execute_statement(statement: &str, namespace: &mut Namespace<'_>) -> Result<(), EngineError> {
    if let Some(target) = statement.strip_prefix("del ") {
        let segments = parse_target(target.trim())?;
        return remove_path(namespace.root_mut(), &segments)
            .ok_or_else(|| transform_error(format!("삭제할 경로가 없습니다: {target}")));
    }
    let index = find_assignment(statement)
        .ok_or_else(|| transform_error(format!("지원하지 않는 문장입니다: {statement}")))?;
    let segments = parse_target(statement[..index].trim())?;
    let value = evaluate_operand(statement[index + 1..].trim(), namespace)?;
    assign_path(namespace.root_mut(), &segments, value)
}

/// 조건식을 평가한다.
fn evaluate_condition(source: &str, namespace: &Namespace<'_>) -> Result<bool, EngineError> {
    let source = source.trim();
    if let Some(rest) = source.strip_prefix("not ") {
        return evaluate_condition(rest, namespace).map(|result| !result);
    }
    let Some((index, operator)) = find_comparison(source) else {
        return evaluate_operand(source, namespace).map(|value| is_truthy(&value));
    };
    let left = evaluate_operand(source[..index].trim(), namespace)?;
    let right = evaluate_operand(source[index + operator.len()..].trim(), namespace)?;
    match operator {
        "==" => Ok(loosely_equal(&left, &right)),
        "!=" => Ok(!loosely_equal(&left, &right)),
        _ => {
            let ordering = compare_values(&left, &right).ok_or_else(|| {
                transform_error(format!("비교할 수 없는 값입니다: {left} {operator} {right}"))
            })?;
            Ok(match operator {
                "<" => ordering == Ordering::Less,
                "<=" => ordering != Ordering::Greater,
                ">" => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
    }
}

fn loosely_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn evaluate_operand(text: &str, namespace: &Namespace<'_>) -> Result<Value, EngineError> {
    let text = text.trim();
    if is_expression(text) {
        return Ok(namespace.resolve(text)?);
    }
    if let Some(inner) = call_argument(text, "expr") {
        let path = unquote(inner).unwrap_or(inner);
        return Ok(namespace.expr(path)?);
    }
    if let Some(inner) = call_argument(text, "len") {
        let value = evaluate_operand(inner, namespace)?;
        let length = match &value {
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            Value::String(s) => s.chars().count(),
            other => return Err(transform_error(format!("길이를 잴 수 없는 값입니다: {other}"))),
        };
        return Ok(Value::from(length));
    }
    if let Some(inner) = text.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')) {
        return Ok(Value::String(inner.to_string()));
    }
    serde_json::from_str(text)
        .map_err(|_| transform_error(format!("피연산자를 해석할 수 없습니다: {text}")))
}

fn call_argument<'t>(text: &'t str, name: &str) -> Option<&'t str> {
    text.strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
        .map(str::trim)
}

fn unquote(text: &str) -> Option<&str> {
    text.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .or_else(|| text.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')))
}

/// 대입 대상 경로의 한 단계이다.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// `result.items[0]["my-key"]` 형태의 대상 경로를 해석한다.
fn parse_target(target: &str) -> Result<Vec<Segment>, EngineError> {
    let invalid = || transform_error(format!("대상 경로가 잘못되었습니다: {target}"));
    let mut segments = Vec::new();
    let mut rest = target;
    let head_end = rest.find(['.', '[']).unwrap_or(rest.len());
    let head = &rest[..head_end];
    if head.is_empty() {
        return Err(invalid());
    }
    segments.push(Segment::Key(head.to_string()));
    rest = &rest[head_end..];
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let end = after.find(['.', '[']).unwrap_or(after.len());
            if end == 0 {
                return Err(invalid());
            }
            segments.push(Segment::Key(after[..end].to_string()));
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let end = after.find(']').ok_or_else(invalid)?;
            let inner = after[..end].trim();
            let segment = match unquote(inner) {
                Some(key) => Segment::Key(key.to_string()),
                None => Segment::Index(inner.parse().map_err(|_| invalid())?),
            };
            segments.push(segment);
            rest = &after[end + 1..];
        } else {
            return Err(invalid());
        }
    }
    Ok(segments)
}

fn assign_path(root: &mut Value, segments: &[Segment], value: Value) -> Result<(), EngineError> {
    let Some((last, parents)) = segments.split_last() else {
        return Err(transform_error("대상 경로가 비어 있습니다."));
    };
    let mut current = root;
    for segment in parents {
        current = match segment {
            Segment::Key(key) => {
                if current.is_null() {
                    *current = Value::Object(Map::new());
                }
                current
                    .as_object_mut()
                    .ok_or_else(|| transform_error(format!("{key} 상위 값이 맵이 아닙니다.")))?
                    .entry(key.clone())
                    .or_insert(Value::Null)
            }
            Segment::Index(index) => current
                .as_array_mut()
                .and_then(|items| items.get_mut(*index))
                .ok_or_else(|| transform_error(format!("인덱스 {index}가 범위를 벗어났습니다.")))?,
        };
    }
    match last {
        Segment::Key(key) => {
            if current.is_null() {
                *current = Value::Object(Map::new());
            }
            current
                .as_object_mut()
                .ok_or_else(|| transform_error(format!("{key} 상위 값이 맵이 아닙니다.")))?
                .insert(key.clone(), value);
        }
        Segment::Index(index) => {
            let items = current
                .as_array_mut()
                .ok_or_else(|| transform_error("인덱스 대상이 목록이 아닙니다."))?;
            if *index == items.len() {
                items.push(value);
            } else {
                let slot = items
                    .get_mut(*index)
                    .ok_or_else(|| transform_error(format!("인덱스 {index}가 범위를 벗어났습니다.")))?;
                *slot = value;
            }
        }
    }
    Ok(())
}

fn remove_path(root: &mut Value, segments: &[Segment]) -> Option<()> {
    let (last, parents) = segments.split_last()?;
    let mut current = root;
    for segment in parents {
        current = match segment {
            Segment::Key(key) => current.get_mut(key.as_str())?,
            Segment::Index(index) => current.get_mut(*index)?,
        };
    }
    match last {
        Segment::Key(key) => current.as_object_mut()?.shift_remove(key).map(|_| ()),
        Segment::Index(index) => {
            let items = current.as_array_mut()?;
            (*index < items.len()).then(|| {
                items.remove(*index);
            })
        }
    }
}

/// 따옴표와 괄호 밖에 있는 문자 위치를 찾는다.
fn top_level_positions(text: &str, needle: char) -> Vec<usize> {
    let mut positions = Vec::new();
    scan_top_level(text, |index, rest| {
        if rest.starts_with(needle) {
            positions.push(index);
        }
        false
    });
    positions
}

/// 최상위 수준의 비교 연산자를 찾는다.
fn find_comparison(text: &str) -> Option<(usize, &'static str)> {
    const OPERATORS: [&str; 6] = ["==", "!=", "<=", ">=", "<", ">"];
    let mut found = None;
    scan_top_level(text, |index, rest| {
        match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            Some(op) => {
                found = Some((index, *op));
                true
            }
            None => false,
        }
    });
    found
}

/// 최상위 수준의 대입 `=` 위치를 찾는다.
fn find_assignment(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut found = None;
    scan_top_level(text, |index, rest| {
        if !rest.starts_with('=') || rest.starts_with("==") {
            return false;
        }
        let previous = index.checked_sub(1).and_then(|i| bytes.get(i)).copied();
        if matches!(previous, Some(b'!' | b'<' | b'>' | b'=')) {
            return false;
        }
        found = Some(index);
        true
    });
    found
}

/// 괄호 깊이와 따옴표를 추적하며 최상위 위치마다 `visit`를 호출한다. `true`를 반환하면 멈춘다.
fn scan_top_level(text: &str, mut visit: impl FnMut(usize, &str) -> bool) {
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    for (index, ch) in text.char_indices() {
        if let Some(open) = quote {
            if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => {
                if visit(index, &text[index..]) {
                    return;
                }
            }
            _ => {}
        }
    }
}
