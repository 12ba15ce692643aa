//! `{{ path }}` 표현식 해석기.
//!
//! 경로는 JSONPath 문법을 따르며 `$`로 시작하지 않으면 루트에서 시작하는 것으로 본다.
//! 해석은 컨테이너를 변경하지 않는 순수 함수이다.

use crate::error::ResolutionError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use serde_json_path::JsonPath;

static WHOLE_EXPRESSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\{\{([^{}]*)\}\}\s*$").expect("정규식 컴파일 실패"));
static EMBEDDED_EXPRESSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("정규식 컴파일 실패"));
static AS_LIST_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?s)(.*?)\s+as\s+list$").expect("정규식 컴파일 실패"));

/// 해석 전의 표현식이다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    /// 구분자와 `as list`를 제거한 경로.
    pub path: String,
    /// 모든 매칭 결과를 목록으로 돌려줄지 여부.
    pub as_list: bool,
}

impl Expression {
    /// `{{ }}` 구분자가 있으면 제거하고 `as list` 접미사를 분리한다.
    pub fn parse(raw: &str) -> Self {
        let inner = WHOLE_EXPRESSION
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .map_or(raw, |m| m.as_str())
            .trim();
        match AS_LIST_SUFFIX.captures(inner) {
            Some(caps) => Self {
                path: caps.get(1).map_or("", |m| m.as_str()).trim().to_string(),
                as_list: true,
            },
            None => Self {
                path: inner.to_string(),
                as_list: false,
            },
        }
    }

    /// 컨테이너에 대해 표현식을 평가한다.
    ///
    /// `as list`이면 전체 매칭 목록을 `Value::Array`로, 아니면 첫 번째 매칭 값을 반환한다.
    pub fn evaluate(&self, container: &Value) -> Result<Value, ResolutionError> {
        let mut matches = query(&self.path, container)?;
        if self.as_list {
            Ok(Value::Array(matches))
        } else {
            Ok(matches.swap_remove(0))
        }
    }
}

/// 문자열 전체가 `{{ ... }}` 형태인지 확인한다.
pub fn is_expression(text: &str) -> bool {
    WHOLE_EXPRESSION.is_match(text)
}

/// 문자열 안에 `{{ ... }}` 조각이 하나라도 있는지 확인한다.
pub fn contains_expression(text: &str) -> bool {
    EMBEDDED_EXPRESSION.is_match(text)
}

/// 표현식을 해석한다. 구분자가 없어도 경로로 간주한다.
pub fn resolve(raw: &str, container: &Value) -> Result<Value, ResolutionError> {
    Expression::parse(raw).evaluate(container)
}

/// `as list` 여부와 무관하게 모든 매칭 값을 목록으로 반환한다.
pub fn resolve_list(raw: &str, container: &Value) -> Result<Vec<Value>, ResolutionError> {
    let expression = Expression::parse(raw);
    query(&expression.path, container)
}

/// 표현식 형태의 문자열만 해석하고 나머지는 그대로 돌려준다.
pub fn eval_expr(text: &str, container: &Value) -> Result<Value, ResolutionError> {
    if is_expression(text) {
        resolve(text, container)
    } else {
        Ok(Value::String(text.to_string()))
    }
}

/// 맵과 목록을 깊이 우선으로 순회하며 표현식 문자열을 해석 값으로 치환한다.
///
/// 문자열 전체가 표현식이면 값의 타입을 유지하고, 일부만 표현식이면 문자열로 끼워 넣는다.
pub fn substitute(value: &Value, container: &Value) -> Result<Value, ResolutionError> {
    match value {
        Value::String(text) if is_expression(text) => resolve(text, container),
        Value::String(text) if contains_expression(text) => {
            interpolate(text, container).map(Value::String)
        }
        Value::Array(items) => items
            .iter()
            .map(|item| substitute(item, container))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut resolved = Map::new();
            for (key, item) in map {
                resolved.insert(key.clone(), substitute(item, container)?);
            }
            Ok(Value::Object(resolved))
        }
        other => Ok(other.clone()),
    }
}

/// 문자열에 포함된 모든 표현식을 해석 값의 문자열 표현으로 바꾼다.
pub fn interpolate(text: &str, container: &Value) -> Result<String, ResolutionError> {
    let mut failure = None;
    let replaced = EMBEDDED_EXPRESSION.replace_all(text, |caps: &Captures| {
        let inner = caps.get(1).map_or("", |m| m.as_str());
        match resolve(inner, container) {
            Ok(value) => display_value(&value),
            Err(err) => {
                failure.get_or_insert(err);
                String::new()
            }
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(replaced.into_owned()),
    }
}

/// 경로 질의를 실행한다. 결과가 없으면 오류이다.
pub fn query(path: &str, container: &Value) -> Result<Vec<Value>, ResolutionError> {
    let normalized = normalize_path(path);
    let compiled = JsonPath::parse(&normalized).map_err(|err| ResolutionError::InvalidQuery {
        expression: path.to_string(),
        reason: err.to_string(),
    })?;
    let matches: Vec<Value> = compiled
        .query(container)
        .all()
        .into_iter()
        .cloned()
        .collect();
    if matches.is_empty() {
        return Err(ResolutionError::NoMatch {
            expression: path.to_string(),
        });
    }
    Ok(matches)
}

/// 값의 표시용 문자열을 만든다. 문자열은 따옴표 없이 그대로 사용한다.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('$') {
        trimmed.to_string()
    } else if trimmed.starts_with('[') || trimmed.starts_with("..") {
        format!("${trimmed}")
    } else {
        format!("$.{trimmed}")
    }
}
