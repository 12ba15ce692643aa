//! 기대 패턴 트리와 실제 결과를 비교하는 검증 엔진.
//!
//! 패턴 어휘:
//! - `nil`: 키가 없어야 한다.
//! - 스칼라: 문자열로 바꿔 완전히 같아야 한다. `#r#`로 시작하면 앞부분이 고정된 정규식이다.
//! - 맵: 키별로 재귀 비교한다.
//! - 목록: 첫 요소가 `#...#` 연산자이고 나머지가 연산자의 인자이다.

use super::expression::display_value;
use crate::error::EngineError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static OPERATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#(.*)#$").expect("정규식 컴파일 실패"));
static CARDINALITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(=|>=|<=|>|<)([0-9]+)$").expect("정규식 컴파일 실패"));

const ABSENT: &str = "nil";
const REGEX_PREFIX: &str = "#r#";

/// 경로별 검증 기록이다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckRecord {
    /// 경로 하나의 최종 판정.
    Status { path: String, passed: bool },
    /// 실패 사유.
    Failure { path: String, message: String },
}

/// 검증 기록을 모으고 엄격 모드에서 첫 실패를 오류로 바꾼다.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    /// 첫 실패에서 중단할지 여부(`exit_on_error`).
    strict: bool,
    /// 기록 순서대로의 검증 결과.
    records: Vec<CheckRecord>,
}

impl CheckReport {
    /// 새 기록기를 생성한다.
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            records: Vec::new(),
        }
    }

    /// 조건을 검사하고 실패하면 사유를 기록한다. 엄격 모드에서는 오류를 반환한다.
    pub fn verify(
        &mut self,
        condition: bool,
        path: &str,
        message: impl Into<String>,
    ) -> Result<bool, EngineError> {
        if condition {
            return Ok(true);
        }
        let message = message.into();
        self.records.push(CheckRecord::Failure {
            path: path.to_string(),
            message: message.clone(),
        });
        if self.strict {
            self.status(path, false);
            return Err(EngineError::Assertion {
                path: path.to_string(),
                message,
            });
        }
        Ok(false)
    }

    /// 경로의 최종 판정을 기록한다.
    pub fn status(&mut self, path: &str, passed: bool) {
        self.records.push(CheckRecord::Status {
            path: path.to_string(),
            passed,
        });
    }

    /// 기록된 실패가 있는지 확인한다.
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// 실패 사유를 `(경로, 메시지)`로 순회한다.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.records.iter().filter_map(|record| match record {
            CheckRecord::Failure { path, message } => Some((path.as_str(), message.as_str())),
            CheckRecord::Status { .. } => None,
        })
    }

    /// 기록을 꺼내고 비운다.
    pub fn take_records(&mut self) -> Vec<CheckRecord> {
        std::mem::take(&mut self.records)
    }
}

/// 목록 패턴의 연산자이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListOperator {
    /// `#*#`
    Anything,
    /// `#+#`
    NonEmpty,
    /// `#=N#`, `#>=N#`, `#<=N#`, `#>N#`, `#<N#`
    Count(Cardinality, usize),
    /// `#PATTERN#`
    EveryItem,
    /// `#ALL#`
    All,
    /// `#ANY#`
    Any,
    /// `#MATCH#`
    Match,
    /// `#MATCH_ANY#`
    MatchAny,
    /// `#NOT_ALL#`
    NotAll,
    /// `#NOT_MATCH#`
    NotMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cardinality {
    Exactly,
    AtLeast,
    AtMost,
    MoreThan,
    LessThan,
}

impl Cardinality {
    fn holds(self, actual: usize, expected: usize) -> bool {
        match self {
            Self::Exactly => actual == expected,
            Self::AtLeast => actual >= expected,
            Self::AtMost => actual <= expected,
            Self::MoreThan => actual > expected,
            Self::LessThan => actual < expected,
        }
    }

    fn describe(self, expected: usize) -> String {
        match self {
            Self::Exactly => format!("{expected}개"),
            Self::AtLeast => format!("최소 {expected}개"),
            Self::AtMost => format!("최대 {expected}개"),
            Self::MoreThan => format!("{expected}개 초과"),
            Self::LessThan => format!("{expected}개 미만"),
        }
    }
}

impl ListOperator {
    fn parse(sentinel: &Value) -> Option<Self> {
        let text = sentinel.as_str()?;
        let name = OPERATOR.captures(text)?.get(1)?.as_str();
        let operator = match name {
            "*" => Self::Anything,
            "+" => Self::NonEmpty,
            "PATTERN" => Self::EveryItem,
            "ALL" => Self::All,
            "ANY" => Self::Any,
            "MATCH" => Self::Match,
            "MATCH_ANY" => Self::MatchAny,
            "NOT_ALL" => Self::NotAll,
            "NOT_MATCH" => Self::NotMatch,
            other => {
                let caps = CARDINALITY.captures(other)?;
                let cardinality = match caps.get(1)?.as_str() {
                    "=" => Cardinality::Exactly,
                    ">=" => Cardinality::AtLeast,
                    "<=" => Cardinality::AtMost,
                    ">" => Cardinality::MoreThan,
                    _ => Cardinality::LessThan,
                };
                Self::Count(cardinality, caps.get(2)?.as_str().parse().ok()?)
            }
        };
        Some(operator)
    }
}

/// 결과를 기대 패턴과 비교하는 검증기이다.
#[derive(Debug, Clone, Default)]
pub struct JsonChecker {
    /// 판정과 실패 사유 기록.
    report: CheckReport,
}

impl JsonChecker {
    /// 검증기를 생성한다. `strict`이면 첫 실패에서 오류를 반환한다.
    pub fn new(strict: bool) -> Self {
        Self {
            report: CheckReport::new(strict),
        }
    }

    /// 누적된 기록을 반환한다.
    pub fn report(&self) -> &CheckReport {
        &self.report
    }

    /// 기록기를 꺼낸다.
    pub fn into_report(self) -> CheckReport {
        self.report
    }

    /// 결과 전체를 패턴과 비교한다. 모든 경로가 통과하면 `true`이다.
    pub fn check(&mut self, result: &Value, pattern: &Value) -> Result<bool, EngineError> {
        self.check_at(result, pattern, "$", false)
    }

    /// 출력과 오류 없이 일치 여부만 판정한다. 후보 대입 검사에 사용한다.
    fn fits(&mut self, result: &Value, pattern: &Value, path: &str) -> Result<bool, EngineError> {
        self.check_at(result, pattern, path, true)
    }

    fn check_at(
        &mut self,
        result: &Value,
        pattern: &Value,
        path: &str,
        quiet: bool,
    ) -> Result<bool, EngineError> {
        let (result, pattern) = wrap_root(result, pattern);
        let mut all_passed = true;
        for (key, expected) in pattern.iter() {
            let key_path = if key.is_empty() {
                path.to_string()
            } else {
                format!("{path}.{key}")
            };
            let actual = result.as_ref().and_then(|map| map.get(key));
            let passed = if expected.as_str() == Some(ABSENT) {
                self.expect(
                    actual.is_none(),
                    &key_path,
                    quiet,
                    format!("결과에 경로가 없어야 합니다: {key_path}"),
                )?
            } else if let Some(actual) = actual {
                self.compare(actual, expected, &key_path, quiet)?
            } else {
                self.expect(
                    false,
                    &key_path,
                    quiet,
                    format!("결과에 경로가 없습니다: {key_path}"),
                )?
            };
            if quiet {
                if !passed {
                    return Ok(false);
                }
            } else {
                self.report.status(&key_path, passed);
            }
            all_passed &= passed;
        }
        Ok(all_passed)
    }

    fn compare(
        &mut self,
        actual: &Value,
        expected: &Value,
        path: &str,
        quiet: bool,
    ) -> Result<bool, EngineError> {
        match expected {
            Value::Object(_) => self.check_at(actual, expected, path, quiet),
            Value::Array(items) => self.check_list(actual, items, path, quiet),
            scalar => self.compare_scalar(actual, scalar, path, quiet),
        }
    }

    fn compare_scalar(
        &mut self,
        actual: &Value,
        expected: &Value,
        path: &str,
        quiet: bool,
    ) -> Result<bool, EngineError> {
        let actual = display_value(actual);
        let expected = display_value(expected);
        if let Some(source) = expected.strip_prefix(REGEX_PREFIX) {
            let regex = Regex::new(&format!("^(?:{source})")).map_err(|err| {
                EngineError::config(format!("정규식 \"{source}\"이(가) 잘못되었습니다: {err}"))
            })?;
            return self.expect(
                regex.is_match(&actual),
                path,
                quiet,
                format!("결과 \"{actual}\"이(가) 정규식 \"{source}\"와(과) 일치하지 않습니다.\n* PATH : {path}"),
            );
        }
        self.expect(
            actual == expected,
            path,
            quiet,
            format!("결과 \"{actual}\"이(가) \"{expected}\"와(과) 일치하지 않습니다.\n* PATH : {path}"),
        )
    }

    fn check_list(
        &mut self,
        actual: &Value,
        pattern: &[Value],
        path: &str,
        quiet: bool,
    ) -> Result<bool, EngineError> {
        let Some(items) = actual.as_array() else {
            return self.expect(
                false,
                path,
                quiet,
                format!("경로 \"{path}\"의 결과가 목록이 아닙니다."),
            );
        };
        let Some(sentinel) = pattern.first() else {
            return self.expect(
                items.is_empty(),
                path,
                quiet,
                format!(
                    "경로 \"{path}\"의 결과가 비어 있지 않습니다 ({}개 항목).",
                    items.len()
                ),
            );
        };
        let Some(operator) = ListOperator::parse(sentinel) else {
            return self.expect(
                false,
                path,
                quiet,
                format!(
                    "기대 목록의 첫 요소는 #으로 감싼 연산자여야 합니다. 입력값: {}",
                    display_value(sentinel)
                ),
            );
        };
        let payload = &pattern[1..];

        match operator {
            ListOperator::Anything => Ok(true),
            ListOperator::NonEmpty => self.expect(
                !items.is_empty(),
                path,
                quiet,
                format!("경로 \"{path}\"의 결과가 비어 있습니다."),
            ),
            ListOperator::Count(cardinality, expected) => self.expect(
                cardinality.holds(items.len(), expected),
                path,
                quiet,
                format!(
                    "경로 \"{path}\"의 결과 수가 기대와 다릅니다 ({}개, 기대: {}).",
                    items.len(),
                    cardinality.describe(expected)
                ),
            ),
            ListOperator::EveryItem => self.check_every_item(items, payload, path, quiet),
            ListOperator::All => self.check_all(items, payload, path, quiet),
            ListOperator::Any => self.check_any(items, payload, path, quiet),
            ListOperator::Match => self.check_match(items, payload, path, quiet),
            ListOperator::MatchAny => self.check_match_any(items, payload, path, quiet),
            ListOperator::NotAll => {
                let mut passed = true;
                for unexpected in payload {
                    passed &= self.expect(
                        !items.contains(unexpected),
                        path,
                        quiet,
                        format!(
                            "경로 \"{path}\"의 결과에 예상하지 않은 항목 {}이(가) 있습니다.",
                            display_value(unexpected)
                        ),
                    )?;
                    if quiet && !passed {
                        break;
                    }
                }
                Ok(passed)
            }
            ListOperator::NotMatch => self.check_not_match(items, payload, path, quiet),
        }
    }

    fn check_every_item(
        &mut self,
        items: &[Value],
        payload: &[Value],
        path: &str,
        quiet: bool,
    ) -> Result<bool, EngineError> {
        let [item_pattern] = payload else {
            return self.expect(
                false,
                path,
                quiet,
                format!("#PATTERN# 연산자에는 패턴이 정확히 하나 필요합니다 ({}개).", payload.len()),
            );
        };
        let mut passed = self.expect(
            !items.is_empty(),
            path,
            quiet,
            format!("경로 \"{path}\"의 결과가 비어 있습니다."),
        )?;
        for (index, item) in items.iter().enumerate() {
            if quiet && !passed {
                break;
            }
            passed &= self.check_at(item, item_pattern, &item_path(path, index), quiet)?;
        }
        Ok(passed)
    }

    /// 기대 항목을 뒤에서부터 하나씩 꺼내 아직 남은 결과 항목 중 처음 맞는 것과 짝짓는다.
    fn check_all(
        &mut self,
        items: &[Value],
        payload: &[Value],
        path: &str,
        quiet: bool,
    ) -> Result<bool, EngineError> {
        let count_ok = self.expect(
            items.len() == payload.len(),
            path,
            quiet,
            count_mismatch(path, items.len(), payload.len()),
        )?;
        if quiet && !count_ok {
            return Ok(false);
        }
        let mut remaining: Vec<usize> = (0..items.len()).collect();
        let mut candidates = payload.to_vec();
        for _ in 0..items.len() {
            let Some(expected) = candidates.pop() else {
                break;
            };
            let mut claimed = None;
            for (position, &index) in remaining.iter().enumerate() {
                if self.fits(&items[index], &expected, &item_path(path, index))? {
                    claimed = Some(position);
                    break;
                }
            }
            if let Some(position) = claimed {
                remaining.remove(position);
            }
        }
        let matched = self.expect(
            remaining.is_empty(),
            path,
            quiet,
            format!(
                "경로 \"{path}\"의 결과가 기대와 다릅니다. 짝이 없는 결과 항목: {}",
                index_list(&remaining)
            ),
        )?;
        Ok(count_ok && matched)
    }

    fn check_any(
        &mut self,
        items: &[Value],
        payload: &[Value],
        path: &str,
        quiet: bool,
    ) -> Result<bool, EngineError> {
        let [expected] = payload else {
            return self.expect(
                false,
                path,
                quiet,
                format!("#ANY# 연산자에는 항목이 정확히 하나 필요합니다 ({}개).", payload.len()),
            );
        };
        self.expect(
            items.contains(expected),
            path,
            quiet,
            format!(
                "경로 \"{path}\"의 결과에 {}와(과) 같은 항목이 없습니다.",
                display_value(expected)
            ),
        )
    }

    /// 결과 항목을 앞에서부터 순서대로, 아직 남은 기대 항목 중 처음 맞는 것과 짝짓는다.
    fn check_match(
        &mut self,
        items: &[Value],
        payload: &[Value],
        path: &str,
        quiet: bool,
    ) -> Result<bool, EngineError> {
        let count_ok = self.expect(
            items.len() == payload.len(),
            path,
            quiet,
            count_mismatch(path, items.len(), payload.len()),
        )?;
        if quiet && !count_ok {
            return Ok(false);
        }
        let mut available: Vec<usize> = (0..payload.len()).collect();
        for item in items {
            let mut claimed = None;
            for (position, &index) in available.iter().enumerate() {
                if self.fits(item, &payload[index], &item_path(path, index))? {
                    claimed = Some(position);
                    break;
                }
            }
            if let Some(position) = claimed {
                available.remove(position);
            }
        }
        let matched = self.expect(
            available.is_empty(),
            path,
            quiet,
            format!(
                "경로 \"{path}\"의 결과가 기대와 다릅니다. 짝이 없는 기대 항목: {}",
                index_list(&available)
            ),
        )?;
        Ok(count_ok && matched)
    }

    /// 기대 항목마다 아직 차지되지 않은 결과 항목 하나를 찾아 차지한다.
    fn check_match_any(
        &mut self,
        items: &[Value],
        payload: &[Value],
        path: &str,
        quiet: bool,
    ) -> Result<bool, EngineError> {
        let non_empty = self.expect(
            !items.is_empty(),
            path,
            quiet,
            format!("경로 \"{path}\"에 결과가 없습니다. 최소 하나가 필요합니다."),
        )?;
        if quiet && !non_empty {
            return Ok(false);
        }
        let mut claimed = vec![false; items.len()];
        let mut matching = 0;
        for expected in payload {
            for (index, item) in items.iter().enumerate() {
                if claimed[index] {
                    continue;
                }
                if self.fits(item, expected, &item_path(path, index))? {
                    claimed[index] = true;
                    matching += 1;
                    break;
                }
            }
        }
        let matched = self.expect(
            matching == payload.len(),
            path,
            quiet,
            format!(
                "경로 \"{path}\"의 결과가 기대와 다릅니다 ({}개 중 {matching}개 일치).",
                payload.len()
            ),
        )?;
        Ok(non_empty && matched)
    }

    fn check_not_match(
        &mut self,
        items: &[Value],
        payload: &[Value],
        path: &str,
        quiet: bool,
    ) -> Result<bool, EngineError> {
        let mut passed = true;
        for (index, item) in items.iter().enumerate() {
            for unexpected in payload {
                let current = item_path(path, index);
                let hit = self.fits(item, unexpected, &current)?;
                passed &= self.expect(
                    !hit,
                    path,
                    quiet,
                    format!(
                        "결과 \"{current}\"이(가) 예상하지 않은 패턴 {unexpected}와(과) 일치합니다."
                    ),
                )?;
                if quiet && !passed {
                    return Ok(false);
                }
            }
        }
        Ok(passed)
    }

    fn expect(
        &mut self,
        condition: bool,
        path: &str,
        quiet: bool,
        message: String,
    ) -> Result<bool, EngineError> {
        if quiet {
            return Ok(condition);
        }
        self.report.verify(condition, path, message)
    }
}

/// 맵이 아닌 패턴은 `{"": pattern}`으로, 결과도 같은 방식으로 감싼다.
fn wrap_root(result: &Value, pattern: &Value) -> (Option<Map<String, Value>>, Map<String, Value>) {
    match pattern {
        Value::Object(map) => (result.as_object().cloned(), map.clone()),
        other => {
            let mut wrapped_pattern = Map::new();
            wrapped_pattern.insert(String::new(), other.clone());
            let mut wrapped_result = Map::new();
            wrapped_result.insert(String::new(), result.clone());
            (Some(wrapped_result), wrapped_pattern)
        }
    }
}

fn item_path(path: &str, index: usize) -> String {
    format!("{path}[{}]", index + 1)
}

fn index_list(indexes: &[usize]) -> String {
    let labels: Vec<String> = indexes.iter().map(|index| (index + 1).to_string()).collect();
    format!("[{}]", labels.join(", "))
}

fn count_mismatch(path: &str, actual: usize, expected: usize) -> String {
    format!("경로 \"{path}\"의 결과 수가 기대와 다릅니다 ({actual}개, 기대: {expected}개).")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn passes(result: Value, pattern: Value) -> bool {
        JsonChecker::new(false)
            .check(&result, &pattern)
            .expect("검증 실행 실패")
    }

    #[test]
    fn scalar_leaves_compare_as_strings() {
        assert!(passes(json!({"id": 5, "name": "a"}), json!({"id": "5", "name": "a"})));
        assert!(!passes(json!({"id": 5}), json!({"id": 6})));
    }

    #[test]
    fn regex_leaf_is_anchored_at_start() {
        assert!(passes(json!({"id": "file-123"}), json!({"id": "#r#file-[0-9]+"})));
        assert!(!passes(json!({"id": "my-file-123"}), json!({"id": "#r#file-"})));
    }

    #[test]
    fn nil_requires_absence_and_other_keys_require_presence() {
        assert!(passes(json!({"a": 1}), json!({"b": "nil"})));
        assert!(!passes(json!({"a": 1}), json!({"a": "nil"})));
        assert!(!passes(json!({"a": 1}), json!({"b": 1})));
    }

    #[test]
    fn root_scalar_pattern_is_wrapped() {
        assert!(passes(json!("done"), json!("done")));
        assert!(passes(json!(42), json!("#r#4")));
        assert!(!passes(json!("done"), json!("pending")));
    }

    #[test]
    fn nested_mappings_recurse() {
        let result = json!({"owner": {"email": "a@b.c", "role": "admin"}});
        assert!(passes(result.clone(), json!({"owner": {"role": "admin"}})));
        assert!(!passes(result, json!({"owner": {"role": "reader"}})));
    }

    #[test]
    fn cardinality_operators() {
        let result = json!({"items": [1, 2]});
        assert!(passes(result.clone(), json!({"items": ["#=2#"]})));
        assert!(passes(result.clone(), json!({"items": ["#>=2#"]})));
        assert!(passes(result.clone(), json!({"items": ["#<=2#"]})));
        assert!(passes(result.clone(), json!({"items": ["#>1#"]})));
        assert!(passes(result.clone(), json!({"items": ["#<3#"]})));
        assert!(passes(result.clone(), json!({"items": ["#+#"]})));
        assert!(passes(result.clone(), json!({"items": ["#*#"]})));
        assert!(!passes(result.clone(), json!({"items": ["#>2#"]})));
        assert!(!passes(json!({"items": []}), json!({"items": ["#+#"]})));
    }

    #[test]
    fn exact_count_failure_reports_cardinality() {
        for items in [json!([1]), json!([1, 2, 3])] {
            let mut checker = JsonChecker::new(false);
            let passed = checker
                .check(&json!({"items": items}), &json!({"items": ["#=2#"]}))
                .expect("검증 실행 실패");
            assert!(!passed);
            let (path, message) = checker.report().failures().next().expect("실패 기록");
            assert_eq!(path, "$.items");
            assert!(message.contains("결과 수"));
        }
    }

    #[test]
    fn empty_list_pattern_requires_empty_result() {
        assert!(passes(json!({"items": []}), json!({"items": []})));
        assert!(!passes(json!({"items": [1]}), json!({"items": []})));
    }

    #[test]
    fn first_list_element_must_be_an_operator() {
        assert!(!passes(json!({"items": [1]}), json!({"items": [1]})));
        assert!(!passes(json!({"items": [1]}), json!({"items": ["#UNKNOWN#", 1]})));
    }

    #[test]
    fn pattern_operator_checks_every_item() {
        let result = json!({"items": [{"kind": "file", "id": 1}, {"kind": "file", "id": 2}]});
        assert!(passes(result.clone(), json!({"items": ["#PATTERN#", {"kind": "file"}]})));
        assert!(!passes(result, json!({"items": ["#PATTERN#", {"kind": "folder"}]})));
    }

    #[test]
    fn all_accepts_any_permutation() {
        let result = json!({"items": ["a", "b", "c"]});
        for payload in [
            ["a", "b", "c"],
            ["c", "b", "a"],
            ["b", "a", "c"],
            ["b", "c", "a"],
            ["c", "a", "b"],
            ["a", "c", "b"],
        ] {
            let mut pattern = vec![json!("#ALL#")];
            pattern.extend(payload.iter().map(|v| json!(v)));
            assert!(passes(result.clone(), json!({ "items": pattern })), "{payload:?}");
        }
    }

    #[test]
    fn all_fails_when_an_element_is_removed_or_altered() {
        let result = json!({"items": ["a", "b", "c"]});
        assert!(!passes(result.clone(), json!({"items": ["#ALL#", "a", "b"]})));
        assert!(!passes(result.clone(), json!({"items": ["#ALL#", "a", "b", "x"]})));
        assert!(!passes(result, json!({"items": ["#ALL#", "a", "b", "c", "d"]})));
    }

    #[test]
    fn all_reports_unmatched_result_index_and_match_reports_unmatched_payload_index() {
        let result = json!({"items": ["a", "b"]});

        let mut checker = JsonChecker::new(false);
        assert!(!checker
            .check(&result, &json!({"items": ["#ALL#", "x", "a"]}))
            .expect("검증 실행 실패"));
        assert!(checker
            .report()
            .failures()
            .any(|(_, message)| message.contains("결과 항목: [2]")));

        let mut checker = JsonChecker::new(false);
        assert!(!checker
            .check(&result, &json!({"items": ["#MATCH#", "x", "a"]}))
            .expect("검증 실행 실패"));
        assert!(checker
            .report()
            .failures()
            .any(|(_, message)| message.contains("기대 항목: [1]")));
    }

    #[test]
    fn match_uses_structural_sub_patterns() {
        let result = json!({"items": [{"id": 1, "tag": "x"}, {"id": 2, "tag": "y"}]});
        assert!(passes(
            result.clone(),
            json!({"items": ["#MATCH#", {"tag": "y"}, {"tag": "x"}]})
        ));
        assert!(!passes(result, json!({"items": ["#MATCH#", {"tag": "y"}]})));
    }

    #[test]
    fn any_and_not_all_are_dual() {
        let result = json!({"items": [1, 2, 3]});
        for candidate in [json!(1), json!(3), json!(4), json!("1")] {
            let any = passes(result.clone(), json!({"items": ["#ANY#", candidate.clone()]}));
            let not_all = passes(result.clone(), json!({"items": ["#NOT_ALL#", candidate]}));
            assert_ne!(any, not_all);
        }
    }

    #[test]
    fn any_requires_exactly_one_payload_item() {
        assert!(!passes(json!({"items": [1, 2]}), json!({"items": ["#ANY#", 1, 2]})));
    }

    #[test]
    fn match_any_claims_distinct_results() {
        let result = json!({"items": [{"tag": "x"}, {"tag": "y"}, {"tag": "z"}]});
        assert!(passes(
            result.clone(),
            json!({"items": ["#MATCH_ANY#", {"tag": "z"}, {"tag": "x"}]})
        ));
        assert!(!passes(
            json!({"items": [{"tag": "x"}]}),
            json!({"items": ["#MATCH_ANY#", {"tag": "x"}, {"tag": "x"}]})
        ));
        assert!(!passes(json!({"items": []}), json!({"items": ["#MATCH_ANY#", {"tag": "x"}]})));
    }

    #[test]
    fn not_match_rejects_structural_hits() {
        let result = json!({"items": [{"tag": "x"}, {"tag": "y"}]});
        assert!(passes(result.clone(), json!({"items": ["#NOT_MATCH#", {"tag": "z"}]})));
        assert!(!passes(result, json!({"items": ["#NOT_MATCH#", {"tag": "y"}]})));
    }

    #[test]
    fn candidate_checks_do_not_record_anything() {
        let mut checker = JsonChecker::new(false);
        let passed = checker
            .check(&json!({"items": ["a", "b"]}), &json!({"items": ["#ALL#", "b", "a"]}))
            .expect("검증 실행 실패");
        assert!(passed);
        assert_eq!(
            checker.into_report().take_records(),
            vec![CheckRecord::Status {
                path: "$.items".to_string(),
                passed: true
            }]
        );
    }

    #[test]
    fn strict_mode_raises_on_first_failure() {
        let mut checker = JsonChecker::new(true);
        let err = checker
            .check(&json!({"a": 1, "b": 2}), &json!({"a": 2, "b": 3}))
            .expect_err("엄격 모드");
        match err {
            EngineError::Assertion { path, .. } => assert_eq!(path, "$.a"),
            other => panic!("예상하지 못한 오류: {other}"),
        }
    }

    #[test]
    fn non_list_result_against_list_pattern_fails() {
        assert!(!passes(json!({"items": "abc"}), json!({"items": ["#*#"]})));
    }
}
