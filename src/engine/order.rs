use super::assertion::CheckReport;
use super::expression::display_value;
use crate::error::EngineError;
use serde_json::Value;
use std::cmp::Ordering;

/// 정렬 방향이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    /// 오름차순.
    Asc,
    /// 내림차순.
    Desc,
}

impl OrderDirection {
    /// `asc`/`desc` 문자열을 해석한다. 그 외의 값은 구성 오류이다.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        match raw.trim() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(EngineError::config(format!(
                "정렬 방향 \"{other}\"이(가) 잘못되었습니다. \"asc\" 또는 \"desc\"여야 합니다."
            ))),
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Asc => "<=",
            Self::Desc => ">=",
        }
    }
}

/// 두 JSON 값을 비교한다. 숫자끼리, 문자열끼리, 불리언끼리, 목록끼리만 비교할 수 있다.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b) {
                match compare_values(x, y)? {
                    Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(a.len().cmp(&b.len()))
        }
        _ => None,
    }
}

/// 여러 기준의 정렬 순서를 검증한다.
///
/// `values[0]`은 첫 번째 기준으로 추출한 값 목록이다. 인접한 두 값이 같으면 나머지 기준 전체로
/// 다시 검증하고, 기준이 더 없으면 통과로 본다.
pub fn check_order<D, P>(
    values: &[Vec<Value>],
    directions: &[D],
    paths: &[P],
    report: &mut CheckReport,
) -> Result<bool, EngineError>
where
    D: AsRef<str>,
    P: AsRef<str>,
{
    for direction in directions {
        OrderDirection::parse(direction.as_ref())?;
    }
    let Some(column) = values.first() else {
        return Ok(true);
    };
    let direction = match directions.first() {
        Some(direction) => OrderDirection::parse(direction.as_ref())?,
        None => return Err(EngineError::config("정렬 기준마다 방향이 필요합니다.")),
    };
    let path = paths.first().map_or("$", |path| path.as_ref());

    let mut passed = true;
    // 다음 기준의 검증 결과는 같은 값이 처음 나왔을 때 한 번만 계산한다.
    let mut next_criteria: Option<bool> = None;
    for pair in column.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        match compare_values(previous, current) {
            None => {
                passed &= report.verify(
                    false,
                    path,
                    format!(
                        "결과 \"{path}\"의 값 {}와(과) {}은(는) 비교할 수 없습니다.",
                        display_value(previous),
                        display_value(current)
                    ),
                )?;
            }
            Some(Ordering::Equal) => {
                let next = match next_criteria {
                    Some(next) => next,
                    None => {
                        let next = check_order(
                            &values[1..],
                            &directions[1..],
                            paths.get(1..).unwrap_or(&[]),
                            report,
                        )?;
                        next_criteria = Some(next);
                        next
                    }
                };
                passed &= next;
            }
            Some(ordering) => {
                let sorted = match direction {
                    OrderDirection::Asc => ordering == Ordering::Less,
                    OrderDirection::Desc => ordering == Ordering::Greater,
                };
                passed &= report.verify(
                    sorted,
                    path,
                    format!(
                        "결과 \"{path}\"가 기대한 순서로 정렬되어 있지 않습니다. {} {} {}이(가) 거짓입니다.",
                        display_value(previous),
                        direction.symbol(),
                        display_value(current)
                    ),
                )?;
            }
        }
    }
    report.status(path, passed);
    Ok(passed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(values: Vec<Vec<Value>>, directions: &[&str]) -> bool {
        let paths = vec!["$.key"; values.len()];
        let mut report = CheckReport::new(false);
        check_order(&values, directions, &paths, &mut report).expect("정렬 검증 실패")
    }

    #[test]
    fn ascending_sequence_with_ties_passes() {
        assert!(run(vec![vec![json!(1), json!(1), json!(2)]], &["asc"]));
    }

    #[test]
    fn descending_pair_fails_ascending_check() {
        assert!(!run(vec![vec![json!(2), json!(1)]], &["asc"]));
        assert!(run(vec![vec![json!(2), json!(1)]], &["desc"]));
    }

    #[test]
    fn tie_break_criterion_alone_decides_the_tied_pair() {
        let primary = vec![json!("a"), json!("a")];
        assert!(run(vec![primary.clone(), vec![json!(3), json!(5)]], &["asc", "asc"]));
        assert!(!run(vec![primary.clone(), vec![json!(5), json!(3)]], &["asc", "asc"]));
        assert!(run(vec![primary, vec![json!(5), json!(3)]], &["asc", "desc"]));
    }

    #[test]
    fn tie_break_checks_the_whole_next_criterion() {
        let primary = vec![json!(1), json!(2), json!(2)];
        let secondary = vec![json!(9), json!(1), json!(2)];
        assert!(!run(vec![primary.clone(), secondary], &["asc", "asc"]));
        assert!(run(vec![primary, vec![json!(1), json!(2), json!(3)]], &["asc", "asc"]));
    }

    #[test]
    fn unsorted_secondary_is_ignored_without_ties() {
        let primary = vec![json!(1), json!(2), json!(3)];
        assert!(run(vec![primary, vec![json!(9), json!(1), json!(2)]], &["asc", "asc"]));
    }

    #[test]
    fn exhausted_criteria_with_ties_are_not_a_failure() {
        assert!(run(vec![vec![json!(1), json!(1)], vec![json!("x"), json!("x")]], &["asc", "asc"]));
    }

    #[test]
    fn invalid_direction_is_a_configuration_error() {
        let mut report = CheckReport::new(false);
        let err = check_order(&[vec![json!(1)]], &["up"], &["$"], &mut report).expect_err("잘못된 방향");
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn incomparable_types_fail() {
        assert!(!run(vec![vec![json!(1), json!("1")]], &["asc"]));
    }

    #[test]
    fn failures_are_recorded_with_path() {
        let mut report = CheckReport::new(false);
        let passed = check_order(&[vec![json!(3), json!(1)]], &["asc"], &["$.items[*].rank"], &mut report)
            .expect("정렬 검증 실패");
        assert!(!passed);
        assert!(report.has_failures());
        assert!(report.failures().any(|(path, _)| path == "$.items[*].rank"));
    }
}
