use anyhow::Context;
use serde_json::{Map, Number, Value};
use serde_yaml::Value as Yaml;

/// YAML 값을 JSON 값으로 변환한다.
///
/// `!expr path`는 `"{{path}}"` 표현식 문자열로, `!json '<text>'`는 파싱된 JSON 값으로 바뀐다.
/// 알 수 없는 태그는 무시하고 내부 값만 사용한다.
pub fn yaml_to_json(value: Yaml) -> anyhow::Result<Value> {
    match value {
        Yaml::Null => Ok(Value::Null),
        Yaml::Bool(flag) => Ok(Value::Bool(flag)),
        Yaml::Number(number) => convert_number(&number),
        Yaml::String(text) => Ok(Value::String(text)),
        Yaml::Sequence(items) => items
            .into_iter()
            .map(yaml_to_json)
            .collect::<anyhow::Result<Vec<_>>>()
            .map(Value::Array),
        Yaml::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, item) in mapping {
                map.insert(mapping_key(key)?, yaml_to_json(item)?);
            }
            Ok(Value::Object(map))
        }
        Yaml::Tagged(tagged) => {
            let tagged = *tagged;
            if tagged.tag == "expr" {
                let text = scalar_text(tagged.value).context("!expr 태그에는 문자열이 필요합니다.")?;
                Ok(Value::String(format!("{{{{{text}}}}}")))
            } else if tagged.tag == "json" {
                let text = scalar_text(tagged.value).context("!json 태그에는 문자열이 필요합니다.")?;
                serde_json::from_str(&text)
                    .with_context(|| format!("!json 값을 파싱할 수 없습니다: {text}"))
            } else {
                yaml_to_json(tagged.value)
            }
        }
    }
}

fn convert_number(number: &serde_yaml::Number) -> anyhow::Result<Value> {
    if let Some(value) = number.as_i64() {
        return Ok(Value::Number(value.into()));
    }
    if let Some(value) = number.as_u64() {
        return Ok(Value::Number(value.into()));
    }
    number
        .as_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| anyhow::anyhow!("JSON으로 표현할 수 없는 숫자입니다: {number}"))
}

fn mapping_key(key: Yaml) -> anyhow::Result<String> {
    match key {
        Yaml::String(text) => Ok(text),
        Yaml::Bool(flag) => Ok(flag.to_string()),
        Yaml::Number(number) => Ok(number.to_string()),
        Yaml::Null => Ok("null".to_string()),
        other => anyhow::bail!("맵 키는 스칼라여야 합니다: {other:?}"),
    }
}

fn scalar_text(value: Yaml) -> anyhow::Result<String> {
    match value {
        Yaml::String(text) => Ok(text),
        Yaml::Number(number) => Ok(number.to_string()),
        Yaml::Bool(flag) => Ok(flag.to_string()),
        other => anyhow::bail!("스칼라 값이 아닙니다: {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn convert(text: &str) -> Value {
        let raw: Yaml = serde_yaml::from_str(text).expect("YAML 파싱 실패");
        yaml_to_json(raw).expect("변환 실패")
    }

    #[test]
    fn expr_tag_wraps_expression_delimiters() {
        let value = convert("fileId: !expr created.id\n");
        assert_eq!(value, json!({"fileId": "{{created.id}}"}));
    }

    #[test]
    fn json_tag_parses_inline_document() {
        let value = convert("body: !json '{\"title\": \"a\", \"tags\": [1, 2]}'\n");
        assert_eq!(value, json!({"body": {"title": "a", "tags": [1, 2]}}));
    }

    #[test]
    fn scalar_keys_are_stringified_and_order_is_kept() {
        let value = convert("b: 1\na: 2\n200: ok\n");
        let keys: Vec<&String> = value.as_object().expect("맵").keys().collect();
        assert_eq!(keys, vec!["b", "a", "200"]);
    }

    #[test]
    fn complex_keys_are_rejected() {
        let raw: Yaml = serde_yaml::from_str("? [a, b]\n: 1\n").expect("YAML 파싱 실패");
        assert!(yaml_to_json(raw).is_err());
    }
}
