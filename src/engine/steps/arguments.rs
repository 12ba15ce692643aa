use super::super::expression::{is_expression, resolve, substitute};
use super::super::store::ResultStore;
use super::super::transform::{Namespace, TransformRegistry};
use super::directives::CommandSpec;
use crate::error::EngineError;
use crate::scenario::yaml_to_json;
use serde_json::{Map, Value};
use std::path::Path;

/// 호출 직전에 해석된 인자이다.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct ResolvedArguments {
    /// Invoker에 넘길 인자 맵.
    pub args: Map<String, Value>,
    /// `print_body`용 최종 본문.
    pub body: Option<Value>,
}

/// Command 인자를 결과 저장소 기준으로 해석한다.
///
/// `body`는 인라인 맵, 표현식, 파일 참조를 모두 받아 재귀 치환 후 `pre_eval_expr`를 적용한다.
/// 나머지 인자는 문자열, 목록, 맵을 재귀적으로 치환한다.
pub(super) async fn resolve_arguments(
    spec: &CommandSpec,
    store: &ResultStore,
    root: &Path,
    transforms: &TransformRegistry,
) -> Result<ResolvedArguments, EngineError> {
    let mut args = Map::new();
    let mut body = None;
    for (name, raw) in &spec.args {
        if name == "body" {
            let resolved = resolve_body(raw, store, root).await?;
            let resolved = if spec.pre_eval_expr.is_empty() {
                resolved
            } else {
                let mut namespace = Namespace::for_body(resolved, store);
                transforms.run_statements(&spec.pre_eval_expr, &mut namespace)?;
                namespace.take("body")
            };
            body = Some(resolved.clone());
            args.insert(name.clone(), resolved);
        } else {
            args.insert(name.clone(), substitute(raw, store.as_value())?);
        }
    }
    Ok(ResolvedArguments { args, body })
}

async fn resolve_body(raw: &Value, store: &ResultStore, root: &Path) -> Result<Value, EngineError> {
    match raw {
        Value::String(text) if is_expression(text) => Ok(resolve(text, store.as_value())?),
        Value::String(reference) => {
            let document = load_document(&root.join(reference)).await?;
            Ok(substitute(&document, store.as_value())?)
        }
        other => Ok(substitute(other, store.as_value())?),
    }
}

/// JSON 또는 YAML 문서 파일을 읽는다. 파일이 없으면 구성 오류이다.
pub(super) async fn load_document(path: &Path) -> Result<Value, EngineError> {
    if !path.is_file() {
        return Err(EngineError::config(format!(
            "{}이(가) 존재하지 않습니다.",
            path.display()
        )));
    }
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let raw: serde_yaml::Value = serde_yaml::from_str(&text).map_err(|err| {
        EngineError::config(format!("{} 문서를 해석할 수 없습니다: {err}", path.display()))
    })?;
    yaml_to_json(raw).map_err(|err| EngineError::config(format!("{}: {err:#}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn saved() -> ResultStore {
        let mut store = ResultStore::new();
        store.insert("folder", json!({"id": "d-1", "members": ["a", "b"]}));
        store
    }

    #[tokio::test]
    async fn inline_body_and_plain_arguments_are_substituted() {
        let spec = CommandSpec::parse(&json!({
            "files.create": {
                "body": {"parents": ["{{ folder.id }}"], "title": "x"},
                "fields": "{{ folder.members[*] as list }}",
                "supportsAllDrives": true
            },
            "pre_eval_expr": "body.title = 'renamed'"
        }))
        .expect("파싱 실패");
        let resolved = resolve_arguments(&spec, &saved(), Path::new("."), &TransformRegistry::new())
            .await
            .expect("인자 해석 실패");
        assert_eq!(
            resolved.args,
            json!({
                "body": {"parents": ["d-1"], "title": "renamed"},
                "fields": ["a", "b"],
                "supportsAllDrives": true
            })
            .as_object()
            .cloned()
            .expect("맵")
        );
        assert_eq!(resolved.body, Some(json!({"parents": ["d-1"], "title": "renamed"})));
    }

    #[tokio::test]
    async fn body_file_reference_is_loaded_relative_to_root() {
        let dir = tempfile::tempdir().expect("임시 디렉터리 생성 실패");
        std::fs::write(dir.path().join("body.yaml"), "parent: !expr folder.id\n")
            .expect("파일 작성 실패");
        let spec = CommandSpec::parse(&json!({"files.create": {"body": "body.yaml"}}))
            .expect("파싱 실패");
        let resolved = resolve_arguments(&spec, &saved(), dir.path(), &TransformRegistry::new())
            .await
            .expect("인자 해석 실패");
        assert_eq!(resolved.body, Some(json!({"parent": "d-1"})));
    }

    #[tokio::test]
    async fn missing_body_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("임시 디렉터리 생성 실패");
        let spec = CommandSpec::parse(&json!({"files.create": {"body": "nope.json"}}))
            .expect("파싱 실패");
        let err = resolve_arguments(&spec, &saved(), dir.path(), &TransformRegistry::new())
            .await
            .expect_err("파일 없음");
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[tokio::test]
    async fn unresolved_argument_expression_fails() {
        let spec = CommandSpec::parse(&json!({"files.get": {"fileId": "{{ missing.id }}"}}))
            .expect("파싱 실패");
        let err = resolve_arguments(&spec, &saved(), Path::new("."), &TransformRegistry::new())
            .await
            .expect_err("해석 실패");
        assert!(matches!(err, EngineError::Resolution(_)));
    }
}
