use super::expression::substitute;
use super::store::ResultStore;
use crate::error::EngineError;
use crate::invoker::{InvokerFactory, SharedInvoker};
use crate::scenario::{AuthConfig, ServiceDescriptor};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Invoker 캐시 키이다. 호출 주체, API, 버전 조합으로 구분한다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InvokerKey {
    identity: String,
    api: String,
    version: String,
}

/// 이미 만든 Invoker를 재사용하기 위한 레지스트리이다.
///
/// 프로세스 시작 시 생성해 `Arc`로 공유하며, 캐시는 뮤텍스로 보호한다.
pub struct InvokerRegistry {
    /// 캐시에 없을 때 Invoker를 만드는 생성기.
    factory: Arc<dyn InvokerFactory>,
    /// 키별 Invoker 캐시.
    cache: Mutex<HashMap<InvokerKey, SharedInvoker>>,
}

impl fmt::Debug for InvokerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokerRegistry")
            .field("cached", &self.len())
            .finish()
    }
}

impl InvokerRegistry {
    /// 생성기를 받아 빈 레지스트리를 만든다.
    pub fn new(factory: Arc<dyn InvokerFactory>) -> Self {
        Self {
            factory,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// 서비스/인증 조합에 해당하는 Invoker를 반환한다. 없으면 생성해 캐시에 넣는다.
    pub fn resolve(
        &self,
        service: &ServiceDescriptor,
        auth: Option<&AuthConfig>,
    ) -> Result<SharedInvoker, EngineError> {
        if let Some(auth) = auth {
            if auth.email.trim().is_empty() {
                return Err(EngineError::config("auth.email 값이 누락되었습니다."));
            }
        }
        let key = InvokerKey {
            identity: auth.map(|auth| auth.email.clone()).unwrap_or_default(),
            api: service.api.clone(),
            version: service.version.clone(),
        };
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(invoker) = cache.get(&key) {
            return Ok(invoker.clone());
        }
        debug!(api = %key.api, version = %key.version, "Invoker 생성");
        let invoker = self.factory.build(service, auth).map_err(|err| {
            EngineError::config(format!(
                "{}/{} Invoker 생성 실패: {err:#}",
                service.api, service.version
            ))
        })?;
        cache.insert(key, invoker.clone());
        Ok(invoker)
    }

    /// 캐시된 Invoker 수를 반환한다.
    pub fn len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// 캐시가 비었는지 여부를 반환한다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Command `config` 지시자로 서비스/인증 기술자를 임시로 덮어쓴다.
///
/// `config`는 `{service: {...}, auth: {...}}` 형태이며 각 필드는 표현식일 수 있다.
/// 원본 기술자는 변경하지 않고 새 값을 돌려준다.
pub fn apply_config_override(
    service: &ServiceDescriptor,
    auth: Option<&AuthConfig>,
    config: &Value,
    store: &ResultStore,
) -> Result<(ServiceDescriptor, Option<AuthConfig>), EngineError> {
    let overrides = config
        .as_object()
        .ok_or_else(|| EngineError::config(format!("config는 맵이어야 합니다: {config}")))?;
    if let Some(unknown) = overrides
        .keys()
        .find(|key| !matches!(key.as_str(), "service" | "auth"))
    {
        return Err(EngineError::config(format!(
            "config에 알 수 없는 키가 있습니다: {unknown}"
        )));
    }
    let service = match overrides.get("service") {
        Some(patch) => merge(service, patch, store, "service")?,
        None => service.clone(),
    };
    let auth = match overrides.get("auth") {
        Some(patch) => Some(merge(&auth.cloned().unwrap_or_default(), patch, store, "auth")?),
        None => auth.cloned(),
    };
    Ok((service, auth))
}

fn merge<T>(base: &T, patch: &Value, store: &ResultStore, field: &str) -> Result<T, EngineError>
where
    T: Serialize + DeserializeOwned,
{
    let patch = substitute(patch, store.as_value())?;
    let Value::Object(patch) = patch else {
        return Err(EngineError::config(format!("config.{field}는 맵이어야 합니다.")));
    };
    let mut merged = match serde_json::to_value(base) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    merged.extend(patch);
    serde_json::from_value(Value::Object(merged))
        .map_err(|err| EngineError::config(format!("config.{field} 형식이 잘못되었습니다: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::DummyInvokerFactory;
    use serde_json::json;

    fn service(api: &str) -> ServiceDescriptor {
        ServiceDescriptor {
            api: api.to_string(),
            version: "v1".to_string(),
            ..ServiceDescriptor::default()
        }
    }

    fn auth(email: &str) -> AuthConfig {
        AuthConfig {
            email: email.to_string(),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn registry_caches_by_identity_api_and_version() {
        let registry = InvokerRegistry::new(Arc::new(DummyInvokerFactory));
        let first = registry
            .resolve(&service("drive"), Some(&auth("a@x.io")))
            .expect("생성 실패");
        let again = registry
            .resolve(&service("drive"), Some(&auth("a@x.io")))
            .expect("조회 실패");
        assert!(Arc::ptr_eq(&first, &again));
        registry
            .resolve(&service("drive"), Some(&auth("b@x.io")))
            .expect("생성 실패");
        registry.resolve(&service("gmail"), None).expect("생성 실패");
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn empty_identity_is_a_configuration_error() {
        let registry = InvokerRegistry::new(Arc::new(DummyInvokerFactory));
        let Err(err) = registry.resolve(&service("drive"), Some(&auth(" "))) else {
            panic!("빈 이메일은 거부되어야 한다");
        };
        assert!(matches!(err, EngineError::Configuration(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn config_override_resolves_expressions_without_touching_defaults() {
        let mut store = ResultStore::new();
        store.insert("user", json!({"email": "delegate@x.io"}));
        let base_service = service("drive");
        let base_auth = auth("admin@x.io");
        let (overridden_service, overridden_auth) = apply_config_override(
            &base_service,
            Some(&base_auth),
            &json!({"service": {"version": "v3"}, "auth": {"email": "{{ user.email }}"}}),
            &store,
        )
        .expect("덮어쓰기 실패");
        assert_eq!(overridden_service.api, "drive");
        assert_eq!(overridden_service.version, "v3");
        assert_eq!(overridden_auth.map(|auth| auth.email), Some("delegate@x.io".to_string()));
        assert_eq!(base_service.version, "v1");
        assert_eq!(base_auth.email, "admin@x.io");
    }

    #[test]
    fn config_override_rejects_unknown_sections() {
        let err = apply_config_override(
            &service("drive"),
            None,
            &json!({"proxy": "x"}),
            &ResultStore::new(),
        )
        .expect_err("알 수 없는 키");
        assert!(matches!(err, EngineError::Configuration(_)));
    }
}
