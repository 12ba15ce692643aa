use crate::scenario::{AuthConfig, ServiceDescriptor};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// 점(`.`)으로 구분된 원격 기능 경로이다. 예: `users.messages.list`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationPath {
    /// 경로를 구성하는 세그먼트 목록.
    segments: Vec<String>,
}

impl OperationPath {
    /// 문자열을 세그먼트로 분해한다. 빈 세그먼트가 있으면 `None`을 반환한다.
    pub fn parse(raw: &str) -> Option<Self> {
        let segments: Vec<String> = raw.trim().split('.').map(str::to_string).collect();
        if segments.iter().any(|segment| segment.trim().is_empty()) {
            return None;
        }
        Some(Self { segments })
    }

    /// 세그먼트 목록을 반환한다.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for OperationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// 원격 호출이 정상적으로 끝났을 때의 결과이다.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// HTTP 유사 상태 코드.
    pub status: u16,
    /// 서버가 돌려준 메시지.
    pub message: Option<String>,
    /// 응답 본문.
    pub result: Value,
}

impl Invocation {
    /// 상태 200과 결과 본문으로 성공 응답을 만든다.
    pub fn ok(result: Value) -> Self {
        Self {
            status: 200,
            message: None,
            result,
        }
    }
}

/// 호출 실패의 종류이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 응답 프레이밍이 깨진 일시적 프로토콜 오류. 자동으로 재시도한다.
    Transient,
    /// 서버가 요청을 거부한 오류.
    Rejected,
}

/// 분류된 원격 호출 실패이다.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{operation} 호출 실패 (상태: {}): {}", status_text(.status), reason_text(.message, .detail))]
pub struct InvocationFailure {
    /// 실패한 Operation 경로 문자열.
    pub operation: String,
    /// 실패 종류.
    pub kind: FailureKind,
    /// HTTP 유사 상태 코드.
    pub status: Option<u16>,
    /// 구조화된 오류 메시지.
    pub message: Option<String>,
    /// 원본 오류 설명.
    pub detail: String,
}

fn status_text(status: &Option<u16>) -> String {
    status.map_or_else(|| "없음".to_string(), |code| code.to_string())
}

fn reason_text<'a>(message: &'a Option<String>, detail: &'a str) -> &'a str {
    message.as_deref().unwrap_or(detail)
}

impl InvocationFailure {
    /// 서버가 거부한 호출 실패를 만든다.
    pub fn rejected(
        operation: &OperationPath,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        Self {
            operation: operation.to_string(),
            kind: FailureKind::Rejected,
            status: Some(status),
            detail: message.clone(),
            message: Some(message),
        }
    }

    /// 일시적 프로토콜 실패를 만든다.
    pub fn transient(operation: &OperationPath, detail: impl Into<String>) -> Self {
        Self {
            operation: operation.to_string(),
            kind: FailureKind::Transient,
            status: None,
            message: None,
            detail: detail.into(),
        }
    }

    /// 자동 재시도 대상인지 여부를 반환한다.
    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transient
    }
}

/// EndpointInvoker는 원격 Operation 호출을 위한 추상 계층을 정의한다.
#[async_trait]
pub trait EndpointInvoker: Send + Sync {
    /// Operation 경로와 인자 맵으로 원격 호출을 수행한다.
    async fn invoke(
        &self,
        operation: &OperationPath,
        args: &Map<String, Value>,
    ) -> Result<Invocation, InvocationFailure>;
}

/// EndpointInvoker를 공유하기 위한 Arc 타입 별칭이다.
pub type SharedInvoker = Arc<dyn EndpointInvoker>;

/// 서비스 기술자와 인증 정보로 Invoker를 만드는 생성기이다.
///
/// 자격 증명 획득과 전송 계층은 이 구현체 뒤에 숨는다.
pub trait InvokerFactory: Send + Sync {
    /// 주어진 서비스/인증 조합에 대한 Invoker를 생성한다.
    fn build(
        &self,
        service: &ServiceDescriptor,
        auth: Option<&AuthConfig>,
    ) -> anyhow::Result<SharedInvoker>;
}

/// DummyInvoker는 실제 네트워크 호출 없이 인자를 그대로 돌려주는 기본 구현이다.
#[derive(Debug, Default, Clone)]
pub struct DummyInvoker {
    /// 로그에 남길 서비스 이름.
    service: String,
}

impl DummyInvoker {
    /// 서비스 이름을 받아 DummyInvoker를 생성한다.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

#[async_trait]
impl EndpointInvoker for DummyInvoker {
    /// 호출 내용을 로그로 남기고 인자를 결과로 반환한다.
    async fn invoke(
        &self,
        operation: &OperationPath,
        args: &Map<String, Value>,
    ) -> Result<Invocation, InvocationFailure> {
        info!(service = %self.service, %operation, "[DummyInvoker] 호출");
        Ok(Invocation::ok(Value::Object(args.clone())))
    }
}

/// DummyInvoker를 만드는 기본 생성기이다.
#[derive(Debug, Default, Clone)]
pub struct DummyInvokerFactory;

impl InvokerFactory for DummyInvokerFactory {
    fn build(
        &self,
        service: &ServiceDescriptor,
        _auth: Option<&AuthConfig>,
    ) -> anyhow::Result<SharedInvoker> {
        let name = format!("{}/{}", service.api, service.version);
        Ok(Arc::new(DummyInvoker::new(name)) as SharedInvoker)
    }
}
