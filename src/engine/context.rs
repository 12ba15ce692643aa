use super::events::EngineEvent;
use super::resources::InvokerRegistry;
use super::store::ResultStore;
use super::transform::TransformRegistry;
use crate::error::EngineError;
use crate::invoker::SharedInvoker;
use crate::scenario::{AuthConfig, ServiceDescriptor};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// 실행 전체에 적용되는 옵션이다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// 첫 오류에서 실행을 중단할지 여부.
    pub exit_on_error: bool,
    /// 디버그 상세 출력 여부.
    pub debug: bool,
}

/// 모든 시나리오가 공유하는 실행 자원이다.
#[derive(Clone)]
pub struct RunContext {
    /// Invoker 캐시.
    pub registry: Arc<InvokerRegistry>,
    /// 이름별 변환 훅.
    pub transforms: Arc<TransformRegistry>,
    /// 기본 인증 정보.
    pub auth: Option<AuthConfig>,
    /// 실행 옵션.
    pub options: RunOptions,
    /// 이벤트 송신 채널.
    pub sender: UnboundedSender<EngineEvent>,
}

impl RunContext {
    /// 기본 변환 훅 테이블로 실행 컨텍스트를 생성한다.
    pub fn new(
        registry: Arc<InvokerRegistry>,
        auth: Option<AuthConfig>,
        options: RunOptions,
        sender: UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            registry,
            transforms: Arc::new(TransformRegistry::new()),
            auth,
            options,
            sender,
        }
    }

    /// 변환 훅 테이블을 교체한다.
    pub fn with_transforms(mut self, transforms: TransformRegistry) -> Self {
        self.transforms = Arc::new(transforms);
        self
    }
}

/// 시나리오 하나가 소유하는 실행 범위이다.
///
/// 결과 저장소는 시나리오마다 독립적이며 import된 형제 시나리오와 공유하지 않는다.
#[derive(Debug)]
pub struct ScenarioScope {
    /// 표시 이름.
    pub name: String,
    /// 상대 경로 기준 디렉터리.
    pub root: PathBuf,
    /// 기본 서비스 기술자.
    pub service: Option<ServiceDescriptor>,
    /// Command 간 결과 저장소.
    pub store: ResultStore,
    /// 이 시나리오에 적용되는 중단 정책.
    pub exit_on_error: bool,
}

impl ScenarioScope {
    /// 기본 서비스 기술자를 반환한다. 정의되지 않았으면 구성 오류이다.
    pub fn service(&self) -> Result<&ServiceDescriptor, EngineError> {
        self.service.as_ref().ok_or_else(|| {
            EngineError::config(format!("시나리오 {}에 service 정의가 없습니다.", self.name))
        })
    }

    /// 기본 서비스/인증 조합의 Invoker를 반환한다.
    pub fn default_invoker(&self, ctx: &RunContext) -> Result<SharedInvoker, EngineError> {
        ctx.registry.resolve(self.service()?, ctx.auth.as_ref())
    }
}
