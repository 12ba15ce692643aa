use crate::invoker::InvocationFailure;
use std::path::PathBuf;

/// 표현식 해석 중 발생한 오류를 표현한다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// 경로 질의 자체를 해석할 수 없는 경우이다.
    #[error("표현식 {expression}을(를) 해석하는 중 오류가 발생했습니다: {reason}")]
    InvalidQuery { expression: String, reason: String },
    /// 질의 결과가 비어 있는 경우이다.
    #[error("표현식 {expression}의 결과가 없습니다.")]
    NoMatch { expression: String },
}

/// 시나리오 실행 엔진이 보고하는 오류 분류이다.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// 시나리오 또는 Command 구성이 잘못된 경우이다.
    #[error("구성 오류: {0}")]
    Configuration(String),
    /// 표현식 해석에 실패한 경우이다.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    /// 원격 호출이 실패한 경우이다.
    #[error(transparent)]
    Invocation(#[from] InvocationFailure),
    /// 엄격 모드에서 결과 검증이 실패한 경우이다.
    #[error("검증 실패 ({path}): {message}")]
    Assertion { path: String, message: String },
    /// 반복 조건을 만족하지 못한 채 최대 횟수를 넘긴 경우이다.
    #[error("{times}회 재시도했지만 성공하지 못했습니다.")]
    RetryExhausted { times: u32 },
    /// 반복 조건 불일치가 예외로 지정된 경우이다.
    #[error("반복 조건이 일치하지 않습니다: {0}")]
    RepeatCondition(String),
    /// 변환 훅 실행이 실패한 경우이다.
    #[error("변환 훅 실행 실패: {0}")]
    Transform(String),
    /// 쉘 훅이 비정상 종료한 경우이다.
    #[error("훅 명령 실패 ({command}): {reason}")]
    Hook { command: String, reason: String },
    /// 파일 입출력이 실패한 경우이다.
    #[error("파일 처리 실패 ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// 구성 오류를 간편하게 생성한다.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// 검증 실패 여부를 반환한다.
    pub fn is_assertion(&self) -> bool {
        matches!(self, Self::Assertion { .. })
    }
}
