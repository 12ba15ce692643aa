//! 선언적 YAML 시나리오로 원격 API Operation을 순서대로 호출하고 결과를 검증하는 실행기이다.

pub mod engine;
pub mod error;
pub mod invoker;
pub mod report;
pub mod scenario;
