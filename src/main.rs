use anyhow::Context;
use clap::Parser;
use endpoint_runner::engine::{InvokerRegistry, RunContext, RunOptions, run_scenario};
use endpoint_runner::invoker::DummyInvokerFactory;
use endpoint_runner::report::{ConsoleReporter, drain_events};
use endpoint_runner::scenario::{
    RunnerConfig, ScenarioPlan, load_runner_config, plan_scenario, plan_scenario_from_reader,
};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{Level, info};

/// YAML 시나리오를 실행해 원격 API를 호출하고 결과를 검증한다.
#[derive(Debug, Parser)]
#[command(name = "endpoint-runner", version, about)]
struct Cli {
    /// 인증 정보와 기본 옵션을 담은 실행기 설정 파일.
    #[arg(long, value_name = "FILE")]
    auth: Option<PathBuf>,
    /// 첫 오류에서 실행을 중단하고 검증 실패를 즉시 오류로 처리한다.
    #[arg(long)]
    exit_on_error: bool,
    /// 디버그 로그를 출력한다.
    #[arg(long)]
    debug: bool,
    /// 실행할 시나리오 파일. 생략하면 표준 입력에서 읽는다.
    scenario: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match cli.auth.as_deref() {
        Some(path) => match load_runner_config(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("설정 파일을 읽을 수 없습니다 ({}): {err:#}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => RunnerConfig::default(),
    };
    let options = RunOptions {
        exit_on_error: cli.exit_on_error || config.exit_on_error,
        debug: cli.debug || config.debug,
    };
    let level = if options.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    match run(&cli, config, options).await {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("실행 실패: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// 시나리오를 계획하고 실행한다. 오류가 발생했으면 `true`를 반환한다.
async fn run(cli: &Cli, config: RunnerConfig, options: RunOptions) -> anyhow::Result<bool> {
    let plan = load_plan(cli.scenario.as_ref())?;
    info!(scenario = %plan.name, commands = plan.command_count(), "시나리오 실행 시작");

    let (sender, receiver) = unbounded_channel();
    let reporter = ConsoleReporter::new(io::stdout(), io::stdout().is_terminal());
    let printer = tokio::spawn(drain_events(receiver, reporter));

    let registry = Arc::new(InvokerRegistry::new(Arc::new(DummyInvokerFactory)));
    let ctx = RunContext::new(registry, config.auth, options, sender);
    let report = run_scenario(&plan, &ctx).await;
    drop(ctx);

    printer
        .await
        .context("출력 작업이 비정상 종료되었습니다.")?
        .context("결과 출력 실패")?;
    Ok(report.error_occurred())
}

fn load_plan(path: Option<&PathBuf>) -> anyhow::Result<ScenarioPlan> {
    match path {
        Some(path) => plan_scenario(path),
        None => {
            let root = std::env::current_dir().context("현재 디렉터리를 확인할 수 없습니다.")?;
            plan_scenario_from_reader(&mut io::stdin().lock(), &root)
                .context("표준 입력의 시나리오를 해석할 수 없습니다.")
        }
    }
}
