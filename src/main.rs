#[macro_use]
extern crate tracing;

use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use calloop::timer::{TimeoutAction, Timer};
use calloop::{EventLoop, LoopSignal};
use caret_trail::animation::Clock;
use caret_trail::backend::{RecordingSurface, ScriptedTarget, TargetProvider};
use caret_trail::cli::{Cli, Sub};
use caret_trail::engine::TrailEngine;
use caret_trail::frame_clock::FrameClock;
use caret_trail::render::DrawStats;
use caret_trail::utils::watcher::Watcher;
use caret_trail::utils::{
    default_config_path, get_monotonic_time, version, write_default_config, DEFAULT_CONFIG,
};
use caret_trail_config::Config;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

// 默认日志过滤规则
const DEFAULT_LOG_FILTER: &str = "caret_trail=debug,caret_trail_config=debug";

// 主循环状态
struct State {
    engine: TrailEngine,
    clock: Clock,
    frame_clock: FrameClock,
    target: ScriptedTarget,
    surface: RecordingSurface,
    signal: LoopSignal,
    // 剩余帧数，None 表示一直运行
    frames_left: Option<u64>,
    frames: u64,
    failed_frames: u64,
    animating_frames: u64,
    stats: DrawStats,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 配置日志过滤器：RUST_LOG 优先
    let directives = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_owned());
    let env_filter = EnvFilter::builder().parse_lossy(directives);
    tracing_subscriber::fmt()
        .compact()
        .with_writer(io::stderr)
        .with_env_filter(env_filter)
        .init();

    let cli = Cli::parse();

    if let Some(subcommand) = cli.subcommand {
        match subcommand {
            Sub::Validate { config } => {
                tracy_client::Client::start();

                let (path, _) = config_path(config);
                Config::load(&path)?;
                info!("config is valid");
                return Ok(());
            }
            Sub::DefaultConfig => {
                io::stdout().write_all(DEFAULT_CONFIG)?;
                return Ok(());
            }
            Sub::Completions { shell } => {
                clap_complete::generate(shell, &mut Cli::command(), "caret-trail", &mut io::stdout());
                return Ok(());
            }
        }
    }

    tracy_client::Client::start();

    info!("starting version {}", &version());

    let (path, create_default) = config_path(cli.config);
    if create_default {
        if let Err(err) = write_default_config(&path) {
            warn!("{err:?}");
        }
    }

    // 加载失败时回退到默认配置，之后的修改由监视器重新加载
    let config = Config::load(&path)
        .map_err(|err| warn!("{err:?}"))
        .unwrap_or_default();

    let mut event_loop = EventLoop::<State>::try_new()?;

    let mut clock = Clock::new();
    clock.set_rate(cli.time_rate);

    let mut state = State {
        engine: TrailEngine::new(config),
        clock,
        frame_clock: FrameClock::from_rate(cli.rate),
        target: ScriptedTarget::new(cli.seed),
        surface: RecordingSurface::new(),
        signal: event_loop.get_signal(),
        frames_left: (cli.frames > 0).then_some(cli.frames),
        frames: 0,
        failed_frames: 0,
        animating_frames: 0,
        stats: DrawStats::default(),
    };

    // 配置文件监视器
    let _watcher = {
        let process = |path: &Path| {
            Config::load(path).map_err(|err| {
                warn!("{:?}", err.context("error loading config"));
            })
        };

        let (tx, rx) = calloop::channel::sync_channel(1);
        let watcher = Watcher::new(path.clone(), process, tx)
            .map_err(|err| warn!("{err:?}"))
            .ok();
        event_loop
            .handle()
            .insert_source(rx, |event, _, state| match event {
                calloop::channel::Event::Msg(Ok(config)) => {
                    info!("reloaded config");
                    state.engine.set_config(config);
                }
                calloop::channel::Event::Msg(Err(())) => (),
                calloop::channel::Event::Closed => (),
            })
            .map_err(|err| err.error)?;
        watcher
    };

    event_loop
        .handle()
        .insert_source(Timer::immediate(), |_, _, state| {
            state.frame();
            if state.frames_left == Some(0) {
                state.signal.stop();
                return TimeoutAction::Drop;
            }

            let now = get_monotonic_time();
            let next = state.frame_clock.next_tick_time_at(now);
            TimeoutAction::ToDuration(next.saturating_sub(now))
        })
        .map_err(|err| err.error)?;

    // 主事件循环：
    //   while 运行中:
    //     1. 帧定时器到期 -> 取目标、推进引擎、录制绘图调用
    //     2. 配置文件变化 -> 替换配置
    event_loop.run(None, &mut state, |_| ())?;

    info!(
        frames = state.frames,
        failed = state.failed_frames,
        animating = state.animating_frames,
        primitives = state.stats.primitives,
        skipped = state.stats.skipped,
        "finished"
    );
    Ok(())
}

impl State {
    fn frame(&mut self) {
        let _span = tracy_client::span!("State::frame");

        self.clock.clear();
        let now = self.clock.now();
        self.frame_clock.ticked(self.clock.now_unadjusted());

        self.frames += 1;
        if let Some(left) = &mut self.frames_left {
            *left = left.saturating_sub(1);
        }

        let target = match self.target.target() {
            Ok(target) => target,
            Err(err) => {
                warn!("error getting the caret target: {err:?}");
                None
            }
        };

        // 宿主每帧先清空表面
        self.surface.clear();

        match self.engine.tick(now, target, &mut self.surface) {
            Ok(outcome) => {
                self.stats += outcome.stats;
                if outcome.animating {
                    self.animating_frames += 1;
                }
                trace!(
                    quality = outcome.quality,
                    commands = self.surface.commands().len(),
                    "frame"
                );
            }
            Err(err) => {
                self.failed_frames += 1;
                warn!("error drawing frame: {err:?}");
            }
        }
    }
}

// 从环境变量获取配置路径
fn env_config_path() -> Option<PathBuf> {
    env::var_os("CARET_TRAIL_CONFIG")
        .filter(|x| !x.is_empty())
        .map(PathBuf::from)
}

/// 解析配置路径
/// 返回：(配置路径, 是否创建默认配置)
///   1. 命令行或环境变量指定路径 -> 使用指定路径，不创建
///   2. 否则使用 `$XDG_CONFIG_HOME/caret-trail/config.toml`，不存在时创建
///   3. 无法确定用户目录时使用当前目录下的 config.toml
fn config_path(cli_path: Option<PathBuf>) -> (PathBuf, bool) {
    if let Some(explicit) = cli_path.or_else(env_config_path) {
        return (explicit, false);
    }

    match default_config_path() {
        Some(path) => {
            let create = !path.exists();
            (path, create)
        }
        None => {
            warn!("error retrieving home directory");
            (PathBuf::from("config.toml"), false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let (path, create) = config_path(Some(PathBuf::from("/tmp/x.toml")));
        assert_eq!(path, PathBuf::from("/tmp/x.toml"));
        assert!(!create);
    }
}
