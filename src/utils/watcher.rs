//! 配置文件监视器
//!
//! 后台线程按固定间隔检查文件的规范化路径与修改时间，任一变化就调用处理函数，
//! 把结果通过 calloop 通道发回主循环。规范化路径参与比较，
//! 因此符号链接切换到另一个修改时间相同的文件也能被发现。

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, SystemTime};

use anyhow::Context;
use calloop::channel::SyncSender;

/// 默认轮询间隔
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// 监视线程句柄，drop 时通知线程退出
pub struct Watcher {
    should_stop: Arc<AtomicBool>,
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.should_stop.store(true, Ordering::SeqCst);
    }
}

// 文件的可观察属性，文件不存在时为 None
fn file_props(path: &Path) -> Option<(SystemTime, PathBuf)> {
    let canon = path.canonicalize().ok()?;
    let modified = canon.metadata().and_then(|meta| meta.modified()).ok()?;
    Some((modified, canon))
}

impl Watcher {
    pub fn new<T: Send + 'static>(
        path: PathBuf,
        process: impl FnMut(&Path) -> T + Send + 'static,
        changed: SyncSender<T>,
    ) -> anyhow::Result<Self> {
        Self::with_options(path, POLL_INTERVAL, process, changed, None)
    }

    /// `started` 在线程记录下初始状态后收到通知
    pub fn with_options<T: Send + 'static>(
        path: PathBuf,
        interval: Duration,
        mut process: impl FnMut(&Path) -> T + Send + 'static,
        changed: SyncSender<T>,
        started: Option<mpsc::SyncSender<()>>,
    ) -> anyhow::Result<Self> {
        let should_stop = Arc::new(AtomicBool::new(false));
        let stop = should_stop.clone();

        thread::Builder::new()
            .name(format!("config watcher: {}", path.to_string_lossy()))
            .spawn(move || {
                let mut last_props = file_props(&path);

                if let Some(started) = started {
                    let _ = started.send(());
                }

                loop {
                    thread::sleep(interval);

                    if stop.load(Ordering::SeqCst) {
                        break;
                    }

                    // 文件暂时不存在（比如正在被编辑器替换）时保留上一次的状态
                    let Some(props) = file_props(&path) else {
                        continue;
                    };
                    if last_props.as_ref() == Some(&props) {
                        continue;
                    }

                    trace!("file changed: {}", path.to_string_lossy());
                    if let Err(err) = changed.send(process(&path)) {
                        warn!("error sending change notification: {err:?}");
                        break;
                    }
                    last_props = Some(props);
                }

                debug!("exiting watcher thread for {}", path.to_string_lossy());
            })
            .context("error spawning the watcher thread")?;

        Ok(Self { should_stop })
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::fs::File;
    use std::sync::atomic::AtomicU8;

    use calloop::channel::sync_channel;
    use calloop::EventLoop;
    use xshell::{cmd, Shell};

    use super::*;

    const INTERVAL: Duration = Duration::from_millis(50);

    fn check(
        setup: impl FnOnce(&Shell) -> Result<(), Box<dyn Error>>,
        change: impl FnOnce(&Shell) -> Result<(), Box<dyn Error>>,
    ) {
        let sh = Shell::new().unwrap();
        let temp_dir = sh.create_temp_dir().unwrap();
        sh.change_dir(temp_dir.path());

        let config_path = sh.current_dir().join("caret-trail/config.toml");
        setup(&sh).unwrap();

        let changed = AtomicU8::new(0);
        let mut event_loop = EventLoop::try_new().unwrap();

        let (tx, rx) = sync_channel(1);
        let (started_tx, started_rx) = mpsc::sync_channel(1);
        let _watcher =
            Watcher::with_options(config_path.clone(), INTERVAL, |_| (), tx, Some(started_tx))
                .unwrap();

        event_loop
            .handle()
            .insert_source(rx, |_, _, _| {
                changed.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        started_rx.recv().unwrap();

        // 避开文件系统修改时间的精度
        thread::sleep(Duration::from_millis(20));
        change(&sh).unwrap();

        event_loop
            .dispatch(INTERVAL * 6, &mut ())
            .unwrap();
        assert_eq!(changed.load(Ordering::SeqCst), 1);

        // 之后的修改同样能被发现
        thread::sleep(Duration::from_millis(20));
        sh.write_file(&config_path, "c = 1").unwrap();
        event_loop
            .dispatch(INTERVAL * 6, &mut ())
            .unwrap();
        assert_eq!(changed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn change_file() {
        check(
            |sh| Ok(sh.write_file("caret-trail/config.toml", "a = 1")?),
            |sh| Ok(sh.write_file("caret-trail/config.toml", "b = 1")?),
        );
    }

    #[test]
    fn create_file() {
        check(
            |sh| Ok(sh.create_dir("caret-trail").map(drop)?),
            |sh| Ok(sh.write_file("caret-trail/config.toml", "a = 1")?),
        );
    }

    #[test]
    fn recreate_dir() {
        check(
            |sh| Ok(sh.write_file("caret-trail/config.toml", "a = 1")?),
            |sh| {
                sh.remove_path("caret-trail")?;
                sh.write_file("caret-trail/config.toml", "b = 1")?;
                Ok(())
            },
        );
    }

    #[test]
    fn swap_link_with_same_mtime() {
        check(
            |sh| {
                let dir = sh.current_dir().join("caret-trail");
                sh.create_dir(&dir)?;

                for (name, contents) in [("one.toml", "a = 1"), ("two.toml", "b = 1")] {
                    let path = dir.join(name);
                    sh.write_file(&path, contents)?;
                    File::options()
                        .write(true)
                        .open(&path)?
                        .set_modified(SystemTime::UNIX_EPOCH)?;
                }

                cmd!(sh, "ln -s one.toml caret-trail/config.toml").run()?;
                Ok(())
            },
            |sh| {
                cmd!(sh, "unlink caret-trail/config.toml").run()?;
                cmd!(sh, "ln -s two.toml caret-trail/config.toml").run()?;
                Ok(())
            },
        );
    }
}
