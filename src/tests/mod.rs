// 场景测试：把引擎、轨迹存储与质量控制器放在一起跑完整的帧序列

use std::time::Duration;

use caret_trail_config::Config;

use crate::backend::{RecordingSurface, Target};
use crate::geometry::Rect;


fn ms(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

fn caret(x: f64, y: f64) -> Option<Target> {
    Some(Target {
        rect: Rect::new(x, y, 2., 18.),
        font_size: 14.,
    })
}

// 引擎与空白表面
fn fixture() -> (crate::engine::TrailEngine, RecordingSurface) {
    (
        crate::engine::TrailEngine::new(Config::default()),
        RecordingSurface::new(),
    )
}
