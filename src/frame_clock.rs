// 文件: frame_clock.rs
// 作用: 帧时钟，根据刷新间隔和上一次 tick 的时间预测下一次 tick 应该发生的时间点
// 关键概念:
//   - 刷新间隔: 宿主重绘的周期，如 60Hz 对应 16.67ms
//   - 对齐: 下一次 tick 总是落在"上次 tick + 整数个刷新间隔"上，错过的帧直接跳过

use std::num::NonZeroU64;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FrameClock {
    // 上一次 tick 的时间
    last_tick_time: Option<Duration>,

    // 刷新间隔(纳秒)，None 表示不限速，尽快 tick
    refresh_interval_ns: Option<NonZeroU64>,
}

impl FrameClock {
    pub fn new(refresh_interval: Option<Duration>) -> Self {
        Self {
            last_tick_time: None,
            refresh_interval_ns: refresh_interval
                .and_then(|interval| NonZeroU64::new(interval.as_nanos().try_into().ok()?)),
        }
    }

    /// 由每秒帧数创建，非正数或非有限值表示不限速
    pub fn from_rate(rate_hz: f64) -> Self {
        let interval = (rate_hz.is_finite() && rate_hz > 0.)
            .then(|| Duration::from_secs_f64(1. / rate_hz));
        Self::new(interval)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_ns
            .map(|r| Duration::from_nanos(r.get()))
    }

    // 记录一次 tick
    pub fn ticked(&mut self, tick_time: Duration) {
        // 忽略零值时间
        if tick_time.is_zero() {
            return;
        }

        self.last_tick_time = Some(tick_time);
    }

    // 计算并返回 `now` 之后下一次 tick 的理想时间
    pub fn next_tick_time_at(&self, mut now: Duration) -> Duration {
        // 不限速或没有历史记录时立即 tick
        let Some(refresh_interval_ns) = self.refresh_interval_ns else {
            return now;
        };
        let Some(last_tick_time) = self.last_tick_time else {
            return now;
        };

        let refresh_interval_ns = refresh_interval_ns.get();

        // 计时器提前触发(当前时间不晚于上次 tick):
        //   -> 向后偏移一个刷新周期
        if now <= last_tick_time {
            let orig_now = now;
            now += Duration::from_nanos(refresh_interval_ns);

            if now < last_tick_time {
                warn!(
                    now = ?orig_now,
                    ?last_tick_time,
                    "timer fired 2+ intervals early, {:?} until the last tick",
                    last_tick_time - now,
                );
                now = last_tick_time + Duration::from_nanos(refresh_interval_ns);
            }
        }

        let since_last = now - last_tick_time;
        let since_last_ns =
            since_last.as_secs() * 1_000_000_000 + u64::from(since_last.subsec_nanos());

        // 向上取整到刷新间隔的整数倍:
        //   间隔 = 10ms，经过 5ms -> 10ms，经过 25ms -> 30ms
        let to_next_ns = (since_last_ns / refresh_interval_ns + 1) * refresh_interval_ns;
        last_tick_time + Duration::from_nanos(to_next_ns)
    }
}
