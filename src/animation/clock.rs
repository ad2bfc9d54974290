// clock.rs
// 可共享、可调速的惰性时钟，为动画循环提供时间线
// 时间获取一次后缓存到显式 clear 为止，同一帧内多次读取得到相同的值。
// 速率可调（如 0.25 倍慢动作），用于观察弹簧与轨迹的细节。

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::utils::get_monotonic_time;

/// 可共享的惰性调速时钟
#[derive(Debug, Clone)]
pub struct Clock {
    inner: Rc<RefCell<ClockState>>,
}

#[derive(Debug)]
struct ClockState {
    // 缓存的原始时间，None 表示下次读取时重新获取
    raw: Option<Duration>,
    last_raw: Duration,
    adjusted: Duration,
    rate: f64,
}

impl Clock {
    /// 以单调时钟的当前时间创建
    pub fn new() -> Self {
        Self::from_state(ClockState::new(get_monotonic_time()))
    }

    /// 以固定时间创建（测试中常用）
    pub fn with_time(time: Duration) -> Self {
        Self::from_state(ClockState::new(time))
    }

    fn from_state(state: ClockState) -> Self {
        Self {
            inner: Rc::new(RefCell::new(state)),
        }
    }

    /// 当前时间（已按速率调整）
    pub fn now(&self) -> Duration {
        self.inner.borrow_mut().now()
    }

    /// 未按速率调整的原始时间
    pub fn now_unadjusted(&self) -> Duration {
        self.inner.borrow_mut().raw()
    }

    /// 手动设置原始时间
    pub fn set_unadjusted(&mut self, time: Duration) {
        self.inner.borrow_mut().raw = Some(time);
    }

    /// 清除缓存，下次读取时重新获取单调时间
    pub fn clear(&mut self) {
        self.inner.borrow_mut().raw = None;
    }

    pub fn rate(&self) -> f64 {
        self.inner.borrow().rate
    }

    /// 设置速率，钳制到 [0, 1000]
    pub fn set_rate(&mut self, rate: f64) {
        let mut state = self.inner.borrow_mut();
        // 先把已经流逝的时间按旧速率结算
        state.now();
        state.rate = if rate.is_finite() { rate.clamp(0., 1000.) } else { 1. };
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Clock {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Clock {}

impl ClockState {
    fn new(time: Duration) -> Self {
        Self {
            raw: Some(time),
            last_raw: time,
            adjusted: time,
            rate: 1.,
        }
    }

    fn raw(&mut self) -> Duration {
        *self.raw.get_or_insert_with(get_monotonic_time)
    }

    fn now(&mut self) -> Duration {
        let raw = self.raw();
        if raw == self.last_raw {
            return self.adjusted;
        }

        // 原始时间回退时调整后的时间同样回退
        if raw > self.last_raw {
            let delta = (raw - self.last_raw).mul_f64(self.rate);
            self.adjusted = self.adjusted.saturating_add(delta);
        } else {
            let delta = (self.last_raw - raw).mul_f64(self.rate);
            self.adjusted = self.adjusted.saturating_sub(delta);
        }

        self.last_raw = raw;
        self.adjusted
    }
}
