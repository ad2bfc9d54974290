// spring.rs
// 临界阻尼弹簧：每个角的每个坐标轴各一个，共 8 个实例
// 运动方程 x'' + 2ωx' + ω²x = 0，其中 ω = 4/τ，τ 为时间常数

/// 低于该幅度视为已停止运动
pub const MOVING_EPSILON: f64 = 0.01;

/// 位移小于该值时直接吸附到静止状态
pub const REST_EPSILON: f64 = 0.001;

/// 单轴临界阻尼弹簧
///
/// `offset` 是相对于*当前*目标位置的偏移，调用方每一步都要先重新设置它，
/// 不在绝对坐标中累积。
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct CornerSpring {
    pub offset: f64,
    pub velocity: f64,
    /// 时间常数（秒）
    pub time_constant: f64,
}

impl CornerSpring {
    pub fn new(time_constant: f64) -> Self {
        Self {
            offset: 0.,
            velocity: 0.,
            time_constant,
        }
    }

    /// 角频率 ω = 4/τ
    pub fn omega(&self) -> f64 {
        4. / self.time_constant
    }

    /// 归零位移与速度
    pub fn reset(&mut self) {
        self.offset = 0.;
        self.velocity = 0.;
    }

    /// 按闭式解精确推进 `dt` 秒，返回是否仍在运动
    ///
    /// ```text
    /// a = x0, b = v0 + ω·a
    /// x(t) = (a + b·t)·e^(−ω·t)
    /// v(t) = e^(−ω·t)·(b − ω·(a + b·t))
    /// ```
    ///
    /// 闭式解没有积分误差：连走两步 `dt` 与一步 `2·dt` 的结果相同。
    pub fn step(&mut self, dt: f64) -> bool {
        // 时间常数不大于步长，或已足够接近目标：直接静止
        if self.time_constant <= dt
            || (self.offset.abs() < REST_EPSILON && self.velocity.abs() < REST_EPSILON)
        {
            self.reset();
            return false;
        }

        let omega = self.omega();
        let a = self.offset;
        let b = self.velocity + omega * a;
        let decay = (-omega * dt).exp();

        self.offset = (a + b * dt) * decay;
        self.velocity = decay * (b - omega * (a + b * dt));

        self.offset.abs() >= MOVING_EPSILON || self.velocity.abs() >= MOVING_EPSILON
    }
}
