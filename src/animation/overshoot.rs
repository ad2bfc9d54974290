// overshoot.rs
// 欠阻尼振荡器，驱动轨迹的尺寸脉冲
// 运动方程 x'' + 2ζωx' + ω²x = 0，逐帧用显式（先速度后位置的半隐式）欧拉法积分。
// 这个通道只影响外观上的尺寸变化，不要求位置精度。

use caret_trail_config::Overshoot;

// 单步最大时长：长时间卡顿后也不会让积分发散
const MAX_DT: f64 = 1. / 20.;

/// 尺寸脉冲振荡器状态
#[derive(Debug, Clone, PartialEq)]
pub struct Oscillator {
    position: f64,
    velocity: f64,
    angular_frequency: f64,
    damping_ratio: f64,
    position_deadzone: f64,
    velocity_deadzone: f64,
}

impl Oscillator {
    pub fn new(config: &Overshoot) -> Self {
        Self {
            position: 0.,
            velocity: 0.,
            angular_frequency: config.angular_frequency,
            damping_ratio: config.damping_ratio,
            position_deadzone: config.position_deadzone,
            velocity_deadzone: config.velocity_deadzone,
        }
    }

    /// 更新参数，保留当前状态
    pub fn set_config(&mut self, config: &Overshoot) {
        self.angular_frequency = config.angular_frequency;
        self.damping_ratio = config.damping_ratio;
        self.position_deadzone = config.position_deadzone;
        self.velocity_deadzone = config.velocity_deadzone;
    }

    /// 注入速度冲量，幅度由调用方限制
    pub fn kick(&mut self, impulse: f64) {
        if impulse.is_finite() {
            self.velocity += impulse;
        }
    }

    /// 推进一帧，返回是否仍在振荡
    pub fn step(&mut self, dt: f64) -> bool {
        let dt = dt.clamp(0., MAX_DT);
        let omega = self.angular_frequency;

        let accel = -omega * omega * self.position - 2. * self.damping_ratio * omega * self.velocity;
        self.velocity += accel * dt;
        self.position += self.velocity * dt;

        // 死区：两者都足够小时强制归零，保证最终完全静止而不是无限逼近
        if self.position.abs() < self.position_deadzone
            && self.velocity.abs() < self.velocity_deadzone
        {
            self.position = 0.;
            self.velocity = 0.;
        }

        !self.is_at_rest()
    }

    pub fn is_at_rest(&self) -> bool {
        self.position == 0. && self.velocity == 0.
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// 本帧的尺寸包络增量：缩放后钳制到 [min_scale, max_scale]
    pub fn envelope_delta(&self, config: &Overshoot) -> f64 {
        (self.position * config.pulse_scale).clamp(config.min_scale, config.max_scale)
    }

    pub fn reset(&mut self) {
        self.position = 0.;
        self.velocity = 0.;
    }
}
