// animation/mod.rs
// 动画原语：四角位置用的临界阻尼弹簧、尺寸脉冲用的欠阻尼振荡器，以及可调速的时钟。
// 弹簧与振荡器都是纯数值状态机，由调用方逐帧传入 dt 推进，不自行读取时间。

mod spring;
pub use spring::{CornerSpring, MOVING_EPSILON, REST_EPSILON};

mod overshoot;
pub use overshoot::Oscillator;

mod clock;
pub use clock::Clock;

/* 每帧的推进顺序
   +---------------------------+
   | Clock::now()              | → dt = now - last_tick
   +---------------------------+
               ↓
   +---------------------------+
   | CornerSpring::step(dt)    | ×8（四个角 × 两个轴）
   +---------------------------+
               ↓
   +---------------------------+
   | Oscillator::kick / step   | → envelope_delta 用于缩放轨迹多边形
   +---------------------------+
*/
