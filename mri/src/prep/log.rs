use std::time::{Duration, Instant};

/// 流水线分阶段计时结构。
#[derive(Clone)]
pub struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器。初始化时会视为已经调用一次`self.start()`。
    #[inline]
    pub fn new() -> Self {
        Self {
            consumed: Duration::from_micros(0),
            since: Instant::now(),
        }
    }

    /// 开始计时。可以通过再次调用来重置。
    #[inline]
    pub fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束计时，并将这一区间的时间累计起来，返回本区间时长（毫秒）。上一次调用必须是`self.start()`，否则时间计算值无意义。
    #[inline]
    pub fn elapsed(&mut self) -> u64 {
        let span = self.since.elapsed();
        self.consumed += span;
        span.as_millis() as u64
    }

    /// 获得总共累计下来的时间（以毫秒为单位）。
    #[inline]
    pub fn get_total_ms(&self) -> u64 {
        self.consumed.as_millis() as u64
    }
}

impl Default for AccTimer {
    fn default() -> Self {
        Self::new()
    }
}
