use chrono::{DateTime, Local};

/// 信封时间戳格式：本地时间的时:分:秒
pub const TIME_OF_DAY_FORMAT: &str = "%H:%M:%S";

#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// 把时钟读数格式化为信封使用的时间字符串
pub fn time_of_day(clock: &dyn Clock) -> String {
    clock.now().format(TIME_OF_DAY_FORMAT).to_string()
}
