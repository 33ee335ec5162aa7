/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Unix millis → whole minutes elapsed, never negative
pub fn elapsed_minutes(from: i64, to: i64) -> i64 {
    (to - from).max(0) / 60_000
}
