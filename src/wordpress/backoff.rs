//! Exponential backoff with jitter for transient WordPress API failures.

use rand::Rng;
use std::time::Duration;

/// リトライ方針。1回の論理呼び出しの間だけ有効。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Base delay for the exponential curve
    pub base_delay: Duration,
    /// Upper bound for a single computed delay (before jitter)
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// attempt k (1始まり) の後の待機時間: `min(base * 2^(k-1), cap) + jitter`
    ///
    /// jitter は計算値の1割を上限とする一様乱数。
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base_delay.as_millis() as u64;
        let exponential = 2u64.saturating_pow(attempt - 1);
        let delay_ms = base_ms.saturating_mul(exponential);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as u64);

        let jitter_range = capped_ms / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped_ms + jitter)
    }

    /// サーバー指定の `Retry-After` (整数秒) があればそちらを優先する
    pub fn delay_after(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        match retry_after {
            Some(seconds) => Duration::from_secs(seconds),
            None => self.delay_for(attempt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(2000),
        }
    }

    #[test]
    fn test_zero_attempt_has_no_delay() {
        assert_eq!(test_policy().delay_for(0), Duration::ZERO);
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let policy = test_policy();

        // attempt k の下限は base * 2^(k-1)、上限はその 1.1 倍
        for attempt in 1..=4u32 {
            let floor = 100u64 * 2u64.pow(attempt - 1);
            let delay = policy.delay_for(attempt).as_millis() as u64;
            assert!(delay >= floor, "attempt {}: {} < {}", attempt, delay, floor);
            assert!(delay <= floor + floor / 10, "attempt {}: {} too large", attempt, delay);
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = test_policy();
        let delay = policy.delay_for(20).as_millis() as u64;
        assert!(delay >= 2000);
        assert!(delay <= 2000 + 200);
    }

    #[test]
    fn test_retry_after_overrides_computed_delay() {
        let policy = test_policy();
        assert_eq!(policy.delay_after(1, Some(5)), Duration::from_secs(5));
        // ヘッダーなしなら通常のバックオフ
        assert!(policy.delay_after(1, None).as_millis() >= 100);
    }
}
