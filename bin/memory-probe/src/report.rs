use bytesize::ByteSize;
use serde::Serialize;

/// Memory readings taken by a single run.
#[derive(Debug, Serialize)]
pub struct Report {
    pub pid: u32,
    pub strategy: &'static str,
    pub usage_bytes: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocation: Option<AllocationReport>,
}

/// Readings around a deliberate allocation.
#[derive(Debug, Serialize)]
pub struct AllocationReport {
    pub allocated_bytes: u64,
    pub usage_after_bytes: u64,
    pub growth_bytes: i64,
}

impl AllocationReport {
    pub fn new(allocated_bytes: u64, usage_before_bytes: u64, usage_after_bytes: u64) -> Self {
        Self {
            allocated_bytes,
            usage_after_bytes,
            growth_bytes: saturating_difference(usage_after_bytes, usage_before_bytes),
        }
    }
}

fn saturating_difference(after: u64, before: u64) -> i64 {
    let difference = i128::from(after) - i128::from(before);
    i64::try_from(difference).unwrap_or(if difference < 0 { i64::MIN } else { i64::MAX })
}

impl Report {
    pub fn to_text(&self) -> String {
        let mut text = format!(
            "pid {} ({}): {}",
            self.pid,
            self.strategy,
            ByteSize::b(self.usage_bytes)
        );

        if let Some(allocation) = &self.allocation {
            let growth = ByteSize::b(allocation.growth_bytes.unsigned_abs());
            let sign = if allocation.growth_bytes < 0 { "-" } else { "+" };
            text.push_str(&format!(
                "\nafter allocating {}: {} ({}{})",
                ByteSize::b(allocation.allocated_bytes),
                ByteSize::b(allocation.usage_after_bytes),
                sign,
                growth
            ));
        }

        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(allocation: Option<AllocationReport>) -> Report {
        Report {
            pid: 4242,
            strategy: "unix",
            usage_bytes: 12345 * 1024,
            allocation,
        }
    }

    #[test]
    fn growth_can_be_negative() {
        let allocation = AllocationReport::new(1024, 8192, 4096);
        assert_eq!(allocation.growth_bytes, -4096);
    }

    #[test]
    fn growth_saturates() {
        assert_eq!(AllocationReport::new(0, 0, u64::MAX).growth_bytes, i64::MAX);
        assert_eq!(AllocationReport::new(0, u64::MAX, 0).growth_bytes, i64::MIN);
        assert_eq!(AllocationReport::new(0, 1 << 63, (1 << 63) + 4096).growth_bytes, 4096);
    }

    #[test]
    fn json_omits_missing_allocation() {
        let json = serde_json::to_string(&report(None)).unwrap();
        similar_asserts::assert_eq!(json, r#"{"pid":4242,"strategy":"unix","usage_bytes":12641280}"#);
    }

    #[test]
    fn json_with_allocation() {
        let allocation = AllocationReport::new(1048576, 12641280, 13697024);
        let json = serde_json::to_value(report(Some(allocation))).unwrap();
        assert_eq!(json["allocation"]["growth_bytes"], 1055744);
        assert_eq!(json["allocation"]["allocated_bytes"], 1048576);
    }

    #[test]
    fn text_includes_pid_and_strategy() {
        let text = report(None).to_text();
        assert!(text.starts_with("pid 4242 (unix): "), "{}", text);
        assert_eq!(text.lines().count(), 1);

        let text = report(Some(AllocationReport::new(1048576, 12641280, 13697024))).to_text();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("(+"), "{}", text);
    }
}
