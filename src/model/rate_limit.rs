use serde::{Deserialize, Serialize};

/// Quota counters reported by the scanning service.
///
/// Missing quotas fall back to the public VirusTotal API limits the service
/// is provisioned with; missing usage counters are zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitInfo {
    pub current_minute_requests: u64,
    pub max_per_minute: u64,
    pub daily_used: u64,
    pub daily_quota: u64,
    pub monthly_used: u64,
    pub monthly_quota: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minute_reset_in_seconds: Option<u64>,
}

impl Default for RateLimitInfo {
    fn default() -> Self {
        Self {
            current_minute_requests: 0,
            max_per_minute: 4,
            daily_used: 0,
            daily_quota: 500,
            monthly_used: 0,
            monthly_quota: 15_500,
            minute_reset_in_seconds: None,
        }
    }
}

/// Body of `GET /rate-limits`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub current_status: RateLimitInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaTier {
    Minute,
    Daily,
    Monthly,
}

impl QuotaTier {
    pub const ALL: [QuotaTier; 3] = [QuotaTier::Minute, QuotaTier::Daily, QuotaTier::Monthly];

    pub fn display_name(&self) -> &'static str {
        match self {
            QuotaTier::Minute => "Minute",
            QuotaTier::Daily => "Daily",
            QuotaTier::Monthly => "Monthly",
        }
    }
}

/// Colour band of a quota tier: below 80% normal, from 80% warning, at or
/// above the quota exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageLevel {
    Normal,
    Warning,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierUsage {
    pub tier: QuotaTier,
    pub used: u64,
    pub quota: u64,
}

impl TierUsage {
    /// Rounded percentage of the quota consumed. Not capped at 100.
    pub fn percent(&self) -> u64 {
        if self.quota == 0 {
            return 100;
        }
        (self.used * 100 + self.quota / 2) / self.quota
    }

    pub fn level(&self) -> UsageLevel {
        if self.used >= self.quota {
            UsageLevel::Exhausted
        } else if self.used * 5 >= self.quota * 4 {
            UsageLevel::Warning
        } else {
            UsageLevel::Normal
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.level() == UsageLevel::Exhausted
    }
}

impl RateLimitInfo {
    pub fn usage(&self, tier: QuotaTier) -> TierUsage {
        let (used, quota) = match tier {
            QuotaTier::Minute => (self.current_minute_requests, self.max_per_minute),
            QuotaTier::Daily => (self.daily_used, self.daily_quota),
            QuotaTier::Monthly => (self.monthly_used, self.monthly_quota),
        };
        TierUsage { tier, used, quota }
    }

    pub fn tiers(&self) -> [TierUsage; 3] {
        QuotaTier::ALL.map(|tier| self.usage(tier))
    }

    /// User-facing warnings for exhausted tiers, most urgent first.
    pub fn notices(&self) -> Vec<String> {
        let mut notices = Vec::new();

        if self.usage(QuotaTier::Minute).is_exhausted() {
            let wait = self.minute_reset_in_seconds.unwrap_or(60);
            notices.push(format!("Minute limit reached - wait {} seconds", wait));
        }
        if self.usage(QuotaTier::Daily).is_exhausted() {
            notices.push("Daily quota exhausted".to_string());
        }
        if self.usage(QuotaTier::Monthly).is_exhausted() {
            notices.push("Monthly quota exhausted".to_string());
        }

        notices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(minute: (u64, u64), daily: (u64, u64)) -> RateLimitInfo {
        RateLimitInfo {
            current_minute_requests: minute.0,
            max_per_minute: minute.1,
            daily_used: daily.0,
            daily_quota: daily.1,
            ..RateLimitInfo::default()
        }
    }

    #[test]
    fn test_minute_limit_reached() {
        let info = info((4, 4), (100, 500));

        let minute = info.usage(QuotaTier::Minute);
        assert_eq!(minute.percent(), 100);
        assert_eq!(minute.level(), UsageLevel::Exhausted);

        let daily = info.usage(QuotaTier::Daily);
        assert_eq!(daily.percent(), 20);
        assert_eq!(daily.level(), UsageLevel::Normal);

        assert_eq!(
            info.notices(),
            vec!["Minute limit reached - wait 60 seconds".to_string()]
        );
    }

    #[test]
    fn test_warning_band_starts_at_eighty_percent() {
        assert_eq!(info((0, 4), (399, 500)).usage(QuotaTier::Daily).level(), UsageLevel::Normal);
        assert_eq!(info((0, 4), (400, 500)).usage(QuotaTier::Daily).level(), UsageLevel::Warning);
        assert_eq!(info((0, 4), (499, 500)).usage(QuotaTier::Daily).level(), UsageLevel::Warning);
        assert_eq!(info((0, 4), (500, 500)).usage(QuotaTier::Daily).level(), UsageLevel::Exhausted);
        assert_eq!(info((0, 4), (650, 500)).usage(QuotaTier::Daily).level(), UsageLevel::Exhausted);
    }

    #[test]
    fn test_tiers_are_independent() {
        let info = info((3, 4), (500, 500));
        let [minute, daily, monthly] = info.tiers();

        assert_eq!(minute.level(), UsageLevel::Normal);
        assert_eq!(daily.level(), UsageLevel::Exhausted);
        assert_eq!(monthly.level(), UsageLevel::Normal);
        assert_eq!(info.notices(), vec!["Daily quota exhausted".to_string()]);
    }

    #[test]
    fn test_reset_hint_overrides_default_wait() {
        let mut info = info((4, 4), (0, 500));
        info.minute_reset_in_seconds = Some(17);
        assert_eq!(info.notices()[0], "Minute limit reached - wait 17 seconds");
    }

    #[test]
    fn test_zero_quota_counts_as_exhausted() {
        let usage = TierUsage {
            tier: QuotaTier::Monthly,
            used: 0,
            quota: 0,
        };
        assert_eq!(usage.percent(), 100);
        assert!(usage.is_exhausted());
    }

    #[test]
    fn test_status_defaults_for_missing_fields() {
        let json = r#"{"current_status":{"current_minute_requests":1,"daily_used":12}}"#;
        let status: RateLimitStatus = serde_json::from_str(json).unwrap();

        assert_eq!(status.current_status.max_per_minute, 4);
        assert_eq!(status.current_status.daily_quota, 500);
        assert_eq!(status.current_status.monthly_quota, 15_500);
        assert_eq!(status.current_status.usage(QuotaTier::Daily).percent(), 2);
    }
}
