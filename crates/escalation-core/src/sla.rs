use chrono::{DateTime, Utc};

use crate::model::CanonicalIncident;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityClass {
    Critical,
    High,
    Standard,
}

impl PriorityClass {
    /// Priority labels are free text ("1 - Critical", "High", "2", ...); classification
    /// looks for the level digit or the level word.
    pub fn from_label(label: &str) -> Self {
        let lowered = label.to_lowercase();
        if label.contains('1') || lowered.contains("critical") {
            Self::Critical
        } else if label.contains('2') || lowered.contains("high") {
            Self::High
        } else {
            Self::Standard
        }
    }

    pub fn sla_window_hours(self) -> Option<i64> {
        match self {
            Self::Critical => Some(4),
            Self::High => Some(8),
            Self::Standard => None,
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            Self::Critical => "🚨",
            Self::High | Self::Standard => "⚡",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaStatus {
    Breached,
    Critical,
    Ok,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlaAssessment {
    pub status: SlaStatus,
    pub window_hours: i64,
    /// Negative once breached.
    pub remaining_hours: f64,
}

impl SlaAssessment {
    pub fn detail(&self) -> String {
        match self.status {
            SlaStatus::Breached => format!(
                "🚨 SLA BREACHED ({:.1} hours over)",
                self.remaining_hours.abs()
            ),
            SlaStatus::Critical => format!(
                "⚠️ CRITICAL - {:.0} minutes remaining",
                self.remaining_hours * 60.0
            ),
            SlaStatus::Ok => format!("✅ {:.1} hours remaining", self.remaining_hours),
        }
    }
}

pub fn classify_sla(incident: &CanonicalIncident, now: DateTime<Utc>) -> Option<SlaAssessment> {
    let priority = incident.priority.as_deref()?;
    let window_hours = PriorityClass::from_label(priority).sla_window_hours()?;
    let created = incident.created_at()?;
    let elapsed_hours = (now - created).num_seconds() as f64 / 3600.0;
    let remaining_hours = window_hours as f64 - elapsed_hours;
    let status = if remaining_hours <= 0.0 {
        SlaStatus::Breached
    } else if remaining_hours < 1.0 {
        SlaStatus::Critical
    } else {
        SlaStatus::Ok
    };
    Some(SlaAssessment {
        status,
        window_hours,
        remaining_hours,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn incident(priority: &str, created: DateTime<Utc>) -> CanonicalIncident {
        CanonicalIncident {
            priority: Some(priority.to_string()),
            created_on: Some(created.to_rfc3339()),
            ..CanonicalIncident::with_number("INC1")
        }
    }

    #[test]
    fn priority_labels_classify_by_digit_or_word() {
        assert_eq!(
            PriorityClass::from_label("1 - Critical"),
            PriorityClass::Critical
        );
        assert_eq!(
            PriorityClass::from_label("critical"),
            PriorityClass::Critical
        );
        assert_eq!(PriorityClass::from_label("2 - High"), PriorityClass::High);
        assert_eq!(PriorityClass::from_label("HIGH"), PriorityClass::High);
        assert_eq!(
            PriorityClass::from_label("3 - Moderate"),
            PriorityClass::Standard
        );
    }

    #[test]
    fn critical_window_is_four_hours() {
        let now = Utc::now();
        let ok =
            classify_sla(&incident("1 - Critical", now - Duration::hours(1)), now).expect("sla");
        assert_eq!(ok.status, SlaStatus::Ok);
        assert_eq!(ok.window_hours, 4);
        assert_eq!(ok.detail(), "✅ 3.0 hours remaining");

        let tight =
            classify_sla(&incident("Critical", now - Duration::minutes(210)), now).expect("sla");
        assert_eq!(tight.status, SlaStatus::Critical);
        assert_eq!(tight.detail(), "⚠️ CRITICAL - 30 minutes remaining");
    }

    #[test]
    fn high_window_breach_reports_overrun() {
        let now = Utc::now();
        let breached =
            classify_sla(&incident("2 - High", now - Duration::hours(10)), now).expect("sla");
        assert_eq!(breached.status, SlaStatus::Breached);
        assert_eq!(breached.detail(), "🚨 SLA BREACHED (2.0 hours over)");
    }

    #[test]
    fn no_sla_without_window_or_creation_time() {
        let now = Utc::now();
        assert!(classify_sla(&incident("4 - Low", now), now).is_none());
        let undated = CanonicalIncident {
            priority: Some("Critical".to_string()),
            ..CanonicalIncident::with_number("INC2")
        };
        assert!(classify_sla(&undated, now).is_none());
    }
}
