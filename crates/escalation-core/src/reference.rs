use chrono::{DateTime, Utc};
use rand::Rng;

/// Ticket reference used when a remediation run is requested without a ticket id:
/// `INC<YYYYMMDD><4 random digits>`.
pub fn generate_ticket_reference(now: DateTime<Utc>) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(1000..=9999);
    format!("INC{}{suffix}", now.format("%Y%m%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reference_encodes_date_and_four_digits() {
        let now = Utc
            .with_ymd_and_hms(2024, 3, 1, 10, 0, 0)
            .single()
            .expect("date");
        let reference = generate_ticket_reference(now);
        assert_eq!(reference.len(), "INC20240301".len() + 4);
        assert!(reference.starts_with("INC20240301"));
        let suffix: u16 = reference["INC20240301".len()..].parse().expect("digits");
        assert!((1000..=9999).contains(&suffix));
    }
}
