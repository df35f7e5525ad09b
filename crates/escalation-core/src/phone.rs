/// Produces the ordered list of representations a stored phone number may have been
/// written in. Order is lookup precedence.
pub trait PhoneCandidateGenerator: Send + Sync {
    fn candidates(&self, raw: &str) -> Vec<String>;
}

/// Heuristic plan for a single national numbering plan: strips the `+<cc>` prefix and
/// separators, then re-applies the country code in the forms directories commonly use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NationalPrefixPlan {
    country_code: String,
}

impl NationalPrefixPlan {
    pub fn new(country_code: impl Into<String>) -> Self {
        let country_code: String = country_code
            .into()
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        Self { country_code }
    }

    pub fn india() -> Self {
        Self::new("91")
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    fn clean(&self, raw: &str) -> String {
        let without_prefix = if self.country_code.is_empty() {
            raw.to_string()
        } else {
            raw.replace(&format!("+{}", self.country_code), "")
        };
        without_prefix
            .chars()
            .filter(|c| *c != '+' && *c != '-' && !c.is_whitespace())
            .collect()
    }
}

impl Default for NationalPrefixPlan {
    fn default() -> Self {
        Self::india()
    }
}

impl PhoneCandidateGenerator for NationalPrefixPlan {
    fn candidates(&self, raw: &str) -> Vec<String> {
        let clean = self.clean(raw);
        let cc = &self.country_code;
        vec![
            raw.to_string(),
            format!("+{cc}{clean}"),
            format!("{cc}{clean}"),
            clean.clone(),
            format!("+{clean}"),
        ]
    }
}
