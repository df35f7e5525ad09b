//! Speakable tool output. Everything the voice assistant reads back is built here.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use escalation_core::{classify_sla, CanonicalIncident, PriorityClass};
use escalation_ticketing::{ScriptRun, SimilaritySearch};

use crate::resolver::{ResolvedContext, SourceTag};

pub const STATUS_MISSING_NUMBER: &str =
    "Please provide the critical incident number for escalation details.";
pub const STATUS_UNAVAILABLE: &str = "🚨 **CRITICAL SYSTEM FAILURE:** Database connectivity issues. Immediate escalation to infrastructure required.";
pub const SEARCH_MISSING_DESCRIPTION: &str =
    "Please provide the critical incident description to search for similar cases.";
pub const SEARCH_NO_MATCHES: &str = "🚨 **CRITICAL ESCALATION:** No similar incidents found in database. This appears to be a unique critical issue requiring immediate investigation by the assigned team.";
pub const SEARCH_REJECTED: &str = "🚨 **CRITICAL ESCALATION:** Unable to access incident database. Recommend immediate manual investigation.";
pub const SEARCH_UNAVAILABLE: &str = "🚨 **CRITICAL ESCALATION:** Technical difficulties accessing incident data. Escalate to senior support immediately.";
pub const SOP_MISSING_ISSUE: &str =
    "Please specify the critical issue type for emergency resolution procedures.";
pub const SOP_REJECTED: &str = "🚨 **CRITICAL:** Cannot access SOP database. Escalate to senior support for manual resolution procedures.";
pub const SOP_UNAVAILABLE: &str = "🚨 **CRITICAL SYSTEM ISSUE:** SOP system unavailable. Immediate escalation to infrastructure team required.";
pub const SCRIPT_MISSING_NAME: &str =
    "Please specify which critical resolution script to execute for emergency response.";
pub const SCRIPT_REJECTED: &str = "🚨 **CRITICAL SYSTEM ISSUE:** Cannot execute emergency scripts. Escalate to infrastructure team immediately.";
pub const SCRIPT_UNAVAILABLE: &str = "🚨 **CRITICAL SYSTEM FAILURE:** Script execution system unavailable. Manual resolution procedures required immediately.";
pub const UNKNOWN_TOOL: &str = "Unknown tool";

const CLOSING_ESCALATION: &str = "\n🔄 **EMERGENCY SUPPORT:** I'm ready to assist with this escalation. I can help find specific incidents, provide resolution procedures, or execute emergency scripts.";
const CLOSING_LATEST_INCIDENT: &str = "\n🔄 **LIVE INCIDENT SUPPORT:** I have the latest incident from your database. I can provide status updates, resolution procedures, or execute emergency scripts for this incident.\n✅ **DATABASE INTEGRATION:** Using most recent incident data automatically.";
const CLOSING_ACTIVE_CALL: &str = "\n🔄 **LIVE EMERGENCY SUPPORT:** I have the current incident data. I can provide real-time status updates, resolution procedures, or execute emergency scripts immediately.";
const LIVE_DATA_NOTE: &str =
    "\n✅ **REAL-TIME DATA:** Incident information updated from live database.";
const CRITICAL_SLA_NOTE: &str = "🚨 **CRITICAL SLA:** 4 hours maximum resolution time\n";
const HIGH_SLA_NOTE: &str = "⚠️ **HIGH PRIORITY SLA:** 8 hours resolution target\n";
const RESOLVED_NOTE: &str =
    "\n✅ **STATUS UPDATE:** This incident has been resolved. Confirming resolution with user.";
const STATUS_FOLLOW_UP: &str =
    "\n\nDo you need the resolution procedures or SOP guidance for this critical incident?";
const SCRIPT_NEXT_ACTION: &str = "🔄 **NEXT ACTION:** Verify system functionality and confirm resolution with end users.";
const SCRIPT_ESCALATE: &str = "🚨 **IMMEDIATE ESCALATION REQUIRED:** Script failed - escalate to senior technical team immediately.";

const SEARCH_RESOLUTION_CHARS: usize = 150;
const SCRIPT_OUTPUT_CHARS: usize = 150;
const SOP_PARAGRAPH_CHARS: usize = 250;
const SOP_SCAN_LINES: usize = 8;
const SOP_MAX_STEPS: usize = 4;
const SEARCH_MAX_MATCHES: usize = 2;

fn truncate_chars(text: &str, max: usize) -> &str {
    text.char_indices()
        .nth(max)
        .and_then(|(idx, _)| text.get(..idx))
        .unwrap_or(text)
}

fn or_unknown(value: Option<&String>) -> &str {
    value.map_or("Unknown", String::as_str)
}

pub fn render_context(ctx: &ResolvedContext, now: DateTime<Utc>) -> String {
    let (header, context_line) = match ctx.source_tag {
        SourceTag::Escalation => (
            "🚨 **EMERGENCY ESCALATION CALL:**",
            "📞 **CALL TYPE:** General emergency escalation",
        ),
        SourceTag::LatestIncident => (
            "🚨 **LATEST INCIDENT ESCALATION:**",
            "📋 **CONTEXT:** Latest incident from database",
        ),
        SourceTag::ActiveCall => (
            "🚨 **LIVE EMERGENCY CALL CONTEXT:**",
            "📞 **CALL STATUS:** Active incident escalation",
        ),
    };
    let mut out = format!("{header}\n\n{context_line}\n\n");

    if let Some(user) = &ctx.user {
        let _ = writeln!(out, "👤 **EMERGENCY CONTACT:** {}", user.display_name());
        let _ = writeln!(out, "📞 **PHONE:** {}", or_unknown(user.phone.as_ref()));
        let _ = writeln!(out, "📧 **EMAIL:** {}", or_unknown(user.email.as_ref()));
        let _ = writeln!(out, "🎭 **ROLE:** {}\n", or_unknown(user.role.as_ref()));
    }

    let incident = &ctx.incident;
    let _ = writeln!(out, "🎫 **INCIDENT NUMBER:** {}", incident.number);
    if let Some(v) = &incident.short_description {
        let _ = writeln!(out, "📋 **DESCRIPTION:** {v}");
    }
    if let Some(priority) = &incident.priority {
        let marker = PriorityClass::from_label(priority).marker();
        let _ = writeln!(out, "{marker} **PRIORITY:** {priority}");
    }
    if let Some(v) = &incident.state {
        let _ = writeln!(out, "🎯 **CURRENT STATUS:** {v}");
    }
    if let Some(v) = &incident.assignment_group {
        let _ = writeln!(out, "👥 **ASSIGNED TEAM:** {v}");
    }
    if let Some(v) = &incident.created_on {
        let _ = writeln!(out, "📅 **CREATED:** {v}");
    }
    if let Some(v) = &incident.updated_on {
        let _ = writeln!(out, "🔄 **LAST UPDATE:** {v}");
    }
    if let Some(sla) = classify_sla(incident, now) {
        let _ = writeln!(out, "⏰ **SLA STATUS:** {}", sla.detail());
    }

    out.push_str(match ctx.source_tag {
        SourceTag::Escalation => CLOSING_ESCALATION,
        SourceTag::LatestIncident => CLOSING_LATEST_INCIDENT,
        SourceTag::ActiveCall => CLOSING_ACTIVE_CALL,
    });
    if ctx.live {
        out.push_str(LIVE_DATA_NOTE);
    }
    out
}

pub fn render_incident_status(incident: &CanonicalIncident) -> String {
    let priority = or_unknown(incident.priority.as_ref());
    let state = or_unknown(incident.state.as_ref());
    let mut out = format!("🚨 **CRITICAL ESCALATION - {}**\n\n", incident.number);
    let _ = writeln!(
        out,
        "⚡ **PRIORITY:** {priority} - IMMEDIATE ATTENTION REQUIRED"
    );
    let _ = writeln!(
        out,
        "📋 **ISSUE:** {}",
        or_unknown(incident.short_description.as_ref())
    );
    let _ = writeln!(out, "🎯 **CURRENT STATUS:** {state}");
    let _ = writeln!(
        out,
        "👥 **ASSIGNED TEAM:** {}",
        or_unknown(incident.assignment_group.as_ref())
    );
    let _ = writeln!(
        out,
        "📅 **CREATED:** {}\n",
        or_unknown(incident.created_on.as_ref())
    );

    match PriorityClass::from_label(priority) {
        PriorityClass::Critical => out.push_str(CRITICAL_SLA_NOTE),
        PriorityClass::High => out.push_str(HIGH_SLA_NOTE),
        PriorityClass::Standard => {}
    }

    let lowered = state.to_lowercase();
    if lowered == "resolved" || lowered == "closed" {
        out.push_str(RESOLVED_NOTE);
    } else {
        let _ = write!(
            out,
            "\n🔄 **URGENT ACTION REQUIRED:** Incident is {state} - Team needs immediate response."
        );
    }
    out.push_str(STATUS_FOLLOW_UP);
    out
}

pub fn render_status_not_found(number: &str) -> String {
    format!("🚨 **CRITICAL:** Could not locate incident {number} in system. Verify incident number or escalate to senior support.")
}

pub fn render_similar(search: &SimilaritySearch) -> String {
    let matches = match &search.similar_incidents {
        Some(matches) if search.success => matches,
        _ => return SEARCH_NO_MATCHES.to_string(),
    };
    let mut out = format!(
        "🚨 **CRITICAL ESCALATION:** Found {} similar high-priority incidents:\n\n",
        matches.len()
    );
    for incident in matches.iter().take(SEARCH_MAX_MATCHES) {
        let resolution = incident
            .resolution
            .as_deref()
            .unwrap_or("Check SOP procedures");
        let _ = writeln!(
            out,
            "**{}** - {} match",
            or_unknown(incident.number.as_ref()),
            or_unknown(incident.similarity.as_ref())
        );
        let _ = writeln!(
            out,
            "Resolution: {}...",
            truncate_chars(resolution, SEARCH_RESOLUTION_CHARS)
        );
        let _ = writeln!(
            out,
            "Team: {}\n",
            or_unknown(incident.assignment_group.as_ref())
        );
    }
    if search.generated_sop.is_some() {
        out.push_str("📋 **IMMEDIATE ACTIONS AVAILABLE:**\nI have the step-by-step resolution procedure ready. Shall I provide the emergency resolution steps now?");
    }
    out
}

/// Lines among the first few of an SOP that read as steps: mention "step" or start `1.`..`5.`.
pub fn extract_critical_steps(sop: &str) -> Vec<String> {
    sop.split('\n')
        .take(SOP_SCAN_LINES)
        .filter(|line| {
            if line.trim().is_empty() {
                return false;
            }
            let mut head = line.chars();
            let numbered = matches!((head.next(), head.next()), (Some('1'..='5'), Some('.')));
            numbered || line.to_lowercase().contains("step")
        })
        .map(|line| line.trim().to_string())
        .collect()
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

pub fn render_sop(issue_type: &str, sop: &str) -> String {
    let mut out = format!(
        "🚨 **EMERGENCY SOP - {}:**\n\n⚡ **IMMEDIATE ACTIONS REQUIRED:**\n\n",
        capitalize_first(issue_type)
    );
    let steps = extract_critical_steps(sop);
    if steps.is_empty() {
        let first_paragraph = sop.split("\n\n").next().unwrap_or_default();
        let _ = write!(
            out,
            "**CRITICAL PROCEDURE:**\n{}...\n\n",
            truncate_chars(first_paragraph, SOP_PARAGRAPH_CHARS)
        );
        out.push_str("🔄 **ACTION:** Begin this procedure immediately and monitor progress.");
    } else {
        for (idx, step) in steps.iter().take(SOP_MAX_STEPS).enumerate() {
            let _ = writeln!(out, "**{}.** {step}", idx + 1);
        }
        out.push_str("\n🔄 **NEXT:** Execute these steps immediately and report status.\n");
        out.push_str(
            "📞 **ESCALATION:** If any step fails, escalate to senior support immediately.",
        );
    }
    out.push_str("\n\nDo you need clarification on any of these critical steps?");
    out
}

pub fn render_sop_missing(issue_type: &str) -> String {
    format!("🚨 **CRITICAL:** No SOP available for '{issue_type}'. This requires immediate manual intervention by senior technical team.")
}

pub fn render_script_run(script_name: &str, ticket_id: &str, run: Option<&ScriptRun>) -> String {
    let mut out = format!(
        "🚨 **CRITICAL SCRIPT EXECUTION - {}**\n\n",
        script_name.to_uppercase()
    );
    let ticket = run
        .and_then(|r| r.ticket_id.as_deref())
        .unwrap_or(ticket_id);
    let _ = writeln!(out, "📋 **CRITICAL INCIDENT:** {ticket}");
    let _ = writeln!(out, "⚡ **EMERGENCY SCRIPT:** {script_name}\n");

    let Some(steps) = run.and_then(|r| r.resolution_results.as_ref()) else {
        out.push_str("⚠️ **SCRIPT STATUS:** Execution completed but no results returned. Manual verification required.");
        return out;
    };
    for step in steps {
        let resolution = or_unknown(step.resolution.as_ref());
        if step.succeeded() {
            let _ = write!(
                out,
                "✅ **EMERGENCY RESOLUTION SUCCESS:**\n{resolution}\n\n"
            );
        } else {
            let _ = write!(out, "🚨 **CRITICAL FAILURE:**\n{resolution}\n\n");
        }
        if let Some(output) = step.output.as_deref().filter(|o| !o.is_empty()) {
            let summary = truncate_chars(output, SCRIPT_OUTPUT_CHARS);
            let truncated = summary.len() < output.len();
            let ellipsis = if truncated { "..." } else { "" };
            let _ = write!(out, "📊 **SYSTEM OUTPUT:** {summary}{ellipsis}\n\n");
        }
    }
    if steps.iter().any(|s| s.succeeded()) {
        out.push_str(SCRIPT_NEXT_ACTION);
    } else {
        out.push_str(SCRIPT_ESCALATE);
    }
    out
}

pub fn render_script_failure(error: Option<&str>) -> String {
    format!(
        "🚨 **CRITICAL SCRIPT FAILURE:** {} - Immediate manual intervention required.",
        error.unwrap_or("Unknown error")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use escalation_ticketing::{ResolutionStep, SimilarIncident};

    fn context(tag: SourceTag, live: bool) -> ResolvedContext {
        ResolvedContext {
            call_id: "default".to_string(),
            user: None,
            caller_number: None,
            incident: CanonicalIncident {
                short_description: Some("Core switch down".to_string()),
                priority: Some("1 - Critical".to_string()),
                state: Some("In Progress".to_string()),
                ..CanonicalIncident::with_number("INC0010001")
            },
            source_tag: tag,
            live,
        }
    }

    #[test]
    fn context_phrasing_follows_source_tag() {
        let now = Utc::now();
        let active = render_context(&context(SourceTag::ActiveCall, true), now);
        assert!(active.starts_with("🚨 **LIVE EMERGENCY CALL CONTEXT:**"));
        assert!(active.contains("🚨 **PRIORITY:** 1 - Critical"));
        assert!(active.contains("REAL-TIME DATA"));

        let latest = render_context(&context(SourceTag::LatestIncident, false), now);
        assert!(latest.starts_with("🚨 **LATEST INCIDENT ESCALATION:**"));
        assert!(latest.contains("DATABASE INTEGRATION"));
        assert!(!latest.contains("REAL-TIME DATA"));
    }

    #[test]
    fn step_lines_are_picked_from_the_sop_head() {
        let sop = "Overview\nStep 1: isolate the node\n2. Drain traffic\nnotes\n6. skip this\n3. Restart\n4. Verify\n5. Report\n1. beyond the scan window";
        assert_eq!(
            extract_critical_steps(sop),
            vec![
                "Step 1: isolate the node",
                "2. Drain traffic",
                "3. Restart",
                "4. Verify",
                "5. Report"
            ]
        );
        let rendered = render_sop("network outage", sop);
        assert!(rendered.starts_with("🚨 **EMERGENCY SOP - Network outage:**"));
        assert!(rendered.contains("**4.** 4. Verify"));
        assert!(!rendered.contains("5. Report"));
    }

    #[test]
    fn sop_without_steps_falls_back_to_first_paragraph() {
        let paragraph = "x".repeat(400);
        let rendered = render_sop("db", &format!("{paragraph}\n\nsecond"));
        assert!(rendered.contains(&format!("{}...", "x".repeat(250))));
        assert!(!rendered.contains("second"));
    }

    #[test]
    fn similar_matches_are_capped_at_two() {
        let incident = |n: &str| SimilarIncident {
            number: Some(n.to_string()),
            similarity: Some("0.9".to_string()),
            resolution: Some("r".repeat(300)),
            assignment_group: Some("Network".to_string()),
        };
        let search = SimilaritySearch {
            success: true,
            similar_incidents: Some(vec![incident("INC1"), incident("INC2"), incident("INC3")]),
            generated_sop: None,
        };
        let rendered = render_similar(&search);
        assert!(rendered.contains("Found 3 similar"));
        assert!(rendered.contains("**INC2**"));
        assert!(!rendered.contains("**INC3**"));
        assert!(rendered.contains(&format!("Resolution: {}...", "r".repeat(150))));
    }

    #[test]
    fn script_output_is_truncated_only_when_long() {
        let run = ScriptRun {
            ticket_id: None,
            resolution_results: Some(vec![
                ResolutionStep {
                    status: Some("success".to_string()),
                    resolution: Some("Service restarted".to_string()),
                    output: Some("o".repeat(200)),
                },
                ResolutionStep {
                    status: Some("failed".to_string()),
                    resolution: Some("Cache flush".to_string()),
                    output: Some("short".to_string()),
                },
            ]),
        };
        let rendered = render_script_run("restart_service", "INC2024", Some(&run));
        assert!(rendered.contains("📋 **CRITICAL INCIDENT:** INC2024"));
        assert!(rendered.contains(&format!("{}...", "o".repeat(150))));
        assert!(rendered.contains("📊 **SYSTEM OUTPUT:** short\n"));
        assert!(rendered.contains("NEXT ACTION"));
    }
}
