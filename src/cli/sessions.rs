//! Session listing command

use anyhow::Result;

use crate::service::HarborService;

pub fn run(service: &HarborService, family_id: String, child_id: String) -> Result<()> {
    let sessions = service.list_sessions(&family_id, &child_id)?;

    if sessions.is_empty() {
        println!("No sessions recorded for this child.");
        return Ok(());
    }

    println!(
        "{:<12} {:<10} {:<9} {:<8} {}",
        "Date", "Status", "Duration", "Mood", "Topics"
    );
    println!("{}", "-".repeat(70));

    for session in sessions {
        let date = session.created_at.format("%m-%d %H:%M").to_string();
        let mood = session
            .mood_analysis
            .as_ref()
            .map(|m| format!("h{} a{}", m.happiness, m.anxiety))
            .unwrap_or_else(|| "-".to_string());
        let topics = if session.topics.is_empty() {
            "-".to_string()
        } else {
            session.topics.join(", ")
        };

        println!(
            "{:<12} {:<10} {:<9} {:<8} {}",
            date, session.status, session.session_duration, mood, topics,
        );
    }
    Ok(())
}
