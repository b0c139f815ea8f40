//! Child profile commands

use anyhow::Result;

use crate::service::HarborService;

#[allow(clippy::too_many_arguments)]
pub fn add(
    service: &HarborService,
    family_id: String,
    name: String,
    age: i64,
    concerns: Option<String>,
    triggers: Option<String>,
    goals: Option<String>,
) -> Result<()> {
    let child = service.create_child(
        &family_id,
        &name,
        age,
        concerns.as_deref(),
        triggers.as_deref(),
        goals.as_deref(),
    )?;

    println!("Created child {} ({})", child.name, child.id);
    if !child.profile_completed {
        println!("Profile incomplete: add concerns and goals before chatting.");
    }
    Ok(())
}

pub fn list(service: &HarborService, family_id: String) -> Result<()> {
    let children = service.list_children(&family_id)?;

    if children.is_empty() {
        println!("No active children for this family.");
        return Ok(());
    }

    println!("{:<38} {:<16} {:<5} {}", "ID", "Name", "Age", "Profile");
    println!("{}", "-".repeat(70));
    for child in children {
        println!(
            "{:<38} {:<16} {:<5} {}",
            child.id,
            child.name,
            child.age,
            if child.profile_completed {
                "complete"
            } else {
                "incomplete"
            },
        );
    }
    Ok(())
}

pub fn deactivate(service: &HarborService, family_id: String, child_id: String) -> Result<()> {
    service.deactivate_child(&family_id, &child_id)?;
    println!("Deactivated child {child_id}");
    Ok(())
}
