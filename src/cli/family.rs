//! Family account commands

use anyhow::Result;

use crate::service::HarborService;

pub fn add(
    service: &HarborService,
    name: String,
    email: String,
    pin: Option<String>,
) -> Result<()> {
    let id = service.create_family(&name, &email, pin.as_deref())?;
    println!("Created family {id}");
    Ok(())
}

pub fn verify_pin(service: &HarborService, family_id: String, pin: String) -> Result<()> {
    match service.verify_pin(&family_id, &pin) {
        Ok(()) => println!("PIN accepted"),
        Err(e) => println!("{}", e.user_message()),
    }
    Ok(())
}
