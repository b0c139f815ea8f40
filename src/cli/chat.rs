//! Chat command implementation

use anyhow::Result;

use crate::service::HarborService;

pub async fn run(
    service: &HarborService,
    family_id: String,
    child_id: String,
    message: String,
) -> Result<()> {
    let reply = service.chat_message(&family_id, &child_id, &message).await?;

    println!("{}", reply.response);

    if reply.crisis {
        println!("\n[crisis screening triggered; the companion model was not called]");
    }
    if let Some(level) = reply.alert {
        println!("\n[session alert: {}]", level.as_str());
    }
    Ok(())
}
