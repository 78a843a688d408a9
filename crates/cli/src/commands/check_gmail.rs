use agendum_core::domain::action::EmailRequest;
use agendum_google::GmailClient;

use crate::commands::{block_on, load_config, CommandResult, REMOTE_FAILURE_EXIT};

const COMMAND: &str = "check-gmail";

pub fn run() -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let client = GmailClient::from_config(reqwest::Client::new(), &config.google);
    let message = test_message(client.sender());
    match block_on(client.send_message(&message)) {
        Ok(Ok(receipt)) => CommandResult::success(
            COMMAND,
            format!("sent test message `{}` to {}", receipt.message_id, client.sender()),
        ),
        Ok(Err(error)) => {
            CommandResult::failure(COMMAND, "gmail_api", error.to_string(), REMOTE_FAILURE_EXIT)
        }
        Err(error) => {
            CommandResult::failure(COMMAND, "runtime", error.to_string(), REMOTE_FAILURE_EXIT)
        }
    }
}

fn test_message(sender: &str) -> EmailRequest {
    EmailRequest {
        to: vec![sender.to_string()],
        subject: "Gmail API test".to_string(),
        body: "Hello.".to_string(),
    }
}
