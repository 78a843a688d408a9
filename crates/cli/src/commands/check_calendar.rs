use agendum_google::GoogleCalendarClient;

use crate::commands::{block_on, load_config, CommandResult, REMOTE_FAILURE_EXIT};

const COMMAND: &str = "check-calendar";

pub fn run() -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let client = GoogleCalendarClient::from_config(reqwest::Client::new(), &config.google);
    match block_on(client.calendar_info()) {
        Ok(Ok(info)) => CommandResult::success(
            COMMAND,
            format!(
                "calendar `{}`: {} | tz: {}",
                client.calendar_id(),
                if info.summary.is_empty() { "<untitled>" } else { &info.summary },
                if info.time_zone.is_empty() { "<unset>" } else { &info.time_zone }
            ),
        ),
        Ok(Err(error)) => {
            CommandResult::failure(COMMAND, "calendar_api", error.to_string(), REMOTE_FAILURE_EXIT)
        }
        Err(error) => {
            CommandResult::failure(COMMAND, "runtime", error.to_string(), REMOTE_FAILURE_EXIT)
        }
    }
}
