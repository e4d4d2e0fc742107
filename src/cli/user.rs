use super::{load_config, open_database, UserCommand};
use crate::services::users;
use anyhow::Result;
use std::path::Path;

pub async fn run(config_path: &Path, command: UserCommand) -> Result<()> {
    let config = load_config(config_path)?;
    let db = open_database(&config)?;

    match command {
        UserCommand::Add {
            username,
            displayname,
            groups,
        } => {
            let (user, token) = users::create_user(&db, &username, displayname.as_deref(), &groups)?;
            println!("uid:   {}", user.uid);
            println!("token: {}", token);
            println!("Store the token now; it cannot be shown again.");
        }
        UserCommand::List => {
            println!("{:<6} {:<20} {:<24} {}", "UID", "USERNAME", "DISPLAY NAME", "GROUPS");
            println!("{}", "-".repeat(72));
            for user in users::list_users(&db)? {
                println!(
                    "{:<6} {:<20} {:<24} {}",
                    user.uid,
                    user.username,
                    user.displayname,
                    user.groups.join(",")
                );
            }
        }
    }

    Ok(())
}
