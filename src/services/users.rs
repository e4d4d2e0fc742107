use crate::error::{ForumError, ForumResult};
use crate::models::User;
use crate::Database;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

const TOKEN_PREFIX: &str = "cb_";
const TOKEN_BYTE_LENGTH: usize = 32;
const MAX_USERNAME_LENGTH: usize = 100;

fn generate_raw_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTE_LENGTH];
    rand::thread_rng().fill(&mut bytes);
    format!("{}{}", TOKEN_PREFIX, URL_SAFE_NO_PAD.encode(bytes))
}

/// SHA-256 hash a raw token for storage.
fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

fn validate_username(username: &str) -> ForumResult<()> {
    if username.is_empty() {
        return Err(ForumError::invalid("username cannot be empty"));
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(ForumError::invalid(format!(
            "username must be {} characters or less",
            MAX_USERNAME_LENGTH
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ForumError::invalid(
            "username can only contain letters, numbers, underscores, and hyphens",
        ));
    }
    Ok(())
}

/// Creates a user and returns it with its API token. The raw token is only
/// available here; the database keeps its hash.
pub fn create_user(
    db: &Database,
    username: &str,
    displayname: Option<&str>,
    groups: &[String],
) -> ForumResult<(User, String)> {
    validate_username(username)?;
    let displayname = displayname
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(username);
    let userslug = slug::slugify(username);
    let raw_token = generate_raw_token();

    let mut conn = db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(
        "INSERT INTO users (username, displayname, userslug, token_hash) VALUES (?1, ?2, ?3, ?4)",
        params![username, displayname, userslug, hash_token(&raw_token)],
    )?;
    let uid = tx.last_insert_rowid();
    for group in groups {
        tx.execute(
            "INSERT OR IGNORE INTO group_members (group_name, uid) VALUES (?1, ?2)",
            params![group, uid],
        )?;
    }
    tx.commit()?;

    let user = get_user(db, uid)?.ok_or(ForumError::NotFound("user"))?;
    tracing::info!("Created user {} (uid {})", user.username, uid);
    Ok((user, raw_token))
}

/// Resolves a raw API token to its user id.
pub fn uid_for_token(db: &Database, raw_token: &str) -> ForumResult<Option<i64>> {
    if !raw_token.starts_with(TOKEN_PREFIX) {
        return Ok(None);
    }
    let conn = db.get()?;
    let uid = conn
        .query_row(
            "SELECT uid FROM users WHERE token_hash = ?",
            [hash_token(raw_token)],
            |row| row.get(0),
        )
        .optional()?;
    Ok(uid)
}

fn groups_of(conn: &Connection, uids: &[i64]) -> ForumResult<HashMap<i64, Vec<String>>> {
    let mut groups: HashMap<i64, Vec<String>> = HashMap::new();
    if uids.is_empty() {
        return Ok(groups);
    }
    let placeholders = vec!["?"; uids.len()].join(",");
    let sql = format!(
        "SELECT uid, group_name FROM group_members WHERE uid IN ({}) ORDER BY group_name",
        placeholders
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(uids.iter()), |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (uid, group) = row?;
        groups.entry(uid).or_default().push(group);
    }
    Ok(groups)
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        uid: row.get(0)?,
        username: row.get(1)?,
        displayname: row.get(2)?,
        userslug: row.get(3)?,
        picture: row.get(4)?,
        signature: row.get(5)?,
        groups: Vec::new(),
        created_at: row.get(6)?,
    })
}

const USER_COLUMNS: &str = "uid, username, displayname, userslug, picture, signature, created_at";

pub fn get_user(db: &Database, uid: i64) -> ForumResult<Option<User>> {
    Ok(get_users(db, &[uid])?.remove(&uid))
}

/// Batch lookup keyed by uid; unknown uids are absent from the map.
pub fn get_users(db: &Database, uids: &[i64]) -> ForumResult<HashMap<i64, User>> {
    let mut users = HashMap::new();
    if uids.is_empty() {
        return Ok(users);
    }
    let conn = db.get()?;
    let sql = format!(
        "SELECT {} FROM users WHERE uid IN ({})",
        USER_COLUMNS,
        vec!["?"; uids.len()].join(",")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(uids.iter()), row_to_user)?;
    for row in rows {
        let user = row?;
        users.insert(user.uid, user);
    }
    let mut groups = groups_of(&conn, uids)?;
    for user in users.values_mut() {
        user.groups = groups.remove(&user.uid).unwrap_or_default();
    }
    Ok(users)
}

pub fn list_users(db: &Database) -> ForumResult<Vec<User>> {
    let uids: Vec<i64> = {
        let conn = db.get()?;
        let mut stmt = conn.prepare("SELECT uid FROM users ORDER BY uid")?;
        let uids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        uids
    };
    let mut by_uid = get_users(db, &uids)?;
    Ok(uids.iter().filter_map(|uid| by_uid.remove(uid)).collect())
}
