//! Generic key-value store with hash objects and sorted sets, kept in two
//! SQLite tables. Keys follow the `entity:id[:relation]` convention.

use super::Database;
use crate::error::ForumResult;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::collections::HashMap;

pub type Object = HashMap<String, String>;

#[derive(Clone)]
pub struct KvDatabase {
    db: Database,
}

impl KvDatabase {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Runs `f` on a single pooled connection without a transaction.
    pub fn read<T>(&self, f: impl FnOnce(&Kv<'_>) -> ForumResult<T>) -> ForumResult<T> {
        let conn = self.db.get()?;
        f(&Kv::new(&conn))
    }

    /// Runs `f` inside one transaction; nothing is written unless `f` succeeds.
    pub fn atomic<T>(&self, f: impl FnOnce(&Kv<'_>) -> ForumResult<T>) -> ForumResult<T> {
        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&Kv::new(&tx))?;
        tx.commit()?;
        Ok(out)
    }
}

pub struct Kv<'c> {
    conn: &'c Connection,
}

impl<'c> Kv<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn set_object(&self, key: &str, fields: &[(&str, String)]) -> ForumResult<()> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO kv_objects (key, field, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(key, field) DO UPDATE SET value = ?3",
        )?;
        for (field, value) in fields {
            stmt.execute(params![key, field, value])?;
        }
        Ok(())
    }

    pub fn get_object(&self, key: &str) -> ForumResult<Option<Object>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT field, value FROM kv_objects WHERE key = ?")?;
        let rows = stmt.query_map([key], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut object = Object::new();
        for row in rows {
            let (field, value) = row?;
            object.insert(field, value);
        }
        Ok(if object.is_empty() { None } else { Some(object) })
    }

    pub fn get_objects(&self, keys: &[String]) -> ForumResult<Vec<Option<Object>>> {
        keys.iter().map(|key| self.get_object(key)).collect()
    }

    pub fn get_object_field(&self, key: &str, field: &str) -> ForumResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_objects WHERE key = ? AND field = ?",
                [key, field],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Increments an integer field, treating a missing field as 0.
    pub fn incr_object_field(&self, key: &str, field: &str) -> ForumResult<i64> {
        let current = self
            .get_object_field(key, field)?
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);
        let next = current + 1;
        self.set_object(key, &[(field, next.to_string())])?;
        Ok(next)
    }

    pub fn exists(&self, key: &str) -> ForumResult<bool> {
        let found: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM kv_objects WHERE key = ?1)
                 OR EXISTS(SELECT 1 FROM kv_zsets WHERE key = ?1)",
            [key],
            |row| row.get(0),
        )?;
        Ok(found != 0)
    }

    pub fn delete(&self, key: &str) -> ForumResult<()> {
        self.conn
            .execute("DELETE FROM kv_objects WHERE key = ?", [key])?;
        self.conn.execute("DELETE FROM kv_zsets WHERE key = ?", [key])?;
        Ok(())
    }

    pub fn sorted_set_add(&self, key: &str, score: f64, member: &str) -> ForumResult<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO kv_zsets (key, member, score) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key, member) DO UPDATE SET score = ?3",
            )?
            .execute(params![key, member, score])?;
        Ok(())
    }

    pub fn sorted_set_add_bulk(&self, entries: &[(String, f64, String)]) -> ForumResult<()> {
        for (key, score, member) in entries {
            self.sorted_set_add(key, *score, member)?;
        }
        Ok(())
    }

    pub fn sorted_set_remove(&self, key: &str, member: &str) -> ForumResult<()> {
        self.conn
            .prepare_cached("DELETE FROM kv_zsets WHERE key = ? AND member = ?")?
            .execute([key, member])?;
        Ok(())
    }

    pub fn sorted_sets_remove(&self, keys: &[String], member: &str) -> ForumResult<()> {
        for key in keys {
            self.sorted_set_remove(key, member)?;
        }
        Ok(())
    }

    pub fn is_sorted_set_member(&self, key: &str, member: &str) -> ForumResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM kv_zsets WHERE key = ? AND member = ?",
                [key, member],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Members in ascending score order.
    pub fn get_sorted_set_range(&self, key: &str) -> ForumResult<Vec<String>> {
        self.sorted_set_members(
            "SELECT member FROM kv_zsets WHERE key = ? ORDER BY score ASC, member ASC",
            key,
        )
    }

    /// Members in descending score order.
    pub fn get_sorted_set_rev_range(&self, key: &str) -> ForumResult<Vec<String>> {
        self.sorted_set_members(
            "SELECT member FROM kv_zsets WHERE key = ? ORDER BY score DESC, member DESC",
            key,
        )
    }

    pub fn get_sorted_sets_members(&self, keys: &[String]) -> ForumResult<Vec<Vec<String>>> {
        keys.iter()
            .map(|key| self.get_sorted_set_range(key))
            .collect()
    }

    fn sorted_set_members(&self, sql: &str, key: &str) -> ForumResult<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let members = stmt
            .query_map([key], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(members)
    }
}
