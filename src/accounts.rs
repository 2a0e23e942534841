// SPDX-License-Identifier: GPL-3.0-only

//! Local user accounts backed by SQLite
//!
//! One table, `users(username, password, avatar)`. Passwords are stored as
//! lowercase hex SHA-256 digests without a salt, which is what existing
//! account databases contain; `avatar` is the path of an image file.

use crate::constants::accounts::MIN_PASSWORD_LEN;
use crate::errors::{AccountError, AvatarError};
use crate::media::has_image_signature;
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

pub type AccountResult<T> = Result<T, AccountError>;

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    /// Hex SHA-256 of the password
    pub password_hash: String,
    pub avatar: PathBuf,
}

/// SQLite user store
pub struct UserStore {
    conn: Mutex<Connection>,
}

impl UserStore {
    /// Open (or create) the database file at `path`
    pub fn open(path: &Path) -> AccountResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self::init(conn)?;
        info!(path = %path.display(), "User store opened");
        Ok(store)
    }

    /// In-memory store, discarded on drop
    pub fn open_in_memory() -> AccountResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> AccountResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                password TEXT,
                avatar TEXT
            )",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Register a new user
    ///
    /// Checks run in order: unique username, password length, avatar.
    pub fn register(&self, username: &str, password: &str, avatar: &Path) -> AccountResult<()> {
        if self.get_user(username)?.is_some() {
            return Err(AccountError::UserExists);
        }
        check_password(password)?;
        verify_avatar(avatar)?;

        self.conn().execute(
            "INSERT INTO users (username, password, avatar) VALUES (?1, ?2, ?3)",
            params![username, hash_password(password), avatar.to_string_lossy()],
        )?;
        info!(username, "User registered");
        Ok(())
    }

    /// Look up a user; `None` if not registered
    pub fn get_user(&self, username: &str) -> AccountResult<Option<User>> {
        let user = self
            .conn()
            .query_row(
                "SELECT username, password, avatar FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok(User {
                        username: row.get(0)?,
                        password_hash: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        avatar: PathBuf::from(row.get::<_, Option<String>>(2)?.unwrap_or_default()),
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    /// Set a new password; the old one is not required
    pub fn change_password(&self, username: &str, new_password: &str) -> AccountResult<()> {
        if self.get_user(username)?.is_none() {
            return Err(AccountError::UserNotFound);
        }
        check_password(new_password)?;

        self.conn().execute(
            "UPDATE users SET password = ?1 WHERE username = ?2",
            params![hash_password(new_password), username],
        )?;
        info!(username, "Password changed");
        Ok(())
    }

    /// Replace the avatar after checking credentials
    pub fn change_avatar(&self, username: &str, password: &str, avatar: &Path) -> AccountResult<()> {
        self.verify_login(username, password)?;
        verify_avatar(avatar)?;

        self.conn().execute(
            "UPDATE users SET avatar = ?1 WHERE username = ?2",
            params![avatar.to_string_lossy(), username],
        )?;
        info!(username, avatar = %avatar.display(), "Avatar changed");
        Ok(())
    }

    /// Check credentials
    pub fn verify_login(&self, username: &str, password: &str) -> AccountResult<()> {
        let user = self.get_user(username)?.ok_or(AccountError::UserNotFound)?;
        if user.password_hash != hash_password(password) {
            debug!(username, "Password mismatch");
            return Err(AccountError::WrongPassword);
        }
        Ok(())
    }

    pub fn get_avatar(&self, username: &str) -> AccountResult<PathBuf> {
        self.get_user(username)?
            .map(|user| user.avatar)
            .ok_or(AccountError::UserNotFound)
    }

    /// Delete an account after checking credentials
    pub fn delete_user(&self, username: &str, password: &str) -> AccountResult<()> {
        self.verify_login(username, password)?;
        self.conn()
            .execute("DELETE FROM users WHERE username = ?1", params![username])?;
        info!(username, "User deleted");
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lowercase hex SHA-256 of the UTF-8 password
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The avatar must be an existing file with an image signature
pub fn verify_avatar(path: &Path) -> Result<(), AvatarError> {
    if !path.is_file() {
        return Err(AvatarError::Missing);
    }
    if !has_image_signature(path) {
        return Err(AvatarError::NotAnImage);
    }
    Ok(())
}

fn check_password(password: &str) -> AccountResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountError::PasswordTooShort);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::Frame;
    use tempfile::TempDir;

    fn avatar(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("avatar.png");
        Frame::filled(8, 8, [200, 10, 10]).save(&path).unwrap();
        path
    }

    #[test]
    fn test_hash_password_known_digest() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_register_and_login() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::open_in_memory().unwrap();
        store.register("alice", "secret1", &avatar(&dir)).unwrap();

        assert!(store.verify_login("alice", "secret1").is_ok());
        assert!(matches!(
            store.verify_login("alice", "wrong!!"),
            Err(AccountError::WrongPassword)
        ));
        assert!(matches!(
            store.verify_login("bob", "secret1"),
            Err(AccountError::UserNotFound)
        ));
    }

    #[test]
    fn test_register_rules_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::open_in_memory().unwrap();
        let good = avatar(&dir);
        store.register("alice", "secret1", &good).unwrap();

        // Duplicate wins over a short password
        assert!(matches!(
            store.register("alice", "x", &good),
            Err(AccountError::UserExists)
        ));
        assert!(matches!(
            store.register("bob", "12345", &good),
            Err(AccountError::PasswordTooShort)
        ));
        assert!(matches!(
            store.register("bob", "123456", &dir.path().join("none.png")),
            Err(AccountError::InvalidAvatar(AvatarError::Missing))
        ));

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "not an image").unwrap();
        assert!(matches!(
            store.register("bob", "123456", &text),
            Err(AccountError::InvalidAvatar(AvatarError::NotAnImage))
        ));
        assert!(store.get_user("bob").unwrap().is_none());
    }

    #[test]
    fn test_change_password() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::open_in_memory().unwrap();
        store.register("alice", "secret1", &avatar(&dir)).unwrap();

        assert!(matches!(
            store.change_password("alice", "short"),
            Err(AccountError::PasswordTooShort)
        ));
        store.change_password("alice", "secret2").unwrap();
        assert!(store.verify_login("alice", "secret2").is_ok());
        assert!(matches!(
            store.change_password("nobody", "secret2"),
            Err(AccountError::UserNotFound)
        ));
    }

    #[test]
    fn test_change_avatar_requires_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::open_in_memory().unwrap();
        let first = avatar(&dir);
        store.register("alice", "secret1", &first).unwrap();

        let second = dir.path().join("second.png");
        Frame::filled(4, 4, [0, 0, 255]).save(&second).unwrap();

        assert!(matches!(
            store.change_avatar("alice", "nope!!", &second),
            Err(AccountError::WrongPassword)
        ));
        assert_eq!(store.get_avatar("alice").unwrap(), first);

        store.change_avatar("alice", "secret1", &second).unwrap();
        assert_eq!(store.get_avatar("alice").unwrap(), second);
    }

    #[test]
    fn test_delete_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::open_in_memory().unwrap();
        store.register("alice", "secret1", &avatar(&dir)).unwrap();

        assert!(matches!(
            store.delete_user("alice", "bad-pass"),
            Err(AccountError::WrongPassword)
        ));
        store.delete_user("alice", "secret1").unwrap();
        assert!(matches!(
            store.get_avatar("alice"),
            Err(AccountError::UserNotFound)
        ));
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("users.db");
        let pic = avatar(&dir);
        {
            let store = UserStore::open(&db).unwrap();
            store.register("alice", "secret1", &pic).unwrap();
        }
        let store = UserStore::open(&db).unwrap();
        let user = store.get_user("alice").unwrap().unwrap();
        assert_eq!(user.password_hash, hash_password("secret1"));
        assert_eq!(user.avatar, pic);
    }
}
