use chrono::Utc;

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

use async_trait::async_trait;

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Fails with `Conflict` when the username is taken.
    async fn create_user(&self, new: NewUser) -> RepoResult<User>;
    async fn get_user(&self, id: Id) -> RepoResult<User>;
    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    async fn find_users(&self, ids: &[Id]) -> RepoResult<Vec<User>>;
}

#[async_trait]
pub trait BoardRepo: Send + Sync {
    /// All boards, oldest first.
    async fn list_boards(&self) -> RepoResult<Vec<Board>>;
    async fn get_board(&self, id: Id) -> RepoResult<Board>;
    /// Creates the board and, when given, its first message in one step.
    async fn create_board(&self, new: NewBoard, first_message: Option<String>) -> RepoResult<Board>;
    async fn update_board(&self, id: Id, upd: UpdateBoard) -> RepoResult<Board>;
    /// Removes the board together with its messages; returns how many
    /// messages went with it.
    async fn delete_board(&self, id: Id) -> RepoResult<usize>;
}

#[async_trait]
pub trait MessageRepo: Send + Sync {
    /// Messages of a board in creation order, optionally only the first `limit`.
    async fn list_messages(&self, board_id: Id, limit: Option<usize>) -> RepoResult<Vec<Message>>;
    async fn count_messages(&self, board_id: Id) -> RepoResult<usize>;
    async fn create_message(&self, new: NewMessage) -> RepoResult<Message>;
}

pub trait Repo: UserRepo + BoardRepo + MessageRepo {}

impl<T> Repo for T where T: UserRepo + BoardRepo + MessageRepo {}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

    const SNAPSHOT_FILE: &str = "state.json";

    // BTreeMap keeps iteration in id order, which is creation order.
    #[derive(Default, Serialize, Deserialize)]
    struct State {
        users: BTreeMap<Id, User>,
        boards: BTreeMap<Id, Board>,
        messages: BTreeMap<Id, Message>,
        next_id: Id,
        // bumped on every mutation; orders snapshot writes
        #[serde(skip)]
        revision: u64,
    }

    impl State {
        fn next_id(&mut self) -> Id {
            self.next_id += 1;
            self.next_id
        }

        fn insert_message(&mut self, board_id: Id, content: String, creator_id: Id) -> Message {
            let id = self.next_id();
            let message = Message { id, board_id, content, creator_id, created_at: Utc::now() };
            self.messages.insert(id, message.clone());
            message
        }
    }

    /// Serialised state tagged with the revision it was taken at.
    struct Snapshot {
        revision: u64,
        bytes: Vec<u8>,
    }

    struct SnapshotFile {
        path: PathBuf,
        // revision last written to `path`
        written: Mutex<u64>,
    }

    #[derive(Clone)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot: Option<Arc<SnapshotFile>>, // None: never touches disk
    }

    impl InMemRepo {
        /// Snapshot-backed repository; loads `<dir>/state.json` when present.
        pub fn with_data_dir(dir: impl AsRef<Path>) -> Self {
            let path = dir.as_ref().join(SNAPSHOT_FILE);
            let state = Self::load_state_from(&path);
            Self {
                state: Arc::new(RwLock::new(state)),
                snapshot: Some(Arc::new(SnapshotFile { path, written: Mutex::new(0) })),
            }
        }

        /// Purely in-memory; nothing is loaded or written.
        pub fn ephemeral() -> Self {
            Self { state: Arc::new(RwLock::new(State::default())), snapshot: None }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        log::info!("loaded snapshot '{}'", path.display());
                        s
                    }
                    Err(e) => {
                        log::warn!("failed to parse snapshot '{}': {e}; starting empty", path.display());
                        State::default()
                    }
                },
                Err(e) => {
                    log::info!("no snapshot at '{}' ({e}); starting empty", path.display());
                    State::default()
                }
            }
        }

        fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
            self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
            self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        /// Serialises the state; call while still holding the write guard.
        fn take_snapshot(&self, s: &mut State) -> Option<Snapshot> {
            self.snapshot.as_ref()?;
            s.revision += 1;
            match serde_json::to_vec_pretty(&*s) {
                Ok(bytes) => Some(Snapshot { revision: s.revision, bytes }),
                Err(e) => {
                    log::error!("failed to serialise snapshot: {e}");
                    None
                }
            }
        }

        /// Writes a snapshot unless a newer one already reached disk.
        fn persist(&self, snap: Option<Snapshot>) {
            let (Some(file), Some(snap)) = (self.snapshot.as_ref(), snap) else { return };
            let mut written = match file.written.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if snap.revision <= *written {
                log::debug!("skipping stale snapshot revision {}", snap.revision);
                return;
            }
            if let Some(dir) = file.path.parent() {
                let _ = std::fs::create_dir_all(dir);
            }
            let tmp = file.path.with_extension("json.tmp");
            let result = std::fs::write(&tmp, &snap.bytes).and_then(|_| std::fs::rename(&tmp, &file.path));
            match result {
                Ok(()) => *written = snap.revision,
                Err(e) => log::error!("failed to write snapshot '{}': {e}", file.path.display()),
            }
        }
    }

    #[async_trait]
    impl UserRepo for InMemRepo {
        async fn create_user(&self, new: NewUser) -> RepoResult<User> {
            let mut s = self.write()?;
            if s.users.values().any(|u| u.username == new.username) {
                return Err(RepoError::Conflict);
            }
            let id = s.next_id();
            let user = User {
                id,
                username: new.username,
                password_hash: new.password_hash,
                created_at: Utc::now(),
            };
            s.users.insert(id, user.clone());
            let snap = self.take_snapshot(&mut s);
            drop(s);
            self.persist(snap);
            Ok(user)
        }
        async fn get_user(&self, id: Id) -> RepoResult<User> {
            self.read()?.users.get(&id).cloned().ok_or(RepoError::NotFound)
        }
        async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
            Ok(self.read()?.users.values().find(|u| u.username == username).cloned())
        }
        async fn find_users(&self, ids: &[Id]) -> RepoResult<Vec<User>> {
            let s = self.read()?;
            Ok(ids.iter().filter_map(|id| s.users.get(id).cloned()).collect())
        }
    }

    #[async_trait]
    impl BoardRepo for InMemRepo {
        async fn list_boards(&self) -> RepoResult<Vec<Board>> {
            Ok(self.read()?.boards.values().cloned().collect())
        }
        async fn get_board(&self, id: Id) -> RepoResult<Board> {
            self.read()?.boards.get(&id).cloned().ok_or(RepoError::NotFound)
        }
        async fn create_board(&self, new: NewBoard, first_message: Option<String>) -> RepoResult<Board> {
            let mut s = self.write()?;
            if !s.users.contains_key(&new.creator_id) {
                return Err(RepoError::NotFound);
            }
            let id = s.next_id();
            let now = Utc::now();
            let board = Board {
                id,
                topic: new.topic,
                description: new.description,
                creator_id: new.creator_id,
                created_at: now,
                updated_at: now,
            };
            s.boards.insert(id, board.clone());
            if let Some(content) = first_message {
                s.insert_message(id, content, new.creator_id);
            }
            let snap = self.take_snapshot(&mut s);
            drop(s);
            self.persist(snap);
            Ok(board)
        }
        async fn update_board(&self, id: Id, upd: UpdateBoard) -> RepoResult<Board> {
            let mut s = self.write()?;
            let board = s.boards.get_mut(&id).ok_or(RepoError::NotFound)?;
            board.topic = upd.topic;
            board.description = upd.description;
            board.updated_at = Utc::now();
            let updated = board.clone();
            let snap = self.take_snapshot(&mut s);
            drop(s);
            self.persist(snap);
            Ok(updated)
        }
        async fn delete_board(&self, id: Id) -> RepoResult<usize> {
            let mut s = self.write()?;
            if s.boards.remove(&id).is_none() {
                return Err(RepoError::NotFound);
            }
            let before = s.messages.len();
            s.messages.retain(|_, m| m.board_id != id);
            let removed = before - s.messages.len();
            let snap = self.take_snapshot(&mut s);
            drop(s);
            self.persist(snap);
            Ok(removed)
        }
    }

    #[async_trait]
    impl MessageRepo for InMemRepo {
        async fn list_messages(&self, board_id: Id, limit: Option<usize>) -> RepoResult<Vec<Message>> {
            let s = self.read()?;
            let iter = s.messages.values().filter(|m| m.board_id == board_id).cloned();
            Ok(match limit {
                Some(n) => iter.take(n).collect(),
                None => iter.collect(),
            })
        }
        async fn count_messages(&self, board_id: Id) -> RepoResult<usize> {
            Ok(self.read()?.messages.values().filter(|m| m.board_id == board_id).count())
        }
        async fn create_message(&self, new: NewMessage) -> RepoResult<Message> {
            let mut s = self.write()?;
            if !s.boards.contains_key(&new.board_id) {
                return Err(RepoError::NotFound);
            }
            let message = s.insert_message(new.board_id, new.content, new.creator_id);
            let snap = self.take_snapshot(&mut s);
            drop(s);
            self.persist(snap);
            Ok(message)
        }
    }

}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres};

    const UNIQUE_VIOLATION: &str = "23505";
    const FOREIGN_KEY_VIOLATION: &str = "23503";

    fn map_err(e: sqlx::Error) -> RepoError {
        match &e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => RepoError::Conflict,
            // referenced board or user is gone
            sqlx::Error::Database(db) if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) => RepoError::NotFound,
            _ => RepoError::Internal(e.to_string()),
        }
    }

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

        /// Applies the embedded schema migrations.
        pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
            sqlx::migrate!("./migrations").run(&self.pool).await
        }
    }

    #[async_trait]
    impl UserRepo for PgRepo {
        async fn create_user(&self, new: NewUser) -> RepoResult<User> {
            sqlx::query_as::<_, User>(
                "INSERT INTO users (username, password_hash) VALUES ($1,$2) RETURNING id, username, password_hash, created_at"
            )
            .bind(&new.username)
            .bind(&new.password_hash)
            .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn get_user(&self, id: Id) -> RepoResult<User> {
            sqlx::query_as::<_, User>("SELECT id, username, password_hash, created_at FROM users WHERE id=$1")
                .bind(id)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
            sqlx::query_as::<_, User>("SELECT id, username, password_hash, created_at FROM users WHERE username=$1")
                .bind(username)
                .fetch_optional(&self.pool).await.map_err(map_err)
        }
        async fn find_users(&self, ids: &[Id]) -> RepoResult<Vec<User>> {
            sqlx::query_as::<_, User>("SELECT id, username, password_hash, created_at FROM users WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool).await.map_err(map_err)
        }
    }

    const BOARD_COLUMNS: &str = "id, topic, description, creator_id, created_at, updated_at";

    #[async_trait]
    impl BoardRepo for PgRepo {
        async fn list_boards(&self) -> RepoResult<Vec<Board>> {
            sqlx::query_as::<_, Board>(&format!("SELECT {BOARD_COLUMNS} FROM boards ORDER BY id"))
                .fetch_all(&self.pool).await.map_err(map_err)
        }
        async fn get_board(&self, id: Id) -> RepoResult<Board> {
            sqlx::query_as::<_, Board>(&format!("SELECT {BOARD_COLUMNS} FROM boards WHERE id=$1"))
                .bind(id)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn create_board(&self, new: NewBoard, first_message: Option<String>) -> RepoResult<Board> {
            let mut tx = self.pool.begin().await.map_err(map_err)?;
            let board = sqlx::query_as::<_, Board>(&format!(
                "INSERT INTO boards (topic, description, creator_id) VALUES ($1,$2,$3) RETURNING {BOARD_COLUMNS}"
            ))
            .bind(&new.topic)
            .bind(new.description.as_ref())
            .bind(new.creator_id)
            .fetch_one(&mut *tx).await.map_err(map_err)?;
            if let Some(content) = first_message {
                sqlx::query("INSERT INTO messages (board_id, content, creator_id) VALUES ($1,$2,$3)")
                    .bind(board.id)
                    .bind(&content)
                    .bind(new.creator_id)
                    .execute(&mut *tx).await.map_err(map_err)?;
            }
            tx.commit().await.map_err(map_err)?;
            Ok(board)
        }
        async fn update_board(&self, id: Id, upd: UpdateBoard) -> RepoResult<Board> {
            sqlx::query_as::<_, Board>(&format!(
                "UPDATE boards SET topic=$2, description=$3, updated_at=now() WHERE id=$1 RETURNING {BOARD_COLUMNS}"
            ))
            .bind(id)
            .bind(&upd.topic)
            .bind(upd.description.as_ref())
            .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn delete_board(&self, id: Id) -> RepoResult<usize> {
            let mut tx = self.pool.begin().await.map_err(map_err)?;
            let messages = sqlx::query("DELETE FROM messages WHERE board_id=$1")
                .bind(id)
                .execute(&mut *tx).await.map_err(map_err)?
                .rows_affected();
            let boards = sqlx::query("DELETE FROM boards WHERE id=$1")
                .bind(id)
                .execute(&mut *tx).await.map_err(map_err)?
                .rows_affected();
            if boards == 0 {
                // dropping tx rolls back
                return Err(RepoError::NotFound);
            }
            tx.commit().await.map_err(map_err)?;
            Ok(messages as usize)
        }
    }

    const MESSAGE_COLUMNS: &str = "id, board_id, content, creator_id, created_at";

    #[async_trait]
    impl MessageRepo for PgRepo {
        async fn list_messages(&self, board_id: Id, limit: Option<usize>) -> RepoResult<Vec<Message>> {
            // LIMIT NULL means no limit
            sqlx::query_as::<_, Message>(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE board_id=$1 ORDER BY id ASC LIMIT $2"
            ))
            .bind(board_id)
            .bind(limit.map(|n| n as i64))
            .fetch_all(&self.pool).await.map_err(map_err)
        }
        async fn count_messages(&self, board_id: Id) -> RepoResult<usize> {
            let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE board_id=$1")
                .bind(board_id)
                .fetch_one(&self.pool).await.map_err(map_err)?;
            Ok(n as usize)
        }
        async fn create_message(&self, new: NewMessage) -> RepoResult<Message> {
            sqlx::query_as::<_, Message>(&format!(
                "INSERT INTO messages (board_id, content, creator_id) VALUES ($1,$2,$3) RETURNING {MESSAGE_COLUMNS}"
            ))
            .bind(new.board_id)
            .bind(&new.content)
            .bind(new.creator_id)
            .fetch_one(&self.pool).await.map_err(map_err)
        }
    }
}
