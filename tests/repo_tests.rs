#![cfg(feature = "inmem-store")]

use msgboard::models::{NewBoard, NewMessage, NewUser, UpdateBoard};
use msgboard::repo::{inmem::InMemRepo, RepoError};
// Bring trait method namespaces into scope so calls on InMemRepo resolve.
use msgboard::repo::{BoardRepo, MessageRepo, UserRepo};

async fn user(r: &InMemRepo, name: &str) -> msgboard::models::User {
    r.create_user(NewUser { username: name.into(), password_hash: "h".into() }).await.unwrap()
}

fn new_board(topic: &str, creator_id: i64) -> NewBoard {
    NewBoard { topic: topic.into(), description: None, creator_id }
}

#[tokio::test]
async fn users_are_unique_by_name() {
    let r = InMemRepo::ephemeral();
    let a = user(&r, "aspen").await;
    let err = r
        .create_user(NewUser { username: "aspen".into(), password_hash: "x".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict));

    assert_eq!(r.get_user(a.id).await.unwrap().username, "aspen");
    assert!(r.find_user_by_username("nobody").await.unwrap().is_none());
    assert!(matches!(r.get_user(999).await, Err(RepoError::NotFound)));

    let b = user(&r, "rowan").await;
    let found = r.find_users(&[b.id, 12345, a.id]).await.unwrap();
    assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn board_crud() {
    let r = InMemRepo::ephemeral();
    assert!(r.list_boards().await.unwrap().is_empty());
    let u = user(&r, "aspen").await;

    let b = r.create_board(new_board("Tech", u.id), None).await.unwrap();
    assert_eq!(b.topic, "Tech");
    assert_eq!(b.creator_id, u.id);

    let updated = r
        .update_board(b.id, UpdateBoard { topic: "Games".into(), description: Some("fun".into()) })
        .await
        .unwrap();
    assert_eq!(updated.topic, "Games");
    assert_eq!(updated.description.as_deref(), Some("fun"));
    assert_eq!(updated.creator_id, u.id);
    assert!(updated.updated_at >= updated.created_at);

    let missing = r.update_board(999, UpdateBoard { topic: "x".into(), description: None }).await;
    assert!(matches!(missing, Err(RepoError::NotFound)));

    // unknown creator
    assert!(matches!(r.create_board(new_board("Orphan", 777), None).await, Err(RepoError::NotFound)));
}

#[tokio::test]
async fn boards_and_messages_keep_creation_order() {
    let r = InMemRepo::ephemeral();
    let u = user(&r, "aspen").await;
    let first = r.create_board(new_board("First", u.id), Some("opening".into())).await.unwrap();
    let second = r.create_board(new_board("Second", u.id), None).await.unwrap();
    for i in 1..=4 {
        r.create_message(NewMessage { board_id: first.id, content: format!("m{i}"), creator_id: u.id })
            .await
            .unwrap();
    }

    let ids: Vec<_> = r.list_boards().await.unwrap().into_iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);

    let all: Vec<_> = r.list_messages(first.id, None).await.unwrap().into_iter().map(|m| m.content).collect();
    assert_eq!(all, vec!["opening", "m1", "m2", "m3", "m4"]);
    let preview = r.list_messages(first.id, Some(2)).await.unwrap();
    assert_eq!(preview.len(), 2);
    assert_eq!(preview[1].content, "m1");
    assert_eq!(r.count_messages(second.id).await.unwrap(), 0);

    let err = r
        .create_message(NewMessage { board_id: 4242, content: "x".into(), creator_id: u.id })
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound));
}

#[tokio::test]
async fn delete_board_cascades_only_its_messages() {
    let r = InMemRepo::ephemeral();
    let u = user(&r, "aspen").await;
    let doomed = r.create_board(new_board("Doomed", u.id), Some("a".into())).await.unwrap();
    let kept = r.create_board(new_board("Kept", u.id), Some("b".into())).await.unwrap();
    r.create_message(NewMessage { board_id: doomed.id, content: "c".into(), creator_id: u.id })
        .await
        .unwrap();

    assert_eq!(r.delete_board(doomed.id).await.unwrap(), 2);
    assert!(matches!(r.get_board(doomed.id).await, Err(RepoError::NotFound)));
    assert!(r.list_messages(doomed.id, None).await.unwrap().is_empty());
    assert_eq!(r.count_messages(kept.id).await.unwrap(), 1);
    assert!(matches!(r.delete_board(doomed.id).await, Err(RepoError::NotFound)));
}

#[tokio::test]
async fn snapshot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (board_id, user_id) = {
        let r = InMemRepo::with_data_dir(dir.path());
        let u = user(&r, "aspen").await;
        let b = r.create_board(new_board("Persisted", u.id), Some("hello".into())).await.unwrap();
        (b.id, u.id)
    };
    assert!(dir.path().join("state.json").exists());

    let r = InMemRepo::with_data_dir(dir.path());
    assert_eq!(r.get_board(board_id).await.unwrap().topic, "Persisted");
    assert_eq!(r.get_user(user_id).await.unwrap().username, "aspen");
    assert_eq!(r.list_messages(board_id, None).await.unwrap()[0].content, "hello");

    // ids keep increasing after reload
    let next = r.create_board(new_board("Next", user_id), None).await.unwrap();
    assert!(next.id > board_id);
}

#[tokio::test]
async fn corrupt_snapshot_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("state.json"), b"{ not json").unwrap();
    let r = InMemRepo::with_data_dir(dir.path());
    assert!(r.list_boards().await.unwrap().is_empty());
}
