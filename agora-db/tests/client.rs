use agora_common::model::{
    Id,
    auth::{AuthToken, Authentication, PasswordDigest},
    comment::{Comment, CommentContent, CreateComment},
    like::LikeToggle,
    post::{CreatePost, Post, PostContent, PostTitle},
    user::{User, Username},
};
use agora_common::snowflake::{ProcessId, WorkerId};
use agora_db::client::{DbClient, DbError};
use std::sync::Arc;
use tempfile::TempDir;
use sqlx::SqlitePool;
use time::{OffsetDateTime, UtcDateTime};

fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}", dir.path().join("agora.db").display())
}

async fn setup() -> (TempDir, DbClient) {
    let dir = tempfile::tempdir().unwrap();
    let db = DbClient::connect(&database_url(&dir), WorkerId::new_unchecked(1), ProcessId::new_unchecked(0))
        .await
        .unwrap();

    (dir, db)
}

async fn user(db: &DbClient, name: &str) -> User {
    let digest = PasswordDigest::from_stored(format!("digest of {name}"));
    db.create_user(&Username::new(name).unwrap(), &digest)
        .await
        .unwrap()
}

async fn post(db: &DbClient, author: &User, title: &str, content: &str) -> Post {
    let create = CreatePost {
        title: PostTitle::new(title).unwrap(),
        content: PostContent::new(content).unwrap(),
    };
    db.create_post(author.id, &create).await.unwrap()
}

fn comment(content: &str, parent: Option<&Comment>) -> CreateComment {
    CreateComment {
        content: CommentContent::new(content).unwrap(),
        parent_id: parent.map(|parent| parent.id),
    }
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
    let (_dir, db) = setup().await;
    let alice = user(&db, "alice").await;

    let second = db
        .create_user(
            &Username::new("alice").unwrap(),
            &PasswordDigest::from_stored("other".to_owned()),
        )
        .await;
    assert!(matches!(second, Err(DbError::UsernameTaken(name)) if name.get() == "alice"));

    let (stored, digest) = db
        .fetch_credentials(&alice.username)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, alice);
    assert_eq!(digest.get(), "digest of alice");
    assert_eq!(db.fetch_user(alice.id).await.unwrap(), Some(alice));
}

#[tokio::test]
async fn unknown_users_are_none() {
    let (_dir, db) = setup().await;

    assert_eq!(db.fetch_user(Id::from(12345)).await.unwrap(), None);
    assert_eq!(
        db.fetch_user_by_username(&Username::new("nobody").unwrap())
            .await
            .unwrap(),
        None
    );
    assert!(
        db.fetch_credentials(&Username::new("nobody").unwrap())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn like_toggles_back_and_forth() {
    let (_dir, db) = setup().await;
    let alice = user(&db, "alice").await;
    let hello = post(&db, &alice, "Hello", "world").await;
    assert_eq!(hello.likes, 0);
    assert_eq!(hello.author, alice);

    let liked = db.toggle_like(alice.id, hello.id).await.unwrap();
    assert_eq!(liked, LikeToggle { liked: true, likes: 1 });
    assert!(db.has_liked(alice.id, hello.id).await.unwrap());

    let view = db.fetch_post(hello.id, Some(alice.id)).await.unwrap().unwrap();
    assert!(view.liked);
    assert_eq!(view.post.likes, 1);

    let unliked = db.toggle_like(alice.id, hello.id).await.unwrap();
    assert_eq!(unliked, LikeToggle { liked: false, likes: 0 });
    assert!(!db.has_liked(alice.id, hello.id).await.unwrap());
    assert_eq!(db.count_likes(hello.id).await.unwrap(), 0);
}

#[tokio::test]
async fn liking_a_missing_post_changes_nothing() {
    let (_dir, db) = setup().await;
    let alice = user(&db, "alice").await;
    let missing = Id::from(999);

    let result = db.toggle_like(alice.id, missing).await;

    assert!(matches!(result, Err(DbError::PostNotFound(id)) if id == missing));
    assert!(!db.has_liked(alice.id, missing).await.unwrap());
    assert_eq!(db.count_likes(missing).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_toggles_keep_the_counter_exact() {
    let (_dir, db) = setup().await;
    let db = Arc::new(db);
    let author = user(&db, "author").await;
    let target = post(&db, &author, "Busy", "post").await;

    let mut users = Vec::new();
    for index in 0..8 {
        users.push(user(&db, &format!("user{index}")).await);
    }

    let post_id = target.id;
    let mut tasks = Vec::new();
    for (index, liker) in users.iter().enumerate() {
        // Odd toggle counts end liked, even ones end where they started.
        let toggles = if index % 2 == 0 { 3 } else { 4 };
        for _ in 0..toggles {
            let db = Arc::clone(&db);
            let user_id = liker.id;
            tasks.push(tokio::spawn(async move {
                db.toggle_like(user_id, post_id).await.unwrap()
            }));
        }
    }
    for task in tasks {
        let toggle = task.await.unwrap();
        assert!(toggle.likes <= 8);
    }

    let rows = db.count_likes(target.id).await.unwrap();
    let stored = db.fetch_post(target.id, None).await.unwrap().unwrap().post.likes;
    assert_eq!(rows, 4);
    assert_eq!(stored, rows);
}

#[tokio::test]
async fn posts_are_listed_newest_first_with_viewer_likes() {
    let (_dir, db) = setup().await;
    let alice = user(&db, "alice").await;
    let bob = user(&db, "bob").await;
    let first = post(&db, &alice, "First", "one").await;
    let second = post(&db, &bob, "Second", "two").await;
    db.toggle_like(bob.id, first.id).await.unwrap();

    let for_bob = db.fetch_posts(Some(bob.id)).await.unwrap();
    let ids: Vec<_> = for_bob.iter().map(|view| view.post.id).collect();
    assert_eq!(ids, [second.id, first.id]);
    assert!(!for_bob[0].liked);
    assert!(for_bob[1].liked);
    assert_eq!(for_bob[1].post.likes, 1);

    let anonymous = db.fetch_posts(None).await.unwrap();
    assert!(anonymous.iter().all(|view| !view.liked));
}

#[tokio::test]
async fn replies_form_a_tree() {
    let (_dir, db) = setup().await;
    let alice = user(&db, "alice").await;
    let bob = user(&db, "bob").await;
    let hello = post(&db, &alice, "Hello", "world").await;

    assert!(db.fetch_comment_tree(hello.id).await.unwrap().is_empty());

    let root = db
        .create_comment(alice.id, hello.id, &comment("root", None))
        .await
        .unwrap();
    let reply = db
        .create_comment(bob.id, hello.id, &comment("reply", Some(&root)))
        .await
        .unwrap();
    assert_eq!(root.parent_id, None);
    assert_eq!(reply.parent_id, Some(root.id));
    assert_eq!(reply.author, bob);

    let tree = db.fetch_comment_tree(hello.id).await.unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].comment, root);
    assert_eq!(tree[0].replies.len(), 1);
    assert_eq!(tree[0].replies[0].comment, reply);
    assert!(tree[0].replies[0].replies.is_empty());
}

#[tokio::test]
async fn sibling_replies_keep_creation_order() {
    let (_dir, db) = setup().await;
    let alice = user(&db, "alice").await;
    let hello = post(&db, &alice, "Hello", "world").await;
    let root = db
        .create_comment(alice.id, hello.id, &comment("root", None))
        .await
        .unwrap();

    let mut expected = Vec::new();
    for index in 0..5 {
        let reply = db
            .create_comment(alice.id, hello.id, &comment(&format!("reply {index}"), Some(&root)))
            .await
            .unwrap();
        expected.push(reply.id);
    }

    let tree = db.fetch_comment_tree(hello.id).await.unwrap();
    let replies: Vec<_> = tree[0].replies.iter().map(|node| node.comment.id).collect();
    assert_eq!(replies, expected);
}

#[tokio::test]
async fn parent_on_another_post_is_rejected() {
    let (_dir, db) = setup().await;
    let alice = user(&db, "alice").await;
    let first = post(&db, &alice, "First", "one").await;
    let second = post(&db, &alice, "Second", "two").await;
    let foreign = db
        .create_comment(alice.id, first.id, &comment("on first", None))
        .await
        .unwrap();

    let result = db
        .create_comment(alice.id, second.id, &comment("sneaky", Some(&foreign)))
        .await;

    assert!(matches!(
        result,
        Err(DbError::ParentCommentNotFound { post_id, parent_id })
            if post_id == second.id && parent_id == foreign.id
    ));
    assert!(db.fetch_comments(second.id).await.unwrap().is_empty());
    assert_eq!(db.fetch_comments(first.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn comment_on_missing_post_is_rejected() {
    let (_dir, db) = setup().await;
    let alice = user(&db, "alice").await;
    let missing = Id::from(4242);

    let result = db
        .create_comment(alice.id, missing, &comment("hello?", None))
        .await;

    assert!(matches!(result, Err(DbError::PostNotFound(id)) if id == missing));
    assert!(db.fetch_comments(missing).await.unwrap().is_empty());
}

#[tokio::test]
async fn authentications_can_be_stored_and_revoked() {
    let (_dir, db) = setup().await;
    let alice = user(&db, "alice").await;
    let token = AuthToken::generate_random(alice.id);
    let token_hash = token.hash().unwrap();

    let authentication = Authentication {
        user: alice.id,
        token_hash: token_hash.clone(),
        created_at: OffsetDateTime::now_utc(),
        expires_after: None,
    };
    db.create_auth(&authentication).await.unwrap();

    let stored = db.fetch_auth(&token_hash).await.unwrap().unwrap();
    assert_eq!(stored.user, alice.id);
    assert_eq!(stored.token_hash, token_hash);
    assert_eq!(stored.expires_after, None);

    assert!(db.delete_auth(&token_hash).await.unwrap());
    assert!(!db.delete_auth(&token_hash).await.unwrap());
    assert!(db.fetch_auth(&token_hash).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn comment_order_agrees_with_id_order() {
    let (_dir, db) = setup().await;
    let db = Arc::new(db);
    let alice = user(&db, "alice").await;
    let hello = post(&db, &alice, "Hello", "world").await;

    let mut tasks = Vec::new();
    for index in 0..32 {
        let db = Arc::clone(&db);
        let (author, post_id) = (alice.id, hello.id);
        tasks.push(tokio::spawn(async move {
            db.create_comment(author, post_id, &comment(&format!("comment {index}"), None))
                .await
                .unwrap()
        }));
    }
    for task in tasks {
        let created = task.await.unwrap();
        let encoded = UtcDateTime::from(created.id.snowflake().timestamp());
        assert_eq!(created.created_at, OffsetDateTime::from(encoded));
    }

    let ids: Vec<u64> = db
        .fetch_comments(hello.id)
        .await
        .unwrap()
        .iter()
        .map(|comment| comment.id.into())
        .collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids.len(), 32);
    assert_eq!(ids, sorted);
}

#[tokio::test]
async fn deleting_a_user_revokes_their_tokens() {
    let (dir, db) = setup().await;
    let alice = user(&db, "alice").await;
    let token_hash = AuthToken::generate_random(alice.id).hash().unwrap();
    db.create_auth(&Authentication {
        user: alice.id,
        token_hash: token_hash.clone(),
        created_at: OffsetDateTime::now_utc(),
        expires_after: None,
    })
    .await
    .unwrap();

    let raw = SqlitePool::connect(&database_url(&dir)).await.unwrap();
    sqlx::query("DELETE FROM users WHERE username = 'alice'")
        .execute(&raw)
        .await
        .unwrap();

    assert_eq!(db.fetch_user(alice.id).await.unwrap(), None);
    assert!(db.fetch_auth(&token_hash).await.unwrap().is_none());
}
