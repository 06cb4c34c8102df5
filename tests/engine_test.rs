use chrono::{Duration, Utc};
use tempfile::TempDir;

use wordsmith::config::FeedConfig;
use wordsmith::db;
use wordsmith::db::models::{Role, TokenPurpose, User};
use wordsmith::engine::feed::FeedParams;
use wordsmith::engine::{engagement, feed, relationships, tokens};
use wordsmith::error::AppError;
use wordsmith::store::{EdgeKind, NewPost, NewUser, SqliteStore, Store};

fn setup() -> (SqliteStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let pool = db::create_pool(&temp_dir.path().join("test.db")).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");
    (SqliteStore::new(pool), temp_dir)
}

async fn user(store: &SqliteStore, name: &str) -> User {
    store
        .create_user(
            NewUser {
                username: name.to_string(),
                email: Some(format!("{}@x.com", name)),
                password_hash: "hash".to_string(),
                role: Role::User,
            },
            Utc::now(),
        )
        .await
        .unwrap()
}

async fn post(store: &SqliteStore, author: &User, title: &str) -> String {
    let category = match store.find_category_by_name("general").await.unwrap() {
        Some(c) => c,
        None => store
            .create_category("general", None, &author.id, Utc::now())
            .await
            .unwrap(),
    };
    store
        .create_post(
            NewPost {
                title: title.to_string(),
                content: "some content".to_string(),
                image: None,
                author_id: author.id.clone(),
                category_id: category.id,
            },
            Utc::now(),
        )
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn follow_edges_stay_mirrored_across_many_users() {
    let (store, _dir) = setup();
    let mut users = Vec::new();
    for i in 0..5 {
        users.push(user(&store, &format!("user{}", i)).await);
    }

    // everyone follows everyone, twice
    for _ in 0..2 {
        for a in &users {
            for b in &users {
                if a.id != b.id {
                    relationships::follow(&store, &a.id, &b.id, Utc::now()).await.unwrap();
                }
            }
        }
    }

    for u in &users {
        assert_eq!(store.edges_from(EdgeKind::Follow, &u.id).await.unwrap().len(), 4);
        assert_eq!(store.edges_to(EdgeKind::Follow, &u.id).await.unwrap().len(), 4);
    }

    relationships::unfollow(&store, &users[0].id, &users[1].id).await.unwrap();
    relationships::unfollow(&store, &users[0].id, &users[1].id).await.unwrap();

    assert!(!store.has_edge(EdgeKind::Follow, &users[0].id, &users[1].id).await.unwrap());
    assert!(store.has_edge(EdgeKind::Follow, &users[1].id, &users[0].id).await.unwrap());
    assert!(!store
        .edges_to(EdgeKind::Follow, &users[1].id)
        .await
        .unwrap()
        .contains(&users[0].id));
}

#[tokio::test]
async fn self_targeted_relationships_are_rejected() {
    let (store, _dir) = setup();
    let alice = user(&store, "alice").await;

    let err = relationships::follow(&store, &alice.id, &alice.id, Utc::now()).await.unwrap_err();
    assert!(matches!(err, AppError::SelfReference(_)));
    let err = relationships::block(&store, &alice.id, &alice.id, Utc::now()).await.unwrap_err();
    assert!(matches!(err, AppError::SelfReference(_)));
    assert!(store.edges_from(EdgeKind::Follow, &alice.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn reactions_are_exclusive_and_claps_accumulate() {
    let (store, _dir) = setup();
    let alice = user(&store, "alice").await;
    let bob = user(&store, "bob").await;
    let post_id = post(&store, &alice, "Hello").await;

    for _ in 0..3 {
        engagement::like(&store, &bob.id, &post_id, Utc::now()).await.unwrap();
    }
    let p = engagement::dislike(&store, &bob.id, &post_id, Utc::now()).await.unwrap();
    assert!(p.likes.is_empty());
    assert_eq!(p.dislikes, vec![bob.id.clone()]);

    let p = engagement::like(&store, &alice.id, &post_id, Utc::now()).await.unwrap();
    assert_eq!(p.likes, vec![alice.id.clone()]);
    assert_eq!(p.dislikes, vec![bob.id.clone()]);

    let mut claps = 0;
    for _ in 0..7 {
        claps = engagement::clap(&store, &post_id).await.unwrap().claps;
    }
    assert_eq!(claps, 7);

    for _ in 0..3 {
        engagement::record_view(&store, &bob.id, &post_id, Utc::now()).await.unwrap();
    }
    let p = engagement::record_view(&store, &alice.id, &post_id, Utc::now()).await.unwrap();
    assert_eq!(p.viewers.len(), 2);
}

#[tokio::test]
async fn tokens_are_single_use_and_expire() {
    let (store, _dir) = setup();
    let alice = user(&store, "alice").await;
    let now = Utc::now();

    let plaintext = tokens::issue(&store, &alice, TokenPurpose::PasswordReset, now, Duration::minutes(10))
        .await
        .unwrap();
    assert_ne!(plaintext, tokens::hash_token(&plaintext));

    // wrong purpose never matches
    let err = tokens::consume(&store, TokenPurpose::AccountVerification, &plaintext, now)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidOrExpiredToken));

    let owner = tokens::consume(&store, TokenPurpose::PasswordReset, &plaintext, now)
        .await
        .unwrap();
    assert_eq!(owner.id, alice.id);
    let err = tokens::consume(&store, TokenPurpose::PasswordReset, &plaintext, now)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidOrExpiredToken));

    let plaintext = tokens::issue(&store, &alice, TokenPurpose::PasswordReset, now, Duration::minutes(10))
        .await
        .unwrap();
    let err = tokens::consume(&store, TokenPurpose::PasswordReset, &plaintext, now + Duration::minutes(11))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidOrExpiredToken));
}

#[tokio::test]
async fn scheduled_posts_surface_only_after_their_time() {
    let (store, _dir) = setup();
    let alice = user(&store, "alice").await;
    let bob = user(&store, "bob").await;
    let post_id = post(&store, &alice, "Later").await;
    let now = Utc::now();

    feed::schedule_post(&store, &alice.id, &post_id, now + Duration::hours(1), now)
        .await
        .unwrap();

    let limits = FeedConfig::default();
    let params = FeedParams::default();
    let page = feed::list_feed(&store, &bob.id, &params, &limits, now).await.unwrap();
    assert!(page.posts.is_empty());
    assert!(feed::list_public_posts(&store, now).await.unwrap().is_empty());

    let later = now + Duration::hours(2);
    let page = feed::list_feed(&store, &bob.id, &params, &limits, later).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.posts[0].post.title, "Later");

    let err = feed::schedule_post(&store, &bob.id, &post_id, later + Duration::hours(1), later)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn feed_excludes_every_blocker() {
    let (store, _dir) = setup();
    let viewer = user(&store, "viewer").await;
    let mut authors = Vec::new();
    for i in 0..4 {
        let author = user(&store, &format!("author{}", i)).await;
        post(&store, &author, &format!("Post by author {}", i)).await;
        authors.push(author);
    }

    relationships::block(&store, &authors[0].id, &viewer.id, Utc::now()).await.unwrap();
    relationships::block(&store, &authors[2].id, &viewer.id, Utc::now()).await.unwrap();
    // viewer blocking an author does not hide that author
    relationships::block(&store, &viewer.id, &authors[3].id, Utc::now()).await.unwrap();

    let params = FeedParams {
        limit: Some(50),
        ..Default::default()
    };
    let page = feed::list_feed(&store, &viewer.id, &params, &FeedConfig::default(), Utc::now())
        .await
        .unwrap();

    let mut titles: Vec<_> = page.posts.iter().map(|p| p.post.title.clone()).collect();
    titles.sort();
    assert_eq!(titles, vec!["Post by author 1", "Post by author 3"]);
    assert_eq!(page.total, 2);
}
