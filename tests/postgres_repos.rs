//! Repository behaviour against a real Postgres.
//!
//! Needs `DATABASE_URL` pointing at a server where sqlx may create scratch
//! databases: `cargo test --test postgres_repos -- --ignored`.

use std::collections::HashSet;

use sqlx::PgPool;

use blogroll::application::pagination::PageRequest;
use blogroll::application::repos::{
    CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, CreateUserParams,
    FollowsRepo, GroupsRepo, PostListScope, PostsRepo, RepoError, SessionsRepo,
    USERNAME_UNIQUE_CONSTRAINT, UsersRepo,
};
use blogroll::domain::entities::UserRecord;
use blogroll::infra::db::PostgresRepositories;

async fn user(repos: &PostgresRepositories, username: &str) -> UserRecord {
    repos
        .create_user(CreateUserParams {
            username: username.to_string(),
            password_hash: "hash".to_string(),
        })
        .await
        .expect("create user")
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn schema_has_timeline_indexes(pool: PgPool) {
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT indexname FROM pg_indexes WHERE schemaname = 'public' AND tablename = 'posts'",
    )
    .fetch_all(&pool)
    .await
    .expect("fetch post indexes");

    let indexes: HashSet<String> = rows.into_iter().collect();
    for name in [
        "posts_created_at_idx",
        "posts_author_created_idx",
        "posts_group_created_idx",
    ] {
        assert!(indexes.contains(name), "missing {name}");
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_usernames_report_the_constraint(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    user(&repos, "leo").await;

    let err = repos
        .create_user(CreateUserParams {
            username: "leo".to_string(),
            password_hash: "hash".to_string(),
        })
        .await
        .expect_err("duplicate username");
    assert!(err.is_duplicate(USERNAME_UNIQUE_CONSTRAINT), "{err:?}");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn follow_edges_are_unique_and_never_self(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let leo = user(&repos, "leo").await;
    let reader = user(&repos, "reader").await;

    assert!(repos.create_follow(reader.id, leo.id).await.expect("follow"));
    assert!(!repos.create_follow(reader.id, leo.id).await.expect("again"));
    assert_eq!(repos.count_follows().await.expect("count"), 1);

    assert!(matches!(
        repos.create_follow(leo.id, leo.id).await,
        Err(RepoError::Integrity { .. })
    ));

    // The CHECK constraint holds even for writers that skip the repository.
    let raw = sqlx::query("INSERT INTO follows (user_id, author_id) VALUES ($1, $1)")
        .bind(leo.id)
        .execute(&pool)
        .await;
    assert!(raw.is_err());

    assert!(repos.delete_follow(reader.id, leo.id).await.expect("unfollow"));
    assert!(!repos.delete_follow(reader.id, leo.id).await.expect("again"));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn timelines_are_scoped_and_newest_first(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = user(&repos, "leo").await;
    let mia = user(&repos, "mia").await;
    let reader = user(&repos, "reader").await;
    let cats = repos
        .create_group(CreateGroupParams {
            title: "Cats".to_string(),
            slug: "cats".to_string(),
            description: String::new(),
        })
        .await
        .expect("create group");

    for (author, text, group) in [
        (&leo, "leo one", Some(cats.id)),
        (&mia, "mia one", None),
        (&leo, "leo two", None),
    ] {
        repos
            .create_post(CreatePostParams {
                author_id: author.id,
                text: text.to_string(),
                group_id: group,
                image: None,
            })
            .await
            .expect("create post");
    }
    repos.create_follow(reader.id, leo.id).await.expect("follow");

    let all = repos
        .list_posts(PostListScope::All, PageRequest::new(0, 10))
        .await
        .expect("list");
    let texts: Vec<_> = all.iter().map(|post| post.post.text.as_str()).collect();
    assert_eq!(texts, ["leo two", "mia one", "leo one"]);

    let grouped = repos
        .list_posts(PostListScope::Group(cats.id), PageRequest::new(0, 10))
        .await
        .expect("list group");
    assert_eq!(grouped.len(), 1);
    assert_eq!(
        grouped[0].group.as_ref().map(|group| group.slug.as_str()),
        Some("cats")
    );

    let followed = repos
        .count_posts(PostListScope::FollowedBy(reader.id))
        .await
        .expect("count followed");
    assert_eq!(followed, 2);

    let second_page = repos
        .list_posts(PostListScope::All, PageRequest::new(2, 2))
        .await
        .expect("second page");
    assert_eq!(second_page.len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn comments_and_sessions_round_out_a_visit(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = user(&repos, "leo").await;
    let post = repos
        .create_post(CreatePostParams {
            author_id: leo.id,
            text: "hello".to_string(),
            group_id: None,
            image: None,
        })
        .await
        .expect("create post");

    repos
        .create_comment(CreateCommentParams {
            post_id: post.id,
            author_id: leo.id,
            text: "first!".to_string(),
        })
        .await
        .expect("comment");
    let comments = repos.list_for_post(post.id).await.expect("comments");
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].author.username, "leo");

    let session = repos.create_session(leo.id).await.expect("session");
    let resolved = repos
        .find_session_user(session.id)
        .await
        .expect("lookup")
        .expect("live session");
    assert_eq!(resolved.id, leo.id);

    repos.delete_session(session.id).await.expect("logout");
    assert!(
        repos
            .find_session_user(session.id)
            .await
            .expect("lookup")
            .is_none()
    );
}
