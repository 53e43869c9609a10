//! Feeds, tags, search and username generation against a real database.

mod common;

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use common::stale::{Stale, StaleBackend};
use common::{insert_post, TestEnv};
use inkpost::backend::{decode_all, Connector, Identity, Query, Table};
use inkpost::content::{fetch_posts, search, FeedMode, SearchHit};
use inkpost::db::models::{PostTag, Tag};
use inkpost::error::AppError;
use inkpost::{engagement, profile, tags, username};

// ============================================================================
// FEEDS
// ============================================================================

#[tokio::test]
async fn test_home_feed_is_newest_first_and_enriched() {
    let env = TestEnv::new();
    let alice = env.user("alice@example.com").await;
    let bob = env.user("bob@example.com").await;
    let now = Utc::now();

    let first = insert_post(alice.backend.as_ref(), alice.id(), "First", now - Duration::days(10)).await;
    let second = insert_post(bob.backend.as_ref(), bob.id(), "Second", now - Duration::hours(2)).await;
    tags::link_tags(alice.backend.as_ref(), first.id, &["rust".to_string(), "web".to_string()]).await;
    engagement::toggle_like(bob.backend.as_ref(), bob.id(), first.id)
        .await
        .unwrap();

    let anon = env.connector.anonymous();
    let posts = fetch_posts(anon.as_ref(), &FeedMode::Home, now).await.unwrap();

    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].id, second.id);
    assert_eq!(posts[0].username, bob.user.username);
    assert_eq!(posts[0].time_label, "2 hours ago");
    assert_eq!(posts[0].like_count, 0);
    assert!(posts[0].tags.is_empty());

    assert_eq!(posts[1].id, first.id);
    assert_eq!(posts[1].username, alice.user.username);
    assert_eq!(posts[1].tags, vec!["rust", "web"]);
    assert_eq!(posts[1].like_count, 1);
    assert_eq!(
        posts[1].time_label,
        (now - Duration::days(10)).format("%b %-d, %Y").to_string()
    );
}

#[tokio::test]
async fn test_profile_feed_only_has_owner_posts() {
    let env = TestEnv::new();
    let alice = env.user("alice@example.com").await;
    let bob = env.user("bob@example.com").await;
    insert_post(alice.backend.as_ref(), alice.id(), "Mine", Utc::now()).await;
    insert_post(bob.backend.as_ref(), bob.id(), "Theirs", Utc::now()).await;

    let posts = fetch_posts(
        alice.backend.as_ref(),
        &FeedMode::Profile(alice.id().to_string()),
        Utc::now(),
    )
    .await
    .unwrap();

    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].title, "Mine");
}

#[tokio::test]
async fn test_profile_feed_for_unknown_user_is_not_found() {
    let env = TestEnv::new();
    let anon = env.connector.anonymous();

    let result = fetch_posts(anon.as_ref(), &FeedMode::Profile("ghost".into()), Utc::now()).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_post_mode_returns_one_or_not_found() {
    let env = TestEnv::new();
    let alice = env.user("alice@example.com").await;
    let post = insert_post(alice.backend.as_ref(), alice.id(), "Solo", Utc::now()).await;
    let anon = env.connector.anonymous();

    let found = fetch_posts(anon.as_ref(), &FeedMode::Post(post.id), Utc::now())
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "Solo");

    let missing = fetch_posts(anon.as_ref(), &FeedMode::Post(post.id + 1), Utc::now()).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_search_mode_matches_title_case_insensitively() {
    let env = TestEnv::new();
    let alice = env.user("alice@example.com").await;
    insert_post(alice.backend.as_ref(), alice.id(), "Learning Rust", Utc::now()).await;
    insert_post(alice.backend.as_ref(), alice.id(), "Gardening", Utc::now()).await;
    insert_post(alice.backend.as_ref(), alice.id(), "Rusty bikes", Utc::now()).await;

    let posts = fetch_posts(
        alice.backend.as_ref(),
        &FeedMode::Search("RUST".into()),
        Utc::now(),
    )
    .await
    .unwrap();

    let titles: Vec<_> = posts.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Rusty bikes", "Learning Rust"]);
}

#[tokio::test]
async fn test_empty_feed_is_empty() {
    let env = TestEnv::new();
    let anon = env.connector.anonymous();

    let posts = fetch_posts(anon.as_ref(), &FeedMode::Home, Utc::now()).await.unwrap();

    assert!(posts.is_empty());
}

// ============================================================================
// TAGS
// ============================================================================

#[tokio::test]
async fn test_duplicate_tags_link_once() {
    let env = TestEnv::new();
    let alice = env.user("alice@example.com").await;
    let post = insert_post(alice.backend.as_ref(), alice.id(), "Tagged", Utc::now()).await;

    let names = tags::parse_tag_list("go, rust, go");
    let report = tags::link_tags(alice.backend.as_ref(), post.id, &names).await;

    assert!(report.is_complete());
    assert_eq!(report.linked.len(), 2);

    let service = env.service();
    let all_tags: Vec<Tag> = decode_all(service.select(&Query::from(Table::Tags)).await.unwrap()).unwrap();
    let links: Vec<PostTag> =
        decode_all(service.select(&Query::from(Table::PostTags)).await.unwrap()).unwrap();
    assert_eq!(all_tags.len(), 2);
    assert_eq!(links.len(), 2);
}

#[tokio::test]
async fn test_existing_tags_are_reused() {
    let env = TestEnv::new();
    let alice = env.user("alice@example.com").await;
    let bob = env.user("bob@example.com").await;
    let first = insert_post(alice.backend.as_ref(), alice.id(), "One", Utc::now()).await;
    let second = insert_post(bob.backend.as_ref(), bob.id(), "Two", Utc::now()).await;

    let a = tags::link_tags(alice.backend.as_ref(), first.id, &tags::parse_tag_list("Rust")).await;
    let b = tags::link_tags(bob.backend.as_ref(), second.id, &tags::parse_tag_list(" rust ")).await;

    assert_eq!(a.linked[0].id, b.linked[0].id);
    assert_eq!(
        env.service().count(&Query::from(Table::Tags)).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_tag_created_concurrently_is_reread() {
    let env = TestEnv::new();
    let alice = env.user("alice@example.com").await;
    let bob = env.user("bob@example.com").await;
    let post = insert_post(alice.backend.as_ref(), alice.id(), "Tagged", Utc::now()).await;
    let existing = tags::resolve_tag(bob.backend.as_ref(), "rust").await.unwrap();

    // The lookup misses bob's tag, so creation hits the unique name
    let stale = StaleBackend::new(alice.backend.clone()).once(Table::Tags, Stale::Absent);
    let report = tags::link_tags(&stale, post.id, &tags::parse_tag_list("rust")).await;

    assert!(report.is_complete());
    assert_eq!(report.linked[0].id, existing.id);
    assert_eq!(
        env.service().count(&Query::from(Table::Tags)).await.unwrap(),
        1
    );
    assert_eq!(
        env.service().count(&Query::from(Table::PostTags)).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_relinking_is_idempotent() {
    let env = TestEnv::new();
    let alice = env.user("alice@example.com").await;
    let post = insert_post(alice.backend.as_ref(), alice.id(), "Tagged", Utc::now()).await;
    let names = tags::parse_tag_list("rust");

    tags::link_tags(alice.backend.as_ref(), post.id, &names).await;
    let again = tags::link_tags(alice.backend.as_ref(), post.id, &names).await;

    assert!(again.is_complete());
    assert_eq!(
        env.service().count(&Query::from(Table::PostTags)).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_tag_failures_do_not_stop_the_rest() {
    let env = TestEnv::new();
    let alice = env.user("alice@example.com").await;
    let post = insert_post(alice.backend.as_ref(), alice.id(), "Tagged", Utc::now()).await;

    let names = vec!["x".repeat(tags::MAX_TAG_LEN + 1), "rust".to_string()];
    let report = tags::link_tags(alice.backend.as_ref(), post.id, &names).await;

    assert!(!report.is_complete());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.linked.len(), 1);
    assert_eq!(report.linked[0].name, "rust");
}

#[tokio::test]
async fn test_cannot_tag_someone_elses_post() {
    let env = TestEnv::new();
    let alice = env.user("alice@example.com").await;
    let bob = env.user("bob@example.com").await;
    let post = insert_post(alice.backend.as_ref(), alice.id(), "Alice's", Utc::now()).await;

    let report = tags::link_tags(bob.backend.as_ref(), post.id, &tags::parse_tag_list("spam")).await;

    assert_eq!(report.failures.len(), 1);
    assert!(report.linked.is_empty());
}

// ============================================================================
// SEARCH
// ============================================================================

#[tokio::test]
async fn test_typeahead_merges_kinds_in_stable_order() {
    let env = TestEnv::new();
    env.insert_raw_user("u-zed", "rustacean_zed");
    env.insert_raw_user("u-amy", "rustacean_amy");
    let alice = env.user("alice@example.com").await;
    let older = insert_post(alice.backend.as_ref(), alice.id(), "Rust basics", Utc::now()).await;
    let newer = insert_post(alice.backend.as_ref(), alice.id(), "Advanced rust", Utc::now()).await;
    tags::link_tags(alice.backend.as_ref(), older.id, &tags::parse_tag_list("rust, trust")).await;

    let anon = env.connector.anonymous();
    let hits = search::typeahead(anon.as_ref(), "rust", search::DEFAULT_LIMIT)
        .await
        .unwrap();

    assert_eq!(
        hits,
        vec![
            SearchHit::Post {
                id: newer.id,
                title: "Advanced rust".into()
            },
            SearchHit::Post {
                id: older.id,
                title: "Rust basics".into()
            },
            SearchHit::User {
                username: "rustacean_amy".into()
            },
            SearchHit::User {
                username: "rustacean_zed".into()
            },
            SearchHit::Tag { name: "rust".into() },
            SearchHit::Tag {
                name: "trust".into()
            },
        ]
    );
}

#[tokio::test]
async fn test_typeahead_respects_limit_and_blank_terms() {
    let env = TestEnv::new();
    let alice = env.user("alice@example.com").await;
    for i in 0..4 {
        insert_post(alice.backend.as_ref(), alice.id(), &format!("Note {i}"), Utc::now()).await;
    }
    let anon = env.connector.anonymous();

    let hits = search::typeahead(anon.as_ref(), "note", 2).await.unwrap();
    assert_eq!(hits.len(), 2);

    assert!(search::typeahead(anon.as_ref(), "   ", 2).await.unwrap().is_empty());
}

// ============================================================================
// USERNAMES
// ============================================================================

#[tokio::test]
async fn test_generated_username_avoids_taken_names() {
    let env = TestEnv::new();
    let taken = username::candidate(&mut StdRng::seed_from_u64(11));
    env.insert_raw_user("u-1", &taken);

    let generated = username::generate_with(env.service().as_ref(), &mut StdRng::seed_from_u64(11))
        .await
        .unwrap();

    assert_ne!(generated, taken);
    assert!(generated.starts_with(username::PREFIX));
}

#[tokio::test]
async fn test_username_generation_gives_up_after_max_attempts() {
    let env = TestEnv::new();
    let mut probe = StdRng::seed_from_u64(99);
    for i in 0..username::MAX_ATTEMPTS {
        let name = username::candidate(&mut probe);
        env.insert_raw_user(&format!("u-{i}"), &name);
    }

    let result =
        username::generate_with(env.service().as_ref(), &mut StdRng::seed_from_u64(99)).await;

    assert!(matches!(
        result,
        Err(AppError::GenerationExhausted { attempts }) if attempts == username::MAX_ATTEMPTS
    ));
}

#[tokio::test]
async fn test_confirmed_accounts_get_distinct_usernames() {
    let env = TestEnv::new();
    let alice = env.user("alice@example.com").await;
    let bob = env.user("bob@example.com").await;

    assert_ne!(alice.user.username, bob.user.username);
    assert!(alice.user.username.starts_with("user_"));
    assert_eq!(alice.user.username.len(), "user_".len() + 8);
}

#[tokio::test]
async fn test_profile_created_concurrently_is_reread() {
    let env = TestEnv::new();
    let alice = env.user("alice@example.com").await;
    let identity = Identity {
        id: alice.user.id.clone(),
        email: "alice@example.com".to_string(),
    };

    // Another request created the row after this one looked for it
    let stale = StaleBackend::new(alice.backend.clone()).once(Table::Users, Stale::Absent);
    let user = profile::ensure_profile(&stale, &identity).await.unwrap();

    assert_eq!(user.username, alice.user.username);
    assert_eq!(
        env.service().count(&Query::from(Table::Users)).await.unwrap(),
        1
    );
}
