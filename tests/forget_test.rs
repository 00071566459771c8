mod helpers;

use helpers::{count, insert_content, test_db};
use tagmem::db::check_database_health;
use tagmem::memory::forget::{forget_content, reset_store};
use tagmem::memory::search::query_related;

#[test]
fn forget_cascades_links() {
    let mut conn = test_db();
    let keep = insert_content(&mut conn, "keep me", &["shared"]);
    let gone = insert_content(&mut conn, "forget me", &["shared", "secret"]);

    assert!(forget_content(&mut conn, gone).unwrap());

    assert_eq!(count(&conn, "content"), 1);
    assert_eq!(count(&conn, "content_tags"), 1);
    // Tags outlive their content
    assert_eq!(count(&conn, "tags"), 2);

    let results = query_related(&conn, &["shared", "secret"], 8).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, keep);
}

#[test]
fn forget_unknown_id_reports_false() {
    let mut conn = test_db();
    assert!(!forget_content(&mut conn, 42).unwrap());
}

#[test]
fn deleting_a_tag_leaves_no_orphan_links() {
    let mut conn = test_db();
    insert_content(&mut conn, "text", &["doomed", "kept"]);

    conn.execute("DELETE FROM tags WHERE tag_text = 'doomed'", [])
        .unwrap();

    let report = check_database_health(&conn).unwrap();
    assert_eq!(report.link_count, 1);
    assert_eq!(report.orphan_links, 0);
}

#[test]
fn reset_empties_the_store() {
    let mut conn = test_db();
    insert_content(&mut conn, "one", &["a"]);
    insert_content(&mut conn, "two", &["b"]);

    reset_store(&mut conn).unwrap();

    assert_eq!(count(&conn, "content"), 0);
    assert_eq!(count(&conn, "tags"), 0);
    assert_eq!(count(&conn, "content_tags"), 0);
}
