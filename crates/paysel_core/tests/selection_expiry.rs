use paysel_core::db::open_db_in_memory;
use paysel_core::{
    FilterSpec, Mode, SelectionDelta, SelectionError, SelectionRepository, SelectionService,
    SqlitePaymentRepository, SqliteSelectionRepository, SELECTION_TTL_MS,
};
use rusqlite::{params, Connection};
use uuid::Uuid;

fn service(
    conn: &Connection,
) -> SelectionService<SqliteSelectionRepository<'_>, SqlitePaymentRepository<'_>> {
    SelectionService::new(
        SqliteSelectionRepository::try_new(conn).unwrap(),
        SqlitePaymentRepository::try_new(conn).unwrap(),
    )
}

fn stored_expiry(conn: &Connection, id: Uuid) -> (i64, i64) {
    conn.query_row(
        "SELECT created_at, expires_at FROM selections WHERE id = ?1;",
        [id.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .unwrap()
}

#[test]
fn created_selection_expires_four_hours_after_creation() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let created = service
        .create(Uuid::new_v4(), Mode::All, FilterSpec::default())
        .unwrap();

    let (created_at, expires_at) = stored_expiry(&conn, created.selection_id);
    assert_eq!(expires_at - created_at, SELECTION_TTL_MS);
}

#[test]
fn reap_removes_only_past_ttl_selections_and_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let owner = Uuid::new_v4();

    let stale = service.create(owner, Mode::All, FilterSpec::default()).unwrap();
    let fresh = service.create(owner, Mode::None, FilterSpec::default()).unwrap();

    // Age the first selection past its TTL.
    conn.execute(
        "UPDATE selections SET expires_at = 1 WHERE id = ?1;",
        params![stale.selection_id.to_string()],
    )
    .unwrap();

    let now_ms = 1_000_000;
    assert_eq!(service.reap_expired(now_ms).unwrap(), 1);
    assert_eq!(service.reap_expired(now_ms).unwrap(), 0);

    let update_stale = service.update(stale.selection_id, owner, &SelectionDelta::default());
    assert!(matches!(
        update_stale,
        Err(SelectionError::SelectionNotFound(_))
    ));

    let update_fresh = service.update(fresh.selection_id, owner, &SelectionDelta::default());
    assert!(update_fresh.is_ok());
}

#[test]
fn reap_boundary_is_inclusive_of_expires_at() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSelectionRepository::try_new(&conn).unwrap();

    let selection = paysel_core::Selection::new(
        Uuid::new_v4(),
        Mode::All,
        FilterSpec::default(),
        10_000,
    );
    repo.insert_selection(&selection).unwrap();

    assert_eq!(repo.delete_expired(selection.expires_at - 1).unwrap(), 0);
    assert_eq!(repo.delete_expired(selection.expires_at).unwrap(), 1);
}
