use paysel_core::db::migrations::latest_version;
use paysel_core::db::open_db_in_memory;
use paysel_core::{
    FilterSpec, Mode, RepoError, Selection, SelectionDelta, SelectionRepository,
    SqliteSelectionRepository,
};
use rusqlite::{params, Connection};
use uuid::Uuid;

fn new_selection(mode: Mode) -> Selection {
    Selection::new(Uuid::new_v4(), mode, FilterSpec::default(), 1_000)
}

#[test]
fn insert_and_get_roundtrip_scoped_to_owner() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSelectionRepository::try_new(&conn).unwrap();

    let selection = new_selection(Mode::All);
    repo.insert_selection(&selection).unwrap();

    let loaded = repo
        .get_selection(selection.id, selection.owner_id)
        .unwrap()
        .unwrap();
    assert_eq!(loaded, selection);

    // A foreign owner observes exactly a missing id.
    let foreign = repo.get_selection(selection.id, Uuid::new_v4()).unwrap();
    assert!(foreign.is_none());
}

#[test]
fn stale_version_write_conflicts_and_leaves_state_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSelectionRepository::try_new(&conn).unwrap();

    let selection = new_selection(Mode::None);
    repo.insert_selection(&selection).unwrap();

    // Two writers load the same version.
    let mut winner = repo
        .get_selection(selection.id, selection.owner_id)
        .unwrap()
        .unwrap();
    let mut loser = winner.clone();

    winner.apply_delta(&SelectionDelta {
        include_ids: Some(vec![1, 2]),
        ..SelectionDelta::default()
    });
    let new_version = repo.update_selection(&winner).unwrap();
    assert_eq!(new_version, 1);

    loser.apply_delta(&SelectionDelta {
        include_ids: Some(vec![99]),
        ..SelectionDelta::default()
    });
    let err = repo.update_selection(&loser).unwrap_err();
    assert!(matches!(
        err,
        RepoError::VersionConflict {
            id,
            expected_version: 0
        } if id == selection.id
    ));

    // The losing write must not have touched the stored row.
    let stored = repo
        .get_selection(selection.id, selection.owner_id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.include_ids, vec![1, 2]);
    assert_eq!(stored.version, 1);

    // Reload-and-retry succeeds.
    let mut retried = stored;
    retried.apply_delta(&SelectionDelta {
        include_ids: Some(vec![99]),
        ..SelectionDelta::default()
    });
    assert_eq!(repo.update_selection(&retried).unwrap(), 2);
}

#[test]
fn update_of_missing_selection_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSelectionRepository::try_new(&conn).unwrap();

    let selection = new_selection(Mode::All);
    let err = repo.update_selection(&selection).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == selection.id));
}

#[test]
fn consume_returns_the_row_exactly_once() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSelectionRepository::try_new(&conn).unwrap();

    let selection = new_selection(Mode::All);
    repo.insert_selection(&selection).unwrap();

    let first = repo
        .consume_selection(selection.id, selection.owner_id)
        .unwrap();
    assert_eq!(first.as_ref().map(|sel| sel.id), Some(selection.id));

    let second = repo
        .consume_selection(selection.id, selection.owner_id)
        .unwrap();
    assert!(second.is_none());

    let gone = repo
        .get_selection(selection.id, selection.owner_id)
        .unwrap();
    assert!(gone.is_none());
}

#[test]
fn consume_is_owner_scoped() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSelectionRepository::try_new(&conn).unwrap();

    let selection = new_selection(Mode::None);
    repo.insert_selection(&selection).unwrap();

    let foreign = repo.consume_selection(selection.id, Uuid::new_v4()).unwrap();
    assert!(foreign.is_none());

    // Still present for the real owner.
    let mine = repo
        .consume_selection(selection.id, selection.owner_id)
        .unwrap();
    assert!(mine.is_some());
}

#[test]
fn corrupt_persisted_json_surfaces_as_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSelectionRepository::try_new(&conn).unwrap();

    let id = Uuid::new_v4();
    let owner = Uuid::new_v4();
    conn.execute(
        "INSERT INTO selections (
            id, owner_id, mode, filter_json, include_ids, exclude_ids,
            version, created_at, expires_at
        ) VALUES (?1, ?2, 'NONE', '{}', 'not-json', '[]', 0, 0, 1);",
        params![id.to_string(), owner.to_string()],
    )
    .unwrap();

    let err = repo.get_selection(id, owner).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn duplicate_ids_in_stored_row_are_rejected_on_read() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSelectionRepository::try_new(&conn).unwrap();

    let id = Uuid::new_v4();
    let owner = Uuid::new_v4();
    conn.execute(
        "INSERT INTO selections (
            id, owner_id, mode, filter_json, include_ids, exclude_ids,
            version, created_at, expires_at
        ) VALUES (?1, ?2, 'NONE', '{}', '[7, 7]', '[]', 0, 0, 1);",
        params![id.to_string(), owner.to_string()],
    )
    .unwrap();

    let err = repo.get_selection(id, owner).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteSelectionRepository::try_new(&conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn repository_rejects_connection_without_selections_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    let result = SqliteSelectionRepository::try_new(&conn);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredTable("selections"))
    ));
}

#[test]
fn repository_rejects_connection_missing_required_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE selections (
            id TEXT PRIMARY KEY NOT NULL,
            owner_id TEXT NOT NULL,
            mode TEXT NOT NULL
        );",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    let result = SqliteSelectionRepository::try_new(&conn);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredColumn {
            table: "selections",
            column: "filter_json"
        })
    ));
}
