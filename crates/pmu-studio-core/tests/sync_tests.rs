//! Push/pull integration tests against an in-process remote.

use pmu_studio_core::db::{Database, CACHE_INSTRUCTORS, CACHE_TEAM_MEMBERS};
use pmu_studio_core::models::{Client, ConsentForm, Role, TeamMember};
use pmu_studio_core::sync::{CollectionSync, MemoryCollection, PushOutcome, SyncError, SyncRecord};
use pmu_studio_core::Studio;
use serde_json::json;

const STUDIO: &str = "studio-1";

fn setup() -> Database {
    Database::open_in_memory().unwrap()
}

fn create_client(db: &Database, first: &str, last: &str) -> Client {
    Studio::new(db, STUDIO)
        .create_client(Client::new(STUDIO.into(), first.into(), last.into()))
        .unwrap()
}

#[test]
fn test_two_devices_converge_through_remote() {
    let remote = MemoryCollection::new();
    let tablet = setup();
    let laptop = setup();

    let ana = create_client(&tablet, "Ana", "Lima");
    let report = CollectionSync::<Client>::new(&tablet, &remote, STUDIO)
        .push_pending()
        .unwrap();
    assert_eq!(report.pushed, 1);

    let pulled = CollectionSync::<Client>::new(&laptop, &remote, STUDIO)
        .pull()
        .unwrap();
    assert_eq!(pulled.inserted, 1);

    let on_laptop = laptop.list_clients(STUDIO).unwrap();
    assert_eq!(on_laptop.len(), 1);
    assert_eq!(on_laptop[0].full_name(), "Ana Lima");
    assert_ne!(on_laptop[0].local_id, ana.local_id);
    assert!(!on_laptop[0].has_unpushed_changes().unwrap());

    // Edit on the laptop, push, and pull back on the tablet
    let mut edited = on_laptop[0].clone();
    edited.phone = Some("555-0101".into());
    Studio::new(&laptop, STUDIO).update_client(&edited).unwrap();
    let outcome = CollectionSync::<Client>::new(&laptop, &remote, STUDIO)
        .push(&edited.local_id)
        .unwrap();
    assert!(matches!(outcome, PushOutcome::Pushed { .. }));

    let pulled = CollectionSync::<Client>::new(&tablet, &remote, STUDIO)
        .pull()
        .unwrap();
    assert_eq!(pulled.updated, 1);
    let on_tablet = tablet.get_client(&ana.local_id).unwrap().unwrap();
    assert_eq!(on_tablet.phone.as_deref(), Some("555-0101"));
}

#[test]
fn test_offline_writes_stay_pending_until_retry() {
    let remote = MemoryCollection::new();
    let db = setup();
    let sync = CollectionSync::<Client>::new(&db, &remote, STUDIO);

    remote.set_failing(true);
    let ana = create_client(&db, "Ana", "Lima");
    let bea = create_client(&db, "Bea", "Costa");
    let report = sync.push_pending().unwrap();
    assert_eq!(report.pushed, 0);
    assert_eq!(report.failed.len(), 2);
    assert_eq!(sync.pending_count().unwrap(), 2);

    // Local writes survive the failed push
    assert!(db.get_client(&ana.local_id).unwrap().is_some());
    assert!(db.get_client(&bea.local_id).unwrap().is_some());

    remote.set_failing(false);
    let report = sync.push_pending().unwrap();
    assert_eq!(report.pushed, 2);
    assert!(report.failed.is_empty());
    assert_eq!(sync.pending_count().unwrap(), 0);
    assert_eq!(remote.len(), 2);

    // Nothing left to send
    let report = sync.push_pending().unwrap();
    assert_eq!(report.unchanged, 2);
    assert_eq!(remote.write_count(), 2);
}

#[test]
fn test_pull_does_not_clobber_unpushed_edit() {
    let remote = MemoryCollection::new();
    let db = setup();
    remote.seed("srv-7", json!({"first_name": "Ana", "last_name": "Lima"}));

    let sync = CollectionSync::<Client>::new(&db, &remote, STUDIO);
    sync.pull().unwrap();
    let mut local = db.get_client_by_server_id("srv-7").unwrap().unwrap();

    local.notes = Some("prefers mornings".into());
    db.update_client(&local).unwrap();
    remote.seed("srv-7", json!({"first_name": "Ana", "last_name": "Lima-Souza"}));

    let report = sync.pull().unwrap();
    assert_eq!(report.skipped_local_changes, 1);
    let kept = db.get_client(&local.local_id).unwrap().unwrap();
    assert_eq!(kept.last_name, "Lima");
    assert_eq!(kept.notes.as_deref(), Some("prefers mornings"));

    // Pushing the local edit wins
    sync.push(&local.local_id).unwrap();
    let stored = remote.get("srv-7").unwrap();
    assert_eq!(stored["last_name"], "Lima");
    assert_eq!(stored["notes"], "prefers mornings");
}

#[test]
fn test_delete_requires_remote_success() {
    let remote = MemoryCollection::new();
    let db = setup();
    let sync = CollectionSync::<Client>::new(&db, &remote, STUDIO);

    let ana = create_client(&db, "Ana", "Lima");
    sync.push(&ana.local_id).unwrap();
    assert_eq!(remote.len(), 1);

    remote.set_failing(true);
    let err = sync.delete(&ana.local_id).unwrap_err();
    assert!(matches!(err, SyncError::Connection(_)));
    assert!(db.get_client(&ana.local_id).unwrap().is_some());

    remote.set_failing(false);
    assert!(sync.delete(&ana.local_id).unwrap());
    assert!(db.get_client(&ana.local_id).unwrap().is_none());
    assert!(remote.is_empty());
}

#[test]
fn test_team_pull_refreshes_instructor_cache() {
    let remote = MemoryCollection::new();
    remote.seed("m-1", json!({"name": "Bea", "email": "bea@example.com", "role": "instructor"}));
    remote.seed("m-2", json!({"name": "Caio", "email": "caio@example.com", "role": "artist"}));
    remote.seed(
        "m-3",
        json!({"name": "Duda", "email": "duda@example.com", "role": "instructor", "active": false}),
    );

    let db = setup();
    let report = CollectionSync::<TeamMember>::new(&db, &remote, STUDIO)
        .pull()
        .unwrap();
    assert_eq!(report.inserted, 3);

    let team: Vec<TeamMember> = db.cache_get(CACHE_TEAM_MEMBERS).unwrap().unwrap();
    assert_eq!(team.len(), 2);
    let instructors: Vec<TeamMember> = db.cache_get(CACHE_INSTRUCTORS).unwrap().unwrap();
    assert_eq!(instructors.len(), 1);
    assert_eq!(instructors[0].name, "Bea");
    assert_eq!(instructors[0].role, Role::Instructor);
}

#[test]
fn test_team_email_collision_does_not_stop_pull() {
    let remote = MemoryCollection::new();
    let db = setup();
    Studio::new(&db, STUDIO)
        .add_team_member(TeamMember::new(
            STUDIO.into(),
            "Bea".into(),
            "bea@example.com".into(),
            Role::Instructor,
        ))
        .unwrap();

    remote.seed("tm-1", json!({"name": "Bea C.", "email": "BEA@example.com", "role": "instructor"}));
    remote.seed("tm-2", json!({"name": "Carla", "email": "carla@example.com", "role": "artist"}));

    let sync = CollectionSync::<TeamMember>::new(&db, &remote, STUDIO);
    let report = sync.pull().unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].server_id, "tm-1");

    let team = db.list_team_members(STUDIO, true).unwrap();
    assert_eq!(team.len(), 2);
    assert!(db.get_team_member_by_server_id("tm-2").unwrap().is_some());
    assert!(sync.last_pull().unwrap().is_some());

    let cached: Vec<TeamMember> = db.cache_get(CACHE_TEAM_MEMBERS).unwrap().unwrap();
    assert_eq!(cached.len(), 2);
    let instructors: Vec<TeamMember> = db.cache_get(CACHE_INSTRUCTORS).unwrap().unwrap();
    assert_eq!(instructors.len(), 1);
    assert_eq!(instructors[0].name, "Bea");
}

#[test]
fn test_consent_form_version_travels() {
    let remote = MemoryCollection::new();
    let db = setup();
    let studio = Studio::new(&db, STUDIO);

    let form = studio
        .create_consent_form(ConsentForm::new(STUDIO.into(), "Lips".into(), "v1 text".into()))
        .unwrap();
    let mut edited = form.clone();
    edited.body = "v2 text".into();
    let edited = studio.update_consent_form(&edited).unwrap();
    assert_eq!(edited.version, 2);

    let sync = CollectionSync::<ConsentForm>::new(&db, &remote, STUDIO);
    let outcome = sync.push(&form.form_id).unwrap();
    let PushOutcome::Pushed { server_id } = outcome else {
        panic!("expected a push");
    };
    assert_eq!(remote.get(&server_id).unwrap()["version"], 2);

    let other = setup();
    CollectionSync::<ConsentForm>::new(&other, &remote, STUDIO)
        .pull()
        .unwrap();
    let forms = other.cached_consent_forms().unwrap().unwrap();
    assert_eq!(forms.len(), 1);
    assert_eq!(forms[0].version, 2);
    assert_eq!(forms[0].body, "v2 text");
}

#[test]
fn test_last_pull_recorded() {
    let remote = MemoryCollection::new();
    let db = setup();
    let sync = CollectionSync::<Client>::new(&db, &remote, STUDIO);
    assert!(sync.last_pull().unwrap().is_none());
    sync.pull().unwrap();
    assert!(sync.last_pull().unwrap().is_some());
}
