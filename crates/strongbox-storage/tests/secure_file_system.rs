use std::{fs, path::Path};

use secrecy::SecretString;
use strongbox_core::{
    storage::{SecureFileStore, StoreError},
    FileCategory,
};
use strongbox_storage::{
    container::{FORMAT_VERSION, HEADER_LEN},
    generate_password, KdfParams, SecureFileSystem, StaticPassphrase,
};

fn fast() -> KdfParams {
    KdfParams {
        mem_cost_kib: 1024,
        time_cost: 1,
        parallelism: 1,
    }
}

fn sfs(path: &Path) -> SecureFileSystem {
    let provider = || generate_password("password");
    SecureFileSystem::open_with_params(path, &provider, fast()).expect("open container")
}

#[test]
fn reopened_engine_sees_stored_image() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sfs");
    let image: Vec<u8> = (0..4096u32).map(|i| (i * 31 % 251) as u8).collect();

    sfs(&path)
        .store_object("1.jpg", &image, FileCategory::Image)
        .expect("store");

    let fresh = sfs(&path);
    assert_eq!(fresh.list_files(None).expect("list"), vec!["1.jpg"]);
    assert_eq!(fresh.load_bytes_from_file("1.jpg").expect("load"), image);
}

#[test]
fn wrong_passphrase_fails_and_leaves_file_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sfs");
    sfs(&path)
        .store_object("secret", b"payload", FileCategory::Data)
        .expect("store");
    let before = fs::read(&path).expect("read");

    let err = SecureFileSystem::open_with_params(&path, &StaticPassphrase::new("nope"), fast())
        .expect_err("wrong passphrase must fail");

    assert_eq!(err, StoreError::AuthenticationFailure);
    assert_eq!(fs::read(&path).expect("read"), before);
}

#[test]
fn existing_container_ignores_requested_params() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sfs");
    sfs(&path);

    let other = KdfParams {
        mem_cost_kib: 2048,
        ..fast()
    };
    let reopened =
        SecureFileSystem::open_with_params(&path, &StaticPassphrase::new("password"), other)
            .expect("reopen with header params");
    assert_eq!(reopened.header().kdf, fast());
}

#[test]
fn touch_create_date_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sfs");

    sfs(&path).touch("testFile").expect("touch");
    let created = sfs(&path).get_details("testFile").expect("details");
    assert_eq!(created.size, 0);
    assert_eq!(created.category, FileCategory::Data);

    sfs(&path)
        .touch("testFile")
        .expect("second touch is a no-op");
    let again = sfs(&path).get_details("testFile").expect("details");
    assert_eq!(again.create_date, created.create_date);
}

#[test]
fn overwrite_replaces_payload_but_not_create_date() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sfs");
    let engine = sfs(&path);

    engine
        .store_object("settings", b"v1", FileCategory::Data)
        .expect("store");
    let first = engine.get_details("settings").expect("details");
    engine
        .store_object("settings", b"version-two", FileCategory::Data)
        .expect("overwrite");

    let fresh = sfs(&path);
    let second = fresh.get_details("settings").expect("details");
    assert_eq!(second.create_date, first.create_date);
    assert_eq!(second.size, 11);
    assert_eq!(
        fresh.load_bytes_from_file("settings").expect("load"),
        b"version-two"
    );
    assert_eq!(fresh.list_files(None).expect("list").len(), 1);
}

#[test]
fn rename_preserves_category_payload_and_create_date() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sfs");
    let engine = sfs(&path);
    engine
        .store_object("settings", b"\"SettingsDummy\"", FileCategory::Data)
        .expect("store");
    engine
        .store_object("1.jpg", b"jpeg", FileCategory::Image)
        .expect("store");
    let before = engine.get_details("settings").expect("details");

    engine.rename("settings", "diffName").expect("rename");

    let fresh = sfs(&path);
    assert_eq!(
        fresh.list_files(Some(FileCategory::Data)).expect("list"),
        vec!["diffName"]
    );
    let after = fresh.get_details("diffName").expect("details");
    assert_eq!(after.category, before.category);
    assert_eq!(after.create_date, before.create_date);
    assert_eq!(
        fresh.load_bytes_from_file("diffName").expect("load"),
        b"\"SettingsDummy\""
    );
    assert!(matches!(
        fresh.get_details("settings"),
        Err(StoreError::NotFound { .. })
    ));
}

#[test]
fn rename_failures_leave_catalog_alone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sfs");
    let engine = sfs(&path);
    engine.touch("a").expect("touch");
    engine.touch("b").expect("touch");

    assert_eq!(
        engine.rename("a", "b"),
        Err(StoreError::DuplicateName {
            name: "b".to_string()
        })
    );
    assert!(matches!(
        engine.rename("missing", "c"),
        Err(StoreError::NotFound { .. })
    ));
    assert_eq!(sfs(&path).list_files(None).expect("list"), vec!["a", "b"]);
}

#[test]
fn listing_keeps_insertion_order_and_filters() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sfs");
    let engine = sfs(&path);
    for (name, category) in [
        ("zeta.jpg", FileCategory::Image),
        ("alpha", FileCategory::Data),
        ("mid.png", FileCategory::Image),
    ] {
        engine.store_object(name, b"x", category).expect("store");
    }

    assert_eq!(
        engine.list_files(None).expect("list"),
        vec!["zeta.jpg", "alpha", "mid.png"]
    );
    assert_eq!(
        engine.list_files(Some(FileCategory::Image)).expect("list"),
        vec!["zeta.jpg", "mid.png"]
    );
}

#[test]
fn missing_entries_are_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = sfs(&dir.path().join("sfs"));

    assert!(matches!(
        engine.load_bytes_from_file("nope"),
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        engine.get_details("nope"),
        Err(StoreError::NotFound { .. })
    ));
    assert!(!engine.exists("nope").expect("exists"));
}

#[test]
fn delete_reclaims_payload_space() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sfs");
    let engine = sfs(&path);
    engine.touch("keep").expect("touch");
    let small = fs::metadata(&path).expect("metadata").len();

    engine
        .store_object("big", &vec![7u8; 64 * 1024], FileCategory::Data)
        .expect("store");
    engine.delete("big").expect("delete");
    engine.delete("big").expect("delete is idempotent");

    assert_eq!(fs::metadata(&path).expect("metadata").len(), small);
    assert_eq!(sfs(&path).list_files(None).expect("list"), vec!["keep"]);
}

#[test]
fn foreign_file_is_a_format_error_not_an_empty_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("notes.txt");
    fs::write(&path, b"just some notes, not a container").expect("write");

    let err = SecureFileSystem::open_with_params(&path, &StaticPassphrase::new("password"), fast())
        .expect_err("must not open");
    assert!(matches!(err, StoreError::Format { .. }));
    assert_eq!(
        fs::read(&path).expect("read"),
        b"just some notes, not a container"
    );
}

#[test]
fn future_version_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sfs");
    sfs(&path);

    let mut bytes = fs::read(&path).expect("read");
    assert!(bytes.len() > HEADER_LEN);
    bytes[4..6].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
    fs::write(&path, &bytes).expect("write");

    let err = SecureFileSystem::open_with_params(&path, &StaticPassphrase::new("password"), fast())
        .expect_err("must not open");
    assert_eq!(
        err,
        StoreError::UnsupportedVersion {
            version: FORMAT_VERSION + 1
        }
    );
}

#[test]
fn corrupted_catalog_is_an_authentication_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sfs");
    sfs(&path).touch("entry").expect("touch");

    let mut bytes = fs::read(&path).expect("read");
    // Past the header seal and the length prefix: inside the sealed catalog.
    bytes[HEADER_LEN + 28 + 8 + 20] ^= 0x40;
    fs::write(&path, &bytes).expect("write");

    let err = SecureFileSystem::open_with_params(&path, &StaticPassphrase::new("password"), fast())
        .expect_err("must not open");
    assert_eq!(err, StoreError::AuthenticationFailure);
}

#[test]
fn swapped_payloads_fail_closed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sfs");
    let engine = sfs(&path);
    engine
        .store_object("alice", b"AAAA", FileCategory::Data)
        .expect("store");
    engine
        .store_object("bob", b"BBBB", FileCategory::Data)
        .expect("store");

    // Both blobs are 4 + 28 bytes and sit at the end of the file.
    let mut bytes = fs::read(&path).expect("read");
    let split = bytes.len() - 64;
    let (alice, bob) = bytes[split..].split_at_mut(32);
    alice.swap_with_slice(bob);
    fs::write(&path, &bytes).expect("write");

    let fresh = sfs(&path);
    assert_eq!(
        fresh.load_bytes_from_file("alice"),
        Err(StoreError::AuthenticationFailure)
    );
    assert_eq!(
        fresh.load_bytes_from_file("bob"),
        Err(StoreError::AuthenticationFailure)
    );
    assert_eq!(fresh.list_files(None).expect("list"), vec!["alice", "bob"]);
}

#[test]
fn provider_errors_surface_as_passphrase_failures() {
    struct Locked;
    impl strongbox_storage::PassphraseProvider for Locked {
        fn passphrase(&self) -> Result<SecretString, strongbox_storage::key_provider::KeyError> {
            Err(strongbox_storage::key_provider::KeyError::Missing(
                "keychain locked".into(),
            ))
        }
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sfs");
    let err =
        SecureFileSystem::open_with_params(&path, &Locked, fast()).expect_err("no passphrase");

    assert!(matches!(err, StoreError::Passphrase { .. }));
    assert!(!path.exists(), "nothing is created without a passphrase");
}

#[test]
fn container_created_in_missing_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("deeper").join("store.sbx");
    sfs(&path).touch("x").expect("touch");
    assert!(path.exists());
}
