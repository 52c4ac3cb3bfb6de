mod common;

use chrono::NaiveDate;
use tempfile::tempdir;

use common::{dated_image, plain_image, sized_dated_image, tree};
use photo_sorter::backup::{run_backup, BackupConfig, DOWNLOAD_SUBDIR};
use photo_sorter::remote::LocalDirectoryStore;
use photo_sorter::{ExifCodec, MemorySink};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn backup_consolidates_resizes_and_uploads() {
    let store_dir = tempdir().unwrap();
    let external = tempdir().unwrap();
    let phone = tempdir().unwrap();
    let local = tempdir().unwrap();

    sized_dated_image(&store_dir.path().join("album/cloud_1.jpg"), 300, 200, "2021:04:10 09:00:00");
    dated_image(&store_dir.path().join("cloud_old.jpg"), "2019:01:01 00:00:00");
    sized_dated_image(&phone.path().join("DCIM/IMG_0001.jpg"), 120, 160, "2021:04:11 17:45:30");
    plain_image(&phone.path().join("DCIM/screenshot.png"), 10, 10);

    let codec = ExifCodec::new();
    let sink = MemorySink::new();
    let store = LocalDirectoryStore::open(store_dir.path(), &codec).unwrap();
    let config = BackupConfig {
        start: date(2021, 4, 1),
        end: date(2021, 4, 30),
        external: external.path().to_path_buf(),
        phone: phone.path().to_path_buf(),
        local_backup: local.path().join("resized"),
        max_dimension: 100,
        workers: None,
        show_progress: false,
    };

    let report = run_backup(&config, &store, &codec, &sink).unwrap();

    assert_eq!(report.download.succeeded, 1);
    assert_eq!(report.phone.transformed, 2);
    assert_eq!(report.downloaded.transformed, 1);
    assert!(report.phone_photos.is_none());

    // downloads were moved out of the staging folder into year buckets
    assert!(tree(&external.path().join(DOWNLOAD_SUBDIR)).is_empty());
    assert_eq!(
        tree(external.path()),
        vec![
            "2021/2021-04-10_09-00-00.jpg",
            "2021/2021-04-11_17-45-30.jpg",
            "Other/screenshot.png",
        ]
    );

    let resized = tree(&config.local_backup);
    assert_eq!(resized.len(), 3);
    assert_eq!(report.resize.transformed, 3);
    assert_eq!(
        image::image_dimensions(config.local_backup.join("2021/2021-04-10_09-00-00.jpg")).unwrap(),
        (100, 66)
    );

    assert_eq!(report.upload.succeeded, 3);
    assert!(report.upload.failures.is_empty());
    let uploaded = tree(store_dir.path());
    assert!(uploaded.contains(&"2021-04-10_09-00-00.jpg".to_string()));
    assert!(uploaded.contains(&"screenshot.png".to_string()));
}

#[test]
fn backup_fails_early_without_the_phone_directory() {
    let store_dir = tempdir().unwrap();
    let external = tempdir().unwrap();
    let local = tempdir().unwrap();

    let codec = ExifCodec::new();
    let store = LocalDirectoryStore::open(store_dir.path(), &codec).unwrap();
    let config = BackupConfig {
        start: date(2021, 1, 1),
        end: date(2021, 12, 31),
        external: external.path().to_path_buf(),
        phone: external.path().join("not-mounted"),
        local_backup: local.path().to_path_buf(),
        max_dimension: 1200,
        workers: None,
        show_progress: false,
    };

    assert!(run_backup(&config, &store, &codec, &MemorySink::new()).is_err());
    assert!(tree(local.path()).is_empty());
}
