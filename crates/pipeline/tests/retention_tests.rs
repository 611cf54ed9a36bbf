use chrono::{Duration, TimeZone, Utc};
use loop_common::{age, TimestampFormat};
use pipeline::{partition, purge, RetentionWindow};
use test_utils::{goes_local_name, hours_before, names_in, radar_local_name, StreamDirs};

fn goes_format() -> TimestampFormat {
    TimestampFormat::new("%Y%j%H%M%S").unwrap()
}

#[test]
fn test_26h_expired_24_5h_current() {
    let dirs = StreamDirs::new();
    let now = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
    let old = goes_local_name("C13", hours_before(now, 26.0));
    let kept = goes_local_name("C13", hours_before(now, 24.5));
    dirs.touch_raw(&old);
    dirs.touch_raw(&kept);

    let p = partition(&dirs.raw_dir(), &goes_format(), "_C13.nc", now, RetentionWindow::new(24.0, 1.0)).unwrap();
    assert_eq!(p.expired.len(), 1);
    assert_eq!(p.expired[0].name, old);
    assert_eq!(p.current.len(), 1);
    assert_eq!(p.current[0].name, kept);
}

#[test]
fn test_everything_left_after_purge_is_within_window() {
    let dirs = StreamDirs::new();
    let now = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
    let window = RetentionWindow::new(24.0, 1.0);
    for hours in [0.0, 0.5, 6.0, 24.0, 25.0, 25.01, 30.0, 48.0, 100.0] {
        dirs.touch_raw(&goes_local_name("C13", hours_before(now, hours)));
    }

    let p = partition(&dirs.raw_dir(), &goes_format(), "_C13.nc", now, window).unwrap();
    assert!(p.expired.iter().all(|a| age(&a.timestamp, &now) > window.limit()));
    assert_eq!(p.expired.len(), 4);

    let stats = purge(&p.expired);
    assert_eq!(stats.removed, 4);
    assert_eq!(stats.failed, 0);

    let after = partition(&dirs.raw_dir(), &goes_format(), "_C13.nc", now, window).unwrap();
    assert!(after.expired.is_empty());
    assert_eq!(after.current.len(), 5);
    assert!(after.current.iter().all(|a| age(&a.timestamp, &now) <= window.limit()));
    assert!(after.current.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn test_undatable_files_are_never_expired() {
    let dirs = StreamDirs::new();
    let now = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
    dirs.touch_raw("notes_C13.nc");
    dirs.touch_raw("1999_C13.nc");
    dirs.touch_raw(&goes_local_name("C13", hours_before(now, 1.0)));

    // a zero-width window expires everything that can be dated
    let p = partition(&dirs.raw_dir(), &goes_format(), "_C13.nc", now, RetentionWindow::new(0.0, 0.0)).unwrap();
    assert_eq!(p.unparseable.len(), 2);
    assert_eq!(p.expired.len(), 1);
    assert!(p.expired.iter().all(|a| !a.name.starts_with("notes") && !a.name.starts_with("1999")));

    purge(&p.expired);
    let left = names_in(&dirs.raw_dir());
    assert_eq!(left, vec!["1999_C13.nc".to_string(), "notes_C13.nc".to_string()]);
}

#[test]
fn test_radar_names_and_partials() {
    let dirs = StreamDirs::new();
    let now = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
    let fmt = TimestampFormat::new("KFSX%Y%m%d_%H%M%S").unwrap();
    let fresh = radar_local_name("KFSX", now - Duration::minutes(5));
    dirs.touch_raw(&fresh);
    dirs.touch_raw(&format!("{}.partial", radar_local_name("KFSX", now)));
    dirs.touch_raw("README");

    let p = partition(&dirs.raw_dir(), &fmt, "", now, RetentionWindow::default()).unwrap();
    assert_eq!(p.current.len(), 1);
    assert_eq!(p.current[0].name, fresh);
    assert_eq!(p.unparseable.len(), 1);
    assert!(p.expired.is_empty());
}
