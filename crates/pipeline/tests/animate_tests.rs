use chrono::{TimeZone, Utc};
use pipeline::{assemble, AnimationOutcome, RenderedArtifact};
use renderer::{AnimationFormat, FrameAnimator};
use test_utils::{artifact_at, hours_before, RecordingEncoder, StreamDirs};

fn frames_at_ages(dirs: &StreamDirs, now: chrono::DateTime<Utc>, ages: &[f64]) -> Vec<RenderedArtifact> {
    let mut frames: Vec<RenderedArtifact> = ages
        .iter()
        .enumerate()
        .map(|(i, &hours)| {
            let name = format!("frame{}.png", i);
            dirs.write_rendered(&name, [i as u8 * 40, 0, 0]);
            artifact_at(&dirs.render_dir(), &name, hours_before(now, hours))
        })
        .collect();
    frames.sort_by_key(|f| f.timestamp);
    frames
}

#[test]
fn test_window_selects_recent_frames_and_holds_the_last() {
    let dirs = StreamDirs::new();
    let now = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
    let frames = frames_at_ages(&dirs, now, &[0.5, 3.0, 5.0]);
    let encoder = RecordingEncoder::default();
    let output = dirs.publish_dir().join("goes_latest.gif");

    let outcome = assemble(&frames, now, 4.0, &output, &encoder).unwrap();
    assert_eq!(outcome, AnimationOutcome::Written { frames: 15 });
    assert_eq!(encoder.frame_counts(), vec![15]);

    let calls = encoder.encoded.lock().unwrap();
    assert_eq!(calls[0].0, AnimationFormat::Gif);
    assert_eq!(calls[0].2, 100);
    assert_eq!(std::fs::read(&output).unwrap(), b"gif:15");
}

#[test]
fn test_single_frame_is_not_animated() {
    let dirs = StreamDirs::new();
    let now = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
    let frames = frames_at_ages(&dirs, now, &[0.5, 5.0, 6.0]);
    let encoder = RecordingEncoder::default();
    let output = dirs.publish_dir().join("goes_latest.gif");

    let outcome = assemble(&frames, now, 4.0, &output, &encoder).unwrap();
    assert_eq!(outcome, AnimationOutcome::InsufficientFrames { available: 1 });
    assert!(encoder.frame_counts().is_empty());
    assert!(!output.exists());
}

#[test]
fn test_unreadable_frames_do_not_count_toward_the_minimum() {
    let dirs = StreamDirs::new();
    let now = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
    let frames = frames_at_ages(&dirs, now, &[0.5, 1.0]);
    std::fs::write(&frames[0].path, b"not a png").unwrap();
    let encoder = RecordingEncoder::default();
    let output = dirs.publish_dir().join("goes_latest.gif");

    let outcome = assemble(&frames, now, 4.0, &output, &encoder).unwrap();
    assert_eq!(outcome, AnimationOutcome::InsufficientFrames { available: 1 });
    assert!(encoder.frame_counts().is_empty());
    assert!(!output.exists());
}

#[test]
fn test_unknown_extension_is_rejected() {
    let dirs = StreamDirs::new();
    let now = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
    let frames = frames_at_ages(&dirs, now, &[0.5, 1.0]);
    let output = dirs.publish_dir().join("goes_latest.avi");
    assert!(assemble(&frames, now, 4.0, &output, &RecordingEncoder::default()).is_err());
}

#[test]
fn test_real_gif_is_written() {
    let dirs = StreamDirs::new();
    let now = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
    let frames = frames_at_ages(&dirs, now, &[0.5, 1.0, 1.5]);
    let output = dirs.publish_dir().join("goes_latest.gif");

    let outcome = assemble(&frames, now, 4.0, &output, &FrameAnimator::default()).unwrap();
    assert_eq!(outcome, AnimationOutcome::Written { frames: 16 });
    let bytes = std::fs::read(&output).unwrap();
    assert_eq!(&bytes[..6], b"GIF89a");
}
